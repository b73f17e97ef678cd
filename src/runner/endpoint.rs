//! Target endpoint validation

use std::fmt;

use crate::common::{Error, Result};

/// Host/port pair identifying a TCP listener
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    /// Create an endpoint, rejecting an empty host and port 0
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self> {
        let host = host.into();
        let trimmed = host.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidEndpoint("host must not be empty".to_string()));
        }
        if port == 0 {
            return Err(Error::InvalidEndpoint(
                "port must be in the range 1-65535".to_string(),
            ));
        }

        // Accept bracketed IPv6 literals as typed on the command line
        let host = trimmed
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(trimmed)
            .to_string();

        Ok(Self { host, port })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}
