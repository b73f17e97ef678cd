//! Error types for the corpus runner
//!
//! Only corpus loading, configuration and CLI-level failures surface as
//! errors. Per-payload network failures are recorded in each
//! [`RunResult`](crate::runner::RunResult) instead.

use std::io;
use std::path::Path;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the corpus runner
#[derive(Error, Debug)]
pub enum Error {
    // === Corpus Errors ===
    #[error("Corpus directory '{0}' not found")]
    CorpusNotFound(String),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Network Errors ===
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Failed to connect to {endpoint}: {source}")]
    ConnectFailed {
        endpoint: String,
        #[source]
        source: io::Error,
    },

    #[error("Connection to {endpoint} timed out after {millis} ms")]
    ConnectTimeout { endpoint: String, millis: u64 },

    // === Configuration Errors ===
    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Run Errors ===
    #[error("{failed} of {total} payloads did not complete cleanly")]
    RunFailed { failed: usize, total: usize },
}

impl Error {
    /// Create a file read error for a path
    pub fn file_read(path: &Path, error: impl ToString) -> Self {
        Self::FileRead {
            path: path.display().to_string(),
            error: error.to_string(),
        }
    }

    /// Create a connect failure for an endpoint
    pub fn connect_failed(endpoint: impl ToString, source: io::Error) -> Self {
        Self::ConnectFailed {
            endpoint: endpoint.to_string(),
            source,
        }
    }

    /// Create a connect timeout for an endpoint
    pub fn connect_timeout(endpoint: impl ToString, millis: u64) -> Self {
        Self::ConnectTimeout {
            endpoint: endpoint.to_string(),
            millis,
        }
    }
}
