//! Connection sources for the runner

use std::io;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use super::Endpoint;

/// Something that can open a fresh byte stream to the target
///
/// The runner bounds every call with its connect timeout and drops the
/// returned stream to close it.
#[async_trait]
pub trait Connector: Send + Sync {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send;

    /// Open a new connection
    async fn connect(&self) -> io::Result<Self::Stream>;

    /// Target description used in logs and error messages
    fn target(&self) -> String;
}

/// Plain TCP connections to an [`Endpoint`]
#[derive(Debug, Clone)]
pub struct TcpConnector {
    endpoint: Endpoint,
}

impl TcpConnector {
    pub fn new(endpoint: Endpoint) -> Self {
        Self { endpoint }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

#[async_trait]
impl Connector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self) -> io::Result<TcpStream> {
        let stream = TcpStream::connect((self.endpoint.host(), self.endpoint.port())).await?;
        // Payloads are written whole; don't let Nagle hold back the tail
        stream.set_nodelay(true)?;
        tracing::trace!(
            "Connected to {} from {}",
            self.endpoint,
            stream.local_addr()?
        );
        Ok(stream)
    }

    fn target(&self) -> String {
        self.endpoint.to_string()
    }
}
