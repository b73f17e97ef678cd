//! Raw stdin-to-socket relay
//!
//! Sends a block of input to an endpoint and streams whatever comes back to
//! an output as it arrives, like a one-shot netcat.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::common::{Error, Result};
use crate::runner::{millis, Connector, Endpoint, Outcome, TcpConnector};

/// Relay settings
#[derive(Debug, Clone)]
pub struct RelayOptions {
    pub connect_timeout: Duration,
    /// Bound on sending the whole input
    pub write_timeout: Duration,
    /// Stop once the peer has been silent this long; `None` waits for close
    pub idle_timeout: Option<Duration>,
    /// Shut down the write side once the input is sent
    pub half_close: bool,
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            write_timeout: Duration::from_secs(5),
            idle_timeout: Some(Duration::from_secs(2)),
            half_close: false,
        }
    }
}

/// What a relay moved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelaySummary {
    pub sent: usize,
    pub received: usize,
    /// `Ok` when the peer closed, `Timeout` when it went idle
    pub outcome: Outcome,
}

/// Read `input` to EOF, send it to `endpoint`, and copy the response to `output`
pub async fn send<R, W>(
    endpoint: &Endpoint,
    mut input: R,
    output: &mut W,
    options: &RelayOptions,
) -> Result<RelaySummary>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut data = Vec::new();
    input.read_to_end(&mut data).await?;
    tracing::debug!("Read {} bytes of input", data.len());

    let connector = TcpConnector::new(endpoint.clone());
    let mut stream = tokio::time::timeout(options.connect_timeout, connector.connect())
        .await
        .map_err(|_| Error::connect_timeout(endpoint, millis(options.connect_timeout)))?
        .map_err(|e| Error::connect_failed(endpoint, e))?;

    relay(&mut stream, &data, output, options).await
}

/// Write `data` to `stream`, then stream the response into `output`
pub async fn relay<S, W>(
    stream: &mut S,
    data: &[u8],
    output: &mut W,
    options: &RelayOptions,
) -> Result<RelaySummary>
where
    S: AsyncRead + AsyncWrite + Unpin,
    W: AsyncWrite + Unpin,
{
    let write = async {
        stream.write_all(data).await?;
        stream.flush().await?;
        if options.half_close {
            stream.shutdown().await?;
        }
        Ok::<_, std::io::Error>(())
    };
    tokio::time::timeout(options.write_timeout, write)
        .await
        .map_err(|_| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("write timed out after {} ms", millis(options.write_timeout)),
            ))
        })??;

    let mut buf = [0u8; 1024];
    let mut received = 0;
    let outcome = loop {
        let n = match options.idle_timeout {
            Some(idle) => match tokio::time::timeout(idle, stream.read(&mut buf)).await {
                Ok(read) => read?,
                Err(_) => break Outcome::Timeout,
            },
            None => stream.read(&mut buf).await?,
        };
        if n == 0 {
            break Outcome::Ok;
        }

        output.write_all(&buf[..n]).await?;
        output.flush().await?;
        received += n;
    };

    tracing::debug!("Relay finished ({}): {} bytes received", outcome, received);
    Ok(RelaySummary {
        sent: data.len(),
        received,
        outcome,
    })
}
