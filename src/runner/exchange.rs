//! One payload's write-then-capture cycle on an open stream

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use super::{Outcome, RunOptions};
use crate::corpus::Payload;

/// Size of each read from the peer
const READ_CHUNK: usize = 8 * 1024;

/// What happened on the wire for one payload
#[derive(Debug)]
pub(crate) struct Exchange {
    pub received: Vec<u8>,
    pub outcome: Outcome,
    pub error: Option<String>,
}

impl Exchange {
    fn finished(received: Vec<u8>, outcome: Outcome) -> Self {
        Self {
            received,
            outcome,
            error: None,
        }
    }

    pub fn failed(received: Vec<u8>, outcome: Outcome, error: impl Into<String>) -> Self {
        Self {
            received,
            outcome,
            error: Some(error.into()),
        }
    }

    pub fn cancelled(received: Vec<u8>) -> Self {
        Self::failed(received, Outcome::Cancelled, "run cancelled")
    }

    /// Whether the stream can carry another payload
    pub fn connection_usable(&self) -> bool {
        self.outcome == Outcome::Timeout
    }
}

/// Send `payload` over `stream` and capture the response
///
/// Reading stops when the peer closes, when nothing arrives for
/// `read_timeout`, on a read error, or on cancellation. Bytes received
/// before any of these are kept.
pub(crate) async fn exchange<S>(
    stream: &mut S,
    payload: &Payload,
    options: &RunOptions,
    half_close: bool,
    cancel: &CancellationToken,
) -> Exchange
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let write = async {
        stream.write_all(payload.bytes()).await?;
        stream.flush().await?;
        if half_close {
            stream.shutdown().await?;
        }
        Ok::<_, std::io::Error>(())
    };

    let written = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Exchange::cancelled(Vec::new()),
        result = tokio::time::timeout(options.write_timeout, write) => result,
    };

    match written {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            return Exchange::failed(Vec::new(), Outcome::IoError, format!("write failed: {e}"))
        }
        Err(_) => {
            return Exchange::failed(
                Vec::new(),
                Outcome::IoError,
                format!("write timed out after {} ms", millis(options.write_timeout)),
            )
        }
    }

    read_response(stream, options.read_timeout, cancel).await
}

async fn read_response<S>(
    stream: &mut S,
    read_timeout: Duration,
    cancel: &CancellationToken,
) -> Exchange
where
    S: AsyncRead + Unpin,
{
    let mut received = Vec::new();
    let mut buf = vec![0u8; READ_CHUNK];

    loop {
        let read = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Exchange::cancelled(received),
            result = tokio::time::timeout(read_timeout, stream.read(&mut buf)) => result,
        };

        match read {
            Ok(Ok(0)) => return Exchange::finished(received, Outcome::Ok),
            Ok(Ok(n)) => received.extend_from_slice(&buf[..n]),
            Ok(Err(e)) => {
                return Exchange::failed(received, Outcome::IoError, format!("read failed: {e}"))
            }
            Err(_) => return Exchange::finished(received, Outcome::Timeout),
        }
    }
}

pub(crate) fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
