//! Connection runner
//!
//! Replays payloads against a target one at a time, in input order, and
//! captures everything the peer sends back. Per-payload failures are data:
//! every input payload yields exactly one [`RunResult`], whatever happens on
//! the wire.

mod connector;
mod endpoint;
mod exchange;

use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::common::Error;
use crate::corpus::Payload;

pub use connector::{Connector, TcpConnector};
pub use endpoint::Endpoint;

pub(crate) use exchange::millis;
use exchange::{exchange, Exchange};

/// Terminal state of one payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Peer closed the connection after responding
    Ok,
    /// No bytes arrived for the read timeout
    Timeout,
    /// An earlier payload left the shared connection unusable
    ConnectionClosedEarly,
    /// Connect, write or read failed
    IoError,
    /// The run was cancelled before this payload completed
    Cancelled,
}

impl Outcome {
    pub fn is_ok(self) -> bool {
        self == Outcome::Ok
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Ok => "ok",
            Outcome::Timeout => "timeout",
            Outcome::ConnectionClosedEarly => "connection_closed_early",
            Outcome::IoError => "io_error",
            Outcome::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of sending one payload and capturing the response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    pub name: String,
    pub sent: Vec<u8>,
    pub received: Vec<u8>,
    pub outcome: Outcome,
    /// Failure detail for outcomes other than `Ok` and `Timeout`
    pub error: Option<String>,
    pub elapsed: Duration,
}

impl RunResult {
    fn from_exchange(payload: &Payload, exchange: Exchange, elapsed: Duration) -> Self {
        Self {
            name: payload.name().to_string(),
            sent: payload.bytes().to_vec(),
            received: exchange.received,
            outcome: exchange.outcome,
            error: exchange.error,
            elapsed,
        }
    }

    /// A payload that never reached the wire
    fn skipped(payload: &Payload, outcome: Outcome, reason: &str) -> Self {
        Self {
            name: payload.name().to_string(),
            sent: payload.bytes().to_vec(),
            received: Vec::new(),
            outcome,
            error: Some(reason.to_string()),
            elapsed: Duration::ZERO,
        }
    }
}

/// Runner settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Bound on each connect attempt
    pub connect_timeout: Duration,
    /// Inactivity timeout between received chunks
    pub read_timeout: Duration,
    /// Bound on writing one full payload
    pub write_timeout: Duration,
    /// Open a fresh connection per payload instead of one for the whole run
    pub per_payload_connection: bool,
    /// Shut down the write side after each payload (per-payload mode only)
    pub half_close: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(2),
            write_timeout: Duration::from_secs(5),
            per_payload_connection: true,
            half_close: false,
        }
    }
}

impl RunOptions {
    /// Reject zero timeouts, which would fail every payload instantly
    pub fn validate(&self) -> crate::common::Result<()> {
        for (name, value) in [
            ("connect timeout", self.connect_timeout),
            ("read timeout", self.read_timeout),
            ("write timeout", self.write_timeout),
        ] {
            if value.is_zero() {
                return Err(Error::InvalidOptions(format!("{name} must be greater than 0")));
            }
        }
        Ok(())
    }
}

/// Replays payloads through connections from a [`Connector`]
pub struct Runner<C> {
    connector: C,
    options: RunOptions,
}

impl Runner<TcpConnector> {
    /// Runner for plain TCP connections to `endpoint`
    pub fn tcp(endpoint: Endpoint, options: RunOptions) -> Self {
        Self::new(TcpConnector::new(endpoint), options)
    }
}

impl<C: Connector> Runner<C> {
    pub fn new(connector: C, options: RunOptions) -> Self {
        Self { connector, options }
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Send every payload in order and capture the responses
    ///
    /// Cancellation is honoured between payloads and during in-flight I/O;
    /// payloads that were not completed are reported as [`Outcome::Cancelled`].
    pub async fn run(&self, payloads: &[Payload], cancel: &CancellationToken) -> Vec<RunResult> {
        tracing::info!(
            "Replaying {} payloads against {} ({})",
            payloads.len(),
            self.connector.target(),
            if self.options.per_payload_connection {
                "connection per payload"
            } else {
                "single connection"
            }
        );

        let mut results = Vec::with_capacity(payloads.len());
        if self.options.per_payload_connection {
            self.run_fresh(payloads, cancel, &mut results).await;
        } else {
            if self.options.half_close {
                tracing::warn!("Ignoring half-close while reusing one connection");
            }
            self.run_reused(payloads, cancel, &mut results).await;
        }

        debug_assert_eq!(results.len(), payloads.len());
        results
    }

    async fn run_fresh(
        &self,
        payloads: &[Payload],
        cancel: &CancellationToken,
        results: &mut Vec<RunResult>,
    ) {
        for (idx, payload) in payloads.iter().enumerate() {
            if cancel.is_cancelled() {
                skip_rest(&payloads[idx..], Outcome::Cancelled, "run cancelled", results);
                return;
            }

            let started = Instant::now();
            let result = match self.open(cancel).await {
                Ok(mut stream) => {
                    exchange(&mut stream, payload, &self.options, self.options.half_close, cancel)
                        .await
                }
                Err(failure) => failure,
            };

            let result = RunResult::from_exchange(payload, result, started.elapsed());
            log_result(&result);
            results.push(result);
        }
    }

    async fn run_reused(
        &self,
        payloads: &[Payload],
        cancel: &CancellationToken,
        results: &mut Vec<RunResult>,
    ) {
        let Some(first) = payloads.first() else {
            return;
        };
        if cancel.is_cancelled() {
            skip_rest(payloads, Outcome::Cancelled, "run cancelled", results);
            return;
        }

        let started = Instant::now();
        let mut stream = match self.open(cancel).await {
            Ok(stream) => stream,
            Err(failure) => {
                let reason = failure.error.clone().unwrap_or_default();
                let outcome = failure.outcome;
                let result = RunResult::from_exchange(first, failure, started.elapsed());
                log_result(&result);
                results.push(result);

                let (cascade, reason) = match outcome {
                    Outcome::Cancelled => (Outcome::Cancelled, "run cancelled".to_string()),
                    _ => (
                        Outcome::ConnectionClosedEarly,
                        format!("connection never opened: {reason}"),
                    ),
                };
                skip_rest(&payloads[1..], cascade, &reason, results);
                return;
            }
        };

        let mut started = Some(started);
        for (idx, payload) in payloads.iter().enumerate() {
            if cancel.is_cancelled() {
                skip_rest(&payloads[idx..], Outcome::Cancelled, "run cancelled", results);
                return;
            }

            let started = started.take().unwrap_or_else(Instant::now);
            let result = exchange(&mut stream, payload, &self.options, false, cancel).await;
            let usable = result.connection_usable();
            let outcome = result.outcome;

            let result = RunResult::from_exchange(payload, result, started.elapsed());
            log_result(&result);
            results.push(result);

            if !usable {
                let rest = &payloads[idx + 1..];
                if outcome == Outcome::Cancelled {
                    skip_rest(rest, Outcome::Cancelled, "run cancelled", results);
                } else {
                    if !rest.is_empty() {
                        tracing::warn!(
                            "Connection to {} ended after '{}' ({}), skipping {} payloads",
                            self.connector.target(),
                            payload.name(),
                            outcome,
                            rest.len()
                        );
                    }
                    let reason = format!("connection ended after '{}'", payload.name());
                    skip_rest(rest, Outcome::ConnectionClosedEarly, &reason, results);
                }
                return;
            }
        }
    }

    /// Connect within the connect timeout, or describe why not
    async fn open(&self, cancel: &CancellationToken) -> Result<C::Stream, Exchange> {
        let attempt = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Exchange::cancelled(Vec::new())),
            result = tokio::time::timeout(self.options.connect_timeout, self.connector.connect()) => result,
        };

        match attempt {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(Exchange::failed(
                Vec::new(),
                Outcome::IoError,
                Error::connect_failed(self.connector.target(), e).to_string(),
            )),
            Err(_) => Err(Exchange::failed(
                Vec::new(),
                Outcome::IoError,
                Error::connect_timeout(
                    self.connector.target(),
                    millis(self.options.connect_timeout),
                )
                .to_string(),
            )),
        }
    }
}

fn skip_rest(payloads: &[Payload], outcome: Outcome, reason: &str, results: &mut Vec<RunResult>) {
    results.extend(
        payloads
            .iter()
            .map(|payload| RunResult::skipped(payload, outcome, reason)),
    );
}

fn log_result(result: &RunResult) {
    match &result.error {
        Some(error) => tracing::debug!(
            "'{}': {} after {:?}: {}",
            result.name,
            result.outcome,
            result.elapsed,
            error
        ),
        None => tracing::debug!(
            "'{}': {} after {:?}, {} bytes received",
            result.name,
            result.outcome,
            result.elapsed,
            result.received.len()
        ),
    }
}

/// Replay `payloads` against `endpoint`
pub async fn run(endpoint: &Endpoint, payloads: &[Payload], options: &RunOptions) -> Vec<RunResult> {
    run_until_cancelled(endpoint, payloads, options, &CancellationToken::new()).await
}

/// Replay `payloads` against `endpoint`, stopping early once `cancel` fires
pub async fn run_until_cancelled(
    endpoint: &Endpoint,
    payloads: &[Payload],
    options: &RunOptions,
    cancel: &CancellationToken,
) -> Vec<RunResult> {
    Runner::tcp(endpoint.clone(), options.clone())
        .run(payloads, cancel)
        .await
}
