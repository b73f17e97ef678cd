//! CLI command handling
//!
//! Resolves options from the config file and flags, runs the command and
//! formats output.

use std::path::PathBuf;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::commands::Commands;
use crate::common::config::Config;
use crate::common::{Error, Result};
use crate::corpus;
use crate::relay::{self, RelayOptions};
use crate::report;
use crate::runner::{self, Endpoint, RunOptions};

/// Flag overrides for a corpus run
#[derive(Debug, Default)]
struct RunOverrides {
    connect_timeout_ms: Option<u64>,
    read_timeout_ms: Option<u64>,
    write_timeout_ms: Option<u64>,
    reuse_connection: bool,
    half_close: bool,
}

impl RunOverrides {
    fn apply(&self, mut options: RunOptions) -> RunOptions {
        if let Some(ms) = self.connect_timeout_ms {
            options.connect_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.read_timeout_ms {
            options.read_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.write_timeout_ms {
            options.write_timeout = Duration::from_millis(ms);
        }
        if self.reuse_connection {
            options.per_payload_connection = false;
        }
        if self.half_close {
            options.half_close = true;
        }
        options
    }
}

/// Dispatch a CLI command
pub async fn dispatch(command: Commands, config: &Config, verbose: bool) -> Result<()> {
    match command {
        Commands::Run {
            host,
            port,
            corpus,
            connect_timeout_ms,
            read_timeout_ms,
            write_timeout_ms,
            reuse_connection,
            half_close,
            output,
        } => {
            let overrides = RunOverrides {
                connect_timeout_ms,
                read_timeout_ms,
                write_timeout_ms,
                reuse_connection,
                half_close,
            };
            let options = overrides.apply(config.run_options());
            run_corpus(Endpoint::new(host, port)?, corpus, options, output, verbose).await
        }

        Commands::Send {
            host,
            port,
            connect_timeout_ms,
            idle_timeout_ms,
            half_close,
        } => {
            let endpoint = Endpoint::new(host, port)?;
            let idle_ms = idle_timeout_ms.unwrap_or(config.timeouts.read_ms);
            let options = RelayOptions {
                connect_timeout: Duration::from_millis(
                    connect_timeout_ms.unwrap_or(config.timeouts.connect_ms),
                ),
                write_timeout: Duration::from_millis(config.timeouts.write_ms),
                idle_timeout: (idle_ms > 0).then(|| Duration::from_millis(idle_ms)),
                half_close: half_close || config.runner.half_close,
            };

            let mut stdout = tokio::io::stdout();
            let summary = relay::send(&endpoint, tokio::io::stdin(), &mut stdout, &options).await?;
            tracing::info!(
                "Sent {} bytes to {}, received {} ({})",
                summary.sent,
                endpoint,
                summary.received,
                summary.outcome
            );
            Ok(())
        }
    }
}

async fn run_corpus(
    endpoint: Endpoint,
    corpus_dir: PathBuf,
    options: RunOptions,
    output: Option<PathBuf>,
    verbose: bool,
) -> Result<()> {
    options.validate()?;
    // Loader errors abort before any connection is attempted
    let payloads = corpus::load(&corpus_dir)?;
    if payloads.is_empty() {
        tracing::warn!("Corpus {} holds no payloads", corpus_dir.display());
    }

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received Ctrl+C, cancelling the run");
            interrupt.cancel();
        }
    });

    let results = runner::run_until_cancelled(&endpoint, &payloads, &options, &cancel).await;

    if let Some(dir) = &output {
        let summary = report::write_responses(dir, &results)?;
        println!("Responses written to {}", summary.display());
    }
    report::print_summary(&results, verbose);

    let failed = results.iter().filter(|r| !r.outcome.is_ok()).count();
    if failed > 0 {
        return Err(Error::RunFailed {
            failed,
            total: results.len(),
        });
    }
    Ok(())
}
