//! Run reporting
//!
//! Captured responses are written one file per payload so they can be diffed
//! against known-good fixtures, next to a JSON summary of the run.

use std::fs;
use std::path::{Path, PathBuf};

use colored::Colorize;
use serde::Serialize;

use crate::common::Result;
use crate::runner::{millis, Outcome, RunResult};

/// Name of the summary file inside the output directory
pub const SUMMARY_FILE: &str = "summary.json";

/// Extension given to captured response files
pub const RESPONSE_EXTENSION: &str = "out";

/// One line of `summary.json`
#[derive(Debug, Serialize)]
struct SummaryEntry<'a> {
    name: &'a str,
    outcome: Outcome,
    sent_bytes: usize,
    received_bytes: usize,
    elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

impl<'a> From<&'a RunResult> for SummaryEntry<'a> {
    fn from(result: &'a RunResult) -> Self {
        Self {
            name: &result.name,
            outcome: result.outcome,
            sent_bytes: result.sent.len(),
            received_bytes: result.received.len(),
            elapsed_ms: millis(result.elapsed),
            error: result.error.as_deref(),
        }
    }
}

/// Write each captured response and the run summary into `dir`
///
/// Returns the path of the summary file.
pub fn write_responses(dir: &Path, results: &[RunResult]) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;

    for result in results {
        let path = response_path(dir, &result.name);
        fs::write(&path, &result.received)?;
        tracing::trace!("Wrote {} bytes to {}", result.received.len(), path.display());
    }

    let entries: Vec<SummaryEntry<'_>> = results.iter().map(SummaryEntry::from).collect();
    let summary = dir.join(SUMMARY_FILE);
    fs::write(&summary, serde_json::to_vec_pretty(&entries)?)?;

    tracing::info!("Wrote {} responses to {}", results.len(), dir.display());
    Ok(summary)
}

/// Path of the captured response for test `name`
///
/// Path separators and `%` are percent-encoded, so distinct names always map
/// to distinct files inside `dir`.
pub fn response_path(dir: &Path, name: &str) -> PathBuf {
    let mut file_name = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            '%' => file_name.push_str("%25"),
            '/' => file_name.push_str("%2F"),
            '\\' => file_name.push_str("%5C"),
            c => file_name.push(c),
        }
    }
    dir.join(format!("{}.{}", file_name, RESPONSE_EXTENSION))
}

/// Print a per-payload summary to stdout
pub fn print_summary(results: &[RunResult], verbose: bool) {
    println!();
    for result in results {
        let mark = match result.outcome {
            Outcome::Ok => "✓".green(),
            Outcome::Timeout => "…".yellow(),
            Outcome::Cancelled => "-".dimmed(),
            Outcome::ConnectionClosedEarly | Outcome::IoError => "✗".red(),
        };
        println!(
            "  {} {} {}",
            mark,
            result.name.white().bold(),
            format!(
                "({}, {} → {} bytes, {} ms)",
                result.outcome,
                result.sent.len(),
                result.received.len(),
                result.elapsed.as_millis()
            )
            .dimmed()
        );

        if let Some(error) = &result.error {
            println!("      {}", error.red());
        }
        if verbose && !result.received.is_empty() {
            for line in String::from_utf8_lossy(&result.received).lines() {
                println!("      {}", line.dimmed());
            }
        }
    }

    let ok = results.iter().filter(|r| r.outcome.is_ok()).count();
    let line = format!("{} of {} payloads completed cleanly", ok, results.len());
    if ok == results.len() {
        println!("\n{} {}\n", "✓".green().bold(), line.green().bold());
    } else {
        println!("\n{} {}\n", "✗".red().bold(), line.red().bold());
    }
}
