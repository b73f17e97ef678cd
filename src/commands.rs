//! CLI command definitions
//!
//! Defines the clap commands for the corpus runner CLI.

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Replay every payload in a corpus directory against a TCP server
    Run {
        /// Target host name or address
        host: String,

        /// Target port (1-65535)
        port: u16,

        /// Directory holding one payload file per test case
        corpus: PathBuf,

        /// Connect timeout in milliseconds
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        connect_timeout_ms: Option<u64>,

        /// Inactivity timeout while reading a response, in milliseconds
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        read_timeout_ms: Option<u64>,

        /// Timeout for sending one payload, in milliseconds
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        write_timeout_ms: Option<u64>,

        /// Send every payload over one connection instead of one each
        #[arg(long)]
        reuse_connection: bool,

        /// Shut down the write side after each payload is sent
        #[arg(long)]
        half_close: bool,

        /// Write captured responses and summary.json into this directory
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Send stdin to a TCP server and stream the response to stdout
    Send {
        /// Target host name or address
        host: String,

        /// Target port (1-65535)
        port: u16,

        /// Connect timeout in milliseconds
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        connect_timeout_ms: Option<u64>,

        /// Stop after the server is silent this long (0 waits for the server to close)
        #[arg(long)]
        idle_timeout_ms: Option<u64>,

        /// Shut down the write side once stdin has been sent
        #[arg(long)]
        half_close: bool,
    },
}
