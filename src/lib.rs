//! corpus-runner - replay a seed corpus against a TCP server
//!
//! Loads a directory of raw wire payloads, sends each one to a TCP endpoint
//! and captures the response stream for regression comparison.

pub mod cli;
pub mod commands;
pub mod common;
pub mod corpus;
pub mod relay;
pub mod report;
pub mod runner;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use corpus::Payload;
pub use runner::{Endpoint, Outcome, RunOptions, RunResult};
