//! Report the host's installed applications and their display labels.
//!
//! Run with a package identifier to print its label, `--list-all` to print
//! every `identifier:label`, or `--serve` to speak the line protocol on
//! stdin/stdout until `exit` or end-of-input.

mod app;
mod config;
mod core;

use std::io;
use std::process::ExitCode;

use crate::app::dispatch::{self, UsageError, USAGE_EXIT_CODE};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialise tracing (silent unless RUST_LOG is set).
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr) // stdout carries the protocol
        .init();

    let invocation = match dispatch::parse_args(std::env::args_os()) {
        Ok(invocation) => invocation,
        Err(UsageError::Clap(err)) => err.exit(),
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::from(USAGE_EXIT_CODE);
        }
    };

    match dispatch::run(invocation).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
