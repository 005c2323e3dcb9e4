//! tag-stdout - run a command and tag every line it prints.
//!
//! `tag-stdout TAG EXECUTABLE [ARG...]` relays the child's stdout as
//! `[O]:TAG: line` on our stdout and its stderr as `[E]:TAG: line` on our
//! stderr, then exits with the child's exit code, or with the number of the
//! signal that killed it.
//!
//! Architecture:
//! - `process` allocates the channels and launches the child
//! - `relay` splits each channel into lines and serializes their output
//! - `supervisor` drives one run from launch to reaping

mod cli;
mod config;
mod error;
mod logging;
mod process;
mod relay;
mod signals;
mod supervisor;

use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    cli::execute(std::env::args_os()).await
}
