//! CLI argument parsing module.

mod args;
mod commands;

pub use commands::execute;
