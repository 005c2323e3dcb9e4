//! CLI command execution.

use std::ffi::OsString;
use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing::debug;

use super::args::Cli;
use crate::config::RelayConfig;
use crate::logging;
use crate::process::Termination;
use crate::supervisor::Supervisor;

/// Exit status for `--help` and malformed invocations.
pub const USAGE_EXIT_CODE: u8 = 1;

/// Parse `args` and run the relay, returning this process's exit code.
///
/// Malformed invocations print usage and never touch channels or processes.
pub async fn execute<I, T>(args: I) -> ExitCode
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let Some(cli) = Cli::from_argv(args) else {
        return usage();
    };
    let config = cli.into_config();

    logging::init_logging();

    let invoked_as = config.program_name.to_string_lossy().into_owned();
    match run(config).await {
        Ok(termination) => ExitCode::from(termination),
        Err(err) => {
            eprintln!("{invoked_as}: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: RelayConfig) -> Result<Termination> {
    let program = config.program_display();
    debug!(tag = %config.tag_display(), %program, "starting relay");

    Supervisor::new(config)
        .run()
        .await
        .with_context(|| format!("failed to relay output of {program}"))
}

fn usage() -> ExitCode {
    print!("{}", Cli::usage_text());
    ExitCode::from(USAGE_EXIT_CODE)
}
