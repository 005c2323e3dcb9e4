//! CLI argument definitions.

use std::ffi::OsString;

use clap::{CommandFactory, Parser};

use crate::config::RelayConfig;

/// The only flag we recognise, and only as the first argument.
const HELP_FLAG: &str = "--help";

/// Run a command and tag every line of its stdout and stderr
#[derive(Parser, Debug)]
#[command(name = "tag-stdout")]
#[command(about, long_about = None)]
#[command(disable_help_flag = true, disable_version_flag = true)]
#[command(override_usage = "tag-stdout TAG EXECUTABLE [ARG]...\n       tag-stdout --help")]
pub struct Cli {
    /// Label prefixed to every relayed line (taken verbatim, even if it starts with '-')
    #[arg(value_name = "TAG", allow_hyphen_values = true)]
    pub tag: OsString,

    /// Program to run, followed by its arguments (passed through verbatim)
    #[arg(
        value_name = "EXECUTABLE",
        required = true,
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub command: Vec<OsString>,

    /// How we were invoked (argv[0]).
    #[arg(skip)]
    pub invoked_as: OsString,
}

impl Cli {
    /// Parse a full argument vector, program name first.
    ///
    /// Returns `None` when usage should be printed instead: `--help` as the
    /// first argument, or fewer than a TAG and an EXECUTABLE. Everything from
    /// the TAG on is positional, whatever it looks like.
    pub fn from_argv<I, T>(argv: I) -> Option<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        let mut argv: Vec<OsString> = argv.into_iter().map(Into::into).collect();
        if argv.len() < 3 || argv.get(1).is_some_and(|first| first == HELP_FLAG) {
            return None;
        }

        let invoked_as = argv[0].clone();
        // An escape first, so clap never reads an operand as one of its own flags.
        argv.insert(1, OsString::from("--"));
        let mut cli = Self::try_parse_from(argv).ok()?;
        cli.invoked_as = invoked_as;
        Some(cli)
    }

    /// Turn parsed arguments into a run configuration.
    pub fn into_config(self) -> RelayConfig {
        let mut command = self.command.into_iter();
        // clap guarantees at least one value.
        let program = command.next().unwrap_or_default();

        RelayConfig::new(self.tag, program)
            .args(command)
            .program_name(self.invoked_as)
    }

    /// Usage text printed for `--help` and malformed invocations.
    pub fn usage_text() -> String {
        Self::command().render_help().to_string()
    }
}
