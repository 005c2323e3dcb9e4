//! The child's final disposition and the exit code it maps to.

use std::fmt;
use std::io;
use std::os::unix::process::ExitStatusExt;
use std::process::{ExitCode, ExitStatus};

use nix::sys::signal::Signal;

use crate::error::{RelayError, Result};

/// Exit code reported when the target program could not be executed.
pub const EXEC_FAILURE_CODE: i32 = 1;

/// How the child ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Exited normally with this code.
    Exited(i32),
    /// Killed by this signal number.
    Signaled(i32),
}

impl Termination {
    /// Exit code this process should report.
    ///
    /// A signal maps to its raw number, not the shell's 128+N.
    pub const fn code(self) -> i32 {
        match self {
            Self::Exited(code) | Self::Signaled(code) => code,
        }
    }
}

impl TryFrom<ExitStatus> for Termination {
    type Error = RelayError;

    fn try_from(status: ExitStatus) -> Result<Self> {
        if let Some(code) = status.code() {
            Ok(Self::Exited(code))
        } else if let Some(signal) = status.signal() {
            Ok(Self::Signaled(signal))
        } else {
            Err(RelayError::TerminationQuery(io::Error::other(format!(
                "unrecognized wait status {status}"
            ))))
        }
    }
}

impl From<Termination> for ExitCode {
    fn from(termination: Termination) -> Self {
        u8::try_from(termination.code()).map_or(Self::FAILURE, Self::from)
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exited(code) => write!(f, "exited with code {code}"),
            Self::Signaled(signal) => match Signal::try_from(*signal) {
                Ok(name) => write!(f, "killed by signal {signal} ({name})"),
                Err(_) => write!(f, "killed by signal {signal}"),
            },
        }
    }
}
