//! Error taxonomy for a relay run.
//!
//! Every variant is fatal: the run stops and `main` reports it outside the
//! tagging pipeline. Malformed invocations never get this far; they print
//! usage instead.

use std::io;

use thiserror::Error;
use tokio::task::JoinError;

use crate::relay::Stream;

/// Errors that can end a relay run.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The OS refused to allocate a channel (usually descriptor exhaustion).
    #[error("failed to create {stream} channel")]
    ChannelCreation {
        stream: Stream,
        #[source]
        source: io::Error,
    },

    /// The child could not be created at all.
    #[error("failed to spawn process: {program}")]
    ProcessSpawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// A channel could not be installed onto the child's standard streams.
    #[error("failed to redirect standard streams of {program}")]
    Redirection {
        program: String,
        #[source]
        source: io::Error,
    },

    /// Reading a channel failed for a reason other than end-of-stream.
    #[error("failed to read child {stream}")]
    Read {
        stream: Stream,
        #[source]
        source: io::Error,
    },

    /// Writing relayed output to our own stdout/stderr failed.
    #[error("failed to write relayed output")]
    Write(#[source] io::Error),

    /// The output writer went away while lines were still being relayed.
    #[error("output writer stopped before {0} was drained")]
    SinkClosed(Stream),

    /// Signal listeners for the drain region could not be installed.
    #[error("failed to install signal listeners")]
    SignalSetup(#[source] io::Error),

    /// A relay task panicked or was cancelled.
    #[error("{task} task did not complete")]
    Join {
        task: &'static str,
        #[source]
        source: JoinError,
    },

    /// The child's termination status could not be determined.
    #[error("could not determine child termination status")]
    TerminationQuery(#[source] io::Error),
}

/// Result type for relay operations.
pub type Result<T, E = RelayError> = std::result::Result<T, E>;
