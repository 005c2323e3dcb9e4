//! Line relaying from the child's channels to our own output.
//!
//! Each channel gets a [`Demultiplexer`] that splits it into lines; all
//! lines funnel through a single writer task (see [`spawn_writer`]) so no
//! two emissions interleave.

mod demux;
mod sink;

use std::fmt;

pub use demux::Demultiplexer;
pub use sink::{spawn_writer, Emitter};

/// One of the two monitored child streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    /// The child's standard output.
    Out,
    /// The child's standard error.
    Err,
}

impl Stream {
    /// Display marker prefixed to every relayed line.
    pub const fn marker(self) -> &'static str {
        match self {
            Self::Out => "[O]",
            Self::Err => "[E]",
        }
    }
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Out => f.write_str("stdout"),
            Self::Err => f.write_str("stderr"),
        }
    }
}

/// A complete line read from one of the child's streams.
///
/// The text excludes the terminating newline and is carried verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayLine {
    /// Line from the child's stdout.
    Stdout(Vec<u8>),
    /// Line from the child's stderr.
    Stderr(Vec<u8>),
}

impl RelayLine {
    pub fn new(stream: Stream, text: Vec<u8>) -> Self {
        match stream {
            Stream::Out => Self::Stdout(text),
            Stream::Err => Self::Stderr(text),
        }
    }

    pub const fn stream(&self) -> Stream {
        match self {
            Self::Stdout(_) => Stream::Out,
            Self::Stderr(_) => Stream::Err,
        }
    }

    pub fn text(&self) -> &[u8] {
        match self {
            Self::Stdout(text) | Self::Stderr(text) => text,
        }
    }
}
