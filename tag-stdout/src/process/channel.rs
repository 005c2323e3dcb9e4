//! Unidirectional byte channels between the relay and its child.
//!
//! Both ends are close-on-exec, so the only channel descriptors a child ever
//! sees are the write ends installed as its stdout and stderr.

use std::io;
use std::os::fd::OwnedFd;

use tracing::trace;

use crate::error::{RelayError, Result};
use crate::relay::Stream;

/// One channel: a read end for the relay, a write end for the child.
#[derive(Debug)]
pub struct Channel {
    pub stream: Stream,
    pub read: OwnedFd,
    pub write: OwnedFd,
}

impl Channel {
    /// Allocate a channel for `stream`.
    pub fn open(stream: Stream) -> Result<Self> {
        let (read, write) = cloexec_pipe().map_err(|errno| RelayError::ChannelCreation {
            stream,
            source: io::Error::from(errno),
        })?;
        trace!(%stream, ?read, ?write, "channel open");
        Ok(Self {
            stream,
            read,
            write,
        })
    }
}

/// The two channels a run needs.
#[derive(Debug)]
pub struct ChannelPair {
    pub out: Channel,
    pub err: Channel,
}

impl ChannelPair {
    /// Allocate both channels. Either failing aborts the run.
    pub fn open() -> Result<Self> {
        Ok(Self {
            out: Channel::open(Stream::Out)?,
            err: Channel::open(Stream::Err)?,
        })
    }
}

#[cfg(not(target_vendor = "apple"))]
fn cloexec_pipe() -> nix::Result<(OwnedFd, OwnedFd)> {
    nix::unistd::pipe2(nix::fcntl::OFlag::O_CLOEXEC)
}

#[cfg(target_vendor = "apple")]
fn cloexec_pipe() -> nix::Result<(OwnedFd, OwnedFd)> {
    use nix::fcntl::{fcntl, FcntlArg, FdFlag};
    use std::os::fd::AsRawFd;

    let (read, write) = nix::unistd::pipe()?;
    for fd in [&read, &write] {
        fcntl(fd.as_raw_fd(), FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))?;
    }
    Ok((read, write))
}
