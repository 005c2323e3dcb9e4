//! Orchestration of a single relay run.
//!
//! Opens the channels, launches the child, drains both streams concurrently
//! through one output writer, then reaps the child. The child is only reaped
//! after both streams have closed.

use std::os::fd::OwnedFd;
use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::unix::pipe;
use tracing::{debug, info};

use crate::config::RelayConfig;
use crate::error::{RelayError, Result};
use crate::process::{launch, ChannelPair, Termination};
use crate::relay::{spawn_writer, Demultiplexer, Stream};
use crate::signals::SignalDeferral;

/// Progress of a run. Transitions are strictly linear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Initializing,
    ChannelsReady,
    ChildLaunched,
    Draining,
    ChildReaped,
    Done,
}

impl RunState {
    /// The only state that may follow this one.
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Initializing => Some(Self::ChannelsReady),
            Self::ChannelsReady => Some(Self::ChildLaunched),
            Self::ChildLaunched => Some(Self::Draining),
            Self::Draining => Some(Self::ChildReaped),
            Self::ChildReaped => Some(Self::Done),
            Self::Done => None,
        }
    }
}

/// What a completed run produced.
#[derive(Debug)]
pub struct RunOutcome<O, E> {
    /// How the child ended.
    pub termination: Termination,
    /// Lines relayed from the child's stdout.
    pub out_lines: u64,
    /// Lines relayed from the child's stderr.
    pub err_lines: u64,
    /// The stdout sink, handed back after the final flush.
    pub out: O,
    /// The stderr sink, handed back after the final flush.
    pub err: E,
}

/// Runs one child under a tag.
#[derive(Debug)]
pub struct Supervisor {
    config: RelayConfig,
    state: RunState,
}

impl Supervisor {
    pub const fn new(config: RelayConfig) -> Self {
        Self {
            config,
            state: RunState::Initializing,
        }
    }

    fn advance(&mut self, next: RunState) {
        debug_assert_eq!(self.state.next(), Some(next));
        debug!(from = ?self.state, to = ?next, "run state");
        self.state = next;
    }

    /// Relay to this process's own stdout and stderr.
    pub async fn run(self) -> Result<Termination> {
        let RunOutcome {
            termination,
            out_lines,
            err_lines,
            mut out,
            mut err,
        } = self
            .run_with(tokio::io::stdout(), tokio::io::stderr())
            .await?;
        info!(%termination, out_lines, err_lines, "child finished");

        // Our exit status is next; nothing may still sit in the stdio handles.
        out.flush().await.map_err(RelayError::Write)?;
        err.flush().await.map_err(RelayError::Write)?;
        Ok(termination)
    }

    /// Relay OUT lines to `out` and ERR lines to `err`.
    pub async fn run_with<O, E>(mut self, out: O, err: E) -> Result<RunOutcome<O, E>>
    where
        O: AsyncWrite + Unpin + Send + 'static,
        E: AsyncWrite + Unpin + Send + 'static,
    {
        let ChannelPair {
            out: out_channel,
            err: err_channel,
        } = ChannelPair::open()?;
        self.advance(RunState::ChannelsReady);

        let child = launch(&self.config, out_channel.write, err_channel.write)?;
        let pid = child.id();
        self.advance(RunState::ChildLaunched);

        let deferral = SignalDeferral::install()?;
        let out_reader = open_reader(out_channel.stream, out_channel.read)?;
        let err_reader = open_reader(err_channel.stream, err_channel.read)?;
        let (emitter, writer) = spawn_writer(
            Arc::clone(&self.config.tag),
            out,
            err,
            self.config.queue_capacity,
        );
        self.advance(RunState::Draining);

        let chunk_size = self.config.read_chunk_size;
        let err_task = tokio::spawn(
            Demultiplexer::new(Stream::Err, err_reader, emitter.clone(), chunk_size).run(),
        );
        let out_result = Demultiplexer::new(Stream::Out, out_reader, emitter, chunk_size)
            .run()
            .await;
        let err_result = err_task.await.map_err(|source| RelayError::Join {
            task: "stderr relay",
            source,
        })?;
        // A failed writer explains any SinkClosed the readers saw.
        let (out, err) = writer.await.map_err(|source| RelayError::Join {
            task: "output writer",
            source,
        })??;
        let out_lines = out_result?;
        let err_lines = err_result?;

        let termination = child.wait().await?;
        self.advance(RunState::ChildReaped);
        debug!(
            ?pid,
            %termination,
            deferred_signals = deferral.absorbed(),
            "child reaped"
        );
        drop(deferral);
        self.advance(RunState::Done);

        Ok(RunOutcome {
            termination,
            out_lines,
            err_lines,
            out,
            err,
        })
    }
}

fn open_reader(stream: Stream, fd: OwnedFd) -> Result<pipe::Receiver> {
    pipe::Receiver::from_owned_fd(fd)
        .map_err(|source| RelayError::ChannelCreation { stream, source })
}
