//! Keeps the relay alive through external signals while the child runs.
//!
//! A Ctrl-C at the terminal reaches the whole foreground process group. The
//! child should decide what to do with it; the relay must keep draining so
//! the child's last lines and its exit status still come through. The same
//! holds for every other signal whose default action would end or stop us.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use nix::sys::signal::Signal;
use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::SignalStream;
use tokio_stream::{StreamExt, StreamMap};
use tracing::debug;

use crate::error::{RelayError, Result};

const DEFERRED: [(&str, fn() -> SignalKind); 8] = [
    ("SIGINT", SignalKind::interrupt),
    ("SIGTERM", SignalKind::terminate),
    ("SIGHUP", SignalKind::hangup),
    ("SIGQUIT", SignalKind::quit),
    ("SIGUSR1", SignalKind::user_defined1),
    ("SIGUSR2", SignalKind::user_defined2),
    ("SIGALRM", SignalKind::alarm),
    ("SIGTSTP", terminal_stop),
];

const fn terminal_stop() -> SignalKind {
    SignalKind::from_raw(Signal::SIGTSTP as i32)
}

/// Absorbs every signal in `DEFERRED` while alive.
///
/// SIGKILL and SIGSTOP cannot be caught; SIGPIPE is already ignored by the
/// Rust runtime and surfaces as a write error instead.
///
/// The listener task stops on drop, but the handlers stay installed for the
/// rest of the process, so a late signal still cannot cut the exit short.
#[derive(Debug)]
pub struct SignalDeferral {
    absorbed: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl SignalDeferral {
    /// Install the listeners. Must be called inside a tokio runtime.
    pub fn install() -> Result<Self> {
        let mut streams = StreamMap::new();
        for (name, kind) in DEFERRED {
            let listener = signal(kind()).map_err(RelayError::SignalSetup)?;
            streams.insert(name, SignalStream::new(listener));
        }

        let absorbed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&absorbed);
        let task = tokio::spawn(async move {
            while let Some((name, ())) = streams.next().await {
                counter.fetch_add(1, Ordering::Relaxed);
                debug!(signal = name, "signal deferred to child");
            }
        });

        Ok(Self { absorbed, task })
    }

    /// Number of signals absorbed so far.
    pub fn absorbed(&self) -> usize {
        self.absorbed.load(Ordering::Relaxed)
    }
}

impl Drop for SignalDeferral {
    fn drop(&mut self) {
        self.task.abort();
    }
}
