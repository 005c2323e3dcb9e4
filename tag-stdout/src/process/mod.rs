//! Child process plumbing.
//!
//! Channel allocation, launching the target with its standard streams
//! redirected, and interpreting how it terminated.

mod channel;
mod launch;
mod termination;

pub use channel::ChannelPair;
pub use launch::launch;
pub use termination::Termination;
