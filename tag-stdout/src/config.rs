//! Run configuration, built once from the command line.

use std::ffi::OsString;
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::sync::Arc;

/// Bytes requested per read from a channel.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 8192;

/// Lines that may wait in the output queue before readers are held back.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Everything a relay run needs to know.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Label attached to every relayed line, as given on the command line.
    pub tag: Arc<[u8]>,

    /// The program to execute.
    pub program: OsString,

    /// Arguments to pass to the program.
    pub args: Vec<OsString>,

    /// Our own name as invoked, used in exec failure messages.
    pub program_name: OsString,

    /// Read size for each channel.
    pub read_chunk_size: usize,

    /// Capacity of the output queue.
    pub queue_capacity: usize,
}

impl RelayConfig {
    /// Create a configuration running `program` under `tag`.
    pub fn new(tag: impl Into<OsString>, program: impl Into<OsString>) -> Self {
        Self {
            tag: Arc::from(tag.into().into_vec()),
            program: program.into(),
            args: Vec::new(),
            program_name: OsString::from(env!("CARGO_PKG_NAME")),
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    /// Set the name we report ourselves under.
    pub fn program_name(mut self, name: impl Into<OsString>) -> Self {
        self.program_name = name.into();
        self
    }

    /// Add an argument.
    #[cfg(test)]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the channel read size.
    #[cfg(test)]
    pub fn read_chunk_size(mut self, size: usize) -> Self {
        self.read_chunk_size = size;
        self
    }

    /// Set the output queue capacity.
    #[cfg(test)]
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// The program as a printable string.
    pub fn program_display(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }

    /// The tag as a printable string.
    pub fn tag_display(&self) -> String {
        String::from_utf8_lossy(&self.tag).into_owned()
    }

    /// Exec failure diagnostic, `<name> failed to run <program>: <reason>`.
    pub fn exec_failure_message(&self, reason: &str) -> Vec<u8> {
        let mut message = Vec::new();
        message.extend_from_slice(self.program_name.as_bytes());
        message.extend_from_slice(b" failed to run ");
        message.extend_from_slice(self.program.as_bytes());
        message.extend_from_slice(b": ");
        message.extend_from_slice(reason.as_bytes());
        message.push(b'\n');
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RelayConfig::new("web", "ls");
        assert_eq!(&*config.tag, b"web");
        assert_eq!(config.program, "ls");
        assert!(config.args.is_empty());
        assert_eq!(config.program_name, "tag-stdout");
        assert_eq!(config.read_chunk_size, DEFAULT_READ_CHUNK_SIZE);
        assert_eq!(config.queue_capacity, DEFAULT_QUEUE_CAPACITY);
    }

    #[test]
    fn test_builder() {
        let config = RelayConfig::new("t", "sh")
            .arg("-c")
            .args(["echo hi"])
            .read_chunk_size(16)
            .queue_capacity(2)
            .program_name("./relay");
        assert_eq!(config.args, vec![OsString::from("-c"), OsString::from("echo hi")]);
        assert_eq!(config.read_chunk_size, 16);
        assert_eq!(config.queue_capacity, 2);
        assert_eq!(config.program_name, "./relay");
    }

    #[test]
    fn test_non_utf8_tag_kept_verbatim() {
        let config = RelayConfig::new(OsString::from_vec(vec![b'a', 0xff]), "ls");
        assert_eq!(&*config.tag, b"a\xff");
        assert_eq!(config.tag_display(), "a\u{fffd}");
    }

    #[test]
    fn test_exec_failure_message() {
        let config = RelayConfig::new("X", "missing").program_name("/usr/local/bin/tag-stdout");
        assert_eq!(
            config.exec_failure_message("No such file or directory"),
            b"/usr/local/bin/tag-stdout failed to run missing: No such file or directory\n"
        );
    }
}
