//! Starting the target program with its output wired into the relay.
//!
//! The child's stdout and stderr are replaced by the channel write ends;
//! every other channel descriptor is close-on-exec, so it disappears in the
//! child before the target program starts.

use std::ffi::{OsStr, OsString};
use std::fs::File;
use std::io::{self, Write};
use std::os::fd::OwnedFd;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use nix::errno::Errno;
use tokio::process::{Child, Command};
use tracing::debug;

use super::termination::{Termination, EXEC_FAILURE_CODE};
use crate::config::RelayConfig;
use crate::error::{RelayError, Result};

/// The launched child, consumed by [`ChildHandle::wait`].
#[derive(Debug)]
pub enum ChildHandle {
    /// The target program is running.
    Running(Child),
    /// The target could not be executed; the failure was reported on the
    /// stderr channel.
    ExecFailed,
}

impl ChildHandle {
    /// OS process id, if a child is running.
    pub fn id(&self) -> Option<u32> {
        match self {
            Self::Running(child) => child.id(),
            Self::ExecFailed => None,
        }
    }

    /// Wait for the child to terminate.
    pub async fn wait(self) -> Result<Termination> {
        match self {
            Self::Running(mut child) => {
                let status = child.wait().await.map_err(RelayError::TerminationQuery)?;
                Termination::try_from(status)
            }
            Self::ExecFailed => Ok(Termination::Exited(EXEC_FAILURE_CODE)),
        }
    }
}

/// Why a spawn attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpawnFailure {
    /// The target program itself could not be executed.
    Exec(Errno),
    /// A channel could not be installed onto a standard stream.
    Redirection,
    /// No child could be created.
    Other,
}

fn classify(err: &io::Error) -> SpawnFailure {
    match err.raw_os_error().map(Errno::from_raw) {
        Some(
            errno @ (Errno::ENOENT
            | Errno::EACCES
            | Errno::ENOEXEC
            | Errno::ENOTDIR
            | Errno::ELOOP
            | Errno::ENAMETOOLONG
            | Errno::ETXTBSY),
        ) => SpawnFailure::Exec(errno),
        Some(Errno::EBADF | Errno::EBUSY) => SpawnFailure::Redirection,
        _ => SpawnFailure::Other,
    }
}

/// Interpreter for executable files that carry no `#!` line.
const FALLBACK_SHELL: &str = "/bin/sh";

/// Launch the configured program with stdout on `out_write` and stderr on
/// `err_write`.
///
/// Both write ends are consumed; when this returns the parent holds no copy
/// of either, so the read ends see end-of-stream once the child is done.
/// An executable file the kernel cannot run directly is handed to
/// `/bin/sh`, the way `execvp` does.
pub fn launch(config: &RelayConfig, out_write: OwnedFd, err_write: OwnedFd) -> Result<ChildHandle> {
    let program = config.program_display();

    let mut spawned = spawn_with(&config.program, &config.args, &out_write, &err_write);
    if matches!(&spawned, Err(err) if classify(err) == SpawnFailure::Exec(Errno::ENOEXEC)) {
        if let Some(script) = resolve_program(&config.program) {
            debug!(
                %program,
                script = %script.display(),
                shell = FALLBACK_SHELL,
                "no interpreter line"
            );
            let mut args = Vec::with_capacity(config.args.len() + 1);
            args.push(script.into_os_string());
            args.extend(config.args.iter().cloned());
            spawned = spawn_with(OsStr::new(FALLBACK_SHELL), &args, &out_write, &err_write);
        }
    }
    drop(out_write);

    match spawned {
        Ok(child) => {
            debug!(pid = child.id(), %program, args = ?config.args, "child launched");
            Ok(ChildHandle::Running(child))
        }
        Err(source) => match classify(&source) {
            SpawnFailure::Exec(errno) => {
                debug!(%program, %errno, "exec failed");
                report_exec_failure(config, errno, err_write)?;
                Ok(ChildHandle::ExecFailed)
            }
            SpawnFailure::Redirection => Err(RelayError::Redirection { program, source }),
            SpawnFailure::Other => Err(RelayError::ProcessSpawn { program, source }),
        },
    }
}

/// One spawn attempt. The builder, and its copies of the write ends, are
/// gone when this returns.
fn spawn_with(
    program: &OsStr,
    args: &[OsString],
    out_write: &OwnedFd,
    err_write: &OwnedFd,
) -> io::Result<Child> {
    let mut cmd = Command::new(program);
    cmd.args(args);
    cmd.stdin(Stdio::inherit());
    cmd.stdout(Stdio::from(out_write.try_clone()?));
    cmd.stderr(Stdio::from(err_write.try_clone()?));
    cmd.spawn()
}

/// Where a `PATH` search for `program` lands: the first regular file with
/// an execute bit. Names containing a `/` are used as given.
fn resolve_program(program: &OsStr) -> Option<PathBuf> {
    if program.as_bytes().contains(&b'/') {
        return Some(PathBuf::from(program));
    }
    let search = std::env::var_os("PATH")?;
    std::env::split_paths(&search)
        .map(|dir| {
            if dir.as_os_str().is_empty() {
                PathBuf::from(".").join(program)
            } else {
                dir.join(program)
            }
        })
        .find(|candidate| is_executable_file(candidate))
}

fn is_executable_file(path: &Path) -> bool {
    std::fs::metadata(path)
        .is_ok_and(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
}

fn report_exec_failure(config: &RelayConfig, errno: Errno, sink: OwnedFd) -> Result<()> {
    File::from(sink)
        .write_all(&config.exec_failure_message(errno.desc()))
        .map_err(RelayError::Write)
}
