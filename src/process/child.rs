//! Child process spawning and control.
//!
//! The child inherits the supervisor's standard input and has its stdout and
//! stderr piped back so they can be monitored. Dropping a
//! [`SupervisedProcess`] kills the child, so every exit path of an attempt
//! releases the process and its pipes.

use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::{Child, ChildStderr, ChildStdout, Command};

/// Exit code reported when the platform gives neither a code nor a signal.
pub const UNKNOWN_EXIT_CODE: i32 = -1;

/// Error type for process spawning operations.
#[derive(thiserror::Error, Debug)]
pub enum SpawnError {
    /// The executable could not be found.
    #[error("Unable to find binary: {program}")]
    NotFound { program: String },
    /// Permission denied when spawning.
    #[error("Permission denied: {program}")]
    PermissionDenied { program: String },
    /// Stdout pipe was not created.
    #[error("Process stdout not available")]
    NoStdout,
    /// Stderr pipe was not created.
    #[error("Process stderr not available")]
    NoStderr,
    /// Other I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl SpawnError {
    /// Create a `SpawnError` from an I/O error, classifying common cases.
    fn from_io(err: io::Error, program: &Path) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound {
                program: program.display().to_string(),
            },
            io::ErrorKind::PermissionDenied => Self::PermissionDenied {
                program: program.display().to_string(),
            },
            _ => Self::Io(err),
        }
    }
}

/// Resolve `program` to an executable file.
///
/// Names containing a path separator are checked as given; bare names are
/// searched for on `PATH`.
///
/// # Errors
///
/// Returns `SpawnError::NotFound` if no executable file matches.
pub fn resolve_executable(program: &str) -> Result<PathBuf, SpawnError> {
    let not_found = || SpawnError::NotFound {
        program: program.to_string(),
    };

    if program.is_empty() {
        return Err(not_found());
    }

    if Path::new(program).components().count() > 1 {
        let path = PathBuf::from(program);
        return if is_executable(&path) {
            Ok(path)
        } else {
            Err(not_found())
        };
    }

    std::env::var_os("PATH")
        .and_then(|paths| {
            std::env::split_paths(&paths).find_map(|dir| {
                let full = dir.join(program);
                is_executable(&full).then_some(full)
            })
        })
        .ok_or_else(not_found)
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .is_ok_and(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Translate an exit status into a single integer code.
///
/// On Unix a child killed by signal `N` reports `128 + N`.
#[must_use]
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;

        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    UNKNOWN_EXIT_CODE
}

/// A running child process under supervision.
#[derive(Debug)]
pub struct SupervisedProcess {
    child: Child,
}

impl SupervisedProcess {
    /// Spawn `program` with `args`, stdin inherited and output piped.
    ///
    /// # Errors
    ///
    /// Returns `SpawnError` if the process fails to spawn.
    pub fn spawn<I, S>(program: &Path, args: I) -> Result<Self, SpawnError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SpawnError::from_io(e, program))?;

        tracing::debug!(program = %program.display(), pid = ?child.id(), "Spawned child process");

        Ok(Self { child })
    }

    /// Take ownership of the stdout pipe.
    ///
    /// # Errors
    ///
    /// Returns `SpawnError::NoStdout` if the pipe was already taken.
    pub fn take_stdout(&mut self) -> Result<ChildStdout, SpawnError> {
        self.child.stdout.take().ok_or(SpawnError::NoStdout)
    }

    /// Take ownership of the stderr pipe.
    ///
    /// # Errors
    ///
    /// Returns `SpawnError::NoStderr` if the pipe was already taken.
    pub fn take_stderr(&mut self) -> Result<ChildStderr, SpawnError> {
        self.child.stderr.take().ok_or(SpawnError::NoStderr)
    }

    /// Get the process ID, if still running.
    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Wait for the process to exit and return its exit code.
    ///
    /// A nonzero exit is not an error; only a failure to wait at all is.
    /// Cancel safe.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be waited on.
    pub async fn wait(&mut self) -> io::Result<i32> {
        self.child.wait().await.map(exit_code)
    }

    /// Terminate the process and reap it.
    ///
    /// With a zero `grace` the process is killed immediately. Otherwise
    /// SIGTERM is sent first (Unix only) and the kill follows once `grace`
    /// elapses. Safe to call on a process that has already exited.
    ///
    /// # Errors
    ///
    /// Returns an error if the kill signal cannot be sent or the process
    /// cannot be reaped.
    pub async fn terminate(&mut self, grace: Duration) -> io::Result<i32> {
        if !grace.is_zero() {
            if let Some(code) = self.request_stop(grace).await? {
                return Ok(code);
            }
        }

        match self.child.start_kill() {
            Ok(()) => {}
            // Already reaped.
            Err(e) if e.kind() == io::ErrorKind::InvalidInput => {}
            Err(e) => return Err(e),
        }

        let code = self.wait().await?;
        tracing::debug!(code, "Child process reaped after kill");
        Ok(code)
    }

    #[cfg(unix)]
    async fn request_stop(&mut self, grace: Duration) -> io::Result<Option<i32>> {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let Some(pid) = self.id().and_then(|pid| i32::try_from(pid).ok()) else {
            return Ok(None);
        };
        if let Err(e) = kill(Pid::from_raw(pid), Signal::SIGTERM) {
            tracing::debug!(pid, error = %e, "Failed to send SIGTERM, grace period will run out");
        }

        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(status) => status.map(|s| Some(exit_code(s))),
            Err(_) => {
                tracing::debug!(pid, "Grace period elapsed, killing child");
                Ok(None)
            }
        }
    }

    #[cfg(not(unix))]
    async fn request_stop(&mut self, _grace: Duration) -> io::Result<Option<i32>> {
        Ok(None)
    }
}
