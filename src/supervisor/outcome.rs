//! Results of attempts and of whole runs.

use std::fmt;

use crate::process::StreamKind;

/// Exit code recorded while an attempt is being restarted or a run was
/// interrupted. Never a real child exit code.
pub const RESTARTING_EXIT_CODE: i32 = -250;

/// Exit code returned when every allowed attempt triggered a restart.
pub const EXHAUSTED_EXIT_CODE: i32 = -249;

/// Process exit status of an interrupted run, as a shell reports SIGINT.
pub const INTERRUPTED_PROCESS_EXIT_CODE: i32 = 130;

/// Why an attempt is being restarted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestartReason {
    /// A line trigger fired on child output.
    Line {
        stream: StreamKind,
        trigger: String,
        line: String,
    },
    /// The child exited with a code matched by a code trigger.
    ExitCode { code: i32, trigger: String },
    /// The restart signal fired but no monitor reported the line.
    Unreported,
}

impl fmt::Display for RestartReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Line {
                stream,
                trigger,
                line,
            } => write!(f, "{trigger} matched on {stream}: {line}"),
            Self::ExitCode { code, trigger } => write!(f, "{trigger} matched (exited with {code})"),
            Self::Unreported => f.write_str("restart trigger fired"),
        }
    }
}

/// Result of a single attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The child must be started again.
    Restart(RestartReason),
    /// The child exited without any trigger firing.
    Exited(i32),
    /// The run was cancelled while the child was alive.
    Interrupted,
}

/// Final result of a supervised run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The child exited on its own and no trigger fired.
    Exited { code: i32, attempts: u32 },
    /// The attempt limit was reached.
    Exhausted { attempts: u32 },
    /// The run was cancelled.
    Interrupted { attempts: u32 },
}

impl RunOutcome {
    /// Exit code to hand back to the invoking environment.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Exited { code, .. } => *code,
            Self::Exhausted { .. } => EXHAUSTED_EXIT_CODE,
            Self::Interrupted { .. } => RESTARTING_EXIT_CODE,
        }
    }

    /// Exit status for the `relaunch` process itself.
    ///
    /// Sentinels are out of the 8-bit range the platform keeps, so exhaustion
    /// is reported as its low byte (7) and interruption as 130.
    #[must_use]
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::Exited { code, .. } => *code,
            Self::Exhausted { .. } => EXHAUSTED_EXIT_CODE & 0xff,
            Self::Interrupted { .. } => INTERRUPTED_PROCESS_EXIT_CODE,
        }
    }

    /// Number of attempts made.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Exited { attempts, .. }
            | Self::Exhausted { attempts }
            | Self::Interrupted { attempts } => *attempts,
        }
    }
}
