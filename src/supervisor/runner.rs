//! Restart supervisor.
//!
//! Runs the configured command, watching its output and exit code, and
//! starts it again whenever a trigger fires until it exits cleanly or the
//! attempt limit is reached. At most one child is alive at any time: a
//! triggered child is killed and reaped before the next one is spawned.

use std::io;
use std::path::Path;

use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;

use crate::config::RunConfig;
use crate::display;
use crate::process::{
    resolve_executable, MonitorOutcome, MonitorPair, SpawnError, SupervisedProcess,
};
use crate::supervisor::{
    AttemptOutcome, AttemptStats, AttemptTracker, RestartReason, RunOutcome, SupervisorState,
};

/// Error type for supervisor operations.
#[derive(thiserror::Error, Debug)]
pub enum SupervisorError {
    /// The child could not be started.
    #[error(transparent)]
    Spawn(#[from] SpawnError),
    /// The child could not be waited on.
    #[error("Failed to wait for child process: {0}")]
    Wait(#[source] io::Error),
    /// The child could not be killed or reaped.
    #[error("Failed to terminate child process: {0}")]
    Terminate(#[source] io::Error),
    /// An output monitor task panicked.
    #[error("Output monitor failed: {0}")]
    Monitor(#[from] JoinError),
}

/// First of the concurrent attempt events to complete.
enum Race {
    Cancelled,
    Triggered,
    Exited(io::Result<i32>),
}

/// Supervisor for restarting a command on trigger conditions.
pub struct Supervisor {
    config: RunConfig,
    tracker: AttemptTracker,
    cancel: CancellationToken,
}

impl Supervisor {
    #[must_use]
    pub fn new(config: RunConfig) -> Self {
        Self {
            config,
            tracker: AttemptTracker::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Set a cancellation token for graceful shutdown.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    #[must_use]
    pub fn state(&self) -> SupervisorState {
        self.tracker.state()
    }

    #[must_use]
    pub fn stats(&self) -> AttemptStats {
        self.tracker.stats()
    }

    /// Run the command until it exits without triggering a restart, the
    /// attempt limit is reached, or the run is cancelled.
    ///
    /// Each call starts from a fresh attempt count.
    ///
    /// # Errors
    ///
    /// Returns `SupervisorError::Spawn` if the executable cannot be found or
    /// started, and `Wait`/`Terminate`/`Monitor` for failures of the
    /// supervision machinery itself. None of these are retried.
    pub async fn run(&mut self) -> Result<RunOutcome, SupervisorError> {
        self.tracker = AttemptTracker::new();
        let program = resolve_executable(self.config.program())?;
        let verbose = self.config.is_verbose();

        loop {
            let attempts = self.tracker.attempts();

            if self.cancel.is_cancelled() {
                self.tracker.transition(SupervisorState::Concluding);
                return Ok(RunOutcome::Interrupted { attempts });
            }

            if self.config.attempt_limit().is_reached(attempts) {
                self.tracker.transition(SupervisorState::Concluding);
                tracing::debug!(attempts, "Out of restart attempts");
                if verbose {
                    display::print_exhausted(attempts);
                }
                return Ok(RunOutcome::Exhausted { attempts });
            }

            let attempt = self.tracker.begin_attempt();
            if verbose {
                display::print_attempt_start(
                    attempt,
                    self.config.attempt_limit(),
                    self.config.program(),
                );
            }

            match self.run_attempt(&program).await? {
                AttemptOutcome::Restart(reason) => {
                    tracing::info!(attempt, %reason, "Restarting child process");
                    if verbose {
                        display::print_restart(attempt, &reason.to_string());
                    }
                    self.tracker.record_restart();
                }
                AttemptOutcome::Exited(code) => {
                    tracing::debug!(attempt, code, "Child exited without triggers");
                    self.tracker.record_exit(code);
                    return Ok(RunOutcome::Exited {
                        code,
                        attempts: attempt,
                    });
                }
                AttemptOutcome::Interrupted => {
                    tracing::info!(attempt, "Run cancelled");
                    self.tracker.transition(SupervisorState::Concluding);
                    return Ok(RunOutcome::Interrupted { attempts: attempt });
                }
            }
        }
    }

    /// Spawn one child and race its monitors against its exit.
    async fn run_attempt(&mut self, program: &Path) -> Result<AttemptOutcome, SupervisorError> {
        let mut process = SupervisedProcess::spawn(program, self.config.args())?;
        let stdout = process.take_stdout()?;
        let stderr = process.take_stderr()?;

        let restart = CancellationToken::new();
        let monitors = MonitorPair::start(
            stdout,
            stderr,
            self.config.trigger_set(),
            &restart,
            self.config.drain_window(),
        );
        self.tracker.transition(SupervisorState::Racing);

        let race = tokio::select! {
            biased;

            () = self.cancel.cancelled() => Race::Cancelled,
            () = restart.cancelled() => Race::Triggered,
            status = process.wait() => Race::Exited(status),
        };

        match race {
            Race::Cancelled => {
                self.stop_attempt(&mut process, monitors).await?;
                Ok(AttemptOutcome::Interrupted)
            }
            Race::Triggered => {
                let outcomes = self.stop_attempt(&mut process, monitors).await?;
                Ok(AttemptOutcome::Restart(
                    line_match(outcomes).unwrap_or(RestartReason::Unreported),
                ))
            }
            Race::Exited(status) => {
                let code = status.map_err(SupervisorError::Wait)?;
                tracing::debug!(code, "Child exited, draining output");

                // A trigger on output written just before exit still wins.
                let outcomes = monitors.drain().await?;
                if let Some(reason) = line_match(outcomes) {
                    return Ok(AttemptOutcome::Restart(reason));
                }

                Ok(match self.config.trigger_set().match_exit_code(code) {
                    Some(trigger) => AttemptOutcome::Restart(RestartReason::ExitCode {
                        code,
                        trigger: trigger.to_string(),
                    }),
                    None => AttemptOutcome::Exited(code),
                })
            }
        }
    }

    /// Kill and reap the child, then stop its monitors.
    async fn stop_attempt(
        &self,
        process: &mut SupervisedProcess,
        monitors: MonitorPair,
    ) -> Result<[MonitorOutcome; 2], SupervisorError> {
        let code = process
            .terminate(self.config.grace_period())
            .await
            .map_err(SupervisorError::Terminate)?;
        tracing::debug!(code, "Discarded exit code of terminated child");
        Ok(monitors.shutdown().await?)
    }
}

fn line_match(outcomes: [MonitorOutcome; 2]) -> Option<RestartReason> {
    outcomes.into_iter().find_map(|outcome| match outcome {
        MonitorOutcome::Matched {
            stream,
            trigger,
            line,
        } => Some(RestartReason::Line {
            stream,
            trigger,
            line,
        }),
        MonitorOutcome::Finished | MonitorOutcome::Stopped => None,
    })
}
