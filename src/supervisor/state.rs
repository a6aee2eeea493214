//! Attempt state machine.

use super::RESTARTING_EXIT_CODE;

/// Where the supervisor is in its attempt loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SupervisorState {
    #[default]
    Idle,
    Spawning,
    Racing,
    Restarting,
    Concluding,
}

/// Tracks attempt progress for one run.
#[derive(Debug, Clone)]
pub struct AttemptTracker {
    state: SupervisorState,
    attempts: u32,
    restarts: u32,
    last_exit_code: Option<i32>,
}

impl Default for AttemptTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl AttemptTracker {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: SupervisorState::Idle,
            attempts: 0,
            restarts: 0,
            last_exit_code: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> SupervisorState {
        self.state
    }

    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn transition(&mut self, new_state: SupervisorState) {
        tracing::debug!(from = ?self.state, to = ?new_state, attempt = self.attempts, "State transition");
        self.state = new_state;
    }

    /// Count a new attempt and move to `Spawning`. Returns its ordinal.
    pub fn begin_attempt(&mut self) -> u32 {
        self.attempts = self.attempts.saturating_add(1);
        self.transition(SupervisorState::Spawning);
        self.attempts
    }

    /// Record that the current attempt is being restarted.
    pub fn record_restart(&mut self) {
        self.restarts = self.restarts.saturating_add(1);
        self.last_exit_code = Some(RESTARTING_EXIT_CODE);
        self.transition(SupervisorState::Restarting);
    }

    /// Record the final exit code of the run.
    pub fn record_exit(&mut self, code: i32) {
        self.last_exit_code = Some(code);
        self.transition(SupervisorState::Concluding);
    }

    #[must_use]
    pub fn stats(&self) -> AttemptStats {
        AttemptStats {
            attempts: self.attempts,
            restarts: self.restarts,
            last_exit_code: self.last_exit_code,
        }
    }
}

/// Attempt statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptStats {
    pub attempts: u32,
    pub restarts: u32,
    pub last_exit_code: Option<i32>,
}
