//! Configuration types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::trigger::{TriggerError, TriggerSet};

/// How long a child stream may stay silent after the child exits before
/// its monitor stops reading.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Signed attempt count meaning "no limit".
pub const UNLIMITED_ATTEMPTS: i32 = -1;

/// Upper bound on the number of attempts of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AttemptLimit {
    #[default]
    Unlimited,
    AtMost(u32),
}

impl AttemptLimit {
    /// Interpret a signed count; any negative value means unlimited.
    #[must_use]
    pub fn from_signed(value: i32) -> Self {
        u32::try_from(value).map_or(Self::Unlimited, Self::AtMost)
    }

    /// Whether `attempts` already made use up the limit.
    #[must_use]
    pub fn is_reached(self, attempts: u32) -> bool {
        match self {
            Self::Unlimited => false,
            Self::AtMost(max) => attempts >= max,
        }
    }
}

impl From<i32> for AttemptLimit {
    fn from(value: i32) -> Self {
        Self::from_signed(value)
    }
}

/// Errors that can occur while building the run configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    ReadError {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ParseError {
        path: std::path::PathBuf,
        source: toml::de::Error,
    },

    #[error("Config file not found: {0}")]
    NotFound(std::path::PathBuf),

    #[error("No command given")]
    EmptyCommand,

    #[error(transparent)]
    InvalidTrigger(#[from] TriggerError),
}

/// Everything the supervisor needs for one run.
///
/// Built once before the run starts and never changed afterwards.
#[derive(Debug, Clone)]
pub struct RunConfig {
    max_attempts: AttemptLimit,
    triggers: TriggerSet,
    program: String,
    args: Vec<String>,
    verbose: bool,
    drain_timeout: Duration,
    kill_grace: Duration,
}

impl RunConfig {
    /// Create a configuration for `command` (program followed by arguments)
    /// with no triggers and no attempt limit.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::EmptyCommand` if `command` is empty.
    pub fn new<I, S>(command: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut command = command.into_iter().map(Into::into);
        let program = command.next().ok_or(ConfigError::EmptyCommand)?;

        Ok(Self {
            max_attempts: AttemptLimit::Unlimited,
            triggers: TriggerSet::default(),
            program,
            args: command.collect(),
            verbose: false,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            kill_grace: Duration::ZERO,
        })
    }

    /// Set the attempt limit.
    #[must_use]
    pub fn max_attempts(mut self, limit: impl Into<AttemptLimit>) -> Self {
        self.max_attempts = limit.into();
        self
    }

    /// Set the restart triggers.
    #[must_use]
    pub fn triggers(mut self, triggers: TriggerSet) -> Self {
        self.triggers = triggers;
        self
    }

    /// Print attempt banners on stderr.
    #[must_use]
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Set how long a stream may be idle while draining after the child exits.
    #[must_use]
    pub fn drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Set the SIGTERM grace period before a restart kill.
    #[must_use]
    pub fn kill_grace(mut self, grace: Duration) -> Self {
        self.kill_grace = grace;
        self
    }

    #[must_use]
    pub fn attempt_limit(&self) -> AttemptLimit {
        self.max_attempts
    }

    #[must_use]
    pub fn trigger_set(&self) -> &TriggerSet {
        &self.triggers
    }

    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    #[must_use]
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    #[must_use]
    pub fn drain_window(&self) -> Duration {
        self.drain_timeout
    }

    #[must_use]
    pub fn grace_period(&self) -> Duration {
        self.kill_grace
    }
}

/// One layer of user settings, from a config file or the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunSettings {
    /// Maximum attempts; negative means unlimited.
    pub max_attempts: Option<i32>,
    /// Exit codes that trigger a restart.
    pub codes: Vec<i32>,
    /// Literal strings that trigger a restart.
    pub strings: Vec<String>,
    /// Regular expressions that trigger a restart.
    pub patterns: Vec<String>,
    /// Drain window after exit, in milliseconds.
    pub drain_timeout_ms: Option<u64>,
    /// SIGTERM grace before killing, in milliseconds.
    pub kill_grace_ms: Option<u64>,
}

impl RunSettings {
    /// Stack `over` on top of `self`.
    ///
    /// Trigger lists are concatenated (`self` first); scalar values set in
    /// `over` replace those in `self`.
    #[must_use]
    pub fn merge(mut self, over: Self) -> Self {
        self.codes.extend(over.codes);
        self.strings.extend(over.strings);
        self.patterns.extend(over.patterns);
        self.max_attempts = over.max_attempts.or(self.max_attempts);
        self.drain_timeout_ms = over.drain_timeout_ms.or(self.drain_timeout_ms);
        self.kill_grace_ms = over.kill_grace_ms.or(self.kill_grace_ms);
        self
    }

    /// Compile the settings into a run configuration for `command`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidTrigger` if a pattern does not compile and
    /// `ConfigError::EmptyCommand` if `command` is empty.
    pub fn into_run_config<I, S>(self, command: I, verbose: bool) -> Result<RunConfig, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let triggers = TriggerSet::compile(&self.codes, &self.strings[..], &self.patterns[..])?;

        Ok(RunConfig::new(command)?
            .max_attempts(self.max_attempts.unwrap_or(UNLIMITED_ATTEMPTS))
            .triggers(triggers)
            .verbose(verbose)
            .drain_timeout(
                self.drain_timeout_ms
                    .map_or(DEFAULT_DRAIN_TIMEOUT, Duration::from_millis),
            )
            .kill_grace(
                self.kill_grace_ms
                    .map_or(Duration::ZERO, Duration::from_millis),
            ))
    }
}
