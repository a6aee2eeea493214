//! Individual trigger predicates.
//!
//! A trigger tests either a line of child output or a child exit code,
//! never both. Line triggers share the regex engine: literal substrings are
//! escaped before compilation so metacharacters match themselves.

use std::fmt;

use regex::Regex;

/// Error type for trigger compilation.
#[derive(thiserror::Error, Debug)]
pub enum TriggerError {
    /// The pattern is not a valid regular expression.
    #[error("Invalid trigger pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        source: regex::Error,
    },
}

/// A compiled restart trigger.
#[derive(Debug, Clone)]
pub enum Trigger {
    /// Fires when the child exits with exactly this code.
    ExitCode(i32),
    /// Fires when a line contains the literal text.
    Substring {
        /// The text as given by the user.
        text: String,
        /// Escaped form of `text`.
        pattern: Regex,
    },
    /// Fires when the regular expression matches anywhere in a line.
    Pattern(Regex),
}

impl Trigger {
    /// Build a trigger that matches a single exit code.
    #[must_use]
    pub fn code(code: i32) -> Self {
        Self::ExitCode(code)
    }

    /// Build a trigger that matches lines containing `text` literally.
    ///
    /// # Errors
    ///
    /// Returns `TriggerError::InvalidPattern` if the escaped text exceeds the
    /// regex engine's size limits.
    pub fn substring(text: impl Into<String>) -> Result<Self, TriggerError> {
        let text = text.into();
        let pattern = compile(&regex::escape(&text))?;
        Ok(Self::Substring { text, pattern })
    }

    /// Build a trigger from a regular expression.
    ///
    /// # Errors
    ///
    /// Returns `TriggerError::InvalidPattern` if the expression does not compile.
    pub fn pattern(pattern: &str) -> Result<Self, TriggerError> {
        compile(pattern).map(Self::Pattern)
    }

    /// Check whether this trigger fires on an output line.
    #[must_use]
    pub fn matches_line(&self, line: &str) -> bool {
        match self {
            Self::ExitCode(_) => false,
            Self::Substring { pattern, .. } | Self::Pattern(pattern) => pattern.is_match(line),
        }
    }

    /// Check whether this trigger fires on an exit code.
    #[must_use]
    pub fn matches_exit_code(&self, code: i32) -> bool {
        match self {
            Self::ExitCode(expected) => *expected == code,
            Self::Substring { .. } | Self::Pattern(_) => false,
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExitCode(code) => write!(f, "exit code {code}"),
            Self::Substring { text, .. } => write!(f, "string {text:?}"),
            Self::Pattern(pattern) => write!(f, "pattern /{}/", pattern.as_str()),
        }
    }
}

fn compile(pattern: &str) -> Result<Regex, TriggerError> {
    Regex::new(pattern).map_err(|source| TriggerError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}
