//! Ordered, shareable collection of triggers.

use std::sync::Arc;

use super::{Trigger, TriggerError};

/// Read-only list of triggers shared by every monitor of every attempt.
///
/// Cloning is cheap; all clones see the same compiled triggers.
#[derive(Debug, Clone, Default)]
pub struct TriggerSet {
    triggers: Arc<[Trigger]>,
}

impl TriggerSet {
    /// Create a set from already compiled triggers, keeping their order.
    #[must_use]
    pub fn new(triggers: Vec<Trigger>) -> Self {
        Self {
            triggers: triggers.into(),
        }
    }

    /// Compile exit-code, substring and pattern triggers, in that order.
    ///
    /// # Errors
    ///
    /// Returns `TriggerError::InvalidPattern` for the first pattern that fails
    /// to compile.
    pub fn compile<S, P>(codes: &[i32], strings: &[S], patterns: &[P]) -> Result<Self, TriggerError>
    where
        S: AsRef<str>,
        P: AsRef<str>,
    {
        let mut triggers = Vec::with_capacity(codes.len() + strings.len() + patterns.len());
        triggers.extend(codes.iter().copied().map(Trigger::code));
        for text in strings {
            triggers.push(Trigger::substring(text.as_ref())?);
        }
        for pattern in patterns {
            triggers.push(Trigger::pattern(pattern.as_ref())?);
        }
        Ok(Self::new(triggers))
    }

    /// First trigger, in configuration order, that fires on `line`.
    #[must_use]
    pub fn match_line(&self, line: &str) -> Option<&Trigger> {
        self.triggers.iter().find(|t| t.matches_line(line))
    }

    /// First trigger, in configuration order, that fires on `code`.
    #[must_use]
    pub fn match_exit_code(&self, code: i32) -> Option<&Trigger> {
        self.triggers.iter().find(|t| t.matches_exit_code(code))
    }

    /// Whether any trigger inspects output lines.
    #[must_use]
    pub fn has_line_triggers(&self) -> bool {
        self.triggers
            .iter()
            .any(|t| !matches!(t, Trigger::ExitCode(_)))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Trigger> {
        self.triggers.iter()
    }
}
