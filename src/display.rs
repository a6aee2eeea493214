//! Coloured diagnostic lines for supervision events.
//!
//! Everything here goes to stderr, one complete line per call, so it
//! interleaves with the child's forwarded stderr only at line boundaries.

use std::io::{self, Write};

use chrono::Utc;
use owo_colors::OwoColorize;

use crate::config::AttemptLimit;

/// Maximum length of a matched line shown in a restart banner.
const MAX_LINE_LEN: usize = 80;

/// Get current timestamp in the same format as tracing.
fn timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Truncate a string to a maximum length, adding ellipsis if truncated.
#[must_use]
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        "...".to_string()
    } else {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{kept}...")
    }
}

/// Describe attempt `attempt` against `limit`, e.g. `2/5` or `2`.
#[must_use]
pub fn format_attempt(attempt: u32, limit: AttemptLimit) -> String {
    match limit {
        AttemptLimit::Unlimited => attempt.to_string(),
        AttemptLimit::AtMost(max) => format!("{attempt}/{max}"),
    }
}

fn emit(line: &str) {
    let mut stderr = io::stderr().lock();
    let _ = writeln!(stderr, "{line}");
    let _ = stderr.flush();
}

/// Print the start of an attempt.
pub fn print_attempt_start(attempt: u32, limit: AttemptLimit, program: &str) {
    emit(&format!(
        "{} {} attempt {} {}",
        timestamp().dimmed(),
        "[RELAUNCH]".blue().bold(),
        format_attempt(attempt, limit).cyan(),
        program.dimmed()
    ));
}

/// Print that an attempt is being restarted.
pub fn print_restart(attempt: u32, reason: &str) {
    emit(&format!(
        "{} {} attempt {} restarting: {}",
        timestamp().dimmed(),
        "[RESTART]".yellow().bold(),
        attempt,
        truncate(reason, MAX_LINE_LEN)
    ));
}

/// Print that the attempt limit was reached.
pub fn print_exhausted(attempts: u32) {
    emit(&format!(
        "{} {} Out of restart attempts; tried {} times",
        timestamp().dimmed(),
        "[EXHAUSTED]".red().bold(),
        attempts
    ));
}

/// Print a fatal error.
pub fn print_error(message: &str) {
    emit(&format!("{} {}", "[ERROR]".red().bold(), message));
}
