//! Line-by-line inspection of child output.
//!
//! Each monitor tees one output stream of the child to the matching stream of
//! the supervisor and tests every line against the trigger set. The first
//! match cancels the attempt's restart token and ends the monitor.
//!
//! Once the child has exited the monitors drain what is left of the pipes.
//! A draining monitor only gives up after its stream has been silent for the
//! idle timeout, so a slow consumer of our own output never loses lines.

use std::fmt;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::trigger::TriggerSet;

/// Which child stream a monitor reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdout => f.write_str("stdout"),
            Self::Stderr => f.write_str("stderr"),
        }
    }
}

/// How a monitor ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorOutcome {
    /// A trigger fired on a line.
    Matched {
        stream: StreamKind,
        /// Description of the trigger that fired.
        trigger: String,
        /// The matching line, without its line ending.
        line: String,
    },
    /// The stream closed without any trigger firing.
    Finished,
    /// The monitor was told to stop before the stream closed.
    Stopped,
}

impl MonitorOutcome {
    #[must_use]
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Matched { .. })
    }
}

/// Tees one child stream and watches it for line triggers.
#[derive(Debug, Clone)]
pub struct StreamMonitor {
    kind: StreamKind,
    triggers: TriggerSet,
    match_lines: bool,
    restart: CancellationToken,
    stop: CancellationToken,
    drain: CancellationToken,
    idle_timeout: Duration,
}

impl StreamMonitor {
    /// Create a monitor.
    ///
    /// `restart` is cancelled when a trigger fires; `stop` ends the monitor
    /// early without reporting a match.
    #[must_use]
    pub fn new(
        kind: StreamKind,
        triggers: TriggerSet,
        restart: CancellationToken,
        stop: CancellationToken,
    ) -> Self {
        Self {
            kind,
            match_lines: triggers.has_line_triggers(),
            triggers,
            restart,
            stop,
            drain: CancellationToken::new(),
            idle_timeout: Duration::ZERO,
        }
    }

    /// Give up on the stream once `drain` is cancelled and no data has
    /// arrived for `idle_timeout`.
    #[must_use]
    pub fn with_drain(mut self, drain: CancellationToken, idle_timeout: Duration) -> Self {
        self.drain = drain;
        self.idle_timeout = idle_timeout;
        self
    }

    /// Read `reader` to the end, forwarding every line to `sink`.
    ///
    /// Returns on the first matching line, at end of stream, or when stopped,
    /// whichever comes first. Nothing is read or written afterwards.
    ///
    /// The idle timeout only runs while waiting for data. Time spent writing
    /// to a slow `sink` never counts against it.
    pub async fn watch<R, W>(&self, reader: R, mut sink: W) -> MonitorOutcome
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        let mut forwarding = true;

        loop {
            buf.clear();
            let read = tokio::select! {
                biased;

                () = self.stop.cancelled() => {
                    tracing::trace!(stream = %self.kind, "Monitor stopped");
                    return MonitorOutcome::Stopped;
                }
                read = reader.read_until(b'\n', &mut buf) => read,
                () = self.idle() => {
                    tracing::debug!(
                        stream = %self.kind,
                        timeout = ?self.idle_timeout,
                        "Stream idle after exit, stopping monitor"
                    );
                    // An unterminated line read so far is still shown and checked.
                    if buf.is_empty() {
                        return MonitorOutcome::Stopped;
                    }
                    return self
                        .inspect(&buf, &mut sink, &mut forwarding)
                        .await
                        .unwrap_or(MonitorOutcome::Stopped);
                }
            };

            match read {
                Ok(0) => {
                    tracing::trace!(stream = %self.kind, "Stream closed");
                    return MonitorOutcome::Finished;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(stream = %self.kind, error = %e, "Failed to read child output");
                    return MonitorOutcome::Finished;
                }
            }

            if let Some(outcome) = self.inspect(&buf, &mut sink, &mut forwarding).await {
                return outcome;
            }
        }
    }

    /// Forward one line and test it against the triggers.
    async fn inspect<W>(
        &self,
        buf: &[u8],
        sink: &mut W,
        forwarding: &mut bool,
    ) -> Option<MonitorOutcome>
    where
        W: AsyncWrite + Unpin,
    {
        if *forwarding {
            if let Err(e) = forward(sink, buf).await {
                // Keep matching even if nobody is listening any more.
                tracing::debug!(stream = %self.kind, error = %e, "Stopped forwarding output");
                *forwarding = false;
            }
        }

        // Exit code triggers alone never need the line decoded.
        if !self.match_lines {
            return None;
        }

        let line = String::from_utf8_lossy(strip_line_ending(buf));
        let trigger = self.triggers.match_line(&line)?;
        tracing::info!(
            stream = %self.kind,
            trigger = %trigger,
            line = %line,
            "Restart trigger matched"
        );
        self.restart.cancel();
        Some(MonitorOutcome::Matched {
            stream: self.kind,
            trigger: trigger.to_string(),
            line: line.into_owned(),
        })
    }

    /// Completes once draining has begun and the current read has waited
    /// `idle_timeout` without a full line.
    async fn idle(&self) {
        self.drain.cancelled().await;
        tokio::time::sleep(self.idle_timeout).await;
    }

    /// Run [`watch`](Self::watch) on its own task.
    pub fn spawn<R, W>(self, reader: R, sink: W) -> JoinHandle<MonitorOutcome>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        tokio::spawn(async move { self.watch(reader, sink).await })
    }
}

async fn forward<W: AsyncWrite + Unpin>(sink: &mut W, bytes: &[u8]) -> std::io::Result<()> {
    sink.write_all(bytes).await?;
    sink.flush().await
}

fn strip_line_ending(buf: &[u8]) -> &[u8] {
    let buf = buf.strip_suffix(b"\n").unwrap_or(buf);
    buf.strip_suffix(b"\r").unwrap_or(buf)
}

/// The stdout and stderr monitors of one attempt.
///
/// Dropping the pair stops both monitors, so none outlive their attempt.
#[derive(Debug)]
pub struct MonitorPair {
    stdout: JoinHandle<MonitorOutcome>,
    stderr: JoinHandle<MonitorOutcome>,
    stop: CancellationToken,
    drain: CancellationToken,
    guard: DropGuard,
}

impl MonitorPair {
    /// Start monitors for both child streams, teeing to this process's
    /// stdout and stderr.
    ///
    /// `idle_timeout` bounds how long a monitor waits for more data once
    /// [`drain`](Self::drain) has been called.
    pub fn start<O, E>(
        stdout: O,
        stderr: E,
        triggers: &TriggerSet,
        restart: &CancellationToken,
        idle_timeout: Duration,
    ) -> Self
    where
        O: AsyncRead + Unpin + Send + 'static,
        E: AsyncRead + Unpin + Send + 'static,
    {
        let stop = CancellationToken::new();
        let drain = CancellationToken::new();
        let monitor = |kind| {
            StreamMonitor::new(kind, triggers.clone(), restart.clone(), stop.clone())
                .with_drain(drain.clone(), idle_timeout)
        };

        let stdout = monitor(StreamKind::Stdout).spawn(stdout, tokio::io::stdout());
        let stderr = monitor(StreamKind::Stderr).spawn(stderr, tokio::io::stderr());

        Self {
            stdout,
            stderr,
            guard: stop.clone().drop_guard(),
            stop,
            drain,
        }
    }

    /// Stop both monitors and wait for them to finish.
    ///
    /// # Errors
    ///
    /// Returns the `JoinError` of a monitor task that panicked.
    pub async fn shutdown(self) -> Result<[MonitorOutcome; 2], JoinError> {
        self.stop.cancel();
        self.join().await
    }

    /// Let both monitors consume what is left of their streams.
    ///
    /// A monitor keeps going for as long as data keeps arriving, however slow
    /// its sink is. It is stopped once its stream has been idle for the
    /// timeout given to [`start`](Self::start).
    ///
    /// # Errors
    ///
    /// Returns the `JoinError` of a monitor task that panicked.
    pub async fn drain(self) -> Result<[MonitorOutcome; 2], JoinError> {
        self.drain.cancel();
        self.join().await
    }

    async fn join(self) -> Result<[MonitorOutcome; 2], JoinError> {
        let Self {
            stdout,
            stderr,
            guard,
            ..
        } = self;
        let (out, err) = tokio::join!(stdout, stderr);
        drop(guard);
        Ok([out?, err?])
    }
}
