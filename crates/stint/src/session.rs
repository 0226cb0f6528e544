//! Timing session model
//!
//! A session is either a countdown timer or an open-ended counter. Both
//! move between running and paused; a timer additionally finishes once its
//! elapsed time reaches the target, and stays finished.

use chrono::{Local, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use stint_core::format::elapsed_serde;
use thiserror::Error;
use tracing::debug;

/// Store key used for sessions started without a name
pub const DEFAULT_NAME: &str = "default";

/// Timestamp layout used in the session file
pub const STAMP_FORMAT: &str = "%Y-%m-%d:%H-%M-%S";

/// Resolve a session name to its store key (empty means "default")
pub fn resolve_name(name: &str) -> &str {
    if name.is_empty() {
        DEFAULT_NAME
    } else {
        name
    }
}

/// How a session measures time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Counts down toward zero and finishes
    Timer,
    /// Counts up indefinitely
    #[default]
    Counter,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Timer => "timer",
            Mode::Counter => "counter",
        }
    }
}

/// Where a session is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Running,
    Paused,
    Finished,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Running => "running",
            SessionState::Paused => "paused",
            SessionState::Finished => "finished",
        }
    }
}

/// Rejected state transitions
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionError {
    #[error("session has already finished")]
    Finished,
}

/// A named timing session, as tracked in memory and persisted in the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Session {
    /// When tracking began
    #[serde(with = "stamp")]
    pub start: NaiveDateTime,
    /// Last recorded instant
    #[serde(with = "stamp")]
    pub current: NaiveDateTime,
    /// Accumulated tracked time
    #[serde(with = "elapsed_serde")]
    pub elapsed: Duration,
    /// Countdown length (timers only)
    #[serde(with = "elapsed_serde")]
    pub target: Duration,
    pub paused: bool,
    pub mode: Mode,
    pub name: String,
    pub finished: bool,
    /// Render on a single line instead of full screen
    pub inline: bool,
    /// Fields written by other versions, kept as-is
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Default for Session {
    fn default() -> Self {
        let now = now();
        Self {
            start: now,
            current: now,
            elapsed: Duration::ZERO,
            target: Duration::ZERO,
            paused: false,
            mode: Mode::default(),
            name: String::new(),
            finished: false,
            inline: false,
            extra: serde_json::Map::new(),
        }
    }
}

impl Session {
    /// Create a countdown session
    pub fn timer(name: impl Into<String>, target: Duration) -> Self {
        Self {
            name: name.into(),
            mode: Mode::Timer,
            target,
            ..Self::default()
        }
    }

    /// Create a count-up session
    pub fn counter(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mode: Mode::Counter,
            ..Self::default()
        }
    }

    /// Store key for this session
    pub fn key(&self) -> &str {
        resolve_name(&self.name)
    }

    pub fn state(&self) -> SessionState {
        if self.finished {
            SessionState::Finished
        } else if self.paused {
            SessionState::Paused
        } else {
            SessionState::Running
        }
    }

    fn ensure_live(&self) -> Result<(), TransitionError> {
        if self.finished {
            Err(TransitionError::Finished)
        } else {
            Ok(())
        }
    }

    pub fn pause(&mut self) -> Result<(), TransitionError> {
        self.ensure_live()?;
        self.paused = true;
        self.current = now();
        debug!(session = self.key(), "paused");
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), TransitionError> {
        self.ensure_live()?;
        self.paused = false;
        self.current = now();
        debug!(session = self.key(), "resumed");
        Ok(())
    }

    /// Flip between running and paused, returning the new state
    pub fn toggle_pause(&mut self) -> Result<SessionState, TransitionError> {
        if self.paused {
            self.resume()?;
        } else {
            self.pause()?;
        }
        Ok(self.state())
    }

    /// Add `delta` of tracked time.
    ///
    /// Does nothing while paused or finished. A timer is clamped to its
    /// target and finishes when it gets there. Returns whether elapsed
    /// time changed.
    pub fn advance(&mut self, delta: Duration) -> bool {
        if self.paused || self.finished || delta.is_zero() {
            return false;
        }

        self.current = now();
        match self.mode {
            Mode::Counter => {
                self.elapsed = self.elapsed.saturating_add(delta);
            }
            Mode::Timer => {
                // the clamp never takes back time already on record
                let ceiling = self.target.max(self.elapsed);
                self.elapsed = self.elapsed.saturating_add(delta).min(ceiling);
                if self.elapsed >= self.target {
                    self.finished = true;
                    debug!(session = self.key(), "timer finished");
                }
            }
        }
        true
    }

    /// Start a new run: zero elapsed time and clear paused/finished
    pub fn reset(&mut self) {
        let now = now();
        self.elapsed = Duration::ZERO;
        self.paused = false;
        self.finished = false;
        self.start = now;
        self.current = now;
        debug!(session = self.key(), "reset");
    }

    /// Bring a decoded record back in line with the session invariants.
    ///
    /// Counters never finish and have no target. A timer written without a
    /// target (older records) cannot count down any further, so it is
    /// treated as finished at its stored elapsed time.
    pub fn normalize(&mut self) {
        match self.mode {
            Mode::Counter => {
                if self.finished {
                    debug!(session = self.key(), "clearing finished flag on counter");
                }
                self.finished = false;
                self.target = Duration::ZERO;
            }
            Mode::Timer if self.target.is_zero() => {
                debug!(session = self.key(), elapsed = ?self.elapsed, "timer has no target");
                self.target = self.elapsed;
                self.finished = true;
            }
            Mode::Timer => {
                if self.elapsed >= self.target {
                    self.finished = true;
                }
            }
        }
    }

    /// Carry over elapsed time from a stored run of the same session.
    ///
    /// Only an unfinished session of the same mode is picked up, and for
    /// timers only while it is still short of this session's target.
    pub fn restore_from(&mut self, stored: &Session) -> bool {
        if stored.mode != self.mode || stored.finished {
            return false;
        }
        if self.mode == Mode::Timer && stored.elapsed >= self.target {
            return false;
        }

        self.elapsed = stored.elapsed;
        self.start = stored.start;
        self.extra = stored.extra.clone();
        debug!(session = self.key(), elapsed = ?self.elapsed, "restored");
        true
    }

    /// Time left on a timer; `None` for counters
    pub fn remaining(&self) -> Option<Duration> {
        match self.mode {
            Mode::Timer => Some(self.target.saturating_sub(self.elapsed)),
            Mode::Counter => None,
        }
    }

    /// Whether an unfinished timer is within `threshold` of its end
    pub fn is_ending_soon(&self, threshold: Duration) -> bool {
        !self.finished && self.remaining().is_some_and(|left| left < threshold)
    }

    /// The time a display shows: remaining for timers, elapsed for counters
    pub fn display_elapsed(&self) -> Duration {
        self.remaining().unwrap_or(self.elapsed)
    }
}

/// Local time truncated to whole seconds, matching the stored precision
fn now() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

/// Serde adapter for `YYYY-MM-DD:HH-MM-SS` stamps.
///
/// An unreadable stamp decodes to the Unix epoch rather than failing the
/// record.
mod stamp {
    use super::STAMP_FORMAT;
    use chrono::NaiveDateTime;
    use serde::{de::IgnoredAny, Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Lenient {
        Text(String),
        Other(IgnoredAny),
    }

    pub fn serialize<S: Serializer>(stamp: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&stamp.format(STAMP_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let parsed = match Lenient::deserialize(deserializer)? {
            Lenient::Text(s) => NaiveDateTime::parse_from_str(&s, STAMP_FORMAT).ok(),
            Lenient::Other(_) => None,
        };
        Ok(parsed.unwrap_or_default())
    }
}
