//! Configuration management for stint
//!
//! The config file is read once at startup into an immutable [`Config`].
//! Values are checked in groups: when any member of a group is out of
//! range the whole group falls back to its defaults, and the other groups
//! keep what the file said.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::format::{format_duration, parse_duration};

/// Allowed range for each refresh interval
pub const TICK_RANGE: RangeInclusive<Duration> =
    Duration::from_millis(10)..=Duration::from_secs(5);

/// Allowed range for the "ending soon" warning threshold
pub const WARNING_RANGE: RangeInclusive<Duration> =
    Duration::from_secs(30)..=Duration::from_secs(3600);

const GLYPH_SIDE_RANGE: RangeInclusive<i64> = 1..=32;
const GLYPH_SPACING_RANGE: RangeInclusive<i64> = 0..=8;
/// Must fit one X10 mouse report (6 bytes)
const KEY_BUFFER_RANGE: RangeInclusive<i64> = 6..=256;
const TERM_SIDE_RANGE: RangeInclusive<i64> = 1..=1000;

/// Display refresh intervals, fastest first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickIntervals {
    pub fast: Duration,
    pub medium: Duration,
    pub slow: Duration,
}

impl Default for TickIntervals {
    fn default() -> Self {
        Self {
            fast: Duration::from_millis(100),
            medium: Duration::from_millis(500),
            slow: Duration::from_secs(1),
        }
    }
}

/// Geometry of one rendered digit glyph, in cells
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Glyph {
    pub width: u16,
    pub height: u16,
    pub spacing: u16,
}

impl Default for Glyph {
    fn default() -> Self {
        Self {
            width: 8,
            height: 7,
            spacing: 1,
        }
    }
}

/// Terminal size used when the real size cannot be queried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TermSize {
    pub width: u16,
    pub height: u16,
}

impl Default for TermSize {
    fn default() -> Self {
        Self {
            width: 80,
            height: 24,
        }
    }
}

/// Validated stint configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub ticks: TickIntervals,
    /// Remaining time below which a countdown is flagged as ending soon
    pub warning_threshold: Duration,
    pub glyph: Glyph,
    /// Size of a single raw input read
    pub key_buffer_size: usize,
    pub term: TermSize,
    /// Resume a stored session's elapsed time instead of starting fresh
    pub restore: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ticks: TickIntervals::default(),
            warning_threshold: Duration::from_secs(5 * 60),
            glyph: Glyph::default(),
            key_buffer_size: 10,
            term: TermSize::default(),
            restore: false,
        }
    }
}

/// A duration as written in the config file: integer nanoseconds or a
/// human string like `"200ms"`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawDuration {
    Nanos(i64),
    Text(String),
}

impl RawDuration {
    pub fn to_duration(&self) -> Option<Duration> {
        match self {
            RawDuration::Nanos(n) => u64::try_from(*n).ok().map(Duration::from_nanos),
            RawDuration::Text(s) => parse_duration(s).ok(),
        }
    }
}

impl fmt::Display for RawDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawDuration::Nanos(n) => write!(f, "{}ns", n),
            RawDuration::Text(s) => write!(f, "{:?}", s),
        }
    }
}

/// The config file exactly as written, before validation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tick_interval_fast: Option<RawDuration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tick_interval_medium: Option<RawDuration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tick_interval_slow: Option<RawDuration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning_threshold: Option<RawDuration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub glyph_width: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub glyph_height: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub glyph_spacing: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_buffer_size: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_term_width: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_term_height: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restore: Option<bool>,
}

impl From<&Config> for RawConfig {
    fn from(config: &Config) -> Self {
        let text = |d: Duration| Some(RawDuration::Text(format_duration(d)));
        Self {
            tick_interval_fast: text(config.ticks.fast),
            tick_interval_medium: text(config.ticks.medium),
            tick_interval_slow: text(config.ticks.slow),
            warning_threshold: text(config.warning_threshold),
            glyph_width: Some(config.glyph.width.into()),
            glyph_height: Some(config.glyph.height.into()),
            glyph_spacing: Some(config.glyph.spacing.into()),
            key_buffer_size: i64::try_from(config.key_buffer_size).ok(),
            default_term_width: Some(config.term.width.into()),
            default_term_height: Some(config.term.height.into()),
            restore: Some(config.restore),
        }
    }
}

/// Groups of settings that are validated and defaulted together
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigGroup {
    TickIntervals,
    WarningThreshold,
    Glyph,
    KeyBuffer,
    TermSize,
}

impl ConfigGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigGroup::TickIntervals => "tick intervals",
            ConfigGroup::WarningThreshold => "warning threshold",
            ConfigGroup::Glyph => "glyph geometry",
            ConfigGroup::KeyBuffer => "key buffer size",
            ConfigGroup::TermSize => "default terminal size",
        }
    }
}

impl fmt::Display for ConfigGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A group that was rejected and reset to defaults
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{group}: {reason}")]
pub struct ConfigIssue {
    pub group: ConfigGroup,
    pub reason: String,
}

impl Config {
    /// Load config from file.
    ///
    /// Never fails: a missing file gives the defaults, an unreadable or
    /// malformed one is logged and also gives the defaults.
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no config at {}, using defaults", path.display());
                return Self::default();
            }
            Err(e) => {
                warn!("could not read config {}: {}; using defaults", path.display(), e);
                return Self::default();
            }
        };

        let raw: RawConfig = match serde_json::from_str(&content) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("invalid config format in {}: {}; using defaults", path.display(), e);
                return Self::default();
            }
        };

        let (config, issues) = Self::validate(&raw);
        for issue in &issues {
            warn!(group = issue.group.as_str(), "{}; using defaults", issue.reason);
        }
        config
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&RawConfig::from(self))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate a raw config group by group.
    ///
    /// Returns the resulting config and one issue per rejected group.
    pub fn validate(raw: &RawConfig) -> (Self, Vec<ConfigIssue>) {
        let defaults = Self::default();
        let mut issues = Vec::new();

        let ticks = accept(
            &mut issues,
            ConfigGroup::TickIntervals,
            tick_intervals(raw),
            defaults.ticks,
        );
        let warning_threshold = accept(
            &mut issues,
            ConfigGroup::WarningThreshold,
            warning_threshold(raw, defaults.warning_threshold),
            defaults.warning_threshold,
        );
        let glyph = accept(&mut issues, ConfigGroup::Glyph, glyph(raw), defaults.glyph);
        let key_buffer_size = accept(
            &mut issues,
            ConfigGroup::KeyBuffer,
            int_in(raw.key_buffer_size, defaults.key_buffer_size as i64, KEY_BUFFER_RANGE, "size")
                .map(|n| n as usize),
            defaults.key_buffer_size,
        );
        let term = accept(&mut issues, ConfigGroup::TermSize, term_size(raw), defaults.term);

        let config = Self {
            ticks,
            warning_threshold,
            glyph,
            key_buffer_size,
            term,
            restore: raw.restore.unwrap_or(defaults.restore),
        };
        (config, issues)
    }
}

fn accept<T>(issues: &mut Vec<ConfigIssue>, group: ConfigGroup, result: Result<T, String>, default: T) -> T {
    match result {
        Ok(value) => value,
        Err(reason) => {
            issues.push(ConfigIssue { group, reason });
            default
        }
    }
}

fn duration_or(raw: Option<&RawDuration>, default: Duration) -> Result<Duration, String> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .to_duration()
            .ok_or_else(|| format!("unparsable duration {}", value)),
    }
}

fn int_in(raw: Option<i64>, default: i64, range: RangeInclusive<i64>, label: &str) -> Result<i64, String> {
    let value = raw.unwrap_or(default);
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(format!(
            "{} {} outside {}..={}",
            label,
            value,
            range.start(),
            range.end()
        ))
    }
}

fn tick_intervals(raw: &RawConfig) -> Result<TickIntervals, String> {
    let defaults = TickIntervals::default();
    let ticks = TickIntervals {
        fast: duration_or(raw.tick_interval_fast.as_ref(), defaults.fast)?,
        medium: duration_or(raw.tick_interval_medium.as_ref(), defaults.medium)?,
        slow: duration_or(raw.tick_interval_slow.as_ref(), defaults.slow)?,
    };

    for (label, value) in [("fast", ticks.fast), ("medium", ticks.medium), ("slow", ticks.slow)] {
        if !TICK_RANGE.contains(&value) {
            return Err(format!(
                "{} interval {:?} outside {:?}..={:?}",
                label,
                value,
                TICK_RANGE.start(),
                TICK_RANGE.end()
            ));
        }
    }

    if !(ticks.fast < ticks.medium && ticks.medium < ticks.slow) {
        return Err(format!(
            "intervals must satisfy fast < medium < slow (got {:?}, {:?}, {:?})",
            ticks.fast, ticks.medium, ticks.slow
        ));
    }

    Ok(ticks)
}

fn warning_threshold(raw: &RawConfig, default: Duration) -> Result<Duration, String> {
    let value = duration_or(raw.warning_threshold.as_ref(), default)?;
    if WARNING_RANGE.contains(&value) {
        Ok(value)
    } else {
        Err(format!(
            "threshold {:?} outside {:?}..={:?}",
            value,
            WARNING_RANGE.start(),
            WARNING_RANGE.end()
        ))
    }
}

fn glyph(raw: &RawConfig) -> Result<Glyph, String> {
    let defaults = Glyph::default();
    Ok(Glyph {
        width: int_in(raw.glyph_width, defaults.width.into(), GLYPH_SIDE_RANGE, "width")? as u16,
        height: int_in(raw.glyph_height, defaults.height.into(), GLYPH_SIDE_RANGE, "height")? as u16,
        spacing: int_in(raw.glyph_spacing, defaults.spacing.into(), GLYPH_SPACING_RANGE, "spacing")? as u16,
    })
}

fn term_size(raw: &RawConfig) -> Result<TermSize, String> {
    let defaults = TermSize::default();
    Ok(TermSize {
        width: int_in(raw.default_term_width, defaults.width.into(), TERM_SIDE_RANGE, "width")? as u16,
        height: int_in(raw.default_term_height, defaults.height.into(), TERM_SIDE_RANGE, "height")? as u16,
    })
}
