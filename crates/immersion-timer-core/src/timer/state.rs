//! The canonical timer record.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerStatus {
    Idle,
    Running,
    Paused,
    Completed,
}

impl fmt::Display for TimerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TimerStatus::Idle => "idle",
            TimerStatus::Running => "running",
            TimerStatus::Paused => "paused",
            TimerStatus::Completed => "completed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerMode {
    /// Counts up without bound.
    Stopwatch,
    /// Counts down from the initial duration to zero.
    Countdown,
}

impl fmt::Display for TimerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimerMode::Stopwatch => f.write_str("stopwatch"),
            TimerMode::Countdown => f.write_str("countdown"),
        }
    }
}

impl std::str::FromStr for TimerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stopwatch" => Ok(TimerMode::Stopwatch),
            "countdown" => Ok(TimerMode::Countdown),
            other => Err(format!("unknown timer mode: {other}")),
        }
    }
}

/// What the timer is being used for. Carried alongside the clock state but
/// never consulted by the time arithmetic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityMetadata {
    #[serde(default)]
    pub activity_name: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub custom_title: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub language: String,
}

impl ActivityMetadata {
    /// Human-readable label for notifications: custom title, then activity
    /// name, then a generic fallback.
    pub fn label(&self) -> &str {
        self.custom_title
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .or_else(|| self.activity_name.as_deref().filter(|s| !s.trim().is_empty()))
            .unwrap_or("your activity")
    }
}

/// Defaults supplied by the host screen when it constructs a timer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerDefaults {
    pub mode: TimerMode,
    pub duration_secs: u64,
    pub language: String,
}

impl Default for TimerDefaults {
    fn default() -> Self {
        Self {
            mode: TimerMode::Stopwatch,
            duration_secs: 30 * 60,
            language: String::new(),
        }
    }
}

/// One timer instance.
///
/// `start_time` is the anchor of the current running segment and is `Some`
/// exactly when `status` is `Running`. Time from finished segments is banked
/// in `accumulated_ms`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    pub status: TimerStatus,
    pub mode: TimerMode,
    /// Epoch milliseconds.
    #[serde(default)]
    pub start_time: Option<u64>,
    #[serde(default)]
    pub accumulated_ms: u64,
    pub initial_duration_secs: u64,
    /// Set on the first start, cleared only by reset/clear/mode change.
    #[serde(default)]
    pub captured_date_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: ActivityMetadata,
}

impl TimerState {
    pub fn idle(defaults: &TimerDefaults) -> Self {
        Self {
            status: TimerStatus::Idle,
            mode: defaults.mode,
            start_time: None,
            accumulated_ms: 0,
            initial_duration_secs: defaults.duration_secs,
            captured_date_time: None,
            metadata: ActivityMetadata {
                language: defaults.language.clone(),
                ..ActivityMetadata::default()
            },
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == TimerStatus::Running
    }

    pub fn accumulated_seconds(&self) -> u64 {
        self.accumulated_ms / 1000
    }

    pub fn initial_duration_ms(&self) -> u64 {
        self.initial_duration_secs.saturating_mul(1000)
    }

    /// Length of the current running segment, clamped at zero when the clock
    /// has moved backwards past the anchor.
    pub fn running_delta_ms(&self, now_ms: u64) -> u64 {
        match (self.status, self.start_time) {
            (TimerStatus::Running, Some(start)) => now_ms.saturating_sub(start),
            _ => 0,
        }
    }

    pub fn total_elapsed_ms(&self, now_ms: u64) -> u64 {
        self.accumulated_ms
            .saturating_add(self.running_delta_ms(now_ms))
    }

    /// True when the record carries nothing worth keeping on disk.
    pub fn is_empty(&self) -> bool {
        self.status == TimerStatus::Idle && self.accumulated_ms == 0
    }

    /// Repair a record that breaks the anchor invariant or carries a zero
    /// countdown length, typically one that was edited by hand or written
    /// by an older build. A zero length is replaced by the default.
    ///
    /// Returns true if anything changed.
    pub fn normalize(&mut self, defaults: &TimerDefaults) -> bool {
        let mut changed = false;
        if self.initial_duration_secs == 0 {
            self.initial_duration_secs = defaults.duration_secs;
            changed = true;
        }
        let anchor_fixed = match (self.status, self.start_time) {
            (TimerStatus::Running, None) => {
                self.status = TimerStatus::Paused;
                true
            }
            (TimerStatus::Running, Some(_)) => false,
            (_, Some(_)) => {
                self.start_time = None;
                true
            }
            (_, None) => false,
        };
        changed || anchor_fixed
    }
}
