use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::{ActivityMetadata, RecordSource, TimerMode, TimerStatus};

/// Every state change of the timer produces an Event.
/// The render loop and the completion notifier subscribe to them; the CLI
/// prints them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// First start from idle; `captured_at` is the stamped start of the
    /// activity.
    TimerStarted {
        mode: TimerMode,
        initial_duration_secs: u64,
        captured_at: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    /// Start from paused or completed.
    TimerResumed {
        accumulated_ms: u64,
        at: DateTime<Utc>,
    },
    TimerPaused {
        accumulated_ms: u64,
        at: DateTime<Utc>,
    },
    /// Countdown reached zero while running. Published once per transition.
    TimerCompleted {
        initial_duration_secs: u64,
        activity: ActivityMetadata,
        at: DateTime<Utc>,
    },
    TimerReset {
        at: DateTime<Utc>,
    },
    /// Reset plus restoration of the caller-supplied defaults.
    TimerCleared {
        at: DateTime<Utc>,
    },
    ModeChanged {
        mode: TimerMode,
        at: DateTime<Utc>,
    },
    DurationChanged {
        initial_duration_secs: u64,
        at: DateTime<Utc>,
    },
    MetadataChanged {
        activity: ActivityMetadata,
        at: DateTime<Utc>,
    },
    /// How the state was obtained at construction, published once a host
    /// has subscribed. `recovered_ms` is the time re-anchoring folded in.
    StateRecovered {
        source: RecordSource,
        status: TimerStatus,
        recovered_ms: u64,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        status: TimerStatus,
        mode: TimerMode,
        display_seconds: u64,
        elapsed_ms: u64,
        remaining_ms: Option<u64>,
        initial_duration_secs: u64,
        progress_pct: Option<f64>,
        captured_at: Option<DateTime<Utc>>,
        activity: ActivityMetadata,
        persistence_degraded: bool,
        at: DateTime<Utc>,
    },
}
