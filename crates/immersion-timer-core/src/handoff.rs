//! Hand-off of a finished timer session to the activity log.
//!
//! The timer's job ends here: the host turns an [`ActivityDraft`] into
//! whatever record its logging backend wants, and only then clears the
//! timer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::{ActivityMetadata, TimerMode};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityDraft {
    pub mode: TimerMode,
    /// Seconds to log: the full target for a completed countdown, elapsed
    /// time otherwise.
    pub duration_secs: u64,
    /// When the timer was first started.
    pub started_at: DateTime<Utc>,
    /// Countdown ran to zero.
    pub completed: bool,
    pub activity: ActivityMetadata,
}

impl ActivityDraft {
    /// Whole minutes, rounded to nearest, minimum one for any non-empty
    /// session.
    pub fn duration_minutes(&self) -> u64 {
        if self.duration_secs == 0 {
            return 0;
        }
        (self.duration_secs.saturating_add(30) / 60).max(1)
    }

    /// `started_at` plus the logged duration, or `None` if that overflows.
    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        let secs = i64::try_from(self.duration_secs).ok()?;
        self.started_at
            .checked_add_signed(chrono::TimeDelta::try_seconds(secs)?)
    }
}
