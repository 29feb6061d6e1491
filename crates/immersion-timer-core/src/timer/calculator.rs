//! Elapsed-time arithmetic.
//!
//! [`compute`] is a pure function of `(state, now)`: it never mutates the
//! state, and calling it twice with the same inputs yields the same reading.

use serde::{Deserialize, Serialize};

use super::state::{TimerMode, TimerState, TimerStatus};

/// What the host should show for a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reading {
    /// Seconds on the clock face: elapsed for a stopwatch, remaining for a
    /// countdown.
    pub display_seconds: u64,
    pub elapsed_ms: u64,
    /// `None` in stopwatch mode.
    pub remaining_ms: Option<u64>,
    /// The countdown reached zero while still marked running. The state
    /// machine turns this into the `completed` transition.
    pub just_completed: bool,
    /// The countdown is at zero, whether or not the transition has happened.
    pub is_complete: bool,
}

impl Reading {
    /// Fraction of the countdown consumed, for progress rings.
    pub fn progress(&self) -> Option<f64> {
        let remaining = self.remaining_ms?;
        // Once elapsed overshoots the duration, remaining is 0 and this is 1.0.
        let total = self.elapsed_ms.saturating_add(remaining);
        if total == 0 {
            return Some(0.0);
        }
        Some((self.elapsed_ms as f64 / total as f64).clamp(0.0, 1.0))
    }
}

pub fn compute(state: &TimerState, now_ms: u64) -> Reading {
    let elapsed_ms = state.total_elapsed_ms(now_ms);
    match state.mode {
        TimerMode::Stopwatch => Reading {
            display_seconds: elapsed_ms / 1000,
            elapsed_ms,
            remaining_ms: None,
            just_completed: false,
            is_complete: false,
        },
        TimerMode::Countdown => {
            let remaining_ms = state.initial_duration_ms().saturating_sub(elapsed_ms);
            let is_complete = remaining_ms == 0;
            Reading {
                // Round up so the face only shows 0 once the countdown is done.
                display_seconds: remaining_ms.div_ceil(1000),
                elapsed_ms,
                remaining_ms: Some(remaining_ms),
                just_completed: is_complete && state.status == TimerStatus::Running,
                is_complete,
            }
        }
    }
}

/// Format seconds as `MM:SS`, or `H:MM:SS` past the hour.
pub fn format_clock(seconds: u64) -> String {
    let h = seconds / 3600;
    let m = (seconds % 3600) / 60;
    let s = seconds % 60;
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m:02}:{s:02}")
    }
}
