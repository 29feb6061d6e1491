//! Timer state machine.
//!
//! The machine is wall-clock based: it never runs a thread or a timer of its
//! own. Elapsed time is derived from `accumulated_ms` and the anchor of the
//! current segment, so the caller only has to call `tick()` often enough to
//! notice countdown completion.
//!
//! ## State Transitions
//!
//! ```text
//! Idle --start--> Running --pause--> Paused --start--> Running
//! Running --tick (countdown hits 0)--> Completed
//! * --reset/clear--> Idle
//! ```
//!
//! Every transition is computed on a copy of the state and committed with a
//! single assignment, then checkpointed and published. A subscriber never
//! observes a half-applied update.

use tokio::sync::broadcast;
use tracing::debug;

use super::calculator::{compute, Reading};
use super::persistence::{PersistenceGateway, RecordSource};
use super::state::{ActivityMetadata, TimerDefaults, TimerMode, TimerState, TimerStatus};
use crate::clock::{to_datetime, Clock, SystemClock};
use crate::error::TimerError;
use crate::events::Event;
use crate::handoff::ActivityDraft;
use crate::storage::StateStore;

const EVENT_CAPACITY: usize = 64;

pub struct TimerStateMachine<S, C = SystemClock> {
    state: TimerState,
    defaults: TimerDefaults,
    gateway: PersistenceGateway<S>,
    clock: C,
    events: broadcast::Sender<Event>,
    recovered_from: RecordSource,
    recovered_ms: u64,
}

impl<S: StateStore, C: Clock> TimerStateMachine<S, C> {
    /// Build a machine and recover whatever the gateway holds.
    ///
    /// A running record is re-anchored at the current instant and written
    /// back; a corrupt one is replaced by the defaults.
    ///
    /// # Errors
    /// Rejects defaults with a zero countdown length.
    pub fn new(
        gateway: PersistenceGateway<S>,
        clock: C,
        defaults: TimerDefaults,
    ) -> Result<Self, TimerError> {
        if defaults.duration_secs == 0 {
            return Err(TimerError::InvalidDuration {
                input: defaults.duration_secs.to_string(),
            });
        }
        let now = clock.now_ms();
        let recovered = gateway.load(now, &defaults);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let mut machine = Self {
            state: recovered.state,
            defaults,
            gateway,
            clock,
            events,
            recovered_from: recovered.source,
            recovered_ms: recovered.recovered_ms,
        };
        machine.gateway.save(&machine.state);
        debug!(
            source = ?machine.recovered_from,
            status = %machine.state.status,
            recovered_ms = machine.recovered_ms,
            "timer state loaded"
        );
        Ok(machine)
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> &TimerState {
        &self.state
    }

    pub fn status(&self) -> TimerStatus {
        self.state.status
    }

    pub fn defaults(&self) -> &TimerDefaults {
        &self.defaults
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn gateway(&self) -> &PersistenceGateway<S> {
        &self.gateway
    }

    pub fn is_persistence_degraded(&self) -> bool {
        self.gateway.is_degraded()
    }

    /// How the state was obtained at construction.
    pub fn recovered_from(&self) -> RecordSource {
        self.recovered_from
    }

    /// Milliseconds banked by re-anchoring at construction.
    pub fn recovered_ms(&self) -> u64 {
        self.recovered_ms
    }

    /// Receive every event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Current reading. Pure: does not complete an overdue countdown.
    pub fn reading(&self) -> Reading {
        compute(&self.state, self.clock.now_ms())
    }

    /// Publish how the state was recovered at construction. Hosts call this
    /// after subscribing, since nothing can be listening inside `new`.
    pub fn announce_recovery(&self) -> Event {
        let event = Event::StateRecovered {
            source: self.recovered_from,
            status: self.state.status,
            recovered_ms: self.recovered_ms,
            at: to_datetime(self.clock.now_ms()),
        };
        let _ = self.events.send(event.clone());
        event
    }

    /// Build a full state snapshot event.
    pub fn snapshot(&self) -> Event {
        let now = self.clock.now_ms();
        let reading = compute(&self.state, now);
        Event::StateSnapshot {
            status: self.state.status,
            mode: self.state.mode,
            display_seconds: reading.display_seconds,
            elapsed_ms: reading.elapsed_ms,
            remaining_ms: reading.remaining_ms,
            initial_duration_secs: self.state.initial_duration_secs,
            progress_pct: reading.progress().map(|p| p * 100.0),
            captured_at: self.state.captured_date_time,
            activity: self.state.metadata.clone(),
            persistence_degraded: self.gateway.is_degraded(),
            at: to_datetime(now),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start or resume. A no-op while already running.
    ///
    /// Starting a completed countdown is accepted; with no time left, the
    /// next `tick()` completes it again.
    pub fn start(&mut self) -> Option<Event> {
        let from = self.state.status;
        if from == TimerStatus::Running {
            return None;
        }
        let now = self.clock.now_ms();
        let mut next = self.state.clone();
        next.status = TimerStatus::Running;
        next.start_time = Some(now);
        let captured_at = *next.captured_date_time.get_or_insert_with(|| to_datetime(now));

        let event = if from == TimerStatus::Idle {
            Event::TimerStarted {
                mode: next.mode,
                initial_duration_secs: next.initial_duration_secs,
                captured_at,
                at: to_datetime(now),
            }
        } else {
            Event::TimerResumed {
                accumulated_ms: next.accumulated_ms,
                at: to_datetime(now),
            }
        };
        Some(self.commit(next, event))
    }

    /// Bank the running segment. A no-op unless running.
    ///
    /// An overdue countdown completes instead of pausing.
    pub fn pause(&mut self) -> Option<Event> {
        if let Some(completed) = self.settle() {
            return Some(completed);
        }
        if self.state.status != TimerStatus::Running {
            return None;
        }
        let now = self.clock.now_ms();
        let mut next = self.state.clone();
        next.accumulated_ms = next.total_elapsed_ms(now);
        next.start_time = None;
        next.status = TimerStatus::Paused;
        let event = Event::TimerPaused {
            accumulated_ms: next.accumulated_ms,
            at: to_datetime(now),
        };
        Some(self.commit(next, event))
    }

    /// Back to idle, discarding banked time and the captured start. Mode,
    /// duration and activity are kept.
    pub fn reset(&mut self) -> Option<Event> {
        let mut next = self.state.clone();
        next.status = TimerStatus::Idle;
        next.start_time = None;
        next.accumulated_ms = 0;
        next.captured_date_time = None;
        let event = Event::TimerReset {
            at: to_datetime(self.clock.now_ms()),
        };
        Some(self.commit(next, event))
    }

    /// Reset and restore the caller-supplied defaults.
    pub fn clear(&mut self) -> Option<Event> {
        let next = TimerState::idle(&self.defaults);
        let event = Event::TimerCleared {
            at: to_datetime(self.clock.now_ms()),
        };
        Some(self.commit(next, event))
    }

    /// Switch between stopwatch and countdown. Destructive: banked time is
    /// discarded and the timer returns to idle.
    ///
    /// # Errors
    /// Rejected while running.
    pub fn set_mode(&mut self, mode: TimerMode) -> Result<Option<Event>, TimerError> {
        self.settle();
        self.ensure_not_running("change mode")?;
        let mut next = self.state.clone();
        next.mode = mode;
        next.status = TimerStatus::Idle;
        next.start_time = None;
        next.accumulated_ms = 0;
        next.captured_date_time = None;
        let event = Event::ModeChanged {
            mode,
            at: to_datetime(self.clock.now_ms()),
        };
        Ok(Some(self.commit(next, event)))
    }

    /// Change the countdown target. The status is left as it is.
    ///
    /// # Errors
    /// Rejected while running, or when `minutes` is zero.
    pub fn set_duration(&mut self, minutes: u32) -> Result<Option<Event>, TimerError> {
        if minutes == 0 {
            return Err(TimerError::InvalidDuration {
                input: minutes.to_string(),
            });
        }
        self.settle();
        self.ensure_not_running("change duration")?;
        let secs = u64::from(minutes) * 60;
        if secs == self.state.initial_duration_secs {
            return Ok(None);
        }
        let mut next = self.state.clone();
        next.initial_duration_secs = secs;
        let event = Event::DurationChanged {
            initial_duration_secs: secs,
            at: to_datetime(self.clock.now_ms()),
        };
        Ok(Some(self.commit(next, event)))
    }

    /// Replace the activity association. Allowed in any state; time is not
    /// touched.
    pub fn set_metadata(&mut self, metadata: ActivityMetadata) -> Option<Event> {
        if metadata == self.state.metadata {
            return None;
        }
        let mut next = self.state.clone();
        next.metadata = metadata.clone();
        let event = Event::MetadataChanged {
            activity: metadata,
            at: to_datetime(self.clock.now_ms()),
        };
        Some(self.commit(next, event))
    }

    /// Call periodically. Returns `Some(Event::TimerCompleted)` on the tick
    /// at which a running countdown reaches zero, and `None` afterwards.
    pub fn tick(&mut self) -> Option<Event> {
        self.settle()
    }

    /// What the host needs to log the session, or `None` if the timer never
    /// started. The host records the draft and then calls [`clear`].
    ///
    /// [`clear`]: Self::clear
    pub fn hand_off(&mut self) -> Option<ActivityDraft> {
        self.settle();
        let started_at = self.state.captured_date_time?;
        let now = self.clock.now_ms();
        let completed = self.state.status == TimerStatus::Completed;
        let duration_secs = if completed && self.state.mode == TimerMode::Countdown {
            self.state.initial_duration_secs
        } else {
            self.state.total_elapsed_ms(now) / 1000
        };
        Some(ActivityDraft {
            mode: self.state.mode,
            duration_secs,
            started_at,
            completed,
            activity: self.state.metadata.clone(),
        })
    }

    // ── Internal ─────────────────────────────────────────────────────

    /// Complete a running countdown whose remaining time has reached zero.
    fn settle(&mut self) -> Option<Event> {
        let now = self.clock.now_ms();
        if !compute(&self.state, now).just_completed {
            return None;
        }
        let mut next = self.state.clone();
        next.status = TimerStatus::Completed;
        next.start_time = None;
        // Logged duration is frozen at the target, not at the tick time.
        next.accumulated_ms = next.initial_duration_ms();
        let event = Event::TimerCompleted {
            initial_duration_secs: next.initial_duration_secs,
            activity: next.metadata.clone(),
            at: to_datetime(now),
        };
        Some(self.commit(next, event))
    }

    fn ensure_not_running(&self, operation: &'static str) -> Result<(), TimerError> {
        if self.state.status == TimerStatus::Running {
            return Err(TimerError::NotAllowed {
                operation,
                status: self.state.status,
            });
        }
        Ok(())
    }

    fn commit(&mut self, next: TimerState, event: Event) -> Event {
        debug!(from = %self.state.status, to = %next.status, "timer transition");
        self.state = next;
        self.gateway.save(&self.state);
        // No subscribers is fine.
        let _ = self.events.send(event.clone());
        event
    }
}

/// Parse user input for a countdown length in minutes.
///
/// # Errors
/// Rejects zero, negative, fractional and non-numeric input.
pub fn parse_duration_minutes(input: &str) -> Result<u32, TimerError> {
    let invalid = || TimerError::InvalidDuration {
        input: input.to_string(),
    };
    let minutes = input.trim().parse::<u32>().map_err(|_| invalid())?;
    if minutes == 0 {
        return Err(invalid());
    }
    Ok(minutes)
}
