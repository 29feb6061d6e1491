//! Durable checkpointing of the timer record.
//!
//! `load()` re-anchors a running record: whatever time passed since its
//! anchor is banked into `accumulated_ms` and a fresh anchor is taken at
//! `now`. Nothing has to keep ticking while the process is frozen or dead;
//! the banked total plus the new anchor is all the state there is.
//!
//! Storage failures never escape this module. A failed write switches the
//! gateway into degraded mode, after which the timer lives in memory only
//! for the rest of the session.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::state::{TimerDefaults, TimerState, TimerStatus};
use crate::storage::StateStore;

/// Where a loaded state came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordSource {
    /// No record under the key; defaults were used.
    Absent,
    /// A valid record was read back.
    Restored,
    /// A record existed but could not be parsed; defaults were used.
    Corrupt,
    /// The store could not be read; defaults were used.
    Unavailable,
}

/// Result of [`PersistenceGateway::load`].
#[derive(Debug, Clone)]
pub struct Recovered {
    pub state: TimerState,
    /// Milliseconds folded into `accumulated_ms` by re-anchoring.
    pub recovered_ms: u64,
    pub source: RecordSource,
}

pub struct PersistenceGateway<S> {
    store: S,
    key: String,
    degraded: bool,
}

impl<S: StateStore> PersistenceGateway<S> {
    pub fn new(store: S, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            degraded: false,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// True once a write has failed; later saves are skipped.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Checkpoint `state`, or delete the record when it is empty.
    pub fn save(&mut self, state: &TimerState) {
        if self.degraded {
            debug!(key = %self.key, "persistence degraded, keeping timer in memory");
            return;
        }

        let result = if state.is_empty() {
            self.store.remove(&self.key)
        } else {
            match serde_json::to_string(state) {
                Ok(json) => self.store.write(&self.key, &json),
                Err(e) => {
                    warn!(key = %self.key, error = %e, "failed to encode timer record");
                    self.degraded = true;
                    return;
                }
            }
        };

        if let Err(e) = result {
            warn!(
                key = %self.key,
                error = %e,
                "failed to persist timer record, continuing in memory only"
            );
            self.degraded = true;
        }
    }

    /// Delete the record regardless of the current state.
    pub fn discard(&mut self) {
        if self.degraded {
            return;
        }
        if let Err(e) = self.store.remove(&self.key) {
            warn!(key = %self.key, error = %e, "failed to delete timer record");
            self.degraded = true;
        }
    }

    /// Read back the last checkpoint, re-anchored at `now_ms`.
    pub fn load(&self, now_ms: u64, defaults: &TimerDefaults) -> Recovered {
        let fallback = |source| Recovered {
            state: TimerState::idle(defaults),
            recovered_ms: 0,
            source,
        };

        let raw = match self.store.read(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return fallback(RecordSource::Absent),
            Err(e) => {
                warn!(key = %self.key, error = %e, "failed to read timer record, using defaults");
                return fallback(RecordSource::Unavailable);
            }
        };

        let mut state: TimerState = match serde_json::from_str(&raw) {
            Ok(state) => state,
            Err(e) => {
                warn!(key = %self.key, error = %e, "discarding unparseable timer record");
                return fallback(RecordSource::Corrupt);
            }
        };

        if state.normalize(defaults) {
            warn!(key = %self.key, status = %state.status, "repaired inconsistent timer record");
        }

        let recovered_ms = reanchor(&mut state, now_ms);
        if recovered_ms > 0 {
            info!(
                key = %self.key,
                recovered_ms,
                accumulated_ms = state.accumulated_ms,
                "re-anchored running timer"
            );
        }

        Recovered {
            state,
            recovered_ms,
            source: RecordSource::Restored,
        }
    }
}

/// Fold the open segment into the banked total and anchor a new one at
/// `now_ms`. Returns the amount folded. A no-op unless running.
pub fn reanchor(state: &mut TimerState, now_ms: u64) -> u64 {
    if state.status != TimerStatus::Running {
        return 0;
    }
    let delta = state.running_delta_ms(now_ms);
    state.accumulated_ms = state.accumulated_ms.saturating_add(delta);
    state.start_time = Some(now_ms);
    delta
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use crate::storage::MemoryStore;
    use crate::timer::calculator::compute;
    use crate::timer::state::TimerMode;

    const KEY: &str = "timer";

    fn defaults() -> TimerDefaults {
        TimerDefaults {
            mode: TimerMode::Countdown,
            duration_secs: 600,
            language: "fr".into(),
        }
    }

    fn running_at(start: u64, accumulated_ms: u64) -> TimerState {
        let mut state = TimerState::idle(&defaults());
        state.status = TimerStatus::Running;
        state.start_time = Some(start);
        state.accumulated_ms = accumulated_ms;
        state
    }

    /// A store whose reads and writes always fail.
    struct BrokenStore;

    impl StateStore for BrokenStore {
        fn read(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Locked)
        }
        fn write(&mut self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::QueryFailed("disk full".into()))
        }
        fn remove(&mut self, _key: &str) -> Result<(), StorageError> {
            Err(StorageError::Locked)
        }
    }

    #[test]
    fn absent_record_yields_defaults() {
        let gw = PersistenceGateway::new(MemoryStore::new(), KEY);
        let rec = gw.load(1_000, &defaults());
        assert_eq!(rec.source, RecordSource::Absent);
        assert_eq!(rec.state, TimerState::idle(&defaults()));
    }

    #[test]
    fn save_removes_empty_idle_record() {
        let mut gw = PersistenceGateway::new(MemoryStore::new(), KEY);
        gw.save(&running_at(0, 0));
        assert!(gw.store().contains(KEY));
        gw.save(&TimerState::idle(&defaults()));
        assert!(!gw.store().contains(KEY));
    }

    #[test]
    fn save_keeps_idle_record_with_banked_time() {
        let mut gw = PersistenceGateway::new(MemoryStore::new(), KEY);
        let mut state = TimerState::idle(&defaults());
        state.accumulated_ms = 5_000;
        gw.save(&state);
        assert!(gw.store().contains(KEY));
    }

    #[test]
    fn load_reanchors_running_record() {
        let mut gw = PersistenceGateway::new(MemoryStore::new(), KEY);
        gw.save(&running_at(10_000, 3_000));

        let rec = gw.load(70_000, &defaults());
        assert_eq!(rec.source, RecordSource::Restored);
        assert_eq!(rec.recovered_ms, 60_000);
        assert_eq!(rec.state.accumulated_ms, 63_000);
        assert_eq!(rec.state.start_time, Some(70_000));
        assert_eq!(compute(&rec.state, 70_000).elapsed_ms, 63_000);
    }

    #[test]
    fn load_twice_is_idempotent_for_elapsed_time() {
        let mut gw = PersistenceGateway::new(MemoryStore::new(), KEY);
        gw.save(&running_at(0, 0));
        let first = gw.load(30_000, &defaults());
        let second = gw.load(30_000, &defaults());
        assert_eq!(
            compute(&first.state, 30_000).elapsed_ms,
            compute(&second.state, 30_000).elapsed_ms
        );
    }

    #[test]
    fn load_leaves_paused_record_alone() {
        let mut gw = PersistenceGateway::new(MemoryStore::new(), KEY);
        let mut state = running_at(0, 12_000);
        state.status = TimerStatus::Paused;
        state.start_time = None;
        gw.save(&state);
        let rec = gw.load(999_000, &defaults());
        assert_eq!(rec.recovered_ms, 0);
        assert_eq!(rec.state, state);
    }

    #[test]
    fn backward_clock_on_load_banks_nothing() {
        let mut gw = PersistenceGateway::new(MemoryStore::new(), KEY);
        gw.save(&running_at(50_000, 1_000));
        let rec = gw.load(20_000, &defaults());
        assert_eq!(rec.state.accumulated_ms, 1_000);
        assert_eq!(rec.state.start_time, Some(20_000));
    }

    #[test]
    fn corrupt_record_falls_back_to_defaults() {
        let mut store = MemoryStore::new();
        store.write(KEY, "{not json").unwrap();
        let gw = PersistenceGateway::new(store, KEY);
        let rec = gw.load(0, &defaults());
        assert_eq!(rec.source, RecordSource::Corrupt);
        assert_eq!(rec.state.status, TimerStatus::Idle);
    }

    #[test]
    fn record_with_unknown_status_is_corrupt() {
        let mut store = MemoryStore::new();
        store
            .write(KEY, r#"{"status":"exploded","mode":"countdown","initialDurationSecs":60}"#)
            .unwrap();
        let gw = PersistenceGateway::new(store, KEY);
        assert_eq!(gw.load(0, &defaults()).source, RecordSource::Corrupt);
    }

    #[test]
    fn running_record_without_anchor_is_repaired_as_paused() {
        let mut store = MemoryStore::new();
        store
            .write(
                KEY,
                r#"{"status":"running","mode":"stopwatch","accumulatedMs":4000,"initialDurationSecs":60}"#,
            )
            .unwrap();
        let gw = PersistenceGateway::new(store, KEY);
        let rec = gw.load(100_000, &defaults());
        assert_eq!(rec.source, RecordSource::Restored);
        assert_eq!(rec.state.status, TimerStatus::Paused);
        assert_eq!(rec.state.accumulated_ms, 4_000);
        assert!(rec.state.start_time.is_none());
    }

    #[test]
    fn zero_countdown_length_is_replaced_by_default() {
        let mut store = MemoryStore::new();
        store
            .write(
                KEY,
                r#"{"status":"paused","mode":"countdown","accumulatedMs":4000,"initialDurationSecs":0}"#,
            )
            .unwrap();
        let gw = PersistenceGateway::new(store, KEY);
        let rec = gw.load(100_000, &defaults());
        assert_eq!(rec.source, RecordSource::Restored);
        assert_eq!(rec.state.initial_duration_secs, 600);
        assert_eq!(rec.state.accumulated_ms, 4_000);
        assert!(!compute(&rec.state, 100_000).is_complete);
    }

    #[test]
    fn failed_write_degrades_without_panicking() {
        let mut gw = PersistenceGateway::new(BrokenStore, KEY);
        assert!(!gw.is_degraded());
        gw.save(&running_at(0, 0));
        assert!(gw.is_degraded());
        gw.save(&running_at(0, 0));
        gw.discard();
        assert!(gw.is_degraded());
    }

    #[test]
    fn unreadable_store_falls_back_to_defaults() {
        let gw = PersistenceGateway::new(BrokenStore, KEY);
        let rec = gw.load(0, &defaults());
        assert_eq!(rec.source, RecordSource::Unavailable);
        assert_eq!(rec.state, TimerState::idle(&defaults()));
    }
}
