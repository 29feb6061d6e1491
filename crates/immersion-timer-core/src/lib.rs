//! # Immersion Timer Core Library
//!
//! The persistent, resumable activity timer behind the immersion tracker.
//! It measures how long a user spends on an activity, as a stopwatch or a
//! countdown, and survives reloads, suspension and restarts without losing
//! or double counting time. The CLI binary is a thin host over this crate.
//!
//! ## Architecture
//!
//! - **Timer**: [`TimerState`] record, a pure elapsed-time calculator, the
//!   [`PersistenceGateway`] that checkpoints and re-anchors the record, and
//!   the [`TimerStateMachine`] that owns every transition
//! - **Render loop**: [`RenderLoopDriver`] decides when the display is
//!   recomputed, including an immediate redraw on visibility regain
//! - **Notify**: [`CompletionNotifier`] fires sound and a system
//!   notification once per countdown completion
//! - **Storage**: key/value ports (SQLite, in-memory) and TOML configuration
//!
//! Time always comes from an injected [`Clock`], and storage from an
//! injected [`StateStore`] keyed by a storage key. Two instances sharing a
//! store and key overwrite each other (last writer wins); that is a known
//! limitation, not something this crate arbitrates.

pub mod clock;
pub mod error;
pub mod events;
pub mod handoff;
pub mod notify;
pub mod render;
pub mod storage;
pub mod timer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ConfigError, CoreError, NotifyError, Result, StorageError, TimerError};
pub use events::Event;
pub use handoff::ActivityDraft;
pub use notify::{AudioCue, CompletionNotifier, NotificationPermission, Silent, SystemNotifier};
pub use render::{Frame, HostInput, RenderHost, RenderLoopDriver, TimerCommand, Visibility};
pub use storage::{Config, MemoryStore, SqliteStore, StateStore};
pub use timer::{
    compute, format_clock, parse_duration_minutes, ActivityMetadata, PersistenceGateway, Reading,
    RecordSource, TimerDefaults, TimerMode, TimerState, TimerStateMachine, TimerStatus,
};
