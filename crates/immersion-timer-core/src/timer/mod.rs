mod calculator;
mod machine;
mod persistence;
mod state;

pub use calculator::{compute, format_clock, Reading};
pub use machine::{parse_duration_minutes, TimerStateMachine};
pub use persistence::{reanchor, PersistenceGateway, RecordSource, Recovered};
pub use state::{ActivityMetadata, TimerDefaults, TimerMode, TimerState, TimerStatus};
