use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use immersion_timer_core::{
    parse_duration_minutes, ActivityDraft, ActivityMetadata, Config, Event, TimerMode,
};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::host::{self, Machine, Notifier};

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start or resume the timer
    ///
    /// An idle timer with no banked time is not kept on disk, so choose the
    /// mode, target and activity here when starting fresh.
    Start {
        /// "stopwatch" or "countdown"
        #[arg(long)]
        mode: Option<TimerMode>,
        /// Countdown target in whole minutes
        #[arg(long)]
        minutes: Option<String>,
        #[command(flatten)]
        activity: ActivityArgs,
    },
    /// Pause the running timer
    Pause,
    /// Stop and discard the current session
    Reset,
    /// Forget the session without logging it
    Clear,
    /// Print current timer state as JSON
    Status,
    /// Switch between stopwatch and countdown (discards elapsed time)
    Mode {
        /// "stopwatch" or "countdown"
        mode: TimerMode,
    },
    /// Set the countdown target in minutes
    Duration {
        /// Whole minutes, at least 1
        minutes: String,
    },
    /// Describe the activity being timed
    Activity {
        #[command(flatten)]
        activity: ActivityArgs,
    },
    /// Print the session as an activity draft and clear the timer
    Finish,
    /// Show a live clock; type s/p/r/c/q and Enter to control it
    Watch,
}

#[derive(Args)]
pub struct ActivityArgs {
    /// Activity name, e.g. "Podcast"
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    category: Option<String>,
    /// Title shown in the completion notice instead of the name
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    notes: Option<String>,
    #[arg(long)]
    language: Option<String>,
}

impl ActivityArgs {
    fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.category.is_none()
            && self.title.is_none()
            && self.notes.is_none()
            && self.language.is_none()
    }

    /// Overlay the given fields on `current`.
    fn merge(self, current: ActivityMetadata) -> ActivityMetadata {
        ActivityMetadata {
            activity_name: self.name.or(current.activity_name),
            category: self.category.or(current.category),
            custom_title: self.title.or(current.custom_title),
            notes: self.notes.or(current.notes),
            language: self.language.unwrap_or(current.language),
        }
    }
}

pub fn run(action: TimerAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    if let TimerAction::Watch = action {
        return super::watch::run(&config);
    }

    let mut machine = host::open_machine(&config)?;
    let mut notifier = host::build_notifier(&config);
    notifier.sync(machine.status());
    let mut events = machine.subscribe();
    machine.announce_recovery();

    // A countdown may have run out while no process was watching.
    machine.tick();
    drain(&mut events, &mut notifier)?;

    match action {
        TimerAction::Start {
            mode,
            minutes,
            activity,
        } => {
            if let Some(mode) = mode {
                if mode != machine.state().mode {
                    machine.set_mode(mode)?;
                }
            }
            if let Some(minutes) = minutes {
                machine.set_duration(parse_duration_minutes(&minutes)?)?;
            }
            if !activity.is_empty() {
                let metadata = activity.merge(machine.state().metadata.clone());
                machine.set_metadata(metadata);
            }
            machine.start();
        }
        TimerAction::Pause => {
            machine.pause();
        }
        TimerAction::Reset => {
            machine.reset();
        }
        TimerAction::Clear => {
            machine.clear();
        }
        TimerAction::Status | TimerAction::Watch => {}
        TimerAction::Mode { mode } => {
            machine.set_mode(mode)?;
            warn_if_not_kept(&machine);
        }
        TimerAction::Duration { minutes } => {
            let minutes = parse_duration_minutes(&minutes)?;
            machine.set_duration(minutes)?;
            warn_if_not_kept(&machine);
        }
        TimerAction::Activity { activity } => {
            let metadata = activity.merge(machine.state().metadata.clone());
            machine.set_metadata(metadata);
            warn_if_not_kept(&machine);
        }
        TimerAction::Finish => {
            let draft = machine
                .hand_off()
                .ok_or("timer has not been started, nothing to finish")?;
            let report = FinishReport {
                duration_minutes: draft.duration_minutes(),
                ended_at: draft.ended_at(),
                draft: &draft,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
            machine.clear();
            drain(&mut events, &mut notifier)?;
            return Ok(());
        }
    }

    drain(&mut events, &mut notifier)?;
    print_snapshot(&machine)?;
    Ok(())
}

/// The draft plus the derived fields an activity log entry needs.
#[derive(Serialize)]
struct FinishReport<'a> {
    #[serde(flatten)]
    draft: &'a ActivityDraft,
    duration_minutes: u64,
    ended_at: Option<DateTime<Utc>>,
}

fn warn_if_not_kept(machine: &Machine) {
    if machine.state().is_empty() {
        eprintln!("note: an idle timer is not kept on disk; pass this to `timer start` instead");
    }
}

/// Print every queued event as one JSON line, feeding each to the notifier.
fn drain(
    events: &mut broadcast::Receiver<Event>,
    notifier: &mut Notifier,
) -> immersion_timer_core::Result<()> {
    while let Ok(event) = events.try_recv() {
        notifier.observe(&event);
        println!("{}", serde_json::to_string(&event)?);
    }
    Ok(())
}

fn print_snapshot(machine: &Machine) -> immersion_timer_core::Result<()> {
    println!("{}", serde_json::to_string_pretty(&machine.snapshot())?);
    Ok(())
}
