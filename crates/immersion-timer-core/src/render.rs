//! Redraw scheduling.
//!
//! The driver decides *when* the display is recomputed; the state machine
//! only knows *what* the state is. While the timer runs, the driver redraws
//! on a fixed interval. When the host becomes visible again after being
//! hidden, it redraws immediately instead of waiting for the next tick,
//! since a backgrounded or stopped host may have missed any number of them.
//! While the timer is not running, it redraws once per change and otherwise
//! sleeps.
//!
//! Everything runs on one task. Host commands are applied whole between
//! redraws, so a frame never sees a partially applied transition.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::TryRecvError;
use tokio::sync::{broadcast, mpsc};
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::error::TimerError;
use crate::events::Event;
use crate::notify::{AudioCue, CompletionNotifier, SystemNotifier};
use crate::storage::StateStore;
use crate::timer::{ActivityMetadata, TimerMode, TimerStateMachine, TimerStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Visible,
    Hidden,
}

/// One redraw's worth of data for the host.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub status: TimerStatus,
    pub mode: TimerMode,
    pub display_seconds: u64,
    pub elapsed_ms: u64,
    pub progress: Option<f64>,
    /// This frame is the one at which the countdown completed.
    pub just_completed: bool,
    pub is_complete: bool,
}

/// The screen the timer is drawn on.
pub trait RenderHost {
    fn render(&mut self, frame: &Frame);

    /// A transition happened.
    fn event(&mut self, _event: &Event) {}

    /// A host command was refused; the timer is unchanged.
    fn rejected(&mut self, _error: &TimerError) {}
}

/// User actions forwarded from the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerCommand {
    Start,
    Pause,
    Reset,
    Clear,
    SetMode(TimerMode),
    /// Minutes.
    SetDuration(u32),
    SetMetadata(ActivityMetadata),
}

impl TimerCommand {
    pub fn apply_to<S: StateStore, C: Clock>(
        self,
        machine: &mut TimerStateMachine<S, C>,
    ) -> Result<Option<Event>, TimerError> {
        match self {
            TimerCommand::Start => Ok(machine.start()),
            TimerCommand::Pause => Ok(machine.pause()),
            TimerCommand::Reset => Ok(machine.reset()),
            TimerCommand::Clear => Ok(machine.clear()),
            TimerCommand::SetMode(mode) => machine.set_mode(mode),
            TimerCommand::SetDuration(minutes) => machine.set_duration(minutes),
            TimerCommand::SetMetadata(metadata) => Ok(machine.set_metadata(metadata)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostInput {
    Command(TimerCommand),
    Visibility(Visibility),
    /// The host is going away; stop the loop.
    Unmount,
}

pub struct RenderLoopDriver {
    interval: Duration,
    visibility: Visibility,
    frames: u64,
    forced: u64,
}

impl RenderLoopDriver {
    pub fn new(interval: Duration) -> Self {
        Self {
            // tokio panics on a zero period
            interval: interval.max(Duration::from_millis(1)),
            visibility: Visibility::Visible,
            frames: 0,
            forced: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    /// Frames pushed so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Frames pushed because visibility was regained.
    pub fn forced_frames(&self) -> u64 {
        self.forced
    }

    /// Record a visibility change. Returns true on hidden→visible, which
    /// calls for an immediate redraw.
    pub fn on_visibility(&mut self, visibility: Visibility) -> bool {
        let regained =
            self.visibility == Visibility::Hidden && visibility == Visibility::Visible;
        self.visibility = visibility;
        regained
    }

    /// Tick the machine and push a frame. Returns the completion event if
    /// this tick completed the countdown.
    pub fn refresh<S: StateStore, C: Clock, H: RenderHost>(
        &mut self,
        machine: &mut TimerStateMachine<S, C>,
        host: &mut H,
    ) -> Option<Event> {
        let completed = machine.tick();
        let reading = machine.reading();
        let frame = Frame {
            status: machine.status(),
            mode: machine.state().mode,
            display_seconds: reading.display_seconds,
            elapsed_ms: reading.elapsed_ms,
            progress: reading.progress(),
            just_completed: completed.is_some(),
            is_complete: reading.is_complete,
        };
        self.frames += 1;
        host.render(&frame);
        completed
    }

    /// Drive `machine` until the host unmounts or drops its input sender.
    pub async fn run<S, C, H, A, N>(
        &mut self,
        machine: &mut TimerStateMachine<S, C>,
        host: &mut H,
        notifier: &mut CompletionNotifier<A, N>,
        mut inputs: mpsc::UnboundedReceiver<HostInput>,
    ) where
        S: StateStore,
        C: Clock,
        H: RenderHost,
        A: AudioCue,
        N: SystemNotifier,
    {
        let mut events = machine.subscribe();
        notifier.sync(machine.status());
        machine.announce_recovery();

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        self.refresh(machine, host);
        drain(&mut events, host, notifier);
        ticker.reset();

        loop {
            let running = machine.status() == TimerStatus::Running;
            tokio::select! {
                biased;

                input = inputs.recv() => match input {
                    None | Some(HostInput::Unmount) => {
                        debug!(frames = self.frames, "render loop stopped");
                        break;
                    }
                    Some(HostInput::Visibility(visibility)) => {
                        if self.on_visibility(visibility) {
                            self.forced += 1;
                            self.refresh(machine, host);
                        }
                    }
                    Some(HostInput::Command(command)) => {
                        let was_running = running;
                        if let Err(e) = command.apply_to(machine) {
                            warn!(error = %e, "timer command rejected");
                            host.rejected(&e);
                        }
                        self.refresh(machine, host);
                        if !was_running && machine.status() == TimerStatus::Running {
                            ticker.reset();
                        }
                    }
                },
                _ = ticker.tick(), if running => {
                    self.refresh(machine, host);
                }
            }
            drain(&mut events, host, notifier);
        }
    }
}

fn drain<H, A, N>(
    events: &mut broadcast::Receiver<Event>,
    host: &mut H,
    notifier: &mut CompletionNotifier<A, N>,
) where
    H: RenderHost,
    A: AudioCue,
    N: SystemNotifier,
{
    loop {
        match events.try_recv() {
            Ok(event) => {
                notifier.observe(&event);
                host.event(&event);
            }
            Err(TryRecvError::Lagged(skipped)) => {
                warn!(skipped, "render loop fell behind the event stream");
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
        }
    }
}
