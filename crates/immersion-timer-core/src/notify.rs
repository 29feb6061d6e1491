//! Completion side effects.
//!
//! [`CompletionNotifier`] watches the event stream and, once per
//! running→completed transition, plays an audio cue and shows a system
//! notification naming the activity. Both effects are best-effort: failures
//! and missing permission are logged and otherwise ignored, and nothing here
//! can fail a timer transition.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::NotifyError;
use crate::events::Event;
use crate::timer::{ActivityMetadata, TimerStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationPermission {
    Undetermined,
    Granted,
    Denied,
}

pub trait AudioCue {
    fn play(&self) -> Result<(), NotifyError>;
}

/// Platform notification surface. Permission state lives with the platform,
/// not with the timer.
pub trait SystemNotifier {
    fn permission(&self) -> NotificationPermission;

    /// Ask the user. Called only while the permission is undetermined.
    fn request_permission(&mut self) -> NotificationPermission;

    fn show(&mut self, title: &str, body: &str) -> Result<(), NotifyError>;
}

/// Does nothing. Stands in for a disabled audio cue or notifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct Silent;

impl AudioCue for Silent {
    fn play(&self) -> Result<(), NotifyError> {
        Ok(())
    }
}

impl SystemNotifier for Silent {
    fn permission(&self) -> NotificationPermission {
        NotificationPermission::Denied
    }

    fn request_permission(&mut self) -> NotificationPermission {
        NotificationPermission::Denied
    }

    fn show(&mut self, _title: &str, _body: &str) -> Result<(), NotifyError> {
        Err(NotifyError::PermissionDenied)
    }
}

impl<A: AudioCue + ?Sized> AudioCue for Box<A> {
    fn play(&self) -> Result<(), NotifyError> {
        (**self).play()
    }
}

impl<N: SystemNotifier + ?Sized> SystemNotifier for Box<N> {
    fn permission(&self) -> NotificationPermission {
        (**self).permission()
    }

    fn request_permission(&mut self) -> NotificationPermission {
        (**self).request_permission()
    }

    fn show(&mut self, title: &str, body: &str) -> Result<(), NotifyError> {
        (**self).show(title, body)
    }
}

pub const COMPLETION_TITLE: &str = "Timer complete";

pub fn completion_body(activity: &ActivityMetadata) -> String {
    format!("Time's up for {}.", activity.label())
}

/// Edge-triggered completion effects.
///
/// The notifier is armed by a start or resume and disarmed when it fires, so
/// a completion seen twice (or a `completed` state observed repeatedly)
/// produces one notice.
pub struct CompletionNotifier<A, N> {
    audio: A,
    system: N,
    armed: bool,
    fired: u64,
}

impl<A: AudioCue, N: SystemNotifier> CompletionNotifier<A, N> {
    pub fn new(audio: A, system: N) -> Self {
        Self {
            audio,
            system,
            armed: false,
            fired: 0,
        }
    }

    /// Align with a state observed outside the event stream, e.g. a timer
    /// recovered already running.
    pub fn sync(&mut self, status: TimerStatus) {
        self.armed = status == TimerStatus::Running;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Number of times the effects have fired.
    pub fn fired(&self) -> u64 {
        self.fired
    }

    pub fn audio(&self) -> &A {
        &self.audio
    }

    pub fn system(&self) -> &N {
        &self.system
    }

    /// Feed one event. Returns true if the completion effects fired.
    pub fn observe(&mut self, event: &Event) -> bool {
        match event {
            Event::TimerStarted { .. } | Event::TimerResumed { .. } => {
                self.armed = true;
                false
            }
            Event::StateRecovered { status, .. } => {
                self.sync(*status);
                false
            }
            Event::TimerCompleted { activity, .. } => {
                if !self.armed {
                    return false;
                }
                self.armed = false;
                self.fire(activity);
                true
            }
            Event::TimerPaused { .. }
            | Event::TimerReset { .. }
            | Event::TimerCleared { .. }
            | Event::ModeChanged { .. } => {
                self.armed = false;
                false
            }
            _ => false,
        }
    }

    fn fire(&mut self, activity: &ActivityMetadata) {
        self.fired += 1;

        if let Err(e) = self.audio.play() {
            debug!(error = %e, "completion sound skipped");
        }

        let mut permission = self.system.permission();
        if permission == NotificationPermission::Undetermined {
            permission = self.system.request_permission();
        }
        if permission != NotificationPermission::Granted {
            debug!(?permission, "completion notification skipped");
            return;
        }
        if let Err(e) = self.system.show(COMPLETION_TITLE, &completion_body(activity)) {
            debug!(error = %e, "completion notification failed");
        }
    }
}
