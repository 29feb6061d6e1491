//! Terminal-side adapters: storage fallback, completion sound, desktop
//! notifications and the live clock face.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use immersion_timer_core::{
    format_clock, ActivityMetadata, AudioCue, CompletionNotifier, Config, Event, Frame, MemoryStore,
    NotificationPermission, NotifyError, PersistenceGateway, RenderHost, Silent, SqliteStore,
    StateStore, SystemClock, SystemNotifier, TimerError, TimerStateMachine, TimerStatus,
};
use tracing::warn;

pub type Machine = TimerStateMachine<Box<dyn StateStore>, SystemClock>;
pub type Notifier = CompletionNotifier<Box<dyn AudioCue>, Box<dyn SystemNotifier>>;

/// Open the timer on the SQLite store, or in memory if the store cannot be
/// opened. The in-memory fallback loses the timer when the process exits.
pub fn open_machine(config: &Config) -> immersion_timer_core::Result<Machine> {
    let store: Box<dyn StateStore> = match SqliteStore::open() {
        Ok(store) => Box::new(store),
        Err(e) => {
            warn!(error = %e, "timer store unavailable, keeping state in memory only");
            Box::new(MemoryStore::new())
        }
    };
    let gateway = PersistenceGateway::new(store, config.timer.storage_key.clone());
    Ok(TimerStateMachine::new(
        gateway,
        SystemClock,
        config.timer_defaults(),
    )?)
}

pub fn build_notifier(config: &Config) -> Notifier {
    let prefs = &config.notifications;
    let audio: Box<dyn AudioCue> = if prefs.enabled && prefs.sound {
        Box::new(SoundCommand::new(prefs.custom_sound.as_deref().map(PathBuf::from)))
    } else {
        Box::new(Silent)
    };
    let system: Box<dyn SystemNotifier> = if prefs.enabled && prefs.desktop {
        Box::new(DesktopNotifier)
    } else {
        Box::new(Silent)
    };
    CompletionNotifier::new(audio, system)
}

const SYSTEM_SOUNDS: &[(&str, &str)] = &[
    ("paplay", "/usr/share/sounds/freedesktop/stereo/complete.oga"),
    ("paplay", "/usr/share/sounds/freedesktop/stereo/bell.oga"),
    ("aplay", "/usr/share/sounds/sound-icons/guitar-11.wav"),
    ("afplay", "/System/Library/Sounds/Glass.aiff"),
];

/// Plays a sound file through the first player that exists, falling back to
/// the terminal bell.
pub struct SoundCommand {
    custom: Option<PathBuf>,
}

impl SoundCommand {
    pub fn new(custom: Option<PathBuf>) -> Self {
        Self { custom }
    }

    fn spawn(player: &str, file: &Path) -> bool {
        let child = Command::new(player)
            .arg(file)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
        match child {
            Ok(mut child) => {
                std::thread::spawn(move || {
                    let _ = child.wait();
                });
                true
            }
            Err(_) => false,
        }
    }
}

impl AudioCue for SoundCommand {
    fn play(&self) -> Result<(), NotifyError> {
        if let Some(custom) = self.custom.as_deref().filter(|p| p.exists()) {
            for player in ["paplay", "aplay", "afplay"] {
                if Self::spawn(player, custom) {
                    return Ok(());
                }
            }
        }
        for (player, file) in SYSTEM_SOUNDS {
            let file = Path::new(file);
            if file.exists() && Self::spawn(player, file) {
                return Ok(());
            }
        }
        TerminalBell.play()
    }
}

pub struct TerminalBell;

impl AudioCue for TerminalBell {
    fn play(&self) -> Result<(), NotifyError> {
        let mut err = std::io::stderr();
        err.write_all(b"\x07")
            .and_then(|_| err.flush())
            .map_err(|e| NotifyError::Audio(e.to_string()))
    }
}

/// Freedesktop / macOS / Windows notifications. None of these gate on a
/// per-app permission the way browsers do, so permission is always granted
/// and failures surface from `show`.
pub struct DesktopNotifier;

impl SystemNotifier for DesktopNotifier {
    fn permission(&self) -> NotificationPermission {
        NotificationPermission::Granted
    }

    fn request_permission(&mut self) -> NotificationPermission {
        NotificationPermission::Granted
    }

    fn show(&mut self, title: &str, body: &str) -> Result<(), NotifyError> {
        notify_rust::Notification::new()
            .summary(title)
            .body(body)
            .appname("immersion-timer")
            .icon("alarm-clock")
            .show()
            .map(|_| ())
            .map_err(|e| NotifyError::Unavailable(e.to_string()))
    }
}

/// Single-line clock face redrawn in place.
pub struct TerminalFace {
    label: String,
}

impl TerminalFace {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

pub fn status_glyph(status: TimerStatus) -> &'static str {
    match status {
        TimerStatus::Idle => "idle",
        TimerStatus::Running => "▶",
        TimerStatus::Paused => "⏸",
        TimerStatus::Completed => "done",
    }
}

pub fn render_line(label: &str, frame: &Frame) -> String {
    let clock = format_clock(frame.display_seconds);
    match frame.progress {
        Some(p) => format!(
            "{} {} {} ({:>3.0}%)",
            status_glyph(frame.status),
            clock,
            label,
            p * 100.0
        ),
        None => format!("{} {} {}", status_glyph(frame.status), clock, label),
    }
}

impl RenderHost for TerminalFace {
    fn render(&mut self, frame: &Frame) {
        let mut out = std::io::stdout();
        // \x1b[2K clears the previous, possibly longer, line
        let _ = write!(out, "\r\x1b[2K{}", render_line(&self.label, frame));
        let _ = out.flush();
    }

    fn event(&mut self, event: &Event) {
        match event {
            Event::MetadataChanged { activity, .. } => {
                self.label = activity.label().to_string();
            }
            Event::TimerCleared { .. } => {
                self.label = ActivityMetadata::default().label().to_string();
            }
            Event::TimerCompleted { activity, .. } => {
                println!("\n{} finished.", activity.label());
            }
            _ => {}
        }
    }

    fn rejected(&mut self, error: &TimerError) {
        eprintln!("\n{error}");
    }
}
