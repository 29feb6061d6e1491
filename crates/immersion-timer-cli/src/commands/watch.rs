//! Live clock face. Keeps one timer open, redraws it on the configured
//! interval and takes line commands from stdin.

use std::time::Duration;

use immersion_timer_core::{
    parse_duration_minutes, Config, HostInput, RenderLoopDriver, TimerCommand, TimerMode,
    Visibility,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::host::{self, TerminalFace};

const HELP: &str = "s start  p pause  r reset  c clear  m <mode>  d <minutes>  q quit";

pub fn run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(watch(config));
    // A stdin read may still be parked on a blocking thread.
    runtime.shutdown_timeout(Duration::from_millis(100));
    Ok(result?)
}

async fn watch(config: &Config) -> immersion_timer_core::Result<()> {
    let mut machine = host::open_machine(config)?;
    let mut notifier = host::build_notifier(config);
    let mut face = TerminalFace::new(machine.state().metadata.label());
    let mut driver = RenderLoopDriver::new(config.tick_interval());
    let (tx, rx) = mpsc::unbounded_channel();

    eprintln!("{HELP}");
    tokio::join!(
        driver.run(&mut machine, &mut face, &mut notifier, rx),
        forward_inputs(tx),
    );
    println!();
    debug!(
        frames = driver.frames(),
        forced = driver.forced_frames(),
        "watch finished"
    );
    Ok(())
}

/// Turn stdin lines and process signals into host inputs until the user
/// quits or interrupts.
async fn forward_inputs(tx: mpsc::UnboundedSender<HostInput>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut resumed = ResumeSignal::new();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        let inputs = tokio::select! {
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => match parse_line(&line) {
                    Ok(Some(input)) => vec![input],
                    Ok(None) => continue,
                    Err(msg) => {
                        eprintln!("\n{msg} ({HELP})");
                        continue;
                    }
                },
                Ok(None) => {
                    stdin_open = false;
                    continue;
                }
                Err(e) => {
                    warn!(error = %e, "stdin closed");
                    stdin_open = false;
                    continue;
                }
            },
            _ = &mut ctrl_c => vec![HostInput::Unmount],
            // Continued after a stop: the terminal missed every tick since.
            _ = resumed.recv() => vec![
                HostInput::Visibility(Visibility::Hidden),
                HostInput::Visibility(Visibility::Visible),
            ],
        };

        let quit = inputs.contains(&HostInput::Unmount);
        for input in inputs {
            if tx.send(input).is_err() {
                return;
            }
        }
        if quit {
            return;
        }
    }
}

/// Parse one line of user input. Blank lines are ignored.
fn parse_line(line: &str) -> Result<Option<HostInput>, String> {
    let mut parts = line.split_whitespace();
    let Some(word) = parts.next() else {
        return Ok(None);
    };
    let arg = parts.next();
    let command = match (word.to_ascii_lowercase().as_str(), arg) {
        ("s" | "start", None) => TimerCommand::Start,
        ("p" | "pause", None) => TimerCommand::Pause,
        ("r" | "reset", None) => TimerCommand::Reset,
        ("c" | "clear", None) => TimerCommand::Clear,
        ("q" | "quit", None) => return Ok(Some(HostInput::Unmount)),
        ("m" | "mode", Some(mode)) => TimerCommand::SetMode(mode.parse::<TimerMode>()?),
        ("d" | "duration", Some(minutes)) => {
            TimerCommand::SetDuration(parse_duration_minutes(minutes).map_err(|e| e.to_string())?)
        }
        _ => return Err(format!("unknown command: {}", line.trim())),
    };
    Ok(Some(HostInput::Command(command)))
}

#[cfg(unix)]
struct ResumeSignal(Option<tokio::signal::unix::Signal>);

#[cfg(unix)]
impl ResumeSignal {
    fn new() -> Self {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::from_raw(signal_hook::consts::SIGCONT)) {
            Ok(sig) => Self(Some(sig)),
            Err(e) => {
                warn!(error = %e, "cannot listen for SIGCONT, no redraw on resume");
                Self(None)
            }
        }
    }

    async fn recv(&mut self) {
        if let Some(sig) = self.0.as_mut() {
            if sig.recv().await.is_some() {
                return;
            }
            self.0 = None;
        }
        std::future::pending::<()>().await
    }
}

#[cfg(not(unix))]
struct ResumeSignal;

#[cfg(not(unix))]
impl ResumeSignal {
    fn new() -> Self {
        Self
    }

    async fn recv(&mut self) {
        std::future::pending::<()>().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line_short_and_long_forms() {
        for (line, command) in [
            ("s", TimerCommand::Start),
            ("start", TimerCommand::Start),
            (" P ", TimerCommand::Pause),
            ("reset", TimerCommand::Reset),
            ("c", TimerCommand::Clear),
        ] {
            assert_eq!(parse_line(line), Ok(Some(HostInput::Command(command))));
        }
        assert_eq!(parse_line("q"), Ok(Some(HostInput::Unmount)));
    }

    #[test]
    fn test_parse_line_with_arguments() {
        assert_eq!(
            parse_line("m countdown"),
            Ok(Some(HostInput::Command(TimerCommand::SetMode(TimerMode::Countdown))))
        );
        assert_eq!(
            parse_line("duration 45"),
            Ok(Some(HostInput::Command(TimerCommand::SetDuration(45))))
        );
    }

    #[test]
    fn test_parse_line_rejects_bad_input() {
        assert_eq!(parse_line(""), Ok(None));
        assert_eq!(parse_line("   "), Ok(None));
        assert!(parse_line("d 0").is_err());
        assert!(parse_line("d abc").is_err());
        assert!(parse_line("m lap").is_err());
        assert!(parse_line("s now").is_err());
        assert!(parse_line("x").is_err());
    }
}
