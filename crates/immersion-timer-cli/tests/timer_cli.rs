//! CLI end-to-end tests.
//!
//! Each test runs the built binary against its own data directory, so the
//! timer record and config never leak between tests.

use std::path::Path;
use std::process::Command;

use serde_json::Value;
use tempfile::TempDir;

struct Cli {
    dir: TempDir,
}

struct Output {
    values: Vec<Value>,
    stdout: String,
    stderr: String,
    code: i32,
}

impl Cli {
    fn new() -> Self {
        let cli = Self {
            dir: tempfile::tempdir().unwrap(),
        };
        let out = cli.run(&["config", "set", "notifications.enabled", "false"]);
        assert_eq!(out.code, 0, "{}", out.stderr);
        cli
    }

    fn data_dir(&self) -> &Path {
        self.dir.path()
    }

    fn run(&self, args: &[&str]) -> Output {
        let output = Command::new(env!("CARGO_BIN_EXE_immersion-timer"))
            .args(args)
            .env("IMMERSION_TIMER_DATA_DIR", self.data_dir())
            .env("IMMERSION_TIMER_LOG", "off")
            .output()
            .expect("Failed to execute CLI command");

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let values = serde_json::Deserializer::from_str(&stdout)
            .into_iter::<Value>()
            .filter_map(Result::ok)
            .collect();
        Output {
            values,
            stdout,
            stderr,
            code: output.status.code().unwrap_or(-1),
        }
    }
}

impl Output {
    fn snapshot(&self) -> &Value {
        let last = self.values.last().expect("no JSON output");
        assert_eq!(last["type"], "StateSnapshot");
        last
    }

    fn has_event(&self, kind: &str) -> bool {
        self.values.iter().any(|v| v["type"] == kind)
    }
}

#[test]
fn test_status_on_fresh_data_dir_is_idle() {
    let cli = Cli::new();
    let out = cli.run(&["timer", "status"]);
    assert_eq!(out.code, 0, "{}", out.stderr);
    let snap = out.snapshot();
    assert_eq!(snap["status"], "idle");
    assert_eq!(snap["mode"], "stopwatch");
    assert_eq!(snap["display_seconds"], 0);
    assert_eq!(snap["initial_duration_secs"], 1800);
}

#[test]
fn test_start_survives_between_invocations() {
    let cli = Cli::new();
    let out = cli.run(&["timer", "start"]);
    assert_eq!(out.code, 0, "{}", out.stderr);
    assert!(out.has_event("TimerStarted"));
    assert_eq!(out.snapshot()["status"], "running");

    let out = cli.run(&["timer", "status"]);
    assert_eq!(out.snapshot()["status"], "running");
    assert!(!out.snapshot()["captured_at"].is_null());

    let out = cli.run(&["timer", "pause"]);
    assert!(out.has_event("TimerPaused"));
    assert_eq!(out.snapshot()["status"], "paused");

    let out = cli.run(&["timer", "start"]);
    assert!(out.has_event("TimerResumed"));
}

#[test]
fn test_restart_while_running_reports_recovery() {
    let cli = Cli::new();
    let out = cli.run(&["timer", "status"]);
    let recovered = out
        .values
        .iter()
        .find(|v| v["type"] == "StateRecovered")
        .expect("no StateRecovered event");
    assert_eq!(recovered["source"], "absent");
    assert_eq!(recovered["status"], "idle");

    cli.run(&["timer", "start"]);
    let out = cli.run(&["timer", "status"]);
    let recovered = out
        .values
        .iter()
        .find(|v| v["type"] == "StateRecovered")
        .expect("no StateRecovered event");
    assert_eq!(recovered["source"], "restored");
    assert_eq!(recovered["status"], "running");
    assert!(recovered["recovered_ms"].is_u64());
}

#[test]
fn test_zero_duration_is_rejected() {
    let cli = Cli::new();
    let out = cli.run(&["timer", "duration", "0"]);
    assert_eq!(out.code, 1);
    assert!(out.stderr.contains("error:"), "{}", out.stderr);

    let out = cli.run(&["timer", "status"]);
    assert_eq!(out.snapshot()["initial_duration_secs"], 1800);
}

#[test]
fn test_start_with_countdown_options() {
    let cli = Cli::new();
    let out = cli.run(&["timer", "start", "--mode", "countdown", "--minutes", "25"]);
    assert_eq!(out.code, 0, "{}", out.stderr);
    assert!(out.has_event("ModeChanged"));
    assert!(out.has_event("DurationChanged"));
    assert!(out.has_event("TimerStarted"));

    let out = cli.run(&["timer", "status"]);
    let snap = out.snapshot();
    assert_eq!(snap["status"], "running");
    assert_eq!(snap["mode"], "countdown");
    assert_eq!(snap["initial_duration_secs"], 1500);
    assert!(snap["remaining_ms"].as_u64().unwrap() <= 1_500_000);
}

#[test]
fn test_duration_refused_while_running() {
    let cli = Cli::new();
    cli.run(&["timer", "start", "--mode", "countdown", "--minutes", "5"]);
    let out = cli.run(&["timer", "duration", "10"]);
    assert_eq!(out.code, 1);
    let out = cli.run(&["timer", "status"]);
    assert_eq!(out.snapshot()["initial_duration_secs"], 300);
}

#[test]
fn test_settings_on_idle_timer_are_not_kept() {
    let cli = Cli::new();
    let out = cli.run(&["timer", "duration", "25"]);
    assert_eq!(out.code, 0, "{}", out.stderr);
    assert_eq!(out.snapshot()["initial_duration_secs"], 1500);
    assert!(out.stderr.contains("note:"));

    let out = cli.run(&["timer", "status"]);
    assert_eq!(out.snapshot()["initial_duration_secs"], 1800);
}

#[test]
fn test_mode_change_refused_while_running() {
    let cli = Cli::new();
    cli.run(&["timer", "start"]);
    let out = cli.run(&["timer", "mode", "countdown"]);
    assert_eq!(out.code, 1);

    let out = cli.run(&["timer", "status"]);
    assert_eq!(out.snapshot()["mode"], "stopwatch");
    assert_eq!(out.snapshot()["status"], "running");
}

#[test]
fn test_unknown_mode_is_a_usage_error() {
    let cli = Cli::new();
    let out = cli.run(&["timer", "mode", "lap"]);
    assert_ne!(out.code, 0);
}

#[test]
fn test_activity_metadata_is_kept() {
    let cli = Cli::new();
    let out = cli.run(&["timer", "start", "--name", "Podcast", "--language", "ja"]);
    assert_eq!(out.code, 0, "{}", out.stderr);
    assert!(out.has_event("MetadataChanged"));

    let out = cli.run(&["timer", "activity", "--category", "listening"]);
    assert!(out.has_event("MetadataChanged"));
    let activity = &out.snapshot()["activity"];
    assert_eq!(activity["activityName"], "Podcast");
    assert_eq!(activity["category"], "listening");
    assert_eq!(activity["language"], "ja");
}

#[test]
fn test_finish_prints_draft_and_clears() {
    let cli = Cli::new();
    let out = cli.run(&["timer", "finish"]);
    assert_eq!(out.code, 1, "finish without a session must fail");

    cli.run(&["timer", "start", "--name", "Reading"]);
    let out = cli.run(&["timer", "finish"]);
    assert_eq!(out.code, 0, "{}", out.stderr);
    let draft = out
        .values
        .iter()
        .find(|v| v.get("type").is_none())
        .expect("no draft printed");
    assert_eq!(draft["mode"], "stopwatch");
    assert!(draft["duration_minutes"].is_u64());
    assert!(!draft["ended_at"].is_null());
    assert_eq!(draft["completed"], false);
    assert_eq!(draft["activity"]["activityName"], "Reading");
    assert!(out.has_event("TimerCleared"));

    let out = cli.run(&["timer", "status"]);
    assert_eq!(out.snapshot()["status"], "idle");
    assert!(out.snapshot()["captured_at"].is_null());
}

#[test]
fn test_reset_discards_session() {
    let cli = Cli::new();
    cli.run(&["timer", "start"]);
    let out = cli.run(&["timer", "reset"]);
    assert!(out.has_event("TimerReset"));
    assert_eq!(out.snapshot()["status"], "idle");
    assert_eq!(out.snapshot()["elapsed_ms"], 0);
}

#[test]
fn test_config_defaults_apply_to_fresh_timer() {
    let cli = Cli::new();
    let out = cli.run(&["config", "set", "timer.default_mode", "countdown"]);
    assert_eq!(out.code, 0, "{}", out.stderr);
    cli.run(&["config", "set", "timer.default_duration_min", "10"]);

    let out = cli.run(&["config", "get", "timer.default_mode"]);
    assert_eq!(out.stdout.trim(), "countdown");

    let out = cli.run(&["timer", "status"]);
    assert_eq!(out.snapshot()["mode"], "countdown");
    assert_eq!(out.snapshot()["initial_duration_secs"], 600);
}

#[test]
fn test_config_rejects_bad_values() {
    let cli = Cli::new();
    let out = cli.run(&["config", "set", "timer.no_such_key", "1"]);
    assert_eq!(out.code, 1);
    let out = cli.run(&["config", "set", "timer.default_duration_min", "0"]);
    assert_eq!(out.code, 1);

    let out = cli.run(&["config", "get", "timer.default_duration_min"]);
    assert_eq!(out.stdout.trim(), "30");
}

#[test]
fn test_config_list_and_reset() {
    let cli = Cli::new();
    let out = cli.run(&["config", "list"]);
    assert_eq!(out.code, 0, "{}", out.stderr);
    assert!(out.stdout.lines().any(|l| l == "timer.default_mode = stopwatch"));
    assert!(out.stdout.lines().any(|l| l == "notifications.enabled = false"));

    let out = cli.run(&["config", "reset"]);
    assert_eq!(out.code, 0, "{}", out.stderr);
    let out = cli.run(&["config", "get", "notifications.enabled"]);
    assert_eq!(out.stdout.trim(), "true");
}
