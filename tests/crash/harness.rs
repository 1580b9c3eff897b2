//! Crash test harness for subprocess management
//!
//! Runs the real `nvlabel` binary with `NVLABEL_CRASH_POINT` set and
//! reports how it exited.

use std::path::Path;
use std::process::{Command, ExitStatus};

use nvlabel::crash_point::CRASH_POINT_ENV;

/// Result of one `nvlabel` run
#[derive(Debug)]
pub struct CrashTestResult {
    /// Whether the process aborted at the armed point
    pub crashed: bool,
    pub exit_status: Option<ExitStatus>,
    pub stdout: String,
    pub stderr: String,
}

impl CrashTestResult {
    pub fn succeeded(&self) -> bool {
        self.exit_status.is_some_and(|s| s.success())
    }
}

fn run(args: &[&str], crash_point: Option<&str>) -> CrashTestResult {
    let mut command = Command::new(env!("CARGO_BIN_EXE_nvlabel"));
    command.args(args).env_remove(CRASH_POINT_ENV);
    if let Some(point) = crash_point {
        command.env(CRASH_POINT_ENV, point);
    }

    match command.output() {
        Ok(output) => {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            CrashTestResult {
                crashed: !output.status.success() && stderr.contains("[CRASH]"),
                exit_status: Some(output.status),
                stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                stderr,
            }
        }
        Err(e) => CrashTestResult {
            crashed: false,
            exit_status: None,
            stdout: String::new(),
            stderr: format!("Failed to execute: {}", e),
        },
    }
}

/// Runs `nvlabel` without any crash point.
pub fn execute(args: &[&str]) -> CrashTestResult {
    run(args, None)
}

/// Runs `nvlabel` with `crash_point` armed.
pub fn execute_with_crash_point(crash_point: &str, args: &[&str]) -> CrashTestResult {
    run(args, Some(crash_point))
}

/// Runs a command that must succeed, panicking with its output otherwise.
pub fn execute_ok(args: &[&str]) {
    let result = execute(args);
    if !result.succeeded() {
        panic!(
            "nvlabel {:?} failed\nstdout:\n{}\nstderr:\n{}",
            args, result.stdout, result.stderr
        );
    }
}

/// Arg vector for one image.
pub fn image_args(command: &str, image: &Path, extra: &[&str]) -> Vec<String> {
    let mut args = vec![
        command.to_string(),
        "--image".to_string(),
        image.display().to_string(),
    ];
    args.extend(extra.iter().map(|s| s.to_string()));
    args
}
