// ABOUTME: Output formatting for setup and detection results.
// ABOUTME: Supports normal, quiet (runtime name only), and JSON output modes.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;

/// Output mode for CLI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-friendly output
    Normal,
    /// Only the resolved runtime name
    Quiet,
    /// One JSON object per event
    Json,
}

/// A result that can be printed in every output mode.
pub trait Report: Serialize {
    /// Event name used in JSON mode.
    fn event(&self) -> &'static str;

    /// Human-readable lines for normal mode.
    fn summary(&self) -> Vec<String>;

    /// The single value printed in quiet mode.
    fn essential(&self) -> String;
}

/// Result of a completed `setup`.
#[derive(Debug, Clone, Serialize)]
pub struct SetupReport {
    pub runtime: String,
    pub node: String,
    pub hook_script: PathBuf,
    pub hook_declaration: PathBuf,
    pub socket: PathBuf,
    pub warnings: Vec<String>,
    pub completed_at: DateTime<Utc>,
}

impl Report for SetupReport {
    fn event(&self) -> &'static str {
        "setup"
    }

    fn summary(&self) -> Vec<String> {
        let mut lines = vec![
            format!("Node: {}", self.node),
            format!("Default runtime: {}", self.runtime),
            format!("Hook script: {}", self.hook_script.display()),
            format!("Hook declaration: {}", self.hook_declaration.display()),
            format!("CRI-O socket: {}", self.socket.display()),
        ];
        lines.extend(self.warnings.iter().map(|w| format!("Warning: {w}")));
        lines
    }

    fn essential(&self) -> String {
        self.runtime.clone()
    }
}

/// Result of `detect`.
#[derive(Debug, Clone, Serialize)]
pub struct DetectReport {
    pub runtime: String,
    pub node: String,
    pub config_file: PathBuf,
    pub drop_in_dir: PathBuf,
    pub warnings: Vec<String>,
}

impl Report for DetectReport {
    fn event(&self) -> &'static str {
        "detect"
    }

    fn summary(&self) -> Vec<String> {
        let mut lines = vec![
            format!("Node: {}", self.node),
            format!(
                "Default runtime: {} (from {} and {})",
                self.runtime,
                self.config_file.display(),
                self.drop_in_dir.display()
            ),
        ];
        lines.extend(self.warnings.iter().map(|w| format!("Warning: {w}")));
        lines
    }

    fn essential(&self) -> String {
        self.runtime.clone()
    }
}

/// Handles CLI output based on the configured mode.
pub struct Output {
    mode: OutputMode,
    start_time: Option<Instant>,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            start_time: None,
        }
    }

    /// Start timing an operation.
    pub fn start_timer(&mut self) {
        self.start_time = Some(Instant::now());
    }

    /// Get elapsed time since timer started.
    pub fn elapsed_secs(&self) -> f64 {
        self.start_time
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    /// Print a progress message (suppressed in quiet/json mode).
    pub fn progress(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            println!("{message}");
        }
    }

    /// Print a finished result.
    pub fn report<R: Report>(&self, report: &R) {
        match self.mode {
            OutputMode::Normal => {
                for line in report.summary() {
                    println!("{line}");
                }
                if self.start_time.is_some() {
                    println!("Done ({:.1}s)", self.elapsed_secs());
                }
            }
            OutputMode::Quiet => {
                println!("{}", report.essential());
            }
            OutputMode::Json => {
                let event = JsonEvent {
                    event: report.event(),
                    duration_secs: self.start_time.map(|_| self.elapsed_secs()),
                    report,
                };
                if let Ok(json) = serde_json::to_string(&event) {
                    println!("{json}");
                }
            }
        }
    }

    /// Print an error message.
    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => {
                eprintln!("Error: {message}");
            }
            OutputMode::Json => {
                let event = JsonError {
                    event: "error",
                    message,
                    duration_secs: self.start_time.map(|_| self.elapsed_secs()),
                };
                if let Ok(json) = serde_json::to_string(&event) {
                    eprintln!("{json}");
                }
            }
        }
    }
}

#[derive(Serialize)]
struct JsonEvent<'a, R: Serialize> {
    event: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
    #[serde(flatten)]
    report: &'a R,
}

#[derive(Serialize)]
struct JsonError<'a> {
    event: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
}
