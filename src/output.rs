// ABOUTME: Output formatting for CLI feedback.
// ABOUTME: Supports normal, quiet (CI), and JSON output modes.

use serde::Serialize;
use std::time::Instant;

use crate::orchestrator::{DeploymentContext, DeploymentState};

/// Output mode for CLI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-friendly output with progress messages
    Normal,
    /// Final result only, for CI logs
    Quiet,
    /// One JSON object per line
    Json,
}

#[derive(Serialize)]
struct JsonEvent<'a> {
    event: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
}

#[derive(Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

/// Handles CLI output based on the configured mode.
pub struct Output {
    mode: OutputMode,
    started: Option<Instant>,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            started: None,
        }
    }

    pub fn start_timer(&mut self) {
        self.started = Some(Instant::now());
    }

    fn elapsed(&self) -> Option<f64> {
        self.started.map(|t| t.elapsed().as_secs_f64())
    }

    fn emit_json(&self, stream: Stream, event: &str, message: &str, timed: bool) {
        let event = JsonEvent {
            event,
            message,
            duration_secs: if timed { self.elapsed() } else { None },
        };
        let Ok(line) = serde_json::to_string(&event) else {
            return;
        };
        match stream {
            Stream::Stdout => println!("{line}"),
            Stream::Stderr => eprintln!("{line}"),
        }
    }

    /// Progress line, shown in normal mode only.
    pub fn progress(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            println!("{message}");
        }
    }

    pub fn success(&self, message: &str) {
        match self.mode {
            OutputMode::Normal => match self.elapsed() {
                Some(secs) => println!("{message} ({secs:.1}s)"),
                None => println!("{message}"),
            },
            OutputMode::Quiet => println!("{message}"),
            OutputMode::Json => self.emit_json(Stream::Stdout, "success", message, true),
        }
    }

    pub fn warning(&self, message: &str) {
        match self.mode {
            OutputMode::Normal => eprintln!("Warning: {message}"),
            OutputMode::Quiet => {}
            OutputMode::Json => self.emit_json(Stream::Stderr, "warning", message, false),
        }
    }

    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => eprintln!("Error: {message}"),
            OutputMode::Json => self.emit_json(Stream::Stderr, "error", message, true),
        }
    }

    /// Print a structured document. Only emitted in json mode.
    pub fn document<T: Serialize>(&self, value: &T) {
        if self.mode == OutputMode::Json
            && let Ok(json) = serde_json::to_string(value)
        {
            println!("{json}");
        }
    }

    /// Summarize a finished (or persisted) run.
    ///
    /// Failures and resources that are still live go to stderr even in quiet
    /// mode, so an operator can clean up by hand.
    pub fn report(&self, ctx: &DeploymentContext) {
        if self.mode == OutputMode::Json {
            self.document(ctx);
            return;
        }

        let state = ctx.state();
        if self.mode == OutputMode::Normal {
            let name = ctx
                .app_name()
                .map(|n| n.to_string())
                .unwrap_or_else(|| ctx.spec_path.display().to_string());
            println!("{name}: {state}");
            if let Some(status) = ctx.deploy_status {
                println!("  status: {status}");
            }
            if let Some(ref url) = ctx.deployed_url {
                println!("  url: {url}");
            }
            if let Some(ref hash) = ctx.spec_hash {
                println!("  spec hash: {hash}");
            }
        }

        if let Some(error) = ctx.error() {
            eprintln!(
                "  failed during {}: {error}",
                ctx.error_step().unwrap_or("unknown step")
            );
        }
        for rollback_error in ctx.rollback_errors() {
            eprintln!("  {rollback_error}");
        }

        let live = ctx.live_resources();
        if state != DeploymentState::Complete && !live.is_empty() {
            eprintln!("  resources still live:");
            for record in live {
                eprintln!("    {} {}", record.resource_type, record.resource_id);
            }
        }
    }
}
