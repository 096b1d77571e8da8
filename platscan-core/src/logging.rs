//! Logging sink handed explicitly to every pipeline component.
//!
//! Components never reach for a global logger; they receive an `EventLog`
//! and record `(severity, message)` pairs on it. `TracingLog` forwards to
//! the `tracing` macros so the CLI's subscriber decides where events land.

use serde::Serialize;
use std::fmt;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Progress
    Info,
    /// Skipped files and recoverable page/image failures
    Warning,
    /// Writer failures and fatal processor failures
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => f.write_str("info"),
            Severity::Warning => f.write_str("warning"),
            Severity::Error => f.write_str("error"),
        }
    }
}

/// Minimal logging contract used by the pipeline. Must accept concurrent
/// writes when the batch runs on more than one worker.
pub trait EventLog: Send + Sync {
    fn record(&self, severity: Severity, message: &str);

    fn info(&self, message: &str) {
        self.record(Severity::Info, message);
    }

    fn warning(&self, message: &str) {
        self.record(Severity::Warning, message);
    }

    fn error(&self, message: &str) {
        self.record(Severity::Error, message);
    }
}

/// Forwards events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLog;

impl EventLog for TracingLog {
    fn record(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Info => tracing::info!(target: "platscan", "{}", message),
            Severity::Warning => tracing::warn!(target: "platscan", "{}", message),
            Severity::Error => tracing::error!(target: "platscan", "{}", message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEvent {
    pub severity: Severity,
    pub message: String,
}

/// Keeps every event in memory. Used by tests and by callers that want to
/// inspect what a run reported.
#[derive(Debug, Default)]
pub struct MemoryLog {
    events: Mutex<Vec<LogEvent>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LogEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.events()
            .iter()
            .filter(|e| e.severity == severity)
            .count()
    }

    pub fn messages(&self, severity: Severity) -> Vec<String> {
        self.events()
            .into_iter()
            .filter(|e| e.severity == severity)
            .map(|e| e.message)
            .collect()
    }
}

impl EventLog for MemoryLog {
    fn record(&self, severity: Severity, message: &str) {
        let event = LogEvent {
            severity,
            message: message.to_string(),
        };
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}
