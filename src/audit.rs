// src/audit.rs

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use chrono::Utc;
use tracing::{error, info, warn};

/// Severity of an audit entry. Window skips and routine cycle results
/// are `Info`; partial dispatch failures are `Warning`; auth and query
/// failures are `Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditLevel {
    Info,
    Warning,
    Error,
}

impl fmt::Display for AuditLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AuditLevel::Info => "INFO",
            AuditLevel::Warning => "WARNING",
            AuditLevel::Error => "ERROR",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub timestamp: chrono::DateTime<Utc>,
    pub level: AuditLevel,
    pub message: String,
}

/// One destination for audit entries. Sinks must never propagate their
/// own failures to the caller.
pub trait AuditSink: Send + Sync {
    fn write(&self, entry: &AuditEntry);
}

/// Mirrors audit entries into the process-wide tracing subscriber.
pub struct TracingSink;

impl AuditSink for TracingSink {
    fn write(&self, entry: &AuditEntry) {
        match entry.level {
            AuditLevel::Info => info!(target: "audit", "{}", entry.message),
            AuditLevel::Warning => warn!(target: "audit", "{}", entry.message),
            AuditLevel::Error => error!(target: "audit", "{}", entry.message),
        }
    }
}

/// Appends audit entries to a configured file. Write errors are
/// swallowed; a broken log file must not disturb a running cycle.
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl AuditSink for FileSink {
    fn write(&self, entry: &AuditEntry) {
        let line = format!(
            "{} - SCHEDULER - {} - {}",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            entry.level,
            entry.message
        );
        let _ = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| writeln!(file, "{}", line));
    }
}

/// Fans each entry out to every configured sink.
pub struct AuditTrail {
    sinks: Vec<Box<dyn AuditSink>>,
}

impl AuditTrail {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn with_sink(mut self, sink: Box<dyn AuditSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn record(&self, level: AuditLevel, message: impl Into<String>) {
        let entry = AuditEntry {
            timestamp: Utc::now(),
            level,
            message: message.into(),
        };
        for sink in &self.sinks {
            sink.write(&entry);
        }
    }

    pub fn info(&self, message: impl Into<String>) {
        self.record(AuditLevel::Info, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.record(AuditLevel::Warning, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.record(AuditLevel::Error, message);
    }
}

impl Default for AuditTrail {
    fn default() -> Self {
        Self::new()
    }
}
