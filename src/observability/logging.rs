//! Structured JSON logging.
//!
//! # Responsibilities
//! - Emit one single-line JSON object per call to a configured sink
//! - Stamp every record with severity, time and the process defaults
//! - Never fail: unserializable fields degrade to a fallback record
//!
//! # Design Decisions
//! - Defaults (service, environment, version) are fixed at construction
//! - Records below the configured level are dropped before serialization
//! - Process diagnostics go through `tracing`; this logger is for the
//!   request/application stream consumed by the log collector

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};

/// Record severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Debug,
    Info,
    Warn,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warn => "WARNING",
            Severity::Error => "ERROR",
        }
    }

    /// Directive understood by `tracing_subscriber::EnvFilter`.
    pub fn filter_directive(&self) -> &'static str {
        match self {
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warn => "warn",
            Severity::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown log level `{0}` (expected debug, info, warn or error)")]
pub struct ParseSeverityError(String);

impl FromStr for Severity {
    type Err = ParseSeverityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" | "trace" => Ok(Severity::Debug),
            "info" => Ok(Severity::Info),
            "warn" | "warning" => Ok(Severity::Warn),
            "error" => Ok(Severity::Error),
            _ => Err(ParseSeverityError(s.to_string())),
        }
    }
}

/// Metadata attached to every record.
#[derive(Debug, Clone, Serialize)]
pub struct LogDefaults {
    pub service: String,
    pub environment: String,
    pub version: String,
}

/// Fields owned by the logger; call-site fields cannot overwrite them.
const RESERVED_FIELDS: [&str; 3] = ["severity", "time", "message"];

/// Synchronous JSON line logger.
pub struct Logger {
    defaults: LogDefaults,
    min_level: Severity,
    sink: Mutex<Box<dyn Write + Send>>,
}

impl Logger {
    /// Logger writing to standard output.
    pub fn stdout(defaults: LogDefaults, min_level: Severity) -> Self {
        Self::with_sink(defaults, min_level, Box::new(io::stdout()))
    }

    pub fn with_sink(defaults: LogDefaults, min_level: Severity, sink: Box<dyn Write + Send>) -> Self {
        Self {
            defaults,
            min_level,
            sink: Mutex::new(sink),
        }
    }

    pub fn defaults(&self) -> &LogDefaults {
        &self.defaults
    }

    pub fn enabled(&self, severity: Severity) -> bool {
        severity >= self.min_level
    }

    /// Emit one record. `fields` is merged into the base record.
    pub fn log<F: Serialize>(&self, severity: Severity, message: &str, fields: F) {
        if !self.enabled(severity) {
            return;
        }
        let fields = serde_json::to_value(fields);
        self.emit(severity, message, fields, None);
    }

    pub fn info<F: Serialize>(&self, message: &str, fields: F) {
        self.log(Severity::Info, message, fields);
    }

    /// Emit an ERROR record carrying the error's message and source chain.
    pub fn error<F: Serialize>(&self, message: &str, error: &dyn std::error::Error, fields: F) {
        if !self.enabled(Severity::Error) {
            return;
        }
        let detail = serde_json::json!({
            "message": error.to_string(),
            "stack": error_chain(error),
        });
        let fields = serde_json::to_value(fields);
        self.emit(Severity::Error, message, fields, Some(detail));
    }

    fn emit(
        &self,
        severity: Severity,
        message: &str,
        fields: Result<Value, serde_json::Error>,
        error: Option<Value>,
    ) {
        let mut record = self.base_record(severity, message);
        match fields {
            Ok(Value::Object(map)) => {
                for (key, value) in map {
                    if !RESERVED_FIELDS.contains(&key.as_str()) {
                        record.insert(key, value);
                    }
                }
            }
            Ok(Value::Null) => {}
            Ok(other) => {
                record.insert("fields".into(), other);
            }
            Err(e) => {
                record.insert(
                    "logError".into(),
                    Value::String(format!("failed to serialize log fields: {e}")),
                );
            }
        }
        if let Some(error) = error {
            record.insert("error".into(), error);
        }

        let line = serde_json::to_string(&Value::Object(record)).unwrap_or_else(|e| {
            format!(
                r#"{{"severity":"{}","message":"log record dropped","logError":"{}"}}"#,
                severity,
                e.to_string().replace('"', "'")
            )
        });
        self.write_line(&line);
    }

    fn base_record(&self, severity: Severity, message: &str) -> Map<String, Value> {
        let mut record = Map::new();
        record.insert("severity".into(), Value::String(severity.as_str().into()));
        record.insert(
            "time".into(),
            Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        record.insert("message".into(), Value::String(message.into()));
        record.insert("service".into(), Value::String(self.defaults.service.clone()));
        record.insert("environment".into(), Value::String(self.defaults.environment.clone()));
        record.insert("version".into(), Value::String(self.defaults.version.clone()));
        record
    }

    fn write_line(&self, line: &str) {
        let mut sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        let written = sink
            .write_all(line.as_bytes())
            .and_then(|_| sink.write_all(b"\n"))
            .and_then(|_| sink.flush());
        if let Err(e) = written {
            tracing::debug!(error = %e, "Dropped log record");
        }
    }
}

fn error_chain(error: &dyn std::error::Error) -> String {
    let mut chain = vec![error.to_string()];
    let mut source = error.source();
    while let Some(cause) = source {
        chain.push(format!("caused by: {cause}"));
        source = cause.source();
    }
    chain.join("\n")
}

/// In-memory sink shared between a logger and its reader.
#[derive(Clone, Default)]
pub struct MemorySink {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every record written so far, parsed back into JSON.
    pub fn records(&self) -> Vec<Value> {
        let buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buffer)
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }

    pub fn raw(&self) -> String {
        let buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

impl Write for MemorySink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
