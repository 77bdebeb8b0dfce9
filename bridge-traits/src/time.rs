//! Time and Logging Abstractions
//!
//! Injectable time source (cache timestamps, recency ordering) and the sink
//! through which structured logs reach the host.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::Result;

/// Wall-clock source for `cached_at` and `last_played_at`.
///
/// Tests inject [`ManualClock`](crate::mock::ManualClock) so eviction order
/// is deterministic.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Milliseconds since the Unix epoch, the unit stored on cache records.
    fn unix_timestamp_millis(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// One event as forwarded to the host logger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub timestamp: DateTime<Utc>,
    /// Module path of the emitting code, e.g. `core_playback::cache::manager`
    pub target: String,
    pub message: String,
    /// Structured fields, already rendered to strings
    pub fields: HashMap<String, String>,
    /// Name of the innermost active span
    pub span_id: Option<String>,
}

impl LogEntry {
    pub fn new(level: LogLevel, target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            timestamp: Utc::now(),
            target: target.into(),
            message: message.into(),
            fields: HashMap::new(),
            span_id: None,
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }
}

/// Host logging pipeline (Logcat, OSLog, a desktop log file).
///
/// URL-looking fields are redacted before they reach a sink unless the host
/// disabled redaction.
#[async_trait::async_trait]
pub trait LoggerSink: Send + Sync {
    async fn log(&self, entry: LogEntry) -> Result<()>;

    /// Events below this level are dropped before an entry is built.
    fn min_level(&self) -> LogLevel {
        LogLevel::Info
    }
}
