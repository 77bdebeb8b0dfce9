//! # Logging
//!
//! Installs the global `tracing` subscriber for the player core:
//!
//! - an [`EnvFilter`] built from the workspace crates and the configured level
//!   (an explicit filter or `RUST_LOG` takes precedence)
//! - a formatting layer chosen by [`LogFormat`]
//! - an optional layer mirroring each event to a host [`LoggerSink`]
//!
//! Stream URLs are frequently pre-signed, so [`redact_url`] is applied to
//! logged URLs and, unless disabled, to any URL-looking field handed to the
//! host sink.
//!
//! ```ignore
//! use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
//! use bridge_traits::time::LogLevel;
//!
//! init_logging(
//!     LoggingConfig::default()
//!         .with_format(LogFormat::Compact)
//!         .with_level(LogLevel::Debug),
//! )?;
//! ```

use crate::error::{Error, Result};

use bridge_traits::time::{LogEntry, LogLevel, LoggerSink};

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::{
    filter::EnvFilter,
    fmt::format::FmtSpan,
    layer::{Context, SubscriberExt},
    registry::LookupSpan,
    util::SubscriberInitExt,
    Layer,
};

/// Crates whose events are shown at the configured level by default.
const WORKSPACE_TARGETS: &[&str] = &[
    "offline_player",
    "core_runtime",
    "core_library",
    "core_metadata",
    "core_playback",
    "core_service",
    "bridge_desktop",
];

/// Dependencies capped at warn unless a filter says otherwise.
const QUIET_TARGETS: &[&str] = &["h2", "hyper", "reqwest", "sqlx", "lofty"];

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Multi-line, colored; closes spans with their timings
    #[cfg_attr(debug_assertions, default)]
    Pretty,
    /// One JSON object per event, fields flattened
    #[cfg_attr(not(debug_assertions), default)]
    Json,
    /// Single line per event
    Compact,
}

/// Logging configuration
#[derive(Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Level applied to the workspace crates
    pub level: LogLevel,
    /// Full filter directive; replaces the per-crate defaults and `RUST_LOG`
    pub filter: Option<String>,
    /// Host logger receiving a copy of every event
    pub logger_sink: Option<Arc<dyn LoggerSink>>,
    /// Redact URL-looking fields before they reach the logger sink
    pub redact_urls: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: LogLevel::Info,
            filter: None,
            logger_sink: None,
            redact_urls: true,
        }
    }
}

impl LoggingConfig {
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_logger_sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.logger_sink = Some(sink);
        self
    }

    pub fn with_url_redaction(mut self, redact: bool) -> Self {
        self.redact_urls = redact;
        self
    }
}

/// Install the global subscriber.
///
/// Call once at startup.
///
/// # Errors
///
/// [`Error::Config`] if the filter is invalid and [`Error::Logging`] if a
/// global subscriber is already installed.
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let filter = build_filter(&config)?;
    let sink_layer = LoggerSinkLayer::new(config.logger_sink.clone(), config.redact_urls);

    let fmt_layer = match config.format {
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_span_events(FmtSpan::CLOSE)
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_span_list(false)
            .boxed(),
        LogFormat::Compact => tracing_subscriber::fmt::layer()
            .compact()
            .with_target(false)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(sink_layer)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| Error::Logging(e.to_string()))
}

fn level_str(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Trace => "trace",
        LogLevel::Debug => "debug",
        LogLevel::Info => "info",
        LogLevel::Warn => "warn",
        LogLevel::Error => "error",
    }
}

/// Explicit filter first, then `RUST_LOG`, then workspace crates at the
/// configured level with noisy dependencies held at warn.
fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Some(custom) = &config.filter {
        return EnvFilter::try_new(custom)
            .map_err(|e| Error::Config(format!("Invalid log filter: {}", e)));
    }

    if let Ok(from_env) = EnvFilter::try_from_default_env() {
        return Ok(from_env);
    }

    let level = level_str(config.level);
    let directives = WORKSPACE_TARGETS
        .iter()
        .map(|target| format!("{}={}", target, level))
        .chain(QUIET_TARGETS.iter().map(|target| format!("{}=warn", target)))
        .collect::<Vec<_>>()
        .join(",");

    EnvFilter::try_new(directives).map_err(|e| Error::Config(format!("Invalid log filter: {}", e)))
}

/// Layer that forwards events to a `LoggerSink` implementation.
struct LoggerSinkLayer {
    sink: Option<Arc<dyn LoggerSink>>,
    redact_urls: bool,
}

impl LoggerSinkLayer {
    fn new(sink: Option<Arc<dyn LoggerSink>>, redact_urls: bool) -> Self {
        Self { sink, redact_urls }
    }
}

impl<S> Layer<S> for LoggerSinkLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let Some(sink) = self.sink.as_ref() else {
            return;
        };

        let metadata = event.metadata();
        let level = tracing_level_to_log_level(*metadata.level());

        if level < sink.min_level() {
            return;
        }

        let mut visitor = SinkVisitor::default();
        event.record(&mut visitor);

        let message = visitor
            .message
            .unwrap_or_else(|| metadata.name().to_string());

        let mut entry = LogEntry::new(level, metadata.target(), message);

        for (key, value) in visitor.fields {
            let value = if self.redact_urls && value.contains("://") {
                redact_url(&value)
            } else {
                value
            };
            entry = entry.with_field(key, value);
        }

        if let Some(span) = ctx.lookup_current() {
            entry.span_id = Some(span.name().to_string());
        }

        let sink = Arc::clone(sink);

        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if let Err(err) = sink.log(entry).await {
                    eprintln!("LoggerSink error: {}", err);
                }
            });
            return;
        }

        if let Err(err) = futures::executor::block_on(async move { sink.log(entry).await }) {
            eprintln!("LoggerSink error: {}", err);
        }
    }
}

#[derive(Default)]
struct SinkVisitor {
    message: Option<String>,
    fields: HashMap<String, String>,
}

impl SinkVisitor {
    fn record_value(&mut self, field: &Field, value: String) {
        if field.name() == "message" {
            self.message = Some(value);
        } else {
            self.fields.insert(field.name().to_string(), value);
        }
    }
}

impl Visit for SinkVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.record_value(field, value.to_string());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.record_value(field, value.to_string());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.record_value(field, value.to_string());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.record_value(field, value.to_string());
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.record_value(field, value.to_string());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.record_value(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.record_value(field, format!("{:?}", value));
    }
}

fn tracing_level_to_log_level(level: tracing::Level) -> LogLevel {
    match level {
        tracing::Level::TRACE => LogLevel::Trace,
        tracing::Level::DEBUG => LogLevel::Debug,
        tracing::Level::INFO => LogLevel::Info,
        tracing::Level::WARN => LogLevel::Warn,
        tracing::Level::ERROR => LogLevel::Error,
    }
}

/// Drop the query string and fragment from a URL before logging it.
///
/// Stream URLs handed out by storage providers are frequently pre-signed,
/// so everything after `?` is treated as a credential.
///
/// ```
/// use core_runtime::logging::redact_url;
///
/// assert_eq!(
///     redact_url("https://cdn.example.com/a.mp3?sig=abc&exp=1"),
///     "https://cdn.example.com/a.mp3?[REDACTED]"
/// );
/// ```
pub fn redact_url(url: &str) -> String {
    match url.find(['?', '#']) {
        Some(pos) => format!("{}?[REDACTED]", &url[..pos]),
        None => url.to_string(),
    }
}
