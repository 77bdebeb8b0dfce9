//! # Core Configuration
//!
//! [`CoreConfig`] carries the host bridges and tunables shared by the cache,
//! the metadata service and the transport. The builder validates eagerly, so
//! a bad budget or a missing HTTP client fails at startup. With the
//! `desktop-shims` feature the reqwest-backed client is injected when the
//! host does not supply one.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//!
//! let config = CoreConfig::builder()
//!     .database_path("/path/to/player.db")
//!     .cache_budget_bytes(512 * 1024 * 1024)
//!     .shuffle_seed(42)
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{Clock, HttpClient, SystemClock};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default storage budget for cached payloads (2 GiB).
pub const DEFAULT_CACHE_BUDGET_BYTES: u64 = 2 * 1024 * 1024 * 1024;

/// Leading bytes fetched when probing tags of a remote track.
pub const DEFAULT_METADATA_RANGE_BYTES: usize = 262_144;

/// Position after which "previous" restarts the current track.
pub const DEFAULT_RESTART_THRESHOLD_SECS: f64 = 3.0;

/// Core configuration for the player core.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Path to the SQLite database file
    pub database_path: PathBuf,

    /// Upper bound on the summed size of cached payloads
    pub cache_budget_bytes: u64,

    /// Maximum bytes read from a remote track for tag extraction
    pub metadata_range_bytes: usize,

    /// "Previous" restarts the current track when the position exceeds this
    pub restart_threshold_secs: f64,

    /// Seed for the shuffle generator; `None` seeds from entropy
    pub shuffle_seed: Option<u64>,

    /// Capacity of the event bus channel
    pub event_buffer_size: usize,

    /// HTTP client used for downloads and metadata probes
    pub http_client: Arc<dyn HttpClient>,

    /// Time source for cache timestamps
    pub clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("database_path", &self.database_path)
            .field("cache_budget_bytes", &self.cache_budget_bytes)
            .field("metadata_range_bytes", &self.metadata_range_bytes)
            .field("restart_threshold_secs", &self.restart_threshold_secs)
            .field("shuffle_seed", &self.shuffle_seed)
            .field("event_buffer_size", &self.event_buffer_size)
            .field("http_client", &"HttpClient { ... }")
            .field("clock", &"Clock { ... }")
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Location of the SQLite database file.
    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    /// Validates configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.database_path.as_os_str().is_empty() {
            return Err(Error::Config("Database path must not be empty".to_string()));
        }

        if self.cache_budget_bytes == 0 {
            return Err(Error::Config(
                "Cache budget must be greater than zero".to_string(),
            ));
        }

        if self.metadata_range_bytes == 0 {
            return Err(Error::Config(
                "Metadata range size must be greater than zero".to_string(),
            ));
        }

        if !self.restart_threshold_secs.is_finite() || self.restart_threshold_secs < 0.0 {
            return Err(Error::Config(format!(
                "Restart threshold must be a non-negative number of seconds, got {}",
                self.restart_threshold_secs
            )));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

fn http_client_missing_error(detail: Option<String>) -> Error {
    let mut message = "HttpClient implementation is required for downloads and metadata probes. \
         Desktop: enable the `desktop-shims` feature. \
         Other hosts: inject a platform-native adapter with .http_client()."
        .to_string();
    if let Some(detail) = detail {
        message.push_str(&format!(" ({})", detail));
    }
    Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message,
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    bridge_desktop::ReqwestHttpClient::new()
        .map(|client| Arc::new(client) as Arc<dyn HttpClient>)
        .map_err(|e| http_client_missing_error(Some(e.to_string())))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Err(http_client_missing_error(None))
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    database_path: Option<PathBuf>,
    cache_budget_bytes: Option<u64>,
    metadata_range_bytes: Option<usize>,
    restart_threshold_secs: Option<f64>,
    shuffle_seed: Option<u64>,
    event_buffer_size: Option<usize>,
    http_client: Option<Arc<dyn HttpClient>>,
    clock: Option<Arc<dyn Clock>>,
}

impl CoreConfigBuilder {
    /// Sets the database file path (required).
    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Sets the storage budget for cached payloads, in bytes.
    pub fn cache_budget_bytes(mut self, bytes: u64) -> Self {
        self.cache_budget_bytes = Some(bytes);
        self
    }

    /// Sets the number of leading bytes fetched for remote tag extraction.
    pub fn metadata_range_bytes(mut self, bytes: usize) -> Self {
        self.metadata_range_bytes = Some(bytes);
        self
    }

    /// Sets the position (seconds) after which "previous" restarts the track.
    pub fn restart_threshold_secs(mut self, secs: f64) -> Self {
        self.restart_threshold_secs = Some(secs);
        self
    }

    /// Seeds the shuffle generator for reproducible orderings.
    pub fn shuffle_seed(mut self, seed: u64) -> Self {
        self.shuffle_seed = Some(seed);
        self
    }

    /// Sets the event bus capacity.
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Sets the HTTP client implementation.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets the time source. Defaults to [`SystemClock`].
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] when the database path is missing or a value is out of range
    /// - [`Error::CapabilityMissing`] when no HTTP client is available
    pub fn build(self) -> Result<CoreConfig> {
        let database_path = self.database_path.ok_or_else(|| {
            Error::Config("Database path is required. Use .database_path() to set it.".to_string())
        })?;

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client()?,
        };

        let config = CoreConfig {
            database_path,
            cache_budget_bytes: self
                .cache_budget_bytes
                .unwrap_or(DEFAULT_CACHE_BUDGET_BYTES),
            metadata_range_bytes: self
                .metadata_range_bytes
                .unwrap_or(DEFAULT_METADATA_RANGE_BYTES),
            restart_threshold_secs: self
                .restart_threshold_secs
                .unwrap_or(DEFAULT_RESTART_THRESHOLD_SECS),
            shuffle_seed: self.shuffle_seed,
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
            http_client,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
        };

        config.validate()?;

        Ok(config)
    }
}
