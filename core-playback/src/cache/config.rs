//! Cache configuration

use std::time::Duration;

/// Default storage budget (2 GiB).
pub const DEFAULT_MAX_CACHE_SIZE_BYTES: u64 = 2 * 1024 * 1024 * 1024;

/// Configuration for the offline cache manager.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum summed size of cached payloads (default: 2GiB)
    pub max_cache_size_bytes: u64,

    /// Evict least-recently-played tracks before writing a new one so the
    /// budget is never exceeded (default: true)
    pub auto_evict: bool,

    /// Timeout for a single download attempt (default: 300s)
    pub download_timeout: Duration,

    /// Attempts per download, including the first (default: 3)
    pub max_retry_attempts: u32,

    /// Delay before the first retry; doubled for each further retry (default: 100ms)
    pub retry_base_delay: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_cache_size_bytes: DEFAULT_MAX_CACHE_SIZE_BYTES,
            auto_evict: true,
            download_timeout: Duration::from_secs(300),
            max_retry_attempts: 3,
            retry_base_delay: Duration::from_millis(100),
        }
    }
}

impl CacheConfig {
    /// Create a new cache configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum cache size.
    pub fn with_max_size(mut self, bytes: u64) -> Self {
        self.max_cache_size_bytes = bytes;
        self
    }

    /// Enable or disable eviction on write.
    pub fn with_auto_evict(mut self, enabled: bool) -> Self {
        self.auto_evict = enabled;
        self
    }

    /// Set download timeout.
    pub fn with_download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = timeout;
        self
    }

    pub fn with_max_retry_attempts(mut self, attempts: u32) -> Self {
        self.max_retry_attempts = attempts;
        self
    }

    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    /// Backoff before retry number `retry` (1-based).
    pub fn retry_delay(&self, retry: u32) -> Duration {
        self.retry_base_delay
            .saturating_mul(2u32.saturating_pow(retry.saturating_sub(1)))
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_cache_size_bytes == 0 {
            return Err("max_cache_size_bytes must be greater than 0".to_string());
        }

        if self.max_retry_attempts == 0 {
            return Err("max_retry_attempts must be at least 1".to_string());
        }

        if self.download_timeout.is_zero() {
            return Err("download_timeout must be greater than 0".to_string());
        }

        Ok(())
    }
}
