//! Core service façade and bootstrap helpers.
//!
//! This crate wires a [`CoreConfig`] and host bridges into the cache manager,
//! the metadata service and the transport. Desktop apps typically enable the
//! `desktop-shims` feature, which lets the config fall back to the
//! reqwest-backed [`ReqwestHttpClient`].
//!
//! The façade also owns the lifecycle of memoized metadata: a track that is
//! (re)cached or removed drops its memoized entry, and clearing the cache
//! drops them all.

pub mod error;

pub use error::{CoreError, Result};

#[cfg(feature = "desktop-shims")]
pub use bridge_desktop::ReqwestHttpClient;

use std::sync::Arc;

use bridge_traits::playback::PlaybackAdapter;
use core_library::db::{create_pool, DatabaseConfig};
use core_library::models::Track;
use core_library::repositories::{BlobStore, SqliteBlobStore};
use core_metadata::{AudioMetadata, MetadataService, PayloadSource, RangeFetcher};
use core_playback::cache::{CacheConfig, CacheManager};
use core_playback::transport::{Transport, TransportConfig};
use core_playback::ProgressSink;
use core_runtime::config::CoreConfig;
use core_runtime::events::{EventBus, EventStream};
use tracing::info;

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    config: Arc<CoreConfig>,
    event_bus: EventBus,
    cache: Arc<CacheManager>,
    metadata: Arc<MetadataService>,
}

impl CoreService {
    /// Open (or create) the SQLite database at `config.database_path` and
    /// build the service on top of it.
    ///
    /// A path of `:memory:` uses a private in-memory database.
    pub async fn bootstrap(config: CoreConfig) -> Result<Self> {
        let db_config = if config.database_path.as_os_str() == ":memory:" {
            DatabaseConfig::in_memory()
        } else {
            DatabaseConfig::new(config.database_path.clone())
        };
        let pool = create_pool(db_config).await?;

        Self::with_store(config, Arc::new(SqliteBlobStore::new(pool)))
    }

    /// Build the service over an existing blob store.
    pub fn with_store(config: CoreConfig, store: Arc<dyn BlobStore>) -> Result<Self> {
        config.validate()?;

        let event_bus = EventBus::new(config.event_buffer_size);

        let cache_config = CacheConfig::default().with_max_size(config.cache_budget_bytes);
        let cache = Arc::new(
            CacheManager::new(
                cache_config,
                store,
                Arc::clone(&config.http_client),
                Arc::clone(&config.clock),
            )?
            .with_event_bus(event_bus.clone()),
        );

        let range_fetcher =
            RangeFetcher::with_max_bytes(Arc::clone(&config.http_client), config.metadata_range_bytes);
        let payload_source: Arc<dyn PayloadSource> = cache.clone();
        let metadata = Arc::new(
            MetadataService::with_range_fetcher(range_fetcher).with_payload_source(payload_source),
        );

        info!(
            database_path = %config.database_path.display(),
            cache_budget_bytes = config.cache_budget_bytes,
            "Core service initialized"
        );

        Ok(Self {
            config: Arc::new(config),
            event_bus,
            cache,
            metadata,
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn cache(&self) -> Arc<CacheManager> {
        Arc::clone(&self.cache)
    }

    pub fn metadata(&self) -> Arc<MetadataService> {
        Arc::clone(&self.metadata)
    }

    pub fn events(&self) -> &EventBus {
        &self.event_bus
    }

    /// Subscribe to cache and playback events.
    pub fn subscribe(&self) -> EventStream {
        EventStream::new(self.event_bus.subscribe())
    }

    /// Build a transport driving `adapter`, resolving sources through the cache.
    pub fn transport(&self, adapter: Arc<dyn PlaybackAdapter>) -> Result<Transport> {
        let mut transport_config =
            TransportConfig::default().with_restart_threshold(self.config.restart_threshold_secs);
        if let Some(seed) = self.config.shuffle_seed {
            transport_config = transport_config.with_shuffle_seed(seed);
        }

        let transport = Transport::new(transport_config, adapter, self.cache.clone())?
            .with_event_bus(self.event_bus.clone());
        Ok(transport)
    }

    // ========================================================================
    // Cache operations with metadata invalidation
    // ========================================================================

    /// Cache `track`; a success drops its memoized metadata so the next
    /// lookup reads the full payload.
    pub async fn cache_track(&self, track: &Track, on_progress: Option<ProgressSink>) -> bool {
        let cached = self.cache.cache_track(track, on_progress).await;
        if cached {
            self.metadata.invalidate(&track.file_id);
        }
        cached
    }

    pub async fn remove_cached_track(&self, track_id: &str) -> bool {
        let removed = self.cache.remove(track_id).await;
        self.metadata.invalidate(track_id);
        removed
    }

    pub async fn clear_cache(&self) -> Result<u64> {
        let cleared = self.cache.clear().await?;
        self.metadata.invalidate_all();
        Ok(cleared)
    }

    /// Metadata for `track`, or `None` when nothing could be extracted.
    pub async fn get_metadata(&self, track: &Track) -> Option<Arc<AudioMetadata>> {
        self.metadata
            .get_metadata(&track.file_id, &track.stream_url, track.file_size)
            .await
    }
}
