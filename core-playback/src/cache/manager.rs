//! # Offline Cache Manager
//!
//! Orchestrates the blob store, the streaming downloader and the metadata
//! extractor: cache-or-fetch, size accounting and least-recently-played
//! eviction.
//!
//! ## Guarantees
//!
//! - A record is written only after the whole payload arrived. Failed,
//!   timed out and cancelled downloads never reach the store.
//! - Concurrent `cache_track` calls for one track id share a single
//!   download and its outcome.
//! - Eviction and the write that triggered it run under one lock, so two
//!   downloads finishing together cannot both squeeze into the same space.
//! - The track registered via [`CacheManager::set_now_playing`] is never
//!   evicted.

use crate::cache::config::CacheConfig;
use crate::cache::stats::{CacheStats, DownloadProgress};
use crate::download::{ProgressSink, StreamingDownloader};
use crate::error::{PlaybackError, Result};
use crate::transport::SourceResolver;
use async_trait::async_trait;
use bridge_traits::http::HttpClient;
use bridge_traits::playback::AudioSource;
use bridge_traits::time::Clock;
use bytes::Bytes;
use core_library::models::{CachedTrackRecord, CachedTrackSummary, Track};
use core_library::repositories::BlobStore;
use core_metadata::{CachedPayload, MetadataExtractor, PayloadSource};
use core_runtime::events::{CacheEvent, CoreEvent, EventBus};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// A download currently running for one track id.
struct InFlight {
    result: Shared<BoxFuture<'static, bool>>,
    cancel: CancellationToken,
    progress: Arc<Mutex<DownloadProgress>>,
}

/// Offline cache manager.
///
/// Cheap to clone; clones share the store, the in-flight registry and the
/// playback protection.
#[derive(Clone)]
pub struct CacheManager {
    config: Arc<CacheConfig>,
    store: Arc<dyn BlobStore>,
    downloader: Arc<StreamingDownloader>,
    extractor: MetadataExtractor,
    clock: Arc<dyn Clock>,
    event_bus: Option<EventBus>,
    in_flight: Arc<Mutex<HashMap<String, InFlight>>>,
    now_playing: Arc<RwLock<Option<String>>>,
    write_lock: Arc<tokio::sync::Mutex<()>>,
}

impl CacheManager {
    /// Create a cache manager.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybackError::Config`] when `config` does not validate.
    pub fn new(
        config: CacheConfig,
        store: Arc<dyn BlobStore>,
        http_client: Arc<dyn HttpClient>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate().map_err(PlaybackError::Config)?;

        Ok(Self {
            config: Arc::new(config),
            store,
            downloader: Arc::new(StreamingDownloader::new(http_client)),
            extractor: MetadataExtractor::new(),
            clock,
            event_bus: None,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            now_playing: Arc::new(RwLock::new(None)),
            write_lock: Arc::new(tokio::sync::Mutex::new(())),
        })
    }

    /// Publish cache events on `event_bus`.
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Whether a complete payload for `track_id` is resident.
    ///
    /// A storage failure reads as "not cached".
    pub async fn is_cached(&self, track_id: &str) -> bool {
        match self.store.has_payload(track_id).await {
            Ok(cached) => cached,
            Err(e) => {
                warn!(track_id, error = %e, "Cache lookup failed, treating as not cached");
                false
            }
        }
    }

    /// The cached record, or `None` when absent or unreadable.
    pub async fn get(&self, track_id: &str) -> Option<CachedTrackRecord> {
        match self.store.get(track_id).await {
            Ok(record) => record,
            Err(e) => {
                warn!(track_id, error = %e, "Failed to read cached record");
                None
            }
        }
    }

    pub async fn list_all(&self) -> Result<Vec<CachedTrackRecord>> {
        Ok(self.store.list_all().await?)
    }

    pub async fn list_summaries(&self) -> Result<Vec<CachedTrackSummary>> {
        Ok(self.store.list_summaries().await?)
    }

    pub async fn total_size(&self) -> Result<u64> {
        Ok(self.store.total_size().await?)
    }

    pub async fn stats(&self) -> Result<CacheStats> {
        let summaries = self.store.list_summaries().await?;
        Ok(CacheStats::from_summaries(&summaries))
    }

    /// Persisted cover image of a cached track.
    pub async fn cover_art(&self, track_id: &str) -> Option<String> {
        match self.store.cover_art(track_id).await {
            Ok(cover_art) => cover_art,
            Err(e) => {
                warn!(track_id, error = %e, "Failed to read cover art");
                None
            }
        }
    }

    /// Local payload when resident, otherwise the track's stream URL.
    #[instrument(skip(self, track), fields(track_id = %track.file_id))]
    pub async fn resolve_playback_source(&self, track: &Track) -> AudioSource {
        match self.get(&track.file_id).await {
            Some(record) if !record.payload.is_empty() => {
                debug!(bytes = record.file_size, "Resolved cached payload");
                AudioSource::CachedBlob {
                    track_id: record.id,
                    data: record.payload,
                }
            }
            _ => AudioSource::RemoteStream {
                url: track.stream_url.clone(),
            },
        }
    }

    // ========================================================================
    // Caching
    // ========================================================================

    /// Download `track` into the cache.
    ///
    /// Returns `true` when the track is resident afterwards. A track that is
    /// already cached returns immediately. A call that arrives while a
    /// download for the same id is running waits for that download instead
    /// of starting another; only the initiating call's `on_progress` sink is
    /// driven.
    ///
    /// Every failure (network, status, timeout, cancellation, storage) is
    /// logged and reported as `false`.
    #[instrument(skip(self, track, on_progress), fields(track_id = %track.file_id))]
    pub async fn cache_track(&self, track: &Track, on_progress: Option<ProgressSink>) -> bool {
        if let Err(e) = track.validate() {
            warn!(error = %e, "Refusing to cache invalid track");
            return false;
        }

        match self.store.has_payload(&track.file_id).await {
            Ok(true) => {
                debug!("Track already cached");
                return true;
            }
            Ok(false) => {}
            Err(e) => warn!(error = %e, "Cache lookup failed, downloading anyway"),
        }

        let result = {
            let mut in_flight = self.in_flight.lock();
            match in_flight.get(&track.file_id) {
                Some(existing) => {
                    debug!("Joining in-flight download");
                    existing.result.clone()
                }
                None => {
                    let entry = self.spawn_download(track.clone(), on_progress);
                    let result = entry.result.clone();
                    in_flight.insert(track.file_id.clone(), entry);
                    result
                }
            }
        };

        result.await
    }

    /// Start the download task. Must be called with the in-flight registry
    /// locked; the task removes its own entry once the outcome is settled.
    fn spawn_download(&self, track: Track, on_progress: Option<ProgressSink>) -> InFlight {
        let cancel = CancellationToken::new();
        let progress = Arc::new(Mutex::new(DownloadProgress::new(
            track.file_id.clone(),
            self.clock.unix_timestamp_millis(),
        )));

        let manager = self.clone();
        let task_cancel = cancel.clone();
        let task_progress = Arc::clone(&progress);
        let handle = tokio::spawn(async move {
            let cached = manager
                .run_download(&track, on_progress, &task_cancel, task_progress)
                .await;
            manager.in_flight.lock().remove(&track.file_id);
            cached
        });

        let result = async move {
            match handle.await {
                Ok(cached) => cached,
                Err(e) => {
                    error!(error = %e, "Download task failed");
                    false
                }
            }
        }
        .boxed()
        .shared();

        InFlight {
            result,
            cancel,
            progress,
        }
    }

    async fn run_download(
        &self,
        track: &Track,
        on_progress: Option<ProgressSink>,
        cancel: &CancellationToken,
        progress: Arc<Mutex<DownloadProgress>>,
    ) -> bool {
        let track_id = track.file_id.clone();

        // A download that finished between the caller's lookup and this
        // task's registration has already stored the record.
        if let Ok(true) = self.store.has_payload(&track_id).await {
            debug!(track_id = %track_id, "Track cached while waiting, skipping download");
            return true;
        }

        info!(track_id = %track_id, "Starting download");
        self.emit(CacheEvent::DownloadStarted {
            track_id: track_id.clone(),
        });

        match self.download_and_store(track, on_progress, cancel, progress).await {
            Ok(bytes) => {
                info!(track_id = %track_id, bytes, "Track cached");
                self.emit(CacheEvent::TrackCached { track_id, bytes });
                true
            }
            Err(e) => {
                match &e {
                    PlaybackError::Aborted => info!(track_id = %track_id, "Download cancelled"),
                    _ => error!(track_id = %track_id, error = %e, "Failed to cache track"),
                }
                self.emit(CacheEvent::DownloadFailed {
                    track_id,
                    message: e.to_string(),
                });
                false
            }
        }
    }

    /// Download, extract cover art, make room and write. Returns the stored size.
    async fn download_and_store(
        &self,
        track: &Track,
        on_progress: Option<ProgressSink>,
        cancel: &CancellationToken,
        progress: Arc<Mutex<DownloadProgress>>,
    ) -> Result<u64> {
        let payload = self
            .download_with_retry(track, on_progress, cancel, progress)
            .await?;

        if payload.is_empty() {
            return Err(PlaybackError::Decode("Downloaded payload is empty".to_string()));
        }

        let size = payload.len() as u64;
        let budget = self.config.max_cache_size_bytes;
        if self.config.auto_evict && size > budget {
            return Err(PlaybackError::BudgetExceeded { size, budget });
        }

        let cover_art = self.extract_cover_art(&track.file_id, payload.clone()).await;

        if cancel.is_cancelled() {
            return Err(PlaybackError::Aborted);
        }

        let record = CachedTrackRecord::from_download(
            track,
            payload,
            cover_art,
            self.clock.unix_timestamp_millis(),
        );

        let _guard = self.write_lock.lock().await;
        if self.config.auto_evict {
            let evicted = self.evict_locked(budget - size).await?;
            if evicted > 0 {
                debug!(evicted, "Made room for new track");
            }
        }
        self.store.put(&record).await?;

        Ok(size)
    }

    /// Run download attempts until one succeeds, a terminal error occurs or
    /// the attempts are exhausted.
    async fn download_with_retry(
        &self,
        track: &Track,
        on_progress: Option<ProgressSink>,
        cancel: &CancellationToken,
        progress: Arc<Mutex<DownloadProgress>>,
    ) -> Result<Bytes> {
        let sink = self.progress_sink(Arc::clone(&progress), on_progress);
        let max_attempts = self.config.max_retry_attempts.max(1);
        let mut attempt = 1;

        loop {
            progress.lock().attempt = attempt;
            debug!(attempt, max_attempts, "Download attempt");

            let result = match tokio::time::timeout(
                self.config.download_timeout,
                self.downloader
                    .download(&track.stream_url, track.file_size, Some(&sink), cancel),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(PlaybackError::Timeout(self.config.download_timeout)),
            };

            match result {
                Ok(payload) => return Ok(payload),
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    let delay = self.config.retry_delay(attempt);
                    warn!(
                        attempt,
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "Download attempt failed, retrying"
                    );
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(PlaybackError::Aborted),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Sink shared by every attempt of one download. Percentages below what
    /// an earlier attempt reached are recorded nowhere and not forwarded.
    fn progress_sink(
        &self,
        progress: Arc<Mutex<DownloadProgress>>,
        on_progress: Option<ProgressSink>,
    ) -> ProgressSink {
        let clock = Arc::clone(&self.clock);
        Arc::new(move |percent| {
            let accepted = progress
                .lock()
                .update(percent, clock.unix_timestamp_millis());
            if accepted {
                if let Some(sink) = &on_progress {
                    sink(percent.clamp(0.0, 100.0));
                }
            }
        })
    }

    /// Cover art is best effort; an unreadable container still gets cached.
    async fn extract_cover_art(&self, track_id: &str, payload: Bytes) -> Option<String> {
        let extractor = self.extractor;
        let extracted =
            tokio::task::spawn_blocking(move || extractor.extract_cover_art(&payload, None)).await;

        match extracted {
            Ok(Ok(cover_art)) => cover_art,
            Ok(Err(e)) => {
                warn!(track_id, error = %e, "Could not read cover art from payload");
                None
            }
            Err(e) => {
                warn!(track_id, error = %e, "Cover art task failed");
                None
            }
        }
    }

    // ========================================================================
    // Download management
    // ========================================================================

    /// Abandon the running download of `track_id`.
    ///
    /// Returns `false` when no download is running. Waiting callers observe
    /// `false` from `cache_track` and nothing is written.
    pub fn cancel_download(&self, track_id: &str) -> bool {
        match self.in_flight.lock().get(track_id) {
            Some(entry) => {
                info!(track_id, "Cancelling download");
                entry.cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub fn download_progress(&self, track_id: &str) -> Option<DownloadProgress> {
        self.in_flight
            .lock()
            .get(track_id)
            .map(|entry| entry.progress.lock().clone())
    }

    pub fn active_downloads(&self) -> Vec<DownloadProgress> {
        self.in_flight
            .lock()
            .values()
            .map(|entry| entry.progress.lock().clone())
            .collect()
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Delete a cached track. Returns whether a record was removed.
    #[instrument(skip(self))]
    pub async fn remove(&self, track_id: &str) -> bool {
        let _guard = self.write_lock.lock().await;
        match self.store.delete(track_id).await {
            Ok(true) => {
                info!("Removed cached track");
                self.emit(CacheEvent::TrackRemoved {
                    track_id: track_id.to_string(),
                });
                true
            }
            Ok(false) => false,
            Err(e) => {
                error!(error = %e, "Failed to remove cached track");
                false
            }
        }
    }

    /// Delete every cached track. Returns the number of records removed.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<u64> {
        let _guard = self.write_lock.lock().await;
        let tracks = self.store.clear().await?;
        info!(tracks, "Cleared offline cache");
        self.emit(CacheEvent::CacheCleared { tracks });
        Ok(tracks)
    }

    /// Stamp the last playback start. A missing record is not an error.
    pub async fn update_last_played(&self, track_id: &str) -> bool {
        let now = self.clock.unix_timestamp_millis();
        match self.store.set_last_played(track_id, now).await {
            Ok(updated) => updated,
            Err(e) => {
                warn!(track_id, error = %e, "Failed to update last played time");
                false
            }
        }
    }

    /// Replace the cover image of an existing record.
    pub async fn update_cover_art(&self, track_id: &str, cover_art: Option<String>) -> bool {
        match self.store.update_cover_art(track_id, cover_art).await {
            Ok(updated) => updated,
            Err(e) => {
                warn!(track_id, error = %e, "Failed to update cover art");
                false
            }
        }
    }

    // ========================================================================
    // Eviction
    // ========================================================================

    /// Protect `track_id` from eviction while it is the playback source.
    pub fn set_now_playing(&self, track_id: Option<&str>) {
        *self.now_playing.write() = track_id.map(str::to_string);
    }

    pub fn now_playing(&self) -> Option<String> {
        self.now_playing.read().clone()
    }

    /// Evict least-recently-played tracks until the total size is at most
    /// `target_bytes`. Never-played tracks go first.
    ///
    /// Each deletion commits on its own. Returns the number of evicted tracks.
    #[instrument(skip(self))]
    pub async fn evict_to_target(&self, target_bytes: u64) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        self.evict_locked(target_bytes).await
    }

    /// Evict down to the configured budget.
    pub async fn enforce_budget(&self) -> Result<usize> {
        self.evict_to_target(self.config.max_cache_size_bytes).await
    }

    async fn evict_locked(&self, target_bytes: u64) -> Result<usize> {
        let summaries = self.store.list_summaries().await?;
        let mut current: u64 = summaries.iter().map(|s| s.file_size).sum();
        if current <= target_bytes {
            return Ok(0);
        }

        let protected = self.now_playing();
        let mut candidates: Vec<CachedTrackSummary> = summaries
            .into_iter()
            .filter(|s| protected.as_deref() != Some(s.id.as_str()))
            .collect();
        candidates.sort_by(|a, b| {
            a.last_played_at
                .cmp(&b.last_played_at)
                .then(a.cached_at.cmp(&b.cached_at))
        });

        let mut evicted = 0;
        for candidate in candidates {
            if current <= target_bytes {
                break;
            }
            if self.store.delete(&candidate.id).await? {
                current = current.saturating_sub(candidate.file_size);
                evicted += 1;
                debug!(track_id = %candidate.id, bytes = candidate.file_size, "Evicted track");
                self.emit(CacheEvent::TrackEvicted {
                    track_id: candidate.id,
                    bytes: candidate.file_size,
                });
            }
        }

        if current > target_bytes {
            warn!(
                current,
                target_bytes, "Eviction stopped above target; remaining tracks are protected"
            );
        } else {
            info!(evicted, current, target_bytes, "Eviction complete");
        }

        Ok(evicted)
    }

    fn emit(&self, event: CacheEvent) {
        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Cache(event));
        }
    }
}

#[async_trait]
impl PayloadSource for CacheManager {
    async fn cached_payload(&self, track_id: &str) -> Option<CachedPayload> {
        self.get(track_id)
            .await
            .filter(|record| !record.payload.is_empty())
            .map(|record| CachedPayload {
                data: record.payload,
                file_size: record.file_size,
            })
    }
}

#[async_trait]
impl SourceResolver for CacheManager {
    async fn resolve(&self, track: &Track) -> AudioSource {
        self.resolve_playback_source(track).await
    }

    async fn mark_played(&self, track_id: &str) {
        self.update_last_played(track_id).await;
    }

    fn set_active(&self, track_id: Option<&str>) {
        self.set_now_playing(track_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::mock::{FakeHttpClient, ManualClock};
    use core_library::repositories::InMemoryBlobStore;

    fn manager_with(store: Arc<InMemoryBlobStore>, config: CacheConfig) -> CacheManager {
        CacheManager::new(
            config,
            store,
            Arc::new(FakeHttpClient::new()),
            Arc::new(ManualClock::at_millis(1_000)),
        )
        .unwrap()
    }

    fn record(id: &str, size: usize, cached_at: i64, last_played_at: Option<i64>) -> CachedTrackRecord {
        let track = Track::new(id, "c1", "Channel", format!("{}.mp3", id), format!("https://x/{}", id));
        let mut record =
            CachedTrackRecord::from_download(&track, Bytes::from(vec![7u8; size]), None, cached_at);
        record.last_played_at = last_played_at;
        record
    }

    async fn seeded(records: &[CachedTrackRecord]) -> Arc<InMemoryBlobStore> {
        let store = Arc::new(InMemoryBlobStore::new());
        for r in records {
            store.put(r).await.unwrap();
        }
        store
    }

    #[test]
    fn test_rejects_invalid_config() {
        let result = CacheManager::new(
            CacheConfig::default().with_max_size(0),
            Arc::new(InMemoryBlobStore::new()),
            Arc::new(FakeHttpClient::new()),
            Arc::new(ManualClock::at_millis(0)),
        );
        assert!(matches!(result, Err(PlaybackError::Config(_))));
    }

    #[tokio::test]
    async fn test_eviction_is_least_recently_played_first() {
        let store = seeded(&[
            record("a", 10, 1, Some(100)),
            record("b", 20, 2, Some(200)),
            record("c", 30, 3, Some(300)),
        ])
        .await;
        let manager = manager_with(store.clone(), CacheConfig::default());

        let evicted = manager.evict_to_target(35).await.unwrap();

        assert_eq!(evicted, 2);
        assert_eq!(manager.total_size().await.unwrap(), 30);
        assert!(manager.is_cached("c").await);
        assert!(!manager.is_cached("a").await);
    }

    #[tokio::test]
    async fn test_never_played_tracks_evicted_first() {
        let store = seeded(&[
            record("played", 10, 1, Some(100)),
            record("fresh", 10, 2, None),
        ])
        .await;
        let manager = manager_with(store, CacheConfig::default());

        assert_eq!(manager.evict_to_target(10).await.unwrap(), 1);
        assert!(manager.is_cached("played").await);
        assert!(!manager.is_cached("fresh").await);
    }

    #[tokio::test]
    async fn test_eviction_noop_under_target() {
        let store = seeded(&[record("a", 10, 1, None)]).await;
        let manager = manager_with(store, CacheConfig::default());

        assert_eq!(manager.evict_to_target(10).await.unwrap(), 0);
        assert!(manager.is_cached("a").await);
    }

    #[tokio::test]
    async fn test_eviction_skips_now_playing() {
        let store = seeded(&[
            record("a", 10, 1, Some(1)),
            record("b", 10, 2, Some(2)),
        ])
        .await;
        let manager = manager_with(store, CacheConfig::default());
        manager.set_now_playing(Some("a"));

        let evicted = manager.evict_to_target(0).await.unwrap();

        assert_eq!(evicted, 1);
        assert!(manager.is_cached("a").await);
        assert!(!manager.is_cached("b").await);
    }

    #[tokio::test]
    async fn test_update_last_played_uses_clock() {
        let store = seeded(&[record("a", 4, 1, None)]).await;
        let manager = manager_with(store, CacheConfig::default());

        assert!(manager.update_last_played("a").await);
        assert!(!manager.update_last_played("missing").await);
        assert_eq!(manager.get("a").await.unwrap().last_played_at, Some(1_000));
    }

    #[tokio::test]
    async fn test_resolve_playback_source() {
        let store = seeded(&[record("a", 4, 1, None)]).await;
        let manager = manager_with(store, CacheConfig::default());

        let cached = Track::new("a", "c1", "Channel", "a.mp3", "https://x/a");
        let remote = Track::new("z", "c1", "Channel", "z.mp3", "https://x/z");

        assert!(matches!(
            manager.resolve_playback_source(&cached).await,
            AudioSource::CachedBlob { ref track_id, .. } if track_id == "a"
        ));
        assert_eq!(
            manager.resolve_playback_source(&remote).await,
            AudioSource::RemoteStream {
                url: "https://x/z".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_cancel_without_download() {
        let manager = manager_with(Arc::new(InMemoryBlobStore::new()), CacheConfig::default());
        assert!(!manager.cancel_download("nothing"));
        assert!(manager.active_downloads().is_empty());
    }
}
