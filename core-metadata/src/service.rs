//! # Metadata Service
//!
//! Memoizing front door for track metadata.
//!
//! ## Resolution order
//!
//! 1. Memoized result for the track id
//! 2. Full cached payload, when the track is resident locally
//! 3. Leading byte range of the stream URL
//!
//! Failures at every step are logged and folded into `None`; callers treat a
//! missing result as "no metadata available". Results are held for the
//! process lifetime until [`MetadataService::invalidate`] or
//! [`MetadataService::invalidate_all`] drops them.

use async_trait::async_trait;
use bridge_traits::http::HttpClient;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::error::{MetadataError, Result};
use crate::extractor::MetadataExtractor;
use crate::metadata::AudioMetadata;
use crate::range::RangeFetcher;

/// A locally resident payload and its authoritative size.
#[derive(Debug, Clone)]
pub struct CachedPayload {
    pub data: Bytes,
    pub file_size: u64,
}

/// Read access to locally cached payloads.
///
/// Implemented by the cache manager; the service never writes through it.
#[async_trait]
pub trait PayloadSource: Send + Sync {
    /// The cached payload for `track_id`, or `None` when the track is not
    /// resident or the lookup failed.
    async fn cached_payload(&self, track_id: &str) -> Option<CachedPayload>;
}

pub struct MetadataService {
    extractor: MetadataExtractor,
    range_fetcher: RangeFetcher,
    payload_source: Option<Arc<dyn PayloadSource>>,
    memo: RwLock<HashMap<String, Arc<AudioMetadata>>>,
}

impl MetadataService {
    /// Service that only consults remote ranges.
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self::with_range_fetcher(RangeFetcher::new(http_client))
    }

    pub fn with_range_fetcher(range_fetcher: RangeFetcher) -> Self {
        Self {
            extractor: MetadataExtractor::new(),
            range_fetcher,
            payload_source: None,
            memo: RwLock::new(HashMap::new()),
        }
    }

    /// Consult `source` for resident payloads before going to the network.
    pub fn with_payload_source(mut self, source: Arc<dyn PayloadSource>) -> Self {
        self.payload_source = Some(source);
        self
    }

    pub fn with_extractor(mut self, extractor: MetadataExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    /// Metadata for a track, computed once per id.
    ///
    /// Repeated calls return the same `Arc` without touching storage or the
    /// network.
    #[instrument(skip(self, stream_url))]
    pub async fn get_metadata(
        &self,
        track_id: &str,
        stream_url: &str,
        file_size: Option<u64>,
    ) -> Option<Arc<AudioMetadata>> {
        if let Some(memoized) = self.memo.read().get(track_id) {
            return Some(Arc::clone(memoized));
        }

        let metadata = match self.from_cached_payload(track_id).await {
            Some(metadata) => metadata,
            None => match self.extract_from_range(stream_url, file_size).await {
                Ok(metadata) => metadata,
                Err(e) => {
                    warn!(track_id, error = %e, "No metadata available");
                    return None;
                }
            },
        };

        let metadata = Arc::new(metadata);
        self.memo
            .write()
            .insert(track_id.to_string(), Arc::clone(&metadata));
        Some(metadata)
    }

    /// Extract from the leading bytes of `url`.
    pub async fn extract_from_range(
        &self,
        url: &str,
        known_total_size: Option<u64>,
    ) -> Result<AudioMetadata> {
        let fetched = self.range_fetcher.fetch(url, known_total_size).await?;
        let extractor = self.extractor;

        tokio::task::spawn_blocking(move || {
            extractor.extract_from_prefix(
                &fetched.data,
                fetched.total_size,
                fetched.content_type.as_deref(),
            )
        })
        .await
        .map_err(|e| MetadataError::ExtractionFailed(format!("Extraction task failed: {}", e)))?
    }

    /// Extract from a complete payload off the async threads.
    pub async fn extract_from_payload(
        &self,
        payload: Bytes,
        mime_hint: Option<String>,
    ) -> Result<AudioMetadata> {
        let extractor = self.extractor;

        tokio::task::spawn_blocking(move || {
            extractor.extract_from_payload(&payload, mime_hint.as_deref())
        })
        .await
        .map_err(|e| MetadataError::ExtractionFailed(format!("Extraction task failed: {}", e)))?
    }

    async fn from_cached_payload(&self, track_id: &str) -> Option<AudioMetadata> {
        let source = self.payload_source.as_ref()?;
        let cached = source.cached_payload(track_id).await?;

        match self.extract_from_payload(cached.data, None).await {
            Ok(mut metadata) => {
                debug!(track_id, "Extracted metadata from cached payload");
                metadata.file_size = Some(cached.file_size);
                Some(metadata)
            }
            Err(e) => {
                warn!(track_id, error = %e, "Cached payload unreadable, trying remote range");
                None
            }
        }
    }

    /// Drop the memoized entry for one track.
    pub fn invalidate(&self, track_id: &str) {
        self.memo.write().remove(track_id);
    }

    /// Drop every memoized entry.
    pub fn invalidate_all(&self) {
        self.memo.write().clear();
    }

    pub fn memoized_count(&self) -> usize {
        self.memo.read().len()
    }
}
