//! Domain models for playable tracks and their cached copies.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

// ============================================================================
// Track
// ============================================================================

/// A playable item as listed by a channel (a folder on a storage provider).
///
/// The core never derives a `Track`; it is handed one by the catalog layer
/// and treats it as read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    /// Stable identifier of the remote file. Used as the cache key.
    pub file_id: String,
    pub channel_id: String,
    pub channel_name: String,
    pub file_name: String,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    /// Duration in seconds, when the catalog knows it.
    pub duration: Option<f64>,
    /// Size in bytes reported by the catalog. May be absent or stale.
    pub file_size: Option<u64>,
    /// URL the payload can be streamed or downloaded from.
    pub stream_url: String,
}

impl Track {
    /// Create a track with the required fields; everything else is unknown.
    pub fn new(
        file_id: impl Into<String>,
        channel_id: impl Into<String>,
        channel_name: impl Into<String>,
        file_name: impl Into<String>,
        stream_url: impl Into<String>,
    ) -> Self {
        Self {
            file_id: file_id.into(),
            channel_id: channel_id.into(),
            channel_name: channel_name.into(),
            file_name: file_name.into(),
            title: None,
            artist: None,
            album: None,
            duration: None,
            file_size: None,
            stream_url: stream_url.into(),
        }
    }

    /// Title for display, falling back to the file name.
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.file_name)
    }

    /// Validate required fields.
    pub fn validate(&self) -> Result<(), String> {
        if self.file_id.trim().is_empty() {
            return Err("Track file_id cannot be empty".to_string());
        }
        if self.stream_url.trim().is_empty() {
            return Err("Track stream_url cannot be empty".to_string());
        }
        Ok(())
    }
}

// ============================================================================
// Cached track
// ============================================================================

/// A fully downloaded track persisted in the blob store.
///
/// A record only exists once the complete payload has been received;
/// partially downloaded tracks are never stored.
#[derive(Clone, PartialEq)]
pub struct CachedTrackRecord {
    /// Equals the source track's `file_id`.
    pub id: String,
    pub channel_id: String,
    pub channel_name: String,
    pub file_name: String,
    /// Byte length of `payload`, measured when the record was written.
    pub file_size: u64,
    pub duration: Option<f64>,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub stream_url: String,
    /// Unix timestamp (milliseconds) of the write.
    pub cached_at: i64,
    /// Unix timestamp (milliseconds) of the last playback start, if any.
    pub last_played_at: Option<i64>,
    /// Embedded cover image as a `data:` URI.
    pub cover_art: Option<String>,
    pub payload: Bytes,
}

impl CachedTrackRecord {
    /// Build a record for a freshly downloaded payload.
    ///
    /// `file_size` is taken from the payload itself, never from the track's
    /// advertised size.
    pub fn from_download(
        track: &Track,
        payload: Bytes,
        cover_art: Option<String>,
        cached_at: i64,
    ) -> Self {
        Self {
            id: track.file_id.clone(),
            channel_id: track.channel_id.clone(),
            channel_name: track.channel_name.clone(),
            file_name: track.file_name.clone(),
            file_size: payload.len() as u64,
            duration: track.duration,
            title: track.title.clone(),
            artist: track.artist.clone(),
            album: track.album.clone(),
            stream_url: track.stream_url.clone(),
            cached_at,
            last_played_at: None,
            cover_art,
            payload,
        }
    }

    /// The record without its payload.
    pub fn summary(&self) -> CachedTrackSummary {
        CachedTrackSummary {
            id: self.id.clone(),
            channel_id: self.channel_id.clone(),
            channel_name: self.channel_name.clone(),
            file_name: self.file_name.clone(),
            file_size: self.file_size,
            duration: self.duration,
            title: self.title.clone(),
            artist: self.artist.clone(),
            album: self.album.clone(),
            stream_url: self.stream_url.clone(),
            cached_at: self.cached_at,
            last_played_at: self.last_played_at,
            has_cover_art: self.cover_art.is_some(),
        }
    }

    /// Validate record invariants before persisting.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("Cached track id cannot be empty".to_string());
        }
        if self.payload.is_empty() {
            return Err("Cached track payload cannot be empty".to_string());
        }
        if self.file_size != self.payload.len() as u64 {
            return Err(format!(
                "Cached track file_size {} does not match payload length {}",
                self.file_size,
                self.payload.len()
            ));
        }
        Ok(())
    }
}

impl std::fmt::Debug for CachedTrackRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedTrackRecord")
            .field("id", &self.id)
            .field("file_name", &self.file_name)
            .field("file_size", &self.file_size)
            .field("cached_at", &self.cached_at)
            .field("last_played_at", &self.last_played_at)
            .field("has_cover_art", &self.cover_art.is_some())
            .finish_non_exhaustive()
    }
}

/// Structured fields of a cached track, without the payload.
///
/// Listing, statistics and eviction work on summaries so that scanning the
/// cache never loads audio bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedTrackSummary {
    pub id: String,
    pub channel_id: String,
    pub channel_name: String,
    pub file_name: String,
    pub file_size: u64,
    pub duration: Option<f64>,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub stream_url: String,
    pub cached_at: i64,
    pub last_played_at: Option<i64>,
    pub has_cover_art: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_track() -> Track {
        let mut track = Track::new(
            "file-1",
            "chan-1",
            "Road Trip",
            "01 - Intro.mp3",
            "https://cdn.example.com/file-1",
        );
        track.title = Some("Intro".to_string());
        track.file_size = Some(999_999);
        track
    }

    #[test]
    fn test_track_validation() {
        assert!(sample_track().validate().is_ok());

        let mut missing_id = sample_track();
        missing_id.file_id = "  ".to_string();
        assert!(missing_id.validate().is_err());

        let mut missing_url = sample_track();
        missing_url.stream_url.clear();
        assert!(missing_url.validate().is_err());
    }

    #[test]
    fn test_display_title_falls_back_to_file_name() {
        let mut track = sample_track();
        assert_eq!(track.display_title(), "Intro");
        track.title = None;
        assert_eq!(track.display_title(), "01 - Intro.mp3");
    }

    #[test]
    fn test_record_measures_payload_size() {
        let record = CachedTrackRecord::from_download(
            &sample_track(),
            Bytes::from_static(b"0123456789"),
            None,
            1_700_000_000_000,
        );

        assert_eq!(record.id, "file-1");
        assert_eq!(record.file_size, 10);
        assert_eq!(record.last_played_at, None);
        assert!(record.validate().is_ok());
    }

    #[test]
    fn test_record_validation_rejects_mismatched_size() {
        let mut record =
            CachedTrackRecord::from_download(&sample_track(), Bytes::from_static(b"abc"), None, 0);
        record.file_size = 4;
        assert!(record.validate().is_err());

        record.payload = Bytes::new();
        record.file_size = 0;
        assert!(record.validate().is_err());
    }

    #[test]
    fn test_summary_drops_payload() {
        let record = CachedTrackRecord::from_download(
            &sample_track(),
            Bytes::from_static(b"abc"),
            Some("data:image/png;base64,AAAA".to_string()),
            5,
        );
        let summary = record.summary();

        assert_eq!(summary.id, record.id);
        assert_eq!(summary.file_size, 3);
        assert!(summary.has_cover_art);
    }

    #[test]
    fn test_track_serializes_camel_case() {
        let json = serde_json::to_value(sample_track()).unwrap();
        assert_eq!(json["fileId"], "file-1");
        assert_eq!(json["streamUrl"], "https://cdn.example.com/file-1");
        assert_eq!(json["fileSize"], 999_999);
    }
}
