//! Cache statistics and download progress

use core_library::models::CachedTrackSummary;
use serde::{Deserialize, Serialize};

/// Statistics about the offline cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    /// Number of cached tracks
    pub track_count: usize,

    /// Sum of cached payload sizes in bytes
    pub total_size: u64,

    /// Earliest `cached_at` (Unix milliseconds)
    pub oldest_cached_at: Option<i64>,

    /// Latest `cached_at` (Unix milliseconds)
    pub newest_cached_at: Option<i64>,
}

impl CacheStats {
    /// Compute statistics over record summaries.
    pub fn from_summaries(summaries: &[CachedTrackSummary]) -> Self {
        Self {
            track_count: summaries.len(),
            total_size: summaries.iter().map(|s| s.file_size).sum(),
            oldest_cached_at: summaries.iter().map(|s| s.cached_at).min(),
            newest_cached_at: summaries.iter().map(|s| s.cached_at).max(),
        }
    }

    /// Calculate cache usage as a percentage of max size.
    pub fn usage_percentage(&self, max_size: u64) -> f64 {
        if max_size == 0 {
            return 0.0;
        }

        (self.total_size as f64 / max_size as f64) * 100.0
    }

    /// Returns true if the cache is near capacity (>90%).
    pub fn is_near_capacity(&self, max_size: u64) -> bool {
        self.usage_percentage(max_size) > 90.0
    }

    /// Bytes above `max_size` that eviction would have to free.
    pub fn space_needed(&self, max_size: u64) -> u64 {
        self.total_size.saturating_sub(max_size)
    }

    /// Returns average bytes per track.
    pub fn average_track_size(&self) -> u64 {
        if self.track_count == 0 {
            0
        } else {
            self.total_size / self.track_count as u64
        }
    }
}

/// Progress of an in-flight download.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadProgress {
    pub track_id: String,

    /// Percentage (0-100); stays 0 while the total size is unknown
    pub progress_percent: f64,

    /// Current attempt, starting at 1
    pub attempt: u32,

    /// Unix milliseconds
    pub started_at: i64,

    /// Unix milliseconds of the last progress report
    pub updated_at: i64,
}

impl DownloadProgress {
    /// Create new download progress tracker.
    pub fn new(track_id: impl Into<String>, now_ms: i64) -> Self {
        Self {
            track_id: track_id.into(),
            progress_percent: 0.0,
            attempt: 1,
            started_at: now_ms,
            updated_at: now_ms,
        }
    }

    /// Record a new percentage; lower values than already seen are ignored.
    ///
    /// Returns whether the value was accepted.
    pub fn update(&mut self, percent: f64, now_ms: i64) -> bool {
        let percent = percent.clamp(0.0, 100.0);
        if percent < self.progress_percent {
            return false;
        }
        self.progress_percent = percent;
        self.updated_at = now_ms;
        true
    }

    /// Returns true if download is complete.
    pub fn is_complete(&self) -> bool {
        self.progress_percent >= 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(id: &str, size: u64, cached_at: i64) -> CachedTrackSummary {
        CachedTrackSummary {
            id: id.to_string(),
            channel_id: "c".to_string(),
            channel_name: "Channel".to_string(),
            file_name: format!("{}.mp3", id),
            file_size: size,
            duration: None,
            title: None,
            artist: None,
            album: None,
            stream_url: format!("https://x/{}", id),
            cached_at,
            last_played_at: None,
            has_cover_art: false,
        }
    }

    #[test]
    fn test_stats_from_summaries() {
        let stats = CacheStats::from_summaries(&[
            summary("a", 100, 30),
            summary("b", 300, 10),
            summary("c", 200, 20),
        ]);

        assert_eq!(stats.track_count, 3);
        assert_eq!(stats.total_size, 600);
        assert_eq!(stats.oldest_cached_at, Some(10));
        assert_eq!(stats.newest_cached_at, Some(30));
        assert_eq!(stats.average_track_size(), 200);
    }

    #[test]
    fn test_empty_stats() {
        let stats = CacheStats::from_summaries(&[]);
        assert_eq!(stats, CacheStats::default());
        assert_eq!(stats.oldest_cached_at, None);
        assert_eq!(stats.average_track_size(), 0);
    }

    #[test]
    fn test_usage_and_space_needed() {
        let stats = CacheStats {
            total_size: 950,
            ..Default::default()
        };

        assert!((stats.usage_percentage(1_000) - 95.0).abs() < f64::EPSILON);
        assert!(stats.is_near_capacity(1_000));
        assert_eq!(stats.space_needed(900), 50);
        assert_eq!(stats.space_needed(1_000), 0);
        assert_eq!(stats.usage_percentage(0), 0.0);
    }

    #[test]
    fn test_download_progress_is_monotonic() {
        let mut progress = DownloadProgress::new("t1", 1_000);

        assert!(progress.update(40.0, 1_100));
        assert!(!progress.update(20.0, 1_200));
        assert_eq!(progress.progress_percent, 40.0);
        assert_eq!(progress.updated_at, 1_100);

        assert!(progress.update(150.0, 1_300));
        assert!(progress.is_complete());
        assert_eq!(progress.progress_percent, 100.0);
    }
}
