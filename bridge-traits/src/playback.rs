//! Playback bridge traits and supporting audio types.
//!
//! The core never decodes or renders audio itself. Hosts provide a
//! [`PlaybackAdapter`] wrapping their native audio element, which accepts
//! either a cached in-memory payload or a remote stream URL, and report
//! progress back as [`PlaybackAdapterEvent`]s.

use crate::error::Result;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Audio source handed to a playback adapter.
#[derive(Clone, PartialEq)]
pub enum AudioSource {
    /// Fully cached payload held in memory.
    CachedBlob { track_id: String, data: Bytes },
    /// Remote HTTP(S) stream to be fetched by the host.
    RemoteStream { url: String },
}

impl AudioSource {
    /// Determine whether the source represents remote content.
    pub fn is_remote(&self) -> bool {
        matches!(self, AudioSource::RemoteStream { .. })
    }

    /// Classify the source without carrying its payload.
    pub fn kind(&self) -> SourceKind {
        match self {
            AudioSource::CachedBlob { .. } => SourceKind::Cached,
            AudioSource::RemoteStream { .. } => SourceKind::Remote,
        }
    }
}

impl fmt::Debug for AudioSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioSource::CachedBlob { track_id, data } => f
                .debug_struct("CachedBlob")
                .field("track_id", track_id)
                .field("bytes", &data.len())
                .finish(),
            AudioSource::RemoteStream { url } => {
                f.debug_struct("RemoteStream").field("url", url).finish()
            }
        }
    }
}

/// Where the audio of the current track comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Cached,
    Remote,
}

/// Notifications raised by a playback adapter.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackAdapterEvent {
    /// Periodic position report, in seconds.
    PositionUpdate(f64),
    /// The adapter learned the media duration, in seconds.
    DurationKnown(f64),
    /// Enough data is buffered to start or continue rendering.
    Ready,
    /// Playback reached the end of the media.
    Ended,
    /// The source could not be loaded or decoded.
    LoadError(String),
}

/// Trait for platform-specific playback adapters that drive native audio engines.
///
/// Control calls are fire-and-forget from the core's point of view. Results
/// of asynchronous work (buffering, decoding, end of media) arrive later as
/// [`PlaybackAdapterEvent`]s routed back by the host.
#[async_trait::async_trait]
pub trait PlaybackAdapter: Send + Sync {
    /// Replace the current media with `source`. Position resets to zero.
    async fn load(&self, source: AudioSource) -> Result<()>;

    /// Begin or resume playback.
    async fn play(&self) -> Result<()>;

    /// Pause playback without releasing the media.
    async fn pause(&self) -> Result<()>;

    /// Seek to an absolute position, in seconds.
    async fn seek(&self, position_secs: f64) -> Result<()>;

    /// Adjust playback volume. Volume is normalized to `0.0..=1.0`.
    async fn set_volume(&self, volume: f32) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_kind_classification() {
        let cached = AudioSource::CachedBlob {
            track_id: "t1".to_string(),
            data: Bytes::from_static(b"abc"),
        };
        let remote = AudioSource::RemoteStream {
            url: "https://cdn.example.com/t1".to_string(),
        };

        assert_eq!(cached.kind(), SourceKind::Cached);
        assert!(!cached.is_remote());
        assert_eq!(remote.kind(), SourceKind::Remote);
        assert!(remote.is_remote());
    }

    #[test]
    fn cached_blob_debug_omits_payload() {
        let cached = AudioSource::CachedBlob {
            track_id: "t1".to_string(),
            data: Bytes::from(vec![0u8; 4096]),
        };
        let rendered = format!("{:?}", cached);
        assert!(rendered.contains("bytes: 4096"));
        assert!(!rendered.contains("[0, 0"));
    }
}
