//! # Playback Module
//!
//! Offline caching and transport control for track playback.
//!
//! ## Overview
//!
//! This module handles:
//! - Full-payload downloads with progress reporting ([`download`])
//! - Offline cache management with least-recently-played eviction ([`cache`])
//! - Queue navigation and playback control over a host adapter ([`transport`])
//!
//! Audio decoding and output stay on the host side of
//! [`PlaybackAdapter`](bridge_traits::playback::PlaybackAdapter).

pub mod cache;
pub mod download;
pub mod error;
pub mod transport;

pub use cache::{CacheConfig, CacheManager, CacheStats, DownloadProgress};
pub use download::{ProgressSink, StreamingDownloader};
pub use error::{PlaybackError, Result};
pub use transport::{
    RepeatMode, SourceResolver, Transport, TransportConfig, TransportState,
};
