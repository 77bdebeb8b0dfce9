//! # Offline Cache Module
//!
//! Keeps complete track payloads locally under a storage budget.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────┐
//! │     CacheManager                       │
//! │  - cache_track()                       │
//! │  - resolve_playback_source()           │
//! │  - evict_to_target()                   │
//! └────────┬───────────────────────────────┘
//!          │
//!          ├──> BlobStore (records + payloads)
//!          ├──> StreamingDownloader (full downloads)
//!          └──> MetadataExtractor (cover art)
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_playback::cache::{CacheConfig, CacheManager};
//!
//! let manager = CacheManager::new(CacheConfig::default(), store, http_client, clock)?;
//!
//! if manager.cache_track(&track, None).await {
//!     assert!(manager.is_cached(&track.file_id).await);
//! }
//!
//! // Free space down to 1 GiB, least recently played first
//! manager.evict_to_target(1024 * 1024 * 1024).await?;
//! ```

pub mod config;
pub mod manager;
pub mod stats;

pub use config::{CacheConfig, DEFAULT_MAX_CACHE_SIZE_BYTES};
pub use manager::CacheManager;
pub use stats::{CacheStats, DownloadProgress};
