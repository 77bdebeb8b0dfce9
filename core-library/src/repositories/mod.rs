//! # Blob Store
//!
//! Durable storage for fully downloaded tracks, keyed by track id.
//!
//! - [`BlobStore`] is the interface the cache manager depends on
//! - [`SqliteBlobStore`] persists records in the `cached_tracks` table
//! - [`InMemoryBlobStore`] keeps records in process memory

pub mod blob_store;
pub mod memory;

pub use blob_store::{BlobStore, SqliteBlobStore};
pub use memory::InMemoryBlobStore;
