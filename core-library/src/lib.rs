//! # Track Storage Module
//!
//! Owns the durable store of cached tracks.
//!
//! ## Overview
//!
//! This module manages:
//! - The `Track` and `CachedTrackRecord` domain models
//! - SQLite schema, migrations and pool setup
//! - The `BlobStore` repository and its SQLite and in-memory implementations

pub mod db;
pub mod error;
pub mod models;
pub mod repositories;

pub use db::{create_pool, create_test_pool, DatabaseConfig};
pub use error::{LibraryError, Result};
pub use models::{CachedTrackRecord, CachedTrackSummary, Track};
pub use repositories::{BlobStore, InMemoryBlobStore, SqliteBlobStore};
