//! # Metadata Extraction Module
//!
//! Recovers tags, technical parameters and cover art from audio bytes.
//!
//! ## Overview
//!
//! - `extractor` parses complete payloads or leading fragments with `lofty`
//! - `range` fetches a bounded prefix of a remote resource
//! - `service` memoizes results per track id and picks the cheapest source

pub mod error;
pub mod extractor;
pub mod metadata;
pub mod range;
pub mod service;

pub use error::{MetadataError, Result};
pub use extractor::MetadataExtractor;
pub use metadata::{channel_layout_label, AudioMetadata, PartOf};
pub use range::{RangeFetch, RangeFetcher, DEFAULT_RANGE_BYTES};
pub use service::{CachedPayload, MetadataService, PayloadSource};
