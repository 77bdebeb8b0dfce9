//! # Host Bridge Traits
//!
//! What the player core needs from the host, as `Send + Sync` traits:
//!
//! | Trait | Used by |
//! |-------|---------|
//! | [`HttpClient`](http::HttpClient) | streaming downloader, metadata range probes |
//! | [`PlaybackAdapter`](playback::PlaybackAdapter) | transport |
//! | [`Clock`](time::Clock) | cache timestamps |
//! | [`LoggerSink`](time::LoggerSink) | logging layer |
//!
//! Every method reports failures as [`BridgeError`](error::BridgeError).
//! A missing HTTP client is caught when the core configuration is built.
//!
//! The `mock` feature exposes [`mock::FakeHttpClient`] and [`mock::ManualClock`].

pub mod error;
pub mod http;
pub mod playback;
pub mod time;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{ByteStream, HttpClient, HttpMethod, HttpRequest, HttpResponse, HttpStreamResponse};
pub use playback::{AudioSource, PlaybackAdapter, PlaybackAdapterEvent, SourceKind};
pub use time::{Clock, LogEntry, LogLevel, LoggerSink, SystemClock};
