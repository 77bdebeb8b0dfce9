//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! - `HttpClient` using `reqwest`, streaming response bodies chunk by chunk
//!
//! Audio output is left to the host shell; there is no desktop
//! `PlaybackAdapter` here.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::ReqwestHttpClient;
//! use std::sync::Arc;
//!
//! let http_client = Arc::new(ReqwestHttpClient::new()?);
//! let config = CoreConfig::builder()
//!     .database_path("player.db")
//!     .http_client(http_client)
//!     .build()?;
//! ```

mod http;

pub use http::ReqwestHttpClient;
