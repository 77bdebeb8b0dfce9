//! # Core Runtime
//!
//! Shared plumbing for the cache, metadata and playback crates: the
//! [`CoreConfig`] builder, the [`EventBus`] that carries cache and playback
//! notifications, and the `tracing` subscriber setup in [`logging`].

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{CoreConfig, CoreConfigBuilder};
pub use error::{Error, Result};
pub use events::{CacheEvent, CoreEvent, EventBus, EventStream, PlaybackEvent};
