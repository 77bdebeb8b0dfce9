//! # Transport
//!
//! Queue navigation and playback control on top of a host
//! [`PlaybackAdapter`](bridge_traits::playback::PlaybackAdapter).
//!
//! The [`Transport`] owns [`TransportState`] exclusively. Commands take
//! `&mut self`, so one command runs to completion before the next starts;
//! adapter notifications are fed in through [`Transport::handle_event`].
//!
//! ## Navigation rules
//!
//! | Command | Repeat off | Repeat all | Repeat one |
//! |---------|------------|------------|------------|
//! | `next` at last track | stop | wrap to 0 | replay |
//! | `next` elsewhere | `i + 1` (random with shuffle) | same | replay |
//! | `previous` after threshold | restart | restart | restart |
//! | `previous` at first track | restart | wrap to last | restart |

pub mod machine;
pub mod state;

pub use machine::Transport;
pub use state::{RepeatMode, TransportConfig, TransportState, DEFAULT_RESTART_THRESHOLD_SECS};

use async_trait::async_trait;
use bridge_traits::playback::AudioSource;
use core_library::models::Track;

/// How the transport turns a track into something the adapter can load.
///
/// Implemented by [`CacheManager`](crate::cache::CacheManager); the transport
/// never touches cache records beyond these calls.
#[async_trait]
pub trait SourceResolver: Send + Sync {
    /// Cached payload when resident, remote stream otherwise.
    async fn resolve(&self, track: &Track) -> AudioSource;

    /// Record that a cached track started playing.
    async fn mark_played(&self, track_id: &str);

    /// The cached track currently used as playback source, if any.
    fn set_active(&self, track_id: Option<&str>);
}
