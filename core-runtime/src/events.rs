//! # Event Bus System
//!
//! Broadcasts cache and playback notifications to any number of listeners
//! using `tokio::sync::broadcast`.
//!
//! ```text
//! ┌───────────────┐   emit    ┌───────────┐   subscribe   ┌──────────────┐
//! │ Cache Manager ├──────────>│           ├──────────────>│ Toasts / UI  │
//! └───────────────┘           │ EventBus  │               └──────────────┘
//! ┌───────────────┐   emit    │           │   subscribe   ┌──────────────┐
//! │  Transport    ├──────────>│           ├──────────────>│ Media session│
//! └───────────────┘           └───────────┘               └──────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CacheEvent, CoreEvent, EventBus};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut subscriber = event_bus.subscribe();
//!
//! event_bus.emit(CoreEvent::Cache(CacheEvent::TrackCached {
//!     track_id: "file-1".to_string(),
//!     bytes: 4_096,
//! })).ok();
//!
//! let event = subscriber.recv().await.unwrap();
//! assert_eq!(event.description(), "Track cached");
//! # }
//! ```
//!
//! A subscriber that falls more than the buffer size behind gets
//! `RecvError::Lagged` and keeps receiving newer events. Emission is
//! fire-and-forget: having no subscribers is not an error for the operation
//! that produced the event.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// Subscribers that can't keep up will receive `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Offline cache events
    Cache(CacheEvent),
    /// Playback-related events
    Playback(PlaybackEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Cache(e) => e.description(),
            CoreEvent::Playback(e) => e.description(),
        }
    }

    /// Track the event refers to, if any.
    pub fn track_id(&self) -> Option<&str> {
        match self {
            CoreEvent::Cache(CacheEvent::CacheCleared { .. }) => None,
            CoreEvent::Cache(
                CacheEvent::DownloadStarted { track_id }
                | CacheEvent::TrackCached { track_id, .. }
                | CacheEvent::DownloadFailed { track_id, .. }
                | CacheEvent::TrackEvicted { track_id, .. }
                | CacheEvent::TrackRemoved { track_id },
            ) => Some(track_id),
            CoreEvent::Playback(PlaybackEvent::Error { track_id, .. }) => track_id.as_deref(),
            CoreEvent::Playback(
                PlaybackEvent::Started { track_id, .. }
                | PlaybackEvent::Paused { track_id, .. }
                | PlaybackEvent::Resumed { track_id, .. }
                | PlaybackEvent::Stopped { track_id }
                | PlaybackEvent::Completed { track_id },
            ) => Some(track_id),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Cache(CacheEvent::DownloadFailed { .. }) => EventSeverity::Error,
            CoreEvent::Playback(PlaybackEvent::Error { .. }) => EventSeverity::Error,
            CoreEvent::Cache(CacheEvent::TrackEvicted { .. }) => EventSeverity::Warning,
            CoreEvent::Cache(CacheEvent::TrackCached { .. }) => EventSeverity::Info,
            CoreEvent::Cache(CacheEvent::CacheCleared { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    /// Debug-level events (verbose)
    Debug,
    /// Informational events
    Info,
    /// Warning events
    Warning,
    /// Error events
    Error,
}

// ============================================================================
// Cache Events
// ============================================================================

/// Events raised by the offline cache.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum CacheEvent {
    /// A full download of the track started.
    DownloadStarted { track_id: String },
    /// The payload was downloaded and persisted.
    TrackCached {
        track_id: String,
        /// Measured payload size.
        bytes: u64,
    },
    /// The download or the write failed; nothing was persisted.
    DownloadFailed { track_id: String, message: String },
    /// The record was removed to honor the storage budget.
    TrackEvicted { track_id: String, bytes: u64 },
    /// The record was removed on request.
    TrackRemoved { track_id: String },
    /// Every record was removed.
    CacheCleared {
        /// Number of records deleted.
        tracks: u64,
    },
}

impl CacheEvent {
    fn description(&self) -> &str {
        match self {
            CacheEvent::DownloadStarted { .. } => "Download started",
            CacheEvent::TrackCached { .. } => "Track cached",
            CacheEvent::DownloadFailed { .. } => "Download failed",
            CacheEvent::TrackEvicted { .. } => "Track evicted",
            CacheEvent::TrackRemoved { .. } => "Track removed from cache",
            CacheEvent::CacheCleared { .. } => "Cache cleared",
        }
    }
}

// ============================================================================
// Playback Events
// ============================================================================

/// Events related to audio playback.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// A track became current and playback was requested.
    Started {
        /// The track ID being played.
        track_id: String,
        /// Index in the play queue.
        index: usize,
        /// Whether the payload is played from the offline cache.
        from_cache: bool,
    },
    /// Playback paused.
    Paused {
        /// The track ID.
        track_id: String,
        /// Position when paused (milliseconds).
        position_ms: u64,
    },
    /// Playback resumed after pause.
    Resumed {
        /// The track ID.
        track_id: String,
        /// Position when resumed (milliseconds).
        position_ms: u64,
    },
    /// Playback stopped at the end of the queue.
    Stopped {
        /// The track ID.
        track_id: String,
    },
    /// Track finished playing naturally.
    Completed {
        /// The track ID that completed.
        track_id: String,
    },
    /// Playback error occurred.
    Error {
        /// The track ID if available.
        track_id: Option<String>,
        /// Human-readable error message.
        message: String,
        /// Whether playback can be retried.
        recoverable: bool,
    },
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::Started { .. } => "Playback started",
            PlaybackEvent::Paused { .. } => "Playback paused",
            PlaybackEvent::Resumed { .. } => "Playback resumed",
            PlaybackEvent::Stopped { .. } => "Playback stopped",
            PlaybackEvent::Completed { .. } => "Track completed",
            PlaybackEvent::Error { .. } => "Playback error",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Broadcast channel shared by the cache manager and the transport.
///
/// Clones publish into the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// When a subscriber falls behind by more than `capacity` events, it will
    /// receive a `RecvError::Lagged` error.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error if there are no active subscribers.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber to receive events.
    ///
    /// Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

/// Type alias for event filter functions.
type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with optional filtering.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let event_bus = EventBus::new(100);
/// let cache_only = EventStream::new(event_bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Cache(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    /// Creates a new event stream from a receiver.
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events that match `predicate` will be returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter (if any).
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without blocking.
    ///
    /// Returns `None` if no events are currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn cached(id: &str) -> CoreEvent {
        CoreEvent::Cache(CacheEvent::TrackCached {
            track_id: id.to_string(),
            bytes: 10,
        })
    }

    fn started(id: &str) -> CoreEvent {
        CoreEvent::Playback(PlaybackEvent::Started {
            track_id: id.to_string(),
            index: 0,
            from_cache: false,
        })
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        assert!(bus.emit(cached("a")).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        assert_eq!(bus.emit(cached("a")).unwrap(), 2);

        assert_eq!(first.recv().await.unwrap(), cached("a"));
        assert_eq!(second.recv().await.unwrap(), cached("a"));
    }

    #[tokio::test]
    async fn test_event_stream_with_filter() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe())
            .filter(|event| matches!(event, CoreEvent::Playback(_)));

        bus.emit(cached("a")).unwrap();
        bus.emit(started("b")).unwrap();

        assert_eq!(stream.recv().await.unwrap(), started("b"));
        assert!(stream.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut stream = EventStream::new(bus.subscribe());

        for i in 0..5 {
            bus.emit(cached(&format!("t{}", i))).unwrap();
        }

        assert!(matches!(stream.try_recv(), Some(Err(RecvError::Lagged(3)))));
        assert_eq!(stream.try_recv().unwrap().unwrap(), cached("t3"));
    }

    #[test]
    fn test_event_severity() {
        let failed = CoreEvent::Cache(CacheEvent::DownloadFailed {
            track_id: "a".to_string(),
            message: "HTTP 404".to_string(),
        });
        assert_eq!(failed.severity(), EventSeverity::Error);
        assert_eq!(cached("a").severity(), EventSeverity::Info);
        assert_eq!(started("a").severity(), EventSeverity::Debug);
        assert!(EventSeverity::Error > EventSeverity::Warning);
    }

    #[test]
    fn test_event_track_id() {
        assert_eq!(cached("a").track_id(), Some("a"));
        assert_eq!(started("b").track_id(), Some("b"));
        let cleared = CoreEvent::Cache(CacheEvent::CacheCleared { tracks: 3 });
        assert_eq!(cleared.track_id(), None);
    }

    #[test]
    fn test_event_description() {
        assert_eq!(cached("a").description(), "Track cached");
        assert_eq!(started("a").description(), "Playback started");
    }

    #[test]
    fn test_event_serialization() {
        let json = serde_json::to_value(cached("file-9")).unwrap();
        assert_eq!(json["type"], "Cache");
        assert_eq!(json["payload"]["event"], "TrackCached");
        assert_eq!(json["payload"]["track_id"], "file-9");

        let back: CoreEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, cached("file-9"));
    }
}
