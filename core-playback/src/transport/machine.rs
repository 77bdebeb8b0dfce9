//! Transport state machine.

use crate::error::{PlaybackError, Result};
use crate::transport::state::{RepeatMode, TransportConfig, TransportState};
use crate::transport::SourceResolver;
use bridge_traits::playback::{PlaybackAdapter, PlaybackAdapterEvent, SourceKind};
use core_library::models::Track;
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub struct Transport {
    config: TransportConfig,
    adapter: Arc<dyn PlaybackAdapter>,
    resolver: Arc<dyn SourceResolver>,
    event_bus: Option<EventBus>,
    state: TransportState,
    rng: StdRng,
}

impl Transport {
    /// Create a transport driving `adapter`.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybackError::Config`] when `config` does not validate.
    pub fn new(
        config: TransportConfig,
        adapter: Arc<dyn PlaybackAdapter>,
        resolver: Arc<dyn SourceResolver>,
    ) -> Result<Self> {
        config.validate().map_err(PlaybackError::Config)?;

        let rng = match config.shuffle_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            config,
            adapter,
            resolver,
            event_bus: None,
            state: TransportState::default(),
            rng,
        })
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn state(&self) -> &TransportState {
        &self.state
    }

    /// Owned copy of the state for rendering or serialization.
    pub fn snapshot(&self) -> TransportState {
        self.state.clone()
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.state.current_track()
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Replace the queue and start playing `start_index`.
    ///
    /// An empty queue unloads everything.
    #[instrument(skip(self, queue), fields(queue_len = queue.len()))]
    pub async fn load(&mut self, queue: Vec<Track>, start_index: usize) -> Result<()> {
        if queue.is_empty() {
            if self.state.is_playing {
                self.adapter.pause().await?;
            }
            self.resolver.set_active(None);
            self.state = TransportState {
                volume: self.state.volume,
                shuffle: self.state.shuffle,
                repeat_mode: self.state.repeat_mode,
                ..TransportState::default()
            };
            debug!("Queue cleared");
            return Ok(());
        }

        if start_index >= queue.len() {
            return Err(PlaybackError::InvalidIndex {
                index: start_index,
                len: queue.len(),
            });
        }

        self.state.queue = queue;
        self.start_track(start_index).await
    }

    /// Pause when playing, play when paused. No-op without a track.
    pub async fn toggle_play_pause(&mut self) -> Result<()> {
        let Some(track_id) = self.current_track().map(|t| t.file_id.clone()) else {
            return Ok(());
        };
        let position_ms = self.state.position_ms();

        if self.state.is_playing {
            self.adapter.pause().await?;
            self.state.is_playing = false;
            self.emit(PlaybackEvent::Paused {
                track_id,
                position_ms,
            });
        } else {
            self.adapter.play().await?;
            self.state.is_playing = true;
            self.emit(PlaybackEvent::Resumed {
                track_id,
                position_ms,
            });
        }

        Ok(())
    }

    /// Advance according to the repeat and shuffle settings.
    pub async fn next(&mut self) -> Result<()> {
        self.advance().await
    }

    /// Go back one track, or restart the current one once playback has
    /// passed the restart threshold.
    ///
    /// At the first track this wraps to the last under repeat-all and
    /// restarts otherwise.
    pub async fn previous(&mut self) -> Result<()> {
        let Some(current) = self.state.current_index else {
            return Ok(());
        };

        if self.state.position > self.config.restart_threshold_secs {
            return self.restart_current().await;
        }

        let target = if current > 0 {
            Some(current - 1)
        } else if self.state.repeat_mode == RepeatMode::All {
            Some(self.state.queue.len() - 1)
        } else {
            None
        };

        match target {
            Some(index) => self.start_track(index).await,
            None => self.restart_current().await,
        }
    }

    /// Jump to `index` in the current queue.
    pub async fn play_at_index(&mut self, index: usize) -> Result<()> {
        let len = self.state.queue.len();
        if index >= len {
            return Err(PlaybackError::InvalidIndex { index, len });
        }
        self.start_track(index).await
    }

    /// Seek to `position_secs`, clamped to `[0, duration]`.
    pub async fn seek(&mut self, position_secs: f64) -> Result<()> {
        if !self.state.has_track() {
            return Err(PlaybackError::NoTrackLoaded);
        }

        let position = self.state.clamp_position(position_secs);
        self.adapter.seek(position).await?;
        self.state.position = position;
        Ok(())
    }

    /// Set the volume, clamped to `[0, 1]`. Returns the applied value.
    pub async fn set_volume(&mut self, volume: f32) -> Result<f32> {
        if volume.is_nan() {
            return Ok(self.state.volume);
        }

        let volume = volume.clamp(0.0, 1.0);
        self.adapter.set_volume(volume).await?;
        self.state.volume = volume;
        Ok(volume)
    }

    /// Flip shuffle. The queue order is left untouched.
    pub fn toggle_shuffle(&mut self) -> bool {
        self.state.shuffle = !self.state.shuffle;
        debug!(shuffle = self.state.shuffle, "Shuffle toggled");
        self.state.shuffle
    }

    /// `none → all → one → none`
    pub fn cycle_repeat_mode(&mut self) -> RepeatMode {
        self.state.repeat_mode = self.state.repeat_mode.cycle();
        debug!(repeat_mode = ?self.state.repeat_mode, "Repeat mode changed");
        self.state.repeat_mode
    }

    // ========================================================================
    // Adapter events
    // ========================================================================

    /// Apply a notification from the playback adapter.
    pub async fn handle_event(&mut self, event: PlaybackAdapterEvent) -> Result<()> {
        match event {
            PlaybackAdapterEvent::PositionUpdate(secs) => {
                self.state.position = self.state.clamp_position(secs);
            }
            PlaybackAdapterEvent::DurationKnown(secs) => {
                self.state.duration = if secs.is_finite() { secs.max(0.0) } else { 0.0 };
                self.state.position = self.state.clamp_position(self.state.position);
            }
            PlaybackAdapterEvent::Ready => {
                self.state.is_loading = false;
            }
            PlaybackAdapterEvent::Ended => {
                if let Some(track) = self.current_track() {
                    let track_id = track.file_id.clone();
                    self.emit(PlaybackEvent::Completed { track_id });
                }
                self.advance().await?;
            }
            PlaybackAdapterEvent::LoadError(reason) => {
                self.fail_load(reason);
            }
        }
        Ok(())
    }

    // ========================================================================
    // Internals
    // ========================================================================

    async fn advance(&mut self) -> Result<()> {
        let Some(current) = self.state.current_index else {
            return Ok(());
        };

        match self.next_index(current) {
            Some(index) => self.start_track(index).await,
            None => self.stop_at_end().await,
        }
    }

    /// Index `next()` moves to, or `None` when playback should stop.
    fn next_index(&mut self, current: usize) -> Option<usize> {
        let len = self.state.queue.len();

        if self.state.repeat_mode == RepeatMode::One {
            return Some(current);
        }

        if self.state.shuffle && len > 1 {
            // Draw from the other len - 1 slots.
            let mut index = self.rng.gen_range(0..len - 1);
            if index >= current {
                index += 1;
            }
            return Some(index);
        }

        if current + 1 < len {
            Some(current + 1)
        } else if self.state.repeat_mode == RepeatMode::All {
            Some(0)
        } else {
            None
        }
    }

    /// Make `index` current, hand its source to the adapter and play.
    async fn start_track(&mut self, index: usize) -> Result<()> {
        let Some(track) = self.state.queue.get(index).cloned() else {
            return Err(PlaybackError::InvalidIndex {
                index,
                len: self.state.queue.len(),
            });
        };

        self.state.current_index = Some(index);
        self.state.position = 0.0;
        self.state.duration = track.duration.filter(|d| d.is_finite()).unwrap_or(0.0).max(0.0);
        self.state.is_loading = true;
        self.state.is_playing = false;
        self.state.last_error = None;

        let source = self.resolver.resolve(&track).await;
        let kind = source.kind();
        self.state.source_kind = Some(kind);
        let from_cache = kind == SourceKind::Cached;
        self.resolver
            .set_active(from_cache.then_some(track.file_id.as_str()));

        if let Err(e) = self.adapter.load(source).await {
            self.fail_load(e.to_string());
            return Err(PlaybackError::Adapter(e));
        }

        if from_cache {
            self.resolver.mark_played(&track.file_id).await;
        }

        self.adapter.play().await?;
        self.state.is_playing = true;

        info!(track_id = %track.file_id, index, from_cache, "Track started");
        self.emit(PlaybackEvent::Started {
            track_id: track.file_id,
            index,
            from_cache,
        });

        Ok(())
    }

    async fn restart_current(&mut self) -> Result<()> {
        self.adapter.seek(0.0).await?;
        self.state.position = 0.0;
        Ok(())
    }

    /// End of queue without repeat: keep the last track selected, stop.
    async fn stop_at_end(&mut self) -> Result<()> {
        if self.state.is_playing {
            self.adapter.pause().await?;
        }
        self.state.is_playing = false;

        if let Some(track) = self.current_track() {
            let track_id = track.file_id.clone();
            debug!(track_id = %track_id, "Reached end of queue");
            self.emit(PlaybackEvent::Stopped { track_id });
        }
        Ok(())
    }

    /// Surface a load failure without retrying.
    fn fail_load(&mut self, reason: String) {
        warn!(reason = %reason, "Track failed to load");
        self.state.is_loading = false;
        self.state.is_playing = false;
        self.state.last_error = Some(reason.clone());
        self.emit(PlaybackEvent::Error {
            track_id: self.current_track().map(|t| t.file_id.clone()),
            message: reason,
            recoverable: true,
        });
    }

    fn emit(&self, event: PlaybackEvent) {
        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Playback(event));
        }
    }
}
