//! Transport configuration and observable state.

use bridge_traits::playback::SourceKind;
use core_library::models::Track;
use serde::{Deserialize, Serialize};

/// Elapsed seconds after which "previous" restarts the current track.
pub const DEFAULT_RESTART_THRESHOLD_SECS: f64 = 3.0;

/// Configuration for the transport state machine.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportConfig {
    /// Past this position `previous()` seeks to 0 instead of changing track
    /// (default: 3.0)
    pub restart_threshold_secs: f64,

    /// Seed for shuffle selection; `None` seeds from OS entropy
    pub shuffle_seed: Option<u64>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            restart_threshold_secs: DEFAULT_RESTART_THRESHOLD_SECS,
            shuffle_seed: None,
        }
    }
}

impl TransportConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_restart_threshold(mut self, secs: f64) -> Self {
        self.restart_threshold_secs = secs;
        self
    }

    /// Make shuffle selection reproducible.
    pub fn with_shuffle_seed(mut self, seed: u64) -> Self {
        self.shuffle_seed = Some(seed);
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if !self.restart_threshold_secs.is_finite() || self.restart_threshold_secs < 0.0 {
            return Err("restart_threshold_secs must be a non-negative number".to_string());
        }
        Ok(())
    }
}

/// Repeat behavior applied when advancing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    /// Stop after the last track.
    #[default]
    #[serde(rename = "none")]
    Off,
    /// Wrap from the last track to the first.
    All,
    /// Replay the current track.
    One,
}

impl RepeatMode {
    /// `Off → All → One → Off`
    pub fn cycle(self) -> Self {
        match self {
            RepeatMode::Off => RepeatMode::All,
            RepeatMode::All => RepeatMode::One,
            RepeatMode::One => RepeatMode::Off,
        }
    }
}

/// Everything a UI needs to render the transport.
///
/// `current_index` is `None` or a valid index into `queue`. `position`
/// stays within `[0, duration]` whenever the duration is known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportState {
    /// Playback order absent shuffle.
    pub queue: Vec<Track>,
    pub current_index: Option<usize>,
    /// Seconds.
    pub position: f64,
    /// Seconds; 0 until known.
    pub duration: f64,
    /// `0.0..=1.0`
    pub volume: f32,
    pub shuffle: bool,
    pub repeat_mode: RepeatMode,
    pub is_playing: bool,
    /// Set from a load command until the adapter reports ready or fails.
    pub is_loading: bool,
    /// Last load failure, cleared by the next load.
    pub last_error: Option<String>,
    /// Where the current track's audio comes from.
    pub source_kind: Option<SourceKind>,
}

impl Default for TransportState {
    fn default() -> Self {
        Self {
            queue: Vec::new(),
            current_index: None,
            position: 0.0,
            duration: 0.0,
            volume: 1.0,
            shuffle: false,
            repeat_mode: RepeatMode::Off,
            is_playing: false,
            is_loading: false,
            last_error: None,
            source_kind: None,
        }
    }
}

impl TransportState {
    pub fn current_track(&self) -> Option<&Track> {
        self.current_index.and_then(|i| self.queue.get(i))
    }

    pub fn has_track(&self) -> bool {
        self.current_track().is_some()
    }

    /// Clamp `position` to `[0, duration]`, or to `>= 0` while the duration
    /// is unknown.
    pub fn clamp_position(&self, position: f64) -> f64 {
        if position.is_nan() {
            return 0.0;
        }
        if self.duration > 0.0 {
            position.clamp(0.0, self.duration)
        } else {
            position.max(0.0)
        }
    }

    /// `position` in whole milliseconds.
    pub fn position_ms(&self) -> u64 {
        (self.position.max(0.0) * 1000.0).round() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeat_mode_cycle() {
        assert_eq!(RepeatMode::Off.cycle(), RepeatMode::All);
        assert_eq!(RepeatMode::All.cycle(), RepeatMode::One);
        assert_eq!(RepeatMode::One.cycle(), RepeatMode::Off);
    }

    #[test]
    fn test_repeat_mode_serialization() {
        assert_eq!(serde_json::to_string(&RepeatMode::Off).unwrap(), "\"none\"");
        assert_eq!(serde_json::to_string(&RepeatMode::All).unwrap(), "\"all\"");
        assert_eq!(serde_json::to_string(&RepeatMode::One).unwrap(), "\"one\"");
    }

    #[test]
    fn test_default_state() {
        let state = TransportState::default();
        assert_eq!(state.current_index, None);
        assert_eq!(state.volume, 1.0);
        assert!(!state.has_track());
    }

    #[test]
    fn test_clamp_position() {
        let mut state = TransportState::default();
        assert_eq!(state.clamp_position(-5.0), 0.0);
        assert_eq!(state.clamp_position(42.0), 42.0);

        state.duration = 30.0;
        assert_eq!(state.clamp_position(130.0), 30.0);
        assert_eq!(state.clamp_position(f64::NAN), 0.0);
    }

    #[test]
    fn test_config_validation() {
        assert!(TransportConfig::default().validate().is_ok());
        assert!(TransportConfig::default()
            .with_restart_threshold(-1.0)
            .validate()
            .is_err());
        assert_eq!(
            TransportConfig::new().with_shuffle_seed(7).shuffle_seed,
            Some(7)
        );
    }
}
