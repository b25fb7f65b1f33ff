// Player configuration
// Persisting it is the embedding application's job; this only defines and validates values

use crate::error::{PlayerError, Result};
use serde::{Deserialize, Serialize};

/// Default capacity of each bounded frame channel
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

/// Default maximum video lead before a frame is deferred (seconds)
pub const DEFAULT_SYNC_TOLERANCE: f64 = 0.02;

/// Default throttle for position callbacks (milliseconds)
pub const DEFAULT_POSITION_UPDATE_INTERVAL_MS: u64 = 100;

/// How decoding is scheduled relative to `update()`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DecodeMode {
    /// `update()` pulls straight from the decode pipeline on the ticking thread.
    /// Deterministic under a manual clock; meant for simulations and tests.
    Inline,
    /// A producer thread fills bounded frame channels; `update()` only drains them
    #[default]
    Threaded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    pub speed: f64,
    pub sync_tolerance: f64,
    pub position_update_interval_ms: u64,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            speed: 1.0,
            sync_tolerance: DEFAULT_SYNC_TOLERANCE,
            position_update_interval_ms: DEFAULT_POSITION_UPDATE_INTERVAL_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    pub enabled: bool,
    pub volume: f32,
    pub muted: bool,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            volume: 1.0,
            muted: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub playback: PlaybackSettings,
    pub audio: AudioSettings,
    pub queue_capacity: usize,
    pub decode_mode: DecodeMode,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            playback: PlaybackSettings::default(),
            audio: AudioSettings::default(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            decode_mode: DecodeMode::default(),
        }
    }
}

/// Non-positive or non-finite speeds fall back to normal speed
pub fn sanitize_speed(speed: f64) -> f64 {
    if speed.is_finite() && speed > 0.0 {
        speed
    } else {
        1.0
    }
}

impl PlayerConfig {
    /// Reject values no player can run with and normalise the substitutable ones
    pub fn validate(mut self) -> Result<Self> {
        if self.queue_capacity == 0 {
            return Err(PlayerError::InvalidConfig(
                "queue capacity must be greater than zero".to_string(),
            ));
        }
        let tolerance = self.playback.sync_tolerance;
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(PlayerError::InvalidConfig(format!(
                "sync tolerance must be a non-negative number of seconds, got {}",
                tolerance
            )));
        }
        if sanitize_speed(self.playback.speed) != self.playback.speed {
            log::warn!("Playback speed {} replaced by 1.0", self.playback.speed);
            self.playback.speed = 1.0;
        }
        self.audio.volume = if self.audio.volume.is_finite() {
            self.audio.volume.clamp(0.0, 1.0)
        } else {
            1.0
        };
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PlayerConfig::default().validate().unwrap();
        assert_eq!(config.queue_capacity, 10);
        assert_eq!(config.playback.sync_tolerance, 0.02);
        assert_eq!(config.decode_mode, DecodeMode::Threaded);
    }

    #[test]
    fn test_zero_capacity_is_refused() {
        let config = PlayerConfig {
            queue_capacity: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(PlayerError::InvalidConfig(_))));
    }

    #[test]
    fn test_bad_speed_and_volume_are_substituted() {
        let mut config = PlayerConfig::default();
        config.playback.speed = -2.0;
        config.audio.volume = 3.0;
        let config = config.validate().unwrap();
        assert_eq!(config.playback.speed, 1.0);
        assert_eq!(config.audio.volume, 1.0);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: PlayerConfig =
            serde_json::from_str(r#"{"decode_mode":"inline","playback":{"speed":1.5}}"#).unwrap();
        assert_eq!(config.decode_mode, DecodeMode::Inline);
        assert_eq!(config.playback.speed, 1.5);
        assert_eq!(config.playback.sync_tolerance, DEFAULT_SYNC_TOLERANCE);
        assert_eq!(config.queue_capacity, DEFAULT_QUEUE_CAPACITY);
    }
}
