// Transport helpers layered on the player's public surface

use crate::player::MediaPlayer;
use cadence_core::{PlayerState, Result};

pub const SPEED_STEP: f64 = 0.25;
pub const MIN_SPEED: f64 = 0.25;
pub const MAX_SPEED: f64 = 4.0;

/// Frame duration assumed when the video stream has no usable rate
pub const FALLBACK_FRAME_SECS: f64 = 1.0 / 30.0;

/// Play/pause toggling and stepped speed control
pub struct PlaybackController<'a> {
    player: &'a MediaPlayer,
}

impl<'a> PlaybackController<'a> {
    pub fn new(player: &'a MediaPlayer) -> Self {
        Self { player }
    }

    pub fn toggle_play_pause(&self) -> Result<()> {
        if self.player.state() == PlayerState::Playing {
            self.player.pause()
        } else {
            self.player.play()
        }
    }

    pub fn stop(&self) -> Result<()> {
        self.player.stop()
    }

    /// One step faster, up to 4x; returns the new speed
    pub fn faster(&self) -> f64 {
        let speed = (self.player.speed() + SPEED_STEP).min(MAX_SPEED);
        self.player.set_speed(speed);
        speed
    }

    /// One step slower, down to 0.25x; returns the new speed
    pub fn slower(&self) -> f64 {
        let speed = (self.player.speed() - SPEED_STEP).max(MIN_SPEED);
        self.player.set_speed(speed);
        speed
    }

    pub fn normal_speed(&self) {
        self.player.set_speed(1.0);
    }
}

/// Absolute, relative and frame-wise seeking
pub struct SeekController<'a> {
    player: &'a MediaPlayer,
}

impl<'a> SeekController<'a> {
    pub fn new(player: &'a MediaPlayer) -> Self {
        Self { player }
    }

    pub fn seek_absolute(&self, seconds: f64) -> Result<()> {
        self.player.seek(seconds)
    }

    /// Seek by `delta` from the current position, kept inside [0, duration]
    pub fn seek_relative(&self, delta: f64) -> Result<()> {
        let target = (self.player.current_time() + delta).max(0.0);
        let duration = self.player.duration();
        let target = if duration > 0.0 { target.min(duration) } else { target };
        self.player.seek(target)
    }

    /// Duration of one video frame at the stream's nominal rate
    pub fn frame_duration(&self) -> f64 {
        self.player
            .media_info()
            .and_then(|info| info.video_fps())
            .map(|fps| 1.0 / fps)
            .unwrap_or(FALLBACK_FRAME_SECS)
    }

    /// Move `direction` frames; negative steps go back
    pub fn frame_step(&self, direction: i32) -> Result<()> {
        self.seek_relative(direction as f64 * self.frame_duration())
    }
}
