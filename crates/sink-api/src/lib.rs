// Presentation sink abstraction layer

use cadence_core::{DecodedUnit, MediaInfo, Payload, Result, StreamParams};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Format of the audio stream a sink is asked to present
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioSpec {
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioSpec {
    pub fn from_media(info: &MediaInfo) -> Option<Self> {
        match info.audio()?.params {
            StreamParams::Audio { sample_rate, channels } => Some(Self { sample_rate, channels }),
            _ => None,
        }
    }
}

impl Default for AudioSpec {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            channels: 2,
        }
    }
}

/// Geometry and nominal rate of the video stream a sink is asked to present
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoSpec {
    pub width: u32,
    pub height: u32,
    pub fps: Option<f64>,
}

impl VideoSpec {
    pub fn from_media(info: &MediaInfo) -> Option<Self> {
        match info.video()?.params {
            StreamParams::Video { width, height, fps } => Some(Self { width, height, fps }),
            _ => None,
        }
    }
}

/// Audio output.
/// Units handed to `consume` are already due; the sink only has to play them.
pub trait AudioSink: Send {
    /// Acquire the output device for a stream of format `spec`
    fn initialize(&mut self, spec: &AudioSpec) -> Result<()>;

    /// Queue a decoded audio unit; must not block for long
    fn consume(&mut self, unit: DecodedUnit);

    /// Drop anything queued but not yet played
    fn clear(&mut self);

    /// Release the device
    fn shutdown(&mut self);

    /// Whether the sink can take another unit now.
    /// The player skips its per-tick audio pull while this is false.
    fn ready_for_more(&mut self) -> bool {
        true
    }

    /// Seconds of accepted audio still waiting to be played.
    /// Lets a caller wait for the tail before `shutdown`.
    fn buffered_secs(&self) -> f64 {
        0.0
    }

    fn pause(&mut self) {}

    fn resume(&mut self) {}

    /// Linear gain, 0.0 to 1.0
    fn set_volume(&mut self, _volume: f32) {}

    fn set_muted(&mut self, _muted: bool) {}
}

/// Video output
pub trait VideoSink: Send {
    fn initialize(&mut self, spec: &VideoSpec) -> Result<()>;

    /// Present a due frame
    fn consume(&mut self, unit: DecodedUnit);

    fn clear(&mut self);

    fn shutdown(&mut self);
}

/// Video sink that drops every frame after counting it.
/// Used where nothing can draw (headless runs, the command-line player).
#[derive(Default)]
pub struct NullVideoSink {
    presented: Arc<AtomicU64>,
}

impl NullVideoSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared counter of frames consumed so far
    pub fn counter(&self) -> Arc<AtomicU64> {
        self.presented.clone()
    }

    pub fn presented(&self) -> u64 {
        self.presented.load(Ordering::Relaxed)
    }
}

impl VideoSink for NullVideoSink {
    fn initialize(&mut self, spec: &VideoSpec) -> Result<()> {
        log::debug!("Null video sink accepting {}x{} frames", spec.width, spec.height);
        Ok(())
    }

    fn consume(&mut self, unit: DecodedUnit) {
        if let Payload::Video(_) = unit.payload {
            self.presented.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn clear(&mut self) {}

    fn shutdown(&mut self) {
        log::debug!("Null video sink saw {} frame(s)", self.presented());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::{AudioBlock, PixelFormat, StreamInfo, VideoFrame};

    #[test]
    fn test_specs_from_media() {
        let mut info = MediaInfo {
            streams: vec![
                StreamInfo {
                    index: 0,
                    codec_name: "vp9".to_string(),
                    params: StreamParams::Video { width: 640, height: 360, fps: Some(30.0) },
                    duration_secs: 10.0,
                },
                StreamInfo {
                    index: 1,
                    codec_name: "opus".to_string(),
                    params: StreamParams::Audio { sample_rate: 48000, channels: 2 },
                    duration_secs: 10.0,
                },
            ],
            ..Default::default()
        };
        assert_eq!(AudioSpec::from_media(&info), None);
        info.select_default_streams();
        assert_eq!(AudioSpec::from_media(&info), Some(AudioSpec::default()));
        assert_eq!(
            VideoSpec::from_media(&info),
            Some(VideoSpec { width: 640, height: 360, fps: Some(30.0) })
        );
    }

    #[test]
    fn test_null_sink_counts_frames_only() {
        let mut sink = NullVideoSink::new();
        let counter = sink.counter();
        let frame = VideoFrame {
            width: 1,
            height: 1,
            format: PixelFormat::Rgba8,
            data: vec![0; 4],
        };
        sink.consume(DecodedUnit::video(Some(0.0), frame.clone()));
        sink.consume(DecodedUnit::video(Some(0.04), frame));
        sink.consume(DecodedUnit::audio(
            Some(0.0),
            AudioBlock { sample_rate: 8000, channels: 1, samples: vec![0.0; 8] },
        ));
        assert_eq!(sink.presented(), 2);
        assert_eq!(counter.load(Ordering::Relaxed), 2);
    }
}
