// Decoded units: one timestamped frame of audio or video leaving the decode stage

/// Which stream a unit belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Video,
    Audio,
}

/// Pixel layout tag of a decoded video frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgba8,
    Bgra8,
    Yuv420p,
    /// Anything the sink is expected to convert itself
    Other,
}

/// Decoded video picture
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub data: Vec<u8>,
}

/// Decoded audio block (interleaved PCM f32)
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBlock {
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<f32>,
}

impl AudioBlock {
    /// Number of sample frames (samples per channel)
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels as usize
        }
    }

    /// Duration of the block in seconds
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.frames() as f64 / self.sample_rate as f64
        }
    }
}

/// Unit payload, owned exclusively by the unit until a sink consumes it
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Video(VideoFrame),
    Audio(AudioBlock),
}

/// One decoded unit
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedUnit {
    /// Presentation timestamp in seconds
    pub pts: Option<f64>,
    /// Decoder's best-effort guess, used when `pts` is missing
    pub best_effort_pts: Option<f64>,
    pub payload: Payload,
}

impl DecodedUnit {
    pub fn video(pts: Option<f64>, frame: VideoFrame) -> Self {
        Self {
            pts,
            best_effort_pts: None,
            payload: Payload::Video(frame),
        }
    }

    pub fn audio(pts: Option<f64>, block: AudioBlock) -> Self {
        Self {
            pts,
            best_effort_pts: None,
            payload: Payload::Audio(block),
        }
    }

    pub fn with_best_effort_pts(mut self, pts: Option<f64>) -> Self {
        self.best_effort_pts = pts;
        self
    }

    pub fn kind(&self) -> StreamKind {
        match self.payload {
            Payload::Video(_) => StreamKind::Video,
            Payload::Audio(_) => StreamKind::Audio,
        }
    }

    /// Known timestamp of the unit, if any
    pub fn timestamp(&self) -> Option<f64> {
        self.pts
            .filter(|t| t.is_finite())
            .or(self.best_effort_pts.filter(|t| t.is_finite()))
    }

    /// Presentation time, treating an unknown timestamp as due at `clock_time`
    pub fn presentation_time(&self, clock_time: f64) -> f64 {
        self.timestamp().unwrap_or(clock_time)
    }
}
