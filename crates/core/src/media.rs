// Stream discovery results handed from the decode pipeline to the player

use crate::unit::StreamKind;

/// Kind-specific stream parameters
#[derive(Debug, Clone, PartialEq)]
pub enum StreamParams {
    Video { width: u32, height: u32, fps: Option<f64> },
    Audio { sample_rate: u32, channels: u16 },
    /// Subtitles, attachments and anything else the pipeline does not decode
    Other,
}

/// One stream discovered in the container
#[derive(Debug, Clone, PartialEq)]
pub struct StreamInfo {
    /// Container-level stream / track id
    pub index: u32,
    pub codec_name: String,
    pub params: StreamParams,
    /// Stream duration in seconds, falling back to the container duration
    pub duration_secs: f64,
}

impl StreamInfo {
    pub fn kind(&self) -> Option<StreamKind> {
        match self.params {
            StreamParams::Video { .. } => Some(StreamKind::Video),
            StreamParams::Audio { .. } => Some(StreamKind::Audio),
            StreamParams::Other => None,
        }
    }
}

/// Everything the player learns from `DecodePipeline::prepare`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MediaInfo {
    pub uri: String,
    /// Container duration in seconds (0.0 when unknown)
    pub duration_secs: f64,
    pub streams: Vec<StreamInfo>,
    /// Index into `streams` of the selected video stream
    pub video_stream: Option<usize>,
    /// Index into `streams` of the selected audio stream
    pub audio_stream: Option<usize>,
}

impl MediaInfo {
    pub fn video(&self) -> Option<&StreamInfo> {
        self.video_stream.and_then(|i| self.streams.get(i))
    }

    pub fn audio(&self) -> Option<&StreamInfo> {
        self.audio_stream.and_then(|i| self.streams.get(i))
    }

    pub fn has_stream(&self, kind: StreamKind) -> bool {
        match kind {
            StreamKind::Video => self.video().is_some(),
            StreamKind::Audio => self.audio().is_some(),
        }
    }

    /// Nominal frame rate of the selected video stream
    pub fn video_fps(&self) -> Option<f64> {
        match self.video()?.params {
            StreamParams::Video { fps, .. } => fps.filter(|f| *f > 0.0),
            _ => None,
        }
    }

    /// Pick the first video and first audio stream, the way stream discovery does
    pub fn select_default_streams(&mut self) {
        self.video_stream = self
            .streams
            .iter()
            .position(|s| s.kind() == Some(StreamKind::Video));
        self.audio_stream = self
            .streams
            .iter()
            .position(|s| s.kind() == Some(StreamKind::Audio));
    }
}
