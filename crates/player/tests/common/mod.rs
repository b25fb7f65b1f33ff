// Scripted pipeline, recording sinks and a manual clock for player tests
#![allow(dead_code)]

use cadence_clock::ManualTimeSource;
use cadence_core::{
    AudioBlock, CallbackEvent, DecodeMode, DecodePipeline, DecodedUnit, MediaInfo, PixelFormat,
    PlayerCallback, PlayerConfig, PlayerError, Result, StreamInfo, StreamKind, StreamParams,
    VideoFrame,
};
use cadence_player::{MediaPlayer, TickReport};
use cadence_sink_api::{AudioSink, AudioSpec, VideoSink, VideoSpec};
use parking_lot::Mutex;
use std::sync::Arc;

pub const AUDIO_BLOCK_SECS: f64 = 0.02;

/// Default settings, but decoding on the tick thread so the manual clock fully drives a test
pub fn inline_config() -> PlayerConfig {
    PlayerConfig {
        decode_mode: DecodeMode::Inline,
        ..PlayerConfig::default()
    }
}

/// Keeps every event the player emits
#[derive(Default)]
pub struct RecordingCallback {
    received: Mutex<Vec<CallbackEvent>>,
}

impl RecordingCallback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<CallbackEvent> {
        self.received.lock().clone()
    }

    pub fn clear(&self) {
        self.received.lock().clear();
    }
}

impl PlayerCallback for RecordingCallback {
    fn on_event(&self, event: CallbackEvent) {
        self.received.lock().push(event);
    }
}

/// Knobs and observations of a scripted media source
pub struct ScriptState {
    pub duration: f64,
    pub fps: Option<f64>,
    pub has_video: bool,
    pub has_audio: bool,
    pub timestamps: bool,
    pub fail_open: bool,
    pub fail_seek: bool,
    pub seeks: Vec<f64>,
    pub shutdowns: usize,
    next_frame: u64,
    next_audio: f64,
    open: bool,
}

/// Shared handle to a scripted source; the pipeline itself goes to the player
#[derive(Clone)]
pub struct Script(pub Arc<Mutex<ScriptState>>);

impl Script {
    pub fn new(duration: f64) -> Self {
        Script(Arc::new(Mutex::new(ScriptState {
            duration,
            fps: Some(25.0),
            has_video: true,
            has_audio: true,
            timestamps: true,
            fail_open: false,
            fail_seek: false,
            seeks: Vec::new(),
            shutdowns: 0,
            next_frame: 0,
            next_audio: 0.0,
            open: false,
        })))
    }

    pub fn pipeline(&self) -> ScriptedPipeline {
        ScriptedPipeline { script: self.clone() }
    }

    pub fn set<F: FnOnce(&mut ScriptState)>(&self, f: F) {
        f(&mut self.0.lock());
    }

    pub fn seeks(&self) -> Vec<f64> {
        self.0.lock().seeks.clone()
    }

    pub fn shutdowns(&self) -> usize {
        self.0.lock().shutdowns
    }
}

/// Decode pipeline producing evenly spaced frames and audio blocks up to the duration
pub struct ScriptedPipeline {
    script: Script,
}

impl ScriptState {
    fn frame_secs(&self) -> f64 {
        1.0 / self.fps.unwrap_or(30.0)
    }

    fn video_left(&self) -> bool {
        self.open && self.has_video && (self.next_frame as f64) * self.frame_secs() < self.duration
    }

    fn audio_left(&self) -> bool {
        self.open && self.has_audio && self.next_audio < self.duration
    }
}

impl DecodePipeline for ScriptedPipeline {
    fn prepare(&mut self, uri: &str) -> Result<MediaInfo> {
        let mut state = self.script.0.lock();
        if state.fail_open {
            return Err(PlayerError::Open(format!("cannot open {}", uri)));
        }
        state.open = true;
        state.next_frame = 0;
        state.next_audio = 0.0;

        let mut streams = Vec::new();
        if state.has_video {
            streams.push(StreamInfo {
                index: 0,
                codec_name: "scripted-video".to_string(),
                params: StreamParams::Video { width: 4, height: 2, fps: state.fps },
                duration_secs: state.duration,
            });
        }
        if state.has_audio {
            streams.push(StreamInfo {
                index: 1,
                codec_name: "scripted-audio".to_string(),
                params: StreamParams::Audio { sample_rate: 1000, channels: 1 },
                duration_secs: state.duration,
            });
        }
        let mut info = MediaInfo {
            uri: uri.to_string(),
            duration_secs: state.duration,
            streams,
            ..Default::default()
        };
        info.select_default_streams();
        Ok(info)
    }

    fn next_video_unit(&mut self) -> Option<DecodedUnit> {
        let mut state = self.script.0.lock();
        if !state.video_left() {
            return None;
        }
        let pts = state.next_frame as f64 * state.frame_secs();
        state.next_frame += 1;
        let frame = VideoFrame {
            width: 4,
            height: 2,
            format: PixelFormat::Yuv420p,
            data: vec![0; 12],
        };
        Some(DecodedUnit::video(state.timestamps.then_some(pts), frame))
    }

    fn next_audio_unit(&mut self) -> Option<DecodedUnit> {
        let mut state = self.script.0.lock();
        if !state.audio_left() {
            return None;
        }
        let pts = state.next_audio;
        state.next_audio += AUDIO_BLOCK_SECS;
        let block = AudioBlock {
            sample_rate: 1000,
            channels: 1,
            samples: vec![0.1; 20],
        };
        Some(DecodedUnit::audio(state.timestamps.then_some(pts), block))
    }

    fn is_exhausted(&self, kind: StreamKind) -> bool {
        let state = self.script.0.lock();
        match kind {
            StreamKind::Video => !state.video_left(),
            StreamKind::Audio => !state.audio_left(),
        }
    }

    fn seek(&mut self, seconds: f64) -> Result<()> {
        let mut state = self.script.0.lock();
        if state.fail_seek {
            return Err(PlayerError::Seek("scripted seek failure".to_string()));
        }
        state.seeks.push(seconds);
        // First frame at or after the target
        state.next_frame = (seconds / state.frame_secs() - 1e-6).ceil().max(0.0) as u64;
        state.next_audio = seconds;
        Ok(())
    }

    fn shutdown(&mut self) {
        let mut state = self.script.0.lock();
        state.open = false;
        state.shutdowns += 1;
    }
}

/// What a recording sink has seen
#[derive(Default, Debug)]
pub struct SinkLog {
    pub initialized: usize,
    pub presented: Vec<Option<f64>>,
    pub clears: usize,
    pub shutdowns: usize,
    pub pauses: usize,
    pub resumes: usize,
    pub volume: Option<f32>,
    pub muted: Option<bool>,
    /// What the sink reports as still waiting to be played
    pub buffered_secs: f64,
}

pub type SharedLog = Arc<Mutex<SinkLog>>;

pub struct RecordingVideoSink(pub SharedLog);

impl VideoSink for RecordingVideoSink {
    fn initialize(&mut self, _spec: &VideoSpec) -> Result<()> {
        self.0.lock().initialized += 1;
        Ok(())
    }

    fn consume(&mut self, unit: DecodedUnit) {
        self.0.lock().presented.push(unit.timestamp());
    }

    fn clear(&mut self) {
        self.0.lock().clears += 1;
    }

    fn shutdown(&mut self) {
        self.0.lock().shutdowns += 1;
    }
}

pub struct RecordingAudioSink {
    pub log: SharedLog,
    pub fail_init: bool,
}

impl AudioSink for RecordingAudioSink {
    fn initialize(&mut self, spec: &AudioSpec) -> Result<()> {
        if self.fail_init {
            return Err(PlayerError::SinkInit(format!(
                "no device for {} Hz",
                spec.sample_rate
            )));
        }
        self.log.lock().initialized += 1;
        Ok(())
    }

    fn consume(&mut self, unit: DecodedUnit) {
        self.log.lock().presented.push(unit.timestamp());
    }

    fn clear(&mut self) {
        self.log.lock().clears += 1;
    }

    fn shutdown(&mut self) {
        self.log.lock().shutdowns += 1;
    }

    fn pause(&mut self) {
        self.log.lock().pauses += 1;
    }

    fn resume(&mut self) {
        self.log.lock().resumes += 1;
    }

    fn set_volume(&mut self, volume: f32) {
        self.log.lock().volume = Some(volume);
    }

    fn set_muted(&mut self, muted: bool) {
        self.log.lock().muted = Some(muted);
    }

    fn buffered_secs(&self) -> f64 {
        self.log.lock().buffered_secs
    }
}

/// A player wired to a scripted source, recording sinks and a manual clock
pub struct Harness {
    pub player: MediaPlayer,
    pub time: ManualTimeSource,
    pub script: Script,
    pub video: SharedLog,
    pub audio: SharedLog,
    pub events: Arc<RecordingCallback>,
}

impl Harness {
    pub fn new(duration: f64) -> Self {
        Self::build(inline_config(), Script::new(duration), false)
    }

    pub fn build(config: PlayerConfig, script: Script, fail_audio_init: bool) -> Self {
        Self::try_build(config, script, fail_audio_init).expect("player construction")
    }

    pub fn try_build(config: PlayerConfig, script: Script, fail_audio_init: bool) -> Result<Self> {
        let time = ManualTimeSource::new();
        let video: SharedLog = Arc::default();
        let audio: SharedLog = Arc::default();
        let player = MediaPlayer::with_time_source(
            config,
            script.pipeline(),
            Box::new(RecordingVideoSink(video.clone())),
            Some(Box::new(RecordingAudioSink {
                log: audio.clone(),
                fail_init: fail_audio_init,
            })),
            Arc::new(time.clone()),
        )?;
        let events = Arc::new(RecordingCallback::new());
        player.add_callback(events.clone());
        Ok(Self {
            player,
            time,
            script,
            video,
            audio,
            events,
        })
    }

    /// Open and start playing
    pub fn start(&self) {
        self.player.open("scripted://movie").unwrap();
        self.player.play().unwrap();
    }

    /// Advance the manual clock in `step` increments for `secs`, ticking after each
    pub fn run(&self, secs: f64, step: f64) -> Vec<TickReport> {
        let steps = (secs / step).round() as usize;
        (0..steps)
            .map(|_| {
                self.time.advance_secs(step);
                self.player.update()
            })
            .collect()
    }

    pub fn video_presented(&self) -> Vec<Option<f64>> {
        self.video.lock().presented.clone()
    }
}

pub fn approx(a: f64, b: f64, eps: f64) -> bool {
    (a - b).abs() <= eps
}
