// Media player: state machine, playback clock and tick-driven sync over one decode pipeline

use crate::sync::{SyncController, TickReport};
use crate::worker::ThreadedPipeline;
use cadence_clock::{PlaybackClock, SystemTimeSource, TimeSource};
use cadence_core::config::sanitize_speed;
use cadence_core::{
    CallbackEvent, CallbackManager, DecodeMode, DecodePipeline, MediaInfo, PlaybackStatus,
    PlayerCallback, PlayerConfig, PlayerError, PlayerState, PlayerStateContainer, Result,
};
use cadence_sink_api::{AudioSink, AudioSpec, VideoSink, VideoSpec};
use parking_lot::Mutex;
use std::sync::Arc;

/// Everything a tick or a transition touches, behind one lock
struct PlayerInner {
    pipeline: Box<dyn DecodePipeline>,
    video_sink: Box<dyn VideoSink>,
    audio_sink: Option<Box<dyn AudioSink>>,
    /// Audio sink initialized for the current media
    audio_active: bool,
    sync: SyncController,
    media: Option<MediaInfo>,
    /// Last known position; where `play()` starts from Ready/Stopped
    position: f64,
    speed: f64,
    volume: f32,
    muted: bool,
}

impl PlayerInner {
    fn active_audio(&mut self) -> Option<&mut Box<dyn AudioSink>> {
        if self.audio_active {
            self.audio_sink.as_mut()
        } else {
            None
        }
    }

    fn flush_presentation(&mut self) {
        self.sync.clear_pending();
        self.video_sink.clear();
        if let Some(sink) = self.active_audio() {
            sink.clear();
        }
    }
}

/// Single-media player.
///
/// All methods take `&self`; the caller drives presentation by calling
/// `update()` periodically (every few milliseconds) while playing. Events
/// are delivered to registered callbacks after internal locks are released,
/// so a callback may call back into the player.
pub struct MediaPlayer {
    config: PlayerConfig,
    clock: PlaybackClock,
    state: PlayerStateContainer,
    callbacks: CallbackManager,
    inner: Mutex<PlayerInner>,
}

impl MediaPlayer {
    /// Player on the system clock. `audio_sink` is ignored when audio is disabled in `config`.
    pub fn new<P>(
        config: PlayerConfig,
        pipeline: P,
        video_sink: Box<dyn VideoSink>,
        audio_sink: Option<Box<dyn AudioSink>>,
    ) -> Result<Self>
    where
        P: DecodePipeline + 'static,
    {
        Self::with_time_source(
            config,
            pipeline,
            video_sink,
            audio_sink,
            Arc::new(SystemTimeSource::new()),
        )
    }

    /// Player whose clock reads `time_source`; used for simulations and tests
    pub fn with_time_source<P>(
        config: PlayerConfig,
        pipeline: P,
        video_sink: Box<dyn VideoSink>,
        audio_sink: Option<Box<dyn AudioSink>>,
        time_source: Arc<dyn TimeSource>,
    ) -> Result<Self>
    where
        P: DecodePipeline + 'static,
    {
        let config = config.validate()?;
        let pipeline: Box<dyn DecodePipeline> = match config.decode_mode {
            DecodeMode::Inline => Box::new(pipeline),
            DecodeMode::Threaded => Box::new(ThreadedPipeline::new(pipeline, config.queue_capacity)?),
        };
        let audio_sink = if config.audio.enabled { audio_sink } else { None };

        let state = PlayerStateContainer::new();
        state.update_status(|status| {
            status.speed = config.playback.speed;
            status.volume = config.audio.volume;
            status.muted = config.audio.muted;
        });

        log::debug!(
            "Player created: mode={:?} capacity={} tolerance={}s",
            config.decode_mode,
            config.queue_capacity,
            config.playback.sync_tolerance
        );

        Ok(Self {
            clock: PlaybackClock::with_time_source(time_source),
            state,
            callbacks: CallbackManager::new(),
            inner: Mutex::new(PlayerInner {
                pipeline,
                video_sink,
                audio_sink,
                audio_active: false,
                sync: SyncController::new(config.playback.sync_tolerance),
                media: None,
                position: 0.0,
                speed: config.playback.speed,
                volume: config.audio.volume,
                muted: config.audio.muted,
            }),
            config,
        })
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn add_callback(&self, callback: Arc<dyn PlayerCallback>) {
        self.callbacks
            .add_callback(callback, self.config.playback.position_update_interval_ms);
    }

    pub fn clear_callbacks(&self) {
        self.callbacks.clear_callbacks();
    }

    fn emit(&self, events: Vec<CallbackEvent>) {
        for event in events {
            self.callbacks.dispatch_event(event);
        }
    }

    fn transition(&self, to: PlayerState, events: &mut Vec<CallbackEvent>) -> Result<()> {
        let from = self.state.transition(to)?;
        if from != to {
            events.push(CallbackEvent::StateChanged {
                old_state: from,
                new_state: to,
            });
        }
        Ok(())
    }

    fn set_position(&self, inner: &mut PlayerInner, position: f64) {
        inner.position = position;
        self.state.update_status(|status| status.position_secs = position);
    }

    /// Open `uri` and prepare decoding; Ready on success, Error on failure.
    /// Any media already open is closed first.
    pub fn open(&self, uri: &str) -> Result<()> {
        let mut events = Vec::new();
        let result = {
            let mut inner = self.inner.lock();
            if self.state.get_state() != PlayerState::Idle {
                self.close_locked(&mut inner, &mut events);
            }
            self.open_locked(&mut inner, uri, &mut events)
        };
        self.emit(events);
        result
    }

    fn open_locked(&self, inner: &mut PlayerInner, uri: &str, events: &mut Vec<CallbackEvent>) -> Result<()> {
        log::info!("Opening {}", uri);
        let prepared = inner.pipeline.prepare(uri).and_then(|info| {
            if let Some(spec) = VideoSpec::from_media(&info) {
                if let Err(e) = inner.video_sink.initialize(&spec) {
                    inner.pipeline.shutdown();
                    return Err(e);
                }
            }
            Ok(info)
        });

        let info = match prepared {
            Ok(info) => info,
            Err(e) => {
                log::error!("Failed to open {}: {}", uri, e);
                self.transition(PlayerState::Error, events)?;
                events.push(CallbackEvent::Error {
                    message: e.to_string(),
                });
                return Err(e);
            }
        };

        inner.audio_active = false;
        if let Some(spec) = AudioSpec::from_media(&info) {
            let (volume, muted) = (inner.volume, inner.muted);
            if let Some(sink) = inner.audio_sink.as_mut() {
                match sink.initialize(&spec) {
                    Ok(()) => {
                        sink.set_volume(volume);
                        sink.set_muted(muted);
                        inner.audio_active = true;
                    }
                    Err(e) => {
                        log::warn!("Audio sink unavailable, continuing without audio: {}", e);
                        events.push(CallbackEvent::Error {
                            message: e.to_string(),
                        });
                    }
                }
            }
        }

        log::info!(
            "Opened {}: duration={:.3}s video={} audio={}",
            uri,
            info.duration_secs,
            info.video().map(|s| s.codec_name.as_str()).unwrap_or("none"),
            info.audio().map(|s| s.codec_name.as_str()).unwrap_or("none")
        );

        inner.sync.clear_pending();
        self.set_position(inner, 0.0);
        self.state
            .update_status(|status| status.duration_secs = info.duration_secs);
        inner.media = Some(info);
        self.transition(PlayerState::Ready, events)
    }

    /// Start from the last known position (Ready/Stopped) or resume (Paused)
    pub fn play(&self) -> Result<()> {
        let mut events = Vec::new();
        let result = {
            let mut inner = self.inner.lock();
            match self.state.get_state() {
                PlayerState::Ready | PlayerState::Stopped => {
                    self.clock.set_speed(inner.speed);
                    self.clock.start(inner.position);
                    // End of media leaves its unplayed tail in the sink
                    if let Some(sink) = inner.active_audio() {
                        sink.clear();
                        sink.resume();
                    }
                    log::info!("Playing from {:.3}s", inner.position);
                    self.transition(PlayerState::Playing, &mut events)
                }
                PlayerState::Paused => {
                    self.clock.resume();
                    if let Some(sink) = inner.active_audio() {
                        sink.resume();
                    }
                    self.transition(PlayerState::Playing, &mut events)
                }
                PlayerState::Playing => Ok(()),
                state @ (PlayerState::Idle | PlayerState::Error) => Err(PlayerError::InvalidState(
                    format!("Cannot play in {:?} state", state),
                )),
            }
        };
        self.emit(events);
        result
    }

    pub fn pause(&self) -> Result<()> {
        let mut events = Vec::new();
        let result = {
            let mut inner = self.inner.lock();
            match self.state.get_state() {
                PlayerState::Playing => {
                    self.clock.pause();
                    let position = self.clock.current_time();
                    self.set_position(&mut inner, position);
                    if let Some(sink) = inner.active_audio() {
                        sink.pause();
                    }
                    self.transition(PlayerState::Paused, &mut events)
                }
                PlayerState::Paused => Ok(()),
                state => Err(PlayerError::InvalidState(format!(
                    "Cannot pause in {:?} state",
                    state
                ))),
            }
        };
        self.emit(events);
        result
    }

    /// Stop playback; position returns to zero and queued presentation is dropped
    pub fn stop(&self) -> Result<()> {
        let mut events = Vec::new();
        let result = {
            let mut inner = self.inner.lock();
            match self.state.get_state() {
                PlayerState::Playing | PlayerState::Paused => {
                    self.stop_locked(&mut inner);
                    inner.flush_presentation();
                    if let Some(sink) = inner.active_audio() {
                        sink.pause();
                    }
                    self.transition(PlayerState::Stopped, &mut events)
                }
                PlayerState::Ready | PlayerState::Stopped => Ok(()),
                state => Err(PlayerError::InvalidState(format!(
                    "Cannot stop in {:?} state",
                    state
                ))),
            }
        };
        self.emit(events);
        result
    }

    /// Clock to zero and decoding rewound so the next `play()` starts at the beginning
    fn stop_locked(&self, inner: &mut PlayerInner) {
        self.clock.stop();
        self.set_position(inner, 0.0);
        inner.sync.clear_pending();
        if let Err(e) = inner.pipeline.seek(0.0) {
            log::warn!("Could not rewind to the start: {}", e);
        }
    }

    /// Seek to `seconds`, clamped to [0, duration] when the duration is known.
    ///
    /// On failure nothing changes. On success all queued presentation is
    /// flushed; a playing clock restarts at the target, otherwise the target
    /// becomes the position the next `play()` starts from.
    pub fn seek(&self, seconds: f64) -> Result<()> {
        let mut events = Vec::new();
        let result = {
            let mut inner = self.inner.lock();
            self.seek_locked(&mut inner, seconds, &mut events)
        };
        self.emit(events);
        result
    }

    fn seek_locked(&self, inner: &mut PlayerInner, seconds: f64, events: &mut Vec<CallbackEvent>) -> Result<()> {
        let state = self.state.get_state();
        if !state.has_media() {
            return Err(PlayerError::InvalidState(format!(
                "Cannot seek in {:?} state",
                state
            )));
        }
        if !seconds.is_finite() {
            return Err(PlayerError::Seek(format!("Invalid seek target {}", seconds)));
        }
        let duration = inner.media.as_ref().map_or(0.0, |m| m.duration_secs);
        let target = if duration > 0.0 {
            seconds.clamp(0.0, duration)
        } else {
            seconds.max(0.0)
        };

        if let Err(e) = inner.pipeline.seek(target) {
            log::warn!("Seek to {:.3}s failed: {}", target, e);
            return Err(e);
        }

        inner.flush_presentation();
        self.set_position(inner, target);
        match state {
            PlayerState::Playing => {
                self.clock.set_speed(inner.speed);
                self.clock.start(target);
            }
            PlayerState::Paused => {
                self.clock.start(target);
                self.clock.pause();
            }
            _ => self.clock.stop(),
        }
        log::debug!("Seeked to {:.3}s in {:?} state", target, state);
        events.push(CallbackEvent::SeekCompleted {
            position_secs: target,
        });
        Ok(())
    }

    /// Change the playback rate; non-positive or non-finite values mean 1.0
    pub fn set_speed(&self, speed: f64) {
        let speed = sanitize_speed(speed);
        {
            let mut inner = self.inner.lock();
            inner.speed = speed;
            self.clock.set_speed(speed);
        }
        self.state.update_status(|status| status.speed = speed);
        log::debug!("Playback speed set to {}", speed);
        self.emit(vec![CallbackEvent::SpeedChanged { speed }]);
    }

    pub fn speed(&self) -> f64 {
        self.inner.lock().speed
    }

    pub fn set_volume(&self, volume: f32) {
        let volume = if volume.is_finite() { volume.clamp(0.0, 1.0) } else { 1.0 };
        let muted = {
            let mut inner = self.inner.lock();
            inner.volume = volume;
            if let Some(sink) = inner.audio_sink.as_mut() {
                sink.set_volume(volume);
            }
            inner.muted
        };
        self.state.update_status(|status| status.volume = volume);
        self.emit(vec![CallbackEvent::VolumeChanged { volume, muted }]);
    }

    pub fn set_muted(&self, muted: bool) {
        let volume = {
            let mut inner = self.inner.lock();
            inner.muted = muted;
            if let Some(sink) = inner.audio_sink.as_mut() {
                sink.set_muted(muted);
            }
            inner.volume
        };
        self.state.update_status(|status| status.muted = muted);
        self.emit(vec![CallbackEvent::VolumeChanged { volume, muted }]);
    }

    /// Flip mute, returning the new setting
    pub fn toggle_mute(&self) -> bool {
        let muted = !self.is_muted();
        self.set_muted(muted);
        muted
    }

    pub fn volume(&self) -> f32 {
        self.inner.lock().volume
    }

    pub fn is_muted(&self) -> bool {
        self.inner.lock().muted
    }

    /// Playback position: the clock while playing or paused, else the last known position
    pub fn current_time(&self) -> f64 {
        match self.state.get_state() {
            PlayerState::Playing | PlayerState::Paused => self.clock.current_time(),
            PlayerState::Ready | PlayerState::Stopped => self.inner.lock().position,
            PlayerState::Idle | PlayerState::Error => 0.0,
        }
    }

    /// Media duration in seconds, 0.0 when unknown or nothing is open
    pub fn duration(&self) -> f64 {
        self.inner
            .lock()
            .media
            .as_ref()
            .map_or(0.0, |m| m.duration_secs)
    }

    pub fn state(&self) -> PlayerState {
        self.state.get_state()
    }

    pub fn status(&self) -> PlaybackStatus {
        self.state.get_status()
    }

    pub fn media_info(&self) -> Option<MediaInfo> {
        self.inner.lock().media.clone()
    }

    /// Seconds of audio handed to the sink but not yet played; 0.0 without an active sink
    pub fn audio_buffered_secs(&self) -> f64 {
        let mut inner = self.inner.lock();
        inner.active_audio().map_or(0.0, |sink| sink.buffered_secs())
    }

    /// Run one presentation tick; does nothing unless Playing.
    ///
    /// When both streams are exhausted and no frame is pending the player
    /// stops itself and reports `PlaybackCompleted`. Queued audio is left to
    /// play out.
    pub fn update(&self) -> TickReport {
        let mut events = Vec::new();
        let report = {
            let mut guard = self.inner.lock();
            if self.state.get_state() != PlayerState::Playing {
                return TickReport::inactive(guard.position);
            }

            let clock_time = self.clock.current_time();
            let inner = &mut *guard;
            let audio = if inner.audio_active {
                inner.audio_sink.as_deref_mut()
            } else {
                None
            };
            let mut report = inner.sync.tick(
                clock_time,
                inner.pipeline.as_mut(),
                inner.video_sink.as_mut(),
                audio,
            );
            self.set_position(inner, report.position);

            let duration = inner.media.as_ref().map_or(0.0, |m| m.duration_secs);
            events.push(CallbackEvent::PositionChanged {
                position_secs: report.position,
                duration_secs: duration,
            });

            if report.end_of_media() {
                log::info!("End of media at {:.3}s", report.position);
                self.stop_locked(inner);
                inner.video_sink.clear();
                if self.transition(PlayerState::Stopped, &mut events).is_ok() {
                    events.push(CallbackEvent::PlaybackCompleted);
                    report.completed = true;
                }
            }
            report
        };
        self.emit(events);
        report
    }

    /// Release the media and return to Idle; legal from any state
    pub fn close(&self) {
        let mut events = Vec::new();
        {
            let mut inner = self.inner.lock();
            self.close_locked(&mut inner, &mut events);
        }
        self.emit(events);
    }

    fn close_locked(&self, inner: &mut PlayerInner, events: &mut Vec<CallbackEvent>) {
        if self.state.get_state() == PlayerState::Idle {
            return;
        }
        self.clock.stop();
        inner.sync.clear_pending();
        // Media is only set once prepare and the video sink both succeeded
        let media_open = inner.media.is_some();
        if media_open {
            inner.pipeline.shutdown();
        }
        if inner.audio_active {
            if let Some(sink) = inner.audio_sink.as_mut() {
                sink.clear();
                sink.shutdown();
            }
            inner.audio_active = false;
        }
        if media_open {
            inner.video_sink.clear();
            inner.video_sink.shutdown();
        }
        inner.media = None;
        self.set_position(inner, 0.0);
        self.state.update_status(|status| status.duration_secs = 0.0);
        if let Err(e) = self.transition(PlayerState::Idle, events) {
            log::error!("Close failed: {}", e);
        }
        log::info!("Media closed");
    }
}

impl Drop for MediaPlayer {
    fn drop(&mut self) {
        if self.state.get_state() == PlayerState::Idle {
            return;
        }
        let inner = self.inner.get_mut();
        self.clock.stop();
        if inner.audio_active {
            if let Some(sink) = inner.audio_sink.as_mut() {
                sink.shutdown();
            }
        }
        if inner.media.is_some() {
            inner.pipeline.shutdown();
            inner.video_sink.shutdown();
        }
    }
}
