// Per-tick presentation decisions

use cadence_core::{DecodePipeline, DecodedUnit, StreamKind};
use cadence_sink_api::{AudioSink, VideoSink};

/// What one `update()` did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// False when the player was not Playing and nothing was evaluated
    pub active: bool,
    /// Clock time the tick was evaluated at
    pub clock_time: f64,
    /// Last known position after the tick (timestamp of the last emitted frame, else clock time)
    pub position: f64,
    pub video_presented: usize,
    pub audio_presented: usize,
    /// Timestamp of the frame left waiting in the pending slot
    pub deferred: Option<f64>,
    pub video_exhausted: bool,
    pub audio_exhausted: bool,
    /// The tick ran into end of media and the player stopped
    pub completed: bool,
}

impl TickReport {
    pub fn inactive(position: f64) -> Self {
        Self {
            clock_time: position,
            position,
            ..Default::default()
        }
    }

    /// Both streams are done and nothing waits to be shown
    pub fn end_of_media(&self) -> bool {
        self.active && self.video_exhausted && self.audio_exhausted && self.deferred.is_none()
    }
}

/// Holds at most one early video frame and applies the presentation tolerance
pub struct SyncController {
    tolerance: f64,
    pending: Option<(f64, DecodedUnit)>,
}

impl SyncController {
    pub fn new(tolerance: f64) -> Self {
        Self {
            tolerance,
            pending: None,
        }
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// A unit at `timestamp` may be shown at `clock_time`
    pub fn is_due(&self, timestamp: f64, clock_time: f64) -> bool {
        timestamp <= clock_time + self.tolerance
    }

    pub fn pending_timestamp(&self) -> Option<f64> {
        self.pending.as_ref().map(|(ts, _)| *ts)
    }

    pub fn clear_pending(&mut self) {
        if let Some((ts, _)) = self.pending.take() {
            log::trace!("Dropping pending frame at {:.3}s", ts);
        }
    }

    /// Run one tick at `clock_time`.
    ///
    /// Video frames are emitted while due; the first early one is parked in
    /// the pending slot and re-evaluated first on the next tick. One audio
    /// unit is forwarded per tick without clock gating. With no usable audio
    /// sink, audio units are pulled and dropped so the stream still drains.
    pub fn tick<P, V, A>(
        &mut self,
        clock_time: f64,
        pipeline: &mut P,
        video: &mut V,
        audio: Option<&mut A>,
    ) -> TickReport
    where
        P: DecodePipeline + ?Sized,
        V: VideoSink + ?Sized,
        A: AudioSink + ?Sized,
    {
        let mut report = TickReport {
            active: true,
            clock_time,
            position: clock_time,
            ..Default::default()
        };

        if let Some((ts, unit)) = self.pending.take() {
            if !self.is_due(ts, clock_time) {
                self.pending = Some((ts, unit));
                report.deferred = Some(ts);
                return report;
            }
            video.consume(unit);
            report.video_presented += 1;
            report.position = ts;
        }

        while let Some(unit) = pipeline.next_video_unit() {
            let ts = unit.presentation_time(clock_time);
            if !self.is_due(ts, clock_time) {
                self.pending = Some((ts, unit));
                report.deferred = Some(ts);
                break;
            }
            video.consume(unit);
            report.video_presented += 1;
            report.position = ts;
        }

        match audio {
            Some(sink) => {
                if sink.ready_for_more() {
                    if let Some(unit) = pipeline.next_audio_unit() {
                        sink.consume(unit);
                        report.audio_presented += 1;
                    }
                }
            }
            None => {
                if pipeline.next_audio_unit().is_some() {
                    log::trace!("No audio sink, dropping audio unit");
                }
            }
        }

        report.video_exhausted = self.pending.is_none() && pipeline.is_exhausted(StreamKind::Video);
        report.audio_exhausted = pipeline.is_exhausted(StreamKind::Audio);
        report
    }
}
