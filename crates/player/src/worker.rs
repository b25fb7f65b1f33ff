// Decode worker: a producer thread draining a pipeline into bounded frame channels

use cadence_core::{DecodePipeline, DecodedUnit, MediaInfo, Result, StreamKind};
use cadence_queue::BoundedFrameChannel;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Producer back-off when both channels are full or nothing is decodable
const IDLE_BACKOFF: Duration = Duration::from_millis(5);

/// A unit tagged with the flush generation it was decoded in
struct Stamped {
    epoch: u64,
    unit: DecodedUnit,
}

/// End-of-stream flags as seen by the producer in one generation
#[derive(Default, Clone, Copy)]
struct Exhaustion {
    epoch: u64,
    video: bool,
    audio: bool,
}

struct Shared<P> {
    /// Decoder state; only touched while this lock is held
    pipeline: Mutex<P>,
    video: BoundedFrameChannel<Stamped>,
    audio: BoundedFrameChannel<Stamped>,
    epoch: AtomicU64,
    exhaustion: Mutex<Exhaustion>,
    running: AtomicBool,
}

impl<P> Shared<P> {
    fn channel(&self, kind: StreamKind) -> &BoundedFrameChannel<Stamped> {
        match kind {
            StreamKind::Video => &self.video,
            StreamKind::Audio => &self.audio,
        }
    }

    /// Drop every queued unit and start a new generation.
    /// Callers hold the pipeline lock so the producer cannot read a torn epoch.
    fn flush(&self) {
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        self.video.clear();
        self.audio.clear();
        *self.exhaustion.lock() = Exhaustion {
            epoch,
            ..Default::default()
        };
    }
}

/// `DecodePipeline` adapter that decodes ahead on a producer thread.
///
/// The wrapped pipeline is driven only by the producer (and by `seek`,
/// under the same lock). The tick side only drains the channels and never
/// blocks. Every flush bumps an epoch; units stamped with an older epoch are
/// discarded on dequeue, so nothing decoded before a seek is presented after it.
pub struct ThreadedPipeline<P: DecodePipeline + 'static> {
    shared: Arc<Shared<P>>,
    producer: Option<JoinHandle<()>>,
}

impl<P: DecodePipeline + 'static> ThreadedPipeline<P> {
    pub fn new(pipeline: P, capacity: usize) -> Result<Self> {
        Ok(Self {
            shared: Arc::new(Shared {
                pipeline: Mutex::new(pipeline),
                video: BoundedFrameChannel::new(capacity)?,
                audio: BoundedFrameChannel::new(capacity)?,
                epoch: AtomicU64::new(0),
                exhaustion: Mutex::new(Exhaustion::default()),
                running: AtomicBool::new(false),
            }),
            producer: None,
        })
    }

    /// Units currently buffered for `kind`, stale ones included
    pub fn queued(&self, kind: StreamKind) -> usize {
        self.shared.channel(kind).len()
    }

    pub fn capacity(&self) -> usize {
        self.shared.video.capacity()
    }

    pub fn is_producing(&self) -> bool {
        self.producer.is_some()
    }

    fn start_producer(&mut self) -> Result<()> {
        self.shared.video.reset();
        self.shared.audio.reset();
        self.shared.running.store(true, Ordering::SeqCst);

        let shared = self.shared.clone();
        let handle = thread::Builder::new()
            .name("cadence-decode".to_string())
            .spawn(move || produce(shared))?;
        self.producer = Some(handle);
        Ok(())
    }

    fn stop_producer(&mut self) {
        self.shared.running.store(false, Ordering::SeqCst);
        self.shared.video.stop();
        self.shared.audio.stop();
        if let Some(handle) = self.producer.take() {
            if handle.join().is_err() {
                log::error!("Decode worker panicked");
            }
            log::debug!("Decode worker stopped");
        }
    }

    fn next_unit(&self, kind: StreamKind) -> Option<DecodedUnit> {
        let channel = self.shared.channel(kind);
        while let Some(stamped) = channel.try_pop() {
            if stamped.epoch == self.shared.epoch.load(Ordering::SeqCst) {
                return Some(stamped.unit);
            }
            log::trace!("Discarding {:?} unit from before the last flush", kind);
        }
        None
    }
}

fn produce<P: DecodePipeline>(shared: Arc<Shared<P>>) {
    log::debug!("Decode worker started");
    while shared.running.load(Ordering::SeqCst) {
        // Decode, push and publish in one critical section: a seek either
        // precedes all of it or flushes everything it queued
        let produced = {
            let mut pipeline = shared.pipeline.lock();
            let epoch = shared.epoch.load(Ordering::SeqCst);
            let mut produced = false;

            // Sole writer, so room seen here is still there at the push
            if shared.video.len() < shared.video.capacity() {
                if let Some(unit) = pipeline.next_video_unit() {
                    if !shared.video.push(Stamped { epoch, unit }) {
                        break;
                    }
                    produced = true;
                }
            }
            if shared.audio.len() < shared.audio.capacity() {
                if let Some(unit) = pipeline.next_audio_unit() {
                    if !shared.audio.push(Stamped { epoch, unit }) {
                        break;
                    }
                    produced = true;
                }
            }

            // After the pushes so "exhausted and empty" really means drained
            *shared.exhaustion.lock() = Exhaustion {
                epoch,
                video: pipeline.is_exhausted(StreamKind::Video),
                audio: pipeline.is_exhausted(StreamKind::Audio),
            };
            produced
        };

        if !produced {
            thread::sleep(IDLE_BACKOFF);
        }
    }
    log::debug!("Decode worker exiting");
}

impl<P: DecodePipeline + 'static> DecodePipeline for ThreadedPipeline<P> {
    fn prepare(&mut self, uri: &str) -> Result<MediaInfo> {
        self.stop_producer();
        let info = {
            let mut pipeline = self.shared.pipeline.lock();
            let info = pipeline.prepare(uri)?;
            self.shared.flush();
            info
        };
        self.start_producer()?;
        Ok(info)
    }

    fn next_video_unit(&mut self) -> Option<DecodedUnit> {
        self.next_unit(StreamKind::Video)
    }

    fn next_audio_unit(&mut self) -> Option<DecodedUnit> {
        self.next_unit(StreamKind::Audio)
    }

    fn is_exhausted(&self, kind: StreamKind) -> bool {
        if self.producer.is_none() {
            return true;
        }
        let exhaustion = *self.shared.exhaustion.lock();
        if exhaustion.epoch != self.shared.epoch.load(Ordering::SeqCst) {
            return false;
        }
        let done = match kind {
            StreamKind::Video => exhaustion.video,
            StreamKind::Audio => exhaustion.audio,
        };
        done && self.shared.channel(kind).is_empty()
    }

    fn seek(&mut self, seconds: f64) -> Result<()> {
        let mut pipeline = self.shared.pipeline.lock();
        pipeline.seek(seconds)?;
        self.shared.flush();
        Ok(())
    }

    fn shutdown(&mut self) {
        self.stop_producer();
        self.shared.pipeline.lock().shutdown();
        self.shared.flush();
    }
}

impl<P: DecodePipeline + 'static> Drop for ThreadedPipeline<P> {
    fn drop(&mut self) {
        self.stop_producer();
    }
}
