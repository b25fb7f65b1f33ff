// Symphonia-backed decode pipeline
// One demuxer feeds a router keyed by track id; each routed track owns a decoder and a FIFO

use cadence_core::{AudioBlock, DecodePipeline, DecodedUnit, MediaInfo, PlayerError, Result, StreamKind};
use cadence_demux::{ts_to_secs, Demuxer};
use std::collections::{HashMap, VecDeque};
use symphonia::core::audio::{AudioBufferRef, SampleBuffer};
use symphonia::core::codecs::{Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::Packet;
use symphonia::core::units::TimeBase;

/// Upper bound on packets read by a single `next_*_unit` call
const MAX_PACKETS_PER_PULL: usize = 64;

/// Decoder plus output FIFO for one routed track
struct TrackDecoder {
    kind: StreamKind,
    decoder: Box<dyn Decoder>,
    time_base: Option<TimeBase>,
    queue: VecDeque<DecodedUnit>,
    /// Running position used as the best-effort timestamp
    next_secs: f64,
    /// Units ending before this are dropped (accurate seek)
    skip_until: Option<f64>,
}

impl TrackDecoder {
    fn decode(&mut self, packet: &Packet) {
        let pts = self.time_base.map(|tb| ts_to_secs(tb, packet.ts()));
        let block = match self.decoder.decode(packet) {
            Ok(decoded) => interleave(decoded),
            Err(SymphoniaError::DecodeError(e)) => {
                log::warn!("Skipping undecodable packet at ts {}: {}", packet.ts(), e);
                return;
            }
            Err(e) => {
                log::error!("Decoder failed at ts {}: {}", packet.ts(), e);
                return;
            }
        };
        if block.samples.is_empty() {
            return;
        }

        let best_effort = self.next_secs;
        let duration = block.duration_secs();
        self.next_secs = pts.unwrap_or(best_effort) + duration;

        if let Some(target) = self.skip_until {
            if pts.unwrap_or(best_effort) + duration <= target {
                return;
            }
            self.skip_until = None;
        }

        self.queue
            .push_back(DecodedUnit::audio(pts, block).with_best_effort_pts(Some(best_effort)));
    }

    fn flush(&mut self, landed: f64, target: f64) {
        self.decoder.reset();
        self.queue.clear();
        self.next_secs = landed;
        self.skip_until = Some(target);
    }
}

/// Convert any Symphonia sample format to an interleaved f32 block
fn interleave(decoded: AudioBufferRef<'_>) -> AudioBlock {
    let spec = *decoded.spec();
    if decoded.frames() == 0 {
        return AudioBlock {
            sample_rate: spec.rate,
            channels: spec.channels.count() as u16,
            samples: Vec::new(),
        };
    }
    let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
    buffer.copy_interleaved_ref(decoded);
    AudioBlock {
        sample_rate: spec.rate,
        channels: spec.channels.count() as u16,
        samples: buffer.samples().to_vec(),
    }
}

struct OpenMedia {
    demuxer: Demuxer,
    routes: HashMap<u32, TrackDecoder>,
    end_of_container: bool,
}

impl OpenMedia {
    /// Read one packet and hand it to its track's decoder
    fn pump(&mut self) {
        match self.demuxer.next_packet() {
            Ok(Some(packet)) => match self.routes.get_mut(&packet.track_id()) {
                Some(route) => route.decode(&packet),
                None => log::trace!("Dropping packet for unrouted track {}", packet.track_id()),
            },
            Ok(None) => {
                log::debug!("End of container reached");
                self.end_of_container = true;
            }
            Err(e) => {
                log::error!("{}, stopping demux", e);
                self.end_of_container = true;
            }
        }
    }

    fn route_id(&self, kind: StreamKind) -> Option<u32> {
        self.routes
            .iter()
            .find(|(_, route)| route.kind == kind)
            .map(|(id, _)| *id)
    }

    fn next_unit(&mut self, kind: StreamKind) -> Option<DecodedUnit> {
        let track_id = self.route_id(kind)?;
        for _ in 0..MAX_PACKETS_PER_PULL {
            if let Some(unit) = self.routes.get_mut(&track_id).and_then(|r| r.queue.pop_front()) {
                return Some(unit);
            }
            if self.end_of_container {
                return None;
            }
            self.pump();
        }
        self.routes.get_mut(&track_id).and_then(|r| r.queue.pop_front())
    }
}

/// `DecodePipeline` over local files.
///
/// Symphonia only ships audio codecs, so only audio tracks are routed;
/// packets of every other track are read and discarded and the video side
/// reports itself exhausted.
#[derive(Default)]
pub struct SymphoniaPipeline {
    media: Option<OpenMedia>,
}

impl SymphoniaPipeline {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DecodePipeline for SymphoniaPipeline {
    fn prepare(&mut self, uri: &str) -> Result<MediaInfo> {
        self.shutdown();

        let demuxer = Demuxer::open(uri)?;
        let mut info = demuxer.media_info();
        let mut routes = HashMap::new();

        if let Some((track_id, codec_name)) = info.audio().map(|s| (s.index, s.codec_name.clone())) {
            let params = demuxer
                .track(track_id)
                .map(|t| t.codec_params.clone())
                .ok_or_else(|| PlayerError::Open(format!("Track {} vanished", track_id)))?;
            match symphonia::default::get_codecs().make(&params, &DecoderOptions::default()) {
                Ok(decoder) => {
                    log::info!("Audio decoder ready for track {} ({})", track_id, codec_name);
                    routes.insert(
                        track_id,
                        TrackDecoder {
                            kind: StreamKind::Audio,
                            decoder,
                            time_base: params.time_base,
                            queue: VecDeque::new(),
                            next_secs: 0.0,
                            skip_until: None,
                        },
                    );
                }
                Err(e) => {
                    log::warn!("No decoder for track {} ({}): {}", track_id, codec_name, e);
                    info.audio_stream = None;
                }
            }
        }

        if routes.is_empty() {
            return Err(PlayerError::Open(format!("No decodable stream in {}", uri)));
        }
        // Nothing decodes pictures here, so no video stream is ever selected
        info.video_stream = None;

        self.media = Some(OpenMedia {
            demuxer,
            routes,
            end_of_container: false,
        });
        Ok(info)
    }

    fn next_video_unit(&mut self) -> Option<DecodedUnit> {
        self.media.as_mut()?.next_unit(StreamKind::Video)
    }

    fn next_audio_unit(&mut self) -> Option<DecodedUnit> {
        self.media.as_mut()?.next_unit(StreamKind::Audio)
    }

    fn is_exhausted(&self, kind: StreamKind) -> bool {
        let Some(media) = self.media.as_ref() else {
            return true;
        };
        match media.route_id(kind).and_then(|id| media.routes.get(&id)) {
            Some(route) => media.end_of_container && route.queue.is_empty(),
            None => true,
        }
    }

    fn seek(&mut self, seconds: f64) -> Result<()> {
        let media = self
            .media
            .as_mut()
            .ok_or_else(|| PlayerError::Seek("No media open".to_string()))?;
        let track_id = media.route_id(StreamKind::Audio);
        let landed = media.demuxer.seek(seconds, track_id)?;
        let target = seconds.max(0.0);
        for route in media.routes.values_mut() {
            route.flush(landed, target);
        }
        media.end_of_container = false;
        Ok(())
    }

    fn shutdown(&mut self) {
        if let Some(media) = self.media.take() {
            log::debug!("Closing decode pipeline with {} route(s)", media.routes.len());
        }
    }
}
