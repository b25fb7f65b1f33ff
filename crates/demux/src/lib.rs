// Container demuxing with Symphonia

use cadence_core::{MediaInfo, PlayerError, Result, StreamInfo, StreamParams};
use std::fs::File;
use std::path::Path;
use symphonia::core::codecs::{CodecParameters, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, Packet, SeekMode, SeekTo, Track};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::{Time, TimeBase};

/// Probed container with every track exposed
pub struct Demuxer {
    format_reader: Box<dyn FormatReader>,
    uri: String,
}

impl Demuxer {
    /// Open a local file, using its extension as a probe hint
    pub fn open(uri: &str) -> Result<Self> {
        let file = File::open(uri)
            .map_err(|e| PlayerError::Open(format!("Cannot open {}: {}", uri, e)))?;
        Self::from_media_source(Box::new(file), Self::create_hint_from_path(uri), uri)
    }

    /// Probe an arbitrary media source
    pub fn from_media_source(media_source: Box<dyn MediaSource>, hint: Hint, uri: &str) -> Result<Self> {
        let media_source_stream = MediaSourceStream::new(media_source, Default::default());

        let probe_result = symphonia::default::get_probe()
            .format(
                &hint,
                media_source_stream,
                &FormatOptions {
                    enable_gapless: true,
                    ..Default::default()
                },
                &MetadataOptions::default(),
            )
            .map_err(|e| PlayerError::Open(format!("Failed to probe {}: {}", uri, e)))?;

        log::debug!(
            "Probed {} with {} track(s)",
            uri,
            probe_result.format.tracks().len()
        );

        Ok(Self {
            format_reader: probe_result.format,
            uri: uri.to_string(),
        })
    }

    pub fn create_hint_from_path(path: &str) -> Hint {
        let mut hint = Hint::new();
        if let Some(extension) = Path::new(path).extension().and_then(|e| e.to_str()) {
            hint.with_extension(extension);
        }
        hint
    }

    pub fn tracks(&self) -> &[Track] {
        self.format_reader.tracks()
    }

    pub fn track(&self, track_id: u32) -> Option<&Track> {
        self.tracks().iter().find(|t| t.id == track_id)
    }

    /// Describe every track; duration is the longest known track duration
    pub fn media_info(&self) -> MediaInfo {
        let track_durations: Vec<Option<f64>> = self.tracks().iter().map(track_duration).collect();
        let duration_secs = track_durations.iter().flatten().fold(0.0, |a: f64, b| a.max(*b));
        let streams: Vec<StreamInfo> = self
            .tracks()
            .iter()
            .zip(&track_durations)
            .map(|(track, duration)| describe_track(track, duration.unwrap_or(duration_secs)))
            .collect();

        for stream in &streams {
            log::debug!(
                "Stream #{}: {} {:?} duration={:.3}s",
                stream.index,
                stream.codec_name,
                stream.params,
                stream.duration_secs
            );
        }

        let mut info = MediaInfo {
            uri: self.uri.clone(),
            duration_secs,
            streams,
            video_stream: None,
            audio_stream: None,
        };
        info.select_default_streams();
        info
    }

    /// Next packet from any track; `Ok(None)` at end of container
    pub fn next_packet(&mut self) -> Result<Option<Packet>> {
        match self.format_reader.next_packet() {
            Ok(packet) => Ok(Some(packet)),
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                Ok(None)
            }
            Err(SymphoniaError::ResetRequired) => {
                log::warn!("Track layout changed mid-stream, treating as end of stream");
                Ok(None)
            }
            Err(e) => Err(PlayerError::Decode(format!("Failed to read packet: {}", e))),
        }
    }

    /// Reposition every track near `seconds`; returns where `track_id` landed
    pub fn seek(&mut self, seconds: f64, track_id: Option<u32>) -> Result<f64> {
        let target = seconds.max(0.0);
        let seeked = self
            .format_reader
            .seek(
                SeekMode::Accurate,
                SeekTo::Time {
                    time: Time::new(target.trunc() as u64, target.fract()),
                    track_id,
                },
            )
            .map_err(|e| PlayerError::Seek(format!("Seek to {:.3}s failed: {}", target, e)))?;

        let landed = self
            .track(seeked.track_id)
            .and_then(|t| t.codec_params.time_base)
            .map(|tb| ts_to_secs(tb, seeked.actual_ts))
            .unwrap_or(target);
        log::debug!("Seeked to {:.3}s (requested {:.3}s)", landed, target);
        Ok(landed)
    }
}

/// Convert a timestamp in `time_base` units to seconds
pub fn ts_to_secs(time_base: TimeBase, ts: u64) -> f64 {
    let time = time_base.calc_time(ts);
    time.seconds as f64 + time.frac
}

fn codec_name(params: &CodecParameters) -> String {
    if params.codec == CODEC_TYPE_NULL {
        return "unknown".to_string();
    }
    symphonia::default::get_codecs()
        .get_codec(params.codec)
        .map(|descriptor| descriptor.short_name.to_string())
        .unwrap_or_else(|| format!("{:?}", params.codec))
}

fn track_duration(track: &Track) -> Option<f64> {
    let params = &track.codec_params;
    params
        .time_base
        .zip(params.n_frames)
        .map(|(tb, frames)| ts_to_secs(tb, frames))
}

fn describe_track(track: &Track, duration_secs: f64) -> StreamInfo {
    let params = &track.codec_params;
    let stream_params = match params.sample_rate {
        Some(sample_rate) => StreamParams::Audio {
            sample_rate,
            channels: params.channels.map(|c| c.count() as u16).unwrap_or(2),
        },
        None => StreamParams::Other,
    };
    StreamInfo {
        index: track.id,
        codec_name: codec_name(params),
        params: stream_params,
        duration_secs,
    }
}
