// cpal-based audio sink
// cpal streams are not Send, so the stream lives on its own thread and is driven by commands

use cadence_core::{DecodedUnit, Payload, PlayerError, Result};
use cadence_queue::SharedSampleRing;
use cadence_resampler::Resampler;
use cadence_sink_api::{AudioSink, AudioSpec};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, SampleFormat, SizedSample, Stream, StreamConfig};
use crossbeam_channel::{Receiver, Sender};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Seconds of device audio the ring can hold
const RING_SECONDS: usize = 5;

/// Above this fill level the sink asks the player to hold further audio
const READY_FILL_RATIO: f32 = 0.5;

const DEVICE_OPEN_TIMEOUT: Duration = Duration::from_secs(5);

enum DeviceCommand {
    Play,
    Pause,
    Shutdown,
}

/// State shared with the device callback
#[derive(Clone)]
struct CallbackShared {
    playing: Arc<AtomicBool>,
    /// Effective gain as f32 bits (0 while muted)
    gain: Arc<AtomicU32>,
}

struct DeviceHandle {
    commands: Sender<DeviceCommand>,
    thread: Option<JoinHandle<()>>,
    output: AudioSpec,
    ring: SharedSampleRing,
}

impl DeviceHandle {
    fn send(&self, command: DeviceCommand) {
        if self.commands.send(command).is_err() {
            log::warn!("Audio device thread is gone");
        }
    }

    fn close(mut self) {
        self.send(DeviceCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("Audio device thread panicked");
            }
        }
    }
}

/// Plays audio units on the default output device.
///
/// Units are converted to the device's rate and channel layout, queued in a
/// PCM ring and pulled by the cpal callback, which writes silence whenever
/// the ring runs dry or playback is paused.
pub struct CpalAudioSink {
    device: Option<DeviceHandle>,
    resampler: Option<Resampler>,
    /// Converted samples that did not fit into the ring yet
    backlog: Vec<f32>,
    shared: CallbackShared,
    volume: f32,
    muted: bool,
}

impl CpalAudioSink {
    pub fn new() -> Self {
        Self {
            device: None,
            resampler: None,
            backlog: Vec::new(),
            shared: CallbackShared {
                playing: Arc::new(AtomicBool::new(false)),
                gain: Arc::new(AtomicU32::new(1.0f32.to_bits())),
            },
            volume: 1.0,
            muted: false,
        }
    }

    /// Format the device was opened with, once initialized
    pub fn output_spec(&self) -> Option<AudioSpec> {
        self.device.as_ref().map(|d| d.output)
    }

    fn update_gain(&self) {
        let gain = effective_gain(self.volume, self.muted);
        self.shared.gain.store(gain.to_bits(), Ordering::Relaxed);
    }

    fn enqueue(&mut self, samples: &[f32]) {
        let Some(device) = self.device.as_ref() else {
            return;
        };
        self.backlog.extend_from_slice(samples);
        let written = device.ring.push_slice(&self.backlog);
        self.backlog.drain(..written);

        // Never hold more than one extra ring's worth; oldest samples go first
        let limit = device.ring.capacity();
        if self.backlog.len() > limit {
            let dropped = self.backlog.len() - limit;
            self.backlog.drain(..dropped);
            log::debug!("Audio ring full, dropped {} samples", dropped);
        }
    }
}

impl Default for CpalAudioSink {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CpalAudioSink {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn effective_gain(volume: f32, muted: bool) -> f32 {
    if muted {
        0.0
    } else {
        volume.clamp(0.0, 1.0)
    }
}

impl AudioSink for CpalAudioSink {
    fn initialize(&mut self, spec: &AudioSpec) -> Result<()> {
        self.shutdown();

        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);
        let (command_tx, command_rx) = crossbeam_channel::unbounded();
        let shared = self.shared.clone();
        let thread = thread::Builder::new()
            .name("cadence-audio".to_string())
            .spawn(move || run_device(shared, ready_tx, command_rx))
            .map_err(|e| PlayerError::SinkInit(format!("Cannot spawn audio thread: {}", e)))?;

        let (output, ring) = match ready_rx.recv_timeout(DEVICE_OPEN_TIMEOUT) {
            Ok(Ok(opened)) => opened,
            Ok(Err(e)) => {
                let _ = thread.join();
                return Err(e);
            }
            Err(_) => {
                return Err(PlayerError::SinkInit(
                    "Timed out opening the audio device".to_string(),
                ))
            }
        };

        log::info!(
            "Audio output {} Hz x{} for a {} Hz x{} stream",
            output.sample_rate,
            output.channels,
            spec.sample_rate,
            spec.channels
        );
        self.resampler = Some(Resampler::new(
            spec.sample_rate,
            output.sample_rate,
            spec.channels,
            output.channels,
        ));
        self.backlog.clear();
        self.update_gain();
        self.device = Some(DeviceHandle {
            commands: command_tx,
            thread: Some(thread),
            output,
            ring,
        });
        Ok(())
    }

    fn consume(&mut self, unit: DecodedUnit) {
        let Some(output) = self.output_spec() else {
            return;
        };
        let Payload::Audio(block) = unit.payload else {
            return;
        };

        let resampler = match self.resampler {
            Some(r) if r.matches(&block) => r,
            _ => {
                let r = Resampler::for_block(&block, output.sample_rate, output.channels);
                self.resampler = Some(r);
                r
            }
        };
        let samples = if resampler.is_passthrough() {
            block.samples
        } else {
            resampler.process(&block.samples)
        };
        self.enqueue(&samples);
    }

    fn ready_for_more(&mut self) -> bool {
        let Some(device) = self.device.as_ref() else {
            return true;
        };
        if !self.backlog.is_empty() {
            let written = device.ring.push_slice(&self.backlog);
            self.backlog.drain(..written);
        }
        self.backlog.is_empty() && device.ring.fill_ratio() < READY_FILL_RATIO
    }

    fn buffered_secs(&self) -> f64 {
        let Some(device) = self.device.as_ref() else {
            return 0.0;
        };
        let per_second = device.output.sample_rate as usize * device.output.channels.max(1) as usize;
        if per_second == 0 {
            return 0.0;
        }
        (device.ring.len() + self.backlog.len()) as f64 / per_second as f64
    }

    fn clear(&mut self) {
        self.backlog.clear();
        if let Some(device) = self.device.as_ref() {
            device.ring.clear();
        }
    }

    fn shutdown(&mut self) {
        self.shared.playing.store(false, Ordering::SeqCst);
        if let Some(device) = self.device.take() {
            log::debug!("Closing audio device");
            device.close();
        }
        self.backlog.clear();
        self.resampler = None;
    }

    fn pause(&mut self) {
        self.shared.playing.store(false, Ordering::SeqCst);
        if let Some(device) = self.device.as_ref() {
            device.send(DeviceCommand::Pause);
        }
    }

    fn resume(&mut self) {
        self.shared.playing.store(true, Ordering::SeqCst);
        if let Some(device) = self.device.as_ref() {
            device.send(DeviceCommand::Play);
        }
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        self.update_gain();
    }

    fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        self.update_gain();
    }
}

type DeviceReady = Result<(AudioSpec, SharedSampleRing)>;

/// Body of the device thread: open the stream, then serve commands until shutdown
fn run_device(shared: CallbackShared, ready: Sender<DeviceReady>, commands: Receiver<DeviceCommand>) {
    let stream = match open_stream(&shared) {
        Ok((stream, output, ring)) => {
            if ready.send(Ok((output, ring))).is_err() {
                return;
            }
            stream
        }
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    for command in commands.iter() {
        let result = match command {
            DeviceCommand::Play => stream.play().map_err(|e| e.to_string()),
            DeviceCommand::Pause => stream.pause().map_err(|e| e.to_string()),
            DeviceCommand::Shutdown => break,
        };
        if let Err(e) = result {
            log::error!("Audio stream control failed: {}", e);
        }
    }
    let _ = stream.pause();
}

fn open_stream(shared: &CallbackShared) -> Result<(Stream, AudioSpec, SharedSampleRing)> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| PlayerError::SinkInit("No output device available".to_string()))?;
    let supported = device
        .default_output_config()
        .map_err(|e| PlayerError::SinkInit(format!("Output config failed: {}", e)))?;

    let config = supported.config();
    let output = AudioSpec {
        sample_rate: config.sample_rate.0,
        channels: config.channels,
    };
    let ring = SharedSampleRing::new(
        output.sample_rate as usize * output.channels.max(1) as usize * RING_SECONDS,
    );
    log::debug!(
        "Opening {} ({:?})",
        device.name().unwrap_or_else(|_| "unknown device".to_string()),
        supported.sample_format()
    );

    let stream = match supported.sample_format() {
        SampleFormat::F32 => build_stream::<f32>(&device, &config, ring.clone(), shared.clone()),
        SampleFormat::I16 => build_stream::<i16>(&device, &config, ring.clone(), shared.clone()),
        SampleFormat::U16 => build_stream::<u16>(&device, &config, ring.clone(), shared.clone()),
        SampleFormat::I32 => build_stream::<i32>(&device, &config, ring.clone(), shared.clone()),
        other => Err(PlayerError::SinkInit(format!(
            "Unsupported device sample format {:?}",
            other
        ))),
    }?;
    stream
        .play()
        .map_err(|e| PlayerError::SinkInit(format!("Failed to start stream: {}", e)))?;

    Ok((stream, output, ring))
}

fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    ring: SharedSampleRing,
    shared: CallbackShared,
) -> Result<Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let mut scratch: Vec<f32> = Vec::new();
    let mut underruns: u64 = 0;

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                if scratch.len() < data.len() {
                    scratch.resize(data.len(), 0.0);
                }
                let scratch = &mut scratch[..data.len()];

                let read = if shared.playing.load(Ordering::Relaxed) {
                    let read = ring.pop_into(scratch);
                    if read < scratch.len() {
                        underruns += 1;
                        if underruns % 50 == 1 {
                            log::debug!("Audio underrun (count={})", underruns);
                        }
                    }
                    read
                } else {
                    0
                };
                scratch[read..].fill(0.0);

                let gain = f32::from_bits(shared.gain.load(Ordering::Relaxed));
                for (out, sample) in data.iter_mut().zip(scratch.iter()) {
                    *out = T::from_sample(*sample * gain);
                }
            },
            |err| log::error!("Audio stream error: {}", err),
            None,
        )
        .map_err(|e| PlayerError::SinkInit(format!("Failed to build output stream: {}", e)))
}
