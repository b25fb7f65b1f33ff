// Headless command line player: decodes a local file, plays its audio and ticks the sync loop

use cadence_core::{DecodeMode, PlayerConfig, PlayerState};
use cadence_decode::SymphoniaPipeline;
use cadence_player::MediaPlayer;
use cadence_sink_api::{AudioSink, NullVideoSink};
use cadence_sink_cpal::CpalAudioSink;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::process::ExitCode;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::{Duration, Instant};

const DEFAULT_TICK_MS: u64 = 10;
const PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

/// Upper bound on waiting for queued audio after the last tick
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);
const DRAIN_POLL: Duration = Duration::from_millis(20);

fn cli() -> Command {
    Command::new("cadence")
        .version(env!("CARGO_PKG_VERSION"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .arg(
            Arg::new("file")
                .value_name("FILE")
                .help("Media file to play")
                .required(true),
        )
        .arg(
            Arg::new("start")
                .long("start")
                .value_name("SECONDS")
                .help("Position to start playing from")
                .value_parser(value_parser!(f64)),
        )
        .arg(
            Arg::new("speed")
                .long("speed")
                .value_name("RATE")
                .help("Playback speed, 1.0 is normal")
                .value_parser(value_parser!(f64))
                .default_value("1.0"),
        )
        .arg(
            Arg::new("volume")
                .long("volume")
                .value_name("LEVEL")
                .help("Output volume between 0.0 and 1.0")
                .value_parser(value_parser!(f32))
                .default_value("1.0"),
        )
        .arg(
            Arg::new("tolerance-ms")
                .long("tolerance-ms")
                .value_name("MS")
                .help("How far ahead of the clock a video frame may be shown")
                .value_parser(value_parser!(u64))
                .default_value("20"),
        )
        .arg(
            Arg::new("queue-capacity")
                .long("queue-capacity")
                .value_name("UNITS")
                .help("Decoded units buffered per stream by the decode thread")
                .value_parser(value_parser!(usize))
                .default_value("10"),
        )
        .arg(
            Arg::new("inline")
                .long("inline")
                .help("Decode on the tick thread instead of a worker thread")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no-audio")
                .long("no-audio")
                .help("Do not open an audio device")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("tick-ms")
                .long("tick-ms")
                .value_name("MS")
                .help("Interval between sync ticks")
                .value_parser(value_parser!(u64))
                .default_value("10"),
        )
}

fn config_from(matches: &ArgMatches) -> PlayerConfig {
    let mut config = PlayerConfig::default();
    if let Some(speed) = matches.get_one::<f64>("speed") {
        config.playback.speed = *speed;
    }
    if let Some(volume) = matches.get_one::<f32>("volume") {
        config.audio.volume = *volume;
    }
    if let Some(ms) = matches.get_one::<u64>("tolerance-ms") {
        config.playback.sync_tolerance = *ms as f64 / 1000.0;
    }
    if let Some(capacity) = matches.get_one::<usize>("queue-capacity") {
        config.queue_capacity = *capacity;
    }
    if matches.get_flag("inline") {
        config.decode_mode = DecodeMode::Inline;
    }
    config.audio.enabled = !matches.get_flag("no-audio");
    config
}

fn format_time(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{:02}:{:02}:{:02}", total / 3600, (total / 60) % 60, total % 60)
}

/// Block until the audio sink has played what it was given, or `timeout` passes
fn wait_for_audio_drain(player: &MediaPlayer, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        let buffered = player.audio_buffered_secs();
        if buffered <= 0.0 {
            return true;
        }
        if Instant::now() >= deadline {
            log::warn!("Closing with {:.2}s of audio still queued", buffered);
            return false;
        }
        thread::sleep(DRAIN_POLL.min(Duration::from_secs_f64(buffered)));
    }
}

fn run(matches: &ArgMatches) -> cadence_core::Result<()> {
    let config = config_from(matches);
    let tick = Duration::from_millis(
        matches
            .get_one::<u64>("tick-ms")
            .copied()
            .unwrap_or(DEFAULT_TICK_MS)
            .max(1),
    );
    let file = matches
        .get_one::<String>("file")
        .map(String::as_str)
        .unwrap_or_default();

    let audio_sink: Option<Box<dyn AudioSink>> = if config.audio.enabled {
        Some(Box::new(CpalAudioSink::new()))
    } else {
        None
    };
    let video_sink = NullVideoSink::new();
    let frames = video_sink.counter();
    let player = MediaPlayer::new(config, SymphoniaPipeline::new(), Box::new(video_sink), audio_sink)?;

    player.open(file)?;
    if let Some(start) = matches.get_one::<f64>("start") {
        player.seek(*start)?;
    }
    player.play()?;

    let duration = player.duration();
    let mut last_progress = Instant::now();
    while player.state() == PlayerState::Playing {
        let report = player.update();
        if report.completed {
            break;
        }
        if last_progress.elapsed() >= PROGRESS_INTERVAL {
            println!(
                "{} / {}  frames={}",
                format_time(player.current_time()),
                format_time(duration),
                frames.load(Ordering::Relaxed)
            );
            last_progress = Instant::now();
        }
        thread::sleep(tick);
    }

    wait_for_audio_drain(&player, DRAIN_TIMEOUT);
    player.close();
    log::info!("Finished {}", file);
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let matches = cli().get_matches();
    match run(&matches) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let matches = cli().try_get_matches_from(["cadence", "song.flac"]).unwrap();
        let config = config_from(&matches);
        assert_eq!(config, PlayerConfig::default());
        assert_eq!(config.decode_mode, DecodeMode::Threaded);
        assert_eq!(matches.get_one::<String>("file").unwrap(), "song.flac");
        assert!(matches.get_one::<f64>("start").is_none());
    }

    #[test]
    fn test_flags_reach_the_config() {
        let matches = cli()
            .try_get_matches_from([
                "cadence",
                "talk.mp3",
                "--inline",
                "--no-audio",
                "--speed",
                "1.5",
                "--tolerance-ms",
                "40",
                "--queue-capacity",
                "32",
            ])
            .unwrap();
        let config = config_from(&matches);
        assert_eq!(config.decode_mode, DecodeMode::Inline);
        assert!(!config.audio.enabled);
        assert_eq!(config.playback.speed, 1.5);
        assert_eq!(config.playback.sync_tolerance, 0.04);
        assert_eq!(config.queue_capacity, 32);
    }

    #[test]
    fn test_file_is_required() {
        assert!(cli().try_get_matches_from(["cadence"]).is_err());
        assert!(cli()
            .try_get_matches_from(["cadence", "a.wav", "--speed", "fast"])
            .is_err());
    }

    #[test]
    fn test_drain_wait_returns_without_audio() {
        let player = MediaPlayer::new(
            PlayerConfig::default(),
            SymphoniaPipeline::new(),
            Box::new(NullVideoSink::new()),
            None,
        )
        .unwrap();
        let started = Instant::now();
        assert!(wait_for_audio_drain(&player, Duration::from_secs(5)));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0.0), "00:00:00");
        assert_eq!(format_time(3725.9), "01:02:05");
        assert_eq!(format_time(-4.0), "00:00:00");
    }
}
