mod common;

use cadence_core::{DecodeMode, PlayerConfig, PlayerState};
use common::{Harness, Script};
use std::thread;
use std::time::Duration;

fn threaded(duration: f64) -> Harness {
    let mut config = PlayerConfig::default();
    config.decode_mode = DecodeMode::Threaded;
    config.queue_capacity = 8;
    Harness::build(config, Script::new(duration), false)
}

/// Tick with a short real sleep so the producer thread gets to run
fn run_threaded(h: &Harness, secs: f64) {
    let steps = (secs / 0.01).round() as usize;
    for _ in 0..steps {
        h.time.advance_secs(0.01);
        h.player.update();
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn test_threaded_playback_presents_in_order() {
    let h = threaded(120.0);
    h.start();
    run_threaded(&h, 2.0);

    let shown = h.video_presented();
    assert!(shown.len() > 10, "only {} frames shown", shown.len());
    assert_eq!(shown[0], Some(0.0));
    assert!(shown.windows(2).all(|w| w[0] < w[1]));
    assert!(!h.audio.lock().presented.is_empty());
}

#[test]
fn test_threaded_never_presents_stale_units_after_seek() {
    let h = threaded(120.0);
    h.start();
    run_threaded(&h, 0.5);

    for target in [60.0, 5.0, 90.0, 30.0, 31.0, 2.0] {
        let mark = h.video_presented().len();
        let audio_mark = h.audio.lock().presented.len();
        h.player.seek(target).unwrap();
        run_threaded(&h, 0.3);

        let after = &h.video_presented()[mark..];
        assert!(!after.is_empty(), "nothing shown after seeking to {}", target);
        for ts in after {
            let ts = ts.unwrap();
            assert!(
                ts >= target - 1e-9 && ts <= target + 0.5,
                "frame {} shown after seeking to {}",
                ts,
                target
            );
        }
        let audio = h.audio.lock();
        assert!(audio.presented[audio_mark..]
            .iter()
            .all(|ts| ts.unwrap() >= target - 1e-9));
    }
}

#[test]
fn test_threaded_end_of_media() {
    let h = threaded(1.0);
    h.start();

    for _ in 0..2000 {
        h.time.advance_secs(0.01);
        if h.player.update().completed {
            break;
        }
        thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(h.player.state(), PlayerState::Stopped);
    assert_eq!(h.video_presented().len(), 25);
}

#[test]
fn test_threaded_close_stops_producer() {
    let h = threaded(120.0);
    h.start();
    run_threaded(&h, 0.2);

    h.player.close();
    assert_eq!(h.player.state(), PlayerState::Idle);
    assert_eq!(h.script.shutdowns(), 1);
}
