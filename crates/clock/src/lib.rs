// Pausable, speed-scalable playback clock

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Wall-clock reference the playback clock measures elapsed time against
pub trait TimeSource: Send + Sync {
    /// Monotonic time since an arbitrary fixed origin
    fn now(&self) -> Duration;
}

/// Monotonic system time
pub struct SystemTimeSource {
    origin: Instant,
}

impl SystemTimeSource {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Time source that only moves when told to; drives simulations and tests
#[derive(Clone, Default)]
pub struct ManualTimeSource {
    now: Arc<Mutex<Duration>>,
}

impl ManualTimeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }

    pub fn advance_secs(&self, secs: f64) {
        self.advance(Duration::from_secs_f64(secs.max(0.0)));
    }
}

impl TimeSource for ManualTimeSource {
    fn now(&self) -> Duration {
        *self.now.lock()
    }
}

struct ClockState {
    base_secs: f64,
    anchor: Duration,
    speed: f64,
    running: bool,
}

impl ClockState {
    fn current_time(&self, now: Duration) -> f64 {
        if !self.running {
            return self.base_secs;
        }
        let elapsed = now.saturating_sub(self.anchor).as_secs_f64();
        self.base_secs + elapsed * self.speed
    }
}

/// Logical playback position.
///
/// `current_time()` is constant while stopped or paused and advances at
/// `speed` times wall-clock rate while running. Every mutation and read goes
/// through one mutex so anchor, base and speed are always seen together.
pub struct PlaybackClock {
    source: Arc<dyn TimeSource>,
    state: Mutex<ClockState>,
}

impl PlaybackClock {
    pub fn new() -> Self {
        Self::with_time_source(Arc::new(SystemTimeSource::new()))
    }

    pub fn with_time_source(source: Arc<dyn TimeSource>) -> Self {
        let anchor = source.now();
        Self {
            source,
            state: Mutex::new(ClockState {
                base_secs: 0.0,
                anchor,
                speed: 1.0,
                running: false,
            }),
        }
    }

    /// Start (or restart) running from `start_secs`
    pub fn start(&self, start_secs: f64) {
        let now = self.source.now();
        let mut state = self.state.lock();
        state.base_secs = start_secs;
        state.anchor = now;
        state.running = true;
    }

    pub fn pause(&self) {
        let now = self.source.now();
        let mut state = self.state.lock();
        if !state.running {
            return;
        }
        state.base_secs = state.current_time(now);
        state.running = false;
    }

    pub fn resume(&self) {
        let now = self.source.now();
        let mut state = self.state.lock();
        if state.running {
            return;
        }
        state.anchor = now;
        state.running = true;
    }

    pub fn stop(&self) {
        let mut state = self.state.lock();
        state.running = false;
        state.base_secs = 0.0;
    }

    /// Change the rate; position is folded into the base first so nothing jumps
    pub fn set_speed(&self, speed: f64) {
        let speed = if speed.is_finite() && speed > 0.0 { speed } else { 1.0 };
        let now = self.source.now();
        let mut state = self.state.lock();
        if state.running {
            state.base_secs = state.current_time(now);
            state.anchor = now;
        }
        state.speed = speed;
    }

    pub fn current_time(&self) -> f64 {
        let now = self.source.now();
        self.state.lock().current_time(now)
    }

    pub fn speed(&self) -> f64 {
        self.state.lock().speed
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }
}

impl Default for PlaybackClock {
    fn default() -> Self {
        Self::new()
    }
}
