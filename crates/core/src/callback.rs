// Player event dispatch
// Position updates arrive every tick, so each subscriber sees them at most once per interval

use crate::state::PlayerState;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Something the player wants its embedder to know about
#[derive(Debug, Clone, PartialEq)]
pub enum CallbackEvent {
    StateChanged {
        old_state: PlayerState,
        new_state: PlayerState,
    },

    /// Emitted on every tick; rate-limited per subscriber
    PositionChanged {
        position_secs: f64,
        duration_secs: f64,
    },

    /// Both streams reached end of media
    PlaybackCompleted,

    SeekCompleted { position_secs: f64 },

    SpeedChanged { speed: f64 },

    VolumeChanged { volume: f32, muted: bool },

    /// A non-fatal error was absorbed (sink failure, decode error)
    Error { message: String },
}

impl CallbackEvent {
    fn is_rate_limited(&self) -> bool {
        matches!(self, CallbackEvent::PositionChanged { .. })
    }
}

/// Receiver of player events.
/// Called on whichever thread drove the player; keep it short.
pub trait PlayerCallback: Send + Sync {
    fn on_event(&self, event: CallbackEvent);
}

/// One registered callback with its own position-update budget
struct Subscription {
    callback: Arc<dyn PlayerCallback>,
    min_interval: Duration,
    last_position: Mutex<Option<Instant>>,
}

impl Subscription {
    fn deliver(&self, event: CallbackEvent) {
        if event.is_rate_limited() {
            let now = Instant::now();
            let mut last = self.last_position.lock();
            if matches!(*last, Some(at) if now.duration_since(at) < self.min_interval) {
                return;
            }
            *last = Some(now);
        }
        self.callback.on_event(event);
    }
}

/// Fan-out of player events to every registered callback
pub struct CallbackManager {
    subscriptions: RwLock<Vec<Arc<Subscription>>>,
}

impl CallbackManager {
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(Vec::new()),
        }
    }

    /// Register `callback`; position updates reach it at most every `throttle_ms`
    pub fn add_callback(&self, callback: Arc<dyn PlayerCallback>, throttle_ms: u64) {
        self.subscriptions.write().push(Arc::new(Subscription {
            callback,
            min_interval: Duration::from_millis(throttle_ms),
            last_position: Mutex::new(None),
        }));
    }

    pub fn clear_callbacks(&self) {
        self.subscriptions.write().clear();
    }

    pub fn dispatch_event(&self, event: CallbackEvent) {
        // Snapshot so a callback may register/clear callbacks without deadlocking
        let subscriptions = self.subscriptions.read().clone();
        for subscription in subscriptions {
            subscription.deliver(event.clone());
        }
    }
}

impl Default for CallbackManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[derive(Default)]
    struct Collector(Mutex<Vec<CallbackEvent>>);

    impl Collector {
        fn events(&self) -> Vec<CallbackEvent> {
            self.0.lock().clone()
        }
    }

    impl PlayerCallback for Collector {
        fn on_event(&self, event: CallbackEvent) {
            self.0.lock().push(event);
        }
    }

    fn position(secs: f64) -> CallbackEvent {
        CallbackEvent::PositionChanged {
            position_secs: secs,
            duration_secs: 1.0,
        }
    }

    #[test]
    fn test_throttled_position_updates() {
        let manager = CallbackManager::new();
        let recorder = Arc::new(Collector::default());
        manager.add_callback(recorder.clone(), 100);

        for i in 0..10 {
            manager.dispatch_event(position(i as f64 * 0.1));
            thread::sleep(Duration::from_millis(10));
        }

        let seen = recorder.events();
        assert_eq!(seen[0], position(0.0));
        assert!(seen.len() < 10);
    }

    #[test]
    fn test_state_changes_are_not_throttled() {
        let manager = CallbackManager::new();
        let recorder = Arc::new(Collector::default());
        manager.add_callback(recorder.clone(), 10_000);

        manager.dispatch_event(position(0.0));
        manager.dispatch_event(CallbackEvent::StateChanged {
            old_state: PlayerState::Ready,
            new_state: PlayerState::Playing,
        });
        manager.dispatch_event(position(0.5));
        manager.dispatch_event(CallbackEvent::PlaybackCompleted);

        assert_eq!(recorder.events().len(), 3);
    }

    #[test]
    fn test_manager_fans_out() {
        let manager = CallbackManager::new();
        let first = Arc::new(Collector::default());
        let second = Arc::new(Collector::default());
        manager.add_callback(first.clone(), 0);
        manager.add_callback(second.clone(), 0);

        manager.dispatch_event(CallbackEvent::PlaybackCompleted);

        assert_eq!(first.events(), vec![CallbackEvent::PlaybackCompleted]);
        assert_eq!(second.events(), vec![CallbackEvent::PlaybackCompleted]);

        manager.clear_callbacks();
        manager.dispatch_event(CallbackEvent::PlaybackCompleted);
        assert_eq!(first.events().len(), 1);
    }
}
