// Capacity-limited FIFO of decoded units, one per stream

use cadence_core::{PlayerError, Result};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

struct ChannelState<T> {
    items: VecDeque<T>,
    stopped: bool,
}

/// Blocking bounded channel with a stop/drain signal.
///
/// `push` blocks while full, `pop` blocks while empty. `stop` wakes every
/// waiter; afterwards pushes are discarded and pops return `None` once the
/// channel is empty, so a stopped channel never blocks anyone.
pub struct BoundedFrameChannel<T> {
    capacity: usize,
    state: Mutex<ChannelState<T>>,
    not_full: Condvar,
    not_empty: Condvar,
}

impl<T> BoundedFrameChannel<T> {
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(PlayerError::InvalidConfig(
                "frame channel capacity must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            capacity,
            state: Mutex::new(ChannelState {
                items: VecDeque::with_capacity(capacity),
                stopped: false,
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
        })
    }

    /// Enqueue `item`, waiting for space.
    ///
    /// Returns `false` (dropping the item) if the channel is or becomes stopped;
    /// producers treat that as a shutdown signal, not an error.
    pub fn push(&self, item: T) -> bool {
        let mut state = self.state.lock();
        while !state.stopped && state.items.len() >= self.capacity {
            self.not_full.wait(&mut state);
        }
        if state.stopped {
            return false;
        }
        state.items.push_back(item);
        drop(state);
        self.not_empty.notify_one();
        true
    }

    /// Dequeue the oldest item, waiting until one arrives or the channel stops
    pub fn pop(&self) -> Option<T> {
        let mut state = self.state.lock();
        while !state.stopped && state.items.is_empty() {
            self.not_empty.wait(&mut state);
        }
        self.take_front(state.items.pop_front())
    }

    /// Dequeue without waiting
    pub fn try_pop(&self) -> Option<T> {
        let item = self.state.lock().items.pop_front();
        self.take_front(item)
    }

    /// Like `pop`, but gives up after `timeout`
    pub fn pop_timeout(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while !state.stopped && state.items.is_empty() {
            if self.not_empty.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }
        self.take_front(state.items.pop_front())
    }

    fn take_front(&self, item: Option<T>) -> Option<T> {
        if item.is_some() {
            self.not_full.notify_one();
        }
        item
    }

    /// Drop every queued item; the channel stays usable
    pub fn clear(&self) {
        self.state.lock().items.clear();
        self.not_full.notify_all();
    }

    /// Stop the channel, drop queued items and wake all blocked callers
    pub fn stop(&self) {
        {
            let mut state = self.state.lock();
            state.stopped = true;
            state.items.clear();
        }
        self.not_full.notify_all();
        self.not_empty.notify_all();
    }

    /// Re-open a stopped channel (empty) for a new producer
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.items.clear();
        state.stopped = false;
    }

    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_stopped(&self) -> bool {
        self.state.lock().stopped
    }
}
