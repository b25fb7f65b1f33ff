// Interleaved PCM ring between the tick thread and the audio device callback

use parking_lot::Mutex;
use std::sync::Arc;

/// Fixed-size FIFO of interleaved f32 samples.
///
/// Writes never overwrite unread samples; callers get back how much was
/// actually accepted or produced.
pub struct SampleRing {
    samples: Box<[f32]>,
    head: usize,
    len: usize,
}

impl SampleRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: vec![0.0; capacity.max(1)].into_boxed_slice(),
            head: 0,
            len: 0,
        }
    }

    fn tail(&self) -> usize {
        (self.head + self.len) % self.samples.len()
    }

    /// Append as many of `data` as fit; returns the number accepted
    pub fn push_slice(&mut self, data: &[f32]) -> usize {
        let count = data.len().min(self.free());
        if count == 0 {
            return 0;
        }

        let cap = self.samples.len();
        let start = self.tail();
        let first = count.min(cap - start);
        self.samples[start..start + first].copy_from_slice(&data[..first]);
        self.samples[..count - first].copy_from_slice(&data[first..count]);
        self.len += count;
        count
    }

    /// Move up to `out.len()` samples into `out`; returns the number written
    pub fn pop_into(&mut self, out: &mut [f32]) -> usize {
        let count = out.len().min(self.len);
        if count == 0 {
            return 0;
        }

        let cap = self.samples.len();
        let first = count.min(cap - self.head);
        out[..first].copy_from_slice(&self.samples[self.head..self.head + first]);
        out[first..count].copy_from_slice(&self.samples[..count - first]);
        self.head = (self.head + count) % cap;
        self.len -= count;
        count
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    pub fn free(&self) -> usize {
        self.samples.len() - self.len
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    /// Fraction of capacity currently queued, 0.0 to 1.0
    pub fn fill_ratio(&self) -> f32 {
        self.len as f32 / self.samples.len() as f32
    }
}

/// Cloneable handle; one side lives in the device callback
#[derive(Clone)]
pub struct SharedSampleRing {
    inner: Arc<Mutex<SampleRing>>,
}

impl SharedSampleRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SampleRing::new(capacity))),
        }
    }

    pub fn push_slice(&self, data: &[f32]) -> usize {
        self.inner.lock().push_slice(data)
    }

    pub fn pop_into(&self, out: &mut [f32]) -> usize {
        self.inner.lock().pop_into(out)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity()
    }

    pub fn free(&self) -> usize {
        self.inner.lock().free()
    }

    pub fn clear(&self) {
        self.inner.lock().clear()
    }

    pub fn fill_ratio(&self) -> f32 {
        self.inner.lock().fill_ratio()
    }
}
