//! Bounded queue of interleaved i16 samples feeding the output callback.
//!
//! The playback thread pushes whole chunks (blocking when the queue is full,
//! which paces the decode loop against real time); the audio callback drains
//! it without ever blocking. `close` makes shutdown deterministic and `clear`
//! drops buffered audio on stop/seek so stale samples are never played.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// Bounded interleaved sample queue shared with the realtime output callback.
pub struct PcmQueue {
    inner: Mutex<Inner>,
    cv: Condvar,
    max_samples: usize,
}

struct Inner {
    queue: VecDeque<i16>,
    closed: bool,
}

impl PcmQueue {
    /// Create a queue holding at most `max_samples` interleaved samples.
    pub fn new(max_samples: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                queue: VecDeque::new(),
                closed: false,
            }),
            cv: Condvar::new(),
            max_samples: max_samples.max(1),
        }
    }

    /// Current number of buffered samples (best-effort snapshot).
    pub fn len(&self) -> usize {
        let g = self.inner.lock().unwrap();
        g.queue.len()
    }

    /// Whether the queue has been closed. Buffered samples remain drainable.
    pub fn is_closed(&self) -> bool {
        let g = self.inner.lock().unwrap();
        g.closed
    }

    /// Mark the queue closed and wake all waiters. Idempotent.
    pub fn close(&self) {
        let mut g = self.inner.lock().unwrap();
        g.closed = true;
        drop(g);
        self.cv.notify_all();
    }

    /// Drop all buffered samples without closing the queue.
    pub fn clear(&self) {
        let mut g = self.inner.lock().unwrap();
        g.queue.clear();
        drop(g);
        self.cv.notify_all();
    }

    /// Push samples, blocking while the queue is at capacity.
    ///
    /// Returns `false` if the queue was closed before everything was queued;
    /// remaining samples are dropped in that case.
    pub fn push_blocking(&self, samples: &[i16]) -> bool {
        let mut offset = 0;

        while offset < samples.len() {
            let mut g = self.inner.lock().unwrap();

            while g.queue.len() >= self.max_samples && !g.closed {
                g = self.cv.wait(g).unwrap();
            }
            if g.closed {
                return false;
            }

            while offset < samples.len() && g.queue.len() < self.max_samples {
                g.queue.push_back(samples[offset]);
                offset += 1;
            }

            drop(g);
            self.cv.notify_all();
        }

        true
    }

    /// Pop up to `max` samples without blocking; `None` when empty.
    pub fn pop_upto(&self, max: usize) -> Option<Vec<i16>> {
        let mut g = self.inner.lock().unwrap();
        let take = g.queue.len().min(max);
        if take == 0 {
            return None;
        }

        let out: Vec<i16> = g.queue.drain(..take).collect();
        drop(g);
        self.cv.notify_all();
        Some(out)
    }

    /// Block until the queue is empty (played out or closed), or `timeout`
    /// expires. Returns `true` if the queue emptied before the deadline.
    pub fn wait_empty(&self, timeout: Duration) -> bool {
        let deadline = std::time::Instant::now() + timeout;
        let mut g = self.inner.lock().unwrap();
        loop {
            if g.queue.is_empty() || g.closed {
                return g.queue.is_empty();
            }
            let now = std::time::Instant::now();
            if now >= deadline {
                return false;
            }
            let (ng, _) = self.cv.wait_timeout(g, deadline - now).unwrap();
            g = ng;
        }
    }
}
