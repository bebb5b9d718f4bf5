//! Bounded FIFO ring of audio samples between the decoder and the device
//! callback.
//!
//! Unlike a recording buffer, playback must never lose samples that are
//! already queued: when the ring is full, [`RingBuffer::push_slice`] accepts
//! only what fits and reports how much that was.  The producer keeps the
//! rest and retries on the next tick.
//!
//! # Example
//!
//! ```rust
//! use soundboard::audio::RingBuffer;
//!
//! let mut buf = RingBuffer::new(4);
//! assert_eq!(buf.push_slice(&[1.0, 2.0, 3.0, 4.0, 5.0]), 4);
//!
//! let mut out = [0.0; 3];
//! assert_eq!(buf.pop_into(&mut out), 3);
//! assert_eq!(out, [1.0, 2.0, 3.0]);
//! ```

// ---------------------------------------------------------------------------
// RingBuffer
// ---------------------------------------------------------------------------

/// A fixed-capacity first-in first-out ring.
pub struct RingBuffer<T> {
    buf: Vec<T>,
    capacity: usize,
    /// Index of the oldest queued item.
    read_pos: usize,
    /// Number of queued items (≤ `capacity`).
    len: usize,
}

impl<T: Copy + Default> RingBuffer<T> {
    /// Create a ring holding up to `capacity` items.
    ///
    /// # Panics
    ///
    /// Panics if `capacity == 0`.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "RingBuffer capacity must be > 0");
        Self {
            buf: vec![T::default(); capacity],
            capacity,
            read_pos: 0,
            len: 0,
        }
    }

    /// Queue as much of `data` as fits and return the number of items taken.
    pub fn push_slice(&mut self, data: &[T]) -> usize {
        let accepted = data.len().min(self.free());
        for &item in &data[..accepted] {
            let write_pos = (self.read_pos + self.len) % self.capacity;
            self.buf[write_pos] = item;
            self.len += 1;
        }
        accepted
    }

    /// Remove the oldest item.
    pub fn pop(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        let item = self.buf[self.read_pos];
        self.read_pos = (self.read_pos + 1) % self.capacity;
        self.len -= 1;
        Some(item)
    }

    /// Fill `out` from the front of the queue; returns how many slots were
    /// filled.  Unfilled slots are left untouched.
    pub fn pop_into(&mut self, out: &mut [T]) -> usize {
        let mut filled = 0;
        for slot in out.iter_mut() {
            match self.pop() {
                Some(item) => {
                    *slot = item;
                    filled += 1;
                }
                None => break,
            }
        }
        filled
    }

    /// Discard everything queued.
    pub fn clear(&mut self) {
        self.read_pos = 0;
        self.len = 0;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Items that can be pushed before the ring is full.
    pub fn free(&self) -> usize {
        self.capacity - self.len
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
