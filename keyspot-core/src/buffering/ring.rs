//! Fixed-capacity circular buffer with independent read and write cursors.
//!
//! This is the sliding-window primitive shared by every pipeline stage. The
//! backing store holds `capacity + 1` slots; the extra slot disambiguates a
//! full buffer from an empty one:
//!
//! ```text
//! empty ⇔ r == w
//! full  ⇔ (w + 1) mod len == r
//! ```
//!
//! Stages use the *write-ahead* pattern `rewind().seek(n)` before writing a
//! batch of `n` values, so that the next full drain returns the most recent
//! `capacity` values ending with the batch just written.

use crate::error::{KeyspotError, Result};

#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    data: Vec<T>,
    rpos: usize,
    wpos: usize,
}

impl<T: Copy> RingBuffer<T> {
    /// Allocate a buffer holding up to `capacity` values, with every slot
    /// initialised to `initial`. The buffer starts empty.
    pub fn new(capacity: usize, initial: T) -> Self {
        Self {
            data: vec![initial; capacity + 1],
            rpos: 0,
            wpos: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.rpos == self.wpos
    }

    pub fn is_full(&self) -> bool {
        self.pos(self.wpos as isize + 1) == self.rpos
    }

    /// Mark every written slot readable again without consuming anything.
    pub fn rewind(&mut self) -> &mut Self {
        self.rpos = self.pos(self.wpos as isize + 1);
        self
    }

    /// Advance the read cursor by `elems` without reading.
    ///
    /// No bounds checking is performed beyond the modular arithmetic; the
    /// caller must not seek past unread data.
    pub fn seek(&mut self, elems: isize) -> &mut Self {
        self.rpos = self.pos(self.rpos as isize + elems);
        self
    }

    /// Drop all unread data. Stored values and the write position are kept.
    pub fn reset(&mut self) -> &mut Self {
        self.rpos = self.wpos;
        self
    }

    /// Write `value` until the buffer is full.
    pub fn fill(&mut self, value: T) -> &mut Self {
        while !self.is_full() {
            self.data[self.wpos] = value;
            self.wpos = self.pos(self.wpos as isize + 1);
        }
        self
    }

    pub fn read(&mut self) -> Result<T> {
        if self.is_empty() {
            return Err(KeyspotError::BufferEmpty);
        }
        let value = self.data[self.rpos];
        self.rpos = self.pos(self.rpos as isize + 1);
        Ok(value)
    }

    pub fn write(&mut self, value: T) -> Result<()> {
        if self.is_full() {
            return Err(KeyspotError::BufferFull);
        }
        self.data[self.wpos] = value;
        self.wpos = self.pos(self.wpos as isize + 1);
        Ok(())
    }

    /// Read until empty, appending every value to `out`.
    pub fn drain_into(&mut self, out: &mut Vec<T>) -> Result<()> {
        while !self.is_empty() {
            out.push(self.read()?);
        }
        Ok(())
    }

    /// Write every value of `values`, failing on the first overflow.
    pub fn write_all(&mut self, values: &[T]) -> Result<()> {
        for &v in values {
            self.write(v)?;
        }
        Ok(())
    }

    fn pos(&self, x: isize) -> usize {
        let len = self.data.len() as isize;
        (((x % len) + len) % len) as usize
    }
}
