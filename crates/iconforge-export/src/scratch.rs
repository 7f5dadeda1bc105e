//! Bounded arena of reusable encode buffers.
//!
//! Each owner (the coordinator for synchronous work, the worker thread
//! for background work) holds its own pool. Buffers are borrowed through
//! a [`ScratchBuffer`] guard that hands them back on drop.

use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, PoisonError};

/// Pool of at most `capacity` idle byte buffers.
#[derive(Debug)]
pub struct ScratchPool {
    capacity: usize,
    free: Mutex<Vec<Vec<u8>>>,
}

impl ScratchPool {
    /// Create an empty pool that keeps up to `capacity` buffers.
    #[must_use]
    pub const fn new(capacity: usize) -> Self {
        Self {
            capacity,
            free: Mutex::new(Vec::new()),
        }
    }

    /// Maximum number of idle buffers kept.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of idle buffers ready for reuse.
    #[must_use]
    pub fn idle(&self) -> usize {
        self.free.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Borrow a cleared buffer, reusing an idle one when available.
    pub fn acquire(&self) -> ScratchBuffer<'_> {
        let buf = self
            .free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
            .unwrap_or_default();
        ScratchBuffer { pool: self, buf }
    }

    fn release(&self, mut buf: Vec<u8>) {
        let mut free = self.free.lock().unwrap_or_else(PoisonError::into_inner);
        if free.len() < self.capacity {
            buf.clear();
            free.push(buf);
        }
    }
}

impl Default for ScratchPool {
    fn default() -> Self {
        Self::new(crate::config::ExportConfig::DEFAULT_SCRATCH_POOL_SIZE)
    }
}

/// A buffer on loan from a [`ScratchPool`].
#[derive(Debug)]
pub struct ScratchBuffer<'p> {
    pool: &'p ScratchPool,
    buf: Vec<u8>,
}

impl Deref for ScratchBuffer<'_> {
    type Target = Vec<u8>;

    fn deref(&self) -> &Vec<u8> {
        &self.buf
    }
}

impl DerefMut for ScratchBuffer<'_> {
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        &mut self.buf
    }
}

impl Drop for ScratchBuffer<'_> {
    fn drop(&mut self) {
        self.pool.release(std::mem::take(&mut self.buf));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffers_are_returned_and_reused() {
        let pool = ScratchPool::new(2);
        {
            let mut a = pool.acquire();
            a.extend_from_slice(&[1; 4096]);
        }
        assert_eq!(pool.idle(), 1);

        let b = pool.acquire();
        assert!(b.is_empty());
        assert!(b.capacity() >= 4096);
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn pool_is_bounded() {
        let pool = ScratchPool::new(2);
        {
            let _a = pool.acquire();
            let _b = pool.acquire();
            let _c = pool.acquire();
        }
        assert_eq!(pool.idle(), 2);
    }
}
