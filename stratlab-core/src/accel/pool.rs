//! Reusable `f64` buffers ordered by capacity.
//!
//! `acquire(len)` hands out the smallest freed buffer whose capacity covers
//! `len`, or allocates. `release` returns a buffer for reuse. The pool lives
//! as long as the executor that owns it.

use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Acquisitions served from a freed buffer.
    pub hits: u64,
    /// Acquisitions that had to allocate.
    pub misses: u64,
    /// Buffers currently parked in the pool.
    pub parked: usize,
}

#[derive(Debug, Default)]
pub struct BufferPool {
    free: BTreeMap<usize, Vec<Vec<f64>>>,
    hits: u64,
    misses: u64,
}

impl BufferPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// A zero-filled buffer of exactly `len` elements.
    pub fn acquire(&mut self, len: usize) -> Vec<f64> {
        let slot = self.free.range(len..).next().map(|(&cap, _)| cap);
        let reused = slot.and_then(|cap| {
            let bucket = self.free.get_mut(&cap)?;
            let buf = bucket.pop();
            if bucket.is_empty() {
                self.free.remove(&cap);
            }
            buf
        });

        match reused {
            Some(mut buf) => {
                self.hits += 1;
                buf.clear();
                buf.resize(len, 0.0);
                buf
            }
            None => {
                self.misses += 1;
                vec![0.0; len]
            }
        }
    }

    /// Park `buf` for reuse. Zero-capacity buffers are dropped.
    pub fn release(&mut self, buf: Vec<f64>) {
        let cap = buf.capacity();
        if cap == 0 {
            return;
        }
        self.free.entry(cap).or_default().push(buf);
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            hits: self.hits,
            misses: self.misses,
            parked: self.free.values().map(Vec::len).sum(),
        }
    }

    /// Drop every parked buffer.
    pub fn clear(&mut self) {
        self.free.clear();
    }
}
