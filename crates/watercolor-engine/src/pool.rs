use std::collections::HashMap;

/// Default number of buffers kept per distinct length.
pub const DEFAULT_MAX_PER_LEN: usize = 10;

/// Pool of `f32` scratch buffers keyed by exact length.
///
/// The per-frame upload path packs blooms, colors and cutouts into a few
/// fixed-shape arrays for every overlay on every rendered tick; recycling them
/// keeps allocation flat regardless of overlay count.
///
/// Buffers handed out by [`acquire`](Self::acquire) are always zero-filled.
#[derive(Debug)]
pub struct BufferPool {
    pool: HashMap<usize, Vec<Vec<f32>>>,
    max_per_len: usize,
}

impl BufferPool {
    pub fn new() -> Self {
        Self::with_max_per_len(DEFAULT_MAX_PER_LEN)
    }

    pub fn with_max_per_len(max_per_len: usize) -> Self {
        Self {
            pool: HashMap::new(),
            max_per_len,
        }
    }

    /// Returns a zeroed buffer of exactly `len` elements, recycled when possible.
    pub fn acquire(&mut self, len: usize) -> Vec<f32> {
        match self.pool.get_mut(&len).and_then(|v| v.pop()) {
            Some(mut buf) => {
                buf.fill(0.0);
                buf
            }
            None => vec![0.0; len],
        }
    }

    /// Hands a buffer back. Dropped when the pool for its length is full.
    pub fn release(&mut self, buf: Vec<f32>) {
        if buf.is_empty() {
            return;
        }
        let entry = self.pool.entry(buf.len()).or_default();
        if entry.len() < self.max_per_len {
            entry.push(buf);
        }
    }

    /// Drops every pooled buffer.
    pub fn clear(&mut self) {
        self.pool.clear();
    }

    /// Total number of buffers currently pooled.
    pub fn pooled_count(&self) -> usize {
        self.pool.values().map(Vec::len).sum()
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}
