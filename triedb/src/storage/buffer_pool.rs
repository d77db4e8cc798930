//! Buffer pool for recycled page buffers.
//!
//! The page cache allocates one page-sized buffer per resident page and drops
//! them all on `clear` or when the cache goes away. The buffer pool keeps
//! those buffers around so the next cache (or the next fetch after a
//! `clear`) does not have to allocate again.
//!
//! # Design
//!
//! - Buffers are allocated lazily; leasing from an empty pool allocates
//! - Uses a free list (Vec) for O(1) lease/return
//! - At most `capacity` idle buffers are retained; extra returns are dropped
//! - Thread-safe: uses Mutex for internal synchronization, so one pool can be
//!   shared by every open cache
//!
//! # Invariants
//!
//! - Every buffer in the free list is exactly `buffer_size` bytes
//! - `free_list.len() <= capacity`

use std::sync::{Arc, Mutex};

/// Default number of idle buffers retained (8,192 pages = 64MB at 8KB pages).
pub const DEFAULT_POOL_CAPACITY: usize = 8_192;

/// A pool of equally sized byte buffers.
pub struct BufferPool {
    /// Idle buffers available for leasing.
    /// Invariant: all buffers are `buffer_size` bytes.
    free_list: Mutex<Vec<Box<[u8]>>>,
    /// Size of every buffer handed out.
    buffer_size: usize,
    /// Maximum number of idle buffers kept.
    capacity: usize,
}

impl BufferPool {
    /// Create a new buffer pool handing out `buffer_size`-byte buffers.
    ///
    /// # Panics
    /// Panics if `buffer_size` is 0.
    #[must_use]
    pub fn new(buffer_size: usize, capacity: usize) -> Arc<Self> {
        assert!(buffer_size > 0, "Buffer size must be positive");

        Arc::new(Self {
            free_list: Mutex::new(Vec::new()),
            buffer_size,
            capacity,
        })
    }

    /// Lease a zeroed buffer from the pool, allocating if none is idle.
    #[allow(clippy::expect_used)] // Mutex poisoning indicates unrecoverable state
    pub fn lease_zeroed(&self) -> Box<[u8]> {
        let recycled = self.free_list.lock().expect("lock poisoned").pop();
        match recycled {
            Some(mut buffer) => {
                buffer.fill(0);
                buffer
            }
            None => vec![0u8; self.buffer_size].into_boxed_slice(),
        }
    }

    /// Return a buffer to the pool.
    ///
    /// Buffers of the wrong size, or beyond the pool capacity, are dropped.
    #[allow(clippy::expect_used)] // Mutex poisoning indicates unrecoverable state
    pub fn return_buffer(&self, buffer: Box<[u8]>) {
        if buffer.len() != self.buffer_size {
            return;
        }
        let mut free_list = self.free_list.lock().expect("lock poisoned");
        if free_list.len() < self.capacity {
            free_list.push(buffer);
        }
    }

    /// Get the number of idle buffers.
    #[must_use]
    #[allow(clippy::expect_used)] // Mutex poisoning indicates unrecoverable state
    pub fn available(&self) -> usize {
        self.free_list.lock().expect("lock poisoned").len()
    }

    /// Size of the buffers handed out by this pool.
    #[must_use]
    pub const fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Get the maximum number of idle buffers retained.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

impl std::fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("buffer_size", &self.buffer_size)
            .field("capacity", &self.capacity)
            .field("available", &self.available())
            .finish()
    }
}
