//! In-memory storage for deterministic testing.
//!
//! This module provides a `Vec<u8>`-backed implementation of the `Storage`
//! trait with simple fault injection:
//! - Write errors (every write, append and reserve fails)
//! - Write errors after a budget of successful writes, to cut an operation
//!   short partway through
//! - Flush errors
//!
//! Operation counters make it possible to assert how much I/O the page cache
//! actually issued.

use crate::storage::io::{Storage, StorageError};

/// Configuration for fault injection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaultConfig {
    /// Fail every write, append and reserve.
    pub fail_writes: bool,
    /// Allow this many writes, appends and reserves, then fail the rest.
    /// Counted from the last `set_fault_config`.
    pub fail_after_writes: Option<u64>,
    /// Fail every flush.
    pub fail_flush: bool,
}

impl FaultConfig {
    /// Create a fault config with no faults (for baseline testing).
    #[must_use]
    pub fn no_faults() -> Self {
        Self::default()
    }
}

/// Statistics about in-memory storage operations.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MemoryStorageStats {
    /// Number of read calls.
    pub reads: u64,
    /// Number of write calls (appends included).
    pub writes: u64,
    /// Total bytes written.
    pub bytes_written: u64,
    /// Number of flushes.
    pub flushes: u64,
}

/// In-memory storage implementation.
///
/// # Thread Safety
///
/// This implementation is not thread-safe. Tests run everything in a single
/// thread, so this is fine.
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    data: Vec<u8>,
    fault_config: FaultConfig,
    writes_since_config: u64,
    stats: MemoryStorageStats,
}

impl MemoryStorage {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding a copy of `bytes`.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            data: bytes.to_vec(),
            ..Self::default()
        }
    }

    /// Create a store of `len` zero bytes.
    #[must_use]
    pub fn zeroed(len: usize) -> Self {
        Self {
            data: vec![0u8; len],
            ..Self::default()
        }
    }

    /// The raw content of the store.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Get the current statistics.
    #[must_use]
    pub const fn stats(&self) -> &MemoryStorageStats {
        &self.stats
    }

    /// Reset statistics.
    pub fn reset_stats(&mut self) {
        self.stats = MemoryStorageStats::default();
    }

    /// Update the fault configuration.
    pub const fn set_fault_config(&mut self, config: FaultConfig) {
        self.fault_config = config;
        self.writes_since_config = 0;
    }

    fn check_writable(&mut self) -> Result<(), StorageError> {
        if self.fault_config.fail_writes {
            return Err(StorageError::InjectedFault("write failed".to_string()));
        }
        if let Some(budget) = self.fault_config.fail_after_writes
            && self.writes_since_config >= budget
        {
            return Err(StorageError::InjectedFault(format!(
                "write failed after {budget} writes"
            )));
        }
        self.writes_since_config += 1;
        Ok(())
    }

    fn index(offset: u64) -> Result<usize, StorageError> {
        usize::try_from(offset).map_err(|_| {
            StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("offset {offset} does not fit in memory"),
            ))
        })
    }
}

impl Storage for MemoryStorage {
    fn read(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), StorageError> {
        self.stats.reads += 1;
        let start = Self::index(offset)?;
        buf.fill(0);
        if start < self.data.len() {
            let available = (self.data.len() - start).min(buf.len());
            buf[..available].copy_from_slice(&self.data[start..start + available]);
        }
        Ok(())
    }

    fn write(&mut self, offset: u64, bytes: &[u8]) -> Result<(), StorageError> {
        self.check_writable()?;
        self.stats.writes += 1;
        self.stats.bytes_written += bytes.len() as u64;
        let start = Self::index(offset)?;
        let end = start + bytes.len();
        if end > self.data.len() {
            self.data.resize(end, 0);
        }
        self.data[start..end].copy_from_slice(bytes);
        Ok(())
    }

    fn reserve(&mut self, additional: u64) -> Result<(), StorageError> {
        self.check_writable()?;
        let additional = Self::index(additional)?;
        self.data.resize(self.data.len() + additional, 0);
        Ok(())
    }

    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    fn flush(&mut self) -> Result<(), StorageError> {
        if self.fault_config.fail_flush {
            return Err(StorageError::InjectedFault("flush failed".to_string()));
        }
        self.stats.flushes += 1;
        Ok(())
    }
}
