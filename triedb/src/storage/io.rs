//! Byte-addressed storage abstraction.
//!
//! This module provides a `Storage` trait that abstracts over a flat,
//! offset-addressed byte store, allowing the trie to run on a real file in
//! production, on an in-memory buffer in tests, and through the page cache in
//! either case.
//!
//! # Design
//!
//! The trait is a minimal contract:
//! - Positional read/write
//! - Append at the logical end of data
//! - Capacity growth (`reserve`)
//! - Durability (`flush`)
//!
//! Implementations are single-writer. Every operation takes `&mut self`, so a
//! caller that shares a store between threads must provide its own
//! serialization point (for example a `Mutex` around the owning value).

/// Errors that can occur during storage operations.
#[derive(Debug)]
pub enum StorageError {
    /// I/O error.
    Io(std::io::Error),
    /// Injected fault for simulation.
    InjectedFault(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::InjectedFault(msg) => write!(f, "injected fault: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::InjectedFault(_) => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// Abstraction over an offset-addressed byte store.
///
/// # Implementation Notes
///
/// Implementations must ensure:
/// - `read` returns the last written content for every byte in range
/// - bytes at or beyond `len()` read back as zero
/// - `write` past the end extends `len()` to `offset + bytes.len()`
/// - `flush` makes all previous writes durable
pub trait Storage {
    /// Fill `buf` with the bytes starting at `offset`.
    fn read(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), StorageError>;

    /// Write `bytes` at `offset`.
    ///
    /// The write may be buffered until `flush` is called.
    fn write(&mut self, offset: u64, bytes: &[u8]) -> Result<(), StorageError>;

    /// Append `bytes` at the current end of data.
    ///
    /// Returns the offset the bytes were written at (the previous length).
    fn write_to_end(&mut self, bytes: &[u8]) -> Result<u64, StorageError> {
        let offset = self.len();
        self.write(offset, bytes)?;
        Ok(offset)
    }

    /// Grow the store by `additional` zeroed bytes.
    fn reserve(&mut self, additional: u64) -> Result<(), StorageError>;

    /// Current length of the data in bytes.
    fn len(&self) -> u64;

    /// Whether the store holds no bytes at all.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make all pending writes durable.
    fn flush(&mut self) -> Result<(), StorageError>;

    /// Read `len` bytes at `offset` into a fresh buffer.
    fn read_vec(&mut self, offset: u64, len: usize) -> Result<Vec<u8>, StorageError> {
        let mut buf = vec![0u8; len];
        self.read(offset, &mut buf)?;
        Ok(buf)
    }
}

/// A mutable borrow of a store is itself a store.
///
/// This lets a `CacheStorage` or a `Trie` wrap a store without owning it.
impl<S: Storage + ?Sized> Storage for &mut S {
    fn read(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), StorageError> {
        (**self).read(offset, buf)
    }

    fn write(&mut self, offset: u64, bytes: &[u8]) -> Result<(), StorageError> {
        (**self).write(offset, bytes)
    }

    fn write_to_end(&mut self, bytes: &[u8]) -> Result<u64, StorageError> {
        (**self).write_to_end(bytes)
    }

    fn reserve(&mut self, additional: u64) -> Result<(), StorageError> {
        (**self).reserve(additional)
    }

    fn len(&self) -> u64 {
        (**self).len()
    }

    fn flush(&mut self) -> Result<(), StorageError> {
        (**self).flush()
    }
}
