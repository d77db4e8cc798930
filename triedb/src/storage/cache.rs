//! Write-back page cache.
//!
//! `CacheStorage` wraps any `Storage` and serves reads and writes from
//! page-sized buffers kept in memory. Nothing reaches the backing store until
//! `flush`, which writes back only the dirty byte range of each page.
//!
//! # Design
//!
//! - Pages are fetched on first touch, read or write, and stay resident
//! - Each page tracks one contiguous dirty range `[start, end)`
//! - The logical length may run ahead of the backing store until a flush
//! - `clear` drops dirty pages without writing them (discard changes)
//!
//! # Invariants
//!
//! - A resident clean page matches the backing store byte for byte
//! - `len() >= inner.len()` except right after `clear`, where they are equal

// Page offsets are always smaller than the page size, which is a usize.
#![allow(clippy::cast_possible_truncation)]

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::sync::Arc;

use crate::storage::buffer_pool::{BufferPool, DEFAULT_POOL_CAPACITY};
use crate::storage::io::{Storage, StorageError};
use crate::storage::page::{CachePage, DEFAULT_PAGE_SIZE, PageId};

/// A page cache in front of a backing store.
///
/// Owning the backing store (`CacheStorage<FileStorage>`) closes it when the
/// cache is dropped. Wrapping a borrow (`CacheStorage<&mut FileStorage>`)
/// leaves it to the caller.
pub struct CacheStorage<S: Storage> {
    inner: S,
    /// Resident pages, ordered so write-back is sequential.
    pages: BTreeMap<PageId, CachePage>,
    pool: Arc<BufferPool>,
    page_size: usize,
    /// Logical length, including bytes not yet flushed.
    len: u64,
}

impl<S: Storage> CacheStorage<S> {
    /// Wrap `inner` with the default 8KB page size.
    pub fn new(inner: S) -> Self {
        Self::with_page_size(inner, DEFAULT_PAGE_SIZE)
    }

    /// Wrap `inner` with a custom page size and a private buffer pool.
    ///
    /// # Panics
    /// Panics if `page_size` is 0.
    pub fn with_page_size(inner: S, page_size: usize) -> Self {
        Self::with_pool(inner, BufferPool::new(page_size, DEFAULT_POOL_CAPACITY))
    }

    /// Wrap `inner`, leasing page buffers from a shared pool.
    ///
    /// The page size is the pool's buffer size.
    pub fn with_pool(inner: S, pool: Arc<BufferPool>) -> Self {
        let len = inner.len();
        Self {
            inner,
            pages: BTreeMap::new(),
            page_size: pool.buffer_size(),
            pool,
            len,
        }
    }

    /// Page size in bytes.
    #[must_use]
    pub const fn page_size(&self) -> usize {
        self.page_size
    }

    /// The backing store.
    #[must_use]
    pub const fn inner(&self) -> &S {
        &self.inner
    }

    /// Mutable access to the backing store.
    ///
    /// Writes made directly to the backing store are not seen through pages
    /// that are already resident.
    pub const fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// Number of resident pages.
    #[must_use]
    pub fn cached_page_count(&self) -> usize {
        self.pages.len()
    }

    /// Number of pages with bytes not yet written back.
    #[must_use]
    pub fn dirty_page_count(&self) -> usize {
        self.pages.values().filter(|p| p.is_dirty()).count()
    }

    /// Whether a flush would change the backing store.
    #[must_use]
    pub fn has_unflushed_changes(&self) -> bool {
        self.len > self.inner.len() || self.pages.values().any(CachePage::is_dirty)
    }

    /// Grow the backing store so it covers the logical length, without
    /// writing any page.
    pub fn reserve_backing(&mut self) -> Result<(), StorageError> {
        let missing = self.len.saturating_sub(self.inner.len());
        if missing > 0 {
            self.inner.reserve(missing)?;
        }
        Ok(())
    }

    /// Drop every dirty page without writing it back.
    ///
    /// The logical length goes back to the backing store's length.
    /// Returns true if at least one page was evicted.
    pub fn clear(&mut self) -> bool {
        let dirty: Vec<PageId> = self
            .pages
            .values()
            .filter(|p| p.is_dirty())
            .map(CachePage::page_id)
            .collect();

        for page_id in &dirty {
            if let Some(page) = self.pages.remove(page_id) {
                self.pool.return_buffer(page.into_buffer());
            }
        }
        self.len = self.inner.len();

        tracing::debug!(evicted = dirty.len(), "discarded dirty pages");
        !dirty.is_empty()
    }

    /// Flush and release the cache.
    ///
    /// Unlike dropping, this reports a failed flush to the caller.
    pub fn close(mut self) -> Result<(), StorageError> {
        self.flush()
    }

    /// Get the page, fetching it from the backing store if it is not resident.
    fn page_mut(&mut self, page_id: PageId) -> Result<&mut CachePage, StorageError> {
        match self.pages.entry(page_id) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let mut buffer = self.pool.lease_zeroed();
                if let Err(e) = self
                    .inner
                    .read(page_id * self.page_size as u64, &mut buffer)
                {
                    self.pool.return_buffer(buffer);
                    return Err(e);
                }
                tracing::trace!(page_id, "fetched page");
                Ok(entry.insert(CachePage::new(page_id, buffer)))
            }
        }
    }

    fn split(&self, offset: u64) -> (PageId, usize) {
        let page_size = self.page_size as u64;
        (offset / page_size, (offset % page_size) as usize)
    }
}

impl<S: Storage> Storage for CacheStorage<S> {
    fn read(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), StorageError> {
        let (mut page_id, mut page_offset) = self.split(offset);
        let mut done = 0;
        while done < buf.len() {
            let chunk = (buf.len() - done).min(self.page_size - page_offset);
            let page = self.page_mut(page_id)?;
            buf[done..done + chunk].copy_from_slice(page.read_bytes(page_offset, chunk));
            done += chunk;
            page_offset = 0;
            page_id += 1;
        }
        Ok(())
    }

    fn write(&mut self, offset: u64, bytes: &[u8]) -> Result<(), StorageError> {
        let (mut page_id, mut page_offset) = self.split(offset);
        let mut done = 0;
        while done < bytes.len() {
            let chunk = (bytes.len() - done).min(self.page_size - page_offset);
            let page = self.page_mut(page_id)?;
            page.write_bytes(page_offset, &bytes[done..done + chunk]);
            done += chunk;
            page_offset = 0;
            page_id += 1;
        }
        self.len = self.len.max(offset + bytes.len() as u64);
        Ok(())
    }

    fn reserve(&mut self, additional: u64) -> Result<(), StorageError> {
        self.len += additional;
        Ok(())
    }

    fn len(&self) -> u64 {
        self.len
    }

    fn flush(&mut self) -> Result<(), StorageError> {
        self.reserve_backing()?;

        let page_size = self.page_size as u64;
        let mut pages_written = 0usize;
        let mut bytes_written = 0usize;
        for page in self.pages.values_mut().filter(|p| p.is_dirty()) {
            let offset = page.page_id() * page_size + page.written_start() as u64;
            self.inner.write(offset, page.dirty_bytes())?;
            pages_written += 1;
            bytes_written += page.written_len();
            page.mark_clean();
        }
        self.inner.flush()?;

        tracing::debug!(pages_written, bytes_written, len = self.len, "flushed page cache");
        Ok(())
    }
}

impl<S: Storage> Drop for CacheStorage<S> {
    fn drop(&mut self) {
        if self.has_unflushed_changes() {
            if let Err(e) = self.flush() {
                tracing::warn!("failed to flush page cache on drop: {e}");
            }
        }
        for page in std::mem::take(&mut self.pages).into_values() {
            self.pool.return_buffer(page.into_buffer());
        }
    }
}

impl<S: Storage> std::fmt::Debug for CacheStorage<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStorage")
            .field("page_size", &self.page_size)
            .field("len", &self.len)
            .field("cached_pages", &self.pages.len())
            .finish_non_exhaustive()
    }
}
