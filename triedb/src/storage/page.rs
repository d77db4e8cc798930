//! Cache pages.
//!
//! The page cache uses fixed-size pages (8KB by default) as the unit of
//! buffering. A page remembers the single contiguous byte range written since
//! the last flush so write-back only touches what changed.

/// Default page size in bytes (8KB).
pub const DEFAULT_PAGE_SIZE: usize = 8192;

/// A page identifier (0-indexed page number).
pub type PageId = u64;

/// A resident page of the cache.
///
/// Invariant: `written_start <= written_end <= content.len()`. The page is
/// dirty iff `written_start != written_end`.
pub struct CachePage {
    page_id: PageId,
    content: Box<[u8]>,
    written_start: usize,
    written_end: usize,
}

impl CachePage {
    /// Wrap a buffer holding the current content of `page_id`.
    #[must_use]
    pub const fn new(page_id: PageId, content: Box<[u8]>) -> Self {
        Self {
            page_id,
            content,
            written_start: 0,
            written_end: 0,
        }
    }

    /// Page number of this page.
    #[must_use]
    pub const fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Get the raw page data.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.content
    }

    /// Read bytes at a specific offset within the page.
    #[must_use]
    pub fn read_bytes(&self, offset: usize, len: usize) -> &[u8] {
        &self.content[offset..offset + len]
    }

    /// Write bytes at a specific offset within the page and widen the dirty
    /// range to cover them.
    pub fn write_bytes(&mut self, offset: usize, bytes: &[u8]) {
        let end = offset + bytes.len();
        self.content[offset..end].copy_from_slice(bytes);
        if bytes.is_empty() {
            return;
        }
        if self.is_dirty() {
            self.written_start = self.written_start.min(offset);
            self.written_end = self.written_end.max(end);
        } else {
            self.written_start = offset;
            self.written_end = end;
        }
    }

    /// Whether the page has bytes not yet written back.
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.written_start != self.written_end
    }

    /// Start of the dirty range within the page.
    #[must_use]
    pub const fn written_start(&self) -> usize {
        self.written_start
    }

    /// Length of the dirty range.
    #[must_use]
    pub const fn written_len(&self) -> usize {
        self.written_end - self.written_start
    }

    /// The dirty bytes, if any.
    #[must_use]
    pub fn dirty_bytes(&self) -> &[u8] {
        &self.content[self.written_start..self.written_end]
    }

    /// Forget the dirty range after a write-back.
    pub const fn mark_clean(&mut self) {
        self.written_start = 0;
        self.written_end = 0;
    }

    /// Give the buffer back, typically to a buffer pool.
    #[must_use]
    pub fn into_buffer(self) -> Box<[u8]> {
        self.content
    }
}

impl std::fmt::Debug for CachePage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachePage")
            .field("page_id", &self.page_id)
            .field("written_start", &self.written_start)
            .field("written_end", &self.written_end)
            .finish_non_exhaustive()
    }
}
