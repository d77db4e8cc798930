//! Byte storage for the trie.
//!
//! The trie is stored in a single flat file addressed by byte offset. Three
//! layers implement the `Storage` contract:
//!
//! - `FileStorage`: positional I/O on a real file
//! - `MemoryStorage`: a `Vec<u8>` with fault injection, for tests
//! - `CacheStorage`: a write-back page cache over either of them
//!
//! # Usage
//!
//! ```no_run
//! use std::path::Path;
//! use triedb::storage::{CacheStorage, FileStorage, Storage};
//!
//! let file = FileStorage::open_or_create(Path::new("data.trie"))?;
//! let mut cache = CacheStorage::new(file);
//!
//! let offset = cache.write_to_end(b"hello")?;
//! assert_eq!(cache.read_vec(offset, 5)?, b"hello");
//!
//! // Nothing is on disk until the cache is flushed
//! cache.flush()?;
//! # Ok::<(), triedb::storage::StorageError>(())
//! ```

mod buffer_pool;
mod cache;
mod file;
mod io;
pub(crate) mod memory;
mod page;

pub use buffer_pool::{BufferPool, DEFAULT_POOL_CAPACITY};
pub use cache::CacheStorage;
pub use file::FileStorage;
pub use io::{Storage, StorageError};
pub use memory::{FaultConfig, MemoryStorage, MemoryStorageStats};
pub use page::{CachePage, DEFAULT_PAGE_SIZE, PageId};
