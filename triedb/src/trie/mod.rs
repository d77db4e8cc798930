//! On-disk radix trie.
//!
//! This module maps byte-string keys to byte-string values inside a single
//! flat storage.
//!
//! # Structure
//!
//! The trie consists of:
//! - A 64-byte header: magic, format version, pointer width, record count
//! - A root node with a slot for every possible first byte
//! - Nodes: an optional internal link plus label-indexed external links
//! - Value records: the full key and a value region with spare capacity
//!
//! Nodes reserve slots in power-of-two tiers and relocate to the end of the
//! storage when they outgrow them. Nothing is ever freed.
//!
//! # Usage
//!
//! ```
//! use triedb::storage::{CacheStorage, MemoryStorage};
//! use triedb::trie::{Trie, TrieOptions};
//!
//! let storage = CacheStorage::new(MemoryStorage::new());
//! let mut trie = Trie::init(storage, TrieOptions::default())?;
//!
//! trie.set(b"@utOrders", b"10000001")?;
//! trie.set(b"@utCustomers", b"10000002")?;
//! assert_eq!(trie.get(b"@utOrders")?, Some(b"10000001".to_vec()));
//!
//! let tables: Vec<_> = trie
//!     .enumerate_starting_with(b"@ut")
//!     .map(|row| row.map(|row| row.key))
//!     .collect::<Result<_, _>>()?;
//! assert_eq!(tables, vec![b"@utCustomers".to_vec(), b"@utOrders".to_vec()]);
//! # Ok::<(), triedb::trie::TrieError>(())
//! ```

mod header;
mod iter;
mod layout;
mod link;
mod node;
mod node_cache;
mod tree;
mod value;

pub use header::{FORMAT_VERSION, Header, HeaderError, MAGIC};
pub use iter::RowIter;
pub use layout::{DEFAULT_POINTER_LEN, HEADER_SIZE, Layout, MAX_LINKS, ROOT_OFFSET, reserved_slots};
pub use link::{Link, LinkKind};
pub use node::{Node, NodeIo};
pub use node_cache::{NodeCache, NodeCacheStats, RelocationObserver};
pub use tree::{BestMatch, Row, Trie, TrieError, TrieOptions};
pub use value::{MAX_KEY_LEN, MAX_VALUE_LEN, RECORD_HEADER_SIZE, ValueRecord};
