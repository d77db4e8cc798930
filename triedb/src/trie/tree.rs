//! Radix trie over byte storage.
//!
//! Every operation walks from the root node at a fixed offset. At depth `d`
//! the walk either stops at the node's internal link (the key is exactly `d`
//! bytes long) or follows the external link labelled `key[d]`. A node link
//! descends one level; a value link ends the walk at a record whose stored
//! key decides whether the lookup matched.
//!
//! A value link can sit at any depth: a key is stored as high in the trie as
//! its prefix is unique. Inserting a second key under the same label promotes
//! the link to a node, and deleting down to one remaining value collapses the
//! node back into its parent's link.

use crate::storage::{Storage, StorageError};
use crate::trie::header::{Header, HeaderError};
use crate::trie::iter::RowIter;
use crate::trie::layout::{DEFAULT_POINTER_LEN, HEADER_SIZE, Layout, MAX_LINKS, ROOT_OFFSET};
use crate::trie::link::{Link, LinkKind};
use crate::trie::node::{Node, NodeIo};
use crate::trie::node_cache::{NodeCache, RelocationObserver};
use crate::trie::value::{MAX_KEY_LEN, MAX_VALUE_LEN, ValueRecord};

/// Options for creating or opening a trie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrieOptions {
    /// Pointer width for a new file. Ignored by `open`, which uses the width
    /// recorded in the header.
    pub pointer_len: u8,
    /// Re-read every mutated node and compare it with the in-memory copy.
    pub consistency_check: bool,
    /// Keep up to this many decoded nodes in memory.
    pub node_cache_capacity: Option<usize>,
}

impl Default for TrieOptions {
    fn default() -> Self {
        Self {
            pointer_len: DEFAULT_POINTER_LEN,
            consistency_check: false,
            node_cache_capacity: None,
        }
    }
}

/// Location of a stored key and its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub key: Vec<u8>,
    /// Storage offset of the value record.
    pub pointer: u64,
    /// Storage offset of the first value byte.
    pub value_pointer: u64,
    pub value_len: u32,
}

impl From<ValueRecord> for Row {
    fn from(record: ValueRecord) -> Self {
        Self {
            value_pointer: record.value_pointer(),
            pointer: record.pointer,
            value_len: record.value_len,
            key: record.key,
        }
    }
}

/// Where a walk for a search key stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BestMatch {
    /// Deepest node reached.
    pub node_offset: u64,
    /// Depth of that node.
    pub depth: usize,
    /// The value link the walk stopped at, if it stopped at one.
    pub value_link: Option<Link>,
    /// Whether the value behind `value_link` is stored under exactly the
    /// search key.
    pub exact: bool,
}

impl BestMatch {
    /// The walk ended inside the structure without reaching a value.
    #[must_use]
    pub const fn is_structural(&self) -> bool {
        self.value_link.is_none()
    }
}

/// A node on the walk and the label followed out of it.
#[derive(Debug, Clone, Copy)]
struct PathStep {
    offset: u64,
    depth: usize,
    label: u8,
}

/// An on-disk radix trie.
///
/// `S` is usually a `CacheStorage` over a `FileStorage`. Nothing is durable
/// until the storage is flushed.
pub struct Trie<S: Storage> {
    storage: S,
    layout: Layout,
    header: Header,
    consistency_check: bool,
    node_cache: Option<NodeCache>,
}

impl<S: Storage> Trie<S> {
    /// Create a trie in empty storage: write the header and the root node.
    pub fn init(mut storage: S, options: TrieOptions) -> Result<Self, TrieError> {
        if !storage.is_empty() {
            return Err(TrieError::AlreadyInitialized);
        }
        let layout = Layout::new(options.pointer_len)
            .ok_or(HeaderError::InvalidPointerLen(options.pointer_len))?;

        let header = Header::new(options.pointer_len);
        storage.write_to_end(&header.to_bytes())?;
        let root = Node::empty_image(layout, MAX_LINKS)?;
        let root_offset = storage.write_to_end(&root)?;
        debug_assert_eq!(root_offset, ROOT_OFFSET);

        tracing::info!(pointer_len = options.pointer_len, "initialized trie");
        Ok(Self::assemble(storage, layout, header, options))
    }

    /// Open an existing trie, validating its header.
    pub fn open(mut storage: S, options: TrieOptions) -> Result<Self, TrieError> {
        if storage.len() < HEADER_SIZE {
            return Err(TrieError::Corrupted(format!(
                "storage of {} bytes has no header",
                storage.len()
            )));
        }
        let mut buf = [0u8; HEADER_SIZE as usize];
        storage.read(0, &mut buf)?;
        let header = Header::from_bytes(&buf)?;
        let layout = Layout::new(header.pointer_len)
            .ok_or(HeaderError::InvalidPointerLen(header.pointer_len))?;

        if storage.len() < ROOT_OFFSET + layout.root_size() as u64 {
            return Err(TrieError::Corrupted(
                "storage ends inside the root node".to_string(),
            ));
        }

        tracing::info!(
            records = header.record_count,
            pointer_len = header.pointer_len,
            "opened trie"
        );
        Ok(Self::assemble(storage, layout, header, options))
    }

    /// `init` for empty storage, `open` otherwise.
    pub fn open_or_init(storage: S, options: TrieOptions) -> Result<Self, TrieError> {
        if storage.is_empty() {
            Self::init(storage, options)
        } else {
            Self::open(storage, options)
        }
    }

    fn assemble(storage: S, layout: Layout, header: Header, options: TrieOptions) -> Self {
        Self {
            storage,
            layout,
            header,
            consistency_check: options.consistency_check,
            node_cache: options.node_cache_capacity.map(NodeCache::new),
        }
    }

    /// Number of stored keys.
    #[must_use]
    pub const fn record_count(&self) -> u64 {
        self.header.record_count
    }

    #[must_use]
    pub const fn layout(&self) -> Layout {
        self.layout
    }

    pub const fn set_consistency_check(&mut self, enabled: bool) {
        self.consistency_check = enabled;
    }

    #[must_use]
    pub const fn consistency_check(&self) -> bool {
        self.consistency_check
    }

    /// Start caching up to `capacity` decoded nodes, replacing any existing
    /// node cache.
    pub fn activate_node_cache(&mut self, capacity: usize) {
        self.node_cache = Some(NodeCache::new(capacity));
    }

    pub fn deactivate_node_cache(&mut self) {
        self.node_cache = None;
    }

    #[must_use]
    pub const fn node_cache(&self) -> Option<&NodeCache> {
        self.node_cache.as_ref()
    }

    #[must_use]
    pub const fn storage(&self) -> &S {
        &self.storage
    }

    /// Direct access to the storage.
    ///
    /// Writing through it behind the trie's back invalidates the node cache;
    /// call `deactivate_node_cache` first if you do.
    pub const fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    /// Give the storage back. Pending writes are not flushed.
    pub fn into_storage(self) -> S {
        self.storage
    }

    /// Flush the storage.
    pub fn flush(&mut self) -> Result<(), TrieError> {
        self.storage.flush()?;
        Ok(())
    }

    /// Look up the value stored under `key`.
    pub fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>, TrieError> {
        match self.find_record(key)? {
            Some(record) => Ok(Some(record.read_value(&mut self.storage)?)),
            None => Ok(None),
        }
    }

    /// Look up where the value stored under `key` lives.
    pub fn get_row(&mut self, key: &[u8]) -> Result<Option<Row>, TrieError> {
        Ok(self.find_record(key)?.map(Row::from))
    }

    /// Read the value bytes of a row.
    pub fn read_row_value(&mut self, row: &Row) -> Result<Vec<u8>, TrieError> {
        Ok(self
            .storage
            .read_vec(row.value_pointer, row.value_len as usize)?)
    }

    /// Store `value` under `key`, replacing any previous value.
    pub fn set(&mut self, key: &[u8], value: &[u8]) -> Result<(), TrieError> {
        self.set_with_capacity(key, value, value.len())
    }

    /// Store `value` under `key`, reserving room for values up to `capacity`
    /// bytes so later writes can happen in place.
    ///
    /// An existing record is overwritten in place when its capacity covers
    /// both `value` and `capacity`. Otherwise the value moves to a new record
    /// with the requested capacity.
    pub fn set_with_capacity(
        &mut self,
        key: &[u8],
        value: &[u8],
        capacity: usize,
    ) -> Result<(), TrieError> {
        if key.len() > MAX_KEY_LEN {
            return Err(TrieError::KeyTooLong(key.len()));
        }
        let capacity = capacity.max(value.len());
        if capacity > MAX_VALUE_LEN {
            return Err(TrieError::ValueTooLong(capacity));
        }

        let mut parent: Option<PathStep> = None;
        let mut offset = ROOT_OFFSET;
        let mut depth = 0;
        loop {
            let mut node = self.load_node(offset, depth)?;

            if key.len() == depth {
                let inserted = node.internal_link().is_none();
                node.set_internal_value(&mut self.io(), key, value, capacity)?;
                self.store_node(&node)?;
                if inserted {
                    self.record_inserted()?;
                }
                return Ok(());
            }

            let label = key[depth];
            match node.link(label).copied() {
                Some(link) if link.is_node() => {
                    parent = Some(PathStep {
                        offset,
                        depth,
                        label,
                    });
                    offset = link.target;
                    depth += 1;
                }
                Some(link) => {
                    let existing = self.read_record(link.target)?;
                    if existing.key == key {
                        node.set_external_value(&mut self.io(), label, key, value, capacity)?;
                        self.store_node(&node)?;
                        return Ok(());
                    }
                    let child = node.set_value_link_to_node(&mut self.io(), label)?;
                    self.store_node(&node)?;
                    parent = Some(PathStep {
                        offset,
                        depth,
                        label,
                    });
                    offset = child.target;
                    depth += 1;
                }
                None => {
                    let relocated =
                        node.set_external_value(&mut self.io(), label, key, value, capacity)?;
                    self.store_node(&node)?;
                    if relocated {
                        self.relink(parent, node.own_offset())?;
                    }
                    self.record_inserted()?;
                    return Ok(());
                }
            }
        }
    }

    /// Remove `key`. Returns whether it was present.
    pub fn delete(&mut self, key: &[u8]) -> Result<bool, TrieError> {
        let mut path = Vec::new();
        let mut offset = ROOT_OFFSET;
        let mut depth = 0;
        loop {
            let mut node = self.load_node(offset, depth)?;

            let removed = if key.len() == depth {
                node.remove_internal_link(&mut self.io())?
            } else {
                let label = key[depth];
                match node.link(label).copied() {
                    None => false,
                    Some(link) if link.is_node() => {
                        path.push(PathStep {
                            offset,
                            depth,
                            label,
                        });
                        offset = link.target;
                        depth += 1;
                        continue;
                    }
                    Some(link) => {
                        let record = self.read_record(link.target)?;
                        record.key == key && node.remove_external_link(&mut self.io(), label)?
                    }
                }
            };

            if !removed {
                return Ok(false);
            }
            self.store_node(&node)?;
            // A fresh decode sees the zeroed slot as free
            if let Some(cache) = &mut self.node_cache {
                cache.remove(node.own_offset());
            }
            self.record_removed()?;
            self.collapse(node, path)?;
            return Ok(true);
        }
    }

    /// Walk towards `prefix` and report where the walk stopped.
    pub fn find_best_match(&mut self, prefix: &[u8]) -> Result<BestMatch, TrieError> {
        let mut offset = ROOT_OFFSET;
        let mut depth = 0;
        loop {
            let node = self.load_node(offset, depth)?;
            let link = if prefix.len() == depth {
                node.internal_link().copied()
            } else {
                node.link(prefix[depth]).copied()
            };

            let exact = match link {
                Some(link) if link.is_node() => {
                    offset = link.target;
                    depth += 1;
                    continue;
                }
                Some(link) => self.read_record(link.target)?.key == prefix,
                None => false,
            };
            return Ok(BestMatch {
                node_offset: offset,
                depth,
                value_link: link,
                exact,
            });
        }
    }

    /// Iterate over every row whose key starts with `prefix`, sorted by key.
    pub fn enumerate_starting_with(&mut self, prefix: &[u8]) -> RowIter<'_, S> {
        RowIter::new(self, prefix)
    }

    /// Decode the node at `offset`, from the node cache if possible.
    pub(crate) fn load_node(&mut self, offset: u64, depth: usize) -> Result<Node, TrieError> {
        if let Some(cache) = &mut self.node_cache
            && let Some(node) = cache.get(offset)
        {
            return Ok(node.clone());
        }
        let node = Node::read(&mut self.storage, self.layout, offset, depth)?;
        if let Some(cache) = &mut self.node_cache {
            cache.insert(node.clone());
        }
        Ok(node)
    }

    pub(crate) fn read_record(&mut self, pointer: u64) -> Result<ValueRecord, TrieError> {
        ValueRecord::read(&mut self.storage, pointer)
    }

    /// The record stored under exactly `key`.
    fn find_record(&mut self, key: &[u8]) -> Result<Option<ValueRecord>, TrieError> {
        let mut offset = ROOT_OFFSET;
        let mut depth = 0;
        loop {
            let node = self.load_node(offset, depth)?;
            let link = if key.len() == depth {
                node.internal_link().copied()
            } else {
                node.link(key[depth]).copied()
            };
            match link {
                None => return Ok(None),
                Some(link) if link.is_node() => {
                    offset = link.target;
                    depth += 1;
                }
                Some(link) => {
                    let record = self.read_record(link.target)?;
                    return Ok((record.key == key).then_some(record));
                }
            }
        }
    }

    fn io(&mut self) -> NodeIo<'_, S> {
        NodeIo::new(&mut self.storage, self.layout).with_observer(
            self.node_cache
                .as_mut()
                .map(|cache| cache as &mut dyn RelocationObserver),
        )
    }

    /// Finish a mutation of `node`: verify it if enabled and refresh its
    /// cache entry.
    fn store_node(&mut self, node: &Node) -> Result<(), TrieError> {
        if self.consistency_check {
            node.check_consistency(&mut self.storage, self.layout)?;
        }
        if let Some(cache) = &mut self.node_cache {
            cache.insert(node.clone());
        }
        Ok(())
    }

    /// Point the parent's link at a node that moved to `new_offset`.
    fn relink(&mut self, parent: Option<PathStep>, new_offset: u64) -> Result<(), TrieError> {
        let Some(step) = parent else {
            return Err(TrieError::Corrupted("root node relocated".to_string()));
        };
        let mut node = self.load_node(step.offset, step.depth)?;
        node.update_external_link(&mut self.io(), step.label, LinkKind::Node, new_offset)?;
        self.store_node(&node)
    }

    /// Fold nodes left holding a single value into their parents' links,
    /// working up `path` from `node`.
    fn collapse(&mut self, node: Node, mut path: Vec<PathStep>) -> Result<(), TrieError> {
        let mut node = node;
        while let Some(step) = path.pop() {
            let Some(survivor) = node.remaining_value_link() else {
                break;
            };
            let mut parent = self.load_node(step.offset, step.depth)?;
            parent.update_external_link(
                &mut self.io(),
                step.label,
                LinkKind::Value,
                survivor.target,
            )?;
            self.store_node(&parent)?;
            if let Some(cache) = &mut self.node_cache {
                cache.remove(node.own_offset());
            }
            tracing::debug!(
                node = node.own_offset(),
                parent = step.offset,
                "collapsed node into parent"
            );
            node = parent;
        }
        Ok(())
    }

    fn record_inserted(&mut self) -> Result<(), TrieError> {
        self.header.record_count += 1;
        self.write_header()
    }

    fn record_removed(&mut self) -> Result<(), TrieError> {
        self.header.record_count = self.header.record_count.saturating_sub(1);
        self.write_header()
    }

    fn write_header(&mut self) -> Result<(), TrieError> {
        self.storage.write(0, &self.header.to_bytes())?;
        Ok(())
    }
}

impl<S: Storage> std::fmt::Debug for Trie<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trie")
            .field("layout", &self.layout)
            .field("header", &self.header)
            .field("consistency_check", &self.consistency_check)
            .field("node_cache", &self.node_cache.as_ref().map(NodeCache::len))
            .finish_non_exhaustive()
    }
}

/// Errors that can occur during trie operations.
#[derive(Debug)]
pub enum TrieError {
    /// Storage I/O error.
    Storage(StorageError),
    /// The file header is invalid.
    Header(HeaderError),
    /// `init` was given storage that already holds data.
    AlreadyInitialized,
    /// Key longer than a record can hold.
    KeyTooLong(usize),
    /// Value (or requested capacity) longer than a record can hold.
    ValueTooLong(usize),
    /// The storage grew past what the pointer width can address.
    FileTooLarge {
        /// Offset the next append would have used.
        offset: u64,
        /// Largest offset a pointer can hold.
        max_pointer: u64,
    },
    /// A node operation was called in a state that does not allow it.
    InvalidOperation(&'static str),
    /// A node's in-memory links diverged from its encoded image.
    ///
    /// This is an invariant violation; the trie should not be used further.
    Inconsistent {
        /// Offset of the node.
        offset: u64,
        /// The first field found to differ.
        field: &'static str,
    },
    /// Stored bytes do not decode.
    Corrupted(String),
}

impl std::fmt::Display for TrieError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Storage(e) => write!(f, "storage error: {e}"),
            Self::Header(e) => write!(f, "header error: {e}"),
            Self::AlreadyInitialized => write!(f, "storage is not empty"),
            Self::KeyTooLong(len) => {
                write!(f, "key of {len} bytes exceeds maximum {MAX_KEY_LEN}")
            }
            Self::ValueTooLong(len) => {
                write!(f, "value of {len} bytes exceeds maximum {MAX_VALUE_LEN}")
            }
            Self::FileTooLarge {
                offset,
                max_pointer,
            } => write!(
                f,
                "offset {offset} is beyond the largest pointer {max_pointer}"
            ),
            Self::InvalidOperation(msg) => write!(f, "invalid operation: {msg}"),
            Self::Inconsistent { offset, field } => {
                write!(f, "node at {offset} is inconsistent: {field}")
            }
            Self::Corrupted(msg) => write!(f, "corrupted trie: {msg}"),
        }
    }
}

impl std::error::Error for TrieError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Storage(e) => Some(e),
            Self::Header(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StorageError> for TrieError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<HeaderError> for TrieError {
    fn from(e: HeaderError) -> Self {
        Self::Header(e)
    }
}
