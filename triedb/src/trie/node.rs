//! Trie node format and mutation.
//!
//! A node lives at a fixed storage offset and covers every key sharing the
//! path from the root to it. Its depth (`min_key_len`) is the number of key
//! bytes consumed to reach it.
//!
//! Node layout (big-endian, `P` = pointer width):
//! - `[0, 2)`: line length, the number of bytes that follow
//! - `[2, 2 + P)`: internal link target, 0 if absent
//! - then `reserved_slots` entries of `label (1) | kind (1) | target (P)`
//!
//! # Design
//!
//! - Every mutation writes storage first and then updates the in-memory copy,
//!   so a node that returns an error never describes bytes that were not
//!   written
//! - New bytes (records, child nodes, relocated images) are appended before
//!   the single pointer that makes them reachable is rewritten
//! - A node that runs out of slots relocates: a larger image is appended and
//!   the old bytes are abandoned
//!
//! # Invariants
//!
//! - `external_links` and `internal_link` mirror the encoded image
//! - Every queued free slot lies inside the current image and holds no link
//! - The reserved slot count is one of 1, 2, 4, ... 256

// Node images are at most a few KB.
#![allow(clippy::cast_possible_truncation)]

use std::collections::{BTreeMap, VecDeque};

use crate::storage::Storage;
use crate::trie::layout::{LINE_LEN_SIZE, Layout, reserved_slots};
use crate::trie::link::{Link, LinkKind};
use crate::trie::node_cache::RelocationObserver;
use crate::trie::tree::TrieError;
use crate::trie::value::ValueRecord;

/// The storage, layout and relocation listener a node mutation needs.
pub struct NodeIo<'a, S: Storage + ?Sized> {
    storage: &'a mut S,
    layout: Layout,
    observer: Option<&'a mut dyn RelocationObserver>,
}

impl<'a, S: Storage + ?Sized> NodeIo<'a, S> {
    pub fn new(storage: &'a mut S, layout: Layout) -> Self {
        Self {
            storage,
            layout,
            observer: None,
        }
    }

    /// Report relocations to `observer`.
    #[must_use]
    pub fn with_observer(mut self, observer: Option<&'a mut dyn RelocationObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub const fn layout(&self) -> Layout {
        self.layout
    }

    /// Append `bytes` at the end of storage, refusing offsets a pointer
    /// cannot hold.
    fn append(&mut self, bytes: &[u8]) -> Result<u64, TrieError> {
        let offset = self.storage.len();
        let max_pointer = self.layout.max_pointer();
        if offset > max_pointer {
            return Err(TrieError::FileTooLarge {
                offset,
                max_pointer,
            });
        }
        Ok(self.storage.write_to_end(bytes)?)
    }

    fn append_record(
        &mut self,
        key: &[u8],
        value: &[u8],
        capacity: usize,
    ) -> Result<u64, TrieError> {
        let record = ValueRecord::encode(key, value, capacity)?;
        self.append(&record)
    }

    fn read_record(&mut self, pointer: u64) -> Result<ValueRecord, TrieError> {
        ValueRecord::read(&mut *self.storage, pointer)
    }

    fn try_overwrite(
        &mut self,
        pointer: u64,
        value: &[u8],
        capacity: usize,
    ) -> Result<bool, TrieError> {
        ValueRecord::try_overwrite(&mut *self.storage, pointer, value, capacity)
    }

    fn write_pointer(&mut self, offset: u64, target: u64) -> Result<(), TrieError> {
        let mut buf = [0u8; 8];
        self.layout.write_pointer(&mut buf, target);
        self.storage
            .write(offset, &buf[..self.layout.pointer_len()])?;
        Ok(())
    }

    fn write_external_link(
        &mut self,
        slot_offset: u64,
        label: u8,
        kind: LinkKind,
        target: u64,
    ) -> Result<(), TrieError> {
        let mut entry = [0u8; 10];
        encode_entry(self.layout, &mut entry, label, kind, target);
        self.storage
            .write(slot_offset, &entry[..self.layout.external_link_len()])?;
        Ok(())
    }

    fn notify_relocation(&mut self, old_offset: u64, new_offset: u64) {
        if let Some(observer) = &mut self.observer {
            observer.on_relocate(old_offset, new_offset);
        }
    }
}

fn encode_entry(layout: Layout, out: &mut [u8], label: u8, kind: LinkKind, target: u64) {
    out[0] = label;
    out[1] = kind.to_byte();
    layout.write_pointer(&mut out[2..], target);
}

/// A decoded trie node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    own_offset: u64,
    min_key_len: usize,
    /// Bytes after the length prefix: internal pointer plus every slot.
    line_len: usize,
    slot_count: usize,
    internal_link: Option<Link>,
    external_links: BTreeMap<u8, Link>,
    /// Offsets of slots that can take a new link, lowest first.
    free_slots: VecDeque<u64>,
}

impl Node {
    /// A zeroed node image with room for `needed` external links.
    pub fn empty_image(layout: Layout, needed: usize) -> Result<Vec<u8>, TrieError> {
        let size = layout.node_size(reserved_slots(needed)?);
        let mut image = vec![0u8; size];
        let line_len = (size - LINE_LEN_SIZE) as u16;
        image[..LINE_LEN_SIZE].copy_from_slice(&line_len.to_be_bytes());
        Ok(image)
    }

    /// Read and decode the node at `offset`.
    pub fn read<S: Storage + ?Sized>(
        storage: &mut S,
        layout: Layout,
        offset: u64,
        min_key_len: usize,
    ) -> Result<Self, TrieError> {
        let mut prefix = [0u8; LINE_LEN_SIZE];
        storage.read(offset, &mut prefix)?;
        let line_len = usize::from(u16::from_be_bytes(prefix));
        let bytes = storage.read_vec(offset, LINE_LEN_SIZE + line_len)?;
        Self::decode(layout, offset, min_key_len, &bytes)
    }

    /// Decode a node image located at `own_offset`.
    ///
    /// Slots with a zero target are free. A slot repeating an earlier label is
    /// treated as free too.
    pub fn decode(
        layout: Layout,
        own_offset: u64,
        min_key_len: usize,
        bytes: &[u8],
    ) -> Result<Self, TrieError> {
        let pointer_len = layout.pointer_len();
        let link_len = layout.external_link_len();
        if bytes.len() < LINE_LEN_SIZE {
            return Err(corrupted_node(own_offset, "truncated length prefix"));
        }
        let line_len = usize::from(u16::from_be_bytes([bytes[0], bytes[1]]));
        if line_len < pointer_len
            || (line_len - pointer_len) % link_len != 0
            || bytes.len() < LINE_LEN_SIZE + line_len
        {
            return Err(corrupted_node(own_offset, "bad line length"));
        }

        let internal_target = layout.read_pointer(&bytes[LINE_LEN_SIZE..]);
        let internal_link = (internal_target != 0).then_some(Link {
            label: None,
            target: internal_target,
            own_offset: own_offset + LINE_LEN_SIZE as u64,
            kind: LinkKind::Value,
        });

        let first_slot = LINE_LEN_SIZE + pointer_len;
        let slots = &bytes[first_slot..LINE_LEN_SIZE + line_len];
        let mut external_links = BTreeMap::new();
        let mut free_slots = VecDeque::new();
        for (i, entry) in slots.chunks_exact(link_len).enumerate() {
            let slot_offset = own_offset + (first_slot + i * link_len) as u64;
            let label = entry[0];
            let target = layout.read_pointer(&entry[2..]);
            if target == 0 || external_links.contains_key(&label) {
                free_slots.push_back(slot_offset);
                continue;
            }
            external_links.insert(
                label,
                Link {
                    label: Some(label),
                    target,
                    own_offset: slot_offset,
                    kind: LinkKind::from_byte(entry[1]),
                },
            );
        }

        Ok(Self {
            own_offset,
            min_key_len,
            line_len,
            slot_count: (line_len - pointer_len) / link_len,
            internal_link,
            external_links,
            free_slots,
        })
    }

    #[must_use]
    pub const fn own_offset(&self) -> u64 {
        self.own_offset
    }

    /// Depth of the node: the key length consumed to reach it.
    #[must_use]
    pub const fn min_key_len(&self) -> usize {
        self.min_key_len
    }

    #[must_use]
    pub const fn line_len(&self) -> usize {
        self.line_len
    }

    /// Number of external link slots in the image.
    #[must_use]
    pub const fn slot_count(&self) -> usize {
        self.slot_count
    }

    #[must_use]
    pub const fn internal_link(&self) -> Option<&Link> {
        self.internal_link.as_ref()
    }

    /// The external link for `label`, if any.
    #[must_use]
    pub fn link(&self, label: u8) -> Option<&Link> {
        self.external_links.get(&label)
    }

    /// External links in ascending label order.
    pub fn external_links(&self) -> impl DoubleEndedIterator<Item = &Link> {
        self.external_links.values()
    }

    #[must_use]
    pub fn external_link_count(&self) -> usize {
        self.external_links.len()
    }

    #[must_use]
    pub fn free_slot_count(&self) -> usize {
        self.free_slots.len()
    }

    /// Store `value` as the value whose key ends at this node.
    pub fn set_internal_value<S: Storage + ?Sized>(
        &mut self,
        io: &mut NodeIo<'_, S>,
        key: &[u8],
        value: &[u8],
        capacity: usize,
    ) -> Result<(), TrieError> {
        if let Some(link) = self.internal_link
            && io.try_overwrite(link.target, value, capacity)?
        {
            return Ok(());
        }
        let pointer = io.append_record(key, value, capacity)?;
        let own_offset = self.own_offset + LINE_LEN_SIZE as u64;
        io.write_pointer(own_offset, pointer)?;
        self.internal_link = Some(Link {
            label: None,
            target: pointer,
            own_offset,
            kind: LinkKind::Value,
        });
        Ok(())
    }

    /// Store `value` behind the external link `label`.
    ///
    /// An existing value link is overwritten in place when the value fits,
    /// otherwise repointed at a new record. A new link takes a free slot,
    /// relocating the node first if there is none.
    ///
    /// Returns `true` if the node relocated, in which case the caller must
    /// repoint the parent's link at `own_offset()`.
    pub fn set_external_value<S: Storage + ?Sized>(
        &mut self,
        io: &mut NodeIo<'_, S>,
        label: u8,
        key: &[u8],
        value: &[u8],
        capacity: usize,
    ) -> Result<bool, TrieError> {
        if let Some(link) = self.external_links.get(&label).copied() {
            if link.is_node() {
                return Err(TrieError::InvalidOperation(
                    "cannot store a value over a node link",
                ));
            }
            if !io.try_overwrite(link.target, value, capacity)? {
                let pointer = io.append_record(key, value, capacity)?;
                self.update_external_link(io, label, LinkKind::Value, pointer)?;
            }
            return Ok(false);
        }

        let relocated = self.free_slots.is_empty();
        if relocated {
            self.relocate(io, self.external_links.len() + 1)?;
        }
        let slot_offset = *self
            .free_slots
            .front()
            .ok_or(TrieError::InvalidOperation("relocation left no free slot"))?;

        let pointer = io.append_record(key, value, capacity)?;
        io.write_external_link(slot_offset, label, LinkKind::Value, pointer)?;
        self.free_slots.pop_front();
        self.external_links.insert(
            label,
            Link {
                label: Some(label),
                target: pointer,
                own_offset: slot_offset,
                kind: LinkKind::Value,
            },
        );
        Ok(relocated)
    }

    /// Rewrite the target and kind of the existing external link `label`.
    pub fn update_external_link<S: Storage + ?Sized>(
        &mut self,
        io: &mut NodeIo<'_, S>,
        label: u8,
        kind: LinkKind,
        target: u64,
    ) -> Result<(), TrieError> {
        let link = self
            .external_links
            .get_mut(&label)
            .ok_or(TrieError::InvalidOperation("no link with this label"))?;
        io.write_external_link(link.own_offset, label, kind, target)?;
        link.kind = kind;
        link.target = target;
        Ok(())
    }

    /// Move the node to a new image at the end of storage with room for
    /// `needed` external links.
    ///
    /// Links keep their relative order; slots after the last link become the
    /// free slots.
    pub fn relocate<S: Storage + ?Sized>(
        &mut self,
        io: &mut NodeIo<'_, S>,
        needed: usize,
    ) -> Result<(), TrieError> {
        let layout = io.layout();
        let link_len = layout.external_link_len();
        let first_slot = LINE_LEN_SIZE + layout.pointer_len();
        let slot_count = reserved_slots(needed)?;
        if slot_count < self.external_links.len() {
            return Err(TrieError::InvalidOperation(
                "relocation target is smaller than the node",
            ));
        }

        let mut image = Self::empty_image(layout, needed)?;
        if let Some(internal) = self.internal_link {
            layout.write_pointer(&mut image[LINE_LEN_SIZE..], internal.target);
        }
        let mut order: Vec<(u8, Link)> = self
            .external_links
            .iter()
            .map(|(&label, &link)| (label, link))
            .collect();
        order.sort_by_key(|(_, link)| link.own_offset);
        for (i, (label, link)) in order.iter().enumerate() {
            let at = first_slot + i * link_len;
            encode_entry(layout, &mut image[at..], *label, link.kind, link.target);
        }

        let old_offset = self.own_offset;
        let new_offset = io.append(&image)?;
        let slot_offset = |i: usize| new_offset + (first_slot + i * link_len) as u64;

        self.own_offset = new_offset;
        self.line_len = image.len() - LINE_LEN_SIZE;
        self.slot_count = slot_count;
        if let Some(internal) = &mut self.internal_link {
            internal.own_offset = new_offset + LINE_LEN_SIZE as u64;
        }
        for (i, (label, _)) in order.iter().enumerate() {
            if let Some(link) = self.external_links.get_mut(label) {
                link.own_offset = slot_offset(i);
            }
        }
        self.free_slots = (order.len()..slot_count).map(slot_offset).collect();

        io.notify_relocation(old_offset, new_offset);
        tracing::debug!(old_offset, new_offset, slot_count, "relocated node");
        Ok(())
    }

    /// Turn the value link `label` into a link to a new child node that holds
    /// the same value.
    ///
    /// The child is one level deeper. If the stored key ends exactly there it
    /// becomes the child's internal link, otherwise the child's only external
    /// link, labelled with the key's next byte.
    pub fn set_value_link_to_node<S: Storage + ?Sized>(
        &mut self,
        io: &mut NodeIo<'_, S>,
        label: u8,
    ) -> Result<Link, TrieError> {
        let link = *self
            .external_links
            .get(&label)
            .ok_or(TrieError::InvalidOperation("no link with this label"))?;
        if link.is_node() {
            return Err(TrieError::InvalidOperation(
                "link already points to a node",
            ));
        }

        let layout = io.layout();
        let record = io.read_record(link.target)?;
        let child_depth = self.min_key_len + 1;
        let image = if record.key.len() == child_depth {
            let mut image = Self::empty_image(layout, 1)?;
            layout.write_pointer(&mut image[LINE_LEN_SIZE..], record.pointer);
            image
        } else {
            let next = record.key.get(child_depth).copied().ok_or_else(|| {
                TrieError::Corrupted(format!(
                    "value record at {} is shorter than its trie path",
                    record.pointer
                ))
            })?;
            let mut image = Self::empty_image(layout, 2)?;
            let first_slot = LINE_LEN_SIZE + layout.pointer_len();
            encode_entry(
                layout,
                &mut image[first_slot..],
                next,
                LinkKind::Value,
                record.pointer,
            );
            image
        };

        let child_offset = io.append(&image)?;
        self.update_external_link(io, label, LinkKind::Node, child_offset)?;
        tracing::trace!(
            node = self.own_offset,
            label,
            child_offset,
            "promoted value link"
        );
        Ok(Link {
            target: child_offset,
            kind: LinkKind::Node,
            ..link
        })
    }

    /// Unlink the internal value. Returns whether there was one.
    pub fn remove_internal_link<S: Storage + ?Sized>(
        &mut self,
        io: &mut NodeIo<'_, S>,
    ) -> Result<bool, TrieError> {
        let Some(link) = self.internal_link else {
            return Ok(false);
        };
        io.write_pointer(link.own_offset, 0)?;
        self.internal_link = None;
        Ok(true)
    }

    /// Unlink the external value `label`. Returns whether there was one.
    ///
    /// The zeroed slot is not queued as free; it becomes reusable once the
    /// node is decoded again.
    pub fn remove_external_link<S: Storage + ?Sized>(
        &mut self,
        io: &mut NodeIo<'_, S>,
        label: u8,
    ) -> Result<bool, TrieError> {
        let Some(link) = self.external_links.get(&label).copied() else {
            return Ok(false);
        };
        if link.is_node() {
            return Err(TrieError::InvalidOperation("cannot remove a node link"));
        }
        io.write_external_link(link.own_offset, 0, LinkKind::Value, 0)?;
        self.external_links.remove(&label);
        Ok(true)
    }

    /// The only link left in the node, if it has no internal link and a
    /// single external link that points at a value.
    #[must_use]
    pub fn remaining_value_link(&self) -> Option<Link> {
        if self.internal_link.is_some() || self.external_links.len() != 1 {
            return None;
        }
        self.external_links
            .values()
            .next()
            .copied()
            .filter(Link::is_value)
    }

    /// Re-read the node from storage and compare it with this copy.
    pub fn check_consistency<S: Storage + ?Sized>(
        &self,
        storage: &mut S,
        layout: Layout,
    ) -> Result<(), TrieError> {
        let stored = Self::read(storage, layout, self.own_offset, self.min_key_len)?;
        let mismatch = |field| TrieError::Inconsistent {
            offset: self.own_offset,
            field,
        };

        if stored.external_links.len() != self.external_links.len() {
            return Err(mismatch("external link count"));
        }
        if stored.internal_link.map(|l| l.target) != self.internal_link.map(|l| l.target) {
            return Err(mismatch("internal link"));
        }
        for (label, link) in &self.external_links {
            let Some(other) = stored.external_links.get(label) else {
                return Err(mismatch("external link label"));
            };
            if other.own_offset != link.own_offset {
                return Err(mismatch("external link offset"));
            }
            if other.target != link.target {
                return Err(mismatch("external link target"));
            }
            if other.kind != link.kind {
                return Err(mismatch("external link kind"));
            }
        }
        Ok(())
    }
}

fn corrupted_node(offset: u64, reason: &str) -> TrieError {
    TrieError::Corrupted(format!("node at {offset}: {reason}"))
}
