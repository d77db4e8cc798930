//! File layout constants and fixed-width integer codecs.
//!
//! All multi-byte integers in the file are big-endian. Pointers (storage
//! offsets) are stored with a fixed width `P` chosen when the file is created
//! (5 bytes by default, enough for 1TB files).
//!
//! File layout:
//! - `[0, 64)`: header (see `header.rs`)
//! - `[64, 64 + root size)`: root node with 256 link slots
//! - everything after: nodes and value records, appended in write order

// Widths are at most 8 and node sizes at most a few KB.
#![allow(clippy::cast_possible_truncation)]

use crate::trie::tree::TrieError;

/// Default pointer width in bytes.
pub const DEFAULT_POINTER_LEN: u8 = 5;

/// Smallest pointer width that can still address the root node.
pub const MIN_POINTER_LEN: u8 = 2;

/// Largest pointer width (a full u64).
pub const MAX_POINTER_LEN: u8 = 8;

/// Size of the reserved region at the start of the file.
pub const HEADER_SIZE: u64 = 64;

/// Offset of the root node.
pub const ROOT_OFFSET: u64 = HEADER_SIZE;

/// A node has at most one link per byte value.
pub const MAX_LINKS: usize = 256;

/// Size of the line-length prefix of a node.
pub const LINE_LEN_SIZE: usize = 2;

/// Number of link slots reserved for a node that needs `needed` of them.
///
/// Slots come in tiers of 1, 2, 4, 8, ... 256 so that a node grows by
/// relocation only a logarithmic number of times.
pub fn reserved_slots(needed: usize) -> Result<usize, TrieError> {
    match needed {
        0..=1 => Ok(1),
        2 => Ok(2),
        3..=4 => Ok(4),
        5..=8 => Ok(8),
        9..=16 => Ok(16),
        17..=32 => Ok(32),
        33..=64 => Ok(64),
        65..=128 => Ok(128),
        129..=MAX_LINKS => Ok(256),
        _ => Err(TrieError::InvalidOperation(
            "a node holds at most 256 external links",
        )),
    }
}

/// Read a big-endian unsigned integer spanning all of `bytes` (at most 8).
#[must_use]
pub fn read_uint(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
}

/// Write `value` big-endian into all of `out` (at most 8 bytes).
///
/// High bytes that do not fit are dropped; callers check the range first.
pub fn write_uint(out: &mut [u8], value: u64) {
    let mut value = value;
    for byte in out.iter_mut().rev() {
        *byte = value as u8;
        value >>= 8;
    }
}

/// Engine-wide sizes derived from the pointer width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pointer_len: usize,
}

impl Layout {
    /// Create a layout for the given pointer width.
    ///
    /// Returns `None` if the width is outside `2..=8`.
    #[must_use]
    pub const fn new(pointer_len: u8) -> Option<Self> {
        if pointer_len < MIN_POINTER_LEN || pointer_len > MAX_POINTER_LEN {
            return None;
        }
        Some(Self {
            pointer_len: pointer_len as usize,
        })
    }

    /// Pointer width in bytes.
    #[must_use]
    pub const fn pointer_len(self) -> usize {
        self.pointer_len
    }

    /// Size of one external link slot: label, kind, pointer.
    #[must_use]
    pub const fn external_link_len(self) -> usize {
        2 + self.pointer_len
    }

    /// Size in bytes of a node with `reserved_slots` link slots.
    #[must_use]
    pub const fn node_size(self, reserved_slots: usize) -> usize {
        LINE_LEN_SIZE + self.pointer_len + reserved_slots * self.external_link_len()
    }

    /// Size in bytes of the root node.
    #[must_use]
    pub const fn root_size(self) -> usize {
        self.node_size(MAX_LINKS)
    }

    /// Largest offset a pointer can hold.
    #[must_use]
    pub const fn max_pointer(self) -> u64 {
        if self.pointer_len >= 8 {
            u64::MAX
        } else {
            (1u64 << (8 * self.pointer_len)) - 1
        }
    }

    /// Decode a pointer from the first `pointer_len` bytes of `bytes`.
    #[must_use]
    pub fn read_pointer(self, bytes: &[u8]) -> u64 {
        read_uint(&bytes[..self.pointer_len])
    }

    /// Encode a pointer into the first `pointer_len` bytes of `out`.
    pub fn write_pointer(self, out: &mut [u8], pointer: u64) {
        write_uint(&mut out[..self.pointer_len], pointer);
    }
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            pointer_len: DEFAULT_POINTER_LEN as usize,
        }
    }
}
