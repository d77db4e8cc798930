//! Value record codec.
//!
//! A value record stores a full key together with its value so that a lookup
//! can confirm the key after following a link. Records are append-only; a
//! record is rewritten in place only when the new value fits its capacity.
//!
//! Record layout (big-endian):
//! - `[0, 2)`: key length (u16)
//! - `[2, 6)`: capacity of the value region (u32)
//! - `[6, 10)`: current value length (u32)
//! - key bytes
//! - `capacity` bytes of value region, the first `value length` of which are
//!   the value

// Lengths are bounded by MAX_KEY_LEN and MAX_VALUE_LEN before narrowing.
#![allow(clippy::cast_possible_truncation)]

use crate::storage::Storage;
use crate::trie::tree::TrieError;

/// Size of the fixed record header.
pub const RECORD_HEADER_SIZE: usize = 10;

/// Longest key a record can hold.
pub const MAX_KEY_LEN: usize = u16::MAX as usize;

/// Longest value (and capacity) a record can hold.
pub const MAX_VALUE_LEN: usize = u32::MAX as usize;

const KEY_LEN: usize = 0;
const CAPACITY: usize = 2;
const VALUE_LEN: usize = 6;

/// The fixed-size front of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RecordHeader {
    key_len: u16,
    capacity: u32,
    value_len: u32,
}

impl RecordHeader {
    fn parse(buf: &[u8; RECORD_HEADER_SIZE]) -> Self {
        Self {
            key_len: u16::from_be_bytes([buf[KEY_LEN], buf[KEY_LEN + 1]]),
            capacity: u32::from_be_bytes([
                buf[CAPACITY],
                buf[CAPACITY + 1],
                buf[CAPACITY + 2],
                buf[CAPACITY + 3],
            ]),
            value_len: u32::from_be_bytes([
                buf[VALUE_LEN],
                buf[VALUE_LEN + 1],
                buf[VALUE_LEN + 2],
                buf[VALUE_LEN + 3],
            ]),
        }
    }

    fn read<S: Storage + ?Sized>(storage: &mut S, pointer: u64) -> Result<Self, TrieError> {
        let mut buf = [0u8; RECORD_HEADER_SIZE];
        storage.read(pointer, &mut buf)?;
        let header = Self::parse(&buf);
        if header.value_len > header.capacity {
            return Err(TrieError::Corrupted(format!(
                "value record at {pointer}: length {} exceeds capacity {}",
                header.value_len, header.capacity
            )));
        }
        Ok(header)
    }
}

/// A decoded value record, without its value bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueRecord {
    /// Storage offset of the record.
    pub pointer: u64,
    pub key: Vec<u8>,
    pub capacity: u32,
    pub value_len: u32,
}

impl ValueRecord {
    /// Encode a new record. `capacity` must be at least `value.len()`.
    pub fn encode(key: &[u8], value: &[u8], capacity: usize) -> Result<Vec<u8>, TrieError> {
        if key.len() > MAX_KEY_LEN {
            return Err(TrieError::KeyTooLong(key.len()));
        }
        if value.len() > MAX_VALUE_LEN || capacity > MAX_VALUE_LEN {
            return Err(TrieError::ValueTooLong(value.len().max(capacity)));
        }
        let capacity = capacity.max(value.len());

        let mut buf = vec![0u8; RECORD_HEADER_SIZE + key.len() + capacity];
        buf[KEY_LEN..KEY_LEN + 2].copy_from_slice(&(key.len() as u16).to_be_bytes());
        buf[CAPACITY..CAPACITY + 4].copy_from_slice(&(capacity as u32).to_be_bytes());
        buf[VALUE_LEN..VALUE_LEN + 4].copy_from_slice(&(value.len() as u32).to_be_bytes());
        let value_start = RECORD_HEADER_SIZE + key.len();
        buf[RECORD_HEADER_SIZE..value_start].copy_from_slice(key);
        buf[value_start..value_start + value.len()].copy_from_slice(value);
        Ok(buf)
    }

    /// Read the record at `pointer`, key included.
    pub fn read<S: Storage + ?Sized>(storage: &mut S, pointer: u64) -> Result<Self, TrieError> {
        let header = RecordHeader::read(storage, pointer)?;
        let key = storage.read_vec(
            pointer + RECORD_HEADER_SIZE as u64,
            usize::from(header.key_len),
        )?;
        Ok(Self {
            pointer,
            key,
            capacity: header.capacity,
            value_len: header.value_len,
        })
    }

    /// Storage offset of the first value byte.
    #[must_use]
    pub fn value_pointer(&self) -> u64 {
        self.pointer + (RECORD_HEADER_SIZE + self.key.len()) as u64
    }

    /// Read the current value bytes.
    pub fn read_value<S: Storage + ?Sized>(&self, storage: &mut S) -> Result<Vec<u8>, TrieError> {
        Ok(storage.read_vec(self.value_pointer(), self.value_len as usize)?)
    }

    /// Overwrite the value of the record at `pointer` if its capacity covers
    /// both `value` and the requested `capacity`. Returns `false`, without
    /// writing, if it does not.
    pub fn try_overwrite<S: Storage + ?Sized>(
        storage: &mut S,
        pointer: u64,
        value: &[u8],
        capacity: usize,
    ) -> Result<bool, TrieError> {
        let header = RecordHeader::read(storage, pointer)?;
        if value.len().max(capacity) > header.capacity as usize {
            return Ok(false);
        }
        let value_pointer = pointer + (RECORD_HEADER_SIZE + usize::from(header.key_len)) as u64;
        storage.write(value_pointer, value)?;
        storage.write(
            pointer + VALUE_LEN as u64,
            &(value.len() as u32).to_be_bytes(),
        )?;
        Ok(true)
    }
}
