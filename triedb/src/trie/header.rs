//! File header structure and serialization.
//!
//! The header occupies the first 64 bytes of the file and identifies it as a
//! trie file. It also records the pointer width every node in the file uses
//! and the number of stored records.

use crate::trie::layout::{HEADER_SIZE, Layout};

/// Magic number identifying a trie file: "LTRIEDB1"
pub const MAGIC: [u8; 8] = *b"LTRIEDB1";

/// Current format version.
pub const FORMAT_VERSION: u16 = 1;

/// Header size in bytes.
const SIZE: usize = HEADER_SIZE as usize;

/// Header field offsets.
mod offsets {
    pub const MAGIC: usize = 0;
    pub const FORMAT_VERSION: usize = 8;
    pub const POINTER_LEN: usize = 10;
    pub const RECORD_COUNT: usize = 16;
    // 24-59: reserved
    pub const CHECKSUM: usize = 60;
}

/// Metadata stored at the start of every trie file.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Header {
    /// Format version number.
    pub format_version: u16,
    /// Width in bytes of every stored pointer.
    pub pointer_len: u8,
    /// Number of keys currently stored.
    pub record_count: u64,
}

impl Header {
    /// Create a header for a fresh file.
    #[must_use]
    pub const fn new(pointer_len: u8) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            pointer_len,
            record_count: 0,
        }
    }

    /// Serialize the header, including its checksum.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; SIZE] {
        let mut buf = [0u8; SIZE];
        buf[offsets::MAGIC..offsets::MAGIC + 8].copy_from_slice(&MAGIC);
        buf[offsets::FORMAT_VERSION..offsets::FORMAT_VERSION + 2]
            .copy_from_slice(&self.format_version.to_be_bytes());
        buf[offsets::POINTER_LEN] = self.pointer_len;
        buf[offsets::RECORD_COUNT..offsets::RECORD_COUNT + 8]
            .copy_from_slice(&self.record_count.to_be_bytes());

        let checksum = crc32fast::hash(&buf[..offsets::CHECKSUM]);
        buf[offsets::CHECKSUM..].copy_from_slice(&checksum.to_be_bytes());
        buf
    }

    /// Deserialize and validate a header.
    pub fn from_bytes(buf: &[u8; SIZE]) -> Result<Self, HeaderError> {
        let mut magic = [0u8; 8];
        magic.copy_from_slice(&buf[offsets::MAGIC..offsets::MAGIC + 8]);
        if magic != MAGIC {
            return Err(HeaderError::InvalidMagic(magic));
        }

        let stored = u32::from_be_bytes([
            buf[offsets::CHECKSUM],
            buf[offsets::CHECKSUM + 1],
            buf[offsets::CHECKSUM + 2],
            buf[offsets::CHECKSUM + 3],
        ]);
        let computed = crc32fast::hash(&buf[..offsets::CHECKSUM]);
        if stored != computed {
            return Err(HeaderError::ChecksumMismatch { stored, computed });
        }

        let format_version = u16::from_be_bytes([
            buf[offsets::FORMAT_VERSION],
            buf[offsets::FORMAT_VERSION + 1],
        ]);
        if format_version != FORMAT_VERSION {
            return Err(HeaderError::UnsupportedVersion(format_version));
        }

        let pointer_len = buf[offsets::POINTER_LEN];
        if Layout::new(pointer_len).is_none() {
            return Err(HeaderError::InvalidPointerLen(pointer_len));
        }

        let mut count = [0u8; 8];
        count.copy_from_slice(&buf[offsets::RECORD_COUNT..offsets::RECORD_COUNT + 8]);

        Ok(Self {
            format_version,
            pointer_len,
            record_count: u64::from_be_bytes(count),
        })
    }
}

/// Errors that can occur when reading a header.
#[derive(Debug)]
pub enum HeaderError {
    /// Invalid magic number.
    InvalidMagic([u8; 8]),
    /// Unsupported format version.
    UnsupportedVersion(u16),
    /// Pointer width outside the supported range.
    InvalidPointerLen(u8),
    /// The stored checksum does not match the header bytes.
    ChecksumMismatch {
        /// Checksum read from the file.
        stored: u32,
        /// Checksum of the header bytes as read.
        computed: u32,
    },
}

impl std::fmt::Display for HeaderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidMagic(magic) => {
                write!(
                    f,
                    "invalid magic number: {:?}",
                    String::from_utf8_lossy(magic)
                )
            }
            Self::UnsupportedVersion(v) => write!(f, "unsupported format version: {v}"),
            Self::InvalidPointerLen(len) => write!(f, "invalid pointer width: {len}"),
            Self::ChecksumMismatch { stored, computed } => write!(
                f,
                "header checksum mismatch: stored {stored:#010x}, computed {computed:#010x}"
            ),
        }
    }
}

impl std::error::Error for HeaderError {}
