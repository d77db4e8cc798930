//! Table catalog stored in a trie.
//!
//! Each table is identified by name and backed by its own trie file, named by
//! a number. The catalog keeps two kinds of keys:
//!
//! - `"@@@@LastFileNumber"`: the last file number handed out (u64 BE)
//! - `"@ut" + name`: the file number of table `name` (u64 BE)
//!
//! File numbers start after 10,000,000 and are never reused.

use crate::storage::Storage;
use crate::trie::{Trie, TrieError};

/// Key holding the last allocated file number.
pub const LAST_FILE_NUMBER_KEY: &[u8] = b"@@@@LastFileNumber";

/// Prefix of every table key.
pub const TABLE_PREFIX: &[u8] = b"@ut";

/// Last file number of an empty catalog.
pub const INITIAL_FILE_NUMBER: u64 = 10_000_000;

/// A table catalog over a borrowed trie.
pub struct Schema<'a, S: Storage> {
    trie: &'a mut Trie<S>,
    last_file_number: u64,
}

impl<'a, S: Storage> Schema<'a, S> {
    /// Read the catalog state from `trie`.
    pub fn open(trie: &'a mut Trie<S>) -> Result<Self, SchemaError> {
        let last_file_number = match trie.get(LAST_FILE_NUMBER_KEY)? {
            Some(bytes) => decode_file_number(LAST_FILE_NUMBER_KEY, &bytes)?,
            None => INITIAL_FILE_NUMBER,
        };
        Ok(Self {
            trie,
            last_file_number,
        })
    }

    /// The last file number handed out.
    #[must_use]
    pub const fn last_file_number(&self) -> u64 {
        self.last_file_number
    }

    pub fn table_exists(&mut self, name: &str) -> Result<bool, SchemaError> {
        Ok(self.trie.get_row(&table_key(name))?.is_some())
    }

    /// File number of table `name`, allocating one if the table is new.
    pub fn get_file_name_or_create(&mut self, name: &str) -> Result<u64, SchemaError> {
        let key = table_key(name);
        if let Some(bytes) = self.trie.get(&key)? {
            return decode_file_number(&key, &bytes);
        }

        let file_number = self.last_file_number + 1;
        self.trie.set(&key, &file_number.to_be_bytes())?;
        self.trie
            .set(LAST_FILE_NUMBER_KEY, &file_number.to_be_bytes())?;
        self.last_file_number = file_number;
        tracing::debug!(table = name, file_number, "created table");
        Ok(file_number)
    }

    /// Names of the tables starting with `prefix`, sorted.
    pub fn tables(&mut self, prefix: &str) -> Result<Vec<String>, SchemaError> {
        let key_prefix = table_key(prefix);
        let mut names = Vec::new();
        for row in self.trie.enumerate_starting_with(&key_prefix) {
            let mut key = row?.key;
            key.drain(..TABLE_PREFIX.len());
            let name = String::from_utf8(key)
                .map_err(|e| SchemaError::InvalidTableName(e.into_bytes()))?;
            names.push(name);
        }
        Ok(names)
    }
}

fn table_key(name: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(TABLE_PREFIX.len() + name.len());
    key.extend_from_slice(TABLE_PREFIX);
    key.extend_from_slice(name.as_bytes());
    key
}

fn decode_file_number(key: &[u8], bytes: &[u8]) -> Result<u64, SchemaError> {
    let bytes: [u8; 8] = bytes
        .try_into()
        .map_err(|_| SchemaError::InvalidFileNumber {
            key: key.to_vec(),
            len: bytes.len(),
        })?;
    Ok(u64::from_be_bytes(bytes))
}

/// Errors that can occur during catalog operations.
#[derive(Debug)]
pub enum SchemaError {
    /// Trie error.
    Trie(TrieError),
    /// A stored file number is not 8 bytes long.
    InvalidFileNumber {
        /// Key the number was stored under.
        key: Vec<u8>,
        /// Length of the stored value.
        len: usize,
    },
    /// A table name is not valid UTF-8.
    InvalidTableName(Vec<u8>),
}

impl std::fmt::Display for SchemaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trie(e) => write!(f, "trie error: {e}"),
            Self::InvalidFileNumber { key, len } => write!(
                f,
                "file number under {:?} has {len} bytes, expected 8",
                String::from_utf8_lossy(key)
            ),
            Self::InvalidTableName(name) => {
                write!(f, "table name is not UTF-8: {name:?}")
            }
        }
    }
}

impl std::error::Error for SchemaError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Trie(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TrieError> for SchemaError {
    fn from(e: TrieError) -> Self {
        Self::Trie(e)
    }
}
