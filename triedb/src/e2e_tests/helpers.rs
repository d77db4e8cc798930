//! Common helpers for end-to-end tests.

use std::path::PathBuf;

use rand::Rng;
use rand::rngs::StdRng;
use tempfile::TempDir;

use crate::storage::{CacheStorage, FileStorage, Storage, StorageError};
use crate::trie::{Trie, TrieOptions};

/// Node cache capacity used when a setup enables it.
pub const NODE_CACHE_CAPACITY: usize = 1_000;

/// A file, with or without the page cache in front.
pub enum TestStorage {
    File(FileStorage),
    Cached(CacheStorage<FileStorage>),
}

impl Storage for TestStorage {
    fn read(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), StorageError> {
        match self {
            Self::File(s) => s.read(offset, buf),
            Self::Cached(s) => s.read(offset, buf),
        }
    }

    fn write(&mut self, offset: u64, bytes: &[u8]) -> Result<(), StorageError> {
        match self {
            Self::File(s) => s.write(offset, bytes),
            Self::Cached(s) => s.write(offset, bytes),
        }
    }

    fn reserve(&mut self, additional: u64) -> Result<(), StorageError> {
        match self {
            Self::File(s) => s.reserve(additional),
            Self::Cached(s) => s.reserve(additional),
        }
    }

    fn len(&self) -> u64 {
        match self {
            Self::File(s) => s.len(),
            Self::Cached(s) => s.len(),
        }
    }

    fn flush(&mut self) -> Result<(), StorageError> {
        match self {
            Self::File(s) => s.flush(),
            Self::Cached(s) => s.flush(),
        }
    }
}

/// Which optional layers a test trie runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Setup {
    pub page_cache: bool,
    pub node_cache: bool,
}

/// Every combination of page cache and node cache.
pub const SETUPS: [Setup; 4] = [
    Setup {
        page_cache: false,
        node_cache: false,
    },
    Setup {
        page_cache: true,
        node_cache: false,
    },
    Setup {
        page_cache: false,
        node_cache: true,
    },
    Setup {
        page_cache: true,
        node_cache: true,
    },
];

impl Setup {
    fn options(self) -> TrieOptions {
        TrieOptions {
            consistency_check: true,
            node_cache_capacity: self.node_cache.then_some(NODE_CACHE_CAPACITY),
            ..TrieOptions::default()
        }
    }

    fn storage(self, file: FileStorage) -> TestStorage {
        if self.page_cache {
            TestStorage::Cached(CacheStorage::new(file))
        } else {
            TestStorage::File(file)
        }
    }
}

/// A trie in a fresh file, removed with its temp directory on drop.
pub struct TestTrie {
    pub trie: Trie<TestStorage>,
    pub setup: Setup,
    path: PathBuf,
    _dir: TempDir,
}

#[allow(clippy::expect_used)]
impl TestTrie {
    /// Create an empty trie file. The empty trie is flushed.
    pub fn create(setup: Setup) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("test.trie");
        let file = FileStorage::create(&path).expect("create file");
        let mut trie = Trie::init(setup.storage(file), setup.options()).expect("init trie");
        trie.flush().expect("flush");
        Self {
            trie,
            setup,
            path,
            _dir: dir,
        }
    }

    /// Flush, close the file, and open the trie again from disk.
    #[must_use]
    pub fn reload(self) -> Self {
        let Self {
            mut trie,
            setup,
            path,
            _dir,
        } = self;
        trie.flush().expect("flush");
        drop(trie);

        let file = FileStorage::open(&path).expect("open file");
        let trie = Trie::open(setup.storage(file), setup.options()).expect("open trie");
        Self {
            trie,
            setup,
            path,
            _dir,
        }
    }

    pub fn get(&mut self, key: &str) -> Option<String> {
        self.trie
            .get(key.as_bytes())
            .expect("get")
            .map(|value| String::from_utf8(value).expect("utf8 value"))
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.trie.set(key.as_bytes(), value.as_bytes()).expect("set");
    }

    pub fn delete(&mut self, key: &str) -> bool {
        self.trie.delete(key.as_bytes()).expect("delete")
    }

    pub fn count(&self) -> u64 {
        self.trie.record_count()
    }

    /// Keys starting with `prefix`, in enumeration order.
    pub fn keys_starting_with(&mut self, prefix: &str) -> Vec<String> {
        self.trie
            .enumerate_starting_with(prefix.as_bytes())
            .map(|row| String::from_utf8(row.expect("row").key).expect("utf8 key"))
            .collect()
    }
}

/// A lowercase ASCII word of `len` letters.
pub fn random_word(rng: &mut StdRng, len: usize) -> String {
    (0..len)
        .map(|_| char::from(rng.random_range(b'a'..=b'z')))
        .collect()
}
