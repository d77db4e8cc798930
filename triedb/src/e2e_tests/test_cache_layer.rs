//! Test the page cache against a real file.

use crate::storage::{CacheStorage, FileStorage, Storage};
use crate::trie::{Trie, TrieOptions};

fn read(storage: &mut impl Storage, offset: u64, len: usize) -> Vec<u8> {
    storage.read_vec(offset, len).expect("read")
}

#[test]
fn test_cache_over_small_pages() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("cache.bin");

    let mut file = FileStorage::create(&path).expect("create file");
    file.reserve(1030).expect("reserve");
    file.write(125, b"abcdefgh").expect("write");

    let mut cache = CacheStorage::with_page_size(file, 128);
    assert_eq!(read(&mut cache, 125, 8), b"abcdefgh");
    assert_eq!(read(cache.inner_mut(), 125, 8), b"abcdefgh");

    // A write straddling two pages stays in the cache
    cache.write(127, b"CDEF").expect("write");
    assert_eq!(read(&mut cache, 125, 8), b"abCDEFgh");
    assert_eq!(read(cache.inner_mut(), 125, 8), b"abcdefgh");
    assert_eq!(cache.cached_page_count(), 2);
    assert_eq!(cache.inner().len(), 1030);
    assert_eq!(cache.len(), 1030);

    let offset = cache.write_to_end(b"helloworld").expect("append");
    assert_eq!(offset, 1030);
    assert_eq!(cache.len(), 1040);
    assert_eq!(read(&mut cache, 1030, 10), b"helloworld");
    cache.write_to_end(b"abdwuqiwiw").expect("append");

    // Nothing has reached the file yet
    assert_ne!(read(cache.inner_mut(), 1030, 10), b"helloworld");
    assert_eq!(read(cache.inner_mut(), 125, 8), b"abcdefgh");

    cache.flush().expect("flush");
    assert_eq!(read(cache.inner_mut(), 1030, 10), b"helloworld");
    assert_eq!(read(cache.inner_mut(), 125, 8), b"abCDEFgh");
    assert_eq!(cache.len(), cache.inner().len());
    assert_eq!(cache.inner().len(), 1050);
    assert_eq!(cache.dirty_page_count(), 0);

    cache.inner_mut().reserve(10).expect("reserve");
    assert_eq!(cache.inner().len(), 1060);
    cache.close().expect("close");

    let mut reopened = FileStorage::open(&path).expect("open");
    assert_eq!(reopened.len(), 1060);
    assert_eq!(read(&mut reopened, 1030, 20), b"helloworldabdwuqiwiw");
}

#[test]
fn test_clear_discards_trie_changes() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("discard.trie");

    let file = FileStorage::create(&path).expect("create file");
    let mut trie =
        Trie::init(CacheStorage::with_page_size(file, 256), TrieOptions::default())
            .expect("init");
    trie.set(b"kept", b"1").expect("set");
    trie.flush().expect("flush");

    trie.set(b"dropped", b"2").expect("set");
    trie.set(b"kept", b"changed").expect("set");
    assert!(trie.storage_mut().clear());

    // Reopen over the same cache: only the flushed state remains
    let mut trie = Trie::open(trie.into_storage(), TrieOptions::default()).expect("open");
    assert_eq!(trie.get(b"kept").expect("get"), Some(b"1".to_vec()));
    assert_eq!(trie.get(b"dropped").expect("get"), None);
    assert_eq!(trie.record_count(), 1);
}

#[test]
fn test_dropped_cache_flushes_trie() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("drop.trie");

    let file = FileStorage::create(&path).expect("create file");
    let mut trie = Trie::init(CacheStorage::new(file), TrieOptions::default()).expect("init");
    trie.set(b"key", b"value").expect("set");
    drop(trie);

    let file = FileStorage::open(&path).expect("open");
    let mut trie = Trie::open(file, TrieOptions::default()).expect("open trie");
    assert_eq!(trie.get(b"key").expect("get"), Some(b"value".to_vec()));
    assert_eq!(trie.record_count(), 1);
}
