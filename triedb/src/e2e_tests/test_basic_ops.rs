//! Test set/get/overwrite and persistence across reloads.

use crate::e2e_tests::helpers::*;
use crate::storage::{CacheStorage, FileStorage};
use crate::trie::{Trie, TrieOptions};

#[test]
fn test_reload_keeps_only_flushed_writes() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("reload.trie");

    let file = FileStorage::create(&path).expect("create file");
    let mut trie = Trie::init(CacheStorage::new(file), TrieOptions::default()).expect("init");
    trie.flush().expect("flush");
    assert_eq!(trie.get(b"1test1").expect("get"), None);

    for i in 0..5 {
        let key = format!("{i}test{i}");
        let value = format!("lol{i}");
        trie.set(key.as_bytes(), value.as_bytes()).expect("set");
        assert_eq!(trie.get(key.as_bytes()).expect("get"), Some(value.into_bytes()));
    }
    for i in 0..5 {
        let key = format!("{i}test{i}");
        assert_eq!(
            trie.get(key.as_bytes()).expect("get"),
            Some(format!("lol{i}").into_bytes())
        );
    }

    // A second handle reads what is on disk: nothing yet
    {
        let file = FileStorage::open(&path).expect("open file");
        let mut on_disk = Trie::open(file, TrieOptions::default()).expect("open");
        for i in 0..5 {
            let key = format!("{i}test{i}");
            assert_eq!(on_disk.get(key.as_bytes()).expect("get"), None);
        }
        assert_eq!(on_disk.record_count(), 0);
    }

    trie.flush().expect("flush");

    let file = FileStorage::open(&path).expect("open file");
    let mut on_disk = Trie::open(file, TrieOptions::default()).expect("open");
    for i in 0..5 {
        let key = format!("{i}test{i}");
        assert_eq!(
            on_disk.get(key.as_bytes()).expect("get"),
            Some(format!("lol{i}").into_bytes())
        );
    }
    assert_eq!(on_disk.record_count(), 5);
}

#[test]
fn test_set_and_overwrite() {
    for setup in SETUPS {
        let mut t = TestTrie::create(setup);
        let count_before = t.count();

        assert_eq!(t.get("CanSetKeyValue"), None);
        t.set("CanSetKeyValue", "CanSetKeyValue-r1");
        assert_eq!(t.get("CanSetKeyValue").as_deref(), Some("CanSetKeyValue-r1"));
        assert_eq!(t.count(), count_before + 1);

        t.set("CanSetKeyValue", "CanSetKeyValue-r2");
        assert_eq!(t.get("CanSetKeyValue").as_deref(), Some("CanSetKeyValue-r2"));
        assert_eq!(t.count(), count_before + 1);

        let mut t = t.reload();
        assert_eq!(t.count(), count_before + 1);
        assert_eq!(t.get("CanSetKeyValue").as_deref(), Some("CanSetKeyValue-r2"));
    }
}

#[test]
fn test_keys_sharing_prefixes() {
    for setup in SETUPS {
        let mut t = TestTrie::create(setup);
        t.set("CanSetKeyValue", "CanSetKeyValue-r2");
        t.set("Relocation", "a");
        t.set("NoRelocation", "b");
        t.set("k", "k-r1");
        t.set("k", "k-r2");
        t.set("CanSetKeyValue-Extended", "CanSetKeyValue-Extended-r1");
        t.set("CanSetKeyValue-Extended", "CanSetKeyValue-Extended-r2");
        assert_eq!(t.count(), 5, "setup {setup:?}");

        for _ in 0..2 {
            assert_eq!(
                t.get("CanSetKeyValue-Extended").as_deref(),
                Some("CanSetKeyValue-Extended-r2")
            );
            assert_eq!(t.get("CanSetKeyValue").as_deref(), Some("CanSetKeyValue-r2"));
            assert_eq!(t.get("k").as_deref(), Some("k-r2"));
            assert_eq!(t.get("Relocation").as_deref(), Some("a"));
            assert_eq!(t.get("NoRelocation").as_deref(), Some("b"));
            assert_eq!(t.get("CanSetKeyValue-"), None);
            assert_eq!(t.get("CanSetKeyValue-Extendedd"), None);
            t = t.reload();
        }
        assert_eq!(t.count(), 5);
    }
}

#[test]
fn test_binary_keys_and_values() {
    for setup in SETUPS {
        let mut t = TestTrie::create(setup);
        let keys: [&[u8]; 5] = [b"\x00", b"\x00\x00", b"\xff", b"\xff\x00\xff", b""];
        for (i, key) in keys.iter().enumerate() {
            let value = vec![u8::try_from(i).expect("small"); i * 100];
            t.trie.set(key, &value).expect("set");
        }

        let mut t = t.reload();
        for (i, key) in keys.iter().enumerate() {
            let value = vec![u8::try_from(i).expect("small"); i * 100];
            assert_eq!(t.trie.get(key).expect("get"), Some(value));
        }
        assert_eq!(t.count(), 5);
    }
}

#[test]
fn test_growing_value_moves_record() {
    for setup in SETUPS {
        let mut t = TestTrie::create(setup);
        t.set("grow", "x");
        let first = t.trie.get_row(b"grow").expect("get").expect("row");

        let long = "y".repeat(5_000);
        t.set("grow", &long);
        let second = t.trie.get_row(b"grow").expect("get").expect("row");
        assert_ne!(first.pointer, second.pointer);
        assert_eq!(second.value_len, 5_000);

        // Shrinking fits in place
        t.set("grow", "short");
        let third = t.trie.get_row(b"grow").expect("get").expect("row");
        assert_eq!(third.pointer, second.pointer);

        let mut t = t.reload();
        assert_eq!(t.get("grow").as_deref(), Some("short"));
        assert_eq!(t.count(), 1);
    }
}
