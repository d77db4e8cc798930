//! Randomized workloads checked against an in-memory model.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::e2e_tests::helpers::*;

fn check_model(t: &mut TestTrie, model: &BTreeMap<String, String>) {
    assert_eq!(t.count(), model.len() as u64, "setup {:?}", t.setup);
    for (key, value) in model {
        assert_eq!(t.get(key).as_ref(), Some(value), "key {key}");
    }
    let keys: Vec<String> = model.keys().cloned().collect();
    assert_eq!(t.keys_starting_with(""), keys);
}

#[test]
fn test_random_inserts_with_shared_prefixes() {
    for setup in SETUPS {
        let mut rng = StdRng::seed_from_u64(7);
        let mut t = TestTrie::create(setup);
        let mut model = BTreeMap::new();

        let stems: Vec<String> = (0..8).map(|_| random_word(&mut rng, 4)).collect();
        for i in 0..400 {
            let stem = &stems[rng.random_range(0..stems.len())];
            let tail_len = rng.random_range(0..6);
            let key = format!("{stem}{}", random_word(&mut rng, tail_len));
            let value = format!("v{i}");
            t.set(&key, &value);
            model.insert(key, value);
        }
        check_model(&mut t, &model);

        let mut t = t.reload();
        check_model(&mut t, &model);

        for stem in &stems {
            let expected: Vec<String> = model
                .keys()
                .filter(|key| key.starts_with(stem.as_str()))
                .cloned()
                .collect();
            assert_eq!(t.keys_starting_with(stem), expected);
        }
    }
}

#[test]
fn test_random_edits_and_truncations() {
    for setup in SETUPS {
        let mut rng = StdRng::seed_from_u64(42);
        let mut t = TestTrie::create(setup);
        let mut model = BTreeMap::new();

        let keys: Vec<String> = (0..100)
            .map(|_| {
                let len = rng.random_range(1..12);
                random_word(&mut rng, len)
            })
            .collect();

        for round in 0..5 {
            for key in &keys {
                // Values grow, shrink and vanish to exercise in-place writes
                let len = rng.random_range(0..300);
                let value = "x".repeat(len);
                t.set(key, &value);
                model.insert(key.clone(), value);
            }
            check_model(&mut t, &model);
            if round % 2 == 1 {
                t = t.reload();
                check_model(&mut t, &model);
            }
        }
    }
}

#[test]
fn test_random_deletes() {
    for setup in SETUPS {
        let mut rng = StdRng::seed_from_u64(1234);
        let mut t = TestTrie::create(setup);
        let mut model = BTreeMap::new();

        for i in 0..300 {
            let len = rng.random_range(1..8);
            let key = random_word(&mut rng, len);
            let value = format!("{i}");
            t.set(&key, &value);
            model.insert(key, value);
        }
        check_model(&mut t, &model);

        let mut keys: Vec<String> = model.keys().cloned().collect();
        let mut step = 0;
        while !keys.is_empty() {
            let key = keys.swap_remove(rng.random_range(0..keys.len()));
            assert!(t.delete(&key), "delete {key}");
            assert!(!t.delete(&key));
            model.remove(&key);

            // A miss close to existing keys must not disturb the trie
            let probe = format!("{key}q");
            if !model.contains_key(&probe) {
                assert!(!t.delete(&probe));
            }

            step += 1;
            if step % 50 == 0 {
                check_model(&mut t, &model);
                t = t.reload();
                check_model(&mut t, &model);
            }
        }
        check_model(&mut t, &model);
        assert_eq!(t.count(), 0);
    }
}

#[test]
fn test_random_mixed_workload() {
    for setup in SETUPS {
        let mut rng = StdRng::seed_from_u64(99);
        let mut t = TestTrie::create(setup);
        let mut model: BTreeMap<String, String> = BTreeMap::new();

        for i in 0..1_000 {
            let len = rng.random_range(0..6);
            let key = random_word(&mut rng, len);
            if rng.random_bool(0.3) {
                assert_eq!(t.delete(&key), model.remove(&key).is_some());
            } else {
                let value = format!("{i}-{}", random_word(&mut rng, i % 20));
                t.set(&key, &value);
                model.insert(key, value);
            }
            if i % 250 == 249 {
                t = t.reload();
                check_model(&mut t, &model);
            }
        }
        check_model(&mut t, &model);
    }
}
