//! Test prefix enumeration and best-match lookups.

use crate::e2e_tests::helpers::*;

fn table_trie(setup: Setup) -> TestTrie {
    let mut t = TestTrie::create(setup);
    t.set("@utTestTable", "1");
    t.set("@utTestTab", "2");
    t.set("@utIndexProg", "3");
    t.set("@@@@LastFileNumber", "4");
    t
}

#[test]
fn test_enumerate_is_sorted_and_restricted() {
    for setup in SETUPS {
        let mut t = table_trie(setup);
        assert_eq!(
            t.keys_starting_with("@ut"),
            vec!["@utIndexProg", "@utTestTab", "@utTestTable"]
        );
        assert_eq!(t.keys_starting_with("@utTest"), vec!["@utTestTab", "@utTestTable"]);
        assert_eq!(t.keys_starting_with("@utTestTab"), vec!["@utTestTab", "@utTestTable"]);
        assert_eq!(t.keys_starting_with("@utTestTable"), vec!["@utTestTable"]);
        assert_eq!(
            t.keys_starting_with(""),
            vec!["@@@@LastFileNumber", "@utIndexProg", "@utTestTab", "@utTestTable"]
        );

        let mut t = t.reload();
        assert_eq!(t.keys_starting_with("@@"), vec!["@@@@LastFileNumber"]);
    }
}

#[test]
fn test_enumerate_prefix_inside_single_value() {
    for setup in SETUPS {
        let mut t = table_trie(setup);
        // "@utI" ends inside the link that holds "@utIndexProg" alone
        assert_eq!(t.keys_starting_with("@utI"), vec!["@utIndexProg"]);
        assert_eq!(t.keys_starting_with("@utIndexProg"), vec!["@utIndexProg"]);
        assert!(t.keys_starting_with("@utIndexProgT").is_empty());
        assert!(t.keys_starting_with("@utIx").is_empty());
        assert!(t.keys_starting_with("@utX").is_empty());
        assert!(t.keys_starting_with("zzz").is_empty());
    }
}

#[test]
fn test_enumerate_rows_carry_values() {
    for setup in SETUPS {
        let mut t = table_trie(setup);
        let rows: Vec<_> = t
            .trie
            .enumerate_starting_with(b"@utTest")
            .collect::<Result<_, _>>()
            .expect("enumerate");
        assert_eq!(rows.len(), 2);
        for row in &rows {
            assert_eq!(row.value_pointer, row.pointer + 10 + row.key.len() as u64);
        }
        let values: Vec<_> = rows
            .iter()
            .map(|row| t.trie.read_row_value(row).expect("value"))
            .collect();
        assert_eq!(values, vec![b"2".to_vec(), b"1".to_vec()]);
    }
}

#[test]
fn test_enumerate_empty_trie() {
    for setup in SETUPS {
        let mut t = TestTrie::create(setup);
        assert!(t.keys_starting_with("").is_empty());
        assert!(t.keys_starting_with("a").is_empty());
    }
}

#[test]
fn test_best_match_structural_stop() {
    for setup in SETUPS {
        let mut t = table_trie(setup);
        // Walk reaches the node for "@utTestT" but no key ends there
        let best = t.trie.find_best_match(b"@utTestT").expect("match");
        assert!(best.is_structural());
        assert!(!best.exact);
        assert_eq!(best.depth, 8);

        let best = t.trie.find_best_match(b"@utX").expect("match");
        assert!(best.is_structural());
        assert_eq!(best.depth, 3);
    }
}

#[test]
fn test_best_match_value_links() {
    for setup in SETUPS {
        let mut t = table_trie(setup);

        let best = t.trie.find_best_match(b"@utIndexProg").expect("match");
        assert!(best.exact);
        assert_eq!(best.depth, 3);
        let link = best.value_link.expect("value link");
        assert!(link.is_value());
        assert_eq!(link.label, Some(b'I'));

        // Same link, but the stored key differs from the prefix
        for prefix in [&b"@utIndexProgT"[..], &b"@utI"[..], &b"@utIx"[..]] {
            let best = t.trie.find_best_match(prefix).expect("match");
            assert!(!best.exact);
            assert!(!best.is_structural());
            assert_eq!(best.value_link.and_then(|l| l.label), Some(b'I'));
        }

        // A key ending exactly at a node is its internal link
        let best = t.trie.find_best_match(b"@utTestTab").expect("match");
        assert!(best.exact);
        assert_eq!(best.depth, 10);
        assert_eq!(best.value_link.expect("internal").label, None);
    }
}
