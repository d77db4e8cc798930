//! Test the table catalog over a file-backed trie.

use crate::e2e_tests::helpers::*;
use crate::schema::{INITIAL_FILE_NUMBER, Schema};

#[test]
fn test_tables_get_increasing_file_numbers() {
    for setup in SETUPS {
        let mut t = TestTrie::create(setup);
        let mut schema = Schema::open(&mut t.trie).expect("open schema");
        assert_eq!(schema.last_file_number(), INITIAL_FILE_NUMBER);
        assert!(!schema.table_exists("Test").expect("exists"));

        let test = schema.get_file_name_or_create("Test").expect("create");
        let test_table = schema.get_file_name_or_create("TestTable").expect("create");
        let index = schema.get_file_name_or_create("IndexProg").expect("create");
        assert_eq!(test, INITIAL_FILE_NUMBER + 1);
        assert_eq!(test_table, INITIAL_FILE_NUMBER + 2);
        assert_eq!(index, INITIAL_FILE_NUMBER + 3);

        // Existing tables keep their number
        assert_eq!(schema.get_file_name_or_create("Test").expect("get"), test);
        assert!(schema.table_exists("TestTable").expect("exists"));
        assert!(!schema.table_exists("TestT").expect("exists"));
        assert_eq!(schema.last_file_number(), index);
    }
}

#[test]
fn test_catalog_survives_reload() {
    for setup in SETUPS {
        let mut t = TestTrie::create(setup);
        {
            let mut schema = Schema::open(&mut t.trie).expect("open schema");
            for name in ["users", "users_by_email", "orders"] {
                schema.get_file_name_or_create(name).expect("create");
            }
        }

        let mut t = t.reload();
        let mut schema = Schema::open(&mut t.trie).expect("open schema");
        assert_eq!(schema.last_file_number(), INITIAL_FILE_NUMBER + 3);
        assert_eq!(
            schema.get_file_name_or_create("users_by_email").expect("get"),
            INITIAL_FILE_NUMBER + 2
        );
        // Numbers continue after the persisted counter
        assert_eq!(
            schema.get_file_name_or_create("items").expect("create"),
            INITIAL_FILE_NUMBER + 4
        );
        assert_eq!(
            schema.tables("").expect("tables"),
            vec!["items", "orders", "users", "users_by_email"]
        );
        assert_eq!(
            schema.tables("users").expect("tables"),
            vec!["users", "users_by_email"]
        );
        assert!(schema.tables("x").expect("tables").is_empty());
    }
}

#[test]
fn test_catalog_shares_trie_with_other_keys() {
    for setup in SETUPS {
        let mut t = TestTrie::create(setup);
        t.set("@u", "not a table");
        t.set("@utx", "\0\0\0\0\0\0\0\x05");
        {
            let mut schema = Schema::open(&mut t.trie).expect("open schema");
            assert_eq!(schema.get_file_name_or_create("x").expect("get"), 5);
            assert_eq!(schema.tables("").expect("tables"), vec!["x"]);
        }
        // Counter and table keys are ordinary rows
        assert_eq!(t.count(), 2);
    }
}
