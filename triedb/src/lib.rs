// Components of the engine:
//  - Storage: flat byte stores (file, memory) and a write-back page cache
//  - Trie: radix trie nodes and value records laid out in one storage
//  - Schema: table name to file number catalog kept in a trie
//
// Life of a write:
// 1. Walk from the root node following one key byte per level
// 2. Append the value record (and any grown node) at the end of storage
// 3. Rewrite the single link that makes the new bytes reachable
// 4. Pages touched stay dirty in the cache until flush

pub mod config;
pub mod schema;
pub mod storage;
pub mod trie;
