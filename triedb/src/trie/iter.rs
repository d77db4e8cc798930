//! Prefix enumeration.

use crate::storage::Storage;
use crate::trie::layout::ROOT_OFFSET;
use crate::trie::link::LinkKind;
use crate::trie::tree::{Row, Trie, TrieError};

/// Pending work of a depth-first walk.
#[derive(Debug, Clone, Copy)]
enum Frame {
    Node { offset: u64, depth: usize },
    Value { pointer: u64 },
}

/// Iterator over the rows whose keys start with a prefix, in key order.
///
/// Created by `Trie::enumerate_starting_with`. Nodes are decoded lazily as
/// the walk reaches them, so the iterator reflects the trie at the time each
/// row is produced. The iterator stops after the first error.
pub struct RowIter<'a, S: Storage> {
    trie: &'a mut Trie<S>,
    prefix: Vec<u8>,
    stack: Vec<Frame>,
    seeded: bool,
}

impl<'a, S: Storage> RowIter<'a, S> {
    pub(crate) fn new(trie: &'a mut Trie<S>, prefix: &[u8]) -> Self {
        Self {
            trie,
            prefix: prefix.to_vec(),
            stack: Vec::new(),
            seeded: false,
        }
    }

    /// Get the next row.
    pub fn next_row(&mut self) -> Result<Option<Row>, TrieError> {
        if !self.seeded {
            self.seeded = true;
            self.seed()?;
        }
        while let Some(frame) = self.stack.pop() {
            match frame {
                Frame::Node { offset, depth } => self.expand(offset, depth)?,
                Frame::Value { pointer } => {
                    let record = self.trie.read_record(pointer)?;
                    if record.key.starts_with(&self.prefix) {
                        return Ok(Some(Row::from(record)));
                    }
                }
            }
        }
        Ok(None)
    }

    /// Walk down the prefix and push whatever covers it.
    fn seed(&mut self) -> Result<(), TrieError> {
        let mut offset = ROOT_OFFSET;
        let mut depth = 0;
        loop {
            if depth == self.prefix.len() {
                self.stack.push(Frame::Node { offset, depth });
                return Ok(());
            }
            let node = self.trie.load_node(offset, depth)?;
            match node.link(self.prefix[depth]) {
                None => return Ok(()),
                Some(link) if link.is_node() => {
                    offset = link.target;
                    depth += 1;
                }
                // A single value covers the rest of the prefix; the key
                // check in next_row decides whether it matches
                Some(link) => {
                    self.stack.push(Frame::Value {
                        pointer: link.target,
                    });
                    return Ok(());
                }
            }
        }
    }

    /// Push a node's links so they pop internal first, then by label.
    fn expand(&mut self, offset: u64, depth: usize) -> Result<(), TrieError> {
        let node = self.trie.load_node(offset, depth)?;
        for link in node.external_links().rev() {
            self.stack.push(match link.kind {
                LinkKind::Node => Frame::Node {
                    offset: link.target,
                    depth: depth + 1,
                },
                LinkKind::Value => Frame::Value {
                    pointer: link.target,
                },
            });
        }
        if let Some(internal) = node.internal_link() {
            self.stack.push(Frame::Value {
                pointer: internal.target,
            });
        }
        Ok(())
    }
}

impl<S: Storage> Iterator for RowIter<'_, S> {
    type Item = Result<Row, TrieError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_row() {
            Ok(row) => row.map(Ok),
            Err(e) => {
                self.stack.clear();
                Some(Err(e))
            }
        }
    }
}
