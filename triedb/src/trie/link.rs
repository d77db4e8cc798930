//! Links between trie nodes and value records.

/// What a link points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkKind {
    /// Another trie node.
    Node,
    /// A value record.
    Value,
}

impl LinkKind {
    /// On-disk encoding of the kind byte.
    #[must_use]
    pub const fn to_byte(self) -> u8 {
        match self {
            Self::Node => 0,
            Self::Value => 1,
        }
    }

    /// Decode a kind byte. Anything but 0 is a value link.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Self {
        if byte == 0 { Self::Node } else { Self::Value }
    }
}

/// A decoded link slot.
///
/// `label` is `None` for a node's internal link, which always points at the
/// value whose key ends exactly at the node's depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    pub label: Option<u8>,
    /// Storage offset of the node or value record.
    pub target: u64,
    /// Storage offset of the encoded link itself.
    pub own_offset: u64,
    pub kind: LinkKind,
}

impl Link {
    #[must_use]
    pub const fn is_node(&self) -> bool {
        matches!(self.kind, LinkKind::Node)
    }

    #[must_use]
    pub const fn is_value(&self) -> bool {
        matches!(self.kind, LinkKind::Value)
    }
}
