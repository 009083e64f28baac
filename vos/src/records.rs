//! In-memory layout of the four-level hierarchy below the object index.
//!
//! Both subtree levels (dkeys, akeys) keep exactly one entry per key,
//! stamped with the epoch and cookie that created them. The value level
//! holds the versioned records themselves: single values keyed by their
//! epoch, array records keyed by extent.

use vos_tree::{ExtentKey, HashedKey, IntKey, Tree};
use vos_types::IodKind;

pub(crate) type DkeyTree = Tree<HashedKey, AkeyTree>;
pub(crate) type AkeyTree = Tree<HashedKey, AkeyEntry>;

/// What an akey entry holds: its record shape and the value tree.
#[derive(Debug)]
pub(crate) struct AkeyEntry {
    pub kind: IodKind,
    pub values: ValueTree,
}

impl AkeyEntry {
    pub fn new(kind: IodKind) -> Self {
        AkeyEntry {
            kind,
            values: ValueTree::new(kind),
        }
    }
}

#[derive(Debug)]
pub(crate) enum ValueTree {
    Single(Tree<IntKey, SingleValue>),
    Array(Tree<ExtentKey, ArrayValue>),
}

impl ValueTree {
    pub fn new(kind: IodKind) -> Self {
        match kind {
            IodKind::Single => ValueTree::Single(Tree::new()),
            IodKind::Array => ValueTree::Array(Tree::new()),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ValueTree::Single(tree) => tree.is_empty(),
            ValueTree::Array(tree) => tree.is_empty(),
        }
    }
}

/// One opaque buffer per epoch. A size of zero is a punch.
#[derive(Debug, Clone)]
pub(crate) struct SingleValue {
    pub size: u64,
    pub data: Vec<u8>,
}

impl SingleValue {
    pub fn is_punch(&self) -> bool {
        self.size == 0
    }
}

/// One extent record per epoch: `cell_size` bytes per covered cell.
/// A cell size of zero punches the extent.
#[derive(Debug, Clone)]
pub(crate) struct ArrayValue {
    pub cell_size: u64,
    pub data: Vec<u8>,
}

impl ArrayValue {
    pub fn is_punch(&self) -> bool {
        self.cell_size == 0
    }

    /// Bytes of one covered cell; `offset` is relative to the extent
    /// start.
    pub fn cell(&self, offset: u64) -> &[u8] {
        let start = (offset * self.cell_size) as usize;
        let end = start + self.cell_size as usize;
        &self.data[start..end]
    }
}
