//! Object index: maps object identifiers to their dkey trees.

use std::collections::BTreeMap;

use vos_types::{Epoch, ObjectId};

use crate::records::DkeyTree;

#[derive(Debug)]
pub(crate) struct ObjectEntry {
    /// Epoch of the update that materialized this object.
    pub first_epoch: Epoch,
    pub dkeys: DkeyTree,
}

#[derive(Debug, Default)]
pub(crate) struct ObjectIndex {
    map: BTreeMap<ObjectId, ObjectEntry>,
}

impl ObjectIndex {
    pub fn new() -> Self {
        ObjectIndex {
            map: BTreeMap::new(),
        }
    }

    pub fn find(&self, oid: ObjectId) -> Option<&ObjectEntry> {
        self.map.get(&oid)
    }

    pub fn find_mut(&mut self, oid: ObjectId) -> Option<&mut ObjectEntry> {
        self.map.get_mut(&oid)
    }

    /// Existing object, or a fresh one stamped with `first_epoch`.
    pub fn find_or_alloc(&mut self, oid: ObjectId, first_epoch: Epoch) -> &mut ObjectEntry {
        self.map.entry(oid).or_insert_with(|| ObjectEntry {
            first_epoch,
            dkeys: DkeyTree::new(),
        })
    }

    /// Only called once the object's dkey tree is verified empty.
    pub fn remove(&mut self, oid: ObjectId) {
        debug_assert!(self
            .map
            .get(&oid)
            .is_none_or(|entry| entry.dkeys.is_empty()));
        self.map.remove(&oid);
    }

    pub fn oids(&self) -> Vec<ObjectId> {
        self.map.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }
}
