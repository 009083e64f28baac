use bincode::{config, Decode, Encode};
use itertools::Itertools;
use vos_credits::Credits;
use vos_tree::{ExtentKey, HashedKey, IntKey, Stamped, Tree};
use vos_types::{EpochRange, ObjectId};

use crate::{
    error::Error,
    iter::anchor::{AnchorKey, ValueCursor},
    object_index::ObjectEntry,
    records::{ArrayValue, SingleValue, ValueTree},
    ContainerHandle, Vos,
};

/// Resumable position of an epoch aggregation. A fresh (default) anchor
/// starts from the beginning; the engine advances it as it walks
/// object → dkey → akey → value cursor, and marks it done when the range
/// is fully collapsed. Serializes to a bounded opaque byte string so
/// callers can checkpoint progress across restarts.
#[derive(Debug, Clone, Default, PartialEq, Encode, Decode)]
pub struct PurgeAnchor {
    oid: Option<(u64, u64)>,
    dkey: Option<AnchorKey>,
    akey: Option<AnchorKey>,
    value: Option<ValueCursor>,
    done: bool,
}

impl PurgeAnchor {
    pub fn new() -> Self {
        PurgeAnchor::default()
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Serialize into the opaque wire form.
    pub fn encode(&self) -> Result<Vec<u8>, Error> {
        bincode::encode_to_vec(self, config::standard())
            .map_err(|_| Error::Protocol("failed to encode purge anchor"))
    }

    /// Rebuild from the opaque wire form.
    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        bincode::decode_from_slice(bytes, config::standard())
            .map(|(anchor, _)| anchor)
            .map_err(|_| Error::Protocol("failed to decode purge anchor"))
    }

    fn enter_dkey(&mut self, key: &HashedKey) {
        self.dkey = Some(AnchorKey::from_key(key));
        self.akey = None;
        self.value = None;
    }

    fn enter_akey(&mut self, key: &HashedKey) {
        self.akey = Some(AnchorKey::from_key(key));
        self.value = None;
    }
}

impl Vos {
    /// Collapse superseded versions inside the closed range: for each
    /// identity, the record with the greatest epoch in the range is
    /// relocated to the range's upper bound (cookie retained, punches
    /// included) and every older in-range record is removed.
    ///
    /// Consumes up to the given credits, one per iteration step; on
    /// exhaustion the position is saved into `anchor` and the call
    /// returns `false`. Re-invoking with the same anchor resumes without
    /// reprocessing collapsed records. Once the walk completes the call
    /// returns `true` and the container's purged-epoch watermark advances
    /// to `max(current, hi)`.
    ///
    /// Concurrent updates during a resumable aggregation are a caller-side
    /// precondition violation; the engine does not police them.
    pub fn epoch_aggregate(
        &self,
        coh: ContainerHandle,
        oid: ObjectId,
        range: EpochRange,
        credits: &mut Credits,
        anchor: &mut PurgeAnchor,
    ) -> Result<bool, Error> {
        if !range.is_valid() {
            return Err(Error::InvalidArgument("epoch range is inverted"));
        }
        let cont = self.resolve(coh)?;
        let mut cont = cont.borrow_mut();

        if anchor.done {
            cont.advance_purged(range.hi);
            return Ok(true);
        }
        let first_call = anchor.oid.is_none();
        match anchor.oid {
            Some(bound) if bound != (oid.hi, oid.lo) => {
                return Err(Error::InvalidArgument("anchor is bound to another object"));
            }
            _ => anchor.oid = Some((oid.hi, oid.lo)),
        }
        if first_call && !credits.try_consume() {
            return Ok(false);
        }

        let finished = match cont.objects.find_mut(oid) {
            Some(obj) => aggregate_object(obj, &range, credits, anchor),
            None => true,
        };
        if finished {
            anchor.done = true;
            cont.advance_purged(range.hi);
            tracing::debug!(
                container = %cont.uuid(),
                %oid,
                lo = range.lo,
                hi = range.hi,
                "epoch aggregation finished"
            );
        }
        Ok(finished)
    }
}

fn aggregate_object(
    obj: &mut ObjectEntry,
    range: &EpochRange,
    credits: &mut Credits,
    anchor: &mut PurgeAnchor,
) -> bool {
    let resume_dkey = anchor.dkey.as_ref().map(|k| k.to_key());
    let dkeys: Vec<HashedKey> = obj
        .dkeys
        .iter()
        .map(|entry| entry.key.clone())
        .filter(|key| resume_dkey.as_ref().is_none_or(|r| key >= r))
        .collect();
    for dkey in dkeys {
        let resumed = resume_dkey.as_ref() == Some(&dkey);
        if !resumed {
            anchor.enter_dkey(&dkey);
            if !credits.try_consume() {
                return false;
            }
        }
        if !aggregate_dkey(obj, &dkey, range, credits, anchor, resumed) {
            return false;
        }
    }
    true
}

fn aggregate_dkey(
    obj: &mut ObjectEntry,
    dkey: &HashedKey,
    range: &EpochRange,
    credits: &mut Credits,
    anchor: &mut PurgeAnchor,
    resumed_dkey: bool,
) -> bool {
    let Some(akeys) = obj.dkeys.any_value_mut(dkey) else {
        return true;
    };
    let resume_akey = if resumed_dkey {
        anchor.akey.as_ref().map(|k| k.to_key())
    } else {
        None
    };
    let akey_list: Vec<HashedKey> = akeys
        .iter()
        .map(|entry| entry.key.clone())
        .filter(|key| resume_akey.as_ref().is_none_or(|r| key >= r))
        .collect();
    for akey in akey_list {
        let resumed = resume_akey.as_ref() == Some(&akey);
        if !resumed {
            anchor.enter_akey(&akey);
            if !credits.try_consume() {
                return false;
            }
        }
        let Some(entry) = akeys.any_value_mut(&akey) else {
            continue;
        };
        if !collapse_values(&mut entry.values, range, credits, anchor, resumed) {
            return false;
        }
    }
    true
}

fn collapse_values(
    values: &mut ValueTree,
    range: &EpochRange,
    credits: &mut Credits,
    anchor: &mut PurgeAnchor,
    resumed_akey: bool,
) -> bool {
    match values {
        ValueTree::Single(tree) => {
            // One identity per akey; skip it when this resume already
            // collapsed it.
            if resumed_akey && matches!(anchor.value, Some(ValueCursor::Single(_))) {
                return true;
            }
            if !credits.try_consume() {
                return false;
            }
            collapse_single(tree, range);
            anchor.value = Some(ValueCursor::Single(range.hi));
            true
        }
        ValueTree::Array(tree) => {
            let resume_extent = if resumed_akey {
                anchor.value.and_then(|cursor| cursor.extent())
            } else {
                None
            };
            let identities: Vec<ExtentKey> = tree
                .iter()
                .map(|entry| *entry.key)
                .dedup()
                .filter(|key| resume_extent.is_none_or(|done| *key > done))
                .collect();
            for key in identities {
                if !credits.try_consume() {
                    return false;
                }
                collapse_extent(tree, &key, range);
                anchor.value = Some(ValueCursor::Extent {
                    lo: key.lo,
                    hi: key.hi,
                    epoch: range.hi,
                });
            }
            true
        }
    }
}

fn collapse_single(tree: &mut Tree<IntKey, SingleValue>, range: &EpochRange) {
    let winner = tree
        .iter()
        .filter(|entry| range.contains(entry.epoch))
        .map(|entry| entry.epoch)
        .next_back();
    let Some(winner) = winner else {
        return;
    };
    if winner > range.lo {
        tree.delete_range(
            &Stamped::new(IntKey(range.lo), range.lo),
            &Stamped::new(IntKey(winner - 1), winner - 1),
        );
    }
    if winner != range.hi {
        if let Some(record) = tree.delete(&IntKey(winner), winner) {
            tree.update(IntKey(range.hi), range.hi, record.cookie, record.value);
        }
    }
}

fn collapse_extent(tree: &mut Tree<ExtentKey, ArrayValue>, key: &ExtentKey, range: &EpochRange) {
    let winner = tree
        .for_key_in(key, range.lo, range.hi)
        .map(|entry| entry.epoch)
        .next_back();
    let Some(winner) = winner else {
        return;
    };
    if winner > range.lo {
        tree.delete_range(
            &Stamped::new(*key, range.lo),
            &Stamped::new(*key, winner - 1),
        );
    }
    if winner != range.hi {
        if let Some(record) = tree.delete(key, winner) {
            tree.update(*key, range.hi, record.cookie, record.value);
        }
    }
}
