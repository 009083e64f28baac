use vos_tree::HashedKey;
use vos_types::{Cookie, EpochRange};

use crate::{error::Error, object_index::ObjectEntry, records::ValueTree, ContainerHandle, Vos};

impl Vos {
    /// Remove every record written by `cookie` whose epoch falls inside
    /// the closed range, pruning subtrees the removal emptied. Runs to
    /// completion, never touches the watermark, and is idempotent.
    pub fn epoch_discard(
        &self,
        coh: ContainerHandle,
        range: EpochRange,
        cookie: Cookie,
    ) -> Result<(), Error> {
        if !range.is_valid() {
            return Err(Error::InvalidArgument("epoch range is inverted"));
        }
        let cont = self.resolve(coh)?;
        let mut cont = cont.borrow_mut();

        let mut removed = 0usize;
        for oid in cont.objects.oids() {
            let Some(obj) = cont.objects.find_mut(oid) else {
                continue;
            };
            removed += discard_object(obj, &range, cookie);
            if obj.dkeys.is_empty() {
                cont.objects.remove(oid);
            }
        }
        tracing::debug!(
            container = %cont.uuid(),
            lo = range.lo,
            hi = range.hi,
            %cookie,
            removed,
            "epoch discard complete"
        );
        Ok(())
    }
}

/// Visit dkey → akey → record; children first, then the emptiness test on
/// the parent in the same pass.
fn discard_object(obj: &mut ObjectEntry, range: &EpochRange, cookie: Cookie) -> usize {
    let mut removed = 0usize;
    let dkeys: Vec<HashedKey> = obj.dkeys.iter().map(|entry| entry.key.clone()).collect();
    for dkey in dkeys {
        let Some(akeys) = obj.dkeys.any_value_mut(&dkey) else {
            continue;
        };
        let akey_keys: Vec<HashedKey> = akeys.iter().map(|entry| entry.key.clone()).collect();
        for akey in akey_keys {
            let Some(entry) = akeys.any_value_mut(&akey) else {
                continue;
            };
            match &mut entry.values {
                ValueTree::Single(tree) => tree.retain(|_, epoch, rec_cookie, _| {
                    let matches = rec_cookie == cookie && range.contains(epoch);
                    removed += matches as usize;
                    !matches
                }),
                ValueTree::Array(tree) => tree.retain(|_, epoch, rec_cookie, _| {
                    let matches = rec_cookie == cookie && range.contains(epoch);
                    removed += matches as usize;
                    !matches
                }),
            }
            if entry.values.is_empty() {
                akeys.delete_any(&akey);
            }
        }
        if akeys.is_empty() {
            obj.dkeys.delete_any(&dkey);
        }
    }
    removed
}
