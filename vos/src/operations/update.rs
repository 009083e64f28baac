use vos_tree::{ExtentKey, HashedKey, IntKey};
use vos_types::{Cookie, Epoch, Iod, ObjectId, Payload, Recx, SgList};

use crate::{
    container::Container,
    error::Error,
    records::{AkeyEntry, AkeyTree, ArrayValue, SingleValue, ValueTree},
    ContainerHandle, Vos,
};

impl Vos {
    /// Apply writes in caller order. The object is created on its first
    /// update. A failing iod stops the call and leaves the earlier iods
    /// applied; the transactional layer above aborts to undo them.
    pub fn update(
        &self,
        coh: ContainerHandle,
        oid: ObjectId,
        epoch: Epoch,
        cookie: Cookie,
        dkey: &[u8],
        iods: &[Iod],
        sgls: &[SgList],
    ) -> Result<(), Error> {
        if dkey.is_empty() {
            return Err(Error::InvalidArgument("empty dkey"));
        }
        if iods.len() != sgls.len() {
            return Err(Error::InvalidArgument("iod and sgl counts differ"));
        }

        let cont = self.resolve(coh)?;
        let mut cont = cont.borrow_mut();
        let dkey_key = HashedKey::new(dkey);

        for (iod, sgl) in iods.iter().zip(sgls) {
            iod.validate()?;
            apply_iod(&mut cont, oid, epoch, cookie, &dkey_key, iod, sgl)?;
        }
        tracing::trace!(
            container = %cont.uuid(),
            %oid,
            epoch,
            dkey = %hex::encode(dkey),
            niods = iods.len(),
            "update applied"
        );
        Ok(())
    }

    /// A punch is an update with a zero-sized payload at the given
    /// identity; it hides older versions until superseded.
    pub fn punch(
        &self,
        coh: ContainerHandle,
        oid: ObjectId,
        epoch: Epoch,
        cookie: Cookie,
        dkey: &[u8],
        akey: &[u8],
        recx: Option<Recx>,
    ) -> Result<(), Error> {
        let iod = match recx {
            Some(recx) => Iod::array(akey.to_vec(), 0, vec![recx]),
            None => Iod::single(akey.to_vec(), 0),
        };
        self.update(
            coh,
            oid,
            epoch,
            cookie,
            dkey,
            &[iod],
            &[SgList::inline(Vec::new())],
        )
    }
}

fn apply_iod(
    cont: &mut Container,
    oid: ObjectId,
    epoch: Epoch,
    cookie: Cookie,
    dkey_key: &HashedKey,
    iod: &Iod,
    sgl: &SgList,
) -> Result<(), Error> {
    let obj = cont.objects.find_or_alloc(oid, epoch);

    if obj.dkeys.get_any(dkey_key).is_none() {
        obj.dkeys
            .update(dkey_key.clone(), epoch, cookie, AkeyTree::new());
    }
    let akeys = obj
        .dkeys
        .any_value_mut(dkey_key)
        .ok_or(Error::InvalidArgument("dkey vanished during update"))?;

    let akey_key = HashedKey::new(iod.name.clone());
    if akeys.get_any(&akey_key).is_none() {
        akeys.update(akey_key.clone(), epoch, cookie, AkeyEntry::new(iod.kind));
    }
    let entry = akeys
        .any_value_mut(&akey_key)
        .ok_or(Error::InvalidArgument("akey vanished during update"))?;
    if entry.kind != iod.kind {
        return Err(Error::InvalidArgument("iod kind does not match akey"));
    }

    match &mut entry.values {
        ValueTree::Single(tree) => {
            let payload = expect_inline(sgl.iovs.first())?;
            let data = checked_payload(payload, iod.size)?;
            tree.update(
                IntKey(epoch),
                epoch,
                cookie,
                SingleValue {
                    size: iod.size,
                    data,
                },
            );
        }
        ValueTree::Array(tree) => {
            if sgl.iovs.len() != iod.recxs.len() {
                return Err(Error::InvalidArgument("sgl iov count does not match extents"));
            }
            for (recx, iov) in iod.recxs.iter().zip(&sgl.iovs) {
                let payload = expect_inline(Some(iov))?;
                let expected = iod
                    .size
                    .checked_mul(recx.nr)
                    .ok_or(Error::InvalidArgument("extent byte length overflows"))?;
                let data = checked_payload(payload, expected)?;
                tree.update(
                    ExtentKey::new(recx.idx, recx.last()),
                    epoch,
                    cookie,
                    ArrayValue {
                        cell_size: iod.size,
                        data,
                    },
                );
            }
        }
    }
    Ok(())
}

fn expect_inline(iov: Option<&Payload>) -> Result<&[u8], Error> {
    match iov {
        Some(Payload::Inline(data)) => Ok(data),
        Some(Payload::Bulk(_)) => Err(Error::InvalidArgument(
            "bulk payload reached the store unmaterialized",
        )),
        None => Err(Error::InvalidArgument("missing payload for iod")),
    }
}

/// A punch (expected size 0) stores no bytes regardless of what the
/// caller handed over; a value write must match the declared size.
fn checked_payload(payload: &[u8], expected: u64) -> Result<Vec<u8>, Error> {
    if expected == 0 {
        return Ok(Vec::new());
    }
    if payload.len() as u64 != expected {
        return Err(Error::InvalidArgument("payload length does not match iod size"));
    }
    Ok(payload.to_vec())
}
