use vos_tree::{ExtentKey, HashedKey, IntKey, ProbeOp, Stamped, Tree};
use vos_types::{Epoch, Iod, IodKind, ObjectId, Recx};

use crate::{
    error::Error,
    records::{AkeyEntry, ArrayValue, SingleValue, ValueTree},
    ContainerHandle, Vos,
};

/// Resolved value of one iod. `size` is the record size (bytes for a
/// single value, bytes per cell for arrays); zero means the identity is
/// absent or punched at the query epoch. `data` holds one buffer per
/// requested extent (exactly one for single values), empty when the size
/// is zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IodValue {
    pub size: u64,
    pub data: Vec<Vec<u8>>,
}

impl IodValue {
    fn absent(iod: &Iod) -> Self {
        IodValue {
            size: 0,
            data: vec![Vec::new(); iod.recxs.len()],
        }
    }

    /// True when nothing is visible for this iod.
    pub fn is_absent(&self) -> bool {
        self.size == 0
    }
}

impl Vos {
    /// Resolve the visible version of each requested identity at `epoch`.
    ///
    /// Queries at or below the container's purged-epoch watermark are
    /// answered at the watermark: aggregation has collapsed that part of
    /// history onto its upper bound.
    pub fn fetch(
        &self,
        coh: ContainerHandle,
        oid: ObjectId,
        epoch: Epoch,
        dkey: &[u8],
        iods: &[Iod],
    ) -> Result<Vec<IodValue>, Error> {
        for iod in iods {
            iod.validate()?;
        }
        if dkey.is_empty() {
            return Err(Error::InvalidArgument("empty dkey"));
        }

        let cont = self.resolve(coh)?;
        let cont = cont.borrow();
        let effective = epoch.max(cont.header.purged_epoch);

        let Some(obj) = cont.objects.find(oid) else {
            return Ok(iods.iter().map(IodValue::absent).collect());
        };
        let dkey_key = HashedKey::new(dkey);
        let Some(akeys) = obj.dkeys.get_any(&dkey_key).map(|entry| entry.value) else {
            return Ok(iods.iter().map(IodValue::absent).collect());
        };

        iods.iter()
            .map(|iod| resolve_iod(akeys, iod, effective))
            .collect()
    }
}

fn resolve_iod(
    akeys: &Tree<HashedKey, AkeyEntry>,
    iod: &Iod,
    effective: Epoch,
) -> Result<IodValue, Error> {
    let akey_key = HashedKey::new(iod.name.clone());
    let Some(entry) = akeys.get_any(&akey_key).map(|entry| entry.value) else {
        return Ok(IodValue::absent(iod));
    };
    if entry.kind != iod.kind {
        return Err(Error::InvalidArgument("iod kind does not match akey"));
    }
    match (&entry.values, iod.kind) {
        (ValueTree::Single(tree), IodKind::Single) => Ok(resolve_single(tree, effective)),
        (ValueTree::Array(tree), IodKind::Array) => Ok(resolve_array(tree, iod, effective)),
        _ => Err(Error::InvalidArgument("iod kind does not match akey")),
    }
}

fn resolve_single(tree: &Tree<IntKey, SingleValue>, effective: Epoch) -> IodValue {
    let target = Stamped::new(IntKey(effective), effective);
    let visible = tree
        .probe(ProbeOp::Le, Some(&target))
        .ok()
        .and_then(|cursor| tree.fetch(&cursor));
    match visible {
        Some(entry) if !entry.value.is_punch() => IodValue {
            size: entry.value.size,
            data: vec![entry.value.data.clone()],
        },
        _ => IodValue {
            size: 0,
            data: vec![Vec::new()],
        },
    }
}

/// Per-cell resolution: overlapping extents written at different epochs
/// are legal, so every requested cell independently picks the covering
/// record with the greatest epoch at or below the query.
fn resolve_array(tree: &Tree<ExtentKey, ArrayValue>, iod: &Iod, effective: Epoch) -> IodValue {
    let mut size = 0u64;
    let mut data = Vec::with_capacity(iod.recxs.len());
    for recx in &iod.recxs {
        let (recx_size, recx_data) = resolve_recx(tree, recx, effective);
        if recx_size != 0 {
            size = recx_size;
        }
        data.push(recx_data);
    }
    if size == 0 {
        for buf in &mut data {
            buf.clear();
        }
    }
    IodValue { size, data }
}

fn resolve_recx(
    tree: &Tree<ExtentKey, ArrayValue>,
    recx: &Recx,
    effective: Epoch,
) -> (u64, Vec<u8>) {
    let nr = recx.nr as usize;
    let mut best: Vec<Option<vos_tree::EntryRef<'_, ExtentKey, ArrayValue>>> =
        (0..nr).map(|_| None).collect();

    for entry in tree.iter() {
        if entry.epoch > effective {
            continue;
        }
        let lo = entry.key.lo.max(recx.idx);
        let hi = entry.key.hi.min(recx.last());
        if lo > hi {
            continue;
        }
        for cell in lo..=hi {
            let slot = &mut best[(cell - recx.idx) as usize];
            if slot.is_none_or(|prev| prev.epoch <= entry.epoch) {
                *slot = Some(entry);
            }
        }
    }

    let cell_size = best
        .iter()
        .flatten()
        .filter(|entry| !entry.value.is_punch())
        .map(|entry| entry.value.cell_size)
        .next_back()
        .unwrap_or(0);
    if cell_size == 0 {
        return (0, Vec::new());
    }

    let mut out = vec![0u8; nr * cell_size as usize];
    for (offset, slot) in best.iter().enumerate() {
        if let Some(entry) = slot {
            if entry.value.is_punch() || entry.value.cell_size != cell_size {
                continue;
            }
            let cell = recx.idx + offset as u64;
            let bytes = entry.value.cell(cell - entry.key.lo);
            let start = offset * cell_size as usize;
            out[start..start + cell_size as usize].copy_from_slice(bytes);
        }
    }
    (cell_size, out)
}
