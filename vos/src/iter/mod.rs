//! Uniform cursor over dkeys, akeys and record extents.
//!
//! The framework owns the state machine (NONE → OK | END) and dispatches
//! to the object-iterator implementation behind `IterOps`. `next` and
//! `fetch` demand a successful `probe` first; iterating past the end
//! reports `not found`, and any other error drops the cursor back to
//! NONE until it is re-probed.

pub mod anchor;

mod obj_iter;

pub use anchor::{AnchorKey, IterAnchor, ValueCursor};

use vos_types::{Cookie, Epoch, EpochRange, IodKind, ObjectId, Recx, EPOCH_MAX};

use crate::{error::Error, ContainerHandle, Vos};

/// Iterator type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterType {
    Dkey,
    Akey,
    Recx,
}

/// What to iterate over. Akey iteration needs the enclosing dkey, recx
/// iteration the enclosing dkey and akey.
#[derive(Debug, Clone)]
pub struct IterParam {
    pub coh: ContainerHandle,
    pub oid: ObjectId,
    pub dkey: Option<Vec<u8>>,
    pub akey: Option<Vec<u8>>,
    pub epoch_range: EpochRange,
}

impl IterParam {
    pub fn new(coh: ContainerHandle, oid: ObjectId) -> Self {
        IterParam {
            coh,
            oid,
            dkey: None,
            akey: None,
            epoch_range: EpochRange::new(0, EPOCH_MAX),
        }
    }
}

/// One element of an iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IterEntry {
    Dkey {
        key: Vec<u8>,
        first_epoch: Epoch,
        cookie: Cookie,
    },
    Akey {
        key: Vec<u8>,
        kind: IodKind,
        first_epoch: Epoch,
        cookie: Cookie,
    },
    Recx {
        recx: Recx,
        epoch: Epoch,
        cookie: Cookie,
        size: u64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IterState {
    None,
    Ok,
    End,
}

pub(crate) trait IterOps {
    fn probe(&mut self, anchor: Option<&IterAnchor>) -> Result<(), Error>;
    fn next(&mut self) -> Result<(), Error>;
    fn fetch(&self) -> Result<(IterEntry, IterAnchor), Error>;
}

/// A prepared iterator. Holds a reference on its container, so the
/// container cannot be destroyed while the iterator lives.
pub struct VosIter {
    state: IterState,
    ops: Box<dyn IterOps>,
}

impl std::fmt::Debug for VosIter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VosIter").field("state", &self.state).finish_non_exhaustive()
    }
}

impl Vos {
    pub fn iter_prepare(&self, iter_type: IterType, param: IterParam) -> Result<VosIter, Error> {
        let ops = obj_iter::ObjIter::prepare(self, iter_type, &param)?;
        Ok(VosIter {
            state: IterState::None,
            ops: Box::new(ops),
        })
    }
}

impl VosIter {
    /// Position the cursor: at the start without an anchor, or at the
    /// anchored element. `not found` means the iteration is empty (state
    /// END).
    pub fn probe(&mut self, anchor: Option<&IterAnchor>) -> Result<(), Error> {
        let result = self.ops.probe(anchor);
        self.state = state_after(&result);
        result
    }

    pub fn next(&mut self) -> Result<(), Error> {
        self.require_ok()?;
        let result = self.ops.next();
        self.state = state_after(&result);
        result
    }

    /// Current element plus the anchor that resumes at it.
    pub fn fetch(&mut self) -> Result<(IterEntry, IterAnchor), Error> {
        self.require_ok()?;
        let result = self.ops.fetch();
        if result.is_err() {
            self.state = IterState::None;
        }
        result
    }

    pub fn finish(self) {}

    fn require_ok(&self) -> Result<(), Error> {
        match self.state {
            IterState::None => Err(Error::NotPermitted("iterator requires a probe")),
            IterState::End => Err(Error::NotFound),
            IterState::Ok => Ok(()),
        }
    }
}

fn state_after(result: &Result<(), Error>) -> IterState {
    match result {
        Ok(()) => IterState::Ok,
        Err(Error::NotFound) => IterState::End,
        Err(_) => IterState::None,
    }
}
