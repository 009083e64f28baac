//! Identity and I/O descriptor types shared by the versioned object store
//! and its collaborators.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Version stamp carried by every record.
pub type Epoch = u64;

/// The greatest representable epoch, used as the open upper bound of
/// "until forever" ranges.
pub const EPOCH_MAX: Epoch = u64::MAX;

/// A closed epoch range `[lo, hi]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochRange {
    pub lo: Epoch,
    pub hi: Epoch,
}

impl EpochRange {
    pub fn new(lo: Epoch, hi: Epoch) -> Self {
        EpochRange { lo, hi }
    }

    /// A range is well formed when its bounds are ordered.
    pub fn is_valid(&self) -> bool {
        self.lo <= self.hi
    }

    pub fn contains(&self, epoch: Epoch) -> bool {
        self.lo <= epoch && epoch <= self.hi
    }
}

/// Identity of the writer of a record; scopes epoch discard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cookie(pub Uuid);

impl Cookie {
    /// A fresh random writer identity.
    pub fn generate() -> Self {
        Cookie(Uuid::new_v4())
    }
}

impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// 128-bit object identifier, ordered by `(hi, lo)`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct ObjectId {
    pub hi: u64,
    pub lo: u64,
}

impl ObjectId {
    pub fn new(hi: u64, lo: u64) -> Self {
        ObjectId { hi, lo }
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}.{:016x}", self.hi, self.lo)
    }
}

/// A 1-D extent of `nr` consecutive cells starting at `idx`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recx {
    pub idx: u64,
    pub nr: u64,
}

impl Recx {
    pub fn new(idx: u64, nr: u64) -> Self {
        Recx { idx, nr }
    }

    /// Index of the last cell covered by this extent.
    pub fn last(&self) -> u64 {
        self.idx + self.nr - 1
    }
}

/// Record shape stored under an akey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IodKind {
    /// One opaque buffer per epoch.
    Single,
    /// Sparse extents over a 1-D index space, per epoch.
    Array,
}

/// Per-akey I/O descriptor: which akey, which shape, which extents, and
/// the record size (bytes for a single value, bytes per cell for arrays).
/// A size of zero is a punch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Iod {
    pub name: Vec<u8>,
    pub kind: IodKind,
    pub size: u64,
    pub recxs: Vec<Recx>,
}

impl Iod {
    pub fn single(name: Vec<u8>, size: u64) -> Self {
        Iod {
            name,
            kind: IodKind::Single,
            size,
            recxs: vec![Recx::new(0, 1)],
        }
    }

    pub fn array(name: Vec<u8>, size: u64, recxs: Vec<Recx>) -> Self {
        Iod {
            name,
            kind: IodKind::Array,
            size,
            recxs,
        }
    }

    /// Shape check applied before any descriptor is acted on.
    pub fn validate(&self) -> Result<(), DescriptorError> {
        if self.name.is_empty() {
            return Err(DescriptorError::MissingAkey);
        }
        match self.kind {
            IodKind::Single => {
                if self.recxs.len() != 1 || self.recxs[0].nr != 1 {
                    return Err(DescriptorError::SingleCount);
                }
            }
            IodKind::Array => {
                if self.recxs.is_empty() {
                    return Err(DescriptorError::ArrayWithoutExtents);
                }
                if self.recxs.iter().any(|r| r.nr == 0) {
                    return Err(DescriptorError::EmptyExtent);
                }
            }
        }
        Ok(())
    }
}

/// Handle to a registered bulk-transfer buffer; only the transport can
/// dereference it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkHandle(pub u64);

/// Payload of one I/O vector: carried inline, or parked behind a bulk
/// handle when it exceeds the transport threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Payload {
    Inline(Vec<u8>),
    Bulk(BulkHandle),
}

impl Payload {
    /// Byte length of an inline payload; bulk payloads report zero here
    /// because their length lives with the transport registration.
    pub fn inline_len(&self) -> usize {
        match self {
            Payload::Inline(data) => data.len(),
            Payload::Bulk(_) => 0,
        }
    }
}

/// Scatter/gather list: one payload per extent of the matching iod.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SgList {
    pub iovs: Vec<Payload>,
}

impl SgList {
    pub fn inline(data: Vec<u8>) -> Self {
        SgList {
            iovs: vec![Payload::Inline(data)],
        }
    }
}

/// Malformed I/O descriptor shapes.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("iod has no akey name")]
    MissingAkey,
    #[error("single-value iod must carry exactly one extent of one cell")]
    SingleCount,
    #[error("array iod carries no extents")]
    ArrayWithoutExtents,
    #[error("array iod carries a zero-length extent")]
    EmptyExtent,
}
