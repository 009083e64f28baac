use std::fmt;

use byteorder::{BigEndian, ByteOrder};

/// Key classes the tree is generic over. Ordering is total and stable;
/// for hashed keys it is semantically opaque, for integer and extent keys
/// it is numeric.
pub trait TreeKey: Ord + Clone + fmt::Debug {}

/// Opaque byte-string key carrying a 64-bit hash prefix. Entries order by
/// `(prefix, bytes)`, which keeps iteration stable without promising any
/// lexicographic meaning to callers. Dkeys and akeys use this class.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HashedKey {
    prefix: u64,
    bytes: Vec<u8>,
}

impl HashedKey {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        let bytes = bytes.into();
        let hash = blake3::hash(&bytes);
        let prefix = BigEndian::read_u64(&hash.as_bytes()[..8]);
        HashedKey { prefix, bytes }
    }

    /// Rebuild a key position from anchor fields. The prefix is trusted;
    /// it was computed by `new` when the anchor was taken.
    pub fn from_parts(prefix: u64, bytes: Vec<u8>) -> Self {
        HashedKey { prefix, bytes }
    }

    pub fn prefix(&self) -> u64 {
        self.prefix
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for HashedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HashedKey({:016x}:{})", self.prefix, hex::encode(&self.bytes))
    }
}

impl TreeKey for HashedKey {}

/// Fixed-width unsigned integer key; single-value trees use the record
/// epoch itself as the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IntKey(pub u64);

impl TreeKey for IntKey {}

/// Extent over a 1-D index space, bounds inclusive. Array trees key their
/// records by extent, ordered by `(lo, hi)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExtentKey {
    pub lo: u64,
    pub hi: u64,
}

impl ExtentKey {
    pub fn new(lo: u64, hi: u64) -> Self {
        debug_assert!(lo <= hi);
        ExtentKey { lo, hi }
    }

    pub fn covers(&self, cell: u64) -> bool {
        self.lo <= cell && cell <= self.hi
    }

    pub fn cells(&self) -> u64 {
        self.hi - self.lo + 1
    }
}

impl TreeKey for ExtentKey {}
