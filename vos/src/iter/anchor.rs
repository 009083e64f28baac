//! Opaque, serializable cursors into a hierarchical iteration.
//!
//! An anchor is a bounded byte string: a tag discriminator, the hashed
//! position of the current key, and a value-level cursor where the
//! iteration is below the akey level. Callers checkpoint anchors across
//! restarts, so the encoding must stay stable.

use bincode::{config, Decode, Encode};
use vos_tree::{ExtentKey, HashedKey};
use vos_types::Epoch;

use crate::error::Error;

/// Position of a hashed key: its hash prefix plus the key bytes.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct AnchorKey {
    pub prefix: u64,
    pub bytes: Vec<u8>,
}

impl AnchorKey {
    pub(crate) fn from_key(key: &HashedKey) -> Self {
        AnchorKey {
            prefix: key.prefix(),
            bytes: key.bytes().to_vec(),
        }
    }

    pub(crate) fn to_key(&self) -> HashedKey {
        HashedKey::from_parts(self.prefix, self.bytes.clone())
    }
}

/// Cursor into a value tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub enum ValueCursor {
    /// Single-value record at this epoch.
    Single(Epoch),
    /// Array record: extent bounds (inclusive) and epoch.
    Extent { lo: u64, hi: u64, epoch: Epoch },
}

impl ValueCursor {
    pub(crate) fn extent(&self) -> Option<ExtentKey> {
        match self {
            ValueCursor::Single(_) => None,
            ValueCursor::Extent { lo, hi, .. } => Some(ExtentKey::new(*lo, *hi)),
        }
    }
}

/// Resumable position of a prepared iterator, as returned by `fetch` and
/// accepted by `probe`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Encode, Decode)]
pub struct IterAnchor {
    /// Shard/partition index last visited.
    pub tag: u32,
    pub key: Option<AnchorKey>,
    pub value: Option<ValueCursor>,
}

impl IterAnchor {
    /// Serialize into the opaque wire form.
    pub fn encode(&self) -> Result<Vec<u8>, Error> {
        bincode::encode_to_vec(self, config::standard())
            .map_err(|_| Error::Protocol("failed to encode iteration anchor"))
    }

    /// Rebuild from the opaque wire form.
    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        bincode::decode_from_slice(bytes, config::standard())
            .map(|(anchor, _)| anchor)
            .map_err(|_| Error::Protocol("failed to decode iteration anchor"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchor_round_trips_through_bytes() {
        let anchor = IterAnchor {
            tag: 3,
            key: Some(AnchorKey {
                prefix: 0xdead_beef,
                bytes: b"dkey-17".to_vec(),
            }),
            value: Some(ValueCursor::Extent {
                lo: 128,
                hi: 255,
                epoch: 42,
            }),
        };
        let bytes = anchor.encode().expect("encode");
        assert_eq!(IterAnchor::decode(&bytes).expect("decode"), anchor);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert_eq!(
            IterAnchor::decode(&[0xff; 3]).unwrap_err(),
            Error::Protocol("failed to decode iteration anchor")
        );
    }
}
