//! Wire shapes of the per-shard object RPCs. The store itself never
//! sends these; they pin down what the client shim and server dispatcher
//! exchange, and how the payload transport is chosen.

use integer_encoding::VarInt;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vos_types::{BulkHandle, Epoch, Iod, ObjectId, SgList};

/// Deployment-configured transport knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RpcConfig {
    /// Payloads at or above this serialized size ride a bulk transfer
    /// instead of inline sgls.
    pub bulk_threshold: usize,
}

impl Default for RpcConfig {
    fn default() -> Self {
        RpcConfig {
            bulk_threshold: 4096,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjRpcOpc {
    Update,
    Fetch,
}

/// Update/fetch request. Exactly one of `sgls` (inline) and `bulks` is
/// populated, per `choose_transport`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjRwRequest {
    pub opc: ObjRpcOpc,
    pub cont_hdl: Uuid,
    pub cont: Uuid,
    pub oid: ObjectId,
    pub epoch: Epoch,
    pub map_version: u32,
    pub dkey: Vec<u8>,
    pub iods: Vec<Iod>,
    pub sgls: Option<Vec<SgList>>,
    pub bulks: Option<Vec<BulkHandle>>,
}

/// Update/fetch response: per-iod sizes, and inline sgls when the fetch
/// payload fit under the threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjRwResponse {
    pub map_version: u32,
    pub sizes: Vec<u64>,
    pub sgls: Option<Vec<SgList>>,
}

/// Key enumeration request; `anchor` is the opaque iteration anchor from
/// the previous response (empty on the first call).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjEnumRequest {
    pub cont_hdl: Uuid,
    pub cont: Uuid,
    pub oid: ObjectId,
    pub epoch: Epoch,
    pub map_version: u32,
    pub dkey: Option<Vec<u8>>,
    pub anchor: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjEnumResponse {
    pub keys: Vec<Vec<u8>>,
    pub anchor: Vec<u8>,
    pub eof: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Inline,
    Bulk,
}

/// Inline wire footprint of the sgls: payload bytes plus a varint length
/// prefix per iov.
pub fn inline_wire_len(sgls: &[SgList]) -> usize {
    sgls.iter()
        .flat_map(|sgl| sgl.iovs.iter())
        .map(|iov| {
            let len = iov.inline_len();
            len + (len as u64).required_space()
        })
        .sum()
}

/// Inline when the payload fits under the configured threshold, bulk
/// otherwise.
pub fn choose_transport(config: &RpcConfig, sgls: &[SgList]) -> Transport {
    if inline_wire_len(sgls) >= config.bulk_threshold {
        Transport::Bulk
    } else {
        Transport::Inline
    }
}
