use uuid::Uuid;
use vos_types::Epoch;

use crate::object_index::ObjectIndex;

pub(crate) const FORMAT_VERSION: u32 = 1;

/// Durable per-container header.
#[derive(Debug, Clone)]
pub(crate) struct ContainerHeader {
    pub uuid: Uuid,
    /// Upper bound of the last aggregation range that ran to completion.
    /// Non-decreasing.
    pub purged_epoch: Epoch,
    pub format_version: u32,
}

/// A container: the object index plus its header. Exclusively owns every
/// subtree reachable from the index.
#[derive(Debug)]
pub struct Container {
    pub(crate) header: ContainerHeader,
    pub(crate) objects: ObjectIndex,
}

impl Container {
    pub(crate) fn new(uuid: Uuid) -> Self {
        Container {
            header: ContainerHeader {
                uuid,
                purged_epoch: 0,
                format_version: FORMAT_VERSION,
            },
            objects: ObjectIndex::new(),
        }
    }

    pub(crate) fn uuid(&self) -> Uuid {
        self.header.uuid
    }

    pub(crate) fn info(&self) -> ContainerInfo {
        ContainerInfo {
            purged_epoch: self.header.purged_epoch,
            nobjs: self.objects.len(),
        }
    }

    /// Watermark advance; never regresses.
    pub(crate) fn advance_purged(&mut self, hi: Epoch) {
        if hi > self.header.purged_epoch {
            tracing::debug!(
                container = %self.header.uuid,
                from = self.header.purged_epoch,
                to = hi,
                "purged-epoch watermark advanced"
            );
            self.header.purged_epoch = hi;
        }
    }
}

/// What `container_query` reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerInfo {
    pub purged_epoch: Epoch,
    pub nobjs: usize,
}
