//! Pool membership as the store's collaborators see it: rank → status
//! with a monotone map version.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub type Rank = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetStatus {
    Up,
    UpIn,
    Down,
    DownOut,
}

impl TargetStatus {
    /// Targets eligible for broadcast groups.
    pub fn is_up(self) -> bool {
        matches!(self, TargetStatus::Up | TargetStatus::UpIn)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoolMap {
    version: u32,
    targets: BTreeMap<Rank, TargetStatus>,
}

impl PoolMap {
    pub fn new(targets: impl IntoIterator<Item = (Rank, TargetStatus)>) -> Self {
        PoolMap {
            version: 1,
            targets: targets.into_iter().collect(),
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn status(&self, rank: Rank) -> Option<TargetStatus> {
        self.targets.get(&rank).copied()
    }

    /// Record a status transition. The map version advances iff the
    /// target actually changed.
    pub fn set_status(&mut self, rank: Rank, status: TargetStatus) -> bool {
        let changed = self.targets.insert(rank, status) != Some(status);
        if changed {
            self.version += 1;
            tracing::debug!(rank, ?status, version = self.version, "pool map advanced");
        }
        changed
    }

    /// The UP/UPIN rank set used when forming broadcast groups.
    pub fn up_ranks(&self) -> Vec<Rank> {
        self.targets
            .iter()
            .filter(|(_, status)| status.is_up())
            .map(|(rank, _)| *rank)
            .collect()
    }
}
