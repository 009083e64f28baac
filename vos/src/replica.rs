//! Leadership capability of the replicated transactional KV above the
//! store.
//!
//! The replication layer orders commits and elects leaders; the store
//! only needs to hear about term transitions. A service registers one
//! callback pair; deliveries are at most once per term transition, and
//! `step_up` may veto, in which case the replica steps back down.

use crate::error::Error;

pub trait ReplicaCallbacks {
    /// This replica became leader of `term`. An error vetoes the
    /// leadership.
    fn step_up(&mut self, term: u64) -> Result<(), Error>;

    /// This replica lost the leadership it held for `term`.
    fn step_down(&mut self, term: u64);
}

/// Registration point the container service hands to the replication
/// layer.
#[derive(Default)]
pub struct LeadershipRegistry {
    callbacks: Option<Box<dyn ReplicaCallbacks>>,
    term: Option<u64>,
    leading: bool,
}

impl LeadershipRegistry {
    pub fn new() -> Self {
        LeadershipRegistry::default()
    }

    pub fn register(&mut self, callbacks: Box<dyn ReplicaCallbacks>) -> Result<(), Error> {
        if self.callbacks.is_some() {
            return Err(Error::NotPermitted("callbacks already registered"));
        }
        self.callbacks = Some(callbacks);
        Ok(())
    }

    pub fn is_leading(&self) -> bool {
        self.leading
    }

    /// Terms are monotone; a duplicate delivery for the current term is
    /// dropped rather than handed to the callback a second time.
    pub fn deliver_step_up(&mut self, term: u64) -> Result<(), Error> {
        if let Some(current) = self.term {
            if term < current {
                return Err(Error::InvalidArgument("stale term"));
            }
            if term == current && self.leading {
                return Ok(());
            }
        }
        self.term = Some(term);
        if let Some(callbacks) = &mut self.callbacks {
            match callbacks.step_up(term) {
                Ok(()) => self.leading = true,
                Err(err) => {
                    tracing::debug!(term, %err, "step-up vetoed");
                    self.leading = false;
                    return Err(err);
                }
            }
        } else {
            self.leading = true;
        }
        Ok(())
    }

    pub fn deliver_step_down(&mut self, term: u64) {
        if self.term == Some(term) && self.leading {
            self.leading = false;
            if let Some(callbacks) = &mut self.callbacks {
                callbacks.step_down(term);
            }
        }
    }
}
