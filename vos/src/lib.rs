//! Local, multi-versioned object store.
//!
//! The hierarchy is container → object → dkey → akey → record, with every
//! record stamped by an epoch and a writer cookie. Reads resolve the
//! newest record at or below the query epoch; epoch-range discard removes
//! one writer's updates, and epoch-range aggregation collapses superseded
//! versions with credit-bounded, resumable progress.
//!
//! The store is driven by one execution context at a time per container;
//! containers are shared through `Rc`, so handles do not cross threads.

mod container;
mod error;
mod object_index;
mod operations;
mod records;

pub mod iter;
pub mod poolmap;
pub mod replica;
pub mod rpc;

#[cfg(test)]
mod tests;

use std::{cell::RefCell, collections::HashMap, rc::Rc};

use indexmap::IndexMap;
use uuid::Uuid;

pub use container::{Container, ContainerInfo};
pub use error::Error;
pub use operations::aggregate::PurgeAnchor;
pub use operations::fetch::IodValue;
pub use vos_credits::Credits;
pub use vos_types::{
    Cookie, Epoch, EpochRange, Iod, IodKind, ObjectId, Payload, Recx, SgList, EPOCH_MAX,
};

pub(crate) type SharedContainer = Rc<RefCell<Container>>;

/// Opaque container handle: an identifier into the per-process slab of
/// open descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContainerHandle(u64);

/// The store: a pool of containers plus the slab of open handles.
#[derive(Default)]
pub struct Vos {
    containers: HashMap<Uuid, SharedContainer>,
    handles: IndexMap<u64, SharedContainer>,
    next_handle: u64,
}

impl Vos {
    pub fn new() -> Self {
        Vos::default()
    }

    pub fn container_create(&mut self, uuid: Uuid) -> Result<(), Error> {
        if self.containers.contains_key(&uuid) {
            return Err(Error::InvalidArgument("container already exists"));
        }
        tracing::debug!(container = %uuid, "container created");
        self.containers
            .insert(uuid, Rc::new(RefCell::new(Container::new(uuid))));
        Ok(())
    }

    pub fn container_open(&mut self, uuid: Uuid) -> Result<ContainerHandle, Error> {
        let cont = self.containers.get(&uuid).ok_or(Error::NotFound)?.clone();
        let id = self.next_handle;
        self.next_handle += 1;
        tracing::trace!(
            container = %uuid,
            handle = id,
            format = cont.borrow().header.format_version,
            "container opened"
        );
        self.handles.insert(id, cont);
        Ok(ContainerHandle(id))
    }

    pub fn container_close(&mut self, coh: ContainerHandle) -> Result<(), Error> {
        self.handles.shift_remove(&coh.0).ok_or(Error::NoHandle)?;
        Ok(())
    }

    /// Destroys the container and everything it owns. Refused while any
    /// open handle or live iterator still references the descriptor.
    pub fn container_destroy(&mut self, uuid: Uuid) -> Result<(), Error> {
        let cont = self.containers.get(&uuid).ok_or(Error::NotFound)?;
        if Rc::strong_count(cont) > 1 {
            return Err(Error::NotPermitted("container has live references"));
        }
        tracing::debug!(container = %uuid, "container destroyed");
        self.containers.remove(&uuid);
        Ok(())
    }

    pub fn container_query(&self, coh: ContainerHandle) -> Result<ContainerInfo, Error> {
        Ok(self.resolve(coh)?.borrow().info())
    }

    pub(crate) fn resolve(&self, coh: ContainerHandle) -> Result<SharedContainer, Error> {
        self.handles.get(&coh.0).cloned().ok_or(Error::NoHandle)
    }
}
