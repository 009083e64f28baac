//! The store's operations, one module per concern.

pub(crate) mod aggregate;
pub(crate) mod discard;
pub(crate) mod fetch;
pub(crate) mod update;
