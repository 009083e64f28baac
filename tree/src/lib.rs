//! Ordered, indexed container of epoch-stamped entries.
//!
//! Every level of the object hierarchy is built from this one structure:
//! dkey and akey trees use the hashed key class, single-value trees stamp
//! epochs on integer keys, array trees on extent keys. Entries are ordered
//! by `(key, epoch)` so visibility probes and epoch-range sweeps are plain
//! range scans.

mod error;
mod key;
mod tree;

pub use error::Error;
pub use key::{ExtentKey, HashedKey, IntKey, TreeKey};
pub use tree::{Cursor, Direction, EntryRef, ProbeOp, Record, Stamped, Tree};
