#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    // A failed EQ probe, or a GE/LE probe with nothing on that side.
    #[error("key not found")]
    KeyNotFound,

    #[error("probe op requires a target key")]
    MissingProbeTarget,
}
