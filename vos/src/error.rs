use vos_types::DescriptorError;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    // A failed exact lookup, or the end of an iteration.
    #[error("not found")]
    NotFound,

    #[error("no such handle")]
    NoHandle,

    #[error("not permitted: {0}")]
    NotPermitted(&'static str),

    #[error("out of memory")]
    OutOfMemory,

    #[error("io error: {0}")]
    Io(String),

    // The peer answered with an unexpected response shape.
    #[error("protocol error: {0}")]
    Protocol(&'static str),

    #[error("timed out")]
    TimedOut,

    #[error("no space")]
    NoSpace,

    // Transient failure; the layer above classifies and replays.
    #[error("retryable: {0}")]
    Retryable(&'static str),
}

impl From<DescriptorError> for Error {
    fn from(err: DescriptorError) -> Self {
        Error::InvalidArgument(match err {
            DescriptorError::MissingAkey => "iod has no akey name",
            DescriptorError::SingleCount => "single-value iod must carry exactly one cell",
            DescriptorError::ArrayWithoutExtents => "array iod carries no extents",
            DescriptorError::EmptyExtent => "array iod carries a zero-length extent",
        })
    }
}

impl From<vos_tree::Error> for Error {
    fn from(err: vos_tree::Error) -> Self {
        match err {
            vos_tree::Error::KeyNotFound => Error::NotFound,
            vos_tree::Error::MissingProbeTarget => {
                Error::InvalidArgument("probe requires a target key")
            }
        }
    }
}
