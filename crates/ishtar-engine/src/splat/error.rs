use thiserror::Error;

/// Failures setting up a splat stage. The stage stays unavailable afterwards.
#[derive(Error, Debug)]
pub enum SplatError {
    #[error("point count {0} exceeds the u32 index range")]
    TooManyPoints(usize),

    #[error("splat buffer of {requested} bytes exceeds device limit of {limit} bytes")]
    BufferTooLarge { requested: u64, limit: u64 },

    #[error("failed to spawn sort worker: {0}")]
    Spawn(#[from] std::io::Error),
}
