//! Error types for synthesis and mixing

use kf_core::KfError;
use thiserror::Error;

/// Synthesis and mixdown errors
#[derive(Debug, Error)]
pub enum SynthError {
    /// Master buffer could not be allocated
    #[error("Could not allocate a {samples}-sample master buffer")]
    Allocation { samples: usize },

    /// Configuration rejected by validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Worker pool could not be built
    #[error("Thread pool error: {0}")]
    ThreadPool(String),

    /// Invalid note or buffer
    #[error(transparent)]
    Core(#[from] KfError),
}

/// Result type for synthesis operations
pub type SynthResult<T> = Result<T, SynthError>;
