//! Error types for melody extraction

use kf_core::KfError;
use thiserror::Error;

/// Melody extraction errors
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// No onset produced a usable note
    #[error("No notes found")]
    NoNotesFound,

    /// Configuration rejected by validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// FFT error
    #[error("FFT error: {0}")]
    Fft(String),

    /// Invalid signal, grid or note
    #[error(transparent)]
    Core(#[from] KfError),
}

/// Result type for analysis operations
pub type AnalysisResult<T> = Result<T, AnalysisError>;
