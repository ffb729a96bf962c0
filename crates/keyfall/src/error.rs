//! Pipeline error type

use kf_analysis::AnalysisError;
use kf_core::KfError;
use kf_synth::SynthError;
use thiserror::Error;

/// Pipeline errors
#[derive(Debug, Error)]
pub enum KeyfallError {
    /// Transcription failed
    #[error("Analysis failed: {0}")]
    Analysis(#[from] AnalysisError),

    /// Rendering failed
    #[error("Synthesis failed: {0}")]
    Synth(#[from] SynthError),

    /// Invalid signal or note
    #[error(transparent)]
    Core(#[from] KfError),

    /// Inconsistent settings across sections
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Malformed configuration JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for pipeline operations
pub type KeyfallResult<T> = Result<T, KeyfallError>;
