//! Error types for Keyfall

use thiserror::Error;

/// Core error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum KfError {
    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParam(String),

    /// Sample rate of zero
    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(u32),

    /// Sample count not divisible by the channel count, or no channels
    #[error("Invalid channel layout: {samples} samples over {channels} channels")]
    InvalidChannels { samples: usize, channels: u16 },

    /// Pitch outside 21..=108
    #[error("Pitch {0} outside the piano range")]
    PitchOutOfRange(i32),

    /// Non-finite, negative or empty note span
    #[error("Invalid note span: start {start}s, end {end}s")]
    InvalidNoteSpan { start: f64, end: f64 },

    /// Velocity above 127
    #[error("Velocity {0} exceeds 127")]
    InvalidVelocity(u8),

    /// Beat at this index is not after the previous one
    #[error("Beat timestamps must be strictly increasing (index {0})")]
    UnorderedBeats(usize),
}

/// Result type alias
pub type KfResult<T> = Result<T, KfError>;
