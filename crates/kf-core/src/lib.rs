//! kf-core: Shared types and utilities for Keyfall
//!
//! Everything the analysis and synthesis crates pass between each other:
//! the input [`Signal`], the [`BeatGrid`] and [`Onset`]s found in it, the
//! [`ChromaFrame`] series, the [`NoteEvent`] sequence, and the rendered
//! [`ToneBuffer`]/[`MasterBuffer`] waveforms.

mod error;
mod note;
mod sample;
mod time;
mod tuning;

pub use error::*;
pub use note::*;
pub use sample::*;
pub use time::*;
pub use tuning::*;

/// Default render sample rate
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;
