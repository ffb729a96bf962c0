//! Keyfall
//!
//! Turns a recording into timed piano notes and renders them back as a
//! piano cover. Analysis lives in `kf-analysis`, synthesis in `kf-synth`;
//! this crate wires both behind one configuration.
//!
//! ```rust,ignore
//! use keyfall::{KeyfallConfig, Pipeline};
//!
//! let pipeline = Pipeline::new(KeyfallConfig::default())?;
//! let cover = pipeline.cover(&signal)?;
//! println!("{:?}", cover.summary());
//! ```

mod config;
mod error;
mod pipeline;

pub use config::KeyfallConfig;
pub use error::{KeyfallError, KeyfallResult};
pub use pipeline::{Cover, CoverSummary, Pipeline};

pub use kf_analysis::{AnalysisConfig, AnalysisError, Transcription};
pub use kf_core::{MasterBuffer, NoteEvent, NoteRole, Signal};
pub use kf_synth::{MixConfig, MixOutput, MixReport, SynthConfig, SynthError};
