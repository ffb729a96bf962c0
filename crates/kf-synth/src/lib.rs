//! Keyfall tone synthesis
//!
//! Renders note events as piano-like tones and mixes them into one buffer.
//!
//! ## Components
//! - [`ToneSynthesizer`]: additive piano voice with envelope, noise and reverb
//! - [`MixEngine`]: parallel rendering and mixdown over any [`ToneSource`]
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kf_synth::{MixConfig, MixEngine, SynthConfig, ToneSynthesizer};
//!
//! let synth = ToneSynthesizer::new(SynthConfig::default())?;
//! let engine = MixEngine::new(synth, MixConfig::default())?;
//! let output = engine.mix(&notes)?;
//! ```

pub mod config;
pub mod envelope;
pub mod karplus;
pub mod mixer;
pub mod noise;
pub mod reverb;
pub mod shape;
pub mod tone;

mod error;

pub use config::{
    EnvelopeConfig, MergeStrategy, MixConfig, NoiseLayer, PartialSpec, ReverbConfig, SynthConfig,
    ToneModel, TransientSpec, VibratoConfig,
};
pub use error::{SynthError, SynthResult};
pub use mixer::{MixEngine, MixOutput, MixReport, Placement};
pub use tone::{ToneSource, ToneSynthesizer};
