//! Keyfall melody extraction
//!
//! Converts a raw waveform into timed piano note events, guided by rhythmic
//! structure rather than frame-by-frame pitch picking:
//!
//! ## Stages
//! - **Rhythm**: spectral-flux novelty → tempo, beat grid, onsets
//! - **Pitch**: dominant frequency at every onset, tagged on/off beat
//! - **Harmony**: chroma series → bass line, key, chords
//! - **Notes**: thresholds, durations and velocities shaped by beat position
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kf_analysis::{AnalysisConfig, MelodyExtractor};
//!
//! let extractor = MelodyExtractor::with_config(AnalysisConfig::default())?;
//! let transcription = extractor.extract(&signal)?;
//! for note in &transcription.notes {
//!     println!("{} at {:.2}s", note.name(), note.start());
//! }
//! ```

pub mod config;
pub mod harmony;
pub mod notes;
pub mod pitch;
pub mod rhythm;
pub mod spectrum;

mod error;

pub use config::AnalysisConfig;
pub use error::{AnalysisError, AnalysisResult};
pub use harmony::{BassSample, ChordEvent, HarmonyAnalyzer, KeyEstimate, Mode};
pub use notes::{NoteEventBuilder, deduplicate, optimize_notes};
pub use pitch::{PitchAnalyzer, PitchEstimate};
pub use rhythm::{RhythmAnalysis, RhythmAnalyzer};
pub use spectrum::Spectrogram;

use kf_core::{BeatGrid, ChromaFrame, NoteEvent, Onset, Signal};
use serde::{Deserialize, Serialize};

/// Everything learned about a signal on the way to its notes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcription {
    pub beat_grid: BeatGrid,
    pub onsets: Vec<Onset>,
    #[serde(skip)]
    pub chroma: Vec<ChromaFrame>,
    pub key: Option<KeyEstimate>,
    pub chords: Vec<ChordEvent>,
    /// Sorted by start, then pitch
    pub notes: Vec<NoteEvent>,
}

/// Audio → notes
#[derive(Debug, Clone)]
pub struct MelodyExtractor {
    config: AnalysisConfig,
    rhythm: RhythmAnalyzer,
    pitch: PitchAnalyzer,
    harmony: HarmonyAnalyzer,
    builder: NoteEventBuilder,
}

impl MelodyExtractor {
    /// Extractor with default settings
    pub fn new() -> Self {
        Self::build(AnalysisConfig::default())
    }

    /// Extractor with validated custom settings
    pub fn with_config(config: AnalysisConfig) -> AnalysisResult<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: AnalysisConfig) -> Self {
        Self {
            rhythm: RhythmAnalyzer::new(&config),
            pitch: PitchAnalyzer::new(&config.pitch),
            harmony: HarmonyAnalyzer::new(&config.harmony),
            builder: NoteEventBuilder::new(&config.notes),
            config,
        }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Run every stage.
    ///
    /// Multi-channel input is mixed down first. Fails with
    /// [`AnalysisError::NoNotesFound`] when no onset yields a usable note.
    pub fn extract(&self, signal: &Signal) -> AnalysisResult<Transcription> {
        let mono = signal.to_mono();
        log::info!(
            "Extracting notes from {:.2}s at {} Hz",
            mono.duration_secs(),
            mono.sample_rate()
        );

        let spec = Spectrogram::compute(mono.samples(), mono.sample_rate(), &self.config.spectrum)?;
        let rhythm = self.rhythm.analyze(&spec)?;

        let estimates = self.pitch.estimate(&spec, &rhythm.onsets, &rhythm.beat_grid);
        let chroma = self.harmony.chroma(&spec);
        let bass = self.harmony.bass_line(&chroma, &rhythm.beat_grid);
        let key = harmony::estimate_key(&chroma);
        let chords = self.harmony.detect_chords(&chroma);

        if let Some(key) = key {
            log::info!("Key estimate: {} (r = {:.2})", key, key.correlation);
        }

        let notes = self.builder.build(&estimates, &bass)?;

        Ok(Transcription {
            beat_grid: rhythm.beat_grid,
            onsets: rhythm.onsets,
            chroma,
            key,
            chords,
            notes,
        })
    }
}

impl Default for MelodyExtractor {
    fn default() -> Self {
        Self::new()
    }
}
