//! Audio → notes → audio

use kf_analysis::{MelodyExtractor, Transcription};
use kf_core::{NoteEvent, Signal};
use kf_synth::{MixEngine, MixOutput, ToneSynthesizer};
use serde::{Deserialize, Serialize};

use crate::{KeyfallConfig, KeyfallResult};

/// A transcription together with its rendered piano version
#[derive(Debug, Clone)]
pub struct Cover {
    pub transcription: Transcription,
    pub mix: MixOutput,
}

/// Headline numbers of a cover, for logs and reports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverSummary {
    pub tempo_bpm: f64,
    pub beats: usize,
    pub onsets: usize,
    pub notes: usize,
    pub key: Option<String>,
    pub duration_secs: f64,
}

impl Cover {
    pub fn summary(&self) -> CoverSummary {
        let t = &self.transcription;
        CoverSummary {
            tempo_bpm: t.beat_grid.tempo_bpm(),
            beats: t.beat_grid.len(),
            onsets: t.onsets.len(),
            notes: t.notes.len(),
            key: t.key.map(|k| k.to_string()),
            duration_secs: self.mix.buffer.duration_secs(),
        }
    }
}

/// Configured extractor and renderer
pub struct Pipeline {
    config: KeyfallConfig,
    extractor: MelodyExtractor,
    synth: ToneSynthesizer,
}

impl Pipeline {
    pub fn new(config: KeyfallConfig) -> KeyfallResult<Self> {
        config.validate()?;
        Ok(Self {
            extractor: MelodyExtractor::with_config(config.analysis.clone())?,
            synth: ToneSynthesizer::new(config.synth.clone())?,
            config,
        })
    }

    pub fn config(&self) -> &KeyfallConfig {
        &self.config
    }

    /// Beat grid, onsets, harmony and notes of `signal`
    pub fn transcribe(&self, signal: &Signal) -> KeyfallResult<Transcription> {
        Ok(self.extractor.extract(signal)?)
    }

    /// Mix `notes` with the configured synthesizer
    pub fn render(&self, notes: &[NoteEvent]) -> KeyfallResult<MixOutput> {
        self.render_with(notes, self.config.mix.target_duration)
    }

    fn render_with(&self, notes: &[NoteEvent], target: Option<f64>) -> KeyfallResult<MixOutput> {
        let mut mix = self.config.mix.clone();
        mix.target_duration = target;
        let engine = MixEngine::new(self.synth.clone(), mix)?;
        Ok(engine.mix(notes)?)
    }

    /// Transcribe `signal` and render the notes back as piano
    pub fn cover(&self, signal: &Signal) -> KeyfallResult<Cover> {
        let transcription = self.transcribe(signal)?;
        log::info!(
            "Transcribed {} notes at {:.1} BPM",
            transcription.notes.len(),
            transcription.beat_grid.tempo_bpm()
        );

        let target = if self.config.trim_to_signal {
            Some(signal.duration_secs())
        } else {
            self.config.mix.target_duration
        };
        let mix = self.render_with(&transcription.notes, target)?;

        Ok(Cover { transcription, mix })
    }
}
