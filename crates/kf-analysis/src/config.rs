//! Configuration types for melody extraction
//!
//! Every threshold the analyzers use lives here so a run is fully described
//! by one serializable value.

use kf_core::{PIANO_HIGHEST, PIANO_LOWEST};
use serde::{Deserialize, Serialize};

use crate::{AnalysisError, AnalysisResult};

/// Short-time Fourier analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectrumConfig {
    /// FFT window size in samples
    pub n_fft: usize,
    /// Hop between frame centers in samples
    pub hop_size: usize,
}

impl Default for SpectrumConfig {
    fn default() -> Self {
        Self {
            n_fft: 2048,
            hop_size: 512,
        }
    }
}

/// Peak picking over the novelty curve (all windows in frames)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OnsetConfig {
    pub pre_max: usize,
    pub post_max: usize,
    pub pre_avg: usize,
    pub post_avg: usize,
    /// Required excess over the local mean (normalized novelty units)
    pub delta: f32,
    /// Minimum frames between consecutive onsets
    pub wait: usize,
}

impl Default for OnsetConfig {
    fn default() -> Self {
        Self {
            pre_max: 3,
            post_max: 3,
            pre_avg: 3,
            post_avg: 5,
            delta: 0.2,
            wait: 10,
        }
    }
}

/// Tempo estimation and beat tracking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TempoConfig {
    pub min_bpm: f64,
    pub max_bpm: f64,
    /// Center of the tempo prior
    pub start_bpm: f64,
    /// Width of the log-normal tempo prior in octaves
    pub prior_octaves: f64,
    /// Penalty for beat intervals that stray from the tempo period
    pub tightness: f64,
}

impl Default for TempoConfig {
    fn default() -> Self {
        Self {
            min_bpm: 40.0,
            max_bpm: 240.0,
            start_bpm: 120.0,
            prior_octaves: 1.0,
            tightness: 100.0,
        }
    }
}

/// Per-onset dominant frequency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PitchConfig {
    /// Lowest frequency considered (Hz)
    pub fmin: f64,
    /// Highest frequency considered (Hz)
    pub fmax: f64,
    /// Extra frames after the onset searched for the attack peak
    pub lookahead_frames: usize,
    /// Max distance to a beat for an onset to count as on-beat (s)
    pub on_beat_tolerance: f64,
}

impl Default for PitchConfig {
    fn default() -> Self {
        Self {
            fmin: 120.0,
            fmax: 4000.0,
            lookahead_frames: 2,
            on_beat_tolerance: 0.1,
        }
    }
}

/// Chroma, bass line, chords
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarmonyConfig {
    pub chroma_fmin: f64,
    pub chroma_fmax: f64,
    /// Sample the bass line on every n-th beat
    pub bass_beat_stride: usize,
    /// Minimum normalized chroma energy for a bass note
    pub bass_threshold: f32,
    /// Pitch of pitch class C in the bass octave
    pub bass_base_pitch: u8,
    pub bass_lowest: u8,
    pub bass_highest: u8,
    /// Minimum normalized chroma energy for a chord tone
    pub chord_threshold: f32,
}

impl Default for HarmonyConfig {
    fn default() -> Self {
        Self {
            chroma_fmin: 32.7,
            chroma_fmax: 5000.0,
            bass_beat_stride: 2,
            bass_threshold: 0.3,
            bass_base_pitch: 36,
            bass_lowest: 36,
            bass_highest: 60,
            chord_threshold: 0.3,
        }
    }
}

/// Note event construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoteConfig {
    /// Magnitude an on-beat onset must exceed
    pub on_beat_threshold: f32,
    /// Magnitude an off-beat onset must exceed
    pub off_beat_threshold: f32,
    pub melody_lowest: u8,
    pub melody_highest: u8,

    pub on_beat_stretch: f64,
    pub on_beat_max_duration: f64,
    pub off_beat_stretch: f64,
    pub off_beat_max_duration: f64,
    /// Duration of the last onset's note (no successor to measure against)
    pub final_duration: f64,
    pub min_duration: f64,
    pub max_duration: f64,

    pub on_beat_boost: f32,
    pub off_beat_cut: f32,
    pub velocity_floor: u8,
    pub velocity_ceiling: u8,

    pub include_bass: bool,
    pub bass_duration: f64,
    pub bass_velocity: u8,

    /// Notes starting closer than this to the previously kept note, of either
    /// role, are dropped (s)
    pub dedup_window: f64,
}

impl Default for NoteConfig {
    fn default() -> Self {
        Self {
            on_beat_threshold: 0.2,
            off_beat_threshold: 0.4,
            melody_lowest: 48,
            melody_highest: 84,
            on_beat_stretch: 1.2,
            on_beat_max_duration: 1.5,
            off_beat_stretch: 0.8,
            off_beat_max_duration: 0.8,
            final_duration: 0.5,
            min_duration: 0.1,
            max_duration: 2.0,
            on_beat_boost: 1.2,
            off_beat_cut: 0.8,
            velocity_floor: 20,
            velocity_ceiling: 127,
            include_bass: true,
            bass_duration: 0.8,
            bass_velocity: 50,
            dedup_window: 0.05,
        }
    }
}

/// Complete extraction configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub spectrum: SpectrumConfig,
    pub onset: OnsetConfig,
    pub tempo: TempoConfig,
    pub pitch: PitchConfig,
    pub harmony: HarmonyConfig,
    pub notes: NoteConfig,
}

impl AnalysisConfig {
    /// Finer time resolution (hop 256) for fast passages
    pub fn fine() -> Self {
        Self {
            spectrum: SpectrumConfig {
                n_fft: 2048,
                hop_size: 256,
            },
            onset: OnsetConfig {
                wait: 20,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn with_hop_size(mut self, hop_size: usize) -> Self {
        self.spectrum.hop_size = hop_size;
        self
    }

    pub fn with_dedup_window(mut self, seconds: f64) -> Self {
        self.notes.dedup_window = seconds;
        self
    }

    pub fn with_melody_range(mut self, lowest: u8, highest: u8) -> Self {
        self.notes.melody_lowest = lowest;
        self.notes.melody_highest = highest;
        self
    }

    /// Melody only, no bass line
    pub fn without_bass(mut self) -> Self {
        self.notes.include_bass = false;
        self
    }

    pub fn validate(&self) -> AnalysisResult<()> {
        let s = &self.spectrum;
        if s.n_fft < 16 {
            return invalid(format!("n_fft {} too small", s.n_fft));
        }
        if s.hop_size == 0 || s.hop_size > s.n_fft {
            return invalid(format!("hop size {} for n_fft {}", s.hop_size, s.n_fft));
        }

        let t = &self.tempo;
        if !(t.min_bpm > 0.0 && t.min_bpm < t.max_bpm) {
            return invalid(format!("tempo range {}..{} BPM", t.min_bpm, t.max_bpm));
        }
        if t.start_bpm <= 0.0 || t.prior_octaves <= 0.0 || t.tightness < 0.0 {
            return invalid("tempo prior parameters must be positive".to_string());
        }

        let p = &self.pitch;
        if !(p.fmin > 0.0 && p.fmin < p.fmax) {
            return invalid(format!("pitch range {}..{} Hz", p.fmin, p.fmax));
        }
        if p.on_beat_tolerance < 0.0 {
            return invalid("negative on-beat tolerance".to_string());
        }

        let h = &self.harmony;
        if !(h.chroma_fmin > 0.0 && h.chroma_fmin < h.chroma_fmax) {
            return invalid(format!("chroma range {}..{} Hz", h.chroma_fmin, h.chroma_fmax));
        }
        if h.bass_beat_stride == 0 {
            return invalid("bass beat stride must be at least 1".to_string());
        }
        check_range("bass", h.bass_lowest, h.bass_highest)?;

        let n = &self.notes;
        check_range("melody", n.melody_lowest, n.melody_highest)?;
        if !(n.min_duration > 0.0 && n.min_duration <= n.max_duration) {
            return invalid(format!(
                "duration clamp {}..{} s",
                n.min_duration, n.max_duration
            ));
        }
        if n.final_duration <= 0.0 || n.bass_duration <= 0.0 {
            return invalid("note durations must be positive".to_string());
        }
        if n.velocity_floor > n.velocity_ceiling || n.velocity_ceiling > 127 {
            return invalid(format!(
                "velocity clamp {}..{}",
                n.velocity_floor, n.velocity_ceiling
            ));
        }
        if n.bass_velocity > 127 {
            return invalid(format!("bass velocity {}", n.bass_velocity));
        }
        if n.dedup_window < 0.0 {
            return invalid("negative dedup window".to_string());
        }
        Ok(())
    }
}

fn invalid(message: String) -> AnalysisResult<()> {
    Err(AnalysisError::InvalidConfig(message))
}

fn check_range(line: &str, lowest: u8, highest: u8) -> AnalysisResult<()> {
    if lowest < PIANO_LOWEST || highest > PIANO_HIGHEST || lowest > highest {
        return invalid(format!("{line} range {lowest}..={highest}"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(AnalysisConfig::default().validate().is_ok());
        assert!(AnalysisConfig::fine().validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(AnalysisConfig::default().with_hop_size(0).validate().is_err());
        assert!(
            AnalysisConfig::default()
                .with_melody_range(90, 60)
                .validate()
                .is_err()
        );
        assert!(
            AnalysisConfig::default()
                .with_dedup_window(-1.0)
                .validate()
                .is_err()
        );

        let mut config = AnalysisConfig::default();
        config.harmony.bass_beat_stride = 0;
        assert!(matches!(
            config.validate(),
            Err(AnalysisError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: AnalysisConfig =
            serde_json::from_str(r#"{ "notes": { "dedup_window": 0.1 } }"#).unwrap();
        assert_eq!(config.notes.dedup_window, 0.1);
        assert_eq!(config.notes.melody_lowest, 48);
        assert_eq!(config.spectrum, SpectrumConfig::default());
    }
}
