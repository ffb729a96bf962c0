//! Configuration types for tone synthesis and mixing

use kf_core::DEFAULT_SAMPLE_RATE;
use serde::{Deserialize, Serialize};

use crate::{SynthError, SynthResult};

/// One sinusoid relative to the note's fundamental
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PartialSpec {
    /// Frequency multiple of the fundamental
    pub ratio: f64,
    /// Linear amplitude at full velocity
    pub amplitude: f64,
    /// Upward detuning in parts per million
    #[serde(default)]
    pub detune_ppm: f64,
}

impl PartialSpec {
    pub const fn new(ratio: f64, amplitude: f64, detune_ppm: f64) -> Self {
        Self {
            ratio,
            amplitude,
            detune_ppm,
        }
    }

    #[inline]
    pub fn frequency(&self, fundamental: f64) -> f64 {
        fundamental * self.ratio * (1.0 + self.detune_ppm * 1e-6)
    }
}

/// Exponentially damped sinusoid at the start of the note
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransientSpec {
    pub ratio: f64,
    pub amplitude: f64,
    /// Decay rate in 1/s
    pub decay: f64,
}

/// Gaussian noise layer with its own exponential decay
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoiseLayer {
    /// Standard deviation at full velocity
    pub sigma: f64,
    /// Decay rate in 1/s
    pub decay: f64,
}

/// Waveform model
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToneModel {
    /// Pure additive piano model
    #[default]
    Additive,
    /// Additive model blended with a Karplus–Strong plucked string
    Hybrid,
}

/// ADSR shape. Times in seconds; levels relative to full velocity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvelopeConfig {
    pub attack: f64,
    /// Added to `attack` for soft notes, scaled by `1 − velocity`
    pub attack_soft: f64,
    pub decay: f64,
    /// Added to `decay` for soft notes, scaled by `1 − velocity`
    pub decay_soft: f64,
    /// Sustain level at full velocity
    pub sustain: f64,
    /// Attack overshoot above 1.0 at full velocity
    pub overshoot: f64,
    /// Release length as a fraction of the note
    pub release_ratio: f64,
    pub min_release: f64,

    /// Notes shorter than this use the compressed short-note shape
    pub short_note: f64,
    pub short_attack: f64,
    pub short_decay: f64,
    pub short_sustain: f64,
    pub short_min_release: f64,
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            attack: 0.003,
            attack_soft: 0.002,
            decay: 0.1,
            decay_soft: 0.05,
            sustain: 0.3,
            overshoot: 0.15,
            release_ratio: 0.3,
            min_release: 0.05,
            short_note: 0.05,
            short_attack: 0.002,
            short_decay: 0.005,
            short_sustain: 0.1,
            short_min_release: 0.002,
        }
    }
}

/// Slow pitch wobble on the fundamental
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VibratoConfig {
    /// Rate in Hz at zero velocity
    pub rate: f64,
    /// Extra rate at full velocity
    pub rate_velocity: f64,
    /// Relative frequency deviation at zero velocity
    pub depth: f64,
    /// Extra depth at full velocity
    pub depth_velocity: f64,
}

impl Default for VibratoConfig {
    fn default() -> Self {
        Self {
            rate: 0.3,
            rate_velocity: 0.2,
            depth: 0.0005,
            depth_velocity: 0.0005,
        }
    }
}

/// Feedback-free tapped delay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReverbConfig {
    /// Tap delays in seconds
    pub taps: Vec<f64>,
    /// Total wet gain shared by all taps at full velocity
    pub wet: f64,
    /// Gain reduction per successive tap
    pub falloff: f64,
}

impl Default for ReverbConfig {
    fn default() -> Self {
        Self {
            taps: vec![0.03, 0.08, 0.15, 0.25],
            wet: 0.4,
            falloff: 0.1,
        }
    }
}

/// Tone synthesizer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthConfig {
    pub sample_rate: u32,
    /// Base seed for the per-note noise generators
    pub seed: u64,
    /// Peak of every rendered tone (< 1.0)
    pub ceiling: f32,
    pub model: ToneModel,
    /// Share of the plucked string in [`ToneModel::Hybrid`]
    pub pluck_mix: f64,
    /// Feedback of the plucked-string delay loop
    pub pluck_feedback: f64,

    pub transients: Vec<TransientSpec>,
    pub vibrato: VibratoConfig,
    /// Harmonic series above the fundamental
    pub harmonics: Vec<PartialSpec>,
    /// Stretched partials giving string stiffness
    pub inharmonic: Vec<PartialSpec>,
    /// Sub- and inter-harmonic sympathetic resonances
    pub resonance: Vec<PartialSpec>,
    pub envelope: EnvelopeConfig,
    pub noise: Vec<NoiseLayer>,
    pub reverb: ReverbConfig,

    /// Soft-clip drive added at full velocity
    pub drive: f64,
    pub makeup: f64,
    pub makeup_velocity: f64,
}

impl Default for SynthConfig {
    fn default() -> Self {
        let harmonic_amps = [0.8, 0.6, 0.45, 0.35, 0.25, 0.18, 0.12, 0.08, 0.05, 0.03, 0.02];
        let harmonics = harmonic_amps
            .iter()
            .enumerate()
            .map(|(i, &amp)| {
                let n = (i + 2) as f64;
                PartialSpec::new(n, amp, 40.0 * (n - 1.0))
            })
            .collect();

        let inharmonic = (0..5)
            .map(|i| {
                let i = i as f64;
                PartialSpec::new(i + 1.0, 0.1 - 0.02 * i, 100.0 + 200.0 * i)
            })
            .collect();

        let resonance = vec![
            PartialSpec::new(0.5, 0.08, 0.0),
            PartialSpec::new(1.5, 0.065, 0.0),
            PartialSpec::new(2.5, 0.05, 0.0),
            PartialSpec::new(3.5, 0.035, 0.0),
            PartialSpec::new(4.5, 0.02, 0.0),
            PartialSpec::new(0.25, 0.06, 0.0),
            PartialSpec::new(0.75, 0.05, 0.0),
            PartialSpec::new(1.25, 0.04, 0.0),
            PartialSpec::new(1.75, 0.03, 0.0),
        ];

        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            seed: 0x6b65_7966_616c_6c00,
            ceiling: 0.85,
            model: ToneModel::Additive,
            pluck_mix: 0.3,
            pluck_feedback: 0.995,
            transients: vec![
                TransientSpec {
                    ratio: 4.0,
                    amplitude: 0.6,
                    decay: 150.0,
                },
                TransientSpec {
                    ratio: 8.0,
                    amplitude: 0.3,
                    decay: 200.0,
                },
            ],
            vibrato: VibratoConfig::default(),
            harmonics,
            inharmonic,
            resonance,
            envelope: EnvelopeConfig::default(),
            noise: vec![
                NoiseLayer {
                    sigma: 0.03,
                    decay: 120.0,
                },
                NoiseLayer {
                    sigma: 0.008,
                    decay: 15.0,
                },
                NoiseLayer {
                    sigma: 0.005,
                    decay: 8.0,
                },
            ],
            reverb: ReverbConfig::default(),
            drive: 0.3,
            makeup: 0.7,
            makeup_velocity: 0.2,
        }
    }
}

impl SynthConfig {
    /// Plain additive partials only: no noise, reverb or transient
    pub fn clean() -> Self {
        Self {
            transients: Vec::new(),
            noise: Vec::new(),
            reverb: ReverbConfig {
                taps: Vec::new(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_model(mut self, model: ToneModel) -> Self {
        self.model = model;
        self
    }

    pub fn with_ceiling(mut self, ceiling: f32) -> Self {
        self.ceiling = ceiling;
        self
    }

    pub fn validate(&self) -> SynthResult<()> {
        if self.sample_rate == 0 {
            return invalid("sample rate must be positive");
        }
        if !(self.ceiling > 0.0 && self.ceiling < 1.0) {
            return invalid("tone ceiling must lie in (0, 1)");
        }
        if !(0.0..=1.0).contains(&self.pluck_mix) {
            return invalid("pluck mix must lie in [0, 1]");
        }
        if !(0.0..1.0).contains(&self.pluck_feedback) {
            return invalid("pluck feedback must lie in [0, 1)");
        }
        let env = &self.envelope;
        let times = [
            env.attack,
            env.attack_soft,
            env.decay,
            env.decay_soft,
            env.min_release,
            env.short_attack,
            env.short_decay,
            env.short_min_release,
        ];
        if times.iter().any(|t| !t.is_finite() || *t < 0.0) {
            return invalid("envelope times must be non-negative");
        }
        if !(0.0..=1.0).contains(&env.release_ratio) {
            return invalid("release ratio must lie in [0, 1]");
        }
        if env.sustain < 0.0 || env.short_sustain < 0.0 || env.overshoot < 0.0 {
            return invalid("envelope levels must be non-negative");
        }
        if self.reverb.taps.iter().any(|t| !t.is_finite() || *t <= 0.0) {
            return invalid("reverb taps must be positive");
        }
        if self.noise.iter().any(|n| n.sigma < 0.0 || n.decay < 0.0) {
            return invalid("noise layers must be non-negative");
        }
        Ok(())
    }
}

/// How rendered tones are merged into the master buffer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategy {
    /// Render in parallel, then merge in note order on one thread
    #[default]
    Sequential,
    /// Merge from the worker threads under a lock
    Locked,
}

/// Mixdown configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixConfig {
    /// Silence appended while accumulating so release tails are not cut
    pub tail_pad: f64,
    /// Peak of the final mix (< 1.0)
    pub ceiling: f32,
    /// Output length in seconds; defaults to the latest note end
    pub target_duration: Option<f64>,
    /// Worker threads (0 = rayon default)
    pub threads: usize,
    pub merge: MergeStrategy,
    /// Render melody notes only
    pub melody_only: bool,
    /// Notes shorter than this are not rendered (s)
    pub min_note_duration: f64,
}

impl Default for MixConfig {
    fn default() -> Self {
        Self {
            tail_pad: 2.0,
            ceiling: 0.8,
            target_duration: None,
            threads: 0,
            merge: MergeStrategy::Sequential,
            melody_only: false,
            min_note_duration: 0.01,
        }
    }
}

impl MixConfig {
    pub fn with_threads(mut self, count: usize) -> Self {
        self.threads = count;
        self
    }

    pub fn with_target_duration(mut self, seconds: f64) -> Self {
        self.target_duration = Some(seconds);
        self
    }

    pub fn with_merge(mut self, merge: MergeStrategy) -> Self {
        self.merge = merge;
        self
    }

    pub fn melody_only(mut self) -> Self {
        self.melody_only = true;
        self
    }

    pub fn validate(&self) -> SynthResult<()> {
        if !(self.ceiling > 0.0 && self.ceiling < 1.0) {
            return invalid("mix ceiling must lie in (0, 1)");
        }
        if !self.tail_pad.is_finite() || self.tail_pad < 0.0 {
            return invalid("tail pad must be non-negative");
        }
        if self
            .target_duration
            .is_some_and(|d| !d.is_finite() || d < 0.0)
        {
            return invalid("target duration must be non-negative");
        }
        if self.min_note_duration < 0.0 {
            return invalid("minimum note duration must be non-negative");
        }
        Ok(())
    }
}

fn invalid(message: &str) -> SynthResult<()> {
    Err(SynthError::InvalidConfig(message.to_string()))
}
