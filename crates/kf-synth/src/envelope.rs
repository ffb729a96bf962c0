//! Velocity-dependent ADSR envelope
//!
//! Stages are laid out in whole samples and always sum to the note length.
//! Attack and decay follow exponential curves, release decays to exactly zero.

use crate::config::EnvelopeConfig;

/// Stage lengths in seconds and levels for one note
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvelopeShape {
    pub attack: f64,
    pub decay: f64,
    pub release: f64,
    pub peak: f64,
    pub sustain: f64,
}

impl EnvelopeShape {
    /// Shape for a note of `duration` seconds at normalized velocity `v`
    pub fn for_note(config: &EnvelopeConfig, duration: f64, v: f64) -> Self {
        let v = v.clamp(0.0, 1.0);
        let peak = 1.0 + config.overshoot * v;

        let mut shape = if duration < config.short_note {
            let attack = config.short_attack;
            let decay = config.short_decay;
            Self {
                attack,
                decay,
                release: (duration - attack - decay).max(config.short_min_release),
                peak,
                sustain: config.short_sustain * v,
            }
        } else {
            Self {
                attack: config.attack + (1.0 - v) * config.attack_soft,
                decay: config.decay + (1.0 - v) * config.decay_soft,
                release: (duration * config.release_ratio).max(config.min_release),
                peak,
                sustain: config.sustain * v,
            }
        };

        let total = shape.attack + shape.decay + shape.release;
        if total > duration && total > 0.0 {
            let scale = duration / total;
            shape.attack *= scale;
            shape.decay *= scale;
            shape.release *= scale;
        }
        shape
    }
}

/// Stage lengths in samples; always sums to the rendered length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageSamples {
    pub attack: usize,
    pub decay: usize,
    pub sustain: usize,
    pub release: usize,
}

impl StageSamples {
    pub fn layout(shape: &EnvelopeShape, len: usize, sample_rate: u32) -> Self {
        let sr = sample_rate as f64;
        let mut attack = (shape.attack * sr).round() as usize;
        let mut decay = (shape.decay * sr).round() as usize;
        let mut release = (shape.release * sr).round() as usize;

        // Rounding can overshoot by a sample or two
        let mut excess = (attack + decay + release).saturating_sub(len);
        for stage in [&mut release, &mut decay, &mut attack] {
            let cut = excess.min(*stage);
            *stage -= cut;
            excess -= cut;
        }

        Self {
            attack,
            decay,
            sustain: len - attack - decay - release,
            release,
        }
    }

    #[inline]
    pub fn total(&self) -> usize {
        self.attack + self.decay + self.sustain + self.release
    }
}

/// Normalized exponential rise/fall: 0 at x = 0, 1 at x = 1
#[inline]
fn curve(x: f64, k: f64) -> f64 {
    (1.0 - (-k * x).exp()) / (1.0 - (-k).exp())
}

/// Render the envelope of `len` samples
pub fn envelope(config: &EnvelopeConfig, duration: f64, v: f64, len: usize, sample_rate: u32) -> Vec<f64> {
    let shape = EnvelopeShape::for_note(config, duration, v);
    let stages = StageSamples::layout(&shape, len, sample_rate);
    let mut out = Vec::with_capacity(len);

    for i in 0..stages.attack {
        let x = (i + 1) as f64 / stages.attack as f64;
        out.push(shape.peak * curve(x, 3.0));
    }

    for i in 0..stages.decay {
        let x = (i + 1) as f64 / stages.decay as f64;
        out.push(shape.peak - (shape.peak - shape.sustain) * curve(x, 4.0));
    }

    out.extend(std::iter::repeat_n(shape.sustain, stages.sustain));

    let release_from = if stages.decay + stages.sustain > 0 {
        shape.sustain
    } else {
        shape.peak
    };
    for i in 0..stages.release {
        let x = (i + 1) as f64 / stages.release as f64;
        out.push(release_from * (1.0 - curve(x, 5.0)));
    }

    debug_assert_eq!(out.len(), len);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const SR: u32 = 44100;

    fn stages(duration: f64, v: f64) -> (EnvelopeShape, StageSamples) {
        let shape = EnvelopeShape::for_note(&EnvelopeConfig::default(), duration, v);
        let len = (duration * SR as f64).round() as usize;
        (shape, StageSamples::layout(&shape, len, SR))
    }

    #[test]
    fn test_stages_sum_to_length() {
        for &(duration, v) in &[(1.0, 0.8), (0.04, 0.5), (0.1, 1.0), (0.0501, 0.1), (2.0, 0.0)] {
            let (_, s) = stages(duration, v);
            assert_eq!(s.total(), (duration * SR as f64).round() as usize);
        }
    }

    #[test]
    fn test_sustain_is_constant_and_release_ends_at_zero() {
        let config = EnvelopeConfig::default();
        let len = SR as usize;
        let env = envelope(&config, 1.0, 0.8, len, SR);
        let (shape, s) = stages(1.0, 0.8);
        assert_relative_eq!(shape.sustain, 0.24, epsilon = 1e-12);

        let sustain = &env[s.attack + s.decay..s.attack + s.decay + s.sustain];
        assert!(!sustain.is_empty());
        assert!(sustain.iter().all(|&x| x == shape.sustain));

        let release = &env[len - s.release..];
        assert!(release.windows(2).all(|w| w[1] <= w[0]));
        assert_eq!(*env.last().unwrap(), 0.0);
    }

    #[test]
    fn test_attack_reaches_peak() {
        let config = EnvelopeConfig::default();
        let env = envelope(&config, 1.0, 1.0, SR as usize, SR);
        let (shape, s) = stages(1.0, 1.0);
        assert_relative_eq!(env[s.attack - 1], shape.peak, epsilon = 1e-9);
        assert_relative_eq!(shape.peak, 1.15, epsilon = 1e-12);
        assert!(env[..s.attack].windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn test_short_note_is_compressed() {
        let (shape, s) = stages(0.02, 1.0);
        assert_relative_eq!(shape.attack + shape.decay + shape.release, 0.02, epsilon = 1e-9);
        assert_eq!(s.total(), 882);
        assert_relative_eq!(shape.sustain, 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_soft_notes_attack_slower() {
        let config = EnvelopeConfig::default();
        let soft = EnvelopeShape::for_note(&config, 1.0, 0.1);
        let hard = EnvelopeShape::for_note(&config, 1.0, 1.0);
        assert!(soft.attack > hard.attack);
        assert!(soft.decay > hard.decay);
        assert!(soft.peak < hard.peak);
    }
}
