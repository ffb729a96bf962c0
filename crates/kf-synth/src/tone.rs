//! Piano-like tone synthesis
//!
//! A note is built from:
//! - a short hammer transient of high, fast-decaying partials
//! - the fundamental with a slow, velocity-dependent vibrato
//! - a detuned harmonic series plus slightly stretched inharmonic partials
//! - sympathetic string and soundboard resonances
//! - an ADSR envelope, seeded noise layers and a short tapped reverb
//!
//! The result is soft-clipped and normalized to the configured ceiling.

use std::f64::consts::TAU;

use kf_core::{NoteEvent, ToneBuffer, seconds_to_samples};

use crate::config::{PartialSpec, SynthConfig, ToneModel};
use crate::envelope::envelope;
use crate::karplus::pluck;
use crate::noise::{add_noise, note_seed};
use crate::reverb::add_reverb;
use crate::shape::{normalize_peak, soft_clip, to_samples};
use crate::SynthResult;

/// Anything that can turn a note into a waveform
pub trait ToneSource: Send + Sync {
    fn sample_rate(&self) -> u32;

    /// Render `duration` seconds of `frequency` Hz at MIDI `velocity`.
    ///
    /// Degenerate input yields an empty buffer.
    fn render(&self, frequency: f64, duration: f64, velocity: u8) -> ToneBuffer;

    fn render_note(&self, note: &NoteEvent) -> ToneBuffer {
        self.render(note.frequency(), note.duration(), note.velocity())
    }
}

/// Additive piano synthesizer
#[derive(Debug, Clone)]
pub struct ToneSynthesizer {
    config: SynthConfig,
}

impl ToneSynthesizer {
    pub fn new(config: SynthConfig) -> SynthResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SynthConfig {
        &self.config
    }

    fn sr(&self) -> f64 {
        self.config.sample_rate as f64
    }

    /// Add a fixed-frequency partial set; partials at or above Nyquist are skipped
    fn add_partials(&self, out: &mut [f64], partials: &[PartialSpec], fundamental: f64, gain: f64) {
        let nyquist = self.sr() / 2.0;
        for partial in partials {
            let freq = partial.frequency(fundamental);
            if freq >= nyquist {
                continue;
            }
            let amp = partial.amplitude * gain;
            let step = TAU * freq / self.sr();
            for (i, sample) in out.iter_mut().enumerate() {
                *sample += amp * (step * i as f64).sin();
            }
        }
    }

    fn add_transients(&self, out: &mut [f64], fundamental: f64, v: f64) {
        let sr = self.sr();
        for transient in &self.config.transients {
            let freq = fundamental * transient.ratio;
            if freq >= sr / 2.0 {
                continue;
            }
            let amp = transient.amplitude * v;
            for (i, sample) in out.iter_mut().enumerate() {
                let t = i as f64 / sr;
                *sample += amp * (TAU * freq * t).sin() * (-transient.decay * t).exp();
            }
        }
    }

    /// Fundamental with vibrato; phase is integrated so the pitch drift is smooth
    fn add_fundamental(&self, out: &mut [f64], fundamental: f64, v: f64) {
        let sr = self.sr();
        if fundamental >= sr / 2.0 {
            return;
        }
        let vibrato = &self.config.vibrato;
        let rate = vibrato.rate + vibrato.rate_velocity * v;
        let depth = vibrato.depth + vibrato.depth_velocity * v;

        let mut phase = 0.0_f64;
        for (i, sample) in out.iter_mut().enumerate() {
            *sample += phase.sin();
            let t = i as f64 / sr;
            let inst = fundamental * (1.0 + depth * (TAU * rate * t).sin());
            phase = (phase + TAU * inst / sr) % TAU;
        }
    }

    /// Envelope-shaped additive voice before noise and reverb
    fn additive(&self, frequency: f64, duration: f64, v: f64, len: usize) -> Vec<f64> {
        let mut voice = vec![0.0; len];
        self.add_transients(&mut voice, frequency, v);
        self.add_fundamental(&mut voice, frequency, v);
        self.add_partials(&mut voice, &self.config.harmonics, frequency, 0.5 + 0.5 * v);
        self.add_partials(&mut voice, &self.config.inharmonic, frequency, v);
        self.add_partials(&mut voice, &self.config.resonance, frequency, v);

        let env = envelope(&self.config.envelope, duration, v, len, self.config.sample_rate);
        for (s, e) in voice.iter_mut().zip(&env) {
            *s *= e;
        }
        voice
    }
}

impl ToneSource for ToneSynthesizer {
    fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    fn render(&self, frequency: f64, duration: f64, velocity: u8) -> ToneBuffer {
        let sr = self.config.sample_rate;
        let len = seconds_to_samples(duration, sr);
        if !frequency.is_finite() || frequency <= 0.0 || len == 0 {
            log::debug!(
                "Skipping degenerate tone: {:.2} Hz for {:.4}s",
                frequency,
                duration
            );
            return ToneBuffer::empty();
        }

        let v = velocity.min(kf_core::MAX_VELOCITY) as f64 / kf_core::MAX_VELOCITY as f64;
        let seed = note_seed(self.config.seed, frequency, duration, velocity);

        let mut voice = self.additive(frequency, duration, v, len);
        add_noise(&mut voice, &self.config.noise, v, sr, seed);

        let dry = voice.clone();
        add_reverb(&mut voice, &dry, &self.config.reverb, v, sr);

        if self.config.model == ToneModel::Hybrid {
            let mut string = pluck(frequency, len, sr, self.config.pluck_feedback, seed.rotate_left(17));
            let env = envelope(&self.config.envelope, duration, v, len, sr);
            for (s, e) in string.iter_mut().zip(&env) {
                *s *= e;
            }
            normalize_peak(&mut voice, 1.0);
            normalize_peak(&mut string, 1.0);
            let mix = self.config.pluck_mix;
            for (a, b) in voice.iter_mut().zip(&string) {
                *a = (1.0 - mix) * *a + mix * b;
            }
        }

        normalize_peak(&mut voice, 1.0);
        soft_clip(
            &mut voice,
            1.0 + self.config.drive * v,
            self.config.makeup + self.config.makeup_velocity * v,
        );
        ToneBuffer::new(to_samples(voice, self.config.ceiling))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synth() -> ToneSynthesizer {
        ToneSynthesizer::new(SynthConfig::default()).unwrap()
    }

    #[test]
    fn test_length_matches_duration() {
        let synth = synth();
        for &duration in &[0.02, 0.1, 0.5, 1.234] {
            let tone = synth.render(261.63, duration, 90);
            assert_eq!(tone.len(), (duration * 44100.0_f64).round() as usize);
        }
    }

    #[test]
    fn test_peak_under_ceiling() {
        let synth = synth();
        for &(freq, vel) in &[(27.5, 127), (440.0, 100), (4186.0, 20), (880.0, 0)] {
            let tone = synth.render(freq, 0.5, vel);
            let peak = tone.peak();
            assert!(peak <= 0.85, "peak {} at {} Hz", peak, freq);
            assert!(peak > 0.0);
            assert!(tone.samples().iter().all(|s| s.is_finite()));
        }
    }

    #[test]
    fn test_degenerate_input_is_empty() {
        let synth = synth();
        assert!(synth.render(0.0, 1.0, 100).is_empty());
        assert!(synth.render(-440.0, 1.0, 100).is_empty());
        assert!(synth.render(f64::NAN, 1.0, 100).is_empty());
        assert!(synth.render(440.0, 0.0, 100).is_empty());
        assert!(synth.render(440.0, -1.0, 100).is_empty());
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let a = synth().render(440.0, 0.3, 100);
        let b = synth().render(440.0, 0.3, 100);
        assert_eq!(a, b);

        let reseeded = ToneSynthesizer::new(SynthConfig::default().with_seed(99))
            .unwrap()
            .render(440.0, 0.3, 100);
        assert_ne!(a, reseeded);
    }

    #[test]
    fn test_partials_above_nyquist_are_skipped() {
        // At 8 kHz most of the series of a 3 kHz note is unrepresentable
        let config = SynthConfig::default().with_sample_rate(8000);
        let tone = ToneSynthesizer::new(config).unwrap().render(3000.0, 0.2, 100);
        assert_eq!(tone.len(), 1600);
        assert!(tone.peak() <= 0.85);
    }

    #[test]
    fn test_hybrid_model() {
        let config = SynthConfig::default().with_model(ToneModel::Hybrid);
        let synth = ToneSynthesizer::new(config).unwrap();
        let hybrid = synth.render(220.0, 0.5, 100);
        let additive = self::synth().render(220.0, 0.5, 100);
        assert_eq!(hybrid.len(), additive.len());
        assert!(hybrid.peak() <= 0.85);
        assert_ne!(hybrid, additive);
    }

    #[test]
    fn test_render_note_uses_note_fields() {
        let note = NoteEvent::melody(69, 1.0, 0.25, 100).unwrap();
        let synth = synth();
        assert_eq!(synth.render_note(&note), synth.render(440.0, 0.25, 100));
    }
}
