//! Per-onset dominant frequency
//!
//! The strongest bin inside `[fmin, fmax]` is searched in the onset frame and
//! a few frames after it, so the estimate sees the settled attack rather than
//! a window only half filled by the new note.

use kf_core::{BeatGrid, Onset};
use serde::{Deserialize, Serialize};

use crate::config::PitchConfig;
use crate::spectrum::Spectrogram;

/// Frequency and strength found at one onset
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PitchEstimate {
    pub onset: Onset,
    /// Dominant frequency in Hz (0 when nothing was found)
    pub frequency: f64,
    /// Peak magnitude relative to the loudest bin of the whole signal (0..=1)
    pub magnitude: f32,
    /// Within tolerance of a beat
    pub on_beat: bool,
}

impl PitchEstimate {
    #[inline]
    pub fn time(&self) -> f64 {
        self.onset.time
    }
}

/// Dominant-bin pitch estimation at onsets
#[derive(Debug, Clone)]
pub struct PitchAnalyzer {
    config: PitchConfig,
}

impl PitchAnalyzer {
    pub fn new(config: &PitchConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// One estimate per onset, in onset order
    pub fn estimate(&self, spec: &Spectrogram, onsets: &[Onset], grid: &BeatGrid) -> Vec<PitchEstimate> {
        onsets
            .iter()
            .map(|&onset| {
                let (frequency, magnitude) = self.dominant_peak(spec, onset.frame).unwrap_or((0.0, 0.0));
                PitchEstimate {
                    onset,
                    frequency,
                    magnitude,
                    on_beat: grid.is_on_beat(onset.time, self.config.on_beat_tolerance),
                }
            })
            .collect()
    }

    /// Strongest in-range bin over the onset frame and its look-ahead,
    /// refined by parabolic interpolation
    fn dominant_peak(&self, spec: &Spectrogram, frame: usize) -> Option<(f64, f32)> {
        if spec.is_empty() || spec.peak() <= 0.0 {
            return None;
        }

        let bin_hz = spec.bin_hz();
        let lo = ((self.config.fmin / bin_hz).ceil() as usize).max(1);
        let hi = ((self.config.fmax / bin_hz).floor() as usize).min(spec.num_bins() - 2);
        if lo > hi {
            return None;
        }

        let first = frame.min(spec.num_frames() - 1);
        let last = (frame + self.config.lookahead_frames).min(spec.num_frames() - 1);

        let mut best: Option<(usize, usize, f32)> = None;
        for f in first..=last {
            let mags = spec.frame(f);
            for (k, &m) in mags.iter().enumerate().take(hi + 1).skip(lo) {
                if best.is_none_or(|(_, _, b)| m > b) {
                    best = Some((f, k, m));
                }
            }
        }

        let (f, k, m) = best?;
        if m <= 0.0 {
            return None;
        }

        let mags = spec.frame(f);
        let (alpha, beta, gamma) = (mags[k - 1], mags[k], mags[k + 1]);
        let denom = alpha - 2.0 * beta + gamma;
        let offset = if denom.abs() > f32::EPSILON {
            (0.5 * (alpha - gamma) / denom).clamp(-0.5, 0.5)
        } else {
            0.0
        };

        let frequency = spec.bin_frequency(k as f64 + offset as f64);
        Some((frequency, (m / spec.peak()).min(1.0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SpectrumConfig;
    use std::f32::consts::PI;

    fn tone_at(freq: f32, start: f32, seconds: f32, total: f32, sample_rate: u32) -> Vec<f32> {
        let mut samples = vec![0.0; (total * sample_rate as f32) as usize];
        let begin = (start * sample_rate as f32) as usize;
        let end = ((start + seconds) * sample_rate as f32) as usize;
        for (i, s) in samples[begin..end].iter_mut().enumerate() {
            *s = (2.0 * PI * freq * i as f32 / sample_rate as f32).sin();
        }
        samples
    }

    #[test]
    fn test_estimates_sine_frequency() {
        let samples = tone_at(440.0, 0.2, 0.5, 1.0, 44100);
        let spec = Spectrogram::compute(&samples, 44100, &SpectrumConfig::default()).unwrap();
        let frame = (0.2 * 44100.0 / 512.0) as usize;
        let onset = Onset::new(spec.frame_time(frame), frame);

        let analyzer = PitchAnalyzer::new(&PitchConfig::default());
        let estimates = analyzer.estimate(&spec, &[onset], &BeatGrid::empty());

        assert_eq!(estimates.len(), 1);
        let est = estimates[0];
        assert!((est.frequency - 440.0).abs() < 5.0, "got {} Hz", est.frequency);
        assert!(est.magnitude > 0.9);
        assert!(!est.on_beat);
    }

    #[test]
    fn test_on_beat_flag() {
        let samples = tone_at(660.0, 0.5, 0.3, 1.0, 44100);
        let spec = Spectrogram::compute(&samples, 44100, &SpectrumConfig::default()).unwrap();
        let frame = (0.5_f64 * 44100.0 / 512.0).round() as usize;
        let onset = Onset::new(spec.frame_time(frame), frame);
        let grid = BeatGrid::new(120.0, vec![0.0, 0.5]).unwrap();

        let est = PitchAnalyzer::new(&PitchConfig::default()).estimate(&spec, &[onset], &grid)[0];
        assert!(est.on_beat);
        assert!((est.frequency - 660.0).abs() < 5.0);
    }

    #[test]
    fn test_silence_yields_zero_estimate() {
        let spec = Spectrogram::compute(&vec![0.0; 8192], 44100, &SpectrumConfig::default()).unwrap();
        let onset = Onset::new(0.0, 0);
        let est = PitchAnalyzer::new(&PitchConfig::default()).estimate(&spec, &[onset], &BeatGrid::empty())[0];
        assert_eq!(est.frequency, 0.0);
        assert_eq!(est.magnitude, 0.0);
    }
}
