//! Short-time magnitude spectrum
//!
//! Frames are centered: frame `i` covers samples
//! `[i·hop − n_fft/2, i·hop + n_fft/2)`, zero-padded past either end, so frame
//! times line up with `i·hop / sample_rate`.

use std::f32::consts::PI;
use std::sync::Arc;

use kf_core::frame_to_seconds;
use rayon::prelude::*;
use realfft::{RealFftPlanner, RealToComplex};
use rustfft::num_complex::Complex;

use crate::config::SpectrumConfig;
use crate::{AnalysisError, AnalysisResult};

/// Magnitude spectrogram of a mono signal
#[derive(Debug, Clone)]
pub struct Spectrogram {
    frames: Vec<Vec<f32>>,
    sample_rate: u32,
    n_fft: usize,
    hop_size: usize,
    peak: f32,
}

impl Spectrogram {
    /// Analyse `samples`. Signals shorter than one window yield no frames.
    pub fn compute(samples: &[f32], sample_rate: u32, config: &SpectrumConfig) -> AnalysisResult<Self> {
        let n_fft = config.n_fft;
        let hop_size = config.hop_size;

        if samples.len() < n_fft {
            return Ok(Self {
                frames: Vec::new(),
                sample_rate,
                n_fft,
                hop_size,
                peak: 0.0,
            });
        }

        let mut planner = RealFftPlanner::<f32>::new();
        let fft: Arc<dyn RealToComplex<f32>> = planner.plan_fft_forward(n_fft);
        let window = hann_window(n_fft);
        let num_frames = 1 + samples.len() / hop_size;
        let half = n_fft / 2;

        let frames = (0..num_frames)
            .into_par_iter()
            .map_init(
                || (fft.make_input_vec(), fft.make_output_vec()),
                |buffers: &mut (Vec<f32>, Vec<Complex<f32>>), idx| -> AnalysisResult<Vec<f32>> {
                    let (input, output) = buffers;
                    let center = idx * hop_size;
                    for (i, slot) in input.iter_mut().enumerate() {
                        // Signed position; outside the signal reads as silence
                        let pos = (center + i).checked_sub(half);
                        let sample = pos.and_then(|p| samples.get(p)).copied().unwrap_or(0.0);
                        *slot = sample * window[i];
                    }
                    fft.process(input, output)
                        .map_err(|e| AnalysisError::Fft(format!("{:?}", e)))?;
                    Ok(output.iter().map(|c| (c.re * c.re + c.im * c.im).sqrt()).collect())
                },
            )
            .collect::<AnalysisResult<Vec<_>>>()?;

        let peak = frames
            .iter()
            .flat_map(|frame| frame.iter())
            .fold(0.0f32, |acc, &m| acc.max(m));

        log::debug!(
            "Spectrogram: {} frames x {} bins (n_fft {}, hop {})",
            num_frames,
            half + 1,
            n_fft,
            hop_size
        );

        Ok(Self {
            frames,
            sample_rate,
            n_fft,
            hop_size,
            peak,
        })
    }

    #[inline]
    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn num_bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    #[inline]
    pub fn frame(&self, idx: usize) -> &[f32] {
        &self.frames[idx]
    }

    #[inline]
    pub fn frames(&self) -> &[Vec<f32>] {
        &self.frames
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[inline]
    pub fn hop_size(&self) -> usize {
        self.hop_size
    }

    #[inline]
    pub fn n_fft(&self) -> usize {
        self.n_fft
    }

    /// Largest magnitude over all frames and bins
    #[inline]
    pub fn peak(&self) -> f32 {
        self.peak
    }

    /// Frames per second
    #[inline]
    pub fn frame_rate(&self) -> f64 {
        self.sample_rate as f64 / self.hop_size as f64
    }

    /// Center time of frame `idx` in seconds
    #[inline]
    pub fn frame_time(&self, idx: usize) -> f64 {
        frame_to_seconds(idx, self.hop_size, self.sample_rate)
    }

    /// Width of one bin in Hz
    #[inline]
    pub fn bin_hz(&self) -> f64 {
        self.sample_rate as f64 / self.n_fft as f64
    }

    #[inline]
    pub fn bin_frequency(&self, bin: f64) -> f64 {
        bin * self.bin_hz()
    }
}

/// Periodic Hann window
pub fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / size as f32).cos()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generate_sine(freq: f32, sample_rate: u32, seconds: f32) -> Vec<f32> {
        let n = (sample_rate as f32 * seconds) as usize;
        (0..n)
            .map(|i| (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn test_short_signal_has_no_frames() {
        let spec = Spectrogram::compute(&[0.1; 100], 44100, &SpectrumConfig::default()).unwrap();
        assert!(spec.is_empty());
        assert_eq!(spec.peak(), 0.0);
    }

    #[test]
    fn test_frame_layout() {
        let samples = generate_sine(440.0, 44100, 1.0);
        let spec = Spectrogram::compute(&samples, 44100, &SpectrumConfig::default()).unwrap();
        assert_eq!(spec.num_frames(), 1 + 44100 / 512);
        assert_eq!(spec.num_bins(), 1025);
        assert!((spec.frame_time(86) - 86.0 * 512.0 / 44100.0).abs() < 1e-12);
    }

    #[test]
    fn test_sine_peak_bin() {
        let samples = generate_sine(1000.0, 44100, 0.5);
        let spec = Spectrogram::compute(&samples, 44100, &SpectrumConfig::default()).unwrap();
        let frame = spec.frame(spec.num_frames() / 2);
        let (bin, _) = frame
            .iter()
            .enumerate()
            .fold((0, 0.0f32), |best, (i, &m)| if m > best.1 { (i, m) } else { best });
        // 1000 Hz / 21.53 Hz per bin ≈ 46.4
        assert!(bin == 46 || bin == 47, "peak bin {}", bin);
        assert!((spec.peak() - frame[bin]).abs() / spec.peak() < 0.05);
    }

    #[test]
    fn test_hann_window_shape() {
        let w = hann_window(8);
        assert_eq!(w[0], 0.0);
        assert!((w[4] - 1.0).abs() < 1e-6);
        assert!((w[2] - w[6]).abs() < 1e-6);
    }
}
