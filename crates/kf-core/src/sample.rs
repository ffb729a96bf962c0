//! Sample types and audio buffer definitions

use crate::{KfError, KfResult};

/// Type alias for audio samples
pub type Sample = f32;

/// Decoded PCM input
///
/// Interleaved when `channels > 1`. Never mutated once produced; analysis
/// works on a mono copy (see [`Signal::to_mono`]).
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    samples: Vec<Sample>,
    sample_rate: u32,
    channels: u16,
}

impl Signal {
    pub fn new(samples: Vec<Sample>, sample_rate: u32, channels: u16) -> KfResult<Self> {
        if sample_rate == 0 {
            return Err(KfError::InvalidSampleRate(sample_rate));
        }
        if channels == 0 || samples.len() % channels as usize != 0 {
            return Err(KfError::InvalidChannels {
                samples: samples.len(),
                channels,
            });
        }
        Ok(Self {
            samples,
            sample_rate,
            channels,
        })
    }

    /// Single-channel signal
    pub fn mono(samples: Vec<Sample>, sample_rate: u32) -> KfResult<Self> {
        Self::new(samples, sample_rate, 1)
    }

    /// Average all channels down to one
    pub fn to_mono(&self) -> Signal {
        if self.channels == 1 {
            return self.clone();
        }
        let channels = self.channels as usize;
        let scale = 1.0 / channels as Sample;
        let samples = self
            .samples
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<Sample>() * scale)
            .collect();
        Signal {
            samples,
            sample_rate: self.sample_rate,
            channels: 1,
        }
    }

    #[inline]
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[inline]
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Number of sample frames (samples per channel)
    #[inline]
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    pub fn into_samples(self) -> Vec<Sample> {
        self.samples
    }
}

/// Absolute peak of a sample slice
#[inline]
pub fn peak(samples: &[Sample]) -> Sample {
    samples.iter().fold(0.0, |acc, s| acc.max(s.abs()))
}

/// Root mean square of a sample slice
pub fn rms(samples: &[Sample]) -> Sample {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum / samples.len() as f64).sqrt() as Sample
}

/// Rendered waveform of a single note
///
/// Empty for degenerate notes; length is otherwise `round(duration · sample_rate)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToneBuffer {
    samples: Vec<Sample>,
}

impl ToneBuffer {
    pub fn new(samples: Vec<Sample>) -> Self {
        Self { samples }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    #[inline]
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn peak(&self) -> Sample {
        peak(&self.samples)
    }

    pub fn into_inner(self) -> Vec<Sample> {
        self.samples
    }
}

/// Final mixed output
#[derive(Debug, Clone, PartialEq)]
pub struct MasterBuffer {
    samples: Vec<Sample>,
    sample_rate: u32,
}

impl MasterBuffer {
    pub fn new(samples: Vec<Sample>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    #[inline]
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn peak(&self) -> Sample {
        peak(&self.samples)
    }

    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Reinterpret as a mono [`Signal`], e.g. to re-analyse a render
    pub fn into_signal(self) -> KfResult<Signal> {
        Signal::mono(self.samples, self.sample_rate)
    }
}
