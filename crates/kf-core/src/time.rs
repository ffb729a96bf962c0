//! Time-related types: sample/second conversion, beat grids, onsets

use serde::{Deserialize, Serialize};

use crate::{KfError, KfResult};

/// Seconds → sample count, rounded to the nearest sample
#[inline]
pub fn seconds_to_samples(seconds: f64, sample_rate: u32) -> usize {
    if !seconds.is_finite() || seconds <= 0.0 {
        return 0;
    }
    (seconds * sample_rate as f64).round() as usize
}

#[inline]
pub fn samples_to_seconds(samples: usize, sample_rate: u32) -> f64 {
    samples as f64 / sample_rate as f64
}

/// Analysis frame index → center time in seconds
#[inline]
pub fn frame_to_seconds(frame: usize, hop_size: usize, sample_rate: u32) -> f64 {
    (frame * hop_size) as f64 / sample_rate as f64
}

/// Tempo in BPM
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tempo(pub f64);

impl Tempo {
    pub const DEFAULT: Self = Self(120.0);

    #[inline]
    pub fn beat_duration_secs(self) -> f64 {
        60.0 / self.0
    }
}

/// Tempo plus ordered beat timestamps
///
/// An empty grid means no periodicity could be established.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawBeatGrid")]
pub struct BeatGrid {
    tempo_bpm: f64,
    beats: Vec<f64>,
}

#[derive(Deserialize)]
struct RawBeatGrid {
    tempo_bpm: f64,
    beats: Vec<f64>,
}

impl TryFrom<RawBeatGrid> for BeatGrid {
    type Error = KfError;

    fn try_from(raw: RawBeatGrid) -> KfResult<Self> {
        Self::new(raw.tempo_bpm, raw.beats)
    }
}

impl BeatGrid {
    /// Validates that timestamps are finite, non-negative and strictly increasing
    pub fn new(tempo_bpm: f64, beats: Vec<f64>) -> KfResult<Self> {
        if !tempo_bpm.is_finite() || tempo_bpm < 0.0 {
            return Err(KfError::InvalidParam(format!("tempo {tempo_bpm} BPM")));
        }
        for (i, &t) in beats.iter().enumerate() {
            if !t.is_finite() || t < 0.0 {
                return Err(KfError::InvalidParam(format!("beat {i} at {t}s")));
            }
            if i > 0 && t <= beats[i - 1] {
                return Err(KfError::UnorderedBeats(i));
            }
        }
        Ok(Self { tempo_bpm, beats })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    #[inline]
    pub fn tempo_bpm(&self) -> f64 {
        self.tempo_bpm
    }

    #[inline]
    pub fn beats(&self) -> &[f64] {
        &self.beats
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.beats.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.beats.len()
    }

    /// Seconds per beat, if a tempo was found
    pub fn beat_period(&self) -> Option<f64> {
        (self.tempo_bpm > 0.0).then(|| Tempo(self.tempo_bpm).beat_duration_secs())
    }

    /// Distance from `time` to the closest beat
    pub fn nearest_distance(&self, time: f64) -> Option<f64> {
        if self.beats.is_empty() {
            return None;
        }
        let idx = self.beats.partition_point(|&b| b < time);
        let after = self.beats.get(idx).map(|&b| b - time);
        let before = idx.checked_sub(1).map(|i| time - self.beats[i]);
        match (before, after) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Whether `time` lies within `tolerance` seconds of any beat.
    /// Always false for an empty grid.
    pub fn is_on_beat(&self, time: f64, tolerance: f64) -> bool {
        self.nearest_distance(time).is_some_and(|d| d < tolerance)
    }
}

/// Detected note onset
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Onset {
    /// Onset time in seconds
    pub time: f64,
    /// Analysis frame the onset was picked from
    pub frame: usize,
}

impl Onset {
    pub fn new(time: f64, frame: usize) -> Self {
        Self { time, frame }
    }
}
