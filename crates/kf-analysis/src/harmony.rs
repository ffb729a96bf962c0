//! Harmony analysis: chroma, bass line, key and chords

use std::fmt;

use kf_core::{BeatGrid, ChromaFrame, NOTE_NAMES, frequency_to_pitch, pitch_class};
use serde::{Deserialize, Serialize};

use crate::config::HarmonyConfig;
use crate::spectrum::Spectrogram;

/// Krumhansl–Schmuckler major key profile, tonic first
pub const MAJOR_PROFILE: [f32; 12] = [
    6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88,
];

/// Krumhansl–Schmuckler minor key profile, tonic first
pub const MINOR_PROFILE: [f32; 12] = [
    6.33, 2.68, 3.52, 5.38, 2.60, 3.53, 2.54, 4.75, 3.98, 2.69, 3.34, 3.17,
];

const MAJOR_TRIAD: [u8; 3] = [0, 4, 7];
const MINOR_TRIAD: [u8; 3] = [0, 3, 7];

// ═══════════════════════════════════════════════════════════════════════════════
// TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// Strongest bass pitch sampled at a beat
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BassSample {
    /// Beat time in seconds
    pub time: f64,
    /// MIDI pitch in the bass octave
    pub pitch: u8,
    /// Normalized chroma energy of the chosen class
    pub strength: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Major,
    Minor,
}

/// Estimated tonal center
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeyEstimate {
    /// Pitch class of the tonic (0 = C)
    pub tonic: u8,
    pub mode: Mode,
    /// Pearson correlation with the winning profile
    pub correlation: f32,
}

impl fmt::Display for KeyEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match self.mode {
            Mode::Major => "major",
            Mode::Minor => "minor",
        };
        write!(f, "{} {}", NOTE_NAMES[self.tonic as usize], mode)
    }
}

/// A triad held over one or more chroma frames
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChordEvent {
    /// Time of the first frame the chord was heard
    pub time: f64,
    pub root: u8,
    pub mode: Mode,
}

impl ChordEvent {
    /// Short chord symbol, e.g. `C` or `F#m`
    pub fn symbol(&self) -> String {
        let suffix = match self.mode {
            Mode::Major => "",
            Mode::Minor => "m",
        };
        format!("{}{}", NOTE_NAMES[self.root as usize], suffix)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ANALYZER
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct HarmonyAnalyzer {
    config: HarmonyConfig,
}

impl HarmonyAnalyzer {
    pub fn new(config: &HarmonyConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Fold each frame's spectral power into 12 pitch classes, normalized so
    /// the strongest class is 1 (silent frames stay all-zero)
    pub fn chroma(&self, spec: &Spectrogram) -> Vec<ChromaFrame> {
        let classes: Vec<Option<usize>> = (0..spec.num_bins())
            .map(|k| {
                let freq = spec.bin_frequency(k as f64);
                if k == 0 || freq < self.config.chroma_fmin || freq > self.config.chroma_fmax {
                    return None;
                }
                frequency_to_pitch(freq).map(|p| pitch_class(p) as usize)
            })
            .collect();

        spec.frames()
            .iter()
            .enumerate()
            .map(|(idx, mags)| {
                let mut energy = [0.0f32; 12];
                for (class, &m) in classes.iter().zip(mags.iter()) {
                    if let Some(c) = class {
                        energy[*c] += m * m;
                    }
                }
                let max = energy.iter().copied().fold(0.0f32, f32::max);
                if max > 0.0 {
                    energy.iter_mut().for_each(|e| *e /= max);
                }
                ChromaFrame::new(spec.frame_time(idx), energy)
            })
            .collect()
    }

    /// Strongest pitch class at every `bass_beat_stride`-th beat, mapped into
    /// the bass octave. Weak or out-of-range samples are skipped.
    pub fn bass_line(&self, chroma: &[ChromaFrame], grid: &BeatGrid) -> Vec<BassSample> {
        if chroma.is_empty() {
            return Vec::new();
        }

        grid.beats()
            .iter()
            .step_by(self.config.bass_beat_stride.max(1))
            .filter_map(|&beat| {
                let frame = nearest_frame(chroma, beat);
                let (class, strength) = frame.strongest();
                if strength <= self.config.bass_threshold {
                    return None;
                }
                let pitch = self.config.bass_base_pitch.checked_add(class)?;
                if !(self.config.bass_lowest..=self.config.bass_highest).contains(&pitch) {
                    log::debug!("Bass pitch {} outside range at {:.3}s", pitch, beat);
                    return None;
                }
                Some(BassSample {
                    time: beat,
                    pitch,
                    strength,
                })
            })
            .collect()
    }

    /// Major or minor triads per chroma frame; repeats of the same chord on
    /// consecutive frames are reported once
    pub fn detect_chords(&self, chroma: &[ChromaFrame]) -> Vec<ChordEvent> {
        let mut chords: Vec<ChordEvent> = Vec::new();
        let mut previous: Option<(u8, Mode)> = None;

        for frame in chroma {
            let current = match_triad(frame, self.config.chord_threshold);
            if let Some((root, mode)) = current {
                if previous != current {
                    chords.push(ChordEvent {
                        time: frame.time,
                        root,
                        mode,
                    });
                }
            }
            previous = current;
        }

        chords
    }
}

fn nearest_frame(chroma: &[ChromaFrame], time: f64) -> &ChromaFrame {
    let idx = chroma.partition_point(|f| f.time < time);
    if idx == 0 {
        return &chroma[0];
    }
    if idx >= chroma.len() {
        return &chroma[chroma.len() - 1];
    }
    let before = &chroma[idx - 1];
    let after = &chroma[idx];
    if time - before.time <= after.time - time {
        before
    } else {
        after
    }
}

fn match_triad(frame: &ChromaFrame, threshold: f32) -> Option<(u8, Mode)> {
    let active: Vec<bool> = frame.energy.iter().map(|&e| e > threshold).collect();
    if active.iter().filter(|&&a| a).count() < 3 {
        return None;
    }

    for (mode, intervals) in [(Mode::Major, MAJOR_TRIAD), (Mode::Minor, MINOR_TRIAD)] {
        for root in 0..12u8 {
            if intervals
                .iter()
                .all(|&i| active[((root + i) % 12) as usize])
            {
                return Some((root, mode));
            }
        }
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════════
// KEY
// ═══════════════════════════════════════════════════════════════════════════════

/// Pitch class with the most accumulated chroma energy
pub fn dominant_pitch_class(chroma: &[ChromaFrame]) -> Option<u8> {
    let mean = mean_chroma(chroma)?;
    let (class, _) = ChromaFrame::new(0.0, mean).strongest();
    Some(class)
}

/// Best of the 24 major/minor keys by correlation with the averaged chroma
pub fn estimate_key(chroma: &[ChromaFrame]) -> Option<KeyEstimate> {
    let mean = mean_chroma(chroma)?;

    let mut best: Option<KeyEstimate> = None;
    for (mode, profile) in [(Mode::Major, &MAJOR_PROFILE), (Mode::Minor, &MINOR_PROFILE)] {
        for tonic in 0..12u8 {
            let correlation = rotated_correlation(&mean, profile, tonic as usize);
            if best.is_none_or(|b| correlation > b.correlation) {
                best = Some(KeyEstimate {
                    tonic,
                    mode,
                    correlation,
                });
            }
        }
    }
    best
}

fn mean_chroma(chroma: &[ChromaFrame]) -> Option<[f32; 12]> {
    if chroma.is_empty() {
        return None;
    }
    let mut sum = [0.0f32; 12];
    for frame in chroma {
        for (s, &e) in sum.iter_mut().zip(frame.energy.iter()) {
            *s += e;
        }
    }
    if sum.iter().all(|&s| s <= 0.0) {
        return None;
    }
    let n = chroma.len() as f32;
    Some(sum.map(|s| s / n))
}

/// Pearson correlation of `chroma` with `profile` transposed to `tonic`
fn rotated_correlation(chroma: &[f32; 12], profile: &[f32; 12], tonic: usize) -> f32 {
    let rotated: [f32; 12] = std::array::from_fn(|pc| profile[(pc + 12 - tonic) % 12]);

    let mean_x = chroma.iter().sum::<f32>() / 12.0;
    let mean_y = rotated.iter().sum::<f32>() / 12.0;
    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (&x, &y) in chroma.iter().zip(rotated.iter()) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    let denom = (var_x * var_y).sqrt();
    if denom > 0.0 { cov / denom } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(time: f64, classes: &[(usize, f32)]) -> ChromaFrame {
        let mut energy = [0.0; 12];
        for &(c, e) in classes {
            energy[c] = e;
        }
        ChromaFrame::new(time, energy)
    }

    #[test]
    fn test_key_of_c_major_material() {
        let chroma: Vec<ChromaFrame> = (0..20)
            .map(|i| frame(i as f64 * 0.1, &[(0, 1.0), (4, 0.6), (7, 0.8)]))
            .collect();
        let key = estimate_key(&chroma).unwrap();
        assert_eq!(key.tonic, 0);
        assert_eq!(key.mode, Mode::Major);
        assert_eq!(key.to_string(), "C major");
        assert_eq!(dominant_pitch_class(&chroma), Some(0));
    }

    #[test]
    fn test_key_of_a_minor_material() {
        let chroma = vec![frame(0.0, &[(9, 1.0), (0, 0.7), (4, 0.8)])];
        let key = estimate_key(&chroma).unwrap();
        assert_eq!((key.tonic, key.mode), (9, Mode::Minor));
    }

    #[test]
    fn test_no_key_for_silence() {
        assert!(estimate_key(&[]).is_none());
        assert!(estimate_key(&[frame(0.0, &[])]).is_none());
    }

    #[test]
    fn test_chords_collapse_repeats() {
        let analyzer = HarmonyAnalyzer::new(&HarmonyConfig::default());
        let c_major = [(0, 1.0), (4, 0.9), (7, 0.8)];
        let a_minor = [(9, 1.0), (0, 0.9), (4, 0.8)];
        let chroma = vec![
            frame(0.0, &c_major),
            frame(0.1, &c_major),
            frame(0.2, &a_minor),
            frame(0.3, &[(5, 1.0)]),
            frame(0.4, &c_major),
        ];
        let chords = analyzer.detect_chords(&chroma);
        let symbols: Vec<String> = chords.iter().map(ChordEvent::symbol).collect();
        assert_eq!(symbols, vec!["C", "Am", "C"]);
        assert_eq!(chords[1].time, 0.2);
    }

    #[test]
    fn test_bass_line_every_second_beat() {
        let analyzer = HarmonyAnalyzer::new(&HarmonyConfig::default());
        let chroma: Vec<ChromaFrame> = (0..40)
            .map(|i| frame(i as f64 * 0.05, &[(7, 1.0), (2, 0.4)]))
            .collect();
        let grid = BeatGrid::new(120.0, vec![0.0, 0.5, 1.0, 1.5]).unwrap();

        let bass = analyzer.bass_line(&chroma, &grid);
        assert_eq!(bass.len(), 2);
        assert_eq!(bass[0].time, 0.0);
        assert_eq!(bass[1].time, 1.0);
        // G in the bass octave
        assert!(bass.iter().all(|b| b.pitch == 43));
    }

    #[test]
    fn test_bass_line_skips_weak_frames() {
        let analyzer = HarmonyAnalyzer::new(&HarmonyConfig::default());
        let chroma = vec![frame(0.0, &[(3, 0.2)]), frame(1.0, &[])];
        let grid = BeatGrid::new(60.0, vec![0.0, 1.0]).unwrap();
        assert!(analyzer.bass_line(&chroma, &grid).is_empty());
        assert!(analyzer.bass_line(&chroma, &BeatGrid::empty()).is_empty());
    }
}
