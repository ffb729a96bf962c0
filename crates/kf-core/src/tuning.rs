//! Equal temperament tuning and pitch classes

use serde::{Deserialize, Serialize};

/// Concert pitch A4
pub const A4_FREQUENCY: f64 = 440.0;

/// MIDI number of A4
pub const A4_PITCH: i32 = 69;

pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// `440 · 2^((p − 69) / 12)`
#[inline]
pub fn pitch_to_frequency(pitch: u8) -> f64 {
    A4_FREQUENCY * 2f64.powf((pitch as i32 - A4_PITCH) as f64 / 12.0)
}

/// Fractional MIDI pitch of a frequency. NaN for non-positive input.
#[inline]
pub fn frequency_to_pitch_f(freq: f64) -> f64 {
    if freq <= 0.0 {
        return f64::NAN;
    }
    A4_PITCH as f64 + 12.0 * (freq / A4_FREQUENCY).log2()
}

/// Nearest MIDI pitch of a frequency
pub fn frequency_to_pitch(freq: f64) -> Option<i32> {
    if !freq.is_finite() || freq <= 0.0 {
        return None;
    }
    Some(frequency_to_pitch_f(freq).round() as i32)
}

/// Deviation of `freq` from `reference` in cents
#[inline]
pub fn cents_between(freq: f64, reference: f64) -> f64 {
    1200.0 * (freq / reference).log2()
}

/// Pitch class (0 = C … 11 = B)
#[inline]
pub fn pitch_class(pitch: i32) -> u8 {
    pitch.rem_euclid(12) as u8
}

/// Note name with octave, e.g. `A4`
pub fn pitch_name(pitch: i32) -> String {
    let octave = pitch.div_euclid(12) - 1;
    format!("{}{}", NOTE_NAMES[pitch_class(pitch) as usize], octave)
}

// ═══════════════════════════════════════════════════════════════════════════════
// CHROMA
// ═══════════════════════════════════════════════════════════════════════════════

/// Per-pitch-class energy at one analysis frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChromaFrame {
    /// Frame center in seconds
    pub time: f64,
    /// Energy per pitch class, C first
    pub energy: [f32; 12],
}

impl ChromaFrame {
    pub fn new(time: f64, energy: [f32; 12]) -> Self {
        Self { time, energy }
    }

    /// Strongest pitch class and its energy (lowest class wins ties)
    pub fn strongest(&self) -> (u8, f32) {
        let mut best = (0u8, self.energy[0]);
        for (class, &e) in self.energy.iter().enumerate().skip(1) {
            if e > best.1 {
                best = (class as u8, e);
            }
        }
        best
    }

    pub fn total_energy(&self) -> f32 {
        self.energy.iter().sum()
    }
}
