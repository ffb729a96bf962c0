//! Note events
//!
//! The symbolic hand-off between analysis and synthesis. Fields are private so
//! a [`NoteEvent`] can only exist in a validated state.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::tuning::{pitch_name, pitch_to_frequency};
use crate::{KfError, KfResult};

/// Lowest key of an 88-key piano (A0)
pub const PIANO_LOWEST: u8 = 21;

/// Highest key of an 88-key piano (C8)
pub const PIANO_HIGHEST: u8 = 108;

/// Maximum MIDI velocity
pub const MAX_VELOCITY: u8 = 127;

/// Which line a note belongs to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteRole {
    #[default]
    Melody,
    Bass,
}

/// One pitched note on the timeline
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawNoteEvent")]
pub struct NoteEvent {
    pitch: u8,
    start: f64,
    end: f64,
    velocity: u8,
    role: NoteRole,
}

/// Unchecked wire form; deserialization goes through [`NoteEvent::new`]
#[derive(Deserialize)]
struct RawNoteEvent {
    pitch: u8,
    start: f64,
    end: f64,
    velocity: u8,
    #[serde(default)]
    role: NoteRole,
}

impl TryFrom<RawNoteEvent> for NoteEvent {
    type Error = KfError;

    fn try_from(raw: RawNoteEvent) -> KfResult<Self> {
        Self::new(raw.pitch, raw.start, raw.end, raw.velocity, raw.role)
    }
}

impl NoteEvent {
    pub fn new(pitch: u8, start: f64, end: f64, velocity: u8, role: NoteRole) -> KfResult<Self> {
        if !(PIANO_LOWEST..=PIANO_HIGHEST).contains(&pitch) {
            return Err(KfError::PitchOutOfRange(pitch as i32));
        }
        if !start.is_finite() || !end.is_finite() || start < 0.0 || end <= start {
            return Err(KfError::InvalidNoteSpan { start, end });
        }
        if velocity > MAX_VELOCITY {
            return Err(KfError::InvalidVelocity(velocity));
        }
        Ok(Self {
            pitch,
            start,
            end,
            velocity,
            role,
        })
    }

    /// Melody note of `duration` seconds
    pub fn melody(pitch: u8, start: f64, duration: f64, velocity: u8) -> KfResult<Self> {
        Self::new(pitch, start, start + duration, velocity, NoteRole::Melody)
    }

    /// Bass note of `duration` seconds
    pub fn bass(pitch: u8, start: f64, duration: f64, velocity: u8) -> KfResult<Self> {
        Self::new(pitch, start, start + duration, velocity, NoteRole::Bass)
    }

    #[inline]
    pub fn pitch(&self) -> u8 {
        self.pitch
    }

    #[inline]
    pub fn start(&self) -> f64 {
        self.start
    }

    #[inline]
    pub fn end(&self) -> f64 {
        self.end
    }

    #[inline]
    pub fn velocity(&self) -> u8 {
        self.velocity
    }

    #[inline]
    pub fn role(&self) -> NoteRole {
        self.role
    }

    #[inline]
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Equal-tempered frequency in Hz
    #[inline]
    pub fn frequency(&self) -> f64 {
        pitch_to_frequency(self.pitch)
    }

    /// Velocity as a 0..=1 gain
    #[inline]
    pub fn gain(&self) -> f32 {
        self.velocity as f32 / MAX_VELOCITY as f32
    }

    pub fn name(&self) -> String {
        pitch_name(self.pitch as i32)
    }

    /// Copy with a new end time (still validated)
    pub fn with_end(&self, end: f64) -> KfResult<Self> {
        Self::new(self.pitch, self.start, end, self.velocity, self.role)
    }
}

/// Ordering used for note sequences: start time, then pitch
pub fn compare_notes(a: &NoteEvent, b: &NoteEvent) -> Ordering {
    a.start
        .total_cmp(&b.start)
        .then_with(|| a.pitch.cmp(&b.pitch))
}

/// Sort by start time, ties broken by ascending pitch
pub fn sort_notes(notes: &mut [NoteEvent]) {
    notes.sort_by(compare_notes);
}

/// Latest end time of a note sequence (0 when empty)
pub fn sequence_end(notes: &[NoteEvent]) -> f64 {
    notes.iter().map(NoteEvent::end).fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation() {
        assert!(NoteEvent::melody(69, 0.0, 1.0, 100).is_ok());
        assert_eq!(
            NoteEvent::melody(20, 0.0, 1.0, 100),
            Err(KfError::PitchOutOfRange(20))
        );
        assert!(NoteEvent::melody(109, 0.0, 1.0, 100).is_err());
        assert!(NoteEvent::new(60, 1.0, 1.0, 100, NoteRole::Melody).is_err());
        assert!(NoteEvent::new(60, -0.5, 1.0, 100, NoteRole::Melody).is_err());
        assert!(NoteEvent::new(60, 0.0, f64::NAN, 100, NoteRole::Melody).is_err());
        assert_eq!(
            NoteEvent::melody(60, 0.0, 1.0, 128),
            Err(KfError::InvalidVelocity(128))
        );
    }

    #[test]
    fn test_accessors() {
        let note = NoteEvent::bass(45, 2.0, 0.8, 50).unwrap();
        assert_eq!(note.role(), NoteRole::Bass);
        assert!((note.duration() - 0.8).abs() < 1e-12);
        assert!((note.frequency() - 110.0).abs() < 1e-9);
        assert_eq!(note.name(), "A2");
        assert!((note.gain() - 50.0 / 127.0).abs() < 1e-6);
    }

    #[test]
    fn test_sort_breaks_ties_by_pitch() {
        let mut notes = vec![
            NoteEvent::melody(72, 1.0, 0.5, 90).unwrap(),
            NoteEvent::melody(69, 0.5, 0.5, 90).unwrap(),
            NoteEvent::bass(45, 0.5, 0.8, 50).unwrap(),
        ];
        sort_notes(&mut notes);
        let pitches: Vec<u8> = notes.iter().map(NoteEvent::pitch).collect();
        assert_eq!(pitches, vec![45, 69, 72]);
        assert!((sequence_end(&notes) - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_serde_shape() {
        let note = NoteEvent::melody(60, 0.25, 0.5, 64).unwrap();
        let json = serde_json::to_string(&note).unwrap();
        assert!(json.contains("\"role\":\"melody\""));
        let back: NoteEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, note);
    }

    #[test]
    fn test_deserialize_validates() {
        let bad = r#"{"pitch":200,"start":5.0,"end":1.0,"velocity":255,"role":"melody"}"#;
        assert!(serde_json::from_str::<NoteEvent>(bad).is_err());

        let backwards = r#"{"pitch":60,"start":5.0,"end":1.0,"velocity":64,"role":"bass"}"#;
        assert!(serde_json::from_str::<NoteEvent>(backwards).is_err());

        let loud = r#"{"pitch":60,"start":0.0,"end":1.0,"velocity":200,"role":"bass"}"#;
        assert!(serde_json::from_str::<NoteEvent>(loud).is_err());

        // Role defaults to melody
        let ok: NoteEvent = serde_json::from_str(r#"{"pitch":60,"start":0.0,"end":1.0,"velocity":64}"#).unwrap();
        assert_eq!(ok.role(), NoteRole::Melody);
    }
}
