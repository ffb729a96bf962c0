//! Note event construction
//!
//! Turns per-onset pitch estimates and bass samples into a clean, ordered
//! [`NoteEvent`] list. Rhythmic position drives everything: on-beat onsets
//! pass a lower magnitude threshold, ring longer and play louder than
//! off-beat ones.

use kf_core::{NoteEvent, NoteRole, frequency_to_pitch, sort_notes};

use crate::config::NoteConfig;
use crate::harmony::BassSample;
use crate::pitch::PitchEstimate;
use crate::{AnalysisError, AnalysisResult};

/// Builds validated note sequences from analysis results
#[derive(Debug, Clone)]
pub struct NoteEventBuilder {
    config: NoteConfig,
}

impl NoteEventBuilder {
    pub fn new(config: &NoteConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Melody plus (optionally) bass, deduplicated and sorted.
    ///
    /// Fails with [`AnalysisError::NoNotesFound`] when nothing survives.
    pub fn build(&self, estimates: &[PitchEstimate], bass: &[BassSample]) -> AnalysisResult<Vec<NoteEvent>> {
        let mut notes = self.melody_notes(estimates)?;
        let melody_count = notes.len();
        if self.config.include_bass {
            notes.extend(self.bass_notes(bass)?);
        }
        let candidates = notes.len();

        let notes = deduplicate(notes, self.config.dedup_window);

        log::info!(
            "Built {} notes ({} melody candidates, {} bass candidates, {} duplicates dropped)",
            notes.len(),
            melody_count,
            candidates - melody_count,
            candidates - notes.len()
        );

        if notes.is_empty() {
            return Err(AnalysisError::NoNotesFound);
        }
        Ok(notes)
    }

    /// Accepted melody notes in onset order
    pub fn melody_notes(&self, estimates: &[PitchEstimate]) -> AnalysisResult<Vec<NoteEvent>> {
        let cfg = &self.config;
        let mut notes = Vec::with_capacity(estimates.len());

        for (idx, est) in estimates.iter().enumerate() {
            let threshold = if est.on_beat {
                cfg.on_beat_threshold
            } else {
                cfg.off_beat_threshold
            };
            if est.frequency <= 0.0 || est.magnitude <= threshold {
                continue;
            }

            let Some(pitch) = frequency_to_pitch(est.frequency) else {
                continue;
            };
            if pitch < cfg.melody_lowest as i32 || pitch > cfg.melody_highest as i32 {
                log::debug!(
                    "Dropping {:.1} Hz at {:.3}s: pitch {} out of range",
                    est.frequency,
                    est.time(),
                    pitch
                );
                continue;
            }

            let next_onset = estimates.get(idx + 1).map(PitchEstimate::time);
            let duration = self.note_duration(est, next_onset);
            let velocity = self.note_velocity(est.magnitude, est.on_beat);

            notes.push(NoteEvent::melody(pitch as u8, est.time(), duration, velocity)?);
        }

        Ok(notes)
    }

    /// Fixed-length, fixed-velocity bass notes
    pub fn bass_notes(&self, bass: &[BassSample]) -> AnalysisResult<Vec<NoteEvent>> {
        bass.iter()
            .map(|b| {
                NoteEvent::bass(b.pitch, b.time, self.config.bass_duration, self.config.bass_velocity)
                    .map_err(AnalysisError::from)
            })
            .collect()
    }

    /// Gap to the next onset, stretched on the beat and shortened off it
    fn note_duration(&self, est: &PitchEstimate, next_onset: Option<f64>) -> f64 {
        let cfg = &self.config;
        let duration = match next_onset {
            Some(next) => {
                let gap = next - est.time();
                if est.on_beat {
                    (gap * cfg.on_beat_stretch).min(cfg.on_beat_max_duration)
                } else {
                    (gap * cfg.off_beat_stretch).min(cfg.off_beat_max_duration)
                }
            }
            None => cfg.final_duration,
        };
        duration.clamp(cfg.min_duration, cfg.max_duration)
    }

    /// Magnitude scaled to MIDI velocity, boosted on the beat
    fn note_velocity(&self, magnitude: f32, on_beat: bool) -> u8 {
        let cfg = &self.config;
        let base = magnitude * 127.0;
        let shaped = if on_beat {
            (base * cfg.on_beat_boost).min(127.0)
        } else {
            (base * cfg.off_beat_cut).max(cfg.velocity_floor as f32)
        };
        shaped
            .round()
            .clamp(cfg.velocity_floor as f32, cfg.velocity_ceiling as f32) as u8
    }
}

/// Drop notes starting within `window` seconds of the previously kept note,
/// whatever its role. The sort by start is stable, so on a tie the note that
/// came first in `notes` wins (melody before bass out of [`NoteEventBuilder`]).
/// Output is sorted by start, then pitch.
pub fn deduplicate(mut notes: Vec<NoteEvent>, window: f64) -> Vec<NoteEvent> {
    notes.sort_by(|a, b| a.start().total_cmp(&b.start()));

    let mut last_start: Option<f64> = None;
    let mut kept: Vec<NoteEvent> = notes
        .into_iter()
        .filter(|note| {
            let duplicate = last_start.is_some_and(|prev| note.start() - prev <= window);
            if !duplicate {
                last_start = Some(note.start());
            }
            !duplicate
        })
        .collect();

    sort_notes(&mut kept);
    kept
}

/// Remove notes shorter than `min_duration` and join same-pitch neighbours of
/// one role separated by at most `merge_gap` seconds
pub fn optimize_notes(notes: &[NoteEvent], min_duration: f64, merge_gap: f64) -> Vec<NoteEvent> {
    let mut result = Vec::with_capacity(notes.len());

    for role in [NoteRole::Melody, NoteRole::Bass] {
        let mut line: Vec<NoteEvent> = notes
            .iter()
            .filter(|n| n.role() == role && n.duration() >= min_duration)
            .copied()
            .collect();
        sort_notes(&mut line);

        let mut current: Option<NoteEvent> = None;
        for note in line {
            current = match current {
                Some(cur) if cur.pitch() == note.pitch() && note.start() - cur.end() <= merge_gap => {
                    Some(cur.with_end(cur.end().max(note.end())).unwrap_or(cur))
                }
                Some(cur) => {
                    result.push(cur);
                    Some(note)
                }
                None => Some(note),
            };
        }
        result.extend(current);
    }

    sort_notes(&mut result);
    result
}
