//! Parallel note rendering and mixdown
//!
//! Notes are rendered on a rayon pool and summed into a padded work buffer,
//! either merged in note order after rendering or directly from the workers
//! under a lock. The result is cut to the target length and peak-normalized.

use parking_lot::Mutex;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use kf_core::{MasterBuffer, NoteEvent, NoteRole, Sample, ToneBuffer, seconds_to_samples, sequence_end};

use crate::config::{MergeStrategy, MixConfig};
use crate::shape::normalize_master;
use crate::tone::ToneSource;
use crate::{SynthError, SynthResult};

/// Where a rendered tone ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Placed,
    /// Tail ran past the work buffer and was cut
    Truncated,
    /// Started past the work buffer; nothing added
    OutOfBounds,
    /// Empty tone; nothing added
    Degenerate,
}

/// Counts of what happened to each note during a mix
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MixReport {
    pub rendered: usize,
    pub truncated: usize,
    pub out_of_bounds: usize,
    pub degenerate: usize,
    /// Too short or filtered by role
    pub skipped: usize,
}

impl MixReport {
    fn record(&mut self, placement: Placement) {
        match placement {
            Placement::Placed => self.rendered += 1,
            Placement::Truncated => {
                self.rendered += 1;
                self.truncated += 1;
            }
            Placement::OutOfBounds => self.out_of_bounds += 1,
            Placement::Degenerate => self.degenerate += 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MixOutput {
    pub buffer: MasterBuffer,
    pub report: MixReport,
}

/// Add `tone` scaled by `gain` at `offset`, cutting anything past the end
pub fn place_tone(master: &mut [Sample], tone: &ToneBuffer, offset: usize, gain: Sample) -> Placement {
    if tone.is_empty() {
        return Placement::Degenerate;
    }
    if offset >= master.len() {
        return Placement::OutOfBounds;
    }
    let available = master.len() - offset;
    let take = tone.len().min(available);
    for (m, &s) in master[offset..offset + take].iter_mut().zip(tone.samples()) {
        *m += s * gain;
    }
    if take < tone.len() {
        Placement::Truncated
    } else {
        Placement::Placed
    }
}

/// Renders note sequences into a master buffer
pub struct MixEngine<S: ToneSource> {
    source: S,
    config: MixConfig,
}

impl<S: ToneSource> MixEngine<S> {
    pub fn new(source: S, config: MixConfig) -> SynthResult<Self> {
        config.validate()?;
        Ok(Self { source, config })
    }

    pub fn config(&self) -> &MixConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    fn wanted(&self, note: &NoteEvent) -> bool {
        note.duration() >= self.config.min_note_duration
            && (!self.config.melody_only || note.role() == NoteRole::Melody)
    }

    fn offset(&self, note: &NoteEvent) -> usize {
        (note.start() * self.source.sample_rate() as f64).round() as usize
    }

    /// Render and sum `notes` into a normalized master buffer
    pub fn mix(&self, notes: &[NoteEvent]) -> SynthResult<MixOutput> {
        let sr = self.source.sample_rate();
        let target = self
            .config
            .target_duration
            .unwrap_or_else(|| sequence_end(notes));
        let target_len = seconds_to_samples(target, sr);
        let work_len = target_len + seconds_to_samples(self.config.tail_pad, sr);

        let mut master: Vec<Sample> = Vec::new();
        master
            .try_reserve_exact(work_len)
            .map_err(|_| SynthError::Allocation { samples: work_len })?;
        master.resize(work_len, 0.0);

        let jobs: Vec<&NoteEvent> = notes.iter().filter(|n| self.wanted(n)).collect();
        let mut report = MixReport {
            skipped: notes.len() - jobs.len(),
            ..Default::default()
        };

        log::info!(
            "Mixing {} notes into {:.2}s ({} skipped, {:?} merge)",
            jobs.len(),
            target,
            report.skipped,
            self.config.merge
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.threads)
            .build()
            .map_err(|e| SynthError::ThreadPool(e.to_string()))?;

        let placements: Vec<(usize, Placement)> = match self.config.merge {
            MergeStrategy::Sequential => {
                let tones: Vec<ToneBuffer> =
                    pool.install(|| jobs.par_iter().map(|n| self.source.render_note(n)).collect());
                jobs.iter()
                    .zip(&tones)
                    .enumerate()
                    .map(|(i, (note, tone))| {
                        (i, place_tone(&mut master, tone, self.offset(note), note.gain()))
                    })
                    .collect()
            }
            MergeStrategy::Locked => {
                let shared = Mutex::new(&mut master);
                pool.install(|| {
                    jobs.par_iter()
                        .enumerate()
                        .map(|(i, note)| {
                            let tone = self.source.render_note(note);
                            let mut guard = shared.lock();
                            (i, place_tone(guard.as_mut_slice(), &tone, self.offset(note), note.gain()))
                        })
                        .collect()
                })
            }
        };

        for (i, placement) in placements {
            let note = jobs[i];
            match placement {
                Placement::OutOfBounds => log::warn!(
                    "Note {} at {:.3}s starts past the end of the mix",
                    note.name(),
                    note.start()
                ),
                Placement::Truncated => log::warn!(
                    "Note {} at {:.3}s truncated at the end of the mix",
                    note.name(),
                    note.start()
                ),
                _ => {}
            }
            report.record(placement);
        }

        master.truncate(target_len);
        normalize_master(&mut master, self.config.ceiling);

        log::debug!("Mix report: {:?}", report);
        Ok(MixOutput {
            buffer: MasterBuffer::new(master, sr),
            report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SynthConfig, ToneSynthesizer};

    /// Constant-level tone, easy to reason about in sums
    struct FlatTone;

    impl ToneSource for FlatTone {
        fn sample_rate(&self) -> u32 {
            1000
        }

        fn render(&self, frequency: f64, duration: f64, _velocity: u8) -> ToneBuffer {
            let len = seconds_to_samples(duration, 1000);
            if frequency <= 0.0 || len == 0 {
                return ToneBuffer::empty();
            }
            ToneBuffer::new(vec![0.5; len])
        }
    }

    fn melody(pitch: u8, start: f64, duration: f64) -> NoteEvent {
        NoteEvent::melody(pitch, start, duration, 127).unwrap()
    }

    #[test]
    fn test_place_tone_outcomes() {
        let mut master = vec![0.0; 10];
        let tone = ToneBuffer::new(vec![1.0; 4]);
        assert_eq!(place_tone(&mut master, &tone, 2, 0.5), Placement::Placed);
        assert_eq!(&master[..7], &[0.0, 0.0, 0.5, 0.5, 0.5, 0.5, 0.0]);
        assert_eq!(place_tone(&mut master, &tone, 8, 1.0), Placement::Truncated);
        assert_eq!(master[9], 1.0);
        assert_eq!(place_tone(&mut master, &tone, 10, 1.0), Placement::OutOfBounds);
        assert_eq!(
            place_tone(&mut master, &ToneBuffer::empty(), 0, 1.0),
            Placement::Degenerate
        );
    }

    #[test]
    fn test_master_length_and_ceiling() {
        let engine = MixEngine::new(FlatTone, MixConfig::default()).unwrap();
        let notes = [melody(60, 0.0, 0.5), melody(64, 0.25, 0.5), melody(67, 0.5, 0.5)];
        let out = engine.mix(&notes).unwrap();
        assert_eq!(out.buffer.len(), 1000);
        assert!(out.buffer.peak() <= 0.8);
        assert!(out.buffer.peak() > 0.79);
        assert_eq!(out.report.rendered, 3);
    }

    #[test]
    fn test_note_past_target_is_skipped() {
        let config = MixConfig::default().with_target_duration(1.0);
        let engine = MixEngine::new(FlatTone, MixConfig { tail_pad: 0.5, ..config }).unwrap();
        let notes = [melody(60, 0.0, 0.5), melody(62, 5.0, 0.5), melody(64, 1.3, 0.5)];
        let out = engine.mix(&notes).unwrap();

        assert_eq!(out.buffer.len(), 1000);
        assert_eq!(out.report.rendered, 2);
        assert_eq!(out.report.out_of_bounds, 1);
        // 1.3s + 0.5s runs past the 1.5s work buffer
        assert_eq!(out.report.truncated, 1);
    }

    #[test]
    fn test_short_and_bass_notes_filtered() {
        let notes = [
            melody(60, 0.0, 0.5),
            melody(62, 0.1, 0.005),
            NoteEvent::bass(36, 0.0, 0.8, 50).unwrap(),
        ];
        let all = MixEngine::new(FlatTone, MixConfig::default())
            .unwrap()
            .mix(&notes)
            .unwrap();
        assert_eq!(all.report.rendered, 2);
        assert_eq!(all.report.skipped, 1);

        let melody_only = MixEngine::new(FlatTone, MixConfig::default().melody_only())
            .unwrap()
            .mix(&notes)
            .unwrap();
        assert_eq!(melody_only.report.rendered, 1);
        assert_eq!(melody_only.report.skipped, 2);
        // Target still follows the longest note in the sequence
        assert_eq!(melody_only.buffer.len(), 800);
    }

    #[test]
    fn test_empty_sequence() {
        let engine = MixEngine::new(FlatTone, MixConfig::default()).unwrap();
        let out = engine.mix(&[]).unwrap();
        assert!(out.buffer.is_empty());
        assert_eq!(out.report, MixReport::default());
    }

    #[test]
    fn test_merge_strategies_agree() {
        let synth = ToneSynthesizer::new(SynthConfig::default()).unwrap();
        let notes: Vec<NoteEvent> = (0..8)
            .map(|i| NoteEvent::melody(60 + i, i as f64 * 0.1, 0.3, 80 + i).unwrap())
            .collect();

        let sequential = MixEngine::new(synth.clone(), MixConfig::default().with_threads(4))
            .unwrap()
            .mix(&notes)
            .unwrap();
        let locked = MixEngine::new(
            synth,
            MixConfig::default()
                .with_threads(4)
                .with_merge(MergeStrategy::Locked),
        )
        .unwrap()
        .mix(&notes)
        .unwrap();

        assert_eq!(sequential.buffer.len(), locked.buffer.len());
        assert_eq!(sequential.report, locked.report);
        // Summation order differs under the lock
        for (a, b) in sequential.buffer.samples().iter().zip(locked.buffer.samples()) {
            assert!((a - b).abs() < 1e-4);
        }
    }
}
