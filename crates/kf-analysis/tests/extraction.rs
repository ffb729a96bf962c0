//! End-to-end extraction tests on synthetic signals

use std::f32::consts::PI;

use kf_analysis::{AnalysisConfig, AnalysisError, MelodyExtractor, RhythmAnalyzer};
use kf_core::{NoteRole, Signal};

const SAMPLE_RATE: u32 = 44100;

// ============================================================================
// Helpers
// ============================================================================

/// Silence with sine bursts of `burst_secs` starting at each time in `starts`
fn bursts(freq: f32, starts: &[f32], burst_secs: f32, total_secs: f32) -> Vec<f32> {
    let sr = SAMPLE_RATE as f32;
    let mut samples = vec![0.0; (total_secs * sr) as usize];
    let burst_len = (burst_secs * sr) as usize;
    for &start in starts {
        let begin = (start * sr) as usize;
        for i in 0..burst_len {
            if let Some(s) = samples.get_mut(begin + i) {
                *s = (2.0 * PI * freq * i as f32 / sr).sin();
            }
        }
    }
    samples
}

fn click_train(interval: f32, count: usize) -> Vec<f32> {
    let starts: Vec<f32> = (0..count).map(|i| 0.1 + i as f32 * interval).collect();
    let total = 0.1 + interval * count as f32 + 0.5;
    bursts(1000.0, &starts, 0.05, total)
}

// ============================================================================
// Rhythm
// ============================================================================

#[test]
fn test_tempo_of_click_train() {
    let signal = Signal::mono(click_train(0.5, 16), SAMPLE_RATE).unwrap();
    let rhythm = RhythmAnalyzer::new(&AnalysisConfig::default())
        .analyze_signal(&signal)
        .unwrap();

    let bpm = rhythm.beat_grid.tempo_bpm();
    assert!((110.0..130.0).contains(&bpm), "tempo {} BPM", bpm);

    let beats = rhythm.beat_grid.beats();
    assert!(beats.len() >= 10, "{} beats", beats.len());
    let mean_interval = (beats[beats.len() - 1] - beats[0]) / (beats.len() - 1) as f64;
    assert!((0.45..0.55).contains(&mean_interval), "interval {}", mean_interval);

    assert!(
        (14..=16).contains(&rhythm.onsets.len()),
        "{} onsets",
        rhythm.onsets.len()
    );
}

#[test]
fn test_onsets_are_ordered() {
    let starts = [0.2, 0.45, 0.9, 1.1, 1.8, 2.0];
    let signal = Signal::mono(bursts(523.25, &starts, 0.15, 2.5), SAMPLE_RATE).unwrap();
    let rhythm = RhythmAnalyzer::new(&AnalysisConfig::default())
        .analyze_signal(&signal)
        .unwrap();

    assert!(!rhythm.onsets.is_empty());
    assert!(rhythm.onsets.windows(2).all(|w| w[0].time <= w[1].time));
    assert!(rhythm.beat_grid.beats().windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_silence_and_short_input_have_no_rhythm() {
    let analyzer = RhythmAnalyzer::new(&AnalysisConfig::default());

    let silent = Signal::mono(vec![0.0; SAMPLE_RATE as usize * 2], SAMPLE_RATE).unwrap();
    let rhythm = analyzer.analyze_signal(&silent).unwrap();
    assert!(rhythm.beat_grid.is_empty());
    assert!(rhythm.onsets.is_empty());

    let short = Signal::mono(vec![0.5; 1000], SAMPLE_RATE).unwrap();
    let rhythm = analyzer.analyze_signal(&short).unwrap();
    assert!(rhythm.beat_grid.is_empty());
    assert!(rhythm.onsets.is_empty());
}

// ============================================================================
// Notes
// ============================================================================

#[test]
fn test_three_a4_bursts() {
    let samples = bursts(440.0, &[0.0, 0.5, 1.0], 0.3, 1.6);
    let signal = Signal::mono(samples, SAMPLE_RATE).unwrap();

    // Default config, bass line included: bass samples on the beats coincide
    // with the melody onsets and collapse into them
    let transcription = MelodyExtractor::new().extract(&signal).unwrap();
    let notes = &transcription.notes;

    assert_eq!(notes.len(), 3, "notes: {:?}", notes);
    for (note, expected) in notes.iter().zip([0.0, 0.5, 1.0]) {
        assert_eq!(note.role(), NoteRole::Melody);
        assert_eq!(note.pitch(), 69);
        assert!(
            (note.start() - expected).abs() < 0.05,
            "note at {} expected near {}",
            note.start(),
            expected
        );
        assert!((0.1..=2.0).contains(&note.duration()));
        assert!((20..=127).contains(&note.velocity()));
    }

    // Sorted by start then pitch
    assert!(transcription.notes.windows(2).all(|w| {
        w[0].start() < w[1].start() || (w[0].start() == w[1].start() && w[0].pitch() <= w[1].pitch())
    }));
}

#[test]
fn test_stereo_matches_mono() {
    let mono = bursts(440.0, &[0.0, 0.5, 1.0], 0.3, 1.6);
    let stereo: Vec<f32> = mono.iter().flat_map(|&s| [s, s]).collect();

    let config = AnalysisConfig::default().without_bass();
    let extractor = MelodyExtractor::with_config(config).unwrap();

    let from_mono = extractor
        .extract(&Signal::mono(mono, SAMPLE_RATE).unwrap())
        .unwrap();
    let from_stereo = extractor
        .extract(&Signal::new(stereo, SAMPLE_RATE, 2).unwrap())
        .unwrap();

    assert_eq!(from_mono.notes, from_stereo.notes);
    assert!(from_stereo.notes.iter().all(|n| n.role() == NoteRole::Melody));
}

#[test]
fn test_low_rumble_is_out_of_melody_range() {
    // 98 Hz (G2) sits below both the pitch search band and the melody range
    let samples = bursts(98.0, &[0.0, 0.5, 1.0], 0.3, 1.6);
    let signal = Signal::mono(samples, SAMPLE_RATE).unwrap();
    let config = AnalysisConfig::default().without_bass();
    let result = MelodyExtractor::with_config(config).unwrap().extract(&signal);

    match result {
        Err(AnalysisError::NoNotesFound) => {}
        Ok(t) => assert!(t.notes.iter().all(|n| (48..=84).contains(&n.pitch()))),
        Err(e) => panic!("unexpected error: {e}"),
    }
}
