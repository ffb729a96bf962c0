//! Rhythm analysis: novelty curve, tempo, beat grid, onsets
//!
//! Onsets and beats both come from the same novelty curve, the half-wave
//! rectified frame-to-frame increase of spectral power:
//!
//! ```text
//! novelty[i] = Σ_k max(0, |X_i[k]|² − |X_{i−1}[k]|²)
//! ```
//!
//! Power flux ignores the broadband smear a note *release* leaves in the
//! spectrum, so tone endings do not register as onsets.

use kf_core::{BeatGrid, Onset, Signal};

use crate::config::{AnalysisConfig, OnsetConfig, SpectrumConfig, TempoConfig};
use crate::spectrum::Spectrogram;
use crate::AnalysisResult;

/// Novelty below this is treated as silence
const SILENCE_FLOOR: f32 = 1e-10;

// ═══════════════════════════════════════════════════════════════════════════════
// ANALYZER
// ═══════════════════════════════════════════════════════════════════════════════

/// Beat grid, onsets and the novelty curve they came from
#[derive(Debug, Clone, Default)]
pub struct RhythmAnalysis {
    pub beat_grid: BeatGrid,
    pub onsets: Vec<Onset>,
    pub novelty: Vec<f32>,
}

/// Tempo, beat and onset detection
#[derive(Debug, Clone)]
pub struct RhythmAnalyzer {
    spectrum: SpectrumConfig,
    onset: OnsetConfig,
    tempo: TempoConfig,
}

impl RhythmAnalyzer {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            spectrum: config.spectrum.clone(),
            onset: config.onset.clone(),
            tempo: config.tempo.clone(),
        }
    }

    /// Analyse a signal end to end
    pub fn analyze_signal(&self, signal: &Signal) -> AnalysisResult<RhythmAnalysis> {
        let mono = signal.to_mono();
        let spec = Spectrogram::compute(mono.samples(), mono.sample_rate(), &self.spectrum)?;
        self.analyze(&spec)
    }

    /// Analyse a precomputed spectrogram.
    ///
    /// Silent or too-short input gives an empty grid and no onsets. When the
    /// novelty curve has content but no tempo can be found, onsets are still
    /// returned alongside an empty grid.
    pub fn analyze(&self, spec: &Spectrogram) -> AnalysisResult<RhythmAnalysis> {
        if spec.is_empty() {
            log::debug!("Signal shorter than one analysis window");
            return Ok(RhythmAnalysis::default());
        }

        let novelty = novelty_curve(spec);
        let loudest = novelty.iter().fold(0.0f32, |acc, &v| acc.max(v));
        if loudest <= SILENCE_FLOOR {
            log::debug!("Silent signal, no rhythm");
            return Ok(RhythmAnalysis {
                novelty,
                ..Default::default()
            });
        }

        let onsets: Vec<Onset> = pick_onsets(&novelty, &self.onset)
            .into_iter()
            .map(|frame| Onset::new(spec.frame_time(frame), frame))
            .collect();

        let frame_rate = spec.frame_rate();
        let beat_grid = match estimate_tempo(&novelty, frame_rate, &self.tempo) {
            Some(estimate) => {
                let frames = track_beats(&novelty, estimate.period_frames, self.tempo.tightness);
                let times = frames.iter().map(|&f| spec.frame_time(f)).collect();
                BeatGrid::new(estimate.bpm, times)?
            }
            None => BeatGrid::empty(),
        };

        log::info!(
            "Rhythm: {:.1} BPM, {} beats, {} onsets",
            beat_grid.tempo_bpm(),
            beat_grid.len(),
            onsets.len()
        );

        Ok(RhythmAnalysis {
            beat_grid,
            onsets,
            novelty,
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// NOVELTY
// ═══════════════════════════════════════════════════════════════════════════════

/// Half-wave rectified power flux; the frame before the first is silence
pub fn novelty_curve(spec: &Spectrogram) -> Vec<f32> {
    let mut prev: Vec<f32> = vec![0.0; spec.num_bins()];
    spec.frames()
        .iter()
        .map(|frame| {
            let mut flux = 0.0f32;
            for (p, &mag) in prev.iter_mut().zip(frame.iter()) {
                let power = mag * mag;
                let diff = power - *p;
                if diff > 0.0 {
                    flux += diff;
                }
                *p = power;
            }
            flux
        })
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// ONSETS
// ═══════════════════════════════════════════════════════════════════════════════

/// Peak-pick onset frames from a novelty curve.
///
/// The curve is min-max normalized first. Frame `n` is an onset when it is the
/// maximum of `[n − pre_max, n + post_max]`, at least `delta` above the mean of
/// `[n − pre_avg, n + post_avg]`, and more than `wait` frames after the
/// previous onset.
pub fn pick_onsets(novelty: &[f32], config: &OnsetConfig) -> Vec<usize> {
    let len = novelty.len();
    if len == 0 {
        return Vec::new();
    }

    let min = novelty.iter().copied().fold(f32::INFINITY, f32::min);
    let max = novelty.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let range = max - min;
    if range <= SILENCE_FLOOR {
        return Vec::new();
    }
    let env: Vec<f32> = novelty.iter().map(|&v| (v - min) / range).collect();

    let mut onsets = Vec::new();
    let mut last: Option<usize> = None;

    for n in 0..len {
        let max_lo = n.saturating_sub(config.pre_max);
        let max_hi = (n + config.post_max + 1).min(len);
        let local_max = env[max_lo..max_hi]
            .iter()
            .copied()
            .fold(f32::NEG_INFINITY, f32::max);
        if env[n] < local_max {
            continue;
        }

        let avg_lo = n.saturating_sub(config.pre_avg);
        let avg_hi = (n + config.post_avg + 1).min(len);
        let local_mean = env[avg_lo..avg_hi].iter().sum::<f32>() / (avg_hi - avg_lo) as f32;
        if env[n] < local_mean + config.delta {
            continue;
        }

        if last.is_some_and(|l| n - l <= config.wait) {
            continue;
        }

        onsets.push(n);
        last = Some(n);
    }

    onsets
}

// ═══════════════════════════════════════════════════════════════════════════════
// TEMPO
// ═══════════════════════════════════════════════════════════════════════════════

/// Dominant tempo of a novelty curve
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempoEstimate {
    pub bpm: f64,
    /// Beat period in novelty frames (fractional)
    pub period_frames: f64,
}

/// Autocorrelation tempo estimate weighted by a log-normal prior.
///
/// Returns `None` when the curve is shorter than the fastest allowed beat
/// period or carries no periodic energy.
pub fn estimate_tempo(novelty: &[f32], frame_rate: f64, config: &TempoConfig) -> Option<TempoEstimate> {
    let len = novelty.len();
    let min_lag = ((60.0 * frame_rate / config.max_bpm).floor() as usize).max(1);
    let max_lag = ((60.0 * frame_rate / config.min_bpm).ceil() as usize).min(len.saturating_sub(1));
    if len < 2 || min_lag > max_lag {
        return None;
    }

    let lag_to_bpm = |lag: f64| 60.0 * frame_rate / lag;
    let prior = |bpm: f64| {
        let octaves = (bpm / config.start_bpm).log2() / config.prior_octaves;
        (-0.5 * octaves * octaves).exp()
    };

    let scores: Vec<f64> = (min_lag..=max_lag)
        .map(|lag| {
            let ac: f64 = novelty[..len - lag]
                .iter()
                .zip(&novelty[lag..])
                .map(|(&a, &b)| a as f64 * b as f64)
                .sum();
            ac * prior(lag_to_bpm(lag as f64))
        })
        .collect();

    let (best_idx, &best_score) = scores
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))?;
    if best_score <= 0.0 {
        return None;
    }

    // Parabolic refinement between neighbouring lags
    let mut lag = (min_lag + best_idx) as f64;
    if best_idx > 0 && best_idx + 1 < scores.len() {
        let (a, b, c) = (scores[best_idx - 1], scores[best_idx], scores[best_idx + 1]);
        let denom = a - 2.0 * b + c;
        if denom.abs() > f64::EPSILON {
            lag += (0.5 * (a - c) / denom).clamp(-0.5, 0.5);
        }
    }

    Some(TempoEstimate {
        bpm: lag_to_bpm(lag),
        period_frames: lag,
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// BEAT TRACKING
// ═══════════════════════════════════════════════════════════════════════════════

/// Dynamic-programming beat tracker.
///
/// Each frame's cumulative score is its smoothed novelty plus the best
/// predecessor score within `[period/2, 2·period]` frames back, penalised by
/// `tightness · ln(interval/period)²`. The path ending at the last strong
/// local maximum is backtracked, then weak beats at either edge are trimmed.
/// Returned frames are strictly increasing.
pub fn track_beats(novelty: &[f32], period_frames: f64, tightness: f64) -> Vec<usize> {
    let len = novelty.len();
    if len == 0 || period_frames <= 0.0 {
        return Vec::new();
    }

    let local = local_score(novelty, period_frames);

    let mut cumulative = vec![0.0f64; len];
    let mut backlink: Vec<Option<usize>> = vec![None; len];

    let min_back = ((period_frames / 2.0).round() as usize).max(1);
    let max_back = ((2.0 * period_frames).round() as usize).max(min_back);

    for i in 0..len {
        let mut best: Option<(usize, f64)> = None;
        if i >= min_back {
            let lo = i.saturating_sub(max_back);
            for prev in lo..=(i - min_back) {
                let ratio = (i - prev) as f64 / period_frames;
                let penalty = tightness * ratio.ln().powi(2);
                let score = cumulative[prev] - penalty;
                if best.is_none_or(|(_, s)| score > s) {
                    best = Some((prev, score));
                }
            }
        }
        match best {
            Some((prev, score)) if score > 0.0 => {
                cumulative[i] = local[i] + score;
                backlink[i] = Some(prev);
            }
            _ => cumulative[i] = local[i],
        }
    }

    let Some(last) = last_beat(&cumulative) else {
        return Vec::new();
    };

    let mut beats = vec![last];
    let mut cursor = last;
    while let Some(prev) = backlink[cursor] {
        beats.push(prev);
        cursor = prev;
    }
    beats.reverse();

    trim_weak_beats(&beats, &local)
}

/// Novelty normalized by its standard deviation, smoothed with a Gaussian
/// whose width tracks the beat period
fn local_score(novelty: &[f32], period_frames: f64) -> Vec<f64> {
    let len = novelty.len();
    let mean = novelty.iter().map(|&v| v as f64).sum::<f64>() / len as f64;
    let variance = novelty
        .iter()
        .map(|&v| (v as f64 - mean).powi(2))
        .sum::<f64>()
        / len as f64;
    let std = variance.sqrt();
    let norm: Vec<f64> = novelty
        .iter()
        .map(|&v| if std > 0.0 { v as f64 / std } else { 0.0 })
        .collect();

    let half = period_frames.round().max(1.0) as isize;
    let kernel: Vec<f64> = (-half..=half)
        .map(|k| (-0.5 * (k as f64 * 32.0 / period_frames).powi(2)).exp())
        .collect();

    (0..len as isize)
        .map(|i| {
            kernel
                .iter()
                .enumerate()
                .filter_map(|(j, &w)| {
                    let idx = i + j as isize - half;
                    (idx >= 0 && (idx as usize) < len).then(|| w * norm[idx as usize])
                })
                .sum()
        })
        .collect()
}

/// Last local maximum of the cumulative score above half the median peak
fn last_beat(cumulative: &[f64]) -> Option<usize> {
    let len = cumulative.len();
    let peaks: Vec<usize> = (0..len)
        .filter(|&i| {
            let rising = i == 0 || cumulative[i] > cumulative[i - 1];
            let falling = i + 1 == len || cumulative[i] >= cumulative[i + 1];
            rising && falling && cumulative[i] > 0.0
        })
        .collect();
    if peaks.is_empty() {
        return None;
    }

    let mut values: Vec<f64> = peaks.iter().map(|&i| cumulative[i]).collect();
    values.sort_by(f64::total_cmp);
    let median = values[values.len() / 2];

    peaks.into_iter().rev().find(|&i| cumulative[i] >= 0.5 * median)
}

/// Drop leading/trailing beats whose local score falls below half the RMS
fn trim_weak_beats(beats: &[usize], local: &[f64]) -> Vec<usize> {
    if beats.is_empty() {
        return Vec::new();
    }
    let rms = (beats.iter().map(|&b| local[b].powi(2)).sum::<f64>() / beats.len() as f64).sqrt();
    let threshold = 0.5 * rms;

    let first = beats.iter().position(|&b| local[b] > threshold);
    let last = beats.iter().rposition(|&b| local[b] > threshold);
    match (first, last) {
        (Some(f), Some(l)) => beats[f..=l].to_vec(),
        _ => Vec::new(),
    }
}
