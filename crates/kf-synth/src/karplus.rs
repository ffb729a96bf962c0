//! Karplus–Strong plucked string

use crate::noise::GaussianNoise;

/// Render `len` samples of a plucked string at `frequency`.
///
/// The delay line is excited with seeded noise and averaged on every pass.
pub fn pluck(frequency: f64, len: usize, sample_rate: u32, feedback: f64, seed: u64) -> Vec<f64> {
    let period = (sample_rate as f64 / frequency).round() as usize;
    if period < 2 || len == 0 {
        return vec![0.0; len];
    }

    let mut noise = GaussianNoise::new(seed);
    let mut line: Vec<f64> = (0..period).map(|_| noise.next_sample()).collect();
    let mut out = Vec::with_capacity(len);
    let mut pos = 0;

    for _ in 0..len {
        let next = (pos + 1) % period;
        let current = line[pos];
        out.push(current);
        line[pos] = feedback * 0.5 * (current + line[next]);
        pos = next;
    }
    out
}
