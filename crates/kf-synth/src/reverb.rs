//! Feedback-free tapped delay

use crate::config::ReverbConfig;

/// Add delayed copies of `dry` to `out`.
///
/// Taps always read the dry signal, never the accumulated output, so the
/// result stays bounded regardless of tap count.
pub fn add_reverb(out: &mut [f64], dry: &[f64], config: &ReverbConfig, v: f64, sample_rate: u32) {
    let taps = config.taps.len();
    if taps == 0 || v <= 0.0 {
        return;
    }
    let len = out.len().min(dry.len());
    for (i, &delay) in config.taps.iter().enumerate() {
        let offset = (delay * sample_rate as f64).round() as usize;
        if offset == 0 || offset >= len {
            continue;
        }
        let gain = config.wet / taps as f64 * (1.0 - config.falloff * i as f64) * v;
        for (o, &d) in out[offset..len].iter_mut().zip(&dry[..len - offset]) {
            *o += gain * d;
        }
    }
}
