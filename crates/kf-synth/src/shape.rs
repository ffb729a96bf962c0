//! Peak normalization and soft clipping

use kf_core::Sample;

/// Scale so the absolute peak equals `target`. Silent input is left untouched.
pub fn normalize_peak(buffer: &mut [f64], target: f64) {
    let peak = buffer.iter().fold(0.0_f64, |acc, x| acc.max(x.abs()));
    if peak > 0.0 && peak.is_finite() {
        let gain = target / peak;
        buffer.iter_mut().for_each(|x| *x *= gain);
    }
}

/// `tanh(x · drive) · makeup` applied in place
pub fn soft_clip(buffer: &mut [f64], drive: f64, makeup: f64) {
    for x in buffer.iter_mut() {
        *x = (*x * drive).tanh() * makeup;
    }
}

/// Convert to output samples with peak exactly at or below `ceiling`.
///
/// Rounding to `f32` can lift a sample a hair above the ceiling, so the
/// result is clamped as well.
pub fn to_samples(mut buffer: Vec<f64>, ceiling: f32) -> Vec<Sample> {
    normalize_peak(&mut buffer, ceiling as f64);
    buffer
        .into_iter()
        .map(|x| (x as Sample).clamp(-ceiling, ceiling))
        .collect()
}

/// Peak-normalize mixed output in place, clamping to the ceiling
pub fn normalize_master(buffer: &mut [Sample], ceiling: Sample) {
    let peak = kf_core::peak(buffer);
    if peak <= 0.0 || !peak.is_finite() {
        return;
    }
    let gain = ceiling / peak;
    for s in buffer.iter_mut() {
        *s = (*s * gain).clamp(-ceiling, ceiling);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_samples_respects_ceiling() {
        let buffer: Vec<f64> = (0..1000).map(|i| (i as f64 * 0.37).sin() * 3.3).collect();
        let out = to_samples(buffer, 0.85);
        let peak = kf_core::peak(&out);
        assert!(peak <= 0.85);
        assert!(peak > 0.84);
    }

    #[test]
    fn test_silence_stays_silent() {
        let out = to_samples(vec![0.0; 64], 0.85);
        assert!(out.iter().all(|&s| s == 0.0));

        let mut master = vec![0.0_f32; 64];
        normalize_master(&mut master, 0.8);
        assert!(master.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_soft_clip_is_bounded() {
        let mut buffer = vec![-10.0, -1.0, 0.0, 1.0, 10.0];
        soft_clip(&mut buffer, 1.3, 0.9);
        assert!(buffer.iter().all(|x| x.abs() <= 0.9));
        assert_eq!(buffer[2], 0.0);
        assert!(buffer.windows(2).all(|w| w[0] < w[1]));
    }
}
