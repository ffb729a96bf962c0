//! Seeded Gaussian noise layers

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::config::NoiseLayer;

/// splitmix64 finalizer
#[inline]
fn mix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// Per-note seed so the same note always renders identically
pub fn note_seed(base: u64, frequency: f64, duration: f64, velocity: u8) -> u64 {
    let mut seed = mix64(base);
    seed = mix64(seed ^ frequency.to_bits());
    seed = mix64(seed ^ duration.to_bits());
    mix64(seed ^ velocity as u64)
}

/// Standard normal generator (Box–Muller)
pub struct GaussianNoise {
    rng: ChaCha8Rng,
    spare: Option<f64>,
}

impl GaussianNoise {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            spare: None,
        }
    }

    pub fn next_sample(&mut self) -> f64 {
        if let Some(z) = self.spare.take() {
            return z;
        }
        // u1 in (0, 1] keeps ln finite
        let u1 = 1.0 - self.rng.random::<f64>();
        let u2 = self.rng.random::<f64>();
        let r = (-2.0 * u1.ln()).sqrt();
        let theta = 2.0 * std::f64::consts::PI * u2;
        self.spare = Some(r * theta.sin());
        r * theta.cos()
    }
}

/// Add every decaying noise layer to `out`, scaled by velocity
pub fn add_noise(out: &mut [f64], layers: &[NoiseLayer], v: f64, sample_rate: u32, seed: u64) {
    if layers.is_empty() || v <= 0.0 {
        return;
    }
    let mut noise = GaussianNoise::new(seed);
    let dt = 1.0 / sample_rate as f64;
    for layer in layers {
        let sigma = layer.sigma * v;
        for (i, sample) in out.iter_mut().enumerate() {
            let t = i as f64 * dt;
            *sample += sigma * noise.next_sample() * (-layer.decay * t).exp();
        }
    }
}
