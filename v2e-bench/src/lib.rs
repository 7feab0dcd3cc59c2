//! Deterministic frame sequences shared by the emulator benchmarks.

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Frame interval of the generated sequences, 30 fps.
pub const FRAME_DT: f64 = 1.0 / 30.0;

/// `n` frames of a textured scene whose pixels flicker by up to +-30 %.
pub fn make_frames(n: usize, w: usize, h: usize, seed: u64) -> Vec<(Array2<f64>, f64)> {
    let mut rng = StdRng::seed_from_u64(seed);
    let scene = Array2::from_shape_fn((h, w), |_| rng.gen_range(5.0f64..250.0));
    (0..n)
        .map(|i| {
            let frame = scene.mapv(|v: f64| (v * rng.gen_range(0.7f64..1.3)).min(255.0));
            (frame, i as f64 * FRAME_DT)
        })
        .collect()
}

/// `n` frames of a bright vertical bar sweeping across a dark background.
pub fn moving_bar_frames(n: usize, w: usize, h: usize) -> Vec<(Array2<f64>, f64)> {
    let bar = (w / 16).max(1);
    (0..n)
        .map(|i| {
            let left = (i * 2) % w;
            let frame = Array2::from_shape_fn((h, w), |(_, x)| {
                if x >= left && x < left + bar {
                    220.0
                } else {
                    30.0
                }
            });
            (frame, i as f64 * FRAME_DT)
        })
        .collect()
}
