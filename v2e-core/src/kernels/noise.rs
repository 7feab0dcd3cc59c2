use ndarray::{Array2, Zip};
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use std::f64::consts::LN_10;

/// Shot noise rate at full intensity relative to the rate in the dark.
pub const SHOT_NOISE_INTEN_FACTOR: f64 = 0.25;

/// Per-pixel log-normal rate multiplier: `10^(cov_decades * N(0, 1))`.
///
/// With `cov_decades == 0` every pixel gets exactly 1.
pub fn noise_rate_array<R: Rng + ?Sized>(shape: (usize, usize), cov_decades: f64, rng: &mut R) -> Array2<f64> {
    Array2::from_shape_simple_fn(shape, || {
        let z: f64 = StandardNormal.sample(rng);
        (LN_10 * cov_decades * z).exp()
    })
}

/// Leak current: lower the memorized brightness so pixels drift towards ON events.
///
/// The target rate is `leak_rate_hz` ON events per second per pixel. With
/// `R_l = (dI/dt) / theta_on` the per-frame decrement is
/// `dI = dt * R_l * theta_on`, where the per-pixel rate is
/// `leak_rate_hz * noise_rate * (1 - leak_jitter_fraction * N(0, 1))`.
/// A fresh normal sample is drawn per pixel for every call.
pub fn subtract_leak_current<R: Rng + ?Sized>(
    base_log_frame: &mut Array2<f64>,
    leak_rate_hz: f64,
    delta_time: f64,
    pos_thres: &Array2<f64>,
    leak_jitter_fraction: f64,
    noise_rate: &Array2<f64>,
    rng: &mut R,
) {
    if leak_rate_hz <= 0.0 || delta_time <= 0.0 {
        return;
    }
    Zip::from(base_log_frame)
        .and(pos_thres)
        .and(noise_rate)
        .for_each(|base, &thres, &rate| {
            let z: f64 = StandardNormal.sample(rng);
            let curr_leak_rate = leak_rate_hz * rate * (1.0 - leak_jitter_fraction * z);
            *base -= delta_time * curr_leak_rate * thres;
        });
}

/// Per-pixel probability of a shot noise event of one polarity in one emission pass.
///
/// Semantics:
/// - half of `shot_noise_rate_hz` goes to each polarity
/// - the pass covers `delta_time / num_iters` seconds
/// - the rate falls linearly from 1x (dark) to `SHOT_NOISE_INTEN_FACTOR` x (white)
/// - `pre_prob = nominal / actual` threshold, so low-threshold pixels are noisier
pub fn shot_noise_probability(
    shot_noise_rate_hz: f64,
    delta_time: f64,
    num_iters: usize,
    inten01: &Array2<f64>,
    pre_prob: &Array2<f64>,
) -> Array2<f64> {
    let mut prob = Array2::<f64>::zeros(inten01.raw_dim());
    if shot_noise_rate_hz <= 0.0 || delta_time <= 0.0 || num_iters == 0 {
        return prob;
    }
    let per_pass = (shot_noise_rate_hz / 2.0) * delta_time / num_iters as f64;
    Zip::from(&mut prob)
        .and(inten01)
        .and(pre_prob)
        .for_each(|p, &inten, &pre| {
            let inten_factor = (SHOT_NOISE_INTEN_FACTOR - 1.0) * inten + 1.0;
            *p = per_pass * inten_factor * pre;
        });
    prob
}

/// Draw one pass worth of shot noise: `true` where a noise event fires.
pub fn sample_shot_noise<R: Rng + ?Sized>(prob: &Array2<f64>, rng: &mut R) -> Array2<bool> {
    prob.mapv(|p| rng.gen::<f64>() < p)
}
