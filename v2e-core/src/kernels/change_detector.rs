//! Change detection and event generation.
//!
//! Given the brightness difference of every pixel against its memorized
//! baseline, decide how many events each pixel emits in this frame interval,
//! spread them over evenly spaced sub-frame timestamps, add shot noise, gate
//! by the refractory period, and return a time-sorted batch together with the
//! per-pixel counts that were actually emitted.

use crate::events::{Event, EventBatch};
use crate::kernels::noise::{sample_shot_noise, shot_noise_probability};
use crate::kernels::refractory_period::RefractoryMemory;
use crate::kernels::thresholds::ThresholdField;
use ndarray::{Array2, Zip};
use rand::seq::SliceRandom;
use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    On,
    Off,
}

impl Polarity {
    #[inline]
    pub fn sign(self) -> i8 {
        match self {
            Polarity::On => 1,
            Polarity::Off => -1,
        }
    }
}

/// Shot noise inputs shared by both polarities of one frame.
#[derive(Debug, Clone, Copy)]
pub struct ShotNoise<'a> {
    pub rate_hz: f64,
    pub inten01: &'a Array2<f64>,
}

/// Result of one frame of change detection.
#[derive(Debug, Clone)]
pub struct Detection {
    pub batch: EventBatch,
    /// Emitted ON events per pixel, noise included, refractory drops excluded.
    pub final_pos: Array2<u32>,
    pub final_neg: Array2<u32>,
    pub pos_num_iters: usize,
    pub neg_num_iters: usize,
}

/// Slack added before flooring a threshold ratio.
///
/// Lin-log values are rounded to 1e-8, so a change of exactly `n` thresholds
/// can come out a few ulps short of `n`.
pub const COUNT_TOLERANCE: f64 = 1e-6;

/// Quantized number of ON and OFF events per pixel.
///
/// - ON: `floor(max(diff, 0) / pos_thres + COUNT_TOLERANCE)`
/// - OFF: `floor(max(-diff, 0) / neg_thres + COUNT_TOLERANCE)`
pub fn compute_event_map(
    diff: &Array2<f64>,
    pos_thres: &Array2<f64>,
    neg_thres: &Array2<f64>,
) -> (Array2<u32>, Array2<u32>) {
    let mut pos = Array2::<u32>::zeros(diff.raw_dim());
    let mut neg = Array2::<u32>::zeros(diff.raw_dim());
    Zip::from(&mut pos)
        .and(&mut neg)
        .and(diff)
        .and(pos_thres)
        .and(neg_thres)
        .for_each(|p, n, &d, &tp, &tn| {
            if d > 0.0 {
                *p = (d / tp + COUNT_TOLERANCE).floor() as u32;
            } else if d < 0.0 {
                *n = (-d / tn + COUNT_TOLERANCE).floor() as u32;
            }
        });
    (pos, neg)
}

/// Emission passes needed for one polarity.
///
/// The largest per-pixel count bounds the number of passes. With shot noise
/// enabled at least one pass runs so that noise can fire in a quiet frame.
pub fn num_iters(counts: &Array2<u32>, shot_noise_enabled: bool) -> usize {
    let max = counts.iter().copied().max().unwrap_or(0) as usize;
    if shot_noise_enabled {
        max.max(1)
    } else {
        max
    }
}

/// Timestamp of pass `i` (0-based) out of `num_iters` between two frames.
///
/// Passes are spaced by `(t_frame - t_previous) / num_iters`; the last pass
/// lands exactly on `t_frame`.
#[inline]
pub fn pass_timestamp(i: usize, num_iters: usize, t_previous: f64, t_frame: f64) -> f64 {
    if i + 1 >= num_iters {
        t_frame
    } else {
        let step = (t_frame - t_previous) / num_iters as f64;
        t_previous + (i + 1) as f64 * step
    }
}

/// Emit all passes of one polarity, appending events to `events`.
///
/// Uniform-interval schedule: a pixel needing `k > 0` events gets
/// `interval = floor(num_iters / k)` and fires in the passes whose 1-based
/// index equals its schedule, which starts at `interval` and advances by
/// `interval` after each hit. It never fires more than `k` signal events;
/// leftover passes at the end stay unused when `k` does not divide `num_iters`.
///
/// Within each pass the firing pixels are shuffled before being appended so
/// that equal timestamps carry no raster-scan order.
///
/// Returns the per-pixel number of emitted events.
#[allow(clippy::too_many_arguments)]
pub fn emit_polarity<R: Rng + ?Sized>(
    polarity: Polarity,
    counts: &Array2<u32>,
    num_iters: usize,
    t_previous: f64,
    t_frame: f64,
    shot_noise: Option<(ShotNoise<'_>, &Array2<f64>)>,
    mut refractory: Option<&mut RefractoryMemory>,
    rng: &mut R,
    events: &mut Vec<Event>,
) -> Array2<u32> {
    let mut fired = Array2::<u32>::zeros(counts.raw_dim());
    let delta_time = t_frame - t_previous;
    if num_iters == 0 || delta_time <= 0.0 {
        return fired;
    }
    let ts_step = delta_time / num_iters as f64;
    let iters = num_iters as u32;

    let interval = counts.mapv(|k| if k == 0 { 0 } else { iters / k });
    let mut schedule = interval.clone();
    let mut remaining = counts.clone();

    let shot_prob = shot_noise.map(|(shot, pre_prob)| {
        shot_noise_probability(shot.rate_hz, delta_time, num_iters, shot.inten01, pre_prob)
    });

    let mut fire = Array2::from_elem(counts.raw_dim(), false);
    let sign = polarity.sign();

    for i in 0..num_iters {
        let pass = (i + 1) as u32;
        let t = pass_timestamp(i, num_iters, t_previous, t_frame);

        Zip::from(&mut fire)
            .and(&mut schedule)
            .and(&mut remaining)
            .and(&interval)
            .for_each(|f, sched, rem, &step| {
                *f = false;
                if step > 0 && *sched == pass {
                    *sched += step;
                    if *rem > 0 {
                        *rem -= 1;
                        *f = true;
                    }
                }
            });

        if let Some(prob) = shot_prob.as_ref() {
            // drawn for every pixel, so the stream does not depend on signal events
            let noise = sample_shot_noise(prob, rng);
            Zip::from(&mut fire).and(&noise).for_each(|f, &n| *f |= n);
        }

        if let Some(mem) = refractory.as_deref_mut() {
            if mem.applies_to_step(ts_step) {
                mem.gate(&mut fire, t);
            }
        }

        let start = events.len();
        for ((y, x), &f) in fire.indexed_iter() {
            if f {
                fired[[y, x]] += 1;
                events.push(Event { t, x: x as u16, y: y as u16, p: sign });
            }
        }
        events[start..].shuffle(rng);
    }

    fired
}

/// Run change detection for one frame interval.
///
/// ON passes are generated before OFF passes; the merged list is then
/// stable-sorted by timestamp. Does not touch the baseline; see
/// [`update_baseline`].
pub fn detect<R: Rng + ?Sized>(
    diff: &Array2<f64>,
    thresholds: &ThresholdField,
    t_previous: f64,
    t_frame: f64,
    shot_noise: Option<ShotNoise<'_>>,
    mut refractory: Option<&mut RefractoryMemory>,
    rng: &mut R,
) -> Detection {
    let (pos_counts, neg_counts) = compute_event_map(diff, &thresholds.pos, &thresholds.neg);
    let shot_enabled = shot_noise.is_some();
    let pos_num_iters = num_iters(&pos_counts, shot_enabled);
    let neg_num_iters = num_iters(&neg_counts, shot_enabled);

    let mut events = Vec::new();
    let final_pos = emit_polarity(
        Polarity::On,
        &pos_counts,
        pos_num_iters,
        t_previous,
        t_frame,
        shot_noise.map(|s| (s, &thresholds.pos_pre_prob)),
        refractory.as_deref_mut(),
        rng,
        &mut events,
    );
    let final_neg = emit_polarity(
        Polarity::Off,
        &neg_counts,
        neg_num_iters,
        t_previous,
        t_frame,
        shot_noise.map(|s| (s, &thresholds.neg_pre_prob)),
        refractory.as_deref_mut(),
        rng,
        &mut events,
    );

    Detection {
        batch: EventBatch::from_unsorted(events),
        final_pos,
        final_neg,
        pos_num_iters,
        neg_num_iters,
    }
}

/// Move the baseline by exactly the emitted events: `+ pos * theta_on - neg * theta_off`.
///
/// The sub-threshold remainder is never absorbed, so it carries over to the
/// next frame.
pub fn update_baseline(base_log_frame: &mut Array2<f64>, detection: &Detection, thresholds: &ThresholdField) {
    Zip::from(base_log_frame)
        .and(&detection.final_pos)
        .and(&detection.final_neg)
        .and(&thresholds.pos)
        .and(&thresholds.neg)
        .for_each(|base, &np, &nn, &tp, &tn| {
            *base += np as f64 * tp;
            *base -= nn as f64 * tn;
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn event_map_floors_both_polarities() {
        let diff = array![[0.45, -0.45, 0.1, 0.0]];
        let t = Array2::from_elem((1, 4), 0.2);
        let (p, n) = compute_event_map(&diff, &t, &t);
        assert_eq!(p, array![[2, 0, 0, 0]]);
        assert_eq!(n, array![[0, 2, 0, 0]]);
    }

    #[test]
    fn exact_multiples_are_not_lost_to_rounding() {
        let t = Array2::from_elem((1, 6), 0.2);
        let diff = Array2::from_shape_fn((1, 6), |(_, x)| {
            let n = (x + 1) as f64;
            // what lin-log differences look like: rounded to 8 decimals
            (((100f64.ln() + n * 0.2) * 1e8).round() - (100f64.ln() * 1e8).round()) / 1e8
        });
        let (p, _) = compute_event_map(&diff, &t, &t);
        assert_eq!(p, array![[1, 2, 3, 4, 5, 6]]);
        let (_, n) = compute_event_map(&diff.mapv(|d| -d), &t, &t);
        assert_eq!(n, array![[1, 2, 3, 4, 5, 6]]);
    }

    #[test]
    fn pass_timestamps_end_on_frame_time() {
        assert_eq!(pass_timestamp(2, 3, 1.0, 1.3), 1.3);
        assert!((pass_timestamp(0, 3, 1.0, 1.3) - 1.1).abs() < 1e-12);
    }

    #[test]
    fn schedule_never_exceeds_count() {
        // k = 2 with 3 passes: interval 1 would hit every pass without the cap
        let counts = array![[3u32, 2, 1, 0]];
        let mut rng = StdRng::seed_from_u64(9);
        let mut events = Vec::new();
        let fired = emit_polarity(Polarity::On, &counts, 3, 0.0, 0.03, None, None, &mut rng, &mut events);
        assert_eq!(fired, counts);
        assert_eq!(events.len(), 6);
        let single: Vec<f64> = events.iter().filter(|e| e.x == 2).map(|e| e.t).collect();
        assert_eq!(single, vec![0.03]);
    }

    #[test]
    fn spreads_evenly_when_count_divides_passes() {
        let counts = array![[4u32, 2]];
        let mut rng = StdRng::seed_from_u64(9);
        let mut events = Vec::new();
        emit_polarity(Polarity::Off, &counts, 4, 0.0, 0.4, None, None, &mut rng, &mut events);
        let mut two: Vec<f64> = events.iter().filter(|e| e.x == 1).map(|e| e.t).collect();
        two.sort_by(f64::total_cmp);
        assert_eq!(two.len(), 2);
        assert!((two[0] - 0.2).abs() < 1e-12);
        assert!((two[1] - 0.4).abs() < 1e-12);
        assert!(events.iter().all(|e| e.p == -1));
    }
}
