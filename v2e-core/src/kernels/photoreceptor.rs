use ndarray::{Array2, ArrayView2, Zip};
use std::f64::consts::PI;

/// Samples at or below this value are mapped linearly instead of through `ln`.
pub const LIN_LOG_THRESHOLD: f64 = 20.0;

const LIN_LOG_ROUNDING: f64 = 1e8;

/// Lin-log mapping of a single sample.
///
/// - `v <= 20`: `v * ln(20) / 20` (continuous with `ln` at the threshold, finite at 0)
/// - `v > 20`: `ln(v)`
///
/// The result is rounded to 8 decimal digits so that adding one threshold and
/// subtracting it again lands on the same value; otherwise the OFF event that
/// should follow an ON event for a passing edge can be lost in the low bits.
#[inline]
pub fn lin_log_sample(v: f64) -> f64 {
    let y = if v <= LIN_LOG_THRESHOLD {
        v * (LIN_LOG_THRESHOLD.ln() / LIN_LOG_THRESHOLD)
    } else {
        v.ln()
    };
    (y * LIN_LOG_ROUNDING).round() / LIN_LOG_ROUNDING
}

/// Pointwise lin-log mapping of a frame.
pub fn lin_log(frame: ArrayView2<'_, f64>) -> Array2<f64> {
    frame.mapv(lin_log_sample)
}

/// Smallest normalized intensity, reached at sample value 0 and below.
pub const MIN_INTEN01: f64 = 20.0 / 275.0;

/// Normalized intensity in `[20/275, 1]`, assuming 8-bit samples.
///
/// The offset keeps the photoreceptor time constant finite for black pixels.
/// Negative samples clamp to the floor so the filter gain stays positive.
pub fn rescale_intensity(frame: ArrayView2<'_, f64>) -> Array2<f64> {
    frame.mapv(|v| ((v + 20.0) / 275.0).clamp(MIN_INTEN01, 1.0))
}

/// Two cascaded first-order lowpass stages with intensity-dependent bandwidth.
///
/// Semantics:
/// - `tau = 1 / (2 * pi * cutoff_hz)`
/// - per pixel `eps = min(inten01 * dt / tau, 1)`; brighter pixels react faster
/// - `stage0 <- (1 - eps) * stage0 + eps * log_frame`
/// - `stage1 <- (1 - eps) * stage1 + eps * stage0`
/// - `cutoff_hz <= 0`: both stages are overwritten with `log_frame`
pub fn low_pass_filter(
    log_frame: &Array2<f64>,
    stage0: &mut Array2<f64>,
    stage1: &mut Array2<f64>,
    inten01: Option<&Array2<f64>>,
    delta_time: f64,
    cutoff_hz: f64,
) {
    let inten01 = match inten01 {
        Some(i) if cutoff_hz > 0.0 => i,
        _ => {
            stage0.assign(log_frame);
            stage1.assign(log_frame);
            return;
        }
    };

    let tau = 1.0 / (2.0 * PI * cutoff_hz);
    let dt_over_tau = delta_time.max(0.0) / tau;

    Zip::from(stage0)
        .and(stage1)
        .and(log_frame)
        .and(inten01)
        .for_each(|s0, s1, &x, &inten| {
            let eps = (inten * dt_over_tau).min(1.0);
            *s0 = (1.0 - eps) * *s0 + eps * x;
            *s1 = (1.0 - eps) * *s1 + eps * *s0;
        });
}

/// Photoreceptor front end of one emulator: lin-log transform plus lowpass state.
#[derive(Debug, Clone)]
pub struct Photoreceptor {
    cutoff_hz: f64,
    stage0: Array2<f64>,
    stage1: Array2<f64>,
}

impl Photoreceptor {
    /// Initialize both stages to `log_frame` so the first frame has no transient.
    pub fn new(log_frame: &Array2<f64>, cutoff_hz: f64) -> Self {
        Self {
            cutoff_hz,
            stage0: log_frame.clone(),
            stage1: log_frame.clone(),
        }
    }

    /// Advance the filter by `delta_time` seconds towards `log_frame`.
    pub fn update(&mut self, log_frame: &Array2<f64>, inten01: Option<&Array2<f64>>, delta_time: f64) {
        low_pass_filter(
            log_frame,
            &mut self.stage0,
            &mut self.stage1,
            inten01,
            delta_time,
            self.cutoff_hz,
        );
    }

    #[inline]
    pub fn stage0(&self) -> &Array2<f64> {
        &self.stage0
    }

    /// Filtered brightness (the output stage).
    #[inline]
    pub fn output(&self) -> &Array2<f64> {
        &self.stage1
    }
}
