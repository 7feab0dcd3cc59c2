//! Center-surround diffuser.
//!
//! A resistive grid (lateral conductance) is coupled to every photoreceptor
//! output through a transverse conductance. The grid voltage is a spatially
//! and temporally lowpassed copy of the center signal, the "surround", which
//! the change detector subtracts from the center.
//!
//! Dynamics are integrated with explicit Euler steps of
//!
//! ```text
//! dh = alpha_p * (p - h) + alpha_h * (K * h)
//! K  = [[0, 1, 0], [1, -4, 1], [0, 1, 0]]
//! ```
//!
//! using edge replication at the border, so border pixels are not pulled
//! towards zero.

use crate::error::{EmulatorError, Result};
use ndarray::{Array2, Zip};
use tracing::{error, warn};

/// Euler stepping stops once no pixel moves more than this in one step.
pub const MAX_CHANGE_TO_TERMINATE_EULER_STEPPING: f64 = 1e-5;

/// Time constant used when the surround is configured as instantaneous.
const ABS_MIN_TAU_P_S: f64 = 1e-9;

const NUM_STEPS_PER_TAU: f64 = 5.0;

/// Above this the Euler update is stable but inaccurate.
const ALPHA_WARN: f64 = 0.25;

/// A frame needing more sub-steps than this is worth a one-time warning.
const STEPS_WARN: usize = 1000;

/// Sub-stepping plan for one frame interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiffuserPlan {
    pub num_steps: usize,
    /// Transverse (photoreceptor to grid) update fraction per step.
    pub alpha_p: f64,
    /// Lateral (grid to grid) update fraction per step.
    pub alpha_h: f64,
}

/// Sub-step statistics over all frames processed so far.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiffuserStats {
    pub frames: usize,
    pub mean: f64,
    pub std: f64,
    pub median: f64,
}

#[derive(Debug, Clone)]
pub struct CenterSurround {
    lambda_pixels: f64,
    tau_p_s: f64,
    tau_h_s: f64,
    surround: Option<Array2<f64>>,
    steps_taken: Vec<usize>,
    steps_warning_logged: bool,
    alpha_warning_logged: bool,
}

impl CenterSurround {
    /// `tau_p_ms` of `None` or 0 selects an (effectively) instantaneous surround.
    pub fn new(lambda_pixels: f64, tau_p_ms: Option<f64>) -> Self {
        let tau_p_s = match tau_p_ms {
            Some(ms) if ms > 0.0 => ms * 1e-3,
            _ => ABS_MIN_TAU_P_S,
        };
        let tau_h_s = tau_p_s / (lambda_pixels * lambda_pixels);
        Self {
            lambda_pixels,
            tau_p_s,
            tau_h_s,
            surround: None,
            steps_taken: Vec::new(),
            steps_warning_logged: false,
            alpha_warning_logged: false,
        }
    }

    #[inline]
    pub fn lambda_pixels(&self) -> f64 {
        self.lambda_pixels
    }

    #[inline]
    pub fn tau_p_s(&self) -> f64 {
        self.tau_p_s
    }

    #[inline]
    pub fn tau_h_s(&self) -> f64 {
        self.tau_h_s
    }

    /// Current surround frame, once initialized.
    #[inline]
    pub fn surround(&self) -> Option<&Array2<f64>> {
        self.surround.as_ref()
    }

    /// Drop the surround state; the next update re-initializes it.
    pub fn clear(&mut self) {
        self.surround = None;
    }

    /// Number of sub-steps and update fractions for an interval of `delta_time`.
    ///
    /// Errors with `UnstableDiffuser` if either fraction reaches 1. Pure: no
    /// state changes, so a failing frame leaves the emulator untouched.
    pub fn plan(&self, delta_time: f64) -> Result<DiffuserPlan> {
        if delta_time <= 0.0 {
            return Ok(DiffuserPlan { num_steps: 0, alpha_p: 0.0, alpha_h: 0.0 });
        }
        let min_tau = self.tau_p_s.min(self.tau_h_s);
        let num_steps = ((delta_time / min_tau) * NUM_STEPS_PER_TAU).ceil().max(1.0) as usize;
        self.plan_with_steps(delta_time, num_steps)
    }

    /// Like [`CenterSurround::plan`] with an explicit sub-step count.
    pub fn plan_with_steps(&self, delta_time: f64, num_steps: usize) -> Result<DiffuserPlan> {
        if delta_time <= 0.0 || num_steps == 0 {
            return Ok(DiffuserPlan { num_steps: 0, alpha_p: 0.0, alpha_h: 0.0 });
        }
        let step_dt = delta_time / num_steps as f64;
        let alpha_p = step_dt / self.tau_p_s;
        let alpha_h = step_dt / self.tau_h_s;
        if alpha_p >= 1.0 || alpha_h >= 1.0 {
            error!(alpha_p, alpha_h, "center-surround update alpha too large; simulation would explode");
            return Err(EmulatorError::UnstableDiffuser { alpha_p, alpha_h });
        }
        Ok(DiffuserPlan { num_steps, alpha_p, alpha_h })
    }

    /// Step the surround towards `center` following `plan`.
    ///
    /// On first use the surround is copied from `center` and no stepping happens.
    /// Returns the number of Euler steps taken.
    pub fn update(&mut self, center: &Array2<f64>, plan: &DiffuserPlan) -> usize {
        let surround = match self.surround.as_mut() {
            None => {
                self.surround = Some(center.clone());
                return 0;
            }
            Some(s) => s,
        };

        if plan.num_steps > STEPS_WARN && !self.steps_warning_logged {
            warn!(
                num_steps = plan.num_steps,
                step_dt = plan.alpha_p * self.tau_p_s,
                terminate_below = MAX_CHANGE_TO_TERMINATE_EULER_STEPPING,
                "surround Euler stepping may take many steps per frame; stepping ends early on convergence"
            );
            self.steps_warning_logged = true;
        }
        if (plan.alpha_p > ALPHA_WARN || plan.alpha_h > ALPHA_WARN) && !self.alpha_warning_logged {
            warn!(
                alpha_p = plan.alpha_p,
                alpha_h = plan.alpha_h,
                "center-surround update alpha is large; simulation will be inaccurate"
            );
            self.alpha_warning_logged = true;
        }

        let steps = diffuse(surround, center, plan);
        self.steps_taken.push(steps);
        steps
    }

    /// Sub-step statistics, `None` before any stepped frame.
    pub fn stats(&self) -> Option<DiffuserStats> {
        if self.steps_taken.is_empty() {
            return None;
        }
        let n = self.steps_taken.len() as f64;
        let mean = self.steps_taken.iter().sum::<usize>() as f64 / n;
        let var = self
            .steps_taken
            .iter()
            .map(|&s| (s as f64 - mean).powi(2))
            .sum::<f64>()
            / n;
        let mut sorted = self.steps_taken.clone();
        sorted.sort_unstable();
        let mid = sorted.len() / 2;
        let median = if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) as f64 / 2.0
        } else {
            sorted[mid] as f64
        };
        Some(DiffuserStats {
            frames: self.steps_taken.len(),
            mean,
            std: var.sqrt(),
            median,
        })
    }
}

/// Run up to `plan.num_steps` Euler steps in place; returns steps taken.
pub fn diffuse(surround: &mut Array2<f64>, center: &Array2<f64>, plan: &DiffuserPlan) -> usize {
    let mut change = Array2::<f64>::zeros(surround.raw_dim());
    let mut max_change = 2.0 * MAX_CHANGE_TO_TERMINATE_EULER_STEPPING;
    let mut steps = 0usize;
    while steps < plan.num_steps && max_change > MAX_CHANGE_TO_TERMINATE_EULER_STEPPING {
        laplacian_replicate(surround, &mut change);
        max_change = 0.0;
        Zip::from(&mut change)
            .and(&*surround)
            .and(center)
            .for_each(|c, &h, &p| {
                *c = plan.alpha_p * (p - h) + plan.alpha_h * *c;
                max_change = f64::max(max_change, c.abs());
            });
        *surround += &change;
        steps += 1;
    }
    steps
}

/// 4-neighbour Laplacian with edge-replication padding, written into `out`.
pub fn laplacian_replicate(h: &Array2<f64>, out: &mut Array2<f64>) {
    let (rows, cols) = h.dim();
    if rows == 0 || cols == 0 {
        return;
    }
    for y in 0..rows {
        let up = y.saturating_sub(1);
        let down = (y + 1).min(rows - 1);
        for x in 0..cols {
            let left = x.saturating_sub(1);
            let right = (x + 1).min(cols - 1);
            let c = h[[y, x]];
            out[[y, x]] = h[[up, x]] + h[[down, x]] + h[[y, left]] + h[[y, right]] - 4.0 * c;
        }
    }
}
