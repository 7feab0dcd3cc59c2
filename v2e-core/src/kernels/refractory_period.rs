use ndarray::{Array2, Zip};

/// Refractory period memory.
///
/// Keeps at most one event per pixel within the refractory window,
/// regardless of polarity. For each pixel (x,y), a spike at time `t` is kept iff
///     t - last_spike[y,x] > refractory_period
/// After keeping a spike, last_spike[y,x] := t.
///
/// Memory starts at -inf, so the first spike of every pixel is always kept.
#[derive(Debug, Clone)]
pub struct RefractoryMemory {
    period_s: f64,
    last_spike: Array2<f64>,
}

impl RefractoryMemory {
    pub fn new(shape: (usize, usize), period_s: f64) -> Self {
        Self {
            period_s,
            last_spike: Array2::from_elem(shape, f64::NEG_INFINITY),
        }
    }

    #[inline]
    pub fn period_s(&self) -> f64 {
        self.period_s
    }

    /// Whether the period is longer than one emission pass, i.e. whether it can
    /// suppress anything at this pass spacing.
    #[inline]
    pub fn applies_to_step(&self, ts_step: f64) -> bool {
        self.period_s > ts_step
    }

    /// Clear `fire` where the pixel is still refractory at time `t`, and stamp
    /// `t` on the pixels left firing.
    ///
    /// Returns the number of suppressed spikes.
    pub fn gate(&mut self, fire: &mut Array2<bool>, t: f64) -> usize {
        let period = self.period_s;
        let mut suppressed = 0usize;
        Zip::from(fire)
            .and(&mut self.last_spike)
            .for_each(|f, last| {
                if !*f {
                    return;
                }
                if t - *last > period {
                    *last = t;
                } else {
                    *f = false;
                    suppressed += 1;
                }
            });
        suppressed
    }

    #[inline]
    pub fn last_spike(&self) -> &Array2<f64> {
        &self.last_spike
    }
}
