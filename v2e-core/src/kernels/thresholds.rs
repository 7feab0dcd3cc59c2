use ndarray::{Array2, Zip};
use rand::Rng;
use rand_distr::{Distribution, Normal};

/// Smallest threshold a pixel can draw; keeps `nominal / actual` finite.
pub const MIN_THRESHOLD: f64 = 0.01;

/// Per-pixel ON/OFF thresholds drawn once per emulator lifetime.
#[derive(Debug, Clone)]
pub struct ThresholdField {
    pub pos: Array2<f64>,
    pub neg: Array2<f64>,
    /// `pos_nominal / pos`, scales the ON shot noise probability.
    pub pos_pre_prob: Array2<f64>,
    /// `neg_nominal / neg`, scales the OFF shot noise probability.
    pub neg_pre_prob: Array2<f64>,
}

impl ThresholdField {
    /// Draw thresholds from `Normal(nominal, sigma)`, clamped to [`MIN_THRESHOLD`].
    ///
    /// ON thresholds are drawn for the whole array before OFF thresholds.
    /// With `sigma <= 0` every pixel holds its nominal value and no random
    /// numbers are consumed.
    pub fn draw<R: Rng + ?Sized>(
        shape: (usize, usize),
        pos_nominal: f64,
        neg_nominal: f64,
        sigma: f64,
        rng: &mut R,
    ) -> Self {
        let (pos, neg) = if sigma > 0.0 {
            (
                sample_clamped(shape, pos_nominal, sigma, rng),
                sample_clamped(shape, neg_nominal, sigma, rng),
            )
        } else {
            (
                Array2::from_elem(shape, pos_nominal),
                Array2::from_elem(shape, neg_nominal),
            )
        };
        let pos_pre_prob = pos.mapv(|t| pos_nominal / t);
        let neg_pre_prob = neg.mapv(|t| neg_nominal / t);
        Self { pos, neg, pos_pre_prob, neg_pre_prob }
    }

    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        self.pos.dim()
    }
}

fn sample_clamped<R: Rng + ?Sized>(shape: (usize, usize), mean: f64, sigma: f64, rng: &mut R) -> Array2<f64> {
    let normal = Normal::new(mean, sigma).unwrap_or_else(|_| Normal::new(mean, 1e-9).unwrap());
    let mut out = Array2::from_shape_simple_fn(shape, || normal.sample(rng));
    Zip::from(&mut out).for_each(|t| *t = t.max(MIN_THRESHOLD));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn zero_sigma_is_nominal() {
        let mut rng = StdRng::seed_from_u64(1);
        let f = ThresholdField::draw((3, 3), 0.2, 0.3, 0.0, &mut rng);
        assert!(f.pos.iter().all(|&t| t == 0.2));
        assert!(f.neg.iter().all(|&t| t == 0.3));
        assert!(f.pos_pre_prob.iter().all(|&p| p == 1.0));
    }

    #[test]
    fn large_sigma_is_clamped() {
        let mut rng = StdRng::seed_from_u64(1);
        let f = ThresholdField::draw((32, 32), 0.02, 0.02, 1.0, &mut rng);
        assert!(f.pos.iter().all(|&t| t >= MIN_THRESHOLD));
        assert!(f.neg.iter().all(|&t| t >= MIN_THRESHOLD));
        assert!(f.pos_pre_prob.iter().all(|p| p.is_finite()));
    }
}
