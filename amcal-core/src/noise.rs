//! Observation-noise variance model.
//!
//! The noise variance has a conjugate inverse-gamma prior with `n0` prior
//! pseudo-observations. After every iteration a new variance is drawn from
//!
//! $$ \sigma^2 \sim \mathrm{InvGamma}\left(\frac{n_0 + n}{2}, \frac{n_0 \sigma^2_{prev} + SS}{2}\right) $$
//!
//! where `n` is the number of observations and `SS` the sum of squares of the
//! current chain position.

use crate::{Error, Result};
use rand::Rng;
use rand_distr::{Distribution, Gamma};
use serde::{Deserialize, Serialize};

/// Conjugate inverse-gamma update of the observation-noise variance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoiseVarianceModel {
    /// Prior pseudo-count
    n0: f64,
    /// Number of observations
    n_output: usize,
}

impl NoiseVarianceModel {
    pub fn new(n0: f64, n_output: usize) -> Result<Self> {
        if !(n0.is_finite() && n0 > 0.0) {
            return Err(Error::InvalidConfiguration(format!(
                "Prior pseudo-count n0 must be positive, got {}",
                n0
            )));
        }
        if n_output == 0 {
            return Err(Error::InvalidConfiguration(
                "Noise variance model needs at least one observation".to_string(),
            ));
        }
        Ok(Self { n0, n_output })
    }

    pub fn n0(&self) -> f64 {
        self.n0
    }

    /// Initial variance estimate with a degrees-of-freedom correction.
    ///
    /// `ssq / (n_output - n_params)`; requires `n_output > n_params`.
    pub fn initial_variance(&self, ssq: f64, n_params: usize) -> Result<f64> {
        if self.n_output <= n_params {
            return Err(Error::SingularSensitivity(format!(
                "{} output samples are not enough to calibrate {} parameters",
                self.n_output, n_params
            )));
        }
        Ok(ssq / (self.n_output - n_params) as f64)
    }

    /// Shape and rate of the inverse-gamma posterior.
    pub fn posterior(&self, std2_prev: f64, ssq: f64) -> (f64, f64) {
        let shape = 0.5 * (self.n0 + self.n_output as f64);
        let rate = 0.5 * (self.n0 * std2_prev + ssq);
        (shape, rate)
    }

    /// Draw the next noise variance.
    ///
    /// Samples `1 / Gamma(shape, scale = 1 / rate)`. A draw that is not a
    /// positive finite number (possible only for a degenerate rate) falls back to
    /// the previous variance so the series stays strictly positive.
    pub fn update<R: Rng + ?Sized>(&self, std2_prev: f64, ssq: f64, rng: &mut R) -> f64 {
        let (shape, rate) = self.posterior(std2_prev, ssq);
        let draw = Gamma::new(shape, 1.0 / rate)
            .ok()
            .map(|gamma| 1.0 / gamma.sample(rng));

        match draw {
            Some(v) if v.is_finite() && v > 0.0 => v,
            _ => std2_prev,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use is_close::is_close;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_validation() {
        assert!(NoiseVarianceModel::new(0.001, 10).is_ok());
        assert!(NoiseVarianceModel::new(0.0, 10).is_err());
        assert!(NoiseVarianceModel::new(-1.0, 10).is_err());
        assert!(NoiseVarianceModel::new(0.01, 0).is_err());
    }

    #[test]
    fn test_initial_variance_dof_correction() {
        let model = NoiseVarianceModel::new(0.001, 11).unwrap();
        assert!(is_close!(model.initial_variance(20.0, 1).unwrap(), 2.0));
        assert!(model.initial_variance(20.0, 11).is_err());
    }

    #[test]
    fn test_posterior_parameters() {
        let model = NoiseVarianceModel::new(0.01, 100).unwrap();
        let (shape, rate) = model.posterior(2.0, 50.0);
        assert!(is_close!(shape, 50.005));
        assert!(is_close!(rate, 25.01));
    }

    #[test]
    fn test_draws_are_positive() {
        let model = NoiseVarianceModel::new(0.001, 20).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut std2 = 1.0;
        for _ in 0..1000 {
            std2 = model.update(std2, 5.0, &mut rng);
            assert!(std2 > 0.0 && std2.is_finite());
        }
    }

    #[test]
    fn test_draws_concentrate_around_mean_square_residual() {
        // With n0 -> 0 the posterior mean of sigma^2 is ssq / (n - 2)
        let n = 200;
        let ssq = 400.0;
        let model = NoiseVarianceModel::new(0.001, n).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(7);

        let draws: Vec<f64> = (0..5000).map(|_| model.update(2.0, ssq, &mut rng)).collect();
        let mean = draws.iter().sum::<f64>() / draws.len() as f64;
        let expected = ssq / (n as f64 - 2.0);

        assert!(
            (mean - expected).abs() / expected < 0.05,
            "mean draw {} should be close to {}",
            mean,
            expected
        );
    }

    #[test]
    fn test_zero_sum_of_squares_keeps_series_positive() {
        let model = NoiseVarianceModel::new(0.001, 5).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let std2 = model.update(1e-3, 0.0, &mut rng);
        assert!(std2 > 0.0);
    }
}
