//! Multivariate-normal random-walk proposal with adaptive covariance.

use crate::utils::linear_algebra::{checked_cholesky, empirical_covariance, symmetrize};
use crate::{Error, Result};
use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

/// Optimal random-walk Metropolis scaling for `d` parameters (Gelman, Roberts & Gilks 1996).
pub fn optimal_scaling(n_params: usize) -> f64 {
    2.38_f64.powi(2) / n_params as f64
}

/// Result of an adaptation checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdaptationOutcome {
    /// The re-estimated covariance replaced the current one
    Updated,
    /// The re-estimate was not positive-definite; the current covariance was kept
    Retained,
}

/// Holds the current proposal covariance together with its lower Cholesky factor.
///
/// The pair is only ever replaced together, and only by a matrix that passed
/// [`checked_cholesky`], so draws always use a proper covariance.
#[derive(Debug, Clone, PartialEq)]
pub struct ProposalCovariance {
    covariance: DMatrix<f64>,
    factor: DMatrix<f64>,
    scaling: f64,
}

impl ProposalCovariance {
    /// Create a proposal from an initial covariance.
    ///
    /// # Arguments
    ///
    /// * `covariance` - Initial (d, d) covariance, must be symmetric positive-definite
    /// * `scaling` - Factor applied to every re-estimated covariance
    pub fn new(covariance: DMatrix<f64>, scaling: f64) -> Result<Self> {
        if !(scaling.is_finite() && scaling > 0.0) {
            return Err(Error::InvalidConfiguration(format!(
                "Covariance scaling must be positive, got {}",
                scaling
            )));
        }
        let covariance = symmetrize(&covariance);
        let chol = checked_cholesky(&covariance).ok_or_else(|| {
            Error::InvalidParameter(
                "Initial proposal covariance is not positive-definite".to_string(),
            )
        })?;

        Ok(Self {
            factor: chol.l(),
            covariance,
            scaling,
        })
    }

    pub fn n_params(&self) -> usize {
        self.covariance.nrows()
    }

    pub fn covariance(&self) -> &DMatrix<f64> {
        &self.covariance
    }

    pub fn scaling(&self) -> f64 {
        self.scaling
    }

    /// Draw `q ~ N(mean, V)`.
    ///
    /// Computed as `mean + L z` with `z` a vector of independent standard normals.
    pub fn draw<R: Rng + ?Sized>(&self, mean: ArrayView1<f64>, rng: &mut R) -> Array1<f64> {
        let d = self.n_params();
        let z = DVector::from_fn(d, |_, _| rng.sample::<f64, _>(StandardNormal));
        let step = &self.factor * z;
        Array1::from_shape_fn(d, |i| mean[i] + step[i])
    }

    /// Re-estimate the covariance from a window of chain entries.
    ///
    /// The empirical covariance of `window` (rows are chain entries) is scaled by
    /// the configured factor. It replaces the current covariance only if it can be
    /// Cholesky-factorised; otherwise the current covariance is kept unchanged.
    pub fn adapt(&mut self, window: ArrayView2<f64>) -> AdaptationOutcome {
        if window.ncols() != self.n_params() {
            return AdaptationOutcome::Retained;
        }
        let candidate = match empirical_covariance(window) {
            Some(cov) => cov * self.scaling,
            None => return AdaptationOutcome::Retained,
        };

        match checked_cholesky(&candidate) {
            Some(chol) => {
                self.factor = chol.l();
                self.covariance = candidate;
                AdaptationOutcome::Updated
            }
            None => AdaptationOutcome::Retained,
        }
    }
}
