//! Finite-difference sensitivity and sampler initialisation.
//!
//! The initial proposal covariance is the Gauss-Newton approximation of the
//! posterior covariance at the starting point:
//!
//! $$ V_{start} = \sigma^2_0 \left(X^T X\right)^{-1} $$
//!
//! where `X` is the Jacobian of the simulated series with respect to the
//! calibrated parameters and `σ²₀` the residual variance at the start.

use crate::evaluator::SumOfSquaresEvaluator;
use crate::model_runner::ModelRunner;
use crate::noise::NoiseVarianceModel;
use crate::utils::linear_algebra::{checked_cholesky, invert_spd, symmetrize, to_matrix};
use crate::{Error, Result};
use nalgebra::DMatrix;
use ndarray::{Array1, Array2};

/// Quantities computed once before sampling starts.
#[derive(Debug, Clone)]
pub struct Initialisation {
    /// Simulated series at the starting point
    pub simulated: Array1<f64>,
    /// Sensitivity matrix, shape (n_output, n_params)
    pub jacobian: Array2<f64>,
    /// Sum of squares at the starting point
    pub ssq: f64,
    /// Initial noise variance `std2[0]`
    pub std2: f64,
    /// Initial proposal covariance `Vstart`
    pub covariance: DMatrix<f64>,
}

/// Finite-difference Jacobian of the simulated series.
///
/// Column `j` is `(y(q + h q_j e_j) - y(q)) / (h q_j)`, a strictly relative
/// forward difference on component `j` only.
///
/// # Arguments
///
/// * `evaluator` - Evaluator wrapping the forward model
/// * `start` - Point at which the derivatives are taken
/// * `base` - Simulated series at `start`
/// * `relative_step` - Relative perturbation `h`
pub fn finite_difference_jacobian<R: ModelRunner>(
    evaluator: &SumOfSquaresEvaluator<R>,
    start: &[f64],
    base: &Array1<f64>,
    relative_step: f64,
) -> Result<Array2<f64>> {
    if !(relative_step.is_finite() && relative_step > 0.0) {
        return Err(Error::InvalidConfiguration(format!(
            "Finite-difference step must be positive, got {}",
            relative_step
        )));
    }

    let mut jacobian = Array2::zeros((base.len(), start.len()));
    for (j, &q_j) in start.iter().enumerate() {
        let dq = q_j * relative_step;
        if dq == 0.0 {
            return Err(Error::SingularSensitivity(format!(
                "Starting value of parameter {} is zero; a relative step is undefined",
                j
            )));
        }

        let mut perturbed = start.to_vec();
        perturbed[j] = q_j * (1.0 + relative_step);
        let simulated = evaluator.simulate(&perturbed)?;

        let column = (&simulated - base) / dq;
        jacobian.column_mut(j).assign(&column);
    }

    Ok(jacobian)
}

/// Compute the initial noise variance and proposal covariance.
///
/// Fails with a configuration error if `XᵀX` cannot be inverted (too few
/// output samples or collinear sensitivities) or if the resulting covariance is
/// not positive-definite.
pub fn initialise<R: ModelRunner>(
    evaluator: &SumOfSquaresEvaluator<R>,
    noise: &NoiseVarianceModel,
    start: &[f64],
    relative_step: f64,
) -> Result<Initialisation> {
    let n_params = start.len();
    let simulated = evaluator.simulate(start)?;
    let ssq = evaluator.observations().sum_of_squares(simulated.view())?;
    let std2 = noise.initial_variance(ssq, n_params)?;

    let jacobian = finite_difference_jacobian(evaluator, start, &simulated, relative_step)?;
    let x = to_matrix(jacobian.view());
    let xtx = x.transpose() * &x;
    let xtx_inv = invert_spd(&xtx).ok_or_else(|| {
        Error::SingularSensitivity(
            "XᵀX is not positive-definite; parameter effects are degenerate or collinear"
                .to_string(),
        )
    })?;

    let covariance = symmetrize(&(xtx_inv * std2));
    if checked_cholesky(&covariance).is_none() {
        return Err(Error::DegenerateInitialCovariance(std2));
    }

    Ok(Initialisation {
        simulated,
        jacobian,
        ssq,
        std2,
        covariance,
    })
}
