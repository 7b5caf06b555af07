//! Sum-of-squares evaluation of candidate parameter vectors.

use crate::model_runner::{EvaluationMode, ModelRunner};
use crate::target::Observations;
use crate::{Error, Result};
use ndarray::Array1;
use std::cell::Cell;

/// Evaluates the forward model and compares its primary series with the observations.
///
/// The evaluator does not check parameter bounds; callers only pass vectors that
/// are inside the prior support. It counts every forward-model call. The counter
/// makes the type `!Sync`, so a single evaluator can never run two evaluations
/// concurrently.
pub struct SumOfSquaresEvaluator<R: ModelRunner> {
    runner: R,
    observations: Observations,
    mode: EvaluationMode<R::Surrogate>,
    n_evaluations: Cell<usize>,
}

impl<R: ModelRunner> SumOfSquaresEvaluator<R> {
    pub fn new(runner: R, observations: Observations, mode: EvaluationMode<R::Surrogate>) -> Self {
        Self {
            runner,
            observations,
            mode,
            n_evaluations: Cell::new(0),
        }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn observations(&self) -> &Observations {
        &self.observations
    }

    pub fn mode(&self) -> &EvaluationMode<R::Surrogate> {
        &self.mode
    }

    /// Number of forward-model evaluations performed so far.
    pub fn n_evaluations(&self) -> usize {
        self.n_evaluations.get()
    }

    /// Run the forward model and return its primary series.
    ///
    /// Fails if the model fails, if the series length differs from the number of
    /// observations, or if the series contains non-finite values.
    pub fn simulate(&self, params: &[f64]) -> Result<Array1<f64>> {
        self.n_evaluations.set(self.n_evaluations.get() + 1);

        let output = self.mode.evaluate(&self.runner, params)?;
        let primary = output.primary()?;
        if primary.len() != self.observations.len() {
            return Err(Error::ShapeMismatch {
                expected: self.observations.len(),
                actual: primary.len(),
            });
        }
        if primary.iter().any(|v| !v.is_finite()) {
            return Err(Error::ModelError(format!(
                "Model output is not finite for parameters {:?}",
                params
            )));
        }
        Ok(primary.to_owned())
    }

    /// Residual sum of squares of the simulated series at `params`.
    pub fn sum_of_squares(&self, params: &[f64]) -> Result<f64> {
        let simulated = self.simulate(params)?;
        self.observations.sum_of_squares(simulated.view())
    }
}
