//! Interface between the sampler and the forward model.
//!
//! A forward model is a pure function of its parameter vector: it is handed the
//! full vector on every call and must not rely on parameters set by an earlier
//! call. This keeps the sensitivity estimate and the sampling loop free of any
//! ordering constraints between evaluations.

use crate::{Error, Result};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

/// Output of a single forward-model evaluation.
///
/// Only the first column of `series` is compared against the observations.
/// `time` and `auxiliary` are carried for the model's own bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelOutput {
    /// Time axis, one entry per row of `series`
    pub time: Array1<f64>,

    /// Simulated output, shape (n_output, n_columns)
    pub series: Array2<f64>,

    /// Additional model-specific output
    pub auxiliary: Option<Array2<f64>>,
}

impl ModelOutput {
    pub fn new(time: Array1<f64>, series: Array2<f64>) -> Self {
        Self {
            time,
            series,
            auxiliary: None,
        }
    }

    /// Build an output holding a single simulated column.
    pub fn from_primary(time: Array1<f64>, primary: Array1<f64>) -> Self {
        Self::new(time, primary.insert_axis(Axis(1)))
    }

    pub fn with_auxiliary(mut self, auxiliary: Array2<f64>) -> Self {
        self.auxiliary = Some(auxiliary);
        self
    }

    /// Number of output samples.
    pub fn len(&self) -> usize {
        self.series.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// The first simulated column, the series compared against observations.
    pub fn primary(&self) -> Result<ArrayView1<'_, f64>> {
        if self.series.ncols() == 0 {
            return Err(Error::ModelError(
                "Model output does not contain any series".to_string(),
            ));
        }
        Ok(self.series.column(0))
    }
}

/// A forward model that can be calibrated.
pub trait ModelRunner {
    /// State needed for reduced-order evaluation (for example a trained emulator).
    type Surrogate;

    /// Names of the calibrated parameters, in the order of the parameter vector.
    fn param_names(&self) -> &[String];

    /// Full-fidelity evaluation.
    fn run(&self, params: &[f64]) -> Result<ModelOutput>;

    /// Reduced-order evaluation using a surrogate.
    fn run_surrogate(&self, params: &[f64], surrogate: &Self::Surrogate) -> Result<ModelOutput> {
        let _ = (params, surrogate);
        Err(Error::SurrogateUnavailable(
            "model does not provide a reduced-order evaluator".to_string(),
        ))
    }
}

impl<R: ModelRunner + ?Sized> ModelRunner for &R {
    type Surrogate = R::Surrogate;

    fn param_names(&self) -> &[String] {
        (**self).param_names()
    }

    fn run(&self, params: &[f64]) -> Result<ModelOutput> {
        (**self).run(params)
    }

    fn run_surrogate(&self, params: &[f64], surrogate: &Self::Surrogate) -> Result<ModelOutput> {
        (**self).run_surrogate(params, surrogate)
    }
}

/// Selects how the forward model is evaluated.
#[derive(Debug, Clone)]
pub enum EvaluationMode<S> {
    /// Full-fidelity simulation
    Full,
    /// Reduced-order evaluation using the given surrogate state
    Surrogate(S),
}

impl<S> EvaluationMode<S> {
    /// Surrogate evaluation is selected by the presence of a surrogate state.
    pub fn from_surrogate(surrogate: Option<S>) -> Self {
        match surrogate {
            Some(s) => EvaluationMode::Surrogate(s),
            None => EvaluationMode::Full,
        }
    }

    pub fn is_surrogate(&self) -> bool {
        matches!(self, EvaluationMode::Surrogate(_))
    }

    /// Evaluate `runner` in this mode.
    pub fn evaluate<R>(&self, runner: &R, params: &[f64]) -> Result<ModelOutput>
    where
        R: ModelRunner<Surrogate = S>,
    {
        match self {
            EvaluationMode::Full => runner.run(params),
            EvaluationMode::Surrogate(surrogate) => runner.run_surrogate(params, surrogate),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    struct Doubler {
        param_names: Vec<String>,
    }

    impl ModelRunner for Doubler {
        type Surrogate = f64;

        fn param_names(&self) -> &[String] {
            &self.param_names
        }

        fn run(&self, params: &[f64]) -> Result<ModelOutput> {
            Ok(ModelOutput::from_primary(
                array![0.0, 1.0],
                array![params[0], 2.0 * params[0]],
            ))
        }

        fn run_surrogate(&self, params: &[f64], offset: &f64) -> Result<ModelOutput> {
            Ok(ModelOutput::from_primary(
                array![0.0, 1.0],
                array![params[0] + offset, 2.0 * params[0] + offset],
            ))
        }
    }

    struct FullOnly {
        param_names: Vec<String>,
    }

    impl ModelRunner for FullOnly {
        type Surrogate = ();

        fn param_names(&self) -> &[String] {
            &self.param_names
        }

        fn run(&self, params: &[f64]) -> Result<ModelOutput> {
            Ok(ModelOutput::from_primary(array![0.0], array![params[0]]))
        }
    }

    #[test]
    fn test_primary_column() {
        let output = ModelOutput::new(array![0.0, 1.0], array![[1.0, 10.0], [2.0, 20.0]]);
        assert_eq!(output.len(), 2);
        assert_eq!(output.primary().unwrap(), array![1.0, 2.0]);

        let empty = ModelOutput::new(array![0.0], Array2::zeros((1, 0)));
        assert!(empty.primary().is_err());
    }

    #[test]
    fn test_mode_selection() {
        let runner = Doubler {
            param_names: vec!["x".to_string()],
        };

        let full = EvaluationMode::from_surrogate(None);
        assert!(!full.is_surrogate());
        let out = full.evaluate(&runner, &[3.0]).unwrap();
        assert_eq!(out.primary().unwrap(), array![3.0, 6.0]);

        let reduced = EvaluationMode::from_surrogate(Some(0.5));
        assert!(reduced.is_surrogate());
        let out = reduced.evaluate(&runner, &[3.0]).unwrap();
        assert_eq!(out.primary().unwrap(), array![3.5, 6.5]);
    }

    #[test]
    fn test_default_surrogate_is_unavailable() {
        let runner = FullOnly {
            param_names: vec!["x".to_string()],
        };
        let err = EvaluationMode::Surrogate(()).evaluate(&runner, &[1.0]);
        assert!(matches!(err, Err(Error::SurrogateUnavailable(_))));
    }
}
