//! Observed data the model is calibrated against.

use crate::{Error, Result};
use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};

/// A single observed output series.
///
/// Holds the `(1, n_output)` row of observations. Every value must be finite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observations {
    values: Array1<f64>,
}

impl Observations {
    pub fn new(values: Array1<f64>) -> Result<Self> {
        if values.is_empty() {
            return Err(Error::InvalidConfiguration(
                "Observations must contain at least one value".to_string(),
            ));
        }
        if let Some(i) = values.iter().position(|v| !v.is_finite()) {
            return Err(Error::InvalidConfiguration(format!(
                "Observation {} is not finite ({})",
                i, values[i]
            )));
        }
        Ok(Self { values })
    }

    pub fn from_vec(values: Vec<f64>) -> Result<Self> {
        Self::new(Array1::from_vec(values))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> ArrayView1<'_, f64> {
        self.values.view()
    }

    /// Residual sum of squares between a simulated series and the observations.
    pub fn sum_of_squares(&self, simulated: ArrayView1<f64>) -> Result<f64> {
        if simulated.len() != self.len() {
            return Err(Error::ShapeMismatch {
                expected: self.len(),
                actual: simulated.len(),
            });
        }
        Ok(simulated
            .iter()
            .zip(self.values.iter())
            .map(|(s, o)| (s - o).powi(2))
            .sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_rejects_empty_and_non_finite() {
        assert!(Observations::new(Array1::zeros(0)).is_err());
        assert!(Observations::new(array![1.0, f64::NAN]).is_err());
        assert!(Observations::new(array![1.0, f64::INFINITY]).is_err());
    }

    #[test]
    fn test_sum_of_squares() {
        let obs = Observations::from_vec(vec![1.0, 2.0, 3.0]).unwrap();
        let ssq = obs.sum_of_squares(array![1.0, 3.0, 5.0].view()).unwrap();
        assert_eq!(ssq, 5.0);
        assert_eq!(obs.sum_of_squares(obs.values()).unwrap(), 0.0);
    }

    #[test]
    fn test_sum_of_squares_shape_mismatch() {
        let obs = Observations::from_vec(vec![1.0, 2.0, 3.0]).unwrap();
        let err = obs.sum_of_squares(array![1.0, 2.0].view()).unwrap_err();
        assert_eq!(
            err,
            Error::ShapeMismatch {
                expected: 3,
                actual: 2
            }
        );
    }
}
