//! Tabulated emulator for one-parameter forward models
//!
//! The full model is evaluated once on a grid of parameter values; afterwards
//! any value inside the grid is answered by linear interpolation between the
//! two neighbouring tabulated series. This trades accuracy for a per-call cost
//! that is independent of the model.

use amcal_core::errors::{Error, Result};
use amcal_core::model_runner::ModelRunner;
use log::info;
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabulatedSurrogate {
    grid: Vec<f64>,
    time: Array1<f64>,
    /// Simulated series, one row per grid point
    table: Array2<f64>,
}

impl TabulatedSurrogate {
    /// Tabulate `model` on `grid`.
    ///
    /// # Arguments
    ///
    /// * `model` - Forward model with a single calibrated parameter
    /// * `grid` - Strictly increasing parameter values, at least two
    pub fn build<R: ModelRunner + ?Sized>(model: &R, grid: &[f64]) -> Result<Self> {
        if model.param_names().len() != 1 {
            return Err(Error::InvalidParameter(format!(
                "Tabulated surrogates support a single parameter, model has {}",
                model.param_names().len()
            )));
        }
        if grid.len() < 2 {
            return Err(Error::InvalidParameter(
                "Surrogate grid needs at least two points".to_string(),
            ));
        }
        if grid.iter().any(|v| !v.is_finite()) || grid.windows(2).any(|w| w[0] >= w[1]) {
            return Err(Error::InvalidParameter(
                "Surrogate grid must be finite and strictly increasing".to_string(),
            ));
        }

        let first = model.run(&grid[..1])?;
        let time = first.time.clone();
        let mut table = Array2::zeros((grid.len(), first.len()));
        table.row_mut(0).assign(&first.primary()?);

        for (i, value) in grid.iter().enumerate().skip(1) {
            let output = model.run(&[*value])?;
            let primary = output.primary()?;
            if primary.len() != table.ncols() {
                return Err(Error::ShapeMismatch {
                    expected: table.ncols(),
                    actual: primary.len(),
                });
            }
            table.row_mut(i).assign(&primary);
        }

        info!(
            "Tabulated surrogate built on {} points over [{}, {}]",
            grid.len(),
            grid[0],
            grid[grid.len() - 1]
        );

        Ok(Self {
            grid: grid.to_vec(),
            time,
            table,
        })
    }

    pub fn grid(&self) -> &[f64] {
        &self.grid
    }

    pub fn time(&self) -> ArrayView1<'_, f64> {
        self.time.view()
    }

    /// Parameter range covered by the table, inclusive.
    pub fn support(&self) -> (f64, f64) {
        (self.grid[0], self.grid[self.grid.len() - 1])
    }

    /// Linearly interpolated series at `value`.
    pub fn interpolate(&self, value: f64) -> Result<Array1<f64>> {
        let (lower, upper) = self.support();
        if !(value >= lower && value <= upper) {
            return Err(Error::SurrogateUnavailable(format!(
                "{} lies outside the tabulated range [{}, {}]",
                value, lower, upper
            )));
        }

        // Index of the first grid point above `value`, clamped so `value == upper`
        // uses the last interval
        let right = self
            .grid
            .partition_point(|&g| g <= value)
            .clamp(1, self.grid.len() - 1);
        let left = right - 1;

        let weight = (value - self.grid[left]) / (self.grid[right] - self.grid[left]);
        let series = &self.table.row(left) * (1.0 - weight) + &self.table.row(right) * weight;
        Ok(series)
    }
}
