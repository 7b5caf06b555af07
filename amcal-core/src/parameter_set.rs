//! Prior support of the calibrated parameters.
//!
//! Each calibrated parameter carries a uniform prior described only by its open
//! interval `(lower, upper)`. Proposals outside the interval are rejected by the
//! sampler without evaluating the model, so no parameter transformation is needed.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Open interval `(lower, upper)` for a single named parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterBounds {
    pub name: String,
    pub lower: f64,
    pub upper: f64,
}

impl ParameterBounds {
    /// Create bounds for a parameter.
    ///
    /// Fails if either bound is not finite or if `lower >= upper`.
    pub fn new(name: impl Into<String>, lower: f64, upper: f64) -> Result<Self> {
        let name = name.into();
        if !lower.is_finite() || !upper.is_finite() {
            return Err(Error::InvalidParameter(format!(
                "Bounds for {} must be finite, got ({}, {})",
                name, lower, upper
            )));
        }
        if lower >= upper {
            return Err(Error::InvalidParameter(format!(
                "Lower bound must be below upper bound for {}, got ({}, {})",
                name, lower, upper
            )));
        }
        Ok(Self { name, lower, upper })
    }

    /// Strict check: `lower < value < upper`.
    pub fn contains(&self, value: f64) -> bool {
        value > self.lower && value < self.upper
    }

    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }
}

/// Ordered collection of parameter bounds.
///
/// The order of insertion defines the order of components in every parameter
/// vector handed to the forward model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    bounds: Vec<ParameterBounds>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter with bounds `(lower, upper)`.
    ///
    /// Returns `&mut Self` so that calls can be chained.
    pub fn add(&mut self, name: impl Into<String>, lower: f64, upper: f64) -> Result<&mut Self> {
        let bounds = ParameterBounds::new(name, lower, upper)?;
        if self.bounds.iter().any(|b| b.name == bounds.name) {
            return Err(Error::InvalidParameter(format!(
                "Parameter {} is already defined",
                bounds.name
            )));
        }
        self.bounds.push(bounds);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    pub fn param_names(&self) -> Vec<&str> {
        self.bounds.iter().map(|b| b.name.as_str()).collect()
    }

    pub fn bounds(&self) -> &[ParameterBounds] {
        &self.bounds
    }

    pub fn get(&self, name: &str) -> Option<&ParameterBounds> {
        self.bounds.iter().find(|b| b.name == name)
    }

    pub fn lower(&self) -> Vec<f64> {
        self.bounds.iter().map(|b| b.lower).collect()
    }

    pub fn upper(&self) -> Vec<f64> {
        self.bounds.iter().map(|b| b.upper).collect()
    }

    /// Whether every component lies strictly inside its bounds.
    ///
    /// A vector of the wrong length is never contained.
    pub fn contains(&self, values: &[f64]) -> bool {
        values.len() == self.bounds.len()
            && self
                .bounds
                .iter()
                .zip(values)
                .all(|(b, &v)| b.contains(v))
    }

    /// Check that a starting vector matches the parameter set.
    pub fn validate_start(&self, start: &[f64]) -> Result<()> {
        if self.is_empty() {
            return Err(Error::InvalidParameter(
                "At least one parameter must be calibrated".to_string(),
            ));
        }
        if start.len() != self.len() {
            return Err(Error::InvalidParameter(format!(
                "Starting vector has {} components but {} parameters are defined",
                start.len(),
                self.len()
            )));
        }
        for (b, &v) in self.bounds.iter().zip(start) {
            if !b.contains(v) {
                return Err(Error::InvalidParameter(format!(
                    "Starting value {} for {} is outside ({}, {})",
                    v, b.name, b.lower, b.upper
                )));
            }
        }
        Ok(())
    }
}
