//! Sampler configuration.
//!
//! A configuration can be built in code or read from TOML:
//!
//! ```toml
//! nsamples = 500
//! nburn = 250
//! adapt_interval = 50
//! n0 = 0.001
//! ```

use crate::proposal::optimal_scaling;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Default number of iterations between covariance re-estimates
pub const DEFAULT_ADAPT_INTERVAL: usize = 100;
/// Default prior pseudo-count for the noise variance
pub const DEFAULT_N0: f64 = 0.001;
/// Default relative step for the finite-difference sensitivity
pub const DEFAULT_FD_STEP: f64 = 1e-6;

/// Options controlling a single sampling run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SamplerConfig {
    /// Total number of iterations
    pub nsamples: usize,

    /// Number of leading chain entries discarded as burn-in.
    /// Defaults to half of `nsamples`.
    pub nburn: Option<usize>,

    /// Iterations between covariance re-estimates
    pub adapt_interval: usize,

    /// Prior pseudo-count of the inverse-gamma noise model
    pub n0: f64,

    /// Relative perturbation used for the finite-difference sensitivity
    pub fd_step: f64,

    /// Factor applied to re-estimated covariances.
    /// Defaults to `2.38² / d`.
    pub scaling: Option<f64>,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            nsamples: 1000,
            nburn: None,
            adapt_interval: DEFAULT_ADAPT_INTERVAL,
            n0: DEFAULT_N0,
            fd_step: DEFAULT_FD_STEP,
            scaling: None,
        }
    }
}

impl SamplerConfig {
    pub fn new(nsamples: usize) -> Self {
        Self {
            nsamples,
            ..Default::default()
        }
    }

    pub fn with_nburn(mut self, nburn: usize) -> Self {
        self.nburn = Some(nburn);
        self
    }

    pub fn with_adapt_interval(mut self, adapt_interval: usize) -> Self {
        self.adapt_interval = adapt_interval;
        self
    }

    pub fn with_n0(mut self, n0: f64) -> Self {
        self.n0 = n0;
        self
    }

    pub fn with_fd_step(mut self, fd_step: f64) -> Self {
        self.fd_step = fd_step;
        self
    }

    pub fn with_scaling(mut self, scaling: f64) -> Self {
        self.scaling = Some(scaling);
        self
    }

    /// Parse a configuration from a TOML document and validate it.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)
            .map_err(|e| Error::InvalidConfiguration(format!("Could not parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Burn-in length, resolving the default.
    pub fn burn_in(&self) -> usize {
        self.nburn.unwrap_or(self.nsamples / 2)
    }

    /// Covariance scaling for `n_params` parameters, resolving the default.
    pub fn scaling_for(&self, n_params: usize) -> f64 {
        self.scaling.unwrap_or_else(|| optimal_scaling(n_params))
    }

    pub fn validate(&self) -> Result<()> {
        if self.nsamples == 0 {
            return Err(Error::InvalidConfiguration(
                "nsamples must be positive".to_string(),
            ));
        }
        if self.adapt_interval == 0 {
            return Err(Error::InvalidConfiguration(
                "adapt_interval must be positive".to_string(),
            ));
        }
        if self.burn_in() > self.nsamples {
            return Err(Error::InvalidConfiguration(format!(
                "nburn ({}) cannot exceed nsamples ({})",
                self.burn_in(),
                self.nsamples
            )));
        }
        if !(self.n0.is_finite() && self.n0 > 0.0) {
            return Err(Error::InvalidConfiguration(format!(
                "n0 must be positive, got {}",
                self.n0
            )));
        }
        if !(self.fd_step.is_finite() && self.fd_step > 0.0) {
            return Err(Error::InvalidConfiguration(format!(
                "fd_step must be positive, got {}",
                self.fd_step
            )));
        }
        if let Some(scaling) = self.scaling {
            if !(scaling.is_finite() && scaling > 0.0) {
                return Err(Error::InvalidConfiguration(format!(
                    "scaling must be positive, got {}",
                    scaling
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SamplerConfig::new(500);
        assert_eq!(config.burn_in(), 250);
        assert_eq!(config.adapt_interval, DEFAULT_ADAPT_INTERVAL);
        assert_eq!(config.n0, DEFAULT_N0);
        assert_eq!(config.scaling_for(1), optimal_scaling(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = SamplerConfig::new(100)
            .with_nburn(10)
            .with_adapt_interval(5)
            .with_n0(0.01)
            .with_scaling(1.0);
        assert_eq!(config.burn_in(), 10);
        assert_eq!(config.adapt_interval, 5);
        assert_eq!(config.scaling_for(3), 1.0);
    }

    #[test]
    fn test_validation_errors() {
        assert!(SamplerConfig::new(0).validate().is_err());
        assert!(SamplerConfig::new(10).with_adapt_interval(0).validate().is_err());
        assert!(SamplerConfig::new(10).with_nburn(11).validate().is_err());
        assert!(SamplerConfig::new(10).with_nburn(10).validate().is_ok());
        assert!(SamplerConfig::new(10).with_n0(0.0).validate().is_err());
        assert!(SamplerConfig::new(10).with_fd_step(-1e-6).validate().is_err());
        assert!(SamplerConfig::new(10).with_scaling(f64::NAN).validate().is_err());
    }

    #[test]
    fn test_from_toml() {
        let config = SamplerConfig::from_toml_str(
            r#"
            nsamples = 500
            nburn = 250
            adapt_interval = 50
            "#,
        )
        .unwrap();

        assert_eq!(config.nsamples, 500);
        assert_eq!(config.burn_in(), 250);
        assert_eq!(config.adapt_interval, 50);
        assert_eq!(config.n0, DEFAULT_N0);
        assert_eq!(config.fd_step, DEFAULT_FD_STEP);
    }

    #[test]
    fn test_from_toml_errors() {
        assert!(SamplerConfig::from_toml_str("nsamples = 0").is_err());
        assert!(SamplerConfig::from_toml_str("nsamples = \"many\"").is_err());
        assert!(SamplerConfig::from_toml_str("nsample = 10").is_err());
    }
}
