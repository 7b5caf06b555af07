//! Bayesian calibration of simulation-model parameters
//!
//! `amcal` fits the parameters of a forward model to an observed time series
//! with an adaptive Metropolis sampler. The sampler itself lives in
//! [`amcal_core`]; concrete forward models live in [`amcal_components`].
//!
//! ```ignore
//! use amcal::prelude::*;
//! use rand::SeedableRng;
//!
//! let model = RateStateModel::default();
//! let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(42);
//! let observations = model.synthetic_observations(100.0, 0.05, &mut rng)?;
//!
//! let mut params = ParameterSet::new();
//! params.add("Dc", 1.0, 1000.0)?;
//!
//! let config = SamplerConfig::new(500).with_nburn(250).with_adapt_interval(50);
//! let output = AdaptiveMetropolis::new(model, params, observations, &[100.0], config)?
//!     .run_with_rng(&mut rng);
//! ```

pub use amcal_components;
pub use amcal_core;

pub mod prelude {
    pub use amcal_components::{RateStateModel, RateStateParameters, TabulatedSurrogate};
    pub use amcal_core::{
        run_chains, AdaptiveMetropolis, CalibrationOutput, Error, EvaluationMode, ModelOutput,
        ModelRunner, Observations, ParameterSet, Result, SamplerConfig, StepOutcome,
    };
}
