//! Core of the amcal calibration engine.
//!
//! Provides the adaptive Metropolis sampler together with the pieces it is
//! built from: bounded parameter sets, observations, the forward-model
//! interface, the inverse-gamma noise model and the adaptive proposal.

pub mod config;
pub mod diagnostics;
pub mod errors;
pub mod evaluator;
pub mod model_runner;
pub mod multi_chain;
pub mod noise;
pub mod parameter_set;
pub mod proposal;
pub mod sampler;
pub mod sensitivity;
pub mod target;
pub mod utils;

pub use config::SamplerConfig;
pub use errors::{Error, Result};
pub use evaluator::SumOfSquaresEvaluator;
pub use model_runner::{EvaluationMode, ModelOutput, ModelRunner};
pub use multi_chain::run_chains;
pub use noise::NoiseVarianceModel;
pub use parameter_set::{ParameterBounds, ParameterSet};
pub use proposal::{AdaptationOutcome, ProposalCovariance};
pub use sampler::{
    AdaptiveMetropolis, CalibrationOutput, Chain, IterationReport, ProgressInfo, StepOutcome,
};
pub use target::Observations;
