//! Adaptive Metropolis sampler.
//!
//! Implements the random-walk Metropolis algorithm with a Gaussian likelihood,
//! a conjugate inverse-gamma model for the observation-noise variance, and
//! periodic re-estimation of the proposal covariance from the chain history
//! (Haario, Saksman & Tamminen 2001).
//!
//! # Algorithm
//!
//! Each iteration `i` (0-indexed):
//!
//! 1. Draw `q* ~ N(q_i, V)`
//! 2. Reject immediately if any component of `q*` lies outside its open bounds
//!    (the forward model is not evaluated)
//! 3. Otherwise accept with probability `min(1, exp(0.5 (SS(q_i) - SS(q*)) / σ²_i))`
//! 4. Append `q*` on acceptance or repeat `q_i` on rejection
//! 5. Draw `σ²_{i+1}` from the inverse-gamma posterior given `SS(q_{i+1})`
//! 6. When `(i + 1) % adapt_interval == 0`, re-estimate `V` from the last
//!    `adapt_interval` chain entries, keeping the old `V` if the estimate is not
//!    positive-definite
//!
//! # References
//!
//! Haario, H., Saksman, E., & Tamminen, J. (2001). An adaptive Metropolis algorithm.
//! Bernoulli, 7(2), 223-242.

use crate::config::SamplerConfig;
use crate::evaluator::SumOfSquaresEvaluator;
use crate::model_runner::{EvaluationMode, ModelRunner};
use crate::noise::NoiseVarianceModel;
use crate::parameter_set::ParameterSet;
use crate::proposal::{AdaptationOutcome, ProposalCovariance};
use crate::sensitivity::initialise;
use crate::target::Observations;
use crate::utils::linear_algebra::to_array2;
use crate::{Error, Result};
use log::{debug, info, warn};
use nalgebra::DMatrix;
use ndarray::{Array1, Array2, ArrayView1};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::ops::ControlFlow;

/// Outcome of the accept/reject decision for a single proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepOutcome {
    /// The proposal was accepted
    Accepted,
    /// The proposal violated the parameter bounds; the model was not evaluated
    RejectedOutOfBounds,
    /// The proposal was rejected by the Metropolis rule
    RejectedByLikelihood,
    /// The forward model failed for the proposal
    RejectedModelFailure,
}

impl StepOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, StepOutcome::Accepted)
    }
}

/// Summary of one completed iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IterationReport {
    /// Iteration number (0-indexed)
    pub iteration: usize,
    /// Accept/reject outcome
    pub outcome: StepOutcome,
    /// Noise variance drawn at the end of the iteration
    pub noise_variance: f64,
    /// Outcome of the covariance adaptation, if this iteration was a checkpoint
    pub adaptation: Option<AdaptationOutcome>,
}

/// Information about sampling progress.
///
/// Passed to progress callbacks after every iteration.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// Report of the iteration that just completed
    pub report: IterationReport,

    /// Total number of iterations
    pub total: usize,

    /// Acceptance rate so far
    pub acceptance_rate: f64,
}

/// Ordered sequence of parameter vectors visited by the sampler.
///
/// The first entry is the starting vector; every iteration appends exactly one
/// entry, either the accepted proposal or a copy of the previous entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chain {
    entries: Vec<Array1<f64>>,
    param_names: Vec<String>,
}

impl Chain {
    /// Create a chain seeded with `start`.
    pub fn new(param_names: Vec<String>, start: Array1<f64>) -> Self {
        Self {
            entries: vec![start],
            param_names,
        }
    }

    pub fn push(&mut self, entry: Array1<f64>) {
        debug_assert_eq!(entry.len(), self.n_params());
        self.entries.push(entry);
    }

    /// Number of entries, including the seed.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn n_params(&self) -> usize {
        self.param_names.len()
    }

    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }

    pub fn get(&self, index: usize) -> Option<ArrayView1<'_, f64>> {
        self.entries.get(index).map(|e| e.view())
    }

    /// The most recent entry.
    pub fn last(&self) -> ArrayView1<'_, f64> {
        self.entries[self.entries.len() - 1].view()
    }

    /// The last `n` entries (fewer if the chain is shorter), shape (n, n_params).
    pub fn tail(&self, n: usize) -> Array2<f64> {
        let start = self.len().saturating_sub(n);
        self.rows_from(start)
    }

    /// All entries after discarding the first `discard`, shape (len - discard, n_params).
    pub fn rows_from(&self, discard: usize) -> Array2<f64> {
        let kept = &self.entries[discard.min(self.len())..];
        Array2::from_shape_fn((kept.len(), self.n_params()), |(i, j)| kept[i][j])
    }
}

/// Result of a calibration run, with the burn-in removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationOutput {
    /// Parameter names in column order
    pub param_names: Vec<String>,

    /// Post-burn-in chain, shape (n_kept, n_params)
    pub chain: Array2<f64>,

    /// Post-burn-in noise variance series, shape (n_kept,)
    pub noise_variance: Array1<f64>,

    /// Number of chain entries discarded as burn-in
    pub n_burn: usize,

    /// Number of completed iterations
    pub n_iterations: usize,

    /// Number of accepted proposals
    pub n_accepted: usize,

    /// Accepted proposals divided by completed iterations
    pub acceptance_ratio: f64,

    /// Adaptation checkpoints that replaced the proposal covariance
    pub adaptations_updated: usize,

    /// Adaptation checkpoints that kept the previous covariance
    pub adaptations_retained: usize,

    /// Proposal covariance at the end of the run
    pub final_covariance: Array2<f64>,

    /// Number of forward-model evaluations, including initialisation
    pub n_evaluations: usize,
}

impl CalibrationOutput {
    pub fn len(&self) -> usize {
        self.chain.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.nrows() == 0
    }

    /// Posterior mean of each parameter.
    pub fn mean(&self) -> Option<Array1<f64>> {
        self.chain.mean_axis(ndarray::Axis(0))
    }

    /// Samples of a single parameter.
    pub fn column(&self, name: &str) -> Option<ArrayView1<'_, f64>> {
        self.param_names
            .iter()
            .position(|n| n == name)
            .map(|j| self.chain.column(j))
    }
}

/// Adaptive Metropolis sampler for a single chain.
///
/// Construction runs the initialisation (sensitivity, initial noise variance and
/// proposal covariance) and fails on any configuration error. Once constructed,
/// sampling cannot fail: model failures during the loop count as rejections.
///
/// # Example
///
/// ```ignore
/// use amcal_core::{AdaptiveMetropolis, Observations, ParameterSet, SamplerConfig};
///
/// let mut params = ParameterSet::new();
/// params.add("Dc", 1.0, 1000.0)?;
///
/// let config = SamplerConfig::new(500).with_nburn(250).with_adapt_interval(50);
/// let sampler = AdaptiveMetropolis::new(model, params, observations, &[100.0], config)?;
/// let output = sampler.run();
///
/// println!("Posterior mean: {:?}", output.mean());
/// ```
pub struct AdaptiveMetropolis<R: ModelRunner> {
    params: ParameterSet,
    config: SamplerConfig,
    evaluator: SumOfSquaresEvaluator<R>,
    noise: NoiseVarianceModel,
    proposal: ProposalCovariance,
    initial_covariance: DMatrix<f64>,
    chain: Chain,
    noise_variance: Vec<f64>,
    ssq_prev: f64,
    iteration: usize,
    n_accepted: usize,
    adaptations_updated: usize,
    adaptations_retained: usize,
}

impl<R: ModelRunner> AdaptiveMetropolis<R> {
    /// Create a sampler using full-fidelity model evaluations.
    ///
    /// # Arguments
    ///
    /// * `runner` - Forward model
    /// * `params` - Bounds of the calibrated parameters
    /// * `observations` - Observed series
    /// * `start` - Starting parameter vector, strictly inside the bounds
    /// * `config` - Sampler configuration
    pub fn new(
        runner: R,
        params: ParameterSet,
        observations: Observations,
        start: &[f64],
        config: SamplerConfig,
    ) -> Result<Self> {
        Self::with_mode(
            runner,
            params,
            observations,
            start,
            config,
            EvaluationMode::Full,
        )
    }

    /// Create a sampler, using reduced-order evaluation if `surrogate` is given.
    pub fn with_surrogate(
        runner: R,
        params: ParameterSet,
        observations: Observations,
        start: &[f64],
        config: SamplerConfig,
        surrogate: Option<R::Surrogate>,
    ) -> Result<Self> {
        Self::with_mode(
            runner,
            params,
            observations,
            start,
            config,
            EvaluationMode::from_surrogate(surrogate),
        )
    }

    /// Create a sampler with an explicit evaluation mode.
    pub fn with_mode(
        runner: R,
        params: ParameterSet,
        observations: Observations,
        start: &[f64],
        config: SamplerConfig,
        mode: EvaluationMode<R::Surrogate>,
    ) -> Result<Self> {
        config.validate()?;
        params.validate_start(start)?;
        if runner.param_names().len() != params.len() {
            return Err(Error::InvalidParameter(format!(
                "Model expects {} parameters but {} are calibrated",
                runner.param_names().len(),
                params.len()
            )));
        }

        let n_params = params.len();
        let noise = NoiseVarianceModel::new(config.n0, observations.len())?;
        let evaluator = SumOfSquaresEvaluator::new(runner, observations, mode);
        let init = initialise(&evaluator, &noise, start, config.fd_step)?;

        let proposal =
            ProposalCovariance::new(init.covariance.clone(), config.scaling_for(n_params))?;

        info!(
            "Initialised adaptive Metropolis: {} parameters, {} observations, \
             std2 = {:.6e}, V diagonal = {:?}",
            n_params,
            evaluator.observations().len(),
            init.std2,
            init.covariance.diagonal().as_slice()
        );

        let param_names = params.param_names().iter().map(|s| s.to_string()).collect();
        let chain = Chain::new(param_names, Array1::from_vec(start.to_vec()));

        Ok(Self {
            params,
            config,
            evaluator,
            noise,
            proposal,
            initial_covariance: init.covariance,
            chain,
            noise_variance: vec![init.std2],
            ssq_prev: init.ssq,
            iteration: 0,
            n_accepted: 0,
            adaptations_updated: 0,
            adaptations_retained: 0,
        })
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    pub fn params(&self) -> &ParameterSet {
        &self.params
    }

    pub fn evaluator(&self) -> &SumOfSquaresEvaluator<R> {
        &self.evaluator
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    pub fn noise_variance(&self) -> &[f64] {
        &self.noise_variance
    }

    /// Current proposal covariance.
    pub fn covariance(&self) -> &DMatrix<f64> {
        self.proposal.covariance()
    }

    /// Proposal covariance computed at initialisation.
    pub fn initial_covariance(&self) -> &DMatrix<f64> {
        &self.initial_covariance
    }

    /// Sum of squares of the current chain position.
    pub fn current_sum_of_squares(&self) -> f64 {
        self.ssq_prev
    }

    /// Number of completed iterations.
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn n_accepted(&self) -> usize {
        self.n_accepted
    }

    pub fn is_finished(&self) -> bool {
        self.iteration >= self.config.nsamples
    }

    pub fn acceptance_rate(&self) -> f64 {
        if self.iteration == 0 {
            0.0
        } else {
            self.n_accepted as f64 / self.iteration as f64
        }
    }

    /// Run a single iteration.
    ///
    /// Returns `None` once all `nsamples` iterations have completed.
    pub fn step<G: Rng + ?Sized>(&mut self, rng: &mut G) -> Option<IterationReport> {
        if self.is_finished() {
            return None;
        }
        let iteration = self.iteration;
        let current = self.chain.last().to_owned();
        let std2 = self.noise_variance[self.noise_variance.len() - 1];

        let proposed = self.proposal.draw(current.view(), rng);
        let candidate = proposed.to_vec();

        let outcome = if !self.params.contains(&candidate) {
            StepOutcome::RejectedOutOfBounds
        } else {
            match self.evaluator.sum_of_squares(&candidate) {
                Ok(ssq_new) => {
                    let log_ratio = (0.5 * (self.ssq_prev - ssq_new) / std2).min(0.0);
                    let u: f64 = rng.gen();
                    if log_ratio > u.ln() {
                        self.ssq_prev = ssq_new;
                        StepOutcome::Accepted
                    } else {
                        StepOutcome::RejectedByLikelihood
                    }
                }
                Err(e) => {
                    warn!(
                        "Iteration {}: model evaluation failed for {:?}, rejecting: {}",
                        iteration, candidate, e
                    );
                    StepOutcome::RejectedModelFailure
                }
            }
        };

        if outcome.is_accepted() {
            self.chain.push(proposed);
            self.n_accepted += 1;
        } else {
            self.chain.push(current);
        }

        let std2_next = self.noise.update(std2, self.ssq_prev, rng);
        self.noise_variance.push(std2_next);

        let adapt_interval = self.config.adapt_interval;
        let adaptation = if (iteration + 1) % adapt_interval == 0 {
            let window = self.chain.tail(adapt_interval);
            let result = self.proposal.adapt(window.view());
            match result {
                AdaptationOutcome::Updated => self.adaptations_updated += 1,
                AdaptationOutcome::Retained => self.adaptations_retained += 1,
            }
            debug!(
                "Iteration {}: covariance adaptation {:?}, V diagonal = {:?}",
                iteration,
                result,
                self.proposal.covariance().diagonal().as_slice()
            );
            Some(result)
        } else {
            None
        };

        self.iteration += 1;

        Some(IterationReport {
            iteration,
            outcome,
            noise_variance: std2_next,
            adaptation,
        })
    }

    /// Run all remaining iterations using a thread-local random number generator.
    pub fn run(self) -> CalibrationOutput {
        let mut rng = rand::thread_rng();
        self.run_with_rng(&mut rng)
    }

    /// Run all remaining iterations with the given random number generator.
    pub fn run_with_rng<G: Rng + ?Sized>(self, rng: &mut G) -> CalibrationOutput {
        self.run_with_progress(rng, |_| ControlFlow::Continue(()))
    }

    /// Run the remaining iterations, calling `progress_callback` after each one.
    ///
    /// The callback may return `ControlFlow::Break(())` to stop early. The
    /// chain is valid up to the last completed iteration and the burn-in is
    /// trimmed against the completed length.
    pub fn run_with_progress<G, F>(
        mut self,
        rng: &mut G,
        mut progress_callback: F,
    ) -> CalibrationOutput
    where
        G: Rng + ?Sized,
        F: FnMut(&ProgressInfo) -> ControlFlow<()>,
    {
        while let Some(report) = self.step(rng) {
            let info = ProgressInfo {
                report,
                total: self.config.nsamples,
                acceptance_rate: self.acceptance_rate(),
            };
            if progress_callback(&info).is_break() {
                info!(
                    "Sampling stopped after {} of {} iterations",
                    self.iteration, self.config.nsamples
                );
                break;
            }
        }
        self.finish()
    }

    /// Stop sampling and return the chain with the burn-in removed.
    ///
    /// Discards `nburn` leading entries, or all but the last entry if fewer
    /// iterations have completed.
    pub fn finish(self) -> CalibrationOutput {
        let n_burn = self.config.burn_in().min(self.chain.len() - 1);
        let acceptance_ratio = self.acceptance_rate();

        info!(
            "Acceptance ratio: {:.3} ({} of {} proposals)",
            acceptance_ratio, self.n_accepted, self.iteration
        );

        CalibrationOutput {
            param_names: self.chain.param_names().to_vec(),
            chain: self.chain.rows_from(n_burn),
            noise_variance: Array1::from_vec(self.noise_variance[n_burn..].to_vec()),
            n_burn,
            n_iterations: self.iteration,
            n_accepted: self.n_accepted,
            acceptance_ratio,
            adaptations_updated: self.adaptations_updated,
            adaptations_retained: self.adaptations_retained,
            final_covariance: to_array2(self.proposal.covariance()),
            n_evaluations: self.evaluator.n_evaluations(),
        }
    }
}
