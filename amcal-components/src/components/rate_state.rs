//! Rate-and-state friction spring-slider
//!
//! A single-degree-of-freedom slider pulled through a spring by a load point
//! with an oscillating velocity. Friction follows the Dieterich aging law:
//!
//! $$ v = v_{ref} \exp\left(\frac{\mu - \mu_{ref} - b \ln(v_{ref} \theta / D_c)}{a}\right) $$
//! $$ \frac{d\theta}{dt} = 1 - \frac{v \theta}{D_c} $$
//! $$ \frac{d\mu}{dt} = k' (V_l - v) $$
//!
//! The calibrated quantity is the critical slip distance $D_c$. The observed
//! output is the slider acceleration.

use amcal_core::errors::{Error, Result};
use amcal_core::model_runner::{ModelOutput, ModelRunner};
use amcal_core::target::Observations;
use ndarray::{Array1, Array2};
use ode_solvers::dop_shared::SolverResult;
use ode_solvers::{Rk4, System, Vector3};
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::surrogate::TabulatedSurrogate;

// (mu, theta, velocity)
type SliderState = Vector3<f64>;

/// Number of RK4 steps taken within each output interval
const SUBSTEPS: usize = 10;

/// Parameters of the spring-slider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateStateParameters {
    /// Direct effect coefficient
    pub a: f64,
    /// Evolution effect coefficient
    pub b: f64,
    /// Reference friction coefficient
    pub mu_ref: f64,
    /// Reference velocity
    pub v_ref: f64,
    /// Radiation damping coefficient
    pub k1: f64,
    /// Apply radiation damping to the friction rate
    pub radiation_damping: bool,
    /// Spring stiffness is `stiffness_scale / Dc`
    pub stiffness_scale: f64,
    /// Relative amplitude of the load-point velocity oscillation
    pub load_amplitude: f64,
    /// Decay time of the load-point oscillation
    pub load_decay: f64,
    /// Angular frequency of the load-point oscillation
    pub load_frequency: f64,
    /// End of the simulated window (exclusive)
    pub t_end: f64,
    /// Number of output samples
    pub n_steps: usize,
}

impl Default for RateStateParameters {
    fn default() -> Self {
        Self {
            a: 0.011,
            b: 0.014,
            mu_ref: 0.6,
            v_ref: 1.0,
            k1: 1e-7,
            radiation_damping: true,
            stiffness_scale: 1e-2 * 10.0,
            load_amplitude: 1.0,
            load_decay: 20.0,
            load_frequency: 10.0,
            t_end: 50.0,
            n_steps: 500,
        }
    }
}

/// Full trajectory of a simulation
#[derive(Debug, Clone)]
pub struct RateStateSolution {
    pub time: Array1<f64>,
    pub friction: Array1<f64>,
    pub state: Array1<f64>,
    pub velocity: Array1<f64>,
    pub acceleration: Array1<f64>,
}

/// Right-hand side of the friction ODEs for a fixed `Dc`
#[derive(Clone, Copy)]
struct SpringSlider<'a> {
    parameters: &'a RateStateParameters,
    dc: f64,
}

impl SpringSlider<'_> {
    fn load_velocity(&self, t: f64) -> f64 {
        let p = self.parameters;
        let oscillation = (-t / p.load_decay).exp() * (p.load_frequency * t).sin();
        p.v_ref * (1.0 + p.load_amplitude * oscillation)
    }

    fn slip_velocity(&self, mu: f64, theta: f64) -> f64 {
        let p = self.parameters;
        p.v_ref * ((mu - p.mu_ref - p.b * (p.v_ref * theta / self.dc).ln()) / p.a).exp()
    }
}

impl System<f64, SliderState> for SpringSlider<'_> {
    fn system(&self, t: f64, y: &SliderState, dy: &mut SliderState) {
        let p = self.parameters;
        let mu = y[0];
        let theta = y[1];

        let v = self.slip_velocity(mu, theta);
        let stiffness = p.stiffness_scale / self.dc;

        let dtheta_dt = 1.0 - v * theta / self.dc;
        let mut dmu_dt = stiffness * (self.load_velocity(t) - v);
        let mut dv_dt = v / p.a * (dmu_dt - p.b / theta * dtheta_dt);

        if p.radiation_damping {
            dmu_dt -= p.k1 * dv_dt;
            dv_dt = v / p.a * (dmu_dt - p.b / theta * dtheta_dt);
        }

        dy[0] = dmu_dt;
        dy[1] = dtheta_dt;
        dy[2] = dv_dt;
    }
}

/// State recorded closest to `t`.
///
/// Fixed-step integration can overshoot the end of an interval by one step when
/// the step count is rounded up, so the entry nearest `t` is used rather than
/// the last one.
fn state_at(results: &SolverResult<f64, SliderState>, t: f64) -> Option<SliderState> {
    let (times, states) = results.get();
    times
        .iter()
        .zip(states.iter())
        .min_by(|(a, _), (b, _)| (*a - t).abs().total_cmp(&(*b - t).abs()))
        .map(|(_, y)| *y)
}

/// Rate-and-state friction forward model
///
/// Implements [`ModelRunner`] with a single parameter, `Dc`, returning the
/// acceleration series as the primary output and `(mu, theta, v)` as auxiliary
/// output. Reduced-order evaluation uses a [`TabulatedSurrogate`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateStateModel {
    parameters: RateStateParameters,
    #[serde(skip, default = "RateStateModel::default_param_names")]
    param_names: Vec<String>,
}

impl Default for RateStateModel {
    fn default() -> Self {
        Self::from_parameters(RateStateParameters::default())
    }
}

impl RateStateModel {
    pub fn from_parameters(parameters: RateStateParameters) -> Self {
        Self {
            parameters,
            param_names: Self::default_param_names(),
        }
    }

    fn default_param_names() -> Vec<String> {
        vec!["Dc".to_string()]
    }

    pub fn parameters(&self) -> &RateStateParameters {
        &self.parameters
    }

    /// Output time axis
    pub fn time(&self) -> Array1<f64> {
        let p = &self.parameters;
        let dt = p.t_end / p.n_steps as f64;
        Array1::from_shape_fn(p.n_steps, |k| k as f64 * dt)
    }

    /// Integrate the slider for a given critical slip distance.
    pub fn simulate(&self, dc: f64) -> Result<RateStateSolution> {
        let p = &self.parameters;
        if !(dc.is_finite() && dc > 0.0) {
            return Err(Error::ModelError(format!(
                "Critical slip distance must be positive, got {}",
                dc
            )));
        }
        if p.n_steps < 2 {
            return Err(Error::ModelError(format!(
                "At least two output steps are required, got {}",
                p.n_steps
            )));
        }

        let time = self.time();
        let system = SpringSlider { parameters: p, dc };

        let mut trajectory = Array2::zeros((p.n_steps, 3));
        let mut y = SliderState::new(p.mu_ref, dc / p.v_ref, p.v_ref);
        trajectory.row_mut(0).assign(&Array1::from_vec(vec![y[0], y[1], y[2]]));

        for k in 1..p.n_steps {
            let t_current = time[k - 1];
            let t_next = time[k];
            let step_size = (t_next - t_current) / SUBSTEPS as f64;

            let mut stepper = Rk4::new(system, t_current, y, t_next, step_size);
            stepper.integrate().map_err(|e| {
                Error::ModelError(format!("Integration failed at t = {}: {:?}", t_current, e))
            })?;

            y = state_at(stepper.results(), t_next).ok_or_else(|| {
                Error::ModelError(format!("No solution recorded at t = {}", t_next))
            })?;
            if !y.iter().all(|v| v.is_finite()) || y[1] <= 0.0 {
                return Err(Error::ModelError(format!(
                    "Solution diverged at t = {} for Dc = {}",
                    t_next, dc
                )));
            }

            trajectory[[k, 0]] = y[0];
            trajectory[[k, 1]] = y[1];
            trajectory[[k, 2]] = y[2];
        }

        let velocity = trajectory.column(2).to_owned();
        let mut acceleration = Array1::zeros(p.n_steps);
        for k in 1..p.n_steps {
            acceleration[k] = (velocity[k] - velocity[k - 1]) / (time[k] - time[k - 1]);
        }

        Ok(RateStateSolution {
            friction: trajectory.column(0).to_owned(),
            state: trajectory.column(1).to_owned(),
            velocity,
            acceleration,
            time,
        })
    }

    /// Generate noisy observations of the acceleration for a known `Dc`.
    ///
    /// Each sample is perturbed by `noise_fraction * |acc| * N(0, 1)`.
    pub fn synthetic_observations<R: Rng + ?Sized>(
        &self,
        dc: f64,
        noise_fraction: f64,
        rng: &mut R,
    ) -> Result<Observations> {
        if !(noise_fraction.is_finite() && noise_fraction >= 0.0) {
            return Err(Error::InvalidParameter(format!(
                "Noise fraction must be non-negative, got {}",
                noise_fraction
            )));
        }
        let solution = self.simulate(dc)?;
        let noisy = solution
            .acceleration
            .mapv(|acc| acc + noise_fraction * acc.abs() * rng.sample::<f64, _>(StandardNormal));
        Observations::new(noisy)
    }
}

impl ModelRunner for RateStateModel {
    type Surrogate = TabulatedSurrogate;

    fn param_names(&self) -> &[String] {
        &self.param_names
    }

    fn run(&self, params: &[f64]) -> Result<ModelOutput> {
        let dc = single_parameter(params)?;
        let solution = self.simulate(dc)?;

        let mut auxiliary = Array2::zeros((solution.time.len(), 3));
        auxiliary.column_mut(0).assign(&solution.friction);
        auxiliary.column_mut(1).assign(&solution.state);
        auxiliary.column_mut(2).assign(&solution.velocity);

        Ok(ModelOutput::from_primary(solution.time, solution.acceleration)
            .with_auxiliary(auxiliary))
    }

    fn run_surrogate(&self, params: &[f64], surrogate: &TabulatedSurrogate) -> Result<ModelOutput> {
        let dc = single_parameter(params)?;
        let series = surrogate.interpolate(dc)?;
        Ok(ModelOutput::from_primary(surrogate.time().to_owned(), series))
    }
}

fn single_parameter(params: &[f64]) -> Result<f64> {
    match params {
        [dc] => Ok(*dc),
        _ => Err(Error::InvalidParameter(format!(
            "Rate-and-state model takes a single parameter (Dc), got {}",
            params.len()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use is_close::is_close;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn create_model() -> RateStateModel {
        RateStateModel::default()
    }

    #[test]
    fn test_output_shape_and_time_axis() {
        let model = create_model();
        let output = model.run(&[100.0]).unwrap();

        assert_eq!(output.len(), 500);
        assert_eq!(output.time[0], 0.0);
        assert!(is_close!(output.time[1], 0.1));
        assert!(output.time[499] < 50.0);

        let acceleration = output.primary().unwrap();
        assert_eq!(acceleration[0], 0.0);
        assert!(acceleration.iter().all(|v| v.is_finite()));
        assert_eq!(output.auxiliary.as_ref().unwrap().dim(), (500, 3));
    }

    #[test]
    fn test_steady_load_stays_at_steady_state() {
        // Without oscillation the slider starts and stays at steady sliding
        let model = RateStateModel::from_parameters(RateStateParameters {
            load_amplitude: 0.0,
            ..Default::default()
        });
        let solution = model.simulate(100.0).unwrap();

        assert!(solution.acceleration.iter().all(|a| a.abs() < 1e-9));
        assert!(solution.velocity.iter().all(|v| (v - 1.0).abs() < 1e-9));
        assert!(solution.friction.iter().all(|mu| (mu - 0.6).abs() < 1e-9));
    }

    #[test]
    fn test_oscillating_load_accelerates_slider() {
        let solution = create_model().simulate(100.0).unwrap();
        let max_acc = solution
            .acceleration
            .iter()
            .fold(0.0_f64, |acc, a| acc.max(a.abs()));
        assert!(max_acc > 0.0, "oscillating load should move the slider");
        assert!(solution.state.iter().all(|&theta| theta > 0.0));
    }

    #[test]
    fn test_output_depends_on_dc() {
        let model = create_model();
        let a = model.simulate(50.0).unwrap().acceleration;
        let b = model.simulate(100.0).unwrap().acceleration;
        assert_ne!(a, b);
    }

    #[test]
    fn test_simulation_is_deterministic() {
        let model = create_model();
        let a = model.run(&[80.0]).unwrap();
        let b = model.run(&[80.0]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_invalid_parameters() {
        let model = create_model();
        assert!(matches!(model.run(&[0.0]), Err(Error::ModelError(_))));
        assert!(matches!(model.run(&[-5.0]), Err(Error::ModelError(_))));
        assert!(matches!(
            model.run(&[1.0, 2.0]),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_synthetic_observations_without_noise_match_model() {
        let model = create_model();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let observations = model.synthetic_observations(100.0, 0.0, &mut rng).unwrap();
        let expected = model.simulate(100.0).unwrap().acceleration;
        assert_eq!(observations.values(), expected.view());
    }

    #[test]
    fn test_synthetic_observations_are_perturbed() {
        let model = create_model();
        let clean = model.simulate(100.0).unwrap().acceleration;
        let observations = model
            .synthetic_observations(100.0, 0.1, &mut ChaCha8Rng::seed_from_u64(42))
            .unwrap();

        assert_eq!(observations.len(), clean.len());
        // The first sample is zero and carries no noise
        assert_eq!(observations.values()[0], 0.0);
        assert_ne!(observations.values(), clean.view());
        assert!(model
            .synthetic_observations(100.0, -0.1, &mut ChaCha8Rng::seed_from_u64(1))
            .is_err());
    }

    #[test]
    fn test_parameters_roundtrip_through_serde() {
        let model = create_model();
        let json = serde_json::to_string(&model).unwrap();
        let restored: RateStateModel = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.parameters(), model.parameters());
        assert_eq!(restored.param_names(), &["Dc".to_string()]);
    }
}
