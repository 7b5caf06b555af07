//! Autocorrelation statistics for sampled chains.
//!
//! All functions work on the post-burn-in output of a run. Per-parameter
//! results are returned as maps keyed by parameter name, in the order the
//! parameters were declared.

use crate::sampler::CalibrationOutput;
use indexmap::IndexMap;
use ndarray::ArrayView1;

/// Fewest samples for which autocorrelation estimates are attempted
const MIN_AUTOCORR_SAMPLES: usize = 10;

/// Longest lag considered when summing the autocorrelation function
const MAX_LAG: usize = 100;

/// Autocorrelation of `series` at lags `1..=max_lag`.
///
/// Lag 0 is always 1.0 and is not included. A constant series has no defined
/// autocorrelation and returns zeros.
pub fn autocorrelation(series: ArrayView1<f64>, max_lag: usize) -> Vec<f64> {
    let n = series.len();
    if n == 0 {
        return vec![0.0; max_lag];
    }
    let mean = series.sum() / n as f64;
    let variance = series.iter().map(|&x| (x - mean).powi(2)).sum::<f64>() / n as f64;

    if variance == 0.0 {
        return vec![0.0; max_lag];
    }

    (1..=max_lag)
        .map(|lag| {
            if lag >= n {
                return 0.0;
            }
            let covariance = (0..n - lag)
                .map(|i| (series[i] - mean) * (series[i + lag] - mean))
                .sum::<f64>()
                / (n - lag) as f64;
            covariance / variance
        })
        .collect()
}

/// Integrated autocorrelation time `τ = 1 + 2 Σ ρ(k)`.
///
/// The sum runs over lags until the first non-positive autocorrelation.
/// Returns `None` for fewer than 10 samples.
pub fn autocorr_time(series: ArrayView1<f64>) -> Option<f64> {
    let n = series.len();
    if n < MIN_AUTOCORR_SAMPLES {
        return None;
    }
    let max_lag = (n / 2).min(MAX_LAG);
    let positive_sum: f64 = autocorrelation(series, max_lag)
        .into_iter()
        .take_while(|&rho| rho > 0.0)
        .sum();
    Some(1.0 + 2.0 * positive_sum)
}

/// Effective number of independent samples, `N / τ`.
pub fn effective_sample_size(series: ArrayView1<f64>) -> Option<f64> {
    autocorr_time(series).map(|tau| series.len() as f64 / tau)
}

impl CalibrationOutput {
    /// Integrated autocorrelation time of each parameter.
    ///
    /// Returns an empty map if the chain is shorter than 10 entries.
    pub fn autocorr_time(&self) -> IndexMap<String, f64> {
        self.per_parameter(autocorr_time)
    }

    /// Effective sample size of each parameter.
    ///
    /// Returns an empty map if the chain is shorter than 10 entries.
    pub fn effective_sample_size(&self) -> IndexMap<String, f64> {
        self.per_parameter(effective_sample_size)
    }

    fn per_parameter<F>(&self, statistic: F) -> IndexMap<String, f64>
    where
        F: Fn(ArrayView1<f64>) -> Option<f64>,
    {
        self.param_names
            .iter()
            .enumerate()
            .filter_map(|(j, name)| statistic(self.chain.column(j)).map(|v| (name.clone(), v)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use is_close::is_close;
    use ndarray::{Array1, Array2};

    fn output_from(name: &str, values: Vec<f64>) -> CalibrationOutput {
        let n = values.len();
        CalibrationOutput {
            param_names: vec![name.to_string()],
            chain: Array2::from_shape_vec((n, 1), values).unwrap(),
            noise_variance: Array1::ones(n),
            n_burn: 0,
            n_iterations: n.saturating_sub(1),
            n_accepted: 0,
            acceptance_ratio: 0.0,
            adaptations_updated: 0,
            adaptations_retained: 0,
            final_covariance: Array2::eye(1),
            n_evaluations: 0,
        }
    }

    fn oscillating(n: usize) -> Vec<f64> {
        (0..n).map(|k| (2.1 * k as f64).sin()).collect()
    }

    #[test]
    fn test_autocorrelation_of_alternating_series() {
        let series = Array1::from_shape_fn(100, |k| if k % 2 == 0 { 1.0 } else { -1.0 });
        let rho = autocorrelation(series.view(), 3);
        assert!(is_close!(rho[0], -1.0));
        assert!(is_close!(rho[1], 1.0));

        // The first lag is already negative, so the chain counts as independent
        assert!(is_close!(autocorr_time(series.view()).unwrap(), 1.0));
        assert!(is_close!(effective_sample_size(series.view()).unwrap(), 100.0));
    }

    #[test]
    fn test_constant_series_has_zero_autocorrelation() {
        let series = Array1::from_elem(20, 5.0);
        assert_eq!(autocorrelation(series.view(), 4), vec![0.0; 4]);
        assert_eq!(autocorr_time(series.view()), Some(1.0));
    }

    #[test]
    fn test_slowly_varying_series_is_correlated() {
        let series = Array1::from_shape_fn(200, |k| (k as f64 / 40.0).sin());
        let tau = autocorr_time(series.view()).unwrap();
        assert!(tau > 5.0, "tau = {}", tau);
        assert!(effective_sample_size(series.view()).unwrap() < 200.0 / 5.0);
    }

    #[test]
    fn test_short_series_has_no_estimate() {
        let series = Array1::from_vec(vec![1.0, 2.0, 3.0]);
        assert!(autocorr_time(series.view()).is_none());
        assert!(output_from("Dc", vec![1.0, 2.0, 3.0]).autocorr_time().is_empty());
    }

    #[test]
    fn test_output_statistics_are_keyed_by_name() {
        let output = output_from("Dc", oscillating(100));
        let ess = output.effective_sample_size();
        assert_eq!(ess.keys().collect::<Vec<_>>(), vec!["Dc"]);
        assert!(ess["Dc"] > 0.0);
    }
}
