use thiserror::Error;

/// Errors raised while configuring or running a calibration.
///
/// Everything except [`Error::ModelError`] is a configuration error and is only
/// returned before the first iteration. Model failures seen inside the sampling
/// loop are absorbed as rejections.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Model output has {actual} samples but the observations have {expected}")]
    ShapeMismatch { expected: usize, actual: usize },
    #[error("Sensitivity matrix cannot be inverted: {0}")]
    SingularSensitivity(String),
    #[error("Initial noise variance {0} does not give a positive-definite proposal covariance")]
    DegenerateInitialCovariance(f64),
    #[error("Model evaluation failed: {0}")]
    ModelError(String),
    #[error("Surrogate evaluation unavailable: {0}")]
    SurrogateUnavailable(String),
}

/// Convenience type for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
