//! Forward models for amcal
//!
//! Contains the rate-and-state friction spring-slider and a tabulated
//! surrogate that can stand in for it during sampling.

pub mod components;
pub mod surrogate;

pub use components::{RateStateModel, RateStateParameters};
pub use surrogate::TabulatedSurrogate;
