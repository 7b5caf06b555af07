mod rate_state;

pub use rate_state::{RateStateModel, RateStateParameters, RateStateSolution};
