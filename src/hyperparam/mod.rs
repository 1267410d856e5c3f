//! Hyperparameter search
//!
//! Parameter spaces, search algorithms, trial history and the [`Hyperopt`]
//! pipeline step that ties them together.

mod hyperopt;
mod search;
mod space;
pub mod templates;
mod trials;

pub use hyperopt::{Hyperopt, HyperoptConfig};
pub use search::{create_sampler, RandomSearch, SamplerType, SearchAlgorithm, TpeSampler};
pub use space::{Distribution, ParamSpace, ParamValue, Params};
pub use trials::{Trial, TrialStatus, Trials, FAILED_TRIAL_LOSS};
