//! AutoML pipelines
//!
//! Composable steps that enumerate candidate models, score them with
//! cross-validation or a hold-out split, tune their hyperparameters, and
//! generate or select features, all run by a local executor over a
//! [`data::Dataset`].
//!
//! # Modules
//!
//! - [`pipeline`] - Step contract, pipeline composition and the executor
//! - [`model`] - Estimator contracts, built-in models, metrics, CV and selection
//! - [`hyperparam`] - Parameter spaces, samplers, trial history and [`hyperparam::Hyperopt`]
//! - [`feature`] - Formula feature generation and importance-based selection
//! - [`data`] - Dataset container and synthetic generators
//! - [`telemetry`] - Logging setup
//!
//! # Example
//!
//! ```no_run
//! use automl_pipeline::prelude::*;
//!
//! # fn main() -> automl_pipeline::Result<()> {
//! let dataset = make_classification(200, 6, 2, 0.05, 7)?;
//! let pipeline = Pipeline::new()
//!     .then(classification_models())?
//!     .then(Hyperopt::new(CV::new(Metric::Accuracy), 10))?
//!     .then(ChooseBest::new(1))?;
//!
//! let result = LocalExecutor::new(dataset).with_runs(3).run(&pipeline)?;
//! for outcome in &result {
//!     let best = outcome.data.best().map(|c| c.summary());
//!     println!("run {}: {:?}", outcome.context.run_index, best);
//! }
//! # Ok(())
//! # }
//! ```

pub mod data;
pub mod error;
pub mod feature;
pub mod hyperparam;
pub mod model;
pub mod pipeline;
pub mod telemetry;

pub use error::{PipelineError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{PipelineError, Result};

    pub use crate::data::{make_classification, make_regression, Dataset, FeatureColumn};

    pub use crate::pipeline::{
        CandidateResult, ExecutionResult, ExecutorConfig, LocalExecutor, Pipeline, PipelineData,
        PipelineStep, Step, StepContext,
    };

    pub use crate::model::{
        BuiltinModel, ChooseBest, CvConfig, Direction, Estimator, FnModel, Metric, ModelClass,
        ModelRef, ModelSpace, Validate, CV,
    };

    pub use crate::hyperparam::templates::{classification_models, regression_models};
    pub use crate::hyperparam::{Hyperopt, HyperoptConfig, ParamSpace, ParamValue, Params, SamplerType};

    pub use crate::feature::{FeatureSelector, FormulaFeatureGenerator, Operator, VotingFeatureSelector};
}
