//! Pipeline composition and execution
//!
//! A [`Pipeline`] is an ordered list of named [`PipelineStep`]s. Each step
//! takes the [`PipelineData`] of the run and returns the next one. The
//! [`LocalExecutor`] runs a pipeline one or more times against a dataset.

mod context;
mod data;
mod executor;
mod pipeline;
mod step;

pub use context::{derive_seed, ExecutionContext, StepContext, StepTrace};
pub use data::{CandidateResult, CandidateSummary, PipelineData};
pub use executor::{ExecutionResult, ExecutorConfig, LocalExecutor, RunOutcome};
pub use pipeline::Pipeline;
pub use step::{FnStep, PipelineStep, Step, StepBody};
