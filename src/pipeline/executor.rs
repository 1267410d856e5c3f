//! Runs a pipeline against a dataset one or more times

use super::context::{derive_seed, ExecutionContext, StepContext};
use super::data::PipelineData;
use super::pipeline::Pipeline;
use crate::data::Dataset;
use crate::error::{PipelineError, Result};
use chrono::Utc;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::ops::Index;
use std::time::Instant;
use tracing::{info, warn};

/// Executor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Number of independent runs
    pub n_runs: usize,
    /// Base seed; `None` draws one from entropy per `run` call
    pub seed: Option<u64>,
    /// Execute runs on the rayon pool
    pub parallel_runs: bool,
    /// Let steps evaluate candidates in parallel
    pub parallel_candidates: bool,
    /// Stop at the first failing run instead of finishing the others
    pub fail_fast: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            n_runs: 1,
            seed: Some(42),
            parallel_runs: true,
            parallel_candidates: true,
            fail_fast: true,
        }
    }
}

impl ExecutorConfig {
    pub fn with_runs(mut self, n_runs: usize) -> Self {
        self.n_runs = n_runs;
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_parallel_runs(mut self, parallel: bool) -> Self {
        self.parallel_runs = parallel;
        self
    }

    pub fn with_parallel_candidates(mut self, parallel: bool) -> Self {
        self.parallel_candidates = parallel;
        self
    }

    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_runs == 0 {
            return Err(PipelineError::Config("n_runs must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Result of a single run
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub context: ExecutionContext,
    pub data: PipelineData,
}

/// All runs of one executor call, ordered by run index
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    runs: Vec<RunOutcome>,
}

impl ExecutionResult {
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    pub fn first(&self) -> Option<&RunOutcome> {
        self.runs.first()
    }

    pub fn get(&self, index: usize) -> Option<&RunOutcome> {
        self.runs.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RunOutcome> {
        self.runs.iter()
    }

    /// The only run of a single-run execution
    pub fn into_single(self) -> Result<RunOutcome> {
        let n = self.runs.len();
        let mut runs = self.runs;
        match (runs.pop(), n) {
            (Some(run), 1) => Ok(run),
            _ => Err(PipelineError::Data(format!("expected exactly 1 run, found {}", n))),
        }
    }

    pub fn into_runs(self) -> Vec<RunOutcome> {
        self.runs
    }
}

impl Index<usize> for ExecutionResult {
    type Output = RunOutcome;

    fn index(&self, index: usize) -> &RunOutcome {
        &self.runs[index]
    }
}

impl IntoIterator for ExecutionResult {
    type Item = RunOutcome;
    type IntoIter = std::vec::IntoIter<RunOutcome>;

    fn into_iter(self) -> Self::IntoIter {
        self.runs.into_iter()
    }
}

impl<'a> IntoIterator for &'a ExecutionResult {
    type Item = &'a RunOutcome;
    type IntoIter = std::slice::Iter<'a, RunOutcome>;

    fn into_iter(self) -> Self::IntoIter {
        self.runs.iter()
    }
}

/// In-process executor
#[derive(Debug, Clone)]
pub struct LocalExecutor {
    dataset: Dataset,
    config: ExecutorConfig,
}

impl LocalExecutor {
    pub fn new(dataset: Dataset) -> Self {
        Self {
            dataset,
            config: ExecutorConfig::default(),
        }
    }

    pub fn with_runs(mut self, n_runs: usize) -> Self {
        self.config.n_runs = n_runs;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    pub fn with_config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Execute `pipeline` `n_runs` times
    ///
    /// Each run starts from its own copy of the dataset and its own RNG.
    /// Any step failure fails the whole call.
    pub fn run(&self, pipeline: &Pipeline) -> Result<ExecutionResult> {
        self.config.validate()?;
        let n_runs = self.config.n_runs;
        let base_seed = self
            .config
            .seed
            .unwrap_or_else(|| ChaCha8Rng::from_entropy().gen());

        info!(runs = n_runs, seed = base_seed, steps = pipeline.len(), "starting execution");

        let run_one = |index: usize| self.run_once(pipeline, index, derive_seed(base_seed, index as u64));

        let runs = if self.config.parallel_runs && n_runs > 1 {
            if self.config.fail_fast {
                (0..n_runs).into_par_iter().map(run_one).collect::<Result<Vec<_>>>()?
            } else {
                let results: Vec<Result<RunOutcome>> = (0..n_runs).into_par_iter().map(run_one).collect();
                Self::first_error(results)?
            }
        } else {
            let mut results = Vec::with_capacity(n_runs);
            for index in 0..n_runs {
                let result = run_one(index);
                let failed = result.is_err();
                results.push(result);
                if failed && self.config.fail_fast {
                    break;
                }
            }
            Self::first_error(results)?
        };

        Ok(ExecutionResult { runs })
    }

    fn first_error(results: Vec<Result<RunOutcome>>) -> Result<Vec<RunOutcome>> {
        let failures = results.iter().filter(|r| r.is_err()).count();
        if failures > 1 {
            warn!(failures, "multiple runs failed, returning the first error");
        }
        results.into_iter().collect()
    }

    fn run_once(&self, pipeline: &Pipeline, run_index: usize, seed: u64) -> Result<RunOutcome> {
        let started_at = Utc::now();
        let start = Instant::now();
        let mut ctx = StepContext::new(run_index, seed).with_parallel(self.config.parallel_candidates);

        let data = pipeline
            .run_on(PipelineData::new(self.dataset.clone()), &mut ctx)
            .map_err(|e| {
                warn!(run = run_index, error = %e, "run failed");
                e
            })?;

        let duration_secs = start.elapsed().as_secs_f64();
        info!(
            run = run_index,
            candidates = data.return_val.len(),
            duration_secs,
            "run finished"
        );

        Ok(RunOutcome {
            context: ExecutionContext {
                run_index,
                seed,
                started_at,
                duration_secs,
                steps: ctx.traces,
            },
            data,
        })
    }
}
