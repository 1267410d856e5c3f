//! Single holdout validation step

use super::evaluate::{evaluate_candidates, score_split};
use super::metrics::Metric;
use super::split::train_test_split;
use crate::error::{PipelineError, Result};
use crate::pipeline::{PipelineData, Step, StepContext};
use tracing::warn;

/// Scores every candidate on one seeded train/test split
#[derive(Debug, Clone)]
pub struct Validate {
    test_size: f64,
    metric: Metric,
    seed: Option<u64>,
}

impl Validate {
    pub fn new(test_size: f64, metric: Metric) -> Self {
        Self {
            test_size,
            metric,
            seed: None,
        }
    }

    /// Pin the split instead of drawing it from the run RNG
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

impl Step for Validate {
    fn run(&self, mut data: PipelineData, ctx: &mut StepContext) -> Result<PipelineData> {
        // Always draw so later steps see the same RNG state either way
        let drawn = ctx.next_seed();
        let seed = self.seed.unwrap_or(drawn);
        if data.return_val.is_empty() {
            warn!(step = %ctx.step_name(), "no candidates to validate");
            return Ok(data);
        }

        let split = train_test_split(data.dataset.n_samples(), self.test_size, seed)?;
        let dataset = &data.dataset;
        let metric = &self.metric;
        let candidates = std::mem::take(&mut data.return_val);
        data.return_val = evaluate_candidates(candidates, seed, ctx.parallel(), |candidate, _| {
            let score = score_split(candidate.model.as_ref(), &candidate.params, dataset, &split, metric)?;
            candidate.score = Some(score);
            candidate.fold_scores = vec![score];
            candidate.metric = Some(metric.info());
            Ok(())
        });

        Ok(data)
    }

    fn name(&self) -> String {
        "validate".to_string()
    }

    fn validate(&self) -> Result<()> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(PipelineError::Config(format!(
                "test_size must be in (0, 1), got {}",
                self.test_size
            )));
        }
        Ok(())
    }
}
