//! K-fold cross-validation step

use super::evaluate::{evaluate_candidates, score_split};
use super::metrics::Metric;
use super::split::{SplitStrategy, Splitter};
use crate::error::{PipelineError, Result};
use crate::pipeline::{PipelineData, Step, StepContext};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Cross-validation settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CvConfig {
    pub n_splits: usize,
    pub shuffle: bool,
    /// Keep class proportions in each fold
    pub stratified: bool,
}

impl Default for CvConfig {
    fn default() -> Self {
        Self {
            n_splits: 5,
            shuffle: true,
            stratified: false,
        }
    }
}

impl CvConfig {
    pub fn with_n_splits(mut self, n_splits: usize) -> Self {
        self.n_splits = n_splits;
        self
    }

    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    pub fn with_stratified(mut self, stratified: bool) -> Self {
        self.stratified = stratified;
        self
    }

    fn strategy(&self) -> SplitStrategy {
        if self.stratified {
            SplitStrategy::StratifiedKFold {
                n_splits: self.n_splits,
                shuffle: self.shuffle,
            }
        } else {
            SplitStrategy::KFold {
                n_splits: self.n_splits,
                shuffle: self.shuffle,
            }
        }
    }
}

/// Scores every candidate by the mean of its fold scores
#[derive(Debug, Clone)]
pub struct CV {
    metric: Metric,
    config: CvConfig,
}

impl CV {
    pub fn new(metric: Metric) -> Self {
        Self::with_config(metric, CvConfig::default())
    }

    pub fn with_config(metric: Metric, config: CvConfig) -> Self {
        Self { metric, config }
    }

    pub fn metric(&self) -> &Metric {
        &self.metric
    }

    pub fn config(&self) -> &CvConfig {
        &self.config
    }
}

impl Step for CV {
    fn run(&self, mut data: PipelineData, ctx: &mut StepContext) -> Result<PipelineData> {
        let seed = ctx.next_seed();
        if data.return_val.is_empty() {
            warn!(step = %ctx.step_name(), "no candidates to cross-validate");
            return Ok(data);
        }

        // Fold layout is shared by all candidates; failing here is fatal
        let splits = Splitter::new(self.config.strategy(), seed)
            .split(data.dataset.n_samples(), data.dataset.target())?;

        let dataset = &data.dataset;
        let metric = &self.metric;
        let candidates = std::mem::take(&mut data.return_val);
        data.return_val = evaluate_candidates(candidates, seed, ctx.parallel(), |candidate, _| {
            let scores = splits
                .iter()
                .map(|split| score_split(candidate.model.as_ref(), &candidate.params, dataset, split, metric))
                .collect::<Result<Vec<f64>>>()?;
            let mean = scores.iter().sum::<f64>() / scores.len() as f64;
            debug!(candidate = %candidate.model_name(), score = mean, "cross-validated");

            candidate.score = Some(mean);
            candidate.fold_scores = scores;
            candidate.metric = Some(metric.info());
            Ok(())
        });

        Ok(data)
    }

    fn name(&self) -> String {
        "cv".to_string()
    }

    fn validate(&self) -> Result<()> {
        if self.config.n_splits < 2 {
            return Err(PipelineError::Config(format!(
                "n_splits must be at least 2, got {}",
                self.config.n_splits
            )));
        }
        Ok(())
    }
}
