//! Values flowing between pipeline steps

use crate::data::Dataset;
use crate::hyperparam::{ParamSpace, Params, Trials};
use crate::model::{Direction, MetricInfo, ModelRef};
use serde::Serialize;
use std::collections::BTreeMap;

/// One candidate model configuration and what is known about it so far
#[derive(Debug, Clone)]
pub struct CandidateResult {
    pub model: ModelRef,
    /// Hyperparameter distributions to search
    pub space: ParamSpace,
    /// Concrete parameters used for evaluation
    pub params: Params,
    pub score: Option<f64>,
    pub metric: Option<MetricInfo>,
    /// Per-fold scores of the last cross-validation
    pub fold_scores: Vec<f64>,
    /// Trial log of the hyperparameter search that produced `params`
    pub history: Option<Trials>,
    /// Why the candidate failed, if it did
    pub error: Option<String>,
}

impl CandidateResult {
    /// Unscored candidate with the fixed parameters of its space
    pub fn new(model: ModelRef, space: ParamSpace) -> Self {
        let params = space.fixed_params();
        Self {
            model,
            space,
            params,
            score: None,
            metric: None,
            fold_scores: Vec::new(),
            history: None,
            error: None,
        }
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    pub fn is_scored(&self) -> bool {
        self.score.is_some() && !self.is_failed()
    }

    /// Record a failure; clears any previous score
    pub fn mark_failed(&mut self, error: impl ToString) {
        self.error = Some(error.to_string());
        self.score = None;
        self.fold_scores.clear();
    }

    /// Copy of this candidate evaluated with different parameters
    pub fn with_params(&self, params: Params) -> Self {
        Self {
            model: self.model.clone(),
            space: self.space.clone(),
            params,
            score: None,
            metric: None,
            fold_scores: Vec::new(),
            history: None,
            error: None,
        }
    }

    /// Serializable summary for logs and reports
    pub fn summary(&self) -> CandidateSummary {
        CandidateSummary {
            model: self.model_name().to_string(),
            params: self.params.clone(),
            score: self.score,
            metric: self.metric.as_ref().map(|m| m.name.clone()),
            n_trials: self.history.as_ref().map(Trials::len),
            error: self.error.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CandidateSummary {
    pub model: String,
    pub params: Params,
    pub score: Option<f64>,
    pub metric: Option<String>,
    pub n_trials: Option<usize>,
    pub error: Option<String>,
}

/// The state threaded through the steps of one run
#[derive(Debug, Clone)]
pub struct PipelineData {
    pub dataset: Dataset,
    pub return_val: Vec<CandidateResult>,
    /// Per-step side outputs, keyed by step name
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl PipelineData {
    pub fn new(dataset: Dataset) -> Self {
        Self {
            dataset,
            return_val: Vec::new(),
            extra: BTreeMap::new(),
        }
    }

    pub fn with_candidates(mut self, candidates: Vec<CandidateResult>) -> Self {
        self.return_val = candidates;
        self
    }

    /// Candidates holding a score
    pub fn scored(&self) -> impl Iterator<Item = &CandidateResult> {
        self.return_val.iter().filter(|c| c.is_scored())
    }

    pub fn failed(&self) -> impl Iterator<Item = &CandidateResult> {
        self.return_val.iter().filter(|c| c.is_failed())
    }

    /// Best scored candidate according to its metric direction
    ///
    /// Earlier candidates win ties.
    pub fn best(&self) -> Option<&CandidateResult> {
        self.scored().fold(None, |best: Option<&CandidateResult>, c| match best {
            None => Some(c),
            Some(b) => {
                let direction = c
                    .metric
                    .as_ref()
                    .map(|m| m.direction)
                    .unwrap_or(Direction::Maximize);
                match (c.score, b.score) {
                    (Some(cs), Some(bs)) if direction.is_better(cs, bs) => Some(c),
                    _ => Some(b),
                }
            }
        })
    }

    pub fn record_extra(&mut self, step: impl Into<String>, value: serde_json::Value) {
        self.extra.insert(step.into(), value);
    }
}
