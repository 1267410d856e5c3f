//! Hyperparameter search step
//!
//! Wraps an evaluation step (or sub-pipeline). For every candidate it asks a
//! [`SearchAlgorithm`](super::SearchAlgorithm) for parameters, runs the
//! evaluation on a single-candidate [`PipelineData`], and feeds the resulting
//! loss back. The best evaluated candidate replaces the original, carrying
//! the full trial history.

use super::search::{create_sampler, SamplerType};
use super::trials::{Trial, Trials};
use crate::data::Dataset;
use crate::error::{PipelineError, Result};
use crate::pipeline::{derive_seed, CandidateResult, Pipeline, PipelineData, Step, StepBody, StepContext};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Search settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HyperoptConfig {
    /// Trials per candidate
    pub max_evals: usize,
    pub sampler: SamplerType,
    /// Search seed; drawn from the run RNG when unset
    pub seed: Option<u64>,
    /// Give up on a candidate after this many failed trials in a row
    pub max_consecutive_failures: Option<usize>,
    /// Soft per-candidate deadline, checked between trials
    pub timeout_secs: Option<f64>,
}

impl Default for HyperoptConfig {
    fn default() -> Self {
        Self {
            max_evals: 10,
            sampler: SamplerType::Tpe,
            seed: None,
            max_consecutive_failures: Some(3),
            timeout_secs: None,
        }
    }
}

impl HyperoptConfig {
    pub fn with_max_evals(mut self, max_evals: usize) -> Self {
        self.max_evals = max_evals;
        self
    }

    pub fn with_sampler(mut self, sampler: SamplerType) -> Self {
        self.sampler = sampler;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_max_consecutive_failures(mut self, limit: Option<usize>) -> Self {
        self.max_consecutive_failures = limit;
        self
    }

    pub fn with_timeout(mut self, secs: f64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_evals == 0 {
            return Err(PipelineError::Config("max_evals must be at least 1".to_string()));
        }
        if self.max_consecutive_failures == Some(0) {
            return Err(PipelineError::Config(
                "max_consecutive_failures must be at least 1".to_string(),
            ));
        }
        if let Some(t) = self.timeout_secs {
            if !(t > 0.0 && t.is_finite()) {
                return Err(PipelineError::Config(format!("timeout_secs must be positive, got {}", t)));
            }
        }
        Ok(())
    }
}

/// Hyperparameter search around an evaluation step
#[derive(Clone)]
pub struct Hyperopt {
    evaluation: StepBody,
    config: HyperoptConfig,
}

impl Hyperopt {
    /// Search with `evaluation` scoring each proposal
    pub fn new(evaluation: impl Step + 'static, max_evals: usize) -> Self {
        Self {
            evaluation: StepBody::Leaf(Arc::new(evaluation)),
            config: HyperoptConfig::default().with_max_evals(max_evals),
        }
    }

    /// Search with a whole sub-pipeline scoring each proposal
    pub fn with_pipeline(evaluation: Pipeline, max_evals: usize) -> Self {
        Self {
            evaluation: StepBody::Composite(evaluation),
            config: HyperoptConfig::default().with_max_evals(max_evals),
        }
    }

    pub fn with_config(mut self, config: HyperoptConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &HyperoptConfig {
        &self.config
    }

    /// Run the evaluation on a single candidate
    fn evaluate(
        &self,
        candidate: CandidateResult,
        dataset: &Dataset,
        parent: &StepContext,
        seed: u64,
    ) -> Result<CandidateResult> {
        let mut ctx = parent.detached(seed);
        let input = PipelineData::new(dataset.clone()).with_candidates(vec![candidate]);
        let output = match &self.evaluation {
            StepBody::Leaf(step) => step
                .run(input, &mut ctx)
                .map_err(|e| e.in_step(step.name(), 0))?,
            StepBody::Composite(pipeline) => pipeline.run_on(input, &mut ctx)?,
        };
        output
            .return_val
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::Data("evaluation dropped the candidate".to_string()))
    }

    /// Search one candidate; only structural errors are returned
    fn search(
        &self,
        mut candidate: CandidateResult,
        dataset: &Dataset,
        parent: &StepContext,
        seed: u64,
    ) -> Result<CandidateResult> {
        if candidate.is_failed() {
            return Ok(candidate);
        }
        if candidate.space.is_empty() {
            debug!(candidate = %candidate.model_name(), "empty space, evaluating once");
            return self.evaluate(candidate, dataset, parent, seed);
        }
        if !candidate.space.is_searchable() {
            debug!(candidate = %candidate.model_name(), "space has no free dimension");
        }

        let model = candidate.model_name().to_string();
        let mut sampler = create_sampler(self.config.sampler, derive_seed(seed, 1));
        let deadline = self
            .config
            .timeout_secs
            .map(|secs| Instant::now() + Duration::from_secs_f64(secs));

        let mut history = Trials::new();
        let mut best: Option<(f64, CandidateResult)> = None;
        let mut consecutive_failures = 0;

        for index in 0..self.config.max_evals {
            if deadline.map_or(false, |d| Instant::now() >= d) {
                warn!(candidate = %model, trials = index, "search timed out");
                break;
            }

            let mut params = candidate.params.clone();
            params.extend(sampler.suggest(&candidate.space, &history));

            let start = Instant::now();
            let evaluated = self.evaluate(
                candidate.with_params(params.clone()),
                dataset,
                parent,
                // same seed every trial: all trials see the same folds
                seed,
            )?;
            let duration = start.elapsed().as_secs_f64();

            match evaluated.score.filter(|_| !evaluated.is_failed()) {
                Some(score) => {
                    let direction = evaluated.metric.as_ref().map(|m| m.direction).ok_or_else(|| {
                        PipelineError::Data(format!(
                            "evaluation scored '{}' without declaring a metric",
                            model
                        ))
                    })?;
                    let loss = direction.to_loss(score);
                    debug!(candidate = %model, trial = index, loss, "trial finished");
                    history.push(Trial::ok(index, params, loss, score, duration));
                    consecutive_failures = 0;

                    if best.as_ref().map_or(true, |(best_loss, _)| loss < *best_loss) {
                        best = Some((loss, evaluated));
                    }
                }
                None => {
                    let reason = PipelineError::SearchTrial {
                        trial: index,
                        reason: evaluated
                            .error
                            .unwrap_or_else(|| "evaluation produced no score".to_string()),
                    };
                    warn!(candidate = %model, error = %reason, "trial failed");
                    history.push(Trial::failed(index, params, reason.to_string(), duration));
                    consecutive_failures += 1;

                    if let Some(limit) = self.config.max_consecutive_failures {
                        if consecutive_failures >= limit {
                            candidate.mark_failed(PipelineError::ConsecutiveTrialFailures {
                                model,
                                failures: consecutive_failures,
                            });
                            candidate.history = Some(history);
                            return Ok(candidate);
                        }
                    }
                }
            }
        }

        match best {
            Some((loss, mut winner)) => {
                info!(candidate = %model, trials = history.len(), loss, "search finished");
                winner.history = Some(history);
                Ok(winner)
            }
            None => {
                let n_trials = history.len();
                candidate.mark_failed(PipelineError::CandidateEvaluation {
                    model,
                    reason: format!("all {} trials failed", n_trials),
                });
                candidate.history = Some(history);
                Ok(candidate)
            }
        }
    }
}

impl Step for Hyperopt {
    fn run(&self, mut data: PipelineData, ctx: &mut StepContext) -> Result<PipelineData> {
        let drawn = ctx.next_seed();
        let base_seed = self.config.seed.unwrap_or(drawn);

        let parent: &StepContext = ctx;
        let dataset = &data.dataset;
        let candidates = std::mem::take(&mut data.return_val);
        let search = |(index, candidate): (usize, CandidateResult)| {
            self.search(candidate, dataset, parent, derive_seed(base_seed, index as u64))
        };

        let results: Vec<Result<CandidateResult>> = if parent.parallel() {
            candidates.into_par_iter().enumerate().map(search).collect()
        } else {
            candidates.into_iter().enumerate().map(search).collect()
        };
        data.return_val = results.into_iter().collect::<Result<Vec<_>>>()?;

        let summary: Vec<_> = data
            .return_val
            .iter()
            .map(|c| {
                serde_json::json!({
                    "model": c.model_name(),
                    "trials": c.history.as_ref().map(Trials::len).unwrap_or(0),
                    "score": c.score,
                    "params": c.params,
                })
            })
            .collect();
        data.record_extra(ctx.step_name(), serde_json::Value::Array(summary));
        Ok(data)
    }

    fn name(&self) -> String {
        "hyperopt".to_string()
    }

    fn validate(&self) -> Result<()> {
        self.config.validate()?;
        match &self.evaluation {
            StepBody::Leaf(step) if step.is_initializer() => Err(PipelineError::Config(format!(
                "evaluation step '{}' would replace the candidates under search",
                step.name()
            ))),
            StepBody::Leaf(step) => step.validate(),
            StepBody::Composite(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::make_classification;
    use crate::hyperparam::{ParamSpace, Params, FAILED_TRIAL_LOSS};
    use crate::model::{BuiltinModel, Direction, FnModel, Metric, MetricInfo, ModelClass, CV};
    use crate::pipeline::PipelineStep;

    fn data(space: ParamSpace) -> PipelineData {
        PipelineData::new(make_classification(60, 3, 2, 0.0, 1).unwrap()).with_candidates(vec![
            CandidateResult::new(Arc::new(BuiltinModel::KnnClassifier), space),
        ])
    }

    /// Scores a candidate by its `x` parameter, failing when `x` is negative
    fn score_by_x() -> PipelineStep {
        PipelineStep::from_fn("score_x", |mut data, _| {
            for c in &mut data.return_val {
                let x = c.params.get("x").and_then(|v| v.as_float()).unwrap_or(0.0);
                if x < 0.0 {
                    c.mark_failed("negative x");
                } else {
                    c.score = Some(x);
                    c.metric = Some(MetricInfo {
                        name: "x".into(),
                        direction: Direction::Minimize,
                    });
                }
            }
            Ok(data)
        })
    }

    fn scorer_pipeline() -> Pipeline {
        Pipeline::new().append_step(score_by_x()).unwrap()
    }

    #[test]
    fn test_history_length_equals_max_evals() {
        let step = Hyperopt::new(CV::new(Metric::Accuracy), 4);
        let space = ParamSpace::new().int_uniform("n_neighbors", 1, 10);

        let out = step.run(data(space), &mut StepContext::new(0, 5)).unwrap();
        let c = &out.return_val[0];
        assert_eq!(c.history.as_ref().unwrap().len(), 4);
        assert!(c.score.is_some());
        assert!(c.params.contains_key("n_neighbors"));
    }

    #[test]
    fn test_best_trial_wins() {
        let step = Hyperopt::with_pipeline(scorer_pipeline(), 12)
            .with_config(HyperoptConfig::default().with_max_evals(12).with_sampler(SamplerType::Random));
        let space = ParamSpace::new().uniform("x", 0.0, 1.0);

        let out = step.run(data(space), &mut StepContext::new(0, 1)).unwrap();
        let c = &out.return_val[0];
        let history = c.history.as_ref().unwrap();
        let min_score = history.iter().filter_map(|t| t.score).fold(f64::MAX, f64::min);
        assert_eq!(c.score, Some(min_score));
        assert_eq!(history.best().unwrap().score, Some(min_score));
    }

    #[test]
    fn test_consecutive_failures_fail_candidate() {
        let step = Hyperopt::with_pipeline(scorer_pipeline(), 10).with_config(
            HyperoptConfig::default()
                .with_max_evals(10)
                .with_max_consecutive_failures(Some(2)),
        );
        let space = ParamSpace::new().uniform("x", -2.0, -1.0);

        let out = step.run(data(space), &mut StepContext::new(0, 1)).unwrap();
        let c = &out.return_val[0];
        assert!(c.is_failed());
        assert!(c.error.as_ref().unwrap().contains("consecutive"));
        let history = c.history.as_ref().unwrap();
        assert_eq!(history.len(), 2);
        assert!(history.losses().iter().all(|&l| l == FAILED_TRIAL_LOSS));
    }

    #[test]
    fn test_fixed_space_still_runs_every_trial() {
        let step = Hyperopt::with_pipeline(scorer_pipeline(), 5);
        let out = step
            .run(data(ParamSpace::new().fixed("x", 0.25)), &mut StepContext::new(0, 1))
            .unwrap();
        let c = &out.return_val[0];
        assert_eq!(c.score, Some(0.25));
        let history = c.history.as_ref().unwrap();
        assert_eq!(history.len(), 5);
        assert!(history.iter().all(|t| t.score == Some(0.25)));
    }

    #[test]
    fn test_empty_space_evaluated_once() {
        let step = Hyperopt::new(CV::new(Metric::Accuracy), 5);
        let out = step.run(data(ParamSpace::new()), &mut StepContext::new(0, 1)).unwrap();
        let c = &out.return_val[0];
        assert!(c.is_scored());
        assert!(c.history.is_none());
    }

    #[test]
    fn test_trials_share_evaluation_folds() {
        let constant = FnModel::new("ignores_x", |_| BuiltinModel::GaussianNaiveBayes.construct(&Params::new()));
        let candidate = CandidateResult::new(Arc::new(constant), ParamSpace::new().uniform("x", 0.0, 1.0));
        let input = data(ParamSpace::new()).with_candidates(vec![candidate]);

        let out = Hyperopt::new(CV::new(Metric::Accuracy), 6)
            .run(input, &mut StepContext::new(0, 3))
            .unwrap();
        let scores: Vec<f64> = out.return_val[0]
            .history
            .as_ref()
            .unwrap()
            .iter()
            .filter_map(|t| t.score)
            .collect();
        assert_eq!(scores.len(), 6);
        assert!(scores.iter().all(|&s| s == scores[0]), "{:?}", scores);
    }

    #[test]
    fn test_score_without_metric_is_fatal() {
        let unlabeled = Pipeline::new()
            .append_step(PipelineStep::from_fn("no_metric", |mut data, _| {
                for c in &mut data.return_val {
                    c.score = Some(1.0);
                }
                Ok(data)
            }))
            .unwrap();
        let err = Hyperopt::with_pipeline(unlabeled, 2)
            .run(data(ParamSpace::new().uniform("x", 0.0, 1.0)), &mut StepContext::new(0, 1))
            .unwrap_err();
        assert!(matches!(err, PipelineError::Data(_)));
    }

    #[test]
    fn test_fatal_sub_pipeline_error_propagates() {
        let failing = Pipeline::new()
            .append_step(PipelineStep::from_fn("explode", |_, _| {
                Err(PipelineError::Computation("broken evaluation".into()))
            }))
            .unwrap();
        let step = Hyperopt::with_pipeline(failing, 3);
        let err = step
            .run(data(ParamSpace::new().uniform("x", 0.0, 1.0)), &mut StepContext::new(0, 1))
            .unwrap_err();
        assert_eq!(err.step_name(), Some("explode"));
    }

    #[test]
    fn test_failed_candidate_is_not_searched() {
        let broken = FnModel::new("broken", |_| Err(PipelineError::Computation("no".into())));
        let mut candidate = CandidateResult::new(Arc::new(broken), ParamSpace::new().uniform("x", 0.0, 1.0));
        candidate.mark_failed("earlier");
        let input = data(ParamSpace::new().uniform("x", 0.0, 1.0)).with_candidates(vec![candidate]);

        let out = Hyperopt::with_pipeline(scorer_pipeline(), 3)
            .run(input, &mut StepContext::new(0, 1))
            .unwrap();
        assert!(out.return_val[0].history.is_none());
        assert_eq!(out.return_val[0].error.as_deref(), Some("earlier"));
    }

    #[test]
    fn test_config_validation() {
        assert!(HyperoptConfig::default().with_max_evals(0).validate().is_err());
        assert!(HyperoptConfig::default()
            .with_max_consecutive_failures(Some(0))
            .validate()
            .is_err());
        let with_initializer = Hyperopt::new(crate::model::ModelSpace::default(), 3);
        assert!(Pipeline::new().then(with_initializer).is_err());
    }
}
