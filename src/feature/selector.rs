//! Importance-based column selection

use super::importance::{abs_correlations, model_importance, normalize, ranks, top_k};
use crate::data::Dataset;
use crate::error::{PipelineError, Result};
use crate::pipeline::{CandidateResult, PipelineData, Step, StepContext};
use ndarray::Array1;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Normalised importances of every usable candidate
///
/// Candidates whose model cannot be fitted are skipped with a warning.
fn candidate_importances(
    candidates: &[CandidateResult],
    dataset: &Dataset,
    parallel: bool,
) -> Vec<Array1<f64>> {
    let score = |c: &CandidateResult| match model_importance(c, dataset) {
        Ok(scores) => Some(scores),
        Err(e) => {
            warn!(model = c.model_name(), error = %e, "skipping candidate for feature importance");
            None
        }
    };
    let usable = candidates.iter().filter(|c| !c.is_failed());
    if parallel {
        usable.collect::<Vec<_>>().into_par_iter().filter_map(score).collect()
    } else {
        usable.filter_map(score).collect()
    }
}

fn target_importance(dataset: &Dataset) -> Array1<f64> {
    info!("no usable candidates, falling back to target correlation");
    normalize(abs_correlations(dataset, dataset.target()))
}

fn check_k(k: usize) -> Result<()> {
    if k == 0 {
        return Err(PipelineError::InvalidParameter {
            name: "k".to_string(),
            value: "0".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    Ok(())
}

/// Keep the selected columns and record them under the step name
fn apply_selection(
    mut data: PipelineData,
    ctx: &StepContext,
    scores: &Array1<f64>,
    k: usize,
    method: &str,
) -> Result<PipelineData> {
    let n_features = data.dataset.n_features();
    let selected = top_k(scores, k.min(n_features));
    let names: Vec<String> = selected
        .iter()
        .map(|&i| data.dataset.columns()[i].name.clone())
        .collect();
    let kept_scores: Vec<f64> = selected.iter().map(|&i| scores[i]).collect();

    // candidate scores were measured on the wider dataset
    let stale_scores = data.scored().count();
    if stale_scores > 0 && selected.len() < n_features {
        debug!(stale_scores, "candidate scores predate the selection, rescore to compare");
    }

    data.dataset = data.dataset.select_columns(&selected)?;
    info!(
        method,
        before = n_features,
        after = selected.len(),
        "selected features"
    );
    debug!(?names, "kept columns");
    data.record_extra(
        ctx.step_name(),
        serde_json::json!({
            "method": method,
            "selected": names,
            "scores": kept_scores,
            "stale_candidate_scores": stale_scores,
        }),
    );
    Ok(data)
}

/// Keeps the `k` columns with the highest averaged model importance
#[derive(Debug, Clone, Copy)]
pub struct FeatureSelector {
    k: usize,
}

impl FeatureSelector {
    pub fn new(k: usize) -> Self {
        Self { k }
    }

    pub fn k(&self) -> usize {
        self.k
    }
}

impl Step for FeatureSelector {
    fn run(&self, data: PipelineData, ctx: &mut StepContext) -> Result<PipelineData> {
        if data.dataset.n_features() == 0 {
            return Ok(data);
        }
        let per_model = candidate_importances(&data.return_val, &data.dataset, ctx.parallel());
        let (scores, method) = if per_model.is_empty() {
            (target_importance(&data.dataset), "target_correlation")
        } else {
            let n_models = per_model.len() as f64;
            let total = per_model
                .iter()
                .fold(Array1::<f64>::zeros(data.dataset.n_features()), |acc, s| acc + s);
            (total / n_models, "model_importance")
        };
        apply_selection(data, ctx, &scores, self.k, method)
    }

    fn name(&self) -> String {
        "feature_selector".to_string()
    }

    fn validate(&self) -> Result<()> {
        check_k(self.k)
    }
}

/// How per-model ranks are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VotingRule {
    /// Product of ranks, smallest wins
    Mult,
    /// Sum of reciprocal ranks, largest wins
    Div,
}

impl VotingRule {
    /// Combined score where higher is better
    fn combine(&self, rank_lists: &[Vec<usize>], n_features: usize) -> Array1<f64> {
        Array1::from_shape_fn(n_features, |j| match self {
            // sum of logs keeps the product ordering without overflow
            VotingRule::Mult => -rank_lists.iter().map(|r| (r[j] as f64).ln()).sum::<f64>(),
            VotingRule::Div => rank_lists.iter().map(|r| 1.0 / r[j] as f64).sum(),
        })
    }
}

/// Rank-voting selector: each model ranks the columns and the votes are pooled
#[derive(Debug, Clone, Copy)]
pub struct VotingFeatureSelector {
    k: usize,
    rule: VotingRule,
}

impl VotingFeatureSelector {
    pub fn new(k: usize, rule: VotingRule) -> Self {
        Self { k, rule }
    }

    pub fn mult(k: usize) -> Self {
        Self::new(k, VotingRule::Mult)
    }

    pub fn div(k: usize) -> Self {
        Self::new(k, VotingRule::Div)
    }

    pub fn rule(&self) -> VotingRule {
        self.rule
    }
}

impl Step for VotingFeatureSelector {
    fn run(&self, data: PipelineData, ctx: &mut StepContext) -> Result<PipelineData> {
        let n_features = data.dataset.n_features();
        if n_features == 0 {
            return Ok(data);
        }
        let mut per_model = candidate_importances(&data.return_val, &data.dataset, ctx.parallel());
        let method = if per_model.is_empty() {
            per_model.push(target_importance(&data.dataset));
            "target_correlation"
        } else {
            "rank_voting"
        };

        let rank_lists: Vec<Vec<usize>> = per_model.iter().map(ranks).collect();
        let scores = self.rule.combine(&rank_lists, n_features);
        apply_selection(data, ctx, &scores, self.k, method)
    }

    fn name(&self) -> String {
        match self.rule {
            VotingRule::Mult => "voting_mult".to_string(),
            VotingRule::Div => "voting_div".to_string(),
        }
    }

    fn validate(&self) -> Result<()> {
        check_k(self.k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::make_classification;
    use crate::hyperparam::ParamSpace;
    use crate::model::BuiltinModel;
    use std::sync::Arc;

    fn candidates(models: &[BuiltinModel]) -> Vec<CandidateResult> {
        models
            .iter()
            .map(|&m| CandidateResult::new(Arc::new(m), ParamSpace::new()))
            .collect()
    }

    fn ctx_at(step: &str) -> StepContext {
        let mut ctx = StepContext::new(0, 0);
        ctx.enter(step, 0);
        ctx
    }

    fn classification_data(models: &[BuiltinModel]) -> PipelineData {
        let dataset = make_classification(120, 6, 2, 0.0, 11).unwrap();
        PipelineData::new(dataset).with_candidates(candidates(models))
    }

    #[test]
    fn test_selector_keeps_informative_columns() {
        let data = classification_data(&[
            BuiltinModel::LogisticRegression,
            BuiltinModel::GaussianNaiveBayes,
        ]);
        let out = FeatureSelector::new(2).run(data, &mut ctx_at("select")).unwrap();

        assert_eq!(out.dataset.feature_names(), vec!["x0", "x1"]);
        assert_eq!(out.return_val.len(), 2);
        assert_eq!(out.extra["select"]["method"], "model_importance");
        // nothing was scored yet
        assert_eq!(out.extra["select"]["stale_candidate_scores"], 0);
    }

    #[test]
    fn test_selector_count_is_min_k_n() {
        let data = classification_data(&[BuiltinModel::KnnClassifier]);
        let mut ctx = StepContext::new(0, 0).with_parallel(false);
        let out = FeatureSelector::new(50).run(data, &mut ctx).unwrap();
        assert_eq!(out.dataset.n_features(), 6);
    }

    #[test]
    fn test_fallback_to_target_correlation() {
        let mut data = classification_data(&[BuiltinModel::Ridge]);
        data.return_val[0].mark_failed("boom");
        let out = FeatureSelector::new(2).run(data, &mut ctx_at("fallback")).unwrap();

        assert_eq!(out.dataset.n_features(), 2);
        assert_eq!(out.extra["fallback"]["method"], "target_correlation");
        // failed candidate is left alone
        assert!(out.return_val[0].is_failed());
    }

    #[test]
    fn test_voting_rules() {
        // model a: 0 > 1 > 2, model b: 2 > 1 > 0
        let a = vec![1, 2, 3];
        let b = vec![3, 2, 1];
        let mult = VotingRule::Mult.combine(&[a.clone(), b.clone()], 3);
        let div = VotingRule::Div.combine(&[a, b], 3);

        // products 3, 4, 3: the ends tie and win over the middle
        assert_eq!(top_k(&mult, 2), vec![0, 2]);
        // reciprocal sums 1.33, 1.0, 1.33
        assert_eq!(top_k(&div, 1), vec![0]);
        assert!(div[1] < div[0]);
    }

    #[test]
    fn test_voting_selector_runs() {
        let data = classification_data(&[
            BuiltinModel::LogisticRegression,
            BuiltinModel::GaussianNaiveBayes,
            BuiltinModel::KnnClassifier,
        ]);
        for selector in [VotingFeatureSelector::mult(3), VotingFeatureSelector::div(3)] {
            let mut ctx = StepContext::new(0, 0);
            let out = selector.run(data.clone(), &mut ctx).unwrap();
            assert_eq!(out.dataset.n_features(), 3);
            let names = out.dataset.feature_names();
            assert!(names.contains(&"x0".to_string()));
            assert!(names.contains(&"x1".to_string()));
        }
    }

    #[test]
    fn test_scored_candidates_are_flagged_stale() {
        let mut data = classification_data(&[BuiltinModel::GaussianNaiveBayes]);
        data.return_val[0].score = Some(0.9);
        data.return_val[0].metric = Some(crate::model::MetricInfo {
            name: "accuracy".into(),
            direction: crate::model::Direction::Maximize,
        });
        let out = VotingFeatureSelector::div(2).run(data, &mut ctx_at("vote")).unwrap();

        assert_eq!(out.extra["vote"]["stale_candidate_scores"], 1);
        assert_eq!(out.return_val[0].score, Some(0.9));
    }

    #[test]
    fn test_zero_k_rejected() {
        assert!(FeatureSelector::new(0).validate().is_err());
        assert!(VotingFeatureSelector::div(0).validate().is_err());
        assert_eq!(VotingFeatureSelector::mult(1).name(), "voting_mult");
    }
}
