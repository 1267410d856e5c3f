//! Shared candidate scoring used by the evaluation steps

use super::estimator::ModelClass;
use super::metrics::Metric;
use super::split::Split;
use crate::data::Dataset;
use crate::error::{PipelineError, Result};
use crate::hyperparam::Params;
use crate::pipeline::{derive_seed, CandidateResult};
use rayon::prelude::*;
use tracing::warn;

/// Fit on the train rows of `split` and score on its test rows
pub(crate) fn score_split(
    model: &dyn ModelClass,
    params: &Params,
    dataset: &Dataset,
    split: &Split,
    metric: &Metric,
) -> Result<f64> {
    let train = dataset.subset_rows(&split.train_indices)?;
    let test = dataset.subset_rows(&split.test_indices)?;

    let mut estimator = model.construct(params)?;
    estimator.fit(train.data(), train.target())?;
    let predictions = if metric.needs_scores() {
        estimator.predict_scores(test.data())?
    } else {
        estimator.predict(test.data())?
    };
    metric.evaluate(test.target(), &predictions)
}

/// Run `evaluate` on every candidate that has not failed yet
///
/// Candidate `i` gets seed `derive_seed(step_seed, i)`, so the outcome does
/// not depend on `parallel`. Errors mark the candidate failed instead of
/// aborting the step.
pub(crate) fn evaluate_candidates<F>(
    candidates: Vec<CandidateResult>,
    step_seed: u64,
    parallel: bool,
    evaluate: F,
) -> Vec<CandidateResult>
where
    F: Fn(&mut CandidateResult, u64) -> Result<()> + Send + Sync,
{
    let work = |(index, mut candidate): (usize, CandidateResult)| {
        if candidate.is_failed() {
            return candidate;
        }
        if let Err(err) = evaluate(&mut candidate, derive_seed(step_seed, index as u64)) {
            let err = match err {
                e @ PipelineError::CandidateEvaluation { .. }
                | e @ PipelineError::ConsecutiveTrialFailures { .. } => e,
                other => PipelineError::CandidateEvaluation {
                    model: candidate.model_name().to_string(),
                    reason: other.to_string(),
                },
            };
            warn!(candidate = %candidate.model_name(), error = %err, "candidate failed");
            candidate.mark_failed(err);
        }
        candidate
    };

    if parallel {
        candidates.into_par_iter().enumerate().map(work).collect()
    } else {
        candidates.into_iter().enumerate().map(work).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hyperparam::ParamSpace;
    use crate::model::{BuiltinModel, FnModel};
    use std::sync::Arc;

    fn candidates() -> Vec<CandidateResult> {
        let broken = FnModel::new("broken", |_| {
            Err(PipelineError::Computation("cannot build".into()))
        });
        vec![
            CandidateResult::new(Arc::new(BuiltinModel::Ridge), ParamSpace::new()),
            CandidateResult::new(Arc::new(broken), ParamSpace::new()),
        ]
    }

    #[test]
    fn test_errors_become_failed_candidates() {
        let out = evaluate_candidates(candidates(), 1, true, |c, _| {
            c.model.construct(&c.params)?;
            c.score = Some(1.0);
            Ok(())
        });

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].score, Some(1.0));
        assert!(out[1].is_failed());
        assert!(out[1].error.as_ref().unwrap().contains("cannot build"));
    }

    #[test]
    fn test_seeds_independent_of_parallelism() {
        let record = |c: &mut CandidateResult, seed: u64| -> Result<()> {
            c.score = Some(seed as f64);
            Ok(())
        };
        let a = evaluate_candidates(candidates(), 5, true, record);
        let b = evaluate_candidates(candidates(), 5, false, record);
        assert_eq!(a[0].score, b[0].score);
        assert_eq!(a[1].score, b[1].score);
    }

    #[test]
    fn test_failed_candidates_are_skipped() {
        let mut input = candidates();
        input[0].mark_failed("earlier failure");
        let out = evaluate_candidates(input, 0, false, |c, _| {
            c.score = Some(2.0);
            Ok(())
        });
        assert_eq!(out[0].score, None);
        assert_eq!(out[1].score, Some(2.0));
    }
}
