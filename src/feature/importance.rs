//! Per-column importance scores

use crate::data::Dataset;
use crate::error::{PipelineError, Result};
use crate::pipeline::CandidateResult;
use ndarray::{Array1, ArrayView1};
use rayon::prelude::*;
use std::cmp::Ordering;

/// Pearson correlation; zero when either side is constant
pub fn pearson(x: ArrayView1<f64>, y: ArrayView1<f64>) -> f64 {
    let n = x.len() as f64;
    if n == 0.0 {
        return 0.0;
    }
    let x_mean = x.sum() / n;
    let y_mean = y.sum() / n;

    let mut cov = 0.0;
    let mut x_var = 0.0;
    let mut y_var = 0.0;
    for (&xi, &yi) in x.iter().zip(y.iter()) {
        let dx = xi - x_mean;
        let dy = yi - y_mean;
        cov += dx * dy;
        x_var += dx * dx;
        y_var += dy * dy;
    }

    if x_var > 0.0 && y_var > 0.0 {
        cov / (x_var.sqrt() * y_var.sqrt())
    } else {
        0.0
    }
}

/// |corr(column, reference)| for every column
pub fn abs_correlations(dataset: &Dataset, reference: &Array1<f64>) -> Array1<f64> {
    let data = dataset.data();
    let scores: Vec<f64> = (0..data.ncols())
        .into_par_iter()
        .map(|j| pearson(data.column(j), reference.view()).abs())
        .collect();
    Array1::from_vec(scores)
}

/// Scale to unit sum; all-zero input stays zero
pub fn normalize(scores: Array1<f64>) -> Array1<f64> {
    let cleaned = scores.mapv(|v| if v.is_finite() { v.abs() } else { 0.0 });
    let total = cleaned.sum();
    if total > 0.0 {
        cleaned / total
    } else {
        cleaned
    }
}

/// Fit the candidate's model on the whole dataset and score the columns
///
/// Uses the estimator's own importances when it has them, otherwise the
/// absolute correlation of each column with the fitted model's predictions.
pub fn model_importance(candidate: &CandidateResult, dataset: &Dataset) -> Result<Array1<f64>> {
    let mut estimator = candidate.model.construct(&candidate.params)?;
    estimator.fit(dataset.data(), dataset.target())?;

    let raw = match estimator.feature_importances() {
        Some(importances) => importances,
        None => abs_correlations(dataset, &estimator.predict_scores(dataset.data())?),
    };
    if raw.len() != dataset.n_features() {
        return Err(PipelineError::ShapeError {
            expected: format!("{} importances", dataset.n_features()),
            actual: format!("{} importances", raw.len()),
        });
    }
    Ok(normalize(raw))
}

// Column indices from best to worst score; stable, so ties keep index order
fn order_by_score(scores: &Array1<f64>) -> Vec<usize> {
    let key = |i: usize| if scores[i].is_finite() { scores[i] } else { f64::NEG_INFINITY };
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| key(b).partial_cmp(&key(a)).unwrap_or(Ordering::Equal));
    order
}

/// Indices of the `k` best scores, returned in ascending column order
///
/// Ties go to the lower index; non-finite scores rank last.
pub fn top_k(scores: &Array1<f64>, k: usize) -> Vec<usize> {
    let mut order = order_by_score(scores);
    order.truncate(k);
    order.sort_unstable();
    order
}

/// Rank of each column, 1 for the highest score, ties by index
pub fn ranks(scores: &Array1<f64>) -> Vec<usize> {
    let mut ranks = vec![0; scores.len()];
    for (position, column) in order_by_score(scores).into_iter().enumerate() {
        ranks[column] = position + 1;
    }
    ranks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hyperparam::ParamSpace;
    use crate::model::BuiltinModel;
    use ndarray::array;
    use std::sync::Arc;

    #[test]
    fn test_pearson() {
        let x = array![1.0, 2.0, 3.0, 4.0];
        assert!((pearson(x.view(), (2.0 * &x).view()) - 1.0).abs() < 1e-12);
        assert!((pearson(x.view(), (-&x).view()) + 1.0).abs() < 1e-12);
        assert_eq!(pearson(x.view(), array![1.0, 1.0, 1.0, 1.0].view()), 0.0);
    }

    #[test]
    fn test_top_k_ties_and_order() {
        let scores = array![0.1, 0.5, 0.5, f64::NAN, 0.3];
        assert_eq!(top_k(&scores, 2), vec![1, 2]);
        assert_eq!(top_k(&scores, 3), vec![1, 2, 4]);
        assert_eq!(top_k(&scores, 10).len(), 5);
    }

    #[test]
    fn test_ranks() {
        let scores = array![0.1, 0.5, 0.5, 0.3];
        assert_eq!(ranks(&scores), vec![4, 1, 2, 3]);
    }

    #[test]
    fn test_normalize() {
        let n = normalize(array![1.0, -3.0, f64::INFINITY]);
        assert_eq!(n, array![0.25, 0.75, 0.0]);
        assert_eq!(normalize(array![0.0, 0.0]), array![0.0, 0.0]);
    }

    #[test]
    fn test_model_importance_prefers_signal() {
        let dataset = crate::data::make_regression(60, 4, 1, 0.0, 3).unwrap();
        for model in [BuiltinModel::Ridge, BuiltinModel::KnnRegressor] {
            let candidate = CandidateResult::new(Arc::new(model), ParamSpace::new());
            let scores = model_importance(&candidate, &dataset).unwrap();
            assert!((scores.sum() - 1.0).abs() < 1e-9);
            assert_eq!(top_k(&scores, 1), vec![0]);
        }
    }
}
