//! Scoring metrics with a declared optimisation direction

use crate::error::{PipelineError, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Whether larger or smaller metric values are better
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Maximize,
    Minimize,
}

impl Direction {
    /// Whether `a` is strictly better than `b`
    pub fn is_better(&self, a: f64, b: f64) -> bool {
        match self {
            Direction::Maximize => a > b,
            Direction::Minimize => a < b,
        }
    }

    /// Loss for a minimising search
    pub fn to_loss(&self, score: f64) -> f64 {
        match self {
            Direction::Maximize => -score,
            Direction::Minimize => score,
        }
    }

    /// Inverse of [`Direction::to_loss`]
    pub fn from_loss(&self, loss: f64) -> f64 {
        match self {
            Direction::Maximize => -loss,
            Direction::Minimize => loss,
        }
    }
}

/// Name and direction of the metric a candidate was scored with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricInfo {
    pub name: String,
    pub direction: Direction,
}

type MetricFn = dyn Fn(&Array1<f64>, &Array1<f64>) -> f64 + Send + Sync;

/// User supplied metric
#[derive(Clone)]
pub struct CustomMetric {
    name: String,
    direction: Direction,
    needs_scores: bool,
    func: Arc<MetricFn>,
}

impl fmt::Debug for CustomMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomMetric")
            .field("name", &self.name)
            .field("direction", &self.direction)
            .field("needs_scores", &self.needs_scores)
            .finish()
    }
}

/// Evaluation metric
#[derive(Debug, Clone)]
pub enum Metric {
    Accuracy,
    RocAuc,
    F1,
    MeanSquaredError,
    MeanAbsoluteError,
    R2,
    Custom(CustomMetric),
}

impl Metric {
    /// Metric computed on hard predictions
    pub fn custom<F>(name: impl Into<String>, direction: Direction, func: F) -> Self
    where
        F: Fn(&Array1<f64>, &Array1<f64>) -> f64 + Send + Sync + 'static,
    {
        Metric::Custom(CustomMetric {
            name: name.into(),
            direction,
            needs_scores: false,
            func: Arc::new(func),
        })
    }

    /// Metric computed on continuous scores
    pub fn custom_on_scores<F>(name: impl Into<String>, direction: Direction, func: F) -> Self
    where
        F: Fn(&Array1<f64>, &Array1<f64>) -> f64 + Send + Sync + 'static,
    {
        Metric::Custom(CustomMetric {
            name: name.into(),
            direction,
            needs_scores: true,
            func: Arc::new(func),
        })
    }

    pub fn name(&self) -> &str {
        match self {
            Metric::Accuracy => "accuracy",
            Metric::RocAuc => "roc_auc",
            Metric::F1 => "f1",
            Metric::MeanSquaredError => "mean_squared_error",
            Metric::MeanAbsoluteError => "mean_absolute_error",
            Metric::R2 => "r2",
            Metric::Custom(c) => &c.name,
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            Metric::Accuracy | Metric::RocAuc | Metric::F1 | Metric::R2 => Direction::Maximize,
            Metric::MeanSquaredError | Metric::MeanAbsoluteError => Direction::Minimize,
            Metric::Custom(c) => c.direction,
        }
    }

    /// Whether the metric wants `Estimator::predict_scores` output
    pub fn needs_scores(&self) -> bool {
        match self {
            Metric::RocAuc => true,
            Metric::Custom(c) => c.needs_scores,
            _ => false,
        }
    }

    pub fn info(&self) -> MetricInfo {
        MetricInfo {
            name: self.name().to_string(),
            direction: self.direction(),
        }
    }

    /// Score predictions against the truth
    pub fn evaluate(&self, y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
        if y_true.len() != y_pred.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("{} predictions", y_true.len()),
                actual: format!("{} predictions", y_pred.len()),
            });
        }
        if y_true.is_empty() {
            return Err(PipelineError::Data("cannot score an empty split".to_string()));
        }

        let n = y_true.len() as f64;
        let value = match self {
            Metric::Accuracy => {
                let correct = y_true
                    .iter()
                    .zip(y_pred.iter())
                    .filter(|(t, p)| (*t - *p).abs() < 0.5)
                    .count();
                correct as f64 / n
            }
            Metric::RocAuc => roc_auc(y_true, y_pred)?,
            Metric::F1 => f1(y_true, y_pred),
            Metric::MeanSquaredError => {
                y_true.iter().zip(y_pred.iter()).map(|(t, p)| (t - p).powi(2)).sum::<f64>() / n
            }
            Metric::MeanAbsoluteError => {
                y_true.iter().zip(y_pred.iter()).map(|(t, p)| (t - p).abs()).sum::<f64>() / n
            }
            Metric::R2 => {
                let mean = y_true.sum() / n;
                let ss_tot: f64 = y_true.iter().map(|y| (y - mean).powi(2)).sum();
                let ss_res: f64 = y_true.iter().zip(y_pred.iter()).map(|(t, p)| (t - p).powi(2)).sum();
                if ss_tot > 0.0 {
                    1.0 - ss_res / ss_tot
                } else {
                    0.0
                }
            }
            Metric::Custom(c) => (c.func)(y_true, y_pred),
        };

        if value.is_finite() {
            Ok(value)
        } else {
            Err(PipelineError::Computation(format!("{} is not finite", self.name())))
        }
    }
}

impl FromStr for Metric {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "accuracy" => Ok(Metric::Accuracy),
            "roc_auc" | "auc" => Ok(Metric::RocAuc),
            "f1" => Ok(Metric::F1),
            "mse" | "mean_squared_error" => Ok(Metric::MeanSquaredError),
            "mae" | "mean_absolute_error" => Ok(Metric::MeanAbsoluteError),
            "r2" => Ok(Metric::R2),
            other => Err(PipelineError::Config(format!("unknown metric '{}'", other))),
        }
    }
}

/// Binary F1 with labels > 0.5 treated as positive
fn f1(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    let (mut tp, mut fp, mut fn_) = (0usize, 0usize, 0usize);
    for (t, p) in y_true.iter().zip(y_pred.iter()) {
        match (*t > 0.5, *p > 0.5) {
            (true, true) => tp += 1,
            (false, true) => fp += 1,
            (true, false) => fn_ += 1,
            (false, false) => {}
        }
    }
    if tp == 0 {
        return 0.0;
    }
    let precision = tp as f64 / (tp + fp) as f64;
    let recall = tp as f64 / (tp + fn_) as f64;
    2.0 * precision * recall / (precision + recall)
}

/// Rank-based (Mann-Whitney) ROC AUC with averaged ranks for ties
fn roc_auc(y_true: &Array1<f64>, scores: &Array1<f64>) -> Result<f64> {
    let n_pos = y_true.iter().filter(|&&t| t > 0.5).count();
    let n_neg = y_true.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return Err(PipelineError::Data(
            "roc_auc needs both classes in y_true".to_string(),
        ));
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].partial_cmp(&scores[b]).unwrap_or(std::cmp::Ordering::Equal));

    let mut ranks = vec![0.0; scores.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = avg_rank;
        }
        i = j + 1;
    }

    let pos_rank_sum: f64 = y_true
        .iter()
        .zip(ranks.iter())
        .filter(|(t, _)| **t > 0.5)
        .map(|(_, r)| r)
        .sum();
    let n_pos = n_pos as f64;
    Ok((pos_rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_accuracy() {
        let y_true = array![1.0, 0.0, 1.0, 1.0];
        let y_pred = array![1.0, 0.0, 0.0, 1.0];
        assert_eq!(Metric::Accuracy.evaluate(&y_true, &y_pred).unwrap(), 0.75);
    }

    #[test]
    fn test_roc_auc_perfect_and_ties() {
        let y_true = array![0.0, 0.0, 1.0, 1.0];
        assert_eq!(Metric::RocAuc.evaluate(&y_true, &array![0.1, 0.2, 0.8, 0.9]).unwrap(), 1.0);
        assert_eq!(Metric::RocAuc.evaluate(&y_true, &array![0.5, 0.5, 0.5, 0.5]).unwrap(), 0.5);
        assert!(Metric::RocAuc.evaluate(&array![1.0, 1.0], &array![0.1, 0.2]).is_err());
    }

    #[test]
    fn test_regression_metrics() {
        let y_true = array![1.0, 2.0, 3.0];
        let y_pred = array![1.0, 2.0, 5.0];
        assert!((Metric::MeanSquaredError.evaluate(&y_true, &y_pred).unwrap() - 4.0 / 3.0).abs() < 1e-12);
        assert!((Metric::MeanAbsoluteError.evaluate(&y_true, &y_pred).unwrap() - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(Metric::R2.evaluate(&y_true, &y_true).unwrap(), 1.0);
    }

    #[test]
    fn test_declared_directions() {
        assert_eq!(Metric::Accuracy.direction(), Direction::Maximize);
        assert_eq!(Metric::MeanAbsoluteError.direction(), Direction::Minimize);
        assert!(Metric::RocAuc.needs_scores());
        assert_eq!(Direction::Maximize.to_loss(0.8), -0.8);
        assert_eq!(Direction::Minimize.from_loss(0.3), 0.3);
    }

    #[test]
    fn test_from_str() {
        assert!(matches!("accuracy".parse::<Metric>().unwrap(), Metric::Accuracy));
        assert!(matches!("MSE".parse::<Metric>().unwrap(), Metric::MeanSquaredError));
        assert!("bogus".parse::<Metric>().is_err());
    }

    #[test]
    fn test_custom_metric() {
        let max_err = Metric::custom("max_error", Direction::Minimize, |t, p| {
            t.iter().zip(p.iter()).map(|(a, b)| (a - b).abs()).fold(0.0, f64::max)
        });
        assert_eq!(max_err.evaluate(&array![1.0, 2.0], &array![1.5, 4.0]).unwrap(), 2.0);
        assert_eq!(max_err.name(), "max_error");
        assert!(!max_err.needs_scores());
    }
}
