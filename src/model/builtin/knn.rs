//! K-Nearest Neighbors classifier and regressor

use crate::error::{PipelineError, Result};
use crate::hyperparam::Params;
use crate::model::estimator::{param_str, param_usize, reject_unknown, Estimator};
use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Distance metric for KNN
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum DistanceMetric {
    #[default]
    Euclidean,
    Manhattan,
}

/// Weighting scheme for neighbors
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum WeightScheme {
    #[default]
    Uniform,
    /// Closer neighbors have more weight (inverse distance)
    Distance,
}

/// KNN configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnnConfig {
    pub n_neighbors: usize,
    pub metric: DistanceMetric,
    pub weights: WeightScheme,
}

impl Default for KnnConfig {
    fn default() -> Self {
        Self {
            n_neighbors: 5,
            metric: DistanceMetric::Euclidean,
            weights: WeightScheme::Uniform,
        }
    }
}

impl KnnConfig {
    /// Recognised params: `n_neighbors`, `metric` ("euclidean" | "manhattan"),
    /// `weights` ("uniform" | "distance")
    pub fn from_params(params: &Params) -> Result<Self> {
        reject_unknown(params, &["n_neighbors", "metric", "weights"])?;
        let metric = match param_str(params, "metric", "euclidean")? {
            "euclidean" => DistanceMetric::Euclidean,
            "manhattan" => DistanceMetric::Manhattan,
            other => return Err(bad_choice("metric", other)),
        };
        let weights = match param_str(params, "weights", "uniform")? {
            "uniform" => WeightScheme::Uniform,
            "distance" => WeightScheme::Distance,
            other => return Err(bad_choice("weights", other)),
        };
        Ok(Self {
            n_neighbors: param_usize(params, "n_neighbors", 5)?,
            metric,
            weights,
        })
    }
}

fn bad_choice(name: &str, value: &str) -> PipelineError {
    PipelineError::InvalidParameter {
        name: name.to_string(),
        value: value.to_string(),
        reason: "unsupported option".to_string(),
    }
}

#[derive(Debug, Clone)]
struct Fitted {
    x: Array2<f64>,
    y: Array1<f64>,
}

fn store(x: &Array2<f64>, y: &Array1<f64>, k: usize) -> Result<Fitted> {
    if x.nrows() != y.len() {
        return Err(PipelineError::ShapeError {
            expected: format!("{} targets", x.nrows()),
            actual: format!("{} targets", y.len()),
        });
    }
    if x.nrows() == 0 {
        return Err(PipelineError::Data("cannot fit on zero samples".to_string()));
    }
    if k == 0 {
        return Err(PipelineError::InvalidParameter {
            name: "n_neighbors".to_string(),
            value: "0".to_string(),
            reason: "must be positive".to_string(),
        });
    }
    Ok(Fitted {
        x: x.clone(),
        y: y.clone(),
    })
}

/// K-Nearest Neighbors Classifier
#[derive(Debug, Clone)]
pub struct KnnClassifier {
    config: KnnConfig,
    fitted: Option<Fitted>,
    classes: Vec<i64>,
}

impl KnnClassifier {
    pub fn new(config: KnnConfig) -> Self {
        Self {
            config,
            fitted: None,
            classes: Vec::new(),
        }
    }

    /// Create with default config and specified k
    pub fn with_k(k: usize) -> Self {
        Self::new(KnnConfig {
            n_neighbors: k,
            ..Default::default()
        })
    }

    /// Per-class probabilities in `classes` order
    fn class_probs(&self, fitted: &Fitted, x: &Array2<f64>) -> Vec<Vec<f64>> {
        let config = &self.config;
        (0..x.nrows())
            .into_par_iter()
            .map(|i| {
                let neighbors = find_k_nearest(x.row(i), fitted, config.n_neighbors, config.metric);
                let mut counts = vec![0.0; self.classes.len()];
                let mut total = 0.0;
                for &(dist, label) in &neighbors {
                    let w = weight(dist, config.weights);
                    if let Some(idx) = self.classes.iter().position(|&c| c == label.round() as i64) {
                        counts[idx] += w;
                        total += w;
                    }
                }
                if total > 0.0 {
                    counts.iter_mut().for_each(|c| *c /= total);
                }
                counts
            })
            .collect()
    }
}

impl Estimator for KnnClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.fitted = Some(store(x, y, self.config.n_neighbors)?);
        let mut classes: Vec<i64> = y.iter().map(|&v| v.round() as i64).collect();
        classes.sort_unstable();
        classes.dedup();
        self.classes = classes;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let fitted = self.fitted.as_ref().ok_or(PipelineError::ModelNotFitted)?;
        let probs = self.class_probs(fitted, x);
        Ok(probs
            .iter()
            .map(|p| {
                // First maximum wins, so ties go to the smaller label
                let best = p
                    .iter()
                    .enumerate()
                    .fold((0, f64::MIN), |acc, (i, &v)| if v > acc.1 { (i, v) } else { acc });
                self.classes.get(best.0).copied().unwrap_or(0) as f64
            })
            .collect())
    }

    fn predict_scores(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let fitted = self.fitted.as_ref().ok_or(PipelineError::ModelNotFitted)?;
        let last = self.classes.len().saturating_sub(1);
        Ok(self
            .class_probs(fitted, x)
            .iter()
            .map(|p| p.get(last).copied().unwrap_or(0.0))
            .collect())
    }
}

/// K-Nearest Neighbors Regressor
#[derive(Debug, Clone)]
pub struct KnnRegressor {
    config: KnnConfig,
    fitted: Option<Fitted>,
}

impl KnnRegressor {
    pub fn new(config: KnnConfig) -> Self {
        Self { config, fitted: None }
    }

    pub fn with_k(k: usize) -> Self {
        Self::new(KnnConfig {
            n_neighbors: k,
            ..Default::default()
        })
    }
}

impl Estimator for KnnRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.fitted = Some(store(x, y, self.config.n_neighbors)?);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let fitted = self.fitted.as_ref().ok_or(PipelineError::ModelNotFitted)?;
        let config = &self.config;
        let predictions: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| {
                let neighbors = find_k_nearest(x.row(i), fitted, config.n_neighbors, config.metric);
                let (sum, total) = neighbors.iter().fold((0.0, 0.0), |(s, t), &(dist, y)| {
                    let w = weight(dist, config.weights);
                    (s + w * y, t + w)
                });
                if total > 0.0 {
                    sum / total
                } else {
                    0.0
                }
            })
            .collect();
        Ok(Array1::from_vec(predictions))
    }
}

fn weight(dist: f64, scheme: WeightScheme) -> f64 {
    match scheme {
        WeightScheme::Uniform => 1.0,
        WeightScheme::Distance => 1.0 / (dist + 1e-10),
    }
}

/// Max-heap entry keeping the k smallest distances
#[derive(PartialEq)]
struct DistLabel(f64, f64);

impl Eq for DistLabel {}

impl PartialOrd for DistLabel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DistLabel {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.partial_cmp(&other.0).unwrap_or(Ordering::Equal)
    }
}

fn find_k_nearest(
    point: ArrayView1<f64>,
    fitted: &Fitted,
    k: usize,
    metric: DistanceMetric,
) -> Vec<(f64, f64)> {
    let mut heap = BinaryHeap::with_capacity(k + 1);

    for (row, &label) in fitted.x.rows().into_iter().zip(fitted.y.iter()) {
        let dist = distance(point, row, metric);
        if heap.len() < k {
            heap.push(DistLabel(dist, label));
        } else if let Some(top) = heap.peek() {
            if dist < top.0 {
                heap.pop();
                heap.push(DistLabel(dist, label));
            }
        }
    }

    heap.into_iter().map(|dl| (dl.0, dl.1)).collect()
}

fn distance(a: ArrayView1<f64>, b: ArrayView1<f64>, metric: DistanceMetric) -> f64 {
    let pairs = a.iter().zip(b.iter());
    match metric {
        DistanceMetric::Euclidean => pairs.map(|(x, y)| (x - y) * (x - y)).sum::<f64>().sqrt(),
        DistanceMetric::Manhattan => pairs.map(|(x, y)| (x - y).abs()).sum(),
    }
}
