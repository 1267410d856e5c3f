//! Gaussian Naive Bayes classifier

use crate::error::{PipelineError, Result};
use crate::hyperparam::Params;
use crate::model::estimator::{param_f64, reject_unknown, Estimator};
use ndarray::{Array1, Array2, ArrayView1};
use std::f64::consts::PI;

#[derive(Debug, Clone)]
struct ClassStats {
    label: i64,
    log_prior: f64,
    means: Vec<f64>,
    variances: Vec<f64>,
}

/// Gaussian Naive Bayes Classifier
#[derive(Debug, Clone)]
pub struct GaussianNaiveBayes {
    /// Fraction of the largest feature variance added to every variance
    pub var_smoothing: f64,
    classes: Vec<ClassStats>,
}

impl Default for GaussianNaiveBayes {
    fn default() -> Self {
        Self::new()
    }
}

impl GaussianNaiveBayes {
    pub fn new() -> Self {
        Self {
            var_smoothing: 1e-9,
            classes: Vec::new(),
        }
    }

    /// Set variance smoothing parameter
    pub fn with_var_smoothing(mut self, smoothing: f64) -> Self {
        self.var_smoothing = smoothing;
        self
    }

    /// Recognised params: `var_smoothing`
    pub fn from_params(params: &Params) -> Result<Self> {
        reject_unknown(params, &["var_smoothing"])?;
        let smoothing = param_f64(params, "var_smoothing", 1e-9)?;
        if smoothing < 0.0 {
            return Err(PipelineError::InvalidParameter {
                name: "var_smoothing".to_string(),
                value: smoothing.to_string(),
                reason: "must be >= 0".to_string(),
            });
        }
        Ok(Self::new().with_var_smoothing(smoothing))
    }

    fn joint_log_likelihood(&self, row: ArrayView1<f64>) -> Vec<f64> {
        self.classes
            .iter()
            .map(|stats| {
                let ll: f64 = row
                    .iter()
                    .zip(stats.means.iter().zip(stats.variances.iter()))
                    .map(|(&x, (&mean, &var))| -0.5 * ((2.0 * PI * var).ln() + (x - mean).powi(2) / var))
                    .sum();
                stats.log_prior + ll
            })
            .collect()
    }

    /// Class probabilities, one row per sample, classes in ascending label order
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_input(x)?;
        let n_classes = self.classes.len();
        let mut probs = Array2::zeros((x.nrows(), n_classes));

        for (i, row) in x.rows().into_iter().enumerate() {
            let jll = self.joint_log_likelihood(row);
            let max = jll.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let total: f64 = jll.iter().map(|v| (v - max).exp()).sum();
            for (j, v) in jll.iter().enumerate() {
                probs[[i, j]] = (v - max).exp() / total;
            }
        }
        Ok(probs)
    }

    fn check_input(&self, x: &Array2<f64>) -> Result<()> {
        let first = self.classes.first().ok_or(PipelineError::ModelNotFitted)?;
        if x.ncols() != first.means.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("{} features", first.means.len()),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(())
    }
}

impl Estimator for GaussianNaiveBayes {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("y length = {}", x.nrows()),
                actual: format!("y length = {}", y.len()),
            });
        }
        if x.nrows() == 0 {
            return Err(PipelineError::Data("cannot fit on zero samples".to_string()));
        }

        let n_samples = x.nrows() as f64;
        let n_features = x.ncols();
        let max_var = x
            .columns()
            .into_iter()
            .map(|c| {
                let mean = c.sum() / n_samples;
                c.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n_samples
            })
            .fold(0.0, f64::max);
        let epsilon = (self.var_smoothing * max_var).max(1e-12);

        let mut labels: Vec<i64> = y.iter().map(|v| v.round() as i64).collect();
        labels.sort_unstable();
        labels.dedup();

        self.classes = labels
            .into_iter()
            .map(|label| {
                // Welford's single pass mean and variance
                let mut means = vec![0.0; n_features];
                let mut m2 = vec![0.0; n_features];
                let mut count = 0usize;
                for (row, _) in x
                    .rows()
                    .into_iter()
                    .zip(y.iter())
                    .filter(|(_, &v)| v.round() as i64 == label)
                {
                    count += 1;
                    for (j, &val) in row.iter().enumerate() {
                        let delta = val - means[j];
                        means[j] += delta / count as f64;
                        m2[j] += delta * (val - means[j]);
                    }
                }
                ClassStats {
                    label,
                    log_prior: (count as f64 / n_samples).ln(),
                    means,
                    variances: m2.iter().map(|&v| v / count as f64 + epsilon).collect(),
                }
            })
            .collect();

        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.check_input(x)?;
        Ok(x.rows()
            .into_iter()
            .map(|row| {
                let jll = self.joint_log_likelihood(row);
                let best = jll
                    .iter()
                    .enumerate()
                    .fold((0, f64::NEG_INFINITY), |acc, (i, &v)| if v > acc.1 { (i, v) } else { acc });
                self.classes[best.0].label as f64
            })
            .collect())
    }

    /// Probability of the largest label
    fn predict_scores(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let probs = self.predict_proba(x)?;
        let last = probs.ncols().saturating_sub(1);
        Ok(probs.column(last).to_owned())
    }
}
