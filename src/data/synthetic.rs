//! Seeded synthetic datasets for demos, tests and benchmarks

use super::Dataset;
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;

fn check_shape(n_samples: usize, n_features: usize, n_informative: usize) -> Result<()> {
    if n_samples < 2 {
        return Err(PipelineError::InvalidParameter {
            name: "n_samples".to_string(),
            value: n_samples.to_string(),
            reason: "must be at least 2".to_string(),
        });
    }
    if n_informative == 0 || n_informative > n_features {
        return Err(PipelineError::InvalidParameter {
            name: "n_informative".to_string(),
            value: n_informative.to_string(),
            reason: format!("must be in 1..={}", n_features),
        });
    }
    Ok(())
}

/// Binary classification problem
///
/// The first `n_informative` columns are shifted by `±1.0` depending on the
/// class, the rest are pure noise. Classes are balanced and interleaved, and
/// `flip_y` of the labels are flipped at random.
pub fn make_classification(
    n_samples: usize,
    n_features: usize,
    n_informative: usize,
    flip_y: f64,
    seed: u64,
) -> Result<Dataset> {
    check_shape(n_samples, n_features, n_informative)?;
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let mut labels: Vec<f64> = (0..n_samples).map(|i| (i % 2) as f64).collect();
    labels.shuffle(&mut rng);

    let mut x = Array2::zeros((n_samples, n_features));
    for (i, &label) in labels.iter().enumerate() {
        let shift = if label > 0.5 { 1.0 } else { -1.0 };
        for j in 0..n_features {
            let noise: f64 = rng.sample(StandardNormal);
            x[[i, j]] = if j < n_informative { noise + shift } else { noise };
        }
    }

    let flip = flip_y.clamp(0.0, 1.0);
    let y: Array1<f64> = labels
        .into_iter()
        .map(|label| {
            if rng.gen::<f64>() < flip {
                1.0 - label
            } else {
                label
            }
        })
        .collect();

    Dataset::new(x, y)
}

/// Linear regression problem over the first `n_informative` columns
pub fn make_regression(
    n_samples: usize,
    n_features: usize,
    n_informative: usize,
    noise: f64,
    seed: u64,
) -> Result<Dataset> {
    check_shape(n_samples, n_features, n_informative)?;
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let coefficients: Vec<f64> = (0..n_informative)
        .map(|_| rng.gen_range(1.0..100.0))
        .collect();

    let mut x = Array2::zeros((n_samples, n_features));
    let mut y = Array1::zeros(n_samples);
    for i in 0..n_samples {
        let mut value = 0.0;
        for j in 0..n_features {
            let v: f64 = rng.sample(StandardNormal);
            x[[i, j]] = v;
            if j < n_informative {
                value += coefficients[j] * v;
            }
        }
        y[i] = value + noise * rng.sample::<f64, _>(StandardNormal);
    }

    Dataset::new(x, y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::TargetKind;

    #[test]
    fn test_classification_shape_and_labels() {
        let ds = make_classification(100, 5, 2, 0.0, 7).unwrap();
        assert_eq!(ds.n_samples(), 100);
        assert_eq!(ds.n_features(), 5);
        assert_eq!(ds.target_kind(), TargetKind::Classification);

        let ones = ds.target().iter().filter(|&&v| v == 1.0).count();
        assert_eq!(ones, 50);
    }

    #[test]
    fn test_same_seed_same_data() {
        let a = make_regression(30, 4, 2, 0.1, 11).unwrap();
        let b = make_regression(30, 4, 2, 0.1, 11).unwrap();
        let c = make_regression(30, 4, 2, 0.1, 12).unwrap();
        assert_eq!(a.data(), b.data());
        assert_ne!(a.data(), c.data());
        assert_eq!(a.target_kind(), TargetKind::Regression);
    }

    #[test]
    fn test_noise_columns_are_standard_normal() {
        let ds = make_classification(4000, 3, 1, 0.0, 5).unwrap();
        let noise = ds.data().column(2).to_owned();
        let mean = noise.mean().unwrap();
        let std = noise.mapv(|v| (v - mean).powi(2)).mean().unwrap().sqrt();
        assert!(mean.abs() < 0.1, "mean {}", mean);
        assert!((std - 1.0).abs() < 0.1, "std {}", std);
    }

    #[test]
    fn test_invalid_informative_count() {
        assert!(make_classification(10, 3, 4, 0.0, 1).is_err());
        assert!(make_regression(10, 3, 0, 0.0, 1).is_err());
    }
}
