//! Train/test splitting

use crate::error::{PipelineError, Result};
use ndarray::Array1;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Cross-validation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SplitStrategy {
    KFold { n_splits: usize, shuffle: bool },
    /// K-fold keeping the class distribution in every fold
    StratifiedKFold { n_splits: usize, shuffle: bool },
}

impl Default for SplitStrategy {
    fn default() -> Self {
        SplitStrategy::KFold { n_splits: 5, shuffle: true }
    }
}

/// A single train/test split
#[derive(Debug, Clone)]
pub struct Split {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Seeded fold generator
#[derive(Debug, Clone)]
pub struct Splitter {
    strategy: SplitStrategy,
    seed: u64,
}

impl Splitter {
    pub fn new(strategy: SplitStrategy, seed: u64) -> Self {
        Self { strategy, seed }
    }

    /// Generate train/test splits
    pub fn split(&self, n_samples: usize, y: &Array1<f64>) -> Result<Vec<Split>> {
        match self.strategy {
            SplitStrategy::KFold { n_splits, shuffle } => self.k_fold(n_samples, n_splits, shuffle),
            SplitStrategy::StratifiedKFold { n_splits, shuffle } => {
                self.stratified_k_fold(y, n_splits, shuffle)
            }
        }
    }

    fn check(n_samples: usize, n_splits: usize) -> Result<()> {
        if n_splits < 2 {
            return Err(PipelineError::Config("n_splits must be at least 2".to_string()));
        }
        if n_samples < n_splits {
            return Err(PipelineError::Data(format!(
                "n_samples ({}) must be >= n_splits ({})",
                n_samples, n_splits
            )));
        }
        Ok(())
    }

    fn k_fold(&self, n_samples: usize, n_splits: usize, shuffle: bool) -> Result<Vec<Split>> {
        Self::check(n_samples, n_splits)?;

        let mut indices: Vec<usize> = (0..n_samples).collect();
        if shuffle {
            indices.shuffle(&mut ChaCha8Rng::seed_from_u64(self.seed));
        }

        let base = n_samples / n_splits;
        let remainder = n_samples % n_splits;
        let mut splits = Vec::with_capacity(n_splits);
        let mut current = 0;

        for fold_idx in 0..n_splits {
            let fold_size = if fold_idx < remainder { base + 1 } else { base };
            let test_indices = indices[current..current + fold_size].to_vec();
            let train_indices = indices[..current]
                .iter()
                .chain(indices[current + fold_size..].iter())
                .copied()
                .collect();

            splits.push(Split {
                train_indices,
                test_indices,
                fold_idx,
            });
            current += fold_size;
        }

        Ok(splits)
    }

    fn stratified_k_fold(&self, y: &Array1<f64>, n_splits: usize, shuffle: bool) -> Result<Vec<Split>> {
        Self::check(y.len(), n_splits)?;

        let mut class_indices: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (idx, &val) in y.iter().enumerate() {
            class_indices.entry(val.round() as i64).or_default().push(idx);
        }

        if shuffle {
            let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
            for indices in class_indices.values_mut() {
                indices.shuffle(&mut rng);
            }
        }

        // Deal samples round-robin, continuing across classes
        let mut folds: Vec<Vec<usize>> = vec![Vec::new(); n_splits];
        let mut next = 0;
        for indices in class_indices.values() {
            for &idx in indices {
                folds[next % n_splits].push(idx);
                next += 1;
            }
        }

        Ok((0..n_splits)
            .map(|fold_idx| Split {
                test_indices: folds[fold_idx].clone(),
                train_indices: folds
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != fold_idx)
                    .flat_map(|(_, f)| f.iter().copied())
                    .collect(),
                fold_idx,
            })
            .collect())
    }
}

/// Single shuffled holdout split
///
/// The test part holds `round(n * test_size)` rows, at least one, and at
/// least one row is left for training.
pub fn train_test_split(n_samples: usize, test_size: f64, seed: u64) -> Result<Split> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(PipelineError::Config(format!(
            "test_size must be in (0, 1), got {}",
            test_size
        )));
    }
    if n_samples < 2 {
        return Err(PipelineError::Data(format!(
            "need at least 2 samples for a holdout split, got {}",
            n_samples
        )));
    }

    let n_test = ((n_samples as f64 * test_size).round() as usize).clamp(1, n_samples - 1);
    let mut indices: Vec<usize> = (0..n_samples).collect();
    indices.shuffle(&mut ChaCha8Rng::seed_from_u64(seed));

    let train_indices = indices.split_off(n_test);
    Ok(Split {
        train_indices,
        test_indices: indices,
        fold_idx: 0,
    })
}
