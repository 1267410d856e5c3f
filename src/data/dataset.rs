//! Feature matrix + target container with column provenance

use crate::error::{PipelineError, Result};
use ndarray::{concatenate, Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a column came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FeatureOrigin {
    /// Column supplied by the caller at the given input position
    Original { index: usize },
    /// Column computed from two other columns
    Derived {
        op: String,
        left: String,
        right: String,
    },
}

/// A named column and its provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureColumn {
    pub name: String,
    pub origin: FeatureOrigin,
}

impl FeatureColumn {
    /// Column supplied by the caller
    pub fn original(index: usize, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            origin: FeatureOrigin::Original { index },
        }
    }

    /// Column derived as `left op right`
    pub fn derived(op: impl Into<String>, left: &FeatureColumn, right: &FeatureColumn) -> Self {
        let op = op.into();
        Self {
            name: format!("({} {} {})", left.name, op, right.name),
            origin: FeatureOrigin::Derived {
                op,
                left: left.name.clone(),
                right: right.name.clone(),
            },
        }
    }

    /// Whether the column was generated rather than supplied
    pub fn is_derived(&self) -> bool {
        matches!(self.origin, FeatureOrigin::Derived { .. })
    }
}

impl fmt::Display for FeatureColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Coarse target type, used to pick fallback metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetKind {
    Classification,
    Regression,
}

/// Feature matrix (rows = samples) with its target vector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    data: Array2<f64>,
    target: Array1<f64>,
    columns: Vec<FeatureColumn>,
}

impl Dataset {
    /// Create a dataset with default column names `x0..xn`
    pub fn new(data: Array2<f64>, target: Array1<f64>) -> Result<Self> {
        if data.nrows() != target.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("target length = {}", data.nrows()),
                actual: format!("target length = {}", target.len()),
            });
        }

        let columns = (0..data.ncols())
            .map(|i| FeatureColumn::original(i, format!("x{}", i)))
            .collect();

        Ok(Self {
            data,
            target,
            columns,
        })
    }

    /// Rename the columns
    pub fn with_feature_names<S: Into<String>>(mut self, names: Vec<S>) -> Result<Self> {
        if names.len() != self.data.ncols() {
            return Err(PipelineError::ShapeError {
                expected: format!("{} feature names", self.data.ncols()),
                actual: format!("{} feature names", names.len()),
            });
        }
        for (column, name) in self.columns.iter_mut().zip(names) {
            column.name = name.into();
        }
        Ok(self)
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn target(&self) -> &Array1<f64> {
        &self.target
    }

    pub fn columns(&self) -> &[FeatureColumn] {
        &self.columns
    }

    pub fn feature_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn n_samples(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.data.ncols()
    }

    /// Guess whether the target holds class labels
    ///
    /// Integral targets with at most 20 distinct values count as classes.
    pub fn target_kind(&self) -> TargetKind {
        let integral = self.target.iter().all(|v| v.fract() == 0.0);
        if !integral {
            return TargetKind::Regression;
        }
        let mut values: Vec<i64> = self.target.iter().map(|&v| v as i64).collect();
        values.sort_unstable();
        values.dedup();
        if values.len() <= 20 {
            TargetKind::Classification
        } else {
            TargetKind::Regression
        }
    }

    /// New dataset holding the given rows, in the given order
    pub fn subset_rows(&self, indices: &[usize]) -> Result<Dataset> {
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.n_samples()) {
            return Err(PipelineError::Data(format!(
                "row index {} out of bounds for {} samples",
                bad,
                self.n_samples()
            )));
        }
        Ok(Dataset {
            data: self.data.select(Axis(0), indices),
            target: self.target.select(Axis(0), indices),
            columns: self.columns.clone(),
        })
    }

    /// New dataset holding the given columns, in the given order
    pub fn select_columns(&self, indices: &[usize]) -> Result<Dataset> {
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.n_features()) {
            return Err(PipelineError::Data(format!(
                "column index {} out of bounds for {} features",
                bad,
                self.n_features()
            )));
        }
        Ok(Dataset {
            data: self.data.select(Axis(1), indices),
            target: self.target.clone(),
            columns: indices.iter().map(|&i| self.columns[i].clone()).collect(),
        })
    }

    /// New dataset with `extra` columns appended after the existing ones
    pub fn with_derived_columns(
        &self,
        extra: Array2<f64>,
        columns: Vec<FeatureColumn>,
    ) -> Result<Dataset> {
        if extra.nrows() != self.n_samples() || extra.ncols() != columns.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("({}, {})", self.n_samples(), columns.len()),
                actual: format!("({}, {})", extra.nrows(), extra.ncols()),
            });
        }
        let data = concatenate(Axis(1), &[self.data.view(), extra.view()])?;
        let mut all_columns = self.columns.clone();
        all_columns.extend(columns);
        Ok(Dataset {
            data,
            target: self.target.clone(),
            columns: all_columns,
        })
    }
}
