//! Small reference estimators
//!
//! Enough to exercise the pipeline end to end; not tuned for production use.

mod knn;
mod linear;
mod naive_bayes;

pub use knn::{DistanceMetric, KnnClassifier, KnnConfig, KnnRegressor, WeightScheme};
pub use linear::{LogisticRegression, RidgeRegression};
pub use naive_bayes::GaussianNaiveBayes;

use super::estimator::{Estimator, ModelClass};
use crate::error::Result;
use crate::hyperparam::Params;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Built-in model classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuiltinModel {
    KnnClassifier,
    KnnRegressor,
    Ridge,
    LogisticRegression,
    GaussianNaiveBayes,
}

impl BuiltinModel {
    pub fn all() -> [BuiltinModel; 5] {
        [
            BuiltinModel::KnnClassifier,
            BuiltinModel::KnnRegressor,
            BuiltinModel::Ridge,
            BuiltinModel::LogisticRegression,
            BuiltinModel::GaussianNaiveBayes,
        ]
    }

    pub fn is_classifier(&self) -> bool {
        !matches!(self, BuiltinModel::KnnRegressor | BuiltinModel::Ridge)
    }
}

impl ModelClass for BuiltinModel {
    fn name(&self) -> &str {
        match self {
            BuiltinModel::KnnClassifier => "knn_classifier",
            BuiltinModel::KnnRegressor => "knn_regressor",
            BuiltinModel::Ridge => "ridge",
            BuiltinModel::LogisticRegression => "logistic_regression",
            BuiltinModel::GaussianNaiveBayes => "gaussian_nb",
        }
    }

    fn construct(&self, params: &Params) -> Result<Box<dyn Estimator>> {
        Ok(match self {
            BuiltinModel::KnnClassifier => Box::new(KnnClassifier::new(KnnConfig::from_params(params)?)),
            BuiltinModel::KnnRegressor => Box::new(KnnRegressor::new(KnnConfig::from_params(params)?)),
            BuiltinModel::Ridge => Box::new(RidgeRegression::from_params(params)?),
            BuiltinModel::LogisticRegression => Box::new(LogisticRegression::from_params(params)?),
            BuiltinModel::GaussianNaiveBayes => Box::new(GaussianNaiveBayes::from_params(params)?),
        })
    }
}

impl FromStr for BuiltinModel {
    type Err = crate::error::PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        BuiltinModel::all()
            .into_iter()
            .find(|m| m.name() == s)
            .ok_or_else(|| crate::error::PipelineError::Config(format!("unknown model '{}'", s)))
    }
}
