//! Model contracts, metrics and the candidate evaluation steps

mod builtin;
mod choose;
mod cv;
mod estimator;
mod evaluate;
mod metrics;
mod space;
pub mod split;
mod validate;

pub use builtin::{
    BuiltinModel, DistanceMetric, GaussianNaiveBayes, KnnClassifier, KnnConfig, KnnRegressor,
    LogisticRegression, RidgeRegression, WeightScheme,
};
pub use choose::ChooseBest;
pub use cv::{CvConfig, CV};
pub use estimator::{param_f64, param_str, param_usize, reject_unknown, Estimator, FnModel, ModelClass, ModelRef};
pub use metrics::{CustomMetric, Direction, Metric, MetricInfo};
pub use space::ModelSpace;
pub use validate::Validate;
