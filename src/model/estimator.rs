//! Model collaborator contracts

use crate::error::{PipelineError, Result};
use crate::hyperparam::{ParamValue, Params};
use ndarray::{Array1, Array2};
use std::fmt;
use std::sync::Arc;

/// A trainable model instance
pub trait Estimator: Send {
    /// Fit the model to training data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Make predictions
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Continuous scores for ranking metrics such as ROC AUC
    ///
    /// Classifiers return the probability of the largest class label.
    fn predict_scores(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.predict(x)
    }

    /// Get feature importances (if available)
    fn feature_importances(&self) -> Option<Array1<f64>> {
        None
    }
}

/// A model family that builds estimators from hyperparameters
pub trait ModelClass: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Build an unfitted estimator; unknown or invalid params are an error
    fn construct(&self, params: &Params) -> Result<Box<dyn Estimator>>;
}

/// Shared handle to a model class
pub type ModelRef = Arc<dyn ModelClass>;

type Constructor = dyn Fn(&Params) -> Result<Box<dyn Estimator>> + Send + Sync;

/// Model class backed by a closure
#[derive(Clone)]
pub struct FnModel {
    name: String,
    constructor: Arc<Constructor>,
}

impl FnModel {
    pub fn new<F>(name: impl Into<String>, constructor: F) -> Self
    where
        F: Fn(&Params) -> Result<Box<dyn Estimator>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            constructor: Arc::new(constructor),
        }
    }
}

impl fmt::Debug for FnModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnModel").field("name", &self.name).finish()
    }
}

impl ModelClass for FnModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn construct(&self, params: &Params) -> Result<Box<dyn Estimator>> {
        (self.constructor)(params)
    }
}

fn invalid(name: &str, value: &ParamValue, reason: &str) -> PipelineError {
    PipelineError::InvalidParameter {
        name: name.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Read a float parameter, falling back to `default` when unset
pub fn param_f64(params: &Params, name: &str, default: f64) -> Result<f64> {
    match params.get(name) {
        None => Ok(default),
        Some(v) => v.as_float().ok_or_else(|| invalid(name, v, "expected a number")),
    }
}

/// Read a positive integer parameter
pub fn param_usize(params: &Params, name: &str, default: usize) -> Result<usize> {
    match params.get(name) {
        None => Ok(default),
        Some(v) => match v.as_int().or_else(|| v.as_float().map(|f| f.round() as i64)) {
            Some(n) if n > 0 => Ok(n as usize),
            _ => Err(invalid(name, v, "expected a positive integer")),
        },
    }
}

/// Read a string parameter
pub fn param_str<'a>(params: &'a Params, name: &str, default: &'a str) -> Result<&'a str> {
    match params.get(name) {
        None => Ok(default),
        Some(v) => v.as_str().ok_or_else(|| invalid(name, v, "expected a string")),
    }
}

/// Reject parameters the model does not understand
pub fn reject_unknown(params: &Params, known: &[&str]) -> Result<()> {
    match params.iter().find(|(k, _)| !known.contains(&k.as_str())) {
        Some((k, v)) => Err(invalid(k, v, "unknown parameter")),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Constant(f64);

    impl Estimator for Constant {
        fn fit(&mut self, _x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
            self.0 = y.mean().unwrap_or(0.0);
            Ok(())
        }

        fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
            Ok(Array1::from_elem(x.nrows(), self.0))
        }
    }

    #[test]
    fn test_fn_model_constructs() {
        let model = FnModel::new("constant", |_| Ok(Box::new(Constant(0.0)) as Box<dyn Estimator>));
        let mut est = model.construct(&Params::new()).unwrap();
        est.fit(&Array2::zeros((2, 1)), &Array1::from_vec(vec![1.0, 3.0])).unwrap();

        assert_eq!(model.name(), "constant");
        assert_eq!(est.predict(&Array2::zeros((1, 1))).unwrap()[0], 2.0);
        assert!(est.feature_importances().is_none());
    }

    #[test]
    fn test_param_readers() {
        let mut params = Params::new();
        params.insert("alpha".into(), ParamValue::Float(0.5));
        params.insert("k".into(), ParamValue::Int(3));
        params.insert("mode".into(), ParamValue::Str("fast".into()));

        assert_eq!(param_f64(&params, "alpha", 1.0).unwrap(), 0.5);
        assert_eq!(param_f64(&params, "beta", 1.0).unwrap(), 1.0);
        assert_eq!(param_usize(&params, "k", 5).unwrap(), 3);
        assert_eq!(param_str(&params, "mode", "slow").unwrap(), "fast");
        assert!(param_usize(&params, "mode", 1).is_err());
        assert!(reject_unknown(&params, &["alpha", "k"]).is_err());
        assert!(reject_unknown(&params, &["alpha", "k", "mode"]).is_ok());
    }
}
