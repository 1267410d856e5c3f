//! Ridge and logistic regression

use crate::error::{PipelineError, Result};
use crate::hyperparam::Params;
use crate::model::estimator::{param_f64, param_usize, reject_unknown, Estimator};
use ndarray::{Array1, Array2, Axis};

/// Solve the symmetric positive-definite system `a x = b` (Cholesky)
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    if n != a.ncols() || n != b.len() {
        return None;
    }

    let mut l = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let sum: f64 = (0..j).map(|k| l[[i, k]] * l[[j, k]]).sum();
            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= 0.0 {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    // L y = b
    let mut y = Array1::<f64>::zeros(n);
    for i in 0..n {
        let sum: f64 = (0..i).map(|j| l[[i, j]] * y[j]).sum();
        y[i] = (b[i] - sum) / l[[i, i]];
    }

    // L^T x = y
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let sum: f64 = ((i + 1)..n).map(|j| l[[j, i]] * x[j]).sum();
        x[i] = (y[i] - sum) / l[[i, i]];
    }

    Some(x)
}

fn check_shapes(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(PipelineError::ShapeError {
            expected: format!("y length = {}", x.nrows()),
            actual: format!("y length = {}", y.len()),
        });
    }
    if x.nrows() == 0 {
        return Err(PipelineError::Data("cannot fit on zero samples".to_string()));
    }
    Ok(())
}

/// Column means and standard deviations (zero spread maps to 1)
#[derive(Debug, Clone)]
struct Scaling {
    mean: Array1<f64>,
    std: Array1<f64>,
}

impl Scaling {
    fn fit(x: &Array2<f64>) -> Self {
        let mean = x
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(x.ncols()));
        let std = x
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s > 1e-12 { s } else { 1.0 });
        Self { mean, std }
    }

    fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if x.ncols() != self.mean.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("{} features", self.mean.len()),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok((x - &self.mean.view().insert_axis(Axis(0))) / &self.std.view().insert_axis(Axis(0)))
    }
}

/// Ridge Regression (L2-regularized linear regression)
#[derive(Debug, Clone)]
pub struct RidgeRegression {
    /// L2 regularization strength
    pub alpha: f64,
    coefficients: Option<Array1<f64>>,
    intercept: f64,
    scale: Option<Array1<f64>>,
}

impl RidgeRegression {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            coefficients: None,
            intercept: 0.0,
            scale: None,
        }
    }

    /// Recognised params: `alpha`
    pub fn from_params(params: &Params) -> Result<Self> {
        reject_unknown(params, &["alpha"])?;
        let alpha = param_f64(params, "alpha", 1.0)?;
        if alpha <= 0.0 {
            return Err(PipelineError::InvalidParameter {
                name: "alpha".to_string(),
                value: alpha.to_string(),
                reason: "must be positive".to_string(),
            });
        }
        Ok(Self::new(alpha))
    }

    pub fn coefficients(&self) -> Option<&Array1<f64>> {
        self.coefficients.as_ref()
    }
}

impl Estimator for RidgeRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_shapes(x, y)?;

        let scaling = Scaling::fit(x);
        let y_mean = y.mean().unwrap_or(0.0);
        let x_c = x - &scaling.mean.view().insert_axis(Axis(0));
        let y_c = y - y_mean;

        let mut xtx = x_c.t().dot(&x_c);
        for i in 0..x.ncols() {
            xtx[[i, i]] += self.alpha;
        }
        let xty = x_c.t().dot(&y_c);

        let coefficients = cholesky_solve(&xtx, &xty)
            .ok_or_else(|| PipelineError::Computation("singular normal equations".to_string()))?;

        self.intercept = y_mean - coefficients.dot(&scaling.mean);
        self.coefficients = Some(coefficients);
        self.scale = Some(scaling.std);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coefficients = self.coefficients.as_ref().ok_or(PipelineError::ModelNotFitted)?;
        if x.ncols() != coefficients.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("{} features", coefficients.len()),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(x.dot(coefficients) + self.intercept)
    }

    /// |coefficient| times feature spread
    fn feature_importances(&self) -> Option<Array1<f64>> {
        let coefficients = self.coefficients.as_ref()?;
        let scale = self.scale.as_ref()?;
        Some((coefficients * scale).mapv(f64::abs))
    }
}

/// Logistic regression for binary 0/1 classification
///
/// Features are standardised internally before gradient descent.
#[derive(Debug, Clone)]
pub struct LogisticRegression {
    /// Regularization strength (L2)
    pub alpha: f64,
    pub max_iter: usize,
    pub learning_rate: f64,
    /// Convergence tolerance on the gradient norm
    pub tol: f64,
    scaling: Option<Scaling>,
    weights: Option<Array1<f64>>,
    bias: f64,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self {
            alpha: 0.01,
            max_iter: 500,
            learning_rate: 0.5,
            tol: 1e-6,
            scaling: None,
            weights: None,
            bias: 0.0,
        }
    }
}

impl LogisticRegression {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recognised params: `alpha`, `max_iter`, `learning_rate`
    pub fn from_params(params: &Params) -> Result<Self> {
        reject_unknown(params, &["alpha", "max_iter", "learning_rate"])?;
        let defaults = Self::default();
        let model = Self {
            alpha: param_f64(params, "alpha", defaults.alpha)?,
            max_iter: param_usize(params, "max_iter", defaults.max_iter)?,
            learning_rate: param_f64(params, "learning_rate", defaults.learning_rate)?,
            ..defaults
        };
        if model.alpha < 0.0 || model.learning_rate <= 0.0 {
            return Err(PipelineError::InvalidParameter {
                name: "alpha/learning_rate".to_string(),
                value: format!("{}/{}", model.alpha, model.learning_rate),
                reason: "alpha must be >= 0 and learning_rate > 0".to_string(),
            });
        }
        Ok(model)
    }

    fn sigmoid(z: &Array1<f64>) -> Array1<f64> {
        z.mapv(|v| 1.0 / (1.0 + (-v).exp()))
    }

    /// Probability of class 1
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let (scaling, weights) = match (&self.scaling, &self.weights) {
            (Some(s), Some(w)) => (s, w),
            _ => return Err(PipelineError::ModelNotFitted),
        };
        let xs = scaling.transform(x)?;
        Ok(Self::sigmoid(&(xs.dot(weights) + self.bias)))
    }
}

impl Estimator for LogisticRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_shapes(x, y)?;
        if let Some(bad) = y.iter().find(|&&v| v != 0.0 && v != 1.0) {
            return Err(PipelineError::Data(format!(
                "logistic regression needs 0/1 labels, found {}",
                bad
            )));
        }

        let scaling = Scaling::fit(x);
        let xs = scaling.transform(x)?;
        let n_samples = xs.nrows() as f64;

        let mut weights = Array1::<f64>::zeros(xs.ncols());
        let mut bias = 0.0;
        for _ in 0..self.max_iter {
            let predictions = Self::sigmoid(&(xs.dot(&weights) + bias));
            let errors = &predictions - y;
            let dw = xs.t().dot(&errors) / n_samples + self.alpha * &weights;
            let db = errors.mean().unwrap_or(0.0);

            let grad_norm = (dw.mapv(|v| v * v).sum() + db * db).sqrt();
            if grad_norm < self.tol {
                break;
            }
            weights = weights - self.learning_rate * dw;
            bias -= self.learning_rate * db;
        }

        if weights.iter().any(|w| !w.is_finite()) {
            return Err(PipelineError::Computation("gradient descent diverged".to_string()));
        }

        self.scaling = Some(scaling);
        self.weights = Some(weights);
        self.bias = bias;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.predict_proba(x)?.mapv(|p| if p >= 0.5 { 1.0 } else { 0.0 }))
    }

    fn predict_scores(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.predict_proba(x)
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        self.weights.as_ref().map(|w| w.mapv(f64::abs))
    }
}
