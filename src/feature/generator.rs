//! Pairwise arithmetic feature generation

use crate::data::FeatureColumn;
use crate::error::{PipelineError, Result};
use crate::pipeline::{PipelineData, Step, StepContext};
use ndarray::{Array1, Array2, ArrayView1, Zip};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

const DIVISION_EPSILON: f64 = 1e-10;

/// Binary operator combining two columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Operator {
    pub fn all() -> [Operator; 4] {
        [
            Operator::Add,
            Operator::Subtract,
            Operator::Multiply,
            Operator::Divide,
        ]
    }

    pub fn apply(&self, a: f64, b: f64) -> f64 {
        match self {
            Operator::Add => a + b,
            Operator::Subtract => a - b,
            Operator::Multiply => a * b,
            Operator::Divide => a / (b + DIVISION_EPSILON),
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Subtract => "-",
            Operator::Multiply => "*",
            Operator::Divide => "/",
        }
    }

    /// Element-wise application; non-finite results become 0
    pub fn combine(&self, left: ArrayView1<f64>, right: ArrayView1<f64>) -> Array1<f64> {
        let mut out = Array1::zeros(left.len());
        Zip::from(&mut out)
            .and(&left)
            .and(&right)
            .for_each(|o, &a, &b| {
                let v = self.apply(a, b);
                *o = if v.is_finite() { v } else { 0.0 };
            });
        out
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Operator {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "+" => Ok(Operator::Add),
            "-" => Ok(Operator::Subtract),
            "*" => Ok(Operator::Multiply),
            "/" => Ok(Operator::Divide),
            other => Err(PipelineError::Composition(format!(
                "unknown feature operator '{}', expected one of + - * /",
                other
            ))),
        }
    }
}

/// Appends `left op right` for every column pair `i < j` and every operator
///
/// New columns follow pair order, then operator order, and carry
/// [`FeatureOrigin::Derived`](crate::data::FeatureOrigin) provenance.
#[derive(Debug, Clone)]
pub struct FormulaFeatureGenerator {
    ops: Vec<Operator>,
    max_features: Option<usize>,
}

impl FormulaFeatureGenerator {
    pub fn new(ops: Vec<Operator>) -> Self {
        Self {
            ops,
            max_features: None,
        }
    }

    /// Build from operator symbols such as `["+", "*"]`
    pub fn from_symbols(symbols: &[&str]) -> Result<Self> {
        let ops = symbols
            .iter()
            .map(|s| s.parse())
            .collect::<Result<Vec<Operator>>>()?;
        Ok(Self::new(ops))
    }

    /// Cap the number of generated columns
    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features);
        self
    }

    pub fn ops(&self) -> &[Operator] {
        &self.ops
    }

    fn planned(&self, n_features: usize) -> Vec<(usize, usize, Operator)> {
        let plan = (0..n_features)
            .flat_map(|i| ((i + 1)..n_features).map(move |j| (i, j)))
            .flat_map(|(i, j)| self.ops.iter().map(move |&op| (i, j, op)));
        match self.max_features {
            Some(cap) => plan.take(cap).collect(),
            None => plan.collect(),
        }
    }
}

impl Step for FormulaFeatureGenerator {
    fn run(&self, mut data: PipelineData, ctx: &mut StepContext) -> Result<PipelineData> {
        let n_features = data.dataset.n_features();
        if n_features < 2 {
            warn!(n_features, "need at least two columns to generate features");
            data.record_extra(ctx.step_name(), serde_json::json!({ "generated": [] }));
            return Ok(data);
        }

        let plan = self.planned(n_features);
        let x = data.dataset.data();
        let compute = |&(i, j, op): &(usize, usize, Operator)| op.combine(x.column(i), x.column(j));
        let values: Vec<Array1<f64>> = if ctx.parallel() {
            plan.par_iter().map(compute).collect()
        } else {
            plan.iter().map(compute).collect()
        };

        let mut extra = Array2::zeros((data.dataset.n_samples(), plan.len()));
        for (k, column) in values.iter().enumerate() {
            extra.column_mut(k).assign(column);
        }

        let source = data.dataset.columns();
        let columns: Vec<FeatureColumn> = plan
            .iter()
            .map(|&(i, j, op)| FeatureColumn::derived(op.symbol(), &source[i], &source[j]))
            .collect();
        let names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();
        debug!(?names, "generated columns");

        data.dataset = data.dataset.with_derived_columns(extra, columns)?;
        info!(
            generated = names.len(),
            n_features = data.dataset.n_features(),
            "formula features added"
        );
        data.record_extra(ctx.step_name(), serde_json::json!({ "generated": names }));
        Ok(data)
    }

    fn name(&self) -> String {
        "formula_features".to_string()
    }

    fn validate(&self) -> Result<()> {
        if self.ops.is_empty() {
            return Err(PipelineError::Config(
                "at least one operator is required".to_string(),
            ));
        }
        if self.max_features == Some(0) {
            return Err(PipelineError::InvalidParameter {
                name: "max_features".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Dataset, FeatureOrigin};
    use ndarray::array;

    fn data() -> PipelineData {
        let dataset = Dataset::new(
            array![[1.0, 2.0, 4.0], [3.0, 0.0, 5.0]],
            array![0.0, 1.0],
        )
        .unwrap();
        PipelineData::new(dataset)
    }

    #[test]
    fn test_unknown_symbol_rejected() {
        let err = FormulaFeatureGenerator::from_symbols(&["+", "^"]).unwrap_err();
        assert!(matches!(err, PipelineError::Composition(_)));
    }

    #[test]
    fn test_operator_values() {
        assert_eq!(Operator::Subtract.apply(5.0, 2.0), 3.0);
        assert!((Operator::Divide.apply(1.0, 0.0) - 1e10).abs() < 1.0);
        let combined = Operator::Divide.combine(array![1.0, f64::INFINITY].view(), array![2.0, 1.0].view());
        assert_eq!(combined[1], 0.0);
    }

    #[test]
    fn test_all_pairs_generated() {
        let gen = FormulaFeatureGenerator::from_symbols(&["+", "*"]).unwrap();
        let mut ctx = StepContext::new(0, 1);
        let out = gen.run(data(), &mut ctx).unwrap();

        // 3 pairs x 2 ops
        assert_eq!(out.dataset.n_features(), 3 + 6);
        let names = out.dataset.feature_names();
        assert_eq!(names[3], "(x0 + x1)");
        assert_eq!(names[4], "(x0 * x1)");
        assert_eq!(names[8], "(x1 * x2)");
        assert_eq!(out.dataset.data()[[1, 3]], 3.0);
        assert_eq!(out.dataset.data()[[0, 8]], 8.0);
        assert!(matches!(
            out.dataset.columns()[5].origin,
            FeatureOrigin::Derived { .. }
        ));
    }

    #[test]
    fn test_max_features_cap() {
        let gen = FormulaFeatureGenerator::new(Operator::all().to_vec()).with_max_features(5);
        let mut ctx = StepContext::new(0, 1).with_parallel(false);
        let out = gen.run(data(), &mut ctx).unwrap();
        assert_eq!(out.dataset.n_features(), 8);
    }

    #[test]
    fn test_single_column_is_noop() {
        let dataset = Dataset::new(array![[1.0], [2.0]], array![0.0, 1.0]).unwrap();
        let gen = FormulaFeatureGenerator::from_symbols(&["+"]).unwrap();
        let out = gen
            .run(PipelineData::new(dataset), &mut StepContext::new(0, 1))
            .unwrap();
        assert_eq!(out.dataset.n_features(), 1);
    }

    #[test]
    fn test_validate() {
        assert!(FormulaFeatureGenerator::new(vec![]).validate().is_err());
        assert!(FormulaFeatureGenerator::new(vec![Operator::Add])
            .with_max_features(0)
            .validate()
            .is_err());
    }
}
