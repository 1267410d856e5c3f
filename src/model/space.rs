//! Initial candidate set

use super::estimator::{ModelClass, ModelRef};
use crate::error::Result;
use crate::hyperparam::ParamSpace;
use crate::pipeline::{CandidateResult, PipelineData, Step, StepContext};
use std::sync::Arc;
use tracing::info;

/// Seeds `return_val` with one unscored candidate per model
#[derive(Debug, Clone, Default)]
pub struct ModelSpace {
    entries: Vec<(ModelRef, ParamSpace)>,
}

impl ModelSpace {
    pub fn new(entries: Vec<(ModelRef, ParamSpace)>) -> Self {
        Self { entries }
    }

    /// Add a model with its hyperparameter space
    pub fn with(mut self, model: impl ModelClass + 'static, space: ParamSpace) -> Self {
        self.entries.push((Arc::new(model), space));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Step for ModelSpace {
    fn run(&self, mut data: PipelineData, _ctx: &mut StepContext) -> Result<PipelineData> {
        data.return_val = self
            .entries
            .iter()
            .map(|(model, space)| CandidateResult::new(model.clone(), space.clone()))
            .collect();
        info!(candidates = data.return_val.len(), "model space initialised");
        Ok(data)
    }

    fn name(&self) -> String {
        "model_space".to_string()
    }

    fn is_initializer(&self) -> bool {
        true
    }

    fn validate(&self) -> Result<()> {
        self.entries.iter().try_for_each(|(_, space)| space.validate())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Dataset;
    use crate::model::BuiltinModel;
    use crate::pipeline::Pipeline;
    use ndarray::{Array1, Array2};

    #[test]
    fn test_one_candidate_per_model() {
        let space = ModelSpace::new(vec![])
            .with(BuiltinModel::Ridge, ParamSpace::new().log_uniform("alpha", 0.01, 10.0))
            .with(BuiltinModel::KnnRegressor, ParamSpace::new().fixed("n_neighbors", 3_i64));

        let data = PipelineData::new(Dataset::new(Array2::zeros((3, 2)), Array1::zeros(3)).unwrap());
        let out = space.run(data, &mut StepContext::new(0, 0)).unwrap();

        assert_eq!(out.return_val.len(), 2);
        assert!(out.return_val[0].params.is_empty());
        assert_eq!(out.return_val[1].params.len(), 1);
        assert!(out.return_val.iter().all(|c| c.score.is_none()));
    }

    #[test]
    fn test_invalid_space_rejected_at_composition() {
        let space = ModelSpace::default().with(BuiltinModel::Ridge, ParamSpace::new().uniform("alpha", 2.0, 1.0));
        assert!(Pipeline::new().then(space).is_err());
    }
}
