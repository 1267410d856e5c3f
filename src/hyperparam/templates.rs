//! Ready-made search spaces for the built-in models

use super::space::ParamSpace;
use crate::model::{BuiltinModel, ModelSpace};

pub fn knn_space() -> ParamSpace {
    ParamSpace::new()
        .int_uniform("n_neighbors", 1, 30)
        .choice("weights", vec!["uniform", "distance"])
        .choice("metric", vec!["euclidean", "manhattan"])
}

pub fn ridge_space() -> ParamSpace {
    ParamSpace::new().log_uniform("alpha", 1e-3, 100.0)
}

pub fn logistic_space() -> ParamSpace {
    ParamSpace::new()
        .log_uniform("alpha", 1e-4, 1.0)
        .log_uniform("learning_rate", 0.01, 1.0)
        .fixed("max_iter", 300_i64)
}

pub fn naive_bayes_space() -> ParamSpace {
    ParamSpace::new().log_uniform("var_smoothing", 1e-12, 1e-6)
}

/// Default search space of a built-in model
pub fn space_for(model: BuiltinModel) -> ParamSpace {
    match model {
        BuiltinModel::KnnClassifier | BuiltinModel::KnnRegressor => knn_space(),
        BuiltinModel::Ridge => ridge_space(),
        BuiltinModel::LogisticRegression => logistic_space(),
        BuiltinModel::GaussianNaiveBayes => naive_bayes_space(),
    }
}

/// All built-in classifiers with their default spaces
pub fn classification_models() -> ModelSpace {
    BuiltinModel::all()
        .into_iter()
        .filter(BuiltinModel::is_classifier)
        .fold(ModelSpace::default(), |space, model| space.with(model, space_for(model)))
}

/// All built-in regressors with their default spaces
pub fn regression_models() -> ModelSpace {
    BuiltinModel::all()
        .into_iter()
        .filter(|m| !m.is_classifier())
        .fold(ModelSpace::default(), |space, model| space.with(model, space_for(model)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelClass;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    #[test]
    fn test_templates_are_valid_and_searchable() {
        for space in [knn_space(), ridge_space(), logistic_space(), naive_bayes_space()] {
            assert!(space.validate().is_ok());
            assert!(space.is_searchable());
        }
    }

    #[test]
    fn test_sampled_params_construct_models() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(0);
        for model in BuiltinModel::all() {
            let params = space_for(model).sample(&mut rng);
            assert!(model.construct(&params).is_ok(), "{}", model.name());
        }
    }

    #[test]
    fn test_model_groups() {
        assert_eq!(classification_models().len(), 3);
        assert_eq!(regression_models().len(), 2);
    }
}
