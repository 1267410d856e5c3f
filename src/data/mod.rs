//! Dataset model
//!
//! Provides the immutable-until-transformed `Dataset` threaded through
//! pipelines, feature provenance tracking, and seeded synthetic generators.

mod dataset;
pub mod synthetic;

pub use dataset::{Dataset, FeatureColumn, FeatureOrigin, TargetKind};
pub use synthetic::{make_classification, make_regression};
