//! Feature generation and selection steps
//!
//! [`FormulaFeatureGenerator`] widens the dataset with pairwise arithmetic
//! columns; [`FeatureSelector`] and [`VotingFeatureSelector`] narrow it back
//! down using the importances of the current candidates' models.

mod generator;
pub mod importance;
mod selector;

pub use generator::{FormulaFeatureGenerator, Operator};
pub use selector::{FeatureSelector, VotingFeatureSelector, VotingRule};
