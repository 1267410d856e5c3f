//! Trial history of a hyperparameter search

use super::space::Params;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Outcome of a single trial
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrialStatus {
    Ok,
    Failed,
}

/// Loss recorded for a failed trial
///
/// Finite so that histories survive a JSON round trip.
pub const FAILED_TRIAL_LOSS: f64 = f64::MAX;

/// One proposed parameter set and the loss observed for it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trial {
    /// Trial number within the search
    pub index: usize,
    /// Parameters used
    pub params: Params,
    /// Loss fed back to the search algorithm (lower is better)
    pub loss: f64,
    /// Raw metric value, if the evaluation produced one
    pub score: Option<f64>,
    pub status: TrialStatus,
    pub error: Option<String>,
    pub duration_secs: f64,
}

impl Trial {
    pub(crate) fn ok(index: usize, params: Params, loss: f64, score: f64, duration_secs: f64) -> Self {
        Self {
            index,
            params,
            loss,
            score: Some(score),
            status: TrialStatus::Ok,
            error: None,
            duration_secs,
        }
    }

    /// Failed trials carry the sentinel loss so they never win
    pub(crate) fn failed(index: usize, params: Params, error: String, duration_secs: f64) -> Self {
        Self {
            index,
            params,
            loss: FAILED_TRIAL_LOSS,
            score: None,
            status: TrialStatus::Failed,
            error: Some(error),
            duration_secs,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == TrialStatus::Ok
    }
}

/// Ordered, append-only log of the trials of one search
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Trials {
    trials: Vec<Trial>,
}

impl Trials {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, trial: Trial) {
        self.trials.push(trial);
    }

    pub fn len(&self) -> usize {
        self.trials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trials.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Trial> {
        self.trials.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Trial> {
        self.trials.get(index)
    }

    /// Successful trial with the lowest loss; the earliest wins ties
    pub fn best(&self) -> Option<&Trial> {
        self.trials
            .iter()
            .filter(|t| t.is_ok())
            .fold(None, |best: Option<&Trial>, t| match best {
                Some(b) if b.loss <= t.loss => Some(b),
                _ => Some(t),
            })
    }

    pub fn losses(&self) -> Vec<f64> {
        self.trials.iter().map(|t| t.loss).collect()
    }

    pub fn n_failed(&self) -> usize {
        self.trials.iter().filter(|t| !t.is_ok()).count()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Save history to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Load history from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

impl<'a> IntoIterator for &'a Trials {
    type Item = &'a Trial;
    type IntoIter = std::slice::Iter<'a, Trial>;

    fn into_iter(self) -> Self::IntoIter {
        self.trials.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hyperparam::ParamValue;

    fn params(x: f64) -> Params {
        let mut p = Params::new();
        p.insert("x".into(), ParamValue::Float(x));
        p
    }

    #[test]
    fn test_best_skips_failed_and_prefers_earliest() {
        let mut trials = Trials::new();
        trials.push(Trial::ok(0, params(1.0), 0.5, -0.5, 0.0));
        trials.push(Trial::failed(1, params(2.0), "boom".into(), 0.0));
        trials.push(Trial::ok(2, params(3.0), 0.2, -0.2, 0.0));
        trials.push(Trial::ok(3, params(4.0), 0.2, -0.2, 0.0));

        let best = trials.best().unwrap();
        assert_eq!(best.index, 2);
        assert_eq!(trials.n_failed(), 1);
        assert_eq!(trials.len(), 4);
        assert_eq!(trials.losses()[1], FAILED_TRIAL_LOSS);
    }

    #[test]
    fn test_save_and_load() {
        let mut trials = Trials::new();
        trials.push(Trial::ok(0, params(1.0), 0.1, 0.9, 0.01));

        let file = tempfile::NamedTempFile::new().unwrap();
        trials.save(file.path()).unwrap();
        let loaded = Trials::load(file.path()).unwrap();

        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.get(0).unwrap().params, params(1.0));
    }
}
