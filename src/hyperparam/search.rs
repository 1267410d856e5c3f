//! Search algorithms proposing hyperparameters

use super::space::{ParamSpace, ParamValue, Params};
use super::trials::Trials;
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

/// Type of search algorithm to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SamplerType {
    /// Independent random draws
    Random,
    /// Simplified Tree-structured Parzen Estimator
    Tpe,
}

/// Proposes the next parameter set given the trials so far
pub trait SearchAlgorithm: Send {
    /// Suggest the next configuration; fixed parameters are always included
    fn suggest(&mut self, space: &ParamSpace, history: &Trials) -> Params;

    /// Short identifier for logs
    fn name(&self) -> &'static str;
}

/// Random search
#[derive(Debug)]
pub struct RandomSearch {
    rng: Xoshiro256PlusPlus,
}

impl RandomSearch {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
        }
    }
}

impl SearchAlgorithm for RandomSearch {
    fn suggest(&mut self, space: &ParamSpace, _history: &Trials) -> Params {
        space.sample(&mut self.rng)
    }

    fn name(&self) -> &'static str {
        "random"
    }
}

/// Tree-structured Parzen Estimator sampler
///
/// After `n_startup_trials` random draws, samples `n_candidates` configurations
/// and keeps the one closest to the best `gamma` fraction of past trials.
#[derive(Debug)]
pub struct TpeSampler {
    rng: Xoshiro256PlusPlus,
    n_startup_trials: usize,
    gamma: f64,
    n_candidates: usize,
}

impl TpeSampler {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
            n_startup_trials: 10,
            gamma: 0.25,
            n_candidates: 24,
        }
    }

    /// Set number of startup trials
    pub fn with_n_startup(mut self, n: usize) -> Self {
        self.n_startup_trials = n;
        self
    }

    /// Set gamma (quantile for splitting good/bad)
    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma.clamp(0.01, 1.0);
        self
    }

    fn similarity(space: &ParamSpace, candidate: &Params, good: &[&Params]) -> f64 {
        if good.is_empty() {
            return 0.0;
        }

        let mut total = 0.0;
        for trial in good {
            let mut dist = 0.0;
            let mut count = 0;
            for (name, distribution) in space.iter() {
                let (Some(a), Some(b)) = (candidate.get(name), trial.get(name)) else {
                    continue;
                };
                let d = match (distribution.unit_position(a), distribution.unit_position(b)) {
                    (Some(pa), Some(pb)) => (pa - pb).abs(),
                    _ => Self::mismatch(a, b),
                };
                dist += d * d;
                count += 1;
            }
            if count > 0 {
                total += 1.0 / (1.0 + (dist / count as f64).sqrt());
            }
        }

        total / good.len() as f64
    }

    fn mismatch(a: &ParamValue, b: &ParamValue) -> f64 {
        if a == b {
            0.0
        } else {
            1.0
        }
    }
}

impl SearchAlgorithm for TpeSampler {
    fn suggest(&mut self, space: &ParamSpace, history: &Trials) -> Params {
        let completed: Vec<_> = history.iter().filter(|t| t.is_ok()).collect();
        if completed.len() < self.n_startup_trials {
            return space.sample(&mut self.rng);
        }

        let mut sorted = completed;
        sorted.sort_by(|a, b| a.loss.partial_cmp(&b.loss).unwrap_or(std::cmp::Ordering::Equal));
        let n_good = ((sorted.len() as f64 * self.gamma).ceil() as usize).max(1);
        let good: Vec<&Params> = sorted[..n_good].iter().map(|t| &t.params).collect();

        let mut best = space.sample(&mut self.rng);
        let mut best_score = Self::similarity(space, &best, &good);
        for _ in 1..self.n_candidates {
            let candidate = space.sample(&mut self.rng);
            let score = Self::similarity(space, &candidate, &good);
            if score > best_score {
                best_score = score;
                best = candidate;
            }
        }

        best
    }

    fn name(&self) -> &'static str {
        "tpe"
    }
}

/// Create a search algorithm from its type
pub fn create_sampler(sampler_type: SamplerType, seed: u64) -> Box<dyn SearchAlgorithm> {
    match sampler_type {
        SamplerType::Random => Box::new(RandomSearch::new(seed)),
        SamplerType::Tpe => Box::new(TpeSampler::new(seed)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hyperparam::trials::Trial;

    fn space() -> ParamSpace {
        ParamSpace::new()
            .uniform("lr", 0.0, 1.0)
            .int_uniform("n", 1, 100)
            .fixed("mode", "fast")
    }

    #[test]
    fn test_random_search_includes_fixed() {
        let mut sampler = RandomSearch::new(42);
        let params = sampler.suggest(&space(), &Trials::new());

        assert!(params.contains_key("lr"));
        assert!(params.contains_key("n"));
        assert_eq!(params["mode"], ParamValue::Str("fast".into()));
    }

    #[test]
    fn test_same_seed_same_suggestions() {
        let mut a = create_sampler(SamplerType::Tpe, 9);
        let mut b = create_sampler(SamplerType::Tpe, 9);
        for _ in 0..5 {
            assert_eq!(a.suggest(&space(), &Trials::new()), b.suggest(&space(), &Trials::new()));
        }
    }

    #[test]
    fn test_tpe_moves_towards_good_trials() {
        let space = ParamSpace::new().uniform("lr", 0.0, 1.0);
        let mut history = Trials::new();
        for i in 0..20 {
            let lr = i as f64 / 20.0;
            let mut params = Params::new();
            params.insert("lr".into(), ParamValue::Float(lr));
            // Loss is lowest near lr = 0
            history.push(Trial::ok(i, params, lr, -lr, 0.0));
        }

        let mut sampler = TpeSampler::new(1).with_n_startup(5);
        let mean: f64 = (0..20)
            .map(|_| sampler.suggest(&space, &history)["lr"].as_float().unwrap())
            .sum::<f64>()
            / 20.0;

        assert!(mean < 0.5, "suggestions should favour low lr, mean = {}", mean);
    }
}
