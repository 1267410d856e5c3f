//! Per-run execution state

use chrono::{DateTime, Utc};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Mix a base seed with an index (splitmix64)
///
/// Gives well separated seeds for consecutive indices.
pub fn derive_seed(base: u64, index: u64) -> u64 {
    let mut z = base ^ index.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Timing and size record of one executed step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepTrace {
    pub name: String,
    pub position: usize,
    pub initializer: bool,
    pub duration_secs: f64,
    pub candidates_in: usize,
    pub candidates_out: usize,
    pub n_features: usize,
}

/// State handed to every step of a run
#[derive(Debug)]
pub struct StepContext {
    run_index: usize,
    rng: ChaCha8Rng,
    step_name: String,
    position: usize,
    skip_initializers: bool,
    parallel: bool,
    pub(crate) traces: Vec<StepTrace>,
}

impl StepContext {
    pub fn new(run_index: usize, seed: u64) -> Self {
        Self {
            run_index,
            rng: ChaCha8Rng::seed_from_u64(seed),
            step_name: String::new(),
            position: 0,
            skip_initializers: false,
            parallel: true,
            traces: Vec::new(),
        }
    }

    /// Enable or disable parallel candidate evaluation
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Context for a nested sub-pipeline run
    ///
    /// Initializer steps are skipped so the caller's candidates survive.
    pub fn detached(&self, seed: u64) -> StepContext {
        StepContext {
            run_index: self.run_index,
            rng: ChaCha8Rng::seed_from_u64(seed),
            step_name: self.step_name.clone(),
            position: self.position,
            skip_initializers: true,
            // Nested runs already sit inside a parallel loop
            parallel: false,
            traces: Vec::new(),
        }
    }

    pub fn run_index(&self) -> usize {
        self.run_index
    }

    pub fn step_name(&self) -> &str {
        &self.step_name
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn skip_initializers(&self) -> bool {
        self.skip_initializers
    }

    pub fn parallel(&self) -> bool {
        self.parallel
    }

    pub fn traces(&self) -> &[StepTrace] {
        &self.traces
    }

    /// Fresh seed drawn from the run RNG
    pub fn next_seed(&mut self) -> u64 {
        self.rng.gen()
    }

    pub fn rng(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }

    pub(crate) fn enter(&mut self, name: &str, position: usize) {
        self.step_name.clear();
        self.step_name.push_str(name);
        self.position = position;
    }
}

/// Summary of one executor run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub run_index: usize,
    /// Seed the run RNG was created from
    pub seed: u64,
    pub started_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub steps: Vec<StepTrace>,
}
