//! Keep the top-k candidates

use super::metrics::Direction;
use crate::error::{PipelineError, Result};
use crate::pipeline::{CandidateResult, PipelineData, Step, StepContext};
use std::cmp::Ordering;
use tracing::info;

/// Ranks candidates by score and keeps the best `k`
///
/// The sort is stable: equal scores keep their order, failed and unscored
/// candidates go last. Running it twice gives the same result.
#[derive(Debug, Clone, Copy)]
pub struct ChooseBest {
    k: usize,
}

impl ChooseBest {
    pub fn new(k: usize) -> Self {
        Self { k }
    }

    fn direction(candidates: &[CandidateResult]) -> Result<Direction> {
        let mut direction = None;
        for c in candidates.iter().filter(|c| c.is_scored()) {
            let Some(metric) = &c.metric else {
                return Err(PipelineError::Data(format!(
                    "candidate '{}' has a score but no metric direction",
                    c.model_name()
                )));
            };
            match direction {
                None => direction = Some(metric.direction),
                Some(d) if d != metric.direction => {
                    return Err(PipelineError::Data(format!(
                        "candidates were scored with conflicting metric directions ({:?} and {:?})",
                        d, metric.direction
                    )))
                }
                Some(_) => {}
            }
        }
        Ok(direction.unwrap_or(Direction::Maximize))
    }
}

fn rank_score(c: &CandidateResult) -> Option<f64> {
    if c.is_scored() {
        c.score
    } else {
        None
    }
}

impl Step for ChooseBest {
    fn run(&self, mut data: PipelineData, _ctx: &mut StepContext) -> Result<PipelineData> {
        let direction = Self::direction(&data.return_val)?;

        data.return_val.sort_by(|a, b| match (rank_score(a), rank_score(b)) {
            (Some(x), Some(y)) => {
                let ord = match direction {
                    Direction::Maximize => y.partial_cmp(&x),
                    Direction::Minimize => x.partial_cmp(&y),
                };
                ord.unwrap_or(Ordering::Equal)
            }
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });
        data.return_val.truncate(self.k);

        info!(
            kept = data.return_val.len(),
            best = ?data.return_val.first().and_then(|c| c.score),
            "chose best candidates"
        );
        Ok(data)
    }

    fn name(&self) -> String {
        "choose_best".to_string()
    }

    fn validate(&self) -> Result<()> {
        if self.k == 0 {
            return Err(PipelineError::Config("k must be at least 1".to_string()));
        }
        Ok(())
    }
}
