//! Ordered step sequences and their composition

use super::context::{StepContext, StepTrace};
use super::data::PipelineData;
use super::step::{PipelineStep, Step, StepBody};
use crate::error::{PipelineError, Result};
use std::time::Instant;
use tracing::debug;

/// An ordered sequence of named steps
///
/// Composition consumes the pipeline and returns the extended one. Clone it
/// first to reuse a prefix; clones share the step bodies.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    steps: Vec<PipelineStep>,
}

impl Pipeline {
    /// Empty pipeline; running it returns the input unchanged
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a named step
    pub fn append_step(mut self, mut step: PipelineStep) -> Result<Self> {
        if let Some(base) = &step.auto_base {
            step.name = format!("{}#{}", base, self.steps.len());
        }
        if step.name.trim().is_empty() {
            return Err(PipelineError::Composition(format!(
                "step at position {} has a blank name",
                self.steps.len()
            )));
        }
        if self.steps.iter().any(|s| s.name == step.name) {
            return Err(PipelineError::Composition(format!(
                "duplicate step name '{}'",
                step.name
            )));
        }
        step.validate().map_err(|e| {
            PipelineError::Composition(format!("step '{}' is misconfigured: {}", step.name, e))
        })?;

        self.steps.push(step);
        Ok(self)
    }

    /// Append a step under a generated name
    pub fn then(self, step: impl Step + 'static) -> Result<Self> {
        self.append_step(PipelineStep::auto(step))
    }

    /// Append a closure under a generated name
    pub fn then_fn<F>(self, func: F) -> Result<Self>
    where
        F: Fn(PipelineData, &mut StepContext) -> Result<PipelineData> + Send + Sync + 'static,
    {
        self.then(super::step::FnStep::new("step", func))
    }

    /// Append every step of `other`, flattening it into this pipeline
    pub fn append_pipeline(self, other: Pipeline) -> Result<Self> {
        other.steps.into_iter().try_fold(self, Pipeline::append_step)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(&self) -> &[PipelineStep] {
        &self.steps
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(PipelineStep::name).collect()
    }

    /// Run the steps in order against `data`
    ///
    /// Step failures come back wrapped with the step's name and position.
    pub fn run_on(&self, mut data: PipelineData, ctx: &mut StepContext) -> Result<PipelineData> {
        for (position, step) in self.steps.iter().enumerate() {
            let initializer = step.is_initializer();
            if initializer && ctx.skip_initializers() {
                debug!(step = %step.name(), "skipping initializer in nested run");
                continue;
            }
            if initializer {
                data.return_val.clear();
            }

            ctx.enter(step.name(), position);
            let candidates_in = data.return_val.len();
            let start = Instant::now();

            data = match step.body() {
                StepBody::Leaf(body) => body.run(data, ctx),
                StepBody::Composite(inner) => inner.run_on(data, ctx),
            }
            .map_err(|e| e.in_step(step.name(), position))?;

            let duration_secs = start.elapsed().as_secs_f64();
            debug!(
                step = %step.name(),
                position,
                candidates = data.return_val.len(),
                features = data.dataset.n_features(),
                duration_secs,
                "step finished"
            );
            ctx.traces.push(StepTrace {
                name: step.name().to_string(),
                position,
                initializer,
                duration_secs,
                candidates_in,
                candidates_out: data.return_val.len(),
                n_features: data.dataset.n_features(),
            });
        }
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Dataset;
    use ndarray::{Array1, Array2};

    fn data() -> PipelineData {
        PipelineData::new(Dataset::new(Array2::zeros((4, 2)), Array1::zeros(4)).unwrap())
    }

    fn tag(label: &'static str) -> PipelineStep {
        PipelineStep::from_fn(label, move |mut data, _| {
            let seen = data.extra.len();
            data.record_extra(label, serde_json::json!(seen));
            Ok(data)
        })
    }

    #[test]
    fn test_empty_pipeline_is_identity() {
        let out = Pipeline::new().run_on(data(), &mut StepContext::new(0, 0)).unwrap();
        assert!(out.extra.is_empty());
        assert_eq!(out.dataset.n_features(), 2);
    }

    #[test]
    fn test_composition_lengths_add_up() {
        let left = Pipeline::new().append_step(tag("a")).unwrap().append_step(tag("b")).unwrap();
        let right = Pipeline::new().append_step(tag("c")).unwrap();

        let combined = left.clone().append_pipeline(right.clone()).unwrap();
        assert_eq!(combined.len(), left.len() + right.len());
        assert_eq!(combined.step_names(), vec!["a", "b", "c"]);
        assert_eq!(left.len(), 2);
    }

    #[test]
    fn test_duplicate_and_blank_names_rejected() {
        let p = Pipeline::new().append_step(tag("a")).unwrap();
        assert!(matches!(
            p.clone().append_step(tag("a")),
            Err(PipelineError::Composition(_))
        ));
        assert!(matches!(
            p.append_step(PipelineStep::from_fn("  ", |d, _| Ok(d))),
            Err(PipelineError::Composition(_))
        ));
    }

    #[test]
    fn test_auto_names_follow_position() {
        let p = Pipeline::new()
            .then_fn(|d, _| Ok(d))
            .unwrap()
            .then_fn(|d, _| Ok(d))
            .unwrap();
        let q = Pipeline::new().then_fn(|d, _| Ok(d)).unwrap();

        let combined = p.append_pipeline(q).unwrap();
        assert_eq!(combined.step_names(), vec!["step#0", "step#1", "step#2"]);
    }

    #[test]
    fn test_steps_run_in_order() {
        let p = Pipeline::new()
            .append_step(tag("first"))
            .unwrap()
            .append_step(tag("second"))
            .unwrap();
        let mut ctx = StepContext::new(0, 0);
        let out = p.run_on(data(), &mut ctx).unwrap();

        assert_eq!(out.extra["first"], serde_json::json!(0));
        assert_eq!(out.extra["second"], serde_json::json!(1));
        assert_eq!(ctx.traces().len(), 2);
    }

    #[test]
    fn test_nested_failure_names_inner_step() {
        let inner = Pipeline::new()
            .append_step(PipelineStep::from_fn("explode", |_, _| {
                Err(PipelineError::Computation("boom".into()))
            }))
            .unwrap();
        let outer = Pipeline::new()
            .append_step(tag("ok"))
            .unwrap()
            .append_step(PipelineStep::nested("group", inner))
            .unwrap();

        let err = outer.run_on(data(), &mut StepContext::new(0, 0)).unwrap_err();
        assert_eq!(err.step_name(), Some("explode"));
        assert_eq!(err.step_position(), Some(("group", 1)));
    }
}
