//! Step contract and the named wrapper stored in pipelines

use super::context::StepContext;
use super::data::PipelineData;
use super::pipeline::Pipeline;
use crate::error::Result;
use std::fmt;
use std::sync::Arc;

/// A unit of work in a pipeline
pub trait Step: Send + Sync {
    /// Transform the pipeline data
    fn run(&self, data: PipelineData, ctx: &mut StepContext) -> Result<PipelineData>;

    /// Base name used when the step is added without an explicit one
    fn name(&self) -> String;

    /// Whether the step establishes a fresh candidate set
    fn is_initializer(&self) -> bool {
        false
    }

    /// Check the step configuration when it is added to a pipeline
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

type StepFn = dyn Fn(PipelineData, &mut StepContext) -> Result<PipelineData> + Send + Sync;

/// Step backed by a closure
pub struct FnStep {
    name: String,
    func: Box<StepFn>,
}

impl FnStep {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(PipelineData, &mut StepContext) -> Result<PipelineData> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Box::new(func),
        }
    }
}

impl Step for FnStep {
    fn run(&self, data: PipelineData, ctx: &mut StepContext) -> Result<PipelineData> {
        (self.func)(data, ctx)
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

/// What a pipeline step executes
#[derive(Clone)]
pub enum StepBody {
    Leaf(Arc<dyn Step>),
    /// A nested pipeline run inline with the parent's context
    Composite(Pipeline),
}

/// A named step inside a pipeline
#[derive(Clone)]
pub struct PipelineStep {
    pub(crate) name: String,
    pub(crate) body: StepBody,
    initializer: bool,
    /// Base of a generated name, renumbered when the step is appended
    pub(crate) auto_base: Option<String>,
}

impl PipelineStep {
    pub fn new(name: impl Into<String>, step: impl Step + 'static) -> Self {
        Self {
            name: name.into(),
            body: StepBody::Leaf(Arc::new(step)),
            initializer: false,
            auto_base: None,
        }
    }

    /// Wrap a step under a generated `"<step name>#<position>"` name
    pub fn auto(step: impl Step + 'static) -> Self {
        let base = step.name();
        Self {
            name: base.clone(),
            body: StepBody::Leaf(Arc::new(step)),
            initializer: false,
            auto_base: Some(base),
        }
    }

    pub fn from_fn<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(PipelineData, &mut StepContext) -> Result<PipelineData> + Send + Sync + 'static,
    {
        let name = name.into();
        Self::new(name.clone(), FnStep::new(name, func))
    }

    /// Run a whole pipeline as one step
    pub fn nested(name: impl Into<String>, pipeline: Pipeline) -> Self {
        Self {
            name: name.into(),
            body: StepBody::Composite(pipeline),
            initializer: false,
            auto_base: None,
        }
    }

    /// Mark the step as establishing the initial candidate set
    pub fn initializer(mut self, initializer: bool) -> Self {
        self.initializer = initializer;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn body(&self) -> &StepBody {
        &self.body
    }

    /// Explicit flag, or the wrapped step's own declaration
    pub fn is_initializer(&self) -> bool {
        self.initializer
            || match &self.body {
                StepBody::Leaf(step) => step.is_initializer(),
                StepBody::Composite(_) => false,
            }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        match &self.body {
            StepBody::Leaf(step) => step.validate(),
            StepBody::Composite(_) => Ok(()),
        }
    }
}

impl fmt::Debug for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.body {
            StepBody::Leaf(_) => "leaf".to_string(),
            StepBody::Composite(p) => format!("composite({})", p.len()),
        };
        f.debug_struct("PipelineStep")
            .field("name", &self.name)
            .field("body", &kind)
            .field("initializer", &self.is_initializer())
            .finish()
    }
}
