//! Error types for pipeline composition and execution

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Main error type for the pipeline framework
///
/// Candidate and trial level variants are recoverable: the step that produced
/// them records the failure on the affected `CandidateResult` and keeps going.
/// Everything else aborts the executor call.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Composition error: {0}")]
    Composition(String),

    #[error("Step '{step}' (position {position}) failed: {source}")]
    StepExecution {
        step: String,
        position: usize,
        #[source]
        source: Box<PipelineError>,
    },

    #[error("Candidate '{model}' failed: {reason}")]
    CandidateEvaluation { model: String, reason: String },

    #[error("Trial {trial} failed: {reason}")]
    SearchTrial { trial: usize, reason: String },

    #[error("Search for '{model}' aborted after {failures} consecutive failed trials")]
    ConsecutiveTrialFailures { model: String, failures: usize },

    #[error("Data error: {0}")]
    Data(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Computation error: {0}")]
    Computation(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Wrap an error raised by a step with the step's identity
    pub fn in_step(self, step: impl Into<String>, position: usize) -> Self {
        PipelineError::StepExecution {
            step: step.into(),
            position,
            source: Box::new(self),
        }
    }

    /// Whether the error is absorbed at candidate/trial level
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PipelineError::CandidateEvaluation { .. }
                | PipelineError::SearchTrial { .. }
                | PipelineError::ConsecutiveTrialFailures { .. }
        )
    }

    /// Name of the innermost failing step, if this is a step failure
    pub fn step_name(&self) -> Option<&str> {
        match self {
            PipelineError::StepExecution { step, source, .. } => {
                Some(source.step_name().unwrap_or(step))
            }
            _ => None,
        }
    }

    /// Outermost step name and position
    pub fn step_position(&self) -> Option<(&str, usize)> {
        match self {
            PipelineError::StepExecution { step, position, .. } => Some((step, *position)),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::Serialization(err.to_string())
    }
}

impl From<ndarray::ShapeError> for PipelineError {
    fn from(err: ndarray::ShapeError) -> Self {
        PipelineError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PipelineError::Data("test error".to_string());
        assert_eq!(err.to_string(), "Data error: test error");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: PipelineError = io_err.into();
        assert!(matches!(err, PipelineError::Io(_)));
    }

    #[test]
    fn test_step_wrapping_keeps_innermost_name() {
        let err = PipelineError::Data("boom".into())
            .in_step("inner", 1)
            .in_step("outer", 3);

        assert_eq!(err.step_name(), Some("inner"));
        assert_eq!(err.step_position(), Some(("outer", 3)));
        assert!(err.to_string().contains("outer"));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_recoverable_variants() {
        let err = PipelineError::CandidateEvaluation {
            model: "knn".into(),
            reason: "singular".into(),
        };
        assert!(err.is_recoverable());
        assert!(PipelineError::SearchTrial { trial: 0, reason: "x".into() }.is_recoverable());
        assert!(!PipelineError::Composition("x".into()).is_recoverable());
    }
}
