//! Model error types.

use sifkit_evaluator::EvaluatorError;

/// Errors that can occur while creating, evaluating or finalizing a model
#[derive(Debug, Clone, PartialEq)]
pub enum ModelError {
    /// Another model is already active in this process
    AlreadyActive { active: String },
    /// The problem specification file could not be resolved
    ProblemNotFound { name: String },
    /// Decoding was skipped but a built artifact is missing
    ArtifactsMissing { path: String },
    /// The external decode/build step failed
    Build(EvaluatorError),
    /// A native call failed during setup
    Setup(EvaluatorError),
    /// A native call failed while evaluating an existing model
    Evaluation(EvaluatorError),
    /// A caller buffer has the wrong length
    DimensionMismatch {
        operation: &'static str,
        expected: usize,
        got: usize,
    },
    /// A constraint index is out of range
    IndexOutOfRange { index: usize, len: usize },
    /// The model has been finalized
    Finalized,
    /// A classification string could not be parsed
    InvalidClassification { value: String, reason: String },
    /// A problem repository could not be listed
    Repository { path: String, reason: String },
}

impl ModelError {
    /// Returns a semantic error code for programmatic handling.
    pub fn code(&self) -> &'static str {
        match self {
            ModelError::AlreadyActive { .. } => "MODEL_ALREADY_ACTIVE",
            ModelError::ProblemNotFound { .. } => "PROBLEM_NOT_FOUND",
            ModelError::ArtifactsMissing { .. } => "ARTIFACTS_MISSING",
            ModelError::Build(_) => "MODEL_BUILD_FAILED",
            ModelError::Setup(_) => "MODEL_SETUP_FAILED",
            ModelError::Evaluation(_) => "MODEL_EVALUATION_FAILED",
            ModelError::DimensionMismatch { .. } => "MODEL_DIMENSION_MISMATCH",
            ModelError::IndexOutOfRange { .. } => "MODEL_INDEX_OUT_OF_RANGE",
            ModelError::Finalized => "MODEL_FINALIZED",
            ModelError::InvalidClassification { .. } => "CLASSIFICATION_INVALID",
            ModelError::Repository { .. } => "REPOSITORY_UNREADABLE",
        }
    }

    /// The underlying evaluator error, if any.
    pub fn evaluator_error(&self) -> Option<&EvaluatorError> {
        match self {
            ModelError::Build(err) | ModelError::Setup(err) | ModelError::Evaluation(err) => {
                Some(err)
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for ModelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelError::AlreadyActive { active } => write!(
                f,
                "[{}] Model {} is still active; finalize it before creating another",
                self.code(),
                active
            ),
            ModelError::ProblemNotFound { name } => {
                write!(f, "[{}] Problem {} not found", self.code(), name)
            }
            ModelError::ArtifactsMissing { path } => write!(
                f,
                "[{}] No decoded problem found at {}; run with decoding enabled",
                self.code(),
                path
            ),
            ModelError::Build(err) => write!(f, "[{}] {}", self.code(), err),
            ModelError::Setup(err) => write!(f, "[{}] {}", self.code(), err),
            ModelError::Evaluation(err) => write!(f, "[{}] {}", self.code(), err),
            ModelError::DimensionMismatch {
                operation,
                expected,
                got,
            } => write!(
                f,
                "[{}] {}: expected length {} (got {})",
                self.code(),
                operation,
                expected,
                got
            ),
            ModelError::IndexOutOfRange { index, len } => write!(
                f,
                "[{}] Index {} out of range (len = {})",
                self.code(),
                index,
                len
            ),
            ModelError::Finalized => write!(f, "[{}] Model has been finalized", self.code()),
            ModelError::InvalidClassification { value, reason } => write!(
                f,
                "[{}] Classification {:?} invalid: {}",
                self.code(),
                value,
                reason
            ),
            ModelError::Repository { path, reason } => write!(
                f,
                "[{}] Cannot read problem repository {}: {}",
                self.code(),
                path,
                reason
            ),
        }
    }
}

impl std::error::Error for ModelError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.evaluator_error()
            .map(|err| err as &(dyn std::error::Error + 'static))
    }
}
