//! Evaluator bridge error types.

use crate::NativeStatus;

/// Error type for evaluator bridge and toolchain operations.
#[derive(Debug, Clone, PartialEq)]
pub enum EvaluatorError {
    /// A native entry point returned a nonzero status.
    Status {
        /// Entry point that reported the status.
        operation: &'static str,
        /// Translated status.
        status: NativeStatus,
    },
    /// A caller-supplied buffer does not match the queried dimensions.
    DimensionMismatch {
        operation: &'static str,
        expected: usize,
        got: usize,
    },
    /// The evaluator module could not be loaded.
    LibraryLoad { path: String, reason: String },
    /// A required entry point is missing from the evaluator module.
    SymbolMissing { symbol: String, reason: String },
    /// The binary data unit could not be opened or closed.
    DataUnit { path: String, code: i32 },
    /// The external decode or build step failed.
    Build { stage: &'static str, detail: String },
    /// Filesystem failure while preparing artifacts.
    Io { path: String, reason: String },
}

impl EvaluatorError {
    /// Returns a semantic error code for programmatic handling.
    pub fn code(&self) -> &'static str {
        match self {
            EvaluatorError::Status { status, .. } => match status {
                NativeStatus::MemoryAllocation => "NATIVE_ALLOCATION",
                NativeStatus::ArrayBound => "NATIVE_ARRAY_BOUND",
                NativeStatus::Evaluation => "NATIVE_EVALUATION",
                NativeStatus::Success | NativeStatus::Unknown(_) => "NATIVE_UNKNOWN",
            },
            EvaluatorError::DimensionMismatch { .. } => "BUFFER_DIMENSION_MISMATCH",
            EvaluatorError::LibraryLoad { .. } => "LIBRARY_LOAD_FAILED",
            EvaluatorError::SymbolMissing { .. } => "LIBRARY_SYMBOL_MISSING",
            EvaluatorError::DataUnit { .. } => "DATA_UNIT_FAILED",
            EvaluatorError::Build { .. } => "BUILD_FAILED",
            EvaluatorError::Io { .. } => "ARTIFACT_IO",
        }
    }

    /// The native status carried by this error, if any.
    pub fn status(&self) -> Option<NativeStatus> {
        match self {
            EvaluatorError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl std::fmt::Display for EvaluatorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvaluatorError::Status { operation, status } => {
                write!(f, "[{}] {} failed: {}", self.code(), operation, status)
            }
            EvaluatorError::DimensionMismatch {
                operation,
                expected,
                got,
            } => write!(
                f,
                "[{}] {}: buffer length must be {} (got {})",
                self.code(),
                operation,
                expected,
                got
            ),
            EvaluatorError::LibraryLoad { path, reason } => {
                write!(f, "[{}] Cannot load {}: {}", self.code(), path, reason)
            }
            EvaluatorError::SymbolMissing { symbol, reason } => {
                write!(f, "[{}] Missing entry point {}: {}", self.code(), symbol, reason)
            }
            EvaluatorError::DataUnit { path, code } => write!(
                f,
                "[{}] Data unit {} failed with code {}",
                self.code(),
                path,
                code
            ),
            EvaluatorError::Build { stage, detail } => {
                write!(f, "[{}] {} failed: {}", self.code(), stage, detail)
            }
            EvaluatorError::Io { path, reason } => {
                write!(f, "[{}] {}: {}", self.code(), path, reason)
            }
        }
    }
}

impl std::error::Error for EvaluatorError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_status() {
        let err = EvaluatorError::Status {
            operation: "cfn",
            status: NativeStatus::Evaluation,
        };
        let msg = err.to_string();
        assert!(msg.contains("NATIVE_EVALUATION"));
        assert!(msg.contains("cfn"));
        assert!(msg.contains("status 3"));
        assert_eq!(err.status(), Some(NativeStatus::Evaluation));
    }

    #[test]
    fn test_error_display_dimension_mismatch() {
        let err = EvaluatorError::DimensionMismatch {
            operation: "grad",
            expected: 4,
            got: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("BUFFER_DIMENSION_MISMATCH"));
        assert!(msg.contains("must be 4 (got 3)"));
        assert_eq!(err.status(), None);
    }

    #[test]
    fn test_error_code() {
        let status = |status| EvaluatorError::Status {
            operation: "x",
            status,
        };
        assert_eq!(status(NativeStatus::MemoryAllocation).code(), "NATIVE_ALLOCATION");
        assert_eq!(status(NativeStatus::ArrayBound).code(), "NATIVE_ARRAY_BOUND");
        assert_eq!(status(NativeStatus::Unknown(5)).code(), "NATIVE_UNKNOWN");
        assert_eq!(
            EvaluatorError::Build {
                stage: "sifdecoder",
                detail: String::new()
            }
            .code(),
            "BUILD_FAILED"
        );
        assert_eq!(
            EvaluatorError::DataUnit {
                path: "OUTSDIF_X.d".to_string(),
                code: 29
            }
            .code(),
            "DATA_UNIT_FAILED"
        );
    }
}
