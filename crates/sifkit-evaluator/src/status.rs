//! Native status codes returned by evaluator entry points.

use crate::EvaluatorError;

/// Status reported by every native evaluator entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeStatus {
    /// The call completed.
    Success,
    /// The evaluator could not allocate working memory.
    MemoryAllocation,
    /// An array passed to the evaluator was too small.
    ArrayBound,
    /// The requested quantity could not be computed at the given point.
    Evaluation,
    /// Any other nonzero code.
    Unknown(i32),
}

impl NativeStatus {
    /// Decode a raw status code.
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => NativeStatus::Success,
            1 => NativeStatus::MemoryAllocation,
            2 => NativeStatus::ArrayBound,
            3 => NativeStatus::Evaluation,
            other => NativeStatus::Unknown(other),
        }
    }

    /// The raw status code.
    pub fn code(self) -> i32 {
        match self {
            NativeStatus::Success => 0,
            NativeStatus::MemoryAllocation => 1,
            NativeStatus::ArrayBound => 2,
            NativeStatus::Evaluation => 3,
            NativeStatus::Unknown(code) => code,
        }
    }

    /// Check if the status indicates success.
    pub fn is_success(self) -> bool {
        matches!(self, NativeStatus::Success)
    }

    /// Get a human-readable message.
    pub fn message(self) -> &'static str {
        match self {
            NativeStatus::Success => "success",
            NativeStatus::MemoryAllocation => "memory allocation error",
            NativeStatus::ArrayBound => "array bound error",
            NativeStatus::Evaluation => "evaluation error",
            NativeStatus::Unknown(_) => "unknown error",
        }
    }

    /// Translate a raw status code from `operation` into a result.
    ///
    /// Zero is the only success path; every other code becomes
    /// [`EvaluatorError::Status`].
    pub fn check(code: i32, operation: &'static str) -> Result<(), EvaluatorError> {
        let status = NativeStatus::from_code(code);
        if status.is_success() {
            return Ok(());
        }
        tracing::debug!(
            component = "evaluator",
            operation,
            status = "error",
            status_code = code,
            message = status.message(),
            "Native call reported failure"
        );
        Err(EvaluatorError::Status { operation, status })
    }
}

impl std::fmt::Display for NativeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (status {})", self.message(), self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_code() {
        assert_eq!(NativeStatus::from_code(0), NativeStatus::Success);
        assert_eq!(NativeStatus::from_code(1), NativeStatus::MemoryAllocation);
        assert_eq!(NativeStatus::from_code(2), NativeStatus::ArrayBound);
        assert_eq!(NativeStatus::from_code(3), NativeStatus::Evaluation);
        assert_eq!(NativeStatus::from_code(-7), NativeStatus::Unknown(-7));
        assert_eq!(NativeStatus::from_code(42), NativeStatus::Unknown(42));
    }

    #[test]
    fn test_status_code_is_preserved() {
        for code in [-1, 0, 1, 2, 3, 4, 99] {
            assert_eq!(NativeStatus::from_code(code).code(), code);
        }
    }

    #[test]
    fn test_status_messages() {
        assert_eq!(
            NativeStatus::MemoryAllocation.message(),
            "memory allocation error"
        );
        assert_eq!(NativeStatus::ArrayBound.message(), "array bound error");
        assert_eq!(NativeStatus::Evaluation.message(), "evaluation error");
        assert_eq!(NativeStatus::Unknown(9).message(), "unknown error");
        assert_eq!(
            format!("{}", NativeStatus::Evaluation),
            "evaluation error (status 3)"
        );
    }

    #[test]
    fn test_check_only_accepts_zero() {
        assert!(NativeStatus::check(0, "ufn").is_ok());

        let err = NativeStatus::check(3, "ufn").unwrap_err();
        match err {
            EvaluatorError::Status { operation, status } => {
                assert_eq!(operation, "ufn");
                assert_eq!(status, NativeStatus::Evaluation);
            }
            other => panic!("unexpected error: {other}"),
        }

        let err = NativeStatus::check(17, "csetup").unwrap_err();
        assert!(err.to_string().contains("unknown error"));
        assert!(err.to_string().contains("17"));
    }
}
