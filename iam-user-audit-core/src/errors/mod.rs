//! Error handling module

use std::path::PathBuf;
use thiserror::Error;

use crate::aws::AwsError;

/// Result type alias for operations that can fail with `AuditError`
pub type Result<T> = std::result::Result<T, AuditError>;

/// Failures that abort an audit run or the writing of its report.
///
/// Per-user provider failures never surface here: the engine degrades
/// them to findings instead.
#[derive(Error, Debug)]
pub enum AuditError {
    /// A global provider call failed (user listing, account summary, login profile lookup)
    #[error("Identity provider error: {0}")]
    Provider(#[from] AwsError),

    /// An age threshold that cannot be subtracted from the run's clock
    #[error("Threshold {setting} = {days} days is out of range")]
    InvalidThreshold {
        /// Name of the offending setting
        setting: &'static str,
        /// Requested number of days
        days: i64,
    },

    /// File system operation errors with detailed context
    #[error("File system error during {operation} on path '{path}': {source}")]
    FileSystem {
        /// The operation that failed (e.g., "write")
        operation: String,
        /// The file path involved in the operation
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization errors with context
    #[error("JSON serialization error in {context}: {source}")]
    JsonSerialization {
        /// What was being serialized
        context: String,
        /// The underlying JSON error
        #[source]
        source: serde_json::Error,
    },
}

impl AuditError {
    /// Create a file system error with operation context
    pub(crate) fn file_system(
        operation: impl Into<String>,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::FileSystem {
            operation: operation.into(),
            path: path.into(),
            source,
        }
    }

    /// Create a JSON serialization error with context
    pub(crate) fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::JsonSerialization {
            context: context.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_system_error_creation() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let error = AuditError::file_system("write", "/reports/audit.json", io_error);

        assert!(matches!(error, AuditError::FileSystem { .. }));
        assert!(error.to_string().contains("write"));
        assert!(error.to_string().contains("/reports/audit.json"));
    }

    #[test]
    fn test_provider_error_conversion() {
        let error: AuditError = AwsError::iam("ListUsers", "AccessDenied").into();
        assert_eq!(
            error.to_string(),
            "Identity provider error: IAM ListUsers failed: AccessDenied"
        );
    }
}
