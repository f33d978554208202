//! Unified error handling for Stackwright Core.
//!
//! This module provides a unified error type that wraps domain and application
//! errors, with rich context and user-actionable suggestions.

use thiserror::Error;

use crate::application::ApplicationError;
use crate::application::ports::CloudError;
use crate::domain::DomainError;

/// Root error type for Stackwright Core operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StackwrightError {
    /// Errors from the domain layer (project rule violations).
    #[error("{0}")]
    Domain(#[from] DomainError),

    /// Errors from the application layer (orchestration failures).
    #[error("{0}")]
    Application(#[from] ApplicationError),

    /// Configuration or setup errors.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Unexpected internal errors (bugs).
    #[error("Internal error: {message}. This is a bug, please report it.")]
    Internal { message: String },
}

impl From<CloudError> for StackwrightError {
    fn from(err: CloudError) -> Self {
        Self::Application(ApplicationError::Cloud(err))
    }
}

impl StackwrightError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Get user-actionable suggestions for fixing this error.
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Domain(e) => e.suggestions(),
            Self::Application(e) => e.suggestions(),
            Self::Configuration { message } => vec![
                format!("Configuration issue: {}", message),
                "Run 'stackwright config' to inspect the effective settings".into(),
            ],
            Self::Internal { .. } => vec![
                "This appears to be a bug in Stackwright".into(),
                "Please report this issue at: https://github.com/stackwright/stackwright/issues"
                    .into(),
            ],
        }
    }

    /// Get error category for display/styling purposes.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Domain(e) => match e.category() {
                crate::domain::ErrorCategory::Validation => ErrorCategory::Validation,
                crate::domain::ErrorCategory::Conflict => ErrorCategory::Conflict,
                crate::domain::ErrorCategory::NotFound => ErrorCategory::NotFound,
                crate::domain::ErrorCategory::Internal => ErrorCategory::Internal,
            },
            Self::Application(e) => e.category(),
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }

    /// True when the operation was stopped by the caller.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Self::Application(ApplicationError::Cancelled { .. })
        )
    }
}

/// Error categories for UI display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Conflict,
    NotFound,
    Configuration,
    /// The platform rejected or failed an operation.
    Remote,
    Internal,
}

/// Convenient result type alias.
pub type StackwrightResult<T> = Result<T, StackwrightError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_flow_through_wrappers() {
        let err: StackwrightError = DomainError::MalformedIdentifier("x".into()).into();
        assert_eq!(err.category(), ErrorCategory::Internal);

        let err: StackwrightError = ApplicationError::UnsupportedUpdate {
            stack: "demo".into(),
        }
        .into();
        assert_eq!(err.category(), ErrorCategory::Conflict);
        assert!(err.to_string().contains("demo"));
        assert!(!err.suggestions().is_empty());
    }

    #[test]
    fn platform_errors_wrap_as_application_errors() {
        let err: StackwrightError = CloudError::new("DescribeServices", "throttled").into();
        assert!(matches!(
            err,
            StackwrightError::Application(ApplicationError::Cloud(_))
        ));
        assert_eq!(err.category(), ErrorCategory::Remote);
    }

    #[test]
    fn cancellation_is_detectable() {
        let err: StackwrightError = ApplicationError::Cancelled {
            stack: "demo".into(),
        }
        .into();
        assert!(err.is_cancelled());
    }
}
