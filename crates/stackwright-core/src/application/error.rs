//! Application layer errors.
//!
//! These errors represent failures in orchestration, not business logic.
//! Business logic errors are `DomainError` from `crate::domain`.

use std::time::Duration;

use thiserror::Error;

use crate::application::ports::CloudError;
use crate::error::ErrorCategory;

/// Errors that occur while talking to the platform on behalf of a project.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ApplicationError {
    /// An external network was declared but does not exist remotely.
    #[error("External network '{network}' not found")]
    NetworkNotFound { network: String },

    #[error("No external network declared and the account has no default network")]
    NoDefaultNetwork,

    /// A stack with the project's name already exists.
    #[error("Stack '{stack}' already exists; updating an existing deployment is not supported")]
    UnsupportedUpdate { stack: String },

    #[error("{} roles are attached to policy {policy}; cannot pick an execution role", .roles.len())]
    AmbiguousExecutionRole { policy: String, roles: Vec<String> },

    #[error("No role is attached to policy {policy}")]
    NoExecutionRole { policy: String },

    #[error("Stack '{stack}' did not finish within {attempts} polls ({}s)", .bound.as_secs())]
    TimedOut {
        stack: String,
        attempts: u32,
        bound: Duration,
    },

    #[error("Stack '{stack}' ended in {status}")]
    StackFailed { stack: String, status: String },

    #[error("Stack '{stack}' does not exist")]
    StackNotFound { stack: String },

    #[error("Operation on stack '{stack}' was cancelled")]
    Cancelled { stack: String },

    /// Transport failure from the platform, propagated unchanged.
    #[error(transparent)]
    Cloud(#[from] CloudError),
}

impl ApplicationError {
    /// Get user-actionable suggestions.
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Self::NetworkNotFound { network } => vec![
                format!("Check that network '{}' exists in the target account", network),
                "Or drop 'external: true' to use the default network".into(),
            ],
            Self::NoDefaultNetwork => vec![
                "Declare an external 'default' network with the id of an existing VPC".into(),
            ],
            Self::UnsupportedUpdate { stack } => vec![
                format!("Remove the existing deployment first: stackwright down {}", stack),
                "Or deploy under a different project name".into(),
            ],
            Self::AmbiguousExecutionRole { roles, .. } => vec![
                format!("Candidate roles: {}", roles.join(", ")),
                "Set x-aws-task_execution_role on the service".into(),
            ],
            Self::NoExecutionRole { .. } => vec![
                "Create an execution role, or set platform.execution_role = \"synthesize\"".into(),
            ],
            Self::TimedOut { stack, .. } => vec![
                format!("The stack may still be progressing: stackwright ps {}", stack),
                "Raise deploy.poll_attempts for large projects".into(),
            ],
            Self::StackFailed { .. } => vec![
                "Inspect the failed events printed above".into(),
                "Run 'stackwright down' before retrying".into(),
            ],
            Self::StackNotFound { .. } => vec!["Check the project name".into()],
            _ => vec!["Check the error details above".into()],
        }
    }

    /// Get error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NetworkNotFound { .. } | Self::StackNotFound { .. } => ErrorCategory::NotFound,
            Self::UnsupportedUpdate { .. } => ErrorCategory::Conflict,
            Self::NoDefaultNetwork
            | Self::AmbiguousExecutionRole { .. }
            | Self::NoExecutionRole { .. } => ErrorCategory::Configuration,
            Self::TimedOut { .. } | Self::StackFailed { .. } | Self::Cloud(_) => {
                ErrorCategory::Remote
            }
            Self::Cancelled { .. } => ErrorCategory::Internal,
        }
    }
}
