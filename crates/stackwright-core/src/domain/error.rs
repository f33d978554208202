// ============================================================================
// domain/error.rs - DOMAIN ERRORS
// ============================================================================

use thiserror::Error;

/// Root domain error type.
///
/// All errors are:
/// - Cloneable (they travel through compile results unchanged)
/// - Categorizable (for CLI display)
/// - Actionable (provides suggestions)
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    // ========================================================================
    // Naming convention
    // ========================================================================
    #[error("malformed target group ID {0:?}")]
    MalformedIdentifier(String),

    // ========================================================================
    // Validation Errors
    // ========================================================================
    #[error("Invalid project: {0}")]
    InvalidProject(String),

    #[error("Invalid service name '{name}': {reason}")]
    InvalidServiceName { name: String, reason: String },

    #[error("Services '{first}' and '{second}' both compile to resource name '{logical_name}'")]
    DuplicateResourceName {
        first: String,
        second: String,
        logical_name: String,
    },

    #[error("Invalid network name '{name}': {reason}")]
    InvalidNetworkName { name: String, reason: String },

    #[error("Networks '{first}' and '{second}' both compile to resource name '{logical_name}Network'")]
    DuplicateNetworkName {
        first: String,
        second: String,
        logical_name: String,
    },

    #[error("Services '{first}' and '{second}' both publish port {port}")]
    DuplicatePublishedPort {
        port: String,
        first: String,
        second: String,
    },

    #[error("Resource '{0}' is defined twice in the template")]
    DuplicateLogicalId(String),

    #[error("Service '{service}' references undeclared network '{network}'")]
    UnknownNetwork { service: String, network: String },

    #[error("Service '{service}' references undeclared secret '{secret}'")]
    UnknownSecret { service: String, secret: String },

    #[error("Service '{service}' requests {cpu_units} CPU units / {memory_mib} MiB, which no task size can satisfy")]
    UnsupportedSizing {
        service: String,
        cpu_units: u32,
        memory_mib: u32,
    },
}

impl DomainError {
    /// Get user-actionable suggestions for fixing this error.
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Self::MalformedIdentifier(id) => vec![
                format!("'{}' does not follow <Service><PROTO><Port>TargetGroup", id),
                "Resources not created by stackwright are ignored".into(),
            ],
            Self::InvalidServiceName { name, .. } => vec![
                format!("Rename service '{}'", name),
                "Use ASCII letters, digits, '-' and '_' only".into(),
            ],
            Self::DuplicateResourceName { first, second, .. } => vec![
                format!(
                    "'{}' and '{}' differ only in case or punctuation",
                    first, second
                ),
                "Rename one of the services".into(),
            ],
            Self::InvalidNetworkName { name, .. } => vec![
                format!("Rename network '{}'", name),
                "Use ASCII letters, digits, '-' and '_' only".into(),
            ],
            Self::DuplicateNetworkName { first, second, .. } => vec![
                format!(
                    "'{}' and '{}' differ only in case or punctuation",
                    first, second
                ),
                "Rename one of the networks".into(),
            ],
            Self::DuplicatePublishedPort { port, second, .. } => vec![
                format!("Only one service can publish {} on the project load balancer", port),
                format!("Publish a different port for '{}'", second),
            ],
            Self::DuplicateLogicalId(name) => vec![
                format!("Two project objects map to '{}'", name),
                "Rename the service or network involved".into(),
            ],
            Self::UnknownNetwork { network, .. } => vec![
                format!("Declare '{}' under the top-level 'networks' key", network),
            ],
            Self::UnknownSecret { secret, .. } => vec![
                format!("Declare '{}' under the top-level 'secrets' key", secret),
                "Secrets must name the ARN of an existing secret".into(),
            ],
            Self::UnsupportedSizing { .. } => vec![
                "Largest supported task size is 4 vCPU / 30 GiB".into(),
                "Lower deploy.resources.limits for this service".into(),
            ],
            Self::InvalidProject(msg) => vec![
                "Check your project file".into(),
                format!("Details: {}", msg),
            ],
        }
    }

    /// Error category for CLI display styling.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::MalformedIdentifier(_) => ErrorCategory::Internal,
            Self::DuplicateResourceName { .. }
            | Self::DuplicateNetworkName { .. }
            | Self::DuplicatePublishedPort { .. }
            | Self::DuplicateLogicalId(_) => ErrorCategory::Conflict,
            Self::UnknownNetwork { .. } | Self::UnknownSecret { .. } => ErrorCategory::NotFound,
            _ => ErrorCategory::Validation,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Conflict,
    NotFound,
    Internal,
}
