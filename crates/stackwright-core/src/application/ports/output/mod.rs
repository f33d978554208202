//! Driven (output) ports - implemented by infrastructure.
//!
//! These traits define what the application needs from the platform.
//! The `stackwright-adapters` crate provides implementations.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{CompiledTemplate, ServiceStatus, StackEvent, StackResource};

/// A failed call to the platform.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{operation} failed: {message}")]
pub struct CloudError {
    pub operation: String,
    pub message: String,
}

impl CloudError {
    pub fn new(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

/// Port for the remote orchestration platform.
///
/// Implemented by:
/// - `stackwright_adapters::sandbox::SandboxCloud` (offline simulation)
///
/// ## Design Notes
///
/// - One call per method, no retries; backoff belongs to the implementation
/// - Cancellation is applied by callers racing these futures
/// - `describe_stack_events` returns events oldest first
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CloudApi: Send + Sync {
    async fn cluster_exists(&self, name: &str) -> Result<bool, CloudError>;

    /// Request cluster creation; does not wait for it to become active.
    async fn create_cluster(&self, name: &str) -> Result<(), CloudError>;

    async fn delete_cluster(&self, name: &str) -> Result<(), CloudError>;

    async fn stack_exists(&self, name: &str) -> Result<bool, CloudError>;

    async fn create_stack(&self, name: &str, template: &CompiledTemplate)
    -> Result<(), CloudError>;

    async fn delete_stack(&self, name: &str) -> Result<(), CloudError>;

    /// Current overall status, e.g. `CREATE_IN_PROGRESS`.
    async fn stack_status(&self, name: &str) -> Result<String, CloudError>;

    async fn describe_stack_events(&self, name: &str) -> Result<Vec<StackEvent>, CloudError>;

    async fn list_stack_resources(&self, name: &str) -> Result<Vec<StackResource>, CloudError>;

    async fn list_stack_parameters(&self, name: &str)
    -> Result<HashMap<String, String>, CloudError>;

    /// Identifier of the account's default network, if it has one.
    async fn default_vpc(&self) -> Result<Option<String>, CloudError>;

    async fn vpc_exists(&self, vpc_id: &str) -> Result<bool, CloudError>;

    async fn subnets(&self, vpc_id: &str) -> Result<Vec<String>, CloudError>;

    /// Names of roles the given managed policy is attached to.
    async fn roles_for_policy(&self, policy_arn: &str) -> Result<Vec<String>, CloudError>;

    async fn role_arn(&self, role_name: &str) -> Result<String, CloudError>;

    /// Externally reachable DNS name of a load balancer.
    async fn load_balancer_address(&self, arn: &str) -> Result<String, CloudError>;

    async fn describe_services(
        &self,
        cluster: &str,
        service_arns: &[String],
    ) -> Result<Vec<ServiceStatus>, CloudError>;
}

/// Port receiving deployment progress.
///
/// Implemented by:
/// - `stackwright_adapters::progress::CollectingSink` (tests, buffering)
/// - `stackwright_adapters::progress::LineWriterSink` (terminal output)
pub trait ProgressSink: Send + Sync {
    fn on_event(&self, event: &StackEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(&StackEvent) + Send + Sync,
{
    fn on_event(&self, event: &StackEvent) {
        self(event)
    }
}
