//! Read-side view of a deployed stack: events, resources, service status.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::template::ResourceKind;

/// One progress event reported by the platform while a stack changes.
///
/// `id` is unique per event and is the deduplication key when polling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackEvent {
    pub id: String,
    pub resource_type: String,
    pub logical_id: String,
    pub status: String,
    pub reason: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl StackEvent {
    pub fn new(
        id: impl Into<String>,
        resource_type: impl Into<String>,
        logical_id: impl Into<String>,
        status: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            resource_type: resource_type.into(),
            logical_id: logical_id.into(),
            status: status.into(),
            reason: None,
            timestamp: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// `<type> "<logical id>" <status> <reason or ->`
    pub fn progress_line(&self) -> String {
        format!(
            "{} {:?} {} {}",
            self.resource_type,
            self.logical_id,
            self.status,
            self.reason.as_deref().unwrap_or("-")
        )
    }
}

impl fmt::Display for StackEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.progress_line())
    }
}

/// Coarse classification of a stack status string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackPhase {
    InProgress,
    Complete,
    Failed,
}

impl StackPhase {
    pub fn of(status: &str) -> Self {
        if status.ends_with("_COMPLETE") {
            Self::Complete
        } else if status.ends_with("_FAILED") {
            Self::Failed
        } else {
            Self::InProgress
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::InProgress)
    }
}

/// A resource that exists in a deployed stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackResource {
    pub logical_id: String,
    pub physical_id: String,
    pub resource_type: String,
}

impl StackResource {
    pub fn new(
        logical_id: impl Into<String>,
        physical_id: impl Into<String>,
        resource_type: impl Into<String>,
    ) -> Self {
        Self {
            logical_id: logical_id.into(),
            physical_id: physical_id.into(),
            resource_type: resource_type.into(),
        }
    }

    pub fn kind(&self) -> ResourceKind {
        ResourceKind::from_type_name(&self.resource_type)
    }
}

/// Runtime state of one deployed service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub id: String,
    pub name: String,
    pub desired_count: u32,
    pub running_count: u32,
    /// Reachable endpoints, `<address>:<port>-><port>/<protocol>`.
    pub ports: Vec<String>,
}

impl ServiceStatus {
    pub fn replicas(&self) -> String {
        format!("{}/{}", self.running_count, self.desired_count)
    }
}
