//! Offline platform adapter.
//!
//! [`SandboxCloud`] implements [`CloudApi`] over an in-memory account that can
//! be persisted to a JSON state file, so separate CLI invocations (`up`, then
//! `ps`, then `down`) observe the same stacks. Nothing leaves the machine.

mod state;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, instrument};

use stackwright_core::application::{CloudApi, CloudError};
use stackwright_core::domain::{
    CompiledTemplate, ServiceStatus, StackEvent, StackResource, naming,
};

pub use state::{Operation, SandboxResource, SandboxRole, SandboxService, SandboxStack, SandboxState};

/// Failures reading or writing the sandbox state file.
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("Failed to read sandbox state {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write sandbox state {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Sandbox state {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Sandbox state lock poisoned")]
    Poisoned,
}

/// In-process stand-in for the platform.
pub struct SandboxCloud {
    state: Mutex<SandboxState>,
    state_file: Option<PathBuf>,
}

impl SandboxCloud {
    /// Sandbox that lives only as long as this value.
    pub fn in_memory(state: SandboxState) -> Self {
        Self {
            state: Mutex::new(state),
            state_file: None,
        }
    }

    /// Load `path` if it exists, otherwise start from `seed`. Every mutation
    /// is written back to `path`.
    pub fn open(path: impl Into<PathBuf>, seed: SandboxState) -> Result<Self, SandboxError> {
        let path = path.into();
        let state = if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|source| SandboxError::Read {
                path: path.clone(),
                source,
            })?;
            serde_json::from_str(&content).map_err(|source| SandboxError::Corrupt {
                path: path.clone(),
                source,
            })?
        } else {
            seed
        };
        debug!(path = %path.display(), "Opened sandbox state");

        Ok(Self {
            state: Mutex::new(state),
            state_file: Some(path),
        })
    }

    pub fn state_file(&self) -> Option<&Path> {
        self.state_file.as_deref()
    }

    /// Copy of the current account.
    pub fn snapshot(&self) -> Result<SandboxState, SandboxError> {
        self.state
            .lock()
            .map(|s| s.clone())
            .map_err(|_| SandboxError::Poisoned)
    }

    fn read<T>(
        &self,
        operation: &str,
        f: impl FnOnce(&SandboxState) -> Result<T, String>,
    ) -> Result<T, CloudError> {
        let state = self
            .state
            .lock()
            .map_err(|_| CloudError::new(operation, SandboxError::Poisoned.to_string()))?;
        f(&state).map_err(|message| CloudError::new(operation, message))
    }

    fn mutate<T>(
        &self,
        operation: &str,
        f: impl FnOnce(&mut SandboxState) -> Result<T, String>,
    ) -> Result<T, CloudError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| CloudError::new(operation, SandboxError::Poisoned.to_string()))?;
        let value = f(&mut state).map_err(|message| CloudError::new(operation, message))?;
        self.persist(&state)
            .map_err(|e| CloudError::new(operation, e.to_string()))?;
        Ok(value)
    }

    fn persist(&self, state: &SandboxState) -> Result<(), SandboxError> {
        let Some(path) = &self.state_file else {
            return Ok(());
        };
        let write_err = |source| SandboxError::Write {
            path: path.clone(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        let json = serde_json::to_string_pretty(state).map_err(|e| SandboxError::Write {
            path: path.clone(),
            source: std::io::Error::other(e),
        })?;
        std::fs::write(path, json).map_err(write_err)
    }
}

fn missing_stack(name: &str) -> String {
    format!("Stack with id {name} does not exist")
}

#[async_trait]
impl CloudApi for SandboxCloud {
    async fn cluster_exists(&self, name: &str) -> Result<bool, CloudError> {
        self.read("DescribeClusters", |s| Ok(s.clusters.contains(name)))
    }

    #[instrument(skip(self))]
    async fn create_cluster(&self, name: &str) -> Result<(), CloudError> {
        self.mutate("CreateCluster", |s| {
            s.clusters.insert(name.to_string());
            Ok(())
        })
    }

    #[instrument(skip(self))]
    async fn delete_cluster(&self, name: &str) -> Result<(), CloudError> {
        self.mutate("DeleteCluster", |s| {
            if s.clusters.remove(name) {
                Ok(())
            } else {
                Err(format!("Cluster {name} not found"))
            }
        })
    }

    async fn stack_exists(&self, name: &str) -> Result<bool, CloudError> {
        self.read("DescribeStacks", |s| Ok(s.live_stack(name).is_some()))
    }

    #[instrument(skip(self, template), fields(resources = template.resource_count()))]
    async fn create_stack(&self, name: &str, template: &CompiledTemplate) -> Result<(), CloudError> {
        self.mutate("CreateStack", |s| {
            if s.live_stack(name).is_some() {
                return Err(format!("Stack [{name}] already exists"));
            }
            let cluster = template
                .parameters
                .get(naming::CLUSTER_PARAMETER)
                .map(|p| p.default.clone())
                .unwrap_or_else(|| "default".to_string());
            s.create_stack(name, template, &cluster);
            Ok(())
        })
    }

    #[instrument(skip(self))]
    async fn delete_stack(&self, name: &str) -> Result<(), CloudError> {
        self.mutate("DeleteStack", |s| {
            if s.live_stack(name).is_none() {
                return Err(missing_stack(name));
            }
            s.delete_stack(name);
            Ok(())
        })
    }

    async fn stack_status(&self, name: &str) -> Result<String, CloudError> {
        self.read("DescribeStacks", |s| {
            s.stacks
                .get(name)
                .map(|stack| stack.status.clone())
                .ok_or_else(|| missing_stack(name))
        })
    }

    async fn describe_stack_events(&self, name: &str) -> Result<Vec<StackEvent>, CloudError> {
        self.mutate("DescribeStackEvents", |s| {
            if !s.stacks.contains_key(name) {
                return Err(missing_stack(name));
            }
            s.advance(name);
            Ok(s.stacks
                .get(name)
                .map(|stack| stack.events.clone())
                .unwrap_or_default())
        })
    }

    async fn list_stack_resources(&self, name: &str) -> Result<Vec<StackResource>, CloudError> {
        self.read("ListStackResources", |s| {
            s.live_stack(name)
                .map(SandboxStack::existing_resources)
                .ok_or_else(|| missing_stack(name))
        })
    }

    async fn list_stack_parameters(
        &self,
        name: &str,
    ) -> Result<HashMap<String, String>, CloudError> {
        self.read("DescribeStacks", |s| {
            s.live_stack(name)
                .map(|stack| stack.parameters.clone().into_iter().collect())
                .ok_or_else(|| missing_stack(name))
        })
    }

    async fn default_vpc(&self) -> Result<Option<String>, CloudError> {
        self.read("DescribeVpcs", |s| Ok(s.default_vpc.clone()))
    }

    async fn vpc_exists(&self, vpc_id: &str) -> Result<bool, CloudError> {
        self.read("DescribeVpcs", |s| Ok(s.vpcs.contains_key(vpc_id)))
    }

    async fn subnets(&self, vpc_id: &str) -> Result<Vec<String>, CloudError> {
        self.read("DescribeSubnets", |s| {
            s.vpcs
                .get(vpc_id)
                .cloned()
                .ok_or_else(|| format!("The vpc ID '{vpc_id}' does not exist"))
        })
    }

    async fn roles_for_policy(&self, policy_arn: &str) -> Result<Vec<String>, CloudError> {
        self.read("ListEntitiesForPolicy", |s| {
            Ok(s.roles
                .iter()
                .filter(|(_, role)| role.attached_policies.iter().any(|p| p == policy_arn))
                .map(|(name, _)| name.clone())
                .collect())
        })
    }

    async fn role_arn(&self, role_name: &str) -> Result<String, CloudError> {
        self.read("GetRole", |s| {
            s.roles
                .get(role_name)
                .map(|role| role.arn.clone())
                .ok_or_else(|| format!("The role with name {role_name} cannot be found"))
        })
    }

    async fn load_balancer_address(&self, arn: &str) -> Result<String, CloudError> {
        self.read("DescribeLoadBalancers", |s| {
            s.stacks
                .values()
                .flat_map(|stack| &stack.resources)
                .find(|r| r.physical_id == arn)
                .and_then(|r| r.address.clone())
                .ok_or_else(|| format!("Load balancer {arn} not found"))
        })
    }

    async fn describe_services(
        &self,
        cluster: &str,
        service_arns: &[String],
    ) -> Result<Vec<ServiceStatus>, CloudError> {
        self.read("DescribeServices", |s| {
            if !s.clusters.contains(cluster) {
                return Err(format!("Cluster {cluster} not found"));
            }
            Ok(s.services(service_arns)
                .map(|(stack, resource, service)| ServiceStatus {
                    id: resource.physical_id.clone(),
                    name: service.name.clone(),
                    desired_count: service.desired_count,
                    running_count: if stack.is_complete() {
                        service.desired_count
                    } else {
                        0
                    },
                    ports: Vec::new(),
                })
                .collect())
        })
    }
}
