//! Serializable state of the sandbox platform.
//!
//! Stacks progress one resource per event poll: every call to
//! [`SandboxState::advance`] settles the next pending resource and records an
//! event for it. Once every resource is settled the stack itself reaches its
//! terminal status.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stackwright_core::domain::{
    CompiledTemplate, Resource, ResourceKind, StackEvent, StackPhase, StackResource,
};

pub const STACK_TYPE: &str = "AWS::CloudFormation::Stack";
pub const ADDRESS_SUFFIX: &str = "sandbox.local";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SandboxState {
    pub clusters: BTreeSet<String>,
    pub default_vpc: Option<String>,
    /// Network id to subnet ids.
    pub vpcs: BTreeMap<String, Vec<String>>,
    pub roles: BTreeMap<String, SandboxRole>,
    pub stacks: BTreeMap<String, SandboxStack>,
    /// Logical ids that fail when the sandbox tries to create them.
    #[serde(default)]
    pub failing_resources: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxRole {
    pub arn: String,
    pub attached_policies: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Create,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SandboxStack {
    pub id: String,
    pub status: String,
    pub operation: Operation,
    pub parameters: BTreeMap<String, String>,
    pub resources: Vec<SandboxResource>,
    /// Resources settled by the current operation.
    pub settled: usize,
    pub events: Vec<StackEvent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SandboxResource {
    pub logical_id: String,
    pub physical_id: String,
    pub resource_type: String,
    /// Present for compute services.
    pub service: Option<SandboxService>,
    /// Present for load balancers.
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxService {
    pub name: String,
    pub desired_count: u32,
}

impl Default for SandboxState {
    fn default() -> Self {
        Self::seeded(
            Some("vpc-sandbox".to_string()),
            vec!["subnet-sandbox-a".to_string(), "subnet-sandbox-b".to_string()],
        )
    }
}

impl SandboxState {
    /// Empty account whose default network is `default_vpc`.
    pub fn seeded(default_vpc: Option<String>, subnets: Vec<String>) -> Self {
        let mut vpcs = BTreeMap::new();
        if let Some(vpc) = &default_vpc {
            vpcs.insert(vpc.clone(), subnets);
        }
        Self {
            clusters: BTreeSet::new(),
            default_vpc,
            vpcs,
            roles: BTreeMap::new(),
            stacks: BTreeMap::new(),
            failing_resources: BTreeSet::new(),
        }
    }

    pub fn with_vpc(mut self, id: impl Into<String>, subnets: Vec<String>) -> Self {
        self.vpcs.insert(id.into(), subnets);
        self
    }

    pub fn with_role(
        mut self,
        name: impl Into<String>,
        arn: impl Into<String>,
        attached_policies: Vec<String>,
    ) -> Self {
        self.roles.insert(
            name.into(),
            SandboxRole {
                arn: arn.into(),
                attached_policies,
            },
        );
        self
    }

    pub fn with_failing_resource(mut self, logical_id: impl Into<String>) -> Self {
        self.failing_resources.insert(logical_id.into());
        self
    }

    /// A stack that has not been fully deleted.
    pub fn live_stack(&self, name: &str) -> Option<&SandboxStack> {
        self.stacks
            .get(name)
            .filter(|s| s.status != "DELETE_COMPLETE")
    }

    pub fn create_stack(&mut self, name: &str, template: &CompiledTemplate, cluster: &str) {
        let id = format!("arn:sandbox:cloudformation:stack/{name}/{}", Uuid::new_v4());

        let resources = template
            .resources
            .iter()
            .map(|(logical_id, resource)| {
                let kind = resource.kind();
                let physical_id = physical_id(name, cluster, logical_id, kind);
                let (service, address) = match &resource.body {
                    Resource::Service(svc) => (
                        Some(SandboxService {
                            name: svc.service_name.clone(),
                            desired_count: svc.desired_count,
                        }),
                        None,
                    ),
                    Resource::LoadBalancer(lb) => {
                        (None, Some(format!("{}.{ADDRESS_SUFFIX}", lb.name)))
                    }
                    _ => (None, None),
                };
                SandboxResource {
                    logical_id: logical_id.clone(),
                    physical_id,
                    resource_type: kind.type_name().to_string(),
                    service,
                    address,
                }
            })
            .collect();

        let parameters = template
            .parameters
            .iter()
            .map(|(key, p)| (key.clone(), p.default.clone()))
            .collect();

        let mut stack = SandboxStack {
            id,
            status: "CREATE_IN_PROGRESS".to_string(),
            operation: Operation::Create,
            parameters,
            resources,
            settled: 0,
            events: Vec::new(),
        };
        stack.record(STACK_TYPE, name, "CREATE_IN_PROGRESS", Some("User Initiated"));
        self.stacks.insert(name.to_string(), stack);
    }

    /// Settle the next resource of `name`, if any.
    pub fn advance(&mut self, name: &str) {
        let failing = self.failing_resources.clone();
        let Some(stack) = self.stacks.get_mut(name) else {
            return;
        };
        if StackPhase::of(&stack.status).is_terminal() {
            return;
        }

        let (verb, order_from_end) = match stack.operation {
            Operation::Create => ("CREATE", false),
            Operation::Delete => ("DELETE", true),
        };

        if stack.settled < stack.resources.len() {
            let index = if order_from_end {
                stack.resources.len() - 1 - stack.settled
            } else {
                stack.settled
            };
            let resource = &stack.resources[index];
            let (logical_id, resource_type) =
                (resource.logical_id.clone(), resource.resource_type.clone());

            if stack.operation == Operation::Create && failing.contains(&logical_id) {
                stack.record(
                    &resource_type,
                    &logical_id,
                    "CREATE_FAILED",
                    Some("Simulated failure"),
                );
                stack.status = "CREATE_FAILED".to_string();
                stack.record(STACK_TYPE, name, "CREATE_FAILED", None);
                return;
            }

            stack.record(&resource_type, &logical_id, &format!("{verb}_COMPLETE"), None);
            stack.settled += 1;
        }

        if stack.settled == stack.resources.len() {
            stack.status = format!("{verb}_COMPLETE");
            let status = stack.status.clone();
            stack.record(STACK_TYPE, name, &status, None);
        }
    }

    pub fn delete_stack(&mut self, name: &str) {
        if let Some(stack) = self.stacks.get_mut(name) {
            stack.operation = Operation::Delete;
            stack.status = "DELETE_IN_PROGRESS".to_string();
            stack.settled = 0;
            stack.record(STACK_TYPE, name, "DELETE_IN_PROGRESS", Some("User Initiated"));
        }
    }

    /// Services of every live stack whose physical id is in `arns`.
    pub fn services<'a>(
        &'a self,
        arns: &'a [String],
    ) -> impl Iterator<Item = (&'a SandboxStack, &'a SandboxResource, &'a SandboxService)> {
        self.stacks.values().flat_map(move |stack| {
            stack.resources.iter().filter_map(move |resource| {
                let service = resource.service.as_ref()?;
                arns.contains(&resource.physical_id)
                    .then_some((stack, resource, service))
            })
        })
    }
}

impl SandboxStack {
    fn record(&mut self, resource_type: &str, logical_id: &str, status: &str, reason: Option<&str>) {
        let mut event = StackEvent::new(
            format!("{}-{}", self.id, self.events.len() + 1),
            resource_type,
            logical_id,
            status,
        );
        event.reason = reason.map(str::to_string);
        event.timestamp = Some(Utc::now());
        self.events.push(event);
    }

    /// Resources that exist right now.
    pub fn existing_resources(&self) -> Vec<StackResource> {
        let range = match self.operation {
            Operation::Create => 0..self.settled,
            Operation::Delete => 0..self.resources.len() - self.settled,
        };
        self.resources[range]
            .iter()
            .map(|r| StackResource::new(&r.logical_id, &r.physical_id, &r.resource_type))
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.status == "CREATE_COMPLETE"
    }
}

fn physical_id(stack: &str, cluster: &str, logical_id: &str, kind: ResourceKind) -> String {
    match kind {
        ResourceKind::ComputeService => {
            format!("arn:sandbox:ecs:service/{cluster}/{stack}-{logical_id}")
        }
        ResourceKind::LoadBalancer => {
            format!("arn:sandbox:elasticloadbalancing:loadbalancer/net/{stack}/{logical_id}")
        }
        ResourceKind::TargetGroup => {
            format!("arn:sandbox:elasticloadbalancing:targetgroup/{stack}-{logical_id}")
        }
        _ => format!("{stack}-{logical_id}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackwright_core::domain::template::{CompiledResource, LogGroup};

    fn template(names: &[&str]) -> CompiledTemplate {
        let mut t = CompiledTemplate::new("test");
        for name in names {
            t.add_resource(
                *name,
                CompiledResource::new(Resource::LogGroup(LogGroup {
                    log_group_name: name.to_string(),
                })),
            )
            .unwrap();
        }
        t
    }

    #[test]
    fn create_settles_one_resource_per_advance() {
        let mut state = SandboxState::default();
        state.create_stack("demo", &template(&["A", "B"]), "default");

        state.advance("demo");
        assert_eq!(state.stacks["demo"].status, "CREATE_IN_PROGRESS");
        assert_eq!(state.stacks["demo"].existing_resources().len(), 1);

        state.advance("demo");
        assert_eq!(state.stacks["demo"].status, "CREATE_COMPLETE");
        // stack start, A, B, stack complete
        assert_eq!(state.stacks["demo"].events.len(), 4);

        state.advance("demo");
        assert_eq!(state.stacks["demo"].events.len(), 4);
    }

    #[test]
    fn delete_removes_resources_in_reverse() {
        let mut state = SandboxState::default();
        state.create_stack("demo", &template(&["A", "B"]), "default");
        state.advance("demo");
        state.advance("demo");

        state.delete_stack("demo");
        state.advance("demo");
        let last = state.stacks["demo"].events.last().unwrap().clone();
        assert_eq!(last.logical_id, "B");
        assert_eq!(last.status, "DELETE_COMPLETE");

        state.advance("demo");
        assert_eq!(state.stacks["demo"].status, "DELETE_COMPLETE");
        assert!(state.live_stack("demo").is_none());
    }

    #[test]
    fn failing_resource_fails_the_stack() {
        let mut state = SandboxState::default().with_failing_resource("B");
        state.create_stack("demo", &template(&["A", "B"]), "default");
        state.advance("demo");
        state.advance("demo");

        let stack = &state.stacks["demo"];
        assert_eq!(stack.status, "CREATE_FAILED");
        assert!(
            stack
                .events
                .iter()
                .any(|e| e.logical_id == "B" && e.reason.as_deref() == Some("Simulated failure"))
        );
    }

    #[test]
    fn event_ids_are_unique() {
        let mut state = SandboxState::default();
        state.create_stack("demo", &template(&["A", "B", "C"]), "default");
        for _ in 0..5 {
            state.advance("demo");
        }
        let ids: BTreeSet<_> = state.stacks["demo"].events.iter().map(|e| &e.id).collect();
        assert_eq!(ids.len(), state.stacks["demo"].events.len());
    }
}
