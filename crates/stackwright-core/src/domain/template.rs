//! Compiled template model.
//!
//! A [`CompiledTemplate`] is the resource graph produced by the compiler. It
//! serializes to the platform's declarative document format:
//!
//! ```json
//! {
//!   "AWSTemplateFormatVersion": "2010-09-09",
//!   "Parameters": { "ClusterName": { "Type": "String", "Default": "default" } },
//!   "Resources": {
//!     "WebService": { "Type": "AWS::ECS::Service", "Properties": { ... }, "DependsOn": [ ... ] }
//!   }
//! }
//! ```
//!
//! Resources are kept in a sorted map so that compiling the same project twice
//! produces byte-identical documents.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fmt;

use serde::{Serialize, Serializer, ser::SerializeMap};

use crate::domain::error::DomainError;
use crate::domain::policy::PolicyDocument;

pub const FORMAT_VERSION: &str = "2010-09-09";

// ── Expressions ───────────────────────────────────────────────────────────────

/// A property value: a literal or a reference resolved by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expr {
    Literal(String),
    /// `{"Ref": name}`
    Ref(String),
    /// `{"Fn::GetAtt": [name, attribute]}`
    GetAtt(String, String),
}

impl Expr {
    pub fn literal(value: impl Into<String>) -> Self {
        Self::Literal(value.into())
    }

    pub fn reference(name: impl Into<String>) -> Self {
        Self::Ref(name.into())
    }

    pub fn get_att(name: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::GetAtt(name.into(), attribute.into())
    }

    /// The logical resource this expression points at, if any.
    pub fn referenced(&self) -> Option<&str> {
        match self {
            Self::Literal(_) => None,
            Self::Ref(name) | Self::GetAtt(name, _) => Some(name),
        }
    }
}

impl Serialize for Expr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Literal(value) => serializer.serialize_str(value),
            Self::Ref(name) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("Ref", name)?;
                map.end()
            }
            Self::GetAtt(name, attribute) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("Fn::GetAtt", &[name, attribute])?;
                map.end()
            }
        }
    }
}

// ── Resource kinds ────────────────────────────────────────────────────────────

/// Closed set of infrastructure types this crate emits or inspects.
///
/// Deployed resources are classified with [`ResourceKind::from_type_name`];
/// anything else lands in [`ResourceKind::Unrecognized`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    SecurityGroup,
    SecurityGroupIngress,
    LogGroup,
    DiscoveryNamespace,
    DiscoveryService,
    Role,
    TaskDefinition,
    ComputeService,
    Cluster,
    LoadBalancer,
    TargetGroup,
    Listener,
    Unrecognized,
}

impl ResourceKind {
    const ALL: [Self; 12] = [
        Self::SecurityGroup,
        Self::SecurityGroupIngress,
        Self::LogGroup,
        Self::DiscoveryNamespace,
        Self::DiscoveryService,
        Self::Role,
        Self::TaskDefinition,
        Self::ComputeService,
        Self::Cluster,
        Self::LoadBalancer,
        Self::TargetGroup,
        Self::Listener,
    ];

    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::SecurityGroup => "AWS::EC2::SecurityGroup",
            Self::SecurityGroupIngress => "AWS::EC2::SecurityGroupIngress",
            Self::LogGroup => "AWS::Logs::LogGroup",
            Self::DiscoveryNamespace => "AWS::ServiceDiscovery::PrivateDnsNamespace",
            Self::DiscoveryService => "AWS::ServiceDiscovery::Service",
            Self::Role => "AWS::IAM::Role",
            Self::TaskDefinition => "AWS::ECS::TaskDefinition",
            Self::ComputeService => "AWS::ECS::Service",
            Self::Cluster => "AWS::ECS::Cluster",
            Self::LoadBalancer => "AWS::ElasticLoadBalancingV2::LoadBalancer",
            Self::TargetGroup => "AWS::ElasticLoadBalancingV2::TargetGroup",
            Self::Listener => "AWS::ElasticLoadBalancingV2::Listener",
            Self::Unrecognized => "Unrecognized",
        }
    }

    pub fn from_type_name(type_name: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|kind| kind.type_name() == type_name)
            .unwrap_or(Self::Unrecognized)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

// ── Template ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledTemplate {
    #[serde(rename = "AWSTemplateFormatVersion")]
    pub format_version: String,
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "Parameters", skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, Parameter>,
    #[serde(rename = "Resources")]
    pub resources: BTreeMap<String, CompiledResource>,
}

impl CompiledTemplate {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            format_version: FORMAT_VERSION.to_string(),
            description: description.into(),
            parameters: BTreeMap::new(),
            resources: BTreeMap::new(),
        }
    }

    pub fn add_parameter(&mut self, name: impl Into<String>, parameter: Parameter) {
        self.parameters.insert(name.into(), parameter);
    }

    /// Add `resource` under `name`. A name already in use is an error; the
    /// existing resource is kept.
    pub fn add_resource(
        &mut self,
        name: impl Into<String>,
        resource: CompiledResource,
    ) -> Result<(), DomainError> {
        match self.resources.entry(name.into()) {
            Entry::Occupied(entry) => Err(DomainError::DuplicateLogicalId(entry.key().clone())),
            Entry::Vacant(entry) => {
                entry.insert(resource);
                Ok(())
            }
        }
    }

    pub fn resource(&self, name: &str) -> Option<&CompiledResource> {
        self.resources.get(name)
    }

    /// Logical names of every resource of `kind`, in sorted order.
    pub fn names_of(&self, kind: ResourceKind) -> Vec<&str> {
        self.resources
            .iter()
            .filter(|(_, r)| r.body.kind() == kind)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn task_definitions(&self) -> impl Iterator<Item = &TaskDefinition> {
        self.resources.values().filter_map(|r| match &r.body {
            Resource::TaskDefinition(td) => Some(td),
            _ => None,
        })
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// A template input parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Parameter {
    #[serde(rename = "Type")]
    pub parameter_type: String,
    pub default: String,
    pub description: String,
}

impl Parameter {
    pub fn string(default: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            parameter_type: "String".into(),
            default: default.into(),
            description: description.into(),
        }
    }
}

/// A named infrastructure object plus its explicit dependencies.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledResource {
    #[serde(flatten)]
    pub body: Resource,
    #[serde(rename = "DependsOn", skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

impl CompiledResource {
    pub fn new(body: Resource) -> Self {
        Self {
            body,
            depends_on: Vec::new(),
        }
    }

    pub fn depending_on(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.depends_on.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn kind(&self) -> ResourceKind {
        self.body.kind()
    }
}

impl From<Resource> for CompiledResource {
    fn from(body: Resource) -> Self {
        Self::new(body)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "Type", content = "Properties")]
pub enum Resource {
    #[serde(rename = "AWS::EC2::SecurityGroup")]
    SecurityGroup(SecurityGroup),
    #[serde(rename = "AWS::EC2::SecurityGroupIngress")]
    SecurityGroupIngress(SecurityGroupIngress),
    #[serde(rename = "AWS::Logs::LogGroup")]
    LogGroup(LogGroup),
    #[serde(rename = "AWS::ServiceDiscovery::PrivateDnsNamespace")]
    DiscoveryNamespace(PrivateDnsNamespace),
    #[serde(rename = "AWS::ServiceDiscovery::Service")]
    DiscoveryService(DiscoveryService),
    #[serde(rename = "AWS::IAM::Role")]
    Role(Role),
    #[serde(rename = "AWS::ECS::TaskDefinition")]
    TaskDefinition(TaskDefinition),
    #[serde(rename = "AWS::ECS::Service")]
    Service(ComputeService),
    #[serde(rename = "AWS::ElasticLoadBalancingV2::LoadBalancer")]
    LoadBalancer(LoadBalancer),
    #[serde(rename = "AWS::ElasticLoadBalancingV2::TargetGroup")]
    TargetGroup(TargetGroup),
    #[serde(rename = "AWS::ElasticLoadBalancingV2::Listener")]
    Listener(Listener),
}

impl Resource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::SecurityGroup(_) => ResourceKind::SecurityGroup,
            Self::SecurityGroupIngress(_) => ResourceKind::SecurityGroupIngress,
            Self::LogGroup(_) => ResourceKind::LogGroup,
            Self::DiscoveryNamespace(_) => ResourceKind::DiscoveryNamespace,
            Self::DiscoveryService(_) => ResourceKind::DiscoveryService,
            Self::Role(_) => ResourceKind::Role,
            Self::TaskDefinition(_) => ResourceKind::TaskDefinition,
            Self::Service(_) => ResourceKind::ComputeService,
            Self::LoadBalancer(_) => ResourceKind::LoadBalancer,
            Self::TargetGroup(_) => ResourceKind::TargetGroup,
            Self::Listener(_) => ResourceKind::Listener,
        }
    }
}

// ── Networking ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SecurityGroup {
    pub group_description: String,
    pub group_name: String,
    pub security_group_ingress: Vec<IngressRule>,
    pub vpc_id: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct IngressRule {
    pub cidr_ip: String,
    pub description: String,
    pub from_port: u16,
    pub ip_protocol: String,
    pub to_port: u16,
}

/// Allows all traffic between members of one security group.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SecurityGroupIngress {
    pub description: String,
    pub group_id: Expr,
    pub ip_protocol: String,
    pub source_security_group_id: Expr,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

// ── Logging ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct LogGroup {
    pub log_group_name: String,
}

// ── Service discovery ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PrivateDnsNamespace {
    pub name: String,
    pub description: String,
    pub vpc: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DiscoveryService {
    pub name: String,
    pub description: String,
    pub namespace_id: Expr,
    pub dns_config: DnsConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_check_custom_config: Option<HealthCheckCustomConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DnsConfig {
    pub dns_records: Vec<DnsRecord>,
    pub routing_policy: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DnsRecord {
    #[serde(rename = "TTL")]
    pub ttl: u32,
    #[serde(rename = "Type")]
    pub record_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct HealthCheckCustomConfig {
    pub failure_threshold: u32,
}

// ── Identity ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Role {
    pub assume_role_policy_document: PolicyDocument,
    pub managed_policy_arns: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub policies: Vec<InlinePolicy>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct InlinePolicy {
    pub policy_name: String,
    pub policy_document: PolicyDocument,
}

// ── Compute ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TaskDefinition {
    pub family: String,
    pub container_definitions: Vec<ContainerDefinition>,
    pub cpu: String,
    pub memory: String,
    pub network_mode: String,
    pub requires_compatibilities: Vec<String>,
    pub execution_role_arn: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerDefinition {
    pub name: String,
    pub image: String,
    pub essential: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub entry_point: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub environment: Vec<KeyValuePair>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub port_mappings: Vec<PortMapping>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub secrets: Vec<ContainerSecret>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository_credentials: Option<RepositoryCredentials>,
    pub log_configuration: LogConfiguration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_check: Option<ContainerHealthCheck>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct KeyValuePair {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PortMapping {
    pub container_port: u16,
    pub host_port: u16,
    pub protocol: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerSecret {
    pub name: String,
    pub value_from: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RepositoryCredentials {
    pub credentials_parameter: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct LogConfiguration {
    pub log_driver: String,
    pub options: BTreeMap<String, Expr>,
}

/// Container health check; durations are whole seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerHealthCheck {
    pub command: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_period: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ComputeService {
    pub cluster: Expr,
    pub desired_count: u32,
    pub launch_type: String,
    pub network_configuration: NetworkConfiguration,
    pub scheduling_strategy: String,
    pub service_name: String,
    pub task_definition: Expr,
    pub service_registries: Vec<ServiceRegistry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub load_balancers: Vec<ServiceLoadBalancer>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkConfiguration {
    #[serde(rename = "AwsvpcConfiguration")]
    pub awsvpc_configuration: AwsVpcConfiguration,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AwsVpcConfiguration {
    pub assign_public_ip: String,
    pub security_groups: Vec<Expr>,
    pub subnets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceRegistry {
    pub registry_arn: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceLoadBalancer {
    pub container_name: String,
    pub container_port: u16,
    pub target_group_arn: Expr,
}

// ── Load balancing ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct LoadBalancer {
    pub name: String,
    pub scheme: String,
    #[serde(rename = "Type")]
    pub load_balancer_type: String,
    pub subnets: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TargetGroup {
    pub port: u16,
    pub protocol: String,
    pub target_type: String,
    pub vpc_id: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Listener {
    pub load_balancer_arn: Expr,
    pub port: u16,
    pub protocol: String,
    pub default_actions: Vec<ListenerAction>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListenerAction {
    #[serde(rename = "Type")]
    pub action_type: String,
    pub target_group_arn: Expr,
}
