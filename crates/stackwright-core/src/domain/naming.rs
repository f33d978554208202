//! Naming convention for logical resource names.
//!
//! Every logical name in a compiled template is derived here, from the
//! project, service and network names. Target group names double as a wire
//! protocol: deployed stacks are read back by decoding
//! `<Service><PROTO><Port>TargetGroup`, so this module is the only place that
//! pattern is written or parsed.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::domain::error::DomainError;
use crate::domain::project::Protocol;

/// Logical name of the shared log group.
pub const LOG_GROUP: &str = "LogGroup";
/// Logical name of the private DNS namespace.
pub const DISCOVERY_NAMESPACE: &str = "CloudMap";
/// Logical name of the project load balancer.
pub const LOAD_BALANCER: &str = "LoadBalancer";
/// Template parameter carrying the cluster name.
pub const CLUSTER_PARAMETER: &str = "ClusterName";

static TARGET_GROUP_LOGICAL_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+)(TCP|UDP)([0-9]+)TargetGroup$").expect("target group pattern is valid")
});

/// A (service, port, protocol) triple recovered from a target group name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PortBinding {
    /// Lower-cased service part of the name.
    pub service_name: String,
    pub port: u16,
    pub protocol: Protocol,
}

impl fmt::Display for PortBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.service_name, self.port, self.protocol)
    }
}

/// Encode a target group logical name.
///
/// `service` is used verbatim and is expected to already be a logical name
/// (see [`logical_name`]).
pub fn encode(service: &str, protocol: Protocol, port: u16) -> String {
    format!("{service}{}{port}TargetGroup", protocol.as_upper())
}

/// Decode a target group logical name.
///
/// Fails with [`DomainError::MalformedIdentifier`] when `name` does not
/// follow the convention. Callers listing deployed resources treat this as a
/// warning: unrelated resources share the namespace.
pub fn decode(name: &str) -> Result<PortBinding, DomainError> {
    let malformed = || DomainError::MalformedIdentifier(name.to_string());

    let groups = TARGET_GROUP_LOGICAL_NAME
        .captures(name)
        .ok_or_else(malformed)?;

    let protocol = match &groups[2] {
        "TCP" => Protocol::Tcp,
        _ => Protocol::Udp,
    };
    let port = groups[3].parse::<u16>().map_err(|_| malformed())?;

    Ok(PortBinding {
        service_name: groups[1].to_lowercase(),
        port,
        protocol,
    })
}

/// Turn a project-level name into a resource name fragment.
///
/// Drops everything but ASCII alphanumerics and upper-cases the first
/// character: `front-end` becomes `Frontend`.
pub fn logical_name(name: &str) -> String {
    let mut out: String = name.chars().filter(char::is_ascii_alphanumeric).collect();
    if let Some(first) = out.get_mut(0..1) {
        first.make_ascii_uppercase();
    }
    out
}

/// Target group name for a service's exposed port.
pub fn target_group(service: &str, protocol: Protocol, port: u16) -> String {
    encode(&logical_name(service), protocol, port)
}

pub fn listener(service: &str, protocol: Protocol, port: u16) -> String {
    format!("{}{}{port}Listener", logical_name(service), protocol.as_upper())
}

pub fn security_group(network: &str) -> String {
    format!("{}Network", logical_name(network))
}

pub fn security_group_ingress(network: &str) -> String {
    format!("{}NetworkIngress", logical_name(network))
}

pub fn task_definition(service: &str) -> String {
    format!("{}TaskDefinition", logical_name(service))
}

pub fn execution_role(service: &str) -> String {
    format!("{}TaskExecutionRole", logical_name(service))
}

pub fn discovery_entry(service: &str) -> String {
    format!("{}ServiceDiscoveryEntry", logical_name(service))
}

pub fn service(service: &str) -> String {
    format!("{}Service", logical_name(service))
}

/// Name of the log group the project's containers write to.
pub fn log_group_name(project: &str) -> String {
    format!("/docker-compose/{project}")
}

/// Private DNS zone: services resolve as `<service>.<project>.local`.
pub fn discovery_domain(project: &str) -> String {
    format!("{project}.local")
}
