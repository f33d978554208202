//! The project model: what a compose-style file describes.
//!
//! These types are constructed once from external input (see
//! `stackwright_adapters::project_loader`) and are read-only inputs to
//! compilation. Builders follow the `with_*` convention so tests can assemble
//! projects without a file.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::error::DomainError;
use crate::domain::naming;

/// Name of the network every service joins when it declares none.
pub const DEFAULT_NETWORK: &str = "default";

// ── Protocol ──────────────────────────────────────────────────────────────────

/// Transport protocol of an exposed port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
        }
    }

    /// Upper-case form used in resource names and ingress rules.
    pub const fn as_upper(&self) -> &'static str {
        match self {
            Self::Tcp => "TCP",
            Self::Udp => "UDP",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(Self::Tcp),
            "udp" => Ok(Self::Udp),
            other => Err(DomainError::InvalidProject(format!(
                "unsupported protocol: {other}"
            ))),
        }
    }
}

// ── Port ──────────────────────────────────────────────────────────────────────

/// A port exposed by a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Port {
    pub target: u16,
    pub protocol: Protocol,
}

impl Port {
    pub const fn tcp(target: u16) -> Self {
        Self {
            target,
            protocol: Protocol::Tcp,
        }
    }

    pub const fn udp(target: u16) -> Self {
        Self {
            target,
            protocol: Protocol::Udp,
        }
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.target, self.protocol)
    }
}

// ── Health check ──────────────────────────────────────────────────────────────

/// Command-based container health check.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HealthCheck {
    /// `["CMD", ...]`, `["CMD-SHELL", "..."]` or `["NONE"]`.
    pub test: Vec<String>,
    pub interval: Option<Duration>,
    pub timeout: Option<Duration>,
    pub retries: Option<u32>,
    pub start_period: Option<Duration>,
    pub disable: bool,
}

impl HealthCheck {
    pub fn command(test: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            test: test.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn disabled() -> Self {
        Self {
            disable: true,
            ..Self::default()
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.disable
            && self
                .test
                .first()
                .is_some_and(|first| first.as_str() != "NONE")
    }
}

// ── Resource limits ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResourceLimits {
    /// Fractional vCPUs, e.g. `0.5`.
    pub cpus: Option<f64>,
    pub memory_bytes: Option<u64>,
}

// ── Service ───────────────────────────────────────────────────────────────────

/// One deployable service.
#[derive(Debug, Clone, PartialEq)]
pub struct Service {
    pub name: String,
    pub image: String,
    pub ports: Vec<Port>,
    /// Network memberships; empty means [`DEFAULT_NETWORK`].
    pub networks: Vec<String>,
    /// Names of project-level secrets.
    pub secrets: Vec<String>,
    pub environment: BTreeMap<String, String>,
    pub command: Vec<String>,
    pub entrypoint: Vec<String>,
    pub working_dir: Option<String>,
    pub user: Option<String>,
    pub health_check: Option<HealthCheck>,
    pub replicas: Option<u32>,
    pub limits: ResourceLimits,
    /// Locator of private-registry credentials.
    pub pull_credentials: Option<String>,
    /// Explicit execution role ARN; bypasses role synthesis and discovery.
    pub execution_role: Option<String>,
}

impl Service {
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            ports: Vec::new(),
            networks: Vec::new(),
            secrets: Vec::new(),
            environment: BTreeMap::new(),
            command: Vec::new(),
            entrypoint: Vec::new(),
            working_dir: None,
            user: None,
            health_check: None,
            replicas: None,
            limits: ResourceLimits::default(),
            pull_credentials: None,
            execution_role: None,
        }
    }

    pub fn with_port(mut self, port: Port) -> Self {
        self.ports.push(port);
        self
    }

    pub fn with_network(mut self, network: impl Into<String>) -> Self {
        self.networks.push(network.into());
        self
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secrets.push(secret.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    pub fn with_health_check(mut self, check: HealthCheck) -> Self {
        self.health_check = Some(check);
        self
    }

    pub fn with_replicas(mut self, replicas: u32) -> Self {
        self.replicas = Some(replicas);
        self
    }

    pub fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_pull_credentials(mut self, locator: impl Into<String>) -> Self {
        self.pull_credentials = Some(locator.into());
        self
    }

    pub fn with_execution_role(mut self, arn: impl Into<String>) -> Self {
        self.execution_role = Some(arn.into());
        self
    }

    /// Networks this service is attached to, defaulting to [`DEFAULT_NETWORK`].
    pub fn effective_networks(&self) -> Vec<&str> {
        if self.networks.is_empty() {
            vec![DEFAULT_NETWORK]
        } else {
            self.networks.iter().map(String::as_str).collect()
        }
    }

    pub fn desired_count(&self) -> u32 {
        self.replicas.unwrap_or(1)
    }

    /// Guard against names that cannot be carried through resource names.
    ///
    /// Logical names drop everything but ASCII alphanumerics, so anything
    /// else would be silently lost and could make target group names
    /// ambiguous when decoded.
    pub fn validate_name(&self) -> Result<(), DomainError> {
        check_fragment(&self.name).map_err(|reason| DomainError::InvalidServiceName {
            name: self.name.clone(),
            reason,
        })
    }

    /// Published ports in declaration order with repeats removed.
    pub fn unique_ports(&self) -> Vec<Port> {
        let mut ports: Vec<Port> = Vec::with_capacity(self.ports.len());
        for port in &self.ports {
            if !ports.contains(port) {
                ports.push(*port);
            }
        }
        ports
    }
}

// ── Network ───────────────────────────────────────────────────────────────────

/// A network declared at project level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Network {
    pub name: String,
    /// Pre-existing network, not managed by the deployment.
    pub external: bool,
    /// Identifier of the pre-existing network (e.g. a VPC id).
    pub external_name: Option<String>,
}

impl Network {
    pub fn managed(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            external: false,
            external_name: None,
        }
    }

    pub fn external(name: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            external: true,
            external_name: Some(identifier.into()),
        }
    }

    /// The platform identifier of an external network.
    pub fn identifier(&self) -> &str {
        self.external_name.as_deref().unwrap_or(&self.name)
    }
}

// ── Secret ────────────────────────────────────────────────────────────────────

/// A secret or config value held by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Secret {
    pub name: String,
    /// Resource locator (ARN) of the stored value.
    pub locator: String,
}

impl Secret {
    pub fn new(name: impl Into<String>, locator: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            locator: locator.into(),
        }
    }
}

// ── Project ───────────────────────────────────────────────────────────────────

/// The full application description.
#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    /// Global namespace of every derived resource name; also the stack name.
    pub name: String,
    pub services: Vec<Service>,
    pub networks: BTreeMap<String, Network>,
    pub secrets: BTreeMap<String, Secret>,
}

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            services: Vec::new(),
            networks: BTreeMap::new(),
            secrets: BTreeMap::new(),
        }
    }

    pub fn with_service(mut self, service: Service) -> Self {
        self.services.push(service);
        self
    }

    pub fn with_network(mut self, network: Network) -> Self {
        self.networks.insert(network.name.clone(), network);
        self
    }

    pub fn with_secret(mut self, secret: Secret) -> Self {
        self.secrets.insert(secret.name.clone(), secret);
        self
    }

    pub fn service(&self, name: &str) -> Option<&Service> {
        self.services.iter().find(|s| s.name == name)
    }

    /// Every network that needs a security boundary, sorted by name.
    ///
    /// Declared networks plus [`DEFAULT_NETWORK`] when a service joins it
    /// implicitly.
    pub fn network_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.networks.keys().cloned().collect();
        let implicit_default = self
            .services
            .iter()
            .any(|s| s.effective_networks().contains(&DEFAULT_NETWORK));
        if implicit_default && !self.networks.contains_key(DEFAULT_NETWORK) {
            names.push(DEFAULT_NETWORK.to_string());
            names.sort();
        }
        names
    }

    /// Check every invariant compilation relies on.
    pub fn validate(&self) -> Result<(), DomainError> {
        validate_project_name(&self.name)?;

        if self.services.is_empty() {
            return Err(DomainError::InvalidProject(format!(
                "project '{}' declares no services",
                self.name
            )));
        }

        let mut logical: HashMap<String, &str> = HashMap::new();
        let mut listeners: HashMap<Port, &str> = HashMap::new();
        for service in &self.services {
            service.validate_name()?;

            let name = naming::logical_name(&service.name);
            if let Some(first) = logical.insert(name.clone(), &service.name) {
                return Err(DomainError::DuplicateResourceName {
                    first: first.to_string(),
                    second: service.name.clone(),
                    logical_name: name,
                });
            }

            // The project load balancer holds one listener per port.
            for port in service.unique_ports() {
                if let Some(first) = listeners.insert(port, &service.name) {
                    return Err(DomainError::DuplicatePublishedPort {
                        port: port.to_string(),
                        first: first.to_string(),
                        second: service.name.clone(),
                    });
                }
            }

            for network in service.effective_networks() {
                if network != DEFAULT_NETWORK && !self.networks.contains_key(network) {
                    return Err(DomainError::UnknownNetwork {
                        service: service.name.clone(),
                        network: network.to_string(),
                    });
                }
            }

            for secret in &service.secrets {
                if !self.secrets.contains_key(secret) {
                    return Err(DomainError::UnknownSecret {
                        service: service.name.clone(),
                        secret: secret.clone(),
                    });
                }
            }
        }

        self.validate_networks()
    }

    /// Every network becomes a security group named after it, so network
    /// names obey the same rules as service names.
    fn validate_networks(&self) -> Result<(), DomainError> {
        let names = self.network_names();
        let mut logical: HashMap<String, &str> = HashMap::new();
        for network in &names {
            check_fragment(network).map_err(|reason| DomainError::InvalidNetworkName {
                name: network.clone(),
                reason,
            })?;

            let name = naming::logical_name(network);
            if let Some(first) = logical.insert(name.clone(), network) {
                return Err(DomainError::DuplicateNetworkName {
                    first: first.to_string(),
                    second: network.clone(),
                    logical_name: name,
                });
            }
        }
        Ok(())
    }
}

/// Reason `name` cannot be turned into a logical name fragment, if any.
fn check_fragment(name: &str) -> Result<(), String> {
    let Some(first) = name.chars().next() else {
        return Err("name cannot be empty".into());
    };
    if !first.is_ascii_alphanumeric() {
        return Err("name must start with a letter or digit".into());
    }
    match name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
    {
        Some(bad) => Err(format!("illegal character {bad:?}")),
        None => Ok(()),
    }
}

/// Stack names: a letter followed by letters, digits and hyphens.
fn validate_project_name(name: &str) -> Result<(), DomainError> {
    let mut chars = name.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-');
    if valid {
        Ok(())
    } else {
        Err(DomainError::InvalidProject(format!(
            "project name '{name}' must start with a letter and contain only letters, digits and '-'"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project() -> Project {
        Project::new("demo")
            .with_service(Service::new("front", "nginx").with_port(Port::tcp(80)))
            .with_service(Service::new("back", "app:1").with_network("backend"))
            .with_network(Network::managed("backend"))
    }

    #[test]
    fn valid_project_passes() {
        assert!(project().validate().is_ok());
    }

    #[test]
    fn protocol_parses_case_insensitively() {
        assert_eq!(Protocol::from_str("UDP").unwrap(), Protocol::Udp);
        assert!(Protocol::from_str("sctp").is_err());
    }

    #[test]
    fn service_name_guard_rejects_dots() {
        let err = Service::new("my.svc", "img").validate_name().unwrap_err();
        assert!(matches!(err, DomainError::InvalidServiceName { .. }));
    }

    #[test]
    fn service_name_guard_allows_hyphens() {
        assert!(Service::new("my-svc_2", "img").validate_name().is_ok());
    }

    #[test]
    fn names_differing_only_in_punctuation_collide() {
        let project = Project::new("demo")
            .with_service(Service::new("web-app", "a"))
            .with_service(Service::new("webapp", "b"));

        assert!(matches!(
            project.validate(),
            Err(DomainError::DuplicateResourceName { .. })
        ));
    }

    #[test]
    fn undeclared_network_is_rejected() {
        let project = Project::new("demo").with_service(Service::new("a", "img").with_network("nope"));
        assert_eq!(
            project.validate(),
            Err(DomainError::UnknownNetwork {
                service: "a".into(),
                network: "nope".into()
            })
        );
    }

    #[test]
    fn undeclared_secret_is_rejected() {
        let project = Project::new("demo").with_service(Service::new("a", "img").with_secret("db"));
        assert!(matches!(
            project.validate(),
            Err(DomainError::UnknownSecret { .. })
        ));
    }

    #[test]
    fn project_name_must_be_stack_safe() {
        let project = Project::new("my_project").with_service(Service::new("a", "img"));
        assert!(matches!(
            project.validate(),
            Err(DomainError::InvalidProject(_))
        ));
    }

    #[test]
    fn networks_differing_only_in_punctuation_collide() {
        let project = Project::new("demo")
            .with_service(Service::new("a", "img").with_port(Port::tcp(80)).with_network("back-end"))
            .with_service(Service::new("b", "img").with_port(Port::tcp(81)).with_network("backend"))
            .with_network(Network::managed("back-end"))
            .with_network(Network::managed("backend"));

        assert_eq!(
            project.validate(),
            Err(DomainError::DuplicateNetworkName {
                first: "back-end".into(),
                second: "backend".into(),
                logical_name: "Backend".into(),
            })
        );
    }

    #[test]
    fn network_name_guard_rejects_dots() {
        let project = Project::new("demo")
            .with_service(Service::new("a", "img").with_network("corp.net"))
            .with_network(Network::managed("corp.net"));

        assert!(matches!(
            project.validate(),
            Err(DomainError::InvalidNetworkName { ref name, .. }) if name == "corp.net"
        ));
    }

    #[test]
    fn same_port_published_twice_is_rejected() {
        let project = Project::new("demo")
            .with_service(Service::new("blue", "nginx").with_port(Port::tcp(80)))
            .with_service(Service::new("green", "nginx").with_port(Port::tcp(80)));

        assert_eq!(
            project.validate(),
            Err(DomainError::DuplicatePublishedPort {
                port: "80/tcp".into(),
                first: "blue".into(),
                second: "green".into(),
            })
        );
    }

    #[test]
    fn same_port_on_different_protocols_is_allowed() {
        let project = Project::new("demo")
            .with_service(Service::new("dns", "coredns").with_port(Port::udp(53)))
            .with_service(Service::new("admin", "coredns").with_port(Port::tcp(53)).with_port(Port::tcp(53)));

        assert!(project.validate().is_ok());
    }

    #[test]
    fn implicit_default_network_is_listed() {
        assert_eq!(project().network_names(), vec!["backend", "default"]);
    }

    #[test]
    fn health_check_none_is_disabled() {
        assert!(!HealthCheck::command(["NONE"]).is_enabled());
        assert!(!HealthCheck::disabled().is_enabled());
        assert!(HealthCheck::command(["CMD", "true"]).is_enabled());
    }
}
