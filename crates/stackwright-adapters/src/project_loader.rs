//! Compose-file loader.
//!
//! Parses a compose-style YAML file into the domain [`Project`]. Only the
//! subset of keys that has a meaning on the target platform is read; anything
//! else is ignored.
//!
//! # Supported keys
//!
//! ```yaml
//! name: shop                        # optional, defaults to the directory name
//! services:
//!   api:
//!     image: shop/api:1
//!     ports: ["8080", "53:53/udp", {target: 9000, protocol: tcp}]
//!     networks: [backend]           # omitted means `default`
//!     secrets: [dbpass]
//!     environment: {RUST_LOG: info} # or ["RUST_LOG=info"]
//!     command: ["serve", "--port", "8080"]
//!     healthcheck: {test: ["CMD", "true"], interval: 10s}
//!     deploy:
//!       replicas: 2
//!       resources: {limits: {cpus: "0.5", memory: 1G}}
//!     x-aws-pull_credentials: arn:...
//!     x-aws-task_execution_role: arn:...
//! networks:
//!   default: {external: true, name: vpc-123}
//! secrets:
//!   dbpass: {name: "arn:aws:secretsmanager:...", external: true}
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, instrument};

use stackwright_core::domain::{
    DomainError, HealthCheck, Network, Port, Project, Protocol, ResourceLimits, Secret, Service,
};

// ── File format ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ComposeFile {
    name: Option<String>,
    #[serde(default)]
    services: BTreeMap<String, ComposeService>,
    #[serde(default)]
    networks: BTreeMap<String, Option<ComposeNetwork>>,
    #[serde(default)]
    secrets: BTreeMap<String, ComposeSecret>,
}

#[derive(Debug, Deserialize)]
struct ComposeService {
    image: String,
    #[serde(default)]
    ports: Vec<PortSpec>,
    #[serde(default)]
    networks: Vec<String>,
    #[serde(default)]
    secrets: Vec<SecretRef>,
    #[serde(default)]
    environment: Environment,
    command: Option<CommandSpec>,
    entrypoint: Option<CommandSpec>,
    working_dir: Option<String>,
    user: Option<String>,
    healthcheck: Option<ComposeHealthCheck>,
    deploy: Option<Deploy>,
    #[serde(rename = "x-aws-pull_credentials")]
    pull_credentials: Option<String>,
    #[serde(rename = "x-aws-task_execution_role")]
    task_execution_role: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PortSpec {
    Number(u16),
    Short(String),
    Long {
        target: u16,
        #[serde(default)]
        protocol: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SecretRef {
    Name(String),
    Long { source: String },
}

#[derive(Debug, Default, Deserialize)]
#[serde(untagged)]
enum Environment {
    #[default]
    Empty,
    Map(BTreeMap<String, Option<serde_yaml::Value>>),
    List(Vec<String>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CommandSpec {
    Shell(String),
    Exec(Vec<String>),
}

#[derive(Debug, Deserialize)]
struct ComposeHealthCheck {
    test: Option<CommandSpec>,
    #[serde(default, with = "humantime_serde")]
    interval: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    timeout: Option<Duration>,
    retries: Option<u32>,
    #[serde(default, with = "humantime_serde")]
    start_period: Option<Duration>,
    #[serde(default)]
    disable: bool,
}

#[derive(Debug, Deserialize)]
struct Deploy {
    replicas: Option<u32>,
    resources: Option<Resources>,
}

#[derive(Debug, Deserialize)]
struct Resources {
    limits: Option<Limits>,
}

#[derive(Debug, Deserialize)]
struct Limits {
    cpus: Option<Scalar>,
    memory: Option<Scalar>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Number(f64),
    Text(String),
}

#[derive(Debug, Default, Deserialize)]
struct ComposeNetwork {
    #[serde(default)]
    external: bool,
    name: Option<String>,
}

/// Only pre-existing secrets are supported; `name` is their locator.
#[derive(Debug, Deserialize)]
struct ComposeSecret {
    name: Option<String>,
}

// ── Loader ────────────────────────────────────────────────────────────────────

/// Load the project described by the compose file at `path`.
///
/// # Errors
///
/// Returns [`DomainError::InvalidProject`] if the file cannot be read or
/// parsed, or if a value cannot be mapped onto the project model.
#[instrument(skip(path), fields(path = %path.display()))]
pub fn load(path: &Path) -> Result<Project, DomainError> {
    let content = fs::read_to_string(path).map_err(|e| {
        DomainError::InvalidProject(format!("cannot read '{}': {e}", path.display()))
    })?;

    let fallback = path
        .canonicalize()
        .ok()
        .as_deref()
        .and_then(Path::parent)
        .and_then(Path::file_name)
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "project".to_string());

    parse(&content, &fallback)
}

/// Parse compose YAML. `fallback_name` is used when the file has no `name`.
pub fn parse(content: &str, fallback_name: &str) -> Result<Project, DomainError> {
    let file: ComposeFile = serde_yaml::from_str(content)
        .map_err(|e| DomainError::InvalidProject(format!("invalid compose file: {e}")))?;

    let name = file
        .name
        .clone()
        .unwrap_or_else(|| normalize_project_name(fallback_name));
    let mut project = Project::new(name);

    for (network_name, network) in file.networks {
        let network = network.unwrap_or_default();
        project = project.with_network(if network.external {
            Network::external(
                network_name.clone(),
                network.name.unwrap_or_else(|| network_name.clone()),
            )
        } else {
            Network::managed(network_name)
        });
    }

    for (secret_name, secret) in file.secrets {
        let locator = secret.name.ok_or_else(|| {
            DomainError::InvalidProject(format!(
                "secret '{secret_name}' must set 'name' to the locator of an existing secret"
            ))
        })?;
        project = project.with_secret(Secret::new(secret_name, locator));
    }

    for (service_name, service) in file.services {
        project = project.with_service(convert_service(service_name, service)?);
    }

    debug!(
        project = %project.name,
        services = project.services.len(),
        "compose file parsed"
    );
    Ok(project)
}

fn convert_service(name: String, raw: ComposeService) -> Result<Service, DomainError> {
    let invalid = |what: String| DomainError::InvalidProject(format!("service '{name}': {what}"));

    let mut service = Service::new(name.clone(), raw.image);

    service.ports = raw
        .ports
        .iter()
        .map(|spec| parse_port(spec).map_err(&invalid))
        .collect::<Result<_, _>>()?;
    service.networks = raw.networks;
    service.secrets = raw
        .secrets
        .into_iter()
        .map(|s| match s {
            SecretRef::Name(name) | SecretRef::Long { source: name } => name,
        })
        .collect();
    service.environment = environment(raw.environment).map_err(&invalid)?;
    service.command = raw.command.map(CommandSpec::into_args).unwrap_or_default();
    service.entrypoint = raw.entrypoint.map(CommandSpec::into_args).unwrap_or_default();
    service.working_dir = raw.working_dir;
    service.user = raw.user;
    service.health_check = raw.healthcheck.map(|check| HealthCheck {
        test: check.test.map(CommandSpec::into_test).unwrap_or_default(),
        interval: check.interval,
        timeout: check.timeout,
        retries: check.retries,
        start_period: check.start_period,
        disable: check.disable,
    });
    service.pull_credentials = raw.pull_credentials;
    service.execution_role = raw.task_execution_role;

    if let Some(deploy) = raw.deploy {
        service.replicas = deploy.replicas;
        if let Some(limits) = deploy.resources.and_then(|r| r.limits) {
            service.limits = ResourceLimits {
                cpus: limits.cpus.map(|c| parse_cpus(&c)).transpose().map_err(&invalid)?,
                memory_bytes: limits
                    .memory
                    .map(|m| parse_memory(&m))
                    .transpose()
                    .map_err(&invalid)?,
            };
        }
    }

    Ok(service)
}

impl CommandSpec {
    fn into_args(self) -> Vec<String> {
        match self {
            Self::Shell(line) => line.split_whitespace().map(str::to_string).collect(),
            Self::Exec(args) => args,
        }
    }

    /// A bare string test runs through the shell.
    fn into_test(self) -> Vec<String> {
        match self {
            Self::Shell(line) => vec!["CMD-SHELL".to_string(), line],
            Self::Exec(args) => args,
        }
    }
}

/// `"80"`, `"8080:80"`, `"127.0.0.1:8080:80/udp"` or the long form. Only the
/// container-side port is kept.
fn parse_port(spec: &PortSpec) -> Result<Port, String> {
    let (target, protocol) = match spec {
        PortSpec::Number(port) => (*port, Protocol::Tcp),
        PortSpec::Long { target, protocol } => (
            *target,
            protocol
                .as_deref()
                .map(str::parse::<Protocol>)
                .transpose()
                .map_err(|e: DomainError| e.to_string())?
                .unwrap_or(Protocol::Tcp),
        ),
        PortSpec::Short(text) => {
            let (ports, protocol) = match text.split_once('/') {
                Some((ports, proto)) => (
                    ports,
                    proto.parse::<Protocol>().map_err(|e| e.to_string())?,
                ),
                None => (text.as_str(), Protocol::Tcp),
            };
            let target = ports.rsplit(':').next().unwrap_or(ports);
            if target.contains('-') {
                return Err(format!("port ranges are not supported: '{text}'"));
            }
            let target = target
                .parse::<u16>()
                .map_err(|_| format!("invalid port '{text}'"))?;
            (target, protocol)
        }
    };

    if target == 0 {
        return Err("port 0 cannot be exposed".to_string());
    }
    Ok(Port { target, protocol })
}

fn environment(env: Environment) -> Result<BTreeMap<String, String>, String> {
    match env {
        Environment::Empty => Ok(BTreeMap::new()),
        Environment::Map(map) => map
            .into_iter()
            .map(|(key, value)| {
                let value = match value {
                    None | Some(serde_yaml::Value::Null) => String::new(),
                    Some(serde_yaml::Value::String(s)) => s,
                    Some(serde_yaml::Value::Bool(b)) => b.to_string(),
                    Some(serde_yaml::Value::Number(n)) => n.to_string(),
                    Some(_) => return Err(format!("environment value for '{key}' must be a scalar")),
                };
                Ok((key, value))
            })
            .collect(),
        Environment::List(entries) => Ok(entries
            .into_iter()
            .map(|entry| match entry.split_once('=') {
                Some((key, value)) => (key.to_string(), value.to_string()),
                None => (entry, String::new()),
            })
            .collect()),
    }
}

fn parse_cpus(value: &Scalar) -> Result<f64, String> {
    let cpus = match value {
        Scalar::Number(n) => *n,
        Scalar::Text(text) => text
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("invalid cpus '{text}'"))?,
    };
    if cpus <= 0.0 {
        return Err(format!("cpus must be positive, got {cpus}"));
    }
    Ok(cpus)
}

/// Byte sizes: a plain number, or a number with a `b`, `k`, `m` or `g`
/// suffix (optionally followed by `b`), e.g. `512m`, `1.5GB`.
fn parse_memory(value: &Scalar) -> Result<u64, String> {
    let text = match value {
        Scalar::Number(n) if *n >= 0.0 => return Ok(*n as u64),
        Scalar::Number(n) => return Err(format!("invalid memory '{n}'")),
        Scalar::Text(text) => text.trim().to_ascii_lowercase(),
    };

    let unit_start = text
        .find(|c: char| c.is_ascii_alphabetic())
        .unwrap_or(text.len());
    let (number, unit) = text.split_at(unit_start);
    let multiplier: u64 = match unit.trim_end_matches('b') {
        "" => 1,
        "k" => 1024,
        "m" => 1024 * 1024,
        "g" => 1024 * 1024 * 1024,
        _ => return Err(format!("invalid memory unit in '{text}'")),
    };
    let number = number
        .trim()
        .parse::<f64>()
        .map_err(|_| format!("invalid memory '{text}'"))?;
    Ok((number * multiplier as f64) as u64)
}

/// Directory names may contain characters stack names do not allow.
fn normalize_project_name(name: &str) -> String {
    let normalized: String = name
        .to_ascii_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    normalized.trim_matches('-').to_string()
}
