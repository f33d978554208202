//! Container-spec compilation: one task definition per service.

use std::collections::BTreeMap;

use crate::domain::error::DomainError;
use crate::domain::naming;
use crate::domain::project::{HealthCheck, Project, ResourceLimits, Service};
use crate::domain::template::{
    ContainerDefinition, ContainerHealthCheck, ContainerSecret, Expr, KeyValuePair,
    LogConfiguration, PortMapping, RepositoryCredentials, TaskDefinition,
};

pub const NETWORK_MODE: &str = "awsvpc";
pub const LAUNCH_TYPE: &str = "FARGATE";

const MIB: u64 = 1024 * 1024;

/// Valid (CPU units, memory MiB) combinations, smallest first.
const TASK_SIZES: &[(u32, &[u32])] = &[
    (256, &[512, 1024, 2048]),
    (512, &[1024, 2048, 3072, 4096]),
    (
        1024,
        &[2048, 3072, 4096, 5120, 6144, 7168, 8192],
    ),
    (
        2048,
        &[
            4096, 5120, 6144, 7168, 8192, 9216, 10240, 11264, 12288, 13312, 14336, 15360, 16384,
        ],
    ),
    (
        4096,
        &[
            8192, 9216, 10240, 11264, 12288, 13312, 14336, 15360, 16384, 17408, 18432, 19456,
            20480, 21504, 22528, 23552, 24576, 25600, 26624, 27648, 28672, 29696, 30720,
        ],
    ),
];

/// Smallest task size satisfying `limits`.
///
/// Without limits this is 256 CPU units and 512 MiB.
pub fn task_size(service: &str, limits: &ResourceLimits) -> Result<(u32, u32), DomainError> {
    // Requests beyond u32 saturate so they still fail the table lookup.
    let cpu_units = limits.cpus.map_or(0, |cpus| {
        let units = (cpus * 1024.0).ceil();
        if units.is_nan() {
            u32::MAX
        } else {
            units.clamp(0.0, f64::from(u32::MAX)) as u32
        }
    });
    let memory_mib = limits.memory_bytes.map_or(0, |bytes| {
        u32::try_from(bytes.div_ceil(MIB)).unwrap_or(u32::MAX)
    });

    TASK_SIZES
        .iter()
        .filter(|(cpu, _)| *cpu >= cpu_units)
        .find_map(|(cpu, memories)| {
            memories
                .iter()
                .find(|memory| **memory >= memory_mib)
                .map(|memory| (*cpu, *memory))
        })
        .ok_or_else(|| DomainError::UnsupportedSizing {
            service: service.to_string(),
            cpu_units,
            memory_mib,
        })
}

/// Compile the task definition for `service`.
///
/// `execution_role` is either a literal ARN or a reference to a role resource
/// in the same template.
pub fn compile(
    project: &Project,
    service: &Service,
    execution_role: Expr,
) -> Result<TaskDefinition, DomainError> {
    let (cpu, memory) = task_size(&service.name, &service.limits)?;

    let secrets = service
        .secrets
        .iter()
        .map(|name| {
            project
                .secrets
                .get(name)
                .map(|secret| ContainerSecret {
                    name: name.clone(),
                    value_from: secret.locator.clone(),
                })
                .ok_or_else(|| DomainError::UnknownSecret {
                    service: service.name.clone(),
                    secret: name.clone(),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let container = ContainerDefinition {
        name: service.name.clone(),
        image: service.image.clone(),
        essential: true,
        command: service.command.clone(),
        entry_point: service.entrypoint.clone(),
        environment: service
            .environment
            .iter()
            .map(|(name, value)| KeyValuePair {
                name: name.clone(),
                value: value.clone(),
            })
            .collect(),
        port_mappings: service
            .ports
            .iter()
            .map(|port| PortMapping {
                container_port: port.target,
                host_port: port.target,
                protocol: port.protocol.as_str().to_string(),
            })
            .collect(),
        secrets,
        repository_credentials: service
            .pull_credentials
            .as_ref()
            .map(|locator| RepositoryCredentials {
                credentials_parameter: locator.clone(),
            }),
        log_configuration: log_configuration(&project.name),
        health_check: service
            .health_check
            .as_ref()
            .filter(|check| check.is_enabled())
            .map(container_health_check),
        working_directory: service.working_dir.clone(),
        user: service.user.clone(),
    };

    Ok(TaskDefinition {
        family: format!("{}-{}", project.name, service.name),
        container_definitions: vec![container],
        cpu: cpu.to_string(),
        memory: memory.to_string(),
        network_mode: NETWORK_MODE.to_string(),
        requires_compatibilities: vec![LAUNCH_TYPE.to_string()],
        execution_role_arn: execution_role,
    })
}

fn log_configuration(project: &str) -> LogConfiguration {
    let options = BTreeMap::from([
        (
            "awslogs-group".to_string(),
            Expr::reference(naming::LOG_GROUP),
        ),
        (
            "awslogs-region".to_string(),
            Expr::reference("AWS::Region"),
        ),
        (
            "awslogs-stream-prefix".to_string(),
            Expr::literal(project),
        ),
    ]);
    LogConfiguration {
        log_driver: "awslogs".to_string(),
        options,
    }
}

fn container_health_check(check: &HealthCheck) -> ContainerHealthCheck {
    ContainerHealthCheck {
        command: check.test.clone(),
        interval: check.interval.map(|d| d.as_secs()),
        timeout: check.timeout.map(|d| d.as_secs()),
        retries: check.retries,
        start_period: check.start_period.map(|d| d.as_secs()),
    }
}
