//! Template compiler: project model in, resource graph out.
//!
//! Compilation is a pure function of the project and a [`CompileContext`]
//! holding everything that had to be looked up remotely beforehand. The
//! result is built in a local template and only returned once every service
//! compiled, so a failure never leaks a partial graph.

use std::collections::BTreeMap;

use tracing::{debug, instrument};

use crate::domain::error::DomainError;
use crate::domain::naming;
use crate::domain::policy::{self, EXECUTION_BASELINE_POLICY, PolicyDocument};
use crate::domain::project::{Project, Service};
use crate::domain::task_definition::{self, LAUNCH_TYPE};
use crate::domain::template::{
    AwsVpcConfiguration, CompiledResource, CompiledTemplate, ComputeService, DiscoveryService,
    DnsConfig, DnsRecord, Expr, HealthCheckCustomConfig, IngressRule, InlinePolicy, Listener,
    ListenerAction, LoadBalancer, LogGroup, NetworkConfiguration, Parameter, PrivateDnsNamespace,
    Resource, Role, SecurityGroup, SecurityGroupIngress, ServiceLoadBalancer, ServiceRegistry,
    Tag, TargetGroup,
};

pub const PROJECT_TAG: &str = "stackwright.project";
pub const NETWORK_TAG: &str = "stackwright.network";
pub const SERVICE_TAG: &str = "stackwright.service";

const ANY_SOURCE: &str = "0.0.0.0/0";
const DISCOVERY_TTL: u32 = 300;

/// Virtual network and subnets a deployment lands in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedNetwork {
    pub vpc_id: String,
    pub subnets: Vec<String>,
}

/// Remote facts gathered before compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileContext {
    pub network: ResolvedNetwork,
    /// Default for the `ClusterName` template parameter.
    pub cluster: String,
    /// Pre-existing execution role ARN per service name. Services missing
    /// here (and without an explicit role) get a synthesized role.
    pub execution_roles: BTreeMap<String, String>,
}

impl CompileContext {
    pub fn new(network: ResolvedNetwork, cluster: impl Into<String>) -> Self {
        Self {
            network,
            cluster: cluster.into(),
            execution_roles: BTreeMap::new(),
        }
    }

    pub fn with_execution_role(mut self, service: impl Into<String>, arn: impl Into<String>) -> Self {
        self.execution_roles.insert(service.into(), arn.into());
        self
    }
}

/// Compile `project` into a template.
#[instrument(skip_all, fields(project = %project.name, services = project.services.len()))]
pub fn compile(project: &Project, context: &CompileContext) -> Result<CompiledTemplate, DomainError> {
    project.validate()?;

    let mut template = CompiledTemplate::new(format!(
        "Stack for project {}, generated by stackwright",
        project.name
    ));
    template.add_parameter(
        naming::CLUSTER_PARAMETER,
        Parameter::string(&context.cluster, "Name of the cluster to deploy to"),
    );

    for network in project.network_names() {
        add_security_boundary(&mut template, project, &network, &context.network)?;
    }

    template.add_resource(
        naming::LOG_GROUP,
        Resource::LogGroup(LogGroup {
            log_group_name: naming::log_group_name(&project.name),
        })
        .into(),
    )?;

    template.add_resource(
        naming::DISCOVERY_NAMESPACE,
        Resource::DiscoveryNamespace(PrivateDnsNamespace {
            name: naming::discovery_domain(&project.name),
            description: format!("Service map for project {}", project.name),
            vpc: context.network.vpc_id.clone(),
        })
        .into(),
    )?;

    if project.services.iter().any(|s| !s.ports.is_empty()) {
        template.add_resource(
            naming::LOAD_BALANCER,
            Resource::LoadBalancer(LoadBalancer {
                name: format!("{}-lb", project.name),
                scheme: "internet-facing".into(),
                load_balancer_type: "network".into(),
                subnets: context.network.subnets.clone(),
                tags: vec![Tag::new(PROJECT_TAG, &project.name)],
            })
            .into(),
        )?;
    }

    for service in &project.services {
        add_service(&mut template, project, service, context)?;
    }

    debug!(resources = template.resource_count(), "template compiled");
    Ok(template)
}

fn add_security_boundary(
    template: &mut CompiledTemplate,
    project: &Project,
    network: &str,
    resolved: &ResolvedNetwork,
) -> Result<(), DomainError> {
    let ingress: Vec<IngressRule> = project
        .services
        .iter()
        .filter(|s| s.effective_networks().contains(&network))
        .flat_map(|s| {
            s.unique_ports().into_iter().map(|port| IngressRule {
                cidr_ip: ANY_SOURCE.to_string(),
                description: format!("{}:{}/{}", s.name, port.target, port.protocol),
                from_port: port.target,
                ip_protocol: port.protocol.as_upper().to_string(),
                to_port: port.target,
            })
        })
        .collect();

    let group_name = naming::security_group(network);
    let description = format!("{} Security Group for {} network", project.name, network);

    template.add_resource(
        group_name.clone(),
        Resource::SecurityGroup(SecurityGroup {
            group_description: description.clone(),
            group_name: description,
            security_group_ingress: ingress,
            vpc_id: resolved.vpc_id.clone(),
            tags: vec![
                Tag::new(PROJECT_TAG, &project.name),
                Tag::new(NETWORK_TAG, network),
            ],
        })
        .into(),
    )?;

    template.add_resource(
        naming::security_group_ingress(network),
        Resource::SecurityGroupIngress(SecurityGroupIngress {
            description: format!("Allow communication within network {network}"),
            group_id: Expr::reference(&group_name),
            ip_protocol: "-1".into(),
            source_security_group_id: Expr::reference(&group_name),
        })
        .into(),
    )
}

fn add_service(
    template: &mut CompiledTemplate,
    project: &Project,
    service: &Service,
    context: &CompileContext,
) -> Result<(), DomainError> {
    let known_role = context
        .execution_roles
        .get(&service.name)
        .or(service.execution_role.as_ref());

    let role_name = naming::execution_role(&service.name);
    let role_expr = match known_role {
        Some(arn) => Expr::literal(arn),
        None => Expr::reference(&role_name),
    };

    let task_definition = task_definition::compile(project, service, role_expr)?;

    if known_role.is_none() {
        let policies = policy::synthesize([&task_definition])
            .map(|document| InlinePolicy {
                policy_name: format!("{}GrantAccessToSecrets", naming::logical_name(&service.name)),
                policy_document: document,
            })
            .into_iter()
            .collect();

        template.add_resource(
            role_name,
            Resource::Role(Role {
                assume_role_policy_document: PolicyDocument::task_trust(),
                managed_policy_arns: vec![EXECUTION_BASELINE_POLICY.to_string()],
                policies,
            })
            .into(),
        )?;
    }

    let task_definition_name = naming::task_definition(&service.name);
    template.add_resource(
        task_definition_name.clone(),
        Resource::TaskDefinition(task_definition).into(),
    )?;

    let discovery_name = naming::discovery_entry(&service.name);
    let health_check_enabled = service
        .health_check
        .as_ref()
        .is_some_and(|check| check.is_enabled());
    template.add_resource(
        discovery_name.clone(),
        Resource::DiscoveryService(DiscoveryService {
            name: service.name.clone(),
            description: format!("\"{}\" service discovery entry", service.name),
            namespace_id: Expr::reference(naming::DISCOVERY_NAMESPACE),
            dns_config: DnsConfig {
                dns_records: vec![DnsRecord {
                    ttl: DISCOVERY_TTL,
                    record_type: "A".into(),
                }],
                routing_policy: "MULTIVALUE".into(),
            },
            health_check_custom_config: health_check_enabled
                .then_some(HealthCheckCustomConfig { failure_threshold: 1 }),
        })
        .into(),
    )?;

    let mut load_balancers = Vec::new();
    let mut listeners = Vec::new();
    for port in service.unique_ports() {
        let target_group = naming::target_group(&service.name, port.protocol, port.target);
        let listener = naming::listener(&service.name, port.protocol, port.target);
        let protocol = port.protocol.as_upper().to_string();

        template.add_resource(
            target_group.clone(),
            Resource::TargetGroup(TargetGroup {
                port: port.target,
                protocol: protocol.clone(),
                target_type: "ip".into(),
                vpc_id: context.network.vpc_id.clone(),
                tags: vec![
                    Tag::new(PROJECT_TAG, &project.name),
                    Tag::new(SERVICE_TAG, &service.name),
                ],
            })
            .into(),
        )?;

        template.add_resource(
            listener.clone(),
            Resource::Listener(Listener {
                load_balancer_arn: Expr::reference(naming::LOAD_BALANCER),
                port: port.target,
                protocol,
                default_actions: vec![ListenerAction {
                    action_type: "forward".into(),
                    target_group_arn: Expr::reference(&target_group),
                }],
            })
            .into(),
        )?;

        load_balancers.push(ServiceLoadBalancer {
            container_name: service.name.clone(),
            container_port: port.target,
            target_group_arn: Expr::reference(&target_group),
        });
        listeners.push(listener);
    }

    let compute = ComputeService {
        cluster: Expr::reference(naming::CLUSTER_PARAMETER),
        desired_count: service.desired_count(),
        launch_type: LAUNCH_TYPE.into(),
        network_configuration: NetworkConfiguration {
            awsvpc_configuration: AwsVpcConfiguration {
                assign_public_ip: "ENABLED".into(),
                security_groups: service
                    .effective_networks()
                    .into_iter()
                    .map(|n| Expr::reference(naming::security_group(n)))
                    .collect(),
                subnets: context.network.subnets.clone(),
            },
        },
        scheduling_strategy: "REPLICA".into(),
        service_name: service.name.clone(),
        task_definition: Expr::reference(&task_definition_name),
        service_registries: vec![ServiceRegistry {
            registry_arn: Expr::get_att(&discovery_name, "Arn"),
        }],
        load_balancers,
    };

    template.add_resource(
        naming::service(&service.name),
        CompiledResource::new(Resource::Service(compute)).depending_on(listeners),
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::project::{HealthCheck, Network, Port, Secret};
    use crate::domain::template::ResourceKind;

    fn context() -> CompileContext {
        CompileContext::new(
            ResolvedNetwork {
                vpc_id: "vpc-123".into(),
                subnets: vec!["subnet-a".into(), "subnet-b".into()],
            },
            "default",
        )
    }

    fn project() -> Project {
        Project::new("demo")
            .with_service(
                Service::new("back", "app:1")
                    .with_network("backend")
                    .with_secret("db"),
            )
            .with_service(
                Service::new("front", "nginx")
                    .with_port(Port::tcp(80))
                    .with_network("backend")
                    .with_network("default"),
            )
            .with_network(Network::managed("backend"))
            .with_secret(Secret::new("db", "arn:secret:db"))
    }

    fn body<'a>(template: &'a CompiledTemplate, name: &str) -> &'a Resource {
        &template.resource(name).unwrap().body
    }

    #[test]
    fn compile_is_deterministic() {
        let a = compile(&project(), &context()).unwrap();
        let b = compile(&project(), &context()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_json().unwrap(), b.to_json().unwrap());
    }

    #[test]
    fn one_security_group_per_network_with_aggregated_ingress() {
        let template = compile(&project(), &context()).unwrap();
        assert_eq!(
            template.names_of(ResourceKind::SecurityGroup),
            vec!["BackendNetwork", "DefaultNetwork"]
        );

        let Resource::SecurityGroup(backend) = body(&template, "BackendNetwork") else {
            panic!("expected security group");
        };
        assert_eq!(backend.security_group_ingress.len(), 1);
        let rule = &backend.security_group_ingress[0];
        assert_eq!(rule.cidr_ip, "0.0.0.0/0");
        assert_eq!(rule.description, "front:80/tcp");
        assert_eq!(rule.ip_protocol, "TCP");
        assert_eq!(backend.group_name, "demo Security Group for backend network");
        assert!(template.resource("BackendNetworkIngress").is_some());
    }

    #[test]
    fn networks_sharing_a_logical_name_do_not_compile() {
        let project = Project::new("demo")
            .with_service(Service::new("a", "img").with_port(Port::tcp(80)).with_network("back-end"))
            .with_service(Service::new("b", "img").with_port(Port::tcp(81)).with_network("backend"))
            .with_network(Network::managed("back-end"))
            .with_network(Network::managed("backend"));

        assert!(matches!(
            compile(&project, &context()),
            Err(DomainError::DuplicateNetworkName { ref logical_name, .. }) if logical_name == "Backend"
        ));
    }

    #[test]
    fn network_named_like_a_service_keeps_both_resources() {
        let project = Project::new("demo")
            .with_service(Service::new("web", "nginx").with_network("web"))
            .with_network(Network::managed("web"));
        let template = compile(&project, &context()).unwrap();

        assert!(template.resource("WebNetwork").is_some());
        assert!(template.resource("WebService").is_some());
    }

    #[test]
    fn service_without_ports_compiles_without_ingress_or_load_balancer() {
        let project = Project::new("demo").with_service(Service::new("worker", "busybox"));
        let template = compile(&project, &context()).unwrap();

        let Resource::SecurityGroup(group) = body(&template, "DefaultNetwork") else {
            panic!("expected security group");
        };
        assert!(group.security_group_ingress.is_empty());
        assert!(template.resource(naming::LOAD_BALANCER).is_none());
        assert!(template.resource("WorkerService").is_some());
    }

    #[test]
    fn service_binds_task_definition_networks_and_discovery() {
        let template = compile(&project(), &context()).unwrap();
        let resource = template.resource("FrontService").unwrap();
        let Resource::Service(service) = &resource.body else {
            panic!("expected service");
        };

        assert_eq!(service.desired_count, 1);
        assert_eq!(service.scheduling_strategy, "REPLICA");
        assert_eq!(service.task_definition, Expr::reference("FrontTaskDefinition"));
        assert_eq!(
            service.network_configuration.awsvpc_configuration.security_groups,
            vec![
                Expr::reference("BackendNetwork"),
                Expr::reference("DefaultNetwork")
            ]
        );
        assert_eq!(
            service.service_registries[0].registry_arn,
            Expr::get_att("FrontServiceDiscoveryEntry", "Arn")
        );
        assert_eq!(
            service.load_balancers[0].target_group_arn,
            Expr::reference("FrontTCP80TargetGroup")
        );
        assert_eq!(resource.depends_on, vec!["FrontTCP80Listener"]);
    }

    #[test]
    fn target_group_names_decode_back_to_services() {
        let template = compile(&project(), &context()).unwrap();
        let decoded: Vec<_> = template
            .names_of(ResourceKind::TargetGroup)
            .into_iter()
            .map(|name| naming::decode(name).unwrap())
            .collect();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].service_name, "front");
        assert_eq!(decoded[0].port, 80);
    }

    #[test]
    fn discovery_entry_uses_multivalue_a_records() {
        let template = compile(&project(), &context()).unwrap();
        let Resource::DiscoveryService(entry) = body(&template, "FrontServiceDiscoveryEntry") else {
            panic!("expected discovery entry");
        };
        assert_eq!(entry.dns_config.routing_policy, "MULTIVALUE");
        assert_eq!(entry.dns_config.dns_records[0].ttl, 300);
        assert_eq!(entry.dns_config.dns_records[0].record_type, "A");
        assert!(entry.health_check_custom_config.is_none());
    }

    #[test]
    fn enabled_health_check_adds_discovery_health_config() {
        let project = Project::new("demo").with_service(
            Service::new("web", "nginx").with_health_check(HealthCheck::command(["CMD", "true"])),
        );
        let template = compile(&project, &context()).unwrap();
        let Resource::DiscoveryService(entry) = body(&template, "WebServiceDiscoveryEntry") else {
            panic!("expected discovery entry");
        };
        assert!(entry.health_check_custom_config.is_some());
    }

    #[test]
    fn synthesized_role_carries_secret_policy_only_when_needed() {
        let template = compile(&project(), &context()).unwrap();

        let Resource::Role(back) = body(&template, "BackTaskExecutionRole") else {
            panic!("expected role");
        };
        assert_eq!(back.managed_policy_arns, vec![EXECUTION_BASELINE_POLICY]);
        assert_eq!(back.policies.len(), 1);
        assert_eq!(
            back.policies[0].policy_document.resources().collect::<Vec<_>>(),
            vec!["arn:secret:db"]
        );

        let Resource::Role(front) = body(&template, "FrontTaskExecutionRole") else {
            panic!("expected role");
        };
        assert!(front.policies.is_empty());
    }

    #[test]
    fn known_execution_role_skips_role_resource() {
        let context = context().with_execution_role("front", "arn:aws:iam::1:role/exec");
        let template = compile(&project(), &context).unwrap();

        assert!(template.resource("FrontTaskExecutionRole").is_none());
        let Resource::TaskDefinition(td) = body(&template, "FrontTaskDefinition") else {
            panic!("expected task definition");
        };
        assert_eq!(td.execution_role_arn, Expr::literal("arn:aws:iam::1:role/exec"));
    }

    #[test]
    fn first_failing_service_aborts_compile() {
        use crate::domain::project::ResourceLimits;

        let project = project().with_service(Service::new("huge", "img").with_limits(ResourceLimits {
            cpus: Some(16.0),
            memory_bytes: None,
        }));
        assert!(matches!(
            compile(&project, &context()),
            Err(DomainError::UnsupportedSizing { .. })
        ));
    }

    #[test]
    fn cluster_parameter_defaults_to_context_cluster() {
        let template = compile(&project(), &context().clone()).unwrap();
        assert_eq!(template.parameters[naming::CLUSTER_PARAMETER].default, "default");
    }
}
