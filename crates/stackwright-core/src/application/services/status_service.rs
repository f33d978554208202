//! Reconstructs service endpoints from a deployed stack.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::{
    application::{ApplicationError, ports::CloudApi},
    domain::{PortBinding, ResourceKind, ServiceStatus, naming},
    error::StackwrightResult,
};

pub struct StatusService {
    cloud: Arc<dyn CloudApi>,
    cluster: String,
}

impl StatusService {
    /// `cluster` is used when the stack neither owns a cluster nor records
    /// one in its parameters.
    pub fn new(cloud: Arc<dyn CloudApi>, cluster: impl Into<String>) -> Self {
        Self {
            cloud,
            cluster: cluster.into(),
        }
    }

    /// Status of every service deployed by `project_name`.
    ///
    /// Target groups whose names do not decode are logged and skipped.
    #[instrument(skip(self))]
    pub async fn report(&self, project_name: &str) -> StackwrightResult<Vec<ServiceStatus>> {
        if !self.cloud.stack_exists(project_name).await? {
            return Err(ApplicationError::StackNotFound {
                stack: project_name.to_string(),
            }
            .into());
        }

        let resources = self.cloud.list_stack_resources(project_name).await?;

        let mut service_arns = Vec::new();
        let mut target_groups = Vec::new();
        let mut cluster = None;
        let mut load_balancer = None;
        for resource in resources {
            match resource.kind() {
                ResourceKind::ComputeService => service_arns.push(resource.physical_id),
                ResourceKind::Cluster => cluster = Some(resource.physical_id),
                ResourceKind::LoadBalancer => load_balancer = Some(resource.physical_id),
                ResourceKind::TargetGroup => target_groups.push(resource.logical_id),
                _ => {}
            }
        }

        if service_arns.is_empty() {
            debug!("stack has no services");
            return Ok(Vec::new());
        }

        let cluster = match cluster {
            Some(cluster) => cluster,
            None => self
                .cloud
                .list_stack_parameters(project_name)
                .await?
                .remove(naming::CLUSTER_PARAMETER)
                .unwrap_or_else(|| self.cluster.clone()),
        };

        let mut statuses = self
            .cloud
            .describe_services(&cluster, &service_arns)
            .await?;

        let address = match load_balancer {
            Some(arn) => Some(self.cloud.load_balancer_address(&arn).await?),
            None => None,
        };

        let bindings: Vec<PortBinding> = target_groups
            .iter()
            .filter_map(|name| match naming::decode(name) {
                Ok(binding) => Some(binding),
                Err(err) => {
                    warn!(target_group = %name, error = %err, "skipping target group");
                    None
                }
            })
            .collect();

        if let Some(address) = address {
            for status in &mut statuses {
                let key = naming::logical_name(&status.name).to_lowercase();
                status.ports.extend(
                    bindings
                        .iter()
                        .filter(|b| b.service_name == key)
                        .map(|b| {
                            format!("{}:{}->{}/{}", address, b.port, b.port, b.protocol)
                        }),
                );
            }
        }

        Ok(statuses)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use mockall::predicate::eq;

    use super::*;
    use crate::application::ports::{CloudError, MockCloudApi};
    use crate::domain::StackResource;
    use crate::error::StackwrightError;

    fn status(name: &str) -> ServiceStatus {
        ServiceStatus {
            id: format!("arn:svc/{name}"),
            name: name.into(),
            desired_count: 1,
            running_count: 1,
            ports: vec![],
        }
    }

    #[tokio::test]
    async fn endpoint_attaches_only_to_matching_service() {
        let mut cloud = MockCloudApi::new();
        cloud.expect_stack_exists().returning(|_| Ok(true));
        cloud.expect_list_stack_resources().times(1).returning(|_| {
            Ok(vec![
                StackResource::new("FrontService", "arn:svc/front", "AWS::ECS::Service"),
                StackResource::new("BackService", "arn:svc/back", "AWS::ECS::Service"),
                StackResource::new("LoadBalancer", "arn:lb", "AWS::ElasticLoadBalancingV2::LoadBalancer"),
                StackResource::new("FrontTCP80TargetGroup", "arn:tg", "AWS::ElasticLoadBalancingV2::TargetGroup"),
                StackResource::new("Junk", "arn:tg2", "AWS::ElasticLoadBalancingV2::TargetGroup"),
            ])
        });
        cloud.expect_list_stack_parameters().returning(|_| {
            Ok(HashMap::from([("ClusterName".to_string(), "prod".to_string())]))
        });
        cloud
            .expect_describe_services()
            .withf(|cluster, arns| cluster.to_string() == "prod" && arns.len() == 2)
            .returning(|_, _| Ok(vec![status("front"), status("back")]));
        cloud
            .expect_load_balancer_address()
            .with(eq("arn:lb"))
            .times(1)
            .returning(|_| Ok("demo-lb.example.com".into()));

        let service = StatusService::new(Arc::new(cloud), "default");
        let report = service.report("demo").await.unwrap();

        assert_eq!(report.len(), 2);
        assert_eq!(report[0].ports, vec!["demo-lb.example.com:80->80/tcp"]);
        assert!(report[1].ports.is_empty());
    }

    #[tokio::test]
    async fn no_services_is_an_empty_result() {
        let mut cloud = MockCloudApi::new();
        cloud.expect_stack_exists().returning(|_| Ok(true));
        cloud.expect_list_stack_resources().returning(|_| {
            Ok(vec![StackResource::new("LogGroup", "/x", "AWS::Logs::LogGroup")])
        });
        cloud.expect_describe_services().never();

        let service = StatusService::new(Arc::new(cloud), "default");
        assert!(service.report("demo").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cluster_resource_wins_over_parameters() {
        let mut cloud = MockCloudApi::new();
        cloud.expect_stack_exists().returning(|_| Ok(true));
        cloud.expect_list_stack_resources().returning(|_| {
            Ok(vec![
                StackResource::new("Cluster", "own-cluster", "AWS::ECS::Cluster"),
                StackResource::new("WebService", "arn:svc/web", "AWS::ECS::Service"),
            ])
        });
        cloud.expect_list_stack_parameters().never();
        cloud
            .expect_describe_services()
            .withf(|cluster, _| cluster.to_string() == "own-cluster")
            .returning(|_, _| Ok(vec![status("web")]));

        let service = StatusService::new(Arc::new(cloud), "default");
        let report = service.report("demo").await.unwrap();
        assert!(report[0].ports.is_empty());
    }

    #[tokio::test]
    async fn platform_failure_is_reported_unchanged() {
        let mut cloud = MockCloudApi::new();
        cloud.expect_stack_exists().returning(|_| Ok(true));
        cloud.expect_list_stack_resources().returning(|_| {
            Ok(vec![StackResource::new("WebService", "arn:svc/web", "AWS::ECS::Service")])
        });
        cloud
            .expect_list_stack_parameters()
            .returning(|_| Ok(HashMap::new()));
        cloud
            .expect_describe_services()
            .returning(|_, _| Err(CloudError::new("DescribeServices", "throttled")));

        let service = StatusService::new(Arc::new(cloud), "default");
        let err = service.report("demo").await.unwrap_err();
        assert_eq!(
            err,
            StackwrightError::Application(ApplicationError::Cloud(CloudError::new(
                "DescribeServices",
                "throttled"
            )))
        );
    }

    #[tokio::test]
    async fn missing_stack_is_not_found() {
        let mut cloud = MockCloudApi::new();
        cloud.expect_stack_exists().returning(|_| Ok(false));

        let service = StatusService::new(Arc::new(cloud), "default");
        assert!(service.report("demo").await.is_err());
    }
}
