//! Deploy Service - main application orchestrator.
//!
//! `up` drives one deployment through:
//! 1. Ensure the cluster exists (creation is not awaited)
//! 2. Refuse to touch an existing stack
//! 3. Resolve network and execution roles, then compile
//! 4. Submit the template
//! 5. Poll until the stack reaches a terminal state

use std::collections::HashSet;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::{
    application::{
        ApplicationError,
        ports::{CloudApi, ProgressSink},
        services::{
            network_resolver::NetworkResolver,
            role_resolver::{ExecutionRoleResolver, RoleMode},
            stack_waiter::{DeployOutcome, PollPolicy, StackWaiter, race},
        },
    },
    domain::{self, CompileContext, CompiledTemplate, Project},
    error::StackwrightResult,
};

/// Session-wide settings for deployments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployOptions {
    pub cluster: String,
    pub role_mode: RoleMode,
    pub poll: PollPolicy,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            cluster: "default".to_string(),
            role_mode: RoleMode::default(),
            poll: PollPolicy::default(),
        }
    }
}

/// Main deployment service.
///
/// One instance per session: the execution role cache lives as long as the
/// service does.
pub struct DeployService {
    cloud: Arc<dyn CloudApi>,
    options: DeployOptions,
    networks: NetworkResolver,
    roles: ExecutionRoleResolver,
    waiter: StackWaiter,
}

impl DeployService {
    pub fn new(cloud: Arc<dyn CloudApi>, options: DeployOptions) -> Self {
        Self {
            networks: NetworkResolver::new(Arc::clone(&cloud)),
            roles: ExecutionRoleResolver::new(Arc::clone(&cloud), options.role_mode),
            waiter: StackWaiter::new(Arc::clone(&cloud), options.poll),
            cloud,
            options,
        }
    }

    pub fn options(&self) -> &DeployOptions {
        &self.options
    }

    /// Compile `project` against the live network and role state without
    /// submitting anything.
    #[instrument(skip_all, fields(project = %project.name))]
    pub async fn convert(&self, project: &Project) -> StackwrightResult<CompiledTemplate> {
        project.validate()?;

        let network = self.networks.resolve(project).await?;
        let mut context = CompileContext::new(network, &self.options.cluster);
        for service in &project.services {
            if let Some(arn) = self.roles.resolve(service).await? {
                context.execution_roles.insert(service.name.clone(), arn);
            }
        }

        Ok(domain::compile(project, &context)?)
    }

    /// Deploy `project` as a new stack and wait for it to settle.
    #[instrument(skip_all, fields(project = %project.name, cluster = %self.options.cluster))]
    pub async fn up(
        &self,
        project: &Project,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> StackwrightResult<DeployOutcome> {
        let stack = project.name.as_str();
        project.validate()?;

        self.ensure_cluster(stack, cancel).await?;

        if race(stack, cancel, self.cloud.stack_exists(stack)).await? {
            return Err(ApplicationError::UnsupportedUpdate {
                stack: stack.to_string(),
            }
            .into());
        }

        let template = self.convert(project).await?;
        info!(resources = template.resource_count(), "submitting stack");
        race(stack, cancel, self.cloud.create_stack(stack, &template)).await?;

        Ok(self.waiter.wait(stack, sink, cancel).await?)
    }

    /// Delete the stack named `project_name` and wait for the deletion.
    #[instrument(skip(self, sink, cancel))]
    pub async fn down(
        &self,
        project_name: &str,
        delete_cluster: bool,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> StackwrightResult<DeployOutcome> {
        if !race(project_name, cancel, self.cloud.stack_exists(project_name)).await? {
            return Err(ApplicationError::StackNotFound {
                stack: project_name.to_string(),
            }
            .into());
        }

        // Events of the earlier deployment are not part of this operation.
        let history: HashSet<String> = race(
            project_name,
            cancel,
            self.cloud.describe_stack_events(project_name),
        )
        .await?
        .into_iter()
        .map(|event| event.id)
        .collect();

        race(project_name, cancel, self.cloud.delete_stack(project_name)).await?;
        let outcome = self
            .waiter
            .wait_after(project_name, history, sink, cancel)
            .await?;

        if delete_cluster {
            info!(cluster = %self.options.cluster, "deleting cluster");
            race(
                project_name,
                cancel,
                self.cloud.delete_cluster(&self.options.cluster),
            )
            .await?;
        }

        Ok(outcome)
    }

    async fn ensure_cluster(
        &self,
        stack: &str,
        cancel: &CancellationToken,
    ) -> Result<(), ApplicationError> {
        let cluster = &self.options.cluster;
        if race(stack, cancel, self.cloud.cluster_exists(cluster)).await? {
            return Ok(());
        }

        warn!(%cluster, "cluster does not exist, requesting creation");
        race(stack, cancel, self.cloud.create_cluster(cluster)).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use mockall::predicate::eq;

    use super::*;
    use crate::application::ports::MockCloudApi;
    use crate::domain::{Port, Service, StackEvent};
    use crate::error::StackwrightError;

    fn project() -> Project {
        Project::new("demo").with_service(Service::new("web", "nginx").with_port(Port::tcp(80)))
    }

    fn options() -> DeployOptions {
        DeployOptions {
            poll: PollPolicy::new(5, Duration::from_millis(10)),
            ..DeployOptions::default()
        }
    }

    fn ignore(_: &StackEvent) {}

    #[tokio::test]
    async fn existing_stack_is_rejected_without_create() {
        let mut cloud = MockCloudApi::new();
        cloud.expect_cluster_exists().returning(|_| Ok(true));
        cloud
            .expect_stack_exists()
            .with(eq("demo"))
            .returning(|_| Ok(true));
        cloud.expect_create_stack().never();

        let service = DeployService::new(Arc::new(cloud), options());
        let err = service
            .up(&project(), &ignore, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            StackwrightError::Application(ApplicationError::UnsupportedUpdate { ref stack })
                if stack == "demo"
        ));
    }

    #[tokio::test]
    async fn missing_cluster_is_created_and_not_awaited() {
        let mut cloud = MockCloudApi::new();
        cloud.expect_cluster_exists().returning(|_| Ok(false));
        cloud
            .expect_create_cluster()
            .with(eq("default"))
            .times(1)
            .returning(|_| Ok(()));
        cloud.expect_stack_exists().returning(|_| Ok(false));
        cloud
            .expect_default_vpc()
            .returning(|| Ok(Some("vpc-1".into())));
        cloud
            .expect_subnets()
            .returning(|_| Ok(vec!["subnet-1".into()]));
        cloud
            .expect_create_stack()
            .withf(|name, template| name.to_string() == "demo" && template.resource("WebService").is_some())
            .times(1)
            .returning(|_, _| Ok(()));
        cloud
            .expect_describe_stack_events()
            .returning(|_| Ok(vec![]));
        cloud
            .expect_stack_status()
            .returning(|_| Ok("CREATE_COMPLETE".into()));

        let service = DeployService::new(Arc::new(cloud), options());
        let outcome = service
            .up(&project(), &ignore, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.iterations, 1);
    }

    #[tokio::test]
    async fn invalid_project_fails_before_any_remote_call() {
        let cloud = MockCloudApi::new();
        let service = DeployService::new(Arc::new(cloud), options());

        let err = service
            .up(&Project::new("demo"), &ignore, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StackwrightError::Domain(_)));
    }

    #[tokio::test]
    async fn down_without_stack_is_not_found() {
        let mut cloud = MockCloudApi::new();
        cloud.expect_stack_exists().returning(|_| Ok(false));
        cloud.expect_delete_stack().never();

        let service = DeployService::new(Arc::new(cloud), options());
        let err = service
            .down("demo", false, &ignore, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StackwrightError::Application(ApplicationError::StackNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn down_deletes_stack_then_cluster() {
        let mut cloud = MockCloudApi::new();
        cloud.expect_stack_exists().returning(|_| Ok(true));
        cloud
            .expect_delete_stack()
            .with(eq("demo"))
            .times(1)
            .returning(|_| Ok(()));
        cloud
            .expect_describe_stack_events()
            .returning(|_| Ok(vec![]));
        cloud
            .expect_stack_status()
            .returning(|_| Ok("DELETE_COMPLETE".into()));
        cloud
            .expect_delete_cluster()
            .with(eq("default"))
            .times(1)
            .returning(|_| Ok(()));

        let service = DeployService::new(Arc::new(cloud), options());
        let outcome = service
            .down("demo", true, &ignore, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.status, "DELETE_COMPLETE");
    }

    #[tokio::test]
    async fn down_forwards_only_deletion_events() {
        let created = StackEvent::new("e1", "AWS::ECS::Service", "WebService", "CREATE_COMPLETE");
        let deleted = StackEvent::new("e2", "AWS::ECS::Service", "WebService", "DELETE_COMPLETE");

        let mut cloud = MockCloudApi::new();
        cloud.expect_stack_exists().returning(|_| Ok(true));
        let mut polls = 0;
        cloud.expect_describe_stack_events().returning(move |_| {
            polls += 1;
            if polls == 1 {
                Ok(vec![created.clone()])
            } else {
                Ok(vec![created.clone(), deleted.clone()])
            }
        });
        cloud.expect_delete_stack().times(1).returning(|_| Ok(()));
        cloud
            .expect_stack_status()
            .returning(|_| Ok("DELETE_COMPLETE".into()));

        let forwarded = std::sync::Mutex::new(Vec::new());
        let sink = |event: &StackEvent| forwarded.lock().unwrap().push(event.id.clone());

        let service = DeployService::new(Arc::new(cloud), options());
        let outcome = service
            .down("demo", false, &sink, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.events_forwarded, 1);
        assert_eq!(*forwarded.lock().unwrap(), vec!["e2".to_string()]);
    }

    #[tokio::test]
    async fn discover_mode_references_role_by_arn() {
        let mut cloud = MockCloudApi::new();
        cloud
            .expect_default_vpc()
            .returning(|| Ok(Some("vpc-1".into())));
        cloud.expect_subnets().returning(|_| Ok(vec![]));
        cloud
            .expect_roles_for_policy()
            .times(1)
            .returning(|_| Ok(vec!["exec".into()]));
        cloud
            .expect_role_arn()
            .returning(|_| Ok("arn:aws:iam::1:role/exec".into()));

        let service = DeployService::new(
            Arc::new(cloud),
            DeployOptions {
                role_mode: RoleMode::Discover,
                ..options()
            },
        );
        let project = project().with_service(Service::new("worker", "busybox"));
        let template = service.convert(&project).await.unwrap();

        assert!(template.resource("WebTaskExecutionRole").is_none());
        assert!(template.resource("WorkerTaskExecutionRole").is_none());
    }
}
