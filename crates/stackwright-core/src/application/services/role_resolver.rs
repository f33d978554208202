//! Execution role lookup with a per-session cache.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{debug, instrument};

use crate::application::{ApplicationError, ports::CloudApi};
use crate::domain::Service;
use crate::domain::policy::EXECUTION_BASELINE_POLICY;

/// How services without an explicit role get one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RoleMode {
    /// Emit a dedicated role resource per service.
    #[default]
    Synthesize,
    /// Reuse the single account role carrying the baseline execution policy.
    Discover,
}

impl fmt::Display for RoleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Synthesize => "synthesize",
            Self::Discover => "discover",
        })
    }
}

impl FromStr for RoleMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "synthesize" => Ok(Self::Synthesize),
            "discover" => Ok(Self::Discover),
            other => Err(format!(
                "unknown execution role mode '{other}' (expected 'synthesize' or 'discover')"
            )),
        }
    }
}

/// Resolves the execution role ARN a service's tasks run under.
///
/// The discovered ARN is cached for the lifetime of this resolver, so one
/// deployment session lists roles at most once.
pub struct ExecutionRoleResolver {
    cloud: Arc<dyn CloudApi>,
    mode: RoleMode,
    discovered: OnceCell<String>,
}

impl ExecutionRoleResolver {
    pub fn new(cloud: Arc<dyn CloudApi>, mode: RoleMode) -> Self {
        Self {
            cloud,
            mode,
            discovered: OnceCell::new(),
        }
    }

    pub fn mode(&self) -> RoleMode {
        self.mode
    }

    /// `Some(arn)` when the service runs under an existing role, `None` when
    /// the compiler should synthesize one.
    #[instrument(skip_all, fields(service = %service.name))]
    pub async fn resolve(&self, service: &Service) -> Result<Option<String>, ApplicationError> {
        if let Some(explicit) = &service.execution_role {
            return Ok(Some(explicit.clone()));
        }

        match self.mode {
            RoleMode::Synthesize => Ok(None),
            RoleMode::Discover => {
                let arn = self
                    .discovered
                    .get_or_try_init(|| self.discover())
                    .await?;
                Ok(Some(arn.clone()))
            }
        }
    }

    async fn discover(&self) -> Result<String, ApplicationError> {
        let roles = self
            .cloud
            .roles_for_policy(EXECUTION_BASELINE_POLICY)
            .await?;

        match roles.len() {
            0 => Err(ApplicationError::NoExecutionRole {
                policy: EXECUTION_BASELINE_POLICY.to_string(),
            }),
            1 => {
                let role = &roles[0];
                let arn = self.cloud.role_arn(role).await?;
                debug!(role = %role, arn = %arn, "discovered execution role");
                Ok(arn)
            }
            _ => Err(ApplicationError::AmbiguousExecutionRole {
                policy: EXECUTION_BASELINE_POLICY.to_string(),
                roles,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use mockall::predicate::eq;

    use super::*;
    use crate::application::ports::MockCloudApi;

    #[tokio::test]
    async fn explicit_role_always_wins() {
        let mut cloud = MockCloudApi::new();
        cloud.expect_roles_for_policy().never();

        let resolver = ExecutionRoleResolver::new(Arc::new(cloud), RoleMode::Discover);
        let service = Service::new("web", "nginx").with_execution_role("arn:explicit");
        assert_eq!(
            resolver.resolve(&service).await.unwrap().as_deref(),
            Some("arn:explicit")
        );
    }

    #[tokio::test]
    async fn synthesize_mode_never_lists_roles() {
        let mut cloud = MockCloudApi::new();
        cloud.expect_roles_for_policy().never();

        let resolver = ExecutionRoleResolver::new(Arc::new(cloud), RoleMode::Synthesize);
        assert_eq!(resolver.resolve(&Service::new("web", "nginx")).await, Ok(None));
    }

    #[tokio::test]
    async fn single_role_is_discovered_once_and_cached() {
        let mut cloud = MockCloudApi::new();
        cloud
            .expect_roles_for_policy()
            .with(eq(EXECUTION_BASELINE_POLICY))
            .times(1)
            .returning(|_| Ok(vec!["exec".into()]));
        cloud
            .expect_role_arn()
            .with(eq("exec"))
            .times(1)
            .returning(|_| Ok("arn:aws:iam::1:role/exec".into()));

        let resolver = ExecutionRoleResolver::new(Arc::new(cloud), RoleMode::Discover);
        for name in ["a", "b", "c"] {
            let arn = resolver.resolve(&Service::new(name, "img")).await.unwrap();
            assert_eq!(arn.as_deref(), Some("arn:aws:iam::1:role/exec"));
        }
    }

    #[tokio::test]
    async fn zero_roles_is_an_error() {
        let mut cloud = MockCloudApi::new();
        cloud.expect_roles_for_policy().returning(|_| Ok(vec![]));

        let resolver = ExecutionRoleResolver::new(Arc::new(cloud), RoleMode::Discover);
        assert!(matches!(
            resolver.resolve(&Service::new("web", "img")).await,
            Err(ApplicationError::NoExecutionRole { .. })
        ));
    }

    #[tokio::test]
    async fn several_roles_are_ambiguous() {
        let mut cloud = MockCloudApi::new();
        cloud
            .expect_roles_for_policy()
            .returning(|_| Ok(vec!["one".into(), "two".into()]));
        cloud.expect_role_arn().never();

        let resolver = ExecutionRoleResolver::new(Arc::new(cloud), RoleMode::Discover);
        let err = resolver
            .resolve(&Service::new("web", "img"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ApplicationError::AmbiguousExecutionRole {
                policy: EXECUTION_BASELINE_POLICY.into(),
                roles: vec!["one".into(), "two".into()],
            }
        );
    }

    #[test]
    fn mode_parses_from_config_strings() {
        assert_eq!("Discover".parse::<RoleMode>().unwrap(), RoleMode::Discover);
        assert!("nope".parse::<RoleMode>().is_err());
    }
}
