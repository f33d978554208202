//! Decides which virtual network and subnets a deployment lands in.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::application::{ApplicationError, ports::CloudApi};
use crate::domain::{DEFAULT_NETWORK, Project, ResolvedNetwork};

/// Two-branch network resolution: reuse an external `default` network, or
/// fall back to the account's default network.
///
/// Holds no state between calls; caching belongs to the caller.
pub struct NetworkResolver {
    cloud: Arc<dyn CloudApi>,
}

impl NetworkResolver {
    pub fn new(cloud: Arc<dyn CloudApi>) -> Self {
        Self { cloud }
    }

    /// Identifier of the network the project deploys into.
    #[instrument(skip_all, fields(project = %project.name))]
    pub async fn resolve_vpc(&self, project: &Project) -> Result<String, ApplicationError> {
        if let Some(network) = project
            .networks
            .get(DEFAULT_NETWORK)
            .filter(|n| n.external)
        {
            let id = network.identifier().to_string();
            debug!(vpc = %id, "checking external network");
            if !self.cloud.vpc_exists(&id).await? {
                return Err(ApplicationError::NetworkNotFound { network: id });
            }
            return Ok(id);
        }

        let id = self
            .cloud
            .default_vpc()
            .await?
            .ok_or(ApplicationError::NoDefaultNetwork)?;
        debug!(vpc = %id, "using default network");
        Ok(id)
    }

    /// Network plus its subnets.
    pub async fn resolve(&self, project: &Project) -> Result<ResolvedNetwork, ApplicationError> {
        let vpc_id = self.resolve_vpc(project).await?;
        let subnets = self.cloud.subnets(&vpc_id).await?;
        Ok(ResolvedNetwork { vpc_id, subnets })
    }
}

#[cfg(test)]
mod tests {
    use mockall::predicate::eq;

    use super::*;
    use crate::application::ports::MockCloudApi;
    use crate::domain::{Network, Service};

    fn project() -> Project {
        Project::new("demo").with_service(Service::new("web", "nginx"))
    }

    #[tokio::test]
    async fn external_default_network_is_verified_and_reused() {
        let mut cloud = MockCloudApi::new();
        cloud
            .expect_vpc_exists()
            .with(eq("vpc-ext"))
            .times(1)
            .returning(|_| Ok(true));
        cloud.expect_default_vpc().never();

        let project = project().with_network(Network::external("default", "vpc-ext"));
        let resolver = NetworkResolver::new(Arc::new(cloud));
        assert_eq!(resolver.resolve_vpc(&project).await.unwrap(), "vpc-ext");
    }

    #[tokio::test]
    async fn missing_external_network_fails() {
        let mut cloud = MockCloudApi::new();
        cloud.expect_vpc_exists().returning(|_| Ok(false));

        let project = project().with_network(Network::external("default", "vpc-gone"));
        let resolver = NetworkResolver::new(Arc::new(cloud));
        assert_eq!(
            resolver.resolve_vpc(&project).await,
            Err(ApplicationError::NetworkNotFound {
                network: "vpc-gone".into()
            })
        );
    }

    #[tokio::test]
    async fn falls_back_to_default_network() {
        let mut cloud = MockCloudApi::new();
        cloud.expect_vpc_exists().never();
        cloud
            .expect_default_vpc()
            .returning(|| Ok(Some("vpc-default".into())));
        cloud
            .expect_subnets()
            .with(eq("vpc-default"))
            .returning(|_| Ok(vec!["subnet-1".into()]));

        let resolver = NetworkResolver::new(Arc::new(cloud));
        let resolved = resolver.resolve(&project()).await.unwrap();
        assert_eq!(resolved.vpc_id, "vpc-default");
        assert_eq!(resolved.subnets, vec!["subnet-1"]);
    }

    #[tokio::test]
    async fn no_default_network_fails() {
        let mut cloud = MockCloudApi::new();
        cloud.expect_default_vpc().returning(|| Ok(None));

        let resolver = NetworkResolver::new(Arc::new(cloud));
        assert_eq!(
            resolver.resolve_vpc(&project()).await,
            Err(ApplicationError::NoDefaultNetwork)
        );
    }

    #[tokio::test]
    async fn managed_default_network_uses_account_default() {
        let mut cloud = MockCloudApi::new();
        cloud.expect_vpc_exists().never();
        cloud
            .expect_default_vpc()
            .returning(|| Ok(Some("vpc-default".into())));

        let project = project().with_network(Network::managed("default"));
        let resolver = NetworkResolver::new(Arc::new(cloud));
        assert_eq!(resolver.resolve_vpc(&project).await.unwrap(), "vpc-default");
    }
}
