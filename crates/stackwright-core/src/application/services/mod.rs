//! Application services - orchestrate use cases.
//!
//! Services coordinate the domain layer and ports to accomplish
//! high-level use cases like "deploy a project" or "list its endpoints".

pub mod deploy_service;
pub mod network_resolver;
pub mod role_resolver;
pub mod stack_waiter;
pub mod status_service;

pub use deploy_service::{DeployOptions, DeployService};
pub use network_resolver::NetworkResolver;
pub use role_resolver::{ExecutionRoleResolver, RoleMode};
pub use stack_waiter::{DeployOutcome, PollPolicy, StackWaiter};
pub use status_service::StatusService;
