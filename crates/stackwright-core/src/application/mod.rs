//! Application layer for Stackwright.
//!
//! This layer contains:
//! - **Services**: Use case orchestration (DeployService, StatusService)
//! - **Ports**: Interface definitions (traits) for the platform and progress output
//! - **Errors**: Application-specific error types
//!
//! The application layer sequences remote calls around the domain layer.
//! Compilation rules live in `crate::domain`.

pub mod error;
pub mod ports;
pub mod services;

pub use services::{
    DeployOptions, DeployOutcome, DeployService, ExecutionRoleResolver, NetworkResolver,
    PollPolicy, RoleMode, StackWaiter, StatusService,
};

pub use ports::{CloudApi, CloudError, ProgressSink};

pub use error::ApplicationError;
