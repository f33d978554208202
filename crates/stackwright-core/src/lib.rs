//! Stackwright Core - Hexagonal Architecture Implementation
//!
//! This crate provides the domain and application layers for Stackwright,
//! which compiles compose-style projects into platform stacks and drives
//! their deployment.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         stackwright-cli (CLI)           │
//! └──────────────────┬──────────────────────┘
//!                    │ calls
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │         Application Services            │
//! │  (DeployService, StatusService, ...)    │
//! └──────────────────┬──────────────────────┘
//!                    │ uses
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │      Application Ports (Traits)         │
//! │        (CloudApi, ProgressSink)         │
//! └──────────────────┬──────────────────────┘
//!                    │ implemented by
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │   stackwright-adapters (Infrastructure) │
//! │  (SandboxCloud, project loader, sinks)  │
//! └─────────────────────────────────────────┘
//!                    │
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │         Domain Layer (Pure Logic)       │
//! │  (Project, naming, compiler, template)  │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use stackwright_core::prelude::*;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run(cloud: Arc<dyn CloudApi>, project: Project) -> StackwrightResult<()> {
//! let service = DeployService::new(cloud, DeployOptions::default());
//! let print = |event: &StackEvent| println!("{}", event.progress_line());
//! let outcome = service.up(&project, &print, &CancellationToken::new()).await?;
//! println!("{} {}", outcome.stack, outcome.status);
//! # Ok(())
//! # }
//! ```

pub mod domain;

pub mod application;

pub mod error;

// Public API - what external crates should use
pub mod prelude {
    pub use crate::application::{
        ApplicationError, CloudApi, CloudError, DeployOptions, DeployOutcome, DeployService,
        PollPolicy, ProgressSink, RoleMode, StatusService,
    };
    pub use crate::domain::{
        CompiledTemplate, HealthCheck, Network, Port, Project, Protocol, ResourceLimits, Secret,
        Service, ServiceStatus, StackEvent, StackResource,
    };
    pub use crate::error::{ErrorCategory, StackwrightError, StackwrightResult};
}

// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
