//! Core domain layer for Stackwright.
//!
//! Pure logic only: the project model, the naming convention, the template
//! model and the compiler that maps one onto the other. Nothing in here talks
//! to the platform; remote lookups happen in the application layer and are
//! handed in through [`CompileContext`].

pub mod compiler;
pub mod error;
pub mod naming;
pub mod policy;
pub mod project;
pub mod stack;
pub mod task_definition;
pub mod template;

pub use compiler::{CompileContext, ResolvedNetwork, compile};
pub use error::{DomainError, ErrorCategory};
pub use naming::PortBinding;
pub use policy::PolicyDocument;
pub use project::{
    DEFAULT_NETWORK, HealthCheck, Network, Port, Project, Protocol, ResourceLimits, Secret,
    Service,
};
pub use stack::{ServiceStatus, StackEvent, StackPhase, StackResource};
pub use template::{CompiledResource, CompiledTemplate, Expr, Resource, ResourceKind};
