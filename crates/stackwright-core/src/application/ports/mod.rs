//! Application ports (traits) for external dependencies.
//!
//! In hexagonal architecture, ports define interfaces that the application
//! needs from the outside world. Adapters in `stackwright-adapters` implement
//! these.
//!
//! ## Port Types
//!
//! - **Driven (Output) Ports**: Called by application, implemented by infrastructure
//!   - `CloudApi`: clusters, stacks, networks, roles, load balancers
//!   - `ProgressSink`: receives stack events while a deployment runs

pub mod output;

#[cfg(test)]
pub use output::MockCloudApi;
pub use output::{CloudApi, CloudError, ProgressSink};
