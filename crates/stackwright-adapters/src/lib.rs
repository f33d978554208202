//! Infrastructure adapters for Stackwright.
//!
//! This crate implements the ports defined in `stackwright-core::application::ports`
//! and owns every piece of I/O: reading compose files, the offline sandbox
//! platform and the progress sinks used by the CLI.

pub mod progress;
pub mod project_loader;
pub mod sandbox;

// Re-export commonly used adapters
pub use progress::{CollectingSink, LineWriterSink};
pub use sandbox::{SandboxCloud, SandboxError, SandboxState};
