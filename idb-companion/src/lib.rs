//! Persistent, concurrency-safe registry of companion descriptors.

mod error;
mod lock;
pub mod logging;
pub mod paths;
pub mod registry;

pub use error::RegistryError;
pub use logging::init_tracing;
pub use registry::{CompanionIdentifier, CompanionRegistry};
