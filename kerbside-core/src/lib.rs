//! Core domain types and collaborator contracts for the Kerbside pipeline.
//!
//! The importers in `kerbside-data` are orchestration logic only: every side
//! effect flows through the narrow contracts defined here (the relational
//! [`Database`], the delegated bulk loaders) so that runs can be replayed
//! against recording fakes in tests. Configuration is an explicit immutable
//! [`GlobalSettings`] value passed by reference, never ambient state.

#![forbid(unsafe_code)]

mod loader;
mod settings;
mod store;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use loader::{ExternalToolError, OsmLoader, TabularLoader, VectorLoadRequest, VectorLoader};
pub use settings::{BoundingBox, EndpointList, GlobalSettings};
pub use store::{Database, DatabaseError};
