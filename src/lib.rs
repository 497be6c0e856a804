//! Facade crate for the Kerbside geodata import pipeline.
//!
//! This crate re-exports the collaborator contracts and the two importer
//! entry points, with concrete store and tool adapters available behind
//! feature flags.

#![forbid(unsafe_code)]

pub use kerbside_core::{
    BoundingBox, Database, DatabaseError, EndpointList, ExternalToolError, GlobalSettings,
    OsmLoader, TabularLoader, VectorLoadRequest, VectorLoader,
};

pub use kerbside_data::gip::{
    GipImportError, GipImportReport, GipImporter, MalformedExportError,
};
pub use kerbside_data::osm::{
    AcquireError, ExtractSelector, ExtractSource, HttpExtractSource, OsmImportError,
    OsmImportOptions, OsmImportReport, OsmImporter, acquire_extract,
};

#[cfg(feature = "store-postgres")]
pub use kerbside_data::store::{PostgresDatabase, PostgresDatabaseError};

#[cfg(feature = "tools")]
pub use kerbside_data::tools::{Ogr2OgrLoader, Osm2PgsqlLoader, PsqlCopyLoader};
