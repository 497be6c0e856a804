//! Acquisition and import of OpenStreetMap extracts.
#![forbid(unsafe_code)]

mod datasets;
mod download;
mod importer;

pub use datasets::{THEMATIC_DATASETS, ThematicDataset, materialise_all};
pub use download::{
    AcquireError, DEFAULT_USER_AGENT, ExtractSource, HttpExtractSource, TransportError,
    acquire_extract, overpass_query,
};
pub use importer::{
    ExtractSelector, OsmImportError, OsmImportOptions, OsmImportReport, OsmImporter,
};
