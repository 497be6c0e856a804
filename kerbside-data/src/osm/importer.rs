//! Sequenced import of an OpenStreetMap extract.
//!
//! The extract comes either from a file already in the data directory or
//! from a bounding-box download with endpoint failover. The bulk loader's
//! staging tables are dropped before the load (stale leftovers) and the
//! non-geometry helper tables again after it; the three geometry-typed
//! tables stay live as inputs to the thematic datasets.

use camino::Utf8PathBuf;
use kerbside_core::{
    BoundingBox, Database, DatabaseError, ExternalToolError, GlobalSettings, OsmLoader,
};
use log::info;
use thiserror::Error;

use super::datasets::materialise_all;
use super::download::{AcquireError, ExtractSource, acquire_extract};

/// Prefix under which the bulk loader creates its staging tables.
const STAGING_PREFIX: &str = "osm";

/// Every staging table the bulk loader creates; always reset before a load.
const LOADER_TABLES: [&str; 7] = [
    "osm_point",
    "osm_line",
    "osm_polygon",
    "osm_nodes",
    "osm_rels",
    "osm_roads",
    "osm_ways",
];

/// Intermediate helper tables shed after the load; the geometry-typed
/// point/line/polygon tables remain as dataset inputs.
const HELPER_TABLES: [&str; 4] = ["osm_nodes", "osm_rels", "osm_roads", "osm_ways"];

/// Where the raw extract comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractSelector {
    /// An extract file already present in the data directory.
    File(String),
    /// Download the area inside this bounding box.
    BoundingBox(BoundingBox),
    /// Area lookup by place name — recognised but unsupported upstream.
    PlaceName(String),
}

/// Per-run source options for the OSM importer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OsmImportOptions {
    /// Extract file name inside the data directory.
    pub file_name: Option<String>,
    /// Bounding box for a fresh download.
    pub bbox: Option<BoundingBox>,
    /// Place name for an area lookup.
    pub place_name: Option<String>,
}

impl OsmImportOptions {
    /// Classify the options into a single selector.
    ///
    /// A pre-supplied file always wins. Requesting neither a file nor any
    /// selector fails before any I/O happens.
    ///
    /// # Errors
    /// [`OsmImportError::MissingSource`] when nothing was requested.
    pub fn selector(&self) -> Result<ExtractSelector, OsmImportError> {
        if let Some(file_name) = &self.file_name {
            return Ok(ExtractSelector::File(file_name.clone()));
        }
        info!("no extract file provided, checking for download selectors instead");
        if let Some(place_name) = &self.place_name {
            return Ok(ExtractSelector::PlaceName(place_name.clone()));
        }
        if let Some(bbox) = &self.bbox {
            return Ok(ExtractSelector::BoundingBox(bbox.clone()));
        }
        Err(OsmImportError::MissingSource)
    }
}

/// Errors raised during an OSM import run.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum OsmImportError {
    /// Neither an extract file nor a download selector was configured.
    #[error("neither an extract file, a bounding box nor a place name was configured")]
    MissingSource,
    /// Place-name area lookup was requested; it is unsupported by design.
    #[error("extract lookup by place name is not supported (requested {name:?})")]
    PlaceNameUnsupported {
        /// The requested place name.
        name: String,
    },
    /// Downloading the extract failed on every endpoint.
    #[error(transparent)]
    Acquire(#[from] AcquireError),
    /// A database operation failed.
    #[error(transparent)]
    Database(#[from] DatabaseError),
    /// The delegated bulk loader failed.
    #[error(transparent)]
    Load(#[from] ExternalToolError),
}

/// Summary of a completed OSM run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsmImportReport {
    /// Extract file that was loaded.
    pub extract_path: Utf8PathBuf,
    /// Thematic datasets created by this run (existing ones are skipped).
    pub datasets_created: Vec<&'static str>,
}

/// Importer for OpenStreetMap extracts.
#[derive(Debug)]
pub struct OsmImporter<'a> {
    settings: &'a GlobalSettings,
    schema: &'a str,
    options: OsmImportOptions,
}

impl<'a> OsmImporter<'a> {
    /// Construct an importer with the given per-run source options.
    #[must_use]
    pub fn new(settings: &'a GlobalSettings, schema: &'a str, options: OsmImportOptions) -> Self {
        Self {
            settings,
            schema,
            options,
        }
    }

    /// Run the import: resolve the extract, bulk load, derive datasets.
    ///
    /// # Errors
    /// Any failure is run-fatal; see [`OsmImportError`]. Per-endpoint
    /// download failures are handled inside the acquisition step and do not
    /// surface individually.
    pub fn run(
        &self,
        db: &mut dyn Database,
        loader: &dyn OsmLoader,
        source: &dyn ExtractSource,
    ) -> Result<OsmImportReport, OsmImportError> {
        info!("importing osm");
        // Classification is pure; an invalid source configuration fails
        // before the database or the network is touched.
        let selector = self.options.selector()?;

        db.ensure_extensions_and_schema(self.schema)?;
        let extract_path = self.resolve_extract(selector, source)?;

        info!("import osm file {extract_path}");
        for table in LOADER_TABLES {
            db.drop_table(table, self.schema)?;
        }
        db.commit()?;

        loader.load_extract(
            &extract_path,
            &self.settings.osm_style_path,
            self.schema,
            STAGING_PREFIX,
        )?;

        for table in HELPER_TABLES {
            db.drop_table(table, self.schema)?;
        }
        db.commit()?;

        let datasets_created = materialise_all(db, self.schema, self.settings.target_srid)?;

        db.close()?;
        Ok(OsmImportReport {
            extract_path,
            datasets_created,
        })
    }

    fn resolve_extract(
        &self,
        selector: ExtractSelector,
        source: &dyn ExtractSource,
    ) -> Result<Utf8PathBuf, OsmImportError> {
        match selector {
            ExtractSelector::File(file_name) => Ok(self.settings.data_path(&file_name)),
            ExtractSelector::BoundingBox(bbox) => {
                let output = self
                    .settings
                    .data_path(&self.settings.osm_download_filename);
                Ok(acquire_extract(
                    source,
                    &self.settings.overpass_endpoints,
                    &bbox,
                    &output,
                )?)
            }
            ExtractSelector::PlaceName(name) => {
                Err(OsmImportError::PlaceNameUnsupported { name })
            }
        }
    }
}
