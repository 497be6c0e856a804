//! Contracts for the delegated bulk-load tools.
//!
//! High-throughput row and geometry ingestion is not implemented here: it is
//! handed to external tools behind these traits. A non-zero exit from any of
//! them is opaque to the pipeline and propagated unchanged as
//! [`ExternalToolError`].

use camino::Utf8Path;
use thiserror::Error;

/// Failure of a delegated external tool.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExternalToolError {
    /// The tool binary could not be started at all.
    #[error("failed to launch {tool}")]
    Launch {
        /// Name of the tool binary.
        tool: String,
        /// Underlying I/O error from process creation.
        #[source]
        source: std::io::Error,
    },
    /// The tool ran and reported failure.
    #[error("{tool} exited with status {status}")]
    Failed {
        /// Name of the tool binary.
        tool: String,
        /// Non-zero exit status.
        status: i32,
    },
    /// The tool was terminated without an exit status.
    #[error("{tool} terminated by signal")]
    Terminated {
        /// Name of the tool binary.
        tool: String,
    },
}

impl ExternalToolError {
    /// Name of the tool that failed.
    #[must_use]
    pub fn tool(&self) -> &str {
        match self {
            Self::Launch { tool, .. } | Self::Failed { tool, .. } | Self::Terminated { tool } => {
                tool
            }
        }
    }
}

/// Bulk loader for normalized delimited text files.
///
/// The input is a UTF-8 file with a header row, `;` field delimiters, and the
/// empty string as the NULL sentinel — exactly the artifact produced by the
/// format compiler.
pub trait TabularLoader {
    /// Load `path` into `schema.table`, which must already exist.
    fn load_delimited(
        &self,
        path: &Utf8Path,
        schema: &str,
        table: &str,
    ) -> Result<(), ExternalToolError>;
}

/// Parameters for one vector-dataset load.
///
/// Optional fields narrow the load; `None` means "everything the dataset
/// offers". Geometry typing of the target table is auto-detected by the
/// implementation: a single source geometry type maps onto a typed column,
/// mixed types fall back to a generic geometry column.
#[derive(Debug, Clone, Copy)]
pub struct VectorLoadRequest<'a> {
    /// Path to the vector dataset (e.g. a GeoPackage).
    pub path: &'a Utf8Path,
    /// Target schema.
    pub schema: &'a str,
    /// Target table.
    pub table: &'a str,
    /// Feature-id column name; the implementation supplies a default.
    pub fid_column: Option<&'a str>,
    /// Reproject geometries into this SRID.
    pub srid: Option<u32>,
    /// Restrict the load to these layers.
    pub layers: Option<&'a [&'a str]>,
    /// Restrict the load to these attribute columns.
    pub attributes: Option<&'a [&'a str]>,
    /// Restrict the load to features of these geometry types.
    pub geometry_types: Option<&'a [&'a str]>,
}

impl<'a> VectorLoadRequest<'a> {
    /// Construct a request loading everything from `path` into
    /// `schema.table`.
    #[must_use]
    pub fn new(path: &'a Utf8Path, schema: &'a str, table: &'a str) -> Self {
        Self {
            path,
            schema,
            table,
            fid_column: None,
            srid: None,
            layers: None,
            attributes: None,
            geometry_types: None,
        }
    }

    /// Reproject into `srid` during the load.
    #[must_use]
    pub fn with_srid(mut self, srid: u32) -> Self {
        self.srid = Some(srid);
        self
    }

    /// Use `column` as the feature-id column.
    #[must_use]
    pub fn with_fid_column(mut self, column: &'a str) -> Self {
        self.fid_column = Some(column);
        self
    }
}

/// Bulk loader for vector geometry datasets.
pub trait VectorLoader {
    /// Load one or more layers described by `request` into a single table.
    fn load_vector(&self, request: &VectorLoadRequest<'_>) -> Result<(), ExternalToolError>;
}

/// Bulk loader for OpenStreetMap extracts.
pub trait OsmLoader {
    /// Load `extract` into node/way/relation/point/line/polygon/road staging
    /// tables under `schema`, with table names prefixed by `prefix`.
    fn load_extract(
        &self,
        extract: &Utf8Path,
        style: &Utf8Path,
        schema: &str,
        prefix: &str,
    ) -> Result<(), ExternalToolError>;
}
