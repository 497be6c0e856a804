//! Error types emitted by the Kerbside CLI.

use camino::Utf8PathBuf;
use thiserror::Error;

use kerbside_data::gip::GipImportError;
use kerbside_data::osm::OsmImportError;
use kerbside_data::store::PostgresDatabaseError;

/// Errors emitted by the Kerbside CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// The configuration file could not be read.
    #[error("failed to read configuration file {path:?}")]
    ReadConfig {
        /// Configuration file path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The configuration file could not be parsed.
    #[error("failed to parse configuration file {path:?}")]
    ParseConfig {
        /// Configuration file path.
        path: Utf8PathBuf,
        /// Source error from the TOML parser.
        #[source]
        source: toml::de::Error,
    },
    /// Establishing the database connection failed.
    #[error(transparent)]
    Connect(#[from] PostgresDatabaseError),
    /// The proprietary-format import failed.
    #[error("gip import failed: {0}")]
    GipImport(#[from] GipImportError),
    /// The OSM import failed.
    #[error("osm import failed: {0}")]
    OsmImport(#[from] OsmImportError),
}
