//! Command-line interface for the Kerbside import pipeline.
//!
//! The CLI owns the ambient concerns the importers deliberately do not:
//! argument parsing, settings loading, logging setup and the wiring of the
//! concrete store and tool adapters.
#![forbid(unsafe_code)]

mod error;

use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Parser, Subcommand};
use kerbside_core::{BoundingBox, GlobalSettings};
use kerbside_data::gip::GipImporter;
use kerbside_data::osm::{HttpExtractSource, OsmImportOptions, OsmImporter};
use kerbside_data::store::PostgresDatabase;
use kerbside_data::tools::{Osm2PgsqlLoader, PsqlCopyLoader};
use log::info;
use serde::Deserialize;

pub use error::CliError;

/// Run the Kerbside CLI with the current process arguments.
///
/// # Errors
/// Returns [`CliError`] for argument, configuration and pipeline failures.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    init_logging(cli.verbose);
    let config = Config::load(&cli.config)?;
    match cli.command {
        Command::ImportGip(args) => run_gip(&config, &args),
        Command::ImportOsm(args) => run_osm(&config, args),
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let env = env_logger::Env::default().default_filter_or(default_level);
    // A second init (e.g. under the test harness) is harmless.
    env_logger::Builder::from_env(env).try_init().ok();
}

fn run_gip(config: &Config, args: &GipArgs) -> Result<(), CliError> {
    let mut db = PostgresDatabase::connect(&config.database.connection)?;
    let loader = PsqlCopyLoader::new(config.database.connection.as_str());
    let importer = GipImporter::new(&config.settings, &config.database.schema, &args.archive);
    let report = importer.run(&mut db, &loader)?;
    info!(
        "staged {} tables from {:?}",
        report.tables.len(),
        args.archive
    );
    Ok(())
}

fn run_osm(config: &Config, args: OsmArgs) -> Result<(), CliError> {
    let mut db = PostgresDatabase::connect(&config.database.connection)?;
    let loader = Osm2PgsqlLoader::new(config.database.connection.as_str());
    let source = HttpExtractSource::new();
    let importer = OsmImporter::new(
        &config.settings,
        &config.database.schema,
        args.into_options(),
    );
    let report = importer.run(&mut db, &loader, &source)?;
    info!(
        "loaded {} and created {} datasets",
        report.extract_path,
        report.datasets_created.len()
    );
    Ok(())
}

#[derive(Debug, Parser)]
#[command(
    name = "kerbside",
    about = "Import geodata sources into staging tables and thematic datasets",
    version
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "path", default_value = "kerbside.toml")]
    config: Utf8PathBuf,
    /// Emit debug-level log output.
    #[arg(long)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Stage the proprietary-format export archive.
    ImportGip(GipArgs),
    /// Load an OSM extract and derive the thematic datasets.
    ImportOsm(OsmArgs),
}

#[derive(Debug, Args)]
struct GipArgs {
    /// Archive file name inside the data directory.
    #[arg(long, value_name = "name", default_value = "ogd_gip.zip")]
    archive: String,
}

#[derive(Debug, Args)]
struct OsmArgs {
    /// Extract file name inside the data directory.
    #[arg(long, value_name = "name")]
    file: Option<String>,
    /// Bounding box `south,west,north,east` for a fresh download.
    #[arg(long, value_name = "bbox")]
    bbox: Option<String>,
    /// Place name for an area lookup (recognised but unsupported).
    #[arg(long, value_name = "name")]
    place_name: Option<String>,
}

impl OsmArgs {
    fn into_options(self) -> OsmImportOptions {
        OsmImportOptions {
            file_name: self.file,
            bbox: self.bbox.map(BoundingBox::new),
            place_name: self.place_name,
        }
    }
}

/// Top-level configuration file layout.
#[derive(Debug, Deserialize)]
struct Config {
    database: DatabaseConfig,
    settings: GlobalSettings,
}

#[derive(Debug, Deserialize)]
struct DatabaseConfig {
    /// libpq-style connection string.
    connection: String,
    /// Working schema for staging tables and datasets.
    #[serde(default = "default_schema")]
    schema: String,
}

fn default_schema() -> String {
    "kerbside".to_owned()
}

impl Config {
    fn load(path: &Utf8Path) -> Result<Self, CliError> {
        let content = std::fs::read_to_string(path).map_err(|source| CliError::ReadConfig {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| CliError::ParseConfig {
            path: path.to_path_buf(),
            source,
        })
    }
}
