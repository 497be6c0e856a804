//! Subprocess adapters for the delegated bulk-load tools.
//!
//! Each adapter assembles one command line and reports the outcome through
//! [`ExternalToolError`]; the tools' own output goes straight to the
//! inherited stdio so operators see their progress reporting unfiltered.
#![forbid(unsafe_code)]

use std::process::Command;

use camino::Utf8Path;
use kerbside_core::{ExternalToolError, OsmLoader, TabularLoader, VectorLoadRequest, VectorLoader};
use log::debug;

/// [`TabularLoader`] adapter shelling out to `psql \copy`.
#[derive(Debug, Clone)]
pub struct PsqlCopyLoader {
    connection: String,
}

impl PsqlCopyLoader {
    /// Construct a loader using a libpq-style connection string.
    pub fn new(connection: impl Into<String>) -> Self {
        Self {
            connection: connection.into(),
        }
    }
}

impl TabularLoader for PsqlCopyLoader {
    fn load_delimited(
        &self,
        path: &Utf8Path,
        schema: &str,
        table: &str,
    ) -> Result<(), ExternalToolError> {
        let mut command = Command::new("psql");
        command
            .arg(&self.connection)
            .arg("-v")
            .arg("ON_ERROR_STOP=1")
            .arg("-c")
            .arg(copy_command(path, schema, table));
        run_tool(command, "psql")
    }
}

fn copy_command(path: &Utf8Path, schema: &str, table: &str) -> String {
    format!(
        "\\copy {schema}.{table} from '{path}' WITH CSV DELIMITER ';' NULL '' HEADER ENCODING 'utf-8'"
    )
}

/// [`VectorLoader`] adapter shelling out to `ogr2ogr`.
#[derive(Debug, Clone)]
pub struct Ogr2OgrLoader {
    connection: String,
}

impl Ogr2OgrLoader {
    /// Construct a loader using a libpq-style connection string.
    pub fn new(connection: impl Into<String>) -> Self {
        Self {
            connection: connection.into(),
        }
    }
}

impl VectorLoader for Ogr2OgrLoader {
    fn load_vector(&self, request: &VectorLoadRequest<'_>) -> Result<(), ExternalToolError> {
        match request.layers {
            Some(layers) => {
                for layer in layers {
                    let mut command = Command::new("ogr2ogr");
                    command.args(ogr_args(&self.connection, request, Some(layer)));
                    run_tool(command, "ogr2ogr")?;
                }
                Ok(())
            }
            None => {
                let mut command = Command::new("ogr2ogr");
                command.args(ogr_args(&self.connection, request, None));
                run_tool(command, "ogr2ogr")
            }
        }
    }
}

fn ogr_args(connection: &str, request: &VectorLoadRequest<'_>, layer: Option<&str>) -> Vec<String> {
    let mut args = vec![
        "-f".to_owned(),
        "PostgreSQL".to_owned(),
        format!("PG:{connection}"),
        "-lco".to_owned(),
        format!("FID={}", request.fid_column.unwrap_or("fid")),
        "-skipfailures".to_owned(),
        "-lco".to_owned(),
        "GEOMETRY_NAME=geom".to_owned(),
        "-nln".to_owned(),
        format!("{}.{}", request.schema, request.table),
    ];
    if let Some(srid) = request.srid {
        args.push("-t_srs".to_owned());
        args.push(format!("EPSG:{srid}"));
    }
    // Without opening the dataset there is no geometry-type inspection;
    // more than one requested layer or geometry type forces the generic
    // geometry column, a single one keeps the typed column.
    let mixed = request.layers.is_some_and(|layers| layers.len() > 1)
        || request.geometry_types.is_some_and(|types| types.len() > 1);
    if mixed {
        args.push("-nlt".to_owned());
        args.push("GEOMETRY".to_owned());
    }
    if let Some(attributes) = request.attributes {
        args.push("-select".to_owned());
        args.push(attributes.join(","));
    }
    if let Some(types) = request.geometry_types {
        let list: Vec<String> = types.iter().map(|name| format!("'{name}'")).collect();
        args.push("-where".to_owned());
        args.push(format!("OGR_GEOMETRY IN ({})", list.join(", ")));
    }
    args.push(request.path.to_string());
    if let Some(layer_name) = layer {
        args.push(layer_name.to_owned());
    }
    args
}

/// [`OsmLoader`] adapter shelling out to `osm2pgsql`.
#[derive(Debug, Clone)]
pub struct Osm2PgsqlLoader {
    connection: String,
}

impl Osm2PgsqlLoader {
    /// Construct a loader using a libpq-style connection string.
    pub fn new(connection: impl Into<String>) -> Self {
        Self {
            connection: connection.into(),
        }
    }
}

impl OsmLoader for Osm2PgsqlLoader {
    fn load_extract(
        &self,
        extract: &Utf8Path,
        style: &Utf8Path,
        schema: &str,
        prefix: &str,
    ) -> Result<(), ExternalToolError> {
        let mut command = Command::new("osm2pgsql");
        command.args(osm2pgsql_args(&self.connection, extract, style, schema, prefix));
        run_tool(command, "osm2pgsql")
    }
}

fn osm2pgsql_args(
    connection: &str,
    extract: &Utf8Path,
    style: &Utf8Path,
    schema: &str,
    prefix: &str,
) -> Vec<String> {
    vec![
        format!("--database={connection}"),
        format!("--middle-schema={schema}"),
        format!("--output-pgsql-schema={schema}"),
        "--prefix".to_owned(),
        prefix.to_owned(),
        "--latlong".to_owned(),
        "--slim".to_owned(),
        "--hstore".to_owned(),
        format!("--style={style}"),
        extract.to_string(),
    ]
}

fn run_tool(mut command: Command, tool: &str) -> Result<(), ExternalToolError> {
    debug!("running {command:?}");
    let status = command.status().map_err(|source| ExternalToolError::Launch {
        tool: tool.to_owned(),
        source,
    })?;
    if status.success() {
        return Ok(());
    }
    match status.code() {
        Some(code) => Err(ExternalToolError::Failed {
            tool: tool.to_owned(),
            status: code,
        }),
        None => Err(ExternalToolError::Terminated {
            tool: tool.to_owned(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn copy_command_matches_the_loader_contract() {
        let command = copy_command(Utf8Path::new("/data/Link.csv"), "geo", "gip_link");
        assert_eq!(
            command,
            "\\copy geo.gip_link from '/data/Link.csv' WITH CSV DELIMITER ';' NULL '' HEADER ENCODING 'utf-8'"
        );
    }

    #[rstest]
    fn ogr_args_default_to_a_typed_single_layer_load() {
        let path = Utf8Path::new("/data/dem.gpkg");
        let request = VectorLoadRequest::new(path, "geo", "dem").with_srid(32633);
        let args = ogr_args("dbname=kerbside", &request, None);
        assert!(args.contains(&"-t_srs".to_owned()));
        assert!(args.contains(&"EPSG:32633".to_owned()));
        assert!(!args.contains(&"-nlt".to_owned()), "single layer stays typed");
        assert_eq!(args.last(), Some(&"/data/dem.gpkg".to_owned()));
    }

    #[rstest]
    fn multiple_layers_force_the_generic_geometry_column() {
        let path = Utf8Path::new("/data/mixed.gpkg");
        let layers = ["roads", "paths"];
        let request = VectorLoadRequest {
            layers: Some(&layers),
            ..VectorLoadRequest::new(path, "geo", "network")
        };
        let args = ogr_args("dbname=kerbside", &request, Some("roads"));
        assert!(args.contains(&"-nlt".to_owned()));
        assert!(args.contains(&"GEOMETRY".to_owned()));
        assert_eq!(args.last(), Some(&"roads".to_owned()));
    }

    #[rstest]
    fn geometry_type_filter_uses_the_dataset_dialect() {
        let path = Utf8Path::new("/data/mixed.gpkg");
        let types = ["POLYGON", "MULTIPOLYGON"];
        let request = VectorLoadRequest {
            geometry_types: Some(&types),
            ..VectorLoadRequest::new(path, "geo", "areas")
        };
        let args = ogr_args("dbname=kerbside", &request, None);
        assert!(
            args.contains(&"OGR_GEOMETRY IN ('POLYGON', 'MULTIPOLYGON')".to_owned())
        );
    }

    #[rstest]
    fn osm2pgsql_args_carry_schema_prefix_and_style() {
        let args = osm2pgsql_args(
            "dbname=kerbside",
            Utf8Path::new("/data/vienna.osm.pbf"),
            Utf8Path::new("resources/default.style"),
            "geo",
            "osm",
        );
        assert!(args.contains(&"--middle-schema=geo".to_owned()));
        assert!(args.contains(&"--output-pgsql-schema=geo".to_owned()));
        assert!(args.contains(&"--style=resources/default.style".to_owned()));
        assert_eq!(args.last(), Some(&"/data/vienna.osm.pbf".to_owned()));
    }

    #[rstest]
    fn nonzero_exit_becomes_an_external_tool_error() {
        let mut command = Command::new("sh");
        command.arg("-c").arg("exit 7");
        let outcome = run_tool(command, "sh");
        assert!(matches!(
            outcome,
            Err(ExternalToolError::Failed { status: 7, .. })
        ));
    }

    #[rstest]
    fn missing_binary_is_a_launch_error() {
        let command = Command::new("kerbside-missing-tool");
        let outcome = run_tool(command, "kerbside-missing-tool");
        assert!(matches!(outcome, Err(ExternalToolError::Launch { .. })));
    }
}
