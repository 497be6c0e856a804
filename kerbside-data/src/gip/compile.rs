//! Derivation of the normalized data file and the generated schema file.
//!
//! Both entry points are idempotent by existence: when the derived artifact
//! is already on disk the source file is not re-parsed. The check is
//! presence-based, not freshness-based — callers refreshing a source must
//! delete the stale artifacts themselves.

use std::fs::{self, File};
use std::io::{BufWriter, Write};

use camino::{Utf8Path, Utf8PathBuf};
use log::debug;

use super::error::{GipCompileError, MalformedExportError};
use super::export::{ExportMetadata, ExportRecord, Latin1Lines};

/// Derive the normalized data file for `source`, skipping work when the
/// sibling `.csv` artifact already exists.
///
/// The export is streamed once. The `tbl` record opens the sink, the `atr`
/// record becomes the header row, and each `rec` row is written with the tag
/// stripped and its values normalized (see [`normalise_row`]). Output is
/// UTF-8 regardless of the source file's legacy encoding.
///
/// # Errors
/// Returns [`GipCompileError::Malformed`] when a row or attribute record
/// appears before any table record, and the I/O variants when reading the
/// source or writing the artifact fails.
pub fn ensure_data_file(source: &Utf8Path) -> Result<Utf8PathBuf, GipCompileError> {
    let target = ExportMetadata::data_file_path(source);
    if target.exists() {
        debug!("data file {target} already present, skipping");
        return Ok(target);
    }
    write_data_file(source, &target)?;
    Ok(target)
}

/// Derive the generated schema file for `source`, skipping work when the
/// sibling `.sql` artifact already exists.
///
/// # Errors
/// Propagates the metadata scan failures from [`ExportMetadata::scan`] and
/// reports [`GipCompileError::Write`] when the artifact cannot be written.
pub fn ensure_schema_file(source: &Utf8Path) -> Result<Utf8PathBuf, GipCompileError> {
    let target = ExportMetadata::schema_file_path(source);
    if target.exists() {
        debug!("schema file {target} already present, skipping");
        return Ok(target);
    }
    let metadata = ExportMetadata::scan(source)?;
    fs::write(&target, metadata.schema_statement()).map_err(|source_err| {
        GipCompileError::Write {
            path: target.clone(),
            source: source_err,
        }
    })?;
    Ok(target)
}

fn write_data_file(source: &Utf8Path, target: &Utf8Path) -> Result<(), GipCompileError> {
    let read_error = |source_err| GipCompileError::Read {
        path: source.to_path_buf(),
        source: source_err,
    };
    let write_error = |source_err| GipCompileError::Write {
        path: target.to_path_buf(),
        source: source_err,
    };

    let mut sink: Option<BufWriter<File>> = None;
    for (index, line) in Latin1Lines::open(source).map_err(read_error)?.enumerate() {
        let line = line.map_err(read_error)?;
        let payload = match ExportRecord::classify(&line) {
            ExportRecord::Table(_) => {
                sink = Some(BufWriter::new(File::create(target).map_err(write_error)?));
                continue;
            }
            ExportRecord::Attributes(rest) => rest.to_owned(),
            ExportRecord::Row(rest) => normalise_row(rest),
            ExportRecord::Formats(_) | ExportRecord::Other => continue,
        };
        let Some(open_sink) = sink.as_mut() else {
            return Err(MalformedExportError::RecordBeforeTable {
                path: source.to_path_buf(),
                line: index + 1,
            }
            .into());
        };
        writeln!(open_sink, "{payload}").map_err(write_error)?;
    }

    if let Some(mut open_sink) = sink {
        open_sink.flush().map_err(write_error)?;
        Ok(())
    } else {
        Err(MalformedExportError::MissingRecord {
            path: source.to_path_buf(),
            record: "tbl",
        }
        .into())
    }
}

/// Normalize one data row.
///
/// The literal sequences `""` and `" "` are removed first (both denote an
/// absent value, and the empty string is the loader's NULL sentinel), then
/// each field sheds one pair of enclosing double quotes:
/// `"12345";"100.50"` becomes `12345;100.50`.
fn normalise_row(row: &str) -> String {
    let cleaned = row.replace("\"\"", "").replace("\" \"", "");
    cleaned
        .split(';')
        .map(strip_enclosing_quotes)
        .collect::<Vec<_>>()
        .join(";")
}

fn strip_enclosing_quotes(field: &str) -> &str {
    field
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(field)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    const SAMPLE: &str = "tbl;parcels\n\
                          atr;parcel_id;area\n\
                          frm;decimal(9);decimal(8,2)\n\
                          rec;\"12345\";\"100.50\"\n";

    #[fixture]
    fn temp_dir() -> TempDir {
        TempDir::new().expect("create temp dir")
    }

    fn write_export(dir: &TempDir, name: &str, content: &str) -> Utf8PathBuf {
        let path = Utf8PathBuf::from_path_buf(dir.path().join(name)).expect("utf-8 path");
        fs::write(&path, content).expect("write export fixture");
        path
    }

    #[rstest]
    fn derives_header_and_normalized_rows(temp_dir: TempDir) {
        let source = write_export(&temp_dir, "Parcels.txt", SAMPLE);
        let data_file = ensure_data_file(&source).expect("data file should derive");
        let content = fs::read_to_string(&data_file).expect("read data file");
        assert_eq!(content, "parcel_id;area\n12345;100.50\n");
    }

    #[rstest]
    fn schema_and_data_column_counts_agree(temp_dir: TempDir) {
        let source = write_export(&temp_dir, "Parcels.txt", SAMPLE);
        let schema_file = ensure_schema_file(&source).expect("schema should derive");
        let data_file = ensure_data_file(&source).expect("data file should derive");

        let statement = fs::read_to_string(&schema_file).expect("read schema file");
        let schema_columns = statement.matches(',').count() + 1;
        let data = fs::read_to_string(&data_file).expect("read data file");
        let first_row = data.lines().nth(1).expect("one data row");
        assert_eq!(schema_columns, first_row.split(';').count());
    }

    #[rstest]
    fn generated_schema_matches_the_embedded_metadata(temp_dir: TempDir) {
        let source = write_export(&temp_dir, "Parcels.txt", SAMPLE);
        let schema_file = ensure_schema_file(&source).expect("schema should derive");
        let statement = fs::read_to_string(&schema_file).expect("read schema file");
        assert_eq!(
            statement,
            "CREATE TABLE gip_parcels (parcel_id integer, area numeric(8,2));\n"
        );
    }

    #[rstest]
    fn absent_values_become_the_null_sentinel(temp_dir: TempDir) {
        let source = write_export(
            &temp_dir,
            "Use.txt",
            "tbl;use\natr;a;b;c\nfrm;string;string;string\nrec;\"\";\" \";\"kept\"\n",
        );
        let data_file = ensure_data_file(&source).expect("data file should derive");
        let content = fs::read_to_string(&data_file).expect("read data file");
        assert_eq!(content, "a;b;c\n;;kept\n");
    }

    #[rstest]
    fn existing_artifacts_are_not_reparsed(temp_dir: TempDir) {
        let source = write_export(&temp_dir, "Parcels.txt", SAMPLE);
        let sentinel_csv = write_export(&temp_dir, "Parcels.csv", "sentinel-data");
        let sentinel_sql = write_export(&temp_dir, "Parcels.sql", "sentinel-schema");

        let data_file = ensure_data_file(&source).expect("skip should succeed");
        let schema_file = ensure_schema_file(&source).expect("skip should succeed");

        assert_eq!(data_file, sentinel_csv);
        assert_eq!(schema_file, sentinel_sql);
        assert_eq!(
            fs::read_to_string(&sentinel_csv).expect("read sentinel"),
            "sentinel-data"
        );
        assert_eq!(
            fs::read_to_string(&sentinel_sql).expect("read sentinel"),
            "sentinel-schema"
        );
    }

    #[rstest]
    fn row_before_table_record_is_malformed(temp_dir: TempDir) {
        let source = write_export(&temp_dir, "Broken.txt", "rec;\"1\"\ntbl;broken\n");
        let outcome = ensure_data_file(&source);
        assert!(matches!(
            outcome,
            Err(GipCompileError::Malformed(
                MalformedExportError::RecordBeforeTable { line: 1, .. }
            ))
        ));
    }

    #[rstest]
    fn legacy_bytes_reencode_to_utf8(temp_dir: TempDir) {
        let path = Utf8PathBuf::from_path_buf(temp_dir.path().join("Namen.txt"))
            .expect("utf-8 path");
        // "Gr\xfcner Weg" is ISO-8859-1 for "Grüner Weg".
        fs::write(
            &path,
            b"tbl;namen\natr;name\nfrm;string\nrec;\"Gr\xfcner Weg\"\n",
        )
        .expect("write export fixture");

        let data_file = ensure_data_file(&path).expect("data file should derive");
        let content = fs::read_to_string(&data_file).expect("artifact must be valid UTF-8");
        assert_eq!(content, "name\nGr\u{fc}ner Weg\n");
    }

    #[rstest]
    #[case("string", "varchar")]
    #[case("decimal(10)", "integer")]
    fn end_to_end_type_mapping_reaches_the_schema(
        temp_dir: TempDir,
        #[case] token: &str,
        #[case] expected: &str,
    ) {
        let source = write_export(
            &temp_dir,
            "One.txt",
            &format!("tbl;one\natr;v\nfrm;{token}\nrec;\"x\"\n"),
        );
        let schema_file = ensure_schema_file(&source).expect("schema should derive");
        let statement = fs::read_to_string(&schema_file).expect("read schema file");
        assert_eq!(statement, format!("CREATE TABLE gip_one (v {expected});\n"));
    }
}
