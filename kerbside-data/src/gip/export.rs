//! Line-level reading of export files and the metadata scan.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};

use camino::{Utf8Path, Utf8PathBuf};

use super::error::{GipCompileError, MalformedExportError};
use super::types::{column_name, column_type};

/// Table-name prefix applied to every generated staging table.
pub(crate) const TABLE_PREFIX: &str = "gip_";

/// One classified export line.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ExportRecord<'a> {
    /// `tbl;` — names the table and opens the output sink.
    Table(&'a str),
    /// `atr;` — semicolon-delimited column names.
    Attributes(&'a str),
    /// `frm;` — semicolon-delimited type descriptors.
    Formats(&'a str),
    /// `rec;` — one data row.
    Row(&'a str),
    /// Anything else is carried metadata the pipeline does not interpret.
    Other,
}

impl<'a> ExportRecord<'a> {
    pub(crate) fn classify(line: &'a str) -> Self {
        if let Some(rest) = line.strip_prefix("tbl;") {
            Self::Table(rest)
        } else if let Some(rest) = line.strip_prefix("atr;") {
            Self::Attributes(rest)
        } else if let Some(rest) = line.strip_prefix("frm;") {
            Self::Formats(rest)
        } else if let Some(rest) = line.strip_prefix("rec;") {
            Self::Row(rest)
        } else {
            Self::Other
        }
    }
}

/// Iterator over the lines of a legacy single-byte export file.
///
/// ISO-8859-1 code points coincide with the first 256 Unicode scalars, so the
/// decode is a char-for-byte widening and therefore exact; the resulting
/// `String` re-encodes to UTF-8 without loss. Trailing CR/LF is stripped.
pub(crate) struct Latin1Lines<R> {
    reader: R,
}

impl Latin1Lines<BufReader<File>> {
    pub(crate) fn open(path: &Utf8Path) -> io::Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            reader: BufReader::new(file),
        })
    }
}

impl<R: Read> Latin1Lines<BufReader<R>> {
    #[cfg(test)]
    pub(crate) fn from_reader(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
        }
    }
}

impl<R: BufRead> Iterator for Latin1Lines<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut bytes = Vec::new();
        match self.reader.read_until(b'\n', &mut bytes) {
            Ok(0) => None,
            Ok(_) => {
                while bytes.last().is_some_and(|byte| matches!(byte, b'\n' | b'\r')) {
                    bytes.pop();
                }
                Some(Ok(bytes.iter().map(|&byte| char::from(byte)).collect()))
            }
            Err(error) => Some(Err(error)),
        }
    }
}

/// Metadata embedded in one export file.
///
/// Populated by a single forward scan that stops at the first data row:
/// schema inference never reads data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportMetadata {
    /// Base table name from the `tbl` record, trimmed and lower-cased.
    pub table_name: String,
    /// Column names from the `atr` record, trimmed and lower-cased.
    pub column_names: Vec<String>,
    /// Raw type descriptors from the `frm` record, trimmed and lower-cased.
    pub type_tokens: Vec<String>,
}

impl ExportMetadata {
    /// Scan `path` for the three metadata records.
    ///
    /// # Errors
    /// Returns [`GipCompileError::Malformed`] when a mandatory record is
    /// absent or the `atr`/`frm` field counts disagree, and
    /// [`GipCompileError::Read`] when the file cannot be read.
    pub fn scan(path: &Utf8Path) -> Result<Self, GipCompileError> {
        let lines = Latin1Lines::open(path).map_err(|source| GipCompileError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::scan_lines(lines, path)
    }

    fn scan_lines<I>(lines: I, path: &Utf8Path) -> Result<Self, GipCompileError>
    where
        I: IntoIterator<Item = io::Result<String>>,
    {
        let mut table_name = None;
        let mut column_names = None;
        let mut type_tokens = None;

        for line in lines {
            let line = line.map_err(|source| GipCompileError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            match ExportRecord::classify(&line) {
                ExportRecord::Table(rest) => {
                    table_name = Some(rest.trim().to_lowercase());
                }
                ExportRecord::Attributes(rest) => {
                    column_names = Some(split_fields(rest));
                }
                ExportRecord::Formats(rest) => {
                    type_tokens = Some(split_fields(rest));
                }
                ExportRecord::Row(_) => break,
                ExportRecord::Other => {}
            }
        }

        let missing = |record| MalformedExportError::MissingRecord {
            path: path.to_path_buf(),
            record,
        };
        let table_name = table_name.ok_or_else(|| missing("tbl"))?;
        let column_names = column_names.ok_or_else(|| missing("atr"))?;
        let type_tokens = type_tokens.ok_or_else(|| missing("frm"))?;
        if column_names.len() != type_tokens.len() {
            return Err(MalformedExportError::FieldCountMismatch {
                path: path.to_path_buf(),
                columns: column_names.len(),
                types: type_tokens.len(),
            }
            .into());
        }

        Ok(Self {
            table_name,
            column_names,
            type_tokens,
        })
    }

    /// Qualified name of the staging table this export loads into.
    #[must_use]
    pub fn staging_table(&self) -> String {
        format!("{TABLE_PREFIX}{}", self.table_name)
    }

    /// Render the generated schema-definition statement.
    #[must_use]
    pub fn schema_statement(&self) -> String {
        let columns: Vec<String> = self
            .column_names
            .iter()
            .zip(&self.type_tokens)
            .map(|(name, token)| format!("{} {}", column_name(name), column_type(token)))
            .collect();
        format!(
            "CREATE TABLE {} ({});\n",
            self.staging_table(),
            columns.join(", ")
        )
    }

    /// Name of the derived data file for `source` (sibling `.csv`).
    pub(crate) fn data_file_path(source: &Utf8Path) -> Utf8PathBuf {
        source.with_extension("csv")
    }

    /// Name of the derived schema file for `source` (sibling `.sql`).
    pub(crate) fn schema_file_path(source: &Utf8Path) -> Utf8PathBuf {
        source.with_extension("sql")
    }
}

fn split_fields(rest: &str) -> Vec<String> {
    rest.trim()
        .to_lowercase()
        .split(';')
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Cursor;

    fn scan_str(content: &str) -> Result<ExportMetadata, GipCompileError> {
        let lines = Latin1Lines::from_reader(Cursor::new(content.as_bytes().to_vec()));
        ExportMetadata::scan_lines(lines, Utf8Path::new("Link.txt"))
    }

    #[rstest]
    fn captures_metadata_from_a_single_pass() {
        let metadata = scan_str(
            "tbl;Parcels\natr;PARCEL_ID;AREA\nfrm;decimal(9);decimal(8,2)\nrec;\"1\";\"2.0\"\n",
        )
        .expect("scan should succeed");
        assert_eq!(metadata.table_name, "parcels");
        assert_eq!(metadata.column_names, ["parcel_id", "area"]);
        assert_eq!(metadata.type_tokens, ["decimal(9)", "decimal(8,2)"]);
        assert_eq!(metadata.staging_table(), "gip_parcels");
    }

    #[rstest]
    fn renders_the_generated_schema_statement() {
        let metadata = scan_str(
            "tbl;parcels\natr;parcel_id;area\nfrm;decimal(9);decimal(8,2)\nrec;\"1\";\"2.0\"\n",
        )
        .expect("scan should succeed");
        assert_eq!(
            metadata.schema_statement(),
            "CREATE TABLE gip_parcels (parcel_id integer, area numeric(8,2));\n"
        );
    }

    #[rstest]
    fn stops_scanning_at_the_first_data_row() {
        // Metadata after the first `rec` line must not be read: the `frm`
        // record below it is unreachable and the scan reports it missing.
        let outcome = scan_str("tbl;parcels\natr;a\nrec;\"1\"\nfrm;string\n");
        assert!(matches!(
            outcome,
            Err(GipCompileError::Malformed(
                MalformedExportError::MissingRecord { record: "frm", .. }
            ))
        ));
    }

    #[rstest]
    #[case("atr;a\nfrm;string\nrec;1\n", "tbl")]
    #[case("tbl;parcels\nfrm;string\nrec;1\n", "atr")]
    #[case("tbl;parcels\natr;a\nrec;1\n", "frm")]
    fn reports_the_missing_record(#[case] content: &str, #[case] record: &str) {
        let outcome = scan_str(content);
        match outcome {
            Err(GipCompileError::Malformed(MalformedExportError::MissingRecord {
                record: found,
                ..
            })) => assert_eq!(found, record),
            other => panic!("expected missing `{record}` record, got {other:?}"),
        }
    }

    #[rstest]
    fn rejects_disagreeing_field_counts() {
        let outcome = scan_str("tbl;parcels\natr;a;b\nfrm;string\nrec;1;2\n");
        assert!(matches!(
            outcome,
            Err(GipCompileError::Malformed(
                MalformedExportError::FieldCountMismatch {
                    columns: 2,
                    types: 1,
                    ..
                }
            ))
        ));
    }

    #[rstest]
    fn reserved_column_is_renamed_in_the_schema_only() {
        let metadata = scan_str(
            "tbl;linkuse\natr;use_id;offset\nfrm;decimal(9);decimal(7,2)\nrec;\"1\";\"0.5\"\n",
        )
        .expect("scan should succeed");
        assert_eq!(metadata.column_names, ["use_id", "offset"]);
        assert_eq!(
            metadata.schema_statement(),
            "CREATE TABLE gip_linkuse (use_id integer, offset_ numeric(7,2));\n"
        );
    }

    #[rstest]
    fn decodes_legacy_high_bytes_exactly() {
        // 0xDF is LATIN SMALL LETTER SHARP S in ISO-8859-1.
        let bytes = b"tbl;stra\xdfe\natr;a\nfrm;string\n".to_vec();
        let lines = Latin1Lines::from_reader(Cursor::new(bytes));
        let metadata = ExportMetadata::scan_lines(lines, Utf8Path::new("Strasse.txt"))
            .expect("scan should succeed");
        assert_eq!(metadata.table_name, "stra\u{df}e");
    }

    #[rstest]
    fn strips_carriage_returns_from_line_ends() {
        let metadata = scan_str("tbl;parcels\r\natr;a\r\nfrm;string\r\n")
            .expect("scan should succeed");
        assert_eq!(metadata.column_names, ["a"]);
    }
}
