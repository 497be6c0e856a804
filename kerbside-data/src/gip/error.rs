//! Error types produced by the export format compiler.

use std::io;

use camino::Utf8PathBuf;
use thiserror::Error;

/// Structural violations of the self-describing export format.
///
/// These are never retried: a malformed source file aborts the current task.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MalformedExportError {
    /// A data or attribute record appeared before the table record, so no
    /// output sink was open.
    #[error("record before any table record at line {line} in {path:?}")]
    RecordBeforeTable {
        /// Source export file.
        path: Utf8PathBuf,
        /// One-based line number of the offending record.
        line: usize,
    },
    /// The file ended before one of the mandatory metadata records was seen.
    #[error("missing `{record}` record in {path:?}")]
    MissingRecord {
        /// Source export file.
        path: Utf8PathBuf,
        /// Tag of the absent record (`tbl`, `atr` or `frm`).
        record: &'static str,
    },
    /// The attribute and format records disagree on the column count.
    #[error("{path:?} declares {columns} columns but {types} type descriptors")]
    FieldCountMismatch {
        /// Source export file.
        path: Utf8PathBuf,
        /// Field count of the `atr` record.
        columns: usize,
        /// Field count of the `frm` record.
        types: usize,
    },
}

/// Errors raised while compiling an export file into derived artifacts.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GipCompileError {
    /// The source file violates the format's structural invariants.
    #[error(transparent)]
    Malformed(#[from] MalformedExportError),
    /// Reading the source export file failed.
    #[error("failed to read export file {path:?}")]
    Read {
        /// Source export file.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// Writing a derived artifact failed.
    #[error("failed to write derived artifact {path:?}")]
    Write {
        /// Destination artifact path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}
