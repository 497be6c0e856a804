//! Compiler and importer for the self-describing proprietary export format.
//!
//! Export files are line-oriented text tagged by a four-character prefix:
//! `tbl;` names the table (exactly once), `atr;` lists the column names,
//! `frm;` lists the column type descriptors aligned with `atr;`, and `rec;`
//! carries the data rows. The file is its own schema catalogue: both the
//! normalized data file and the `CREATE TABLE` statement are derived from the
//! embedded metadata alone.
#![forbid(unsafe_code)]

mod compile;
mod error;
mod export;
mod importer;
mod types;

pub use compile::{ensure_data_file, ensure_schema_file};
pub use error::{GipCompileError, MalformedExportError};
pub use export::ExportMetadata;
pub use importer::{GipImportError, GipImportReport, GipImporter, IMPORT_TASKS, ImportTask};
pub use types::{TypeToken, column_name, column_type};
