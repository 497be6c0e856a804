//! Contract for the relational warehouse the importers drive.
//!
//! The pipeline owns the decision of *when* tables are (re)created; the
//! implementation behind this trait owns physical storage, transactions and
//! the SQL dialect details. Implementations live outside this crate (see
//! `kerbside-data::store`); tests use the recording fake from
//! [`crate::test_support`].

use std::error::Error as StdError;

use camino::Utf8Path;
use thiserror::Error;

/// Error reported by a [`Database`] implementation.
///
/// The pipeline treats database failures as run-fatal and never inspects
/// them beyond the failed operation name, so the payload is deliberately
/// opaque: an operation label, a human-readable detail, and an optional
/// source chain.
#[derive(Debug, Error)]
#[error("database {operation} failed: {detail}")]
pub struct DatabaseError {
    operation: &'static str,
    detail: String,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl DatabaseError {
    /// Construct an error without an underlying source.
    pub fn new(operation: &'static str, detail: impl Into<String>) -> Self {
        Self {
            operation,
            detail: detail.into(),
            source: None,
        }
    }

    /// Construct an error wrapping the implementation's own failure value.
    pub fn with_source(
        operation: &'static str,
        detail: impl Into<String>,
        source: impl Into<Box<dyn StdError + Send + Sync>>,
    ) -> Self {
        Self {
            operation,
            detail: detail.into(),
            source: Some(source.into()),
        }
    }

    /// Name of the failed operation (`"execute"`, `"commit"`, ...).
    #[must_use]
    pub fn operation(&self) -> &'static str {
        self.operation
    }
}

/// Narrow contract over the target relational database.
///
/// One connection is held for the duration of an importer run; calls are
/// blocking and strictly sequential. Transaction boundaries are explicit:
/// nothing is durable until [`Database::commit`] returns.
pub trait Database {
    /// Execute one or more SQL statements.
    fn execute(&mut self, sql: &str) -> Result<(), DatabaseError>;

    /// Make all statements since the previous commit durable.
    fn commit(&mut self) -> Result<(), DatabaseError>;

    /// Drop `table` in `schema` if it exists.
    fn drop_table(&mut self, table: &str, schema: &str) -> Result<(), DatabaseError>;

    /// Create the required extensions and the working schema, and make the
    /// schema the default search path for the connection.
    fn ensure_extensions_and_schema(&mut self, schema: &str) -> Result<(), DatabaseError>;

    /// Add a primary key over `columns` to an already-loaded table.
    fn add_primary_key(
        &mut self,
        table: &str,
        columns: &[&str],
        schema: &str,
    ) -> Result<(), DatabaseError>;

    /// Execute the statements stored in `<directory>/<base_name>.sql`.
    fn execute_file(&mut self, base_name: &str, directory: &Utf8Path)
    -> Result<(), DatabaseError>;

    /// Check whether the named output tables may be (re)created.
    ///
    /// Returns `false` when an existing table conflicts, in which case the
    /// caller must skip creation entirely.
    fn handle_conflicting_output_tables(
        &mut self,
        names: &[&str],
        schema: &str,
    ) -> Result<bool, DatabaseError>;

    /// Release the connection. Implementations commit pending work first.
    fn close(&mut self) -> Result<(), DatabaseError>;
}
