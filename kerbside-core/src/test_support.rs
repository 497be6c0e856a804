//! Test-only recording fakes for the collaborator contracts.
//!
//! The fakes append one line per call to an operation journal so tests can
//! assert on step ordering — the pipeline's main correctness property —
//! without a live database or the external tool binaries.

use std::cell::RefCell;
use std::collections::BTreeSet;

use camino::{Utf8Path, Utf8PathBuf};

use crate::{
    Database, DatabaseError, ExternalToolError, OsmLoader, TabularLoader, VectorLoadRequest,
    VectorLoader,
};

/// Recording [`Database`] fake.
///
/// Every call is journalled as `<operation>:<detail>`. Conflict checks
/// consult a configurable set of pre-existing tables; names that pass the
/// check are added to the set, so a second materialisation of the same output
/// reports a conflict exactly like a live catalogue would.
#[derive(Debug, Default)]
pub struct RecordingDatabase {
    operations: Vec<String>,
    existing_tables: BTreeSet<String>,
    fail_operation: Option<&'static str>,
    closed: bool,
}

impl RecordingDatabase {
    /// Construct an empty fake with no pre-existing tables.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct a fake whose catalogue already contains `tables`.
    pub fn with_existing_tables<I, S>(tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            existing_tables: tables.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Make the named operation fail on every call.
    #[must_use]
    pub fn failing_on(mut self, operation: &'static str) -> Self {
        self.fail_operation = Some(operation);
        self
    }

    /// Journal of calls in arrival order.
    #[must_use]
    pub fn operations(&self) -> &[String] {
        &self.operations
    }

    /// Whether [`Database::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn record(&mut self, operation: &'static str, detail: &str) -> Result<(), DatabaseError> {
        if self.fail_operation == Some(operation) {
            return Err(DatabaseError::new(operation, "injected failure"));
        }
        if detail.is_empty() {
            self.operations.push(operation.to_owned());
        } else {
            self.operations.push(format!("{operation}:{detail}"));
        }
        Ok(())
    }
}

impl Database for RecordingDatabase {
    fn execute(&mut self, sql: &str) -> Result<(), DatabaseError> {
        let condensed = sql.split_whitespace().collect::<Vec<_>>().join(" ");
        self.record("execute", &condensed)
    }

    fn commit(&mut self) -> Result<(), DatabaseError> {
        self.record("commit", "")
    }

    fn drop_table(&mut self, table: &str, schema: &str) -> Result<(), DatabaseError> {
        let qualified = format!("{schema}.{table}");
        self.existing_tables.remove(table);
        self.record("drop_table", &qualified)
    }

    fn ensure_extensions_and_schema(&mut self, schema: &str) -> Result<(), DatabaseError> {
        self.record("ensure_extensions_and_schema", schema)
    }

    fn add_primary_key(
        &mut self,
        table: &str,
        columns: &[&str],
        schema: &str,
    ) -> Result<(), DatabaseError> {
        let detail = format!("{schema}.{table}:{}", columns.join(","));
        self.record("add_primary_key", &detail)
    }

    fn execute_file(
        &mut self,
        base_name: &str,
        directory: &Utf8Path,
    ) -> Result<(), DatabaseError> {
        let detail = format!("{directory}/{base_name}.sql");
        self.record("execute_file", &detail)
    }

    fn handle_conflicting_output_tables(
        &mut self,
        names: &[&str],
        schema: &str,
    ) -> Result<bool, DatabaseError> {
        let detail = format!("{schema}:{}", names.join(","));
        self.record("handle_conflicting_output_tables", &detail)?;
        let conflict = names
            .iter()
            .any(|name| self.existing_tables.contains(*name));
        if conflict {
            return Ok(false);
        }
        for name in names {
            self.existing_tables.insert((*name).to_owned());
        }
        Ok(true)
    }

    fn close(&mut self) -> Result<(), DatabaseError> {
        self.closed = true;
        self.record("close", "")
    }
}

/// Recording [`TabularLoader`] fake.
#[derive(Debug, Default)]
pub struct RecordingTabularLoader {
    calls: RefCell<Vec<(Utf8PathBuf, String, String)>>,
    fail: bool,
}

impl RecordingTabularLoader {
    /// Construct a loader that succeeds on every call.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct a loader that fails every call with a non-zero exit.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            fail: true,
        }
    }

    /// Calls observed so far as `(path, schema, table)` triples.
    #[must_use]
    pub fn calls(&self) -> Vec<(Utf8PathBuf, String, String)> {
        self.calls.borrow().clone()
    }
}

impl TabularLoader for RecordingTabularLoader {
    fn load_delimited(
        &self,
        path: &Utf8Path,
        schema: &str,
        table: &str,
    ) -> Result<(), ExternalToolError> {
        self.calls
            .borrow_mut()
            .push((path.to_path_buf(), schema.to_owned(), table.to_owned()));
        if self.fail {
            return Err(ExternalToolError::Failed {
                tool: "fake-tabular-loader".to_owned(),
                status: 1,
            });
        }
        Ok(())
    }
}

/// Recording [`OsmLoader`] fake.
#[derive(Debug, Default)]
pub struct RecordingOsmLoader {
    calls: RefCell<Vec<(Utf8PathBuf, Utf8PathBuf, String, String)>>,
}

impl RecordingOsmLoader {
    /// Construct a loader that succeeds on every call.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls observed so far as `(extract, style, schema, prefix)` tuples.
    #[must_use]
    pub fn calls(&self) -> Vec<(Utf8PathBuf, Utf8PathBuf, String, String)> {
        self.calls.borrow().clone()
    }
}

impl OsmLoader for RecordingOsmLoader {
    fn load_extract(
        &self,
        extract: &Utf8Path,
        style: &Utf8Path,
        schema: &str,
        prefix: &str,
    ) -> Result<(), ExternalToolError> {
        self.calls.borrow_mut().push((
            extract.to_path_buf(),
            style.to_path_buf(),
            schema.to_owned(),
            prefix.to_owned(),
        ));
        Ok(())
    }
}

/// Recording [`VectorLoader`] fake.
#[derive(Debug, Default)]
pub struct RecordingVectorLoader {
    calls: RefCell<Vec<String>>,
}

impl RecordingVectorLoader {
    /// Construct a loader that succeeds on every call.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Target tables of the calls observed so far.
    #[must_use]
    pub fn loaded_tables(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

impl VectorLoader for RecordingVectorLoader {
    fn load_vector(&self, request: &VectorLoadRequest<'_>) -> Result<(), ExternalToolError> {
        self.calls
            .borrow_mut()
            .push(format!("{}.{}", request.schema, request.table));
        Ok(())
    }
}
