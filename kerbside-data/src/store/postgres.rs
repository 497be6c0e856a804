//! PostgreSQL adapter for the [`Database`] contract.
//!
//! The adapter keeps an explicit transaction open at all times, mirroring
//! the commit discipline the importers rely on: statements accumulate until
//! [`Database::commit`] issues `COMMIT` and immediately opens the next
//! transaction. Dropping the adapter discards uncommitted work.

use std::fs;

use camino::Utf8Path;
use kerbside_core::{Database, DatabaseError};
use log::debug;
use postgres::{Client, NoTls};
use thiserror::Error;

/// Errors raised while establishing the database connection.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PostgresDatabaseError {
    /// The connection could not be established.
    #[error("failed to connect to PostgreSQL")]
    Connect {
        /// Source error from the client.
        #[source]
        source: postgres::Error,
    },
    /// The initial transaction could not be opened.
    #[error("failed to open the initial transaction")]
    Begin {
        /// Source error from the client.
        #[source]
        source: postgres::Error,
    },
}

/// [`Database`] implementation backed by a single PostgreSQL connection.
pub struct PostgresDatabase {
    client: Client,
    closed: bool,
}

impl std::fmt::Debug for PostgresDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresDatabase")
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl PostgresDatabase {
    /// Connect using a libpq-style parameter string and open the first
    /// transaction.
    ///
    /// # Errors
    /// See [`PostgresDatabaseError`].
    pub fn connect(params: &str) -> Result<Self, PostgresDatabaseError> {
        let mut client = Client::connect(params, NoTls)
            .map_err(|source| PostgresDatabaseError::Connect { source })?;
        client
            .batch_execute("BEGIN")
            .map_err(|source| PostgresDatabaseError::Begin { source })?;
        Ok(Self {
            client,
            closed: false,
        })
    }

    fn batch(&mut self, operation: &'static str, sql: &str) -> Result<(), DatabaseError> {
        debug!("{operation}: {sql}");
        self.client
            .batch_execute(sql)
            .map_err(|source| DatabaseError::with_source(operation, sql.to_owned(), source))
    }
}

impl Database for PostgresDatabase {
    fn execute(&mut self, sql: &str) -> Result<(), DatabaseError> {
        self.batch("execute", sql)
    }

    fn commit(&mut self) -> Result<(), DatabaseError> {
        self.batch("commit", "COMMIT")?;
        self.batch("commit", "BEGIN")
    }

    fn drop_table(&mut self, table: &str, schema: &str) -> Result<(), DatabaseError> {
        self.batch("drop_table", &drop_table_statement(table, schema))
    }

    fn ensure_extensions_and_schema(&mut self, schema: &str) -> Result<(), DatabaseError> {
        self.batch(
            "ensure_extensions_and_schema",
            &ensure_statement(schema),
        )
    }

    fn add_primary_key(
        &mut self,
        table: &str,
        columns: &[&str],
        schema: &str,
    ) -> Result<(), DatabaseError> {
        self.batch(
            "add_primary_key",
            &add_primary_key_statement(table, columns, schema),
        )
    }

    fn execute_file(
        &mut self,
        base_name: &str,
        directory: &Utf8Path,
    ) -> Result<(), DatabaseError> {
        let path = directory.join(base_name).with_extension("sql");
        let sql = fs::read_to_string(&path).map_err(|source| {
            DatabaseError::with_source("execute_file", path.to_string(), source)
        })?;
        self.batch("execute_file", &sql)
    }

    fn handle_conflicting_output_tables(
        &mut self,
        names: &[&str],
        schema: &str,
    ) -> Result<bool, DatabaseError> {
        let names_owned: Vec<String> = names.iter().map(|name| (*name).to_owned()).collect();
        let rows = self
            .client
            .query(
                "SELECT table_name FROM information_schema.tables \
                 WHERE table_schema = $1 AND table_name = ANY($2)",
                &[&schema, &names_owned],
            )
            .map_err(|source| {
                DatabaseError::with_source(
                    "handle_conflicting_output_tables",
                    names_owned.join(", "),
                    source,
                )
            })?;
        if rows.is_empty() {
            return Ok(true);
        }
        let conflicting: Vec<String> = rows.iter().map(|row| row.get(0)).collect();
        log::warn!(
            "output tables already exist, skipping creation: {}",
            conflicting.join(", ")
        );
        Ok(false)
    }

    fn close(&mut self) -> Result<(), DatabaseError> {
        if self.closed {
            return Ok(());
        }
        self.batch("close", "COMMIT")?;
        self.closed = true;
        Ok(())
    }
}

fn quoted(identifier: &str) -> String {
    format!("\"{identifier}\"")
}

fn drop_table_statement(table: &str, schema: &str) -> String {
    format!(
        "DROP TABLE IF EXISTS {}.{} CASCADE",
        quoted(schema),
        quoted(table)
    )
}

fn ensure_statement(schema: &str) -> String {
    format!(
        "CREATE EXTENSION IF NOT EXISTS postgis;\n\
         CREATE SCHEMA IF NOT EXISTS {0};\n\
         SET search_path TO {0}, public;",
        quoted(schema)
    )
}

fn add_primary_key_statement(table: &str, columns: &[&str], schema: &str) -> String {
    format!(
        "ALTER TABLE {}.{} ADD PRIMARY KEY ({})",
        quoted(schema),
        quoted(table),
        columns.join(", ")
    )
}
