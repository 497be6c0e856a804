//! Concrete store adapters behind the collaborator contracts.
#![forbid(unsafe_code)]

mod postgres;

pub use postgres::{PostgresDatabase, PostgresDatabaseError};
