//! Repository layer abstractions and SQLite implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repository writes validate model input before any SQL mutation.
//! - Fee-ledger mutations run inside one `IMMEDIATE` transaction together
//!   with their reconciliation.
//! - Repository APIs return semantic errors (`NotFound`, `NoFeeRecord`, ...)
//!   in addition to DB transport errors.

pub(crate) mod columns;
pub mod fee_repo;
pub mod payment_repo;
pub(crate) mod reconcile;
pub mod school_repo;

use crate::db::migrations::latest_version;
use crate::db::{schema_version, table_exists, DbError};
use rusqlite::Connection;

/// Why a connection cannot back a repository yet.
#[derive(Debug)]
pub(crate) enum ConnectionNotReady {
    Version { expected: u32, actual: u32 },
    MissingTable(&'static str),
    Db(DbError),
}

/// Checks that migrations ran and the listed tables are present.
pub(crate) fn check_connection_ready(
    conn: &Connection,
    tables: &[&'static str],
) -> Result<(), ConnectionNotReady> {
    let expected = latest_version();
    let actual = schema_version(conn).map_err(ConnectionNotReady::Db)?;
    if actual != expected {
        return Err(ConnectionNotReady::Version { expected, actual });
    }

    for table in tables {
        if !table_exists(conn, table).map_err(ConnectionNotReady::Db)? {
            return Err(ConnectionNotReady::MissingTable(table));
        }
    }

    Ok(())
}
