// src/store/sqlite.rs

//! Durable result store on a local SQLite database.

use std::fs;
use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{params, params_from_iter, Connection, ErrorCode};
use tracing::{debug, info};

use super::{RecordFilter, ResultStore, StoredRecord};
use crate::errors::{DaemonError, Result};

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS migrations (
    uid       TEXT NOT NULL,
    name      TEXT NOT NULL,
    host      TEXT NOT NULL,
    data_type TEXT NOT NULL,
    data      TEXT NOT NULL,
    PRIMARY KEY (uid, name, host, data_type)
)";

const INSERT: &str =
    "INSERT INTO migrations (uid, name, host, data_type, data) VALUES (?1, ?2, ?3, ?4, ?5)";

const SELECT: &str = "SELECT uid, name, host, data_type, data FROM migrations";

/// SQLite-backed [`ResultStore`].
///
/// A single connection is shared behind a mutex; every write runs in its own
/// transaction.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (and create if needed) the database at `path`, including its
    /// parent directory.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        info!(path = %path.display(), "opened result database");
        Self::with_connection(conn)
    }

    /// Private in-memory database, mostly useful in tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute(CREATE_TABLE, [])?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl ResultStore for SqliteStore {
    fn put(&self, record: StoredRecord) -> Result<()> {
        let key = record.key();
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let inserted = tx.execute(
            INSERT,
            params![
                record.uid,
                record.name,
                record.host,
                record.data_type,
                record.data
            ],
        );

        match inserted {
            Ok(_) => {
                tx.commit()?;
                debug!(%key, "stored record in sqlite");
                Ok(())
            }
            // The transaction rolls back when dropped.
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Err(DaemonError::DuplicateRecord(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn select(&self, filter: &RecordFilter) -> Result<Vec<StoredRecord>> {
        let (where_clause, values) = build_where(filter);

        let mut query = SELECT.to_string();
        if !where_clause.is_empty() {
            query.push_str(" WHERE ");
            query.push_str(&where_clause);
        }
        query.push_str(" ORDER BY uid, name, host, data_type");

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&query)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), |row| {
            Ok(StoredRecord {
                uid: row.get(0)?,
                name: row.get(1)?,
                host: row.get(2)?,
                data_type: row.get(3)?,
                data: row.get(4)?,
            })
        })?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

/// Build a parameterised `WHERE` clause from the filter's set fields.
fn build_where(filter: &RecordFilter) -> (String, Vec<String>) {
    let columns = [
        ("uid", &filter.uid),
        ("name", &filter.name),
        ("host", &filter.host),
        ("data_type", &filter.data_type),
    ];

    let mut clauses = Vec::new();
    let mut values = Vec::new();
    for (column, wanted) in columns {
        if let Some(value) = wanted {
            values.push(value.clone());
            clauses.push(format!("{column} = ?{}", values.len()));
        }
    }

    (clauses.join(" AND "), values)
}

