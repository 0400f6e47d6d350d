//! SQLite provider
//!
//! One `SqliteDatabase` serves both seams: it is the `SchemaSource` the
//! schema builder introspects and the `SqlExecutor` that runs generated
//! queries. The connection sits behind a `Mutex`; statements are short and
//! read-only, so a single connection is enough.

use super::seed::seed_sample_database;
use crate::error::{QueryCraftError, Result};
use crate::execution::{RowSet, SqlExecutor};
use crate::schema::{quote_identifier, Column, ForeignKey, SchemaSource};
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde_json::{Map, Number, Value};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;
use tracing::{debug, info};

pub struct SqliteDatabase {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
    /// Rows beyond this are dropped and the row set is marked truncated
    max_rows: usize,
}

impl SqliteDatabase {
    const DEFAULT_MAX_ROWS: usize = 1000;

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path)
            .map_err(|e| QueryCraftError::SchemaUnavailable(format!("Failed to open {}: {}", path.display(), e)))?;
        info!("Opened SQLite database {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path),
            max_rows: Self::DEFAULT_MAX_ROWS,
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Mutex::new(Connection::open_in_memory()?),
            path: None,
            max_rows: Self::DEFAULT_MAX_ROWS,
        })
    }

    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = max_rows;
        self
    }

    /// File backing the database; `None` when in memory
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Create and fill the demo e-commerce tables.
    pub fn seed_sample_data(&self) -> Result<()> {
        let conn = self.lock()?;
        seed_sample_database(&conn)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| QueryCraftError::Execution("SQLite connection lock poisoned".to_string()))
    }
}

impl SchemaSource for SqliteDatabase {
    fn table_names(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(names)
    }

    fn columns(&self, table: &str) -> Result<Vec<Column>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_identifier(table)))?;
        // cid, name, type, notnull, dflt_value, pk
        let columns = stmt
            .query_map([], |row| {
                let name: String = row.get(1)?;
                let data_type: Option<String> = row.get(2)?;
                let not_null: i64 = row.get(3)?;
                let pk: i64 = row.get(5)?;
                let mut column = Column::new(name, data_type.unwrap_or_default());
                if not_null != 0 {
                    column = column.not_null();
                }
                if pk > 0 {
                    column = column.primary_key();
                }
                Ok(column)
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(columns)
    }

    fn foreign_keys(&self, table: &str) -> Result<Vec<ForeignKey>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!("PRAGMA foreign_key_list({})", quote_identifier(table)))?;
        // id, seq, table, from, to, on_update, on_delete, match
        let fks = stmt
            .query_map([], |row| {
                Ok(ForeignKey {
                    to_table: row.get(2)?,
                    from_column: row.get(3)?,
                    to_column: row.get::<_, Option<String>>(4)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(fks)
    }
}

fn json_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(format!("<blob {} bytes>", bytes.len())),
    }
}

fn execution(err: rusqlite::Error) -> QueryCraftError {
    QueryCraftError::Execution(err.to_string())
}

impl SqlExecutor for SqliteDatabase {
    fn execute(&self, sql: &str) -> Result<RowSet> {
        let started = Instant::now();
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql).map_err(execution)?;
        if !stmt.readonly() {
            return Err(QueryCraftError::Execution(
                "only read-only statements can be executed".to_string(),
            ));
        }
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let mut rows = stmt.query([]).map_err(execution)?;
        let mut out = Vec::new();
        let mut truncated = false;
        while let Some(row) = rows.next().map_err(execution)? {
            if out.len() == self.max_rows {
                truncated = true;
                break;
            }
            let mut record = Map::with_capacity(columns.len());
            for (index, name) in columns.iter().enumerate() {
                let value = row.get_ref(index).map_err(execution)?;
                record.insert(name.clone(), json_value(value));
            }
            out.push(record);
        }

        let elapsed = started.elapsed().as_millis() as u64;
        debug!("Executed query in {}ms ({} rows{})", elapsed, out.len(), if truncated { ", truncated" } else { "" });
        Ok(RowSet::new(columns, out, truncated, elapsed))
    }
}
