//! DuckDB sink
//!
//! One table per resource:
//!
//! ```sql
//! CREATE TABLE "<resource>" (_key VARCHAR, _loaded_at TIMESTAMP, data VARCHAR)
//! ```
//!
//! `data` holds the record as JSON text. Every `put` runs inside one
//! transaction that is rolled back if the record stream fails.

use super::types::{record_key, Sink, SinkOutcome, DEFAULT_KEY_FIELD};
use crate::error::{Error, Result};
use crate::types::{Record, RecordStream, WriteDisposition};
use async_trait::async_trait;
use duckdb::{params, Connection};
use futures::StreamExt;
use std::path::Path;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Records inserted per lock-free batch
const INSERT_CHUNK: usize = 500;

/// Sink writing into a DuckDB database
pub struct DuckDbSink {
    conn: Mutex<Connection>,
    key_field: String,
    location: String,
}

impl DuckDbSink {
    /// Open (or create) a database file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|e| {
            Error::sink(format!("Failed to open DuckDB at '{}': {e}", path.display()))
        })?;
        Ok(Self::from_connection(conn, path.display().to_string()))
    }

    /// In-memory database
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::sink(format!("Failed to create DuckDB connection: {e}")))?;
        Ok(Self::from_connection(conn, ":memory:".to_string()))
    }

    fn from_connection(conn: Connection, location: String) -> Self {
        Self {
            conn: Mutex::new(conn),
            key_field: DEFAULT_KEY_FIELD.to_string(),
            location,
        }
    }

    /// Upsert by `key_field` instead of `id`
    #[must_use]
    pub fn with_key_field(mut self, key_field: impl Into<String>) -> Self {
        self.key_field = key_field.into();
        self
    }

    /// Number of rows stored for `resource`; zero if never written
    pub async fn row_count(&self, resource: &str) -> Result<u64> {
        let table = quote_table(resource)?;
        let conn = self.conn.lock().await;
        if !table_exists(&conn, resource)? {
            return Ok(0);
        }
        let count: i64 = conn.query_row(&format!("SELECT count(*) FROM {table}"), [], |row| {
            row.get(0)
        })?;
        Ok(count as u64)
    }

    /// Rows stored for `resource`, in insertion order
    pub async fn rows(&self, resource: &str) -> Result<Vec<Record>> {
        let table = quote_table(resource)?;
        let conn = self.conn.lock().await;
        if !table_exists(&conn, resource)? {
            return Ok(Vec::new());
        }

        let mut stmt = conn.prepare(&format!("SELECT data FROM {table} ORDER BY rowid"))?;
        let texts = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        texts
            .iter()
            .map(|text| serde_json::from_str(text).map_err(Error::from))
            .collect()
    }

    fn insert_chunk(
        &self,
        conn: &Connection,
        table: &str,
        disposition: WriteDisposition,
        chunk: &[Record],
    ) -> Result<()> {
        let mut insert = conn.prepare_cached(&format!(
            "INSERT INTO {table} (_key, data) VALUES (?, ?)"
        ))?;
        let mut delete = conn.prepare_cached(&format!("DELETE FROM {table} WHERE _key = ?"))?;

        for record in chunk {
            let key = record_key(record, &self.key_field);
            if disposition == WriteDisposition::Incremental {
                if let Some(key) = &key {
                    delete.execute(params![key])?;
                }
            }
            let data = serde_json::to_string(record)?;
            insert.execute(params![key, data])?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for DuckDbSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuckDbSink")
            .field("location", &self.location)
            .field("key_field", &self.key_field)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Sink for DuckDbSink {
    fn name(&self) -> &str {
        "duckdb"
    }

    async fn put(
        &self,
        resource: &str,
        disposition: WriteDisposition,
        mut records: RecordStream,
    ) -> Result<SinkOutcome> {
        let table = quote_table(resource)?;
        let conn = self.conn.lock().await;

        conn.execute_batch("BEGIN TRANSACTION")?;

        // No borrow of the connection may live across an await
        let mut failure = prepare_table(&conn, &table, disposition).err();
        let mut written = 0u64;
        let mut chunk = Vec::with_capacity(INSERT_CHUNK);

        while failure.is_none() {
            match records.next().await {
                Some(Ok(record)) => {
                    chunk.push(record);
                    if chunk.len() == INSERT_CHUNK {
                        match self.insert_chunk(&conn, &table, disposition, &chunk) {
                            Ok(()) => {
                                written += chunk.len() as u64;
                                chunk.clear();
                            }
                            Err(e) => failure = Some(e),
                        }
                    }
                }
                Some(Err(e)) => failure = Some(e),
                None => break,
            }
        }

        if failure.is_none() {
            match self.insert_chunk(&conn, &table, disposition, &chunk) {
                Ok(()) => written += chunk.len() as u64,
                Err(e) => failure = Some(e),
            }
        }

        match failure {
            None => {
                conn.execute_batch("COMMIT")?;
                debug!(resource, %disposition, written, "DuckDB commit");
                Ok(SinkOutcome::new(resource, disposition, written))
            }
            Some(e) => {
                if let Err(rollback) = conn.execute_batch("ROLLBACK") {
                    warn!(resource, error = %rollback, "DuckDB rollback failed");
                }
                Err(e)
            }
        }
    }
}

fn prepare_table(conn: &Connection, table: &str, disposition: WriteDisposition) -> Result<()> {
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {table} (\
         _key VARCHAR, \
         _loaded_at TIMESTAMP DEFAULT current_timestamp, \
         data VARCHAR)"
    ))?;
    if disposition == WriteDisposition::Replace {
        conn.execute_batch(&format!("DELETE FROM {table}"))?;
    }
    Ok(())
}

/// Quote a resource name as a table identifier
fn quote_table(resource: &str) -> Result<String> {
    let valid = !resource.is_empty()
        && resource
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(Error::sink(format!("Invalid table name: '{resource}'")));
    }
    Ok(format!("\"{resource}\""))
}

fn table_exists(conn: &Connection, resource: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT count(*) FROM information_schema.tables WHERE table_name = ?",
        params![resource],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}
