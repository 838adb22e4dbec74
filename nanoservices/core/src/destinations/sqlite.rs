use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rusqlite::{params, params_from_iter, Connection};
use sekolah_utils::error::Error;
use sekolah_utils::SekolahResult;
use tokio::sync::Mutex;

use super::traits::{create_table_sql, quote_ident, TableRef, TableSink};

#[derive(Debug, Clone)]
enum Location {
    Memory,
    File(PathBuf),
}

/// Rows read back from a destination table, in insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableContents {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

/// SQLite-backed destination.
///
/// Namespaces map to attached databases: `<dir>/<namespace>.db` next to the
/// main file, or a private in-memory database for [`SqliteSink::in_memory`].
/// The connection is opened on first use so an unreachable file surfaces as a
/// `ConnectionError` from the load stage.
pub struct SqliteSink {
    location: Location,
    conn: Mutex<Option<Connection>>,
}

impl SqliteSink {
    pub fn open(path: impl AsRef<Path>) -> Self {
        Self {
            location: Location::File(path.as_ref().to_path_buf()),
            conn: Mutex::new(None),
        }
    }

    pub fn in_memory() -> Self {
        Self { location: Location::Memory, conn: Mutex::new(None) }
    }

    fn connect(&self) -> SekolahResult<Connection> {
        let conn = match &self.location {
            Location::Memory => Connection::open_in_memory(),
            Location::File(path) => Connection::open(path),
        }
        .map_err(|e| Error::ConnectionError(format!("{}: {e}", self.describe())))?;

        // Touch the file header so a bad path fails now rather than mid-write.
        conn.pragma_query_value(None, "user_version", |row| row.get::<_, i64>(0))
            .map_err(|e| Error::ConnectionError(format!("{}: {e}", self.describe())))?;
        Ok(conn)
    }

    fn describe(&self) -> String {
        match &self.location {
            Location::Memory => ":memory:".to_string(),
            Location::File(path) => path.display().to_string(),
        }
    }

    fn namespace_file(&self, namespace: &str) -> String {
        match &self.location {
            Location::Memory => ":memory:".to_string(),
            Location::File(path) => path
                .parent()
                .unwrap_or_else(|| Path::new(""))
                .join(format!("{namespace}.db"))
                .display()
                .to_string(),
        }
    }

    async fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> SekolahResult<T>,
    ) -> SekolahResult<T> {
        let mut guard = self.conn.lock().await;
        let conn = match guard.take() {
            Some(conn) => conn,
            None => self.connect()?,
        };
        f(guard.insert(conn))
    }

    /// Read a table back as text. Verification helper, not a query surface.
    pub async fn read_rows(&self, table: &TableRef) -> SekolahResult<TableContents> {
        self.ensure_namespace(&table.namespace).await?;
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&format!("SELECT * FROM {} ORDER BY rowid", table.qualified()))
                .map_err(read_error)?;
            let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
            let width = columns.len();
            let rows = stmt
                .query_map([], |row| {
                    (0..width).map(|i| row.get::<_, Option<String>>(i)).collect::<Result<Vec<_>, _>>()
                })
                .map_err(read_error)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(read_error)?;
            Ok(TableContents { columns, rows })
        })
        .await
    }
}

#[async_trait]
impl TableSink for SqliteSink {
    fn name(&self) -> &str { "sqlite" }

    async fn ensure_namespace(&self, namespace: &str) -> SekolahResult<()> {
        if namespace == "main" || namespace == "temp" {
            return Ok(());
        }
        let file = self.namespace_file(namespace);
        self.with_conn(|conn| {
            let attached = {
                let mut stmt = conn.prepare("PRAGMA database_list").map_err(write_error)?;
                let names = stmt
                    .query_map([], |row| row.get::<_, String>(1))
                    .map_err(write_error)?
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(write_error)?;
                names.iter().any(|n| n == namespace)
            };
            if !attached {
                conn.execute(
                    &format!("ATTACH DATABASE ?1 AS {}", quote_ident(namespace)),
                    params![file],
                )
                .map_err(write_error)?;
                tracing::debug!(namespace, file = %file, "attached namespace");
            }
            Ok(())
        })
        .await
    }

    async fn execute_ddl(&self, statement: &str) -> SekolahResult<()> {
        self.with_conn(|conn| conn.execute_batch(statement).map_err(write_error)).await
    }

    async fn replace_rows(
        &self,
        table: &TableRef,
        columns: &[String],
        rows: Vec<Vec<Option<String>>>,
    ) -> SekolahResult<usize> {
        if columns.is_empty() {
            return Err(Error::WriteError(format!("{table}: no columns to write")));
        }
        self.with_conn(|conn| {
            // Dropping the transaction without commit rolls everything back,
            // so readers never observe a half-replaced table.
            let tx = conn.transaction().map_err(write_error)?;
            tx.execute_batch(&format!("DROP TABLE IF EXISTS {}", table.qualified()))
                .map_err(write_error)?;
            tx.execute_batch(&create_table_sql(table, columns, false))
                .map_err(write_error)?;
            {
                let column_list: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
                let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
                let mut stmt = tx
                    .prepare(&format!(
                        "INSERT INTO {} ({}) VALUES ({})",
                        table.qualified(),
                        column_list.join(", "),
                        placeholders.join(", ")
                    ))
                    .map_err(write_error)?;
                for (i, row) in rows.iter().enumerate() {
                    if row.len() != columns.len() {
                        return Err(Error::WriteError(format!(
                            "{table}: row {i} has {} values, expected {}",
                            row.len(),
                            columns.len()
                        )));
                    }
                    stmt.execute(params_from_iter(row.iter())).map_err(write_error)?;
                }
            }
            tx.commit().map_err(write_error)?;
            Ok(rows.len())
        })
        .await
    }
}

fn write_error(e: rusqlite::Error) -> Error {
    Error::WriteError(e.to_string())
}

fn read_error(e: rusqlite::Error) -> Error {
    Error::ConnectionError(e.to_string())
}
