use std::fmt;

use async_trait::async_trait;
use sekolah_utils::{SekolahResult, TabularFrame};

use crate::contract::{DESTINATION_NAMESPACE, DESTINATION_TABLE};

/// Outcome of a successful load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub table: String,
    pub rows: usize,
    pub columns: usize,
}

/// A data destination that persists a transformed frame.
#[async_trait]
pub trait Destination: Send + Sync {
    fn name(&self) -> &str;

    /// Persist the frame, superseding whatever the destination held before.
    async fn load(&self, frame: &TabularFrame) -> SekolahResult<LoadReport>;
}

/// Fully qualified destination table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    pub namespace: String,
    pub table: String,
}

impl TableRef {
    pub fn new(namespace: impl Into<String>, table: impl Into<String>) -> Self {
        Self { namespace: namespace.into(), table: table.into() }
    }

    /// `"namespace"."table"`, safe to splice into SQL.
    pub fn qualified(&self) -> String {
        format!("{}.{}", quote_ident(&self.namespace), quote_ident(&self.table))
    }
}

impl Default for TableRef {
    fn default() -> Self {
        Self::new(DESTINATION_NAMESPACE, DESTINATION_TABLE)
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.table)
    }
}

/// Transactional tabular store the loader writes through.
///
/// Connection management belongs to the implementation; the loader only sees
/// these three operations.
#[async_trait]
pub trait TableSink: Send + Sync {
    fn name(&self) -> &str;

    /// Create the namespace if it does not exist yet.
    async fn ensure_namespace(&self, namespace: &str) -> SekolahResult<()>;

    /// Run a schema statement such as `CREATE TABLE IF NOT EXISTS`.
    async fn execute_ddl(&self, statement: &str) -> SekolahResult<()>;

    /// Drop and redefine `table` with `columns` (all text) and insert `rows`,
    /// as one logical operation. Returns the number of rows written.
    async fn replace_rows(
        &self,
        table: &TableRef,
        columns: &[String],
        rows: Vec<Vec<Option<String>>>,
    ) -> SekolahResult<usize>;
}

pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// `CREATE TABLE` with every column declared `TEXT`.
pub fn create_table_sql(table: &TableRef, columns: &[String], if_not_exists: bool) -> String {
    let column_defs: Vec<String> = columns
        .iter()
        .map(|c| format!("{} TEXT", quote_ident(c)))
        .collect();
    format!(
        "CREATE TABLE {}{} ({})",
        if if_not_exists { "IF NOT EXISTS " } else { "" },
        table.qualified(),
        column_defs.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_target_is_fixed() {
        let target = TableRef::default();
        assert_eq!(target.to_string(), "hijir.target_table");
        assert_eq!(target.qualified(), "\"hijir\".\"target_table\"");
    }

    #[test]
    fn identifiers_are_escaped() {
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn create_statement_uses_text_columns() {
        let sql = create_table_sql(
            &TableRef::new("hijir", "target_table"),
            &["sekolah".to_string(), "lintang".to_string()],
            true,
        );
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS \"hijir\".\"target_table\" (\"sekolah\" TEXT, \"lintang\" TEXT)"
        );
    }
}
