use std::collections::HashMap;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray};
use arrow::datatypes::{DataType, Float64Type};
use arrow::util::display::array_value_to_string;
use async_trait::async_trait;
use sekolah_utils::error::Error;
use sekolah_utils::{SekolahResult, TabularFrame};

use super::traits::{create_table_sql, Destination, LoadReport, TableRef, TableSink};

/// Replaces a fixed destination table with the frame's contents.
///
/// Every column is stored as `TEXT`; readers re-parse numeric columns.
pub struct TableLoader {
    sink: Arc<dyn TableSink>,
    target: TableRef,
}

impl TableLoader {
    pub fn new(sink: Arc<dyn TableSink>, target: TableRef) -> Self {
        Self { sink, target }
    }

    pub fn target(&self) -> &TableRef {
        &self.target
    }
}

#[async_trait]
impl Destination for TableLoader {
    fn name(&self) -> &str { "table_loader" }

    async fn load(&self, frame: &TabularFrame) -> SekolahResult<LoadReport> {
        let columns = frame.column_names();
        if columns.is_empty() {
            return Err(Error::WriteError(format!("{}: frame has no columns", self.target)));
        }
        if let Some((first, second)) = case_collision(&columns) {
            return Err(Error::WriteError(format!(
                "{}: columns `{first}` and `{second}` differ only by case",
                self.target
            )));
        }

        self.sink.ensure_namespace(&self.target.namespace).await?;
        self.sink
            .execute_ddl(&create_table_sql(&self.target, &columns, true))
            .await?;

        let rows = frame_to_text_rows(frame)?;
        let written = self.sink.replace_rows(&self.target, &columns, rows).await?;

        tracing::info!(
            table = %self.target,
            sink = self.sink.name(),
            rows = written,
            columns = columns.len(),
            "replaced destination table"
        );

        Ok(LoadReport {
            table: self.target.to_string(),
            rows: written,
            columns: columns.len(),
        })
    }
}

/// SQL identifiers compare case-insensitively, so `Status` and `status`
/// cannot both be columns of one table.
fn case_collision(columns: &[String]) -> Option<(&str, &str)> {
    let mut seen: HashMap<String, &str> = HashMap::with_capacity(columns.len());
    for column in columns {
        if let Some(previous) = seen.insert(column.to_lowercase(), column.as_str()) {
            return Some((previous, column));
        }
    }
    None
}

/// Render every cell of the frame as text, row-major, nulls kept as `None`.
pub fn frame_to_text_rows(frame: &TabularFrame) -> SekolahResult<Vec<Vec<Option<String>>>> {
    let mut rows = Vec::with_capacity(frame.num_rows());
    for batch in frame.batches() {
        for i in 0..batch.num_rows() {
            let row = batch
                .columns()
                .iter()
                .map(|col| cell_text(col, i))
                .collect::<SekolahResult<Vec<_>>>()?;
            rows.push(row);
        }
    }
    Ok(rows)
}

fn cell_text(column: &ArrayRef, row: usize) -> SekolahResult<Option<String>> {
    if column.is_null(row) {
        return Ok(None);
    }
    let text = match column.data_type() {
        DataType::Utf8 => column.as_string::<i32>().value(row).to_string(),
        DataType::Float64 => column.as_primitive::<Float64Type>().value(row).to_string(),
        _ => array_value_to_string(column, row)?,
    };
    Ok(Some(text))
}
