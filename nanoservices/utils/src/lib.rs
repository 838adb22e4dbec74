pub mod error;

use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use error::Error;
use serde_json::{Map, Value};
use std::sync::Arc;

pub type SekolahResult<T> = Result<T, Error>;

/// One source record: field name to untyped scalar.
pub type RawRecord = Map<String, Value>;

/// Ordered record collection produced by an extractor. Cheap to clone.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawRecords(pub Arc<Vec<RawRecord>>);

impl RawRecords {
    pub fn new(records: Vec<RawRecord>) -> Self {
        RawRecords(Arc::new(records))
    }

    pub fn records(&self) -> &[RawRecord] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Columnar result of a transform, as Arrow batches sharing one schema.
#[derive(Clone, Debug)]
pub struct TabularFrame {
    schema: SchemaRef,
    batches: Arc<Vec<RecordBatch>>,
}

impl TabularFrame {
    pub fn new(schema: SchemaRef, batches: Vec<RecordBatch>) -> Self {
        TabularFrame { schema, batches: Arc::new(batches) }
    }

    pub fn from_batch(batch: RecordBatch) -> Self {
        Self::new(batch.schema(), vec![batch])
    }

    pub fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }

    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(|b| b.num_rows()).sum()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.schema.fields().iter().map(|f| f.name().clone()).collect()
    }
}

impl PartialEq for TabularFrame {
    fn eq(&self, other: &Self) -> bool {
        self.schema == other.schema && self.batches == other.batches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Int32Array;
    use arrow::datatypes::{DataType, Field, Schema};
    use serde_json::json;

    #[test]
    fn frame_counts_rows_across_batches() {
        let schema = Arc::new(Schema::new(vec![Field::new("id", DataType::Int32, false)]));
        let a = RecordBatch::try_new(schema.clone(), vec![Arc::new(Int32Array::from(vec![1, 2]))]).unwrap();
        let b = RecordBatch::try_new(schema.clone(), vec![Arc::new(Int32Array::from(vec![3]))]).unwrap();
        let frame = TabularFrame::new(schema, vec![a, b]);
        assert_eq!(frame.num_rows(), 3);
        assert_eq!(frame.column_names(), vec!["id"]);
    }

    #[test]
    fn raw_records_preserve_order() {
        let records: Vec<RawRecord> = vec![
            json!({"sekolah": "A"}).as_object().unwrap().clone(),
            json!({"sekolah": "B"}).as_object().unwrap().clone(),
        ];
        let raw = RawRecords::new(records);
        assert_eq!(raw.len(), 2);
        assert_eq!(raw.records()[1]["sekolah"], "B");
    }
}
