use async_trait::async_trait;
use sekolah_utils::{RawRecords, SekolahResult, TabularFrame};

/// Why a record that passed the business filter was still dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    MissingLatitude,
    MissingLongitude,
    MissingCoordinates,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::MissingLatitude => "missing_latitude",
            RejectReason::MissingLongitude => "missing_longitude",
            RejectReason::MissingCoordinates => "missing_coordinates",
        }
    }
}

/// A record removed by the quality check, identified by its position in the
/// source collection and its school id when it has one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRecord {
    pub position: usize,
    pub npsn: Option<String>,
    pub reason: RejectReason,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransformOutput {
    pub frame: TabularFrame,
    pub rejected: Vec<RejectedRecord>,
}

/// Turns the raw collection into a cleaned frame.
#[async_trait]
pub trait Transform: Send + Sync {
    fn name(&self) -> &str;

    async fn transform(&self, records: &RawRecords) -> SekolahResult<TransformOutput>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Int32Array;
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::RecordBatch;
    use std::sync::Arc;

    struct CountTransform;

    #[async_trait]
    impl Transform for CountTransform {
        fn name(&self) -> &str { "count" }
        async fn transform(&self, records: &RawRecords) -> SekolahResult<TransformOutput> {
            let schema = Arc::new(Schema::new(vec![
                Field::new("n", DataType::Int32, false),
            ]));
            let batch = RecordBatch::try_new(
                schema,
                vec![Arc::new(Int32Array::from(vec![records.len() as i32]))],
            )?;
            Ok(TransformOutput { frame: TabularFrame::from_batch(batch), rejected: Vec::new() })
        }
    }

    #[tokio::test]
    async fn transform_trait_works() {
        let t = CountTransform;
        assert_eq!(t.name(), "count");
        let out = t.transform(&RawRecords::default()).await.unwrap();
        assert_eq!(out.frame.num_rows(), 1);
        assert!(out.rejected.is_empty());
    }

    #[test]
    fn reject_reason_labels() {
        assert_eq!(RejectReason::MissingCoordinates.as_str(), "missing_coordinates");
    }
}
