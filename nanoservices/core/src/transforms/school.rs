use std::collections::HashSet;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, BooleanArray, Float64Array, StringArray};
use arrow::compute;
use arrow::datatypes::{Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use serde_json::Value;
use sekolah_utils::error::Error;
use sekolah_utils::{RawRecord, RawRecords, SekolahResult, TabularFrame};

use crate::contract::{
    ADDRESS_FIELD, ADDRESS_SEPARATOR, CATEGORY_FIELD, HIGH_SCHOOL_MARKER, ID_FIELD,
    LATITUDE_FIELD, LONGITUDE_FIELD, NAME_FIELD, PUBLIC_MARKER, STATUS_FIELD, STREET_FIELD,
};
use crate::transforms::traits::{RejectReason, RejectedRecord, Transform, TransformOutput};

/// Fields that must appear in at least one record of a non-empty collection.
const REQUIRED_FIELDS: [&str; 6] = [
    STATUS_FIELD,
    CATEGORY_FIELD,
    NAME_FIELD,
    STREET_FIELD,
    LATITUDE_FIELD,
    LONGITUDE_FIELD,
];

/// Keeps public high schools with usable coordinates.
///
/// Rules, applied in order:
/// 1. keep records whose `status` contains `N` and whose `bentuk` is exactly `SMA`
/// 2. derive `school_address` as `<sekolah> - <alamat_jalan>`
/// 3. parse `lintang`/`bujur` as numbers, anything unparseable becomes null
/// 4. drop rows with a null coordinate and report them as rejected
#[derive(Debug, Default, Clone, Copy)]
pub struct SchoolTransform;

impl SchoolTransform {
    pub fn new() -> Self {
        SchoolTransform
    }

    /// Synchronous core of the transform. Pure function of `records`.
    pub fn apply(&self, records: &RawRecords) -> SekolahResult<TransformOutput> {
        check_required_fields(records.records())?;

        let columns = column_order(records.records());

        let kept: Vec<(usize, &RawRecord)> = records
            .records()
            .iter()
            .enumerate()
            .filter(|(_, r)| is_public_high_school(r))
            .collect();

        let latitudes: Vec<Option<f64>> =
            kept.iter().map(|(_, r)| coerce_coordinate(r.get(LATITUDE_FIELD))).collect();
        let longitudes: Vec<Option<f64>> =
            kept.iter().map(|(_, r)| coerce_coordinate(r.get(LONGITUDE_FIELD))).collect();

        let mut fields = Vec::with_capacity(columns.len());
        let mut arrays: Vec<ArrayRef> = Vec::with_capacity(columns.len());
        for name in &columns {
            let array: ArrayRef = match name.as_str() {
                LATITUDE_FIELD => Arc::new(Float64Array::from(latitudes.clone())),
                LONGITUDE_FIELD => Arc::new(Float64Array::from(longitudes.clone())),
                ADDRESS_FIELD => Arc::new(StringArray::from(
                    kept.iter().map(|(_, r)| Some(derive_address(r))).collect::<Vec<_>>(),
                )),
                other => Arc::new(StringArray::from(
                    kept.iter().map(|(_, r)| r.get(other).and_then(render_text)).collect::<Vec<_>>(),
                )),
            };
            fields.push(Field::new(name, array.data_type().clone(), true));
            arrays.push(array);
        }
        let staged = RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?;

        // Quality drop: same masking approach as a null-dropping filter, but
        // restricted to the coordinate columns.
        let mut mask = Vec::with_capacity(kept.len());
        let mut rejected = Vec::new();
        for (i, (position, record)) in kept.iter().enumerate() {
            let reason = match (latitudes[i].is_some(), longitudes[i].is_some()) {
                (true, true) => None,
                (false, true) => Some(RejectReason::MissingLatitude),
                (true, false) => Some(RejectReason::MissingLongitude),
                (false, false) => Some(RejectReason::MissingCoordinates),
            };
            mask.push(reason.is_none());
            if let Some(reason) = reason {
                rejected.push(RejectedRecord {
                    position: *position,
                    npsn: record.get(ID_FIELD).and_then(render_text),
                    reason,
                });
            }
        }
        let filtered = compute::filter_record_batch(&staged, &BooleanArray::from(mask))?;

        // Coordinates and the derived address are guaranteed present from here on.
        let final_fields: Vec<Field> = filtered
            .schema()
            .fields()
            .iter()
            .map(|f| {
                let required = matches!(f.name().as_str(), LATITUDE_FIELD | LONGITUDE_FIELD | ADDRESS_FIELD);
                Field::new(f.name(), f.data_type().clone(), !required)
            })
            .collect();
        let batch = RecordBatch::try_new(Arc::new(Schema::new(final_fields)), filtered.columns().to_vec())?;

        if !rejected.is_empty() {
            tracing::warn!(
                rejected = rejected.len(),
                kept = batch.num_rows(),
                "dropped records with missing or unparseable coordinates"
            );
        }
        tracing::debug!(
            input = records.len(),
            matched = kept.len(),
            output = batch.num_rows(),
            "transform finished"
        );

        Ok(TransformOutput { frame: TabularFrame::from_batch(batch), rejected })
    }
}

#[async_trait]
impl Transform for SchoolTransform {
    fn name(&self) -> &str { "public_high_schools" }

    async fn transform(&self, records: &RawRecords) -> SekolahResult<TransformOutput> {
        self.apply(records)
    }
}

fn check_required_fields(records: &[RawRecord]) -> SekolahResult<()> {
    if records.is_empty() {
        return Ok(());
    }
    let missing: Vec<&str> = REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|field| !records.iter().any(|r| r.contains_key(*field)))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::SchemaError(format!(
            "fields absent from every record: {}",
            missing.join(", ")
        )))
    }
}

/// Union of all field names in first-seen order, with the derived address
/// appended unless the source already carries a field of that name.
fn column_order(records: &[RawRecord]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut columns = Vec::new();
    if records.is_empty() {
        columns.extend(REQUIRED_FIELDS.iter().map(|f| f.to_string()));
    }
    for record in records {
        for key in record.keys() {
            if seen.insert(key.as_str()) {
                columns.push(key.clone());
            }
        }
    }
    if !columns.iter().any(|c| c == ADDRESS_FIELD) {
        columns.push(ADDRESS_FIELD.to_string());
    }
    columns
}

fn is_public_high_school(record: &RawRecord) -> bool {
    let public = record
        .get(STATUS_FIELD)
        .and_then(Value::as_str)
        .is_some_and(|s| s.contains(PUBLIC_MARKER));
    let high_school = record.get(CATEGORY_FIELD).and_then(Value::as_str) == Some(HIGH_SCHOOL_MARKER);
    public && high_school
}

fn derive_address(record: &RawRecord) -> String {
    let name = record.get(NAME_FIELD).and_then(render_text).unwrap_or_default();
    let street = record.get(STREET_FIELD).and_then(render_text).unwrap_or_default();
    format!("{name}{ADDRESS_SEPARATOR}{street}")
}

/// Lenient numeric parse. Never fails, unusable input becomes `None`.
fn coerce_coordinate(value: Option<&Value>) -> Option<f64> {
    let parsed = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

fn render_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
