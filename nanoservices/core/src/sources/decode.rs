use serde_json::Value;
use sekolah_utils::error::Error;
use sekolah_utils::{RawRecord, RawRecords, SekolahResult};

use crate::contract::COLLECTION_KEY;

/// Decode a `{ "dataSekolah": [ {..}, .. ] }` document into raw records.
///
/// Records are kept verbatim and in source order. Any deviation from the
/// expected shape is a `MalformedInput` error.
pub fn decode_records(bytes: &[u8]) -> SekolahResult<RawRecords> {
    let document: Value = serde_json::from_slice(bytes)
        .map_err(|e| Error::MalformedInput(format!("invalid JSON: {e}")))?;

    let Value::Object(mut top) = document else {
        return Err(Error::MalformedInput("top-level value is not an object".into()));
    };

    let collection = top
        .remove(COLLECTION_KEY)
        .ok_or_else(|| Error::MalformedInput(format!("missing top-level key '{COLLECTION_KEY}'")))?;

    let Value::Array(items) = collection else {
        return Err(Error::MalformedInput(format!("'{COLLECTION_KEY}' is not an array")));
    };

    let records = items
        .into_iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::Object(map) => Ok::<RawRecord, Error>(map),
            other => Err(Error::MalformedInput(format!(
                "record {i} is not an object (found {})",
                json_type(&other)
            ))),
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RawRecords::new(records))
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_records_in_order() {
        let body = br#"{"dataSekolah": [
            {"sekolah": "SMA 1", "lintang": "-6.2"},
            {"sekolah": "SMA 2", "extra": null}
        ], "total_data": 2}"#;

        let records = decode_records(body).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records.records()[0]["sekolah"], "SMA 1");
        assert_eq!(records.records()[0]["lintang"], "-6.2");
        assert!(records.records()[1]["extra"].is_null());
    }

    #[test]
    fn empty_collection_is_fine() {
        let records = decode_records(br#"{"dataSekolah": []}"#).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn missing_key_is_malformed() {
        let err = decode_records(br#"{"schools": []}"#).unwrap_err();
        assert!(matches!(err, Error::MalformedInput(ref m) if m.contains("dataSekolah")));
    }

    #[test]
    fn invalid_json_is_malformed() {
        let err = decode_records(b"{not json").unwrap_err();
        assert!(matches!(err, Error::MalformedInput(_)));
    }

    #[test]
    fn non_object_records_are_malformed() {
        let err = decode_records(br#"{"dataSekolah": [{"a": 1}, 7]}"#).unwrap_err();
        assert!(matches!(err, Error::MalformedInput(ref m) if m.contains("record 1")));

        let err = decode_records(br#"{"dataSekolah": {"a": 1}}"#).unwrap_err();
        assert!(matches!(err, Error::MalformedInput(_)));

        let err = decode_records(br#"[1, 2]"#).unwrap_err();
        assert!(matches!(err, Error::MalformedInput(_)));
    }
}
