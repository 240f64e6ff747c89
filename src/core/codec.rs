//! Conversion between [`RecordSet`] and serialized payloads.
//!
//! CSV output needs a header, so an empty set cannot be encoded as CSV; JSON
//! output of an empty set is simply `[]`.

use crate::domain::model::{Format, Record, RecordSet};
use crate::utils::error::{Result, TransferError};
use serde_json::Value;

pub fn decode(payload: &[u8], format: Format) -> Result<RecordSet> {
    match format {
        Format::DelimitedText => decode_csv(payload),
        Format::Document => decode_json(payload),
    }
}

pub fn encode(records: &RecordSet, format: Format) -> Result<Vec<u8>> {
    match format {
        Format::DelimitedText => encode_csv(records),
        Format::Document => encode_json(records),
    }
}

fn csv_error(err: csv::Error) -> TransferError {
    match err.kind() {
        csv::ErrorKind::UnequalLengths {
            pos,
            expected_len,
            len,
        } => {
            let line = pos
                .as_ref()
                .map(|p| p.line().to_string())
                .unwrap_or_else(|| "?".to_string());
            TransferError::format(format!(
                "line {}: expected {} fields as in the header, found {}",
                line, expected_len, len
            ))
        }
        csv::ErrorKind::Utf8 { .. } => {
            TransferError::format(format!("payload is not valid UTF-8: {}", err))
        }
        _ => TransferError::format(format!("malformed CSV: {}", err)),
    }
}

fn decode_csv(payload: &[u8]) -> Result<RecordSet> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(payload);

    let header = reader.headers().map_err(csv_error)?.clone();
    for (i, name) in header.iter().enumerate() {
        if header.iter().take(i).any(|earlier| earlier == name) {
            return Err(TransferError::format(format!(
                "duplicate column {:?} in header",
                name
            )));
        }
    }

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(csv_error)?;
        records.push(header.iter().zip(row.iter()).collect::<Record>());
    }

    Ok(RecordSet::new(records))
}

fn encode_csv(records: &RecordSet) -> Result<Vec<u8>> {
    let header = records
        .header()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| TransferError::empty_input("no records to derive a CSV header from"))?;

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&header).map_err(csv_error)?;

    for (index, record) in records.iter().enumerate() {
        if let Some(extra) = record.keys().find(|k| !header.contains(k)) {
            return Err(TransferError::format(format!(
                "record {} has field {:?} which is not in the header",
                index, extra
            )));
        }
        let row = header.iter().map(|field| record.get(field).unwrap_or_default());
        writer.write_record(row).map_err(csv_error)?;
    }

    writer
        .into_inner()
        .map_err(|e| TransferError::format(format!("failed to flush CSV output: {}", e)))
}

fn value_to_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn decode_json(payload: &[u8]) -> Result<RecordSet> {
    let value: Value = serde_json::from_slice(payload)
        .map_err(|e| TransferError::format(format!("invalid JSON: {}", e)))?;

    let Value::Array(items) = value else {
        return Err(TransferError::format(
            "expected a JSON array of objects at the top level",
        ));
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Object(obj) => Ok(obj
                .into_iter()
                .map(|(k, v)| (k, value_to_text(v)))
                .collect::<Record>()),
            other => Err(TransferError::format(format!(
                "element {} is not an object: {}",
                index, other
            ))),
        })
        .collect::<Result<Vec<_>>>()
        .map(RecordSet::new)
}

fn encode_json(records: &RecordSet) -> Result<Vec<u8>> {
    serde_json::to_vec_pretty(records)
        .map_err(|e| TransferError::format(format!("failed to serialize JSON: {}", e)))
}
