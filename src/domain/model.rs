use crate::utils::error::{Result, TransferError};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One row: field name to text value, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    pub fields: IndexMap<String, String>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordSet {
    records: Vec<Record>,
}

impl RecordSet {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    /// Field names of the first record, which every codec treats as the header.
    pub fn header(&self) -> Option<Vec<&str>> {
        self.records.first().map(|r| r.keys().collect())
    }

    /// Removes records with no fields. Idempotent.
    pub fn drop_empty(self) -> Self {
        Self {
            records: self
                .records
                .into_iter()
                .filter(|r| !r.is_empty())
                .collect(),
        }
    }

    /// Keeps the last record for every distinct combination of `key_columns`,
    /// in the position of that last occurrence.
    pub fn last_by_key(&self, key_columns: &[String]) -> Self {
        let mut latest: IndexMap<Vec<&str>, &Record> = IndexMap::new();
        for record in &self.records {
            let key: Vec<&str> = key_columns
                .iter()
                .map(|column| record.get(column).unwrap_or_default())
                .collect();
            // shift_remove keeps the map ordered by last occurrence
            latest.shift_remove(&key);
            latest.insert(key, record);
        }

        Self {
            records: latest.into_values().cloned().collect(),
        }
    }
}

impl FromIterator<Record> for RecordSet {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for RecordSet {
    type Item = Record;
    type IntoIter = std::vec::IntoIter<Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

/// Payload format. Configuration text is matched case-insensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum Format {
    /// Comma-separated text with a header row.
    #[serde(rename = "csv")]
    DelimitedText,
    /// JSON array of objects.
    #[serde(rename = "json")]
    Document,
}

impl TryFrom<String> for Format {
    type Error = TransferError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl FromStr for Format {
    type Err = TransferError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "csv" | "delimited_text" => Ok(Self::DelimitedText),
            "json" | "document" => Ok(Self::Document),
            other => Err(TransferError::configuration(format!(
                "unexpected format {:?}, csv/json to be used",
                other
            ))),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DelimitedText => f.write_str("csv"),
            Self::Document => f.write_str("json"),
        }
    }
}

/// How a record set is written into a relational table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformPolicy {
    Insert,
    Upsert { key_columns: Vec<String> },
    TruncateInsert,
}

impl TransformPolicy {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Upsert { .. } => "upsert",
            Self::TruncateInsert => "truncate_insert",
        }
    }

    /// Parses `insert`, `upsert` or `truncate_insert`; `upsert` takes the
    /// given key columns.
    pub fn parse(name: &str, key_columns: Vec<String>) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "insert" => Ok(Self::Insert),
            "upsert" => Ok(Self::Upsert { key_columns }),
            "truncate_insert" => Ok(Self::TruncateInsert),
            other => Err(TransferError::configuration(format!(
                "unexpected transform {:?}, insert/upsert/truncate_insert to be used",
                other
            ))),
        }
    }
}

/// A schema-qualified relational table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    pub schema: String,
    pub table: String,
}

impl TableRef {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
        }
    }

    /// `"schema"."table"` with embedded quotes doubled.
    pub fn quoted(&self) -> String {
        format!("{}.{}", quote_ident(&self.schema), quote_ident(&self.table))
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}
