use crate::config::descriptor::{LocationOverride, ResolvedLocation, Side, TransferDescriptor};
use crate::core::codec;
use crate::domain::model::{Format, RecordSet, TableRef, TransformPolicy};
use crate::domain::ports::{Backends, IngestMode, RelationalStore, Storage};
use crate::utils::error::{Result, TransferError};

/// Drives one source-to-target move and owns the record set in between.
///
/// A failed load leaves the previously loaded set untouched. Saves keep the
/// set, so a single load can feed several targets.
pub struct TransferPipeline<'a, B: Backends> {
    backends: &'a B,
    descriptor: TransferDescriptor,
    records: Option<RecordSet>,
}

impl<'a, B: Backends> TransferPipeline<'a, B> {
    pub fn new(backends: &'a B, descriptor: TransferDescriptor) -> Self {
        Self {
            backends,
            descriptor,
            records: None,
        }
    }

    pub fn descriptor(&self) -> &TransferDescriptor {
        &self.descriptor
    }

    pub fn records(&self) -> Option<&RecordSet> {
        self.records.as_ref()
    }

    async fn fetch(&self, location: &ResolvedLocation) -> Result<Vec<u8>> {
        match location {
            ResolvedLocation::File { path } => self.backends.files().fetch(path).await,
            ResolvedLocation::Object { bucket, key } => {
                self.backends.objects(bucket).await?.fetch(key).await
            }
        }
    }

    async fn store(&self, location: &ResolvedLocation, data: &[u8]) -> Result<()> {
        match location {
            ResolvedLocation::File { path } => self.backends.files().store(path, data).await,
            ResolvedLocation::Object { bucket, key } => {
                self.backends.objects(bucket).await?.store(key, data).await
            }
        }
    }

    fn replace_records(&mut self, records: RecordSet) -> &RecordSet {
        self.records.insert(records)
    }

    /// Drops empty records from the current set, keeps the normalized set as
    /// current, and fails when nothing is left.
    fn normalized_records(&mut self) -> Result<&RecordSet> {
        let records = self
            .records
            .take()
            .ok_or_else(|| TransferError::empty_input("get entries at first, nothing loaded"))?;

        let records = self.records.insert(records.drop_empty());
        if records.is_empty() {
            return Err(TransferError::empty_input(
                "every loaded record is empty, nothing to save",
            ));
        }
        Ok(records)
    }

    pub async fn load_from(
        &mut self,
        overrides: &LocationOverride,
        format: Format,
    ) -> Result<&RecordSet> {
        let location = self.descriptor.source.resolve_blob(Side::Source, overrides)?;
        tracing::debug!(%location, %format, "loading entries");

        let payload = self.fetch(&location).await?;
        let records = codec::decode(&payload, format)?;

        tracing::info!(%location, %format, records = records.len(), "got entries");
        Ok(self.replace_records(records))
    }

    /// Reads every row of the source table. Row order is whatever the
    /// database returns.
    pub async fn load_from_relational(&mut self, table: Option<&TableRef>) -> Result<&RecordSet> {
        let table = self.descriptor.source.resolve_table(Side::Source, table)?;
        tracing::debug!(%table, "loading entries from table");

        let csv = self.backends.relational().await?.export(&table).await?;
        let records = codec::decode(&csv, Format::DelimitedText)?;

        tracing::info!(%table, records = records.len(), "got entries from table");
        Ok(self.replace_records(records))
    }

    pub async fn save_to(
        &mut self,
        overrides: &LocationOverride,
        format: Format,
    ) -> Result<ResolvedLocation> {
        let location = self.descriptor.target.resolve_blob(Side::Target, overrides)?;
        let records = self.normalized_records()?;
        let count = records.len();
        let payload = codec::encode(records, format)?;

        self.store(&location, &payload).await?;
        tracing::info!(%location, %format, records = count, "saved entries");
        Ok(location)
    }

    /// Writes the current set into the target table. The payload is always
    /// CSV, whatever format the set was loaded from.
    ///
    /// `TruncateInsert` runs truncate and insert as separate statements: if
    /// the insert fails the table is left empty.
    pub async fn save_to_relational(&mut self, policy: &TransformPolicy) -> Result<u64> {
        let table = self.descriptor.target.resolve_table(Side::Target, None)?;
        let records = self.normalized_records()?;

        let (payload, mode) = match policy {
            TransformPolicy::Upsert { key_columns } => {
                let header = records.header().unwrap_or_default();
                if key_columns.is_empty() {
                    return Err(TransferError::configuration(
                        "upsert needs at least one key column",
                    ));
                }
                if let Some(missing) = key_columns.iter().find(|k| !header.contains(&k.as_str())) {
                    return Err(TransferError::configuration(format!(
                        "key column {:?} is not in the record header",
                        missing
                    )));
                }
                let staged = records.last_by_key(key_columns);
                (
                    codec::encode(&staged, Format::DelimitedText)?,
                    IngestMode::Merge {
                        key_columns: key_columns.clone(),
                    },
                )
            }
            TransformPolicy::Insert | TransformPolicy::TruncateInsert => (
                codec::encode(records, Format::DelimitedText)?,
                IngestMode::Append,
            ),
        };

        let store = self.backends.relational().await?;
        if *policy == TransformPolicy::TruncateInsert {
            store.truncate(&table).await?;
        }
        let rows = store.ingest(&payload, &table, &mode).await?;

        tracing::info!(%table, transform = policy.name(), rows, "uploaded entries to table");
        Ok(rows)
    }
}
