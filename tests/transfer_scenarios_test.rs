use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use table_transfer::config::job::{LoadStep, SaveStep};
use table_transfer::core::codec;
use table_transfer::core::{Backends, IngestMode, RelationalStore, Storage};
use table_transfer::{
    ErrorKind, Format, LocationOverride, LocationSpec, Record, RecordSet, Result, TableRef,
    TransferDescriptor, TransferEngine, TransferError, TransferJob, TransferPipeline,
    TransformPolicy,
};
use tokio::sync::Mutex;

#[derive(Clone, Default)]
struct MemoryObjects {
    objects: Arc<Mutex<HashMap<(String, String), Vec<u8>>>>,
}

struct BucketHandle {
    bucket: String,
    objects: Arc<Mutex<HashMap<(String, String), Vec<u8>>>>,
}

impl Storage for BucketHandle {
    async fn fetch(&self, key: &str) -> Result<Vec<u8>> {
        self.objects
            .lock()
            .await
            .get(&(self.bucket.clone(), key.to_string()))
            .cloned()
            .ok_or_else(|| TransferError::storage(format!("NoSuchKey: {}/{}", self.bucket, key)))
    }

    async fn store(&self, key: &str, data: &[u8]) -> Result<()> {
        self.objects
            .lock()
            .await
            .insert((self.bucket.clone(), key.to_string()), data.to_vec());
        Ok(())
    }
}

#[derive(Clone, Default)]
struct MemoryFiles {
    files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl Storage for MemoryFiles {
    async fn fetch(&self, key: &str) -> Result<Vec<u8>> {
        self.files
            .lock()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| TransferError::storage(format!("File not found: {}", key)))
    }

    async fn store(&self, key: &str, data: &[u8]) -> Result<()> {
        self.files.lock().await.insert(key.to_string(), data.to_vec());
        Ok(())
    }
}

/// Tables as plain row lists. Ingest parses the CSV payload the pipeline
/// produces and applies append or merge semantics.
#[derive(Default)]
struct MemoryTables {
    tables: Mutex<HashMap<TableRef, Vec<Record>>>,
    fail_next_ingest: Mutex<bool>,
}

impl MemoryTables {
    async fn seed(&self, table: &TableRef, rows: Vec<Record>) {
        self.tables.lock().await.insert(table.clone(), rows);
    }

    async fn rows(&self, table: &TableRef) -> Vec<Record> {
        self.tables
            .lock()
            .await
            .get(table)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl RelationalStore for MemoryTables {
    async fn ingest(&self, csv: &[u8], table: &TableRef, mode: &IngestMode) -> Result<u64> {
        if std::mem::take(&mut *self.fail_next_ingest.lock().await) {
            return Err(TransferError::storage("connection reset by peer"));
        }

        let incoming = codec::decode(csv, Format::DelimitedText)?;
        let mut tables = self.tables.lock().await;
        let rows = tables.entry(table.clone()).or_default();
        let count = incoming.len() as u64;

        match mode {
            IngestMode::Append => rows.extend(incoming),
            IngestMode::Merge { key_columns } => {
                for record in incoming {
                    let matches = |row: &Record| {
                        key_columns
                            .iter()
                            .all(|k| row.get(k) == record.get(k))
                    };
                    match rows.iter_mut().find(|row| matches(row)) {
                        Some(existing) => *existing = record,
                        None => rows.push(record),
                    }
                }
            }
        }
        Ok(count)
    }

    async fn truncate(&self, table: &TableRef) -> Result<()> {
        self.tables.lock().await.insert(table.clone(), Vec::new());
        Ok(())
    }

    async fn export(&self, table: &TableRef) -> Result<Vec<u8>> {
        let rows = self.rows(table).await;
        codec::encode(&RecordSet::new(rows), Format::DelimitedText)
    }
}

#[derive(Default)]
struct MemoryBackends {
    files: MemoryFiles,
    objects: MemoryObjects,
    tables: MemoryTables,
}

#[async_trait]
impl Backends for MemoryBackends {
    type Files = MemoryFiles;
    type Objects = BucketHandle;
    type Relational = MemoryTables;

    fn files(&self) -> MemoryFiles {
        self.files.clone()
    }

    async fn objects(&self, bucket: &str) -> Result<BucketHandle> {
        Ok(BucketHandle {
            bucket: bucket.to_string(),
            objects: self.objects.objects.clone(),
        })
    }

    async fn relational(&self) -> Result<&MemoryTables> {
        Ok(&self.tables)
    }
}

fn row(id: &str, name: &str) -> Record {
    [("id", id), ("name", name)].into_iter().collect()
}

fn people() -> TableRef {
    TableRef::new("public", "people")
}

fn to_people_table(source: LocationSpec) -> TransferDescriptor {
    TransferDescriptor::new(
        source,
        LocationSpec {
            schema: Some("public".into()),
            table: Some("people".into()),
            ..Default::default()
        },
    )
}

fn local_csv(file_name: &str) -> LocationSpec {
    LocationSpec {
        file_name: Some(file_name.into()),
        ..Default::default()
    }
}

/// Table {a, b}, incoming {b', c}.
async fn run_transform(policy: TransformPolicy) -> Vec<Record> {
    let backends = MemoryBackends::default();
    backends
        .tables
        .seed(&people(), vec![row("1", "a"), row("2", "b")])
        .await;
    backends
        .files
        .store("incoming.csv", b"id,name\n2,b-updated\n3,c\n")
        .await
        .unwrap();

    let mut pipeline = TransferPipeline::new(&backends, to_people_table(local_csv("incoming.csv")));
    pipeline
        .load_from(&LocationOverride::none(), Format::DelimitedText)
        .await
        .unwrap();
    pipeline.save_to_relational(&policy).await.unwrap();

    backends.tables.rows(&people()).await
}

#[tokio::test]
async fn test_truncate_insert_replaces_table() {
    let rows = run_transform(TransformPolicy::TruncateInsert).await;
    assert_eq!(rows, vec![row("2", "b-updated"), row("3", "c")]);
}

#[tokio::test]
async fn test_insert_appends_duplicates() {
    let rows = run_transform(TransformPolicy::Insert).await;
    assert_eq!(
        rows,
        vec![row("1", "a"), row("2", "b"), row("2", "b-updated"), row("3", "c")]
    );
}

#[tokio::test]
async fn test_upsert_updates_matching_and_inserts_new() {
    let rows = run_transform(TransformPolicy::Upsert {
        key_columns: vec!["id".to_string()],
    })
    .await;
    assert_eq!(rows, vec![row("1", "a"), row("2", "b-updated"), row("3", "c")]);
}

#[tokio::test]
async fn test_local_csv_to_object_json() {
    let backends = MemoryBackends::default();
    backends
        .files
        .store(
            "people.csv",
            b"id,name,email\n1,Ann,ann@example.com\n2,Ben,ben@example.com\n3,Cat,cat@example.com\n",
        )
        .await
        .unwrap();

    let descriptor = TransferDescriptor::new(
        local_csv("people.csv"),
        LocationSpec {
            bucket: Some("exports".into()),
            file_name: Some("people.json".into()),
            ..Default::default()
        },
    );
    let mut pipeline = TransferPipeline::new(&backends, descriptor);
    pipeline
        .load_from(&LocationOverride::none(), Format::DelimitedText)
        .await
        .unwrap();
    let location = pipeline
        .save_to(&LocationOverride::none(), Format::Document)
        .await
        .unwrap();
    assert_eq!(location.to_string(), "s3://exports/people.json");

    let bucket = backends.objects("exports").await.unwrap();
    let payload = bucket.fetch("people.json").await.unwrap();
    let parsed: Vec<serde_json::Map<String, serde_json::Value>> =
        serde_json::from_slice(&payload).unwrap();

    assert_eq!(parsed.len(), 3);
    for object in &parsed {
        assert_eq!(
            object.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["id", "name", "email"]
        );
    }
}

#[tokio::test]
async fn test_object_to_table_truncate_insert() {
    let backends = MemoryBackends::default();
    let unrelated = (100..110)
        .map(|i| row(&i.to_string(), "unrelated"))
        .collect::<Vec<_>>();
    backends.tables.seed(&people(), unrelated).await;

    let incoming = RecordSet::new(vec![row("1", "x"), row("2", "y"), row("3", "z"), row("4", "w")]);
    backends
        .objects("raw")
        .await
        .unwrap()
        .store(
            "people.json",
            &codec::encode(&incoming, Format::Document).unwrap(),
        )
        .await
        .unwrap();

    let source = LocationSpec {
        bucket: Some("raw".into()),
        file_name: Some("people.json".into()),
        ..Default::default()
    };
    let mut pipeline = TransferPipeline::new(&backends, to_people_table(source));
    let loaded = pipeline
        .load_from(&LocationOverride::none(), Format::Document)
        .await
        .unwrap()
        .len();
    pipeline
        .save_to_relational(&TransformPolicy::TruncateInsert)
        .await
        .unwrap();

    assert_eq!(backends.tables.rows(&people()).await.len(), loaded);
}

#[tokio::test]
async fn test_failure_after_truncate_leaves_table_empty() {
    let backends = MemoryBackends::default();
    backends
        .tables
        .seed(&people(), vec![row("1", "a"), row("2", "b")])
        .await;
    backends
        .files
        .store("in.csv", b"id,name\n3,c\n")
        .await
        .unwrap();
    *backends.tables.fail_next_ingest.lock().await = true;

    let mut pipeline = TransferPipeline::new(&backends, to_people_table(local_csv("in.csv")));
    pipeline
        .load_from(&LocationOverride::none(), Format::DelimitedText)
        .await
        .unwrap();
    let err = pipeline
        .save_to_relational(&TransformPolicy::TruncateInsert)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Storage);
    assert!(backends.tables.rows(&people()).await.is_empty());
}

#[tokio::test]
async fn test_short_csv_line_leaves_pipeline_unset() {
    let backends = MemoryBackends::default();
    backends
        .files
        .store("broken.csv", b"id,name,city\n1,Ann\n")
        .await
        .unwrap();

    let mut pipeline = TransferPipeline::new(&backends, to_people_table(local_csv("broken.csv")));
    let err = pipeline
        .load_from(&LocationOverride::none(), Format::DelimitedText)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Format);
    assert!(pipeline.records().is_none());
}

#[tokio::test]
async fn test_missing_object_is_storage_error() {
    let backends = MemoryBackends::default();
    let mut pipeline = TransferPipeline::new(&backends, TransferDescriptor::default());

    let err = pipeline
        .load_from(&LocationOverride::object("raw", "absent.csv"), Format::DelimitedText)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Storage);
}

#[tokio::test]
async fn test_relational_target_without_table_is_configuration_error() {
    let backends = MemoryBackends::default();
    backends
        .files
        .store("in.csv", b"id,name\n1,a\n")
        .await
        .unwrap();

    let mut pipeline = TransferPipeline::new(
        &backends,
        TransferDescriptor::new(local_csv("in.csv"), LocationSpec::default()),
    );
    pipeline
        .load_from(&LocationOverride::none(), Format::DelimitedText)
        .await
        .unwrap();

    let err = pipeline
        .save_to_relational(&TransformPolicy::Insert)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[tokio::test]
async fn test_engine_copies_table_to_table() {
    let backends = MemoryBackends::default();
    backends
        .tables
        .seed(&TableRef::new("staging", "people"), vec![row("1", "a"), row("2", "b")])
        .await;

    let job = TransferJob {
        name: "staging-to-public".to_string(),
        descriptor: TransferDescriptor::new(
            LocationSpec {
                schema: Some("staging".into()),
                table: Some("people".into()),
                ..Default::default()
            },
            LocationSpec {
                schema: Some("public".into()),
                table: Some("people".into()),
                ..Default::default()
            },
        ),
        load: LoadStep::Relational,
        save: SaveStep::Relational {
            policy: TransformPolicy::Insert,
        },
    };

    let report = TransferEngine::new(&backends).run(&job).await.unwrap();

    assert_eq!(report.records_loaded, 2);
    assert_eq!(report.rows_written, Some(2));
    assert_eq!(report.destination, "public.people (insert)");
    assert_eq!(backends.tables.rows(&people()).await.len(), 2);
}
