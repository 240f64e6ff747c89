//! PostgreSQL backend: bulk `COPY` ingest, staged merge, truncate and export.

use crate::config::settings::RelationalSettings;
use crate::domain::model::{quote_ident, TableRef};
use crate::domain::ports::{IngestMode, RelationalStore};
use crate::utils::error::{Result, TransferError};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{pin_mut, SinkExt, TryStreamExt};
use tokio::sync::Mutex;
use tokio_postgres::{Client, CopyInSink, NoTls};

const STAGE_TABLE: &str = "table_transfer_stage";

/// A single connection, reused across calls. Calls are serialized by the
/// mutex; a dropped connection surfaces as `StorageError` on the next call.
pub struct PostgresStore {
    client: Mutex<Client>,
}

impl PostgresStore {
    pub async fn connect(settings: &RelationalSettings) -> Result<Self> {
        let (client, connection) = settings.to_pg_config().connect(NoTls).await?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!("PostgreSQL connection error: {e}");
            }
        });

        tracing::info!(
            host = %settings.host,
            database = %settings.database,
            "built postgresql connection"
        );
        Ok(Self::from_client(client))
    }

    pub fn from_client(client: Client) -> Self {
        Self {
            client: Mutex::new(client),
        }
    }
}

fn csv_header(csv: &[u8]) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(csv);
    let header = reader
        .headers()
        .map_err(|e| TransferError::format(format!("unreadable CSV header: {}", e)))?;
    if header.is_empty() {
        return Err(TransferError::empty_input("CSV payload has no header"));
    }
    Ok(header.iter().map(String::from).collect())
}

fn column_list(columns: &[String], alias: Option<&str>) -> String {
    columns
        .iter()
        .map(|c| match alias {
            Some(a) => format!("{}.{}", a, quote_ident(c)),
            None => quote_ident(c),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn copy_in_statement(target: &str, columns: &[String]) -> String {
    format!(
        "COPY {} ({}) FROM STDIN WITH (FORMAT csv, HEADER true)",
        target,
        column_list(columns, None)
    )
}

fn key_match(key_columns: &[String]) -> String {
    key_columns
        .iter()
        .map(|k| {
            let k = quote_ident(k);
            format!("t.{k} IS NOT DISTINCT FROM s.{k}")
        })
        .collect::<Vec<_>>()
        .join(" AND ")
}

/// `UPDATE` for rows whose keys already exist; `None` when every column is a key.
fn merge_update_statement(
    target: &TableRef,
    columns: &[String],
    key_columns: &[String],
) -> Option<String> {
    let assignments = columns
        .iter()
        .filter(|c| !key_columns.contains(c))
        .map(|c| {
            let c = quote_ident(c);
            format!("{c} = s.{c}")
        })
        .collect::<Vec<_>>();

    if assignments.is_empty() {
        return None;
    }

    Some(format!(
        "UPDATE {} AS t SET {} FROM {} AS s WHERE {}",
        target.quoted(),
        assignments.join(", "),
        quote_ident(STAGE_TABLE),
        key_match(key_columns)
    ))
}

fn merge_insert_statement(target: &TableRef, columns: &[String], key_columns: &[String]) -> String {
    format!(
        "INSERT INTO {} ({}) SELECT {} FROM {} AS s WHERE NOT EXISTS (SELECT 1 FROM {} AS t WHERE {})",
        target.quoted(),
        column_list(columns, None),
        column_list(columns, Some("s")),
        quote_ident(STAGE_TABLE),
        target.quoted(),
        key_match(key_columns)
    )
}

async fn send_csv(sink: CopyInSink<Bytes>, csv: &[u8]) -> Result<u64> {
    pin_mut!(sink);
    sink.send(Bytes::copy_from_slice(csv)).await?;
    Ok(sink.finish().await?)
}

impl PostgresStore {
    async fn append(&self, csv: &[u8], table: &TableRef, columns: &[String]) -> Result<u64> {
        let statement = copy_in_statement(&table.quoted(), columns);
        tracing::debug!(%statement, "starting copy");

        let client = self.client.lock().await;
        let sink = client.copy_in(statement.as_str()).await?;
        let rows = send_csv(sink, csv).await?;

        tracing::info!(%table, rows, "finished copy");
        Ok(rows)
    }

    async fn merge(
        &self,
        csv: &[u8],
        table: &TableRef,
        columns: &[String],
        key_columns: &[String],
    ) -> Result<u64> {
        if key_columns.is_empty() {
            return Err(TransferError::configuration(
                "upsert needs at least one key column",
            ));
        }
        if let Some(missing) = key_columns.iter().find(|k| !columns.contains(k)) {
            return Err(TransferError::configuration(format!(
                "key column {:?} is not in the record header",
                missing
            )));
        }

        let mut client = self.client.lock().await;
        let tx = client.transaction().await?;

        tx.batch_execute(&format!(
            "CREATE TEMP TABLE {} (LIKE {} INCLUDING DEFAULTS) ON COMMIT DROP",
            quote_ident(STAGE_TABLE),
            table.quoted()
        ))
        .await?;

        let sink = tx
            .copy_in(copy_in_statement(&quote_ident(STAGE_TABLE), columns).as_str())
            .await?;
        let staged = send_csv(sink, csv).await?;

        let updated = match merge_update_statement(table, columns, key_columns) {
            Some(statement) => {
                tracing::debug!(%statement, "merging existing rows");
                tx.execute(statement.as_str(), &[]).await?
            }
            None => 0,
        };

        let statement = merge_insert_statement(table, columns, key_columns);
        tracing::debug!(%statement, "inserting new rows");
        let inserted = tx.execute(statement.as_str(), &[]).await?;

        tx.commit().await?;
        tracing::info!(%table, staged, updated, inserted, "finished upsert");
        Ok(updated + inserted)
    }
}

#[async_trait]
impl RelationalStore for PostgresStore {
    async fn ingest(&self, csv: &[u8], table: &TableRef, mode: &IngestMode) -> Result<u64> {
        let columns = csv_header(csv)?;
        match mode {
            IngestMode::Append => self.append(csv, table, &columns).await,
            IngestMode::Merge { key_columns } => {
                self.merge(csv, table, &columns, key_columns).await
            }
        }
    }

    async fn truncate(&self, table: &TableRef) -> Result<()> {
        let statement = format!("TRUNCATE TABLE {}", table.quoted());
        tracing::debug!(%statement, "starting truncate");

        let client = self.client.lock().await;
        client.batch_execute(&statement).await?;

        tracing::info!(%table, "truncated table");
        Ok(())
    }

    async fn export(&self, table: &TableRef) -> Result<Vec<u8>> {
        let statement = format!(
            "COPY (SELECT * FROM {}) TO STDOUT WITH (FORMAT csv, HEADER true)",
            table.quoted()
        );
        tracing::debug!(%statement, "starting export");

        let client = self.client.lock().await;
        let stream = client.copy_out(statement.as_str()).await?;
        pin_mut!(stream);

        let mut csv = Vec::new();
        while let Some(chunk) = stream.try_next().await? {
            csv.extend_from_slice(&chunk);
        }

        tracing::info!(%table, bytes = csv.len(), "exported table");
        Ok(csv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_csv_header_reads_first_line() {
        assert_eq!(
            csv_header(b"id,\"full name\"\n1,a\n").unwrap(),
            cols(&["id", "full name"])
        );
    }

    #[test]
    fn test_copy_in_statement_quotes_columns() {
        let table = TableRef::new("public", "people");
        assert_eq!(
            copy_in_statement(&table.quoted(), &cols(&["id", "na\"me"])),
            "COPY \"public\".\"people\" (\"id\", \"na\"\"me\") FROM STDIN WITH (FORMAT csv, HEADER true)"
        );
    }

    #[test]
    fn test_merge_statements() {
        let table = TableRef::new("public", "people");
        let columns = cols(&["id", "name"]);
        let keys = cols(&["id"]);

        assert_eq!(
            merge_update_statement(&table, &columns, &keys).unwrap(),
            "UPDATE \"public\".\"people\" AS t SET \"name\" = s.\"name\" \
             FROM \"table_transfer_stage\" AS s \
             WHERE t.\"id\" IS NOT DISTINCT FROM s.\"id\""
        );
        assert_eq!(
            merge_insert_statement(&table, &columns, &keys),
            "INSERT INTO \"public\".\"people\" (\"id\", \"name\") \
             SELECT s.\"id\", s.\"name\" FROM \"table_transfer_stage\" AS s \
             WHERE NOT EXISTS (SELECT 1 FROM \"public\".\"people\" AS t \
             WHERE t.\"id\" IS NOT DISTINCT FROM s.\"id\")"
        );
    }

    #[test]
    fn test_merge_update_skipped_when_all_columns_are_keys() {
        let table = TableRef::new("public", "tags");
        let columns = cols(&["a", "b"]);
        assert!(merge_update_statement(&table, &columns, &columns).is_none());
    }
}
