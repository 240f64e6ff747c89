use crate::adapters::local::LocalStorage;
use crate::adapters::postgres::PostgresStore;
use crate::adapters::s3::{build_client, S3Storage};
use crate::config::secrets::SecretResolver;
use crate::domain::ports::Backends;
use crate::utils::error::{Result, TransferError};
use crate::utils::validation::Validate;
use async_trait::async_trait;
use aws_sdk_s3::Client as S3Client;
use tokio::sync::OnceCell;

/// Process-scoped handles, built on first use and reused afterwards.
///
/// Construct once at startup and pass it to every pipeline. Nothing is ever
/// refreshed: a broken connection keeps failing until the process restarts.
pub struct TransferContext<R: SecretResolver> {
    secrets: R,
    s3_client: OnceCell<S3Client>,
    postgres: OnceCell<PostgresStore>,
}

impl<R: SecretResolver> TransferContext<R> {
    pub fn new(secrets: R) -> Self {
        Self {
            secrets,
            s3_client: OnceCell::new(),
            postgres: OnceCell::new(),
        }
    }

    async fn s3_client(&self) -> Result<&S3Client> {
        self.s3_client
            .get_or_try_init(|| async {
                let settings = self.secrets.object_storage().await?;
                settings.validate()?;
                Ok::<_, TransferError>(build_client(&settings))
            })
            .await
    }
}

#[async_trait]
impl<R: SecretResolver> Backends for TransferContext<R> {
    type Files = LocalStorage;
    type Objects = S3Storage;
    type Relational = PostgresStore;

    fn files(&self) -> LocalStorage {
        LocalStorage::cwd()
    }

    async fn objects(&self, bucket: &str) -> Result<S3Storage> {
        let client = self.s3_client().await?;
        Ok(S3Storage::new(client.clone(), bucket.to_string()))
    }

    async fn relational(&self) -> Result<&PostgresStore> {
        self.postgres
            .get_or_try_init(|| async {
                let settings = self.secrets.relational().await?;
                PostgresStore::connect(&settings).await
            })
            .await
    }
}
