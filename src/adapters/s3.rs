use crate::config::settings::ObjectStorageSettings;
use crate::domain::ports::Storage;
use crate::utils::error::{Result, TransferError};
use aws_config::{BehaviorVersion, SdkConfig};
use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::config::timeout::TimeoutConfig;
use aws_sdk_s3::config::{Credentials, Region, SharedCredentialsProvider};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::Client as S3Client;
use std::time::Duration;

/// One retry at most, so two attempts in total.
///
/// The standard strategy still honours a server `x-amz-retry-after` hint,
/// but never waits longer than [`MAX_BACKOFF`].
pub const MAX_ATTEMPTS: u32 = 2;
pub const MAX_BACKOFF: Duration = Duration::from_secs(5);
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

fn shared_config(settings: &ObjectStorageSettings) -> SdkConfig {
    let credentials = Credentials::new(
        settings.access_key_id.clone(),
        settings.secret_access_key.clone(),
        None,
        None,
        "table-transfer",
    );

    SdkConfig::builder()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new(settings.region.clone()))
        .credentials_provider(SharedCredentialsProvider::new(credentials))
        .retry_config(
            RetryConfig::standard()
                .with_max_attempts(MAX_ATTEMPTS)
                .with_max_backoff(MAX_BACKOFF),
        )
        .timeout_config(
            TimeoutConfig::builder()
                .connect_timeout(CONNECT_TIMEOUT)
                .build(),
        )
        .build()
}

/// Builds a client for an S3-compatible endpoint with the bounded retry policy.
///
/// Region and credentials come only from `settings`; no provider chain runs.
pub fn build_client(settings: &ObjectStorageSettings) -> S3Client {
    let mut builder =
        aws_sdk_s3::config::Builder::from(&shared_config(settings)).force_path_style(true);

    if let Some(endpoint) = &settings.endpoint_url {
        builder = builder.endpoint_url(endpoint);
    }

    tracing::info!(region = %settings.region, endpoint = ?settings.endpoint_url, "built S3 client");
    S3Client::from_conf(builder.build())
}

/// Whole-object get/put against one bucket. Object key = file name.
#[derive(Debug, Clone)]
pub struct S3Storage {
    client: S3Client,
    bucket: String,
}

impl S3Storage {
    pub fn new(client: S3Client, bucket: String) -> Self {
        Self { client, bucket }
    }
}

impl Storage for S3Storage {
    async fn fetch(&self, key: &str) -> Result<Vec<u8>> {
        tracing::debug!(bucket = %self.bucket, key, "starting download from S3");
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                TransferError::storage(format!(
                    "failed to read s3://{}/{}: {}",
                    self.bucket,
                    key,
                    DisplayErrorContext(&e)
                ))
            })?;

        let data = resp.body.collect().await.map_err(|e| {
            TransferError::storage(format!(
                "failed to collect s3://{}/{}: {}",
                self.bucket, key, e
            ))
        })?;

        let data = data.into_bytes().to_vec();
        tracing::info!(bucket = %self.bucket, key, bytes = data.len(), "downloaded object");
        Ok(data)
    }

    async fn store(&self, key: &str, data: &[u8]) -> Result<()> {
        tracing::debug!(bucket = %self.bucket, key, "starting upload to S3");
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(data.to_vec().into())
            .send()
            .await
            .map_err(|e| {
                TransferError::storage(format!(
                    "failed to write s3://{}/{}: {}",
                    self.bucket,
                    key,
                    DisplayErrorContext(&e)
                ))
            })?;

        tracing::info!(bucket = %self.bucket, key, bytes = data.len(), "uploaded object");
        Ok(())
    }
}
