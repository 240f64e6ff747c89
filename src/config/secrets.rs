//! Credential resolution for the storage backends.
//!
//! Local runs read everything from environment variables. Cloud runs read the
//! secret fields from a remote vault and only non-secret options from the
//! environment. Either way the result is a typed settings struct.

use crate::config::settings::{
    parse_port, ObjectStorageSettings, RelationalSettings, SessionAttrs, SslPreference,
};
use crate::utils::error::{Result, TransferError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

pub const CLOUD_EXECUTION_FLAG: &str = "CLOUD_EXECUTION_TRUE";
pub const DEFAULT_REGION: &str = "us-east-1";

/// Environment lookup, swappable in tests. Empty values count as unset.
#[derive(Clone)]
pub struct Env {
    lookup: Arc<dyn Fn(&str) -> Option<String> + Send + Sync>,
}

impl Env {
    pub fn process() -> Self {
        Self {
            lookup: Arc::new(|name| std::env::var(name).ok()),
        }
    }

    pub fn from_pairs<K: Into<String>, V: Into<String>>(
        pairs: impl IntoIterator<Item = (K, V)>,
    ) -> Self {
        let vars: HashMap<String, String> = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            lookup: Arc::new(move |name| vars.get(name).cloned()),
        }
    }

    pub fn get(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Local,
    Cloud,
}

impl ExecutionMode {
    pub fn detect(env: &Env) -> Self {
        if env.get(CLOUD_EXECUTION_FLAG).is_some() {
            tracing::info!("cloud execution");
            Self::Cloud
        } else {
            tracing::info!("local execution");
            Self::Local
        }
    }
}

#[async_trait]
pub trait SecretResolver: Send + Sync {
    async fn object_storage(&self) -> Result<ObjectStorageSettings>;

    async fn relational(&self) -> Result<RelationalSettings>;
}

/// Collects required fields and reports every missing one at once.
#[derive(Default)]
struct RequiredFields {
    missing: Vec<String>,
}

impl RequiredFields {
    fn take(&mut self, name: &str, value: Option<String>) -> String {
        value.unwrap_or_else(|| {
            self.missing.push(name.to_string());
            String::new()
        })
    }

    fn finish(self) -> Result<()> {
        if self.missing.is_empty() {
            Ok(())
        } else {
            Err(TransferError::SecretsRequiredError {
                missing: self.missing,
            })
        }
    }
}

fn object_storage_options(env: &Env) -> (Option<String>, String) {
    (
        env.get("S3_ENDPOINT_URL"),
        env.get("S3_REGION_NAME")
            .unwrap_or_else(|| DEFAULT_REGION.to_string()),
    )
}

fn relational_options(env: &Env) -> Result<(SslPreference, SessionAttrs)> {
    let ssl_mode = env
        .get("POSTGRESQL_SSLMODE")
        .map(|v| SslPreference::parse(&v))
        .transpose()?
        .unwrap_or(SslPreference::Prefer);
    let target_session_attrs = env
        .get("POSTGRESQL_TARGET_SESSION_ATTRS")
        .map(|v| SessionAttrs::parse(&v))
        .transpose()?
        .unwrap_or(SessionAttrs::Any);
    Ok((ssl_mode, target_session_attrs))
}

/// Development strategy: credentials straight from the environment.
#[derive(Clone)]
pub struct EnvSecretResolver {
    env: Env,
}

impl EnvSecretResolver {
    pub fn new(env: Env) -> Self {
        Self { env }
    }
}

#[async_trait]
impl SecretResolver for EnvSecretResolver {
    async fn object_storage(&self) -> Result<ObjectStorageSettings> {
        let mut fields = RequiredFields::default();
        let access_key_id = fields.take("AWS_ACCESS_KEY_ID", self.env.get("AWS_ACCESS_KEY_ID"));
        let secret_access_key = fields.take(
            "AWS_SECRET_ACCESS_KEY",
            self.env.get("AWS_SECRET_ACCESS_KEY"),
        );
        fields.finish()?;

        let (endpoint_url, region) = object_storage_options(&self.env);
        Ok(ObjectStorageSettings {
            access_key_id,
            secret_access_key,
            endpoint_url,
            region,
        })
    }

    async fn relational(&self) -> Result<RelationalSettings> {
        let mut fields = RequiredFields::default();
        let host = fields.take("POSTGRESQL_HOST", self.env.get("POSTGRESQL_HOST"));
        let port = fields.take("POSTGRESQL_PORT", self.env.get("POSTGRESQL_PORT"));
        let database = fields.take("POSTGRESQL_DATABASE", self.env.get("POSTGRESQL_DATABASE"));
        let user = fields.take("POSTGRESQL_USER", self.env.get("POSTGRESQL_USER"));
        let password = fields.take("POSTGRESQL_PASSWORD", self.env.get("POSTGRESQL_PASSWORD"));
        fields.finish()?;

        let (ssl_mode, target_session_attrs) = relational_options(&self.env)?;
        Ok(RelationalSettings {
            host,
            port: parse_port(&port)?,
            database,
            user,
            password,
            ssl_mode,
            target_session_attrs,
        })
    }
}

/// Remote secret store holding key/value entries per secret id.
#[async_trait]
pub trait VaultClient: Send + Sync {
    async fn payload(&self, secret_id: &str) -> Result<Vec<(String, String)>>;
}

/// Production strategy: secret fields from the vault, matched on lowercased
/// entry keys.
pub struct VaultSecretResolver<V: VaultClient> {
    vault: V,
    env: Env,
}

impl<V: VaultClient> VaultSecretResolver<V> {
    pub fn new(vault: V, env: Env) -> Self {
        Self { vault, env }
    }

    async fn entries(&self, secret_id_var: &str) -> Result<HashMap<String, String>> {
        let secret_id = self.env.get(secret_id_var).ok_or_else(|| {
            TransferError::configuration(format!("{} is required in cloud mode", secret_id_var))
        })?;

        let entries = self.vault.payload(&secret_id).await?;
        tracing::info!(secret_id = %secret_id, entries = entries.len(), "read vault payload");

        Ok(entries
            .into_iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| (k.to_lowercase(), v))
            .collect())
    }
}

#[async_trait]
impl<V: VaultClient> SecretResolver for VaultSecretResolver<V> {
    async fn object_storage(&self) -> Result<ObjectStorageSettings> {
        let mut entries = self.entries("LOCKBOX_AWS_SECRET_ID").await?;

        let mut fields = RequiredFields::default();
        let access_key_id = fields.take("aws_access_key_id", entries.remove("aws_access_key_id"));
        let secret_access_key = fields.take(
            "aws_secret_access_key",
            entries.remove("aws_secret_access_key"),
        );
        fields.finish()?;

        let (endpoint_url, region) = object_storage_options(&self.env);
        Ok(ObjectStorageSettings {
            access_key_id,
            secret_access_key,
            endpoint_url,
            region,
        })
    }

    async fn relational(&self) -> Result<RelationalSettings> {
        let mut entries = self.entries("LOCKBOX_PG_SECRET_ID").await?;

        let mut fields = RequiredFields::default();
        let database = fields.take("database", entries.remove("database"));
        let user = fields.take("user", entries.remove("user"));
        let host = fields.take("host", entries.remove("host"));
        let port = fields.take("port", entries.remove("port"));
        let password = fields.take("password", entries.remove("password"));
        fields.finish()?;

        let (ssl_mode, target_session_attrs) = relational_options(&self.env)?;
        Ok(RelationalSettings {
            host,
            port: parse_port(&port)?,
            database,
            user,
            password,
            ssl_mode,
            target_session_attrs,
        })
    }
}
