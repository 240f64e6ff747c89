//! Typed connection settings for the object-storage and relational backends.

use crate::utils::error::{Result, TransferError};
use crate::utils::validation::{validate_endpoint_url, validate_non_empty_string, Validate};
use std::fmt;
use std::time::Duration;
use tokio_postgres::config::{SslMode, TargetSessionAttrs};

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, PartialEq, Eq)]
pub struct ObjectStorageSettings {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub endpoint_url: Option<String>,
    pub region: String,
}

impl fmt::Debug for ObjectStorageSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectStorageSettings")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"***")
            .field("endpoint_url", &self.endpoint_url)
            .field("region", &self.region)
            .finish()
    }
}

impl Validate for ObjectStorageSettings {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("access_key_id", &self.access_key_id)?;
        validate_non_empty_string("region", &self.region)?;
        if let Some(endpoint) = &self.endpoint_url {
            validate_endpoint_url("endpoint_url", endpoint)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SslPreference {
    Disable,
    Prefer,
}

impl SslPreference {
    pub fn parse(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "disable" => Ok(Self::Disable),
            "prefer" | "allow" => Ok(Self::Prefer),
            other => Err(TransferError::configuration(format!(
                "sslmode {:?} needs TLS, which this build does not support; use disable or prefer",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAttrs {
    Any,
    ReadWrite,
}

impl SessionAttrs {
    pub fn parse(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "any" => Ok(Self::Any),
            "read-write" => Ok(Self::ReadWrite),
            other => Err(TransferError::configuration(format!(
                "unsupported target_session_attrs {:?}, any/read-write to be used",
                other
            ))),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct RelationalSettings {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    pub ssl_mode: SslPreference,
    pub target_session_attrs: SessionAttrs,
}

impl fmt::Debug for RelationalSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationalSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"***")
            .field("ssl_mode", &self.ssl_mode)
            .field("target_session_attrs", &self.target_session_attrs)
            .finish()
    }
}

impl RelationalSettings {
    pub fn to_pg_config(&self) -> tokio_postgres::Config {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&self.host)
            .port(self.port)
            .dbname(&self.database)
            .user(&self.user)
            .password(&self.password)
            .connect_timeout(CONNECT_TIMEOUT)
            .ssl_mode(match self.ssl_mode {
                SslPreference::Disable => SslMode::Disable,
                SslPreference::Prefer => SslMode::Prefer,
            })
            .target_session_attrs(match self.target_session_attrs {
                SessionAttrs::Any => TargetSessionAttrs::Any,
                SessionAttrs::ReadWrite => TargetSessionAttrs::ReadWrite,
            });
        config
    }
}

pub fn parse_port(value: &str) -> Result<u16> {
    value.trim().parse().map_err(|_| {
        TransferError::configuration(format!("port {:?} is not a valid TCP port", value))
    })
}
