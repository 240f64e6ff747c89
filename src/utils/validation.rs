use crate::utils::error::{Result, TransferError};
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

fn invalid(field_name: &str, value: &str, reason: impl std::fmt::Display) -> TransferError {
    TransferError::configuration(format!(
        "invalid value for {}: {:?} ({})",
        field_name, value, reason
    ))
}

pub fn validate_endpoint_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(invalid(field_name, url_str, "URL cannot be empty"));
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(invalid(
                field_name,
                url_str,
                format!("Unsupported URL scheme: {}", scheme),
            )),
        },
        Err(e) => Err(invalid(field_name, url_str, format!("Invalid URL format: {}", e))),
    }
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(invalid(field_name, path, "Path cannot be empty"));
    }

    if path.contains('\0') {
        return Err(invalid(field_name, path, "Path contains null bytes"));
    }

    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(invalid(
            field_name,
            value,
            "Value cannot be empty or whitespace-only",
        ));
    }
    Ok(())
}

pub fn validate_bucket_name(field_name: &str, bucket_name: &str) -> Result<()> {
    if bucket_name.len() < 3 || bucket_name.len() > 63 {
        return Err(invalid(
            field_name,
            bucket_name,
            "bucket name must be between 3 and 63 characters",
        ));
    }

    if !bucket_name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
    {
        return Err(invalid(
            field_name,
            bucket_name,
            "bucket name can only contain lowercase letters, numbers, hyphens, and dots",
        ));
    }

    if bucket_name.starts_with('-') || bucket_name.ends_with('-') {
        return Err(invalid(
            field_name,
            bucket_name,
            "bucket name cannot start or end with a hyphen",
        ));
    }

    Ok(())
}

/// Identifiers are always quoted when rendered into SQL; this only rejects
/// values that cannot be a PostgreSQL identifier at all.
pub fn validate_identifier(field_name: &str, ident: &str) -> Result<()> {
    validate_non_empty_string(field_name, ident)?;

    if ident.contains('\0') {
        return Err(invalid(field_name, ident, "identifier contains null bytes"));
    }

    if ident.len() > 63 {
        return Err(invalid(
            field_name,
            ident,
            "identifier is longer than 63 bytes",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_endpoint_url() {
        assert!(validate_endpoint_url("s3.endpoint_url", "https://storage.example.net").is_ok());
        assert!(validate_endpoint_url("s3.endpoint_url", "http://localhost:9000").is_ok());
        assert!(validate_endpoint_url("s3.endpoint_url", "").is_err());
        assert!(validate_endpoint_url("s3.endpoint_url", "not a url").is_err());
        assert!(validate_endpoint_url("s3.endpoint_url", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_bucket_name() {
        assert!(validate_bucket_name("bucket", "my-bucket.data").is_ok());
        assert!(validate_bucket_name("bucket", "ab").is_err());
        assert!(validate_bucket_name("bucket", "Upper").is_err());
        assert!(validate_bucket_name("bucket", "-leading").is_err());
    }

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("table", "events").is_ok());
        assert!(validate_identifier("table", "Mixed \"Case\"").is_ok());
        assert!(validate_identifier("table", "  ").is_err());
        assert!(validate_identifier("table", &"x".repeat(64)).is_err());
    }
}
