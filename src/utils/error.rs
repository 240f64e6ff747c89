use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Empty input: {message}")]
    EmptyInputError { message: String },

    #[error("Format error: {message}")]
    FormatError { message: String },

    #[error("Secrets required: missing {}", missing.join(", "))]
    SecretsRequiredError { missing: Vec<String> },

    #[error("Storage error: {message}")]
    StorageError { message: String },

    #[error("Unsupported operation: {operation}")]
    UnsupportedOperationError { operation: String },
}

/// Fieldless view of a [`TransferError`], for matching without the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    EmptyInput,
    Format,
    SecretsRequired,
    Storage,
    UnsupportedOperation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Medium,
    High,
    Critical,
}

impl TransferError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::ConfigurationError {
            message: message.into(),
        }
    }

    pub fn empty_input(message: impl Into<String>) -> Self {
        Self::EmptyInputError {
            message: message.into(),
        }
    }

    pub fn format(message: impl Into<String>) -> Self {
        Self::FormatError {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::StorageError {
            message: message.into(),
        }
    }

    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::UnsupportedOperationError {
            operation: operation.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ConfigurationError { .. } => ErrorKind::Configuration,
            Self::EmptyInputError { .. } => ErrorKind::EmptyInput,
            Self::FormatError { .. } => ErrorKind::Format,
            Self::SecretsRequiredError { .. } => ErrorKind::SecretsRequired,
            Self::StorageError { .. } => ErrorKind::Storage,
            Self::UnsupportedOperationError { .. } => ErrorKind::UnsupportedOperation,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.kind() {
            ErrorKind::EmptyInput | ErrorKind::Format => ErrorSeverity::Medium,
            ErrorKind::Storage => ErrorSeverity::High,
            ErrorKind::Configuration
            | ErrorKind::SecretsRequired
            | ErrorKind::UnsupportedOperation => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.kind() {
            ErrorKind::Configuration => {
                "Check that the source/target file name, bucket, schema and table are set"
            }
            ErrorKind::EmptyInput => "Load a non-empty record set before saving",
            ErrorKind::Format => "Check that the payload matches the declared format (csv/json)",
            ErrorKind::SecretsRequired => {
                "Provide the missing credentials via environment variables or the secret vault"
            }
            ErrorKind::Storage => {
                "Check connectivity and permissions; the target may be in an intermediate state"
            }
            ErrorKind::UnsupportedOperation => "Use a supported source/target combination",
        }
    }
}

impl From<std::io::Error> for TransferError {
    fn from(err: std::io::Error) -> Self {
        Self::storage(format!("IO error: {}", err))
    }
}

impl From<tokio_postgres::Error> for TransferError {
    fn from(err: tokio_postgres::Error) -> Self {
        Self::storage(format!("PostgreSQL error: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, TransferError>;
