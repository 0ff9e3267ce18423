//! Error types for the ingestion crate

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Block not found at height {0}")]
    BlockNotFound(u64),

    #[error("Transaction not found: {0}")]
    TxNotFound(String),

    #[error("Ingestion record not found: {0}")]
    RecordNotFound(String),

    #[error("Duplicate ingestion record: {0}")]
    DuplicateRecord(String),

    #[error("Invalid path: {name}, reason: {reason}")]
    InvalidPath { name: String, reason: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("HTTP request failed: {url}, status: {status:?}, error: {error}")]
    HttpRequest {
        url: String,
        status: Option<u16>,
        error: String,
    },

    #[error("Network timeout after {timeout_secs}s: {context}")]
    NetworkTimeout { timeout_secs: u64, context: String },

    #[error("Network connection error: {0}")]
    NetworkConnection(String),

    #[error("Chain API error: {endpoint}, status: {status}, message: {message}")]
    ChainApi {
        endpoint: String,
        status: u16,
        message: String,
    },

    #[error("Invalid response from chain API: {0}")]
    ChainApiInvalidResponse(String),

    #[error("Scanner error: {0}")]
    Scanner(String),

    #[error("Scanner circuit breaker is open")]
    CircuitOpen,

    #[error("CAS error: {0}")]
    Cas(String),

    #[error("Storage I/O error: {context}, error: {error}")]
    StorageIo { context: String, error: String },

    #[error("Database query failed: {0}")]
    DatabaseQuery(#[from] sqlx::Error),

    #[error("Database connection failed: {0}")]
    DatabaseConnection(String),

    #[error("Database migration failed: {0}")]
    DatabaseMigration(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {field}, reason: {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("JSON parsing error: {context}, error: {error}")]
    JsonParse { context: String, error: String },

    #[error("Missing required field: {field}, context: {context}")]
    MissingField { field: String, context: String },

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

impl IngestError {
    pub fn log_level(&self) -> tracing::Level {
        use tracing::Level;
        match self {
            Self::DatabaseConnection(_) | Self::DatabaseMigration(_) => Level::ERROR,
            Self::Config(_) | Self::InvalidConfig { .. } => Level::ERROR,
            Self::DatabaseQuery(_) => Level::ERROR,
            Self::NetworkConnection(_) | Self::HttpRequest { .. } => Level::WARN,
            Self::NetworkTimeout { .. } => Level::WARN,
            Self::ChainApi { .. } | Self::ChainApiInvalidResponse(_) => Level::WARN,
            Self::Scanner(_) | Self::CircuitOpen => Level::WARN,
            Self::JsonParse { .. } | Self::MissingField { .. } => Level::WARN,
            Self::InvalidPath { .. } | Self::InvalidInput(_) => Level::WARN,
            Self::BlockNotFound(_) | Self::TxNotFound(_) | Self::RecordNotFound(_) => Level::DEBUG,
            _ => Level::ERROR,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::NetworkTimeout { .. }
            | Self::NetworkConnection(_)
            | Self::HttpRequest { .. } => true,
            // 5xx and 429 are transient and worth retrying;
            // other 4xx client errors are permanent.
            Self::ChainApi { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for IngestError {
    fn from(err: reqwest::Error) -> Self {
        let url = err.url().map(|u| u.to_string()).unwrap_or_default();
        let status = err.status().map(|s| s.as_u16());

        if err.is_timeout() {
            Self::NetworkTimeout {
                timeout_secs: 30,
                context: url,
            }
        } else if err.is_connect() {
            Self::NetworkConnection(format!("Failed to connect to {}: {}", url, err))
        } else {
            Self::HttpRequest {
                url,
                status,
                error: err.to_string(),
            }
        }
    }
}

impl From<serde_json::Error> for IngestError {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonParse {
            context: "JSON deserialization".to_string(),
            error: err.to_string(),
        }
    }
}

impl From<std::io::Error> for IngestError {
    fn from(err: std::io::Error) -> Self {
        Self::StorageIo {
            context: "filesystem".to_string(),
            error: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;
