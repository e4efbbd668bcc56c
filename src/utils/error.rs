//! Error types for the domain indexer.
//!
//! A single `thiserror` enumeration covers every failure mode of the
//! ingestion pipeline, from configuration problems raised at start time to
//! upstream RPC failures that the watcher absorbs with its own backoff.

use thiserror::Error;

/// Custom error type for indexer operations.
#[derive(Debug, Error)]
pub enum IndexerError {
    /// Errors encountered during database operations.
    ///
    /// Wraps `sqlx::Error` so store code can propagate with `?`.
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    /// Errors while interpreting upstream payloads (transactions, log
    /// notifications, checkpoint files).
    #[error("Decoding error: {0}")]
    DecodingError(String),

    /// Errors interacting with the Solana RPC.
    ///
    /// This covers network failures, rate limiting and unexpected responses
    /// from the RPC endpoint.
    #[error("RPC error: {0}")]
    RpcError(String),

    /// Errors from the Solana RPC client.
    #[error("RPC client error: {0}")]
    RpcClientError(Box<solana_client::client_error::ClientError>),

    /// Errors related to configuration.
    ///
    /// Raised by the config builder and by `start()` when the watcher cannot
    /// run at all.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Errors from environment variable operations.
    #[error("Environment variable error: {0}")]
    EnvVarError(#[from] std::env::VarError),

    /// Errors during Solana public key parsing.
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(#[from] solana_sdk::pubkey::ParsePubkeyError),

    /// Filesystem errors from the JSON store.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON (de)serialization errors.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Connection error (WebSocket or feed socket failure)
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Generic errors for operations that don't fit other categories.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Type alias for Results using `IndexerError`.
pub type Result<T> = std::result::Result<T, IndexerError>;

impl From<solana_client::client_error::ClientError> for IndexerError {
    fn from(err: solana_client::client_error::ClientError) -> Self {
        IndexerError::RpcClientError(Box::new(err))
    }
}

impl IndexerError {
    /// Returns `true` for upstream failures the watcher rides out with its
    /// poll/backoff cadence.
    ///
    /// Configuration, key-parse and decoding errors are never transient: they
    /// are surfaced to the caller instead of being retried.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            IndexerError::RpcError(_)
            | IndexerError::RpcClientError(_)
            | IndexerError::ConnectionError(_)
            | IndexerError::InternalError(_) => true,
            IndexerError::DatabaseError(e) => matches!(
                e,
                sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed
            ),
            IndexerError::IoError(_) => true,
            IndexerError::DecodingError(_)
            | IndexerError::ConfigError(_)
            | IndexerError::EnvVarError(_)
            | IndexerError::InvalidPublicKey(_)
            | IndexerError::SerializationError(_) => false,
        }
    }
}
