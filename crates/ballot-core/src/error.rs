//! Error types for the proposal resolution pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Result type used throughout the pipeline
pub type Result<T> = std::result::Result<T, BallotError>;

/// Every failure the pipeline can surface to its caller.
///
/// Transient transport failures never appear here unless the remote client was
/// given a finite retry budget; see `RemoteUnavailable`.
#[derive(Error, Debug)]
pub enum BallotError {
    /// Retry budget exhausted against the remote index
    #[error("remote index unavailable after {attempts} attempt(s): {last_error}")]
    RemoteUnavailable { attempts: u32, last_error: String },

    /// Response was missing an expected field or carried GraphQL errors
    #[error("malformed remote response: {0}")]
    MalformedResponse(String),

    /// Remote index returned null for a requested entity
    #[error("not found: {0}")]
    NotFound(String),

    /// Wallet has no entry in the voting history
    #[error("wallet {0} has no voting history entry")]
    UnknownWallet(String),

    /// Bootstrap loop could not produce a history document
    #[error("voting history at {} still missing after {attempts} bootstrap attempt(s)", path.display())]
    HistoryUnavailable { path: PathBuf, attempts: u32 },

    /// Invalid configuration value
    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl BallotError {
    /// Create a new malformed-response error
    pub fn malformed<S: Into<String>>(msg: S) -> Self {
        BallotError::MalformedResponse(msg.into())
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        BallotError::Config(msg.into())
    }

    /// Create a new not-found error
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        BallotError::NotFound(msg.into())
    }
}
