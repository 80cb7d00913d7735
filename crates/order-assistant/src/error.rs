//! Error types shared by the record store, ingestion pipeline and chat backend

use std::path::PathBuf;
use thiserror::Error;

/// Problems with the record source.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("failed to read record source {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("record source is not a JSON array of orders: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("record #{index} is invalid: {message}")]
    InvalidRecord { index: usize, message: String },
    #[error("record #{index} repeats tracking number {tracking_number}")]
    DuplicateKey { index: usize, tracking_number: String },
    #[error("record source contains no usable orders")]
    Empty,
}

/// Failures of an ingestion run. None of them leave artifacts behind.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("no orders to index")]
    EmptyInput,
    #[error("index consistency violated: {0}")]
    IndexConsistency(String),
    #[error("embedding failed: {0}")]
    Embedding(String),
    #[error(transparent)]
    Data(#[from] DataError),
    #[error("artifact io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("artifact encoding error: {0}")]
    Encode(String),
    #[error("could not restore the previous index, it is still at {backup}: {source}")]
    Rollback {
        backup: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<bincode::Error> for IngestError {
    fn from(e: bincode::Error) -> Self {
        IngestError::Encode(e.to_string())
    }
}

impl From<serde_json::Error> for IngestError {
    fn from(e: serde_json::Error) -> Self {
        IngestError::Encode(e.to_string())
    }
}

/// A failed language-model call. Sessions turn these into a visible reply.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend request failed: {0}")]
    Transport(String),
    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to decode backend response: {0}")]
    Decode(String),
    #[error("backend did not answer within {0}s")]
    Timeout(u64),
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            BackendError::Decode(e.to_string())
        } else {
            BackendError::Transport(e.to_string())
        }
    }
}

/// Invalid runtime or prompt configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("missing required config key `{0}`")]
    MissingKey(&'static str),
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}
