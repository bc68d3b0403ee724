//! Error types for the ingestion pipeline and the query layer.

use crate::context::IndexKind;
use scorestore::StoreError;

/// A stream message that could not be turned into a score event.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// The payload is not valid JSON or lacks a required field.
    #[error("malformed score payload: {0}")]
    Payload(#[from] serde_json::Error),

    /// A required field is present but empty.
    #[error("empty field in score payload: {0}")]
    EmptyField(&'static str),

    /// The score does not read as a finite decimal.
    #[error("score is not a decimal: {0:?}")]
    Score(String),
}

/// One of the two index writes for an event failed.
#[derive(Debug, thiserror::Error)]
#[error("failed to write {index} index: {source}")]
pub struct WriteError {
    /// The index whose upsert failed. A failure on the student index means
    /// neither index was written; a failure on the exam index means only the
    /// student index holds the event.
    pub index: IndexKind,
    #[source]
    pub source: StoreError,
}

/// Failures of the upstream connection.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The connection could not be established.
    #[error("connection to upstream failed: {0}")]
    Connection(String),

    /// An established stream broke off.
    #[error("upstream stream error: {0}")]
    Stream(String),

    /// Connecting failed too many times in a row.
    #[error("gave up after {attempts} consecutive connection failures")]
    RetriesExhausted { attempts: u32 },
}

impl From<reqwest::Error> for IngestError {
    fn from(err: reqwest::Error) -> Self {
        IngestError::Connection(err.to_string())
    }
}

/// A read against one of the indexes failed.
#[derive(Debug, thiserror::Error)]
#[error("failed to read {index} index: {source}")]
pub struct QueryError {
    pub index: IndexKind,
    #[source]
    pub source: StoreError,
}
