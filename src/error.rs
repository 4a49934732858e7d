//! Error taxonomy for the connector.
//!
//! Request-shape problems are the caller's fault and fatal for the request.
//! Store errors split into the two non-retryable classes; transient failures
//! never appear here because the executor absorbs them.

use thiserror::Error;

/// Top-level error for the matching path.
#[derive(Error, Debug)]
pub enum ConnectorError {
    #[error("request shape error: {0}")]
    RequestShape(#[from] RequestShapeError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// The inbound payload did not carry the structure the matcher needs.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RequestShapeError {
    #[error("required field '{0}' not found in annotation tree")]
    MissingField(&'static str),

    #[error("duplicate node id '{0}' in annotation tree")]
    DuplicateNodeId(String),
}

/// Non-recovered failure from the reference data store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store rejected the parameters as invalid. Never retried; flags a
    /// possible injection or corrupt-upstream-data condition.
    #[error("store rejected parameters as malformed input (corrupt upstream data?): {0}")]
    MalformedInput(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Constraint violation unrelated to connectivity, propagated unchanged.
    #[error("integrity violation: {0}")]
    IntegrityViolation(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Failure on a non-retrying pass-through call (commit/rollback).
    #[error("store connection failure: {0}")]
    Connection(#[source] Box<dyn std::error::Error + Send + Sync>),
}
