//! Error types and result types for model and storage operations.
//!
//! Use [`DocumentStoreResult<T>`] as the return type for fallible operations. Input
//! validation errors ([`DocumentStoreError::EmptyData`],
//! [`DocumentStoreError::InvalidBulkInput`]) are raised before any backend call; everything
//! raised by a backend or a hook is passed through to the caller untouched.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors that can occur when working with a model or its backend.
#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// Serialization/deserialization error when converting between record formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during backend initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// A record with the given id already exists in the table.
    /// The first argument is the record id, the second is the table name.
    #[error("Record {0} already exists in table {1}")]
    DocumentAlreadyExists(String, String),
    /// The record has an invalid structure for the requested operation.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// The resolved options cannot be executed by the backend (e.g. no table).
    #[error("Invalid options: {0}")]
    InvalidOptions(String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
    /// A lifecycle hook rejected the operation.
    #[error("Hook rejected operation: {0}")]
    Hook(String),
    /// `add` was called and no record remained after merging pending data.
    #[error("Data is empty")]
    EmptyData,
    /// A bulk operation received something other than a sequence of records.
    #[error("Data must be an array of documents: {0}")]
    InvalidBulkInput(String),
}

/// A specialized `Result` type for model and storage operations.
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl From<BsonError> for DocumentStoreError {
    fn from(err: BsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for DocumentStoreError {
    fn from(err: SerdeJsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}
