//! Records and the helpers that shape them before they reach a backend.
//!
//! A [`Record`] is a plain BSON document. Typed values convert through
//! [`to_record`] / [`from_record`]; bulk inputs are validated with [`insert_batch`] and
//! [`update_batch`] before any backend call is made.

use bson::{Bson, Document, de::deserialize_from_bson, ser::serialize_to_bson};
use serde::{Serialize, de::DeserializeOwned};

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// One document-shaped unit of data exchanged with storage.
pub type Record = Document;

/// Overlays `overlay` onto `base`; keys in `overlay` win.
pub fn merge_records(mut base: Record, overlay: Record) -> Record {
    for (key, value) in overlay {
        base.insert(key, value);
    }
    base
}

/// Serializes a typed value into a record.
///
/// # Errors
///
/// Returns [`DocumentStoreError::InvalidDocument`] if the value does not serialize to a
/// document (e.g. a bare number), or a serialization error.
pub fn to_record<T: Serialize>(value: &T) -> DocumentStoreResult<Record> {
    match serialize_to_bson(value)? {
        Bson::Document(record) => Ok(record),
        other => Err(DocumentStoreError::InvalidDocument(format!(
            "expected a document, got {:?}",
            other.element_type()
        ))),
    }
}

/// Deserializes a record into a typed value.
pub fn from_record<T: DeserializeOwned>(record: Record) -> DocumentStoreResult<T> {
    Ok(deserialize_from_bson(Bson::Document(record))?)
}

fn array_of_documents(input: Bson) -> DocumentStoreResult<Vec<Record>> {
    let items = match input {
        Bson::Array(items) => items,
        other => {
            return Err(DocumentStoreError::InvalidBulkInput(format!(
                "expected an array, got {:?}",
                other.element_type()
            )));
        }
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            Bson::Document(record) => Ok(record),
            other => Err(DocumentStoreError::InvalidBulkInput(format!(
                "element {} is {:?}, not a document",
                index,
                other.element_type()
            ))),
        })
        .collect()
}

/// Validates input for a bulk insert: a non-empty array of non-empty documents.
pub fn insert_batch(input: Bson) -> DocumentStoreResult<Vec<Record>> {
    let records = array_of_documents(input)?;

    if records.is_empty() {
        return Err(DocumentStoreError::InvalidBulkInput("array is empty".into()));
    }
    if let Some(index) = records.iter().position(Document::is_empty) {
        return Err(DocumentStoreError::InvalidBulkInput(format!(
            "element {} is an empty document",
            index
        )));
    }

    Ok(records)
}

/// Validates input for a bulk update: an array (possibly empty) of documents.
pub fn update_batch(input: Bson) -> DocumentStoreResult<Vec<Record>> {
    array_of_documents(input)
}
