//! Storage driver abstraction.
//!
//! A [`StoreBackend`] executes the primitive operations a model is built on. Every call
//! receives the fully resolved [`Options`] for the operation: the table to target, the
//! `where` filter, limits, sort and field selection.
//!
//! Write operations report counts through [`UpdateOutcome`] and [`DeleteOutcome`]. Counts
//! are optional because not every driver reports them; the model layer turns a missing
//! count into zero.
//!
//! # Examples
//!
//! ```ignore
//! use docmodel::{backend::StoreBackend, options::Options};
//! use bson::doc;
//!
//! let backend = InMemoryStore::new();
//! let options = Options::new().table("users");
//! let id = backend.insert_one(doc! { "name": "Alice" }, &options).await?;
//! ```

use async_trait::async_trait;
use bson::{Bson, Document};
use std::fmt::Debug;

use crate::{error::DocumentStoreResult, options::Options, record::Record};

/// The change an update applies to every matched record.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    /// Sets each field of the document on the matched records.
    Set(Document),
    /// Adds each numeric delta to the matched records' fields; missing fields start at zero.
    Inc(Document),
}

impl Update {
    pub fn document(&self) -> &Document {
        match self {
            Update::Set(doc) | Update::Inc(doc) => doc,
        }
    }
}

/// Driver report for an update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// Records matched by the filter, if reported.
    pub matched: Option<u64>,
    /// Records actually changed, if reported.
    pub modified: Option<u64>,
}

impl UpdateOutcome {
    /// Modified count, zero when unreported.
    pub fn modified(&self) -> u64 {
        self.modified.unwrap_or(0)
    }
}

/// Driver report for a delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteOutcome {
    /// Records removed, if reported.
    pub deleted: Option<u64>,
}

impl DeleteOutcome {
    /// Removed count, zero when unreported.
    pub fn deleted(&self) -> u64 {
        self.deleted.unwrap_or(0)
    }
}

/// Abstract interface for document storage drivers.
///
/// # Thread Safety
///
/// Implementations must support concurrent calls through `&self`; bulk updates issue
/// several [`update`](StoreBackend::update) calls at once.
///
/// # Error Handling
///
/// Driver failures should be reported as
/// [`DocumentStoreError::Backend`](crate::error::DocumentStoreError::Backend). The model
/// layer never retries or wraps them.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Inserts one record into `options.table` and returns its identifier.
    ///
    /// Backends assign an identifier under `_id` when the record has none.
    async fn insert_one(&self, record: Record, options: &Options) -> DocumentStoreResult<Bson>;

    /// Inserts records in order with a single driver call and returns their identifiers in
    /// the same order.
    async fn insert_many(
        &self,
        records: Vec<Record>,
        options: &Options,
    ) -> DocumentStoreResult<Vec<Bson>>;

    /// Applies `update` to every record matching `options.filter`, bounded by `options.limit`.
    async fn update(&self, update: Update, options: &Options) -> DocumentStoreResult<UpdateOutcome>;

    /// Removes every record matching `options.filter`, bounded by `options.limit`.
    async fn delete(&self, options: &Options) -> DocumentStoreResult<DeleteOutcome>;

    /// Returns matching records, honouring filter, sort, offset, limit and field selection.
    ///
    /// When fields are selected, `_id` is returned alongside them.
    async fn select(&self, options: &Options) -> DocumentStoreResult<Vec<Record>>;

    /// Counts matching records. With a field selection, only records holding the first
    /// selected field are counted.
    async fn count(&self, options: &Options) -> DocumentStoreResult<u64>;

    /// Sums the first selected field over matching records. Non-numeric and missing
    /// values are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidOptions`](crate::error::DocumentStoreError::InvalidOptions)
    /// when no field is selected.
    async fn sum(&self, options: &Options) -> DocumentStoreResult<f64>;

    /// Runs a raw aggregation pipeline against a table.
    async fn aggregate(
        &self,
        table: &str,
        pipeline: Vec<Document>,
    ) -> DocumentStoreResult<Vec<Document>>;

    /// Creates an index over `keys` (field name to direction).
    async fn create_index(&self, table: &str, keys: Document, unique: bool) -> DocumentStoreResult<()>;

    /// Cleanly shuts down the backend, releasing all resources. No-op by default.
    async fn shutdown(self) -> DocumentStoreResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

#[async_trait]
impl<B> StoreBackend for &B
where
    B: StoreBackend,
{
    async fn insert_one(&self, record: Record, options: &Options) -> DocumentStoreResult<Bson> {
        (*self).insert_one(record, options).await
    }

    async fn insert_many(
        &self,
        records: Vec<Record>,
        options: &Options,
    ) -> DocumentStoreResult<Vec<Bson>> {
        (*self).insert_many(records, options).await
    }

    async fn update(&self, update: Update, options: &Options) -> DocumentStoreResult<UpdateOutcome> {
        (*self).update(update, options).await
    }

    async fn delete(&self, options: &Options) -> DocumentStoreResult<DeleteOutcome> {
        (*self).delete(options).await
    }

    async fn select(&self, options: &Options) -> DocumentStoreResult<Vec<Record>> {
        (*self).select(options).await
    }

    async fn count(&self, options: &Options) -> DocumentStoreResult<u64> {
        (*self).count(options).await
    }

    async fn sum(&self, options: &Options) -> DocumentStoreResult<f64> {
        (*self).sum(options).await
    }

    async fn aggregate(
        &self,
        table: &str,
        pipeline: Vec<Document>,
    ) -> DocumentStoreResult<Vec<Document>> {
        (*self).aggregate(table, pipeline).await
    }

    async fn create_index(&self, table: &str, keys: Document, unique: bool) -> DocumentStoreResult<()> {
        (*self).create_index(table, keys, unique).await
    }
}

/// Factory for backend instances.
#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> DocumentStoreResult<Self::Backend>;
}
