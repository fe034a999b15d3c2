//! Lifecycle hooks: the per-model extension points of the mutation pipeline.
//!
//! A model is parameterized over a [`ModelHooks`] implementation. Every method has an
//! identity or no-op default, so implementers override only what they need:
//!
//! ```ignore
//! use docmodel::{async_trait, prelude::*};
//!
//! struct Timestamped;
//!
//! #[async_trait]
//! impl ModelHooks for Timestamped {
//!     async fn before_add(&self, mut record: Record, _options: &Options) -> DocumentStoreResult<Record> {
//!         record.insert("created_at", bson::DateTime::now());
//!         Ok(record)
//!     }
//! }
//! ```
//!
//! Before-hooks and result hooks may transform their input or reject the operation by
//! returning an error, which is propagated to the caller unchanged. After-hooks on writes
//! are observational.

use async_trait::async_trait;

use crate::{error::DocumentStoreResult, options::Options, record::Record};

#[async_trait]
pub trait ModelHooks: Send + Sync {
    /// Runs before a single insert, after options are resolved.
    async fn before_add(&self, record: Record, _options: &Options) -> DocumentStoreResult<Record> {
        Ok(record)
    }

    /// Runs once over the whole sequence before a bulk insert.
    ///
    /// Defaults to applying [`before_add`](Self::before_add) to each record in order.
    async fn before_add_many(
        &self,
        records: Vec<Record>,
        options: &Options,
    ) -> DocumentStoreResult<Vec<Record>> {
        let mut prepared = Vec::with_capacity(records.len());
        for record in records {
            prepared.push(self.before_add(record, options).await?);
        }
        Ok(prepared)
    }

    async fn after_add(&self, _record: &Record, _options: &Options) -> DocumentStoreResult<()> {
        Ok(())
    }

    /// Defaults to applying [`after_add`](Self::after_add) to each record in order.
    async fn after_add_many(&self, records: &[Record], options: &Options) -> DocumentStoreResult<()> {
        for record in records {
            self.after_add(record, options).await?;
        }
        Ok(())
    }

    /// Receives the payload as written, i.e. without the primary key.
    async fn after_update(&self, _record: &Record, _options: &Options) -> DocumentStoreResult<()> {
        Ok(())
    }

    async fn after_delete(&self, _options: &Options) -> DocumentStoreResult<()> {
        Ok(())
    }

    async fn after_select(
        &self,
        records: Vec<Record>,
        _options: &Options,
    ) -> DocumentStoreResult<Vec<Record>> {
        Ok(records)
    }

    /// Receives an empty record when nothing matched.
    async fn after_find(&self, record: Record, _options: &Options) -> DocumentStoreResult<Record> {
        Ok(record)
    }

    /// Shapes a record right before it is written. Identity by default.
    fn normalize(&self, record: Record) -> Record {
        record
    }

    /// Last-mile adjustment of resolved options. Identity by default.
    fn filter_options(&self, options: Options) -> Options {
        options
    }
}

/// Hooks that leave every record and option untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl ModelHooks for NoHooks {}
