//! A backend that records every call, for unit tests of the model layer.

use async_trait::async_trait;
use bson::{Bson, Document};
use mea::mutex::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};

use crate::{
    backend::{DeleteOutcome, StoreBackend, Update, UpdateOutcome},
    error::{DocumentStoreError, DocumentStoreResult},
    options::Options,
    query::{Expr, FieldOp},
    record::Record,
};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    InsertOne(Record, Options),
    InsertMany(Vec<Record>, Options),
    Update(Update, Options),
    Delete(Options),
    Select(Options),
    Count(Options),
    Sum(Options),
    Aggregate(String, Vec<Document>),
    CreateIndex(String, Document, bool),
}

/// Options as the resolver produces them for a model without defaults or prefix.
pub(crate) fn resolved(table: &str, model: &str) -> Options {
    let mut options = Options::new().table(table);
    options.table_prefix = Some(String::new());
    options.model = Some(model.to_string());
    options
}

#[derive(Debug)]
pub(crate) struct RecordingBackend {
    calls: Mutex<Vec<Call>>,
    next_id: AtomicI64,
    modified: Option<u64>,
    deleted: Option<u64>,
    fail_on: Option<(String, Bson)>,
}

impl RecordingBackend {
    pub(crate) fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
            modified: Some(0),
            deleted: Some(0),
            fail_on: None,
        }
    }

    pub(crate) fn with_modified(mut self, modified: Option<u64>) -> Self {
        self.modified = modified;
        self
    }

    pub(crate) fn with_deleted(mut self, deleted: Option<u64>) -> Self {
        self.deleted = deleted;
        self
    }

    /// Fails any update whose filter contains `field == value`.
    pub(crate) fn failing_on(mut self, field: &str, value: impl Into<Bson>) -> Self {
        self.fail_on = Some((field.to_string(), value.into()));
        self
    }

    pub(crate) async fn calls(&self) -> Vec<Call> {
        self.calls.lock().await.clone()
    }

    async fn record(&self, call: Call) {
        self.calls.lock().await.push(call);
    }

    fn should_fail(&self, filter: Option<&Expr>) -> bool {
        fn contains(expr: &Expr, field: &str, value: &Bson) -> bool {
            match expr {
                Expr::And(list) | Expr::Or(list) => list.iter().any(|e| contains(e, field, value)),
                Expr::Field { field: f, op: FieldOp::Eq, value: v } => f == field && v == value,
                _ => false,
            }
        }

        match (&self.fail_on, filter) {
            (Some((field, value)), Some(expr)) => contains(expr, field, value),
            _ => false,
        }
    }
}

#[async_trait]
impl StoreBackend for RecordingBackend {
    async fn insert_one(&self, record: Record, options: &Options) -> DocumentStoreResult<Bson> {
        self.record(Call::InsertOne(record, options.clone())).await;
        Ok(Bson::Int64(self.next_id.fetch_add(1, Ordering::SeqCst)))
    }

    async fn insert_many(
        &self,
        records: Vec<Record>,
        options: &Options,
    ) -> DocumentStoreResult<Vec<Bson>> {
        let ids = records
            .iter()
            .map(|_| Bson::Int64(self.next_id.fetch_add(1, Ordering::SeqCst)))
            .collect();
        self.record(Call::InsertMany(records, options.clone())).await;
        Ok(ids)
    }

    async fn update(&self, update: Update, options: &Options) -> DocumentStoreResult<UpdateOutcome> {
        self.record(Call::Update(update, options.clone())).await;

        if self.should_fail(options.filter.as_ref()) {
            return Err(DocumentStoreError::Backend("update failed".into()));
        }

        Ok(UpdateOutcome { matched: Some(1), modified: self.modified })
    }

    async fn delete(&self, options: &Options) -> DocumentStoreResult<DeleteOutcome> {
        self.record(Call::Delete(options.clone())).await;
        Ok(DeleteOutcome { deleted: self.deleted })
    }

    async fn select(&self, options: &Options) -> DocumentStoreResult<Vec<Record>> {
        self.record(Call::Select(options.clone())).await;
        Ok(Vec::new())
    }

    async fn count(&self, options: &Options) -> DocumentStoreResult<u64> {
        self.record(Call::Count(options.clone())).await;
        Ok(0)
    }

    async fn sum(&self, options: &Options) -> DocumentStoreResult<f64> {
        self.record(Call::Sum(options.clone())).await;
        Ok(0.0)
    }

    async fn aggregate(
        &self,
        table: &str,
        pipeline: Vec<Document>,
    ) -> DocumentStoreResult<Vec<Document>> {
        self.record(Call::Aggregate(table.to_string(), pipeline)).await;
        Ok(Vec::new())
    }

    async fn create_index(&self, table: &str, keys: Document, unique: bool) -> DocumentStoreResult<()> {
        self.record(Call::CreateIndex(table.to_string(), keys, unique)).await;
        Ok(())
    }
}
