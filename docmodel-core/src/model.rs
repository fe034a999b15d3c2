//! Models: the record lifecycle over one table.
//!
//! A [`Model`] ties a storage backend, a [`ModelConfig`] and a set of [`ModelHooks`]
//! together. Operations are issued through a [`Request`], an owned builder that
//! accumulates query state from chained calls and is consumed by exactly one terminal
//! operation:
//!
//! ```ignore
//! use docmodel::{prelude::*, memory::InMemoryStore};
//! use bson::doc;
//!
//! let users = Model::new(InMemoryStore::new(), ModelConfig::new("User"));
//!
//! let id = users.add(doc! { "name": "Alice", "age": 30 }).await?;
//! let adults = users
//!     .filter(Filter::gte("age", 18))
//!     .sort(Sort::asc("name"))
//!     .limit(10)
//!     .select()
//!     .await?;
//! let renamed = users.update(doc! { "_id": id, "name": "Alicia" }).await?;
//! ```
//!
//! Because each request owns its accumulated state, two operations can never observe each
//! other's chained filters, even when they run concurrently on the same model.

use bson::{Bson, Document};
use futures::future::try_join_all;
use serde::de::DeserializeOwned;
use std::{fmt, mem};

use crate::{
    backend::{StoreBackend, Update, UpdateOutcome},
    config::ModelConfig,
    error::{DocumentStoreError, DocumentStoreResult},
    hooks::{ModelHooks, NoHooks},
    options::{OptionResolver, Options},
    query::{Expr, Filter, Sort},
    record::{Record, from_record, insert_batch, merge_records, update_batch},
};

/// A logical entity stored in one table of a backend.
///
/// # Type Parameters
///
/// * `B` - The backend implementation type
/// * `H` - The lifecycle hooks, [`NoHooks`] unless supplied
pub struct Model<B: StoreBackend, H: ModelHooks = NoHooks> {
    backend: B,
    hooks: H,
    config: ModelConfig,
}

impl<B: StoreBackend> Model<B, NoHooks> {
    /// Creates a model without hooks.
    pub fn new(backend: B, config: ModelConfig) -> Self {
        Self { backend, hooks: NoHooks, config }
    }
}

impl<B: StoreBackend, H: ModelHooks> Model<B, H> {
    /// Creates a model whose lifecycle runs through `hooks`.
    pub fn with_hooks(backend: B, config: ModelConfig, hooks: H) -> Self {
        Self { backend, hooks, config }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    pub fn table_name(&self) -> String {
        self.config.table_name()
    }

    pub fn primary_key(&self) -> &str {
        &self.config.primary_key
    }

    /// Starts an empty request.
    pub fn request(&self) -> Request<'_, B, H> {
        Request::new(self)
    }

    /// Starts a request with a `where` clause.
    pub fn filter(&self, expr: Expr) -> Request<'_, B, H> {
        self.request().filter(expr)
    }

    /// Starts a request with a field selection.
    pub fn field<I, S>(&self, fields: I) -> Request<'_, B, H>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.request().field(fields)
    }

    /// Starts a request with a caller-supplied options object.
    pub fn options(&self, options: Options) -> Request<'_, B, H> {
        self.request().options(options)
    }

    /// Starts a request with pending record data for the next insert.
    pub fn data(&self, record: Record) -> Request<'_, B, H> {
        self.request().data(record)
    }

    /// See [`Request::add`].
    pub async fn add(&self, record: Record) -> DocumentStoreResult<Bson> {
        self.request().add(record).await
    }

    /// See [`Request::add_many`].
    pub async fn add_many(&self, records: impl Into<Bson>) -> DocumentStoreResult<Bson> {
        self.request().add_many(records).await
    }

    /// See [`Request::update`].
    pub async fn update(&self, record: Record) -> DocumentStoreResult<u64> {
        self.request().update(record).await
    }

    /// See [`Request::update_many`].
    pub async fn update_many(&self, records: impl Into<Bson>) -> DocumentStoreResult<u64> {
        self.request().update_many(records).await
    }

    /// See [`Request::delete`].
    pub async fn delete(&self) -> DocumentStoreResult<u64> {
        self.request().delete().await
    }

    /// See [`Request::select`].
    pub async fn select(&self) -> DocumentStoreResult<Vec<Record>> {
        self.request().select().await
    }

    /// See [`Request::find`].
    pub async fn find(&self) -> DocumentStoreResult<Record> {
        self.request().find().await
    }

    /// See [`Request::count`].
    pub async fn count(&self, field: Option<&str>) -> DocumentStoreResult<u64> {
        self.request().count(field).await
    }

    /// See [`Request::sum`].
    pub async fn sum(&self, field: &str) -> DocumentStoreResult<f64> {
        self.request().sum(field).await
    }

    /// See [`Request::increment`].
    pub async fn increment(&self, field: &str) -> DocumentStoreResult<UpdateOutcome> {
        self.request().increment(field).await
    }

    /// See [`Request::decrement`].
    pub async fn decrement(&self, field: &str) -> DocumentStoreResult<UpdateOutcome> {
        self.request().decrement(field).await
    }

    /// Runs a raw aggregation pipeline against this model's table.
    pub async fn aggregate(&self, pipeline: Vec<Document>) -> DocumentStoreResult<Vec<Document>> {
        self.backend
            .aggregate(&self.table_name(), pipeline)
            .await
    }

    /// Creates an index on this model's table.
    ///
    /// # Arguments
    ///
    /// * `keys` - Field names mapped to a direction (`1` ascending, `-1` descending)
    /// * `unique` - Whether the index should enforce uniqueness
    pub async fn create_index(&self, keys: Document, unique: bool) -> DocumentStoreResult<()> {
        self.backend
            .create_index(&self.table_name(), keys, unique)
            .await
    }

    /// Shuts down the model and releases backend resources.
    pub async fn shutdown(self) -> DocumentStoreResult<()> {
        self.backend.shutdown().await
    }
}

impl<B: StoreBackend, H: ModelHooks> fmt::Debug for Model<B, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("config", &self.config)
            .field("backend", &self.backend)
            .finish_non_exhaustive()
    }
}

/// One pending operation on a [`Model`].
///
/// Chained calls accumulate options and pending record data; a terminal operation
/// (`add`, `select`, `update`, ...) consumes the request. Accumulated options rank above the
/// model defaults and below [`options`](Request::options) and operation overrides.
pub struct Request<'m, B: StoreBackend, H: ModelHooks> {
    model: &'m Model<B, H>,
    pending: Options,
    data: Record,
    call: Option<Options>,
}

impl<'m, B: StoreBackend, H: ModelHooks> Clone for Request<'m, B, H> {
    fn clone(&self) -> Self {
        Self {
            model: self.model,
            pending: self.pending.clone(),
            data: self.data.clone(),
            call: self.call.clone(),
        }
    }
}

impl<'m, B: StoreBackend, H: ModelHooks> Request<'m, B, H> {
    fn new(model: &'m Model<B, H>) -> Self {
        Self {
            model,
            pending: Options::default(),
            data: Record::new(),
            call: None,
        }
    }

    /// ANDs `expr` into the accumulated `where` clause.
    pub fn filter(mut self, expr: Expr) -> Self {
        self.pending.filter = Some(Expr::conjoin(self.pending.filter.take(), expr));
        self
    }

    pub fn field<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pending.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.pending.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.pending.offset = Some(offset);
        self
    }

    pub fn sort(mut self, sort: Sort) -> Self {
        self.pending.sort = Some(sort);
        self
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.pending.table = Some(table.into());
        self
    }

    /// Sets a caller-defined option.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.pending.extra.insert(key.into(), value.into());
        self
    }

    /// Supplies an options object for this call. Repeated calls merge, later wins.
    pub fn options(mut self, options: Options) -> Self {
        self.call = Some(match self.call.take() {
            Some(existing) => existing.merge(options),
            None => options,
        });
        self
    }

    /// Adds pending record data, merged under the record given to `add` / `add_many`.
    pub fn data(mut self, record: Record) -> Self {
        self.data = merge_records(mem::take(&mut self.data), record);
        self
    }

    /// Options accumulated by chained calls and not yet resolved.
    pub fn pending(&self) -> &Options {
        &self.pending
    }

    /// Record data accumulated by [`data`](Request::data) and not yet consumed.
    pub fn pending_data(&self) -> &Record {
        &self.data
    }

    /// Resolves the options for an operation, taking the accumulated options and call
    /// options out of this request.
    pub fn resolve(&mut self, overrides: Options) -> Options {
        let accumulated = mem::take(&mut self.pending);
        let call = self.call.take();

        let options = OptionResolver::new(&self.model.config, &self.model.hooks)
            .resolve(accumulated, call, overrides);

        log::trace!("resolved options for {}: {:?}", self.model.config.model, options);

        options
    }

    /// Inserts one record and returns its identifier.
    ///
    /// The record is merged over any pending [`data`](Request::data), then run through
    /// `before_add` and `normalize` before the insert and `after_add` after it.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::EmptyData`] without touching the backend when the
    /// merged record is empty. Hook and backend errors are returned unchanged.
    pub async fn add(mut self, record: Record) -> DocumentStoreResult<Bson> {
        let record = merge_records(mem::take(&mut self.data), record);

        if record.is_empty() {
            log::warn!("rejected add on {}: no data", self.model.config.model);
            return Err(DocumentStoreError::EmptyData);
        }

        let options = self.resolve(Options::new());
        let hooks = &self.model.hooks;

        let record = hooks.before_add(record, &options).await?;
        let mut record = hooks.normalize(record);

        log::debug!("add into {}", table_of(&options));

        let id = self
            .model
            .backend
            .insert_one(record.clone(), &options)
            .await?;

        if !record.contains_key("_id") {
            record.insert("_id", id.clone());
        }
        hooks.after_add(&record, &options).await?;

        Ok(id)
    }

    /// Inserts a sequence of records with one backend call and returns the identifier of
    /// the last one.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidBulkInput`] without touching the backend unless
    /// `records` is a non-empty array of non-empty documents.
    pub async fn add_many(mut self, records: impl Into<Bson>) -> DocumentStoreResult<Bson> {
        let records = insert_batch(records.into()).inspect_err(|err| {
            log::warn!("rejected add_many on {}: {}", self.model.config.model, err)
        })?;

        let pending = mem::take(&mut self.data);
        let records = records
            .into_iter()
            .map(|record| merge_records(pending.clone(), record))
            .collect::<Vec<_>>();

        let options = self.resolve(Options::new());
        let hooks = &self.model.hooks;

        let records = hooks
            .before_add_many(records, &options)
            .await?
            .into_iter()
            .map(|record| hooks.normalize(record))
            .collect::<Vec<_>>();

        log::debug!("add {} record(s) into {}", records.len(), table_of(&options));

        let ids = self
            .model
            .backend
            .insert_many(records.clone(), &options)
            .await?;

        let inserted = records
            .into_iter()
            .zip(ids.iter())
            .map(|(mut record, id)| {
                if !record.contains_key("_id") {
                    record.insert("_id", id.clone());
                }
                record
            })
            .collect::<Vec<_>>();
        hooks.after_add_many(&inserted, &options).await?;

        ids.into_iter()
            .last()
            .ok_or_else(|| DocumentStoreError::Backend("bulk insert reported no identifiers".into()))
    }

    /// Sets the record's fields on every matching record and returns how many changed.
    ///
    /// If the record carries a non-null primary key value, that value becomes an equality
    /// condition of the `where` clause and the key is removed from the written payload.
    pub async fn update(mut self, mut record: Record) -> DocumentStoreResult<u64> {
        let mut options = self.resolve(Options::new());
        let pk = self.model.config.primary_key.as_str();

        match record.remove(pk) {
            Some(Bson::Null) | None => {}
            Some(value) => {
                options.filter = Some(Expr::conjoin(options.filter.take(), Filter::eq(pk, value)));
            }
        }

        log::debug!("update {}", table_of(&options));

        let outcome = self
            .model
            .backend
            .update(Update::Set(record.clone()), &options)
            .await?;

        self.model.hooks.after_update(&record, &options).await?;

        Ok(outcome.modified())
    }

    /// Runs [`update`](Request::update) for each record concurrently and returns the sum of
    /// the modified counts.
    ///
    /// The request's accumulated options are captured once; every record's update resolves
    /// its own copy of them. Write order across records is unspecified. The first failing
    /// update fails the whole call, while updates that already completed stay applied.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidBulkInput`] without touching the backend unless
    /// `records` is an array of documents.
    pub async fn update_many(self, records: impl Into<Bson>) -> DocumentStoreResult<u64> {
        let records = update_batch(records.into()).inspect_err(|err| {
            log::warn!("rejected update_many on {}: {}", self.model.config.model, err)
        })?;

        let snapshot = self;
        let counts = try_join_all(
            records
                .into_iter()
                .map(|record| snapshot.clone().update(record)),
        )
        .await?;

        Ok(counts.into_iter().sum())
    }

    /// Removes every matching record and returns how many were removed.
    pub async fn delete(mut self) -> DocumentStoreResult<u64> {
        let options = self.resolve(Options::new());

        log::debug!("delete from {}", table_of(&options));

        let outcome = self.model.backend.delete(&options).await?;
        self.model.hooks.after_delete(&options).await?;

        Ok(outcome.deleted())
    }

    /// Returns every matching record, passed through `after_select`.
    pub async fn select(mut self) -> DocumentStoreResult<Vec<Record>> {
        let options = self.resolve(Options::new());

        log::debug!("select from {}", table_of(&options));

        let records = self.model.backend.select(&options).await?;
        self.model.hooks.after_select(records, &options).await
    }

    /// Returns the first matching record, or an empty record when nothing matched, passed
    /// through `after_find`. The limit is forced to one.
    pub async fn find(mut self) -> DocumentStoreResult<Record> {
        let options = self.resolve(Options::new().limit(1));

        log::debug!("find in {}", table_of(&options));

        let record = self
            .model
            .backend
            .select(&options)
            .await?
            .into_iter()
            .next()
            .unwrap_or_default();

        self.model.hooks.after_find(record, &options).await
    }

    /// [`select`](Request::select), decoded into `T`.
    pub async fn select_as<T: DeserializeOwned>(self) -> DocumentStoreResult<Vec<T>> {
        self.select()
            .await?
            .into_iter()
            .map(from_record)
            .collect()
    }

    /// [`find`](Request::find), decoded into `T`; `None` when nothing matched.
    pub async fn find_as<T: DeserializeOwned>(self) -> DocumentStoreResult<Option<T>> {
        let record = self.find().await?;

        if record.is_empty() {
            return Ok(None);
        }
        from_record(record).map(Some)
    }

    /// Counts matching records. With `field`, only records holding that field count;
    /// without it, any accumulated field selection is dropped.
    pub async fn count(mut self, field: Option<&str>) -> DocumentStoreResult<u64> {
        self.pending.fields = None;
        if let Some(call) = self.call.as_mut() {
            call.fields = None;
        }
        let overrides = match field {
            Some(field) => Options::new().fields([field]),
            None => Options::new(),
        };
        let options = self.resolve(overrides);

        self.model.backend.count(&options).await
    }

    /// Sums a numeric field over matching records.
    pub async fn sum(mut self, field: &str) -> DocumentStoreResult<f64> {
        let options = self.resolve(Options::new().fields([field]));

        self.model.backend.sum(&options).await
    }

    /// Atomically adds one to `field` on every matching record.
    pub async fn increment(self, field: &str) -> DocumentStoreResult<UpdateOutcome> {
        self.increment_by(field, 1).await
    }

    /// Atomically adds `step` to `field` on every matching record.
    ///
    /// Unlike [`update`](Request::update), the backend's report is returned as is.
    pub async fn increment_by(mut self, field: &str, step: i64) -> DocumentStoreResult<UpdateOutcome> {
        let options = self.resolve(Options::new());
        let mut delta = Document::new();
        delta.insert(field, step);

        self.model
            .backend
            .update(Update::Inc(delta), &options)
            .await
    }

    /// Atomically subtracts one from `field` on every matching record.
    pub async fn decrement(self, field: &str) -> DocumentStoreResult<UpdateOutcome> {
        self.increment_by(field, -1).await
    }

    /// Atomically subtracts `step` from `field` on every matching record.
    pub async fn decrement_by(self, field: &str, step: i64) -> DocumentStoreResult<UpdateOutcome> {
        self.increment_by(field, -step).await
    }
}

fn table_of(options: &Options) -> &str {
    options.table.as_deref().unwrap_or("<none>")
}
