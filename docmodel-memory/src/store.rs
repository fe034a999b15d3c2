//! In-memory storage implementation.
//!
//! Tables are ordered vectors of records guarded by one async-aware read-write lock, so
//! every operation is atomic with respect to every other one.

use async_trait::async_trait;
use bson::{Bson, Document, oid::ObjectId};
use mea::rwlock::RwLock;
use std::{collections::HashMap, sync::Arc};

use docmodel_core::{
    backend::{DeleteOutcome, StoreBackend, StoreBackendBuilder, Update, UpdateOutcome},
    error::{DocumentStoreError, DocumentStoreResult},
    options::Options,
    query::SortDirection,
    record::Record,
};

use crate::evaluator::{RecordEvaluator, compare, lookup, numeric};

type Table = Vec<Record>;

#[derive(Debug, Default)]
struct StoreState {
    tables: HashMap<String, Table>,
    /// table -> unique index key sets
    unique_indexes: HashMap<String, Vec<Vec<String>>>,
}

/// Thread-safe in-memory document storage backend.
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state; clones share the
/// same data. Queries scan the whole table. Unique indexes are enforced on insert and
/// update; non-unique indexes are accepted and ignored. Aggregation pipelines are not
/// supported.
///
/// # Example
///
/// ```ignore
/// use docmodel_memory::InMemoryStore;
/// use docmodel::{backend::StoreBackend, options::Options};
/// use bson::doc;
///
/// let store = InMemoryStore::new();
/// let options = Options::new().table("users");
///
/// let id = store.insert_one(doc! { "name": "Alice" }, &options).await?;
/// assert_eq!(store.count(&options).await?, 1);
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    state: Arc<RwLock<StoreState>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(StoreState::default())),
        }
    }

    /// Creates a builder for constructing an `InMemoryStore`.
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    /// Names of the tables holding at least one record or index.
    pub async fn tables(&self) -> Vec<String> {
        let state = self.state.read().await;
        let mut names = state
            .tables
            .keys()
            .chain(state.unique_indexes.keys())
            .cloned()
            .collect::<Vec<_>>();
        names.sort();
        names.dedup();
        names
    }
}

fn id_key(id: &Bson) -> String {
    match id {
        Bson::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Indices of the records matching `options.filter`, bounded by `options.limit`.
fn matching(table: &Table, options: &Options) -> DocumentStoreResult<Vec<usize>> {
    let mut indices = Vec::new();

    for (index, record) in table.iter().enumerate() {
        if options.limit.is_some_and(|limit| indices.len() >= limit) {
            break;
        }
        if RecordEvaluator::matches(record, options.filter.as_ref())? {
            indices.push(index);
        }
    }

    Ok(indices)
}

fn project(record: &Record, fields: Option<&Vec<String>>) -> Record {
    let Some(fields) = fields else {
        return record.clone();
    };

    let mut projected = Document::new();
    if let Some(id) = record.get("_id") {
        projected.insert("_id", id.clone());
    }
    for field in fields {
        if let Some(value) = lookup(record, field) {
            projected.insert(field.clone(), value.clone());
        }
    }
    projected
}

/// Writes `value` at a dotted path, creating intermediate documents.
fn set_path(record: &mut Document, path: &str, value: Bson) -> DocumentStoreResult<()> {
    match path.split_once('.') {
        None => {
            record.insert(path, value);
            Ok(())
        }
        Some((head, rest)) => {
            if !record.contains_key(head) {
                record.insert(head, Document::new());
            }
            match record.get_mut(head) {
                Some(Bson::Document(inner)) => set_path(inner, rest, value),
                _ => Err(DocumentStoreError::Backend(format!(
                    "cannot set {}: {} is not a document",
                    path, head
                ))),
            }
        }
    }
}

fn add_delta(current: Option<&Bson>, delta: &Bson, field: &str) -> DocumentStoreResult<Bson> {
    let non_numeric = || DocumentStoreError::Backend(format!("cannot increment non-numeric field {}", field));
    let add_i64 = |a: i64, b: i64| {
        a.checked_add(b).map(Bson::Int64).ok_or_else(|| {
            DocumentStoreError::Backend(format!("incrementing {} overflows a 64-bit integer", field))
        })
    };

    match (current, delta) {
        (None, delta) if numeric(delta).is_some() => Ok(delta.clone()),
        // Widens to Int64 instead of overflowing
        (Some(Bson::Int32(a)), Bson::Int32(b)) => match a.checked_add(*b) {
            Some(sum) => Ok(Bson::Int32(sum)),
            None => add_i64(i64::from(*a), i64::from(*b)),
        },
        (Some(Bson::Int32(a)), Bson::Int64(b)) => add_i64(i64::from(*a), *b),
        (Some(Bson::Int64(a)), Bson::Int32(b)) => add_i64(*a, i64::from(*b)),
        (Some(Bson::Int64(a)), Bson::Int64(b)) => add_i64(*a, *b),
        (Some(current), delta) => match (numeric(current), numeric(delta)) {
            (Some(a), Some(b)) => Ok(Bson::Double(a + b)),
            _ => Err(non_numeric()),
        },
        _ => Err(non_numeric()),
    }
}

fn apply(record: &Record, update: &Update) -> DocumentStoreResult<Record> {
    let mut updated = record.clone();

    match update {
        Update::Set(fields) => {
            for (path, value) in fields {
                set_path(&mut updated, path, value.clone())?;
            }
        }
        Update::Inc(deltas) => {
            for (path, delta) in deltas {
                let next = add_delta(lookup(&updated, path), delta, path)?;
                set_path(&mut updated, path, next)?;
            }
        }
    }

    Ok(updated)
}

fn check_unique(state: &StoreState, table: &str, candidate: &Table) -> DocumentStoreResult<()> {
    let Some(indexes) = state.unique_indexes.get(table) else {
        return Ok(());
    };

    for keys in indexes {
        let mut seen = Vec::<Vec<Option<&Bson>>>::new();

        for record in candidate {
            let tuple = keys
                .iter()
                .map(|key| lookup(record, key))
                .collect::<Vec<_>>();

            if seen.contains(&tuple) {
                return Err(DocumentStoreError::DocumentAlreadyExists(
                    format!("{}={:?}", keys.join(","), tuple),
                    table.to_string(),
                ));
            }
            seen.push(tuple);
        }
    }

    Ok(())
}

fn prepare_insert(existing: &Table, mut record: Record, table: &str) -> DocumentStoreResult<(Bson, Record)> {
    let id = match record.get("_id") {
        Some(id) => id.clone(),
        None => {
            let id = Bson::ObjectId(ObjectId::new());
            record.insert("_id", id.clone());
            id
        }
    };

    if existing.iter().any(|r| r.get("_id") == Some(&id)) {
        return Err(DocumentStoreError::DocumentAlreadyExists(id_key(&id), table.to_string()));
    }

    Ok((id, record))
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn insert_one(&self, record: Record, options: &Options) -> DocumentStoreResult<Bson> {
        self.insert_many(vec![record], options)
            .await?
            .pop()
            .ok_or_else(|| DocumentStoreError::Backend("insert reported no identifier".into()))
    }

    async fn insert_many(
        &self,
        records: Vec<Record>,
        options: &Options,
    ) -> DocumentStoreResult<Vec<Bson>> {
        let table = options.table_name()?;
        if records.is_empty() {
            return Err(DocumentStoreError::InvalidDocument("no records to insert".into()));
        }

        let mut state = self.state.write().await;
        let mut candidate = state.tables.get(table).cloned().unwrap_or_default();
        let mut ids = Vec::with_capacity(records.len());

        for record in records {
            let (id, record) = prepare_insert(&candidate, record, table)?;
            candidate.push(record);
            ids.push(id);
        }

        check_unique(&state, table, &candidate)?;
        state.tables.insert(table.to_string(), candidate);

        log::debug!("inserted {} record(s) into {}", ids.len(), table);

        Ok(ids)
    }

    async fn update(&self, update: Update, options: &Options) -> DocumentStoreResult<UpdateOutcome> {
        let table = options.table_name()?;
        let mut state = self.state.write().await;

        let Some(existing) = state.tables.get(table) else {
            return Ok(UpdateOutcome { matched: Some(0), modified: Some(0) });
        };

        let indices = matching(existing, options)?;
        let mut candidate = existing.clone();
        let mut modified = 0;

        for &index in &indices {
            let updated = apply(&candidate[index], &update)?;
            if updated != candidate[index] {
                candidate[index] = updated;
                modified += 1;
            }
        }

        check_unique(&state, table, &candidate)?;
        state.tables.insert(table.to_string(), candidate);

        log::debug!("updated {}/{} record(s) in {}", modified, indices.len(), table);

        Ok(UpdateOutcome {
            matched: Some(indices.len() as u64),
            modified: Some(modified),
        })
    }

    async fn delete(&self, options: &Options) -> DocumentStoreResult<DeleteOutcome> {
        let table = options.table_name()?;
        let mut state = self.state.write().await;

        let Some(existing) = state.tables.get_mut(table) else {
            return Ok(DeleteOutcome { deleted: Some(0) });
        };

        let indices = matching(existing, options)?;
        for &index in indices.iter().rev() {
            existing.remove(index);
        }

        log::debug!("deleted {} record(s) from {}", indices.len(), table);

        Ok(DeleteOutcome { deleted: Some(indices.len() as u64) })
    }

    async fn select(&self, options: &Options) -> DocumentStoreResult<Vec<Record>> {
        let table = options.table_name()?;
        let state = self.state.read().await;

        let Some(existing) = state.tables.get(table) else {
            return Ok(vec![]);
        };

        let mut records = Vec::new();
        for record in existing {
            if RecordEvaluator::matches(record, options.filter.as_ref())? {
                records.push(record);
            }
        }

        if let Some(sort) = &options.sort {
            records.sort_by(|a, b| {
                let ordering = compare(lookup(a, &sort.field), lookup(b, &sort.field));
                match sort.direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                }
            });
        }

        Ok(records
            .into_iter()
            .skip(options.offset.unwrap_or(0))
            .take(options.limit.unwrap_or(usize::MAX))
            .map(|record| project(record, options.fields.as_ref()))
            .collect())
    }

    async fn count(&self, options: &Options) -> DocumentStoreResult<u64> {
        let table = options.table_name()?;
        let state = self.state.read().await;

        let Some(existing) = state.tables.get(table) else {
            return Ok(0);
        };

        let mut count = 0;
        for record in existing {
            let has_field = options
                .first_field()
                .is_none_or(|field| lookup(record, field).is_some());

            if has_field && RecordEvaluator::matches(record, options.filter.as_ref())? {
                count += 1;
            }
        }

        Ok(count)
    }

    async fn sum(&self, options: &Options) -> DocumentStoreResult<f64> {
        let table = options.table_name()?;
        let field = options
            .first_field()
            .ok_or_else(|| DocumentStoreError::InvalidOptions("sum requires a field".into()))?;
        let state = self.state.read().await;

        let Some(existing) = state.tables.get(table) else {
            return Ok(0.0);
        };

        let mut total = 0.0;
        for record in existing {
            if RecordEvaluator::matches(record, options.filter.as_ref())? {
                total += lookup(record, field).and_then(numeric).unwrap_or(0.0);
            }
        }

        Ok(total)
    }

    async fn aggregate(
        &self,
        _table: &str,
        _pipeline: Vec<Document>,
    ) -> DocumentStoreResult<Vec<Document>> {
        Err(DocumentStoreError::Backend(
            "aggregation pipelines are not supported by the in-memory store".into(),
        ))
    }

    async fn create_index(&self, table: &str, keys: Document, unique: bool) -> DocumentStoreResult<()> {
        if !unique {
            // Scans only, nothing to build
            return Ok(());
        }

        let keys = keys.keys().cloned().collect::<Vec<_>>();
        let mut state = self.state.write().await;

        let indexes = state.unique_indexes.entry(table.to_string()).or_default();
        if !indexes.contains(&keys) {
            indexes.push(keys);
        }

        let existing = state.tables.get(table).cloned().unwrap_or_default();
        if let Err(err) = check_unique(&state, table, &existing) {
            if let Some(indexes) = state.unique_indexes.get_mut(table) {
                indexes.pop();
            }
            return Err(err);
        }

        Ok(())
    }
}

/// Builder for constructing [`InMemoryStore`] instances.
#[derive(Default)]
pub struct InMemoryStoreBuilder;

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        Ok(InMemoryStore::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use docmodel_core::query::{Filter, Sort};

    fn users() -> Options {
        Options::new().table("users")
    }

    async fn seeded() -> InMemoryStore {
        let store = InMemoryStore::builder().build().await.unwrap();
        store
            .insert_many(
                vec![
                    doc! { "_id": 1, "name": "Alice", "age": 30, "score": 1.5 },
                    doc! { "_id": 2, "name": "Bob", "age": 17 },
                    doc! { "_id": 3, "name": "Carol", "age": 45, "score": 2 },
                ],
                &users(),
            )
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_insert_assigns_object_id() {
        let store = InMemoryStore::new();

        let id = store.insert_one(doc! { "name": "a" }, &users()).await.unwrap();

        assert!(matches!(id, Bson::ObjectId(_)));
        let records = store.select(&users()).await.unwrap();
        assert_eq!(records[0].get("_id"), Some(&id));
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_id_atomically() {
        let store = seeded().await;

        let result = store
            .insert_many(vec![doc! { "_id": 9 }, doc! { "_id": 1 }], &users())
            .await;

        assert!(matches!(result, Err(DocumentStoreError::DocumentAlreadyExists(_, _))));
        assert_eq!(store.count(&users()).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_insert_requires_table() {
        let store = InMemoryStore::new();

        let result = store.insert_one(doc! { "a": 1 }, &Options::new()).await;

        assert!(matches!(result, Err(DocumentStoreError::InvalidOptions(_))));
    }

    #[tokio::test]
    async fn test_select_filter_sort_page_project() {
        let store = seeded().await;

        let records = store
            .select(
                &users()
                    .filter(Filter::gte("age", 18))
                    .sort(Sort::desc("age"))
                    .limit(1)
                    .fields(["name"]),
            )
            .await
            .unwrap();

        assert_eq!(records, vec![doc! { "_id": 3, "name": "Carol" }]);

        let records = store
            .select(&users().sort(Sort::asc("name")).offset(1))
            .await
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get_str("name").unwrap(), "Bob");
    }

    #[tokio::test]
    async fn test_update_counts_only_changed_records() {
        let store = seeded().await;

        let outcome = store
            .update(Update::Set(doc! { "name": "Alice" }), &users().filter(Filter::lte("_id", 2)))
            .await
            .unwrap();

        assert_eq!(outcome, UpdateOutcome { matched: Some(2), modified: Some(1) });
    }

    #[tokio::test]
    async fn test_update_respects_limit() {
        let store = seeded().await;

        let outcome = store
            .update(Update::Set(doc! { "flag": true }), &users().limit(2))
            .await
            .unwrap();

        assert_eq!(outcome.modified(), 2);
        assert_eq!(store.count(&users().filter(Filter::exists("flag"))).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_increment_fields() {
        let store = seeded().await;

        store
            .update(Update::Inc(doc! { "age": 1_i64, "visits": 2_i64 }), &users().filter(Filter::eq("_id", 1)))
            .await
            .unwrap();
        store
            .update(Update::Inc(doc! { "score": 1_i64 }), &users().filter(Filter::eq("_id", 1)))
            .await
            .unwrap();

        let record = &store.select(&users().filter(Filter::eq("_id", 1))).await.unwrap()[0];
        assert_eq!(record.get("age"), Some(&Bson::Int64(31)));
        assert_eq!(record.get("visits"), Some(&Bson::Int64(2)));
        assert_eq!(record.get("score"), Some(&Bson::Double(2.5)));

        let result = store
            .update(Update::Inc(doc! { "name": 1 }), &users())
            .await;
        assert!(matches!(result, Err(DocumentStoreError::Backend(_))));
    }

    #[tokio::test]
    async fn test_increment_overflow_is_rejected() {
        let store = InMemoryStore::new();
        store
            .insert_many(
                vec![doc! { "_id": 1, "n": i64::MAX }, doc! { "_id": 2, "n": i32::MAX }],
                &users(),
            )
            .await
            .unwrap();

        let result = store
            .update(Update::Inc(doc! { "n": 1_i64 }), &users().filter(Filter::eq("_id", 1)))
            .await;
        assert!(matches!(result, Err(DocumentStoreError::Backend(_))));

        let result = store
            .update(Update::Inc(doc! { "n": -1_i64 }), &users().filter(Filter::eq("_id", 1)))
            .await;
        assert!(result.is_ok());

        store
            .update(Update::Inc(doc! { "n": 1_i32 }), &users().filter(Filter::eq("_id", 2)))
            .await
            .unwrap();

        let records = store.select(&users().sort(Sort::asc("_id"))).await.unwrap();
        assert_eq!(records[0].get("n"), Some(&Bson::Int64(i64::MAX - 1)));
        assert_eq!(records[1].get("n"), Some(&Bson::Int64(i32::MAX as i64 + 1)));
    }

    #[tokio::test]
    async fn test_delete_and_missing_table() {
        let store = seeded().await;

        let outcome = store.delete(&users().filter(Filter::lt("age", 18))).await.unwrap();
        assert_eq!(outcome.deleted(), 1);

        let outcome = store.delete(&Options::new().table("nothing")).await.unwrap();
        assert_eq!(outcome.deleted(), 0);
        assert!(store.select(&Options::new().table("nothing")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_count_and_sum() {
        let store = seeded().await;

        assert_eq!(store.count(&users()).await.unwrap(), 3);
        assert_eq!(store.count(&users().fields(["score"])).await.unwrap(), 2);
        assert_eq!(store.sum(&users().fields(["score"])).await.unwrap(), 3.5);
        assert_eq!(store.sum(&users().fields(["age"]).filter(Filter::gt("age", 20))).await.unwrap(), 75.0);
        assert!(matches!(store.sum(&users()).await, Err(DocumentStoreError::InvalidOptions(_))));
    }

    #[tokio::test]
    async fn test_unique_index_enforced() {
        let store = seeded().await;

        store.create_index("users", doc! { "name": 1 }, true).await.unwrap();

        let result = store.insert_one(doc! { "name": "Bob" }, &users()).await;
        assert!(matches!(result, Err(DocumentStoreError::DocumentAlreadyExists(_, _))));

        let result = store
            .update(Update::Set(doc! { "name": "Alice" }), &users().filter(Filter::eq("_id", 2)))
            .await;
        assert!(result.is_err());
        assert_eq!(store.count(&users().filter(Filter::eq("name", "Alice"))).await.unwrap(), 1);

        assert!(store.create_index("users", doc! { "age": 1 }, false).await.is_ok());
    }

    #[tokio::test]
    async fn test_unique_index_rejected_on_existing_duplicates() {
        let store = seeded().await;
        store.insert_one(doc! { "name": "Dup", "age": 30 }, &users()).await.unwrap();

        let result = store.create_index("users", doc! { "age": 1 }, true).await;

        assert!(result.is_err());
        assert!(store.insert_one(doc! { "name": "Eve", "age": 30 }, &users()).await.is_ok());
    }

    #[tokio::test]
    async fn test_aggregate_unsupported() {
        let store = InMemoryStore::new();

        assert!(store.aggregate("users", vec![]).await.is_err());
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let store = InMemoryStore::new();
        let clone = store.clone();

        clone.insert_one(doc! { "a": 1 }, &users()).await.unwrap();

        assert_eq!(store.tables().await, vec!["users".to_string()]);
    }
}
