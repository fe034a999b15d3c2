use async_trait::async_trait;
use bson::{Bson, Document, doc};
use futures::TryStreamExt;
use mongodb::{
    Client, Collection as MongoCollection, IndexModel,
    options::{ClientOptions, FindOptions, IndexOptions},
};
use docmodel_core::{
    backend::{DeleteOutcome, StoreBackend, StoreBackendBuilder, Update, UpdateOutcome},
    error::{DocumentStoreError, DocumentStoreResult},
    options::Options,
    query::SortDirection,
    record::Record,
};

use crate::query::MongoQueryTranslator;

fn backend_error(err: mongodb::error::Error) -> DocumentStoreError {
    DocumentStoreError::Backend(err.to_string())
}

fn driver_limit(limit: usize) -> DocumentStoreResult<i64> {
    i64::try_from(limit)
        .map_err(|_| DocumentStoreError::InvalidOptions(format!("limit {} is out of range", limit)))
}

fn find_options(options: &Options) -> DocumentStoreResult<FindOptions> {
    let mut find = FindOptions::default();

    if let Some(limit) = options.limit {
        find.limit = Some(driver_limit(limit)?);
    }
    if let Some(skip) = options.offset {
        find.skip = Some(u64::try_from(skip).map_err(|_| {
            DocumentStoreError::InvalidOptions(format!("offset {} is out of range", skip))
        })?);
    }
    if let Some(sort) = &options.sort {
        find.sort = Some(doc! {
            sort.field.clone(): match sort.direction {
                SortDirection::Asc => 1,
                SortDirection::Desc => -1,
            }
        })
    }
    if let Some(fields) = &options.fields {
        find.projection = Some(Document::from_iter(
            fields.iter().map(|field| (field.clone(), Bson::Int32(1))),
        ));
    }

    Ok(find)
}

#[derive(Debug)]
pub struct MongoDbStore {
    client: Client,
    database: String,
}

impl MongoDbStore {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    pub fn builder(dsn: &str, database: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(dsn, database)
    }

    fn get_collection(&self, table: &str) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection(table)
    }

    /// The filter to run a write against. MongoDB writes take no limit, so a limited write
    /// is narrowed to the identifiers of the first matching documents.
    async fn write_filter(&self, options: &Options) -> DocumentStoreResult<Document> {
        let filter = MongoQueryTranslator::translate(options.filter.as_ref())?;

        let Some(limit) = options.limit else {
            return Ok(filter);
        };

        let mut find = FindOptions::default();
        find.limit = Some(driver_limit(limit)?);
        find.projection = Some(doc! { "_id": 1 });

        let ids = self
            .get_collection(options.table_name()?)
            .find(filter)
            .with_options(find)
            .await
            .map_err(backend_error)?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(backend_error)?
            .into_iter()
            .filter_map(|mut document| document.remove("_id"))
            .collect::<Vec<_>>();

        Ok(doc! { "_id": { "$in": ids } })
    }
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn insert_one(&self, record: Record, options: &Options) -> DocumentStoreResult<Bson> {
        Ok(self
            .get_collection(options.table_name()?)
            .insert_one(record)
            .await
            .map_err(backend_error)?
            .inserted_id)
    }

    async fn insert_many(
        &self,
        records: Vec<Record>,
        options: &Options,
    ) -> DocumentStoreResult<Vec<Bson>> {
        let count = records.len();
        let mut inserted = self
            .get_collection(options.table_name()?)
            .insert_many(records)
            .await
            .map_err(backend_error)?
            .inserted_ids;

        (0..count)
            .map(|index| {
                inserted.remove(&index).ok_or_else(|| {
                    DocumentStoreError::Backend(format!("no identifier returned for record {}", index))
                })
            })
            .collect()
    }

    async fn update(&self, update: Update, options: &Options) -> DocumentStoreResult<UpdateOutcome> {
        if update.document().is_empty() {
            return Ok(UpdateOutcome { matched: None, modified: Some(0) });
        }

        let change = match update {
            Update::Set(fields) => doc! { "$set": fields },
            Update::Inc(deltas) => doc! { "$inc": deltas },
        };

        let result = self
            .get_collection(options.table_name()?)
            .update_many(self.write_filter(options).await?, change)
            .await
            .map_err(backend_error)?;

        log::debug!(
            "updated {}/{} document(s) in {}",
            result.modified_count,
            result.matched_count,
            options.table_name()?
        );

        Ok(UpdateOutcome {
            matched: Some(result.matched_count),
            modified: Some(result.modified_count),
        })
    }

    async fn delete(&self, options: &Options) -> DocumentStoreResult<DeleteOutcome> {
        let result = self
            .get_collection(options.table_name()?)
            .delete_many(self.write_filter(options).await?)
            .await
            .map_err(backend_error)?;

        Ok(DeleteOutcome { deleted: Some(result.deleted_count) })
    }

    async fn select(&self, options: &Options) -> DocumentStoreResult<Vec<Record>> {
        self.get_collection(options.table_name()?)
            .find(MongoQueryTranslator::translate(options.filter.as_ref())?)
            .with_options(find_options(options)?)
            .await
            .map_err(backend_error)?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(backend_error)
    }

    async fn count(&self, options: &Options) -> DocumentStoreResult<u64> {
        let mut filter = MongoQueryTranslator::translate(options.filter.as_ref())?;
        if let Some(field) = options.first_field() {
            filter = doc! { "$and": [filter, { field: { "$exists": true } }] };
        }

        self.get_collection(options.table_name()?)
            .count_documents(filter)
            .await
            .map_err(backend_error)
    }

    async fn sum(&self, options: &Options) -> DocumentStoreResult<f64> {
        let field = options
            .first_field()
            .ok_or_else(|| DocumentStoreError::InvalidOptions("sum requires a field".into()))?;

        let pipeline = vec![
            doc! { "$match": MongoQueryTranslator::translate(options.filter.as_ref())? },
            doc! { "$group": { "_id": Bson::Null, "total": { "$sum": format!("${}", field) } } },
        ];

        let groups = self.aggregate(options.table_name()?, pipeline).await?;

        Ok(match groups.first().and_then(|group| group.get("total")) {
            Some(Bson::Int32(total)) => *total as f64,
            Some(Bson::Int64(total)) => *total as f64,
            Some(Bson::Double(total)) => *total,
            _ => 0.0,
        })
    }

    async fn aggregate(
        &self,
        table: &str,
        pipeline: Vec<Document>,
    ) -> DocumentStoreResult<Vec<Document>> {
        self.get_collection(table)
            .aggregate(pipeline)
            .await
            .map_err(backend_error)?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(backend_error)
    }

    async fn create_index(&self, table: &str, keys: Document, unique: bool) -> DocumentStoreResult<()> {
        self.get_collection(table)
            .create_index(
                IndexModel::builder()
                .keys(keys)
                .options(
                    IndexOptions::builder()
                    .unique(unique)
                    .build()
                )
                .build()
            )
            .await
            .map_err(backend_error)?;

        Ok(())
    }

    async fn shutdown(self) -> DocumentStoreResult<()> {
        self.client.shutdown().await;

        Ok(())
    }
}

pub struct MongoDbStoreBuilder {
    dsn: String,
    database: String,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
        }
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        Ok(MongoDbStore::new(
            Client::with_options(
                ClientOptions::parse(&self.dsn)
                    .await
                    .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?,
            )
            .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?,
            self.database,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docmodel_core::query::Sort;

    #[test]
    fn test_find_options_from_options() {
        let find = find_options(
            &Options::new()
                .limit(5)
                .offset(10)
                .sort(Sort::desc("created_at"))
                .fields(["name", "email"]),
        )
        .unwrap();

        assert_eq!(find.limit, Some(5));
        assert_eq!(find.skip, Some(10));
        assert_eq!(find.sort, Some(doc! { "created_at": -1 }));
        assert_eq!(find.projection, Some(doc! { "name": 1, "email": 1 }));
    }

    #[test]
    fn test_find_options_default_is_unbounded() {
        let find = find_options(&Options::new()).unwrap();

        assert_eq!(find.limit, None);
        assert_eq!(find.projection, None);
    }

    #[test]
    fn test_find_options_rejects_out_of_range_limit() {
        let result = find_options(&Options::new().limit(usize::MAX));

        assert!(matches!(result, Err(DocumentStoreError::InvalidOptions(_))));
    }
}
