//! Main docmodel crate providing a model-oriented interface to document databases.
//!
//! This crate is the primary entry point for users of the docmodel framework.
//! It re-exports the core types and functionality from the sub-crates and provides
//! convenient access to the storage backends.
//!
//! # Features
//!
//! - **Models** - One table per model, with derived or explicit table names
//! - **Chained requests** - Filters, field selection, paging and sorting accumulate on an
//!   owned request consumed by one operation
//! - **Lifecycle hooks** - Before/after callbacks and record normalization per model
//! - **Bulk operations** - Validated bulk inserts and concurrent bulk updates
//! - **Multiple backends** - In-memory and MongoDB storage behind one driver trait
//!
//! # Quick Start
//!
//! ```ignore
//! use docmodel::{prelude::*, memory::InMemoryStore};
//! use bson::doc;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! pub struct User {
//!     pub name: String,
//!     pub age: i32,
//! }
//!
//! #[tokio::main]
//! async fn main() -> DocumentStoreResult<()> {
//!     let users = Model::new(
//!         InMemoryStore::builder().build().await?,
//!         ModelConfig::builder("User").table_prefix("app_").build(),
//!     );
//!
//!     users.add(to_record(&User { name: "Alice".into(), age: 30 })?).await?;
//!     users.add_many(vec![doc! { "name": "Bob", "age": 17 }, doc! { "name": "Carol", "age": 45 }]).await?;
//!
//!     let adults: Vec<User> = users
//!         .filter(Filter::gte("age", 18))
//!         .sort(Sort::asc("name"))
//!         .select_as()
//!         .await?;
//!
//!     users.filter(Filter::eq("name", "Bob")).increment("age").await?;
//!     println!("{} adults, {} total years", adults.len(), users.sum("age").await?);
//!
//!     users.shutdown().await
//! }
//! ```
//!
//! # Hooks
//!
//! Implement [`ModelHooks`](hooks::ModelHooks) and build the model with
//! [`Model::with_hooks`](model::Model::with_hooks):
//!
//! ```ignore
//! use docmodel::{async_trait, prelude::*};
//!
//! struct Tenant(&'static str);
//!
//! #[async_trait]
//! impl ModelHooks for Tenant {
//!     async fn before_add(&self, mut record: Record, _options: &Options) -> DocumentStoreResult<Record> {
//!         record.insert("tenant", self.0);
//!         Ok(record)
//!     }
//!
//!     fn filter_options(&self, mut options: Options) -> Options {
//!         options.filter = Some(Expr::conjoin(options.filter.take(), Filter::eq("tenant", self.0)));
//!         options
//!     }
//! }
//! ```
//!
//! # Backends
//!
//! - [`memory`] - Fast in-memory storage for development and testing
//! - [`mongodb`] - Persistent MongoDB backend (requires `mongodb` feature)

pub mod prelude;

pub use docmodel_core::{backend, config, error, hooks, model, options, query, record};

// Re-export for hook implementations and BSON construction
pub use async_trait::async_trait;
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use docmodel_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docmodel_mongodb::{MongoDbStore, MongoDbStoreBuilder};
}
