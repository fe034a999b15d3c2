//! In-memory storage backend for docmodel.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait.
//! It uses async-aware read-write locks for concurrent access and is ideal for development,
//! testing, and small-scale deployments.
//!
//! # Features
//!
//! - **Thread-safe access** - Every operation runs under one async-aware RwLock
//! - **Filter evaluation** - All `where` operators, dotted paths, sorting and pagination
//! - **Set and increment updates** - Matched and modified counts like a document database
//! - **Unique indexes** - Enforced on insert and update
//!
//! # Quick Start
//!
//! ```ignore
//! use docmodel::{prelude::*, memory::InMemoryStore};
//! use bson::doc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = InMemoryStore::builder().build().await?;
//!     let users = Model::new(backend, ModelConfig::new("User"));
//!
//!     users.add(doc! { "name": "Alice" }).await?;
//!     assert_eq!(users.count(None).await?, 1);
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmodel_memory;

mod evaluator;
pub mod store;

pub use store::{InMemoryStore, InMemoryStoreBuilder};
