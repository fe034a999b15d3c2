//! A model-oriented data access layer for JSON document databases.
//!
//! This crate is the core of the docmodel project and provides:
//!
//! - **Models** ([`model`]) - The record lifecycle (add, update, delete, select, aggregates)
//!   over one table, issued through owned request builders
//! - **Options** ([`options`]) - Canonical operation options and the resolver that merges
//!   defaults, chained state, caller options and overrides
//! - **Hooks** ([`hooks`]) - Per-model before/after callbacks and record normalization
//! - **Records** ([`record`]) - Record helpers, bulk input validation, typed conversion
//! - **Configuration** ([`config`]) - Model naming, primary key and default options
//! - **Storage backend abstraction** ([`backend`]) - The driver trait backends implement
//! - **Filters** ([`query`]) - `where` clause expressions and sort specifications
//! - **Error handling** ([`error`]) - Error and result types
//!
//! # Example
//!
//! ```ignore
//! use docmodel::{prelude::*, memory::InMemoryStore};
//! use bson::doc;
//!
//! let posts = Model::new(InMemoryStore::new(), ModelConfig::builder("Post").table_prefix("blog_").build());
//!
//! posts.add(doc! { "title": "Hello", "views": 0 }).await?;
//! posts.filter(Filter::eq("title", "Hello")).increment("views").await?;
//! let total_views = posts.sum("views").await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmodel_core;

pub mod backend;
pub mod config;
pub mod error;
pub mod hooks;
pub mod model;
pub mod options;
pub mod query;
pub mod record;

#[cfg(test)]
mod testing;
