//! Convenient re-exports of commonly used types from docmodel.
//!
//! Import this prelude module to quickly access the most frequently used types
//! and traits without needing to import from multiple sub-modules:
//!
//! ```ignore
//! use docmodel::prelude::*;
//! ```
//!
//! This provides access to:
//! - Models, requests and their configuration
//! - Hooks and option resolution
//! - Filter construction and sorting
//! - Store backends and builders
//! - Records and error types

pub use docmodel_core::{
    model::{Model, Request},
    config::{ModelConfig, ModelConfigBuilder},
    hooks::{ModelHooks, NoHooks},
    options::{OptionResolver, Options},
    backend::{DeleteOutcome, StoreBackend, StoreBackendBuilder, Update, UpdateOutcome},
    query::{Expr, FieldOp, Filter, QueryVisitor, Sort, SortDirection},
    record::{Record, from_record, to_record},
    error::{DocumentStoreError, DocumentStoreResult},
};
