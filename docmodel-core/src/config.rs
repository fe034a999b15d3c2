//! Per-model configuration: naming, primary key and default options.
//!
//! A [`ModelConfig`] can be built in code or deserialized from JSON:
//!
//! ```ignore
//! use docmodel::config::ModelConfig;
//!
//! let config = ModelConfig::from_json(r#"{ "model": "UserProfile", "table_prefix": "app_" }"#)?;
//! assert_eq!(config.table_name(), "app_user_profile");
//! ```

use serde::{Deserialize, Serialize};

use crate::{error::DocumentStoreResult, options::Options};

/// The primary key used when a config does not name one.
pub const DEFAULT_PRIMARY_KEY: &str = "_id";

fn default_primary_key() -> String {
    DEFAULT_PRIMARY_KEY.to_string()
}

/// Naming and defaults for one logical model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Logical model name, e.g. `UserProfile`.
    pub model: String,
    /// Prefix prepended to derived table names.
    #[serde(default)]
    pub table_prefix: String,
    /// Explicit table name. Used verbatim when set.
    #[serde(default)]
    pub table: Option<String>,
    /// Field holding the unique record identity.
    #[serde(default = "default_primary_key")]
    pub primary_key: String,
    /// Lowest-precedence options for every operation on this model.
    #[serde(skip)]
    pub defaults: Options,
}

impl ModelConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            table_prefix: String::new(),
            table: None,
            primary_key: default_primary_key(),
            defaults: Options::default(),
        }
    }

    pub fn builder(model: impl Into<String>) -> ModelConfigBuilder {
        ModelConfigBuilder { config: ModelConfig::new(model) }
    }

    /// Parses a config from JSON. Default options cannot be expressed in JSON and start empty.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Serialization`](crate::error::DocumentStoreError::Serialization)
    /// if the JSON is malformed or lacks `model`.
    pub fn from_json(json: &str) -> DocumentStoreResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// The table this model reads and writes when no table option overrides it.
    ///
    /// An explicit `table` wins; otherwise the name is the prefix followed by the
    /// snake-cased model name, lowercased.
    pub fn table_name(&self) -> String {
        match &self.table {
            Some(table) => table.clone(),
            None => format!("{}{}", self.table_prefix, snake_case(&self.model)).to_lowercase(),
        }
    }
}

fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);

    for (i, ch) in name.chars().enumerate() {
        if ch.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
    }

    out
}

/// Builder for [`ModelConfig`].
#[derive(Debug, Clone)]
pub struct ModelConfigBuilder {
    config: ModelConfig,
}

impl ModelConfigBuilder {
    pub fn table_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.table_prefix = prefix.into();
        self
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.config.table = Some(table.into());
        self
    }

    pub fn primary_key(mut self, primary_key: impl Into<String>) -> Self {
        self.config.primary_key = primary_key.into();
        self
    }

    pub fn default_options(mut self, defaults: Options) -> Self {
        self.config.defaults = defaults;
        self
    }

    pub fn build(self) -> ModelConfig {
        self.config
    }
}
