//! Canonical operation options and the resolver that assembles them.
//!
//! Every backend call receives exactly one [`Options`] value. It is assembled by the
//! [`OptionResolver`] from up to four sources, merged left to right with later sources
//! winning on key collision:
//!
//! 1. the model's default options ([`ModelConfig::defaults`])
//! 2. state accumulated on the request by chained calls (`filter`, `limit`, `field`, ...)
//! 3. the options object passed by the caller, if any
//! 4. overrides imposed by the operation itself (e.g. `find` forces `limit = 1`)
//!
//! After merging, the table name is filled in when no source provided one, `table_prefix`
//! and `model` are stamped from the model config, and the result is passed through the
//! model's [`ModelHooks::filter_options`] hook.

use bson::{Bson, Document};

use crate::{
    config::ModelConfig,
    error::{DocumentStoreError, DocumentStoreResult},
    hooks::ModelHooks,
    query::{Expr, Sort},
};

/// The resolved set of parameters controlling one storage operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Options {
    /// Target table (collection) name.
    pub table: Option<String>,
    /// Table prefix of the owning model. Always set by the resolver.
    pub table_prefix: Option<String>,
    /// Logical model name. Always set by the resolver.
    pub model: Option<String>,
    /// The `where` clause.
    pub filter: Option<Expr>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub sort: Option<Sort>,
    /// Field selection; `None` selects every field.
    pub fields: Option<Vec<String>>,
    /// Caller-defined options, readable by hooks and backends.
    pub extra: Document,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn filter(mut self, filter: Expr) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn sort(mut self, sort: Sort) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Sets a caller-defined option.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Reads a caller-defined option.
    pub fn get(&self, key: &str) -> Option<&Bson> {
        self.extra.get(key)
    }

    /// Merges `other` on top of `self`. Every key present in `other` wins.
    pub fn merge(mut self, other: Options) -> Options {
        macro_rules! take_present {
            ($($field:ident),*) => {
                $(if other.$field.is_some() { self.$field = other.$field; })*
            };
        }

        take_present!(table, table_prefix, model, filter, limit, offset, sort, fields);

        for (key, value) in other.extra {
            self.extra.insert(key, value);
        }

        self
    }

    /// Returns `true` when no option is set.
    pub fn is_empty(&self) -> bool {
        *self == Options::default()
    }

    /// The table name, required by every backend operation.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidOptions`] if no table was resolved.
    pub fn table_name(&self) -> DocumentStoreResult<&str> {
        self.table
            .as_deref()
            .ok_or_else(|| DocumentStoreError::InvalidOptions("no table resolved".into()))
    }

    /// The first selected field, used by single-field aggregates such as `sum`.
    pub fn first_field(&self) -> Option<&str> {
        self.fields
            .as_ref()
            .and_then(|fields| fields.first())
            .map(String::as_str)
    }
}

/// Assembles canonical [`Options`] for one model.
pub struct OptionResolver<'a, H: ModelHooks> {
    config: &'a ModelConfig,
    hooks: &'a H,
}

impl<'a, H: ModelHooks> OptionResolver<'a, H> {
    pub fn new(config: &'a ModelConfig, hooks: &'a H) -> Self {
        Self { config, hooks }
    }

    /// Resolves the options for one operation.
    ///
    /// `accumulated` is consumed; callers hand over their pending state by value so that
    /// nothing of it survives the call. This operation cannot fail.
    pub fn resolve(
        &self,
        accumulated: Options,
        call: Option<Options>,
        overrides: Options,
    ) -> Options {
        let mut options = self
            .config
            .defaults
            .clone()
            .merge(accumulated)
            .merge(call.unwrap_or_default())
            .merge(overrides);

        if options.table.is_none() {
            options.table = Some(self.config.table_name());
        }

        options.table_prefix = Some(self.config.table_prefix.clone());
        options.model = Some(self.config.model.clone());

        self.hooks.filter_options(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{hooks::NoHooks, query::Filter};

    fn config() -> ModelConfig {
        ModelConfig::builder("UserProfile")
            .table_prefix("app_")
            .default_options(Options::new().limit(50).set("tenant", "acme"))
            .build()
    }

    #[test]
    fn test_merge_later_source_wins() {
        let merged = Options::new()
            .limit(10)
            .offset(5)
            .set("a", 1)
            .merge(Options::new().limit(20).set("a", 2).set("b", 3));

        assert_eq!(merged.limit, Some(20));
        assert_eq!(merged.offset, Some(5));
        assert_eq!(merged.get("a"), Some(&Bson::Int32(2)));
        assert_eq!(merged.get("b"), Some(&Bson::Int32(3)));
    }

    #[test]
    fn test_resolve_precedence() {
        let config = config();
        let resolver = OptionResolver::new(&config, &NoHooks);

        let options = resolver.resolve(
            Options::new().limit(5).offset(1),
            Some(Options::new().limit(7).set("tenant", "globex")),
            Options::new().limit(1),
        );

        assert_eq!(options.limit, Some(1));
        assert_eq!(options.offset, Some(1));
        assert_eq!(options.get("tenant"), Some(&Bson::String("globex".into())));
    }

    #[test]
    fn test_resolve_overrides_always_win() {
        let config = config();
        let resolver = OptionResolver::new(&config, &NoHooks);
        let overrides = Options::new()
            .table("audit")
            .filter(Filter::eq("x", 1))
            .set("tenant", "override");

        for call in [None, Some(Options::new().table("other").filter(Filter::eq("x", 2)))] {
            let options = resolver.resolve(
                Options::new().table("pending").set("tenant", "pending"),
                call,
                overrides.clone(),
            );

            assert_eq!(options.table.as_deref(), Some("audit"));
            assert_eq!(options.filter, Some(Filter::eq("x", 1)));
            assert_eq!(options.get("tenant"), Some(&Bson::String("override".into())));
        }
    }

    #[test]
    fn test_resolve_derives_table_and_stamps_model() {
        let config = config();
        let resolver = OptionResolver::new(&config, &NoHooks);

        let mut call = Options::new();
        call.table_prefix = Some("evil_".into());
        call.model = Some("Other".into());

        let options = resolver.resolve(Options::new(), Some(call), Options::new());

        assert_eq!(options.table.as_deref(), Some("app_user_profile"));
        assert_eq!(options.table_prefix.as_deref(), Some("app_"));
        assert_eq!(options.model.as_deref(), Some("UserProfile"));
        assert_eq!(options.limit, Some(50));
    }

    #[test]
    fn test_resolve_keeps_explicit_table() {
        let config = config();
        let resolver = OptionResolver::new(&config, &NoHooks);

        let options = resolver.resolve(
            Options::new(),
            Some(Options::new().table("legacy_users")),
            Options::new(),
        );

        assert_eq!(options.table.as_deref(), Some("legacy_users"));
    }

    #[test]
    fn test_resolve_applies_filter_hook() {
        struct TenantScoped;

        impl ModelHooks for TenantScoped {
            fn filter_options(&self, options: Options) -> Options {
                let tenant = options.get("tenant").cloned().unwrap_or(Bson::Null);
                let filter = Expr::conjoin(options.filter.clone(), Filter::eq("tenant", tenant));

                options.filter(filter)
            }
        }

        let config = config();
        let resolver = OptionResolver::new(&config, &TenantScoped);
        let options = resolver.resolve(Options::new(), None, Options::new());

        assert_eq!(options.filter, Some(Filter::eq("tenant", "acme")));
    }

    #[test]
    fn test_table_name_requires_table() {
        assert!(matches!(
            Options::new().table_name(),
            Err(DocumentStoreError::InvalidOptions(_))
        ));
        assert_eq!(Options::new().table("t").table_name().unwrap(), "t");
    }
}
