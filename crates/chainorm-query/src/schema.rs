//! Schema registry and configuration.
//!
//! A [`Schema`] maps monikers to [`ResultSource`]s. It is populated once
//! through [`SchemaBuilder`], which resolves relationships as they are
//! declared, and is read-only afterwards.

use crate::expr::Dialect;
use crate::resultset::ResultSet;
use chainorm_core::error::{ConfigurationError, ConfigurationErrorKind, ErrorHook, HookAction};
use chainorm_core::{Error, RelationshipDecl, Result, ResultSource, resolve};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Schema-wide settings.
///
/// ```
/// use chainorm_query::{Dialect, SchemaConfig};
///
/// let config = SchemaConfig::from_json(r#"{ "dialect": "sqlite", "quote_identifiers": true }"#).unwrap();
/// assert_eq!(config.dialect, Dialect::Sqlite);
/// assert!(config.quote_identifiers);
/// ```
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// Placeholder syntax and identifier quote characters
    pub dialect: Dialect,
    /// Quote every identifier in generated SQL
    pub quote_identifiers: bool,
    /// Strategy every raised error passes through before reaching the caller
    #[serde(skip)]
    pub error_hook: Option<ErrorHook>,
}

impl fmt::Debug for SchemaConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaConfig")
            .field("dialect", &self.dialect)
            .field("quote_identifiers", &self.quote_identifiers)
            .field("error_hook", &self.error_hook.as_ref().map(|_| "<hook>"))
            .finish()
    }
}

impl SchemaConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the serializable settings from JSON.
    #[allow(clippy::result_large_err)]
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| {
            Error::config(
                ConfigurationErrorKind::Invalid,
                format!("invalid schema configuration: {e}"),
            )
        })
    }

    #[must_use]
    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    #[must_use]
    pub fn quote_identifiers(mut self, quote: bool) -> Self {
        self.quote_identifiers = quote;
        self
    }

    #[must_use]
    pub fn error_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(Error) -> HookAction + Send + Sync + 'static,
    {
        self.error_hook = Some(Arc::new(hook));
        self
    }
}

/// The schema registry.
#[derive(Debug)]
pub struct Schema {
    sources: BTreeMap<String, Arc<ResultSource>>,
    by_class: HashMap<String, String>,
    config: SchemaConfig,
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::new(SchemaConfig::default())
    }

    pub fn config(&self) -> &SchemaConfig {
        &self.config
    }

    /// Look up a source by moniker.
    #[allow(clippy::result_large_err)]
    pub fn lookup_source(&self, moniker: &str) -> Result<Arc<ResultSource>> {
        self.sources
            .get(moniker)
            .cloned()
            .ok_or_else(|| unknown_source(moniker))
    }

    /// Look up a source by its declaring (class) name.
    #[allow(clippy::result_large_err)]
    pub fn source_of(&self, class_name: &str) -> Result<Arc<ResultSource>> {
        match self.by_class.get(class_name) {
            Some(moniker) => self.lookup_source(moniker),
            None => Err(unknown_source(class_name)),
        }
    }

    pub fn monikers(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }

    /// Root result set over the source registered as `moniker`.
    #[allow(clippy::result_large_err)]
    pub fn resultset(self: &Arc<Self>, moniker: &str) -> Result<ResultSet> {
        let source = self.lookup_source(moniker)?;
        Ok(ResultSet::new(Arc::clone(self), source))
    }

    /// Run `op`, passing a failure through the exception hook.
    ///
    /// A suppressed failure yields the default of the success type.
    #[allow(clippy::result_large_err)]
    pub(crate) fn guard<T: Default>(&self, op: impl FnOnce() -> Result<T>) -> Result<T> {
        match op() {
            Ok(value) => Ok(value),
            Err(err) => match err.through_hook(self.config.error_hook.as_ref()) {
                Some(err) => Err(err),
                None => Ok(T::default()),
            },
        }
    }
}

fn unknown_source(name: &str) -> Error {
    Error::config(
        ConfigurationErrorKind::UnknownSource,
        format!("no source registered as '{name}'"),
    )
}

/// Setup-phase registry; [`build`](SchemaBuilder::build) freezes it.
///
/// Declarations are checked immediately. When an exception hook suppresses
/// a declaration error, the offending declaration is skipped.
///
/// ```
/// use chainorm_query::{ResultSource, Schema};
///
/// let schema = Schema::builder()
///     .add_source(ResultSource::new("Artist").columns(["id", "name"]).primary_key(["id"]))?
///     .add_source(ResultSource::new("CD").columns(["id", "artist", "title"]).primary_key(["id"]))?
///     .belongs_to("CD", "artist", "Artist")?
///     .has_many_on("Artist", "cds", "CD", "artist")?
///     .build();
/// assert!(schema.lookup_source("CD")?.relationship("artist").is_some());
/// # Ok::<(), chainorm_core::Error>(())
/// ```
#[derive(Debug)]
pub struct SchemaBuilder {
    sources: BTreeMap<String, ResultSource>,
    config: SchemaConfig,
}

impl SchemaBuilder {
    pub fn new(config: SchemaConfig) -> Self {
        Self {
            sources: BTreeMap::new(),
            config,
        }
    }

    #[must_use]
    pub fn config(mut self, config: SchemaConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a source under its moniker.
    #[allow(clippy::result_large_err)]
    pub fn add_source(mut self, source: ResultSource) -> Result<Self> {
        let outcome = source.validate().and_then(|()| {
            if self.sources.contains_key(source.name()) {
                Err(Error::config(
                    ConfigurationErrorKind::DuplicateSource,
                    format!("source '{}' is already registered", source.name()),
                ))
            } else {
                Ok(())
            }
        });
        match outcome {
            Ok(()) => {
                tracing::trace!(source = source.name(), table = source.table_name(), "registered source");
                self.sources.insert(source.name().to_string(), source);
                Ok(self)
            }
            Err(err) => self.declaration_failed(err),
        }
    }

    /// Resolve and register a relationship on `declaring`.
    ///
    /// The target must already be registered; a source may reference itself.
    #[allow(clippy::result_large_err)]
    pub fn add_relationship(mut self, declaring: &str, decl: RelationshipDecl) -> Result<Self> {
        let outcome = self.resolve_on(declaring, &decl);
        match outcome {
            Ok(()) => Ok(self),
            Err(err) => self.declaration_failed(err),
        }
    }

    #[allow(clippy::result_large_err)]
    fn resolve_on(&mut self, declaring: &str, decl: &RelationshipDecl) -> Result<()> {
        let rel = {
            let source = self.sources.get(declaring).ok_or_else(|| unknown_source(declaring))?;
            let target = self.sources.get(decl.target()).ok_or_else(|| {
                ConfigurationError {
                    kind: ConfigurationErrorKind::UnknownSource,
                    message: format!("no source registered as '{}'", decl.target()),
                    source_name: None,
                    relationship: None,
                }
                .on_source(declaring)
                .on_relationship(decl.name())
            })?;
            resolve(decl, source, target)?
        };
        match self.sources.get_mut(declaring) {
            Some(source) => source.add_relationship(rel),
            None => Err(unknown_source(declaring)),
        }
    }

    #[allow(clippy::result_large_err)]
    fn declaration_failed(self, err: Error) -> Result<Self> {
        match err.through_hook(self.config.error_hook.as_ref()) {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }

    /// `belongs_to` with the foreign key inferred from the relation name.
    #[allow(clippy::result_large_err)]
    pub fn belongs_to(self, declaring: &str, name: &str, target: &str) -> Result<Self> {
        self.add_relationship(declaring, RelationshipDecl::belongs_to(name, target))
    }

    /// `has_many` with the foreign key guessed from the declaring name.
    #[allow(clippy::result_large_err)]
    pub fn has_many(self, declaring: &str, name: &str, target: &str) -> Result<Self> {
        self.add_relationship(declaring, RelationshipDecl::has_many(name, target))
    }

    /// `has_many` through the named foreign column on the target.
    #[allow(clippy::result_large_err)]
    pub fn has_many_on(self, declaring: &str, name: &str, target: &str, column: &str) -> Result<Self> {
        self.add_relationship(
            declaring,
            RelationshipDecl::has_many(name, target).condition(column),
        )
    }

    #[allow(clippy::result_large_err)]
    pub fn has_one(self, declaring: &str, name: &str, target: &str) -> Result<Self> {
        self.add_relationship(declaring, RelationshipDecl::has_one(name, target))
    }

    #[allow(clippy::result_large_err)]
    pub fn might_have(self, declaring: &str, name: &str, target: &str) -> Result<Self> {
        self.add_relationship(declaring, RelationshipDecl::might_have(name, target))
    }

    /// Freeze the registry.
    pub fn build(self) -> Arc<Schema> {
        let by_class = self
            .sources
            .values()
            .map(|s| (s.declaring_name().to_string(), s.name().to_string()))
            .collect();
        let sources = self
            .sources
            .into_iter()
            .map(|(name, source)| (name, Arc::new(source)))
            .collect();
        tracing::debug!("schema built");
        Arc::new(Schema {
            sources,
            by_class,
            config: self.config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn artist() -> ResultSource {
        ResultSource::new("Artist")
            .class_name("Schema::Artist")
            .columns(["id", "name"])
            .primary_key(["id"])
    }

    fn cd() -> ResultSource {
        ResultSource::new("CD")
            .table("cd")
            .columns(["id", "artist", "title", "year"])
            .primary_key(["id"])
    }

    #[test]
    fn lookup_by_moniker_and_class() {
        let schema = Schema::builder().add_source(artist()).unwrap().build();
        assert_eq!(schema.lookup_source("Artist").unwrap().name(), "Artist");
        assert_eq!(schema.source_of("Schema::Artist").unwrap().name(), "Artist");
        assert!(schema.lookup_source("Nope").unwrap_err().is_configuration());
    }

    #[test]
    fn duplicate_source_rejected() {
        let err = Schema::builder()
            .add_source(artist())
            .unwrap()
            .add_source(artist())
            .unwrap_err();
        match err {
            Error::Configuration(e) => assert_eq!(e.kind, ConfigurationErrorKind::DuplicateSource),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn relationship_target_must_be_registered() {
        let err = Schema::builder()
            .add_source(cd())
            .unwrap()
            .belongs_to("CD", "artist", "Artist")
            .unwrap_err();
        let text = err.to_string();
        assert!(text.contains("'Artist'"), "{text}");
        assert!(text.contains("relationship 'artist'"), "{text}");
    }

    #[test]
    fn has_many_guess_uses_class_name() {
        let schema = Schema::builder()
            .add_source(artist())
            .unwrap()
            .add_source(cd())
            .unwrap()
            .has_many("Artist", "cds", "CD")
            .unwrap()
            .build();
        let rel = schema.lookup_source("Artist").unwrap();
        let rel = rel.relationship("cds").unwrap();
        assert_eq!(rel.condition().to_string(), "{foreign.artist => self.id}");
    }

    #[test]
    fn suppressing_hook_skips_bad_declaration() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        let config = SchemaConfig::new().error_hook(move |err| {
            log.lock().unwrap().push(err.to_string());
            HookAction::Suppress
        });
        let schema = SchemaBuilder::new(config)
            .add_source(cd())
            .unwrap()
            .belongs_to("CD", "label", "CD")
            .unwrap()
            .build();
        assert!(schema.lookup_source("CD").unwrap().relationship("label").is_none());
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn config_from_json_defaults() {
        let config = SchemaConfig::from_json("{}").unwrap();
        assert_eq!(config.dialect, Dialect::Postgres);
        assert!(!config.quote_identifiers);
        assert!(config.error_hook.is_none());

        let err = SchemaConfig::from_json(r#"{ "dialect": "oracle" }"#).unwrap_err();
        assert!(err.is_configuration());
    }
}
