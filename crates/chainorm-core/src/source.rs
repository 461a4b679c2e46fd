//! Result sources: table/view descriptions.

use crate::Result;
use crate::error::{ConfigurationError, ConfigurationErrorKind, Error};
use crate::identifiers::validate_identifier;
use crate::relationship::Relationship;

/// A named table or view with ordered columns, an optional primary key and
/// the relationships declared on it.
#[derive(Debug, Clone)]
pub struct ResultSource {
    name: String,
    table: String,
    class_name: Option<String>,
    columns: Vec<String>,
    primary_key: Vec<String>,
    relationships: Vec<Relationship>,
}

impl ResultSource {
    /// Create a source registered under `name`; the table defaults to the same name.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            table: name.clone(),
            name,
            class_name: None,
            columns: Vec::new(),
            primary_key: Vec::new(),
            relationships: Vec::new(),
        }
    }

    /// Set the table (or view) name used in FROM.
    #[must_use]
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Set the fully qualified declaring name (e.g. `Schema::Author`),
    /// used for foreign-key guessing.
    #[must_use]
    pub fn class_name(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = Some(class_name.into());
        self
    }

    /// Append columns in order; duplicates are ignored.
    #[must_use]
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for col in columns {
            let col = col.into();
            if !self.columns.contains(&col) {
                self.columns.push(col);
            }
        }
        self
    }

    #[must_use]
    pub fn primary_key<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_key = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Check names and that the primary key is made of declared columns.
    #[allow(clippy::result_large_err)]
    pub fn validate(&self) -> Result<()> {
        validate_identifier("source", &self.name)?;
        for col in &self.columns {
            validate_identifier("column", col)?;
        }
        if let Some(missing) = self.primary_key.iter().find(|c| !self.has_column(c)) {
            return Err(ConfigurationError {
                kind: ConfigurationErrorKind::UnknownColumn,
                message: format!("primary key column '{missing}' is not a declared column"),
                source_name: None,
                relationship: None,
            }
            .on_source(&self.name)
            .into());
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// Declaring name used by naming conventions; the moniker when unset.
    pub fn declaring_name(&self) -> &str {
        self.class_name.as_deref().unwrap_or(&self.name)
    }

    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn primary_columns(&self) -> &[String] {
        &self.primary_key
    }

    /// The primary key column when there is exactly one.
    #[allow(clippy::result_large_err)]
    pub fn single_primary_key(&self) -> Result<&str> {
        match self.primary_key.as_slice() {
            [pk] => Ok(pk),
            _ => Err(ConfigurationError {
                kind: ConfigurationErrorKind::AmbiguousPrimaryKey,
                message: format!(
                    "ambiguous primary key, explicit condition required ('{}' has {} primary key columns)",
                    self.name,
                    self.primary_key.len()
                ),
                source_name: None,
                relationship: None,
            }
            .on_source(&self.name)
            .into()),
        }
    }

    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    pub fn relationship(&self, name: &str) -> Option<&Relationship> {
        self.relationships.iter().find(|r| r.name() == name)
    }

    /// Register a resolved relationship; names are unique per source.
    #[allow(clippy::result_large_err)]
    pub fn add_relationship(&mut self, rel: Relationship) -> Result<()> {
        if self.relationship(rel.name()).is_some() {
            return Err(Error::Configuration(
                ConfigurationError {
                    kind: ConfigurationErrorKind::DuplicateRelationship,
                    message: "relationship already declared".to_string(),
                    source_name: None,
                    relationship: None,
                }
                .on_source(&self.name)
                .on_relationship(rel.name()),
            ));
        }
        tracing::trace!(
            source = %self.name,
            relationship = rel.name(),
            kind = rel.kind().as_str(),
            condition = %rel.condition(),
            "registered relationship"
        );
        self.relationships.push(rel);
        Ok(())
    }

    /// Relationships whose rows go away with a row of this source.
    pub fn cascade_delete_relationships(&self) -> impl Iterator<Item = &Relationship> {
        self.relationships.iter().filter(|r| r.cascade_delete())
    }

    /// Relationships whose rows are duplicated when a row of this source is copied.
    pub fn cascade_copy_relationships(&self) -> impl Iterator<Item = &Relationship> {
        self.relationships.iter().filter(|r| r.cascade_copy())
    }
}
