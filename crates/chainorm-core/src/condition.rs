//! Relationship declaration and join-condition resolution.
//!
//! A [`RelationshipDecl`] is what schema code writes; [`resolve`] turns it
//! into a canonical [`Relationship`], inferring foreign keys by naming
//! convention when no condition is given.

use crate::Result;
use crate::error::{ConfigurationError, ConfigurationErrorKind, Error};
use crate::identifiers::{is_identifier, split_condition_key};
use crate::relationship::{
    Accessor, ColumnPair, JoinCondition, ProceduralCondition, Relationship, RelationshipAttrs,
    RelationshipKind,
};
use crate::source::ResultSource;

/// Join-condition shorthand accepted by relationship declarations.
#[derive(Debug, Clone)]
pub enum ConditionSpec {
    /// Infer from primary keys and naming conventions.
    Infer,
    /// A single column name on the side that holds the foreign key.
    Column(String),
    /// Column mapping: either fully implicit (`col => col`) or fully
    /// explicit (`foreign.col => self.col`).
    Map(Vec<(String, String)>),
    /// Opaque predicate supplying its own SQL.
    Procedural(ProceduralCondition),
}

impl From<&str> for ConditionSpec {
    fn from(col: &str) -> Self {
        ConditionSpec::Column(col.to_string())
    }
}

impl From<String> for ConditionSpec {
    fn from(col: String) -> Self {
        ConditionSpec::Column(col)
    }
}

impl<const N: usize> From<[(&str, &str); N]> for ConditionSpec {
    fn from(entries: [(&str, &str); N]) -> Self {
        ConditionSpec::Map(
            entries
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        )
    }
}

impl From<Vec<(String, String)>> for ConditionSpec {
    fn from(entries: Vec<(String, String)>) -> Self {
        ConditionSpec::Map(entries)
    }
}

impl From<ProceduralCondition> for ConditionSpec {
    fn from(cond: ProceduralCondition) -> Self {
        ConditionSpec::Procedural(cond)
    }
}

/// A relationship as declared, before resolution.
#[derive(Debug, Clone)]
pub struct RelationshipDecl {
    kind: RelationshipKind,
    name: String,
    target: String,
    condition: ConditionSpec,
    attrs: RelationshipAttrs,
}

impl RelationshipDecl {
    pub fn new(kind: RelationshipKind, name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            target: target.into(),
            condition: ConditionSpec::Infer,
            attrs: RelationshipAttrs::default(),
        }
    }

    pub fn belongs_to(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(RelationshipKind::BelongsTo, name, target)
    }

    pub fn has_many(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(RelationshipKind::HasMany, name, target)
    }

    pub fn has_one(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(RelationshipKind::HasOne, name, target)
    }

    pub fn might_have(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(RelationshipKind::MightHave, name, target)
    }

    #[must_use]
    pub fn condition(mut self, cond: impl Into<ConditionSpec>) -> Self {
        self.condition = cond.into();
        self
    }

    #[must_use]
    pub fn attrs(mut self, attrs: RelationshipAttrs) -> Self {
        self.attrs = attrs;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn kind(&self) -> RelationshipKind {
        self.kind
    }
}

/// Conventional foreign-key column for a has-many style relationship:
/// the lowercased last `::` segment of the declaring name.
///
/// ```
/// use chainorm_core::condition::default_foreign_key;
///
/// assert_eq!(default_foreign_key("Schema::Author"), "author");
/// assert_eq!(default_foreign_key("Book"), "book");
/// ```
pub fn default_foreign_key(declaring_name: &str) -> String {
    declaring_name
        .rsplit("::")
        .next()
        .unwrap_or(declaring_name)
        .to_lowercase()
}

fn config_error(kind: ConfigurationErrorKind, message: String) -> ConfigurationError {
    ConfigurationError {
        kind,
        message,
        source_name: None,
        relationship: None,
    }
}

/// Canonicalize a column mapping.
///
/// Mixed qualification is rejected: a mapping is either fully implicit or
/// fully explicit.
fn canonical_map(entries: &[(String, String)]) -> std::result::Result<Vec<ColumnPair>, ConfigurationError> {
    if entries.is_empty() {
        return Err(config_error(
            ConfigurationErrorKind::MalformedCondition,
            "empty join condition".to_string(),
        ));
    }

    let explicit = entries.iter().any(|(k, _)| k.contains('.'));
    let mut pairs = Vec::with_capacity(entries.len());
    for (key, val) in entries {
        let pair = if explicit {
            match (split_condition_key(key), split_condition_key(val)) {
                (Some(("foreign", f)), Some(("self", s))) => ColumnPair::new(f, s),
                _ => {
                    return Err(config_error(
                        ConfigurationErrorKind::MalformedCondition,
                        format!(
                            "condition entry '{key} => {val}' must map 'foreign.<col>' to 'self.<col>'"
                        ),
                    ));
                }
            }
        } else if is_identifier(key) && is_identifier(val) {
            ColumnPair::new(key.as_str(), val.as_str())
        } else {
            return Err(config_error(
                ConfigurationErrorKind::MalformedCondition,
                format!("condition entry '{key} => {val}' mixes qualified and unqualified names"),
            ));
        };
        pairs.push(pair);
    }
    Ok(pairs)
}

fn require_column(
    source: &ResultSource,
    column: &str,
    guessed_from: Option<&str>,
) -> std::result::Result<(), ConfigurationError> {
    if source.has_column(column) {
        return Ok(());
    }
    let message = match guessed_from {
        Some(from) => format!(
            "No such column '{column}' on foreign source '{}' (guessed '{column}' from '{from}')",
            source.name()
        ),
        None => format!("No such column '{column}' on source '{}'", source.name()),
    };
    Err(config_error(ConfigurationErrorKind::UnknownColumn, message))
}

fn single_pk(source: &ResultSource) -> std::result::Result<String, ConfigurationError> {
    match source.single_primary_key() {
        Ok(pk) => Ok(pk.to_string()),
        Err(Error::Configuration(e)) => Err(e),
        Err(other) => Err(config_error(ConfigurationErrorKind::Invalid, other.to_string())),
    }
}

fn resolve_condition(
    decl: &RelationshipDecl,
    declaring: &ResultSource,
    target: &ResultSource,
) -> std::result::Result<JoinCondition, ConfigurationError> {
    let pairs = match (&decl.condition, decl.kind) {
        (ConditionSpec::Procedural(p), _) => return Ok(JoinCondition::Procedural(p.clone())),
        (ConditionSpec::Map(entries), _) => canonical_map(entries)?,

        (ConditionSpec::Infer, RelationshipKind::BelongsTo) => {
            let pk = single_pk(target)?;
            require_column(declaring, &decl.name, None)?;
            vec![ColumnPair::new(pk, decl.name.as_str())]
        }
        (ConditionSpec::Column(col), RelationshipKind::BelongsTo) => {
            let pk = single_pk(target)?;
            require_column(declaring, col, None)?;
            vec![ColumnPair::new(pk, col.as_str())]
        }

        (ConditionSpec::Infer, RelationshipKind::HasMany) => {
            let pk = single_pk(declaring)?;
            let guess = default_foreign_key(declaring.declaring_name());
            require_column(target, &guess, Some(declaring.declaring_name()))?;
            vec![ColumnPair::new(guess, pk)]
        }
        (ConditionSpec::Infer, RelationshipKind::HasOne | RelationshipKind::MightHave) => {
            let pk = single_pk(declaring)?;
            require_column(target, &pk, Some(declaring.declaring_name()))?;
            vec![ColumnPair::new(pk.as_str(), pk.as_str())]
        }
        (
            ConditionSpec::Column(col),
            RelationshipKind::HasMany | RelationshipKind::HasOne | RelationshipKind::MightHave,
        ) => {
            let pk = single_pk(declaring)?;
            require_column(target, col, None)?;
            vec![ColumnPair::new(col.as_str(), pk)]
        }
    };
    Ok(JoinCondition::Declarative(pairs))
}

/// Resolve a declaration against its declaring and target sources.
///
/// `declaring` and `target` may be the same source for self-referencing
/// relationships.
#[allow(clippy::result_large_err)]
pub fn resolve(
    decl: &RelationshipDecl,
    declaring: &ResultSource,
    target: &ResultSource,
) -> Result<Relationship> {
    crate::identifiers::validate_identifier("relationship", &decl.name)?;

    let condition = resolve_condition(decl, declaring, target)
        .map_err(|e| Error::Configuration(e.on_source(declaring.name()).on_relationship(&decl.name)))?;

    let declarative = condition.is_declarative();
    let attrs = decl.attrs;

    let inferred_accessor = match decl.kind {
        RelationshipKind::BelongsTo => {
            let single_entry = condition.pairs().is_some_and(|p| p.len() == 1);
            if single_entry && declaring.has_column(&decl.name) {
                Accessor::Filter
            } else {
                Accessor::Single
            }
        }
        RelationshipKind::HasMany => Accessor::Multi,
        RelationshipKind::HasOne | RelationshipKind::MightHave => Accessor::Single,
    };

    let (cascade_default, fk_default, undef_default) = match decl.kind {
        RelationshipKind::BelongsTo => (false, true, true),
        RelationshipKind::HasMany | RelationshipKind::HasOne | RelationshipKind::MightHave => {
            (declarative, false, false)
        }
    };

    Ok(Relationship {
        name: decl.name.clone(),
        kind: decl.kind,
        target: decl.target.clone(),
        condition,
        accessor: attrs.accessor.unwrap_or(inferred_accessor),
        join_type: attrs.join_type,
        cascade_delete: attrs.cascade_delete.unwrap_or(cascade_default),
        cascade_copy: attrs.cascade_copy.unwrap_or(cascade_default),
        is_foreign_key_constraint: attrs.is_foreign_key_constraint.unwrap_or(fk_default),
        undef_on_null_fk: attrs.undef_on_null_fk.unwrap_or(undef_default),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relationship::JoinType;

    fn person() -> ResultSource {
        ResultSource::new("Person")
            .class_name("Schema::Person")
            .columns(["id", "name"])
            .primary_key(["id"])
    }

    fn book() -> ResultSource {
        ResultSource::new("Book")
            .columns(["id", "title", "owner", "person"])
            .primary_key(["id"])
    }

    fn pairs(rel: &Relationship) -> Vec<(String, String)> {
        rel.condition().qualified_pairs()
    }

    #[test]
    fn belongs_to_infers_from_relation_name() {
        let rel = resolve(&RelationshipDecl::belongs_to("owner", "Person"), &book(), &person()).unwrap();
        assert_eq!(pairs(&rel), vec![("foreign.id".into(), "self.owner".into())]);
        assert_eq!(rel.accessor(), Accessor::Filter);
        assert!(rel.is_foreign_key_constraint());
        assert!(rel.undef_on_null_fk());
        assert!(!rel.cascade_delete());
        assert_eq!(rel.join_type(), JoinType::Inner);
    }

    #[test]
    fn belongs_to_column_string() {
        let rel = resolve(
            &RelationshipDecl::belongs_to("writer", "Person").condition("owner"),
            &book(),
            &person(),
        )
        .unwrap();
        assert_eq!(pairs(&rel), vec![("foreign.id".into(), "self.owner".into())]);
        // no column named "writer" on Book
        assert_eq!(rel.accessor(), Accessor::Single);
    }

    #[test]
    fn belongs_to_missing_local_column() {
        let err = resolve(&RelationshipDecl::belongs_to("editor", "Person"), &book(), &person()).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("No such column 'editor'"));
    }

    #[test]
    fn has_many_guesses_from_declaring_name() {
        let author = ResultSource::new("Author")
            .class_name("Schema::Author")
            .columns(["id", "name"])
            .primary_key(["id"]);
        let book = ResultSource::new("Book")
            .columns(["id", "title", "author"])
            .primary_key(["id"]);
        let rel = resolve(&RelationshipDecl::has_many("books", "Book"), &author, &book).unwrap();
        assert_eq!(pairs(&rel), vec![("foreign.author".into(), "self.id".into())]);
        assert_eq!(rel.accessor(), Accessor::Multi);
        assert!(rel.cascade_delete());
        assert!(rel.cascade_copy());
        assert_eq!(rel.join_type(), JoinType::Left);
    }

    #[test]
    fn has_many_guess_missing_names_guessed_source() {
        let publisher = ResultSource::new("Publisher")
            .class_name("Schema::Publisher")
            .columns(["id"])
            .primary_key(["id"]);
        let err = resolve(&RelationshipDecl::has_many("books", "Book"), &publisher, &book()).unwrap_err();
        assert!(err.to_string().contains("guessed 'publisher' from 'Schema::Publisher'"));
    }

    #[test]
    fn ambiguous_primary_key_requires_condition() {
        let link = ResultSource::new("Link").columns(["a", "b", "owner"]).primary_key(["a", "b"]);
        let err = resolve(&RelationshipDecl::belongs_to("owner", "Link"), &book(), &link).unwrap_err();
        assert!(err.to_string().contains("ambiguous primary key, explicit condition required"));
    }

    #[test]
    fn implicit_map_is_qualified() {
        let rel = resolve(
            &RelationshipDecl::has_many("books", "Book").condition([("owner", "id")]),
            &person(),
            &book(),
        )
        .unwrap();
        assert_eq!(pairs(&rel), vec![("foreign.owner".into(), "self.id".into())]);
    }

    #[test]
    fn explicit_map_passes_through() {
        let rel = resolve(
            &RelationshipDecl::has_many("books", "Book").condition([("foreign.owner", "self.id")]),
            &person(),
            &book(),
        )
        .unwrap();
        assert_eq!(pairs(&rel), vec![("foreign.owner".into(), "self.id".into())]);
    }

    #[test]
    fn mixed_qualification_is_rejected() {
        let err = resolve(
            &RelationshipDecl::has_many("books", "Book").condition([("foreign.owner", "id")]),
            &person(),
            &book(),
        )
        .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn procedural_condition_disables_cascade() {
        let cond = ProceduralCondition::new(|a| (format!("{}.owner = {}.id", a.foreign_alias, a.self_alias), vec![]));
        let rel = resolve(
            &RelationshipDecl::has_many("books", "Book").condition(cond),
            &person(),
            &book(),
        )
        .unwrap();
        assert!(!rel.cascade_delete());
        assert!(!rel.cascade_copy());
    }

    #[test]
    fn explicit_attrs_override_defaults() {
        let rel = resolve(
            &RelationshipDecl::belongs_to("owner", "Person")
                .attrs(RelationshipAttrs::new().join_type(JoinType::Left).accessor(Accessor::Single)),
            &book(),
            &person(),
        )
        .unwrap();
        assert_eq!(rel.join_type(), JoinType::Left);
        assert_eq!(rel.accessor(), Accessor::Single);
    }

    #[test]
    fn might_have_shares_primary_key() {
        let profile = ResultSource::new("Profile").columns(["id", "bio"]).primary_key(["id"]);
        let rel = resolve(&RelationshipDecl::might_have("profile", "Profile"), &person(), &profile).unwrap();
        assert_eq!(pairs(&rel), vec![("foreign.id".into(), "self.id".into())]);
        assert_eq!(rel.join_type(), JoinType::Left);
        assert_eq!(rel.accessor(), Accessor::Single);
    }
}
