//! Relationship metadata.
//!
//! A [`Relationship`] is an immutable descriptor registered on its declaring
//! [`ResultSource`](crate::ResultSource) during schema setup. Join conditions
//! are always stored in canonical form: pairs of `foreign.<col>` /
//! `self.<col>` columns, or an opaque procedural predicate.

use crate::value::Value;
use std::fmt;
use std::sync::Arc;

/// The type of relationship between two sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationshipKind {
    /// Many-to-one: self columns reference one foreign row.
    BelongsTo,
    /// One-to-many: foreign columns reference this row.
    HasMany,
    /// One-to-one where the related row must exist.
    HasOne,
    /// One-to-one where the related row may be absent.
    MightHave,
}

impl RelationshipKind {
    /// Join type used when the relationship does not declare one.
    pub const fn default_join_type(self) -> JoinType {
        match self {
            RelationshipKind::HasMany | RelationshipKind::MightHave => JoinType::Left,
            RelationshipKind::BelongsTo | RelationshipKind::HasOne => JoinType::Inner,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            RelationshipKind::BelongsTo => "belongs_to",
            RelationshipKind::HasMany => "has_many",
            RelationshipKind::HasOne => "has_one",
            RelationshipKind::MightHave => "might_have",
        }
    }
}

/// How the relationship accessor behaves on a materialized object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accessor {
    /// Returns one related object.
    Single,
    /// Returns a related result set.
    Multi,
    /// Overlaps a stored scalar column of the same name; reads inflate it,
    /// writes deflate back to the column.
    Filter,
}

/// Types of SQL joins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
}

impl JoinType {
    /// Get the SQL keyword for this join type.
    pub const fn as_str(&self) -> &'static str {
        match self {
            JoinType::Inner => "JOIN",
            JoinType::Left => "LEFT JOIN",
            JoinType::Right => "RIGHT JOIN",
            JoinType::Full => "FULL JOIN",
        }
    }

    /// Whether rows of the preceding side survive a failed match.
    pub const fn is_outer(&self) -> bool {
        matches!(self, JoinType::Left | JoinType::Full)
    }
}

/// One equality of a declarative join condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnPair {
    /// Column on the related (target) source.
    pub foreign: String,
    /// Column on the declaring source.
    pub local: String,
}

impl ColumnPair {
    pub fn new(foreign: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            foreign: foreign.into(),
            local: local.into(),
        }
    }
}

/// Aliases a procedural condition is rendered against.
#[derive(Debug, Clone, Copy)]
pub struct ConditionArgs<'a> {
    /// Alias of the related (target) side.
    pub foreign_alias: &'a str,
    /// Alias of the declaring side.
    pub self_alias: &'a str,
    /// Name of the relationship being joined.
    pub relationship: &'a str,
}

/// SQL fragment generator for a procedural join condition.
///
/// Returns the ON-clause SQL and its bind values. Placeholders inside the
/// fragment must be written as `?`; the compiler renumbers them.
pub type ConditionFn = Arc<dyn Fn(&ConditionArgs<'_>) -> (String, Vec<Value>) + Send + Sync>;

/// Opaque, caller-supplied join predicate.
#[derive(Clone)]
pub struct ProceduralCondition(ConditionFn);

impl ProceduralCondition {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&ConditionArgs<'_>) -> (String, Vec<Value>) + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn render(&self, args: &ConditionArgs<'_>) -> (String, Vec<Value>) {
        (self.0)(args)
    }
}

impl fmt::Debug for ProceduralCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ProceduralCondition(..)")
    }
}

/// Canonical join condition.
#[derive(Debug, Clone)]
pub enum JoinCondition {
    /// AND of `foreign.<col> = self.<col>` equalities.
    Declarative(Vec<ColumnPair>),
    /// Opaque predicate; no cascade inference, no row-scoped resolution.
    Procedural(ProceduralCondition),
}

impl JoinCondition {
    pub fn is_declarative(&self) -> bool {
        matches!(self, JoinCondition::Declarative(_))
    }

    /// Column pairs of a declarative condition.
    pub fn pairs(&self) -> Option<&[ColumnPair]> {
        match self {
            JoinCondition::Declarative(pairs) => Some(pairs),
            JoinCondition::Procedural(_) => None,
        }
    }

    /// `(foreign.<col>, self.<col>)` pairs, in declaration order.
    pub fn qualified_pairs(&self) -> Vec<(String, String)> {
        self.pairs()
            .unwrap_or_default()
            .iter()
            .map(|p| (format!("foreign.{}", p.foreign), format!("self.{}", p.local)))
            .collect()
    }
}

impl fmt::Display for JoinCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinCondition::Declarative(_) => {
                let parts: Vec<String> = self
                    .qualified_pairs()
                    .into_iter()
                    .map(|(k, v)| format!("{k} => {v}"))
                    .collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
            JoinCondition::Procedural(_) => f.write_str("{procedural}"),
        }
    }
}

/// Caller overrides applied on top of the per-kind defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelationshipAttrs {
    pub join_type: Option<JoinType>,
    pub accessor: Option<Accessor>,
    pub cascade_delete: Option<bool>,
    pub cascade_copy: Option<bool>,
    pub is_foreign_key_constraint: Option<bool>,
    pub undef_on_null_fk: Option<bool>,
}

impl RelationshipAttrs {
    pub const fn new() -> Self {
        Self {
            join_type: None,
            accessor: None,
            cascade_delete: None,
            cascade_copy: None,
            is_foreign_key_constraint: None,
            undef_on_null_fk: None,
        }
    }

    #[must_use]
    pub const fn join_type(mut self, join_type: JoinType) -> Self {
        self.join_type = Some(join_type);
        self
    }

    #[must_use]
    pub const fn accessor(mut self, accessor: Accessor) -> Self {
        self.accessor = Some(accessor);
        self
    }

    #[must_use]
    pub const fn cascade_delete(mut self, value: bool) -> Self {
        self.cascade_delete = Some(value);
        self
    }

    #[must_use]
    pub const fn cascade_copy(mut self, value: bool) -> Self {
        self.cascade_copy = Some(value);
        self
    }

    #[must_use]
    pub const fn is_foreign_key_constraint(mut self, value: bool) -> Self {
        self.is_foreign_key_constraint = Some(value);
        self
    }

    #[must_use]
    pub const fn undef_on_null_fk(mut self, value: bool) -> Self {
        self.undef_on_null_fk = Some(value);
        self
    }
}

/// A resolved relationship registered on its declaring source.
#[derive(Debug, Clone)]
pub struct Relationship {
    pub(crate) name: String,
    pub(crate) kind: RelationshipKind,
    pub(crate) target: String,
    pub(crate) condition: JoinCondition,
    pub(crate) accessor: Accessor,
    pub(crate) join_type: Option<JoinType>,
    pub(crate) cascade_delete: bool,
    pub(crate) cascade_copy: bool,
    pub(crate) is_foreign_key_constraint: bool,
    pub(crate) undef_on_null_fk: bool,
}

impl Relationship {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> RelationshipKind {
        self.kind
    }

    /// Moniker of the related source.
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn condition(&self) -> &JoinCondition {
        &self.condition
    }

    pub fn accessor(&self) -> Accessor {
        self.accessor
    }

    /// Declared join type, falling back to the kind's default.
    pub fn join_type(&self) -> JoinType {
        self.join_type
            .unwrap_or_else(|| self.kind.default_join_type())
    }

    pub fn cascade_delete(&self) -> bool {
        self.cascade_delete
    }

    pub fn cascade_copy(&self) -> bool {
        self.cascade_copy
    }

    pub fn is_foreign_key_constraint(&self) -> bool {
        self.is_foreign_key_constraint
    }

    pub fn undef_on_null_fk(&self) -> bool {
        self.undef_on_null_fk
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_join_types_by_kind() {
        assert_eq!(RelationshipKind::HasMany.default_join_type(), JoinType::Left);
        assert_eq!(RelationshipKind::MightHave.default_join_type(), JoinType::Left);
        assert_eq!(RelationshipKind::BelongsTo.default_join_type(), JoinType::Inner);
        assert_eq!(RelationshipKind::HasOne.default_join_type(), JoinType::Inner);
    }

    #[test]
    fn declarative_condition_displays_qualified_keys() {
        let cond = JoinCondition::Declarative(vec![ColumnPair::new("id", "owner")]);
        assert_eq!(cond.to_string(), "{foreign.id => self.owner}");
        assert_eq!(
            cond.qualified_pairs(),
            vec![("foreign.id".to_string(), "self.owner".to_string())]
        );
    }

    #[test]
    fn procedural_condition_renders_with_aliases() {
        let cond = ProceduralCondition::new(|args| {
            (
                format!("{}.owner = {}.id AND {}.active = ?", args.foreign_alias, args.self_alias, args.foreign_alias),
                vec![Value::Bool(true)],
            )
        });
        let (sql, binds) = cond.render(&ConditionArgs {
            foreign_alias: "books",
            self_alias: "me",
            relationship: "books",
        });
        assert_eq!(sql, "books.owner = me.id AND books.active = ?");
        assert_eq!(binds, vec![Value::Bool(true)]);
        assert!(!JoinCondition::Procedural(cond).is_declarative());
    }

    #[test]
    fn attrs_builder_chain() {
        let attrs = RelationshipAttrs::new()
            .join_type(JoinType::Left)
            .cascade_delete(false)
            .accessor(Accessor::Single);
        assert_eq!(attrs.join_type, Some(JoinType::Left));
        assert_eq!(attrs.cascade_delete, Some(false));
        assert_eq!(attrs.cascade_copy, None);
    }
}
