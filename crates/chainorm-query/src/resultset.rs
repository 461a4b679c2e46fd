//! Result set handles.
//!
//! A [`ResultSet`] is an immutable description of a query over one source.
//! Chain operations return new handles; nothing is compiled until SQL is
//! requested, and nothing touches storage until an execution method is
//! called with a [`Storage`].

use crate::alias::ROOT_ALIAS;
use crate::attrs::{Attributes, FromSource};
use crate::cascade;
use crate::compile::{self, CompiledQuery, Shape};
use crate::expr::Expr;
use crate::join::JoinSpec;
use crate::schema::Schema;
use chainorm_core::error::{CompilationErrorKind, TypeError};
use chainorm_core::{Error, Inflate, Projection, Record, Relationship, Result, ResultSource, Row, Storage, Value};
use std::marker::PhantomData;
use std::sync::Arc;

/// The previous root of a `search_related` chain.
///
/// The current root is reached from `parent` through `relationship`; the
/// parent's conditions and joins still restrict which rows qualify.
#[derive(Debug, Clone)]
pub(crate) struct ViaLink {
    pub parent: Arc<ResultSource>,
    pub relationship: Relationship,
    pub conditions: Vec<Expr>,
    pub join: JoinSpec,
    pub from: Option<FromSource>,
    pub via: Option<Arc<ViaLink>>,
}

/// Immutable, chainable query over one source.
#[derive(Debug, Clone)]
pub struct ResultSet {
    pub(crate) schema: Arc<Schema>,
    pub(crate) source: Arc<ResultSource>,
    /// AND-ed conditions on the root, in chain order.
    pub(crate) conditions: Vec<Expr>,
    pub(crate) attrs: Attributes,
    pub(crate) via: Option<Arc<ViaLink>>,
}

impl ResultSet {
    pub(crate) fn new(schema: Arc<Schema>, source: Arc<ResultSource>) -> Self {
        Self {
            schema,
            source,
            conditions: Vec::new(),
            attrs: Attributes::default(),
            via: None,
        }
    }

    pub fn source(&self) -> &ResultSource {
        &self.source
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attrs
    }

    /// Alias of the root source in compiled SQL; always `me`.
    pub fn current_source_alias(&self) -> &'static str {
        ROOT_ALIAS
    }

    // ==================== Chaining ====================

    /// Derive a new result set: `cond` is AND-ed with the existing
    /// conditions and `attrs` merged over the existing attributes.
    ///
    /// `search(None, None)` returns an equivalent handle.
    #[must_use]
    pub fn search(&self, cond: impl Into<Option<Expr>>, attrs: impl Into<Option<Attributes>>) -> ResultSet {
        let mut next = self.clone();
        if let Some(cond) = cond.into() {
            cond.into_conjuncts(&mut next.conditions);
        }
        if let Some(attrs) = attrs.into() {
            next.attrs = self.attrs.merge(&attrs);
        }
        next
    }

    /// Result set over the target of `relationship`, restricted to rows
    /// related to this set's rows.
    ///
    /// The new root is aliased `me`; this set's root is joined through the
    /// same relationship. A limited, grouped, distinct or FROM-overridden
    /// set is wrapped with [`as_subselect`](Self::as_subselect) first.
    ///
    /// Returns `None` only when the exception hook suppressed a failure.
    #[allow(clippy::result_large_err)]
    pub fn search_related(
        &self,
        relationship: &str,
        cond: impl Into<Option<Expr>>,
        attrs: impl Into<Option<Attributes>>,
    ) -> Result<Option<ResultSet>> {
        let (cond, attrs) = (cond.into(), attrs.into());
        self.schema
            .guard(|| self.related(relationship).map(|rs| Some(rs.search(cond, attrs))))
    }

    /// Traversal behind [`search_related`](Self::search_related), without
    /// the exception hook.
    #[allow(clippy::result_large_err)]
    pub(crate) fn related(&self, relationship: &str) -> Result<ResultSet> {
        let rel = self.relationship(relationship)?.clone();
        let target = self.schema.lookup_source(rel.target())?;
        let parent = if self.attrs.restricts_rows() {
            self.keyed_for(&rel)?.as_subselect()
        } else {
            self.clone()
        };
        let link = ViaLink {
            parent: parent.source,
            relationship: rel,
            conditions: parent.conditions,
            join: parent.attrs.join,
            from: parent.attrs.from,
            via: parent.via,
        };
        Ok(ResultSet {
            schema: Arc::clone(&self.schema),
            source: target,
            conditions: Vec::new(),
            attrs: Attributes::default(),
            via: Some(Arc::new(link)),
        })
    }

    /// This set with every column the ON clause of `rel` reads from it
    /// added to the projection.
    ///
    /// Procedural conditions may read any column, so all declared columns
    /// are required for them.
    #[allow(clippy::result_large_err)]
    fn keyed_for(&self, rel: &Relationship) -> Result<ResultSet> {
        let selected = compile::projection(self)?;
        let needed: Vec<&str> = match rel.condition().pairs() {
            Some(pairs) => pairs.iter().map(|p| p.local.as_str()).collect(),
            None => self.source.column_names().iter().map(String::as_str).collect(),
        };
        let missing: Vec<String> = needed
            .into_iter()
            .filter(|col| !selected.iter().any(|s| s.name == *col))
            .map(|col| format!("{ROOT_ALIAS}.{col}"))
            .collect();
        if missing.is_empty() {
            return Ok(self.clone());
        }
        tracing::trace!(
            source = self.source.name(),
            relationship = rel.name(),
            columns = ?missing,
            "projecting join columns for subselect"
        );
        Ok(self.search(None, Attributes::new().add_columns(missing)))
    }

    /// Wrap this set as the FROM of a new set over the same source.
    #[must_use]
    pub fn as_subselect(&self) -> ResultSet {
        ResultSet {
            schema: Arc::clone(&self.schema),
            source: Arc::clone(&self.source),
            conditions: Vec::new(),
            attrs: Attributes::new().from_subselect(self),
            via: None,
        }
    }

    /// Related result set for one materialized row of this source.
    ///
    /// Returns `None` when a key column is NULL and the relationship is
    /// declared `undef_on_null_fk`.
    #[allow(clippy::result_large_err)]
    pub fn related_resultset(&self, record: &Record, relationship: &str) -> Result<Option<ResultSet>> {
        self.schema.guard(|| {
            let rel = self.relationship(relationship)?;
            let pairs = rel.condition().pairs().ok_or_else(|| {
                Error::compilation(
                    CompilationErrorKind::ProceduralCondition,
                    format!("relationship '{relationship}' has a procedural condition and cannot be resolved from a row"),
                )
            })?;

            let mut cond: Option<Expr> = None;
            for pair in pairs {
                let value = record.get_column(&pair.local)?;
                let column = Expr::qualified(ROOT_ALIAS, pair.foreign.as_str());
                let term = if value.is_null() {
                    if rel.undef_on_null_fk() {
                        return Ok(None);
                    }
                    column.is_null()
                } else {
                    column.eq(value.clone())
                };
                cond = Some(match cond {
                    Some(prev) => prev.and(term),
                    None => term,
                });
            }

            let related = self.schema.resultset(rel.target())?;
            Ok(Some(related.search(cond, None)))
        })
    }

    #[allow(clippy::result_large_err)]
    fn relationship(&self, name: &str) -> Result<&Relationship> {
        self.source.relationship(name).ok_or_else(|| {
            Error::compilation(
                CompilationErrorKind::UnknownRelationship,
                format!("no relationship '{name}' on source '{}'", self.source.name()),
            )
        })
    }

    // ==================== Compilation ====================

    /// Compile into SQL, binds and projection without touching storage.
    #[allow(clippy::result_large_err)]
    #[tracing::instrument(level = "trace", skip(self), fields(source = self.source.name()))]
    pub fn compile(&self) -> Result<CompiledQuery> {
        self.schema.guard(|| compile::compile(self, Shape::default()))
    }

    /// `(sql, binds)` of the SELECT this set stands for.
    #[allow(clippy::result_large_err)]
    pub fn as_query(&self) -> Result<(String, Vec<Value>)> {
        self.compile().map(|q| (q.sql, q.binds))
    }

    /// Result-column names of the compiled SELECT.
    #[allow(clippy::result_large_err)]
    pub fn projection(&self) -> Result<Projection> {
        self.compile().map(|q| q.projection)
    }

    // ==================== Execution ====================

    fn fetch(storage: &dyn Storage, query: &CompiledQuery) -> Result<Vec<Row>> {
        tracing::debug!(sql = %query.sql, binds = query.binds.len(), "executing query");
        storage.query(&query.sql, &query.binds)
    }

    /// Execute and return a cursor over materialized records.
    #[allow(clippy::result_large_err)]
    pub fn cursor(&self, storage: &dyn Storage) -> Result<Cursor<Record>> {
        self.cursor_as(storage)
    }

    #[allow(clippy::result_large_err)]
    #[tracing::instrument(level = "debug", skip(self, storage), fields(source = self.source.name()))]
    pub fn cursor_as<T: Inflate>(&self, storage: &dyn Storage) -> Result<Cursor<T>> {
        self.schema.guard(|| {
            let query = compile::compile(self, Shape::default())?;
            let rows = Self::fetch(storage, &query)?;
            Ok(Cursor::new(rows, query.projection))
        })
    }

    /// Execute and materialize every row.
    #[allow(clippy::result_large_err)]
    pub fn all(&self, storage: &dyn Storage) -> Result<Vec<Record>> {
        self.all_as(storage)
    }

    #[allow(clippy::result_large_err)]
    #[tracing::instrument(level = "debug", skip(self, storage), fields(source = self.source.name()))]
    pub fn all_as<T: Inflate>(&self, storage: &dyn Storage) -> Result<Vec<T>> {
        self.schema.guard(|| {
            let query = compile::compile(self, Shape::default())?;
            let rows = Self::fetch(storage, &query)?;
            rows.into_iter()
                .map(|row| T::inflate(row, &query.projection))
                .collect()
        })
    }

    /// First row of the set (LIMIT 1), if any.
    #[allow(clippy::result_large_err)]
    pub fn first(&self, storage: &dyn Storage) -> Result<Option<Record>> {
        self.first_as(storage)
    }

    #[allow(clippy::result_large_err)]
    #[tracing::instrument(level = "debug", skip(self, storage), fields(source = self.source.name()))]
    pub fn first_as<T: Inflate>(&self, storage: &dyn Storage) -> Result<Option<T>> {
        self.schema.guard(|| self.first_inner(storage))
    }

    #[allow(clippy::result_large_err)]
    fn first_inner<T: Inflate>(&self, storage: &dyn Storage) -> Result<Option<T>> {
        let query = compile::compile(
            self,
            Shape {
                limit: Some(1),
                ..Shape::default()
            },
        )?;
        let rows = Self::fetch(storage, &query)?;
        rows.into_iter()
            .next()
            .map(|row| T::inflate(row, &query.projection))
            .transpose()
    }

    /// Number of rows the set would return.
    #[allow(clippy::result_large_err)]
    #[tracing::instrument(level = "debug", skip(self, storage), fields(source = self.source.name()))]
    pub fn count(&self, storage: &dyn Storage) -> Result<u64> {
        self.schema.guard(|| {
            let query = compile::compile_count(self)?;
            let rows = Self::fetch(storage, &query)?;
            let value = rows.first().and_then(|r| r.get(0)).cloned().unwrap_or(Value::Null);
            value
                .as_i64()
                .and_then(|n| u64::try_from(n).ok())
                .ok_or_else(|| {
                    Error::Type(TypeError {
                        expected: "non-negative row count",
                        actual: value.type_name().to_string(),
                        column: Some("count".to_string()),
                    })
                })
        })
    }

    /// Compiled `SELECT COUNT(*)` for this set.
    #[allow(clippy::result_large_err)]
    pub fn count_query(&self) -> Result<(String, Vec<Value>)> {
        self.schema
            .guard(|| compile::compile_count(self).map(|q| (q.sql, q.binds)))
    }

    /// Look up one row by its single-column primary key.
    #[allow(clippy::result_large_err)]
    pub fn find(&self, storage: &dyn Storage, key: impl Into<Value>) -> Result<Option<Record>> {
        let key = key.into();
        self.schema.guard(|| {
            let pk = self.source.single_primary_key()?;
            self.search(Expr::qualified(ROOT_ALIAS, pk).eq(key), None)
                .first_inner(storage)
        })
    }

    /// Handle on one projected column.
    ///
    /// Fails with a missing-column error unless `name` is part of the
    /// compiled projection. Returns `None` only when the exception hook
    /// suppressed that failure.
    #[allow(clippy::result_large_err)]
    pub fn get_column(&self, name: &str) -> Result<Option<ColumnResultSet>> {
        self.schema.guard(|| {
            let selected = compile::projection(self)?;
            let Some(entry) = selected.iter().find(|s| s.name == name) else {
                return Err(Error::missing_column(
                    name,
                    selected.into_iter().map(|s| s.name).collect(),
                ));
            };
            Ok(Some(ColumnResultSet {
                rs: self.clone(),
                expr: entry.expr.clone(),
                name: entry.name.clone(),
            }))
        })
    }

    // ==================== Deletion ====================

    /// Statements deleting this set and everything it cascades to,
    /// dependents first.
    #[allow(clippy::result_large_err)]
    pub fn delete_statements(&self) -> Result<Vec<(String, Vec<Value>)>> {
        self.schema.guard(|| cascade::plan_delete(self))
    }

    /// Execute [`delete_statements`](Self::delete_statements); returns the
    /// total number of rows removed.
    #[allow(clippy::result_large_err)]
    #[tracing::instrument(level = "debug", skip(self, storage), fields(source = self.source.name()))]
    pub fn delete(&self, storage: &dyn Storage) -> Result<u64> {
        self.schema.guard(|| {
            let statements = cascade::plan_delete(self)?;
            for (sql, binds) in &statements {
                tracing::debug!(sql = %sql, binds = binds.len(), "executing delete");
            }
            Ok(storage.batch(&statements)?.iter().sum::<u64>())
        })
    }
}

/// Handle on one column of a result set.
#[derive(Debug, Clone)]
pub struct ColumnResultSet {
    rs: ResultSet,
    expr: Expr,
    name: String,
}

impl ColumnResultSet {
    pub fn name(&self) -> &str {
        &self.name
    }

    fn selecting(&self, expr: Expr) -> ResultSet {
        self.rs.search(
            None,
            Attributes::new().select([expr]).as_names([self.name.clone()]),
        )
    }

    #[allow(clippy::result_large_err)]
    pub fn as_query(&self) -> Result<(String, Vec<Value>)> {
        self.selecting(self.expr.clone()).as_query()
    }

    /// Every value of the column, in row order.
    #[allow(clippy::result_large_err)]
    pub fn all(&self, storage: &dyn Storage) -> Result<Vec<Value>> {
        let rows: Vec<Row> = self.selecting(self.expr.clone()).all_as(storage)?;
        Ok(rows
            .into_iter()
            .filter_map(|row| row.into_values().into_iter().next())
            .collect())
    }

    #[allow(clippy::result_large_err)]
    pub fn first(&self, storage: &dyn Storage) -> Result<Option<Value>> {
        let row: Option<Row> = self.selecting(self.expr.clone()).first_as(storage)?;
        Ok(row.and_then(|r| r.into_values().into_iter().next()))
    }

    /// Apply an aggregate (`MAX`, `SUM`, ...) to the column.
    #[allow(clippy::result_large_err)]
    pub fn func(&self, storage: &dyn Storage, function: &str) -> Result<Option<Value>> {
        let expr = Expr::function(function, vec![self.expr.clone()]);
        let row: Option<Row> = self.selecting(expr).first_as(storage)?;
        Ok(row.and_then(|r| r.into_values().into_iter().next()))
    }
}

/// Iterator over the materialized rows of one executed statement.
pub struct Cursor<T = Record> {
    rows: std::vec::IntoIter<Row>,
    projection: Projection,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Cursor<T> {
    fn new(rows: Vec<Row>, projection: Projection) -> Self {
        Self {
            rows: rows.into_iter(),
            projection,
            _marker: PhantomData,
        }
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    /// Rows not yet yielded.
    pub fn remaining(&self) -> usize {
        self.rows.len()
    }
}

impl<T> Default for Cursor<T> {
    fn default() -> Self {
        Self::new(Vec::new(), Projection::default())
    }
}

impl<T> std::fmt::Debug for Cursor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cursor")
            .field("remaining", &self.rows.len())
            .field("projection", &self.projection)
            .finish()
    }
}

impl<T: Inflate> Iterator for Cursor<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rows.next().map(|row| T::inflate(row, &self.projection))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainorm_core::HookAction;
    use std::sync::Mutex;

    /// Returns canned rows and records every statement it sees.
    #[derive(Default)]
    struct Scripted {
        rows: Vec<Row>,
        seen: Mutex<Vec<(String, Vec<Value>)>>,
    }

    impl Scripted {
        fn returning(rows: Vec<Vec<Value>>) -> Self {
            Self {
                rows: rows.into_iter().map(Row::from_values).collect(),
                seen: Mutex::default(),
            }
        }

        fn statements(&self) -> Vec<String> {
            self.seen.lock().unwrap().iter().map(|(sql, _)| sql.clone()).collect()
        }
    }

    impl Storage for Scripted {
        fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
            self.seen.lock().unwrap().push((sql.to_string(), params.to_vec()));
            Ok(self.rows.clone())
        }

        fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
            self.seen.lock().unwrap().push((sql.to_string(), params.to_vec()));
            Ok(2)
        }
    }

    fn builder() -> crate::schema::SchemaBuilder {
        Schema::builder()
            .add_source(
                ResultSource::new("Artist")
                    .table("artist")
                    .columns(["artistid", "name"])
                    .primary_key(["artistid"]),
            )
            .and_then(|b| {
                b.add_source(
                    ResultSource::new("CD")
                        .table("cd")
                        .columns(["cdid", "artist", "title"])
                        .primary_key(["cdid"]),
                )
            })
            .and_then(|b| b.has_many_on("Artist", "cds", "CD", "artist"))
            .and_then(|b| b.belongs_to("CD", "artist", "Artist"))
            .expect("schema")
    }

    fn artists() -> ResultSet {
        builder().build().resultset("Artist").expect("rs")
    }

    #[test]
    fn empty_search_is_identity() {
        let rs = artists().search(Expr::col("name").eq("Enya"), None);
        assert_eq!(rs.search(None, None).as_query().unwrap(), rs.as_query().unwrap());
    }

    #[test]
    fn search_related_joins_previous_root() {
        let cds = artists()
            .search(Expr::col("name").eq("Enya"), None)
            .search_related("cds", Expr::col("title").like("W%"), None)
            .unwrap()
            .expect("cds");
        let (sql, binds) = cds.as_query().unwrap();
        assert_eq!(
            sql,
            "SELECT me.cdid, me.artist, me.title FROM cd me \
             JOIN artist artist ON me.artist = artist.artistid \
             WHERE me.title LIKE $1 AND artist.name = $2"
        );
        assert_eq!(binds, vec![Value::from("W%"), Value::from("Enya")]);
    }

    #[test]
    fn limited_parent_is_wrapped_in_subselect() {
        let cds = artists()
            .search(None, Attributes::new().limit(2))
            .search_related("cds", None, None)
            .unwrap()
            .expect("cds");
        let (sql, _) = cds.as_query().unwrap();
        assert_eq!(
            sql,
            "SELECT me.cdid, me.artist, me.title FROM cd me \
             JOIN (SELECT me.artistid, me.name FROM artist me LIMIT 2) artist \
             ON me.artist = artist.artistid"
        );
    }

    #[test]
    fn narrowed_parent_still_projects_join_key() {
        let cds = artists()
            .search(None, Attributes::new().columns(["name"]).limit(2))
            .search_related("cds", None, None)
            .unwrap()
            .expect("cds");
        let (sql, _) = cds.as_query().unwrap();
        assert_eq!(
            sql,
            "SELECT me.cdid, me.artist, me.title FROM cd me \
             JOIN (SELECT me.name, me.artistid FROM artist me LIMIT 2) artist \
             ON me.artist = artist.artistid"
        );
    }

    #[test]
    fn unknown_relationship_is_a_compilation_error() {
        let err = artists().search_related("albums", None, None).unwrap_err();
        assert!(err.is_compilation());
    }

    #[test]
    fn first_caps_limit_and_materializes() {
        let storage = Scripted::returning(vec![vec![Value::Int(1), Value::from("Enya")]]);
        let rs = artists().search(None, Attributes::new().limit(10));
        let record = rs.first(&storage).unwrap().expect("row");
        assert_eq!(record.get_column("name").unwrap(), &Value::from("Enya"));
        assert_eq!(
            storage.statements(),
            vec!["SELECT me.artistid, me.name FROM artist me LIMIT 1".to_string()]
        );
    }

    #[test]
    fn count_wraps_windowed_sets() {
        let storage = Scripted::returning(vec![vec![Value::BigInt(3)]]);
        let rs = artists();
        assert_eq!(rs.count(&storage).unwrap(), 3);

        let paged = rs.search(None, Attributes::new().rows(5).page(2).order_by("name"));
        assert_eq!(paged.count(&storage).unwrap(), 3);
        assert_eq!(
            storage.statements(),
            vec![
                "SELECT COUNT(*) FROM artist me".to_string(),
                "SELECT COUNT(*) FROM (SELECT me.artistid, me.name FROM artist me LIMIT 5 OFFSET 5) count_subq"
                    .to_string(),
            ]
        );
    }

    #[test]
    fn get_column_requires_projected_name() {
        let rs = artists().search(
            None,
            Attributes::new().add_select(Expr::count_star()).add_as("cnt"),
        );
        assert_eq!(rs.projection().unwrap().len(), 3);
        assert_eq!(rs.get_column("cnt").unwrap().expect("cnt").name(), "cnt");

        let err = rs.get_column("rank").unwrap_err();
        assert!(err.is_missing_column());
    }

    #[test]
    fn column_aggregate() {
        let storage = Scripted::returning(vec![vec![Value::Int(7)]]);
        let max = artists()
            .get_column("artistid")
            .unwrap()
            .expect("artistid")
            .func(&storage, "MAX").unwrap();
        assert_eq!(max, Some(Value::Int(7)));
        assert_eq!(
            storage.statements(),
            vec!["SELECT MAX(me.artistid) FROM artist me LIMIT 1".to_string()]
        );
    }

    #[test]
    fn related_resultset_from_record() {
        let schema = builder().build();
        let cds = schema.resultset("CD").unwrap();
        let projection = Projection::new(vec!["cdid".into(), "artist".into(), "title".into()]);
        let record = Record::inflate(
            Row::from_values(vec![Value::Int(5), Value::Int(1), Value::from("Emerald")]),
            &projection,
        )
        .unwrap();

        let artist = cds.related_resultset(&record, "artist").unwrap().expect("related");
        let (sql, binds) = artist.as_query().unwrap();
        assert_eq!(sql, "SELECT me.artistid, me.name FROM artist me WHERE me.artistid = $1");
        assert_eq!(binds, vec![Value::Int(1)]);

        let orphan = Record::inflate(
            Row::from_values(vec![Value::Int(6), Value::Null, Value::from("Loose")]),
            &projection,
        )
        .unwrap();
        assert!(cds.related_resultset(&orphan, "artist").unwrap().is_none());
    }

    #[test]
    fn find_by_primary_key() {
        let storage = Scripted::returning(vec![]);
        assert!(artists().find(&storage, 4).unwrap().is_none());
        let seen = storage.seen.lock().unwrap();
        assert_eq!(seen[0].0, "SELECT me.artistid, me.name FROM artist me WHERE me.artistid = $1 LIMIT 1");
        assert_eq!(seen[0].1, vec![Value::Int(4)]);
    }

    #[test]
    fn delete_sums_batch_counts() {
        let storage = Scripted::default();
        let removed = artists().search(Expr::col("artistid").eq(1), None).delete(&storage).unwrap();
        assert_eq!(removed, 4);
        assert_eq!(storage.statements().len(), 2);
    }

    #[test]
    fn suppressing_hook_yields_empty_results() {
        let schema = builder()
            .config(crate::schema::SchemaConfig::new().error_hook(|_| HookAction::Suppress))
            .build();
        let rs = schema
            .resultset("Artist")
            .unwrap()
            .search(None, Attributes::new().join("albums"));
        let storage = Scripted::default();
        assert_eq!(rs.count(&storage).unwrap(), 0);
        assert!(rs.all(&storage).unwrap().is_empty());
        assert!(rs.get_column("missing").unwrap().is_none());
        assert!(rs.search_related("albums", None, None).unwrap().is_none());
        assert!(storage.statements().is_empty());
    }

    #[test]
    fn hook_sees_column_and_traversal_failures() {
        let schema = builder()
            .config(
                crate::schema::SchemaConfig::new()
                    .error_hook(|_| HookAction::Raise(Error::payload(7u32))),
            )
            .build();
        let rs = schema.resultset("Artist").unwrap();

        let Err(Error::Payload(payload)) = rs.get_column("missing") else {
            panic!("get_column bypassed the hook");
        };
        assert_eq!(payload.downcast_ref::<u32>(), Some(&7));

        let Err(Error::Payload(payload)) = rs.search_related("labels", None, None) else {
            panic!("search_related bypassed the hook");
        };
        assert_eq!(payload.downcast_ref::<u32>(), Some(&7));
    }

    #[test]
    fn count_validates_select_as_pairing() {
        let rs = artists().search(None, Attributes::new().add_select(Expr::count_star()));
        let err = rs.count_query().unwrap_err();
        assert!(matches!(
            err,
            Error::Configuration(ref e)
                if e.kind == chainorm_core::ConfigurationErrorKind::SelectAsMismatch
        ));
        let storage = Scripted::default();
        assert!(rs.count(&storage).is_err());
        assert!(storage.statements().is_empty());
    }

    #[test]
    fn overflowing_page_fails_to_compile() {
        let rs = artists().search(None, Attributes::new().rows(u64::MAX).page(3));
        let err = rs.as_query().unwrap_err();
        assert!(matches!(
            err,
            Error::Compilation(ref e) if e.kind == CompilationErrorKind::InvalidWindow
        ));
    }
}
