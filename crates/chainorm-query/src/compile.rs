//! Query compiler.
//!
//! Turns a result set into one SQL statement plus its ordered bind values.
//! Compilation runs in two passes: joins are planned first so every alias
//! is known, then the clauses are rendered in textual order into a single
//! bind vector.

use crate::alias::{AliasTable, ROOT_ALIAS, Scope};
use crate::attrs::FromSource;
use crate::expr::{BinaryOp, Expr, RenderContext, renumber_placeholders};
use crate::join::JoinSpec;
use crate::resultset::ResultSet;
use crate::schema::Schema;
use chainorm_core::error::{CompilationErrorKind, ConfigurationErrorKind};
use chainorm_core::{ConditionArgs, Error, JoinCondition, JoinType, Projection, Result, ResultSource, Value};

/// A compiled statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledQuery {
    pub sql: String,
    pub binds: Vec<Value>,
    /// Result-column names, one per SELECT entry.
    pub projection: Projection,
}

/// Statement variations layered over the result set's own attributes.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Shape {
    /// Select `COUNT(*)` instead of the projection.
    pub count: bool,
    pub drop_order: bool,
    /// Upper bound applied on top of any LIMIT.
    pub limit: Option<u64>,
}

/// One projected entry.
#[derive(Debug, Clone)]
pub(crate) struct Selected {
    pub expr: Expr,
    pub name: String,
}

/// Result name of a plain column entry: `name` and `me.name` give `name`,
/// other qualifiers are kept (`cds.title`).
fn column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Column { table: None, name } => Some(name.clone()),
        Expr::Column { table: Some(t), name } if t == ROOT_ALIAS => Some(name.clone()),
        Expr::Column { table: Some(t), name } => Some(format!("{t}.{name}")),
        _ => None,
    }
}

fn push_column(out: &mut Vec<Selected>, col: &str) {
    let expr = Expr::col(col);
    let name = column_name(&expr).unwrap_or_else(|| col.to_string());
    out.push(Selected { expr, name });
}

fn select_as_mismatch(message: String) -> Error {
    Error::config(ConfigurationErrorKind::SelectAsMismatch, message)
}

/// Resolve the SELECT list of `rs` without rendering it.
#[allow(clippy::result_large_err)]
pub(crate) fn projection(rs: &ResultSet) -> Result<Vec<Selected>> {
    let attrs = &rs.attrs;
    let mut out = Vec::new();

    match (&attrs.columns, &attrs.select) {
        (Some(cols), _) => cols.iter().for_each(|c| push_column(&mut out, c)),
        (None, Some(_)) => {}
        (None, None) => rs
            .source
            .column_names()
            .iter()
            .for_each(|c| push_column(&mut out, c)),
    }

    if let Some(select) = &attrs.select {
        match &attrs.as_names {
            Some(names) if names.len() != select.len() => {
                return Err(select_as_mismatch(format!(
                    "select has {} entries but as has {}",
                    select.len(),
                    names.len()
                )));
            }
            Some(names) => out.extend(select.iter().zip(names).map(|(expr, name)| Selected {
                expr: expr.clone(),
                name: name.clone(),
            })),
            None => {
                for (i, expr) in select.iter().enumerate() {
                    let name = column_name(expr).ok_or_else(|| {
                        select_as_mismatch(format!("select entry {} is not a column and has no as name", i + 1))
                    })?;
                    out.push(Selected {
                        expr: expr.clone(),
                        name,
                    });
                }
            }
        }
    }

    attrs.plus_columns.iter().for_each(|c| push_column(&mut out, c));

    if attrs.plus_select.len() != attrs.plus_as.len() {
        return Err(select_as_mismatch(format!(
            "+select has {} entries but +as has {}",
            attrs.plus_select.len(),
            attrs.plus_as.len()
        )));
    }
    out.extend(
        attrs
            .plus_select
            .iter()
            .zip(&attrs.plus_as)
            .map(|(expr, name)| Selected {
                expr: expr.clone(),
                name: name.clone(),
            }),
    );

    Ok(out)
}

/// Table or derived table a join reads from.
#[derive(Debug, Clone)]
enum JoinTarget {
    Table(String),
    From(FromSource),
}

#[derive(Debug, Clone)]
struct PlannedJoin {
    join_type: JoinType,
    target: JoinTarget,
    alias: String,
    condition: JoinCondition,
    foreign_alias: String,
    self_alias: String,
    relationship: String,
}

/// Conditions of one chain level and the scope they resolve against.
struct Level<'a> {
    scope: Scope,
    conditions: &'a [Expr],
}

struct Planner<'a> {
    schema: &'a Schema,
    aliases: AliasTable,
    joins: Vec<PlannedJoin>,
}

impl Planner<'_> {
    #[allow(clippy::result_large_err)]
    fn plan_joins(
        &mut self,
        source: &ResultSource,
        parent_alias: &str,
        spec: &JoinSpec,
        parent_outer: bool,
        scope: &mut Scope,
    ) -> Result<()> {
        for (name, nested) in spec.iter() {
            let rel = source.relationship(name).ok_or_else(|| {
                Error::compilation(
                    CompilationErrorKind::UnknownRelationship,
                    format!("no relationship '{name}' on source '{}'", source.name()),
                )
            })?;
            let target = self.schema.lookup_source(rel.target())?;
            let (alias, fresh) = self.aliases.join_alias(parent_alias, name);
            scope.rename(name, alias.clone());

            // Below an outer join every join is outer too.
            let declared = rel.join_type();
            let join_type = if parent_outer && !declared.is_outer() {
                JoinType::Left
            } else {
                declared
            };

            if fresh {
                self.joins.push(PlannedJoin {
                    join_type,
                    target: JoinTarget::Table(target.table_name().to_string()),
                    alias: alias.clone(),
                    condition: rel.condition().clone(),
                    foreign_alias: alias.clone(),
                    self_alias: parent_alias.to_string(),
                    relationship: name.to_string(),
                });
            }
            self.plan_joins(&target, &alias, nested, join_type.is_outer(), scope)?;
        }
        Ok(())
    }
}

struct Plan<'a> {
    root_scope: Scope,
    joins: Vec<PlannedJoin>,
    levels: Vec<Level<'a>>,
}

#[allow(clippy::result_large_err)]
fn plan(rs: &ResultSet) -> Result<Plan<'_>> {
    let mut planner = Planner {
        schema: &rs.schema,
        aliases: AliasTable::new(),
        joins: Vec::new(),
    };
    let mut root_scope = Scope::root();
    let mut levels = Vec::new();

    if matches!(rs.attrs.from, Some(FromSource::Raw { .. })) {
        return Ok(Plan {
            root_scope,
            joins: Vec::new(),
            levels,
        });
    }

    planner.plan_joins(&rs.source, ROOT_ALIAS, &rs.attrs.join, false, &mut root_scope)?;

    let mut child_alias = ROOT_ALIAS.to_string();
    let mut link = rs.via.as_deref();
    while let Some(l) = link {
        let parent_alias = planner.aliases.reserve(&l.parent.name().to_lowercase());
        tracing::trace!(parent = l.parent.name(), alias = %parent_alias, "joined previous root");
        let target = match &l.from {
            Some(from) => JoinTarget::From(from.clone()),
            None => JoinTarget::Table(l.parent.table_name().to_string()),
        };
        planner.joins.push(PlannedJoin {
            join_type: JoinType::Inner,
            target,
            alias: parent_alias.clone(),
            condition: l.relationship.condition().clone(),
            foreign_alias: child_alias.clone(),
            self_alias: parent_alias.clone(),
            relationship: l.relationship.name().to_string(),
        });
        let mut scope = Scope::new(parent_alias.clone());
        planner.plan_joins(&l.parent, &parent_alias, &l.join, false, &mut scope)?;
        levels.push(Level {
            scope,
            conditions: &l.conditions,
        });
        child_alias = parent_alias;
        link = l.via.as_deref();
    }

    Ok(Plan {
        root_scope,
        joins: planner.joins,
        levels,
    })
}

fn render_conjunct(expr: &Expr, wrap: bool, cx: &RenderContext<'_>, params: &mut Vec<Value>) -> String {
    let sql = expr.build(cx, params);
    let loose = matches!(expr, Expr::Binary { op: BinaryOp::Or, .. } | Expr::Raw { .. });
    if wrap && loose { format!("({sql})") } else { sql }
}

fn render_on(join: &PlannedJoin, cx: &RenderContext<'_>, params: &mut Vec<Value>) -> String {
    match &join.condition {
        JoinCondition::Declarative(pairs) => pairs
            .iter()
            .map(|p| {
                format!(
                    "{} = {}",
                    cx.qualified(&join.foreign_alias, &p.foreign),
                    cx.qualified(&join.self_alias, &p.local)
                )
            })
            .collect::<Vec<_>>()
            .join(" AND "),
        JoinCondition::Procedural(cond) => {
            let (sql, binds) = cond.render(&ConditionArgs {
                foreign_alias: &join.foreign_alias,
                self_alias: &join.self_alias,
                relationship: &join.relationship,
            });
            renumber_placeholders(&sql, &binds, cx.dialect, params)
        }
    }
}

#[allow(clippy::result_large_err)]
fn render_from_source(from: &FromSource, cx: &RenderContext<'_>, params: &mut Vec<Value>) -> Result<String> {
    match from {
        FromSource::Raw { sql, binds } => Ok(renumber_placeholders(sql, binds, cx.dialect, params)),
        FromSource::Subselect(inner) => {
            let (sql, _) = render(inner, Shape::default(), params)?;
            Ok(format!("({sql})"))
        }
    }
}

/// Render `rs` as a SELECT, appending binds to `params`.
///
/// Returns the SQL and the result-column names.
#[allow(clippy::result_large_err)]
pub(crate) fn render(rs: &ResultSet, shape: Shape, params: &mut Vec<Value>) -> Result<(String, Vec<String>)> {
    let config = rs.schema.config();
    // validated for every shape, counts included
    let selected = projection(rs)?;
    let plan = plan(rs)?;
    let attrs = &rs.attrs;
    let cx = RenderContext {
        dialect: config.dialect,
        quote: config.quote_identifiers,
        scope: &plan.root_scope,
    };

    let mut sql = String::from("SELECT ");
    if attrs.distinct == Some(true) && !shape.count {
        sql.push_str("DISTINCT ");
    }
    if shape.count {
        sql.push_str("COUNT(*)");
    } else {
        let cols: Vec<String> = selected.iter().map(|s| s.expr.build(&cx, params)).collect();
        sql.push_str(&cols.join(", "));
    }

    sql.push_str(" FROM ");
    match &attrs.from {
        None => {
            sql.push_str(&cx.ident(rs.source.table_name()));
            sql.push(' ');
            sql.push_str(&cx.ident(ROOT_ALIAS));
        }
        Some(raw @ FromSource::Raw { .. }) => sql.push_str(&render_from_source(raw, &cx, params)?),
        Some(sub @ FromSource::Subselect(_)) => {
            sql.push_str(&render_from_source(sub, &cx, params)?);
            sql.push(' ');
            sql.push_str(&cx.ident(ROOT_ALIAS));
        }
    }

    for join in &plan.joins {
        let target = match &join.target {
            JoinTarget::Table(table) => cx.ident(table),
            JoinTarget::From(from) => render_from_source(from, &cx, params)?,
        };
        let on = render_on(join, &cx, params);
        sql.push_str(&format!(
            " {} {} {} ON {}",
            join.join_type.as_str(),
            target,
            cx.ident(&join.alias),
            on
        ));
    }

    let mut conjuncts: Vec<(&Expr, &Scope)> = rs.conditions.iter().map(|c| (c, &plan.root_scope)).collect();
    for level in &plan.levels {
        conjuncts.extend(level.conditions.iter().map(|c| (c, &level.scope)));
    }
    if !conjuncts.is_empty() {
        let wrap = conjuncts.len() > 1;
        let parts: Vec<String> = conjuncts
            .iter()
            .map(|&(expr, scope)| {
                let level_cx = RenderContext { scope, ..cx };
                render_conjunct(expr, wrap, &level_cx, params)
            })
            .collect();
        sql.push_str(" WHERE ");
        sql.push_str(&parts.join(" AND "));
    }

    if let Some(group) = attrs.group_by.as_ref().filter(|g| !g.is_empty()) {
        let parts: Vec<String> = group.iter().map(|e| e.build(&cx, params)).collect();
        sql.push_str(" GROUP BY ");
        sql.push_str(&parts.join(", "));
    }

    if let Some(having) = &attrs.having {
        sql.push_str(" HAVING ");
        sql.push_str(&having.build(&cx, params));
    }

    if !shape.count && !shape.drop_order {
        if let Some(order) = attrs.order_by.as_ref().filter(|o| !o.is_empty()) {
            let parts: Vec<String> = order.iter().map(|o| o.build(&cx, params)).collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&parts.join(", "));
        }
    }

    let (limit, offset) = attrs.window()?;
    let limit = match (shape.limit, limit) {
        (Some(cap), Some(l)) => Some(cap.min(l)),
        (cap, l) => cap.or(l),
    };
    if let Some(limit) = limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }
    if let Some(offset) = offset {
        sql.push_str(&format!(" OFFSET {offset}"));
    }

    let names = if shape.count {
        vec!["count".to_string()]
    } else {
        selected.into_iter().map(|s| s.name).collect()
    };
    Ok((sql, names))
}

/// Compile `rs` with the given shape into a fresh statement.
#[allow(clippy::result_large_err)]
pub(crate) fn compile(rs: &ResultSet, shape: Shape) -> Result<CompiledQuery> {
    let mut binds = Vec::new();
    let (sql, names) = render(rs, shape, &mut binds)?;
    Ok(CompiledQuery {
        sql,
        binds,
        projection: Projection::new(names),
    })
}

/// Compile a row count of `rs`.
///
/// Grouped, limited or distinct sets are counted over a subquery so the
/// count matches what `all` would return.
#[allow(clippy::result_large_err)]
pub(crate) fn compile_count(rs: &ResultSet) -> Result<CompiledQuery> {
    let attrs = &rs.attrs;
    let (limit, offset) = attrs.window()?;
    let needs_subquery = limit.is_some()
        || offset.is_some()
        || attrs.group_by.is_some()
        || attrs.having.is_some()
        || attrs.distinct == Some(true);

    if !needs_subquery {
        return compile(
            rs,
            Shape {
                count: true,
                drop_order: true,
                limit: None,
            },
        );
    }

    let mut binds = Vec::new();
    let (inner, _) = render(
        rs,
        Shape {
            drop_order: true,
            ..Shape::default()
        },
        &mut binds,
    )?;
    let config = rs.schema.config();
    let alias = if config.quote_identifiers {
        config.dialect.quote_identifier("count_subq")
    } else {
        "count_subq".to_string()
    };
    Ok(CompiledQuery {
        sql: format!("SELECT COUNT(*) FROM ({inner}) {alias}"),
        binds,
        projection: Projection::new(vec!["count".to_string()]),
    })
}
