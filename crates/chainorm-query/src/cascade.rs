//! Cascade delete planning.
//!
//! Deleting a result set also deletes rows reachable through its
//! `cascade_delete` relationships. Dependents are planned first so foreign
//! key constraints are never violated mid-batch.

use crate::alias::{ROOT_ALIAS, Scope};
use crate::attrs::Attributes;
use crate::compile::{self, Shape};
use crate::expr::RenderContext;
use crate::resultset::ResultSet;
use chainorm_core::error::CompilationErrorKind;
use chainorm_core::{Error, Result, Value};

/// Relationship currently being followed: (source moniker, relationship).
type Edge = (String, String);

/// Ordered DELETE statements for `rs` and its cascade closure.
#[allow(clippy::result_large_err)]
pub(crate) fn plan_delete(rs: &ResultSet) -> Result<Vec<(String, Vec<Value>)>> {
    let mut out = Vec::new();
    let mut path = Vec::new();
    collect(rs, &mut path, &mut out)?;
    Ok(out)
}

#[allow(clippy::result_large_err)]
fn collect(rs: &ResultSet, path: &mut Vec<Edge>, out: &mut Vec<(String, Vec<Value>)>) -> Result<()> {
    for rel in rs.source.cascade_delete_relationships() {
        if !rel.condition().is_declarative() {
            tracing::debug!(
                source = rs.source.name(),
                relationship = rel.name(),
                "skipping cascade through procedural condition"
            );
            continue;
        }
        let edge = (rs.source.name().to_string(), rel.name().to_string());
        if path.contains(&edge) {
            tracing::warn!(
                source = rs.source.name(),
                relationship = rel.name(),
                "cascade cycle detected, not following relationship again"
            );
            continue;
        }
        path.push(edge);
        let dependents = rs.related(rel.name())?;
        collect(&dependents, path, out)?;
        path.pop();
    }
    out.push(delete_statement(rs)?);
    Ok(())
}

/// `DELETE FROM <table> WHERE <pk> IN (SELECT me.<pk> ...)`.
#[allow(clippy::result_large_err)]
fn delete_statement(rs: &ResultSet) -> Result<(String, Vec<Value>)> {
    let source = &rs.source;
    let pk = source.single_primary_key().map_err(|_| {
        Error::compilation(
            CompilationErrorKind::Unsupported,
            format!(
                "cannot delete from '{}' without a single-column primary key",
                source.name()
            ),
        )
    })?;

    let keys = rs.search(None, Attributes::new().columns([format!("{ROOT_ALIAS}.{pk}")]));
    // ORDER BY only matters when it decides which rows a window keeps.
    let (limit, offset) = keys.attrs.window()?;
    let mut binds = Vec::new();
    let (inner, _) = compile::render(
        &keys,
        Shape {
            drop_order: limit.is_none() && offset.is_none(),
            ..Shape::default()
        },
        &mut binds,
    )?;

    let config = rs.schema.config();
    let scope = Scope::root();
    let cx = RenderContext {
        dialect: config.dialect,
        quote: config.quote_identifiers,
        scope: &scope,
    };
    let sql = format!(
        "DELETE FROM {} WHERE {} IN ({inner})",
        cx.ident(source.table_name()),
        cx.ident(pk)
    );
    tracing::trace!(source = source.name(), sql = %sql, "planned delete");
    Ok((sql, binds))
}
