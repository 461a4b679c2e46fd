//! The attribute bag carried by a result set and its merge policy.
//!
//! | Attribute | Policy on merge |
//! |---|---|
//! | `columns`, `select`/`as` | replace; a new selector also drops inherited `+` lists |
//! | `+columns`, `+select`/`+as` | append, order preserved |
//! | `join` | recursive union |
//! | everything else | replace if given, else inherit |

use crate::expr::Expr;
use crate::clause::OrderBy;
use crate::join::JoinSpec;
use crate::resultset::ResultSet;
use chainorm_core::error::CompilationErrorKind;
use chainorm_core::{Error, Result, Value};

/// Replacement for the normal `FROM <table> me` clause.
#[derive(Debug, Clone)]
pub enum FromSource {
    /// Raw SQL, emitted verbatim (binds renumbered like raw expressions).
    Raw { sql: String, binds: Vec<Value> },
    /// A compiled result set used as a derived table.
    Subselect(Box<ResultSet>),
}

/// Chainable query attributes.
///
/// ```
/// use chainorm_query::{Attributes, Expr};
///
/// let attrs = Attributes::new()
///     .join("cds")
///     .add_select(Expr::count_star())
///     .add_as("cnt")
///     .group_by(["me.id", "me.name"])
///     .order_by(Expr::count_star().desc());
/// # let _ = attrs;
/// ```
#[derive(Debug, Clone, Default)]
pub struct Attributes {
    pub(crate) columns: Option<Vec<String>>,
    pub(crate) plus_columns: Vec<String>,
    pub(crate) select: Option<Vec<Expr>>,
    pub(crate) as_names: Option<Vec<String>>,
    pub(crate) plus_select: Vec<Expr>,
    pub(crate) plus_as: Vec<String>,
    pub(crate) join: JoinSpec,
    pub(crate) order_by: Option<Vec<OrderBy>>,
    pub(crate) group_by: Option<Vec<Expr>>,
    pub(crate) having: Option<Expr>,
    pub(crate) limit: Option<u64>,
    pub(crate) offset: Option<u64>,
    pub(crate) rows: Option<u64>,
    pub(crate) page: Option<u64>,
    pub(crate) distinct: Option<bool>,
    pub(crate) from: Option<FromSource>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Columns to select; bare names belong to `me`.
    #[must_use]
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// `+columns`: append to the inherited column list.
    #[must_use]
    pub fn add_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.plus_columns.extend(columns.into_iter().map(Into::into));
        self
    }

    /// Explicit select list, replacing the default column list.
    #[must_use]
    pub fn select<I, E>(mut self, exprs: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<SelectItem>,
    {
        self.select = Some(exprs.into_iter().map(|e| e.into().0).collect());
        self
    }

    /// Result names for `select`, positionally.
    #[must_use]
    pub fn as_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.as_names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// `+select`: append a select entry. Strings are raw SQL.
    #[must_use]
    pub fn add_select(mut self, expr: impl Into<SelectItem>) -> Self {
        self.plus_select.push(expr.into().0);
        self
    }

    /// `+as`: append a result name, paired positionally with `+select`.
    #[must_use]
    pub fn add_as(mut self, name: impl Into<String>) -> Self {
        self.plus_as.push(name.into());
        self
    }

    #[must_use]
    pub fn join(mut self, spec: impl Into<JoinSpec>) -> Self {
        self.join.merge(&spec.into());
        self
    }

    #[must_use]
    pub fn order_by(mut self, order: impl Into<OrderList>) -> Self {
        self.order_by = Some(order.into().0);
        self
    }

    #[must_use]
    pub fn group_by<I, E>(mut self, exprs: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<SelectItem>,
    {
        let exprs = exprs.into_iter().map(|e| e.into().0).collect();
        self.group_by = Some(exprs);
        self
    }

    #[must_use]
    pub fn having(mut self, expr: Expr) -> Self {
        self.having = Some(expr);
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Page size for [`page`](Self::page).
    #[must_use]
    pub fn rows(mut self, rows: u64) -> Self {
        self.rows = Some(rows);
        self
    }

    /// 1-based page number; needs `rows`.
    #[must_use]
    pub fn page(mut self, page: u64) -> Self {
        self.page = Some(page);
        self
    }

    #[must_use]
    pub fn distinct(mut self, distinct: bool) -> Self {
        self.distinct = Some(distinct);
        self
    }

    /// Replace FROM/JOIN generation with a raw fragment.
    #[must_use]
    pub fn from_raw(mut self, sql: impl Into<String>, binds: Vec<Value>) -> Self {
        self.from = Some(FromSource::Raw {
            sql: sql.into(),
            binds,
        });
        self
    }

    /// Select from another result set as a derived table.
    #[must_use]
    pub fn from_subselect(mut self, rs: &ResultSet) -> Self {
        self.from = Some(FromSource::Subselect(Box::new(rs.clone())));
        self
    }

    pub fn join_spec(&self) -> &JoinSpec {
        &self.join
    }

    fn has_selector(&self) -> bool {
        self.columns.is_some() || self.select.is_some()
    }

    /// Effective LIMIT and OFFSET, with `rows`/`page` folded in.
    #[allow(clippy::result_large_err)]
    pub(crate) fn window(&self) -> Result<(Option<u64>, Option<u64>)> {
        let Some(rows) = self.rows else {
            return Ok((self.limit, self.offset));
        };
        let page = self.page.unwrap_or(1).max(1);
        let skip = (page - 1)
            .checked_mul(rows)
            .and_then(|n| n.checked_add(self.offset.unwrap_or(0)))
            .ok_or_else(|| {
                Error::compilation(
                    CompilationErrorKind::InvalidWindow,
                    format!("page {page} of {rows} rows overflows the offset"),
                )
            })?;
        Ok((Some(rows), (skip > 0).then_some(skip)))
    }

    /// Whether traversing to a related set must wrap this state in a subselect.
    pub(crate) fn restricts_rows(&self) -> bool {
        self.rows.is_some()
            || self.limit.is_some()
            || self.offset.is_some()
            || self.group_by.is_some()
            || self.having.is_some()
            || self.distinct == Some(true)
            || self.from.is_some()
    }

    /// Merge `new` over `self`, producing a fresh attribute bag.
    pub fn merge(&self, new: &Attributes) -> Attributes {
        let mut merged = if new.has_selector() {
            Attributes {
                columns: new.columns.clone(),
                select: new.select.clone(),
                as_names: new.as_names.clone(),
                ..self.clone()
            }
            .without_plus_lists()
        } else {
            self.clone()
        };

        merged.plus_columns.extend(new.plus_columns.iter().cloned());
        merged.plus_select.extend(new.plus_select.iter().cloned());
        merged.plus_as.extend(new.plus_as.iter().cloned());
        merged.join.merge(&new.join);

        macro_rules! replace_if_given {
            ($($field:ident),*) => {
                $(if new.$field.is_some() {
                    merged.$field = new.$field.clone();
                })*
            };
        }
        replace_if_given!(order_by, group_by, having, limit, offset, rows, page, distinct, from);

        merged
    }

    fn without_plus_lists(mut self) -> Self {
        self.plus_columns.clear();
        self.plus_select.clear();
        self.plus_as.clear();
        self
    }
}

/// A select-list entry: an expression, or a string that is either a column
/// name (`name`, `cds.title`) or raw SQL (`COUNT(*)`).
#[derive(Debug, Clone, PartialEq)]
pub struct SelectItem(pub(crate) Expr);

fn looks_like_column(s: &str) -> bool {
    let mut parts = s.split('.');
    let ok = |p: Option<&str>| p.is_some_and(chainorm_core::identifiers::is_identifier);
    match s.matches('.').count() {
        0 => ok(parts.next()),
        1 => ok(parts.next()) && ok(parts.next()),
        _ => false,
    }
}

impl From<&str> for SelectItem {
    fn from(s: &str) -> Self {
        if looks_like_column(s) {
            SelectItem(Expr::col(s))
        } else {
            SelectItem(Expr::raw(s))
        }
    }
}

impl From<String> for SelectItem {
    fn from(s: String) -> Self {
        SelectItem::from(s.as_str())
    }
}

impl From<Expr> for SelectItem {
    fn from(e: Expr) -> Self {
        SelectItem(e)
    }
}

/// One ORDER BY term or a list of them.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderList(pub(crate) Vec<OrderBy>);

impl From<&str> for OrderList {
    fn from(spec: &str) -> Self {
        OrderList(vec![spec.into()])
    }
}

impl From<OrderBy> for OrderList {
    fn from(order: OrderBy) -> Self {
        OrderList(vec![order])
    }
}

impl From<Expr> for OrderList {
    fn from(expr: Expr) -> Self {
        OrderList(vec![expr.into()])
    }
}

impl<T: Into<OrderBy>> From<Vec<T>> for OrderList {
    fn from(terms: Vec<T>) -> Self {
        OrderList(terms.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<OrderBy>, const N: usize> From<[T; N]> for OrderList {
    fn from(terms: [T; N]) -> Self {
        OrderList(terms.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plus_lists_append_in_order() {
        let a = Attributes::new().add_select("COUNT(*)").add_as("cnt");
        let b = Attributes::new().add_select(Expr::col("year").max()).add_as("latest");
        let merged = a.merge(&b);
        assert_eq!(merged.plus_as, vec!["cnt", "latest"]);
        assert_eq!(merged.plus_select[0], Expr::raw("COUNT(*)"));
    }

    #[test]
    fn new_selector_drops_inherited_lists() {
        let a = Attributes::new().columns(["id", "name"]).add_columns(["year"]).add_select("1").add_as("one");
        let b = Attributes::new().columns(["id"]);
        let merged = a.merge(&b);
        assert_eq!(merged.columns, Some(vec!["id".to_string()]));
        assert!(merged.plus_columns.is_empty());
        assert!(merged.plus_select.is_empty());
        assert!(merged.plus_as.is_empty());
    }

    #[test]
    fn scalars_replace_or_inherit() {
        let a = Attributes::new().order_by("name").limit(10);
        let b = Attributes::new().order_by(["year DESC", "name"]);
        let merged = a.merge(&b);
        assert_eq!(merged.order_by.as_ref().map(Vec::len), Some(2));
        assert_eq!(merged.limit, Some(10));
    }

    #[test]
    fn joins_union() {
        let a = Attributes::new().join("cds");
        let b = Attributes::new().join("cds.tracks").join("producer");
        let merged = a.merge(&b);
        assert_eq!(merged.join.paths(), vec!["cds", "cds.tracks", "producer"]);
        // the left side is untouched
        assert_eq!(a.join.paths(), vec!["cds"]);
    }

    #[test]
    fn page_and_rows_fold_into_window() {
        let attrs = Attributes::new().rows(10).page(3);
        assert_eq!(attrs.window().unwrap(), (Some(10), Some(20)));
        let attrs = Attributes::new().rows(10);
        assert_eq!(attrs.window().unwrap(), (Some(10), None));
        let attrs = Attributes::new().limit(5).offset(2);
        assert_eq!(attrs.window().unwrap(), (Some(5), Some(2)));
    }

    #[test]
    fn oversized_page_is_rejected() {
        let err = Attributes::new().rows(u64::MAX).page(3).window().unwrap_err();
        assert!(matches!(
            err,
            Error::Compilation(ref e) if e.kind == CompilationErrorKind::InvalidWindow
        ));
        let err = Attributes::new().rows(2).page(2).offset(u64::MAX).window().unwrap_err();
        assert!(err.is_compilation());
    }

    #[test]
    fn select_items_distinguish_columns_from_raw() {
        assert_eq!(SelectItem::from("cds.title").0, Expr::qualified("cds", "title"));
        assert_eq!(SelectItem::from("name").0, Expr::col("name"));
        assert_eq!(SelectItem::from("COUNT(*)").0, Expr::raw("COUNT(*)"));
        assert_eq!(SelectItem::from("a.b.c").0, Expr::raw("a.b.c"));
    }
}
