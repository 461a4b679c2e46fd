//! ORDER BY clause types.

use crate::expr::{Expr, RenderContext};
use chainorm_core::Value;

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

/// NULLS FIRST/LAST ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullsOrder {
    First,
    Last,
}

/// One ORDER BY term.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub expr: Expr,
    pub direction: OrderDirection,
    pub nulls: Option<NullsOrder>,
}

impl OrderBy {
    pub fn new(expr: Expr, direction: OrderDirection) -> Self {
        Self {
            expr,
            direction,
            nulls: None,
        }
    }

    /// Create an ascending order by clause.
    pub fn asc(column: impl Into<String>) -> Self {
        Self::new(Expr::col(column), OrderDirection::Asc)
    }

    /// Create a descending order by clause.
    pub fn desc(column: impl Into<String>) -> Self {
        Self::new(Expr::col(column), OrderDirection::Desc)
    }

    /// Set NULLS FIRST.
    #[must_use]
    pub fn nulls_first(mut self) -> Self {
        self.nulls = Some(NullsOrder::First);
        self
    }

    /// Set NULLS LAST.
    #[must_use]
    pub fn nulls_last(mut self) -> Self {
        self.nulls = Some(NullsOrder::Last);
        self
    }

    /// Generate SQL for this ORDER BY term.
    pub fn build(&self, cx: &RenderContext<'_>, params: &mut Vec<Value>) -> String {
        let mut sql = self.expr.build(cx, params);

        sql.push_str(match self.direction {
            OrderDirection::Asc => " ASC",
            OrderDirection::Desc => " DESC",
        });

        if let Some(nulls) = self.nulls {
            sql.push_str(match nulls {
                NullsOrder::First => " NULLS FIRST",
                NullsOrder::Last => " NULLS LAST",
            });
        }

        sql
    }
}

/// `"name"`, `"me.name DESC"`, `"cds.year asc"`.
impl From<&str> for OrderBy {
    fn from(spec: &str) -> Self {
        let spec = spec.trim();
        match spec.rsplit_once(char::is_whitespace) {
            Some((column, dir)) if dir.eq_ignore_ascii_case("desc") => OrderBy::desc(column.trim_end()),
            Some((column, dir)) if dir.eq_ignore_ascii_case("asc") => OrderBy::asc(column.trim_end()),
            _ => OrderBy::asc(spec),
        }
    }
}

impl From<Expr> for OrderBy {
    fn from(expr: Expr) -> Self {
        Self::new(expr, OrderDirection::Asc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alias::Scope;
    use crate::expr::Dialect;

    fn render(order: &OrderBy) -> String {
        let scope = Scope::root();
        let cx = RenderContext {
            dialect: Dialect::Postgres,
            quote: false,
            scope: &scope,
        };
        order.build(&cx, &mut Vec::new())
    }

    #[test]
    fn test_order_parse() {
        assert_eq!(render(&OrderBy::from("name")), "me.name ASC");
        assert_eq!(render(&OrderBy::from("cds.year DESC")), "cds.year DESC");
        assert_eq!(render(&OrderBy::from("me.id  desc")), "me.id DESC");
    }

    #[test]
    fn test_order_nulls() {
        assert_eq!(render(&OrderBy::desc("rank").nulls_last()), "me.rank DESC NULLS LAST");
        assert_eq!(render(&Expr::col("rank").asc().nulls_first()), "me.rank ASC NULLS FIRST");
    }
}
