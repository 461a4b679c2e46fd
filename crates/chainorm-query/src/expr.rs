//! Condition and select-list expressions.
//!
//! Expressions are used for search conditions, HAVING, GROUP BY, computed
//! select entries and ORDER BY. Column references are resolved against the
//! aliases of the statement being compiled: an unqualified column belongs to
//! the root alias (`me`), and a qualifier naming a joined relationship is
//! mapped to the alias allocated for that join.

use crate::alias::Scope;
use crate::clause::{OrderBy, OrderDirection};
use chainorm_core::Value;
use serde::Deserialize;

/// Target SQL dialect.
///
/// Decides placeholder syntax, identifier quote characters and the few
/// operators that differ between engines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// `$1, $2, ...`
    #[default]
    Postgres,
    /// `?1, ?2, ...`
    Sqlite,
    /// bare `?`
    Mysql,
}

impl Dialect {
    /// Placeholder for the 1-based bind `index`.
    pub fn placeholder(self, index: usize) -> String {
        match self {
            Dialect::Postgres => format!("${index}"),
            Dialect::Sqlite => format!("?{index}"),
            Dialect::Mysql => String::from("?"),
        }
    }

    pub const fn supports_ilike(self) -> bool {
        matches!(self, Dialect::Postgres)
    }

    /// Quote `name`, doubling embedded quote characters.
    pub fn quote_identifier(self, name: &str) -> String {
        match self {
            Dialect::Mysql => chainorm_core::quote_ident_mysql(name),
            Dialect::Postgres | Dialect::Sqlite => chainorm_core::quote_ident(name),
        }
    }
}

/// Everything an expression needs to render itself.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    pub dialect: Dialect,
    /// Quote identifiers with the dialect's quote characters.
    pub quote: bool,
    /// Qualifier resolution for column references.
    pub scope: &'a Scope,
}

impl RenderContext<'_> {
    /// Render an identifier, quoting it when configured.
    pub fn ident(&self, name: &str) -> String {
        if self.quote {
            self.dialect.quote_identifier(name)
        } else {
            name.to_string()
        }
    }

    /// Render `alias.column`.
    pub fn qualified(&self, alias: &str, column: &str) -> String {
        format!("{}.{}", self.ident(alias), self.ident(column))
    }
}

/// Substitute `?` placeholders of a raw fragment with dialect placeholders,
/// appending the fragment's binds to `params`.
///
/// `?` inside single-quoted string literals is left alone. Placeholders
/// without a matching bind are emitted unchanged.
pub fn renumber_placeholders(
    sql: &str,
    binds: &[Value],
    dialect: Dialect,
    params: &mut Vec<Value>,
) -> String {
    let mut out = String::with_capacity(sql.len() + binds.len() * 2);
    let mut binds = binds.iter();
    let mut in_string = false;
    for ch in sql.chars() {
        match ch {
            '\'' => {
                in_string = !in_string;
                out.push(ch);
            }
            '?' if !in_string => match binds.next() {
                Some(value) => {
                    params.push(value.clone());
                    out.push_str(&dialect.placeholder(params.len()));
                }
                None => out.push(ch),
            },
            _ => out.push(ch),
        }
    }
    // Surplus binds still travel with the statement, in order.
    params.extend(binds.cloned());
    out
}

/// Expression tree.
///
/// Literals are always bound, never inlined. `Raw` is the escape hatch for
/// SQL the tree cannot express; its `?` placeholders are renumbered into the
/// statement's bind sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `qualifier.name`; no qualifier means the root source
    Column { table: Option<String>, name: String },
    Literal(Value),
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    Unary { op: UnaryOp, expr: Box<Expr> },
    Function { name: String, args: Vec<Expr> },
    In {
        expr: Box<Expr>,
        values: Vec<Expr>,
        negated: bool,
    },
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
        negated: bool,
    },
    IsNull { expr: Box<Expr>, negated: bool },
    Like {
        expr: Box<Expr>,
        pattern: String,
        negated: bool,
        case_insensitive: bool,
    },
    Raw { sql: String, binds: Vec<Value> },
    Paren(Box<Expr>),
    CountStar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Add,
    Sub,
    Mul,
    Div,
    /// `||`, or `CONCAT()` on MySQL
    Concat,
}

impl BinaryOp {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::And => "AND",
            Self::Or => "OR",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Concat => "||",
        }
    }

    /// Binding strength; an operand binding looser than its parent is
    /// parenthesized.
    pub const fn precedence(self) -> u8 {
        match self {
            Self::Or => 1,
            Self::And => 2,
            Self::Eq | Self::Ne | Self::Lt | Self::Le | Self::Gt | Self::Ge => 3,
            Self::Add | Self::Sub | Self::Concat => 4,
            Self::Mul | Self::Div => 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

/// `fn name(self, other) -> Expr` for each binary operator.
macro_rules! binary_methods {
    ($($(#[$meta:meta])* $name:ident => $op:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            pub fn $name(self, other: impl Into<Expr>) -> Self {
                Expr::Binary {
                    left: Box::new(self),
                    op: BinaryOp::$op,
                    right: Box::new(other.into()),
                }
            }
        )*
    };
}

/// `fn name(self) -> Expr` wrapping `self` in a one-argument SQL function.
macro_rules! function_methods {
    ($($name:ident => $sql:literal),* $(,)?) => {
        $(
            pub fn $name(self) -> Self {
                Expr::function($sql, vec![self])
            }
        )*
    };
}

impl Expr {
    /// Column reference; `cds.title` is split into qualifier and column.
    pub fn col(name: impl Into<String>) -> Self {
        let name = name.into();
        match name.split_once('.') {
            Some((table, column)) => Expr::qualified(table, column),
            None => Expr::Column { table: None, name },
        }
    }

    pub fn qualified(table: impl Into<String>, column: impl Into<String>) -> Self {
        Expr::Column {
            table: Some(table.into()),
            name: column.into(),
        }
    }

    pub fn lit(value: impl Into<Value>) -> Self {
        Expr::Literal(value.into())
    }

    pub fn null() -> Self {
        Expr::Literal(Value::Null)
    }

    /// Raw SQL emitted as written.
    pub fn raw(sql: impl Into<String>) -> Self {
        Expr::raw_with(sql, Vec::new())
    }

    /// Raw SQL with `?` placeholders bound to `binds` in order.
    pub fn raw_with(sql: impl Into<String>, binds: Vec<Value>) -> Self {
        Expr::Raw {
            sql: sql.into(),
            binds,
        }
    }

    pub fn function(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Function {
            name: name.into(),
            args,
        }
    }

    pub fn count_star() -> Self {
        Expr::CountStar
    }

    binary_methods! {
        eq => Eq,
        ne => Ne,
        lt => Lt,
        le => Le,
        gt => Gt,
        ge => Ge,
        and => And,
        or => Or,
        add => Add,
        sub => Sub,
        mul => Mul,
        div => Div,
        /// Rendered as `CONCAT(a, b)` for MySQL.
        concat => Concat,
    }

    function_methods! {
        count => "COUNT",
        sum => "SUM",
        avg => "AVG",
        min => "MIN",
        max => "MAX",
        upper => "UPPER",
        lower => "LOWER",
    }

    fn unary(self, op: UnaryOp) -> Self {
        Expr::Unary {
            op,
            expr: Box::new(self),
        }
    }

    pub fn not(self) -> Self {
        self.unary(UnaryOp::Not)
    }

    pub fn neg(self) -> Self {
        self.unary(UnaryOp::Neg)
    }

    pub fn is_null(self) -> Self {
        Expr::IsNull {
            expr: Box::new(self),
            negated: false,
        }
    }

    pub fn is_not_null(self) -> Self {
        Expr::IsNull {
            expr: Box::new(self),
            negated: true,
        }
    }

    fn pattern(self, pattern: impl Into<String>, negated: bool, case_insensitive: bool) -> Self {
        Expr::Like {
            expr: Box::new(self),
            pattern: pattern.into(),
            negated,
            case_insensitive,
        }
    }

    pub fn like(self, pattern: impl Into<String>) -> Self {
        self.pattern(pattern, false, false)
    }

    pub fn not_like(self, pattern: impl Into<String>) -> Self {
        self.pattern(pattern, true, false)
    }

    /// `ILIKE` on Postgres, `LOWER(a) LIKE LOWER(b)` elsewhere.
    pub fn ilike(self, pattern: impl Into<String>) -> Self {
        self.pattern(pattern, false, true)
    }

    fn membership(self, values: Vec<impl Into<Expr>>, negated: bool) -> Self {
        Expr::In {
            expr: Box::new(self),
            values: values.into_iter().map(Into::into).collect(),
            negated,
        }
    }

    pub fn in_list(self, values: Vec<impl Into<Expr>>) -> Self {
        self.membership(values, false)
    }

    pub fn not_in_list(self, values: Vec<impl Into<Expr>>) -> Self {
        self.membership(values, true)
    }

    pub fn between(self, low: impl Into<Expr>, high: impl Into<Expr>) -> Self {
        Expr::Between {
            expr: Box::new(self),
            low: Box::new(low.into()),
            high: Box::new(high.into()),
            negated: false,
        }
    }

    pub fn asc(self) -> OrderBy {
        OrderBy::new(self, OrderDirection::Asc)
    }

    pub fn desc(self) -> OrderBy {
        OrderBy::new(self, OrderDirection::Desc)
    }

    pub fn paren(self) -> Self {
        Expr::Paren(Box::new(self))
    }

    /// Split a tree of ANDs into its conjuncts.
    pub(crate) fn into_conjuncts(self, out: &mut Vec<Expr>) {
        match self {
            Expr::Binary {
                left,
                op: BinaryOp::And,
                right,
            } => {
                left.into_conjuncts(out);
                right.into_conjuncts(out);
            }
            Expr::Paren(inner) if matches!(*inner, Expr::Binary { op: BinaryOp::And, .. }) => {
                inner.into_conjuncts(out);
            }
            other => out.push(other),
        }
    }

    /// Render as an operand of an operator with precedence `parent`.
    fn build_operand(&self, parent: u8, cx: &RenderContext<'_>, params: &mut Vec<Value>) -> String {
        let sql = self.build(cx, params);
        match self {
            Expr::Binary { op, .. } if op.precedence() < parent => format!("({sql})"),
            _ => sql,
        }
    }

    /// Render against `cx`, appending bind values to `params`.
    ///
    /// Placeholders are numbered from the current length of `params`, so a
    /// whole statement rendered into one vector gets binds in textual order.
    pub fn build(&self, cx: &RenderContext<'_>, params: &mut Vec<Value>) -> String {
        let not = |negated: bool| if negated { "NOT " } else { "" };
        match self {
            Expr::Column { table, name } => cx.qualified(cx.scope.resolve(table.as_deref()), name),

            Expr::Literal(value) => {
                params.push(value.clone());
                cx.dialect.placeholder(params.len())
            }

            Expr::Binary { left, op, right } => {
                let lhs = left.build_operand(op.precedence(), cx, params);
                let rhs = right.build_operand(op.precedence() + 1, cx, params);
                match (op, cx.dialect) {
                    (BinaryOp::Concat, Dialect::Mysql) => format!("CONCAT({lhs}, {rhs})"),
                    _ => format!("{lhs} {} {rhs}", op.as_str()),
                }
            }

            Expr::Unary { op, expr } => {
                let operand = expr.build_operand(u8::MAX, cx, params);
                match op {
                    UnaryOp::Not => format!("NOT {operand}"),
                    UnaryOp::Neg => format!("-{operand}"),
                }
            }

            Expr::Function { name, args } => {
                let args: Vec<String> = args.iter().map(|a| a.build(cx, params)).collect();
                format!("{name}({})", args.join(", "))
            }

            Expr::In { expr, values, negated } => {
                let lhs = expr.build(cx, params);
                let list: Vec<String> = values.iter().map(|v| v.build(cx, params)).collect();
                format!("{lhs} {}IN ({})", not(*negated), list.join(", "))
            }

            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => {
                let lhs = expr.build(cx, params);
                let low = low.build(cx, params);
                let high = high.build(cx, params);
                format!("{lhs} {}BETWEEN {low} AND {high}", not(*negated))
            }

            Expr::IsNull { expr, negated } => {
                let lhs = expr.build(cx, params);
                if *negated {
                    format!("{lhs} IS NOT NULL")
                } else {
                    format!("{lhs} IS NULL")
                }
            }

            Expr::Like {
                expr,
                pattern,
                negated,
                case_insensitive,
            } => {
                let lhs = expr.build(cx, params);
                params.push(Value::Text(pattern.clone()));
                let rhs = cx.dialect.placeholder(params.len());
                match (*case_insensitive, cx.dialect.supports_ilike()) {
                    (true, false) => format!("LOWER({lhs}) {}LIKE LOWER({rhs})", not(*negated)),
                    (true, true) => format!("{lhs} {}ILIKE {rhs}", not(*negated)),
                    (false, _) => format!("{lhs} {}LIKE {rhs}", not(*negated)),
                }
            }

            Expr::Raw { sql, binds } => renumber_placeholders(sql, binds, cx.dialect, params),

            Expr::Paren(inner) => format!("({})", inner.build(cx, params)),

            Expr::CountStar => String::from("COUNT(*)"),
        }
    }

    /// Render standalone: root scope, default dialect, no quoting.
    pub fn to_sql(&self) -> (String, Vec<Value>) {
        let scope = Scope::root();
        let cx = RenderContext {
            dialect: Dialect::default(),
            quote: false,
            scope: &scope,
        };
        let mut params = Vec::new();
        let sql = self.build(&cx, &mut params);
        (sql, params)
    }
}

/// Plain values become bound literals.
macro_rules! literal_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Expr {
                fn from(value: $ty) -> Self {
                    Expr::Literal(Value::from(value))
                }
            }
        )*
    };
}

literal_from!(&str, String, i32, i64, bool, f64);

impl From<Value> for Expr {
    fn from(value: Value) -> Self {
        Expr::Literal(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sql_with(expr: &Expr, dialect: Dialect, quote: bool) -> (String, Vec<Value>) {
        let scope = Scope::root();
        let cx = RenderContext {
            dialect,
            quote,
            scope: &scope,
        };
        let mut params = Vec::new();
        let sql = expr.build(&cx, &mut params);
        (sql, params)
    }

    #[test]
    fn bare_column_belongs_to_root() {
        let (sql, params) = Expr::col("name").to_sql();
        assert_eq!(sql, "me.name");
        assert!(params.is_empty());
    }

    #[test]
    fn dotted_column_is_qualified() {
        assert_eq!(Expr::col("cds.title"), Expr::qualified("cds", "title"));
        assert_eq!(Expr::col("cds.title").to_sql().0, "cds.title");
    }

    #[test]
    fn relationship_qualifier_maps_to_join_alias() {
        let mut scope = Scope::root();
        scope.rename("cds", "cds_2");
        let cx = RenderContext {
            dialect: Dialect::Postgres,
            quote: false,
            scope: &scope,
        };
        let mut params = Vec::new();
        assert_eq!(Expr::col("cds.year").build(&cx, &mut params), "cds_2.year");
    }

    #[test]
    fn quoted_column() {
        let (sql, _) = sql_with(&Expr::col("name"), Dialect::Postgres, true);
        assert_eq!(sql, "\"me\".\"name\"");
        let (sql, _) = sql_with(&Expr::col("name"), Dialect::Mysql, true);
        assert_eq!(sql, "`me`.`name`");
    }

    #[test]
    fn literal_is_bound() {
        let (sql, params) = Expr::col("rank").gt(42).to_sql();
        assert_eq!(sql, "me.rank > $1");
        assert_eq!(params, vec![Value::Int(42)]);
    }

    #[test]
    fn or_under_and_is_parenthesized() {
        let expr = Expr::col("a").eq(1).or(Expr::col("b").eq(2)).and(Expr::col("c").eq(3));
        let (sql, params) = expr.to_sql();
        assert_eq!(sql, "(me.a = $1 OR me.b = $2) AND me.c = $3");
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn in_and_between() {
        let (sql, params) = Expr::col("cdid").in_list(vec![1, 2, 3]).to_sql();
        assert_eq!(sql, "me.cdid IN ($1, $2, $3)");
        assert_eq!(params.len(), 3);

        let (sql, _) = Expr::col("year").between(1990, 1999).to_sql();
        assert_eq!(sql, "me.year BETWEEN $1 AND $2");
    }

    #[test]
    fn null_checks() {
        assert_eq!(Expr::col("producer").is_null().to_sql().0, "me.producer IS NULL");
        assert_eq!(Expr::col("producer").is_not_null().to_sql().0, "me.producer IS NOT NULL");
    }

    #[test]
    fn ilike_falls_back_to_lower() {
        let (sql, _) = sql_with(&Expr::col("name").ilike("%a%"), Dialect::Sqlite, false);
        assert_eq!(sql, "LOWER(me.name) LIKE LOWER(?1)");
        let (sql, _) = Expr::col("name").ilike("%a%").to_sql();
        assert_eq!(sql, "me.name ILIKE $1");
    }

    #[test]
    fn raw_fragment_renumbered() {
        let expr = Expr::col("cdid").gt(5).and(Expr::raw_with("year > ? AND note <> '?'", vec![Value::Int(1990)]));
        let (sql, params) = expr.to_sql();
        assert_eq!(sql, "me.cdid > $1 AND year > $2 AND note <> '?'");
        assert_eq!(params, vec![Value::Int(5), Value::Int(1990)]);
    }

    #[test]
    fn aggregates() {
        assert_eq!(Expr::count_star().to_sql().0, "COUNT(*)");
        assert_eq!(Expr::col("cdid").count().to_sql().0, "COUNT(me.cdid)");
        assert_eq!(Expr::col("year").max().to_sql().0, "MAX(me.year)");
    }

    #[test]
    fn mysql_concat_and_placeholders() {
        let expr = Expr::col("first").concat(Expr::col("last")).eq("ab");
        let (sql, _) = sql_with(&expr, Dialect::Mysql, false);
        assert_eq!(sql, "CONCAT(me.first, me.last) = ?");
    }

    #[test]
    fn conjuncts_flatten_nested_and() {
        let mut out = Vec::new();
        Expr::col("a").eq(1).and(Expr::col("b").eq(2).and(Expr::col("c").eq(3))).into_conjuncts(&mut out);
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn not_wraps_binary() {
        let (sql, _) = Expr::col("a").eq(1).not().to_sql();
        assert_eq!(sql, "NOT (me.a = $1)");
    }
}
