//! Result set chaining and SQL compilation for chainorm.
//!
//! `chainorm-query` is the **query construction layer**. It turns a schema of
//! result sources into chainable [`ResultSet`] handles and compiles their
//! accumulated conditions and attributes into one SQL statement plus ordered
//! bind values.
//!
//! # Role In The Architecture
//!
//! - **Schema registry**: `Schema` maps monikers to sources and resolves
//!   relationship declarations as they are made.
//! - **Attribute merging**: `Attributes` carries columns, `+select`/`+as`
//!   lists, joins and clauses across chain steps.
//! - **Compilation**: joins are planned with a fresh alias table per
//!   statement; the root is always `me`.
//! - **Cascades**: deletes follow `cascade_delete` relationships.
//!
//! Compiled statements execute through the `Storage` trait from
//! `chainorm-core`. Most users reach these types via the `chainorm` facade.

pub mod alias;
pub mod attrs;
mod cascade;
pub mod clause;
mod compile;
pub mod expr;
pub mod join;
pub mod resultset;
pub mod schema;

pub use alias::{AliasTable, ROOT_ALIAS, Scope};
pub use attrs::{Attributes, FromSource, OrderList, SelectItem};
pub use clause::{NullsOrder, OrderBy, OrderDirection};
pub use compile::CompiledQuery;
pub use expr::{BinaryOp, Dialect, Expr, RenderContext, UnaryOp};
pub use join::JoinSpec;
pub use resultset::{ColumnResultSet, Cursor, ResultSet};
pub use schema::{Schema, SchemaBuilder, SchemaConfig};

pub use chainorm_core::{Error, Record, Result, ResultSource, Storage, Value};
