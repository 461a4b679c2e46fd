//! chainorm - composable result sources and chainable result sets.
//!
//! chainorm describes tables as result sources, links them with named
//! relationships and builds queries as immutable result sets:
//!
//! - Relationship declarations with foreign-key inference
//! - Chainable `search` / `search_related` with per-attribute merge rules
//! - Deterministic SQL with unique join aliases and ordered binds
//! - Cascade delete planning through declared relationships
//!
//! # Quick Start
//!
//! ```
//! use chainorm::prelude::*;
//!
//! let schema = Schema::builder()
//!     .add_source(ResultSource::new("Artist").table("artist").columns(["id", "name"]).primary_key(["id"]))?
//!     .add_source(ResultSource::new("CD").table("cd").columns(["id", "artist", "title"]).primary_key(["id"]))?
//!     .has_many_on("Artist", "cds", "CD", "artist")?
//!     .build();
//!
//! let prolific = schema
//!     .resultset("Artist")?
//!     .search(
//!         None,
//!         Attributes::new()
//!             .join("cds")
//!             .add_select(Expr::col("cds.id").count())
//!             .add_as("cd_count")
//!             .group_by(["me.id", "me.name"]),
//!     );
//!
//! let (sql, _binds) = prolific.as_query()?;
//! assert_eq!(
//!     sql,
//!     "SELECT me.id, me.name, COUNT(cds.id) FROM artist me \
//!      LEFT JOIN cd cds ON cds.artist = me.id GROUP BY me.id, me.name"
//! );
//! # Ok::<(), chainorm::Error>(())
//! ```
//!
//! Nothing touches a database until an execution method (`all`, `first`,
//! `count`, `delete`, ...) is handed a [`Storage`].

pub use chainorm_core::{
    Accessor, ColumnPair, CompilationError, CompilationErrorKind, ConditionArgs, ConditionSpec,
    ConfigurationError, ConfigurationErrorKind, Error, ErrorHook, ErrorPayload, HookAction,
    Inflate, JoinCondition, JoinType, MissingColumnError, ProceduralCondition, Projection,
    Record, Relationship, RelationshipAttrs, RelationshipDecl, RelationshipKind, Result,
    ResultSource, Row, Storage, StorageError, TypeError, Value, default_foreign_key,
};

pub use chainorm_query::{
    AliasTable, Attributes, BinaryOp, ColumnResultSet, CompiledQuery, Cursor, Dialect, Expr,
    FromSource, JoinSpec, NullsOrder, OrderBy, OrderDirection, ROOT_ALIAS, ResultSet, Schema,
    SchemaBuilder, SchemaConfig, UnaryOp,
};

/// Commonly used types.
pub mod prelude {
    pub use crate::{
        Attributes, ConditionSpec, Dialect, Error, Expr, HookAction, JoinSpec, OrderBy, Record,
        RelationshipAttrs, RelationshipDecl, Result, ResultSet, ResultSource, Schema, SchemaConfig,
        Storage, Value,
    };
}
