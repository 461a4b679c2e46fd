//! Core types for chainorm.
//!
//! This crate provides the foundational pieces the query layer builds on:
//!
//! - `ResultSource` table descriptions and their `Relationship` metadata
//! - Join-condition resolution from relationship declarations
//! - `Value`, `Row` and `Record` for bind values and materialized rows
//! - `Storage`, the collaborator that executes compiled SQL
//! - `Error` and the exception-hook types

pub mod condition;
pub mod error;
pub mod identifiers;
pub mod relationship;
pub mod row;
pub mod source;
pub mod storage;
pub mod value;

pub use condition::{ConditionSpec, RelationshipDecl, default_foreign_key, resolve};
pub use error::{
    CompilationError, CompilationErrorKind, ConfigurationError, ConfigurationErrorKind, Error,
    ErrorHook, ErrorPayload, HookAction, MissingColumnError, Result, StorageError, TypeError,
};
pub use identifiers::{quote_ident, quote_ident_mysql};
pub use relationship::{
    Accessor, ColumnPair, ConditionArgs, JoinCondition, JoinType, ProceduralCondition,
    Relationship, RelationshipAttrs, RelationshipKind,
};
pub use row::{Inflate, Projection, Record, Row};
pub use source::ResultSource;
pub use storage::Storage;
pub use value::Value;
