//! The storage collaborator.
//!
//! Result sets never talk to a database directly. Compiled statements are
//! handed to a [`Storage`] implementation that returns rows positionally
//! matching the SELECT list.

use crate::Result;
use crate::row::Row;
use crate::value::Value;
use std::sync::Arc;

/// Executes compiled SQL.
///
/// # Example
///
/// ```rust,ignore
/// let rows = storage.query("SELECT me.id FROM artist me WHERE me.id = $1", &[Value::BigInt(1)])?;
/// ```
pub trait Storage: Send + Sync {
    /// Execute a query and return all rows.
    #[allow(clippy::result_large_err)]
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>>;

    /// Execute a statement (UPDATE, DELETE) and return rows affected.
    #[allow(clippy::result_large_err)]
    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64>;

    /// Execute statements in order, stopping at the first failure.
    #[allow(clippy::result_large_err)]
    fn batch(&self, statements: &[(String, Vec<Value>)]) -> Result<Vec<u64>> {
        statements
            .iter()
            .map(|(sql, params)| self.execute(sql, params))
            .collect()
    }
}

impl<S: Storage + ?Sized> Storage for &S {
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        (**self).query(sql, params)
    }

    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        (**self).execute(sql, params)
    }

    fn batch(&self, statements: &[(String, Vec<Value>)]) -> Result<Vec<u64>> {
        (**self).batch(statements)
    }
}

impl<S: Storage + ?Sized> Storage for Arc<S> {
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        (**self).query(sql, params)
    }

    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        (**self).execute(sql, params)
    }

    fn batch(&self, statements: &[(String, Vec<Value>)]) -> Result<Vec<u64>> {
        (**self).batch(statements)
    }
}
