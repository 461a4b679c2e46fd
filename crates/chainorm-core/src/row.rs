//! Database rows and their materialization.
//!
//! Storage hands back [`Row`]s positionally matching the compiled SELECT list.
//! A [`Projection`] names each position, and an [`Inflate`] implementation
//! turns the pair into an application object ([`Record`] by default).

use crate::Result;
use crate::error::{Error, TypeError};
use crate::value::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Result-column names of a compiled statement, in SELECT-list order.
///
/// Cheap to clone; every record materialized from one statement shares it.
/// A repeated name resolves to its first position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection {
    inner: Arc<Names>,
}

#[derive(Debug, Default, PartialEq, Eq)]
struct Names {
    ordered: Vec<String>,
    positions: HashMap<String, usize>,
}

impl Projection {
    pub fn new(names: Vec<String>) -> Self {
        let mut positions = HashMap::with_capacity(names.len());
        for (pos, name) in names.iter().enumerate() {
            positions.entry(name.clone()).or_insert(pos);
        }
        Self {
            inner: Arc::new(Names {
                ordered: names,
                positions,
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.ordered.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.inner.ordered
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.inner.positions.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.positions.contains_key(name)
    }

    /// Fail with [`Error::MissingColumn`] unless `name` is projected.
    #[allow(clippy::result_large_err)]
    pub fn require(&self, name: &str) -> Result<usize> {
        self.index_of(name)
            .ok_or_else(|| Error::missing_column(name, self.names().to_vec()))
    }
}

/// Raw positional values as storage returned them.
///
/// Storage may attach its own labels; materialization ignores them and
/// relies on the compiled [`Projection`] instead.
#[derive(Debug, Clone, Default)]
pub struct Row {
    values: Vec<Value>,
    labels: Option<Projection>,
}

impl Row {
    pub fn new(labels: Vec<String>, values: Vec<Value>) -> Self {
        Self {
            values,
            labels: Some(Projection::new(labels)),
        }
    }

    pub fn from_values(values: Vec<Value>) -> Self {
        Self {
            values,
            labels: None,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Lookup by storage label, if storage supplied any.
    pub fn get_by_label(&self, label: &str) -> Option<&Value> {
        let idx = self.labels.as_ref()?.index_of(label)?;
        self.values.get(idx)
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

/// Materialization collaborator: turns a raw row into an object.
pub trait Inflate: Sized {
    #[allow(clippy::result_large_err)]
    fn inflate(row: Row, projection: &Projection) -> Result<Self>;
}

/// Default materialized object: values addressed by projected name.
#[derive(Debug, Clone)]
pub struct Record {
    values: Vec<Value>,
    projection: Projection,
}

impl Record {
    /// Get a column value; columns outside the projection are an error.
    #[allow(clippy::result_large_err)]
    pub fn get_column(&self, name: &str) -> Result<&Value> {
        let idx = self.projection.require(name)?;
        Ok(&self.values[idx])
    }

    /// Typed access through `TryFrom<Value>`.
    #[allow(clippy::result_large_err)]
    pub fn get_as<T>(&self, name: &str) -> Result<T>
    where
        T: TryFrom<Value, Error = Error>,
    {
        let value = self.get_column(name)?.clone();
        T::try_from(value).map_err(|e| match e {
            Error::Type(mut te) => {
                te.column = Some(name.to_string());
                Error::Type(te)
            }
            e => e,
        })
    }

    /// Iterate over (column_name, value) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.projection
            .names()
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }
}

impl Inflate for Record {
    fn inflate(row: Row, projection: &Projection) -> Result<Self> {
        if row.len() != projection.len() {
            return Err(Error::Type(TypeError {
                expected: "row matching the selected columns",
                actual: format!(
                    "{} values for {} selected columns",
                    row.len(),
                    projection.len()
                ),
                column: None,
            }));
        }
        Ok(Self {
            values: row.into_values(),
            projection: projection.clone(),
        })
    }
}

impl Inflate for Row {
    fn inflate(row: Row, _projection: &Projection) -> Result<Self> {
        Ok(row)
    }
}
