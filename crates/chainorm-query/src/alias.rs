//! Per-compilation alias allocation.
//!
//! The root source is always aliased [`ROOT_ALIAS`]. Every joined
//! relationship gets an alias derived from its name; the same relationship
//! requested twice from the same parent alias shares one alias, while
//! distinct paths that would collide are suffixed (`_2`, `_3`, ...).

use std::collections::{HashMap, HashSet};

/// Reserved alias of the root source.
pub const ROOT_ALIAS: &str = "me";

/// Alias table built fresh for every compiled statement.
#[derive(Debug, Clone)]
pub struct AliasTable {
    used: HashSet<String>,
    by_path: HashMap<(String, String), String>,
}

impl Default for AliasTable {
    fn default() -> Self {
        Self::new()
    }
}

impl AliasTable {
    pub fn new() -> Self {
        let mut used = HashSet::new();
        used.insert(ROOT_ALIAS.to_string());
        Self {
            used,
            by_path: HashMap::new(),
        }
    }

    /// Claim a unique alias based on `base`.
    pub fn reserve(&mut self, base: &str) -> String {
        let mut candidate = base.to_string();
        let mut n = 2;
        while self.used.contains(&candidate) {
            candidate = format!("{base}_{n}");
            n += 1;
        }
        self.used.insert(candidate.clone());
        candidate
    }

    /// Alias for `relationship` joined from `parent_alias`.
    ///
    /// Returns the alias and whether it was newly allocated.
    pub fn join_alias(&mut self, parent_alias: &str, relationship: &str) -> (String, bool) {
        let key = (parent_alias.to_string(), relationship.to_string());
        if let Some(existing) = self.by_path.get(&key) {
            return (existing.clone(), false);
        }
        let alias = self.reserve(relationship);
        tracing::trace!(parent = parent_alias, relationship, alias = %alias, "allocated join alias");
        self.by_path.insert(key, alias.clone());
        (alias, true)
    }

    pub fn get(&self, parent_alias: &str, relationship: &str) -> Option<&str> {
        self.by_path
            .get(&(parent_alias.to_string(), relationship.to_string()))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.used.len()
    }

    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }
}

/// Qualifier resolution for one level of a statement.
///
/// Unqualified columns and the `me` qualifier resolve to `root`; a
/// qualifier naming a joined relationship resolves to that join's alias.
/// Anything else is emitted as written.
#[derive(Debug, Clone)]
pub struct Scope {
    root: String,
    renames: HashMap<String, String>,
}

impl Scope {
    /// Scope of the statement root.
    pub fn root() -> Self {
        Self::new(ROOT_ALIAS)
    }

    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            renames: HashMap::new(),
        }
    }

    /// Map `qualifier` to `alias`; the first mapping for a qualifier wins.
    pub fn rename(&mut self, qualifier: impl Into<String>, alias: impl Into<String>) {
        self.renames.entry(qualifier.into()).or_insert_with(|| alias.into());
    }

    pub fn root_alias(&self) -> &str {
        &self.root
    }

    pub fn resolve<'a>(&'a self, qualifier: Option<&'a str>) -> &'a str {
        match qualifier {
            None | Some(ROOT_ALIAS) => &self.root,
            Some(q) => self.renames.get(q).map_or(q, String::as_str),
        }
    }
}
