//! Join specifications.
//!
//! A [`JoinSpec`] is a tree of relationship names: each entry names a
//! relationship on the parent source and may carry nested relationships on
//! that relationship's target.
//!
//! # Example
//!
//! ```
//! use chainorm_query::JoinSpec;
//!
//! // cds, cds.tracks and producer
//! let spec = JoinSpec::from("cds.tracks").with("producer");
//! assert_eq!(spec.paths(), vec!["cds", "cds.tracks", "producer"]);
//! ```

/// Ordered tree of relationship names to join.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinSpec {
    children: Vec<(String, JoinSpec)>,
}

impl JoinSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a dotted relationship path (`"cds.tracks"`).
    #[must_use]
    pub fn with(mut self, path: &str) -> Self {
        self.add_path(path);
        self
    }

    /// Add `relationship` with nested joins below it.
    #[must_use]
    pub fn nested(mut self, relationship: impl Into<String>, nested: JoinSpec) -> Self {
        self.merge(&JoinSpec {
            children: vec![(relationship.into(), nested)],
        });
        self
    }

    fn add_path(&mut self, path: &str) {
        let mut node = self;
        for name in path.split('.').filter(|s| !s.is_empty()) {
            let idx = match node.children.iter().position(|(n, _)| n == name) {
                Some(idx) => idx,
                None => {
                    node.children.push((name.to_string(), JoinSpec::new()));
                    node.children.len() - 1
                }
            };
            node = &mut node.children[idx].1;
        }
    }

    /// Union with `other`, recursively; existing entries keep their position.
    pub fn merge(&mut self, other: &JoinSpec) {
        for (name, nested) in &other.children {
            match self.children.iter_mut().find(|(n, _)| n == name) {
                Some((_, existing)) => existing.merge(nested),
                None => self.children.push((name.clone(), nested.clone())),
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &JoinSpec)> {
        self.children.iter().map(|(n, s)| (n.as_str(), s))
    }

    /// All dotted paths, parents before children.
    pub fn paths(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_paths("", &mut out);
        out
    }

    fn collect_paths(&self, prefix: &str, out: &mut Vec<String>) {
        for (name, nested) in &self.children {
            let path = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{prefix}.{name}")
            };
            out.push(path.clone());
            nested.collect_paths(&path, out);
        }
    }
}

impl From<&str> for JoinSpec {
    fn from(path: &str) -> Self {
        JoinSpec::new().with(path)
    }
}

impl<const N: usize> From<[&str; N]> for JoinSpec {
    fn from(paths: [&str; N]) -> Self {
        paths.iter().fold(JoinSpec::new(), |spec, p| spec.with(p))
    }
}

impl From<Vec<&str>> for JoinSpec {
    fn from(paths: Vec<&str>) -> Self {
        paths.iter().fold(JoinSpec::new(), |spec, p| spec.with(p))
    }
}
