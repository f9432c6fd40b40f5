//! # Eager-Load Descriptors
//!
//! A tree of association names to eager-load. Trees merge structurally:
//! nodes with matching keys merge their children rather than overwrite.

use serde::Serialize;
use std::collections::BTreeMap;

/// Eager-load descriptor tree
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IncludeTree {
    children: BTreeMap<String, IncludeTree>,
}

impl IncludeTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// A single association with no nested loads
    pub fn leaf(name: &str) -> Self {
        Self::nested(name, Self::new())
    }

    /// A single association with nested loads beneath it
    pub fn nested(name: &str, children: IncludeTree) -> Self {
        let mut tree = Self::new();
        tree.children.insert(name.to_string(), children);
        tree
    }

    /// Flat list of associations
    pub fn from_names<'a, I>(names: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut tree = Self::new();
        for name in names {
            tree.children.insert(name.to_string(), Self::new());
        }
        tree
    }

    /// Structural union: matching keys merge children recursively
    pub fn merge(&self, other: &IncludeTree) -> IncludeTree {
        let mut children = self.children.clone();
        for (name, subtree) in &other.children {
            let merged = match children.get(name) {
                Some(existing) => existing.merge(subtree),
                None => subtree.clone(),
            };
            children.insert(name.clone(), merged);
        }
        IncludeTree { children }
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.children.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&IncludeTree> {
        self.children.get(name)
    }

    /// Top-level association names
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.children.keys().map(String::as_str)
    }
}
