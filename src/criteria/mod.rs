//! # Criteria Sets
//!
//! The accumulated, mergeable clauses carried by a relation: conditions,
//! joins, ordering, pagination, and eager-load descriptors.
//!
//! ## Merge Law
//!
//! Merging is associative and never mutates either input. Collection fields
//! (conditions, joins, order, includes) merge by concatenation or structural
//! union; scalar fields (limit, offset, per-field equality values) are
//! right-biased, so the most recently applied criteria wins a conflict. That
//! right bias is what makes scope chaining order-sensitive by design.

pub mod conditions;
pub mod includes;

pub use conditions::Condition;
pub use includes::IncludeTree;

use serde::Serialize;
use serde_json::Value;

/// Attribute map used for record construction and equality presets
pub type Attributes = serde_json::Map<String, Value>;

/// Immutable-by-convention accumulator of query clauses
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Criteria {
    filters: Vec<Condition>,
    joins: Vec<String>,
    order: Vec<String>,
    /// Set by `reorder`; makes merge replace order fragments instead of appending
    reordered: bool,
    limit: Option<u64>,
    offset: Option<u64>,
    includes: IncludeTree,
    /// Ambient criteria captured from the target type at relation construction
    extra_scopes: Vec<Criteria>,
}

impl Criteria {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an equality condition. A later value for the same field replaces
    /// the earlier one in place.
    pub fn where_eq(mut self, field: &str, value: Value) -> Self {
        let condition = Condition::eq(field, value);
        match self
            .filters
            .iter_mut()
            .find(|existing| existing.field() == Some(field))
        {
            Some(slot) => *slot = condition,
            None => self.filters.push(condition),
        }
        self
    }

    /// Add an opaque predicate fragment
    pub fn where_fragment(mut self, text: &str) -> Self {
        self.filters.push(Condition::fragment(text));
        self
    }

    /// Add a join fragment; identical fragment text is deduplicated
    pub fn join(mut self, fragment: &str) -> Self {
        if !self.joins.iter().any(|existing| existing == fragment) {
            self.joins.push(fragment.to_string());
        }
        self
    }

    /// Append an ordering fragment
    pub fn order(mut self, fragment: &str) -> Self {
        self.order.push(fragment.to_string());
        self
    }

    pub fn order_asc(self, field: &str) -> Self {
        self.order(&format!("{field} ASC"))
    }

    pub fn order_desc(self, field: &str) -> Self {
        self.order(&format!("{field} DESC"))
    }

    /// Replace all accumulated ordering. Merging a reordered criteria set
    /// replaces the left side's order instead of appending to it.
    pub fn reorder(mut self, fragment: &str) -> Self {
        self.order = vec![fragment.to_string()];
        self.reordered = true;
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Merge eager-load descriptors into the accumulated tree
    pub fn include(mut self, tree: IncludeTree) -> Self {
        self.includes = self.includes.merge(&tree);
        self
    }

    /// Append captured ambient criteria
    pub fn with_extra_scope(mut self, criteria: Criteria) -> Self {
        self.extra_scopes.push(criteria);
        self
    }

    pub fn filters(&self) -> &[Condition] {
        &self.filters
    }

    pub fn joins(&self) -> &[String] {
        &self.joins
    }

    pub fn order_fragments(&self) -> &[String] {
        &self.order
    }

    pub fn limit_value(&self) -> Option<u64> {
        self.limit
    }

    pub fn offset_value(&self) -> Option<u64> {
        self.offset
    }

    pub fn includes_tree(&self) -> &IncludeTree {
        &self.includes
    }

    pub fn extra_scopes(&self) -> &[Criteria] {
        &self.extra_scopes
    }

    /// Merge two criteria sets into a new one. Neither input is mutated.
    pub fn merge(&self, other: &Criteria) -> Criteria {
        let mut filters = self.filters.clone();
        for condition in &other.filters {
            match condition.field() {
                Some(field) => {
                    match filters
                        .iter_mut()
                        .find(|existing| existing.field() == Some(field))
                    {
                        Some(slot) => *slot = condition.clone(),
                        None => filters.push(condition.clone()),
                    }
                }
                None => filters.push(condition.clone()),
            }
        }

        let mut joins = self.joins.clone();
        for fragment in &other.joins {
            if !joins.iter().any(|existing| existing == fragment) {
                joins.push(fragment.clone());
            }
        }

        let (order, reordered) = if other.reordered {
            (other.order.clone(), true)
        } else {
            let mut order = self.order.clone();
            order.extend(other.order.iter().cloned());
            (order, self.reordered)
        };

        let mut extra_scopes = self.extra_scopes.clone();
        extra_scopes.extend(other.extra_scopes.iter().cloned());

        Criteria {
            filters,
            joins,
            order,
            reordered,
            limit: other.limit.or(self.limit),
            offset: other.offset.or(self.offset),
            includes: self.includes.merge(&other.includes),
            extra_scopes,
        }
    }

    /// Fold captured ambient criteria into a single flat criteria set, with
    /// this set's own clauses applied last.
    pub fn flattened(&self) -> Criteria {
        if self.extra_scopes.is_empty() {
            return self.clone();
        }
        let mut base = Criteria::new();
        for ambient in &self.extra_scopes {
            base = base.merge(&ambient.flattened());
        }
        let mut own = self.clone();
        own.extra_scopes.clear();
        base.merge(&own)
    }

    /// Equality conditions as an attribute map, for presetting built records
    pub fn equality_attributes(&self) -> Attributes {
        let mut attributes = Attributes::new();
        for condition in self.flattened().filters {
            if let Condition::Eq { field, value } = condition {
                attributes.insert(field, value);
            }
        }
        attributes
    }

    /// Copy of this criteria set with each ordering fragment inverted, used
    /// for tail reads on unloaded relations.
    pub fn with_inverted_order(&self) -> Criteria {
        let mut inverted = self.clone();
        inverted.order = inverted.order.iter().map(|f| invert_fragment(f)).collect();
        inverted.reordered = true;
        inverted
    }
}

fn invert_fragment(fragment: &str) -> String {
    if let Some(base) = fragment.strip_suffix(" DESC") {
        format!("{base} ASC")
    } else if let Some(base) = fragment.strip_suffix(" ASC") {
        format!("{base} DESC")
    } else {
        format!("{fragment} DESC")
    }
}
