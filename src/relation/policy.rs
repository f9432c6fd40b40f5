//! # Materialization Policy
//!
//! Central classification used by every relation read: never issue a full
//! fetch when cached data or a lightweight aggregate query answers the
//! request. Each read operation maps to exactly one access path given the
//! relation's loaded state. Predicate-carrying reads always escalate to a
//! full fetch, because a caller-supplied predicate cannot be pushed into an
//! aggregate query.

/// Read operations exposed by a relation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOp {
    All,
    First,
    Last,
    Count,
    IsEmpty,
    Any { predicated: bool },
    Many { predicated: bool },
    Contains { identified: bool },
    Sample,
}

/// Aggregate query kinds that never materialize rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightweightKind {
    Count,
    Exists,
}

/// How a read operation is answered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessPath {
    /// Answer from the materialized cache; zero queries
    CachedOnly,
    /// One aggregate query; the relation stays unloaded
    Lightweight(LightweightKind),
    /// One record-returning query; `populates_cache` is false for head/tail
    /// reads that carry an implicit limit and must not mark the relation
    /// loaded
    FullFetch { populates_cache: bool },
}

/// Classify a read operation against the relation's loaded state
pub fn plan(op: ReadOp, loaded: bool) -> AccessPath {
    if loaded {
        return AccessPath::CachedOnly;
    }
    match op {
        ReadOp::All | ReadOp::Sample => AccessPath::FullFetch {
            populates_cache: true,
        },
        ReadOp::First | ReadOp::Last => AccessPath::FullFetch {
            populates_cache: false,
        },
        ReadOp::Count | ReadOp::Many { predicated: false } => {
            AccessPath::Lightweight(LightweightKind::Count)
        }
        ReadOp::IsEmpty
        | ReadOp::Any { predicated: false }
        | ReadOp::Contains { identified: true } => {
            AccessPath::Lightweight(LightweightKind::Exists)
        }
        ReadOp::Any { predicated: true }
        | ReadOp::Many { predicated: true }
        | ReadOp::Contains { identified: false } => AccessPath::FullFetch {
            populates_cache: true,
        },
    }
}
