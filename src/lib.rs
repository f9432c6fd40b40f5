#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Quarry
//!
//! Deferred, composable query relations with Rails-style scopes.
//!
//! ## Overview
//!
//! A [`Relation`] is a value that stands for a query that has not run yet. It
//! accumulates criteria through chained calls, executes against an abstract
//! [`QueryExecutor`] only when a read demands it, and caches the materialized
//! result set until [`Relation::reload`] discards it. Reads that can be
//! answered without materializing the full set (counts, emptiness, existence)
//! are routed to lightweight aggregate queries instead.
//!
//! ## Module Organization
//!
//! - [`criteria`] - Mergeable criteria sets: conditions, joins, ordering,
//!   pagination, and eager-load descriptors
//! - [`relation`] - The deferred relation value and its materialization policy
//! - [`scopes`] - Process-wide named scope registry, per target type
//! - [`dispatch`] - Three-tier dynamic operation resolution
//! - [`source`] - The executor boundary all query I/O goes through
//! - [`error`] - Structured error handling
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use quarry::{scopes, Criteria, Relation, ScopeResult};
//! use serde_json::json;
//!
//! scopes::define_scope("topics", "approved", |_args| {
//!     ScopeResult::Criteria(Criteria::new().where_eq("approved", json!(true)))
//! });
//!
//! let mut approved = Relation::new(executor).scope("approved", &[])?;
//! let total = approved.count().await?;   // one lightweight count query
//! let records = approved.all().await?;   // one full fetch, cached afterwards
//! ```
//!
//! ## Executor Boundary
//!
//! Quarry never generates or runs SQL itself. Compilation and execution of a
//! relation's accumulated criteria belong to the embedding application's
//! [`QueryExecutor`] implementation, and every execution is routed through it
//! uniformly so an external statement cache can intercept consistently.

pub mod criteria;
pub mod dispatch;
pub mod error;
pub mod relation;
pub mod scopes;
pub mod source;

pub use criteria::{Attributes, Condition, Criteria, IncludeTree};
pub use dispatch::{define_delegate, resolve, BuiltInOp, DelegateResult, Invoked, Resolution};
pub use error::{ExecutorError, RelationError, Result};
pub use relation::{policy, Relation};
pub use scopes::{
    define_eager_scope, define_scope, push_ambient, AmbientScope, ScopeEntry, ScopeResult,
};
pub use source::{PersistRejection, QueryExecutor, Record};
