//! # Scope Registry
//!
//! Process-wide registry of named scopes, keyed per target record type.
//!
//! ## Architecture
//!
//! A scope is a deferred criteria-producing function. Registration stores
//! the function; nothing runs until the scope is exercised against a
//! relation, so a scope whose body depends on external state (a table that
//! does not exist yet, ambient configuration) registers cleanly and fails
//! only when actually used.
//!
//! Scope names are looked up dynamically at call time, not bound at
//! definition time, so scopes may reference other scopes defined later.
//! Re-registration is permitted; last write wins.
//!
//! ## Scope Results
//!
//! A scope body returns a [`ScopeResult`]:
//! - `Noop` - the receiver relation is returned unchanged. This is the
//!   documented nil contract, not an error, and further chaining works.
//! - `Criteria` - merged into the receiver's criteria.
//! - `Relation` - a relation expressed as target type plus criteria; its
//!   criteria merge into the receiver when the targets agree.
//!
//! ## Ambient Criteria
//!
//! [`push_ambient`] installs criteria for a target type for the lifetime of
//! the returned guard. Relations constructed while the guard lives capture
//! the ambient stack, which is how scopes defined inside an association or a
//! `with_scope`-style block include their surrounding context.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, warn};

use crate::criteria::Criteria;

/// What a scope body hands back to the dispatcher
pub enum ScopeResult {
    /// Leave the receiver relation unchanged
    Noop,
    /// Extend the receiver with these criteria
    Criteria(Criteria),
    /// A relation built elsewhere: its target type and accumulated criteria
    Relation { target: String, criteria: Criteria },
}

/// Deferred criteria-producing scope body
pub type ScopeFn = Arc<dyn Fn(&[Value]) -> ScopeResult + Send + Sync>;

/// A registered scope
#[derive(Clone)]
pub struct ScopeEntry {
    pub name: String,
    pub body: ScopeFn,
    /// True when registered from an already-evaluated criteria value
    pub eager: bool,
}

struct Registry {
    scopes: DashMap<(String, String), ScopeEntry>,
    ambient: RwLock<HashMap<String, Vec<Criteria>>>,
}

fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(|| Registry {
        scopes: DashMap::new(),
        ambient: RwLock::new(HashMap::new()),
    })
}

/// Register a deferred scope for a target type. Last write wins.
pub fn define_scope<F>(target: &str, name: &str, body: F)
where
    F: Fn(&[Value]) -> ScopeResult + Send + Sync + 'static,
{
    debug!(target_type = target, scope = name, "registering scope");
    registry().scopes.insert(
        (target.to_string(), name.to_string()),
        ScopeEntry {
            name: name.to_string(),
            body: Arc::new(body),
            eager: false,
        },
    );
}

/// Register a scope from an already-evaluated criteria value.
///
/// Accepted for compatibility, but discouraged: the criteria were evaluated
/// at registration, so the scope will not observe ambient state that changes
/// afterwards. Deferred bodies via [`define_scope`] do not have this problem.
pub fn define_eager_scope(target: &str, name: &str, criteria: Criteria) {
    warn!(
        target_type = target,
        scope = name,
        "scope registered from an evaluated criteria value; it will not observe later ambient state"
    );
    registry().scopes.insert(
        (target.to_string(), name.to_string()),
        ScopeEntry {
            name: name.to_string(),
            body: Arc::new(move |_args: &[Value]| ScopeResult::Criteria(criteria.clone())),
            eager: true,
        },
    );
}

/// Look up a scope registered for a target type
pub fn lookup(target: &str, name: &str) -> Option<ScopeEntry> {
    registry()
        .scopes
        .get(&(target.to_string(), name.to_string()))
        .map(|entry| entry.clone())
}

/// Install ambient criteria for a target type. Relations constructed for
/// that type while the returned guard lives capture the criteria.
pub fn push_ambient(target: &str, criteria: Criteria) -> AmbientScope {
    registry()
        .ambient
        .write()
        .entry(target.to_string())
        .or_default()
        .push(criteria);
    AmbientScope {
        target: target.to_string(),
    }
}

/// Snapshot of the ambient criteria stack for a target type
pub fn ambient_stack(target: &str) -> Vec<Criteria> {
    registry()
        .ambient
        .read()
        .get(target)
        .cloned()
        .unwrap_or_default()
}

/// Guard for an installed ambient criteria frame; dropping pops it
pub struct AmbientScope {
    target: String,
}

impl Drop for AmbientScope {
    fn drop(&mut self) {
        let mut ambient = registry().ambient.write();
        if let Some(stack) = ambient.get_mut(&self.target) {
            stack.pop();
        }
    }
}
