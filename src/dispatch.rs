//! # Proxy Dispatch
//!
//! Explicit three-tier resolution for operation names invoked on a relation
//! (or on a bare record type, which is modelled as a fresh all-records
//! relation):
//!
//! 1. Built-in relation operations.
//! 2. Scopes registered for the target type.
//! 3. Delegates: class-level operations registered for the target type
//!    (calculations, batch helpers), called with the accumulated criteria as
//!    implicit scoping context.
//!
//! Resolution returns a tagged [`Resolution`] rather than relying on
//! reflection; exhausting all three tiers is a
//! [`RelationError::NoSuchOperation`].

use std::fmt;
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use serde_json::Value;
use tracing::debug;

use crate::criteria::Criteria;
use crate::error::{RelationError, Result};
use crate::relation::Relation;
use crate::scopes::{self, ScopeEntry, ScopeResult};
use crate::source::QueryExecutor;

/// Relation operations addressable by name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltInOp {
    All,
    First,
    Last,
    Count,
    IsEmpty,
    Any,
    Many,
    Reload,
    Sample,
}

impl BuiltInOp {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "all" => Some(Self::All),
            "first" => Some(Self::First),
            "last" => Some(Self::Last),
            "count" | "size" => Some(Self::Count),
            "empty" | "is_empty" => Some(Self::IsEmpty),
            "any" => Some(Self::Any),
            "many" => Some(Self::Many),
            "reload" => Some(Self::Reload),
            "sample" => Some(Self::Sample),
            _ => None,
        }
    }
}

/// What a delegate hands back: a plain value, or criteria that wrap back
/// into a relation
pub enum DelegateResult {
    Value(Value),
    Criteria(Criteria),
}

/// Class-level operation body, called with the accumulated criteria
pub type DelegateFn = Arc<dyn Fn(&Criteria, &[Value]) -> Result<DelegateResult> + Send + Sync>;

/// A registered type-level delegate
#[derive(Clone)]
pub struct DelegateEntry {
    pub name: String,
    pub body: DelegateFn,
}

fn delegates() -> &'static DashMap<(String, String), DelegateEntry> {
    static DELEGATES: OnceLock<DashMap<(String, String), DelegateEntry>> = OnceLock::new();
    DELEGATES.get_or_init(DashMap::new)
}

/// Register a class-level operation for a target type. Last write wins.
pub fn define_delegate<F>(target: &str, name: &str, body: F)
where
    F: Fn(&Criteria, &[Value]) -> Result<DelegateResult> + Send + Sync + 'static,
{
    debug!(target_type = target, delegate = name, "registering delegate");
    delegates().insert(
        (target.to_string(), name.to_string()),
        DelegateEntry {
            name: name.to_string(),
            body: Arc::new(body),
        },
    );
}

/// Look up a delegate registered for a target type
pub fn lookup_delegate(target: &str, name: &str) -> Option<DelegateEntry> {
    delegates()
        .get(&(target.to_string(), name.to_string()))
        .map(|entry| entry.clone())
}

/// Outcome of resolving an operation name against the three tiers
pub enum Resolution {
    BuiltIn(BuiltInOp),
    Scope(ScopeEntry),
    Delegated(DelegateEntry),
    Unresolved,
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BuiltIn(op) => f.debug_tuple("BuiltIn").field(op).finish(),
            Self::Scope(entry) => f.debug_tuple("Scope").field(&entry.name).finish(),
            Self::Delegated(entry) => f.debug_tuple("Delegated").field(&entry.name).finish(),
            Self::Unresolved => write!(f, "Unresolved"),
        }
    }
}

/// Resolve an operation name for a target type
pub fn resolve(target: &str, name: &str) -> Resolution {
    if let Some(op) = BuiltInOp::from_name(name) {
        return Resolution::BuiltIn(op);
    }
    if let Some(entry) = scopes::lookup(target, name) {
        return Resolution::Scope(entry);
    }
    if let Some(entry) = lookup_delegate(target, name) {
        return Resolution::Delegated(entry);
    }
    Resolution::Unresolved
}

/// Result of a dynamic invocation
pub enum Invoked<E: QueryExecutor> {
    Relation(Relation<E>),
    Records(Vec<E::Record>),
    Count(u64),
    Bool(bool),
    Value(Value),
}

impl<E: QueryExecutor> fmt::Debug for Invoked<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Relation(relation) => f.debug_tuple("Relation").field(relation).finish(),
            Self::Records(records) => f
                .debug_tuple("Records")
                .field(&format_args!("<{} records>", records.len()))
                .finish(),
            Self::Count(count) => f.debug_tuple("Count").field(count).finish(),
            Self::Bool(value) => f.debug_tuple("Bool").field(value).finish(),
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
        }
    }
}

impl<E: QueryExecutor> Relation<E> {
    /// Apply a registered scope by name (dispatch tier two only)
    pub fn scope(&self, name: &str, args: &[Value]) -> Result<Relation<E>> {
        let entry = scopes::lookup(self.target(), name).ok_or_else(|| {
            RelationError::NoSuchOperation {
                target: self.target().to_string(),
                name: name.to_string(),
            }
        })?;
        self.apply_scope(&entry, args)
    }

    fn apply_scope(&self, entry: &ScopeEntry, args: &[Value]) -> Result<Relation<E>> {
        match (entry.body)(args) {
            ScopeResult::Noop => Ok(self.extend(Criteria::new())),
            ScopeResult::Criteria(criteria) => Ok(self.extend(criteria)),
            ScopeResult::Relation { target, criteria } => {
                if target != self.target() {
                    return Err(RelationError::IncompatibleTarget {
                        scope: entry.name.clone(),
                        expected: self.target().to_string(),
                        found: target,
                    });
                }
                Ok(self.extend(criteria))
            }
        }
    }

    /// Full three-tier dynamic dispatch
    pub async fn invoke(&mut self, name: &str, args: &[Value]) -> Result<Invoked<E>> {
        match resolve(self.target(), name) {
            Resolution::BuiltIn(op) => self.invoke_builtin(op, args).await,
            Resolution::Scope(entry) => Ok(Invoked::Relation(self.apply_scope(&entry, args)?)),
            Resolution::Delegated(entry) => match (entry.body)(self.criteria(), args)? {
                DelegateResult::Value(value) => Ok(Invoked::Value(value)),
                DelegateResult::Criteria(criteria) => Ok(Invoked::Relation(self.extend(criteria))),
            },
            Resolution::Unresolved => Err(RelationError::NoSuchOperation {
                target: self.target().to_string(),
                name: name.to_string(),
            }),
        }
    }

    async fn invoke_builtin(&mut self, op: BuiltInOp, args: &[Value]) -> Result<Invoked<E>> {
        let n = args.first().and_then(Value::as_u64).map(|n| n as usize);
        match op {
            BuiltInOp::All => Ok(Invoked::Records(self.to_vec().await?)),
            BuiltInOp::First => Ok(Invoked::Records(self.first_n(n.unwrap_or(1)).await?)),
            BuiltInOp::Last => Ok(Invoked::Records(self.last_n(n.unwrap_or(1)).await?)),
            BuiltInOp::Count => Ok(Invoked::Count(self.count().await?)),
            BuiltInOp::IsEmpty => Ok(Invoked::Bool(self.is_empty().await?)),
            BuiltInOp::Any => Ok(Invoked::Bool(self.any().await?)),
            BuiltInOp::Many => Ok(Invoked::Bool(self.many().await?)),
            BuiltInOp::Reload => {
                self.reload();
                Ok(Invoked::Relation(self.clone()))
            }
            BuiltInOp::Sample => Ok(Invoked::Records(
                self.sample().await?.into_iter().collect(),
            )),
        }
    }
}
