//! # Deferred Relations
//!
//! A [`Relation`] is a deferred query value: accumulated criteria, a handle
//! to the executor that can run them, and a lazily populated result cache.
//!
//! ## Lifecycle
//!
//! Relations start unloaded. Any operation that materializes the full set
//! ([`Relation::all`], predicate reads, [`Relation::sample`]) transitions the
//! relation to loaded; only [`Relation::reload`] transitions it back. Counts,
//! emptiness and existence reads deliberately stay on lightweight aggregate
//! queries and never change the loaded state, so counting costs one cheap
//! query instead of a full fetch.
//!
//! ## Composition
//!
//! Every chaining call ([`Relation::extend`] and the fluent wrappers around
//! it) returns a new unloaded relation over merged criteria. The original is
//! untouched, which makes relation values safe to share and compare.

pub mod policy;

use std::fmt;
use std::sync::Arc;

use rand::Rng;
use serde_json::Value;
use tracing::{debug, warn};

use crate::criteria::{Attributes, Criteria, IncludeTree};
use crate::error::{RelationError, Result};
use crate::scopes;
use crate::source::{QueryExecutor, Record};
use policy::{plan, AccessPath, ReadOp};

/// Deferred, composable representation of a query plus its cached result
pub struct Relation<E: QueryExecutor> {
    executor: Arc<E>,
    criteria: Criteria,
    /// `Some` exactly when the relation is loaded, so the loaded flag and the
    /// materialized records are one atomic unit
    cache: Option<Vec<E::Record>>,
}

impl<E: QueryExecutor> Relation<E> {
    /// Bare "all records" relation for the executor's target type. Ambient
    /// criteria active for that type are captured now, not at read time.
    pub fn new(executor: Arc<E>) -> Self {
        let mut criteria = Criteria::new();
        for ambient in scopes::ambient_stack(executor.target()) {
            criteria = criteria.with_extra_scope(ambient);
        }
        Self {
            executor,
            criteria,
            cache: None,
        }
    }

    /// Relation over explicit criteria, skipping ambient capture
    pub fn with_criteria(executor: Arc<E>, criteria: Criteria) -> Self {
        Self {
            executor,
            criteria,
            cache: None,
        }
    }

    pub fn criteria(&self) -> &Criteria {
        &self.criteria
    }

    pub fn executor(&self) -> &Arc<E> {
        &self.executor
    }

    pub fn target(&self) -> &str {
        self.executor.target()
    }

    pub fn is_loaded(&self) -> bool {
        self.cache.is_some()
    }

    /// New unloaded relation over `merge(self.criteria, delta)`
    pub fn extend(&self, delta: Criteria) -> Self {
        Self {
            executor: Arc::clone(&self.executor),
            criteria: self.criteria.merge(&delta),
            cache: None,
        }
    }

    pub fn where_eq(&self, field: &str, value: Value) -> Self {
        self.extend(Criteria::new().where_eq(field, value))
    }

    pub fn where_fragment(&self, text: &str) -> Self {
        self.extend(Criteria::new().where_fragment(text))
    }

    pub fn join(&self, fragment: &str) -> Self {
        self.extend(Criteria::new().join(fragment))
    }

    pub fn order(&self, fragment: &str) -> Self {
        self.extend(Criteria::new().order(fragment))
    }

    pub fn reorder(&self, fragment: &str) -> Self {
        self.extend(Criteria::new().reorder(fragment))
    }

    pub fn limit(&self, limit: u64) -> Self {
        self.extend(Criteria::new().limit(limit))
    }

    pub fn offset(&self, offset: u64) -> Self {
        self.extend(Criteria::new().offset(offset))
    }

    pub fn includes(&self, tree: IncludeTree) -> Self {
        self.extend(Criteria::new().include(tree))
    }

    /// Discard the cache, forcing the next read to refetch. Returns `self`
    /// for continued chaining.
    pub fn reload(&mut self) -> &mut Self {
        debug!(target_type = self.target(), "discarding relation cache");
        self.cache = None;
        self
    }

    /// Materialize the full result set, fetching at most once until `reload`
    pub async fn all(&mut self) -> Result<&[E::Record]> {
        if self.cache.is_none() {
            let compiled = self.executor.compile(&self.criteria);
            debug!(target_type = self.target(), "materializing relation");
            let records = self.executor.execute(&compiled).await?;
            self.cache = Some(records);
        }
        Ok(self.cache.as_deref().unwrap_or(&[]))
    }

    /// Materialize and clone the full result set
    pub async fn to_vec(&mut self) -> Result<Vec<E::Record>> {
        Ok(self.all().await?.to_vec())
    }

    pub async fn first(&self) -> Result<Option<E::Record>> {
        Ok(self.first_n(1).await?.into_iter().next())
    }

    /// Head of the relation. Unloaded relations issue a limited query and
    /// stay unloaded.
    pub async fn first_n(&self, n: usize) -> Result<Vec<E::Record>> {
        if let Some(records) = &self.cache {
            return Ok(records.iter().take(n).cloned().collect());
        }
        let limited = self.criteria.merge(&Criteria::new().limit(n as u64));
        let compiled = self.executor.compile(&limited);
        Ok(self.executor.execute(&compiled).await?)
    }

    pub async fn last(&self) -> Result<Option<E::Record>> {
        Ok(self.last_n(1).await?.into_iter().next())
    }

    /// Tail of the relation, in relation order. Unloaded relations with
    /// explicit ordering and no limit/offset window issue a limited query
    /// against the inverted order. Without ordering the fetch cannot be
    /// inverted, and with a window the inverted query would take the tail of
    /// the wrong slice, so both cases slice the tail from an uncached full
    /// fetch.
    pub async fn last_n(&self, n: usize) -> Result<Vec<E::Record>> {
        if let Some(records) = &self.cache {
            let start = records.len().saturating_sub(n);
            return Ok(records[start..].to_vec());
        }
        let flat = self.criteria.flattened();
        if flat.order_fragments().is_empty()
            || flat.limit_value().is_some()
            || flat.offset_value().is_some()
        {
            let compiled = self.executor.compile(&self.criteria);
            let records = self.executor.execute(&compiled).await?;
            let start = records.len().saturating_sub(n);
            return Ok(records[start..].to_vec());
        }
        let limited = flat
            .with_inverted_order()
            .merge(&Criteria::new().limit(n as u64));
        let compiled = self.executor.compile(&limited);
        let mut records = self.executor.execute(&compiled).await?;
        records.reverse();
        Ok(records)
    }

    /// Number of records. One count query when unloaded, zero queries when
    /// loaded; never materializes.
    pub async fn count(&self) -> Result<u64> {
        if plan(ReadOp::Count, self.is_loaded()) == AccessPath::CachedOnly {
            return Ok(self.cached_len() as u64);
        }
        let compiled = self.executor.compile(&self.criteria);
        Ok(self.executor.execute_count(&compiled).await?)
    }

    pub async fn size(&self) -> Result<u64> {
        self.count().await
    }

    pub async fn is_empty(&self) -> Result<bool> {
        if plan(ReadOp::IsEmpty, self.is_loaded()) == AccessPath::CachedOnly {
            return Ok(self.cached_len() == 0);
        }
        let compiled = self.executor.compile(&self.criteria);
        Ok(!self.executor.execute_exists(&compiled).await?)
    }

    pub async fn any(&self) -> Result<bool> {
        let predicated = false;
        if plan(ReadOp::Any { predicated }, self.is_loaded()) == AccessPath::CachedOnly {
            return Ok(self.cached_len() > 0);
        }
        let compiled = self.executor.compile(&self.criteria);
        Ok(self.executor.execute_exists(&compiled).await?)
    }

    pub async fn many(&self) -> Result<bool> {
        let predicated = false;
        if plan(ReadOp::Many { predicated }, self.is_loaded()) == AccessPath::CachedOnly {
            return Ok(self.cached_len() > 1);
        }
        let compiled = self.executor.compile(&self.criteria);
        Ok(self.executor.execute_count(&compiled).await? > 1)
    }

    /// Predicate form of `any`; the predicate runs against each record, so
    /// this materializes.
    pub async fn any_where<P>(&mut self, predicate: P) -> Result<bool>
    where
        P: Fn(&E::Record) -> bool,
    {
        Ok(self.all().await?.iter().any(predicate))
    }

    /// Predicate form of `many`; materializes for the same reason
    pub async fn many_where<P>(&mut self, predicate: P) -> Result<bool>
    where
        P: Fn(&E::Record) -> bool,
    {
        Ok(self.all().await?.iter().filter(|r| predicate(r)).count() > 1)
    }

    /// Membership test. Loaded relations answer in memory; unloaded
    /// relations run an existence query scoped to the record's identity.
    /// When the record has no identity, or the relation already filters on
    /// the identity field (merging the identity condition would replace that
    /// filter instead of conjoining with it), the relation materializes and
    /// tests membership directly.
    pub async fn contains(&mut self, record: &E::Record) -> Result<bool> {
        let identity = record.identity();
        let identified = identity
            .as_ref()
            .map_or(false, |(field, _)| !self.filters_mention(field));
        match plan(ReadOp::Contains { identified }, self.is_loaded()) {
            AccessPath::CachedOnly => Ok(self
                .cache
                .as_ref()
                .map(|records| records.contains(record))
                .unwrap_or(false)),
            AccessPath::Lightweight(_) => match identity {
                Some((field, value)) => {
                    let scoped = self.criteria.merge(&Criteria::new().where_eq(&field, value));
                    let compiled = self.executor.compile(&scoped);
                    Ok(self.executor.execute_exists(&compiled).await?)
                }
                None => Ok(self.all().await?.contains(record)),
            },
            AccessPath::FullFetch { .. } => Ok(self.all().await?.contains(record)),
        }
    }

    fn filters_mention(&self, field: &str) -> bool {
        self.criteria
            .flattened()
            .filters()
            .iter()
            .any(|condition| condition.field() == Some(field))
    }

    /// Construct an unpersisted record. Equality conditions accumulated on
    /// this relation (ambient criteria included) preset attributes; caller
    /// attributes win conflicts.
    pub fn build(&self, attrs: Attributes) -> E::Record {
        let mut preset = self.criteria.equality_attributes();
        for (key, value) in attrs {
            preset.insert(key, value);
        }
        self.executor.build_record(&preset)
    }

    pub fn new_record(&self, attrs: Attributes) -> E::Record {
        self.build(attrs)
    }

    /// Build and persist. Validation failure is signalled quietly: the
    /// unpersisted record comes back and the caller checks its validity.
    pub async fn create(&self, attrs: Attributes) -> E::Record {
        let record = self.build(attrs);
        match self.executor.persist(record).await {
            Ok(persisted) => persisted,
            Err(rejection) => {
                warn!(
                    target_type = self.target(),
                    reason = %rejection.reason,
                    "persist rejected; returning unpersisted record"
                );
                rejection.record
            }
        }
    }

    /// Build and persist, propagating validation failure as an error
    pub async fn create_strict(&self, attrs: Attributes) -> Result<E::Record> {
        let record = self.build(attrs);
        self.executor
            .persist(record)
            .await
            .map_err(|rejection| RelationError::Validation {
                target: self.target().to_string(),
                reason: rejection.reason,
            })
    }

    /// One pseudo-randomly chosen record from the materialized set
    pub async fn sample(&mut self) -> Result<Option<E::Record>> {
        let records = self.all().await?;
        if records.is_empty() {
            return Ok(None);
        }
        let index = rand::thread_rng().gen_range(0..records.len());
        Ok(records.get(index).cloned())
    }

    fn cached_len(&self) -> usize {
        self.cache.as_ref().map(Vec::len).unwrap_or(0)
    }
}

impl<E: QueryExecutor> Clone for Relation<E> {
    fn clone(&self) -> Self {
        Self {
            executor: Arc::clone(&self.executor),
            criteria: self.criteria.clone(),
            cache: self.cache.clone(),
        }
    }
}

impl<E: QueryExecutor> fmt::Debug for Relation<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relation")
            .field("target", &self.target())
            .field("loaded", &self.is_loaded())
            .field("criteria", &self.criteria)
            .finish()
    }
}
