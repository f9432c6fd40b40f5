//! # Executor Boundary
//!
//! The collaborator interface every relation delegates its I/O to. Quarry
//! compiles nothing itself: an executor turns a criteria set into its own
//! opaque compiled form, runs it, and maps rows into records. Routing every
//! execution through this trait keeps the layer uniform, so an external
//! statement/result cache can sit behind an executor and intercept repeated
//! identical queries without the relation layer knowing.

use async_trait::async_trait;
use serde_json::Value;

use crate::criteria::{Attributes, Criteria};
use crate::error::ExecutorError;

/// A row materialized by an executor. Opaque to the relation layer beyond
/// equality, identity, and validity.
pub trait Record: Clone + PartialEq + Send + Sync + 'static {
    /// Primary-key style identity as a (field, value) pair; `None` while the
    /// record is unpersisted.
    fn identity(&self) -> Option<(String, Value)>;

    /// Validity predicate consulted after a non-strict create.
    fn is_valid(&self) -> bool {
        true
    }
}

/// A persist attempt rejected by validation. Carries the unpersisted record
/// back so non-strict create can hand it to the caller.
#[derive(Debug, Clone)]
pub struct PersistRejection<R> {
    pub record: R,
    pub reason: String,
}

/// Compiles and executes a relation's accumulated criteria
#[async_trait]
pub trait QueryExecutor: Send + Sync + 'static {
    type Record: Record;
    /// Executor-defined compiled query form; opaque to the relation layer
    type Compiled: Send + Sync;

    /// Name of the record type this executor queries, used for scope lookup
    fn target(&self) -> &str;

    /// Compile accumulated criteria into an executable query
    fn compile(&self, criteria: &Criteria) -> Self::Compiled;

    /// Execute a compiled query and materialize the full ordered result set
    async fn execute(&self, query: &Self::Compiled) -> Result<Vec<Self::Record>, ExecutorError>;

    /// Execute a count variant without materializing rows
    async fn execute_count(&self, query: &Self::Compiled) -> Result<u64, ExecutorError>;

    /// Execute an existence variant without materializing rows
    async fn execute_exists(&self, query: &Self::Compiled) -> Result<bool, ExecutorError>;

    /// Construct an unpersisted record pre-populated with the given attributes
    fn build_record(&self, preset: &Attributes) -> Self::Record;

    /// Persist a record, or reject it with the record attached
    async fn persist(
        &self,
        record: Self::Record,
    ) -> Result<Self::Record, PersistRejection<Self::Record>>;
}
