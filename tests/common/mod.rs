//! Shared in-memory executor and record fixtures for integration tests.
//!
//! `MemExecutor` keeps rows in memory, interprets equality conditions,
//! ordering, and pagination, and counts queries per kind so tests can assert
//! the materialization policy contracts exactly.

#![allow(dead_code)]

use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use quarry::{
    Attributes, Condition, Criteria, ExecutorError, PersistRejection, QueryExecutor, Record,
};

#[derive(Debug, Clone, PartialEq)]
pub struct MemRecord {
    pub id: Option<u64>,
    pub attrs: Attributes,
    pub valid: bool,
}

impl MemRecord {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.attrs.get(field)
    }

    pub fn flag(&self, field: &str) -> bool {
        self.get(field).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn number(&self, field: &str) -> Option<i64> {
        self.get(field).and_then(Value::as_i64)
    }
}

impl Record for MemRecord {
    fn identity(&self) -> Option<(String, Value)> {
        self.id.map(|id| ("id".to_string(), json!(id)))
    }

    fn is_valid(&self) -> bool {
        self.valid
    }
}

pub struct MemQuery {
    criteria: Criteria,
}

pub struct MemExecutor {
    target: String,
    rows: Mutex<Vec<MemRecord>>,
    next_id: AtomicU64,
    required_field: Option<String>,
    missing: bool,
    pub full_fetches: AtomicUsize,
    pub count_queries: AtomicUsize,
    pub exists_queries: AtomicUsize,
}

impl MemExecutor {
    pub fn new(target: &str) -> Arc<Self> {
        Arc::new(Self {
            target: target.to_string(),
            rows: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            required_field: None,
            missing: false,
            full_fetches: AtomicUsize::new(0),
            count_queries: AtomicUsize::new(0),
            exists_queries: AtomicUsize::new(0),
        })
    }

    /// Executor whose persist validation requires the given attribute
    pub fn with_required_field(target: &str, field: &str) -> Arc<Self> {
        Arc::new(Self {
            target: target.to_string(),
            rows: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            required_field: Some(field.to_string()),
            missing: false,
            full_fetches: AtomicUsize::new(0),
            count_queries: AtomicUsize::new(0),
            exists_queries: AtomicUsize::new(0),
        })
    }

    /// Executor whose backing table does not exist; every execution fails
    pub fn missing_table(target: &str) -> Arc<Self> {
        Arc::new(Self {
            target: target.to_string(),
            rows: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            required_field: None,
            missing: true,
            full_fetches: AtomicUsize::new(0),
            count_queries: AtomicUsize::new(0),
            exists_queries: AtomicUsize::new(0),
        })
    }

    /// Insert rows directly, bypassing relations, each a JSON object
    pub fn seed(&self, rows: &[Value]) {
        for row in rows {
            let attrs: Attributes = row.as_object().cloned().unwrap_or_default();
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            self.rows.lock().push(MemRecord {
                id: Some(id),
                attrs,
                valid: true,
            });
        }
    }

    pub fn fetches(&self) -> usize {
        self.full_fetches.load(Ordering::SeqCst)
    }

    pub fn counts(&self) -> usize {
        self.count_queries.load(Ordering::SeqCst)
    }

    pub fn exists_checks(&self) -> usize {
        self.exists_queries.load(Ordering::SeqCst)
    }

    pub fn row_total(&self) -> usize {
        self.rows.lock().len()
    }

    fn check_table(&self) -> Result<(), ExecutorError> {
        if self.missing {
            return Err(ExecutorError::MissingRelation {
                relation: self.target.clone(),
            });
        }
        Ok(())
    }

    fn select(&self, criteria: &Criteria) -> Vec<MemRecord> {
        let flat = criteria.flattened();
        let mut rows: Vec<MemRecord> = self
            .rows
            .lock()
            .iter()
            .filter(|record| matches(record, &flat))
            .cloned()
            .collect();

        let order = flat.order_fragments().to_vec();
        rows.sort_by(|a, b| {
            for fragment in &order {
                let (field, descending) = parse_order(fragment);
                let left = field_value(a, &field);
                let right = field_value(b, &field);
                let mut ordering = compare_values(left.as_ref(), right.as_ref());
                if descending {
                    ordering = ordering.reverse();
                }
                if ordering != CmpOrdering::Equal {
                    return ordering;
                }
            }
            CmpOrdering::Equal
        });

        let offset = flat.offset_value().unwrap_or(0) as usize;
        let rows = rows.into_iter().skip(offset);
        match flat.limit_value() {
            Some(limit) => rows.take(limit as usize).collect(),
            None => rows.collect(),
        }
    }

    fn matching_total(&self, criteria: &Criteria) -> u64 {
        let flat = criteria.flattened();
        self.rows
            .lock()
            .iter()
            .filter(|record| matches(record, &flat))
            .count() as u64
    }
}

fn matches(record: &MemRecord, criteria: &Criteria) -> bool {
    criteria.filters().iter().all(|condition| match condition {
        Condition::Eq { field, value } => field_value(record, field).as_ref() == Some(value),
        // Opaque fragments are not interpreted by this fixture
        Condition::Fragment { .. } => true,
    })
}

fn field_value(record: &MemRecord, field: &str) -> Option<Value> {
    if field == "id" {
        record.id.map(|id| json!(id))
    } else {
        record.attrs.get(field).cloned()
    }
}

fn parse_order(fragment: &str) -> (String, bool) {
    if let Some(base) = fragment.strip_suffix(" DESC") {
        (base.to_string(), true)
    } else if let Some(base) = fragment.strip_suffix(" ASC") {
        (base.to_string(), false)
    } else {
        (fragment.to_string(), false)
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> CmpOrdering {
    match (a, b) {
        (Some(left), Some(right)) => {
            if let (Some(m), Some(n)) = (left.as_f64(), right.as_f64()) {
                m.partial_cmp(&n).unwrap_or(CmpOrdering::Equal)
            } else if let (Some(s), Some(t)) = (left.as_str(), right.as_str()) {
                s.cmp(t)
            } else {
                CmpOrdering::Equal
            }
        }
        (Some(_), None) => CmpOrdering::Greater,
        (None, Some(_)) => CmpOrdering::Less,
        (None, None) => CmpOrdering::Equal,
    }
}

#[async_trait]
impl QueryExecutor for MemExecutor {
    type Record = MemRecord;
    type Compiled = MemQuery;

    fn target(&self) -> &str {
        &self.target
    }

    fn compile(&self, criteria: &Criteria) -> MemQuery {
        MemQuery {
            criteria: criteria.clone(),
        }
    }

    async fn execute(&self, query: &MemQuery) -> Result<Vec<MemRecord>, ExecutorError> {
        self.check_table()?;
        self.full_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.select(&query.criteria))
    }

    async fn execute_count(&self, query: &MemQuery) -> Result<u64, ExecutorError> {
        self.check_table()?;
        self.count_queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.matching_total(&query.criteria))
    }

    async fn execute_exists(&self, query: &MemQuery) -> Result<bool, ExecutorError> {
        self.check_table()?;
        self.exists_queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.matching_total(&query.criteria) > 0)
    }

    fn build_record(&self, preset: &Attributes) -> MemRecord {
        let valid = self
            .required_field
            .as_ref()
            .map(|field| preset.contains_key(field))
            .unwrap_or(true);
        MemRecord {
            id: None,
            attrs: preset.clone(),
            valid,
        }
    }

    async fn persist(
        &self,
        record: MemRecord,
    ) -> Result<MemRecord, PersistRejection<MemRecord>> {
        if !record.is_valid() {
            let reason = match &self.required_field {
                Some(field) => format!("{field} is required"),
                None => "invalid record".to_string(),
            };
            return Err(PersistRejection { record, reason });
        }
        let mut persisted = record;
        persisted.id = Some(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.rows.lock().push(persisted.clone());
        Ok(persisted)
    }
}

/// Install a tracing subscriber once so test runs surface relation events
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
