//! Operation registry
//!
//! Every logical subscription multiplexed over the socket is an *operation*
//! with a client-assigned string id. The registry keeps three pieces of
//! bookkeeping side by side:
//!
//! 1. **Operations**: id → query, variables, handler, extensions, started flag
//! 2. **Reference counts**: id → number of logical subscribers
//! 3. **Dedup index**: canonical `(query, variables)` key → id
//!
//! # Operation Lifecycle
//!
//! 1. **Allocate**: a fresh id from a counter that is never rewound
//! 2. **Register**: insert with reference count 1 and record the dedup key
//! 3. **Share**: identical subscriptions bump the count and reuse the id
//! 4. **Release**: the last release (or a forced one) asks for a stop frame
//!    and pins the count at zero; the record stays until the peer confirms
//! 5. **Remove**: on ERROR/COMPLETE from the peer or a caller-initiated close
//!
//! Dedup entries are never pruned. A stale entry is harmless because every
//! lookup is re-validated against the live operation map.

use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Result handler bound to an operation
///
/// Receives `Some(data)` for each DATA frame and `None` once the operation
/// terminates.
pub type OperationHandler = Arc<dyn Fn(Option<Value>) -> BoxFuture<'static, ()> + Send + Sync>;

/// A registered operation
#[derive(Clone)]
pub struct Operation {
    pub query: String,
    pub variables: Value,
    pub handler: OperationHandler,
    /// Frame-level extensions sent with the start frame
    pub extensions: Option<Value>,
    /// A start frame was sent on the current connection
    pub started: bool,
    seq: u64,
}

impl Operation {
    pub fn new(query: impl Into<String>, variables: Value, handler: OperationHandler) -> Self {
        Self {
            query: query.into(),
            variables,
            handler,
            extensions: None,
            started: false,
            seq: 0,
        }
    }

    pub fn with_extensions(mut self, extensions: Option<Value>) -> Self {
        self.extensions = extensions;
        self
    }
}

/// What a release decided
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    /// Count reached zero (or the release was forced); send a stop frame
    Stop,
    /// Other subscribers remain
    Retained(u32),
    /// Not registered, or already released and not forced
    Ignored,
}

/// Canonical dedup key for a `(query, variables)` pair
pub fn dedup_key(query: &str, variables: &Value) -> String {
    #[derive(Serialize)]
    struct Key<'a> {
        query: &'a str,
        variables: &'a Value,
    }

    serde_json::to_string(&Key { query, variables })
        .unwrap_or_else(|_| format!("{}\u{0}{}", query, variables))
}

/// Operations, reference counts and the dedup index
#[derive(Default)]
pub struct OperationRegistry {
    operations: HashMap<String, Operation>,
    counts: HashMap<String, u32>,
    dedup: HashMap<String, String>,
    counter: u64,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next operation id
    pub fn next_id(&mut self) -> String {
        self.counter += 1;
        self.counter.to_string()
    }

    /// Id of a live operation with the same dedup key, if any
    ///
    /// An operation whose stop frame was already sent is not reused.
    pub fn find_duplicate(&self, key: &str) -> Option<String> {
        self.dedup
            .get(key)
            .filter(|id| self.operations.contains_key(id.as_str()))
            .filter(|id| self.counts.get(id.as_str()).copied().unwrap_or(0) > 0)
            .cloned()
    }

    /// Register an operation with reference count 1
    pub fn insert(&mut self, id: String, mut operation: Operation, key: String) {
        operation.seq = self.counter;
        self.counts.insert(id.clone(), 1);
        self.dedup.insert(key, id.clone());
        self.operations.insert(id, operation);
    }

    /// Add a subscriber to an existing operation, returning the new count
    pub fn retain(&mut self, id: &str) -> Option<u32> {
        if !self.operations.contains_key(id) {
            return None;
        }
        let count = self.counts.entry(id.to_string()).or_insert(0);
        *count += 1;
        Some(*count)
    }

    /// Drop a subscriber
    pub fn release(&mut self, id: &str, force: bool) -> Release {
        if !self.operations.contains_key(id) {
            return Release::Ignored;
        }

        let count = self.counts.entry(id.to_string()).or_insert(0);
        if *count == 0 && !force {
            return Release::Ignored;
        }

        let remaining = count.saturating_sub(1);
        if remaining == 0 || force {
            *count = 0;
            Release::Stop
        } else {
            *count = remaining;
            Release::Retained(remaining)
        }
    }

    pub fn get(&self, id: &str) -> Option<&Operation> {
        self.operations.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Operation> {
        self.operations.get_mut(id)
    }

    pub fn remove(&mut self, id: &str) -> Option<Operation> {
        self.counts.remove(id);
        self.operations.remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.operations.contains_key(id)
    }

    pub fn count(&self, id: &str) -> Option<u32> {
        self.counts.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Registered ids in creation order
    pub fn ids(&self) -> Vec<String> {
        let mut entries: Vec<(&String, u64)> =
            self.operations.iter().map(|(id, op)| (id, op.seq)).collect();
        entries.sort_by_key(|(_, seq)| *seq);
        entries.into_iter().map(|(id, _)| id.clone()).collect()
    }

    /// Registered ids whose last subscriber has left, in creation order
    pub fn released_ids(&self) -> Vec<String> {
        self.ids()
            .into_iter()
            .filter(|id| self.counts.get(id.as_str()).copied().unwrap_or(0) == 0)
            .collect()
    }

    /// Mark every operation as not started so it is resent after reconnecting
    pub fn reset_started(&mut self) {
        for operation in self.operations.values_mut() {
            operation.started = false;
        }
    }
}
