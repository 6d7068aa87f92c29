// # Registry
//
// Process-wide mapping from query id to its context. Safe for concurrent
// mutation: registration happens from query-submission threads, removal
// from query-completion/cancellation threads, and the collector iterates a
// snapshot of the map once per tick — all without a shared lock, mirroring
// this codebase's other process-wide `DashMap`-backed registries.

use super::context::QueryContext;
use super::ids::{FilterId, QueryId};
use super::stage::Supplier;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;

/// Process-wide `QueryId -> QueryContext` mapping.
#[derive(Default)]
pub struct Registry {
    contexts: DashMap<QueryId, Arc<QueryContext>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            contexts: DashMap::new(),
        }
    }

    /// Idempotent: if a context already exists for `query_id`, this is a
    /// no-op. Only call with a non-empty `expected` set; registering a
    /// query that produces no dynamic filters is a caller bug, not a
    /// runtime condition, and `QueryContext::new` asserts accordingly.
    pub fn register(
        &self,
        query_id: QueryId,
        supplier: Arc<dyn Supplier>,
        expected: HashSet<FilterId>,
        lazy: HashSet<FilterId>,
        replicated: HashSet<FilterId>,
    ) {
        let mut inserted = false;
        self.contexts.entry(query_id).or_insert_with(|| {
            inserted = true;
            Arc::new(QueryContext::new(supplier, expected, lazy, replicated))
        });
        if inserted {
            tracing::debug!(%query_id, "registered query for dynamic filtering");
        }
    }

    /// Drops the context. Any collector tick already holding an `Arc` to it
    /// (from an earlier snapshot) completes harmlessly against the now
    /// detached context; its result is simply never observed by anyone.
    pub fn remove(&self, query_id: &QueryId) {
        if self.contexts.remove(query_id).is_some() {
            tracing::debug!(%query_id, "removed query's dynamic filter context");
        }
    }

    pub fn get(&self, query_id: &QueryId) -> Option<Arc<QueryContext>> {
        self.contexts.get(query_id).map(|entry| entry.clone())
    }

    pub fn contains(&self, query_id: &QueryId) -> bool {
        self.contexts.contains_key(query_id)
    }

    /// A point-in-time snapshot of all currently registered queries, for the
    /// collector to iterate without holding the map locked for the
    /// duration of a tick.
    pub(crate) fn snapshot(&self) -> Vec<(QueryId, Arc<QueryContext>)> {
        self.contexts
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }
}
