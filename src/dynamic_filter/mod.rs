//! Runtime coordination for cross-stage dynamic filtering of equi-joins.
//!
//! Registers executing queries and the dynamic filters their plans declare,
//! periodically harvests per-task partial summaries from build-side
//! operators through a [`stage::Supplier`], merges them into per-filter
//! domains once the completion predicate in [`collector`] permits, and hands
//! probe-side scans a [`consumer::DynamicFilter`] view that tightens over
//! time and unblocks them as filters become ready.

pub mod collector;
pub mod consumer;
pub mod context;
pub mod domain;
pub mod ids;
pub mod plan;
pub mod registry;
pub mod stage;
pub mod stats;

use self::collector::Collector;
use self::consumer::DynamicFilter;
use self::ids::{ColHandle, FilterId, QueryId, Symbol};
use self::registry::Registry;
use self::stage::Supplier;
use self::stats::DynamicFilterStats;
use crate::config::DynamicFilterConfig;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Process-wide entry point: owns the registry and the background
/// collector, and exposes the registration/consumer/stats operations a
/// coordinator embeds.
pub struct DynamicFilterService {
    registry: Arc<Registry>,
    collector: Collector,
}

impl DynamicFilterService {
    pub fn new(config: DynamicFilterConfig) -> Self {
        let registry = Arc::new(Registry::new());
        let collector = Collector::new(registry.clone(), config.refresh_interval);
        Self { registry, collector }
    }

    /// Starts the background collector. Call once, typically at coordinator
    /// startup.
    pub fn start(&mut self) {
        self.collector.start();
    }

    /// Stops the background collector and waits for any in-flight tick to
    /// finish. Registered contexts are left in place; `register` calls after
    /// `stop` are harmless no-ops from the collector's perspective (nothing
    /// will ever collect them), matching the embedding coordinator's own
    /// shutdown sequence.
    pub async fn stop(&mut self) {
        self.collector.stop().await;
    }

    /// Registers a query's expected dynamic filters. A no-op if `query_id`
    /// is already registered. `expected` must be non-empty — a query with no
    /// dynamic filters to produce should simply not call this.
    pub fn register(
        &self,
        query_id: QueryId,
        supplier: Arc<dyn Supplier>,
        expected: HashSet<FilterId>,
        lazy: HashSet<FilterId>,
        replicated: HashSet<FilterId>,
    ) {
        self.registry.register(query_id, supplier, expected, lazy, replicated);
    }

    /// Drops a query's context. Safe to call even if a collector tick is
    /// concurrently iterating the registry's snapshot: that tick simply
    /// completes against a context no longer reachable from the registry.
    pub fn remove(&self, query_id: &QueryId) {
        self.registry.remove(query_id);
    }

    /// Builds a consumer handle for one scan operator. Returns the empty
    /// sentinel if `query_id` has no registered context.
    pub fn create_dynamic_filter(
        &self,
        query_id: QueryId,
        descriptors: &[(FilterId, Symbol)],
        symbol_to_column: &HashMap<Symbol, ColHandle>,
    ) -> Arc<dyn DynamicFilter> {
        consumer::create_dynamic_filter(&self.registry, query_id, descriptors, symbol_to_column)
    }

    /// Read-only stats projection for introspection endpoints.
    pub fn stats(&self, query_id: &QueryId) -> DynamicFilterStats {
        stats::stats(&self.registry, query_id)
    }

    /// Number of currently registered queries.
    pub fn registered_queries(&self) -> usize {
        self.registry.len()
    }
}
