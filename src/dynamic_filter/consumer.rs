// # Consumer Handle Factory
//
// Builds the `DynamicFilter` view a probe-side scan operator holds for the
// lifetime of its execution: a live, possibly-incomplete predicate plus an
// awaitable that wakes the scan whenever new filtering information arrives.

use super::context::QueryContext;
use super::domain::{Domain, TupleDomain};
use super::ids::{ColHandle, FilterId, QueryId, Symbol};
use super::registry::Registry;
use async_trait::async_trait;
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::sync::Arc;

/// The view a scan operator holds over one query's dynamic filters.
#[async_trait]
pub trait DynamicFilter: Send + Sync {
    /// True iff every requested filter has been finalized.
    fn is_complete(&self) -> bool;

    /// The best currently-known predicate. Monotonically tightens across
    /// calls (never widens) until `is_complete()`, after which it is fixed.
    fn current_predicate(&self) -> TupleDomain<ColHandle>;

    /// Waits until the set of ready filters may have grown. Already-complete
    /// handles (and handles with nothing left pending) return immediately.
    /// Callers re-call this in a loop until `is_complete()` or their own
    /// cancellation fires.
    async fn blocked(&self);
}

/// Sentinel returned for a `queryId` with no registered context (query
/// already removed, or dynamic filtering disabled for this query). Behaves
/// as if the query produces no filters at all: always complete, the
/// predicate is `all()`, and `blocked()` never suspends.
pub struct EmptyDynamicFilter;

#[async_trait]
impl DynamicFilter for EmptyDynamicFilter {
    fn is_complete(&self) -> bool {
        true
    }

    fn current_predicate(&self) -> TupleDomain<ColHandle> {
        TupleDomain::all()
    }

    async fn blocked(&self) {}
}

/// A live view over one query's context, scoped to the filters one scan
/// operator requested.
pub struct LiveDynamicFilter {
    context: Arc<QueryContext>,
    /// `(filterId, sourceColumn)` for every filter this scan requested.
    descriptors: Vec<(FilterId, ColHandle)>,
    /// The subset of requested filters that carry a lazy readiness signal in
    /// this context. Requested filters absent from this list are treated as
    /// already-ready (no awaitable to wait on).
    lazy_requested: Vec<FilterId>,
    memoized: OnceCell<TupleDomain<ColHandle>>,
}

impl LiveDynamicFilter {
    fn new(context: Arc<QueryContext>, descriptors: Vec<(FilterId, ColHandle)>) -> Self {
        let lazy_requested = descriptors
            .iter()
            .map(|(id, _)| *id)
            .filter(|id| context.lazy().contains(id))
            .collect();
        Self {
            context,
            descriptors,
            lazy_requested,
            memoized: OnceCell::new(),
        }
    }

    fn compute_predicate(&self) -> TupleDomain<ColHandle> {
        let mut column_domains: HashMap<ColHandle, Domain> = HashMap::new();
        for (filter_id, col) in &self.descriptors {
            if let Some(domain) = self.context.summary(filter_id) {
                column_domains
                    .entry(*col)
                    .and_modify(|existing| *existing = existing.intersect(&domain))
                    .or_insert(domain);
            }
        }
        TupleDomain::with_column_domains(column_domains)
    }
}

#[async_trait]
impl DynamicFilter for LiveDynamicFilter {
    fn is_complete(&self) -> bool {
        self.descriptors
            .iter()
            .all(|(id, _)| self.context.summary(id).is_some())
    }

    fn current_predicate(&self) -> TupleDomain<ColHandle> {
        if let Some(memoized) = self.memoized.get() {
            return memoized.clone();
        }
        let predicate = self.compute_predicate();
        if self.is_complete() {
            // Best-effort memoization: if another thread raced us, its
            // value is identical (predicates are deterministic once
            // complete), so losing the race is harmless.
            let _ = self.memoized.set(predicate.clone());
        }
        predicate
    }

    async fn blocked(&self) {
        let mut pending: Vec<_> = self
            .lazy_requested
            .iter()
            .filter(|id| !self.context.signal_fired(id))
            .filter_map(|id| self.context.signal_receiver(id))
            .collect();

        if pending.is_empty() {
            return;
        }

        let futures = pending
            .iter_mut()
            .map(|rx| Box::pin(rx.changed()))
            .collect::<Vec<_>>();
        let _ = futures::future::select_all(futures).await;
    }
}

/// Builds a `DynamicFilter` for one scan operator.
///
/// `descriptors` names which filters the scan intends to use and the
/// plan-side symbol each applies to; `symbol_to_column` resolves those
/// symbols to concrete source columns. A descriptor whose symbol is not in
/// `symbol_to_column` indicates the plan and the scan disagree about their
/// own column bindings, which is a programming error, not a runtime one.
pub fn create_dynamic_filter(
    registry: &Registry,
    query_id: QueryId,
    descriptors: &[(FilterId, Symbol)],
    symbol_to_column: &HashMap<Symbol, ColHandle>,
) -> Arc<dyn DynamicFilter> {
    let Some(context) = registry.get(&query_id) else {
        return Arc::new(EmptyDynamicFilter);
    };

    let resolved: Vec<(FilterId, ColHandle)> = descriptors
        .iter()
        .map(|(filter_id, symbol)| {
            let col = symbol_to_column.get(symbol).unwrap_or_else(|| {
                panic!("dynamic filter descriptor references unbound symbol {symbol}")
            });
            (*filter_id, *col)
        })
        .collect();

    Arc::new(LiveDynamicFilter::new(context, resolved))
}
