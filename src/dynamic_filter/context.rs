// # Per-Query Context
//
// The mutable aggregation state for one executing query: which filters it
// expects, the finalized summary for each, and a readiness signal for each
// lazy filter. Exactly one writer (the collector, see
// [`crate::dynamic_filter::collector::Collector`]) mutates this; any number
// of consumer handles read it concurrently.

use super::domain::Domain;
use super::ids::FilterId;
use super::stage::Supplier;
use dashmap::DashMap;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Per-filter readiness signal. Level-triggered and one-shot: once fired it
/// stays fired, and a receiver created after the fire observes it
/// immediately via [`watch::Receiver::borrow`] without having to race a
/// `changed()` call.
pub(crate) struct Signal {
    tx: watch::Sender<bool>,
}

impl Signal {
    fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    pub(crate) fn is_fired(&self) -> bool {
        *self.tx.borrow()
    }

    /// Fire the signal. Firing twice is a programming error: the collector
    /// must only finalize a given filter once (invariant I1/I2).
    fn fire(&self) {
        // `send_if_modified` reports whether the closure actually changed
        // the value: true the first time (false -> true), false on any
        // later call (already true, left untouched).
        let fired_for_the_first_time = self.tx.send_if_modified(|fired| {
            if *fired {
                false
            } else {
                *fired = true;
                true
            }
        });
        assert!(
            fired_for_the_first_time,
            "signal fired twice; double-finalization of a lazy filter"
        );
    }
}

/// Holds the mutable aggregation state for one executing query.
pub struct QueryContext {
    pub(crate) supplier: Arc<dyn Supplier>,
    pub(crate) expected: HashSet<FilterId>,
    pub(crate) replicated: HashSet<FilterId>,
    pub(crate) lazy: HashSet<FilterId>,
    pub(crate) summaries: DashMap<FilterId, Domain>,
    signals: HashMap<FilterId, Signal>,
    completed: AtomicBool,
}

impl QueryContext {
    /// `expected` must be non-empty; registering a query with no expected
    /// filters is a planner bug (the caller should not have called
    /// `register` at all — see [`crate::dynamic_filter::registry::Registry::register`]).
    pub(crate) fn new(
        supplier: Arc<dyn Supplier>,
        expected: HashSet<FilterId>,
        lazy: HashSet<FilterId>,
        replicated: HashSet<FilterId>,
    ) -> Self {
        assert!(
            !expected.is_empty(),
            "registering a query with no expected dynamic filters"
        );
        assert!(
            replicated.is_subset(&expected),
            "replicated filter set is not a subset of expected filters"
        );
        assert!(
            lazy.is_subset(&expected),
            "lazy filter set is not a subset of expected filters"
        );

        let signals = lazy.iter().map(|id| (*id, Signal::new())).collect();

        Self {
            supplier,
            expected,
            replicated,
            lazy,
            summaries: DashMap::new(),
            signals,
            completed: AtomicBool::new(false),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    pub fn expected(&self) -> &HashSet<FilterId> {
        &self.expected
    }

    pub fn replicated(&self) -> &HashSet<FilterId> {
        &self.replicated
    }

    pub fn lazy(&self) -> &HashSet<FilterId> {
        &self.lazy
    }

    /// Filter ids not yet finalized.
    pub(crate) fn uncollected(&self) -> HashSet<FilterId> {
        self.expected
            .iter()
            .filter(|id| !self.summaries.contains_key(*id))
            .copied()
            .collect()
    }

    pub fn summary(&self, filter_id: &FilterId) -> Option<Domain> {
        self.summaries.get(filter_id).map(|d| d.clone())
    }

    pub(crate) fn signal_receiver(&self, filter_id: &FilterId) -> Option<watch::Receiver<bool>> {
        self.signals.get(filter_id).map(Signal::subscribe)
    }

    pub(crate) fn signal_fired(&self, filter_id: &FilterId) -> bool {
        self.signals
            .get(filter_id)
            .map(Signal::is_fired)
            .unwrap_or(true)
    }

    /// Install a batch of newly finalized summaries. Called only by the
    /// collector, once per tick per query, with the filters it determined
    /// are finalizable this tick (§4.3/§4.4 of the design).
    ///
    /// Insert-then-fire ordering matters: a reader that observes a fired
    /// signal must subsequently observe the summary in the map (§5's
    /// ordering guarantee), so each insert happens before its signal fires.
    pub(crate) fn add_dynamic_filters(&self, finalized: HashMap<FilterId, Domain>) {
        for (filter_id, domain) in finalized {
            let previous = self.summaries.insert(filter_id, domain);
            assert!(
                previous.is_none(),
                "filter {filter_id} finalized twice; violates write-once summaries invariant"
            );
            if let Some(signal) = self.signals.get(&filter_id) {
                signal.fire();
            }
        }
        if self.expected.iter().all(|id| self.summaries.contains_key(id)) {
            self.completed.store(true, Ordering::Release);
        }
    }
}
