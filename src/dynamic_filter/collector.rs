// # Collector
//
// The single background actor that periodically folds supplier snapshots
// into each active query's context. Modeled on this codebase's other
// watch-channel-driven background loops (see the replication slot reaper):
// a `tokio::task` spawned from `start`, stopped by flipping a
// `tokio::sync::watch<bool>` shutdown flag that the loop selects against
// alongside its tick timer.

use super::context::QueryContext;
use super::domain::Domain;
use super::ids::FilterId;
use super::registry::Registry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Background periodic collector. Construct with [`Collector::new`], then
/// [`Collector::start`] once; [`Collector::stop`] cancels the loop and waits
/// for the in-flight tick (if any) to finish.
pub struct Collector {
    registry: Arc<Registry>,
    refresh_interval: Duration,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    handle: Option<JoinHandle<()>>,
}

impl Collector {
    pub fn new(registry: Arc<Registry>, refresh_interval: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            registry,
            refresh_interval,
            shutdown_tx,
            shutdown_rx,
            handle: None,
        }
    }

    /// Spawns the periodic loop. Calling twice without an intervening
    /// `stop` is a programming error (the first loop would be leaked).
    pub fn start(&mut self) {
        assert!(self.handle.is_none(), "collector already started");
        let registry = self.registry.clone();
        let interval = self.refresh_interval;
        let mut shutdown_rx = self.shutdown_rx.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        run_tick(&registry).await;
                    }
                    _ = shutdown_rx.changed() => {
                        break;
                    }
                }
            }
        });
        self.handle = Some(handle);
    }

    /// Signals the loop to stop and awaits its completion. A no-op if the
    /// collector was never started.
    pub async fn stop(&mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }

    /// Runs exactly one tick synchronously, outside the periodic schedule.
    /// Exposed for tests that need deterministic control over when a tick
    /// happens rather than waiting on the wall clock.
    pub async fn tick_once(&self) {
        run_tick(&self.registry).await;
    }
}

async fn run_tick(registry: &Registry) {
    let mut contexts_scanned = 0usize;
    let mut filters_finalized = 0usize;

    for (query_id, context) in registry.snapshot() {
        contexts_scanned += 1;
        if context.is_completed() {
            continue;
        }

        let uncollected = context.uncollected();
        if uncollected.is_empty() {
            continue;
        }

        let snapshots = match context.supplier.stage_snapshots().await {
            Ok(snapshots) => snapshots,
            Err(err) => {
                tracing::warn!(%query_id, error = %err, "dynamic filter supplier call failed; skipping this tick");
                continue;
            }
        };

        let uncollected_ids: Vec<FilterId> = uncollected.into_iter().collect();
        let mut finalized: HashMap<FilterId, Domain> = HashMap::new();

        for stage in &snapshots {
            let groups = stage.group_by_filter(&uncollected_ids);
            for (filter_id, domains) in groups {
                if finalized.contains_key(&filter_id) {
                    continue;
                }
                if let Some(domain) = apply_completion_predicate(&context, stage, filter_id, &domains) {
                    finalized.insert(filter_id, domain);
                }
            }
        }

        if !finalized.is_empty() {
            filters_finalized += finalized.len();
            tracing::debug!(%query_id, count = finalized.len(), "finalized dynamic filters this tick");
            context.add_dynamic_filters(finalized);
        }
    }

    tracing::debug!(contexts_scanned, filters_finalized, "dynamic filter collector tick complete");
}

/// The completion predicate (rules A/B/C). Returns the domain to finalize
/// with, or `None` if coverage is still insufficient this tick.
fn apply_completion_predicate(
    context: &QueryContext,
    stage: &super::stage::StageSnapshot,
    filter_id: FilterId,
    domains: &[Domain],
) -> Option<Domain> {
    // Rule A: any reported `ALL` finalizes immediately, regardless of
    // replication or stage closure.
    if domains.iter().any(Domain::is_all) {
        return Some(Domain::all());
    }

    // Rule B: a replicated build's one task is authoritative; any reported
    // subset is already the whole story, so union what is present.
    if context.replicated().contains(&filter_id) {
        return Some(Domain::union_all(domains));
    }

    // Rule C: a partitioned build needs every task accounted for.
    if !stage.stage_state.can_schedule_more_tasks() && domains.len() == stage.number_of_tasks {
        return Some(Domain::union_all(domains));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Value;
    use crate::dynamic_filter::ids::QueryId;
    use crate::dynamic_filter::stage::test_support::ScriptedSupplier;
    use crate::dynamic_filter::stage::{StageSnapshot, StageState, TaskSummary};
    use std::collections::HashSet;

    fn task(filter: u32, v: i64) -> TaskSummary {
        let mut t = TaskSummary::default();
        t.filters.insert(FilterId(filter), Domain::single(Value::Integer(v)));
        t
    }

    fn task_range(filter: u32, lo: i64, hi: i64) -> TaskSummary {
        let mut t = TaskSummary::default();
        t.filters.insert(
            FilterId(filter),
            Domain::Ranges(vec![super::super::domain::ValueRange {
                low: Value::Integer(lo),
                high: Value::Integer(hi),
            }]),
        );
        t
    }

    #[tokio::test]
    async fn s1_non_replicated_filter_finalizes_once_stage_closed() {
        let registry = Arc::new(Registry::new());
        let query_id = QueryId::new_v4();
        let snapshot = StageSnapshot {
            stage_state: StageState::Done,
            number_of_tasks: 2,
            task_summaries: vec![task_range(1, 1, 5), task_range(1, 7, 9)],
        };
        let supplier = Arc::new(ScriptedSupplier::new(vec![vec![snapshot]]));
        registry.register(
            query_id,
            supplier,
            HashSet::from([FilterId(1)]),
            HashSet::from([FilterId(1)]),
            HashSet::new(),
        );

        let collector = Collector::new(registry.clone(), Duration::from_secs(1));
        collector.tick_once().await;

        let context = registry.get(&query_id).unwrap();
        assert!(context.is_completed());
        assert_eq!(
            context.summary(&FilterId(1)).unwrap().to_string(),
            "[1, 5] OR [7, 9]"
        );
    }

    #[tokio::test]
    async fn s2_partial_coverage_does_not_finalize() {
        let registry = Arc::new(Registry::new());
        let query_id = QueryId::new_v4();
        let snapshot = StageSnapshot {
            stage_state: StageState::Running,
            number_of_tasks: 2,
            task_summaries: vec![task(1, 1)],
        };
        let supplier = Arc::new(ScriptedSupplier::new(vec![vec![snapshot]]));
        registry.register(
            query_id,
            supplier,
            HashSet::from([FilterId(1)]),
            HashSet::from([FilterId(1)]),
            HashSet::new(),
        );

        let collector = Collector::new(registry.clone(), Duration::from_secs(1));
        collector.tick_once().await;

        let context = registry.get(&query_id).unwrap();
        assert!(!context.is_completed());
        assert!(context.summary(&FilterId(1)).is_none());
    }

    #[tokio::test]
    async fn s3_all_short_circuits_before_stage_closes() {
        let registry = Arc::new(Registry::new());
        let query_id = QueryId::new_v4();
        let mut all_task = TaskSummary::default();
        all_task.filters.insert(FilterId(1), Domain::all());
        let snapshot = StageSnapshot {
            stage_state: StageState::Running,
            number_of_tasks: 2,
            task_summaries: vec![task(1, 1), all_task],
        };
        let supplier = Arc::new(ScriptedSupplier::new(vec![vec![snapshot]]));
        registry.register(
            query_id,
            supplier,
            HashSet::from([FilterId(1)]),
            HashSet::from([FilterId(1)]),
            HashSet::new(),
        );

        let collector = Collector::new(registry.clone(), Duration::from_secs(1));
        collector.tick_once().await;

        let context = registry.get(&query_id).unwrap();
        assert!(context.is_completed());
        assert!(context.summary(&FilterId(1)).unwrap().is_all());
    }

    #[tokio::test]
    async fn s4_replicated_finalizes_while_stage_still_scheduling() {
        let registry = Arc::new(Registry::new());
        let query_id = QueryId::new_v4();
        let snapshot = StageSnapshot {
            stage_state: StageState::Running,
            number_of_tasks: 4,
            task_summaries: vec![task(2, 42)],
        };
        let supplier = Arc::new(ScriptedSupplier::new(vec![vec![snapshot]]));
        registry.register(
            query_id,
            supplier,
            HashSet::from([FilterId(2)]),
            HashSet::new(),
            HashSet::from([FilterId(2)]),
        );

        let collector = Collector::new(registry.clone(), Duration::from_secs(1));
        collector.tick_once().await;

        let context = registry.get(&query_id).unwrap();
        assert!(context.is_completed());
        assert_eq!(context.summary(&FilterId(2)).unwrap(), Domain::single(Value::Integer(42)));
    }

    #[tokio::test]
    async fn s6_two_filters_finalize_incrementally_across_ticks() {
        let registry = Arc::new(Registry::new());
        let query_id = QueryId::new_v4();
        let tick1 = vec![StageSnapshot {
            stage_state: StageState::Done,
            number_of_tasks: 1,
            task_summaries: vec![task(1, 1)],
        }];
        let tick2 = vec![StageSnapshot {
            stage_state: StageState::Done,
            number_of_tasks: 1,
            task_summaries: vec![task(2, 2)],
        }];
        let supplier = Arc::new(ScriptedSupplier::new(vec![tick1, tick2]));
        registry.register(
            query_id,
            supplier,
            HashSet::from([FilterId(1), FilterId(2)]),
            HashSet::from([FilterId(1), FilterId(2)]),
            HashSet::new(),
        );

        let collector = Collector::new(registry.clone(), Duration::from_secs(1));
        collector.tick_once().await;
        let context = registry.get(&query_id).unwrap();
        assert!(context.summary(&FilterId(1)).is_some());
        assert!(context.summary(&FilterId(2)).is_none());
        assert!(!context.is_completed());

        collector.tick_once().await;
        assert!(context.summary(&FilterId(2)).is_some());
        assert!(context.is_completed());
    }

    #[tokio::test]
    async fn supplier_failure_is_isolated_to_its_own_query() {
        use crate::error::FilterServiceError;
        use async_trait::async_trait;
        use crate::dynamic_filter::stage::Supplier;

        struct FailingSupplier;
        #[async_trait]
        impl Supplier for FailingSupplier {
            async fn stage_snapshots(&self) -> crate::error::Result<Vec<StageSnapshot>> {
                Err(FilterServiceError::Supplier("boom".to_string()))
            }
        }

        let registry = Arc::new(Registry::new());
        let failing_query = QueryId::new_v4();
        registry.register(
            failing_query,
            Arc::new(FailingSupplier),
            HashSet::from([FilterId(1)]),
            HashSet::new(),
            HashSet::new(),
        );

        let healthy_query = QueryId::new_v4();
        let snapshot = StageSnapshot {
            stage_state: StageState::Done,
            number_of_tasks: 1,
            task_summaries: vec![task(9, 9)],
        };
        registry.register(
            healthy_query,
            Arc::new(ScriptedSupplier::new(vec![vec![snapshot]])),
            HashSet::from([FilterId(9)]),
            HashSet::new(),
            HashSet::new(),
        );

        let collector = Collector::new(registry.clone(), Duration::from_secs(1));
        collector.tick_once().await;

        assert!(!registry.get(&failing_query).unwrap().is_completed());
        assert!(registry.get(&healthy_query).unwrap().is_completed());
    }

    #[tokio::test]
    async fn start_then_stop_does_not_hang() {
        let registry = Arc::new(Registry::new());
        let mut collector = Collector::new(registry, Duration::from_millis(10));
        collector.start();
        collector.stop().await;
    }
}
