// # Stage Snapshots and the Supplier Contract
//
// Stage / task execution and the wire transport between tasks and the
// coordinator are external collaborators (out of scope for this crate, per
// the purpose & scope). The `Supplier` trait is the seam: the embedding
// coordinator provides one callable per registered query that returns the
// current state of that query's build stages on demand.

use super::domain::Domain;
use super::ids::FilterId;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;

/// Coarse stage lifecycle state. The collector only consults
/// [`StageState::can_schedule_more_tasks`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    Planned,
    Scheduling,
    Running,
    Finishing,
    Done,
}

impl StageState {
    /// Whether the stage might still hand out new tasks. Once this is
    /// false, `numberOfTasks` is meaningful and a non-replicated filter's
    /// per-task summaries can be compared against it for completeness
    /// (completion predicate rule C).
    pub fn can_schedule_more_tasks(&self) -> bool {
        !matches!(self, StageState::Finishing | StageState::Done)
    }
}

/// One task's reported per-filter partial summaries.
#[derive(Debug, Clone, Default)]
pub struct TaskSummary {
    pub filters: HashMap<FilterId, Domain>,
}

/// Immutable snapshot of one build stage at one moment, as returned by a
/// [`Supplier`].
#[derive(Debug, Clone)]
pub struct StageSnapshot {
    pub stage_state: StageState,
    /// Expected total task count for this stage. Only meaningful once
    /// `!stage_state.can_schedule_more_tasks()`.
    pub number_of_tasks: usize,
    /// One entry per task that has reported so far, in no particular order.
    pub task_summaries: Vec<TaskSummary>,
}

impl StageSnapshot {
    /// Per-filter groups of per-task domains, restricted to `filter_ids`.
    /// Filters that no task has reported on are absent from the result.
    pub fn group_by_filter(&self, filter_ids: &[FilterId]) -> HashMap<FilterId, Vec<Domain>> {
        let mut groups: HashMap<FilterId, Vec<Domain>> = HashMap::new();
        for task in &self.task_summaries {
            for filter_id in filter_ids {
                if let Some(domain) = task.filters.get(filter_id) {
                    groups.entry(*filter_id).or_default().push(domain.clone());
                }
            }
        }
        groups
    }
}

/// Per-query callback returning the current list of build-stage snapshots.
///
/// Must be safe to call concurrently and at any moment; an empty list means
/// "no progress to report" rather than an error. A supplier is free to fail
/// (e.g. the coordinator's view of the stage is momentarily unavailable);
/// such a failure is isolated to that query's current collector tick (see
/// [`crate::dynamic_filter::collector::Collector`]).
#[async_trait]
pub trait Supplier: Send + Sync {
    async fn stage_snapshots(&self) -> Result<Vec<StageSnapshot>>;
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Value;

    #[test]
    fn group_by_filter_collects_per_task_domains() {
        let mut t1 = TaskSummary::default();
        t1.filters.insert(FilterId(1), Domain::single(Value::Integer(1)));
        let mut t2 = TaskSummary::default();
        t2.filters.insert(FilterId(1), Domain::single(Value::Integer(2)));

        let snapshot = StageSnapshot {
            stage_state: StageState::Running,
            number_of_tasks: 2,
            task_summaries: vec![t1, t2],
        };

        let groups = snapshot.group_by_filter(&[FilterId(1), FilterId(2)]);
        assert_eq!(groups.get(&FilterId(1)).unwrap().len(), 2);
        assert!(groups.get(&FilterId(2)).is_none());
    }

    #[test]
    fn finishing_and_done_cannot_schedule_more_tasks() {
        assert!(!StageState::Finishing.can_schedule_more_tasks());
        assert!(!StageState::Done.can_schedule_more_tasks());
        assert!(StageState::Running.can_schedule_more_tasks());
    }
}
