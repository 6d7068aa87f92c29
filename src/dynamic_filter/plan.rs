// # Plan Inspection
//
// A minimal stand-in for the planner's fragment/node tree. Real plan nodes
// carry a great deal more (output schemas, partitioning, statistics); this
// module only models the shape the dynamic filter service needs to answer
// four questions about a query's plan: which filters does a fragment
// produce, which does it consume, which of those are replicated, and which
// are lazy (cross-stage). See [`crate::dynamic_filter::context::QueryContext`]
// for how these drive registration and the completion predicate.

use super::ids::{ColHandle, FilterId, Symbol};
use std::collections::HashSet;

/// Join distribution, carried on a node that produces dynamic filters.
/// A `Replicated` build side runs as exactly one task per worker and that
/// task's summary is the whole story for the filter (completion predicate
/// rule B); a `Partitioned` build side is sharded across many tasks whose
/// summaries must all be collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinDistribution {
    Replicated,
    Partitioned,
}

/// One dynamic filter declaration attached to a join node: the filter id
/// the build side will produce a summary for, and the build-side column it
/// summarizes.
#[derive(Debug, Clone)]
pub struct DynamicFilterSource {
    pub filter_id: FilterId,
    pub build_column: ColHandle,
}

/// One dynamic filter consumption attached to a scan (or other probe-side)
/// node: the filter id to wait on, and the probe-side symbol it narrows.
#[derive(Debug, Clone)]
pub struct DynamicFilterConsumption {
    pub filter_id: FilterId,
    pub probe_symbol: Symbol,
}

/// A plan node that may produce and/or consume dynamic filters.
///
/// Real plan trees are recursive and carry many node kinds; this crate only
/// needs to enumerate the filters attached at join and scan nodes, so a flat
/// per-node filter list is enough. `children` lets [`produced`]/[`consumed`]
/// walk a whole fragment (or the whole plan, if a query is planned as a
/// single fragment) without the embedding planner needing to flatten it.
#[derive(Debug, Clone, Default)]
pub struct PlanNode {
    pub produces: Vec<DynamicFilterSource>,
    pub consumes: Vec<DynamicFilterConsumption>,
    pub join_distribution: Option<JoinDistribution>,
    pub children: Vec<PlanNode>,
}

impl PlanNode {
    fn walk(&self, f: &mut impl FnMut(&PlanNode)) {
        f(self);
        for child in &self.children {
            child.walk(f);
        }
    }
}

/// One stage's root plan. A query's full plan is a set of fragments, each
/// scheduled as its own stage.
#[derive(Debug, Clone)]
pub struct Fragment {
    pub root: PlanNode,
}

/// All filter ids produced anywhere in `fragment`.
pub fn produced(fragment: &Fragment) -> HashSet<FilterId> {
    let mut out = HashSet::new();
    fragment.root.walk(&mut |node| {
        for source in &node.produces {
            out.insert(source.filter_id);
        }
    });
    out
}

/// All filter ids consumed anywhere in `fragment`.
pub fn consumed(fragment: &Fragment) -> HashSet<FilterId> {
    let mut out = HashSet::new();
    fragment.root.walk(&mut |node| {
        for consumption in &node.consumes {
            out.insert(consumption.filter_id);
        }
    });
    out
}

/// Filter ids produced by a `Replicated` join within `fragment`.
pub fn replicated(fragment: &Fragment) -> HashSet<FilterId> {
    let mut out = HashSet::new();
    fragment.root.walk(&mut |node| {
        if node.join_distribution == Some(JoinDistribution::Replicated) {
            for source in &node.produces {
                out.insert(source.filter_id);
            }
        }
    });
    out
}

/// Filter ids produced in `fragment` but not consumed in it —
/// `produced(fragment) \ consumed(fragment)`. The set difference enforces
/// invariant I4: a filter whose producer and consumer live in the same
/// fragment cannot be lazy, since a scan blocking on it there would block
/// the same fragment's own build side from ever running.
pub fn lazy(fragment: &Fragment) -> HashSet<FilterId> {
    let produced = produced(fragment);
    let consumed = consumed(fragment);
    produced.difference(&consumed).copied().collect()
}

/// For a plan split across several fragments (stages), the lazy filter set
/// is the union of each fragment's own `lazy` set.
pub fn lazy_for_plan<'a>(fragments: impl IntoIterator<Item = &'a Fragment>) -> HashSet<FilterId> {
    fragments.into_iter().flat_map(lazy).collect()
}
