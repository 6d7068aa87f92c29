// # Stats View
//
// A stateless, read-only projection of a query's dynamic filter context for
// introspection endpoints (EXPLAIN, admin UI). Never mutates context state;
// every field is recomputed from the context at call time.

use super::ids::FilterId;
use super::registry::Registry;
use serde::{Deserialize, Serialize};

/// A simplified summary of one filter's bound, bounded to a small display
/// size by `simplify(1)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DynamicFilterDomainStats {
    pub filter_id: FilterId,
    pub simplified_domain: String,
    pub range_count: usize,
    pub discrete_values_count: usize,
}

/// JSON-serializable snapshot of one query's dynamic filtering progress.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DynamicFilterStats {
    pub dynamic_filter_domain_stats: Vec<DynamicFilterDomainStats>,
    pub lazy_dynamic_filters: usize,
    pub replicated_dynamic_filters: usize,
    pub total_dynamic_filters: usize,
    pub dynamic_filters_completed: usize,
}

impl DynamicFilterStats {
    /// The all-zero projection returned for a `queryId` with no registered
    /// context.
    pub fn empty() -> Self {
        Self {
            dynamic_filter_domain_stats: Vec::new(),
            lazy_dynamic_filters: 0,
            replicated_dynamic_filters: 0,
            total_dynamic_filters: 0,
            dynamic_filters_completed: 0,
        }
    }
}

/// Builds a [`DynamicFilterStats`] for `query_id`, or the empty projection
/// if the query has no registered context.
pub fn stats(registry: &Registry, query_id: &super::ids::QueryId) -> DynamicFilterStats {
    let Some(context) = registry.get(query_id) else {
        return DynamicFilterStats::empty();
    };

    const DISPLAY_THRESHOLD: usize = 1;

    let mut domain_stats: Vec<DynamicFilterDomainStats> = context
        .expected()
        .iter()
        .filter_map(|filter_id| {
            context.summary(filter_id).map(|domain| DynamicFilterDomainStats {
                filter_id: *filter_id,
                simplified_domain: domain.simplify(DISPLAY_THRESHOLD).to_string(),
                range_count: domain.range_count(),
                discrete_values_count: domain.discrete_value_count(),
            })
        })
        .collect();
    domain_stats.sort_by_key(|s| s.filter_id);

    let completed_count = domain_stats.len();

    DynamicFilterStats {
        dynamic_filter_domain_stats: domain_stats,
        lazy_dynamic_filters: context.lazy().len(),
        replicated_dynamic_filters: context.replicated().len(),
        total_dynamic_filters: context.expected().len(),
        dynamic_filters_completed: completed_count,
    }
}
