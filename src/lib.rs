// Dynamic Filter Service
//
// Runtime coordination core for cross-stage dynamic filtering of equi-joins.
// Registers executing queries and the dynamic filters they will produce,
// periodically harvests per-task partial summaries from the distributed
// execution of build-side operators, merges partials into a per-filter
// domain once it is safe to do so, and publishes a live, monotonically
// tightening predicate to probe-side consumers.

pub mod common;
pub mod config;
pub mod dynamic_filter;
pub mod error;

pub use config::DynamicFilterConfig;
pub use error::{FilterServiceError, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
