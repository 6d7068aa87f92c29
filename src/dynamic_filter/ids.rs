// Identifiers used throughout the dynamic filter service.

use crate::common::{ColumnId, TableId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque, plan-assigned identifier for one dynamic filter.
///
/// Dense and assigned at planning time, one per dynamic filter declared on a
/// join node — mirrors how join/filter node ids are minted elsewhere in this
/// codebase's planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FilterId(pub u32);

impl fmt::Display for FilterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DF[{}]", self.0)
    }
}

/// Opaque reference to a concrete source column, as seen from one scan
/// operator's view of the world.
///
/// A bare string symbol is not enough to identify a column unambiguously
/// across tables, so this pairs the owning table with the column within it
/// — the same shape the catalog elsewhere in this codebase uses to address
/// columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColHandle {
    pub table: TableId,
    pub column: ColumnId,
}

impl ColHandle {
    pub fn new(table: TableId, column: ColumnId) -> Self {
        Self { table, column }
    }
}

impl fmt::Display for ColHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

/// Coordinator-assigned query identifier, matching the session/transaction
/// id convention used elsewhere in this codebase.
pub type QueryId = uuid::Uuid;

/// A plan-side symbol naming an expression's result, as produced by the
/// binder (out of scope for this crate). Scan operators resolve these to
/// concrete [`ColHandle`]s before constructing a [`crate::dynamic_filter::consumer::DynamicFilter`].
pub type Symbol = String;
