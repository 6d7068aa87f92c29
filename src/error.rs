use thiserror::Error;

/// Errors surfaced across the public API.
///
/// Invariant violations (double-finalization, double-fire, registering a
/// query with an empty expected-filter set, an unresolvable column binding)
/// are deliberately *not* represented here: per the error handling design,
/// those are programming errors and fail loudly via `assert!`/`panic!`
/// rather than flowing through `Result`. This enum only covers the one
/// genuinely fallible runtime condition: a query's supplier failing to
/// report stage snapshots on a given collector tick.
#[derive(Error, Debug, Clone)]
pub enum FilterServiceError {
    #[error("supplier call failed: {0}")]
    Supplier(String),
}

pub type Result<T> = std::result::Result<T, FilterServiceError>;
