// # Dynamic Filter Service Configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for the dynamic filter service.
///
/// The embedding coordinator's own configuration loader (out of scope for
/// this crate) is responsible for producing one of these, typically from a
/// `dynamic-filtering.toml`-style section alongside the rest of its startup
/// configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DynamicFilterConfig {
    /// How often the collector scans active query contexts and attempts to
    /// finalize newly-eligible filters. Corresponds to
    /// `dynamicFilteringRefreshInterval`.
    #[serde(with = "duration_secs")]
    pub refresh_interval: Duration,
}

impl Default for DynamicFilterConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(30),
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Ok(Duration::from_secs_f64(secs))
    }
}
