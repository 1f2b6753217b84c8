//! Region pool configuration.

use realmkeep_tick::TickConfig;
use serde::{Deserialize, Serialize};

/// Settings for the pool of region actors.
///
/// Regions are assigned to actors by `region_id % actor_count`, so every
/// session in one region is always drained by the same actor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionConfig {
    /// Number of region actors. At least one is always started.
    pub actor_count: usize,

    /// Tick settings shared by every actor.
    pub tick: TickConfig,

    /// Command channel capacity per actor.
    pub channel_size: usize,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            actor_count: 4,
            tick: TickConfig::default(),
            channel_size: 64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pool() {
        let config = RegionConfig::default();
        assert_eq!(config.actor_count, 4);
        assert_eq!(config.tick.rate_hz, 20);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: RegionConfig = serde_json::from_str(r#"{"actor_count": 2}"#).unwrap();
        assert_eq!(config.actor_count, 2);
        assert_eq!(config.channel_size, 64);
    }
}
