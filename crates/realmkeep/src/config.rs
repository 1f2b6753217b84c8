//! Server configuration.

use std::time::Duration;

use realmkeep_region::RegionConfig;
use realmkeep_session::SessionConfig;
use realmkeep_tick::TickConfig;
use serde::{Deserialize, Serialize};

use crate::RealmkeepError;

/// Everything needed to run a realm.
///
/// Missing fields fall back to their defaults, so a JSON file only has to
/// name what it changes:
///
/// ```rust
/// use realmkeep::ServerConfig;
///
/// let config = ServerConfig::from_json(r#"{ "bind_addr": "0.0.0.0:8085" }"#).unwrap();
/// assert_eq!(config.bind_addr, "0.0.0.0:8085");
/// assert_eq!(config.world_tick.rate_hz, 20);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub bind_addr: String,

    /// The world tick: drains every session's generic queue and advances
    /// its lifecycle.
    pub world_tick: TickConfig,

    /// The region actor pool: drains map queues.
    pub regions: RegionConfig,

    pub session: SessionConfig,

    /// Sessions admitted to character selection before new logins are
    /// queued. `0` disables the login queue.
    pub max_active_sessions: usize,

    /// How long a new connection has to send its auth session frame.
    pub handshake_timeout_secs: u64,

    /// Authenticated connections waiting for the world loop to admit them.
    pub admission_channel_size: usize,

    /// Inbound opcodes remembered per connection for diagnostics.
    pub opcode_history: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8085".to_string(),
            world_tick: TickConfig::with_rate(20),
            regions: RegionConfig::default(),
            session: SessionConfig::default(),
            max_active_sessions: 0,
            handshake_timeout_secs: 5,
            admission_channel_size: 256,
            opcode_history: realmkeep_transport::DEFAULT_HISTORY_CAPACITY,
        }
    }
}

impl ServerConfig {
    /// Parses a config from JSON. Absent fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, RealmkeepError> {
        serde_json::from_str(json).map_err(RealmkeepError::Config)
    }

    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the world tick rate in Hz.
    pub fn world_rate(mut self, rate_hz: u32) -> Self {
        self.world_tick.rate_hz = rate_hz;
        self
    }

    pub fn regions(mut self, regions: RegionConfig) -> Self {
        self.regions = regions;
        self
    }

    pub fn session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    /// Caps active sessions; later logins wait in the login queue.
    pub fn max_active_sessions(mut self, limit: usize) -> Self {
        self.max_active_sessions = limit;
        self
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }
}
