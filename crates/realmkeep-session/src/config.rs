//! Session timing and behavior settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration shared by every session on the realm.
///
/// All durations are stored as whole seconds so the config reads
/// naturally as JSON; use the accessor methods to get `Duration`s.
///
/// ```rust
/// use realmkeep_session::SessionConfig;
///
/// let config = SessionConfig {
///     kick_on_bad_packet: true,
///     ..Default::default()
/// };
/// assert_eq!(config.logout_delay().as_secs(), 20);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// How long a session may idle at character selection before it is
    /// disconnected.
    ///
    /// Default: 15 minutes.
    pub char_selection_timeout_secs: u64,

    /// How long a requested logout waits before it fires.
    ///
    /// Default: 20 seconds.
    pub logout_delay_secs: u64,

    /// How long a player whose socket dropped stays in the world waiting
    /// for the client to reconnect.
    ///
    /// Default: 20 seconds.
    pub offline_grace_secs: u64,

    /// Kick the player when one of their envelopes fails to parse.
    ///
    /// Default: `false` (log and drop the envelope only).
    pub kick_on_bad_packet: bool,

    /// Delay between the first and second time-sync request.
    pub time_sync_first_interval_secs: u64,

    /// Delay between every later time-sync request.
    pub time_sync_interval_secs: u64,

    /// Message of the day. Lines are separated by `@`.
    pub motd: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            char_selection_timeout_secs: 15 * 60,
            logout_delay_secs: 20,
            offline_grace_secs: 20,
            kick_on_bad_packet: false,
            time_sync_first_interval_secs: 5,
            time_sync_interval_secs: 10,
            motd: "Welcome to Realmkeep.".to_string(),
        }
    }
}

impl SessionConfig {
    pub fn char_selection_timeout(&self) -> Duration {
        Duration::from_secs(self.char_selection_timeout_secs)
    }

    pub fn logout_delay(&self) -> Duration {
        Duration::from_secs(self.logout_delay_secs)
    }

    pub fn offline_grace(&self) -> Duration {
        Duration::from_secs(self.offline_grace_secs)
    }

    pub fn time_sync_first_interval(&self) -> Duration {
        Duration::from_secs(self.time_sync_first_interval_secs)
    }

    pub fn time_sync_interval(&self) -> Duration {
        Duration::from_secs(self.time_sync_interval_secs)
    }
}
