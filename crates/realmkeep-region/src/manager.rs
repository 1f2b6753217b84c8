//! Region manager: a fixed pool of region actors and the index of which
//! session is placed where.

use std::collections::HashMap;

use realmkeep_protocol::{AccountId, RegionId};
use realmkeep_session::SharedSession;
use tracing::{debug, info, warn};

use crate::actor::spawn_region_actor;
use crate::{RegionConfig, RegionError, RegionHandle, RegionInfo};

/// Owns the region actors and routes sessions to them.
///
/// A session is placed in at most one region at a time. Callers report
/// where each session's player currently is through
/// [`place`](Self::place); the manager moves it between actors as needed.
pub struct RegionManager {
    actors: Vec<RegionHandle>,
    placements: HashMap<AccountId, RegionId>,
}

impl RegionManager {
    /// Spawns the actor pool. Must be called from within a Tokio runtime.
    pub fn start(config: RegionConfig) -> Self {
        let count = config.actor_count.max(1);
        let actors = (0..count)
            .map(|actor| spawn_region_actor(actor, config.tick.clone(), config.channel_size))
            .collect();
        info!(actors = count, rate = config.tick.rate_hz, "region pool started");
        Self {
            actors,
            placements: HashMap::new(),
        }
    }

    /// The actor that ticks `region`.
    pub fn actor_for(&self, region: RegionId) -> &RegionHandle {
        &self.actors[region.0 as usize % self.actors.len()]
    }

    /// Moves a session to `region`, or out of every region with `None`.
    /// Placing a session where it already is does nothing.
    pub async fn place(
        &mut self,
        account: AccountId,
        region: Option<RegionId>,
        session: SharedSession,
    ) -> Result<(), RegionError> {
        let current = self.placements.get(&account).copied();
        if current == region {
            return Ok(());
        }

        if let Some(old) = current {
            self.actor_for(old).leave(account, old).await?;
            self.placements.remove(&account);
        }
        if let Some(new) = region {
            self.actor_for(new).join(account, new, session).await?;
            self.placements.insert(account, new);
        }
        debug!(%account, from = ?current, to = ?region, "session re-homed");
        Ok(())
    }

    /// Takes a session out of its region, if it is in one.
    pub async fn remove(&mut self, account: AccountId) -> Result<(), RegionError> {
        let Some(region) = self.placements.remove(&account) else {
            return Ok(());
        };
        self.actor_for(region).leave(account, region).await
    }

    pub fn placement(&self, account: AccountId) -> Option<RegionId> {
        self.placements.get(&account).copied()
    }

    /// Number of placed sessions.
    pub fn len(&self) -> usize {
        self.placements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }

    pub fn actor_count(&self) -> usize {
        self.actors.len()
    }

    /// Load snapshots from every actor that answers.
    pub async fn infos(&self) -> Vec<RegionInfo> {
        let mut infos = Vec::with_capacity(self.actors.len());
        for handle in &self.actors {
            match handle.get_info().await {
                Ok(info) => infos.push(info),
                Err(err) => warn!(actor = handle.actor(), %err, "region actor did not answer"),
            }
        }
        infos
    }

    /// Stops every actor and forgets all placements.
    pub async fn shutdown(&mut self) {
        for handle in &self.actors {
            let _ = handle.shutdown().await;
        }
        self.placements.clear();
        info!("region pool stopped");
    }
}
