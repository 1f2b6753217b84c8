//! Region actor: a Tokio task that ticks a set of regions.
//!
//! Each actor owns the sessions whose player is in one of its regions
//! and calls [`WorldSession::update_map`] on each of them every region
//! tick. The outside world talks to it only through its command channel.
//!
//! [`WorldSession::update_map`]: realmkeep_session::WorldSession::update_map

use std::collections::HashMap;

use realmkeep_protocol::{AccountId, RegionId};
use realmkeep_session::SharedSession;
use realmkeep_tick::{TickConfig, TickLoop};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace};

use crate::RegionError;

/// Commands sent to a region actor through its channel.
pub(crate) enum RegionCommand {
    /// Start draining a session's map queue.
    Join {
        account: AccountId,
        region: RegionId,
        session: SharedSession,
        reply: oneshot::Sender<Result<(), RegionError>>,
    },

    /// Stop draining a session's map queue.
    Leave {
        account: AccountId,
        region: RegionId,
        reply: oneshot::Sender<Result<(), RegionError>>,
    },

    GetInfo {
        reply: oneshot::Sender<RegionInfo>,
    },

    Shutdown,
}

/// A snapshot of one actor's load.
#[derive(Debug, Clone)]
pub struct RegionInfo {
    pub actor: usize,
    /// Sessions hosted, across all of the actor's regions.
    pub session_count: usize,
    /// Distinct regions with at least one session.
    pub region_count: usize,
    pub ticks: u64,
}

/// Handle to a running region actor. Cheap to clone.
#[derive(Clone)]
pub struct RegionHandle {
    actor: usize,
    sender: mpsc::Sender<RegionCommand>,
}

impl RegionHandle {
    pub fn actor(&self) -> usize {
        self.actor
    }

    /// Adds a session to `region`'s map-queue drains.
    pub async fn join(
        &self,
        account: AccountId,
        region: RegionId,
        session: SharedSession,
    ) -> Result<(), RegionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RegionCommand::Join {
                account,
                region,
                session,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RegionError::Unavailable(self.actor))?;
        reply_rx
            .await
            .map_err(|_| RegionError::Unavailable(self.actor))?
    }

    /// Removes a session from `region`.
    pub async fn leave(&self, account: AccountId, region: RegionId) -> Result<(), RegionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RegionCommand::Leave {
                account,
                region,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RegionError::Unavailable(self.actor))?;
        reply_rx
            .await
            .map_err(|_| RegionError::Unavailable(self.actor))?
    }

    pub async fn get_info(&self) -> Result<RegionInfo, RegionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RegionCommand::GetInfo { reply: reply_tx })
            .await
            .map_err(|_| RegionError::Unavailable(self.actor))?;
        reply_rx
            .await
            .map_err(|_| RegionError::Unavailable(self.actor))
    }

    /// Tells the actor to stop. Its sessions are released, not shut down.
    pub async fn shutdown(&self) -> Result<(), RegionError> {
        self.sender
            .send(RegionCommand::Shutdown)
            .await
            .map_err(|_| RegionError::Unavailable(self.actor))
    }
}

struct HostedSession {
    region: RegionId,
    session: SharedSession,
}

struct RegionActor {
    actor: usize,
    sessions: HashMap<AccountId, HostedSession>,
    ticks: TickLoop,
    receiver: mpsc::Receiver<RegionCommand>,
}

impl RegionActor {
    async fn run(mut self) {
        info!(actor = self.actor, rate = self.ticks.rate_hz(), "region actor started");

        loop {
            tokio::select! {
                command = self.receiver.recv() => match command {
                    Some(RegionCommand::Join { account, region, session, reply }) => {
                        let _ = reply.send(self.handle_join(account, region, session));
                    }
                    Some(RegionCommand::Leave { account, region, reply }) => {
                        let _ = reply.send(self.handle_leave(account, region));
                    }
                    Some(RegionCommand::GetInfo { reply }) => {
                        let _ = reply.send(self.info());
                    }
                    Some(RegionCommand::Shutdown) | None => break,
                },
                tick = self.ticks.next_tick() => {
                    for hosted in self.sessions.values() {
                        hosted.session.lock().update_map(tick.at);
                    }
                    trace!(actor = self.actor, tick = tick.number, sessions = self.sessions.len(), "region tick");
                    self.ticks.finish_tick();
                }
            }
        }

        info!(actor = self.actor, sessions = self.sessions.len(), "region actor stopped");
    }

    fn handle_join(
        &mut self,
        account: AccountId,
        region: RegionId,
        session: SharedSession,
    ) -> Result<(), RegionError> {
        if let Some(hosted) = self.sessions.get(&account) {
            return Err(RegionError::AlreadyHosted(account, hosted.region));
        }
        self.sessions.insert(account, HostedSession { region, session });
        debug!(actor = self.actor, %account, %region, "session joined region");
        Ok(())
    }

    fn handle_leave(&mut self, account: AccountId, region: RegionId) -> Result<(), RegionError> {
        match self.sessions.get(&account) {
            Some(hosted) if hosted.region == region => {
                self.sessions.remove(&account);
                debug!(actor = self.actor, %account, %region, "session left region");
                Ok(())
            }
            _ => Err(RegionError::NotHosted(account, region)),
        }
    }

    fn info(&self) -> RegionInfo {
        let mut regions: Vec<RegionId> = self.sessions.values().map(|h| h.region).collect();
        regions.sort_unstable();
        regions.dedup();
        RegionInfo {
            actor: self.actor,
            session_count: self.sessions.len(),
            region_count: regions.len(),
            ticks: self.ticks.tick_count(),
        }
    }
}

/// Spawns a region actor and returns its handle.
pub(crate) fn spawn_region_actor(
    actor: usize,
    tick: TickConfig,
    channel_size: usize,
) -> RegionHandle {
    let (tx, rx) = mpsc::channel(channel_size.max(1));

    let region_actor = RegionActor {
        actor,
        sessions: HashMap::new(),
        ticks: TickLoop::new(tick),
        receiver: rx,
    };
    tokio::spawn(region_actor.run());

    RegionHandle { actor, sender: tx }
}
