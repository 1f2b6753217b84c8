//! The session registry: every live session on the realm, keyed by
//! account.
//!
//! Owned by the world loop. Each world tick it runs every session's
//! [`update`](WorldSession::update), shuts down and drops the ones that
//! report [`UpdateOutcome::Remove`], admits queued logins while there is
//! room, and re-homes sessions on the region actor that matches where
//! their player is now.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use realmkeep_protocol::{AccountId, Envelope};
use realmkeep_region::RegionManager;
use realmkeep_session::{
    AuthenticatedAccount, Services, SessionError, SessionInbox, SharedSession, Socket,
    UpdateOutcome, WorldSession,
};
use tracing::{debug, info, warn};

pub struct SessionRegistry {
    services: Services,
    sessions: HashMap<AccountId, SharedSession>,
    /// Login queue, front is next in.
    queue: VecDeque<AccountId>,
    /// `0` means unlimited.
    max_active: usize,
    regions: RegionManager,
}

impl SessionRegistry {
    pub fn new(services: Services, max_active: usize, regions: RegionManager) -> Self {
        Self {
            services,
            sessions: HashMap::new(),
            queue: VecDeque::new(),
            max_active,
            regions,
        }
    }

    /// Registers an authenticated connection and returns the inbox its
    /// reader should feed.
    ///
    /// A login for an account that already has a session hands the new
    /// socket to that session instead of creating a second one. The
    /// addon manifest left in `auth` is read into whichever session ends
    /// up with the socket.
    ///
    /// # Errors
    /// [`SessionError::SocketPending`] when the existing session is
    /// still waiting to activate an earlier replacement socket. The
    /// caller should close `socket`.
    pub fn add_session(
        &mut self,
        account: AuthenticatedAccount,
        socket: Arc<dyn Socket>,
        auth: &mut Envelope,
        now: Instant,
    ) -> Result<Arc<SessionInbox>, SessionError> {
        let account_id = account.account_id;

        if let Some(existing) = self.sessions.get(&account_id) {
            let mut session = existing.lock();
            session.request_new_socket(socket)?;
            read_addons(&mut session, auth);
            info!(account = %account_id, "login handed to existing session");
            return Ok(Arc::clone(session.inbox()));
        }

        let mut session = WorldSession::new(account, socket, self.services.clone(), now);
        read_addons(&mut session, auth);

        if self.max_active > 0 && self.active_count() >= self.max_active {
            self.queue.push_back(account_id);
            let position = self.queue.len() as u32;
            session.set_in_queue(Some(position));
            info!(account = %account_id, position, "realm full, login queued");
        }

        let inbox = Arc::clone(session.inbox());
        self.sessions.insert(account_id, session.into_shared());
        Ok(inbox)
    }

    /// Runs one world tick over every session.
    ///
    /// Returns the number of sessions removed.
    pub async fn update_sessions(&mut self, now: Instant) -> usize {
        let finished: Vec<AccountId> = self
            .sessions
            .iter()
            .filter(|(_, session)| session.lock().update(now) == UpdateOutcome::Remove)
            .map(|(account, _)| *account)
            .collect();

        for account in &finished {
            self.remove_session(*account).await;
        }

        self.admit_queued();
        self.rehome().await;
        finished.len()
    }

    pub fn get(&self, account: AccountId) -> Option<&SharedSession> {
        self.sessions.get(&account)
    }

    /// Number of sessions, queued ones included.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Sessions past the login queue.
    pub fn active_count(&self) -> usize {
        self.sessions.len() - self.queue.len()
    }

    pub fn queued_count(&self) -> usize {
        self.queue.len()
    }

    /// 1-based position in the login queue.
    pub fn queue_position(&self, account: AccountId) -> Option<u32> {
        self.queue
            .iter()
            .position(|queued| *queued == account)
            .map(|index| index as u32 + 1)
    }

    pub fn regions(&self) -> &RegionManager {
        &self.regions
    }

    /// Shuts down every session, then the region pool.
    pub async fn shutdown(&mut self) {
        let accounts: Vec<AccountId> = self.sessions.keys().copied().collect();
        for account in accounts {
            self.remove_session(account).await;
        }
        self.regions.shutdown().await;
        info!("session registry shut down");
    }

    async fn remove_session(&mut self, account: AccountId) {
        let Some(session) = self.sessions.remove(&account) else {
            return;
        };
        // Off the region first so its actor stops touching the session.
        if let Err(err) = self.regions.remove(account).await {
            warn!(%account, %err, "could not take session off its region");
        }
        self.queue.retain(|queued| *queued != account);
        session.lock().shutdown();
        info!(%account, remaining = self.sessions.len(), "session removed");
    }

    /// Lets queued logins in while there is room, then tells everyone
    /// still waiting their new position.
    fn admit_queued(&mut self) {
        while self.max_active == 0 || self.active_count() < self.max_active {
            let Some(account) = self.queue.pop_front() else {
                break;
            };
            if let Some(session) = self.sessions.get(&account) {
                let mut session = session.lock();
                session.set_in_queue(None);
                session.send_auth_wait_queue(0);
                info!(%account, "admitted from login queue");
            }
        }

        for (index, account) in self.queue.iter().enumerate() {
            let position = index as u32 + 1;
            let Some(session) = self.sessions.get(account) else {
                continue;
            };
            let mut session = session.lock();
            if session.queue_position() != Some(position) {
                session.set_in_queue(Some(position));
                session.send_auth_wait_queue(position);
            }
        }
    }

    async fn rehome(&mut self) {
        for (account, session) in &self.sessions {
            let region = session.lock().player_region();
            if let Err(err) = self
                .regions
                .place(*account, region, Arc::clone(session))
                .await
            {
                warn!(%account, ?region, %err, "could not re-home session");
            }
        }
    }
}

fn read_addons(session: &mut WorldSession, auth: &mut Envelope) {
    match session.read_addons_info(auth) {
        Ok(count) => debug!(account = %session.account_id(), count, "addon manifest read"),
        Err(err) => warn!(account = %session.account_id(), %err, "addon manifest rejected"),
    }
}
