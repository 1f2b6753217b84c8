//! The world session: one per authenticated account.
//!
//! A session ties together the account's identity, its current socket,
//! the character it has in the world (if any), and the lifecycle state
//! machine driven by the world tick. The tick entry points live in
//! `dispatch.rs`, the logout sequence in `logout.rs`, and the per-feature
//! caches (account data, tutorials, addons, time sync) in their own
//! modules; this file holds the struct, its accessors, the lifecycle
//! transitions, and the outbound helpers.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use realmkeep_protocol::{
    AccountId, AccountSecurity, AuthResult, Envelope, Locale, Opcode, PlayerGuid, RegionId,
    ServerMessage, SessionKey, TransferAbortReason,
};
use tracing::{debug, error, info, trace, warn};

use crate::account_data::AccountDataCache;
use crate::addons::AddonEntry;
use crate::time_sync::TimeSync;
use crate::tutorials::Tutorials;
use crate::{
    AuthenticatedAccount, Database, Messager, OpcodeTable, Player, SessionConfig, SessionError,
    SessionInbox, SessionState, Socket, World,
};

/// A session shared between the world tick and its region's tick.
pub type SharedSession = Arc<Mutex<WorldSession>>;

/// The collaborators every session on a realm talks to.
#[derive(Clone)]
pub struct Services {
    pub world: Arc<dyn World>,
    pub login_db: Arc<dyn Database>,
    pub character_db: Arc<dyn Database>,
    pub opcodes: Arc<OpcodeTable>,
    pub config: Arc<SessionConfig>,
}

/// A logout that will fire once its delay has passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ScheduledLogout {
    pub(crate) requested_at: Instant,
    /// Kicks skip the delay.
    pub(crate) immediate: bool,
}

/// One authenticated account's connection to the world.
///
/// Everything except the inbox is touched only from tick context, with
/// the session's lock held. The inbox is the one part the network side
/// writes to directly.
pub struct WorldSession {
    // -- Identity --
    pub(crate) account_id: AccountId,
    pub(crate) security: AccountSecurity,
    pub(crate) expansion: u8,
    pub(crate) locale: Locale,

    // -- Character and sockets --
    pub(crate) player: Option<Box<dyn Player>>,
    /// Persisted identity of the last character attached. Kept after
    /// logout so late account-data writes still land on the right row.
    pub(crate) character_guid: Option<PlayerGuid>,
    pub(crate) socket: Option<Arc<dyn Socket>>,
    pub(crate) pending_socket: Option<Arc<dyn Socket>>,

    // -- Lifecycle --
    pub(crate) state: SessionState,
    pub(crate) kick_deadline: Option<Instant>,
    pub(crate) scheduled_logout: Option<ScheduledLogout>,
    pub(crate) queue_position: Option<u32>,
    pub(crate) player_loading: bool,
    pub(crate) logout_in_progress: bool,
    pub(crate) recently_logged_out: bool,
    pub(crate) save_on_logout: bool,
    /// Time of the tick currently running this session.
    pub(crate) now: Instant,
    shut_down: bool,

    // -- Feature state --
    pub(crate) account_data: AccountDataCache,
    pub(crate) tutorials: Tutorials,
    pub(crate) addons: Vec<AddonEntry>,
    pub(crate) time_sync: TimeSync,
    pub(crate) latency_ms: u32,

    // -- Plumbing --
    pub(crate) inbox: Arc<SessionInbox>,
    pub(crate) messager: Messager<WorldSession>,
    pub(crate) services: Services,
}

impl WorldSession {
    /// Creates a session for a freshly authenticated account. It starts
    /// in [`SessionState::Created`] with `socket` active.
    pub fn new(
        account: AuthenticatedAccount,
        socket: Arc<dyn Socket>,
        services: Services,
        now: Instant,
    ) -> Self {
        let messager = Messager::new();
        let inbox = Arc::new(SessionInbox::new(
            account.account_id,
            messager.handle(),
            Arc::clone(&services.opcodes),
            Arc::clone(&services.world),
        ));

        info!(
            account = %account.account_id,
            security = ?account.security,
            address = %socket.remote_address(),
            "session created"
        );

        Self {
            account_id: account.account_id,
            security: account.security,
            expansion: account.expansion,
            locale: account.locale,
            player: None,
            character_guid: None,
            socket: Some(socket),
            pending_socket: None,
            state: SessionState::Created,
            kick_deadline: None,
            scheduled_logout: None,
            queue_position: None,
            player_loading: false,
            logout_in_progress: false,
            recently_logged_out: false,
            save_on_logout: true,
            now,
            shut_down: false,
            account_data: AccountDataCache::default(),
            tutorials: Tutorials::default(),
            addons: Vec::new(),
            time_sync: TimeSync::new(now),
            latency_ms: 0,
            inbox,
            messager,
            services,
        }
    }

    /// Wraps the session for sharing between ticks.
    pub fn into_shared(self) -> SharedSession {
        Arc::new(Mutex::new(self))
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn account_id(&self) -> AccountId {
        self.account_id
    }

    pub fn security(&self) -> AccountSecurity {
        self.security
    }

    pub fn expansion(&self) -> u8 {
        self.expansion
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The network-facing half of the session. Hand a `Weak` of this to
    /// the socket's reader.
    pub fn inbox(&self) -> &Arc<SessionInbox> {
        &self.inbox
    }

    pub fn config(&self) -> &SessionConfig {
        &self.services.config
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Time of the tick currently running this session.
    pub fn now(&self) -> Instant {
        self.now
    }

    pub fn player(&self) -> Option<&dyn Player> {
        self.player.as_deref()
    }

    pub fn player_mut(&mut self) -> Option<&mut (dyn Player + 'static)> {
        self.player.as_deref_mut()
    }

    pub fn player_guid(&self) -> Option<PlayerGuid> {
        self.player.as_ref().map(|p| p.guid())
    }

    pub fn player_name(&self) -> &str {
        self.player.as_ref().map_or("<none>", |p| p.name())
    }

    /// The last character attached, even after it logged out.
    pub fn character_guid(&self) -> Option<PlayerGuid> {
        self.character_guid
    }

    /// The region whose tick should drain this session's map queue.
    pub fn player_region(&self) -> Option<RegionId> {
        self.player
            .as_ref()
            .filter(|p| p.is_in_world())
            .and_then(|p| p.region())
    }

    /// Attaches a character that finished loading. The caller follows up
    /// with [`set_online`](Self::set_online) once it is in the world.
    pub fn set_player(&mut self, player: Box<dyn Player>) {
        self.character_guid = Some(player.guid());
        self.player = Some(player);
    }

    pub fn is_player_loading(&self) -> bool {
        self.player_loading
    }

    pub fn set_player_loading(&mut self, loading: bool) {
        self.player_loading = loading;
    }

    pub fn is_logging_out(&self) -> bool {
        self.logout_in_progress
    }

    pub fn recently_logged_out(&self) -> bool {
        self.recently_logged_out
    }

    pub fn is_in_queue(&self) -> bool {
        self.queue_position.is_some()
    }

    pub fn queue_position(&self) -> Option<u32> {
        self.queue_position
    }

    /// Sets or clears the login queue position. Set by the session owner.
    pub fn set_in_queue(&mut self, position: Option<u32>) {
        self.queue_position = position;
    }

    pub fn kick_deadline(&self) -> Option<Instant> {
        self.kick_deadline
    }

    pub fn latency(&self) -> u32 {
        self.latency_ms
    }

    pub fn set_latency(&mut self, latency_ms: u32) {
        self.latency_ms = latency_ms;
    }

    pub fn has_socket(&self) -> bool {
        self.socket.is_some()
    }

    pub fn has_pending_socket(&self) -> bool {
        self.pending_socket.is_some()
    }

    /// The active socket exists and is open.
    pub fn is_socket_open(&self) -> bool {
        self.socket.as_ref().is_some_and(|s| !s.is_closed())
    }

    pub fn remote_address(&self) -> String {
        self.socket
            .as_ref()
            .map_or_else(|| "<offline>".to_string(), |s| s.remote_address())
    }

    pub fn session_key(&self) -> Option<SessionKey> {
        self.socket.as_ref().map(|s| s.session_key())
    }

    /// Recent inbound opcodes on the active socket, oldest first.
    pub fn opcode_history(&self) -> Vec<Opcode> {
        self.socket
            .as_ref()
            .map(|s| s.opcode_history())
            .unwrap_or_default()
    }

    // -----------------------------------------------------------------------
    // Lifecycle transitions
    // -----------------------------------------------------------------------

    /// Drops the socket and keeps the character in the world for the
    /// reconnection grace period.
    pub fn set_offline(&mut self) {
        if let Some(guid) = self.player_guid() {
            self.services.world.send_friend_offline(guid);
            self.logout_request(Some(self.now));
        }

        if let Some(socket) = self.socket.take() {
            if !socket.is_closed() {
                socket.close();
            }
            socket.finalize_session();
        }

        self.kick_deadline = self.now.checked_add(self.services.config.offline_grace());
        self.state = SessionState::Offline;
        info!(account = %self.account_id, player = %self.player_name(), "session offline");
    }

    /// Marks the character as playing. Needs an attached character and an
    /// open socket. Returns whether the session is now `Ready`.
    pub fn set_online(&mut self) -> bool {
        if self.player.is_none() || !self.is_socket_open() {
            return false;
        }
        self.state = SessionState::Ready;
        self.kick_deadline = None;
        self.scheduled_logout = None;
        self.reset_time_sync();
        self.send_time_sync();
        true
    }

    /// Returns to the character list and arms the inactivity deadline. A
    /// timeout too large to represent never fires.
    pub fn set_in_char_selection(&mut self) {
        self.state = SessionState::CharSelection;
        self.kick_deadline = self.now.checked_add(self.services.config.char_selection_timeout());
    }

    /// Offers a replacement socket from a reconnecting client. It becomes
    /// active on the next tick.
    pub fn request_new_socket(&mut self, socket: Arc<dyn Socket>) -> Result<(), SessionError> {
        if self.pending_socket.is_some() {
            return Err(SessionError::SocketPending);
        }
        debug!(account = %self.account_id, address = %socket.remote_address(), "replacement socket pending");
        self.pending_socket = Some(socket);
        self.state = SessionState::Created;
        Ok(())
    }

    /// Schedules a logout `logout_delay` after `requested_at`, or cancels
    /// the scheduled one with `None`.
    pub fn logout_request(&mut self, requested_at: Option<Instant>) {
        self.scheduled_logout = requested_at.map(|requested_at| ScheduledLogout {
            requested_at,
            immediate: false,
        });
    }

    /// A scheduled logout is due at `now`.
    pub fn should_log_out(&self, now: Instant) -> bool {
        self.scheduled_logout.is_some_and(|logout| {
            logout.immediate
                || logout
                    .requested_at
                    .checked_add(self.services.config.logout_delay())
                    .is_some_and(|due| now >= due)
        })
    }

    /// The inactivity or reconnection deadline has passed at `now`.
    pub fn should_disconnect(&self, now: Instant) -> bool {
        self.kick_deadline.is_some_and(|deadline| now >= deadline)
    }

    /// Starts closing the active socket. The session notices on its next
    /// tick.
    pub fn close_socket(&self) {
        if let Some(socket) = &self.socket {
            socket.close();
        }
    }

    /// Changes the account's expansion level and re-acknowledges the
    /// client so it picks the change up.
    pub fn set_expansion(&mut self, expansion: u8) {
        self.expansion = expansion;
        if let Some(player) = self.player.as_mut() {
            player.on_expansion_change(expansion);
        }
        self.send_auth_ok();
    }

    /// Logs out any attached character, then closes and finalizes the
    /// sockets. Safe to call more than once; also runs on drop.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        if self.player.is_some() {
            self.logout_player();
        }

        for socket in [self.socket.take(), self.pending_socket.take()].into_iter().flatten() {
            if !socket.is_closed() {
                socket.close();
            }
            socket.finalize_session();
        }
        debug!(account = %self.account_id, "session shut down");
    }

    // -----------------------------------------------------------------------
    // Outbound
    // -----------------------------------------------------------------------

    /// Sends a message on the active socket. A missing or closed socket
    /// makes this a no-op.
    pub fn send(&self, message: ServerMessage) {
        match &self.socket {
            Some(socket) if !socket.is_closed() => socket.send(message),
            _ => trace!(account = %self.account_id, opcode = %message.opcode(), "socket gone, message dropped"),
        }
    }

    pub fn send_auth_ok(&self) {
        self.send(ServerMessage::AuthResponse {
            result: AuthResult::Ok,
            queue_position: None,
        });
    }

    /// Tells the client the character has left the world.
    pub fn send_logout_complete(&self) {
        self.send(ServerMessage::LogoutComplete);
    }

    /// Tells the client its login queue position.
    pub fn send_auth_queued(&self) {
        self.send(ServerMessage::AuthResponse {
            result: AuthResult::WaitQueue,
            queue_position: Some(self.queue_position.unwrap_or(0)),
        });
    }

    /// Position 0 means "admitted" and sends auth-ok.
    pub fn send_auth_wait_queue(&self, position: u32) {
        if position == 0 {
            self.send_auth_ok();
        } else {
            self.send_auth_queued();
        }
    }

    /// Sends the configured message of the day, one line per `@`.
    pub fn send_motd(&self) {
        let lines = self
            .services
            .config
            .motd
            .split('@')
            .map(str::to_string)
            .collect();
        self.send(ServerMessage::Motd { lines });
        debug!(account = %self.account_id, "sent motd");
    }

    pub fn send_notification(&self, text: impl Into<String>) {
        self.send(ServerMessage::Notification { text: text.into() });
    }

    pub fn send_area_trigger_message(&self, text: impl Into<String>) {
        self.send(ServerMessage::AreaTriggerMessage { text: text.into() });
    }

    /// Tells the client a transfer to `map_id` was refused. `arg` is only
    /// sent for the reasons that carry one.
    pub fn send_transfer_aborted(&self, map_id: u32, reason: TransferAbortReason, arg: u8) {
        self.send(ServerMessage::TransferAborted {
            map_id,
            reason,
            arg: reason.carries_argument().then_some(arg),
        });
    }

    pub fn send_set_phase_shift(&self, phase: u32) {
        self.send(ServerMessage::SetPhaseShift { phase });
    }

    pub fn send_play_spell_visual(&self, guid: u64, kit: u32) {
        self.send(ServerMessage::PlaySpellVisual { guid, kit });
    }

    // -----------------------------------------------------------------------
    // Diagnostics
    // -----------------------------------------------------------------------

    fn opcode_name(&self, opcode: Opcode) -> &'static str {
        self.services.opcodes.get(opcode).name
    }

    /// Logs an envelope whose size does not match what its handler expects.
    pub fn size_error(&self, envelope: &Envelope, expected: usize) {
        error!(
            account = %self.account_id,
            opcode = %envelope.opcode(),
            name = self.opcode_name(envelope.opcode()),
            size = envelope.size(),
            expected,
            "envelope has wrong size, skipped"
        );
    }

    pub(crate) fn log_unexpected_opcode(&self, envelope: &Envelope, reason: &str) {
        warn!(
            account = %self.account_id,
            opcode = %envelope.opcode(),
            name = self.opcode_name(envelope.opcode()),
            reason,
            "unexpected opcode"
        );
    }

    pub(crate) fn log_unprocessed_tail(&self, envelope: &Envelope) {
        debug!(
            account = %self.account_id,
            opcode = %envelope.opcode(),
            name = self.opcode_name(envelope.opcode()),
            rpos = envelope.rpos(),
            wpos = envelope.wpos(),
            "handler left unprocessed tail data"
        );
    }
}

impl Drop for WorldSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for WorldSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorldSession")
            .field("account_id", &self.account_id)
            .field("state", &self.state)
            .field("player", &self.player_guid())
            .field("socket_open", &self.is_socket_open())
            .field("pending_socket", &self.pending_socket.is_some())
            .finish_non_exhaustive()
    }
}
