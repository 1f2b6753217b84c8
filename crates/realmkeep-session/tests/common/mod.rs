//! Recording collaborators shared by the session integration tests.
//!
//! Every mock writes into one [`Journal`], so a test can assert on the
//! order of calls across the player, the world, and both databases.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use realmkeep_protocol::{
    AccountId, AccountSecurity, AdmissionStatus, Envelope, Locale, Opcode, PayloadError,
    PlayerGuid, ProcessingMode, RegionId, ServerMessage, SessionKey,
};
use realmkeep_session::{
    AuthenticatedAccount, BattlegroundQueue, Database, DeathState, GroupMembership, OpcodeTable,
    PersistenceError, Player, Row, Services, SessionConfig, Socket, Statement, World,
    WorldSession,
};

// =========================================================================
// Journal
// =========================================================================

#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.0.lock().iter().any(|e| e == entry)
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.0.lock().iter().position(|e| e == entry)
    }
}

// =========================================================================
// Socket
// =========================================================================

pub struct RecordingSocket {
    sent: Mutex<Vec<ServerMessage>>,
    closed: AtomicBool,
    finalized: AtomicBool,
    address: String,
    journal: Journal,
}

impl RecordingSocket {
    pub fn new(address: &str, journal: &Journal) -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            finalized: AtomicBool::new(false),
            address: address.to_string(),
            journal: journal.clone(),
        })
    }

    pub fn sent(&self) -> Vec<ServerMessage> {
        self.sent.lock().clone()
    }

    pub fn take_sent(&self) -> Vec<ServerMessage> {
        std::mem::take(&mut *self.sent.lock())
    }

    /// Texts of the notifications sent, in order. Test handlers report
    /// themselves this way.
    pub fn notifications(&self) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter_map(|m| match m {
                ServerMessage::Notification { text } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized.load(Ordering::SeqCst)
    }
}

impl Socket for RecordingSocket {
    fn send(&self, message: ServerMessage) {
        self.journal.push(format!("send {message:?}"));
        self.sent.lock().push(message);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn finalize_session(&self) {
        self.finalized.store(true, Ordering::SeqCst);
    }

    fn session_key(&self) -> SessionKey {
        SessionKey(vec![0xAB, 0xCD])
    }

    fn remote_address(&self) -> String {
        self.address.clone()
    }

    fn opcode_history(&self) -> Vec<Opcode> {
        Vec::new()
    }
}

// =========================================================================
// Database
// =========================================================================

pub struct RecordingDatabase {
    label: &'static str,
    journal: Journal,
    executed: Mutex<Vec<Statement>>,
    responses: Mutex<HashMap<&'static str, Vec<Row>>>,
    failing: Mutex<Vec<&'static str>>,
}

impl RecordingDatabase {
    pub fn new(label: &'static str, journal: &Journal) -> Arc<Self> {
        Arc::new(Self {
            label,
            journal: journal.clone(),
            executed: Mutex::new(Vec::new()),
            responses: Mutex::new(HashMap::new()),
            failing: Mutex::new(Vec::new()),
        })
    }

    pub fn executed(&self) -> Vec<Statement> {
        self.executed.lock().clone()
    }

    pub fn executed_names(&self) -> Vec<&'static str> {
        self.executed.lock().iter().map(|s| s.name).collect()
    }

    /// Rows returned by queries named `name`.
    pub fn respond(&self, name: &'static str, rows: Vec<Row>) {
        self.responses.lock().insert(name, rows);
    }

    /// Statements named `name` fail from now on.
    pub fn fail(&self, name: &'static str) {
        self.failing.lock().push(name);
    }

    fn check(&self, name: &'static str) -> Result<(), PersistenceError> {
        if self.failing.lock().contains(&name) {
            return Err(PersistenceError::Unavailable(format!("{name} rigged to fail")));
        }
        Ok(())
    }
}

impl Database for RecordingDatabase {
    fn execute(&self, statement: Statement) -> Result<(), PersistenceError> {
        self.journal.push(format!("{} {}", self.label, statement.name));
        self.check(statement.name)?;
        self.executed.lock().push(statement);
        Ok(())
    }

    fn query(&self, statement: Statement) -> Result<Option<Vec<Row>>, PersistenceError> {
        self.check(statement.name)?;
        Ok(self.responses.lock().get(statement.name).cloned())
    }

    fn begin_transaction(&self) -> Result<(), PersistenceError> {
        self.journal.push(format!("{} begin", self.label));
        Ok(())
    }

    fn commit_transaction(&self) -> Result<(), PersistenceError> {
        self.journal.push(format!("{} commit", self.label));
        Ok(())
    }

    fn rollback_transaction(&self) -> Result<(), PersistenceError> {
        self.journal.push(format!("{} rollback", self.label));
        Ok(())
    }
}

// =========================================================================
// World
// =========================================================================

pub struct MockWorld {
    journal: Journal,
    regions: Mutex<HashMap<PlayerGuid, RegionId>>,
    opcodes_counted: AtomicUsize,
}

impl MockWorld {
    pub fn new(journal: &Journal) -> Arc<Self> {
        Arc::new(Self {
            journal: journal.clone(),
            regions: Mutex::new(HashMap::new()),
            opcodes_counted: AtomicUsize::new(0),
        })
    }

    pub fn place(&self, guid: PlayerGuid, region: RegionId) {
        self.regions.lock().insert(guid, region);
    }

    pub fn unplace(&self, guid: PlayerGuid) {
        self.regions.lock().remove(&guid);
    }

    pub fn opcodes_counted(&self) -> usize {
        self.opcodes_counted.load(Ordering::SeqCst)
    }
}

impl World for MockWorld {
    fn remove_player(&self, guid: PlayerGuid, save_first: bool) {
        self.regions.lock().remove(&guid);
        self.journal.push(format!("world remove_player save_first={save_first}"));
    }

    fn delete_from_world(&self, _guid: PlayerGuid) {
        self.journal.push("world delete_from_world");
    }

    fn current_region_of(&self, guid: PlayerGuid) -> Option<RegionId> {
        self.regions.lock().get(&guid).copied()
    }

    fn send_friend_offline(&self, _guid: PlayerGuid) {
        self.journal.push("world send_friend_offline");
    }

    fn remove_player_social(&self, _guid: PlayerGuid) {
        self.journal.push("world remove_player_social");
    }

    fn guild_member_logged_out(&self, guild_id: u32, _guid: PlayerGuid, _name: &str) {
        self.journal.push(format!("world guild_member_logged_out {guild_id}"));
    }

    fn leave_battleground_queue(&self, _guid: PlayerGuid, queue: BattlegroundQueue) {
        self.journal.push(format!("world leave_battleground_queue {}", queue.0));
    }

    fn leave_lfg(&self, _guid: PlayerGuid) {
        self.journal.push("world leave_lfg");
    }

    fn ticket_online_state(&self, _guid: PlayerGuid, online: bool) {
        self.journal.push(format!("world ticket_online_state {online}"));
    }

    fn count_opcode(&self, _opcode: Opcode) {
        self.opcodes_counted.fetch_add(1, Ordering::SeqCst);
    }
}

// =========================================================================
// Player
// =========================================================================

/// Knobs and observations for a [`MockPlayer`] after it has been moved
/// into a session.
pub struct PlayerProbe {
    pub in_world: bool,
    pub region: Option<RegionId>,
    pub far_teleport_steps: usize,
    pub delayed_teleport: bool,
    pub can_delay_teleport: bool,
    pub death_state: DeathState,
    pub in_combat: bool,
    pub valid_instance: bool,
    pub game_master: bool,
    pub battleground_queues: Vec<BattlegroundQueue>,
    pub guild_id: Option<u32>,
    pub group: Option<GroupMembership>,
    pub has_social: bool,
    pub fail_save: bool,
    pub expansion: Option<u8>,
}

impl Default for PlayerProbe {
    fn default() -> Self {
        Self {
            in_world: true,
            region: Some(RegionId(1)),
            far_teleport_steps: 0,
            delayed_teleport: false,
            can_delay_teleport: false,
            death_state: DeathState::Alive,
            in_combat: false,
            valid_instance: true,
            game_master: false,
            battleground_queues: Vec::new(),
            guild_id: None,
            group: None,
            has_social: false,
            fail_save: false,
            expansion: None,
        }
    }
}

pub struct MockPlayer {
    guid: PlayerGuid,
    name: String,
    probe: Arc<Mutex<PlayerProbe>>,
    journal: Journal,
}

impl MockPlayer {
    pub fn new(guid: u32, journal: &Journal) -> (Box<Self>, Arc<Mutex<PlayerProbe>>) {
        let probe = Arc::new(Mutex::new(PlayerProbe::default()));
        let player = Box::new(Self {
            guid: PlayerGuid(guid),
            name: format!("Hero{guid}"),
            probe: Arc::clone(&probe),
            journal: journal.clone(),
        });
        (player, probe)
    }

    fn log(&self, event: &str) {
        self.journal.push(format!("player {event}"));
    }
}

impl Drop for MockPlayer {
    fn drop(&mut self) {
        self.log("dropped");
    }
}

impl Player for MockPlayer {
    fn guid(&self) -> PlayerGuid {
        self.guid
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_in_world(&self) -> bool {
        self.probe.lock().in_world
    }

    fn region(&self) -> Option<RegionId> {
        self.probe.lock().region
    }

    fn is_being_teleported_far(&self) -> bool {
        self.probe.lock().far_teleport_steps > 0
    }

    fn complete_far_teleport(&mut self) {
        let mut probe = self.probe.lock();
        probe.far_teleport_steps = probe.far_teleport_steps.saturating_sub(1);
        drop(probe);
        self.log("complete_far_teleport");
    }

    fn set_can_delay_teleport(&mut self, delay: bool) {
        self.probe.lock().can_delay_teleport = delay;
        self.log(if delay { "delay_teleport on" } else { "delay_teleport off" });
    }

    fn has_delayed_teleport(&self) -> bool {
        self.probe.lock().delayed_teleport
    }

    fn execute_delayed_teleport(&mut self) {
        self.probe.lock().delayed_teleport = false;
        self.log("execute_delayed_teleport");
    }

    fn teleport_to_homebind(&mut self) {
        self.probe.lock().far_teleport_steps = 1;
        self.log("teleport_to_homebind");
    }

    fn release_loot(&mut self) {
        self.log("release_loot");
    }

    fn death_state(&self) -> DeathState {
        self.probe.lock().death_state
    }

    fn repop_at_graveyard(&mut self) {
        self.log("repop_at_graveyard");
    }

    fn kill(&mut self) {
        self.log("kill");
    }

    fn is_in_combat(&self) -> bool {
        self.probe.lock().in_combat
    }

    fn leave_combat(&mut self) {
        self.probe.lock().in_combat = false;
        self.log("leave_combat");
    }

    fn notify_battleground_logout(&mut self) {
        self.log("notify_battleground_logout");
    }

    fn has_valid_instance(&self) -> bool {
        self.probe.lock().valid_instance
    }

    fn is_game_master(&self) -> bool {
        self.probe.lock().game_master
    }

    fn take_battleground_queues(&mut self) -> Vec<BattlegroundQueue> {
        self.log("take_battleground_queues");
        std::mem::take(&mut self.probe.lock().battleground_queues)
    }

    fn guild_id(&self) -> Option<u32> {
        self.probe.lock().guild_id
    }

    fn uninvite_from_group(&mut self) {
        self.log("uninvite_from_group");
    }

    fn group(&self) -> Option<GroupMembership> {
        self.probe.lock().group
    }

    fn remove_from_group(&mut self) {
        self.probe.lock().group = None;
        self.log("remove_from_group");
    }

    fn update_group_online_status(&mut self, online: bool) {
        self.log(&format!("update_group_online_status {online}"));
    }

    fn has_social(&self) -> bool {
        self.probe.lock().has_social
    }

    fn remove_pet(&mut self) {
        self.log("remove_pet");
    }

    fn save_to_db(&mut self) -> Result<(), PersistenceError> {
        self.log("save_to_db");
        if self.probe.lock().fail_save {
            return Err(PersistenceError::Transaction("rigged to fail".into()));
        }
        Ok(())
    }

    fn cleanup_channels(&mut self) {
        self.log("cleanup_channels");
    }

    fn cleanup_before_delete(&mut self) {
        self.log("cleanup_before_delete");
    }

    fn on_expansion_change(&mut self, expansion: u8) {
        self.probe.lock().expansion = Some(expansion);
    }
}

// =========================================================================
// Test opcodes
// =========================================================================

pub const OP_AUTHED: Opcode = Opcode(0x010);
pub const OP_AUTHED_2: Opcode = Opcode(0x011);
pub const OP_AUTHED_3: Opcode = Opcode(0x012);
pub const OP_LOGGED_IN: Opcode = Opcode(0x013);
pub const OP_RECENT: Opcode = Opcode(0x014);
pub const OP_TRANSFER: Opcode = Opcode(0x015);
pub const OP_NEVER: Opcode = Opcode(0x016);
pub const OP_UNHANDLED: Opcode = Opcode(0x017);
pub const OP_FAULTY: Opcode = Opcode(0x018);
pub const OP_FAULTY_AUTHED: Opcode = Opcode(0x019);
pub const OP_MAP: Opcode = Opcode(0x01A);

/// Reports itself to the client so tests can see it ran.
fn record(session: &mut WorldSession, envelope: &mut Envelope) -> Result<(), PayloadError> {
    session.send_notification(ran(envelope.opcode()));
    Ok(())
}

/// Needs a `u32` the tests never send.
fn faulty(_session: &mut WorldSession, envelope: &mut Envelope) -> Result<(), PayloadError> {
    envelope.read_u32()?;
    Ok(())
}

/// What [`record`] reports for `opcode`.
pub fn ran(opcode: Opcode) -> String {
    format!("ran {}", opcode.0)
}

pub fn test_opcode_table() -> OpcodeTable {
    use AdmissionStatus as S;
    use ProcessingMode as P;

    let mut table = OpcodeTable::with_core_handlers().unwrap();
    let entries: [(Opcode, &'static str, S, P, realmkeep_session::SessionHandler); 11] = [
        (OP_AUTHED, "OP_AUTHED", S::Authed, P::ThreadUnsafe, record),
        (OP_AUTHED_2, "OP_AUTHED_2", S::Authed, P::ThreadUnsafe, record),
        (OP_AUTHED_3, "OP_AUTHED_3", S::Authed, P::InPlace, record),
        (OP_LOGGED_IN, "OP_LOGGED_IN", S::LoggedIn, P::ThreadUnsafe, record),
        (OP_RECENT, "OP_RECENT", S::LoggedInOrRecentlyLoggedOut, P::ThreadUnsafe, record),
        (OP_TRANSFER, "OP_TRANSFER", S::Transfer, P::ThreadUnsafe, record),
        (OP_NEVER, "OP_NEVER", S::Never, P::ThreadUnsafe, record),
        (OP_UNHANDLED, "OP_UNHANDLED", S::Unhandled, P::ThreadUnsafe, record),
        (OP_FAULTY, "OP_FAULTY", S::LoggedIn, P::ThreadUnsafe, faulty),
        (OP_FAULTY_AUTHED, "OP_FAULTY_AUTHED", S::Authed, P::ThreadUnsafe, faulty),
        (OP_MAP, "OP_MAP", S::LoggedIn, P::MapThread, record),
    ];
    for (opcode, name, status, processing, handler) in entries {
        table.register(opcode, name, status, processing, handler).unwrap();
    }
    table
        .register(
            Opcode::MSG_MOVE_HEARTBEAT,
            "MSG_MOVE_HEARTBEAT",
            S::LoggedIn,
            P::MapThread,
            record,
        )
        .unwrap();
    table
        .register(
            Opcode::MSG_MOVE_SET_FACING,
            "MSG_MOVE_SET_FACING",
            S::LoggedIn,
            P::MapThread,
            record,
        )
        .unwrap();
    table
}

// =========================================================================
// Harness
// =========================================================================

pub const ACCOUNT: AccountId = AccountId(42);
pub const GUID: u32 = 7;

pub fn account() -> AuthenticatedAccount {
    AuthenticatedAccount {
        account_id: ACCOUNT,
        security: AccountSecurity::Player,
        expansion: 2,
        locale: Locale::EnUs,
        session_key: SessionKey(vec![0xAB, 0xCD]),
    }
}

pub struct Harness {
    pub journal: Journal,
    pub world: Arc<MockWorld>,
    pub login_db: Arc<RecordingDatabase>,
    pub character_db: Arc<RecordingDatabase>,
    pub socket: Arc<RecordingSocket>,
    pub services: Services,
    pub start: Instant,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(SessionConfig::default())
    }

    pub fn with_config(config: SessionConfig) -> Self {
        let journal = Journal::default();
        let world = MockWorld::new(&journal);
        let login_db = RecordingDatabase::new("login_db", &journal);
        let character_db = RecordingDatabase::new("character_db", &journal);
        let socket = RecordingSocket::new("10.0.0.1:5000", &journal);
        let services = Services {
            world: world.clone(),
            login_db: login_db.clone(),
            character_db: character_db.clone(),
            opcodes: Arc::new(test_opcode_table()),
            config: Arc::new(config),
        };
        Self {
            journal,
            world,
            login_db,
            character_db,
            socket,
            services,
            start: Instant::now(),
        }
    }

    /// `secs` after the harness was created.
    pub fn at(&self, secs: u64) -> Instant {
        self.start + Duration::from_secs(secs)
    }

    pub fn at_millis(&self, millis: u64) -> Instant {
        self.start + Duration::from_millis(millis)
    }

    /// A session in `Created` on the harness socket.
    pub fn session(&self) -> WorldSession {
        WorldSession::new(account(), self.socket.clone(), self.services.clone(), self.start)
    }

    /// A session at character selection, with the acknowledgements
    /// already cleared from the socket.
    pub fn char_selection_session(&self) -> WorldSession {
        let mut session = self.session();
        session.update(self.start);
        self.socket.take_sent();
        self.journal.clear();
        session
    }

    /// A `Ready` session with an in-world character placed in region 1.
    pub fn ready_session(&self) -> (WorldSession, Arc<Mutex<PlayerProbe>>) {
        let mut session = self.char_selection_session();
        let (player, probe) = MockPlayer::new(GUID, &self.journal);
        self.world.place(PlayerGuid(GUID), RegionId(1));
        session.set_player(player);
        assert!(session.set_online());
        self.socket.take_sent();
        self.journal.clear();
        (session, probe)
    }
}

pub fn envelope(opcode: Opcode) -> Envelope {
    Envelope::new(opcode)
}
