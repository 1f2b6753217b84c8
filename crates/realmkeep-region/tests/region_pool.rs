//! Integration tests for the region actor pool.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use realmkeep_protocol::{
    AccountId, AccountSecurity, AdmissionStatus, Envelope, Locale, Opcode, PlayerGuid,
    ProcessingMode, RegionId, ServerMessage, SessionKey,
};
use realmkeep_region::{RegionConfig, RegionError, RegionManager};
use realmkeep_session::{
    AuthenticatedAccount, BattlegroundQueue, Database, OpcodeTable, PersistenceError, Row,
    Services, SessionConfig, SharedSession, Socket, Statement, World, WorldSession, handlers,
};
use realmkeep_tick::TickConfig;

// =========================================================================
// Quiet collaborators
// =========================================================================

#[derive(Default)]
struct OpenSocket {
    closed: AtomicBool,
}

impl Socket for OpenSocket {
    fn send(&self, _message: ServerMessage) {}
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
    fn finalize_session(&self) {}
    fn session_key(&self) -> SessionKey {
        SessionKey::default()
    }
    fn remote_address(&self) -> String {
        "127.0.0.1:1".into()
    }
    fn opcode_history(&self) -> Vec<Opcode> {
        Vec::new()
    }
}

struct NullDatabase;

impl Database for NullDatabase {
    fn execute(&self, _statement: Statement) -> Result<(), PersistenceError> {
        Ok(())
    }
    fn query(&self, _statement: Statement) -> Result<Option<Vec<Row>>, PersistenceError> {
        Ok(None)
    }
    fn begin_transaction(&self) -> Result<(), PersistenceError> {
        Ok(())
    }
    fn commit_transaction(&self) -> Result<(), PersistenceError> {
        Ok(())
    }
    fn rollback_transaction(&self) -> Result<(), PersistenceError> {
        Ok(())
    }
}

struct NullWorld;

impl World for NullWorld {
    fn remove_player(&self, _guid: PlayerGuid, _save_first: bool) {}
    fn delete_from_world(&self, _guid: PlayerGuid) {}
    fn current_region_of(&self, _guid: PlayerGuid) -> Option<RegionId> {
        None
    }
    fn send_friend_offline(&self, _guid: PlayerGuid) {}
    fn remove_player_social(&self, _guid: PlayerGuid) {}
    fn guild_member_logged_out(&self, _guild_id: u32, _guid: PlayerGuid, _name: &str) {}
    fn leave_battleground_queue(&self, _guid: PlayerGuid, _queue: BattlegroundQueue) {}
    fn leave_lfg(&self, _guid: PlayerGuid) {}
    fn ticket_online_state(&self, _guid: PlayerGuid, _online: bool) {}
}

fn services() -> Services {
    let mut opcodes = OpcodeTable::with_core_handlers().unwrap();
    opcodes
        .register(
            Opcode::MSG_MOVE_HEARTBEAT,
            "MSG_MOVE_HEARTBEAT",
            AdmissionStatus::LoggedIn,
            ProcessingMode::MapThread,
            handlers::handle_null,
        )
        .unwrap();
    Services {
        world: Arc::new(NullWorld),
        login_db: Arc::new(NullDatabase),
        character_db: Arc::new(NullDatabase),
        opcodes: Arc::new(opcodes),
        config: Arc::new(SessionConfig::default()),
    }
}

fn shared_session(id: u32) -> SharedSession {
    let account = AuthenticatedAccount {
        account_id: AccountId(id),
        security: AccountSecurity::Player,
        expansion: 2,
        locale: Locale::EnUs,
        session_key: SessionKey::default(),
    };
    WorldSession::new(account, Arc::new(OpenSocket::default()), services(), Instant::now())
        .into_shared()
}

fn queue_heartbeat(session: &SharedSession) {
    let inbox = session.lock().inbox().clone();
    inbox.enqueue(Envelope::new(Opcode::MSG_MOVE_HEARTBEAT));
}

fn map_len(session: &SharedSession) -> usize {
    session.lock().inbox().map_len()
}

fn pool(actor_count: usize) -> RegionManager {
    RegionManager::start(RegionConfig {
        actor_count,
        tick: TickConfig {
            initial_jitter_us: 0,
            ..TickConfig::with_rate(10)
        },
        channel_size: 8,
    })
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_place_session_drains_map_queue_on_region_tick() {
    let mut regions = pool(2);
    let session = shared_session(1);

    regions
        .place(AccountId(1), Some(RegionId(3)), session.clone())
        .await
        .unwrap();
    queue_heartbeat(&session);
    assert_eq!(map_len(&session), 1);

    tokio::time::sleep(Duration::from_millis(250)).await;

    assert_eq!(map_len(&session), 0);
    regions.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_place_none_stops_draining() {
    let mut regions = pool(1);
    let session = shared_session(1);

    regions
        .place(AccountId(1), Some(RegionId(0)), session.clone())
        .await
        .unwrap();
    regions.place(AccountId(1), None, session.clone()).await.unwrap();
    queue_heartbeat(&session);

    tokio::time::sleep(Duration::from_millis(250)).await;

    assert_eq!(map_len(&session), 1);
    assert_eq!(regions.placement(AccountId(1)), None);
    regions.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_place_moves_session_between_actors() {
    let mut regions = pool(2);
    let session = shared_session(1);

    regions
        .place(AccountId(1), Some(RegionId(0)), session.clone())
        .await
        .unwrap();
    regions
        .place(AccountId(1), Some(RegionId(1)), session.clone())
        .await
        .unwrap();

    let infos = regions.infos().await;
    assert_eq!(infos.len(), 2);
    assert_eq!(infos[0].session_count, 0);
    assert_eq!(infos[1].session_count, 1);
    assert_eq!(regions.placement(AccountId(1)), Some(RegionId(1)));
    regions.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_place_same_region_is_noop() {
    let mut regions = pool(1);
    let session = shared_session(1);

    for _ in 0..3 {
        regions
            .place(AccountId(1), Some(RegionId(5)), session.clone())
            .await
            .unwrap();
    }

    assert_eq!(regions.len(), 1);
    assert_eq!(regions.infos().await[0].session_count, 1);
    regions.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_actor_for_maps_region_modulo_pool() {
    let regions = pool(3);

    assert_eq!(regions.actor_for(RegionId(0)).actor(), 0);
    assert_eq!(regions.actor_for(RegionId(4)).actor(), 1);
    assert_eq!(regions.actor_for(RegionId(530)).actor(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_join_twice_on_handle_fails() {
    let regions = pool(1);
    let session = shared_session(1);
    let handle = regions.actor_for(RegionId(0)).clone();

    handle
        .join(AccountId(1), RegionId(0), session.clone())
        .await
        .unwrap();
    let err = handle
        .join(AccountId(1), RegionId(0), session)
        .await
        .unwrap_err();

    assert!(matches!(err, RegionError::AlreadyHosted(AccountId(1), RegionId(0))));
}

#[tokio::test(start_paused = true)]
async fn test_leave_wrong_region_fails() {
    let regions = pool(1);
    let handle = regions.actor_for(RegionId(0)).clone();
    handle
        .join(AccountId(1), RegionId(0), shared_session(1))
        .await
        .unwrap();

    let err = handle.leave(AccountId(1), RegionId(9)).await.unwrap_err();

    assert!(matches!(err, RegionError::NotHosted(..)));
}

#[tokio::test(start_paused = true)]
async fn test_remove_unplaced_session_is_ok() {
    let mut regions = pool(1);

    regions.remove(AccountId(77)).await.unwrap();

    assert!(regions.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_infos_report_ticks() {
    let regions = pool(1);

    tokio::time::sleep(Duration::from_millis(350)).await;

    let infos = regions.infos().await;
    assert!(infos[0].ticks >= 3);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_makes_handles_unavailable() {
    let mut regions = pool(1);
    let handle = regions.actor_for(RegionId(0)).clone();

    regions.shutdown().await;
    tokio::task::yield_now().await;

    let err = handle.get_info().await.unwrap_err();
    assert!(matches!(err, RegionError::Unavailable(0)));
}
