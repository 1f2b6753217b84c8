//! The logout sequence and kicks.

mod common;

use common::*;
use realmkeep_protocol::{PlayerGuid, ServerMessage};
use realmkeep_session::{
    BattlegroundQueue, DeathState, GroupMembership, SessionState, Socket, SqlValue,
};

#[test]
fn test_logout_player_runs_steps_in_order() {
    let h = Harness::new();
    let (mut session, probe) = h.ready_session();
    {
        let mut probe = probe.lock();
        probe.in_combat = true;
        probe.battleground_queues = vec![BattlegroundQueue(2)];
        probe.guild_id = Some(7);
        probe.has_social = true;
        probe.group = Some(GroupMembership { is_raid: false });
    }

    session.logout_player();

    assert_eq!(
        h.journal.entries(),
        vec![
            "player release_loot",
            "player leave_combat",
            "player notify_battleground_logout",
            "player take_battleground_queues",
            "world leave_battleground_queue 2",
            "login_db account_inactive",
            "world guild_member_logged_out 7",
            "world send_friend_offline",
            "world remove_player_social",
            "player uninvite_from_group",
            "player remove_from_group",
            "player remove_pet",
            "player save_to_db",
            "player cleanup_channels",
            "world leave_lfg",
            "world ticket_online_state false",
            "world remove_player save_first=true",
            "player dropped",
            "send LogoutComplete",
            "character_db character_offline",
        ]
    );
}

#[test]
fn test_logout_player_resets_session_to_char_selection() {
    let h = Harness::new();
    let (mut session, _probe) = h.ready_session();
    session.logout_request(Some(h.start));

    session.logout_player();

    assert!(session.player().is_none());
    assert_eq!(session.state(), SessionState::CharSelection);
    assert!(!session.is_logging_out());
    assert!(session.recently_logged_out());
    assert!(!session.should_log_out(h.at(100)));
    assert_eq!(session.character_guid(), Some(PlayerGuid(GUID)));
}

#[test]
fn test_logout_player_twice_is_harmless() {
    let h = Harness::new();
    let (mut session, _probe) = h.ready_session();

    session.logout_player();
    h.journal.clear();
    h.socket.take_sent();
    session.logout_player();

    assert!(h.journal.entries().is_empty());
    assert!(h.socket.sent().is_empty());
    assert_eq!(session.state(), SessionState::CharSelection);
}

#[test]
fn test_logout_player_resolves_far_teleport_first() {
    let h = Harness::new();
    let (mut session, probe) = h.ready_session();
    probe.lock().far_teleport_steps = 2;

    session.logout_player();

    let entries = h.journal.entries();
    assert_eq!(entries[0], "player complete_far_teleport");
    assert_eq!(entries[1], "player complete_far_teleport");
    assert_eq!(entries[2], "player release_loot");
}

#[test]
fn test_logout_player_delayed_death_kills_then_repops() {
    let h = Harness::new();
    let (mut session, probe) = h.ready_session();
    probe.lock().death_state = DeathState::DelayedDeath;

    session.logout_player();

    let kill = h.journal.position("player kill").unwrap();
    let repop = h.journal.position("player repop_at_graveyard").unwrap();
    assert!(kill < repop);
}

#[test]
fn test_logout_player_awaiting_respawn_repops() {
    let h = Harness::new();
    let (mut session, probe) = h.ready_session();
    probe.lock().death_state = DeathState::AwaitingRespawn;

    session.logout_player();

    assert!(h.journal.contains("player repop_at_graveyard"));
    assert!(!h.journal.contains("player kill"));
}

#[test]
fn test_logout_player_invalid_instance_teleports_home() {
    let h = Harness::new();
    let (mut session, probe) = h.ready_session();
    probe.lock().valid_instance = false;

    session.logout_player();

    let home = h.journal.position("player teleport_to_homebind").unwrap();
    let resolved = h.journal.position("player complete_far_teleport").unwrap();
    let queues = h.journal.position("player take_battleground_queues").unwrap();
    assert!(home < resolved && resolved < queues);
}

#[test]
fn test_logout_player_game_master_skips_homebind() {
    let h = Harness::new();
    let (mut session, probe) = h.ready_session();
    {
        let mut probe = probe.lock();
        probe.valid_instance = false;
        probe.game_master = true;
    }

    session.logout_player();

    assert!(!h.journal.contains("player teleport_to_homebind"));
}

#[test]
fn test_logout_player_raid_group_keeps_slot() {
    let h = Harness::new();
    let (mut session, probe) = h.ready_session();
    probe.lock().group = Some(GroupMembership { is_raid: true });

    session.logout_player();

    assert!(!h.journal.contains("player remove_from_group"));
    assert!(h.journal.contains("player update_group_online_status false"));
}

#[test]
fn test_logout_player_disconnected_keeps_group_slot() {
    let h = Harness::new();
    let (mut session, probe) = h.ready_session();
    probe.lock().group = Some(GroupMembership { is_raid: false });
    h.socket.close();

    session.logout_player();

    assert!(!h.journal.contains("player remove_from_group"));
    assert!(h.journal.contains("player update_group_online_status false"));
}

#[test]
fn test_logout_player_outside_region_deletes_from_world() {
    let h = Harness::new();
    let (mut session, _probe) = h.ready_session();
    h.world.unplace(PlayerGuid(GUID));

    session.logout_player();

    let cleanup = h.journal.position("player cleanup_before_delete").unwrap();
    let delete = h.journal.position("world delete_from_world").unwrap();
    assert!(cleanup < delete);
    assert!(!h.journal.contains("world remove_player save_first=true"));
}

#[test]
fn test_logout_player_save_failure_still_completes() {
    let h = Harness::new();
    let (mut session, probe) = h.ready_session();
    probe.lock().fail_save = true;
    h.login_db.fail("account_inactive");

    session.logout_player();

    assert!(session.player().is_none());
    assert!(h.socket.sent().contains(&ServerMessage::LogoutComplete));
    assert_eq!(h.character_db.executed_names(), vec!["character_offline"]);
}

#[test]
fn test_logout_player_marks_captured_guid_offline() {
    let h = Harness::new();
    let (mut session, _probe) = h.ready_session();

    session.logout_player();

    let executed = h.character_db.executed();
    assert_eq!(executed.len(), 1);
    assert_eq!(executed[0].params, vec![SqlValue::U32(GUID)]);
}

// =========================================================================
// Kicks
// =========================================================================

#[test]
fn test_kick_player_in_place_logs_out_now() {
    let h = Harness::new();
    let (mut session, _probe) = h.ready_session();

    session.kick_player(true, true);

    assert!(session.player().is_none());
    assert!(h.journal.contains("player save_to_db"));
}

#[test]
fn test_kick_player_deferred_logs_out_next_tick() {
    let h = Harness::new();
    let (mut session, _probe) = h.ready_session();

    session.kick_player(true, false);
    assert!(session.player().is_some());

    session.update(h.at(1));
    assert!(session.player().is_none());
}

#[test]
fn test_kick_player_without_save_skips_save_once() {
    let h = Harness::new();
    let (mut session, _probe) = h.ready_session();

    session.kick_player(false, true);
    assert!(!h.journal.contains("player save_to_db"));

    let (player, _probe) = MockPlayer::new(GUID + 1, &h.journal);
    session.set_player(player);
    session.logout_player();
    assert!(h.journal.contains("player save_to_db"));
}
