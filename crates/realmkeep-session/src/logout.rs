//! The logout sequence.
//!
//! Logout is the only path that detaches a character from its session.
//! The steps run strictly in order and are never retried. A failed
//! persistence step is logged and the sequence carries on.
//! With no character attached the sequence only resets the session's
//! logout bookkeeping, so running it twice is harmless.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::session::ScheduledLogout;
use crate::{DeathState, Player, Statement, WorldSession};

/// Upper bound on server-side world-port acknowledgements processed while
/// resolving a far teleport. A player still mid-teleport after this many
/// is torn down anyway.
const MAX_TELEPORT_RESOLUTION_STEPS: usize = 8;

fn resolve_far_teleport(player: &mut dyn Player) {
    for _ in 0..MAX_TELEPORT_RESOLUTION_STEPS {
        if !player.is_being_teleported_far() {
            return;
        }
        player.complete_far_teleport();
    }
    if player.is_being_teleported_far() {
        warn!(player = %player.guid(), "far teleport did not resolve before logout");
    }
}

impl WorldSession {
    /// Logs the attached character out of the world.
    pub fn logout_player(&mut self) {
        // Never tear down mid-relocation.
        if let Some(player) = self.player.as_deref_mut() {
            resolve_far_teleport(player);
        }

        self.logout_in_progress = true;

        if let Some(mut player) = self.player.take() {
            let guid = player.guid();
            let name = player.name().to_string();
            let world = Arc::clone(&self.services.world);

            info!(
                account = %self.account_id,
                address = %self.remote_address(),
                player = %name,
                %guid,
                "logout character"
            );

            player.release_loot();

            match player.death_state() {
                DeathState::AwaitingRespawn => player.repop_at_graveyard(),
                DeathState::DelayedDeath => {
                    player.kill();
                    player.repop_at_graveyard();
                }
                DeathState::Alive if player.is_in_combat() => player.leave_combat(),
                DeathState::Alive => {}
            }

            player.notify_battleground_logout();

            // Invalid instance: back to the home location first.
            if !player.has_valid_instance() && !player.is_game_master() {
                player.teleport_to_homebind();
                resolve_far_teleport(player.as_mut());
            }

            for queue in player.take_battleground_queues() {
                world.leave_battleground_queue(guid, queue);
            }

            if let Err(err) = self
                .services
                .login_db
                .execute(Statement::account_inactive(self.account_id))
            {
                error!(account = %self.account_id, %err, "failed to clear realm activity");
            }

            if let Some(guild_id) = player.guild_id() {
                world.guild_member_logged_out(guild_id, guid, &name);
            }
            if player.has_social() {
                world.send_friend_offline(guid);
                world.remove_player_social(guid);
            }

            // Normal logouts leave small groups; disconnects and raids keep the slot.
            player.uninvite_from_group();
            if player.group().is_some_and(|g| !g.is_raid) && self.is_socket_open() {
                player.remove_from_group();
            }
            if player.group().is_some() {
                player.update_group_online_status(false);
            }

            player.remove_pet();

            if self.save_on_logout {
                if let Err(err) = player.save_to_db() {
                    error!(account = %self.account_id, %guid, %err, "failed to save character");
                }
            }

            player.cleanup_channels();

            world.leave_lfg(guid);
            world.ticket_online_state(guid, false);

            if world.current_region_of(guid).is_some() {
                world.remove_player(guid, true);
            } else {
                player.cleanup_before_delete();
                world.delete_from_world(guid);
            }

            drop(player);

            self.send_logout_complete();
            debug!(account = %self.account_id, "sent logout complete");

            // Keyed by the guid captured above, not the dropped player.
            if let Err(err) = self
                .services
                .character_db
                .execute(Statement::character_offline(guid))
            {
                error!(account = %self.account_id, %guid, %err, "failed to mark character offline");
            }
        }

        self.logout_in_progress = false;
        self.recently_logged_out = true;
        self.save_on_logout = true;
        self.set_in_char_selection();
        self.logout_request(None);
    }

    /// Kicks the attached character.
    ///
    /// In place, the logout runs now. Otherwise a logout is scheduled that
    /// is already due, and the next tick runs it.
    pub fn kick_player(&mut self, save: bool, in_place: bool) {
        self.save_on_logout = save;
        if in_place {
            self.logout_player();
            return;
        }
        self.scheduled_logout = Some(ScheduledLogout {
            requested_at: self.now,
            immediate: true,
        });
    }
}
