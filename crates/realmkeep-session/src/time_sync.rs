//! Client clock synchronization.
//!
//! The server periodically sends a numbered time sync request and the
//! client answers with its own tick count. Half the round trip is taken
//! as the one-way lag, which gives one estimate of the offset between
//! the two clocks. The last few estimates are averaged, ignoring
//! outliers, and the result is used to translate client movement
//! timestamps into server time.

use std::collections::{HashMap, VecDeque};
use std::time::Instant;

use realmkeep_protocol::ServerMessage;
use tracing::{debug, trace, warn};

use crate::WorldSession;

/// Number of offset estimates averaged.
const CLOCK_DELTA_WINDOW: usize = 6;

#[derive(Debug)]
pub(crate) struct TimeSync {
    /// Server time zero for this session.
    epoch: Instant,
    next_counter: u32,
    /// Server time (ms) at which each unanswered request was sent.
    pending: HashMap<u32, u32>,
    deltas: VecDeque<i64>,
    clock_delta: i64,
    next_due: Option<Instant>,
}

impl TimeSync {
    pub(crate) fn new(now: Instant) -> Self {
        Self {
            epoch: now,
            next_counter: 0,
            pending: HashMap::new(),
            deltas: VecDeque::with_capacity(CLOCK_DELTA_WINDOW),
            clock_delta: 0,
            next_due: None,
        }
    }

    fn server_time_ms(&self, now: Instant) -> u32 {
        now.saturating_duration_since(self.epoch).as_millis() as u32
    }

    fn push_delta(&mut self, delta: i64) {
        if self.deltas.len() == CLOCK_DELTA_WINDOW {
            self.deltas.pop_front();
        }
        self.deltas.push_back(delta);
    }

    /// Mean of the estimates within one standard deviation of the mean
    /// of all of them.
    fn filtered_delta(&self) -> i64 {
        let count = self.deltas.len() as f64;
        if count == 0.0 {
            return 0;
        }
        let mean = self.deltas.iter().map(|&d| d as f64).sum::<f64>() / count;
        let variance = self
            .deltas
            .iter()
            .map(|&d| (d as f64 - mean).powi(2))
            .sum::<f64>()
            / count;
        let deviation = variance.sqrt();

        let kept: Vec<f64> = self
            .deltas
            .iter()
            .map(|&d| d as f64)
            .filter(|d| (d - mean).abs() <= deviation)
            .collect();
        if kept.is_empty() {
            return mean.round() as i64;
        }
        (kept.iter().sum::<f64>() / kept.len() as f64).round() as i64
    }
}

impl WorldSession {
    /// Forgets outstanding requests and restarts numbering from zero.
    pub fn reset_time_sync(&mut self) {
        self.time_sync.next_counter = 0;
        self.time_sync.pending.clear();
        self.time_sync.next_due = None;
    }

    /// Sends the next numbered request and schedules the one after it.
    /// The first request of a run is followed sooner than the rest.
    pub fn send_time_sync(&mut self) {
        let counter = self.time_sync.next_counter;
        let sent_at = self.time_sync.server_time_ms(self.now);
        self.send(ServerMessage::TimeSyncRequest { counter });
        self.time_sync.pending.insert(counter, sent_at);

        let interval = if counter == 0 {
            self.services.config.time_sync_first_interval()
        } else {
            self.services.config.time_sync_interval()
        };
        self.time_sync.next_due = self.now.checked_add(interval);
        self.time_sync.next_counter = counter.wrapping_add(1);
        trace!(account = %self.account_id, counter, "sent time sync request");
    }

    /// Records the client's answer to request `counter`. Returns `false`
    /// for answers to requests never sent or already answered.
    pub fn handle_time_sync_response(&mut self, counter: u32, client_ticks: u32) -> bool {
        let Some(sent_at) = self.time_sync.pending.remove(&counter) else {
            warn!(account = %self.account_id, counter, "time sync response with unknown counter");
            return false;
        };

        let received_at = self.time_sync.server_time_ms(self.now);
        let round_trip = i64::from(received_at.saturating_sub(sent_at));
        let lag = round_trip / 2;
        let delta = i64::from(sent_at) + lag - i64::from(client_ticks);

        self.time_sync.push_delta(delta);
        self.time_sync.clock_delta = self.time_sync.filtered_delta();
        debug!(
            account = %self.account_id,
            counter,
            round_trip,
            delta,
            clock_delta = self.time_sync.clock_delta,
            "time sync response"
        );
        true
    }

    /// Translates a client timestamp into server time. Falls back to the
    /// current server time before the first answer, or when the result
    /// does not fit.
    pub fn synchronize_movement_time(&self, client_time: u32) -> u32 {
        let delta = self.time_sync.clock_delta;
        let translated = i64::from(client_time) + delta;
        if delta == 0 || translated < 0 || translated > i64::from(u32::MAX) {
            return self.server_time_ms();
        }
        translated as u32
    }

    /// Milliseconds since the session was created, at the current tick.
    pub fn server_time_ms(&self) -> u32 {
        self.time_sync.server_time_ms(self.now)
    }

    /// Current estimate of server time minus client time, in ms.
    pub fn clock_delta(&self) -> i64 {
        self.time_sync.clock_delta
    }

    /// Sends the next request once it is due.
    pub(crate) fn update_time_sync(&mut self) {
        if self.time_sync.next_due.is_some_and(|due| self.now >= due) {
            self.send_time_sync();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filtered_delta_ignores_outlier() {
        let mut sync = TimeSync::new(Instant::now());
        for delta in [100, 102, 98, 101, 99, 5000] {
            sync.push_delta(delta);
        }
        assert_eq!(sync.filtered_delta(), 100);
    }

    #[test]
    fn test_push_delta_keeps_window() {
        let mut sync = TimeSync::new(Instant::now());
        for delta in 0..10 {
            sync.push_delta(delta);
        }
        assert_eq!(sync.deltas.len(), CLOCK_DELTA_WINDOW);
        assert_eq!(sync.deltas.front(), Some(&4));
    }

    #[test]
    fn test_filtered_delta_empty_is_zero() {
        let sync = TimeSync::new(Instant::now());
        assert_eq!(sync.filtered_delta(), 0);
    }
}
