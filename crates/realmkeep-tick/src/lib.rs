//! Fixed-rate tick loop for Realmkeep.
//!
//! One [`TickLoop`] drives the global world update (session queues and
//! state machines); one more per region drives that region's map-queue
//! drains. Each tick hands the caller a [`Tick`] carrying the real time
//! elapsed since the previous tick (`diff`) and the tick's wall-clock
//! instant (`at`), which is what session deadlines are checked against.
//!
//! ```ignore
//! let mut ticks = TickLoop::with_rate(20);
//! loop {
//!     let tick = ticks.next_tick().await;
//!     registry.update_sessions(tick.at);
//!     ticks.finish_tick();
//! }
//! ```

use std::time::{Duration, Instant};

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::time::{self, Instant as TokioInstant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// What to do when the loop wakes up later than scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OverrunPolicy {
    /// Forget the missed ticks and schedule the next one from now.
    #[default]
    Skip,
    /// Fire up to `max_catchup` late ticks back to back, then skip the rest.
    CatchUp { max_catchup: u32 },
}

/// Tick loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickConfig {
    /// Ticks per second. Clamped to `1..=MAX_RATE_HZ`.
    pub rate_hz: u32,
    pub policy: OverrunPolicy,
    /// Fraction of the tick period (0.0–1.0) the caller's work may use
    /// before a budget warning is logged.
    pub budget_warn_threshold: f64,
    /// Random delay (0..n µs) added before the first tick so region loops
    /// started together do not all wake on the same instant.
    pub initial_jitter_us: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            rate_hz: 20,
            policy: OverrunPolicy::default(),
            budget_warn_threshold: 0.80,
            initial_jitter_us: 2_000,
        }
    }
}

impl TickConfig {
    pub const MAX_RATE_HZ: u32 = 200;

    pub fn with_rate(rate_hz: u32) -> Self {
        Self {
            rate_hz,
            ..Default::default()
        }
    }

    /// Returns a copy with out-of-range values pulled back into range.
    pub fn validated(mut self) -> Self {
        let clamped = self.rate_hz.clamp(1, Self::MAX_RATE_HZ);
        if clamped != self.rate_hz {
            warn!(rate = self.rate_hz, clamped, "tick rate out of range, clamping");
            self.rate_hz = clamped;
        }
        self.budget_warn_threshold = self.budget_warn_threshold.clamp(0.0, 1.0);
        self
    }

    /// Length of one tick.
    pub fn period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.rate_hz.max(1) as f64)
    }
}

// ---------------------------------------------------------------------------
// Tick
// ---------------------------------------------------------------------------

/// One fired tick.
#[derive(Debug, Clone, Copy)]
pub struct Tick {
    /// Tick number, starting at 1.
    pub number: u64,
    /// Real time since the previous tick fired (one period for the first).
    pub diff: Duration,
    /// When this tick fired. Deadlines are compared against this.
    pub at: Instant,
    /// The loop woke up more than 10% of a period late.
    pub overrun: bool,
    /// Ticks dropped because of the overrun policy.
    pub skipped: u64,
}

/// Running counters for a loop.
#[derive(Debug, Clone, Default)]
pub struct TickStats {
    pub total_ticks: u64,
    pub total_overruns: u64,
    pub total_skipped: u64,
    /// Exponential moving average (α = 0.1) of the work time reported
    /// through [`TickLoop::finish_tick`].
    pub avg_work: Duration,
    pub max_work: Duration,
}

// ---------------------------------------------------------------------------
// Loop
// ---------------------------------------------------------------------------

/// A fixed-rate tick source.
pub struct TickLoop {
    config: TickConfig,
    period: Duration,
    count: u64,
    next: TokioInstant,
    last_fired: Option<TokioInstant>,
    work_started: Option<TokioInstant>,
    stats: TickStats,
}

impl TickLoop {
    pub fn new(config: TickConfig) -> Self {
        let config = config.validated();
        let period = config.period();
        let jitter = if config.initial_jitter_us > 0 {
            Duration::from_micros(rand::rng().random_range(0..config.initial_jitter_us))
        } else {
            Duration::ZERO
        };

        debug!(
            rate_hz = config.rate_hz,
            period_ms = period.as_secs_f64() * 1000.0,
            policy = ?config.policy,
            "tick loop created"
        );

        Self {
            config,
            period,
            count: 0,
            next: TokioInstant::now() + period + jitter,
            last_fired: None,
            work_started: None,
            stats: TickStats::default(),
        }
    }

    pub fn with_rate(rate_hz: u32) -> Self {
        Self::new(TickConfig::with_rate(rate_hz))
    }

    /// Sleeps until the next tick is due and returns it.
    ///
    /// Cancel-safe: dropping the future before it resolves leaves the
    /// schedule untouched, so it can race other branches in `select!`.
    pub async fn next_tick(&mut self) -> Tick {
        let scheduled = self.next;
        time::sleep_until(scheduled).await;

        let now = TokioInstant::now();
        self.count += 1;
        self.work_started = Some(now);

        let late_by = now.saturating_duration_since(scheduled);
        let overrun = late_by > self.period / 10;
        let behind = (late_by.as_nanos() / self.period.as_nanos().max(1)) as u64;
        let mut skipped = 0;

        self.next = match self.config.policy {
            OverrunPolicy::Skip => {
                skipped = behind;
                if skipped > 0 {
                    warn!(tick = self.count, skipped, "tick overrun, skipping ahead");
                }
                now + self.period
            }
            OverrunPolicy::CatchUp { max_catchup } if behind <= u64::from(max_catchup) => {
                scheduled + self.period
            }
            OverrunPolicy::CatchUp { max_catchup } => {
                skipped = behind - u64::from(max_catchup);
                warn!(tick = self.count, behind, skipped, "tick overrun beyond catch-up cap");
                now + self.period
            }
        };

        let diff = self
            .last_fired
            .map_or(self.period, |last| now.saturating_duration_since(last));
        self.last_fired = Some(now);

        if overrun {
            self.stats.total_overruns += 1;
        }
        self.stats.total_skipped += skipped;
        self.stats.total_ticks += 1;
        trace!(tick = self.count, overrun, "tick fired");

        Tick {
            number: self.count,
            diff,
            at: now.into_std(),
            overrun,
            skipped,
        }
    }

    /// Marks the end of the caller's work for the current tick and logs a
    /// warning when it used more than the configured share of the period.
    pub fn finish_tick(&mut self) {
        let Some(started) = self.work_started.take() else {
            return;
        };
        let work = TokioInstant::now().saturating_duration_since(started);
        let utilization = work.as_secs_f64() / self.period.as_secs_f64();

        if utilization >= 1.0 {
            warn!(
                tick = self.count,
                work_ms = work.as_secs_f64() * 1000.0,
                period_ms = self.period.as_secs_f64() * 1000.0,
                "tick work exceeded the period"
            );
        } else if utilization >= self.config.budget_warn_threshold {
            warn!(
                tick = self.count,
                utilization_pct = format!("{:.1}", utilization * 100.0),
                "tick work approaching the period"
            );
        }

        self.stats.max_work = self.stats.max_work.max(work);
        let prev = self.stats.avg_work.as_secs_f64();
        self.stats.avg_work = Duration::from_secs_f64(prev * 0.9 + work.as_secs_f64() * 0.1);
    }

    pub fn tick_count(&self) -> u64 {
        self.count
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn rate_hz(&self) -> u32 {
        self.config.rate_hz
    }

    pub fn stats(&self) -> &TickStats {
        &self.stats
    }
}
