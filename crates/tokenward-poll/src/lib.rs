//! Fixed-interval poll scheduler for Tokenward.
//!
//! Drives the periodic jobs of the system: the client's stored-token poll
//! (every 3 seconds) and the server's token-expiry sweep (every 10
//! minutes). Runs on tokio's clock, so tests can pause and advance time.
//!
//! # Disabled mode
//!
//! An interval of zero disables the scheduler: [`PollScheduler::wait_for_poll`]
//! pends forever, which is what a `tokio::select!` loop wants.
//!
//! # Integration
//!
//! ```ignore
//! let mut scheduler = PollScheduler::new(PollConfig::every(Duration::from_secs(3)));
//! loop {
//!     scheduler.wait_for_poll().await;
//!     manager.poll_stored_token().await;
//! }
//! ```
//!
//! A poll that takes longer than the interval does not cause a burst of
//! back-to-back polls afterwards; see [`MissedPollPolicy`].

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// What to do when a poll fires late (the previous poll's work overran).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MissedPollPolicy {
    /// Skip the missed poll(s) and resume the original cadence from now.
    #[default]
    Skip,
    /// Always schedule the next poll a full interval after the current
    /// one fired, letting the cadence drift.
    Delay,
}

/// Configuration for a [`PollScheduler`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollConfig {
    /// Time between polls. Zero disables polling.
    pub interval: Duration,
    /// Late-poll handling.
    pub policy: MissedPollPolicy,
    /// Random jitter (0..max) added to the *first* poll, so many clients
    /// started together don't poll in lockstep.
    pub initial_jitter: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::ZERO,
            policy: MissedPollPolicy::default(),
            initial_jitter: Duration::ZERO,
        }
    }
}

impl PollConfig {
    /// Shortest interval accepted; anything below is clamped up.
    pub const MIN_INTERVAL: Duration = Duration::from_millis(10);

    /// A config polling every `interval`, no jitter.
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            ..Default::default()
        }
    }

    /// Clamp out-of-range values. Called by [`PollScheduler::new`].
    pub fn validated(mut self) -> Self {
        if !self.interval.is_zero() && self.interval < Self::MIN_INTERVAL {
            warn!(
                interval_ms = self.interval.as_millis() as u64,
                min_ms = Self::MIN_INTERVAL.as_millis() as u64,
                "poll interval below minimum, clamping"
            );
            self.interval = Self::MIN_INTERVAL;
        }
        self
    }

    /// Whether this config disables polling.
    pub fn is_disabled(&self) -> bool {
        self.interval.is_zero()
    }
}

// ---------------------------------------------------------------------------
// Poll info
// ---------------------------------------------------------------------------

/// Returned by [`PollScheduler::wait_for_poll`] each time a poll is due.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollInfo {
    /// Poll number, starting at 1.
    pub poll: u64,
    /// How late this poll fired relative to its deadline.
    pub late_by: Duration,
    /// Whole intervals skipped because the previous poll overran.
    pub polls_skipped: u64,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Fixed-interval scheduler. One per periodic job.
#[derive(Debug)]
pub struct PollScheduler {
    config: PollConfig,
    poll_count: u64,
    next_poll: Option<Instant>,
}

impl PollScheduler {
    /// Creates a scheduler. The first poll is due one interval (plus
    /// jitter) from now.
    pub fn new(config: PollConfig) -> Self {
        let config = config.validated();

        let next_poll = (!config.is_disabled()).then(|| {
            let jitter = if config.initial_jitter.is_zero() {
                Duration::ZERO
            } else {
                let max = config.initial_jitter.as_micros() as u64;
                Duration::from_micros(rand::rng().random_range(0..max))
            };
            Instant::now() + config.interval + jitter
        });

        if config.is_disabled() {
            debug!("poll scheduler created disabled");
        } else {
            debug!(
                interval_ms = config.interval.as_millis() as u64,
                policy = ?config.policy,
                "poll scheduler created"
            );
        }

        Self {
            config,
            poll_count: 0,
            next_poll,
        }
    }

    /// A scheduler polling every `interval` with default settings.
    pub fn every(interval: Duration) -> Self {
        Self::new(PollConfig::every(interval))
    }

    /// Waits until the next poll is due.
    ///
    /// When disabled this future never resolves.
    pub async fn wait_for_poll(&mut self) -> PollInfo {
        let Some(deadline) = self.next_poll else {
            return std::future::pending().await;
        };
        let interval = self.config.interval;

        time::sleep_until(deadline).await;

        let now = Instant::now();
        self.poll_count += 1;
        let late_by = now.saturating_duration_since(deadline);
        let mut polls_skipped = 0u64;

        self.next_poll = Some(match self.config.policy {
            MissedPollPolicy::Skip => {
                polls_skipped = (late_by.as_nanos() / interval.as_nanos()) as u64;
                if polls_skipped > 0 {
                    warn!(
                        poll = self.poll_count,
                        skipped = polls_skipped,
                        late_ms = late_by.as_millis() as u64,
                        "poll overran, skipping ahead"
                    );
                    now + interval
                } else {
                    deadline + interval
                }
            }
            MissedPollPolicy::Delay => now + interval,
        });

        trace!(poll = self.poll_count, "poll due");

        PollInfo {
            poll: self.poll_count,
            late_by,
            polls_skipped,
        }
    }

    /// Polls fired so far.
    pub fn poll_count(&self) -> u64 {
        self.poll_count
    }

    /// The configured interval.
    pub fn interval(&self) -> Duration {
        self.config.interval
    }

    /// Whether this scheduler never fires.
    pub fn is_disabled(&self) -> bool {
        self.next_poll.is_none()
    }
}
