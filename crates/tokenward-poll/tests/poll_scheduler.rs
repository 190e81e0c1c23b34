//! Integration tests for the poll scheduler.
//!
//! Every async test runs with tokio's clock paused, so `sleep_until`
//! resolves as soon as the runtime has nothing else to do and
//! `time::advance` simulates a poll that overran.

use std::time::Duration;

use tokio::time::{self, Instant};
use tokenward_poll::{MissedPollPolicy, PollConfig, PollScheduler};

fn three_seconds() -> PollConfig {
    PollConfig::every(Duration::from_secs(3))
}

// =========================================================================
// PollConfig
// =========================================================================

#[test]
fn test_default_config_is_disabled() {
    let cfg = PollConfig::default();
    assert!(cfg.is_disabled());
    assert_eq!(cfg.policy, MissedPollPolicy::Skip);
}

#[test]
fn test_validated_clamps_tiny_interval() {
    let cfg = PollConfig::every(Duration::from_millis(1)).validated();
    assert_eq!(cfg.interval, PollConfig::MIN_INTERVAL);
}

#[test]
fn test_validated_leaves_zero_interval_disabled() {
    let cfg = PollConfig::every(Duration::ZERO).validated();
    assert!(cfg.is_disabled());
}

// =========================================================================
// Firing
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_wait_for_poll_fires_after_one_interval() {
    let start = Instant::now();
    let mut s = PollScheduler::new(three_seconds());

    let info = s.wait_for_poll().await;
    assert_eq!(info.poll, 1);
    assert_eq!(info.polls_skipped, 0);
    assert_eq!(Instant::now() - start, Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn test_polls_keep_fixed_cadence() {
    let start = Instant::now();
    let mut s = PollScheduler::new(three_seconds());

    for expected in 1..=4 {
        let info = s.wait_for_poll().await;
        assert_eq!(info.poll, expected);
    }
    assert_eq!(s.poll_count(), 4);
    assert_eq!(Instant::now() - start, Duration::from_secs(12));
}

#[tokio::test(start_paused = true)]
async fn test_initial_jitter_delays_only_first_poll() {
    let start = Instant::now();
    let mut s = PollScheduler::new(PollConfig {
        initial_jitter: Duration::from_millis(500),
        ..three_seconds()
    });

    s.wait_for_poll().await;
    let first = Instant::now() - start;
    assert!(first >= Duration::from_secs(3));
    assert!(first < Duration::from_millis(3_500));
}

#[tokio::test(start_paused = true)]
async fn test_disabled_scheduler_never_fires() {
    let mut s = PollScheduler::new(PollConfig::default());
    assert!(s.is_disabled());

    let result = time::timeout(Duration::from_secs(60), s.wait_for_poll()).await;
    assert!(result.is_err(), "disabled scheduler should pend forever");
}

// =========================================================================
// Missed polls
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_skip_policy_drops_missed_polls() {
    let start = Instant::now();
    let mut s = PollScheduler::new(three_seconds());
    s.wait_for_poll().await;

    // The work after poll 1 takes 7s: the deadline at 6s is missed by 4s.
    time::advance(Duration::from_secs(7)).await;
    let info = s.wait_for_poll().await;
    assert_eq!(info.poll, 2);
    assert_eq!(info.late_by, Duration::from_secs(4));
    assert_eq!(info.polls_skipped, 1);

    // Cadence resumes from when poll 2 fired, no burst.
    s.wait_for_poll().await;
    assert_eq!(Instant::now() - start, Duration::from_secs(13));
}

#[tokio::test(start_paused = true)]
async fn test_skip_policy_small_lateness_keeps_cadence() {
    let start = Instant::now();
    let mut s = PollScheduler::new(three_seconds());
    s.wait_for_poll().await;

    time::advance(Duration::from_secs(4)).await;
    let info = s.wait_for_poll().await;
    assert_eq!(info.late_by, Duration::from_secs(1));
    assert_eq!(info.polls_skipped, 0);

    s.wait_for_poll().await;
    assert_eq!(Instant::now() - start, Duration::from_secs(9));
}

#[tokio::test(start_paused = true)]
async fn test_delay_policy_restarts_interval_from_fire_time() {
    let start = Instant::now();
    let mut s = PollScheduler::new(PollConfig {
        policy: MissedPollPolicy::Delay,
        ..three_seconds()
    });
    s.wait_for_poll().await;

    time::advance(Duration::from_secs(4)).await;
    s.wait_for_poll().await;
    s.wait_for_poll().await;
    assert_eq!(Instant::now() - start, Duration::from_secs(10));
}
