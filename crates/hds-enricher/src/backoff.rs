//! Exponential retry delay for failed credential refreshes.

use chrono::{DateTime, Duration, Utc};

/// Tracks consecutive failures and when the next attempt is allowed.
///
/// The delay doubles with every failure, starting at `base` and capped at
/// `max`. A success resets it.
#[derive(Debug, Clone)]
pub struct Backoff {
  base:     Duration,
  max:      Duration,
  failures: u32,
  retry_at: Option<DateTime<Utc>>,
}

impl Backoff {
  pub fn new(base: Duration, max: Duration) -> Self {
    Self { base, max: max.max(base), failures: 0, retry_at: None }
  }

  pub fn failures(&self) -> u32 { self.failures }

  pub fn retry_at(&self) -> Option<DateTime<Utc>> { self.retry_at }

  /// `true` while a previous failure's delay has not yet elapsed.
  pub fn is_waiting(&self, now: DateTime<Utc>) -> bool {
    self.retry_at.is_some_and(|at| now < at)
  }

  /// Register a failure at `now` and return the delay until the next attempt.
  pub fn record_failure(&mut self, now: DateTime<Utc>) -> Duration {
    self.failures = self.failures.saturating_add(1);
    let doublings = (self.failures - 1).min(30);
    let millis = self
      .base
      .num_milliseconds()
      .saturating_mul(1_i64 << doublings)
      .min(self.max.num_milliseconds());
    let delay = Duration::milliseconds(millis);
    self.retry_at = Some(now + delay);
    delay
  }

  pub fn reset(&mut self) {
    self.failures = 0;
    self.retry_at = None;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap()
  }

  #[test]
  fn doubles_until_capped() {
    let mut b = Backoff::new(Duration::seconds(5), Duration::seconds(60));
    let delays: Vec<i64> = (0..6)
      .map(|_| b.record_failure(at(0)).num_seconds())
      .collect();
    assert_eq!(delays, [5, 10, 20, 40, 60, 60]);
    assert_eq!(b.failures(), 6);
  }

  #[test]
  fn waits_until_retry_time() {
    let mut b = Backoff::new(Duration::seconds(5), Duration::seconds(300));
    assert!(!b.is_waiting(at(100)));

    b.record_failure(at(100));
    assert_eq!(b.retry_at(), Some(at(105)));
    assert!(b.is_waiting(at(104)));
    assert!(!b.is_waiting(at(105)));
  }

  #[test]
  fn reset_clears_state() {
    let mut b = Backoff::new(Duration::seconds(5), Duration::seconds(300));
    b.record_failure(at(0));
    b.record_failure(at(0));
    b.reset();
    assert_eq!(b.failures(), 0);
    assert!(!b.is_waiting(at(0)));
    assert_eq!(b.record_failure(at(0)).num_seconds(), 5);
  }

  #[test]
  fn many_failures_do_not_overflow() {
    let mut b = Backoff::new(Duration::seconds(5), Duration::seconds(300));
    for _ in 0..100 {
      b.record_failure(at(0));
    }
    assert_eq!(b.record_failure(at(0)).num_seconds(), 300);
  }
}
