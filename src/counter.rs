use chrono::{DateTime, TimeDelta, Utc};

use crate::models::CounterState;

// Quota counter - tracks usage of a single key inside a reset window.
// Not synchronized: only the increment pipeline mutates a live counter.
#[derive(Debug, Clone, PartialEq)]
pub struct QuotaCounter {
    total: i64,
    fresh_count: i64,
    allowance: i64,
    max: i64,
    period_secs: u32,
    reset_at: DateTime<Utc>,
    last_update_at: DateTime<Utc>,
}

fn period(period_secs: u32) -> TimeDelta {
    TimeDelta::seconds(i64::from(period_secs))
}

impl QuotaCounter {
    pub fn new(period_secs: u32, allowance: i64, total: i64) -> Self {
        Self::new_at(period_secs, allowance, total, Utc::now())
    }

    pub fn new_at(period_secs: u32, allowance: i64, total: i64, now: DateTime<Utc>) -> Self {
        Self {
            total,
            fresh_count: 0,
            allowance,
            max: allowance,
            period_secs,
            reset_at: now + period(period_secs),
            last_update_at: now,
        }
    }

    pub fn apply_increment(&mut self) {
        self.apply_increment_at(Utc::now());
    }

    pub fn apply_increment_at(&mut self, now: DateTime<Utc>) {
        self.fresh_count += 1;
        self.last_update_at = now;
    }

    pub fn check_and_apply_reset(&mut self) -> bool {
        self.check_and_apply_reset_at(Utc::now())
    }

    /// Rolls the window over once `now` is past `reset_at`.
    ///
    /// The next window starts at `now`, not at the previous `reset_at`, so a
    /// delayed check pushes every later window back by the same delay.
    pub fn check_and_apply_reset_at(&mut self, now: DateTime<Utc>) -> bool {
        if now <= self.reset_at {
            return false;
        }

        self.max = self.allowance;
        self.fresh_count = 0;
        self.total = 0;
        self.reset_at = now + period(self.period_secs);
        true
    }

    pub fn local_total(&self) -> i64 {
        self.total + self.fresh_count
    }

    pub fn is_blocked(&self) -> bool {
        self.local_total() >= self.max
    }

    pub fn is_stale(&self, age_secs: u32) -> bool {
        self.is_stale_at(age_secs, Utc::now())
    }

    /// True when `now + age` is after the last update.
    ///
    /// This is the historical eviction rule and holds for practically every
    /// counter once any time has passed. "Not updated in the last `age`
    /// seconds" would be `last_update_at < now - age`; it stays as is until
    /// the owners of the eviction policy confirm which one they want.
    pub fn is_stale_at(&self, age_secs: u32, now: DateTime<Utc>) -> bool {
        now + period(age_secs) > self.last_update_at
    }

    pub fn total(&self) -> i64 {
        self.total
    }

    pub fn fresh_count(&self) -> i64 {
        self.fresh_count
    }

    pub fn allowance(&self) -> i64 {
        self.allowance
    }

    pub fn max(&self) -> i64 {
        self.max
    }

    pub fn period_secs(&self) -> u32 {
        self.period_secs
    }

    pub fn reset_at(&self) -> DateTime<Utc> {
        self.reset_at
    }

    pub fn last_update_at(&self) -> DateTime<Utc> {
        self.last_update_at
    }

    pub fn state(&self) -> CounterState {
        CounterState {
            total: self.total,
            fresh_count: self.fresh_count,
            max: self.max,
            allowance: self.allowance,
            period_secs: self.period_secs,
            reset_at: self.reset_at,
            last_update_at: self.last_update_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn new_counter_starts_window_at_creation() {
        let ctr = QuotaCounter::new_at(10, 20, 5, at(0));
        assert_eq!(ctr.total(), 5);
        assert_eq!(ctr.fresh_count(), 0);
        assert_eq!(ctr.max(), 20);
        assert_eq!(ctr.allowance(), 20);
        assert_eq!(ctr.reset_at(), at(10));
        assert_eq!(ctr.last_update_at(), at(0));
    }

    #[test]
    fn increments_add_to_local_total() {
        let mut ctr = QuotaCounter::new_at(10, 20, 5, at(0));
        ctr.apply_increment_at(at(1));
        ctr.apply_increment_at(at(2));
        assert_eq!(ctr.local_total(), 7);
        assert_eq!(ctr.total(), 5);
        assert_eq!(ctr.last_update_at(), at(2));
    }

    #[test]
    fn blocked_once_local_total_reaches_max() {
        let mut ctr = QuotaCounter::new_at(10, 3, 0, at(0));
        for _ in 0..2 {
            ctr.apply_increment_at(at(1));
        }
        assert!(!ctr.is_blocked());
        ctr.apply_increment_at(at(1));
        assert!(ctr.is_blocked());
    }

    #[test]
    fn initial_total_counts_towards_block() {
        let ctr = QuotaCounter::new_at(10, 100, 100, at(0));
        assert!(ctr.is_blocked());
    }

    #[test]
    fn no_reset_inside_window() {
        let mut ctr = QuotaCounter::new_at(10, 3, 2, at(0));
        ctr.apply_increment_at(at(1));
        // boundary itself is still inside the window
        assert!(!ctr.check_and_apply_reset_at(at(10)));
        assert_eq!(ctr.local_total(), 3);
        assert_eq!(ctr.reset_at(), at(10));
    }

    #[test]
    fn reset_clears_usage_and_restarts_window_from_check_time() {
        let mut ctr = QuotaCounter::new_at(10, 3, 2, at(0));
        ctr.apply_increment_at(at(1));
        ctr.max = 1;

        assert!(ctr.check_and_apply_reset_at(at(25)));
        assert_eq!(ctr.total(), 0);
        assert_eq!(ctr.fresh_count(), 0);
        assert_eq!(ctr.max(), 3);
        assert_eq!(ctr.reset_at(), at(35));
        assert!(!ctr.is_blocked());
    }

    #[test]
    fn stale_check_keeps_literal_rule() {
        let now = at(0);
        let day = 60 * 60 * 24;
        let mut ctr = QuotaCounter::new_at(10, 100, 0, now);

        ctr.last_update_at = now - TimeDelta::days(30);
        assert!(ctr.is_stale_at(20 * day, now));

        ctr.last_update_at = now - TimeDelta::days(1);
        assert!(ctr.is_stale_at(2 * day, now));

        // a counter touched right now is still reported stale
        ctr.last_update_at = now - TimeDelta::seconds(1);
        assert!(ctr.is_stale_at(2 * day, now));
        assert!(ctr.is_stale_at(0, now));

        // only an update from the future escapes it
        ctr.last_update_at = now + TimeDelta::seconds(5);
        assert!(!ctr.is_stale_at(3, now));
        assert!(ctr.is_stale_at(6, now));
    }
}
