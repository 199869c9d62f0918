//! Staleness Policy
//!
//! `stale = forced || (now - mtime > threshold)`. The clock is injectable and
//! `forced` lets tests drive the stale branch without touching file mtimes.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Source of "now"
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at a fixed instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Freshness policy for one artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StalenessPolicy {
    pub threshold_seconds: u64,
    pub forced: bool,
}

/// Outcome of a staleness evaluation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Freshness {
    pub stale: bool,
    pub forced: bool,
    pub threshold_seconds: u64,
    /// Age at evaluation time; `None` when the mtime is unknown
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_seconds: Option<i64>,
}

impl StalenessPolicy {
    pub fn new(threshold_seconds: u64) -> Self {
        Self {
            threshold_seconds,
            forced: false,
        }
    }

    pub fn forced(mut self, forced: bool) -> Self {
        self.forced = forced;
        self
    }

    /// Evaluate against a modification time
    ///
    /// An unknown mtime is treated as stale: freshness cannot be shown.
    pub fn evaluate(&self, mtime: Option<DateTime<Utc>>, clock: &dyn Clock) -> Freshness {
        let age = mtime.map(|m| clock.now().signed_duration_since(m));
        let threshold_ms = i128::from(self.threshold_seconds) * 1000;
        let too_old = match age {
            Some(age) => i128::from(age.num_milliseconds()) > threshold_ms,
            None => true,
        };

        Freshness {
            stale: self.forced || too_old,
            forced: self.forced,
            threshold_seconds: self.threshold_seconds,
            age_seconds: age.map(|a| a.num_seconds()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap())
    }

    #[test]
    fn test_boundaries() {
        let clock = clock();
        let policy = StalenessPolicy::new(3600);
        let now = clock.now();

        let older = now - Duration::seconds(3600 + 1);
        let newer = now - Duration::seconds(3600 - 1);
        let exact = now - Duration::seconds(3600);

        assert!(policy.evaluate(Some(older), &clock).stale);
        assert!(!policy.evaluate(Some(newer), &clock).stale);
        assert!(!policy.evaluate(Some(exact), &clock).stale);
    }

    #[test]
    fn test_forced_is_always_stale() {
        let clock = clock();
        let freshness = StalenessPolicy::new(3600)
            .forced(true)
            .evaluate(Some(clock.now()), &clock);
        assert!(freshness.stale);
        assert!(freshness.forced);
        assert_eq!(freshness.age_seconds, Some(0));
    }

    #[test]
    fn test_unknown_mtime_is_stale() {
        let freshness = StalenessPolicy::new(60).evaluate(None, &clock());
        assert!(freshness.stale);
        assert!(!freshness.forced);
        assert_eq!(freshness.age_seconds, None);
    }

    #[test]
    fn test_huge_threshold_does_not_overflow() {
        let clock = clock();
        let freshness = StalenessPolicy::new(u64::MAX).evaluate(Some(clock.now()), &clock);
        assert!(!freshness.stale);
    }
}
