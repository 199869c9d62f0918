//! Artifact staleness check

use chrono::{DateTime, SecondsFormat, Utc};

use super::CheckResult;
use crate::staleness::{Clock, StalenessPolicy};

/// `ok = !stale`; `details.forced` distinguishes injected from genuine staleness
///
/// The artifact age is deliberately left out of the details so that two runs
/// over an unchanged artifact produce identical verdict bodies.
pub fn staleness(mtime: Option<DateTime<Utc>>, policy: StalenessPolicy, clock: &dyn Clock) -> CheckResult {
    let freshness = policy.evaluate(mtime, clock);

    let result = CheckResult::from_bool(!freshness.stale)
        .with("stale", freshness.stale)
        .with("threshold_seconds", freshness.threshold_seconds)
        .with(
            "mtime",
            mtime
                .map(|m| m.to_rfc3339_opts(SecondsFormat::Secs, true))
                .unwrap_or_default(),
        );
    result.with_forced(freshness.forced)
}
