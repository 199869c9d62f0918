//! Set-algebra checks over artifact id lists
//!
//! Used for chip/filter propagation between index and detail pages and for
//! comparing independently derived views of the same logical set.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use super::{sorted_unique, CheckResult};

/// Every id of `subset` appears in `superset`; an empty subset is vacuously ok
///
/// `details.missing` lists subset ids absent from the superset.
pub fn subset(subset: &[String], superset: &[String]) -> CheckResult {
    let known: BTreeSet<&String> = superset.iter().collect();
    let missing = sorted_unique(subset.iter().filter(|id| !known.contains(id)).cloned());

    CheckResult::from_bool(missing.is_empty())
        .with("subset_size", subset.iter().collect::<BTreeSet<_>>().len())
        .with("superset_size", known.len())
        .with_list("missing", missing)
}

/// No id appears twice in one item list
pub fn uniqueness(ids: &[String]) -> CheckResult {
    let mut seen: BTreeMap<&String, usize> = BTreeMap::new();
    for id in ids {
        *seen.entry(id).or_insert(0) += 1;
    }
    let duplicates: Vec<String> = seen
        .iter()
        .filter(|(_, n)| **n > 1)
        .map(|(id, _)| (*id).clone())
        .collect();

    CheckResult::from_bool(duplicates.is_empty())
        .with("total", ids.len())
        .with("distinct", seen.len())
        .with_list("duplicates", duplicates)
}

/// Two views of one logical set must be equal
///
/// `missing` holds ids of `expected` absent from `observed`; `extra` holds
/// the reverse. An injected value forces `ok=false` and is echoed as
/// `details.injected` next to `details.forced=true`.
pub fn drift(expected: &[String], observed: &[String], injected: Option<Value>) -> CheckResult {
    let left: BTreeSet<&String> = expected.iter().collect();
    let right: BTreeSet<&String> = observed.iter().collect();

    let missing: Vec<String> = left.difference(&right).map(|id| (*id).clone()).collect();
    let extra: Vec<String> = right.difference(&left).map(|id| (*id).clone()).collect();
    let agree = missing.is_empty() && extra.is_empty();

    let result = CheckResult::from_bool(agree && injected.is_none())
        .with("expected_size", left.len())
        .with("observed_size", right.len())
        .with_list("missing", missing)
        .with_list("extra", extra);

    match injected {
        Some(value) => result.with_forced(true).with("injected", value),
        None => result.with_forced(false),
    }
}
