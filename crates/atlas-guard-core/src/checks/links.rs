//! Cross-reference integrity and marker presence

use std::collections::BTreeSet;

use serde::Serialize;

use super::{sorted_unique, CheckResult};

/// How a single link was classified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkClass {
    /// Scheme-qualified or protocol-relative; not an internal link
    External,
    /// Same-page fragment (`#section`)
    Anchor,
    /// Explicitly allowed even if it does not resolve
    Whitelisted,
    /// Site-absolute path (`/atlas/x.html`); tracked, never resolved
    Absolute,
    /// Relative link that resolves to an existing file
    Resolved,
    /// Relative link that resolves to nothing
    Broken,
}

fn is_external(link: &str) -> bool {
    if link.starts_with("//") {
        return true;
    }
    match link.split_once(':') {
        Some((scheme, _)) => {
            !scheme.is_empty()
                && !scheme.contains('/')
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}

/// Link target without query string or fragment
fn strip_suffixes(link: &str) -> &str {
    let end = link.find(['#', '?']).unwrap_or(link.len());
    &link[..end]
}

/// Classify one link; `resolves` decides whether a relative path exists
pub fn classify(link: &str, whitelist: &BTreeSet<&str>, resolves: &dyn Fn(&str) -> bool) -> LinkClass {
    let link = link.trim();
    if is_external(link) {
        return LinkClass::External;
    }
    if link.is_empty() || link.starts_with('#') {
        return LinkClass::Anchor;
    }
    let target = strip_suffixes(link);
    if whitelist.contains(link) || whitelist.contains(target) {
        return LinkClass::Whitelisted;
    }
    if target.starts_with('/') {
        return LinkClass::Absolute;
    }
    if resolves(target) {
        LinkClass::Resolved
    } else {
        LinkClass::Broken
    }
}

/// Every internal link resolves, is whitelisted, or is flagged absolute
///
/// Only broken relative links fail the check. Whitelisted and absolute links
/// are listed in the details for visibility.
pub fn cross_references(
    links: &[String],
    whitelist: &[String],
    resolves: &dyn Fn(&str) -> bool,
) -> CheckResult {
    let allowed: BTreeSet<&str> = whitelist.iter().map(String::as_str).collect();

    let mut broken = Vec::new();
    let mut whitelisted = Vec::new();
    let mut absolute = Vec::new();
    let mut external = 0usize;
    let mut resolved = 0usize;

    for link in links {
        match classify(link, &allowed, resolves) {
            LinkClass::Broken => broken.push(link.clone()),
            LinkClass::Whitelisted => whitelisted.push(link.clone()),
            LinkClass::Absolute => absolute.push(link.clone()),
            LinkClass::Resolved => resolved += 1,
            LinkClass::External => external += 1,
            LinkClass::Anchor => {}
        }
    }

    let broken = sorted_unique(broken);
    CheckResult::from_bool(broken.is_empty())
        .with("links_total", links.len())
        .with("resolved", resolved)
        .with("external", external)
        .with_list("broken", broken)
        .with_list("whitelisted", sorted_unique(whitelisted))
        .with_list("absolute", sorted_unique(absolute))
}

/// All literal markers occur in the document text
pub fn markers(text: &str, markers: &[String]) -> CheckResult {
    let (found, missing): (Vec<&String>, Vec<&String>) =
        markers.iter().partition(|marker| text.contains(marker.as_str()));

    CheckResult::from_bool(missing.is_empty())
        .with_list("markers_found", found.into_iter().cloned().collect())
        .with_list("markers_missing", missing.into_iter().cloned().collect())
}
