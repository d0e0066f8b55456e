// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Service/stub version compatibility.
//!
//! Versions are dotted numeric tuples (`major.minor.patch`); a build-hash
//! suffix after `+` is ignored for comparison.

/// Lowest client stub version this service accepts.
pub const MIN_CLIENT_VERSION: &str = "0.1.0";

/// Parse a version string into its numeric components.
///
/// Returns `None` for anything that is not dotted decimal.
pub fn parse(version: &str) -> Option<Vec<u64>> {
    let numeric = version.split('+').next().unwrap_or(version);
    numeric
        .split('.')
        .map(|part| part.parse::<u64>().ok())
        .collect()
}

/// Compare two versions; `None` when either side is unparseable.
pub fn compare(a: &str, b: &str) -> Option<std::cmp::Ordering> {
    let (a, b) = (parse(a)?, parse(b)?);
    // Missing components compare as zero: 1.2 == 1.2.0
    let len = a.len().max(b.len());
    for i in 0..len {
        let (x, y) = (a.get(i).copied().unwrap_or(0), b.get(i).copied().unwrap_or(0));
        match x.cmp(&y) {
            std::cmp::Ordering::Equal => continue,
            other => return Some(other),
        }
    }
    Some(std::cmp::Ordering::Equal)
}

/// Whether a peer demanding at least `min_required` can talk to `ours`.
///
/// Unparseable versions are rejected rather than silently accepted.
pub fn is_compatible(min_required: &str, ours: &str) -> bool {
    matches!(
        compare(min_required, ours),
        Some(std::cmp::Ordering::Less | std::cmp::Ordering::Equal)
    )
}

#[cfg(test)]
#[path = "version_tests.rs"]
mod tests;
