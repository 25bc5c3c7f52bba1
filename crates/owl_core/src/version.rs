//! Dotted version comparison.

use std::cmp::Ordering;

/// The leading run of digits and dots, after skipping any prefix such as
/// `v`. `1.20.4-R0.1-SNAPSHOT` becomes `1.20.4`.
pub fn clean_version(version: &str) -> &str {
    let start = version
        .find(|c: char| c.is_ascii_digit())
        .unwrap_or(version.len());
    let rest = &version[start..];
    let end = rest
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(rest.len());
    &rest[..end]
}

/// Compare two versions numerically part by part. Missing, empty or
/// non-numeric parts count as zero, so `1.2` equals `1.2.0`.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let a = parts(clean_version(a));
    let b = parts(clean_version(b));
    let len = a.len().max(b.len());
    (0..len)
        .map(|i| {
            let left = a.get(i).copied().unwrap_or(0);
            let right = b.get(i).copied().unwrap_or(0);
            left.cmp(&right)
        })
        .find(|ord| ord.is_ne())
        .unwrap_or(Ordering::Equal)
}

pub fn is_version_at_least(current: &str, required: &str) -> bool {
    compare_versions(current, required) != Ordering::Less
}

fn parts(version: &str) -> Vec<u64> {
    if version.is_empty() {
        return Vec::new();
    }
    version
        .split('.')
        .map(|part| part.parse().unwrap_or(0))
        .collect()
}
