// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Kubernetes resource quantity parsing (`500m`, `2`, `512Mi`, `1G`).

/// Parse a CPU quantity into millicores.
pub fn parse_cpu(value: &str) -> Option<u64> {
    let value = value.trim();
    if let Some(millis) = value.strip_suffix('m') {
        return millis.parse::<u64>().ok();
    }
    scale(value, 1000.0)
}

/// Parse a memory quantity into bytes.
pub fn parse_memory(value: &str) -> Option<u64> {
    let value = value.trim();
    const SUFFIXES: [(&str, f64); 12] = [
        ("Ki", 1024.0),
        ("Mi", 1048576.0),
        ("Gi", 1073741824.0),
        ("Ti", 1099511627776.0),
        ("Pi", 1125899906842624.0),
        ("Ei", 1152921504606846976.0),
        ("k", 1e3),
        ("M", 1e6),
        ("G", 1e9),
        ("T", 1e12),
        ("P", 1e15),
        ("E", 1e18),
    ];
    for (suffix, multiplier) in SUFFIXES {
        if let Some(number) = value.strip_suffix(suffix) {
            return scale(number, multiplier);
        }
    }
    scale(value, 1.0)
}

fn scale(number: &str, multiplier: f64) -> Option<u64> {
    if number.is_empty() || !number.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }
    let parsed: f64 = number.parse().ok()?;
    let scaled = (parsed * multiplier).round();
    if !scaled.is_finite() || scaled > u64::MAX as f64 {
        return None;
    }
    Some(scaled as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu() {
        assert_eq!(parse_cpu("500m"), Some(500));
        assert_eq!(parse_cpu("2"), Some(2000));
        assert_eq!(parse_cpu("0.5"), Some(500));
        assert_eq!(parse_cpu("0"), Some(0));
        assert_eq!(parse_cpu("two"), None);
        assert_eq!(parse_cpu(""), None);
        assert_eq!(parse_cpu("-1"), None);
    }

    #[test]
    fn test_memory() {
        assert_eq!(parse_memory("512Mi"), Some(512 * 1024 * 1024));
        assert_eq!(parse_memory("4Gi"), Some(4 * 1024 * 1024 * 1024));
        assert_eq!(parse_memory("1G"), Some(1_000_000_000));
        assert_eq!(parse_memory("1024"), Some(1024));
        assert_eq!(parse_memory("1.5Gi"), Some(1610612736));
        assert_eq!(parse_memory("lots"), None);
        assert_eq!(parse_memory("Mi"), None);
    }
}
