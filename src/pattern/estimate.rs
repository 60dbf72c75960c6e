//! Difficulty Estimator
//!
//! Expected search cost for a pattern under an independent-position model.
//!
//! Estimates are advisory only. The throughput figure is an operator-set
//! constant, not a measurement, and nothing in the crate uses an estimate to
//! time out a search.

use serde::{Deserialize, Serialize};

use super::types::PatternSpec;
use crate::config::EstimateConfig;

/// Alphabet size when matching is case-sensitive
pub const CASE_SENSITIVE_ALPHABET: f64 = 58.0;

/// Expected cost of a search
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    /// Expected number of candidate keypairs before a match
    pub expected_attempts: f64,
    /// `expected_attempts` divided by the configured throughput
    pub estimated_seconds: f64,
}

impl Estimate {
    /// Coarse human-readable duration
    pub fn human(&self) -> String {
        format_duration(self.estimated_seconds)
    }
}

/// Computes [`Estimate`]s from configuration constants
#[derive(Debug, Clone)]
pub struct DifficultyEstimator {
    addresses_per_second: f64,
    case_insensitive_alphabet: f64,
}

impl DifficultyEstimator {
    pub fn new(config: &EstimateConfig) -> Self {
        Self {
            addresses_per_second: config.addresses_per_second.max(1.0),
            case_insensitive_alphabet: config
                .case_insensitive_alphabet
                .clamp(2.0, CASE_SENSITIVE_ALPHABET),
        }
    }

    /// Effective per-character branching factor
    pub fn alphabet_size(&self, case_sensitive: bool) -> f64 {
        if case_sensitive {
            CASE_SENSITIVE_ALPHABET
        } else {
            self.case_insensitive_alphabet
        }
    }

    /// Estimate the cost of finding `spec`.
    ///
    /// Prefix and suffix are treated as independent events, so the combined
    /// length is the exponent.
    pub fn estimate(&self, spec: &PatternSpec, case_sensitive: bool) -> Estimate {
        self.estimate_len(spec.combined_len(), case_sensitive)
    }

    pub fn estimate_len(&self, combined_len: usize, case_sensitive: bool) -> Estimate {
        let expected_attempts = self
            .alphabet_size(case_sensitive)
            .powi(combined_len.min(i32::MAX as usize) as i32);
        Estimate {
            expected_attempts,
            estimated_seconds: expected_attempts / self.addresses_per_second,
        }
    }
}

impl Default for DifficultyEstimator {
    fn default() -> Self {
        Self::new(&EstimateConfig::default())
    }
}

/// Format seconds into seconds/minutes/hours/days buckets
pub fn format_duration(seconds: f64) -> String {
    const MINUTE: f64 = 60.0;
    const HOUR: f64 = 60.0 * MINUTE;
    const DAY: f64 = 24.0 * HOUR;

    if !seconds.is_finite() {
        return "an extremely long time".to_string();
    }
    if seconds < 1.0 {
        return "less than a second".to_string();
    }

    let (value, unit) = if seconds < MINUTE {
        (seconds, "second")
    } else if seconds < HOUR {
        (seconds / MINUTE, "minute")
    } else if seconds < DAY {
        (seconds / HOUR, "hour")
    } else {
        (seconds / DAY, "day")
    };

    let rounded = value.round().max(1.0) as u64;
    if rounded == 1 {
        format!("about 1 {}", unit)
    } else {
        format!("about {} {}s", rounded, unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::{validate, MatchMode};

    fn estimator(rate: f64) -> DifficultyEstimator {
        DifficultyEstimator::new(&EstimateConfig {
            addresses_per_second: rate,
            case_insensitive_alphabet: 29.0,
        })
    }

    #[test]
    fn test_expected_attempts() {
        let est = estimator(100_000.0);
        let spec = validate("AB", MatchMode::StartsWith, None, true).unwrap();
        let e = est.estimate(&spec, true);
        assert_eq!(e.expected_attempts, 58.0 * 58.0);
        assert!((e.estimated_seconds - 3364.0 / 100_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_prefix_and_suffix_multiply() {
        let est = estimator(1.0);
        let spec = validate("A,b", MatchMode::StartsAndEndsWith, None, true).unwrap();
        assert_eq!(est.estimate(&spec, true).expected_attempts, 58.0 * 58.0);
    }

    #[test]
    fn test_monotonic_in_length() {
        let est = estimator(100_000.0);
        for case_sensitive in [true, false] {
            let mut last = 0.0;
            for len in 1..=16 {
                let e = est.estimate_len(len, case_sensitive);
                assert!(e.expected_attempts > last);
                assert!(e.estimated_seconds > 0.0);
                last = e.expected_attempts;
            }
        }
    }

    #[test]
    fn test_ignoring_case_is_cheaper() {
        let est = estimator(100_000.0);
        assert!(est.estimate_len(5, false).expected_attempts < est.estimate_len(5, true).expected_attempts);
    }

    #[test]
    fn test_format_duration_buckets() {
        assert_eq!(format_duration(0.2), "less than a second");
        assert_eq!(format_duration(1.0), "about 1 second");
        assert_eq!(format_duration(42.0), "about 42 seconds");
        assert_eq!(format_duration(90.0), "about 2 minutes");
        assert_eq!(format_duration(3.0 * 3600.0), "about 3 hours");
        assert_eq!(format_duration(10.0 * 86400.0), "about 10 days");
        assert_eq!(format_duration(f64::INFINITY), "an extremely long time");
    }
}
