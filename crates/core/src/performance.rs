//! Performance comparison between baseline and candidate timings.
//!
//! The comparator sees the full set of timing samples for each variant (the
//! warm-up run is already discarded by the sandbox). It defends against
//! measurement noise: if either side's samples spread too widely relative to
//! their median, the verdict is inconclusive rather than a pass or fail.

/// Floor applied to a median before division, so a sub-resolution candidate
/// measurement cannot produce an infinite speedup ratio.
pub const MIN_ELAPSED_MS: f64 = 0.01;

/// Outcome of a performance comparison.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PerformanceOutcome {
    /// Candidate is fast enough: `speedup_ratio >= min_speedup`.
    Pass { speedup_ratio: f64 },
    /// Candidate is equal or slower than required. Rejection, retryable.
    Regression { speedup_ratio: f64 },
    /// Timing samples too noisy to judge either way. Retryable, and
    /// reported distinctly from a regression.
    Inconclusive {
        baseline_spread: f64,
        candidate_spread: f64,
    },
}

/// Median of a sample set. Returns 0.0 for an empty set.
pub fn median(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Relative spread `(max - min) / median` of a sample set.
///
/// Returns 0.0 for fewer than two samples or a zero median.
pub fn relative_spread(samples: &[f64]) -> f64 {
    if samples.len() < 2 {
        return 0.0;
    }
    let med = median(samples);
    if med <= 0.0 {
        return 0.0;
    }
    let min = samples.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = samples.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    (max - min) / med
}

/// Compare baseline and candidate timing samples.
///
/// `baseline_ms` / `candidate_ms` are the per-run elapsed times in
/// milliseconds; the medians drive the speedup ratio.
pub fn compare(
    baseline_ms: &[f64],
    candidate_ms: &[f64],
    min_speedup: f64,
    variance_tolerance: f64,
) -> PerformanceOutcome {
    let baseline_spread = relative_spread(baseline_ms);
    let candidate_spread = relative_spread(candidate_ms);
    if baseline_spread > variance_tolerance || candidate_spread > variance_tolerance {
        return PerformanceOutcome::Inconclusive {
            baseline_spread,
            candidate_spread,
        };
    }

    let baseline_median = median(baseline_ms).max(MIN_ELAPSED_MS);
    let candidate_median = median(candidate_ms).max(MIN_ELAPSED_MS);
    let speedup_ratio = baseline_median / candidate_median;

    if speedup_ratio >= min_speedup {
        PerformanceOutcome::Pass { speedup_ratio }
    } else {
        PerformanceOutcome::Regression { speedup_ratio }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const MIN_SPEEDUP: f64 = 1.10;
    const VARIANCE_TOLERANCE: f64 = 0.5;

    // -- median --

    #[test]
    fn median_of_odd_sample_count() {
        assert!((median(&[3.0, 1.0, 2.0]) - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn median_of_even_sample_count() {
        assert!((median(&[1.0, 2.0, 3.0, 4.0]) - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn median_of_empty_is_zero() {
        assert!((median(&[]) - 0.0).abs() < f64::EPSILON);
    }

    // -- relative_spread --

    #[test]
    fn spread_of_identical_samples_is_zero() {
        assert!((relative_spread(&[10.0, 10.0, 10.0]) - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn spread_reflects_min_max_range() {
        // (15 - 5) / 10 = 1.0
        assert!((relative_spread(&[5.0, 10.0, 15.0]) - 1.0).abs() < 1e-9);
    }

    // -- compare --

    #[test]
    fn clear_improvement_passes() {
        let outcome = compare(
            &[1250.0, 1240.0, 1260.0],
            &[12.0, 12.1, 11.9],
            MIN_SPEEDUP,
            VARIANCE_TOLERANCE,
        );
        assert_matches!(outcome, PerformanceOutcome::Pass { speedup_ratio } => {
            assert!(speedup_ratio > 100.0, "expected ~104x, got {speedup_ratio}");
        });
    }

    #[test]
    fn regression_is_rejected_with_ratio() {
        // Candidate slower than baseline: 1250 / 1300 ≈ 0.96.
        let outcome = compare(
            &[1250.0, 1250.0, 1250.0],
            &[1300.0, 1300.0, 1300.0],
            MIN_SPEEDUP,
            VARIANCE_TOLERANCE,
        );
        assert_matches!(outcome, PerformanceOutcome::Regression { speedup_ratio } => {
            assert!((speedup_ratio - 0.9615).abs() < 0.001, "got {speedup_ratio}");
        });
    }

    #[test]
    fn equal_performance_is_a_regression() {
        // "Reject negative optimization": merely equal is not acceptance.
        let outcome = compare(
            &[100.0, 100.0, 100.0],
            &[100.0, 100.0, 100.0],
            MIN_SPEEDUP,
            VARIANCE_TOLERANCE,
        );
        assert_matches!(outcome, PerformanceOutcome::Regression { speedup_ratio } => {
            assert!((speedup_ratio - 1.0).abs() < f64::EPSILON);
        });
    }

    #[test]
    fn improvement_below_threshold_is_a_regression() {
        // 5% faster, threshold requires 10%.
        let outcome = compare(
            &[105.0, 105.0, 105.0],
            &[100.0, 100.0, 100.0],
            MIN_SPEEDUP,
            VARIANCE_TOLERANCE,
        );
        assert_matches!(outcome, PerformanceOutcome::Regression { .. });
    }

    #[test]
    fn noisy_candidate_is_inconclusive() {
        let outcome = compare(
            &[100.0, 100.0, 100.0],
            &[10.0, 400.0, 800.0],
            MIN_SPEEDUP,
            VARIANCE_TOLERANCE,
        );
        assert_matches!(outcome, PerformanceOutcome::Inconclusive { candidate_spread, .. } => {
            assert!(candidate_spread > VARIANCE_TOLERANCE);
        });
    }

    #[test]
    fn noisy_baseline_is_inconclusive() {
        let outcome = compare(
            &[10.0, 400.0, 800.0],
            &[100.0, 100.0, 100.0],
            MIN_SPEEDUP,
            VARIANCE_TOLERANCE,
        );
        assert_matches!(outcome, PerformanceOutcome::Inconclusive { baseline_spread, .. } => {
            assert!(baseline_spread > VARIANCE_TOLERANCE);
        });
    }

    #[test]
    fn zero_candidate_median_is_clamped() {
        let outcome = compare(
            &[100.0, 100.0, 100.0],
            &[0.0, 0.0, 0.0],
            MIN_SPEEDUP,
            VARIANCE_TOLERANCE,
        );
        assert_matches!(outcome, PerformanceOutcome::Pass { speedup_ratio } => {
            assert!(speedup_ratio.is_finite());
        });
    }
}
