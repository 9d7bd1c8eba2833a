//! Semantic equivalence check between two canonical result summaries.
//!
//! Equivalence means: same row count, same column set, and same multiset of
//! rows under the canonicalization rules of [`crate::canonical`]. Checks run
//! cheapest-first; because the row-count check precedes the hash check, two
//! results can never be declared equivalent on a hash match alone while
//! their row counts differ (the defensive double-check from the design).

use crate::canonical::CanonicalResult;

/// Outcome of an equivalence check.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Equivalence {
    Match,
    Mismatch {
        /// Human-readable difference, used verbatim as retry feedback.
        detail: String,
    },
}

impl Equivalence {
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Match)
    }
}

/// Compare two canonical result summaries.
///
/// Deterministic: identical inputs always produce identical outcomes.
pub fn compare(baseline: &CanonicalResult, candidate: &CanonicalResult) -> Equivalence {
    if baseline.row_count != candidate.row_count {
        return Equivalence::Mismatch {
            detail: format!(
                "row count mismatch: candidate returned {} rows, baseline returned {}",
                candidate.row_count, baseline.row_count
            ),
        };
    }

    if baseline.columns != candidate.columns {
        let missing: Vec<&str> = baseline
            .columns
            .difference(&candidate.columns)
            .map(|s| s.as_str())
            .collect();
        let extra: Vec<&str> = candidate
            .columns
            .difference(&baseline.columns)
            .map(|s| s.as_str())
            .collect();
        return Equivalence::Mismatch {
            detail: format!(
                "column set mismatch: candidate is missing [{}] and adds [{}]",
                missing.join(", "),
                extra.join(", ")
            ),
        };
    }

    if baseline.hash != candidate.hash {
        return Equivalence::Mismatch {
            detail: format!(
                "result content differs despite equal row count ({} rows); canonical hashes {}… vs {}…",
                baseline.row_count,
                &baseline.hash[..12.min(baseline.hash.len())],
                &candidate.hash[..12.min(candidate.hash.len())]
            ),
        };
    }

    Equivalence::Match
}
