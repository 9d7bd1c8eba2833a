//! Verdict and outcome types for the verification loop.
//!
//! A [`Proposal`] is one candidate fix, a [`ShadowRunResult`] is the
//! evidence from executing one variant, a [`VerificationVerdict`] is the
//! judgment for one attempt, and a [`RequestOutcome`] is the final answer
//! for the whole request. A proposal is never surfaced unless its verdict
//! has `accepted = true`.

use uuid::Uuid;

use crate::canonical::CanonicalResult;
use crate::diagnosis::Diagnosis;
use crate::types::Variant;

/// What a proposal asks to change.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "kind", content = "sql", rename_all = "snake_case")]
pub enum ProposalAction {
    /// Replace the statement with a rewritten one.
    Rewrite(String),
    /// Create an index; the original statement is re-measured against it.
    CreateIndex(String),
}

impl ProposalAction {
    /// The SQL text carried by this action.
    pub fn sql(&self) -> &str {
        match self {
            Self::Rewrite(sql) | Self::CreateIndex(sql) => sql,
        }
    }

    pub fn kind_label(&self) -> &'static str {
        match self {
            Self::Rewrite(_) => "rewrite",
            Self::CreateIndex(_) => "create_index",
        }
    }
}

/// One candidate fix, owned by the attempt that produced it.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Proposal {
    /// 1-based attempt number.
    pub attempt: u32,
    pub action: ProposalAction,
    /// The proposal source's explanation of the change.
    pub rationale: String,
}

/// Outcome of executing one variant in the shadow environment.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ShadowRunResult {
    pub variant: Variant,
    /// Canonical summary of the result set (count, columns, hash).
    pub canonical: CanonicalResult,
    /// Median of the timed runs, milliseconds.
    pub elapsed_ms: f64,
    /// All timed samples (warm-up already discarded).
    pub timings_ms: Vec<f64>,
    /// Execution plan snapshot, when retrievable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<serde_json::Value>,
}

impl ShadowRunResult {
    pub fn row_count(&self) -> usize {
        self.canonical.row_count
    }
}

/// Why an attempt was rejected. Every variant is retryable; the distinction
/// between them drives the feedback handed to the next proposal.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectionReason {
    /// The proposal source returned something unusable.
    ProposalInvalid { detail: String },
    /// The candidate failed to execute.
    ExecutionError { message: String },
    /// A shadow execution or proposal call exceeded its deadline.
    Timeout { operation: String, seconds: u64 },
    /// The candidate's result set differs from the baseline's.
    SemanticMismatch { detail: String },
    /// The candidate is not fast enough (or is slower).
    PerformanceRegression { speedup_ratio: f64, min_speedup: f64 },
    /// Timing samples were too noisy to judge.
    InconclusiveMeasurement {
        baseline_spread: f64,
        candidate_spread: f64,
    },
}

impl RejectionReason {
    /// The feedback line handed to the proposal source on the next attempt.
    pub fn feedback(&self) -> String {
        match self {
            Self::ProposalInvalid { detail } => {
                format!("previous response was not a usable proposal: {detail}")
            }
            Self::ExecutionError { message } => {
                format!("candidate failed to execute: {message}")
            }
            Self::Timeout { operation, seconds } => {
                format!("{operation} timed out after {seconds}s; try a cheaper approach")
            }
            Self::SemanticMismatch { detail } => {
                format!("candidate is not semantically equivalent: {detail}")
            }
            Self::PerformanceRegression {
                speedup_ratio,
                min_speedup,
            } => format!(
                "candidate regressed: speedup ratio {speedup_ratio:.2} is below the required minimum {min_speedup:.2}"
            ),
            Self::InconclusiveMeasurement {
                baseline_spread,
                candidate_spread,
            } => format!(
                "timing was too noisy to judge (relative spread: baseline {baseline_spread:.2}, candidate {candidate_spread:.2}); try a structurally different rewrite"
            ),
        }
    }
}

/// Final judgment for one attempt.
#[derive(Debug, Clone, serde::Serialize)]
pub struct VerificationVerdict {
    /// 1-based attempt number this verdict belongs to.
    pub attempt: u32,
    /// Whether the candidate's result set matched the baseline's. `false`
    /// when the candidate never produced a comparable result.
    pub semantic_match: bool,
    /// Measured speedup ratio, when both variants were timed conclusively.
    pub speedup_ratio: Option<f64>,
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection: Option<RejectionReason>,
}

impl VerificationVerdict {
    /// An accepting verdict. Valid only with a semantic match and a ratio
    /// above the configured minimum.
    pub fn accepted(attempt: u32, speedup_ratio: f64) -> Self {
        Self {
            attempt,
            semantic_match: true,
            speedup_ratio: Some(speedup_ratio),
            accepted: true,
            rejection: None,
        }
    }

    /// A rejecting verdict carrying its reason.
    pub fn rejected(
        attempt: u32,
        semantic_match: bool,
        speedup_ratio: Option<f64>,
        reason: RejectionReason,
    ) -> Self {
        Self {
            attempt,
            semantic_match,
            speedup_ratio,
            accepted: false,
            rejection: Some(reason),
        }
    }
}

/// Overall status of a finished request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// A candidate passed both checks and is safe to recommend.
    Accepted,
    /// All attempts were rejected; the original statement stands.
    Exhausted,
    /// The caller cancelled before completion.
    Cancelled,
    /// A collaborator failed unrecoverably.
    FatalError,
}

/// Final answer for one optimization request.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RequestOutcome {
    pub request_id: Uuid,
    pub original_sql: String,
    pub status: OutcomeStatus,
    /// The accepted rewrite. `None` unless `status` is `Accepted` and the
    /// winning proposal was a rewrite.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimized_sql: Option<String>,
    /// The accepted index DDL, for index proposals.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_ddl: Option<String>,
    /// The winning proposal's rationale.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    /// Speedup of the accepted candidate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speedup_ratio: Option<f64>,
    pub diagnosis: Diagnosis,
    /// Verdict trail, one entry per attempt that produced a judgment.
    pub verdicts: Vec<VerificationVerdict>,
    /// Number of proposals actually requested.
    pub attempts: u32,
    /// Fatal error detail; set only for `FatalError`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RequestOutcome {
    /// Build an accepting outcome from the winning proposal and its verdict.
    pub fn accepted(
        request_id: Uuid,
        original_sql: String,
        diagnosis: Diagnosis,
        verdicts: Vec<VerificationVerdict>,
        attempts: u32,
        proposal: &Proposal,
        speedup_ratio: f64,
    ) -> Self {
        let (optimized_sql, index_ddl) = match &proposal.action {
            ProposalAction::Rewrite(sql) => (Some(sql.clone()), None),
            ProposalAction::CreateIndex(ddl) => (None, Some(ddl.clone())),
        };
        Self {
            request_id,
            original_sql,
            status: OutcomeStatus::Accepted,
            optimized_sql,
            index_ddl,
            rationale: Some(proposal.rationale.clone()),
            speedup_ratio: Some(speedup_ratio),
            diagnosis,
            verdicts,
            attempts,
            error: None,
        }
    }

    /// All attempts rejected: the original statement is returned unchanged.
    pub fn exhausted(
        request_id: Uuid,
        original_sql: String,
        diagnosis: Diagnosis,
        verdicts: Vec<VerificationVerdict>,
        attempts: u32,
    ) -> Self {
        Self {
            request_id,
            original_sql,
            status: OutcomeStatus::Exhausted,
            optimized_sql: None,
            index_ddl: None,
            rationale: None,
            speedup_ratio: None,
            diagnosis,
            verdicts,
            attempts,
            error: None,
        }
    }

    pub fn cancelled(
        request_id: Uuid,
        original_sql: String,
        diagnosis: Diagnosis,
        verdicts: Vec<VerificationVerdict>,
        attempts: u32,
    ) -> Self {
        Self {
            request_id,
            original_sql,
            status: OutcomeStatus::Cancelled,
            optimized_sql: None,
            index_ddl: None,
            rationale: None,
            speedup_ratio: None,
            diagnosis,
            verdicts,
            attempts,
            error: None,
        }
    }

    pub fn fatal(
        request_id: Uuid,
        original_sql: String,
        diagnosis: Diagnosis,
        verdicts: Vec<VerificationVerdict>,
        attempts: u32,
        error: String,
    ) -> Self {
        Self {
            request_id,
            original_sql,
            status: OutcomeStatus::FatalError,
            optimized_sql: None,
            index_ddl: None,
            rationale: None,
            speedup_ratio: None,
            diagnosis,
            verdicts,
            attempts,
            error: Some(error),
        }
    }

    /// Whether a verified optimization is being recommended.
    pub fn verified(&self) -> bool {
        self.status == OutcomeStatus::Accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feedback_mentions_row_counts() {
        let reason = RejectionReason::SemanticMismatch {
            detail: "row count mismatch: candidate returned 498 rows, baseline returned 500"
                .to_string(),
        };
        let feedback = reason.feedback();
        assert!(feedback.contains("498"));
        assert!(feedback.contains("500"));
    }

    #[test]
    fn feedback_mentions_measured_ratio() {
        let reason = RejectionReason::PerformanceRegression {
            speedup_ratio: 0.96,
            min_speedup: 1.10,
        };
        let feedback = reason.feedback();
        assert!(feedback.contains("0.96"));
        assert!(feedback.contains("1.10"));
    }

    #[test]
    fn accepted_verdict_has_match_and_ratio() {
        let verdict = VerificationVerdict::accepted(1, 104.2);
        assert!(verdict.accepted);
        assert!(verdict.semantic_match);
        assert!(verdict.rejection.is_none());
        assert!(verdict.speedup_ratio.unwrap() > 1.0);
    }

    #[test]
    fn non_accepted_outcomes_never_carry_a_recommendation() {
        let exhausted = RequestOutcome::exhausted(
            Uuid::new_v4(),
            "SELECT 1".into(),
            Diagnosis::default(),
            vec![],
            3,
        );
        assert!(exhausted.optimized_sql.is_none());
        assert!(exhausted.index_ddl.is_none());
        assert!(!exhausted.verified());

        let fatal = RequestOutcome::fatal(
            Uuid::new_v4(),
            "SELECT 1".into(),
            Diagnosis::default(),
            vec![],
            0,
            "db down".into(),
        );
        assert!(fatal.optimized_sql.is_none());
        assert_eq!(fatal.status, OutcomeStatus::FatalError);
    }

    #[test]
    fn accepted_outcome_carries_the_rewrite() {
        let proposal = Proposal {
            attempt: 1,
            action: ProposalAction::Rewrite("SELECT id FROM t".into()),
            rationale: "narrower projection".into(),
        };
        let outcome = RequestOutcome::accepted(
            Uuid::new_v4(),
            "SELECT * FROM t".into(),
            Diagnosis::default(),
            vec![VerificationVerdict::accepted(1, 2.0)],
            1,
            &proposal,
            2.0,
        );
        assert_eq!(outcome.optimized_sql.as_deref(), Some("SELECT id FROM t"));
        assert!(outcome.verified());
        assert_eq!(outcome.status, OutcomeStatus::Accepted);
    }

    #[test]
    fn statuses_serialize_snake_case() {
        assert_eq!(
            serde_json::to_value(OutcomeStatus::FatalError).unwrap(),
            serde_json::json!("fatal_error")
        );
        assert_eq!(
            serde_json::to_value(OutcomeStatus::Exhausted).unwrap(),
            serde_json::json!("exhausted")
        );
    }
}
