//! The decision orchestrator: propose, verify, decide.
//!
//! State machine for one request: diagnose, measure the baseline once, then
//! up to `max_attempts` propose/verify cycles. An attempt is accepted only
//! when the candidate's canonical result matches the baseline AND its
//! measured speedup clears the configured minimum; every rejection feeds its
//! reason back into the next proposal. The whole request runs inside one
//! isolation scope, with a savepoint per attempt so an applied index
//! proposal can never leak into later attempts.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use sqlshadow_core::collaborators::{
    ProposalContext, ProposalSource, ShadowDatabase, ShadowExecutor,
};
use sqlshadow_core::config::EngineConfig;
use sqlshadow_core::diagnosis::Diagnosis;
use sqlshadow_core::equivalence::{self, Equivalence};
use sqlshadow_core::error::{CollaboratorError, ShadowError};
use sqlshadow_core::performance::{self, PerformanceOutcome};
use sqlshadow_core::security::SecurityGuard;
use sqlshadow_core::sqltext;
use sqlshadow_core::types::{OptimizationRequest, Variant};
use sqlshadow_core::verdict::{
    Proposal, ProposalAction, RejectionReason, RequestOutcome, VerificationVerdict,
};

use crate::{diagnose, sandbox};

/// How one attempt's proposal or candidate execution failed.
enum AttemptFailure {
    /// Aborts the whole request.
    Fatal(String),
    /// Consumes the attempt; the reason becomes the next prompt's feedback.
    Rejected(RejectionReason),
}

/// Drives the verification loop for optimization requests.
pub struct Orchestrator {
    db: Arc<dyn ShadowDatabase>,
    proposals: Arc<dyn ProposalSource>,
    config: EngineConfig,
}

impl Orchestrator {
    pub fn new(
        db: Arc<dyn ShadowDatabase>,
        proposals: Arc<dyn ProposalSource>,
        config: EngineConfig,
    ) -> Self {
        Self {
            db,
            proposals,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run one request to completion.
    ///
    /// Always returns an outcome; fatal collaborator failures surface as
    /// [`sqlshadow_core::verdict::OutcomeStatus::FatalError`]. The isolation
    /// scope is released (rolled back) exactly once on every path.
    pub async fn optimize(
        &self,
        request: &OptimizationRequest,
        cancel: CancellationToken,
    ) -> RequestOutcome {
        let mut executor = match self.db.acquire().await {
            Ok(executor) => executor,
            Err(error) => {
                tracing::error!(request_id = %request.id, %error, "Could not open isolation scope");
                return RequestOutcome::fatal(
                    request.id,
                    request.sql.clone(),
                    Diagnosis::default(),
                    Vec::new(),
                    0,
                    error.to_string(),
                );
            }
        };

        let outcome = self.drive(request, &cancel, executor.as_mut()).await;

        if let Err(error) = executor.release().await {
            tracing::warn!(request_id = %request.id, %error, "Failed to release isolation scope");
        }
        outcome
    }

    async fn drive(
        &self,
        request: &OptimizationRequest,
        cancel: &CancellationToken,
        executor: &mut dyn ShadowExecutor,
    ) -> RequestOutcome {
        let guard = SecurityGuard::new(&self.config);
        if let Err(violation) = guard.validate(&request.sql) {
            return RequestOutcome::fatal(
                request.id,
                request.sql.clone(),
                Diagnosis::default(),
                Vec::new(),
                0,
                violation.to_string(),
            );
        }

        // Row order is part of correctness only when the caller asked for
        // one; the policy is fixed by the original statement for both sides.
        let ordered = sqltext::has_top_level_order_by(&request.sql);

        let diagnosis = diagnose::collect(executor, &self.config, &request.sql).await;
        tracing::info!(
            request_id = %request.id,
            issues = diagnosis.issues.len(),
            summary = %diagnosis.summary,
            "Diagnosis complete"
        );

        let baseline = match sandbox::run_variant(
            executor,
            &guard,
            &self.config,
            Variant::Original,
            &request.sql,
            ordered,
            false,
        )
        .await
        {
            Ok(baseline) => baseline,
            Err(error) => {
                tracing::error!(request_id = %request.id, %error, "Baseline execution failed");
                return RequestOutcome::fatal(
                    request.id,
                    request.sql.clone(),
                    diagnosis,
                    Vec::new(),
                    0,
                    format!("baseline execution failed: {error}"),
                );
            }
        };
        tracing::info!(
            request_id = %request.id,
            rows = baseline.row_count(),
            elapsed_ms = baseline.elapsed_ms,
            "Baseline measured"
        );

        let mut verdicts: Vec<VerificationVerdict> = Vec::new();
        let mut feedback: Option<String> = None;
        let mut attempts = 0u32;

        for attempt in 1..=self.config.max_attempts {
            if cancel.is_cancelled() {
                tracing::info!(request_id = %request.id, attempt, "Request cancelled");
                return RequestOutcome::cancelled(
                    request.id,
                    request.sql.clone(),
                    diagnosis,
                    verdicts,
                    attempts,
                );
            }

            let context = ProposalContext {
                original_sql: request.sql.clone(),
                dialect: request.dialect,
                diagnosis: diagnosis.clone(),
                attempt,
                prior_feedback: feedback.take(),
            };
            attempts = attempt;

            let proposal = match self.request_proposal(&context).await {
                Ok(proposal) => proposal,
                Err(AttemptFailure::Fatal(message)) => {
                    tracing::error!(request_id = %request.id, attempt, %message, "Proposal source failed");
                    return RequestOutcome::fatal(
                        request.id,
                        request.sql.clone(),
                        diagnosis,
                        verdicts,
                        attempts,
                        message,
                    );
                }
                Err(AttemptFailure::Rejected(reason)) => {
                    tracing::info!(request_id = %request.id, attempt, feedback = %reason.feedback(), "Proposal unusable");
                    feedback = Some(reason.feedback());
                    verdicts.push(VerificationVerdict::rejected(attempt, false, None, reason));
                    continue;
                }
            };
            tracing::info!(
                request_id = %request.id,
                attempt,
                kind = proposal.action.kind_label(),
                "Evaluating proposal"
            );

            if let Err(error) = executor
                .execute(&format!("SAVEPOINT attempt_{attempt}"))
                .await
            {
                return RequestOutcome::fatal(
                    request.id,
                    request.sql.clone(),
                    diagnosis,
                    verdicts,
                    attempts,
                    format!("could not establish attempt savepoint: {error}"),
                );
            }

            let candidate_result = self
                .run_candidate(executor, &guard, &proposal, &request.sql, ordered)
                .await;

            // Undo any attempt-local effect (an applied index) before
            // judging, so a rejected attempt leaves no trace behind.
            if let Err(error) = executor
                .execute(&format!("ROLLBACK TO SAVEPOINT attempt_{attempt}"))
                .await
            {
                return RequestOutcome::fatal(
                    request.id,
                    request.sql.clone(),
                    diagnosis,
                    verdicts,
                    attempts,
                    format!("could not roll back attempt savepoint: {error}"),
                );
            }

            let candidate = match candidate_result {
                Ok(candidate) => candidate,
                Err(AttemptFailure::Fatal(message)) => {
                    tracing::error!(request_id = %request.id, attempt, %message, "Shadow execution failed");
                    return RequestOutcome::fatal(
                        request.id,
                        request.sql.clone(),
                        diagnosis,
                        verdicts,
                        attempts,
                        message,
                    );
                }
                Err(AttemptFailure::Rejected(reason)) => {
                    tracing::info!(request_id = %request.id, attempt, feedback = %reason.feedback(), "Candidate rejected before comparison");
                    feedback = Some(reason.feedback());
                    verdicts.push(VerificationVerdict::rejected(attempt, false, None, reason));
                    continue;
                }
            };

            // Equivalence gates performance: a mismatched candidate is
            // rejected without looking at its timings.
            if let Equivalence::Mismatch { detail } =
                equivalence::compare(&baseline.canonical, &candidate.canonical)
            {
                tracing::info!(request_id = %request.id, attempt, %detail, "Semantic mismatch");
                let reason = RejectionReason::SemanticMismatch { detail };
                feedback = Some(reason.feedback());
                verdicts.push(VerificationVerdict::rejected(attempt, false, None, reason));
                continue;
            }

            match performance::compare(
                &baseline.timings_ms,
                &candidate.timings_ms,
                self.config.min_speedup,
                self.config.variance_tolerance,
            ) {
                PerformanceOutcome::Pass { speedup_ratio } => {
                    tracing::info!(
                        request_id = %request.id,
                        attempt,
                        speedup_ratio,
                        kind = proposal.action.kind_label(),
                        "Proposal accepted"
                    );
                    verdicts.push(VerificationVerdict::accepted(attempt, speedup_ratio));
                    return RequestOutcome::accepted(
                        request.id,
                        request.sql.clone(),
                        diagnosis,
                        verdicts,
                        attempts,
                        &proposal,
                        speedup_ratio,
                    );
                }
                PerformanceOutcome::Regression { speedup_ratio } => {
                    tracing::info!(request_id = %request.id, attempt, speedup_ratio, "Performance regression");
                    let reason = RejectionReason::PerformanceRegression {
                        speedup_ratio,
                        min_speedup: self.config.min_speedup,
                    };
                    feedback = Some(reason.feedback());
                    verdicts.push(VerificationVerdict::rejected(
                        attempt,
                        true,
                        Some(speedup_ratio),
                        reason,
                    ));
                }
                PerformanceOutcome::Inconclusive {
                    baseline_spread,
                    candidate_spread,
                } => {
                    tracing::info!(
                        request_id = %request.id,
                        attempt,
                        baseline_spread,
                        candidate_spread,
                        "Measurement inconclusive"
                    );
                    let reason = RejectionReason::InconclusiveMeasurement {
                        baseline_spread,
                        candidate_spread,
                    };
                    feedback = Some(reason.feedback());
                    verdicts.push(VerificationVerdict::rejected(attempt, true, None, reason));
                }
            }
        }

        tracing::info!(
            request_id = %request.id,
            attempts,
            "All attempts rejected; keeping the original statement"
        );
        RequestOutcome::exhausted(request.id, request.sql.clone(), diagnosis, verdicts, attempts)
    }

    /// Ask the proposal source for one candidate and validate its shape.
    async fn request_proposal(
        &self,
        context: &ProposalContext,
    ) -> Result<Proposal, AttemptFailure> {
        let deadline = Duration::from_secs(self.config.proposal_timeout_secs);
        let response = match tokio::time::timeout(deadline, self.proposals.propose(context)).await
        {
            Ok(Ok(response)) => response,
            Ok(Err(CollaboratorError::Unavailable(message))) => {
                return Err(AttemptFailure::Fatal(format!(
                    "proposal source unavailable: {message}"
                )));
            }
            Ok(Err(CollaboratorError::InvalidResponse(detail))) => {
                return Err(AttemptFailure::Rejected(RejectionReason::ProposalInvalid {
                    detail,
                }));
            }
            Ok(Err(CollaboratorError::Timeout(seconds))) => {
                return Err(AttemptFailure::Rejected(RejectionReason::Timeout {
                    operation: "proposal generation".to_string(),
                    seconds,
                }));
            }
            Err(_) => {
                return Err(AttemptFailure::Rejected(RejectionReason::Timeout {
                    operation: "proposal generation".to_string(),
                    seconds: self.config.proposal_timeout_secs,
                }));
            }
        };

        let optimized_sql = response
            .optimized_sql
            .filter(|sql| !sql.trim().is_empty());
        let index_ddl = response.index_ddl.filter(|ddl| !ddl.trim().is_empty());
        let action = match (optimized_sql, index_ddl) {
            (Some(sql), _) => ProposalAction::Rewrite(sql),
            (None, Some(ddl)) => ProposalAction::CreateIndex(ddl),
            (None, None) => {
                return Err(AttemptFailure::Rejected(RejectionReason::ProposalInvalid {
                    detail: "proposal contains neither a rewrite nor index DDL".to_string(),
                }));
            }
        };

        if let ProposalAction::Rewrite(sql) = &action {
            if normalized(sql) == normalized(&context.original_sql) {
                return Err(AttemptFailure::Rejected(RejectionReason::ProposalInvalid {
                    detail: "rewrite is identical to the original statement".to_string(),
                }));
            }
        }

        Ok(Proposal {
            attempt: context.attempt,
            action,
            rationale: response.rationale.unwrap_or_default(),
        })
    }

    /// Execute the candidate side of one attempt.
    ///
    /// An index proposal applies its DDL inside the attempt savepoint, then
    /// re-measures the original statement against it.
    async fn run_candidate(
        &self,
        executor: &mut dyn ShadowExecutor,
        guard: &SecurityGuard,
        proposal: &Proposal,
        original_sql: &str,
        ordered: bool,
    ) -> Result<sqlshadow_core::verdict::ShadowRunResult, AttemptFailure> {
        let candidate_sql = match &proposal.action {
            ProposalAction::Rewrite(sql) => sql.as_str(),
            ProposalAction::CreateIndex(ddl) => {
                guard.validate(ddl).map_err(|violation| {
                    AttemptFailure::Rejected(RejectionReason::ProposalInvalid {
                        detail: violation.to_string(),
                    })
                })?;
                let deadline = Duration::from_secs(self.config.shadow_timeout_secs);
                match tokio::time::timeout(deadline, executor.execute(ddl)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(error)) => return Err(candidate_failure(error)),
                    Err(_) => {
                        return Err(AttemptFailure::Rejected(RejectionReason::Timeout {
                            operation: "index creation".to_string(),
                            seconds: self.config.shadow_timeout_secs,
                        }));
                    }
                }
                original_sql
            }
        };

        sandbox::run_variant(
            executor,
            guard,
            &self.config,
            Variant::Candidate,
            candidate_sql,
            ordered,
            true,
        )
        .await
        .map_err(candidate_failure)
    }
}

/// Map a shadow failure during candidate execution to its attempt outcome.
fn candidate_failure(error: ShadowError) -> AttemptFailure {
    match error {
        ShadowError::Unavailable(message) => {
            AttemptFailure::Fatal(format!("shadow database unavailable: {message}"))
        }
        ShadowError::Timeout(seconds) => AttemptFailure::Rejected(RejectionReason::Timeout {
            operation: "shadow execution".to_string(),
            seconds,
        }),
        ShadowError::Rejected(detail) => {
            AttemptFailure::Rejected(RejectionReason::ProposalInvalid { detail })
        }
        ShadowError::Statement(message) => {
            AttemptFailure::Rejected(RejectionReason::ExecutionError { message })
        }
    }
}

/// Statement text normalized for the identical-rewrite check.
fn normalized(sql: &str) -> String {
    sql.trim().trim_end_matches(';').trim_end().to_string()
}
