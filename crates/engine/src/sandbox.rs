//! Shadow execution of one statement variant.
//!
//! A variant run produces everything the decision needs in a single pass:
//! timing samples (one discarded warm-up, then `timing_repeat_count` timed
//! executions), the canonical result summary, and optionally the execution
//! plan. Every statement goes through the security guard first and is
//! bounded with a `LIMIT` when it has none; every shadow call is capped by
//! the configured per-statement timeout.

use std::future::Future;
use std::time::Duration;

use sqlshadow_core::canonical::{self, CanonicalResult};
use sqlshadow_core::collaborators::ShadowExecutor;
use sqlshadow_core::config::EngineConfig;
use sqlshadow_core::error::ShadowError;
use sqlshadow_core::performance;
use sqlshadow_core::security::SecurityGuard;
use sqlshadow_core::types::Variant;
use sqlshadow_core::verdict::ShadowRunResult;

/// Cap a shadow call at the per-statement timeout.
async fn bounded<T, F>(secs: u64, call: F) -> Result<T, ShadowError>
where
    F: Future<Output = Result<T, ShadowError>>,
{
    tokio::time::timeout(Duration::from_secs(secs), call)
        .await
        .map_err(|_| ShadowError::Timeout(secs))?
}

/// Execute one variant in the shadow scope and summarize the evidence.
///
/// `ordered` must reflect whether the *original* statement fixed its row
/// order; both variants of a comparison are canonicalized under the same
/// policy. `capture_plan` additionally snapshots `EXPLAIN` output (plan
/// failures are tolerated and leave the snapshot empty).
pub async fn run_variant(
    executor: &mut dyn ShadowExecutor,
    guard: &SecurityGuard,
    config: &EngineConfig,
    variant: Variant,
    sql: &str,
    ordered: bool,
    capture_plan: bool,
) -> Result<ShadowRunResult, ShadowError> {
    guard
        .validate(sql)
        .map_err(|violation| ShadowError::Rejected(violation.to_string()))?;
    let statement = guard.enforce_limit(sql);
    let timeout_secs = config.shadow_timeout_secs;

    // Warm-up run: populates caches, its timing is discarded.
    bounded(timeout_secs, executor.run_timed(&statement)).await?;

    let mut timings_ms = Vec::with_capacity(config.timing_repeat_count as usize);
    for _ in 0..config.timing_repeat_count {
        timings_ms.push(bounded(timeout_secs, executor.run_timed(&statement)).await?);
    }
    let elapsed_ms = performance::median(&timings_ms);

    let rows = bounded(timeout_secs, executor.fetch_rows(&statement)).await?;
    let canonical: CanonicalResult =
        canonical::canonicalize(&rows, ordered, config.float_epsilon);

    let plan = if capture_plan {
        match bounded(timeout_secs, executor.explain(&statement)).await {
            Ok(plan) => Some(plan),
            Err(error) => {
                tracing::debug!(variant = variant.label(), %error, "Plan capture failed");
                None
            }
        }
    } else {
        None
    };

    tracing::debug!(
        variant = variant.label(),
        rows = canonical.row_count,
        elapsed_ms,
        "Shadow run complete"
    );

    Ok(ShadowRunResult {
        variant,
        canonical,
        elapsed_ms,
        timings_ms,
        plan,
    })
}
