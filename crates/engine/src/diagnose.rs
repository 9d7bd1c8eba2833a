//! Diagnosis collection against the shadow scope.
//!
//! Gathers the raw evidence (execution plan, table statistics) and folds it
//! through the core rule set. Diagnosis is advisory only, so every failure
//! here degrades to a thinner diagnosis instead of failing the request.

use std::time::Duration;

use sqlshadow_core::collaborators::ShadowExecutor;
use sqlshadow_core::config::EngineConfig;
use sqlshadow_core::diagnosis::{self, Diagnosis, TableStats};
use sqlshadow_core::sqltext;

/// Diagnose the original statement: plan snapshot, statistics for every
/// referenced table, and the structural rule set.
pub async fn collect(
    executor: &mut dyn ShadowExecutor,
    config: &EngineConfig,
    sql: &str,
) -> Diagnosis {
    let timeout = Duration::from_secs(config.shadow_timeout_secs);

    let plan = match tokio::time::timeout(timeout, executor.explain(sql)).await {
        Ok(Ok(plan)) => Some(plan),
        Ok(Err(error)) => {
            tracing::warn!(%error, "Could not capture execution plan for diagnosis");
            None
        }
        Err(_) => {
            tracing::warn!("Execution plan capture timed out during diagnosis");
            None
        }
    };

    let mut table_stats: Vec<TableStats> = Vec::new();
    for table in sqltext::referenced_tables(sql) {
        match tokio::time::timeout(timeout, executor.table_statistics(&table)).await {
            Ok(Ok(Some(stats))) => table_stats.push(stats),
            Ok(Ok(None)) => {}
            Ok(Err(error)) => {
                tracing::warn!(table, %error, "Could not fetch table statistics");
            }
            Err(_) => {
                tracing::warn!(table, "Table statistics lookup timed out");
            }
        }
    }

    diagnosis::build(sql, plan, table_stats, config.full_scan_row_threshold)
}
