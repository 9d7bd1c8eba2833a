//! Collaborator traits: the seams between the decision engine and the
//! outside world.
//!
//! The proposal source (a language model) and the shadow database are both
//! modeled as trait objects so the orchestrator can be exercised end-to-end
//! with in-memory fakes. The real implementations live in `sqlshadow-llm`
//! and `sqlshadow-db`.

use async_trait::async_trait;

use crate::diagnosis::{Diagnosis, TableStats};
use crate::error::{CollaboratorError, ShadowError};
use crate::types::Dialect;

/// Context handed to the proposal source for one attempt.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ProposalContext {
    pub original_sql: String,
    pub dialect: Dialect,
    pub diagnosis: Diagnosis,
    /// 1-based attempt number.
    pub attempt: u32,
    /// Rejection feedback from the previous attempt, if this is a retry.
    pub prior_feedback: Option<String>,
}

/// Raw payload returned by a proposal source, before validation.
///
/// Exactly one of `optimized_sql` / `index_ddl` is expected; the
/// orchestrator treats anything else as an invalid proposal.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct ProposalResponse {
    #[serde(default)]
    pub optimized_sql: Option<String>,
    #[serde(default)]
    pub index_ddl: Option<String>,
    #[serde(default)]
    pub rationale: Option<String>,
}

/// The language-model collaborator.
///
/// Inherently non-deterministic and never assumed idempotent: the
/// orchestrator absorbs that through explicit retry feedback.
#[async_trait]
pub trait ProposalSource: Send + Sync {
    async fn propose(&self, context: &ProposalContext)
        -> Result<ProposalResponse, CollaboratorError>;
}

/// A live isolation scope: one request's private view of the shadow data.
///
/// All statements executed through one executor share the scope; the scope
/// is rolled back on [`release`](Self::release). Implementations must also
/// roll back when dropped without release, so the scope can never leak.
#[async_trait]
pub trait ShadowExecutor: Send {
    /// Execute a statement for effect (DDL, savepoints), discarding rows.
    async fn execute(&mut self, sql: &str) -> Result<(), ShadowError>;

    /// Execute a statement and return its wall-clock time in milliseconds,
    /// discarding rows.
    async fn run_timed(&mut self, sql: &str) -> Result<f64, ShadowError>;

    /// Execute a statement and return its rows as JSON objects.
    async fn fetch_rows(&mut self, sql: &str) -> Result<Vec<serde_json::Value>, ShadowError>;

    /// Fetch the execution plan for a statement.
    async fn explain(&mut self, sql: &str) -> Result<serde_json::Value, ShadowError>;

    /// Row-count and size statistics for one table, `None` when unknown.
    async fn table_statistics(&mut self, table: &str)
        -> Result<Option<TableStats>, ShadowError>;

    /// Roll back and release the scope. Consumes the executor; releasing is
    /// idempotent with the drop guard.
    async fn release(self: Box<Self>) -> Result<(), ShadowError>;
}

/// The shadow database collaborator: hands out isolation scopes.
#[async_trait]
pub trait ShadowDatabase: Send + Sync {
    /// Open a fresh isolation scope for one request.
    async fn acquire(&self) -> Result<Box<dyn ShadowExecutor>, ShadowError>;

    /// Liveness probe for health reporting.
    async fn ping(&self) -> Result<(), ShadowError>;
}
