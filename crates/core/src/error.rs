//! Error taxonomy shared across the verification engine.
//!
//! Two layers: [`CollaboratorError`] for the external proposal source and
//! database transport, [`ShadowError`] for statement-level failures inside
//! the shadow environment. Per-attempt rejection evidence lives in
//! [`crate::verdict::RejectionReason`], which is data, not an error type.

/// Failure of an external collaborator (proposal source or shadow database
/// transport).
#[derive(Debug, thiserror::Error)]
pub enum CollaboratorError {
    /// The collaborator could not be reached at all. Fatal for the whole
    /// request; the core never retries these.
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),

    /// The collaborator answered with something unusable (malformed or
    /// empty). Recoverable; consumes one attempt.
    #[error("invalid collaborator response: {0}")]
    InvalidResponse(String),

    /// The call exceeded its configured deadline. Recoverable.
    #[error("collaborator call timed out after {0}s")]
    Timeout(u64),
}

/// Failure executing a statement in the shadow environment.
#[derive(Debug, thiserror::Error)]
pub enum ShadowError {
    /// The statement itself failed (syntax, permission, missing relation).
    #[error("statement failed: {0}")]
    Statement(String),

    /// The execution exceeded the configured shadow timeout.
    #[error("shadow execution timed out after {0}s")]
    Timeout(u64),

    /// The statement was refused by the security guard before execution.
    #[error("statement rejected: {0}")]
    Rejected(String),

    /// The shadow database itself is unreachable or the isolation scope
    /// could not be established. Fatal for the whole request.
    #[error("shadow database unavailable: {0}")]
    Unavailable(String),
}

impl ShadowError {
    /// Whether this failure aborts the whole request rather than the
    /// current attempt.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}
