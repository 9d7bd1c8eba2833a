//! Parsing of proposal completions.
//!
//! Models often wrap JSON in markdown fences even when told not to; the
//! parser strips a single fenced block before deserializing. An empty or
//! unparseable payload is an invalid response, which the orchestrator
//! treats as a recoverable failure that consumes one attempt.

use sqlshadow_core::collaborators::ProposalResponse;
use sqlshadow_core::error::CollaboratorError;

/// Parse a completion into a proposal payload.
///
/// Requires at least one of `optimized_sql` / `index_ddl` to be a
/// non-empty string.
pub fn parse_proposal(content: &str) -> Result<ProposalResponse, CollaboratorError> {
    let json_str = strip_fences(content);
    let payload: ProposalResponse = serde_json::from_str(json_str)
        .map_err(|e| CollaboratorError::InvalidResponse(format!("not valid JSON: {e}")))?;

    let has_rewrite = payload
        .optimized_sql
        .as_deref()
        .is_some_and(|s| !s.trim().is_empty());
    let has_index = payload
        .index_ddl
        .as_deref()
        .is_some_and(|s| !s.trim().is_empty());
    if !has_rewrite && !has_index {
        return Err(CollaboratorError::InvalidResponse(
            "proposal contains neither optimized_sql nor index_ddl".to_string(),
        ));
    }
    Ok(payload)
}

/// Extract the contents of the first markdown code fence, if any.
fn strip_fences(content: &str) -> &str {
    let trimmed = content.trim();
    for marker in ["```json", "```"] {
        if let Some(rest) = trimmed.split_once(marker).map(|(_, rest)| rest) {
            if let Some((inner, _)) = rest.split_once("```") {
                return inner.trim();
            }
        }
    }
    trimmed
}
