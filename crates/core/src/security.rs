//! Security guard for shadow execution.
//!
//! Every statement -- the caller's original and every candidate -- passes
//! through the guard before touching the shadow environment. The guard
//! refuses mutating operations and multi-statement input, and bounds result
//! sets with a `LIMIT` when the statement has none.
//!
//! Checks run against a masked copy of the statement (literals and comments
//! blanked out), so quoted data like `'drop me a line'` cannot trip the
//! forbidden-operation rule.

use regex::Regex;

use crate::config::EngineConfig;
use crate::sqltext;

/// Why a statement was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SecurityViolation {
    #[error("forbidden operation detected: {0}")]
    ForbiddenOperation(String),

    #[error("multiple statements are not allowed")]
    MultipleStatements,

    #[error("statement is empty")]
    EmptyStatement,
}

/// Validates statements against the configured policy.
pub struct SecurityGuard {
    forbidden: Vec<(String, Regex)>,
    max_result_rows: u64,
}

impl SecurityGuard {
    pub fn new(config: &EngineConfig) -> Self {
        let forbidden = config
            .forbidden_operations
            .iter()
            .map(|op| {
                let pattern = format!(r"(?i)\b{}\b", regex::escape(op));
                let re = Regex::new(&pattern).expect("forbidden-operation pattern is valid");
                (op.clone(), re)
            })
            .collect();
        Self {
            forbidden,
            max_result_rows: config.max_result_rows,
        }
    }

    /// Check whether a statement is safe to execute in the shadow scope.
    pub fn validate(&self, sql: &str) -> Result<(), SecurityViolation> {
        let masked = sqltext::mask_literals(sql);
        let trimmed = masked.trim().trim_end_matches(';');

        if trimmed.trim().is_empty() {
            return Err(SecurityViolation::EmptyStatement);
        }
        if trimmed.contains(';') {
            return Err(SecurityViolation::MultipleStatements);
        }
        for (name, re) in &self.forbidden {
            if re.is_match(trimmed) {
                return Err(SecurityViolation::ForbiddenOperation(name.clone()));
            }
        }
        Ok(())
    }

    /// Bound the result set: append `LIMIT` when the statement has no
    /// top-level one. Returns the statement unchanged otherwise.
    pub fn enforce_limit(&self, sql: &str) -> String {
        let trimmed = sql.trim().trim_end_matches(';').trim_end();
        if sqltext::has_top_level_limit(trimmed) {
            trimmed.to_string()
        } else {
            format!("{trimmed} LIMIT {}", self.max_result_rows)
        }
    }
}
