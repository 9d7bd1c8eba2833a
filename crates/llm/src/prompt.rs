//! Prompt assembly for the proposal source.
//!
//! One system prompt fixes the role and the output contract; the user
//! message carries the statement, the diagnosis, and -- on retries -- the
//! previous attempt's rejection feedback. The model proposes; it never
//! verifies. Verification happens in the shadow environment, so the prompt
//! explicitly tells the model not to claim measured numbers.

use sqlshadow_core::collaborators::ProposalContext;

/// Role and output contract for every proposal call.
pub const SYSTEM_PROMPT: &str = "\
You are a senior database engineer specializing in SQL performance optimization.

You will be given one SQL statement, a structural diagnosis of its bottlenecks, \
and optionally feedback explaining why a previous proposal was rejected. \
Propose exactly one fix: either a semantically equivalent rewrite of the \
statement, or a single CREATE INDEX statement.

Rules:
- The rewrite MUST return exactly the same rows and columns as the original.
- Never propose INSERT, UPDATE, DELETE, DROP, TRUNCATE, or ALTER.
- Never propose an index that already exists; the existing index definitions \
are listed with each table.
- Do not claim measured performance numbers; your proposal will be executed \
and verified independently.
- If prior feedback is present, address it directly with a different approach.

Respond with a single JSON object and nothing else:
{\"optimized_sql\": \"...\", \"rationale\": \"...\"}
or
{\"index_ddl\": \"CREATE INDEX ...\", \"rationale\": \"...\"}";

/// Build the user message for one attempt.
pub fn user_message(context: &ProposalContext) -> String {
    let mut message = format!(
        "Optimize this SQL for {}:\n\n{}\n",
        context.dialect, context.original_sql
    );

    if context.diagnosis.issues.is_empty() {
        message.push_str("\nDiagnosis: no structural bottleneck detected.\n");
    } else {
        message.push_str("\nDiagnosis:\n");
        for issue in &context.diagnosis.issues {
            message.push_str(&format!("- {}\n", issue.description()));
        }
    }

    if !context.diagnosis.table_stats.is_empty() {
        message.push_str("\nTable statistics:\n");
        for stats in &context.diagnosis.table_stats {
            let rows = stats
                .row_count
                .map(|n| n.to_string())
                .unwrap_or_else(|| "unknown".into());
            let indexes = stats
                .index_count
                .map(|n| n.to_string())
                .unwrap_or_else(|| "unknown".into());
            message.push_str(&format!(
                "- {}: ~{rows} rows, {indexes} indexes\n",
                stats.table
            ));
            for definition in &stats.index_definitions {
                message.push_str(&format!("  existing index: {definition}\n"));
            }
        }
    }

    if let Some(feedback) = &context.prior_feedback {
        message.push_str(&format!(
            "\nAttempt {}. Your previous proposal was rejected: {feedback}\n",
            context.attempt
        ));
    }

    message
}
