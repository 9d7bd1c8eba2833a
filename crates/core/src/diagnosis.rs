//! Structural bottleneck diagnosis.
//!
//! A fixed rule set classifies issues from the statement text and its
//! execution plan. The output is advisory: it feeds the proposal prompt and
//! the user-facing explanation, but never the accept/reject decision.

use std::sync::OnceLock;

use regex::Regex;

use crate::sqltext;

/// A detected structural issue, tagged for the proposal prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosisIssue {
    /// Sequential scan over a large table.
    FullScan,
    /// A filtered sequential scan with no usable index.
    MissingIndex,
    /// A predicate wraps a column in a function call, defeating index use.
    FunctionOnIndexedColumn,
    /// A predicate shape the planner cannot turn into an index range.
    NonSargablePredicate,
    /// `SELECT *` retrieves columns the caller may not need.
    SelectStar,
    /// `LIKE '%…'` with a leading wildcard forces a scan.
    LeadingWildcardLike,
    /// Top-level `OR` across predicates often beats an index; `UNION` of
    /// two indexed branches may not.
    OrInsteadOfUnion,
    /// Comma-separated FROM list, prone to accidental cross joins.
    CartesianJoin,
}

impl DiagnosisIssue {
    /// Short human-readable description, used in summaries and prompts.
    pub fn description(self) -> &'static str {
        match self {
            Self::FullScan => "sequential scan over a large table",
            Self::MissingIndex => "filtered scan with no usable index",
            Self::FunctionOnIndexedColumn => "predicate applies a function to a column",
            Self::NonSargablePredicate => "predicate shape prevents index range access",
            Self::SelectStar => "SELECT * fetches all columns",
            Self::LeadingWildcardLike => "LIKE pattern with a leading wildcard",
            Self::OrInsteadOfUnion => "OR across predicates may defeat index usage",
            Self::CartesianJoin => "comma join risks a cartesian product",
        }
    }
}

/// Row-count and size statistics for one referenced table.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct TableStats {
    pub table: String,
    /// Planner's row estimate; `None` when the table is unknown.
    pub row_count: Option<i64>,
    pub total_bytes: Option<i64>,
    pub index_count: Option<i64>,
    /// Full definitions of the table's existing indexes, so a proposal can
    /// avoid recreating one.
    pub index_definitions: Vec<String>,
}

/// Structured bottleneck analysis for one request.
///
/// Computed once per request and read-only afterward.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct Diagnosis {
    /// Detected issues in rule-evaluation order, deduplicated.
    pub issues: Vec<DiagnosisIssue>,
    /// Free-text summary of the issues.
    pub summary: String,
    /// `EXPLAIN (FORMAT JSON)` snapshot of the original statement, when
    /// available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<serde_json::Value>,
    /// Statistics for the tables the statement references.
    pub table_stats: Vec<TableStats>,
}

/// Build a diagnosis from the statement text, an optional plan snapshot,
/// and table statistics.
pub fn build(
    sql: &str,
    plan: Option<serde_json::Value>,
    table_stats: Vec<TableStats>,
    full_scan_row_threshold: i64,
) -> Diagnosis {
    let mut issues = sql_issues(sql);
    if let Some(plan_value) = &plan {
        for issue in plan_issues(plan_value, &table_stats, full_scan_row_threshold) {
            push_unique(&mut issues, issue);
        }
    }

    let summary = if issues.is_empty() {
        "no structural bottleneck detected".to_string()
    } else {
        issues
            .iter()
            .map(|i| i.description())
            .collect::<Vec<_>>()
            .join("; ")
    };

    Diagnosis {
        issues,
        summary,
        plan,
        table_stats,
    }
}

/// Issues detectable from the statement text alone.
pub fn sql_issues(sql: &str) -> Vec<DiagnosisIssue> {
    static SELECT_STAR_RE: OnceLock<Regex> = OnceLock::new();
    static FUNCTION_ON_COLUMN_RE: OnceLock<Regex> = OnceLock::new();
    static LEADING_WILDCARD_RE: OnceLock<Regex> = OnceLock::new();
    static OR_RE: OnceLock<Regex> = OnceLock::new();
    static COMMA_JOIN_RE: OnceLock<Regex> = OnceLock::new();

    let select_star = SELECT_STAR_RE
        .get_or_init(|| Regex::new(r"(?i)\bselect\s+\*").expect("valid regex"));
    let function_on_column = FUNCTION_ON_COLUMN_RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(date|year|month|day|upper|lower|substr|substring|trim|cast|coalesce|to_char|abs|round)\s*\(\s*[a-z_][a-z0-9_.]*\s*[,)]",
        )
        .expect("valid regex")
    });
    let leading_wildcard =
        LEADING_WILDCARD_RE.get_or_init(|| Regex::new(r"(?i)\blike\s+'%").expect("valid regex"));
    let or_predicate = OR_RE.get_or_init(|| Regex::new(r"(?i)\bor\b").expect("valid regex"));
    let comma_join = COMMA_JOIN_RE.get_or_init(|| {
        Regex::new(r"(?i)\bfrom\s+[a-z_][a-z0-9_.]*(?:\s+(?:as\s+)?[a-z_][a-z0-9_]*)?\s*,")
            .expect("valid regex")
    });

    let masked = sqltext::mask_literals(sql);
    let where_clause = where_slice(&masked);

    let mut issues = Vec::new();
    if select_star.is_match(&masked) {
        push_unique(&mut issues, DiagnosisIssue::SelectStar);
    }
    if let Some(clause) = where_clause {
        if function_on_column.is_match(clause) {
            push_unique(&mut issues, DiagnosisIssue::FunctionOnIndexedColumn);
            push_unique(&mut issues, DiagnosisIssue::NonSargablePredicate);
        }
        if or_predicate.is_match(clause) {
            push_unique(&mut issues, DiagnosisIssue::OrInsteadOfUnion);
        }
    }
    // Pattern literals are masked out, so this rule inspects the raw text.
    if leading_wildcard.is_match(sql) {
        push_unique(&mut issues, DiagnosisIssue::LeadingWildcardLike);
        push_unique(&mut issues, DiagnosisIssue::NonSargablePredicate);
    }
    if comma_join.is_match(&masked) {
        push_unique(&mut issues, DiagnosisIssue::CartesianJoin);
    }
    issues
}

/// Issues detectable from a Postgres `EXPLAIN (FORMAT JSON)` snapshot.
///
/// A sequential scan is tagged as a full scan when the table's row estimate
/// is above the threshold, or when the estimate is unknown (the advisory
/// bias is towards reporting).
pub fn plan_issues(
    plan: &serde_json::Value,
    table_stats: &[TableStats],
    full_scan_row_threshold: i64,
) -> Vec<DiagnosisIssue> {
    let mut issues = Vec::new();
    let mut nodes = Vec::new();
    collect_plan_nodes(plan, &mut nodes);

    for node in nodes {
        if node.get("Node Type").and_then(|v| v.as_str()) != Some("Seq Scan") {
            continue;
        }
        let relation = node.get("Relation Name").and_then(|v| v.as_str());
        let row_count = relation.and_then(|name| {
            table_stats
                .iter()
                .find(|s| s.table == name)
                .and_then(|s| s.row_count)
        });
        match row_count {
            Some(count) if count < full_scan_row_threshold => {}
            _ => push_unique(&mut issues, DiagnosisIssue::FullScan),
        }
        if node.get("Filter").is_some() {
            push_unique(&mut issues, DiagnosisIssue::MissingIndex);
        }
    }
    issues
}

/// Slice of the masked statement from its first top-level `WHERE` onward.
fn where_slice(masked: &str) -> Option<&str> {
    let lower = masked.to_ascii_lowercase();
    let bytes = lower.as_bytes();
    let mut depth = 0i32;
    for i in 0..bytes.len() {
        match bytes[i] {
            b'(' => depth += 1,
            b')' => depth = depth.saturating_sub(1),
            b'w' if depth == 0 => {
                let boundary_before = i == 0
                    || !(bytes[i - 1].is_ascii_alphanumeric() || bytes[i - 1] == b'_');
                if boundary_before && lower[i..].starts_with("where") {
                    let after = i + 5;
                    if after == bytes.len()
                        || !(bytes[after].is_ascii_alphanumeric() || bytes[after] == b'_')
                    {
                        return Some(&masked[i..]);
                    }
                }
            }
            _ => {}
        }
    }
    None
}

/// Walk a Postgres explain tree, collecting every plan node.
fn collect_plan_nodes<'a>(
    value: &'a serde_json::Value,
    out: &mut Vec<&'a serde_json::Map<String, serde_json::Value>>,
) {
    match value {
        serde_json::Value::Array(items) => {
            for item in items {
                collect_plan_nodes(item, out);
            }
        }
        serde_json::Value::Object(map) => {
            if map.contains_key("Node Type") {
                out.push(map);
            }
            if let Some(plan) = map.get("Plan") {
                collect_plan_nodes(plan, out);
            }
            if let Some(children) = map.get("Plans") {
                collect_plan_nodes(children, out);
            }
        }
        _ => {}
    }
}

fn push_unique(issues: &mut Vec<DiagnosisIssue>, issue: DiagnosisIssue) {
    if !issues.contains(&issue) {
        issues.push(issue);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const THRESHOLD: i64 = 10_000;

    // -- sql_issues --

    #[test]
    fn detects_select_star() {
        assert!(sql_issues("SELECT * FROM orders").contains(&DiagnosisIssue::SelectStar));
        assert!(!sql_issues("SELECT id FROM orders").contains(&DiagnosisIssue::SelectStar));
    }

    #[test]
    fn detects_function_wrapped_predicate() {
        let issues = sql_issues("SELECT id FROM orders WHERE DATE(created_at) = '2023-01-01'");
        assert!(issues.contains(&DiagnosisIssue::FunctionOnIndexedColumn));
        assert!(issues.contains(&DiagnosisIssue::NonSargablePredicate));
    }

    #[test]
    fn function_in_select_list_is_not_flagged() {
        let issues = sql_issues("SELECT UPPER(name) FROM customers");
        assert!(!issues.contains(&DiagnosisIssue::FunctionOnIndexedColumn));
    }

    #[test]
    fn detects_leading_wildcard_like() {
        let issues = sql_issues("SELECT id FROM customers WHERE name LIKE '%smith'");
        assert!(issues.contains(&DiagnosisIssue::LeadingWildcardLike));
        assert!(issues.contains(&DiagnosisIssue::NonSargablePredicate));
    }

    #[test]
    fn trailing_wildcard_like_is_fine() {
        let issues = sql_issues("SELECT id FROM customers WHERE name LIKE 'smith%'");
        assert!(!issues.contains(&DiagnosisIssue::LeadingWildcardLike));
    }

    #[test]
    fn detects_or_predicate() {
        let issues = sql_issues("SELECT id FROM orders WHERE status = 'open' OR total > 100");
        assert!(issues.contains(&DiagnosisIssue::OrInsteadOfUnion));
    }

    #[test]
    fn or_inside_string_literal_is_ignored() {
        let issues = sql_issues("SELECT id FROM orders WHERE note = 'this or that'");
        assert!(!issues.contains(&DiagnosisIssue::OrInsteadOfUnion));
    }

    #[test]
    fn detects_comma_join() {
        let issues = sql_issues("SELECT * FROM orders o, customers c WHERE o.customer_id = c.id");
        assert!(issues.contains(&DiagnosisIssue::CartesianJoin));
    }

    // -- plan_issues --

    fn seq_scan_plan(relation: &str, with_filter: bool) -> serde_json::Value {
        let mut node = json!({
            "Node Type": "Seq Scan",
            "Relation Name": relation,
        });
        if with_filter {
            node["Filter"] = json!("(status = 'open')");
        }
        json!([{ "Plan": node }])
    }

    fn stats(table: &str, row_count: i64) -> TableStats {
        TableStats {
            table: table.to_string(),
            row_count: Some(row_count),
            total_bytes: None,
            index_count: None,
            index_definitions: Vec::new(),
        }
    }

    #[test]
    fn large_seq_scan_is_full_scan() {
        let issues = plan_issues(
            &seq_scan_plan("orders", false),
            &[stats("orders", 500_000)],
            THRESHOLD,
        );
        assert!(issues.contains(&DiagnosisIssue::FullScan));
    }

    #[test]
    fn small_seq_scan_is_not_full_scan() {
        let issues = plan_issues(
            &seq_scan_plan("lookup", false),
            &[stats("lookup", 40)],
            THRESHOLD,
        );
        assert!(!issues.contains(&DiagnosisIssue::FullScan));
    }

    #[test]
    fn unknown_row_count_is_reported() {
        let issues = plan_issues(&seq_scan_plan("orders", false), &[], THRESHOLD);
        assert!(issues.contains(&DiagnosisIssue::FullScan));
    }

    #[test]
    fn filtered_seq_scan_suggests_missing_index() {
        let issues = plan_issues(
            &seq_scan_plan("orders", true),
            &[stats("orders", 500_000)],
            THRESHOLD,
        );
        assert!(issues.contains(&DiagnosisIssue::MissingIndex));
    }

    #[test]
    fn nested_plan_nodes_are_walked() {
        let plan = json!([{
            "Plan": {
                "Node Type": "Hash Join",
                "Plans": [
                    { "Node Type": "Seq Scan", "Relation Name": "orders", "Filter": "x" },
                    { "Node Type": "Index Scan", "Relation Name": "customers" }
                ]
            }
        }]);
        let issues = plan_issues(&plan, &[stats("orders", 500_000)], THRESHOLD);
        assert!(issues.contains(&DiagnosisIssue::FullScan));
        assert!(issues.contains(&DiagnosisIssue::MissingIndex));
    }

    // -- build --

    #[test]
    fn build_merges_sql_and_plan_issues_without_duplicates() {
        let diagnosis = build(
            "SELECT * FROM orders WHERE DATE(created_at) = '2023-01-01'",
            Some(seq_scan_plan("orders", true)),
            vec![stats("orders", 500_000)],
            THRESHOLD,
        );
        assert!(diagnosis.issues.contains(&DiagnosisIssue::SelectStar));
        assert!(diagnosis.issues.contains(&DiagnosisIssue::FullScan));
        assert!(diagnosis.issues.contains(&DiagnosisIssue::MissingIndex));
        // No duplicates.
        let mut dedup = diagnosis.issues.clone();
        dedup.dedup();
        assert_eq!(dedup.len(), diagnosis.issues.len());
        assert!(!diagnosis.summary.is_empty());
    }

    #[test]
    fn clean_statement_yields_empty_diagnosis() {
        let diagnosis = build("SELECT id FROM orders WHERE id = 1", None, vec![], THRESHOLD);
        assert!(diagnosis.issues.is_empty());
        assert!(diagnosis.summary.contains("no structural bottleneck"));
    }
}
