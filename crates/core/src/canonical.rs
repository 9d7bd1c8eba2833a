//! Result-set canonicalization and hashing.
//!
//! Shadow runs never retain raw rows: each result set is reduced to a
//! [`CanonicalResult`] -- row count, column set, and a SHA-256 digest over a
//! canonical encoding -- which is all the equivalence checker needs.
//!
//! Canonicalization rules:
//! - each row encodes its fields sorted by column name;
//! - floating-point values are snapped to a configurable epsilon grid so
//!   rewrites that reorder float aggregation still hash equal;
//! - queries with a top-level `ORDER BY` preserve row order (order is part
//!   of correctness); unordered queries sort the encoded rows first.

use std::collections::BTreeSet;

use sha2::{Digest, Sha256};

/// Separator between fields within one encoded row (ASCII unit separator).
const FIELD_SEP: u8 = 0x1f;
/// Separator between encoded rows (ASCII record separator).
const ROW_SEP: u8 = 0x1e;

/// Canonical summary of one result set.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct CanonicalResult {
    /// Number of rows returned.
    pub row_count: usize,
    /// Union of column names across all rows, sorted.
    pub columns: BTreeSet<String>,
    /// SHA-256 hex digest of the canonical row encoding.
    pub hash: String,
}

impl CanonicalResult {
    /// Summary of an empty result set.
    pub fn empty() -> Self {
        canonicalize(&[], true, 0.0)
    }
}

/// Reduce a result set (rows as JSON objects) to its canonical summary.
///
/// `ordered` must reflect whether the *original* query fixed the row order;
/// both variants of a comparison are canonicalized under the same policy.
pub fn canonicalize(
    rows: &[serde_json::Value],
    ordered: bool,
    float_epsilon: f64,
) -> CanonicalResult {
    let mut columns = BTreeSet::new();
    for row in rows {
        if let Some(object) = row.as_object() {
            for key in object.keys() {
                columns.insert(key.clone());
            }
        }
    }

    let mut encoded: Vec<Vec<u8>> = rows
        .iter()
        .map(|row| encode_row(row, float_epsilon))
        .collect();
    if !ordered {
        encoded.sort();
    }

    let mut hasher = Sha256::new();
    for (i, row) in encoded.iter().enumerate() {
        if i > 0 {
            hasher.update([ROW_SEP]);
        }
        hasher.update(row);
    }
    let hash = format!("{:x}", hasher.finalize());

    CanonicalResult {
        row_count: rows.len(),
        columns,
        hash,
    }
}

/// Encode one row as `name=value` fields sorted by column name.
fn encode_row(row: &serde_json::Value, float_epsilon: f64) -> Vec<u8> {
    let mut out = Vec::new();
    match row.as_object() {
        Some(object) => {
            // BTreeMap-style iteration: serde_json maps preserve insertion
            // order, so sort the field names explicitly.
            let mut names: Vec<&String> = object.keys().collect();
            names.sort();
            for (i, name) in names.iter().enumerate() {
                if i > 0 {
                    out.push(FIELD_SEP);
                }
                out.extend_from_slice(name.as_bytes());
                out.push(b'=');
                encode_value(&object[name.as_str()], float_epsilon, &mut out);
            }
        }
        None => encode_value(row, float_epsilon, &mut out),
    }
    out
}

fn encode_value(value: &serde_json::Value, float_epsilon: f64, out: &mut Vec<u8>) {
    match value {
        serde_json::Value::Null => out.extend_from_slice(b"\\N"),
        serde_json::Value::Bool(b) => out.extend_from_slice(if *b { b"t" } else { b"f" }),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                out.extend_from_slice(i.to_string().as_bytes());
            } else if let Some(u) = n.as_u64() {
                out.extend_from_slice(u.to_string().as_bytes());
            } else if let Some(f) = n.as_f64() {
                out.extend_from_slice(encode_float(f, float_epsilon).as_bytes());
            }
        }
        serde_json::Value::String(s) => {
            out.push(b'\'');
            out.extend_from_slice(s.as_bytes());
        }
        // Nested arrays/objects (e.g. Postgres array columns) encode as
        // compact JSON.
        other => out.extend_from_slice(other.to_string().as_bytes()),
    }
}

/// Snap a float to the epsilon grid.
///
/// Integral floats within exact-integer range encode like integers, so a
/// rewrite that changes a column's type from `int` to `numeric` does not
/// spuriously fail equivalence. Values within `float_epsilon` of each other
/// land on the same grid cell except at cell boundaries, which is the
/// accepted trade-off of hashing instead of pairwise comparison.
fn encode_float(f: f64, epsilon: f64) -> String {
    if !f.is_finite() {
        return format!("{f}");
    }
    // 2^53: beyond this, f64 cannot represent every integer anyway.
    const EXACT_INT_RANGE: f64 = 9_007_199_254_740_992.0;
    if f.fract() == 0.0 && f.abs() < EXACT_INT_RANGE {
        return format!("{}", f as i64);
    }
    if epsilon > 0.0 {
        let cells = f / epsilon;
        // Past i128 range the cast saturates and every huge value would
        // collapse into one cell; at that magnitude the epsilon grid is
        // meaningless, so encode the exact value instead.
        if cells.abs() < i128::MAX as f64 {
            return format!("f{}", cells.round() as i128);
        }
    }
    format!("{f:e}")
}
