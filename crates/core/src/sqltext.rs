//! Lightweight SQL text inspection.
//!
//! The engine deliberately does not embed a SQL parser (rewriting happens in
//! the proposal source, not here), but several policies need structural
//! facts about a statement: whether it carries a top-level `ORDER BY` or
//! `LIMIT`, and which tables it references. These helpers answer those
//! questions with a literal- and comment-aware scan plus parenthesis depth
//! tracking, which is sufficient for single SELECT statements.

use std::sync::OnceLock;

use regex::Regex;

/// Replace the contents of string literals, quoted identifiers, and comments
/// with spaces, preserving length and the positions of everything else.
///
/// Keeps the quote delimiters themselves so downstream scans still see where
/// a literal was. Handles `''` escapes inside single-quoted strings, `--`
/// line comments, and `/* */` block comments (unnested).
pub fn mask_literals(sql: &str) -> String {
    #[derive(PartialEq)]
    enum State {
        Normal,
        Single,
        Double,
        Line,
        Block,
    }

    let mut out = String::with_capacity(sql.len());
    let mut state = State::Normal;
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match state {
            State::Normal => match c {
                '\'' => {
                    state = State::Single;
                    out.push('\'');
                }
                '"' => {
                    state = State::Double;
                    out.push('"');
                }
                '-' if chars.peek() == Some(&'-') => {
                    chars.next();
                    state = State::Line;
                    out.push_str("  ");
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    state = State::Block;
                    out.push_str("  ");
                }
                _ => out.push(c),
            },
            State::Single => {
                if c == '\'' {
                    if chars.peek() == Some(&'\'') {
                        // Escaped quote stays inside the literal.
                        chars.next();
                        out.push_str("  ");
                    } else {
                        state = State::Normal;
                        out.push('\'');
                    }
                } else {
                    out.push(' ');
                }
            }
            State::Double => {
                if c == '"' {
                    state = State::Normal;
                    out.push('"');
                } else {
                    out.push(' ');
                }
            }
            State::Line => {
                if c == '\n' {
                    state = State::Normal;
                    out.push('\n');
                } else {
                    out.push(' ');
                }
            }
            State::Block => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    state = State::Normal;
                    out.push_str("  ");
                } else {
                    out.push(' ');
                }
            }
        }
    }

    out
}

/// Whether the statement has an `ORDER BY` at parenthesis depth zero,
/// outside literals and comments. Subquery ordering does not count: only a
/// top-level `ORDER BY` makes row order part of the result's correctness.
pub fn has_top_level_order_by(sql: &str) -> bool {
    let masked = mask_literals(sql).to_ascii_lowercase();
    let bytes = masked.as_bytes();
    let mut depth = 0i32;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'(' => depth += 1,
            b')' => depth = depth.saturating_sub(1),
            b'o' if depth == 0 && word_at(bytes, i, b"order") => {
                let mut j = i + 5;
                while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                    j += 1;
                }
                if j > i + 5 && word_at(bytes, j, b"by") {
                    return true;
                }
            }
            _ => {}
        }
        i += 1;
    }
    false
}

/// Whether the statement has a `LIMIT` at parenthesis depth zero.
pub fn has_top_level_limit(sql: &str) -> bool {
    let masked = mask_literals(sql).to_ascii_lowercase();
    let bytes = masked.as_bytes();
    let mut depth = 0i32;

    for i in 0..bytes.len() {
        match bytes[i] {
            b'(' => depth += 1,
            b')' => depth = depth.saturating_sub(1),
            b'l' if depth == 0 && word_at(bytes, i, b"limit") => return true,
            _ => {}
        }
    }
    false
}

/// Table names referenced via `FROM` / `JOIN` clauses, schema prefixes
/// stripped, deduplicated in first-seen order.
pub fn referenced_tables(sql: &str) -> Vec<String> {
    static TABLE_RE: OnceLock<Regex> = OnceLock::new();
    let re = TABLE_RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:from|join)\s+([a-zA-Z_][a-zA-Z0-9_$]*(?:\.[a-zA-Z_][a-zA-Z0-9_$]*)?)")
            .expect("table regex is valid")
    });

    let masked = mask_literals(sql);
    let mut tables = Vec::new();
    for captures in re.captures_iter(&masked) {
        let raw = &captures[1];
        // Strip a schema qualifier; catalog lookups use the bare name.
        let name = raw.rsplit('.').next().unwrap_or(raw).to_ascii_lowercase();
        if !tables.contains(&name) {
            tables.push(name);
        }
    }
    tables
}

/// Whether `word` occurs at byte offset `i` with word boundaries on both
/// sides.
fn word_at(bytes: &[u8], i: usize, word: &[u8]) -> bool {
    if i + word.len() > bytes.len() || &bytes[i..i + word.len()] != word {
        return false;
    }
    let before_ok = i == 0 || !is_word_byte(bytes[i - 1]);
    let after_ok = i + word.len() == bytes.len() || !is_word_byte(bytes[i + word.len()]);
    before_ok && after_ok
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}
