//! Comparison operator detection for condition strings.

use regex::Regex;
use std::sync::OnceLock;

fn has_operator_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(<|>|!|=|\sIS NULL|\sIS NOT NULL|\sEXISTS|\sBETWEEN|\sLIKE|\sIN\s*\(|\s)")
            .expect("invalid built-in operator regex")
    })
}

fn operator_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(concat!(
            r"(?i)\s*(?:<|>|!)?=\s*",
            r"|\s*<>?\s*",
            r"|\s*>\s*",
            r"|\s+IS NULL",
            r"|\s+IS NOT NULL",
            r"|\s+EXISTS\s*\(.*\)",
            r"|\s+NOT EXISTS\s*\(.*\)",
            r"|\s+BETWEEN\s+",
            r"|\s+IN\s*\(.*\)",
            r"|\s+NOT IN\s*\(.*\)",
            r"|\s+LIKE\s+",
            r"|\s+NOT LIKE\s+",
        ))
        .expect("invalid built-in operator regex")
    })
}

fn null_rewrite_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\s*(!?=|<>|\bIS(?:\s+NOT)?)\s*$").expect("invalid built-in null regex")
    })
}

/// Whether `key` already carries an operator (or any inner whitespace).
///
/// `"name"` has none; `"name !="`, `"age >"` and `"id IN (1, 2)"` do.
pub fn has_operator(key: &str) -> bool {
    has_operator_re().is_match(key.trim())
}

/// Byte span of the first operator in `condition`, including surrounding
/// whitespace.
pub fn find_operator(condition: &str) -> Option<(usize, usize)> {
    operator_re()
        .find(condition)
        .filter(|m| !m.as_str().trim().is_empty())
        .map(|m| (m.start(), m.end()))
}

/// The first operator in `condition`, trimmed.
pub fn get_operator(condition: &str) -> Option<&str> {
    find_operator(condition).map(|(s, e)| condition[s..e].trim())
}

/// `key` with any operator removed, used to name bind placeholders.
///
/// `"age >="` becomes `"age"`.
pub fn strip_operator(key: &str) -> &str {
    let key = key.trim();
    // Keyword operators need trailing whitespace to match.
    let padded = format!("{key} ");
    match find_operator(&padded) {
        Some((start, _)) if start > 0 && start <= key.len() => key[..start].trim(),
        _ => key,
    }
}

/// Rewrite a key that ends in a comparison against NULL into an
/// `IS [NOT] NULL` test.
///
/// - `"deleted_at ="` and `"deleted_at IS"` become `deleted_at IS NULL`
/// - `"deleted_at !="`, `"deleted_at <>"` and `"deleted_at IS NOT"` become `deleted_at IS NOT NULL`
///
/// Returns `None` when the key does not end in one of those operators.
pub fn null_comparison(key: &str) -> Option<String> {
    let key = key.trim();
    let caps = null_rewrite_re().captures(key)?;
    let start = caps.get(0)?.start();
    let op = caps.get(1)?.as_str();
    let op = op.split_whitespace().collect::<Vec<_>>().join(" ").to_ascii_uppercase();
    let test = match op.as_str() {
        "=" | "IS" => "IS NULL",
        _ => "IS NOT NULL",
    };
    Some(format!("{} {test}", key[..start].trim_end()))
}
