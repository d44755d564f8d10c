//! Stored WHERE / HAVING clauses and identifier protection inside them.

use crate::ident::Protector;
use crate::operator::find_operator;
use crate::split::{split_conditions, strip_wrapping_parens};

/// One WHERE or HAVING fragment.
///
/// `prefix` is the connective (`""`, `"AND "`, `"OR NOT "`...) and
/// `condition` the raw text with `:name:` bind markers. Identifier
/// protection is applied at compile time when `escape` is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhereClause {
    pub prefix: String,
    pub condition: String,
    pub escape: bool,
}

impl WhereClause {
    pub fn new(prefix: impl Into<String>, condition: impl Into<String>, escape: bool) -> Self {
        Self {
            prefix: prefix.into(),
            condition: condition.into(),
            escape,
        }
    }

    /// Group markers and other fragments that are emitted verbatim.
    pub fn raw(prefix: impl Into<String>, condition: impl Into<String>) -> Self {
        Self::new(prefix, condition, false)
    }
}

/// How the right-hand side of a comparison is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    /// WHERE / HAVING: the value is protected only when it looks like a
    /// qualified column (`t.col`) and is not a bind marker.
    Filter,
    /// JOIN ... ON: both sides are column references.
    Join,
}

/// Render a list of clauses into the body of a WHERE / HAVING clause.
pub fn compile_clauses(protector: &Protector<'_>, clauses: &[WhereClause]) -> String {
    let mut out = String::new();
    for clause in clauses {
        let condition = if clause.escape {
            protect_condition(protector, &clause.condition)
        } else {
            clause.condition.clone()
        };
        push_fragment(&mut out, &format!("{}{}", clause.prefix, condition));
    }
    out
}

/// Append `fragment`, separated by a space except right after `(` or
/// before `)`.
pub fn push_fragment(out: &mut String, fragment: &str) {
    if fragment.is_empty() {
        return;
    }
    if !out.is_empty() && !out.ends_with('(') && !fragment.starts_with(')') {
        out.push(' ');
    }
    out.push_str(fragment);
}

/// Protect the column references of a WHERE / HAVING condition.
pub fn protect_condition(protector: &Protector<'_>, condition: &str) -> String {
    protect_with(protector, condition, Side::Filter)
}

/// Protect both sides of every comparison in a JOIN condition.
pub fn protect_join_condition(protector: &Protector<'_>, condition: &str) -> String {
    protect_with(protector, condition, Side::Join)
}

fn protect_with(protector: &Protector<'_>, condition: &str, side: Side) -> String {
    split_conditions(condition)
        .into_iter()
        .map(|segment| {
            format!(
                "{}{}",
                segment.connective,
                protect_predicate(protector, segment.condition, side)
            )
        })
        .collect()
}

fn protect_predicate(protector: &Protector<'_>, predicate: &str, side: Side) -> String {
    if let Some(inner) = strip_wrapping_parens(predicate) {
        return format!("({})", protect_with(protector, inner, side));
    }

    let Some((start, end)) = find_operator(predicate) else {
        return predicate.to_string();
    };

    let left = predicate[..start].trim_start();
    let column = left.trim_start_matches('(');
    let lead = &left[..left.len() - column.len()];
    let column = column.trim();
    if column.is_empty() {
        return predicate.to_string();
    }

    let right = predicate[end..].trim();
    match side {
        Side::Join => format!(
            "{lead}{}{}{}",
            protector.protect(column),
            &predicate[start..end],
            protector.protect(right)
        ),
        Side::Filter => {
            let op = predicate[start..end].trim();
            let mut out = format!("{lead}{} {op}", protector.protect(column));
            if !right.is_empty() {
                out.push(' ');
                if right.contains('.') && !right.contains(':') {
                    out.push_str(&protector.protect(right));
                } else {
                    out.push_str(right);
                }
            }
            out
        }
    }
}
