//! Top-level AND / OR splitting of condition strings.
//!
//! Splits only at parenthesis depth zero and never inside quoted text
//! (`'...'`, `"..."`, `[...]`). The `AND` that belongs to a `BETWEEN x AND y`
//! range is not treated as a connective.

/// One predicate and the connective text that precedes it.
///
/// The first segment has an empty connective. Concatenating every
/// `connective + condition` reproduces the input exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment<'a> {
    pub connective: &'a str,
    pub condition: &'a str,
}

/// Split `input` at top-level `AND` / `OR` keywords.
pub fn split_conditions(input: &str) -> Vec<Segment<'_>> {
    let bytes = input.as_bytes();
    let mut segments = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut pending_between = false;
    let mut connective = "";
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if let Some(close) = quote {
            if b == close {
                quote = None;
            }
            i += 1;
            continue;
        }

        match b {
            b'\'' => quote = Some(b'\''),
            b'"' => quote = Some(b'"'),
            b'[' => quote = Some(b']'),
            b'(' => depth += 1,
            b')' => depth = depth.saturating_sub(1),
            _ if depth == 0 && b.is_ascii_whitespace() => {
                let word_start = skip_whitespace(bytes, i);
                let word_end = skip_word(bytes, word_start);
                let word = &input[word_start..word_end];
                let followed_by_space = bytes.get(word_end).is_some_and(u8::is_ascii_whitespace);

                if followed_by_space && word.eq_ignore_ascii_case("BETWEEN") {
                    pending_between = true;
                    i = word_end;
                    continue;
                }
                let is_and = word.eq_ignore_ascii_case("AND");
                if followed_by_space && (is_and || word.eq_ignore_ascii_case("OR")) {
                    if is_and && pending_between {
                        pending_between = false;
                        i = word_end;
                        continue;
                    }
                    let next = skip_whitespace(bytes, word_end);
                    segments.push(Segment {
                        connective,
                        condition: &input[start..i],
                    });
                    connective = &input[i..next];
                    start = next;
                    i = next;
                    continue;
                }
                i = word_start.max(i + 1);
                continue;
            }
            _ => {}
        }
        i += 1;
    }

    segments.push(Segment {
        connective,
        condition: &input[start..],
    });
    segments
}

/// The inside of `input` when a single pair of parentheses wraps all of it.
///
/// `"(a = 1 OR b = 2)"` yields `"a = 1 OR b = 2"`; `"(a) OR (b)"` yields `None`.
pub fn strip_wrapping_parens(input: &str) -> Option<&str> {
    let trimmed = input.trim();
    let bytes = trimmed.as_bytes();
    if bytes.len() < 2 || bytes[0] != b'(' || bytes[bytes.len() - 1] != b')' {
        return None;
    }

    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    for (i, &b) in bytes.iter().enumerate() {
        if let Some(close) = quote {
            if b == close {
                quote = None;
            }
            continue;
        }
        match b {
            b'\'' => quote = Some(b'\''),
            b'"' => quote = Some(b'"'),
            b'[' => quote = Some(b']'),
            b'(' => depth += 1,
            b')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 && i != bytes.len() - 1 {
                    return None;
                }
            }
            _ => {}
        }
    }
    (depth == 0).then(|| &trimmed[1..trimmed.len() - 1])
}

fn skip_whitespace(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

fn skip_word(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
        i += 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conditions(input: &str) -> Vec<&str> {
        split_conditions(input).iter().map(|s| s.condition).collect()
    }

    fn rejoin(input: &str) -> String {
        split_conditions(input)
            .iter()
            .map(|s| format!("{}{}", s.connective, s.condition))
            .collect()
    }

    #[test]
    fn splits_top_level_connectives() {
        assert_eq!(conditions("a = 1 AND b = 2 or c = 3"), vec!["a = 1", "b = 2", "c = 3"]);
        let segments = split_conditions("a = 1 AND b = 2 or c = 3");
        assert_eq!(segments[0].connective, "");
        assert_eq!(segments[1].connective, " AND ");
        assert_eq!(segments[2].connective, " or ");
    }

    #[test]
    fn ignores_nested_and_quoted_keywords() {
        assert_eq!(
            conditions("(a = 1 OR b = 2) AND name = 'Tom AND Jerry'"),
            vec!["(a = 1 OR b = 2)", "name = 'Tom AND Jerry'"]
        );
        assert_eq!(conditions(r#""ORDER AND" = 1"#), vec![r#""ORDER AND" = 1"#]);
        assert_eq!(conditions("[x AND y] = 1"), vec!["[x AND y] = 1"]);
    }

    #[test]
    fn keeps_between_ranges_together() {
        assert_eq!(
            conditions("price BETWEEN 1 AND 5 AND qty > 0"),
            vec!["price BETWEEN 1 AND 5", "qty > 0"]
        );
    }

    #[test]
    fn words_containing_keywords_are_not_split() {
        assert_eq!(conditions("brand = 1 AND oracle = 2"), vec!["brand = 1", "oracle = 2"]);
        assert_eq!(conditions("android = 1"), vec!["android = 1"]);
    }

    #[test]
    fn rejoining_reproduces_input() {
        for input in [
            "a = 1",
            "a = 1  AND\tb = 2",
            "x BETWEEN 1 AND 2 OR (y = 'a OR b')",
            "",
        ] {
            assert_eq!(rejoin(input), input);
        }
    }

    #[test]
    fn wrapping_parens() {
        assert_eq!(strip_wrapping_parens("(a = 1 OR b = 2)"), Some("a = 1 OR b = 2"));
        assert_eq!(strip_wrapping_parens("(a) OR (b)"), None);
        assert_eq!(strip_wrapping_parens("a = (1)"), None);
        assert_eq!(strip_wrapping_parens("(a = ')')"), Some("a = ')'"));
    }
}
