use std::borrow::Cow;

use crate::schema::value::{ParamValue, parse_numeric};

/// Normalize `\r\n` and bare `\r` to `\n`, dropping a leading byte-order mark.
pub(crate) fn unify_line_endings(src: &str) -> Cow<'_, str> {
    let src = src.strip_prefix('\u{feff}').unwrap_or(src);
    if src.contains('\r') {
        Cow::Owned(src.replace("\r\n", "\n").replace('\r', "\n"))
    } else {
        Cow::Borrowed(src)
    }
}

/// A top-level `ident = value;` line.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Assignment<'a> {
    pub(crate) ident: &'a str,
    pub(crate) value: ValueScan<'a>,
    /// Trailing `//` comment body, trimmed.
    pub(crate) comment: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ValueScan<'a> {
    Literal(ParamValue),
    /// Opening quote without a closing one; holds the rest of the line, unescaped.
    Unterminated(String),
    /// Expression, vector, call, or anything else that is not a single literal.
    Unsupported(&'a str),
}

/// Length of an identifier prefix: optional `$` sigil, then `[A-Za-z_][A-Za-z0-9_]*`.
pub(crate) fn ident_len(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut i = usize::from(bytes.first() == Some(&b'$'));
    match bytes.get(i) {
        Some(b) if b.is_ascii_alphabetic() || *b == b'_' => i += 1,
        _ => return None,
    }
    while bytes
        .get(i)
        .is_some_and(|b| b.is_ascii_alphanumeric() || *b == b'_')
    {
        i += 1;
    }
    Some(i)
}

/// Read a double-quoted string starting at `s[0] == '"'`.
///
/// Returns the unescaped text, the number of bytes consumed, and whether a closing quote was found.
/// Without one, the remainder of `s` is consumed.
pub(crate) fn read_quoted(s: &str) -> (String, usize, bool) {
    debug_assert!(s.starts_with('"'));
    let mut out = String::new();
    let mut chars = s.char_indices().skip(1);
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return (out, i + 1, true),
            '\\' => match chars.next() {
                Some((_, 'n')) => out.push('\n'),
                Some((_, 't')) => out.push('\t'),
                Some((_, 'r')) => out.push('\r'),
                Some((_, other)) => out.push(other),
                None => out.push('\\'),
            },
            other => out.push(other),
        }
    }
    (out, s.len(), false)
}

/// Byte offset of the first `needle` that is outside double quotes.
pub(crate) fn find_outside_quotes(s: &str, needle: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut in_quote = false;
    let mut i = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if in_quote => i += 1,
            b'"' => in_quote = !in_quote,
            _ if !in_quote && bytes[i..].starts_with(needle.as_bytes()) => return Some(i),
            _ => {}
        }
        i += 1;
    }
    None
}

/// Split on `sep` wherever it is outside double quotes.
pub(crate) fn split_outside_quotes(s: &str, sep: u8) -> Vec<&str> {
    let bytes = s.as_bytes();
    let mut parts = Vec::new();
    let mut in_quote = false;
    let mut start = 0usize;
    let mut i = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if in_quote => i += 1,
            b'"' => in_quote = !in_quote,
            b if b == sep && !in_quote => {
                parts.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    parts.push(&s[start.min(s.len())..]);
    parts
}

/// Match `ident = value;` with an optional trailing `//` comment.
///
/// Returns `None` for anything that is not a complete single-line assignment (including
/// comparisons such as `a == b` and multi-line values).
pub(crate) fn scan_assignment(line: &str) -> Option<Assignment<'_>> {
    let s = line.trim_start();
    let n = ident_len(s)?;
    let ident = &s[..n];
    let rest = s[n..].trim_start().strip_prefix('=')?;
    if rest.starts_with('=') {
        return None;
    }
    let rest = rest.trim_start();

    if rest.starts_with('"') {
        let (text, consumed, closed) = read_quoted(rest);
        if !closed {
            return Some(Assignment {
                ident,
                value: ValueScan::Unterminated(text),
                comment: None,
            });
        }
        let after = rest[consumed..].trim_start();
        if let Some(tail) = after.strip_prefix(';') {
            return Some(Assignment {
                ident,
                value: ValueScan::Literal(ParamValue::String(text)),
                comment: trailing_comment(tail),
            });
        }
    }

    let semi = find_outside_quotes(rest, ";")?;
    if find_outside_quotes(rest, "//").is_some_and(|c| c < semi) {
        return None;
    }
    let token = rest[..semi].trim();
    Some(Assignment {
        ident,
        value: classify_token(token),
        comment: trailing_comment(&rest[semi + 1..]),
    })
}

fn trailing_comment(tail: &str) -> Option<&str> {
    tail.trim_start().strip_prefix("//").map(str::trim)
}

/// Unquoted tokens: integer, then decimal, then boolean, then bare word.
fn classify_token(token: &str) -> ValueScan<'_> {
    if let Some(v) = parse_numeric(token) {
        return ValueScan::Literal(v);
    }
    match token {
        "true" => ValueScan::Literal(ParamValue::Boolean(true)),
        "false" => ValueScan::Literal(ParamValue::Boolean(false)),
        "undef" | "" => ValueScan::Unsupported(token),
        _ if ident_len(token) == Some(token.len()) => {
            ValueScan::Literal(ParamValue::String(token.to_owned()))
        }
        _ => ValueScan::Unsupported(token),
    }
}

/// Recognize `/* [Label] attrs */` occupying a whole (trimmed) line.
pub(crate) fn group_header(trimmed: &str) -> Option<(&str, &str)> {
    let inner = trimmed.strip_prefix("/*")?.strip_suffix("*/")?.trim();
    let inner = inner.strip_prefix('[')?;
    let close = inner.find(']')?;
    let label = inner[..close].trim();
    if label.is_empty() {
        return None;
    }
    Some((label, inner[close + 1..].trim()))
}

/// Net `{`/`}` balance of a code line, skipping strings and comments.
///
/// `in_block` carries block-comment state across lines.
pub(crate) fn brace_delta(line: &str, in_block: &mut bool) -> i64 {
    let bytes = line.as_bytes();
    let mut delta = 0i64;
    let mut in_quote = false;
    let mut i = 0usize;
    while i < bytes.len() {
        let b = bytes[i];
        let next = bytes.get(i + 1).copied();
        if *in_block {
            if b == b'*' && next == Some(b'/') {
                *in_block = false;
                i += 1;
            }
        } else if in_quote {
            match b {
                b'\\' => i += 1,
                b'"' => in_quote = false,
                _ => {}
            }
        } else {
            match (b, next) {
                (b'/', Some(b'/')) => break,
                (b'/', Some(b'*')) => {
                    *in_block = true;
                    i += 1;
                }
                (b'"', _) => in_quote = true,
                (b'{', _) => delta += 1,
                (b'}', _) => delta -= 1,
                _ => {}
            }
        }
        i += 1;
    }
    delta
}
