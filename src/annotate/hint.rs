use crate::annotate::line::{read_quoted, split_outside_quotes};
use crate::schema::value::{ParamValue, parse_numeric};

/// Classified trailing comment of an assignment line.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Hint {
    /// `[max]`, `[min:max]` or `[min:step:max]`; every field is numeric.
    Range {
        fields: Vec<ParamValue>,
        tail: Option<String>,
    },
    /// `[v1, v2, ...]`, elements optionally `value:label`.
    Enum {
        items: Vec<EnumItem>,
        tail: Option<String>,
    },
    /// Any other comment text.
    Description(String),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct EnumItem {
    pub(crate) value: EnumLiteral,
    pub(crate) label: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum EnumLiteral {
    /// Written in quotes; always a string.
    Quoted(String),
    /// Written bare; numeric if it parses as a number.
    Bare(String),
}

impl EnumLiteral {
    pub(crate) fn text(&self) -> &str {
        match self {
            EnumLiteral::Quoted(s) | EnumLiteral::Bare(s) => s,
        }
    }

    pub(crate) fn as_number(&self) -> Option<ParamValue> {
        match self {
            EnumLiteral::Bare(s) => parse_numeric(s),
            EnumLiteral::Quoted(_) => None,
        }
    }
}

/// Result of classifying a comment. `malformed` carries the reason a bracket hint was downgraded to
/// a description.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Classified {
    pub(crate) hint: Hint,
    pub(crate) malformed: Option<String>,
}

/// Classify comment text in strict precedence: range, then enum, then plain description.
pub(crate) fn classify_comment(text: &str) -> Classified {
    let text = text.trim();
    let description = |malformed: Option<String>| Classified {
        hint: Hint::Description(text.to_owned()),
        malformed,
    };

    if !text.starts_with('[') {
        return description(None);
    }
    let Some(close) = closing_bracket(text) else {
        return description(Some("missing closing ']'".to_owned()));
    };
    let inner = text[1..close].trim();
    let tail = Some(text[close + 1..].trim())
        .filter(|t| !t.is_empty())
        .map(str::to_owned);

    if let Some(fields) = try_range(inner) {
        return Classified {
            hint: Hint::Range { fields, tail },
            malformed: None,
        };
    }
    match try_enum(inner) {
        Ok(items) => Classified {
            hint: Hint::Enum { items, tail },
            malformed: None,
        },
        Err(reason) => description(Some(reason)),
    }
}

fn closing_bracket(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut in_quote = false;
    let mut i = 1usize;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if in_quote => i += 1,
            b'"' => in_quote = !in_quote,
            b']' if !in_quote => return Some(i),
            _ => {}
        }
        i += 1;
    }
    None
}

fn try_range(inner: &str) -> Option<Vec<ParamValue>> {
    if inner.contains(',') || inner.contains('"') {
        return None;
    }
    let fields: Vec<ParamValue> = inner
        .split(':')
        .map(|f| parse_numeric(f.trim()))
        .collect::<Option<_>>()?;
    (1..=3).contains(&fields.len()).then_some(fields)
}

fn try_enum(inner: &str) -> Result<Vec<EnumItem>, String> {
    if inner.is_empty() {
        return Err("empty bracket hint".to_owned());
    }
    split_outside_quotes(inner, b',')
        .into_iter()
        .map(|raw| parse_enum_item(raw.trim()))
        .collect()
}

fn parse_enum_item(raw: &str) -> Result<EnumItem, String> {
    if raw.is_empty() {
        return Err("empty enum element".to_owned());
    }
    if raw.starts_with('"') {
        let (text, consumed, closed) = read_quoted(raw);
        if !closed {
            return Err(format!("unterminated quote in enum element {raw}"));
        }
        let rest = raw[consumed..].trim();
        let label = match rest.strip_prefix(':') {
            Some(l) => label_text(l),
            None if rest.is_empty() => None,
            None => return Err(format!("unexpected text after quoted element: {rest}")),
        };
        return Ok(EnumItem {
            value: EnumLiteral::Quoted(text),
            label,
        });
    }
    let (value, label) = match raw.split_once(':') {
        Some((_, l)) if l.contains(':') => {
            return Err(format!("too many ':' in enum element {raw}"));
        }
        Some((v, l)) => (v.trim(), label_text(l)),
        None => (raw, None),
    };
    if value.is_empty() {
        return Err(format!("enum element without a value: {raw}"));
    }
    Ok(EnumItem {
        value: EnumLiteral::Bare(value.to_owned()),
        label,
    })
}

fn label_text(l: &str) -> Option<String> {
    let l = l.trim();
    let l = if l.starts_with('"') {
        let (text, _, _) = read_quoted(l);
        text
    } else {
        l.to_owned()
    };
    (!l.is_empty()).then_some(l)
}
