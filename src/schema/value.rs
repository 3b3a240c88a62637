use std::collections::BTreeMap;
use std::fmt;

/// A parameter value as written in source or supplied by an edit.
///
/// Serializes untagged so JSON snapshots read naturally (`50`, `2.5`, `true`, `"round"`).
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Integer literal.
    Integer(i64),
    /// Decimal literal.
    Number(f64),
    /// `true` / `false`.
    Boolean(bool),
    /// Quoted or bare string.
    String(String),
}

/// Current parameter values keyed by parameter id.
pub type ParamSnapshot = BTreeMap<String, ParamValue>;

impl ParamValue {
    /// Numeric view of integer and decimal values.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            ParamValue::Integer(v) => Some(v as f64),
            ParamValue::Number(v) => Some(v),
            _ => None,
        }
    }

    /// Numeric view that also accepts numeric-looking strings such as `"50"`.
    pub fn coerce_f64(&self) -> Option<f64> {
        match self {
            ParamValue::String(s) => parse_numeric(s.trim()).and_then(|v| v.as_f64()),
            other => other.as_f64(),
        }
    }

    /// String view.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Boolean view.
    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            ParamValue::Boolean(b) => Some(b),
            _ => None,
        }
    }

    /// `true` for integer and decimal values.
    pub fn is_numeric(&self) -> bool {
        matches!(self, ParamValue::Integer(_) | ParamValue::Number(_))
    }

    /// Equality that compares numbers by value (`50 == 50.0`) and everything else structurally.
    pub fn value_eq(&self, other: &ParamValue) -> bool {
        match (self.as_f64(), other.as_f64()) {
            (Some(a), Some(b)) => a == b,
            (None, None) => self == other,
            _ => false,
        }
    }

    /// Source-text literal for this value, re-parseable to the same variant.
    pub fn to_literal(&self) -> String {
        match self {
            ParamValue::Integer(v) => v.to_string(),
            ParamValue::Number(v) => format_decimal(*v),
            ParamValue::Boolean(b) => b.to_string(),
            ParamValue::String(s) => quote(s),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Integer(v) => write!(f, "{v}"),
            ParamValue::Number(v) => f.write_str(&format_decimal(*v)),
            ParamValue::Boolean(b) => write!(f, "{b}"),
            ParamValue::String(s) => f.write_str(s),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Integer(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Number(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Boolean(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::String(v.to_owned())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::String(v)
    }
}

/// Parse an unquoted token as integer, then decimal. Non-finite results are rejected.
pub(crate) fn parse_numeric(token: &str) -> Option<ParamValue> {
    if token.is_empty() {
        return None;
    }
    if let Ok(v) = token.parse::<i64>() {
        return Some(ParamValue::Integer(v));
    }
    // `f64::from_str` accepts "inf"/"nan"; those are words in source, not numbers.
    if !token
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'-' | b'+' | b'e' | b'E'))
    {
        return None;
    }
    token
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(ParamValue::Number)
}

/// Decimal formatting that always keeps a fractional part so it re-parses as a decimal.
pub(crate) fn format_decimal(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 {
        format!("{v:.1}")
    } else {
        format!("{v}")
    }
}

pub(crate) fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
