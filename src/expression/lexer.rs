use crate::expression::error::{ConditionError, ConditionErrorKind};
use crate::schema::value::{ParamValue, parse_numeric};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Span {
    pub(crate) start: usize,
    pub(crate) end: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub(crate) kind: TokenKind,
    pub(crate) span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Ident(String),
    Number(ParamValue),
    Str(String),
    True,
    False,

    LParen,
    RParen,

    EqEq,
    Ne,

    AndAnd,
    OrOr,

    Eof,
}

pub(crate) fn lex(input: &str) -> Result<Vec<Token>, ConditionError> {
    let mut out = Vec::new();
    let bytes = input.as_bytes();
    let mut i = 0usize;

    while i < bytes.len() {
        let c = bytes[i] as char;
        if c.is_whitespace() {
            i += 1;
            continue;
        }

        let start = i;

        // Number: -?[0-9]*(.[0-9]+)?([eE][+-]?[0-9]+)?
        let starts_number = c.is_ascii_digit()
            || (matches!(c, '-' | '.')
                && i + 1 < bytes.len()
                && (bytes[i + 1] as char).is_ascii_digit());
        if starts_number {
            i += 1;
            while i < bytes.len() {
                let ch = bytes[i] as char;
                let exp_sign = matches!(ch, '+' | '-') && matches!(bytes[i - 1] as char, 'e' | 'E');
                if ch.is_ascii_digit() || matches!(ch, '.' | 'e' | 'E') || exp_sign {
                    i += 1;
                } else {
                    break;
                }
            }
            let s = &input[start..i];
            let v = parse_numeric(s).ok_or_else(|| {
                ConditionError::new(Span { start, end: i }, ConditionErrorKind::InvalidNumber)
            })?;
            out.push(Token {
                kind: TokenKind::Number(v),
                span: Span { start, end: i },
            });
            continue;
        }

        // Quoted string with backslash escapes.
        if c == '"' {
            i += 1;
            let mut s = String::new();
            let mut closed = false;
            while i < bytes.len() {
                let ch = input[i..].chars().next().unwrap_or('\0');
                i += ch.len_utf8();
                match ch {
                    '"' => {
                        closed = true;
                        break;
                    }
                    '\\' => {
                        let esc = input[i..].chars().next().unwrap_or('\\');
                        i += esc.len_utf8();
                        s.push(match esc {
                            'n' => '\n',
                            't' => '\t',
                            'r' => '\r',
                            other => other,
                        });
                    }
                    other => s.push(other),
                }
            }
            if !closed {
                return Err(ConditionError::new(
                    Span { start, end: i },
                    ConditionErrorKind::UnterminatedString,
                ));
            }
            out.push(Token {
                kind: TokenKind::Str(s),
                span: Span { start, end: i },
            });
            continue;
        }

        // Ident, optionally `$`-prefixed.
        if c.is_ascii_alphabetic() || c == '_' || c == '$' {
            i += 1;
            while i < bytes.len() {
                let ch = bytes[i] as char;
                if ch.is_ascii_alphanumeric() || ch == '_' {
                    i += 1;
                } else {
                    break;
                }
            }
            let s = &input[start..i];
            let kind = match s {
                "true" => TokenKind::True,
                "false" => TokenKind::False,
                "$" => return Err(ConditionError::at(start, ConditionErrorKind::BareSigil)),
                _ => TokenKind::Ident(s.to_owned()),
            };
            out.push(Token {
                kind,
                span: Span { start, end: i },
            });
            continue;
        }

        // Two-char operators
        if i + 1 < bytes.len() {
            let kind = match &bytes[i..i + 2] {
                b"&&" => Some(TokenKind::AndAnd),
                b"||" => Some(TokenKind::OrOr),
                b"==" => Some(TokenKind::EqEq),
                b"!=" => Some(TokenKind::Ne),
                _ => None,
            };
            if let Some(kind) = kind {
                i += 2;
                out.push(Token {
                    kind,
                    span: Span { start, end: i },
                });
                continue;
            }
        }

        // Single-char tokens. A lone `=` is accepted as equality.
        let kind = match c {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '=' => TokenKind::EqEq,
            _ => {
                let ch = input[i..].chars().next().unwrap_or(c);
                return Err(ConditionError::new(
                    Span {
                        start,
                        end: start + ch.len_utf8(),
                    },
                    ConditionErrorKind::UnexpectedChar(ch),
                ));
            }
        };
        i += 1;
        out.push(Token {
            kind,
            span: Span { start, end: i },
        });
    }

    out.push(Token {
        kind: TokenKind::Eof,
        span: Span {
            start: input.len(),
            end: input.len(),
        },
    });

    Ok(out)
}
