use crate::expression::lexer::{Span, TokenKind};

/// What is wrong with a `@depends` condition.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub(crate) enum ConditionErrorKind {
    #[error("empty condition")]
    Empty,
    #[error("invalid number")]
    InvalidNumber,
    #[error("unterminated string")]
    UnterminatedString,
    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),
    #[error("expected identifier after '$'")]
    BareSigil,
    #[error("unexpected {0:?}")]
    UnexpectedToken(TokenKind),
    #[error("expected {expected:?}, found {found:?}")]
    Expected {
        expected: TokenKind,
        found: TokenKind,
    },
    #[error("comparisons cannot be chained")]
    ChainedComparison,
    #[error("condition nested too deeply")]
    TooDeep,
    #[error("condition has too many operators")]
    TooManyOperators,
    #[error("literal {0} is not a condition")]
    LiteralCondition(String),
    #[error("comparison needs a parameter name and a value")]
    NotAComparison,
}

/// A rejected condition and the bytes of the directive argument it points at.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("{kind} at byte {}", .span.start)]
pub(crate) struct ConditionError {
    pub(crate) span: Span,
    pub(crate) kind: ConditionErrorKind,
}

impl ConditionError {
    pub(crate) fn new(span: Span, kind: ConditionErrorKind) -> Self {
        Self { span, kind }
    }

    pub(crate) fn at(offset: usize, kind: ConditionErrorKind) -> Self {
        Self::new(
            Span {
                start: offset,
                end: offset,
            },
            kind,
        )
    }
}
