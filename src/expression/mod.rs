//! `@depends` condition language: lexer, recursive-descent parser, and lowering to
//! [`Condition`](crate::Condition) trees.

pub(crate) mod ast;
pub(crate) mod error;
pub(crate) mod lexer;
pub(crate) mod lower;
pub(crate) mod parser;

use crate::expression::error::ConditionError;
use crate::expression::lexer::Span;
use crate::schema::dependency::Condition;

/// Parse a `@depends` condition such as `shape == "round" && (lid || count != 0)`.
///
/// Lowering errors have no token to point at and span the whole argument.
pub(crate) fn parse_condition(src: &str) -> Result<Condition, ConditionError> {
    let expr = parser::parse_expr(src)?;
    lower::lower_condition(&expr).map_err(|kind| {
        ConditionError::new(
            Span {
                start: 0,
                end: src.len(),
            },
            kind,
        )
    })
}
