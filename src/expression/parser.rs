use crate::expression::ast::{BinaryOp, Expr};
use crate::expression::error::{ConditionError, ConditionErrorKind};
use crate::expression::lexer::{Span, Token, TokenKind, lex};
use crate::schema::value::ParamValue;

/// Deepest parenthesis nesting accepted in one condition.
pub(crate) const MAX_NESTING: usize = 64;
/// Most `&&`/`||`/`==`/`!=` operators accepted in one condition.
pub(crate) const MAX_OPERATORS: usize = 256;

pub(crate) fn parse_expr(src: &str) -> Result<Expr, ConditionError> {
    let tokens = lex(src)?;
    let mut p = Parser {
        tokens,
        pos: 0,
        depth: 0,
        operators: 0,
    };
    if p.peek().kind == TokenKind::Eof {
        return Err(ConditionError::at(0, ConditionErrorKind::Empty));
    }
    let expr = p.parse_or()?;
    p.expect(TokenKind::Eof)?;
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    operators: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn bump(&mut self) -> &Token {
        let t = &self.tokens[self.pos];
        // Eof is sticky.
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn span(&self) -> Span {
        self.peek().span
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), ConditionError> {
        if self.peek().kind == kind {
            self.bump();
            Ok(())
        } else {
            Err(ConditionError::new(
                self.span(),
                ConditionErrorKind::Expected {
                    expected: kind,
                    found: self.peek().kind.clone(),
                },
            ))
        }
    }

    /// Builds a binary node, counting it against the operator limit.
    fn binary(&mut self, op: BinaryOp, left: Expr, right: Expr) -> Result<Expr, ConditionError> {
        self.operators += 1;
        if self.operators > MAX_OPERATORS {
            return Err(ConditionError::new(
                self.span(),
                ConditionErrorKind::TooManyOperators,
            ));
        }
        Ok(Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn consume(&mut self, kind: TokenKind) -> bool {
        if self.peek().kind == kind {
            self.bump();
            true
        } else {
            false
        }
    }

    fn parse_or(&mut self) -> Result<Expr, ConditionError> {
        let mut e = self.parse_and()?;
        while self.consume(TokenKind::OrOr) {
            let r = self.parse_and()?;
            e = self.binary(BinaryOp::Or, e, r)?;
        }
        Ok(e)
    }

    fn parse_and(&mut self) -> Result<Expr, ConditionError> {
        let mut e = self.parse_equality()?;
        while self.consume(TokenKind::AndAnd) {
            let r = self.parse_equality()?;
            e = self.binary(BinaryOp::And, e, r)?;
        }
        Ok(e)
    }

    fn parse_equality(&mut self) -> Result<Expr, ConditionError> {
        let e = self.parse_primary()?;
        let op = if self.consume(TokenKind::EqEq) {
            BinaryOp::Eq
        } else if self.consume(TokenKind::Ne) {
            BinaryOp::Ne
        } else {
            return Ok(e);
        };
        let r = self.parse_primary()?;
        if matches!(self.peek().kind, TokenKind::EqEq | TokenKind::Ne) {
            return Err(ConditionError::new(
                self.span(),
                ConditionErrorKind::ChainedComparison,
            ));
        }
        self.binary(op, e, r)
    }

    fn parse_primary(&mut self) -> Result<Expr, ConditionError> {
        let t = self.bump().clone();
        match t.kind {
            TokenKind::Number(v) => Ok(Expr::Lit(v)),
            TokenKind::Str(s) => Ok(Expr::Lit(ParamValue::String(s))),
            TokenKind::True => Ok(Expr::Lit(ParamValue::Boolean(true))),
            TokenKind::False => Ok(Expr::Lit(ParamValue::Boolean(false))),
            TokenKind::Ident(s) => Ok(Expr::Ident(s)),
            TokenKind::LParen => {
                if self.depth == MAX_NESTING {
                    return Err(ConditionError::new(t.span, ConditionErrorKind::TooDeep));
                }
                self.depth += 1;
                let e = self.parse_or()?;
                self.depth -= 1;
                self.expect(TokenKind::RParen)?;
                Ok(e)
            }
            other => Err(ConditionError::new(
                t.span,
                ConditionErrorKind::UnexpectedToken(other),
            )),
        }
    }
}
