use crate::schema::value::ParamValue;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Lit(ParamValue),
    /// Parameter reference, `$` sigil included.
    Ident(String),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Eq,
    Ne,
    And,
    Or,
}
