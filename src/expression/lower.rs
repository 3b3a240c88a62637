use crate::expression::ast::{BinaryOp, Expr};
use crate::expression::error::ConditionErrorKind;
use crate::schema::dependency::Condition;
use crate::schema::value::ParamValue;

/// Lower a parsed expression into a dependency tree.
///
/// Comparisons need one identifier side and one literal side; a bare word on the literal side is a
/// string (`shape == round`). A lone identifier means `ident == true`. Nested `&&`/`||` chains are
/// flattened.
pub(crate) fn lower_condition(e: &Expr) -> Result<Condition, ConditionErrorKind> {
    match e {
        Expr::Ident(name) => Ok(Condition::Equals {
            param: name.clone(),
            value: ParamValue::Boolean(true),
        }),
        Expr::Lit(v) => Err(ConditionErrorKind::LiteralCondition(v.to_literal())),
        Expr::Binary { op, left, right } => match op {
            BinaryOp::Eq | BinaryOp::Ne => {
                let (param, value) = comparison_sides(left, right)?;
                Ok(if *op == BinaryOp::Eq {
                    Condition::Equals { param, value }
                } else {
                    Condition::NotEquals { param, value }
                })
            }
            BinaryOp::And => {
                let mut conditions = Vec::new();
                flatten(e, BinaryOp::And, &mut conditions)?;
                Ok(Condition::All { conditions })
            }
            BinaryOp::Or => {
                let mut conditions = Vec::new();
                flatten(e, BinaryOp::Or, &mut conditions)?;
                Ok(Condition::Any { conditions })
            }
        },
    }
}

fn flatten(e: &Expr, op: BinaryOp, out: &mut Vec<Condition>) -> Result<(), ConditionErrorKind> {
    match e {
        Expr::Binary {
            op: inner,
            left,
            right,
        } if *inner == op => {
            flatten(left, op, out)?;
            flatten(right, op, out)
        }
        other => {
            out.push(lower_condition(other)?);
            Ok(())
        }
    }
}

fn comparison_sides(
    left: &Expr,
    right: &Expr,
) -> Result<(String, ParamValue), ConditionErrorKind> {
    match (left, right) {
        (Expr::Ident(name), Expr::Lit(v)) | (Expr::Lit(v), Expr::Ident(name)) => {
            Ok((name.clone(), v.clone()))
        }
        (Expr::Ident(name), Expr::Ident(word)) => {
            Ok((name.clone(), ParamValue::String(word.clone())))
        }
        _ => Err(ConditionErrorKind::NotAComparison),
    }
}
