use crate::schema::value::{ParamSnapshot, ParamValue};

/// Visibility condition attached to a parameter.
///
/// Leaves compare another parameter's current value against a literal; `all`/`any` combine them.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "op")]
pub enum Condition {
    /// `param == value`
    #[serde(rename = "eq")]
    Equals {
        /// Referenced parameter id.
        param: String,
        /// Expected value.
        value: ParamValue,
    },
    /// `param != value`
    #[serde(rename = "ne")]
    NotEquals {
        /// Referenced parameter id.
        param: String,
        /// Rejected value.
        value: ParamValue,
    },
    /// Conjunction.
    #[serde(rename = "all")]
    All {
        /// Operands; an empty list is vacuously true.
        conditions: Vec<Condition>,
    },
    /// Disjunction.
    #[serde(rename = "any")]
    Any {
        /// Operands; an empty list is false.
        conditions: Vec<Condition>,
    },
}

impl Condition {
    /// Evaluate against the current values. A missing referenced value never matches.
    pub fn evaluate(&self, values: &ParamSnapshot) -> bool {
        match self {
            Condition::Equals { param, value } => {
                values.get(param).is_some_and(|v| loose_eq(v, value))
            }
            Condition::NotEquals { param, value } => {
                values.get(param).is_some_and(|v| !loose_eq(v, value))
            }
            Condition::All { conditions } => conditions.iter().all(|c| c.evaluate(values)),
            Condition::Any { conditions } => conditions.iter().any(|c| c.evaluate(values)),
        }
    }

    /// Parameter ids referenced anywhere in the tree, in first-appearance order.
    pub fn referenced_params(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_params(&mut out);
        out
    }

    fn collect_params<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Condition::Equals { param, .. } | Condition::NotEquals { param, .. } => {
                if !out.contains(&param.as_str()) {
                    out.push(param);
                }
            }
            Condition::All { conditions } | Condition::Any { conditions } => {
                for c in conditions {
                    c.collect_params(out);
                }
            }
        }
    }

    /// Render back to `@depends` syntax.
    pub fn to_source(&self) -> String {
        match self {
            Condition::Equals { param, value } => format!("{param} == {}", value.to_literal()),
            Condition::NotEquals { param, value } => format!("{param} != {}", value.to_literal()),
            Condition::All { conditions } => conditions
                .iter()
                .map(|c| match c {
                    Condition::Any { .. } => format!("({})", c.to_source()),
                    _ => c.to_source(),
                })
                .collect::<Vec<_>>()
                .join(" && "),
            Condition::Any { conditions } => conditions
                .iter()
                .map(Condition::to_source)
                .collect::<Vec<_>>()
                .join(" || "),
        }
    }
}

// Bare words in conditions arrive as strings, so `"50"` must match `50` and `"true"` must match
// `true`.
fn loose_eq(actual: &ParamValue, expected: &ParamValue) -> bool {
    if actual.value_eq(expected) {
        return true;
    }
    match (actual.coerce_f64(), expected.coerce_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => actual.to_string() == expected.to_string(),
    }
}
