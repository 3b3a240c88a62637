use crate::schema::dependency::Condition;
use crate::schema::value::{ParamSnapshot, ParamValue};

/// Id of the group synthesized for parameters that precede any group header.
pub const DEFAULT_GROUP_ID: &str = "parameters";
/// Label of the synthesized default group.
pub const DEFAULT_GROUP_LABEL: &str = "Parameters";
/// Group label whose parameters are hidden from default presentation.
pub const HIDDEN_GROUP_LABEL: &str = "Hidden";

/// Declared value type of a parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParamType {
    /// Whole numbers.
    Integer,
    /// Decimal numbers.
    Number,
    /// `true` / `false`.
    Boolean,
    /// Free text.
    String,
    /// One of a fixed list of strings.
    EnumOfString,
    /// One of a fixed list of numbers.
    EnumOfNumber,
}

impl ParamType {
    /// `true` for integer and number.
    pub fn is_numeric(self) -> bool {
        matches!(self, ParamType::Integer | ParamType::Number)
    }

    /// `true` for both enum flavours.
    pub fn is_enum(self) -> bool {
        matches!(self, ParamType::EnumOfString | ParamType::EnumOfNumber)
    }
}

/// Type-dependent value constraints.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum Constraints {
    /// Unconstrained.
    None,
    /// Inclusive numeric bounds with an optional step (`None` means continuous).
    Range {
        /// Lower bound.
        minimum: f64,
        /// Upper bound.
        maximum: f64,
        /// Step size.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        step: Option<f64>,
    },
    /// Fixed set of allowed values.
    Enum {
        /// Allowed values, in declaration order.
        allowed_values: Vec<ParamValue>,
        /// Optional display labels, parallel to `allowed_values` when present.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        labels: Vec<Option<String>>,
    },
}

impl Constraints {
    /// Allowed values for enum constraints, empty otherwise.
    pub fn allowed_values(&self) -> &[ParamValue] {
        match self {
            Constraints::Enum { allowed_values, .. } => allowed_values,
            _ => &[],
        }
    }

    /// `(minimum, maximum)` for range constraints.
    pub fn bounds(&self) -> Option<(f64, f64)> {
        match *self {
            Constraints::Range {
                minimum, maximum, ..
            } => Some((minimum, maximum)),
            _ => None,
        }
    }
}

/// Presentation hint for the (external) form layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UiHint {
    /// Numeric entry without bounds.
    Spinbox,
    /// Bounded numeric entry.
    Slider,
    /// Native boolean.
    Checkbox,
    /// Pick one of several values.
    Dropdown,
    /// Two-state string enum such as `yes`/`no`; the value stays a string.
    Toggle,
    /// Free text.
    Textbox,
}

/// A named section of the parameter form.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    /// Stable unique id.
    pub id: String,
    /// Display label as written in source.
    pub label: String,
    /// Sort hint; ties resolve by source order.
    pub order: i32,
    /// Start collapsed.
    #[serde(default)]
    pub collapsed: bool,
    /// Hidden from default presentation.
    #[serde(default)]
    pub hidden: bool,
}

/// One adjustable parameter.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    /// Identifier as written in source (may carry the `$` sigil).
    pub id: String,
    /// Declared type.
    #[serde(rename = "type")]
    pub param_type: ParamType,
    /// Default value from source; never mutated after normalization.
    pub default: ParamValue,
    /// Type-dependent constraints.
    pub constraints: Constraints,
    /// Owning group id.
    pub group: String,
    /// Sort hint within the group; ties resolve by source order.
    pub order: i32,
    /// Display unit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// Help text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
    /// Hidden from default presentation but still passed to the engine.
    #[serde(default)]
    pub hidden: bool,
    /// Visibility condition; `None` means always active.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependency: Option<Condition>,
    /// Presentation hint.
    pub ui_hint: UiHint,
}

/// Normalized, UI-ready parameter schema for one document.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaModel {
    /// Groups in presentation order.
    pub groups: Vec<Group>,
    /// Parameters in presentation order.
    pub parameters: Vec<Parameter>,
}

impl SchemaModel {
    /// Look up a parameter by id.
    pub fn parameter(&self, id: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.id == id)
    }

    /// Look up a group by id.
    pub fn group(&self, id: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.id == id)
    }

    /// Parameters belonging to `group_id`, in presentation order.
    pub fn parameters_in<'a>(&'a self, group_id: &'a str) -> impl Iterator<Item = &'a Parameter> {
        self.parameters.iter().filter(move |p| p.group == group_id)
    }

    /// Snapshot holding every parameter's default.
    pub fn defaults(&self) -> ParamSnapshot {
        self.parameters
            .iter()
            .map(|p| (p.id.clone(), p.default.clone()))
            .collect()
    }

    /// Whether `param_id`'s dependency holds for `values`. Unknown ids are inactive.
    pub fn is_active(&self, param_id: &str, values: &ParamSnapshot) -> bool {
        match self.parameter(param_id) {
            Some(p) => p.dependency.as_ref().is_none_or(|c| c.evaluate(values)),
            None => false,
        }
    }

    /// Coerce an edit snapshot onto this schema.
    ///
    /// Unknown ids are dropped, missing ids take their default, numeric-looking strings become
    /// numbers, numeric values are clamped into range, and values that cannot be coerced (or are
    /// not members of an enum) fall back to the default.
    pub fn sanitize(&self, snapshot: &ParamSnapshot) -> ParamSnapshot {
        let mut out = ParamSnapshot::new();
        for p in &self.parameters {
            let value = snapshot
                .get(&p.id)
                .and_then(|v| p.coerce(v))
                .unwrap_or_else(|| p.default.clone());
            out.insert(p.id.clone(), value);
        }
        out
    }
}

impl Parameter {
    /// Coerce one value onto this parameter's type and constraints.
    ///
    /// Numbers are clamped into range. `None` means the value cannot stand for this parameter,
    /// such as a non-member of an enum or a word that is not a boolean.
    pub fn coerce(&self, v: &ParamValue) -> Option<ParamValue> {
        coerce_to(self, v)
    }
}

fn coerce_to(p: &Parameter, v: &ParamValue) -> Option<ParamValue> {
    match p.param_type {
        ParamType::Integer => {
            let x = v.coerce_f64()?;
            let x = clamp_to(&p.constraints, x).round();
            if x.abs() >= i64::MAX as f64 {
                return None;
            }
            Some(ParamValue::Integer(x as i64))
        }
        ParamType::Number => {
            let x = v.coerce_f64()?;
            x.is_finite()
                .then(|| ParamValue::Number(clamp_to(&p.constraints, x)))
        }
        ParamType::Boolean => match v {
            ParamValue::Boolean(b) => Some(ParamValue::Boolean(*b)),
            ParamValue::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Some(ParamValue::Boolean(true)),
                "false" => Some(ParamValue::Boolean(false)),
                _ => None,
            },
            ParamValue::Integer(i) => Some(ParamValue::Boolean(*i != 0)),
            ParamValue::Number(_) => None,
        },
        ParamType::String => Some(match v {
            ParamValue::String(s) => ParamValue::String(s.clone()),
            other => ParamValue::String(other.to_string()),
        }),
        ParamType::EnumOfString => {
            let text = v.to_string();
            p.constraints
                .allowed_values()
                .iter()
                .find(|a| a.as_str() == Some(text.as_str()))
                .cloned()
        }
        ParamType::EnumOfNumber => {
            let x = v.coerce_f64()?;
            p.constraints
                .allowed_values()
                .iter()
                .find(|a| a.as_f64() == Some(x))
                .cloned()
        }
    }
}

fn clamp_to(c: &Constraints, x: f64) -> f64 {
    match c.bounds() {
        Some((lo, hi)) if lo <= hi => x.clamp(lo, hi),
        _ => x,
    }
}

/// Turn a group label into a stable id: lower-case, non-alphanumeric runs become one hyphen,
/// edge hyphens trimmed.
pub fn slugify(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    let mut pending_hyphen = false;
    for c in label.chars() {
        if c.is_alphanumeric() {
            if pending_hyphen && !out.is_empty() {
                out.push('-');
            }
            pending_hyphen = false;
            out.extend(c.to_lowercase());
        } else {
            pending_hyphen = true;
        }
    }
    out
}

#[cfg(test)]
#[path = "../../tests/unit/schema/model.rs"]
mod tests;
