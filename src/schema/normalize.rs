use std::collections::{HashMap, HashSet};

use crate::schema::diagnostic::{Diagnostic, DiagnosticKind};
use crate::schema::model::{
    Constraints, DEFAULT_GROUP_ID, DEFAULT_GROUP_LABEL, Group, ParamType, Parameter, SchemaModel,
    UiHint,
};
use crate::schema::value::ParamValue;

/// Validate and repair a schema, independent of how it was produced.
///
/// Never rejects: unresolved groups fall back to the default group, out-of-range numeric defaults
/// are clamped, invalid enum defaults are replaced by the first allowed value, and every repair is
/// reported as a diagnostic. Groups and parameters come back sorted by `order`, ties broken by
/// their incoming position.
pub fn normalize(mut schema: SchemaModel) -> (SchemaModel, Vec<Diagnostic>) {
    let mut diags = Vec::new();

    dedupe_groups(&mut schema.groups, &mut diags);
    resolve_groups(&mut schema, &mut diags);
    for p in &mut schema.parameters {
        repair_constraints(p, &mut diags);
        repair_default(p, &mut diags);
    }
    resolve_dependencies(&mut schema.parameters, &mut diags);
    sort_schema(&mut schema);

    (schema, diags)
}

fn dedupe_groups(groups: &mut Vec<Group>, diags: &mut Vec<Diagnostic>) {
    let mut seen = HashSet::<String>::new();
    groups.retain(|g| {
        if seen.insert(g.id.clone()) {
            true
        } else {
            diags.push(Diagnostic::unplaced(
                DiagnosticKind::DuplicateGroup,
                format!("group id \"{}\" declared more than once; keeping the first", g.id),
            ));
            false
        }
    });
}

fn resolve_groups(schema: &mut SchemaModel, diags: &mut Vec<Diagnostic>) {
    let known: HashSet<String> = schema.groups.iter().map(|g| g.id.clone()).collect();
    let mut need_default = false;
    for p in &mut schema.parameters {
        if !known.contains(&p.group) {
            diags.push(Diagnostic::unplaced(
                DiagnosticKind::UnresolvedGroup,
                format!(
                    "parameter \"{}\" references unknown group \"{}\"; moved to \"{DEFAULT_GROUP_ID}\"",
                    p.id, p.group
                ),
            ));
            p.group = DEFAULT_GROUP_ID.to_owned();
            need_default = true;
        }
    }
    if need_default && !known.contains(DEFAULT_GROUP_ID) {
        let order = schema.groups.iter().map(|g| g.order).max().map_or(0, |o| o + 1);
        schema.groups.push(Group {
            id: DEFAULT_GROUP_ID.to_owned(),
            label: DEFAULT_GROUP_LABEL.to_owned(),
            order,
            collapsed: false,
            hidden: false,
        });
    }
    let hidden_groups: HashSet<&str> = schema
        .groups
        .iter()
        .filter(|g| g.hidden)
        .map(|g| g.id.as_str())
        .collect();
    for p in &mut schema.parameters {
        if hidden_groups.contains(p.group.as_str()) {
            p.hidden = true;
        }
    }
}

fn repair_constraints(p: &mut Parameter, diags: &mut Vec<Diagnostic>) {
    let mut notes = Vec::<String>::new();
    let constraints = std::mem::replace(&mut p.constraints, Constraints::None);
    p.constraints = match constraints {
        Constraints::None => {
            if p.param_type.is_enum() {
                notes.push("enum parameter has no allowed values".to_owned());
                p.param_type = fallback_type(&p.default);
                p.ui_hint = hint_for_type(p.param_type);
            }
            Constraints::None
        }
        Constraints::Range {
            mut minimum,
            mut maximum,
            mut step,
        } => {
            if !p.param_type.is_numeric() {
                notes.push(format!(
                    "range constraint on a {:?} parameter dropped",
                    p.param_type
                ));
                Constraints::None
            } else if !minimum.is_finite() || !maximum.is_finite() {
                notes.push("range bounds must be finite; constraint dropped".to_owned());
                p.ui_hint = UiHint::Spinbox;
                Constraints::None
            } else {
                if minimum > maximum {
                    std::mem::swap(&mut minimum, &mut maximum);
                    notes.push(format!("inverted range swapped to [{minimum}:{maximum}]"));
                }
                if step.is_some_and(|s| !s.is_finite() || s <= 0.0) {
                    step = None;
                    notes.push("non-positive step dropped".to_owned());
                }
                Constraints::Range {
                    minimum,
                    maximum,
                    step,
                }
            }
        }
        Constraints::Enum {
            allowed_values,
            labels,
        } => repair_enum(p, allowed_values, labels, &mut notes),
    };
    for note in notes {
        diags.push(Diagnostic::unplaced(
            DiagnosticKind::InvalidConstraint,
            format!("parameter \"{}\": {note}", p.id),
        ));
    }
}

fn repair_enum(
    p: &mut Parameter,
    allowed_values: Vec<ParamValue>,
    labels: Vec<Option<String>>,
    notes: &mut Vec<String>,
) -> Constraints {
    let has_labels = !labels.is_empty();
    let mut labels = labels.into_iter();
    let mut pairs: Vec<(ParamValue, Option<String>)> = allowed_values
        .into_iter()
        .map(|v| (v, labels.next().flatten()))
        .collect();

    match p.param_type {
        ParamType::EnumOfNumber => {
            let before = pairs.len();
            pairs.retain(|(v, _)| v.is_numeric());
            if pairs.len() != before {
                notes.push("non-numeric values removed from numeric enum".to_owned());
            }
        }
        ParamType::EnumOfString => {
            for (v, _) in &mut pairs {
                if !matches!(v, ParamValue::String(_)) {
                    *v = ParamValue::String(v.to_string());
                }
            }
        }
        _ => {}
    }

    if pairs.is_empty() {
        notes.push("enum has no allowed values; constraint dropped".to_owned());
        if p.param_type.is_enum() {
            p.param_type = fallback_type(&p.default);
            p.ui_hint = hint_for_type(p.param_type);
        }
        return Constraints::None;
    }

    if !p.param_type.is_enum() {
        p.param_type = if pairs.iter().all(|(v, _)| v.is_numeric()) {
            ParamType::EnumOfNumber
        } else {
            ParamType::EnumOfString
        };
        p.ui_hint = UiHint::Dropdown;
        notes.push("enum constraint implies an enum type".to_owned());
    }

    let keep_labels = has_labels && pairs.iter().any(|(_, l)| l.is_some());
    let (allowed_values, labels): (Vec<_>, Vec<_>) = pairs.into_iter().unzip();
    Constraints::Enum {
        allowed_values,
        labels: if keep_labels { labels } else { Vec::new() },
    }
}

fn repair_default(p: &mut Parameter, diags: &mut Vec<Diagnostic>) {
    match p.param_type {
        ParamType::Integer | ParamType::Number => repair_numeric_default(p, diags),
        ParamType::Boolean => {
            if p.default.as_bool().is_none() {
                substitute(p, ParamValue::Boolean(false), diags);
            }
        }
        ParamType::String => {
            if !matches!(p.default, ParamValue::String(_)) {
                p.default = ParamValue::String(p.default.to_string());
            }
        }
        ParamType::EnumOfString | ParamType::EnumOfNumber => {
            let allowed = p.constraints.allowed_values();
            if let Some(member) = allowed.iter().find(|a| a.value_eq(&p.default)) {
                p.default = member.clone();
                return;
            }
            // `x = 10; // ["10", "20"]` names a member by text, `x = "20"; // [10, 20]` by value.
            let named = match p.param_type {
                ParamType::EnumOfString => {
                    let text = p.default.to_string();
                    allowed.iter().find(|a| a.as_str() == Some(text.as_str()))
                }
                _ => p
                    .default
                    .coerce_f64()
                    .and_then(|x| allowed.iter().find(|a| a.as_f64() == Some(x))),
            };
            if let Some(member) = named {
                p.default = member.clone();
                return;
            }
            if let Some(first) = allowed.first().cloned() {
                substitute(p, first, diags);
            }
        }
    }
}

fn repair_numeric_default(p: &mut Parameter, diags: &mut Vec<Diagnostic>) {
    let Some(mut x) = p.default.as_f64().filter(|x| x.is_finite()) else {
        let replacement = p.constraints.bounds().map_or(0.0, |(lo, _)| lo);
        let replacement = typed_number(p.param_type, replacement);
        substitute(p, replacement, diags);
        return;
    };
    if let Some((lo, hi)) = p.constraints.bounds() {
        if x < lo || x > hi {
            let clamped = x.clamp(lo, hi);
            diags.push(Diagnostic::unplaced(
                DiagnosticKind::ClampedDefault,
                format!(
                    "default {} of \"{}\" outside [{lo}:{hi}]; clamped to {clamped}",
                    p.default, p.id
                ),
            ));
            x = clamped;
        }
    }
    p.default = typed_number(p.param_type, x);
}

fn typed_number(t: ParamType, x: f64) -> ParamValue {
    if t == ParamType::Integer {
        ParamValue::Integer(x.round() as i64)
    } else {
        ParamValue::Number(x)
    }
}

fn substitute(p: &mut Parameter, replacement: ParamValue, diags: &mut Vec<Diagnostic>) {
    diags.push(Diagnostic::unplaced(
        DiagnosticKind::SubstitutedDefault,
        format!(
            "default {} of \"{}\" is not valid for {:?}; using {}",
            p.default.to_literal(),
            p.id,
            p.param_type,
            replacement.to_literal()
        ),
    ));
    p.default = replacement;
}

fn resolve_dependencies(params: &mut [Parameter], diags: &mut Vec<Diagnostic>) {
    let ids: HashSet<String> = params.iter().map(|p| p.id.clone()).collect();
    for p in params.iter_mut() {
        let Some(dep) = p.dependency.as_ref() else {
            continue;
        };
        let unresolved = dep
            .referenced_params()
            .into_iter()
            .find(|r| !ids.contains(*r) || *r == p.id)
            .map(str::to_owned);
        if let Some(r) = unresolved {
            diags.push(Diagnostic::unplaced(
                DiagnosticKind::UnresolvedDependency,
                format!("dependency of \"{}\" references \"{r}\"; dropped", p.id),
            ));
            p.dependency = None;
        }
    }
}

fn sort_schema(schema: &mut SchemaModel) {
    // `sort_by_key` is stable, so incoming position breaks ties.
    schema.groups.sort_by_key(|g| g.order);
    let rank: HashMap<&str, usize> = schema
        .groups
        .iter()
        .enumerate()
        .map(|(i, g)| (g.id.as_str(), i))
        .collect();
    let mut keyed: Vec<(usize, i32, Parameter)> = std::mem::take(&mut schema.parameters)
        .into_iter()
        .map(|p| (rank.get(p.group.as_str()).copied().unwrap_or(usize::MAX), p.order, p))
        .collect();
    keyed.sort_by_key(|(g, o, _)| (*g, *o));
    schema.parameters = keyed.into_iter().map(|(_, _, p)| p).collect();
}

pub(crate) fn fallback_type(default: &ParamValue) -> ParamType {
    match default {
        ParamValue::Integer(_) => ParamType::Integer,
        ParamValue::Number(_) => ParamType::Number,
        ParamValue::Boolean(_) => ParamType::Boolean,
        ParamValue::String(_) => ParamType::String,
    }
}

pub(crate) fn hint_for_type(t: ParamType) -> UiHint {
    match t {
        ParamType::Integer | ParamType::Number => UiHint::Spinbox,
        ParamType::Boolean => UiHint::Checkbox,
        ParamType::String => UiHint::Textbox,
        ParamType::EnumOfString | ParamType::EnumOfNumber => UiHint::Dropdown,
    }
}

#[cfg(test)]
#[path = "../../tests/unit/schema/normalize.rs"]
mod tests;
