use std::fmt::Write as _;

use crate::schema::model::{Constraints, Group, ParamType, Parameter, SchemaModel, slugify};
use crate::schema::value::{ParamValue, format_decimal, quote};

/// Serialize a schema back into annotated source text.
///
/// Re-parsing the output yields the same id, type, default, constraints, group and order for every
/// parameter. Explicit `order`/`id` attributes are only written where the layout alone would not
/// reproduce them.
pub fn emit_source(schema: &SchemaModel) -> String {
    let mut out = String::new();
    let mut param_pos = 0i32;

    for (group_pos, group) in schema.groups.iter().enumerate() {
        let members: Vec<&Parameter> = schema.parameters_in(&group.id).collect();
        if !out.is_empty() {
            out.push('\n');
        }
        write_group_header(&mut out, group, group_pos as i32);
        for p in members {
            write_parameter(&mut out, p, group, param_pos);
            param_pos += 1;
        }
    }

    out
}

fn write_group_header(out: &mut String, g: &Group, pos: i32) {
    let _ = write!(out, "/* [{}]", g.label);
    if slugify(&g.label) != g.id {
        let _ = write!(out, " id={}", g.id);
    }
    if g.order != pos {
        let _ = write!(out, " order={}", g.order);
    }
    if g.collapsed {
        out.push_str(" collapsed");
    }
    if g.hidden && !g.label.eq_ignore_ascii_case(crate::schema::model::HIDDEN_GROUP_LABEL) {
        out.push_str(" hidden");
    }
    out.push_str(" */\n");
}

fn write_parameter(out: &mut String, p: &Parameter, g: &Group, pos: i32) {
    if let Some(help) = &p.help {
        for line in help.lines() {
            let _ = writeln!(out, "// {}", line.trim());
        }
    }
    if let Some(unit) = &p.unit {
        let _ = writeln!(out, "// @unit {unit}");
    }
    if p.order != pos {
        let _ = writeln!(out, "// @order {}", p.order);
    }
    if p.hidden && !g.hidden {
        out.push_str("// @hidden\n");
    }
    if let Some(dep) = &p.dependency {
        let _ = writeln!(out, "// @depends {}", dep.to_source());
    }

    let _ = write!(out, "{} = {};", p.id, p.default.to_literal());
    if let Some(hint) = hint_text(p) {
        let _ = write!(out, " // {hint}");
    }
    out.push('\n');
}

fn hint_text(p: &Parameter) -> Option<String> {
    match &p.constraints {
        Constraints::None => None,
        Constraints::Range {
            minimum,
            maximum,
            step,
        } => {
            let integer = p.param_type == ParamType::Integer;
            let num = |v: f64| {
                if integer && v.fract() == 0.0 {
                    format!("{}", v as i64)
                } else {
                    format_decimal(v)
                }
            };
            Some(match step {
                Some(s) if !(integer && *s == 1.0) => {
                    format!("[{}:{}:{}]", num(*minimum), num(*s), num(*maximum))
                }
                _ => format!("[{}:{}]", num(*minimum), num(*maximum)),
            })
        }
        Constraints::Enum {
            allowed_values,
            labels,
        } => {
            let items: Vec<String> = allowed_values
                .iter()
                .enumerate()
                .map(|(i, v)| {
                    let value = enum_item(v);
                    match labels.get(i).and_then(Option::as_ref) {
                        Some(label) => format!("{value}:{label}"),
                        None => value,
                    }
                })
                .collect();
            Some(format!("[{}]", items.join(", ")))
        }
    }
}

fn enum_item(v: &ParamValue) -> String {
    match v {
        ParamValue::String(s) if is_bare_word(s) => s.clone(),
        ParamValue::String(s) => quote(s),
        other => other.to_literal(),
    }
}

// Bare enum words must not look like numbers, or they would flip the enum to numeric on reparse.
fn is_bare_word(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == ' ' || c == '-')
        && !s.ends_with(' ')
}

#[cfg(test)]
#[path = "../../tests/unit/schema/emit.rs"]
mod tests;
