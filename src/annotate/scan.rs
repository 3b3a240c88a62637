use crate::annotate::hint::{Classified, EnumItem, Hint, classify_comment};
use crate::annotate::line::{
    Assignment, ValueScan, brace_delta, group_header, scan_assignment,
};
use crate::expression::parse_condition;
use crate::schema::dependency::Condition;
use crate::schema::diagnostic::{Diagnostic, DiagnosticKind};
use crate::schema::model::{
    Constraints, DEFAULT_GROUP_ID, DEFAULT_GROUP_LABEL, Group, HIDDEN_GROUP_LABEL, ParamType,
    Parameter, SchemaModel, UiHint, slugify,
};
use crate::schema::normalize::{fallback_type, hint_for_type};
use crate::schema::value::ParamValue;

/// Annotations collected from comment lines directly above an assignment.
#[derive(Debug, Default)]
struct Pending {
    help: Vec<String>,
    depends: Option<Condition>,
    order: Option<i32>,
    unit: Option<String>,
    group: Option<String>,
    hidden: bool,
}

/// Line-oriented extraction state machine.
///
/// One scanner per document; all state lives here and is consumed by [`Scanner::finish`].
#[derive(Debug, Default)]
pub(crate) struct Scanner {
    groups: Vec<Group>,
    params: Vec<Parameter>,
    diags: Vec<Diagnostic>,
    current_group: Option<String>,
    pending: Pending,
    depth: i64,
    in_block_comment: bool,
    next_order: i32,
}

impl Scanner {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Feed one line (without its terminator). `line_no` is 1-based.
    pub(crate) fn feed_line(&mut self, line_no: usize, line: &str) {
        if self.in_block_comment {
            if let Some(end) = line.find("*/") {
                self.in_block_comment = false;
                self.pending = Pending::default();
                self.apply_braces(&line[end + 2..]);
            }
            return;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            self.pending = Pending::default();
            return;
        }

        if self.depth == 0 {
            if let Some((label, attrs)) = group_header(trimmed) {
                self.pending = Pending::default();
                self.open_group(line_no, label, attrs);
                return;
            }
            if let Some(body) = trimmed.strip_prefix("//") {
                self.comment(line_no, body.trim());
                return;
            }
            match scan_assignment(line) {
                Some(a) => self.assignment(line_no, a),
                None => self.pending = Pending::default(),
            }
        } else {
            self.pending = Pending::default();
        }

        self.apply_braces(line);
    }

    pub(crate) fn finish(self) -> (SchemaModel, Vec<Diagnostic>) {
        let schema = SchemaModel {
            groups: self.groups,
            parameters: self.params,
        };
        let (schema, mut repairs) = crate::schema::normalize::normalize(schema);
        let mut diags = self.diags;
        diags.append(&mut repairs);
        (schema, diags)
    }

    fn apply_braces(&mut self, code: &str) {
        self.depth = (self.depth + brace_delta(code, &mut self.in_block_comment)).max(0);
    }

    fn open_group(&mut self, line_no: usize, label: &str, attrs: &str) {
        let mut id = None;
        let mut order = None;
        let mut collapsed = false;
        let mut hidden = label.eq_ignore_ascii_case(HIDDEN_GROUP_LABEL);

        for attr in attrs.split_whitespace() {
            match attr.split_once('=') {
                Some(("id", v)) if !v.is_empty() => id = Some(v.to_owned()),
                Some(("order", v)) => match v.parse::<i32>() {
                    Ok(o) => order = Some(o),
                    Err(_) => self.diags.push(Diagnostic::at(
                        line_no,
                        DiagnosticKind::MalformedHint,
                        format!("group order \"{v}\" is not an integer"),
                    )),
                },
                None if attr == "collapsed" => collapsed = true,
                None if attr == "hidden" => hidden = true,
                _ => self.diags.push(Diagnostic::at(
                    line_no,
                    DiagnosticKind::MalformedHint,
                    format!("unknown group attribute \"{attr}\" ignored"),
                )),
            }
        }

        let mut id = id.unwrap_or_else(|| slugify(label));
        if id.is_empty() {
            id = format!("group-{}", self.groups.len() + 1);
        }

        // Repeating a header re-enters the earlier group.
        if let Some(existing) = self.groups.iter_mut().find(|g| g.id == id) {
            existing.collapsed |= collapsed;
            existing.hidden |= hidden;
            if let Some(o) = order {
                existing.order = o;
            }
        } else {
            self.groups.push(Group {
                id: id.clone(),
                label: label.to_owned(),
                order: order.unwrap_or(self.groups.len() as i32),
                collapsed,
                hidden,
            });
        }
        tracing::trace!(line_no, group = %id, "group header");
        self.current_group = Some(id);
    }

    fn comment(&mut self, line_no: usize, body: &str) {
        if body.is_empty() {
            return;
        }
        let Some(directive) = body.strip_prefix('@') else {
            self.pending.help.push(body.to_owned());
            return;
        };
        let (name, arg) = match directive.split_once(char::is_whitespace) {
            Some((n, a)) => (n, a.trim()),
            None => (directive, ""),
        };
        match name {
            "depends" => match parse_condition(arg) {
                // Repeated lines extend one conjunction.
                Ok(cond) => {
                    self.pending.depends = Some(match self.pending.depends.take() {
                        Some(Condition::All { mut conditions }) => {
                            conditions.push(cond);
                            Condition::All { conditions }
                        }
                        Some(prev) => Condition::All {
                            conditions: vec![prev, cond],
                        },
                        None => cond,
                    });
                }
                Err(e) => self.diags.push(Diagnostic::at(
                    line_no,
                    DiagnosticKind::MalformedDependency,
                    format!("{e} in \"{arg}\""),
                )),
            },
            "order" => match arg.parse::<i32>() {
                Ok(o) => self.pending.order = Some(o),
                Err(_) => self.diags.push(Diagnostic::at(
                    line_no,
                    DiagnosticKind::MalformedHint,
                    format!("@order \"{arg}\" is not an integer"),
                )),
            },
            "unit" if !arg.is_empty() => self.pending.unit = Some(arg.to_owned()),
            "group" if !arg.is_empty() => self.pending.group = Some(arg.to_owned()),
            "hidden" => self.pending.hidden = true,
            _ => self.pending.help.push(body.to_owned()),
        }
    }

    fn assignment(&mut self, line_no: usize, a: Assignment<'_>) {
        let pending = std::mem::take(&mut self.pending);
        let value = match a.value {
            ValueScan::Literal(v) => v,
            ValueScan::Unterminated(text) => {
                self.diags.push(Diagnostic::at(
                    line_no,
                    DiagnosticKind::UnterminatedString,
                    format!("unterminated string for \"{}\"; rest of line taken", a.ident),
                ));
                ParamValue::String(text)
            }
            ValueScan::Unsupported(expr) => {
                self.diags.push(Diagnostic::at(
                    line_no,
                    DiagnosticKind::UnsupportedValue,
                    format!("\"{}\" is assigned an expression ({expr}); skipped", a.ident),
                ));
                return;
            }
        };

        let classified = a.comment.map(classify_comment);
        if let Some(Classified {
            malformed: Some(reason),
            ..
        }) = &classified
        {
            self.diags.push(Diagnostic::at(
                line_no,
                DiagnosticKind::MalformedHint,
                format!("hint on \"{}\" kept as description: {reason}", a.ident),
            ));
        }

        let group = match pending.group.clone() {
            Some(g) => g,
            None => self.current_group_id(),
        };
        let group_hidden = self.groups.iter().any(|g| g.id == group && g.hidden);

        let typed = self.typed(line_no, a.ident, &value, classified.map(|c| c.hint));
        let help = typed
            .description
            .or_else(|| (!pending.help.is_empty()).then(|| pending.help.join("\n")))
            .or(typed.tail);

        let order = pending.order.unwrap_or(self.next_order);
        self.next_order += 1;

        let param = Parameter {
            id: a.ident.to_owned(),
            param_type: typed.param_type,
            default: value,
            constraints: typed.constraints,
            group,
            order,
            unit: pending.unit,
            help,
            hidden: pending.hidden || group_hidden,
            dependency: pending.depends,
            ui_hint: typed.ui_hint,
        };

        if let Some(pos) = self.params.iter().position(|p| p.id == param.id) {
            self.params.remove(pos);
            self.diags.push(Diagnostic::at(
                line_no,
                DiagnosticKind::DuplicateParameter,
                format!("\"{}\" assigned again; the last assignment wins", param.id),
            ));
        }
        self.params.push(param);
    }

    fn current_group_id(&mut self) -> String {
        if let Some(g) = &self.current_group {
            return g.clone();
        }
        if !self.groups.iter().any(|g| g.id == DEFAULT_GROUP_ID) {
            self.groups.push(Group {
                id: DEFAULT_GROUP_ID.to_owned(),
                label: DEFAULT_GROUP_LABEL.to_owned(),
                order: self.groups.len() as i32,
                collapsed: false,
                hidden: false,
            });
        }
        DEFAULT_GROUP_ID.to_owned()
    }

    fn typed(
        &mut self,
        line_no: usize,
        ident: &str,
        value: &ParamValue,
        hint: Option<Hint>,
    ) -> Typed {
        match hint {
            None => Typed::plain(value),
            Some(Hint::Description(text)) => Typed {
                description: Some(text),
                ..Typed::plain(value)
            },
            Some(Hint::Range { fields, tail }) => {
                if value.as_f64().is_none() {
                    self.diags.push(Diagnostic::at(
                        line_no,
                        DiagnosticKind::HintTypeMismatch,
                        format!("range hint on non-numeric \"{ident}\" ignored"),
                    ));
                    return Typed {
                        tail,
                        ..Typed::plain(value)
                    };
                }
                Typed {
                    tail,
                    ..range_typed(value, &fields)
                }
            }
            Some(Hint::Enum { items, tail }) => {
                let (typed, dropped) = enum_typed(&items);
                if !dropped.is_empty() {
                    self.diags.push(Diagnostic::at(
                        line_no,
                        DiagnosticKind::MixedEnum,
                        format!(
                            "numeric enum on \"{ident}\" dropped non-numeric elements: {}",
                            dropped.join(", ")
                        ),
                    ));
                }
                Typed { tail, ..typed }
            }
        }
    }
}

struct Typed {
    param_type: ParamType,
    constraints: Constraints,
    ui_hint: UiHint,
    description: Option<String>,
    tail: Option<String>,
}

impl Typed {
    fn plain(value: &ParamValue) -> Self {
        let param_type = fallback_type(value);
        Self {
            param_type,
            constraints: Constraints::None,
            ui_hint: hint_for_type(param_type),
            description: None,
            tail: None,
        }
    }
}

fn range_typed(value: &ParamValue, fields: &[ParamValue]) -> Typed {
    let nums: Vec<f64> = fields.iter().filter_map(ParamValue::as_f64).collect();
    let (minimum, step, maximum) = match nums[..] {
        [max] => (0.0, None, max),
        [min, max] => (min, None, max),
        [min, step, max] => (min, Some(step), max),
        _ => return Typed::plain(value),
    };
    let integer = matches!(value, ParamValue::Integer(_))
        && fields.iter().all(|f| matches!(f, ParamValue::Integer(_)));
    let (param_type, step) = if integer {
        (ParamType::Integer, step.or(Some(1.0)))
    } else {
        (ParamType::Number, step)
    };
    Typed {
        param_type,
        constraints: Constraints::Range {
            minimum,
            maximum,
            step,
        },
        ui_hint: UiHint::Slider,
        description: None,
        tail: None,
    }
}

/// The first element decides the enum's type. Non-numeric elements of a numeric enum are returned
/// as dropped.
fn enum_typed(items: &[EnumItem]) -> (Typed, Vec<String>) {
    let numeric = items.first().and_then(|i| i.value.as_number()).is_some();
    let mut values = Vec::with_capacity(items.len());
    let mut labels = Vec::with_capacity(items.len());
    let mut dropped = Vec::new();

    for item in items {
        let v = if numeric {
            match item.value.as_number() {
                Some(n) => n,
                None => {
                    dropped.push(item.value.text().to_owned());
                    continue;
                }
            }
        } else {
            ParamValue::String(item.value.text().to_owned())
        };
        values.push(v);
        labels.push(item.label.clone());
    }

    if labels.iter().all(Option::is_none) {
        labels.clear();
    }

    let (param_type, ui_hint) = if numeric {
        (ParamType::EnumOfNumber, UiHint::Dropdown)
    } else if is_yes_no(&values) {
        (ParamType::EnumOfString, UiHint::Toggle)
    } else {
        (ParamType::EnumOfString, UiHint::Dropdown)
    };

    let typed = Typed {
        param_type,
        constraints: Constraints::Enum {
            allowed_values: values,
            labels,
        },
        ui_hint,
        description: None,
        tail: None,
    };
    (typed, dropped)
}

fn is_yes_no(values: &[ParamValue]) -> bool {
    let [a, b] = values else {
        return false;
    };
    match (a.as_str(), b.as_str()) {
        (Some(a), Some(b)) => {
            let (a, b) = (a.to_ascii_lowercase(), b.to_ascii_lowercase());
            (a == "yes" && b == "no") || (a == "no" && b == "yes")
        }
        _ => false,
    }
}
