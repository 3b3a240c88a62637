use super::*;
use crate::schema::dependency::Condition;
use crate::schema::diagnostic::DiagnosticKind;
use crate::schema::model::{Constraints, DEFAULT_GROUP_ID, ParamType, UiHint};
use crate::schema::value::ParamValue;

fn kinds(parsed: &ParsedSchema) -> Vec<DiagnosticKind> {
    parsed.diagnostics.iter().map(|d| d.kind).collect()
}

#[test]
fn parameters_before_any_header_land_in_default_group() {
    let parsed = parse("a = 1;\nb = \"x\";\n");
    assert_eq!(parsed.schema.groups.len(), 1);
    assert_eq!(parsed.schema.groups[0].id, DEFAULT_GROUP_ID);
    assert!(parsed.schema.parameters.iter().all(|p| p.group == DEFAULT_GROUP_ID));
    assert!(parsed.diagnostics.is_empty());
}

#[test]
fn empty_and_code_only_sources_yield_empty_schema() {
    for src in ["", "\n\n", "cube([10, 10, 10]);\nmodule m() { x = 1; }\n"] {
        let parsed = parse(src);
        assert!(parsed.schema.parameters.is_empty(), "{src:?}");
        assert!(parsed.schema.groups.is_empty(), "{src:?}");
    }
}

#[test]
fn nested_and_block_commented_assignments_are_ignored() {
    let src = "\
module body() {
    inner = 5;
}
/*
commented = 3;
*/
outer = 7;
";
    let parsed = parse(src);
    let ids: Vec<&str> = parsed.schema.parameters.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["outer"]);
}

#[test]
fn preceding_comments_and_directives_attach_to_next_assignment() {
    let src = "\
// Thickness of the walls
// in millimetres
// @unit mm
// @order 7
wall = 2; // [1:5]

// orphaned help

lid = true;
";
    let parsed = parse(src);
    let wall = parsed.schema.parameter("wall").unwrap();
    assert_eq!(wall.help.as_deref(), Some("Thickness of the walls\nin millimetres"));
    assert_eq!(wall.unit.as_deref(), Some("mm"));
    assert_eq!(wall.order, 7);
    let lid = parsed.schema.parameter("lid").unwrap();
    assert_eq!(lid.help, None);
    assert_eq!(lid.ui_hint, UiHint::Checkbox);
}

#[test]
fn trailing_description_wins_over_preceding_help_and_tail_fills_in() {
    let parsed = parse("// above\nx = 1; // beside\ny = 2; // [0:10] travel\n");
    assert_eq!(
        parsed.schema.parameter("x").unwrap().help.as_deref(),
        Some("beside")
    );
    assert_eq!(
        parsed.schema.parameter("y").unwrap().help.as_deref(),
        Some("travel")
    );
}

#[test]
fn integer_and_decimal_ranges() {
    let parsed = parse("n = 3; // [1:10]\nd = 0.5; // [0:1]\nm = 4; // [8]\n");
    let n = parsed.schema.parameter("n").unwrap();
    assert_eq!(n.param_type, ParamType::Integer);
    assert_eq!(
        n.constraints,
        Constraints::Range {
            minimum: 1.0,
            maximum: 10.0,
            step: Some(1.0),
        }
    );
    let d = parsed.schema.parameter("d").unwrap();
    assert_eq!(d.param_type, ParamType::Number);
    assert_eq!(
        d.constraints,
        Constraints::Range {
            minimum: 0.0,
            maximum: 1.0,
            step: None,
        }
    );
    let m = parsed.schema.parameter("m").unwrap();
    assert_eq!(m.constraints.bounds(), Some((0.0, 8.0)));
}

#[test]
fn out_of_range_default_is_clamped_with_warning() {
    let parsed = parse("w = 500; // [10:100]\n");
    let w = parsed.schema.parameter("w").unwrap();
    assert_eq!(w.default, ParamValue::Integer(100));
    assert_eq!(kinds(&parsed), vec![DiagnosticKind::ClampedDefault]);
}

#[test]
fn numeric_enum_drops_non_numeric_members() {
    let parsed = parse("size = 10; // [10, 20, large, \"30\"]\n");
    let size = parsed.schema.parameter("size").unwrap();
    assert_eq!(size.param_type, ParamType::EnumOfNumber);
    assert_eq!(
        size.constraints.allowed_values(),
        &[ParamValue::Integer(10), ParamValue::Integer(20)]
    );
    assert_eq!(kinds(&parsed), vec![DiagnosticKind::MixedEnum]);
    assert_eq!(parsed.diagnostics[0].line_number, Some(1));
}

#[test]
fn string_enum_keeps_numeric_looking_members_as_strings() {
    let parsed = parse("shape = \"hex\"; // [hex, 6, \"a, b\"]\n");
    let shape = parsed.schema.parameter("shape").unwrap();
    assert_eq!(shape.param_type, ParamType::EnumOfString);
    assert_eq!(
        shape.constraints.allowed_values(),
        &[
            ParamValue::from("hex"),
            ParamValue::from("6"),
            ParamValue::from("a, b")
        ]
    );
}

#[test]
fn enum_labels_are_kept() {
    let parsed = parse("q = 2; // [1:Draft, 2:Normal, 3:Fine]\n");
    let Constraints::Enum { labels, .. } = &parsed.schema.parameter("q").unwrap().constraints else {
        panic!("expected enum");
    };
    assert_eq!(
        labels,
        &vec![
            Some("Draft".to_owned()),
            Some("Normal".to_owned()),
            Some("Fine".to_owned())
        ]
    );
}

#[test]
fn malformed_hint_downgrades_to_description() {
    let parsed = parse("h = 4; // [1:2\n");
    let h = parsed.schema.parameter("h").unwrap();
    assert_eq!(h.help.as_deref(), Some("[1:2"));
    assert_eq!(h.constraints, Constraints::None);
    assert_eq!(kinds(&parsed), vec![DiagnosticKind::MalformedHint]);
}

#[test]
fn range_hint_on_string_is_a_type_mismatch() {
    let parsed = parse("s = \"a\"; // [1:10]\n");
    let s = parsed.schema.parameter("s").unwrap();
    assert_eq!(s.param_type, ParamType::String);
    assert_eq!(kinds(&parsed), vec![DiagnosticKind::HintTypeMismatch]);
}

#[test]
fn unterminated_string_consumes_rest_of_line() {
    let parsed = parse("label = \"open; // [a, b]\n");
    let label = parsed.schema.parameter("label").unwrap();
    assert_eq!(label.default, ParamValue::from("open; // [a, b]"));
    assert_eq!(label.constraints, Constraints::None);
    assert_eq!(kinds(&parsed), vec![DiagnosticKind::UnterminatedString]);
}

#[test]
fn expression_values_are_skipped() {
    let parsed = parse("a = 2;\nb = a * 2;\nc = [1, 2];\n");
    assert!(parsed.schema.parameter("b").is_none());
    assert!(parsed.schema.parameter("c").is_none());
    assert_eq!(
        kinds(&parsed),
        vec![DiagnosticKind::UnsupportedValue, DiagnosticKind::UnsupportedValue]
    );
}

#[test]
fn duplicate_ids_last_wins() {
    let parsed = parse("w = 1;\nh = 2;\nw = 3; // [0:10]\n");
    let ids: Vec<&str> = parsed.schema.parameters.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["h", "w"]);
    assert_eq!(parsed.schema.parameter("w").unwrap().default, ParamValue::Integer(3));
    assert_eq!(kinds(&parsed), vec![DiagnosticKind::DuplicateParameter]);
    assert_eq!(parsed.diagnostics[0].line_number, Some(3));
}

#[test]
fn hidden_group_and_header_attributes() {
    let src = "\
/* [Hidden] */
secret = 1;
/* [Lid & Hinge] order=-1 collapsed */
hinge = 2;
/* [Extra] id=x hidden */
extra = 3;
";
    let parsed = parse(src);
    let ids: Vec<&str> = parsed.schema.groups.iter().map(|g| g.id.as_str()).collect();
    assert_eq!(ids, vec!["lid-hinge", "hidden", "x"]);
    assert!(parsed.schema.group("lid-hinge").unwrap().collapsed);
    assert!(parsed.schema.parameter("secret").unwrap().hidden);
    assert!(parsed.schema.parameter("extra").unwrap().hidden);
    assert!(!parsed.schema.parameter("hinge").unwrap().hidden);
}

#[test]
fn repeated_header_reenters_group() {
    let parsed = parse("/* [A] */\na = 1;\n/* [B] */\nb = 2;\n/* [A] */\nc = 3;\n");
    assert_eq!(parsed.schema.groups.len(), 2);
    let in_a: Vec<&str> = parsed.schema.parameters_in("a").map(|p| p.id.as_str()).collect();
    assert_eq!(in_a, vec!["a", "c"]);
}

#[test]
fn depends_directive_builds_condition() {
    let src = "\
shape = \"round\"; // [round, square]
lid = true;
// @depends shape == round && lid
radius = 3;
// @depends missing == 1
orphan = 1;
// @depends shape ==
broken = 1;
";
    let parsed = parse(src);
    assert_eq!(
        parsed.schema.parameter("radius").unwrap().dependency,
        Some(Condition::All {
            conditions: vec![
                Condition::Equals {
                    param: "shape".into(),
                    value: ParamValue::from("round"),
                },
                Condition::Equals {
                    param: "lid".into(),
                    value: ParamValue::Boolean(true),
                },
            ],
        })
    );
    assert!(parsed.schema.parameter("orphan").unwrap().dependency.is_none());
    assert!(parsed.schema.parameter("broken").unwrap().dependency.is_none());
    assert_eq!(
        kinds(&parsed),
        vec![
            DiagnosticKind::MalformedDependency,
            DiagnosticKind::UnresolvedDependency
        ]
    );

    let mut values = parsed.schema.defaults();
    assert!(parsed.schema.is_active("radius", &values));
    values.insert("shape".into(), ParamValue::from("square"));
    assert!(!parsed.schema.is_active("radius", &values));
}

#[test]
fn deeply_nested_depends_is_a_diagnostic() {
    let src = format!(
        "a = 1;\n// @depends {}a == 1{}\nb = 2;\nc = 3;\n",
        "(".repeat(200_000),
        ")".repeat(200_000)
    );
    let parsed = parse(&src);
    let ids: Vec<&str> = parsed.schema.parameters.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
    assert!(parsed.schema.parameter("b").unwrap().dependency.is_none());
    assert_eq!(kinds(&parsed), vec![DiagnosticKind::MalformedDependency]);
    assert_eq!(parsed.diagnostics[0].line_number, Some(2));
    assert!(parsed.diagnostics[0].message.contains("nested too deeply"));
}

#[test]
fn repeated_depends_lines_stay_flat() {
    let mut src = String::from("a = 1;\n");
    for i in 0..5_000 {
        src.push_str(&format!("// @depends a != {i}\n"));
    }
    src.push_str("b = 2;\n");
    let parsed = parse(&src);
    let dep = parsed.schema.parameter("b").unwrap().dependency.clone();
    let Some(Condition::All { conditions }) = dep else {
        panic!("expected a conjunction");
    };
    assert_eq!(conditions.len(), 5_000);
    assert!(conditions.iter().all(|c| matches!(c, Condition::NotEquals { .. })));
    assert!(parsed.diagnostics.is_empty(), "{:?}", parsed.diagnostics);
}

#[test]
fn quoted_number_default_selects_numeric_member() {
    let parsed = parse("size = \"20\"; // [10, 20, 30]\n");
    let size = parsed.schema.parameter("size").unwrap();
    assert_eq!(size.param_type, ParamType::EnumOfNumber);
    assert_eq!(size.default, ParamValue::Integer(20));
    assert!(!kinds(&parsed).contains(&DiagnosticKind::SubstitutedDefault));
}

#[test]
fn group_directive_moves_a_parameter() {
    let src = "/* [A] */\n/* [B] */\n// @group a\nx = 1;\n// @group nope\ny = 2;\n";
    let parsed = parse(src);
    assert_eq!(parsed.schema.parameter("x").unwrap().group, "a");
    assert_eq!(parsed.schema.parameter("y").unwrap().group, DEFAULT_GROUP_ID);
    assert_eq!(kinds(&parsed), vec![DiagnosticKind::UnresolvedGroup]);
}

#[test]
fn line_endings_and_bom() {
    let a = parse("\u{feff}/*[Dims]*/\r\nwidth = 50; // [10:100]\r\n");
    let b = parse("/*[Dims]*/\rwidth = 50; // [10:100]\r");
    let c = parse("/*[Dims]*/\nwidth = 50; // [10:100]\n");
    assert_eq!(a, c);
    assert_eq!(b, c);
}

#[test]
fn non_utf8_bytes_are_the_only_hard_error() {
    let err = parse_bytes(&[b'a', b'=', 0xff, b';']).unwrap_err();
    assert!(matches!(err, ParamcadError::Encoding(_)));
    assert!(parse_bytes(b"x = 1;").is_ok());
}

#[test]
fn sigil_identifiers_are_parameters() {
    let parsed = parse("$fn = 64; // [8:128]\n");
    let p = parsed.schema.parameter("$fn").unwrap();
    assert_eq!(p.param_type, ParamType::Integer);
}
