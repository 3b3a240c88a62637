use super::*;

fn param(id: &str, param_type: ParamType, default: ParamValue, constraints: Constraints) -> Parameter {
    Parameter {
        id: id.to_owned(),
        param_type,
        default,
        constraints,
        group: DEFAULT_GROUP_ID.to_owned(),
        order: 0,
        unit: None,
        help: None,
        hidden: false,
        dependency: None,
        ui_hint: UiHint::Spinbox,
    }
}

fn schema() -> SchemaModel {
    SchemaModel {
        groups: vec![Group {
            id: DEFAULT_GROUP_ID.to_owned(),
            label: DEFAULT_GROUP_LABEL.to_owned(),
            order: 0,
            collapsed: false,
            hidden: false,
        }],
        parameters: vec![
            param(
                "width",
                ParamType::Integer,
                ParamValue::Integer(50),
                Constraints::Range {
                    minimum: 10.0,
                    maximum: 100.0,
                    step: Some(1.0),
                },
            ),
            param(
                "shape",
                ParamType::EnumOfString,
                ParamValue::from("round"),
                Constraints::Enum {
                    allowed_values: vec!["round".into(), "square".into()],
                    labels: Vec::new(),
                },
            ),
            param(
                "teeth",
                ParamType::EnumOfNumber,
                ParamValue::Integer(8),
                Constraints::Enum {
                    allowed_values: vec![ParamValue::Integer(8), ParamValue::Integer(12)],
                    labels: Vec::new(),
                },
            ),
            param("lid", ParamType::Boolean, ParamValue::Boolean(true), Constraints::None),
            param("label", ParamType::String, ParamValue::from("box"), Constraints::None),
        ],
    }
}

#[test]
fn slugify_collapses_runs_and_trims_edges() {
    assert_eq!(slugify("Dims"), "dims");
    assert_eq!(slugify("  Lid -- Options!  "), "lid-options");
    assert_eq!(slugify("Größe 2"), "größe-2");
    assert_eq!(slugify("***"), "");
}

#[test]
fn defaults_cover_every_parameter() {
    let d = schema().defaults();
    assert_eq!(d.len(), 5);
    assert_eq!(d["width"], ParamValue::Integer(50));
    assert_eq!(d["shape"], ParamValue::from("round"));
}

#[test]
fn sanitize_coerces_clamps_and_fills() {
    let s = schema();
    let mut edit = ParamSnapshot::new();
    edit.insert("width".into(), ParamValue::from("250"));
    edit.insert("shape".into(), ParamValue::from("hex"));
    edit.insert("teeth".into(), ParamValue::from("12"));
    edit.insert("lid".into(), ParamValue::from("FALSE"));
    edit.insert("label".into(), ParamValue::Integer(7));
    edit.insert("unknown".into(), ParamValue::Integer(1));

    let out = s.sanitize(&edit);
    assert_eq!(out.len(), 5);
    assert_eq!(out["width"], ParamValue::Integer(100));
    assert_eq!(out["shape"], ParamValue::from("round"));
    assert_eq!(out["teeth"], ParamValue::Integer(12));
    assert_eq!(out["lid"], ParamValue::Boolean(false));
    assert_eq!(out["label"], ParamValue::from("7"));
    assert!(!out.contains_key("unknown"));
}

#[test]
fn sanitize_treats_value_equal_inputs_identically() {
    let s = schema();
    let a: ParamSnapshot = [("width".to_owned(), ParamValue::from("50"))].into();
    let b: ParamSnapshot = [("width".to_owned(), ParamValue::Number(50.0))].into();
    assert_eq!(s.sanitize(&a), s.sanitize(&b));
}

#[test]
fn coerce_rejects_values_a_parameter_cannot_take() {
    let s = schema();
    let shape = s.parameter("shape").unwrap();
    assert_eq!(shape.coerce(&ParamValue::from("hex")), None);
    assert_eq!(
        shape.coerce(&ParamValue::from("round")),
        Some(ParamValue::from("round"))
    );

    let lid = s.parameter("lid").unwrap();
    assert_eq!(lid.coerce(&ParamValue::from("maybe")), None);
    assert_eq!(
        lid.coerce(&ParamValue::from("True")),
        Some(ParamValue::Boolean(true))
    );

    let width = s.parameter("width").unwrap();
    assert_eq!(width.coerce(&ParamValue::from("wide")), None);
    assert_eq!(
        width.coerce(&ParamValue::from("250")),
        Some(ParamValue::Integer(100))
    );
}

#[test]
fn is_active_follows_dependency() {
    let mut s = schema();
    s.parameters[4].dependency = Some(Condition::Equals {
        param: "lid".into(),
        value: ParamValue::Boolean(true),
    });
    let mut values = s.defaults();
    assert!(s.is_active("label", &values));
    values.insert("lid".into(), ParamValue::Boolean(false));
    assert!(!s.is_active("label", &values));
    assert!(s.is_active("width", &values));
    assert!(!s.is_active("missing", &values));
}

#[test]
fn json_shape_uses_camel_case_and_type_tag() {
    let s = schema();
    let v = serde_json::to_value(&s.parameters[1]).unwrap();
    assert_eq!(v["type"], "enum-of-string");
    assert_eq!(v["constraints"]["kind"], "enum");
    assert_eq!(v["constraints"]["allowedValues"][1], "square");
    assert_eq!(v["uiHint"], "spinbox");

    let back: SchemaModel = serde_json::from_value(serde_json::to_value(&s).unwrap()).unwrap();
    assert_eq!(back, s);
}
