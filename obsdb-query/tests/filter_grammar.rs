//! Grammar acceptance corpus: strings the filter compiler must accept and
//! reject, plus the parameterization contract on the worked example.

use obsdb_core::EntityType;
use obsdb_query::{parse_filter, translate, FilterError, ParamValue, QueryOptions};

const ACCEPTED: &[&str] = &[
    "result eq 21.5",
    "result ne 0",
    "result gt -5",
    "result ge 10 and result le 20",
    "not result lt 0",
    "phenomenonTime ge 2024-01-01T00:00:00Z and phenomenonTime lt 2024-02-01T00:00:00Z",
    "(result gt 10 or result lt -10) and resultQuality eq 'checked'",
    "year(phenomenonTime) eq 2024",
    "month(phenomenonTime) ne 2",
    "round(result) eq 22",
    "floor(result) ge 21",
    "ceiling(result) le 22",
    "resultTime eq null",
    "syncBatchId eq 'batch-7'",
    "Datastream/name eq 'air temp'",
    "Datastream/Thing/name eq 'Weather Station 12'",
    "contains(Datastream/name,'temp') and result gt 20",
];

const REJECTED_SYNTAX: &[&str] = &[
    "",
    "result gt",
    "gt 20",
    "(result gt 20",
    "result gt 20)",
    "result gt 20 and",
    "contains(name 'x')",
    "name eq 'unterminated",
    "result ?? 20",
    "Datastream/ eq 'x'",
];

const REJECTED_UNSUPPORTED: &[&str] = &[
    "now() gt 2024-01-01T00:00:00Z",
    "fractionalseconds(phenomenonTime) eq 0",
    "totaloffsetminutes(phenomenonTime) eq 0",
    "cast(result,'Edm.String') eq '1'",
];

#[test]
fn test_accepted_corpus_parses_and_translates() {
    for filter in ACCEPTED {
        let expr = parse_filter(filter)
            .unwrap_or_else(|e| panic!("'{}' must parse, got {:?}", filter, e));
        translate(Some(&expr), EntityType::Observation, &QueryOptions::default())
            .unwrap_or_else(|e| panic!("'{}' must translate, got {:?}", filter, e));
    }
}

#[test]
fn test_rejected_corpus_is_syntax_errors() {
    for filter in REJECTED_SYNTAX {
        match parse_filter(filter) {
            Err(FilterError::Syntax { .. }) => {}
            other => panic!("'{}' must be a syntax error, got {:?}", filter, other),
        }
    }
}

#[test]
fn test_unknown_functions_are_reported_as_unsupported() {
    for filter in REJECTED_UNSUPPORTED {
        match parse_filter(filter) {
            Err(FilterError::UnsupportedFunction { .. }) => {}
            other => panic!("'{}' must be unsupported-function, got {:?}", filter, other),
        }
    }
}

#[test]
fn test_parse_is_deterministic_across_runs() {
    for filter in ACCEPTED {
        let a = parse_filter(filter).unwrap();
        let b = parse_filter(filter).unwrap();
        assert_eq!(a, b, "'{}' must parse deterministically", filter);
    }
}

#[test]
fn test_worked_example_binds_both_literals() {
    let expr = parse_filter("contains(Datastream/name,'Weather') and result gt 20").unwrap();
    let q = translate(Some(&expr), EntityType::Observation, &QueryOptions::default()).unwrap();

    assert_eq!(q.params.len(), 2);
    assert_eq!(q.params[0], ParamValue::Text("Weather".into()));
    assert_eq!(q.params[1], ParamValue::Number(20.0));

    let rendered = q.template.unwrap().to_string();
    assert!(
        !rendered.contains("Weather") && !rendered.contains("20"),
        "literals must never be interpolated into the template: {}",
        rendered
    );
}
