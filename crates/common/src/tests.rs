use super::*;
use crate::result::{QueryResult, format_value};
use types::{SqlType, Value};

fn row(pairs: &[(&str, Value)]) -> Row {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect()
}

#[test]
fn handles_compare_by_value() {
    let a = Handle::new(BlockId(1), 1);
    let b = Handle::new(BlockId(1), 1);
    let c = Handle::new(BlockId(1), 2);

    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(a.to_string(), "(1, 1)");
}

#[test]
fn error_messages_carry_taxonomy() {
    assert_eq!(
        DbError::NoRoom("not enough room for new record".into()).to_string(),
        "no room: not enough room for new record"
    );
    assert_eq!(
        DbError::Relation("unknown column 'x'".into()).to_string(),
        "relation: unknown column 'x'"
    );
    assert_eq!(
        DbError::Exec("unrecognized data type".into()).to_string(),
        "exec: unrecognized data type"
    );
}

#[test]
fn config_builder_defaults_data_dir() {
    let config = Config::builder().build();
    assert_eq!(config.data_dir, Config::default().data_dir);
}

#[test]
fn value_formatting_matches_display_rules() {
    assert_eq!(format_value(&Value::Int(-3)), "-3");
    assert_eq!(format_value(&Value::Text("hi".into())), "\"hi\"");
    assert_eq!(format_value(&Value::Bool(true)), "true");
}

#[test]
fn message_only_result_renders_bare_message() {
    let result = QueryResult::message("created foo");
    assert_eq!(result.to_string(), "created foo");
}

#[test]
fn tabular_result_renders_headers_rows_and_message() {
    let result = QueryResult::with_rows(
        vec!["table_name".into()],
        vec![SqlType::Text],
        vec![row(&[("table_name", Value::from("foo"))])],
        "successfully returned 1 rows",
    );

    let rendered = result.to_string();
    assert!(rendered.contains("table_name"));
    assert!(rendered.contains("\"foo\""));
    assert!(rendered.ends_with("successfully returned 1 rows"));
}
