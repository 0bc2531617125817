// tests/cli_tests.rs

use recordql::QueryError;
use recordql::cli::{CliError, CompileOptions, ParseOptions, execute_compile, execute_parse, parse_env};
use recordql::model::Expression;
use recordql::value::Value;

fn compile_options(dialect: &str) -> CompileOptions {
    CompileOptions {
        table: "person".to_string(),
        dialect: dialect.to_string(),
        ..Default::default()
    }
}

// ============================================================================
// Compile
// ============================================================================

#[test]
fn test_compile_whole_row() {
    assert_eq!(
        execute_compile(&compile_options("sqlite")).unwrap(),
        "SELECT json_data FROM person;"
    );
}

#[test]
fn test_compile_all_clauses() {
    let options = CompileOptions {
        what: vec!["person.handle".into(), "person.gramps_id".into()],
        where_clause: Some("person.gender == Person.MALE".into()),
        order_by: vec!["-person.gramps_id".into()],
        page: Some(3),
        page_size: Some(5),
        ..compile_options("sqlite")
    };
    assert_eq!(
        execute_compile(&options).unwrap(),
        "SELECT json_extract(person.json_data, '$.handle'), json_extract(person.json_data, '$.gramps_id') \
         FROM person WHERE (json_extract(person.json_data, '$.gender') = 1) \
         ORDER BY json_extract(person.json_data, '$.gramps_id') DESC LIMIT 5 OFFSET 10;"
    );
}

#[test]
fn test_compile_postgres() {
    let options = CompileOptions {
        what: vec!["person.handle".into()],
        ..compile_options("PostgreSQL")
    };
    assert_eq!(
        execute_compile(&options).unwrap(),
        "SELECT JSON_EXTRACT_PATH_TEXT(person.json_data, 'handle') FROM person;"
    );
}

#[test]
fn test_compile_unknown_dialect_falls_back_to_sqlite() {
    let options = CompileOptions {
        what: vec!["person.handle".into()],
        ..compile_options("oracle")
    };
    assert_eq!(
        execute_compile(&options).unwrap(),
        "SELECT json_extract(person.json_data, '$.handle') FROM person;"
    );
}

#[test]
fn test_compile_with_env() {
    let options = CompileOptions {
        where_clause: Some("person.gramps_id == WANTED".into()),
        env: Some(r#"{"WANTED": "I0042"}"#.into()),
        ..compile_options("sqlite")
    };
    assert_eq!(
        execute_compile(&options).unwrap(),
        "SELECT json_data FROM person WHERE (json_extract(person.json_data, '$.gramps_id') = 'I0042');"
    );
}

#[test]
fn test_compile_errors() {
    let options = CompileOptions {
        table: "people".into(),
        ..compile_options("sqlite")
    };
    assert!(matches!(
        execute_compile(&options),
        Err(CliError::Query(QueryError::UnknownTable(_)))
    ));

    let options = CompileOptions {
        page: Some(1),
        ..compile_options("sqlite")
    };
    let err = execute_compile(&options).unwrap_err();
    assert!(err.to_string().starts_with("Query error: Both page and page_size"));
}

// ============================================================================
// Environment
// ============================================================================

#[test]
fn test_parse_env() {
    let env = parse_env(r#"{"N": 3, "F": 1.5, "S": "x", "B": true, "Z": null}"#).unwrap();
    assert_eq!(env.get("N"), Some(&Value::Integer(3)));
    assert_eq!(env.get("F"), Some(&Value::Float(1.5)));
    assert_eq!(env.get("S"), Some(&Value::String("x".into())));
    assert_eq!(env.get("B"), Some(&Value::Boolean(true)));
    assert_eq!(env.get("Z"), Some(&Value::Null));
}

#[test]
fn test_parse_env_errors() {
    assert!(matches!(parse_env("[1, 2]"), Err(CliError::EnvNotObject)));
    assert!(matches!(parse_env("{not json"), Err(CliError::Json(_))));
}

// ============================================================================
// Parse
// ============================================================================

#[test]
fn test_parse_expression() {
    let options = ParseOptions {
        table: "person".into(),
        expression: "item.role.value".into(),
        item_var: Some("item".into()),
        array_path: Some("event_ref_list".into()),
        env: None,
    };
    let Expression::Attribute(attr) = execute_parse(&options).unwrap() else {
        panic!("expected an attribute");
    };
    assert_eq!(attr.table_name, "json_each");
    assert_eq!(attr.attribute_path, "role.value");
}

#[test]
fn test_parse_errors() {
    let options = ParseOptions {
        table: "people".into(),
        expression: "people.handle".into(),
        ..Default::default()
    };
    assert!(matches!(
        execute_parse(&options),
        Err(CliError::Query(QueryError::UnknownTable(t))) if t == "people"
    ));

    let options = ParseOptions {
        table: "person".into(),
        expression: "person.handle ==".into(),
        ..Default::default()
    };
    assert!(matches!(execute_parse(&options), Err(CliError::Parse(_))));
}
