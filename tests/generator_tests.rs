// tests/generator_tests.rs

use recordql::ast::CmpOp;
use recordql::dialect::Dialect;
use recordql::env::Env;
use recordql::error::GenerateError;
use recordql::generator::SqlGenerator;
use recordql::model::{
    ArrayAccessExpression, ArrayExpansion, AttributeExpression, CompareExpression, Direction,
    Expression, Join, JoinType, OrderBy, SelectExpression, SelectQuery, UnionKind,
};
use recordql::query_parser::parse_expression;
use recordql::schema::FieldType;
use recordql::value::Literal;

fn parse(text: &str) -> Expression {
    parse_expression(text, "person", &Env::new(), None, None).unwrap()
}

fn sqlite(text: &str) -> String {
    SqlGenerator::new(Dialect::Sqlite)
        .generate_expression(&parse(text), "person")
        .unwrap()
}

fn postgres(text: &str) -> String {
    SqlGenerator::new(Dialect::Postgres)
        .generate_expression(&parse(text), "person")
        .unwrap()
}

fn constant(literal: Literal) -> String {
    SqlGenerator::new(Dialect::Sqlite)
        .generate_expression(&Expression::Constant(literal), "person")
        .unwrap()
}

// ============================================================================
// Literals
// ============================================================================

#[test]
fn test_literals() {
    assert_eq!(constant(Literal::Null), "null");
    assert_eq!(constant(Literal::Boolean(true)), "1");
    assert_eq!(constant(Literal::Boolean(false)), "0");
    assert_eq!(constant(Literal::Integer(-42)), "-42");
    assert_eq!(constant(Literal::Float(2.0)), "2.0");
    assert_eq!(constant(Literal::Float(2.5)), "2.5");
    assert_eq!(constant(Literal::String("O'Brien".into())), "'O''Brien'");
}

#[test]
fn test_tuple() {
    assert_eq!(sqlite("(1, 'a', None)"), "(1, 'a', null)");
}

// ============================================================================
// Attributes
// ============================================================================

#[test]
fn test_attribute_extraction() {
    assert_eq!(
        sqlite("person.primary_name.first_name"),
        "json_extract(person.json_data, '$.primary_name.first_name')"
    );
    assert_eq!(sqlite("person"), "person.json_data");
}

#[test]
fn test_postgres_typed_extraction() {
    assert_eq!(
        postgres("person.handle"),
        "JSON_EXTRACT_PATH_TEXT(person.json_data, 'handle')"
    );
    assert_eq!(
        postgres("person.gender"),
        "CAST(JSON_EXTRACT_PATH_TEXT(person.json_data, 'gender') AS NUMERIC)"
    );
    assert_eq!(
        postgres("person.private"),
        "CAST(JSON_EXTRACT_PATH_TEXT(person.json_data, 'private') AS BOOLEAN)"
    );
    assert_eq!(
        postgres("person.event_ref_list"),
        "JSON_EXTRACT_PATH(person.json_data, 'event_ref_list')"
    );
}

#[test]
fn test_database_column() {
    let mut attr = AttributeExpression::new("person", "gramps_id");
    attr.is_database_column = true;
    let sql = SqlGenerator::new(Dialect::Sqlite)
        .generate_expression(&Expression::Attribute(attr), "person")
        .unwrap();
    assert_eq!(sql, "person.gramps_id");
}

#[test]
fn test_array_element_attribute() {
    let expr = parse_expression(
        "e.role.value",
        "person",
        &Env::new(),
        Some("e"),
        Some("event_ref_list"),
    )
    .unwrap();
    let generator = SqlGenerator::new(Dialect::Sqlite);
    assert_eq!(
        generator.generate_expression(&expr, "person").unwrap(),
        "json_extract(json_each.value, '$.role.value')"
    );
    let generator = SqlGenerator::new(Dialect::Postgres);
    assert_eq!(
        generator.generate_expression(&expr, "person").unwrap(),
        "CAST(JSON_EXTRACT_PATH_TEXT(json_each.value, 'role.value') AS NUMERIC)"
    );
}

// ============================================================================
// Array Access
// ============================================================================

#[test]
fn test_constant_index() {
    assert_eq!(
        sqlite("person.event_ref_list[0]"),
        "json_extract(person.json_data, '$.event_ref_list[0]')"
    );
    assert_eq!(
        sqlite("person.event_ref_list[-1]"),
        "json_extract(person.json_data, '$.event_ref_list[#-1]')"
    );
    assert_eq!(
        sqlite("person.event_ref_list[0].ref"),
        "json_extract(person.json_data, '$.event_ref_list[0].ref')"
    );
}

#[test]
fn test_variable_index() {
    let element = "(SELECT json_each.value FROM json_each(json_extract(person.json_data, '$.event_ref_list'), '$') \
                   WHERE CAST(json_each.key AS INTEGER) = CAST(json_extract(person.json_data, '$.birth_ref_index') AS INTEGER) LIMIT 1)";
    assert_eq!(
        sqlite("person.event_ref_list[person.birth_ref_index]"),
        element
    );
    assert_eq!(
        sqlite("person.event_ref_list[person.birth_ref_index].ref"),
        format!("json_extract({}, '$.ref')", element)
    );
}

#[test]
fn test_variable_index_postgres() {
    assert_eq!(
        postgres("person.event_ref_list[person.birth_ref_index]"),
        "(SELECT json_each.value FROM LATERAL json_array_elements(JSON_EXTRACT_PATH(person.json_data, 'event_ref_list')) \
         WITH ORDINALITY AS json_each(value, ordinality) WHERE json_each.ordinality - 1 = \
         CAST(CAST(JSON_EXTRACT_PATH_TEXT(person.json_data, 'birth_ref_index') AS NUMERIC) AS INTEGER) LIMIT 1)"
    );
}

#[test]
fn test_variable_index_needs_attribute_base() {
    let expr = Expression::ArrayAccess(ArrayAccessExpression {
        base: Box::new(Expression::string("abc")),
        index: Box::new(parse("person.gender")),
        is_constant_index: false,
    });
    let err = SqlGenerator::new(Dialect::Sqlite)
        .generate_expression(&expr, "person")
        .unwrap_err();
    assert_eq!(err, GenerateError::VariableIndex("a constant".to_string()));
}

// ============================================================================
// Operators
// ============================================================================

#[test]
fn test_arithmetic() {
    let gender = "json_extract(person.json_data, '$.gender')";
    assert_eq!(sqlite("person.gender + 1"), format!("({} + 1)", gender));
    assert_eq!(sqlite("person.gender ** 2"), format!("POW({}, 2)", gender));
    assert_eq!(
        sqlite("person.gender // 2"),
        format!("(CAST(({} / 2) AS INTEGER))", gender)
    );
    assert_eq!(sqlite("-person.gender"), format!("-{}", gender));
}

#[test]
fn test_negated_negative_is_parenthesized() {
    let mut env = Env::new();
    env.insert("LOWEST".to_string(), recordql::Value::Integer(i64::MIN));
    let expr = parse_expression("-LOWEST", "person", &env, None, None).unwrap();
    assert_eq!(
        SqlGenerator::new(Dialect::Sqlite)
            .generate_expression(&expr, "person")
            .unwrap(),
        "-(-9223372036854775808)"
    );
}

#[test]
fn test_not_by_type() {
    let private = "json_extract(person.json_data, '$.private')";
    assert_eq!(
        sqlite("not person.private"),
        format!("({0} IS NULL OR NOT CAST({0} AS INTEGER))", private)
    );

    let id = "json_extract(person.json_data, '$.gramps_id')";
    assert_eq!(
        sqlite("not person.gramps_id"),
        format!("({0} IS NULL OR {0} = '')", id)
    );

    let gender = "json_extract(person.json_data, '$.gender')";
    assert_eq!(
        sqlite("not person.gender"),
        format!("({0} IS NULL OR {0} = 0)", gender)
    );

    let list = "json_extract(person.json_data, '$.event_ref_list')";
    assert_eq!(
        sqlite("not person.event_ref_list"),
        format!(
            "({0} IS NULL OR {0} = '' OR {0} = '[]' OR {0} = '{{}}' OR {0} = 0 OR {0} = false)",
            list
        )
    );

    assert_eq!(
        sqlite("not person.gender == 1"),
        format!("NOT (({} = 1))", gender)
    );
}

#[test]
fn test_not_postgres_boolean() {
    let private = "CAST(JSON_EXTRACT_PATH_TEXT(person.json_data, 'private') AS BOOLEAN)";
    assert_eq!(
        postgres("not person.private"),
        format!("({0} IS NULL OR NOT {0})", private)
    );
    assert!(!postgres("not person.private").contains("CAST(CAST("));
}

// ============================================================================
// Comparisons
// ============================================================================

#[test]
fn test_simple_comparison() {
    assert_eq!(
        sqlite("person.handle == 'I0001'"),
        "(json_extract(person.json_data, '$.handle') = 'I0001')"
    );
    assert_eq!(
        sqlite("person.handle != 'I0001'"),
        "(json_extract(person.json_data, '$.handle') != 'I0001')"
    );
}

#[test]
fn test_chained_comparison_threads_operands() {
    let gender = "json_extract(person.json_data, '$.gender')";
    assert_eq!(
        sqlite("1 < person.gender <= 3"),
        format!("((1 < {0})) AND (({0} <= 3))", gender)
    );
}

#[test]
fn test_identity() {
    assert_eq!(
        sqlite("person.private is None"),
        "(json_extract(person.json_data, '$.private') IS null)"
    );
    assert_eq!(
        sqlite("person.private is not None"),
        "(json_extract(person.json_data, '$.private') IS NOT null)"
    );
}

#[test]
fn test_mixed_type_comparison_casts() {
    assert_eq!(
        sqlite("person.gramps_id == 5"),
        "(CAST(json_extract(person.json_data, '$.gramps_id') AS REAL) = 5)"
    );
    assert_eq!(
        sqlite("person.gender == '1'"),
        "(CAST(json_extract(person.json_data, '$.gender') AS TEXT) = '1')"
    );
    assert_eq!(
        postgres("person.gramps_id == 5"),
        "(CAST(JSON_EXTRACT_PATH_TEXT(person.json_data, 'gramps_id') AS NUMERIC) = 5)"
    );
    assert_eq!(
        sqlite("person.gender == person.gramps_id"),
        "(CAST(json_extract(person.json_data, '$.gender') AS TEXT) = json_extract(person.json_data, '$.gramps_id'))"
    );
}

#[test]
fn test_membership() {
    let gender = "json_extract(person.json_data, '$.gender')";
    assert_eq!(
        sqlite("person.gender in (1, 2)"),
        format!("({} IN (1, 2))", gender)
    );
    assert_eq!(
        sqlite("person.gender not in [1, 2]"),
        format!("({} NOT IN (1, 2))", gender)
    );
    assert_eq!(
        sqlite("'Sm' in person.primary_name.first_name"),
        "(json_extract(person.json_data, '$.primary_name.first_name') LIKE '%Sm%')"
    );
    assert_eq!(
        sqlite("'Sm' not in person.primary_name.first_name"),
        "(json_extract(person.json_data, '$.primary_name.first_name') NOT LIKE '%Sm%')"
    );
    assert_eq!(
        sqlite("'F0001' in person.family_list"),
        "('F0001' IN (json_extract(person.json_data, '$.family_list')))"
    );
}

#[test]
fn test_bool_op() {
    assert_eq!(
        sqlite("person.gender == 1 and person.private == True"),
        "(((json_extract(person.json_data, '$.gender') = 1)) AND ((json_extract(person.json_data, '$.private') = 1)))"
    );
    assert_eq!(
        sqlite("person.gender == 1 or person.gender == 0"),
        "(((json_extract(person.json_data, '$.gender') = 1)) OR ((json_extract(person.json_data, '$.gender') = 0)))"
    );
}

// ============================================================================
// Calls
// ============================================================================

#[test]
fn test_string_methods() {
    assert_eq!(
        sqlite("person.gramps_id.startswith('I00')"),
        "LIKE('I00%', json_extract(person.json_data, '$.gramps_id'))"
    );
    assert_eq!(
        sqlite("person.gramps_id.endswith('1')"),
        "LIKE('%1', json_extract(person.json_data, '$.gramps_id'))"
    );
    assert_eq!(
        postgres("person.gramps_id.startswith('I00')"),
        "(JSON_EXTRACT_PATH_TEXT(person.json_data, 'gramps_id') LIKE 'I00%')"
    );
    assert_eq!(
        sqlite("person.gramps_id.endswith(person.handle)"),
        "LIKE(('%' || json_extract(person.json_data, '$.handle')), json_extract(person.json_data, '$.gramps_id'))"
    );
}

#[test]
fn test_string_method_arity() {
    let err = SqlGenerator::new(Dialect::Sqlite)
        .generate_expression(&parse("person.gramps_id.startswith('a', 'b')"), "person")
        .unwrap_err();
    assert_eq!(
        err,
        GenerateError::MethodArity {
            method: "startswith".to_string(),
            count: 2,
        }
    );
}

#[test]
fn test_len() {
    assert_eq!(
        sqlite("len(person.event_ref_list)"),
        "json_array_length(json_extract(person.json_data, '$.event_ref_list'))"
    );
    assert_eq!(
        postgres("len(person.event_ref_list)"),
        "JSON_ARRAY_LENGTH(JSON_EXTRACT_PATH(person.json_data, 'event_ref_list'))"
    );
    assert_eq!(sqlite("len('abc')"), "LENGTH('abc')");
}

#[test]
fn test_generic_call() {
    assert_eq!(
        sqlite("upper(person.gramps_id)"),
        "upper(json_extract(person.json_data, '$.gramps_id'))"
    );
}

#[test]
fn test_ternary() {
    assert_eq!(
        sqlite("'y' if person.private else 'n'"),
        "(CASE WHEN json_extract(person.json_data, '$.private') THEN 'y' ELSE 'n' END)"
    );
}

// ============================================================================
// any() and Comprehensions
// ============================================================================

#[test]
fn test_any() {
    assert_eq!(
        sqlite("any([e for e in person.event_ref_list if e.role.value == 1])"),
        "EXISTS (SELECT 1 FROM json_each(json_extract(person.json_data, '$.event_ref_list'), '$') \
         WHERE (json_extract(json_each.value, '$.role.value') = 1))"
    );
    assert_eq!(
        postgres("any([e for e in person.event_ref_list if e.role.value == 1])"),
        "EXISTS (SELECT 1 FROM LATERAL json_array_elements(JSON_EXTRACT_PATH(person.json_data, 'event_ref_list')) AS json_each(value) \
         WHERE (CAST(JSON_EXTRACT_PATH_TEXT(json_each.value, 'role.value') AS NUMERIC) = 1))"
    );
}

#[test]
fn test_any_without_condition() {
    assert_eq!(
        sqlite("any([e for e in person.family_list])"),
        "EXISTS (SELECT 1 FROM json_each(json_extract(person.json_data, '$.family_list'), '$'))"
    );
}

#[test]
fn test_any_over_concatenation() {
    assert_eq!(
        sqlite("any([n for n in [person.primary_name] + person.alternate_names if n.first_name == 'Ann'])"),
        "EXISTS (SELECT 1 FROM json_each(json_array(json_extract(person.json_data, '$.primary_name')), '$') \
         WHERE (json_extract(json_each.value, '$.first_name') = 'Ann') \
         UNION ALL SELECT 1 FROM json_each(json_extract(person.json_data, '$.alternate_names'), '$') \
         WHERE (json_extract(json_each.value, '$.first_name') = 'Ann'))"
    );
}

#[test]
fn test_comprehension_as_value() {
    assert_eq!(
        sqlite("[e.ref for e in person.event_ref_list]"),
        "(SELECT json_group_array(json_extract(json_each.value, '$.ref')) \
         FROM json_each(json_extract(person.json_data, '$.event_ref_list'), '$'))"
    );
    assert_eq!(
        postgres("[e.ref for e in person.event_ref_list]"),
        "(SELECT json_agg(JSON_EXTRACT_PATH_TEXT(json_each.value, 'ref')) \
         FROM LATERAL json_array_elements(JSON_EXTRACT_PATH(person.json_data, 'event_ref_list')) AS json_each(value))"
    );
}

// ============================================================================
// Whole Queries
// ============================================================================

#[test]
fn test_select_whole_row() {
    let query = SelectQuery::new("person");
    let sql = SqlGenerator::new(Dialect::Sqlite).generate(&query).unwrap();
    assert_eq!(sql, "SELECT json_data FROM person;");
}

#[test]
fn test_select_columns_with_alias() {
    let mut query = SelectQuery::new("event");
    query.select_expressions = vec![
        SelectExpression {
            expression: Expression::Attribute(
                AttributeExpression::new("event", "description").with_type(Some(FieldType::String)),
            ),
            alias: Some("description".to_string()),
        },
        SelectExpression::new(Expression::Attribute(AttributeExpression::new("event", "handle"))),
    ];
    let sql = SqlGenerator::new(Dialect::Sqlite).generate(&query).unwrap();
    assert_eq!(
        sql,
        "SELECT json_extract(event.json_data, '$.description') AS description, \
         json_extract(event.json_data, '$.handle') FROM event;"
    );
}

#[test]
fn test_order_limit_offset() {
    let mut query = SelectQuery::new("person");
    query.order_by = vec![
        OrderBy {
            expression: parse("person.gramps_id"),
            direction: Direction::Desc,
        },
        OrderBy {
            expression: parse("person.handle"),
            direction: Direction::Asc,
        },
    ];
    query.limit = Some(10);
    query.offset = Some(20);
    let sql = SqlGenerator::new(Dialect::Sqlite).generate(&query).unwrap();
    assert_eq!(
        sql,
        "SELECT json_data FROM person ORDER BY json_extract(person.json_data, '$.gramps_id') DESC, \
         json_extract(person.json_data, '$.handle') ASC LIMIT 10 OFFSET 20;"
    );
}

#[test]
fn test_offset_needs_limit() {
    let mut query = SelectQuery::new("person");
    query.offset = Some(20);
    let sql = SqlGenerator::new(Dialect::Sqlite).generate(&query).unwrap();
    assert_eq!(sql, "SELECT json_data FROM person;");
}

#[test]
fn test_join_rendering() {
    let equality = |left: &str, right: &str| {
        Expression::Compare(CompareExpression {
            left: Box::new(parse(left)),
            operators: vec![CmpOp::Equal],
            comparators: vec![parse(right)],
        })
    };
    let mut query = SelectQuery::new("person");
    query.joins = vec![Join {
        table_name: "family".to_string(),
        join_type: JoinType::Inner,
        condition: Expression::or_all(vec![
            equality("person.handle", "family.father_handle"),
            equality("person.handle", "family.mother_handle"),
        ])
        .unwrap(),
    }];
    let sql = SqlGenerator::new(Dialect::Sqlite).generate(&query).unwrap();
    assert_eq!(
        sql,
        "SELECT person.json_data FROM person INNER JOIN family ON \
         (json_extract(person.json_data, '$.handle') = json_extract(family.json_data, '$.father_handle')) OR \
         (json_extract(person.json_data, '$.handle') = json_extract(family.json_data, '$.mother_handle'));"
    );
}

#[test]
fn test_expansion_stripped_from_where() {
    let mut query = SelectQuery::new("person");
    let where_condition = parse_expression(
        "item in person.event_ref_list and item.role.value == 1",
        "person",
        &Env::new(),
        Some("item"),
        Some("event_ref_list"),
    )
    .unwrap();
    query.array_expansion = where_condition.find_array_expansion().map(ArrayExpansion::from);
    query.where_condition = Some(where_condition);
    let sql = SqlGenerator::new(Dialect::Sqlite).generate(&query).unwrap();
    assert_eq!(
        sql,
        "SELECT json_data FROM person, json_each(json_extract(person.json_data, '$.event_ref_list'), '$') \
         WHERE (json_extract(json_each.value, '$.role.value') = 1);"
    );
}

#[test]
fn test_only_expansions_leave_no_where() {
    let mut query = SelectQuery::new("person");
    let where_condition = parse("x in person.family_list and y in person.family_list");
    query.array_expansion = where_condition.find_array_expansion().map(ArrayExpansion::from);
    query.where_condition = Some(where_condition);
    let sql = SqlGenerator::new(Dialect::Sqlite).generate(&query).unwrap();
    assert_eq!(
        sql,
        "SELECT json_data FROM person, json_each(json_extract(person.json_data, '$.family_list'), '$');"
    );
}

#[test]
fn test_projected_comprehension_expands_in_from() {
    let mut query = SelectQuery::new("person");
    query.select_expressions = vec![SelectExpression::new(parse(
        "[(e.ref, e.role.value) for e in person.event_ref_list if e.private == False]",
    ))];
    let sql = SqlGenerator::new(Dialect::Sqlite).generate(&query).unwrap();
    assert_eq!(
        sql,
        "SELECT json_extract(json_each.value, '$.ref'), json_extract(json_each.value, '$.role.value') \
         FROM person, json_each(json_extract(person.json_data, '$.event_ref_list'), '$') \
         WHERE (json_extract(json_each.value, '$.private') = 0);"
    );
}

#[test]
fn test_union_tail_applies_once() {
    let mut query = SelectQuery::new("person");
    query.where_condition = Some(parse("person.gender == 1"));
    let mut member = SelectQuery::new("person");
    member.where_condition = Some(parse("person.gender == 0"));
    query.union_queries.push(member);
    query.union_kind = UnionKind::All;
    query.limit = Some(5);
    let sql = SqlGenerator::new(Dialect::Sqlite).generate(&query).unwrap();
    assert_eq!(
        sql,
        "SELECT json_data FROM person WHERE (json_extract(person.json_data, '$.gender') = 1) \
         UNION ALL SELECT json_data FROM person WHERE (json_extract(person.json_data, '$.gender') = 0) LIMIT 5;"
    );
}

#[test]
fn test_generation_is_deterministic() {
    let expr = parse("person.gender in (1, 2) and any([e for e in person.event_ref_list if e.private])");
    let generator = SqlGenerator::new(Dialect::Postgres);
    let first = generator.generate_expression(&expr, "person").unwrap();
    for _ in 0..5 {
        assert_eq!(generator.generate_expression(&expr, "person").unwrap(), first);
    }
}
