// tests/lexer_tests.rs

use recordql::ast::Token;
use recordql::lexer::Lexer;

fn tokens(input: &str) -> Vec<Token> {
    Lexer::new(input).tokenize().unwrap()
}

// ============================================================================
// Single Character Tokens
// ============================================================================

#[test]
fn test_single_char_tokens() {
    let test_cases = vec![
        ("+", Token::Plus),
        ("-", Token::Minus),
        ("*", Token::Star),
        ("/", Token::Slash),
        ("%", Token::Percent),
        ("(", Token::LParen),
        (")", Token::RParen),
        ("[", Token::LBracket),
        ("]", Token::RBracket),
        (".", Token::Dot),
        (",", Token::Comma),
        (":", Token::Colon),
        ("<", Token::Lt),
        (">", Token::Gt),
        ("=", Token::Assign),
    ];

    for (input, expected) in test_cases {
        let mut lexer = Lexer::new(input);
        let token = lexer.next_token().unwrap();
        assert_eq!(token, expected, "Failed for input: {}", input);
        assert_eq!(lexer.next_token().unwrap(), Token::Eof);
    }
}

// ============================================================================
// Two Character Tokens
// ============================================================================

#[test]
fn test_two_char_tokens() {
    let test_cases = vec![
        ("==", Token::EqEq),
        ("!=", Token::NotEq),
        ("<=", Token::LtEq),
        (">=", Token::GtEq),
        ("**", Token::DoubleStar),
        ("//", Token::DoubleSlash),
    ];

    for (input, expected) in test_cases {
        assert_eq!(tokens(input), vec![expected], "Failed for input: {}", input);
    }
}

#[test]
fn test_bang_alone_is_an_error() {
    let err = Lexer::new("!x").next_token().unwrap_err();
    assert_eq!(err.position.offset, 0);
    assert!(err.message.contains("'!'"));
}

// ============================================================================
// Numbers
// ============================================================================

#[test]
fn test_integers() {
    assert_eq!(tokens("42"), vec![Token::Integer(42)]);
    assert_eq!(tokens("0"), vec![Token::Integer(0)]);
    assert_eq!(tokens("1_000_000"), vec![Token::Integer(1_000_000)]);
}

#[test]
fn test_floats() {
    assert_eq!(tokens("3.25"), vec![Token::Float(3.25)]);
    assert_eq!(tokens(".5"), vec![Token::Float(0.5)]);
    assert_eq!(tokens("1e3"), vec![Token::Float(1000.0)]);
    assert_eq!(tokens("2.5E-1"), vec![Token::Float(0.25)]);
}

#[test]
fn test_negative_number_is_minus_then_number() {
    assert_eq!(tokens("-7"), vec![Token::Minus, Token::Integer(7)]);
}

#[test]
fn test_integer_overflow() {
    let err = Lexer::new("99999999999999999999").next_token().unwrap_err();
    assert!(err.message.contains("out of range"));
}

#[test]
fn test_attribute_after_index_is_not_a_float() {
    assert_eq!(
        tokens("a[0].b"),
        vec![
            Token::Name("a".into()),
            Token::LBracket,
            Token::Integer(0),
            Token::RBracket,
            Token::Dot,
            Token::Name("b".into()),
        ]
    );
}

// ============================================================================
// Strings
// ============================================================================

#[test]
fn test_quoted_strings() {
    assert_eq!(tokens("'I0001'"), vec![Token::String("I0001".into())]);
    assert_eq!(tokens("\"Smith\""), vec![Token::String("Smith".into())]);
    assert_eq!(tokens(r#""it's""#), vec![Token::String("it's".into())]);
}

#[test]
fn test_string_escapes() {
    assert_eq!(tokens(r"'a\nb'"), vec![Token::String("a\nb".into())]);
    assert_eq!(tokens(r"'O\'Brien'"), vec![Token::String("O'Brien".into())]);
    assert_eq!(tokens(r"'back\\slash'"), vec![Token::String("back\\slash".into())]);
    // unknown escapes keep their backslash
    assert_eq!(tokens(r"'\d+'"), vec![Token::String("\\d+".into())]);
}

#[test]
fn test_string_prefixes() {
    assert_eq!(tokens(r"r'\d'"), vec![Token::String("\\d".into())]);
    assert_eq!(tokens("b'ab'"), vec![Token::Bytes(b"ab".to_vec())]);
    assert_eq!(tokens("rb'x'"), vec![Token::Bytes(b"x".to_vec())]);
    // a name that merely starts with r or b
    assert_eq!(tokens("role"), vec![Token::Name("role".into())]);
}

#[test]
fn test_unterminated_string() {
    let err = Lexer::new("x == 'open").tokenize().unwrap_err();
    assert_eq!(err.position.offset, 5);
    assert!(err.message.contains("Unterminated"));
}

// ============================================================================
// Identifiers and Keywords
// ============================================================================

#[test]
fn test_keywords_and_names() {
    assert_eq!(
        tokens("not person.private and x in y"),
        vec![
            Token::Not,
            Token::Name("person".into()),
            Token::Dot,
            Token::Name("private".into()),
            Token::And,
            Token::Name("x".into()),
            Token::In,
            Token::Name("y".into()),
        ]
    );
}

#[test]
fn test_keywords_are_case_sensitive() {
    assert_eq!(tokens("true"), vec![Token::Name("true".into())]);
    assert_eq!(tokens("True"), vec![Token::True]);
    assert_eq!(tokens("AND"), vec![Token::Name("AND".into())]);
}

#[test]
fn test_comprehension_tokens() {
    assert_eq!(
        tokens("[e.role for e in person.event_ref_list if e]"),
        vec![
            Token::LBracket,
            Token::Name("e".into()),
            Token::Dot,
            Token::Name("role".into()),
            Token::For,
            Token::Name("e".into()),
            Token::In,
            Token::Name("person".into()),
            Token::Dot,
            Token::Name("event_ref_list".into()),
            Token::If,
            Token::Name("e".into()),
            Token::RBracket,
        ]
    );
}

#[test]
fn test_unexpected_character() {
    let err = Lexer::new("a & b").tokenize().unwrap_err();
    assert_eq!(err.position.offset, 2);
    assert!(err.message.contains("'&'"));
}
