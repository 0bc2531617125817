/// Lexical tokens of the record query language.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    /// Integer literal
    ///
    /// # Examples
    /// ```text
    /// 42
    /// 0
    /// ```
    Integer(i64),

    /// Floating-point literal
    ///
    /// # Examples
    /// ```text
    /// 3.14
    /// 1e3
    /// .5
    /// ```
    Float(f64),

    /// String literal in single or double quotes
    ///
    /// # Examples
    /// ```text
    /// 'I0001'
    /// "Smith"
    /// ```
    String(String),

    /// Bytes literal (`b'...'`), later coerced to a string constant
    Bytes(Vec<u8>),

    /// Identifier: a table name, an environment constant, an item variable
    /// or a builtin such as `len` and `any`
    Name(String),

    // Keywords
    True,
    False,
    None,
    And,
    Or,
    Not,
    In,
    Is,
    If,
    Else,
    For,

    // Arithmetic
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `**`
    DoubleStar,
    /// `/`
    Slash,
    /// `//`
    DoubleSlash,
    /// `%`
    Percent,

    // Comparison
    /// `==`
    EqEq,
    /// `!=`
    NotEq,
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<=`
    LtEq,
    /// `>=`
    GtEq,

    // Delimiters
    LParen,
    RParen,
    LBracket,
    RBracket,
    Dot,
    Comma,
    /// `:` (only recognised to report slices and keyword arguments clearly)
    Colon,
    /// `=` (only recognised to report keyword arguments clearly)
    Assign,

    Eof,
}

impl Token {
    /// Keyword for an identifier, if it is one.
    pub fn keyword(ident: &str) -> Option<Token> {
        match ident {
            "True" => Some(Token::True),
            "False" => Some(Token::False),
            "None" => Some(Token::None),
            "and" => Some(Token::And),
            "or" => Some(Token::Or),
            "not" => Some(Token::Not),
            "in" => Some(Token::In),
            "is" => Some(Token::Is),
            "if" => Some(Token::If),
            "else" => Some(Token::Else),
            "for" => Some(Token::For),
            _ => None,
        }
    }
}
