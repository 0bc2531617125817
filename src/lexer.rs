use crate::ast::Token;
use crate::error::LexError;

pub struct Lexer {
    input: Vec<char>,
    position: usize,
    token_start: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer {
            input: input.chars().collect(),
            position: 0,
            token_start: 0,
        }
    }

    /// Offset of the first character of the most recently returned token.
    pub fn token_start(&self) -> usize {
        self.token_start
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_char(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current_char() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_identifier(&mut self) -> String {
        let mut result = String::new();
        while let Some(ch) = self.current_char() {
            if ch.is_alphanumeric() || ch == '_' {
                result.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        result
    }

    fn read_string(&mut self, quote: char, raw: bool) -> Result<String, LexError> {
        let start = self.position;
        let mut result = String::new();
        self.advance(); // opening quote

        while let Some(ch) = self.current_char() {
            match ch {
                c if c == quote => {
                    self.advance();
                    return Ok(result);
                }
                '\n' => break,
                '\\' if raw => {
                    // raw strings keep the backslash but still cannot end on an escaped quote
                    result.push(ch);
                    self.advance();
                    if let Some(next) = self.current_char() {
                        result.push(next);
                        self.advance();
                    }
                }
                '\\' => {
                    self.advance();
                    match self.current_char() {
                        Some('n') => result.push('\n'),
                        Some('t') => result.push('\t'),
                        Some('r') => result.push('\r'),
                        Some('0') => result.push('\0'),
                        Some('\\') => result.push('\\'),
                        Some('\'') => result.push('\''),
                        Some('"') => result.push('"'),
                        Some(other) => {
                            result.push('\\');
                            result.push(other);
                        }
                        None => break,
                    }
                    self.advance();
                }
                _ => {
                    result.push(ch);
                    self.advance();
                }
            }
        }

        Err(LexError::new("Unterminated string literal", start))
    }

    fn read_number(&mut self) -> Result<Token, LexError> {
        let start = self.position;
        let mut number = String::new();
        let mut is_float = false;

        while let Some(ch) = self.current_char() {
            if ch.is_ascii_digit() {
                number.push(ch);
                self.advance();
            } else if ch == '_' && self.peek_char(1).is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            } else if ch == '.'
                && !is_float
                && self.peek_char(1).is_some_and(|c| c.is_ascii_digit())
            {
                is_float = true;
                number.push(ch);
                self.advance();
            } else if (ch == 'e' || ch == 'E') && self.exponent_follows() {
                is_float = true;
                number.push('e');
                self.advance();
                if let Some(sign @ ('+' | '-')) = self.current_char() {
                    number.push(sign);
                    self.advance();
                }
                while let Some(d) = self.current_char().filter(|c| c.is_ascii_digit()) {
                    number.push(d);
                    self.advance();
                }
                break;
            } else {
                break;
            }
        }

        if is_float {
            number
                .parse::<f64>()
                .map(Token::Float)
                .map_err(|_| LexError::new(format!("Invalid float literal '{}'", number), start))
        } else {
            number
                .parse::<i64>()
                .map(Token::Integer)
                .map_err(|_| LexError::new(format!("Integer literal '{}' out of range", number), start))
        }
    }

    fn exponent_follows(&self) -> bool {
        match self.peek_char(1) {
            Some(c) if c.is_ascii_digit() => true,
            Some('+' | '-') => self.peek_char(2).is_some_and(|c| c.is_ascii_digit()),
            _ => false,
        }
    }

    /// String prefix (`b`, `r`, `br`, `rb`) directly followed by a quote.
    fn string_prefix(&self) -> Option<(bool, bool, usize)> {
        let mut bytes = false;
        let mut raw = false;
        let mut len = 0;
        while let Some(c) = self.peek_char(len) {
            match c {
                'b' | 'B' if !bytes => bytes = true,
                'r' | 'R' if !raw => raw = true,
                '\'' | '"' if len > 0 => return Some((bytes, raw, len)),
                _ => return None,
            }
            len += 1;
        }
        None
    }

    fn single(&mut self, token: Token) -> Result<Token, LexError> {
        self.advance();
        Ok(token)
    }

    fn double(&mut self, token: Token) -> Result<Token, LexError> {
        self.advance();
        self.advance();
        Ok(token)
    }

    pub fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_whitespace();
        self.token_start = self.position;

        match self.current_char() {
            None => Ok(Token::Eof),
            Some('.') if self.peek_char(1).is_some_and(|c| c.is_ascii_digit()) => {
                self.read_number()
            }
            Some('.') => self.single(Token::Dot),
            Some(',') => self.single(Token::Comma),
            Some(':') => self.single(Token::Colon),
            Some('(') => self.single(Token::LParen),
            Some(')') => self.single(Token::RParen),
            Some('[') => self.single(Token::LBracket),
            Some(']') => self.single(Token::RBracket),
            Some('+') => self.single(Token::Plus),
            Some('-') => self.single(Token::Minus),
            Some('%') => self.single(Token::Percent),
            Some('*') => {
                if self.peek_char(1) == Some('*') {
                    self.double(Token::DoubleStar)
                } else {
                    self.single(Token::Star)
                }
            }
            Some('/') => {
                if self.peek_char(1) == Some('/') {
                    self.double(Token::DoubleSlash)
                } else {
                    self.single(Token::Slash)
                }
            }
            Some('=') => {
                if self.peek_char(1) == Some('=') {
                    self.double(Token::EqEq)
                } else {
                    self.single(Token::Assign)
                }
            }
            Some('!') => {
                if self.peek_char(1) == Some('=') {
                    self.double(Token::NotEq)
                } else {
                    Err(LexError::new("Unexpected '!' (did you mean '!=' or 'not'?)", self.position))
                }
            }
            Some('<') => {
                if self.peek_char(1) == Some('=') {
                    self.double(Token::LtEq)
                } else {
                    self.single(Token::Lt)
                }
            }
            Some('>') => {
                if self.peek_char(1) == Some('=') {
                    self.double(Token::GtEq)
                } else {
                    self.single(Token::Gt)
                }
            }
            Some(quote @ ('"' | '\'')) => self.read_string(quote, false).map(Token::String),
            Some(ch) if ch.is_alphabetic() || ch == '_' => {
                if let Some((bytes, raw, len)) = self.string_prefix() {
                    self.position += len;
                    let quote = self.current_char().unwrap_or('\'');
                    let text = self.read_string(quote, raw)?;
                    return Ok(if bytes {
                        Token::Bytes(text.into_bytes())
                    } else {
                        Token::String(text)
                    });
                }

                let ident = self.read_identifier();
                Ok(Token::keyword(&ident).unwrap_or(Token::Name(ident)))
            }
            Some(ch) if ch.is_ascii_digit() => self.read_number(),
            Some(ch) => Err(LexError::new(
                format!("Unexpected character '{}'", ch),
                self.position,
            )),
        }
    }

    /// Lex the whole input.
    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            if token == Token::Eof {
                return Ok(tokens);
            }
            tokens.push(token);
        }
    }
}

#[test]
fn test_keywords() {
    let mut lexer = Lexer::new("and or not in is if else for True False None");
    assert_eq!(lexer.next_token(), Ok(Token::And));
    assert_eq!(lexer.next_token(), Ok(Token::Or));
    assert_eq!(lexer.next_token(), Ok(Token::Not));
    assert_eq!(lexer.next_token(), Ok(Token::In));
    assert_eq!(lexer.next_token(), Ok(Token::Is));
    assert_eq!(lexer.next_token(), Ok(Token::If));
    assert_eq!(lexer.next_token(), Ok(Token::Else));
    assert_eq!(lexer.next_token(), Ok(Token::For));
    assert_eq!(lexer.next_token(), Ok(Token::True));
    assert_eq!(lexer.next_token(), Ok(Token::False));
    assert_eq!(lexer.next_token(), Ok(Token::None));
    assert_eq!(lexer.next_token(), Ok(Token::Eof));
}

#[test]
fn test_double_char_operators() {
    let mut lexer = Lexer::new("** // == != <= >= * /");
    assert_eq!(lexer.next_token(), Ok(Token::DoubleStar));
    assert_eq!(lexer.next_token(), Ok(Token::DoubleSlash));
    assert_eq!(lexer.next_token(), Ok(Token::EqEq));
    assert_eq!(lexer.next_token(), Ok(Token::NotEq));
    assert_eq!(lexer.next_token(), Ok(Token::LtEq));
    assert_eq!(lexer.next_token(), Ok(Token::GtEq));
    assert_eq!(lexer.next_token(), Ok(Token::Star));
    assert_eq!(lexer.next_token(), Ok(Token::Slash));
}

#[test]
fn test_token_start_tracks_offsets() {
    let mut lexer = Lexer::new("a  == 'b'");
    lexer.next_token().unwrap();
    assert_eq!(lexer.token_start(), 0);
    lexer.next_token().unwrap();
    assert_eq!(lexer.token_start(), 3);
    lexer.next_token().unwrap();
    assert_eq!(lexer.token_start(), 6);
}
