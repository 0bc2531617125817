use crate::{
    ast::{BinOp, BoolOp, CmpOp, Comprehension, Node, Token, UnaryOp},
    error::{ParseError, Position},
    lexer::Lexer,
    value::Literal,
};
use std::mem;

/// Recursive-descent parser for the expression grammar.
///
/// Produces the unresolved syntax tree; see [`crate::ast`] for the grammar
/// and precedence table.
pub struct Parser {
    lexer: Lexer,
    current_token: Token,
    text: String,
}

impl Parser {
    pub fn new(text: &str) -> Result<Self, ParseError> {
        let mut lexer = Lexer::new(text);
        let current_token = lexer.next_token().map_err(|source| ParseError::Lex {
            text: text.to_string(),
            source,
        })?;
        Ok(Parser {
            lexer,
            current_token,
            text: text.to_string(),
        })
    }

    fn advance(&mut self) -> Result<(), ParseError> {
        self.current_token = self.lexer.next_token().map_err(|source| ParseError::Lex {
            text: self.text.clone(),
            source,
        })?;
        Ok(())
    }

    fn expect(&mut self, expected: Token, description: &str) -> Result<(), ParseError> {
        if !self.check(&expected) {
            return Err(self.unexpected(description));
        }
        self.advance()
    }

    fn check(&self, token: &Token) -> bool {
        mem::discriminant(&self.current_token) == mem::discriminant(token)
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        ParseError::UnexpectedToken {
            text: self.text.clone(),
            expected: expected.to_string(),
            found: describe(&self.current_token),
            position: Position {
                offset: self.lexer.token_start(),
            },
        }
    }

    fn unsupported(&self, construct: &str) -> ParseError {
        ParseError::Unsupported {
            text: self.text.clone(),
            construct: construct.to_string(),
        }
    }

    /// Parse a complete expression; trailing input is an error.
    pub fn parse(&mut self) -> Result<Node, ParseError> {
        if self.text.trim().is_empty() {
            return Err(ParseError::Empty);
        }
        let node = self.parse_expression_list()?;
        if !self.check(&Token::Eof) {
            return Err(self.unexpected("end of expression"));
        }
        Ok(node)
    }

    /// `a, b, c` at the top level forms a tuple
    fn parse_expression_list(&mut self) -> Result<Node, ParseError> {
        let first = self.parse_expression()?;
        if !self.check(&Token::Comma) {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.check(&Token::Comma) {
            self.advance()?;
            if self.check(&Token::Eof) {
                break;
            }
            items.push(self.parse_expression()?);
        }
        Ok(Node::Tuple(items))
    }

    /// Conditional expression: `body if test else orelse`
    pub fn parse_expression(&mut self) -> Result<Node, ParseError> {
        let body = self.parse_or()?;
        if !self.check(&Token::If) {
            return Ok(body);
        }
        self.advance()?;
        let test = self.parse_or()?;
        self.expect(Token::Else, "'else'")?;
        let orelse = self.parse_expression()?;
        Ok(Node::IfExp {
            test: Box::new(test),
            body: Box::new(body),
            orelse: Box::new(orelse),
        })
    }

    fn parse_or(&mut self) -> Result<Node, ParseError> {
        let mut values = vec![self.parse_and()?];
        while self.check(&Token::Or) {
            self.advance()?;
            values.push(self.parse_and()?);
        }
        Ok(bool_op(BoolOp::Or, values))
    }

    fn parse_and(&mut self) -> Result<Node, ParseError> {
        let mut values = vec![self.parse_not()?];
        while self.check(&Token::And) {
            self.advance()?;
            values.push(self.parse_not()?);
        }
        Ok(bool_op(BoolOp::And, values))
    }

    fn parse_not(&mut self) -> Result<Node, ParseError> {
        if self.check(&Token::Not) {
            self.advance()?;
            let operand = self.parse_not()?;
            return Ok(Node::UnaryOp {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Node, ParseError> {
        let left = self.parse_additive()?;
        let mut ops = Vec::new();
        let mut comparators = Vec::new();

        loop {
            let op = match self.current_token {
                Token::EqEq => CmpOp::Equal,
                Token::NotEq => CmpOp::NotEqual,
                Token::Lt => CmpOp::LessThan,
                Token::Gt => CmpOp::GreaterThan,
                Token::LtEq => CmpOp::LessEqual,
                Token::GtEq => CmpOp::GreaterEqual,
                Token::In => CmpOp::In,
                Token::Is => {
                    self.advance()?;
                    if self.check(&Token::Not) {
                        self.advance()?;
                        ops.push(CmpOp::IsNot);
                    } else {
                        ops.push(CmpOp::Is);
                    }
                    comparators.push(self.parse_additive()?);
                    continue;
                }
                Token::Not => {
                    self.advance()?;
                    self.expect(Token::In, "'in' after 'not'")?;
                    ops.push(CmpOp::NotIn);
                    comparators.push(self.parse_additive()?);
                    continue;
                }
                _ => break,
            };
            self.advance()?;
            ops.push(op);
            comparators.push(self.parse_additive()?);
        }

        if ops.is_empty() {
            Ok(left)
        } else {
            Ok(Node::Compare {
                left: Box::new(left),
                ops,
                comparators,
            })
        }
    }

    fn parse_additive(&mut self) -> Result<Node, ParseError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.current_token {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Subtract,
                _ => return Ok(left),
            };
            self.advance()?;
            let right = self.parse_multiplicative()?;
            left = binary(op, left, right);
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Node, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.current_token {
                Token::Star => BinOp::Multiply,
                Token::Slash => BinOp::Divide,
                Token::DoubleSlash => BinOp::FloorDivide,
                Token::Percent => BinOp::Modulo,
                _ => return Ok(left),
            };
            self.advance()?;
            let right = self.parse_unary()?;
            left = binary(op, left, right);
        }
    }

    fn parse_unary(&mut self) -> Result<Node, ParseError> {
        match self.current_token {
            Token::Minus => {
                self.advance()?;
                let operand = self.parse_unary()?;
                Ok(Node::UnaryOp {
                    op: UnaryOp::Negate,
                    operand: Box::new(operand),
                })
            }
            Token::Plus => Err(self.unsupported("unary '+'")),
            _ => self.parse_power(),
        }
    }

    /// `**` binds tighter than unary minus on its left and is right-associative
    fn parse_power(&mut self) -> Result<Node, ParseError> {
        let base = self.parse_trailers()?;
        if !self.check(&Token::DoubleStar) {
            return Ok(base);
        }
        self.advance()?;
        let exponent = self.parse_unary()?;
        Ok(binary(BinOp::Power, base, exponent))
    }

    fn parse_trailers(&mut self) -> Result<Node, ParseError> {
        let mut node = self.parse_atom()?;
        loop {
            match self.current_token {
                Token::Dot => {
                    self.advance()?;
                    let attr = match &self.current_token {
                        Token::Name(name) => name.clone(),
                        _ => return Err(self.unexpected("attribute name")),
                    };
                    self.advance()?;
                    node = Node::attribute(node, attr);
                }
                Token::LBracket => {
                    self.advance()?;
                    let index = self.parse_subscript()?;
                    self.expect(Token::RBracket, "']'")?;
                    node = Node::Subscript {
                        value: Box::new(node),
                        index: Box::new(index),
                    };
                }
                Token::LParen => {
                    self.advance()?;
                    let args = self.parse_call_args()?;
                    node = Node::Call {
                        func: Box::new(node),
                        args,
                    };
                }
                _ => return Ok(node),
            }
        }
    }

    fn parse_subscript(&mut self) -> Result<Node, ParseError> {
        if self.check(&Token::Colon) {
            return Err(self.unsupported("slice"));
        }
        let first = self.parse_expression()?;
        match self.current_token {
            Token::Colon => Err(self.unsupported("slice")),
            Token::Comma => {
                let mut items = vec![first];
                while self.check(&Token::Comma) {
                    self.advance()?;
                    if self.check(&Token::RBracket) {
                        break;
                    }
                    items.push(self.parse_expression()?);
                }
                Ok(Node::Tuple(items))
            }
            _ => Ok(first),
        }
    }

    fn parse_call_args(&mut self) -> Result<Vec<Node>, ParseError> {
        let mut args = Vec::new();
        while !self.check(&Token::RParen) {
            if self.check(&Token::Star) || self.check(&Token::DoubleStar) {
                return Err(self.unsupported("argument unpacking"));
            }
            let arg = self.parse_expression()?;
            if self.check(&Token::Assign) {
                return Err(self.unsupported("keyword argument"));
            }
            if self.check(&Token::For) {
                return Err(self.unsupported("generator expression"));
            }
            args.push(arg);
            if self.check(&Token::Comma) {
                self.advance()?;
            } else {
                break;
            }
        }
        self.expect(Token::RParen, "')'")?;
        Ok(args)
    }

    /// Parse atoms: literals, names, parenthesised expressions, tuples,
    /// list displays and list comprehensions
    fn parse_atom(&mut self) -> Result<Node, ParseError> {
        match mem::replace(&mut self.current_token, Token::Eof) {
            Token::Integer(n) => {
                self.advance()?;
                Ok(Node::Constant(Literal::Integer(n)))
            }
            Token::Float(n) => {
                self.advance()?;
                Ok(Node::Constant(Literal::Float(n)))
            }
            Token::String(s) => {
                self.advance()?;
                let mut text = s;
                // adjacent literals concatenate
                while let Token::String(next) = &self.current_token {
                    text.push_str(next);
                    self.advance()?;
                }
                Ok(Node::Constant(Literal::String(text)))
            }
            Token::Bytes(bytes) => {
                self.advance()?;
                Ok(Node::Constant(Literal::String(
                    String::from_utf8_lossy(&bytes).into_owned(),
                )))
            }
            Token::True => {
                self.advance()?;
                Ok(Node::Constant(Literal::Boolean(true)))
            }
            Token::False => {
                self.advance()?;
                Ok(Node::Constant(Literal::Boolean(false)))
            }
            Token::None => {
                self.advance()?;
                Ok(Node::Constant(Literal::Null))
            }
            Token::Name(name) => {
                self.advance()?;
                Ok(Node::Name(name))
            }
            Token::LParen => {
                self.advance()?;
                self.parse_parenthesized()
            }
            Token::LBracket => {
                self.advance()?;
                self.parse_list()
            }
            token => {
                self.current_token = token;
                Err(self.unexpected("expression"))
            }
        }
    }

    fn parse_parenthesized(&mut self) -> Result<Node, ParseError> {
        if self.check(&Token::RParen) {
            self.advance()?;
            return Ok(Node::Tuple(Vec::new()));
        }
        let first = self.parse_expression()?;
        if self.check(&Token::For) {
            return Err(self.unsupported("generator expression"));
        }
        if !self.check(&Token::Comma) {
            self.expect(Token::RParen, "')'")?;
            return Ok(first);
        }

        let mut items = vec![first];
        while self.check(&Token::Comma) {
            self.advance()?;
            if self.check(&Token::RParen) {
                break;
            }
            items.push(self.parse_expression()?);
        }
        self.expect(Token::RParen, "')'")?;
        Ok(Node::Tuple(items))
    }

    fn parse_list(&mut self) -> Result<Node, ParseError> {
        if self.check(&Token::RBracket) {
            self.advance()?;
            return Ok(Node::List(Vec::new()));
        }
        let first = self.parse_expression()?;
        if self.check(&Token::For) {
            let generators = self.parse_comprehension_clauses()?;
            self.expect(Token::RBracket, "']'")?;
            return Ok(Node::ListComp {
                elt: Box::new(first),
                generators,
            });
        }

        let mut items = vec![first];
        while self.check(&Token::Comma) {
            self.advance()?;
            if self.check(&Token::RBracket) {
                break;
            }
            items.push(self.parse_expression()?);
        }
        self.expect(Token::RBracket, "']'")?;
        Ok(Node::List(items))
    }

    fn parse_comprehension_clauses(&mut self) -> Result<Vec<Comprehension>, ParseError> {
        let mut generators = Vec::new();
        while self.check(&Token::For) {
            self.advance()?;
            let target = self.parse_target()?;
            self.expect(Token::In, "'in'")?;
            let iter = self.parse_or()?;
            let mut ifs = Vec::new();
            while self.check(&Token::If) {
                self.advance()?;
                ifs.push(self.parse_or()?);
            }
            generators.push(Comprehension { target, iter, ifs });
        }
        Ok(generators)
    }

    /// Comprehension target; parsed below comparison level so `in` is left alone
    fn parse_target(&mut self) -> Result<Node, ParseError> {
        let first = self.parse_additive()?;
        if !self.check(&Token::Comma) {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.check(&Token::Comma) {
            self.advance()?;
            items.push(self.parse_additive()?);
        }
        Ok(Node::Tuple(items))
    }
}

/// Parse expression text into a syntax tree.
pub fn parse(text: &str) -> Result<Node, ParseError> {
    if text.trim().is_empty() {
        return Err(ParseError::Empty);
    }
    Parser::new(text)?.parse()
}

fn bool_op(op: BoolOp, mut values: Vec<Node>) -> Node {
    if values.len() == 1 {
        values.remove(0)
    } else {
        Node::BoolOp { op, values }
    }
}

fn binary(op: BinOp, left: Node, right: Node) -> Node {
    Node::BinOp {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn describe(token: &Token) -> String {
    match token {
        Token::Eof => "end of input".to_string(),
        Token::Name(name) => format!("name '{}'", name),
        Token::String(s) => format!("string {:?}", s),
        Token::Integer(n) => format!("integer {}", n),
        Token::Float(n) => format!("float {}", n),
        other => format!("{:?}", other),
    }
}
