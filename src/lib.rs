pub mod ast;
pub mod builder;
pub mod cli;
pub mod dialect;
pub mod env;
pub mod error;
pub mod generator;
pub mod lexer;
pub mod model;
pub mod parser;
pub mod path;
pub mod query_parser;
pub mod schema;
pub mod value;

pub use ast::{BinOp, BoolOp, CmpOp, Node, Token, UnaryOp};
pub use builder::{Callable, Clause, QueryBuilder};
pub use dialect::Dialect;
pub use env::{Env, base_env};
pub use error::{GenerateError, LexError, ParseError, Position, QueryError};
pub use generator::SqlGenerator;
pub use lexer::Lexer;
pub use model::{Expression, SelectQuery};
pub use parser::{Parser, parse};
pub use query_parser::{DatabaseColumns, QueryParser, Scope, parse_expression};
pub use schema::{FieldType, TypeSchema};
pub use value::{Literal, Value};
