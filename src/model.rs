//! Intermediate query model.
//!
//! Plain data shared by the query parser (which builds it) and the SQL
//! generator (which renders it). Trees are built fresh for each query and
//! never mutated once handed to the generator.

pub mod expressions;
pub mod query;

pub use expressions::{
    AnyExpression, ArrayAccessExpression, ArrayExpansionExpression, ArrayInfo,
    AttributeExpression, BinaryOpExpression, BoolOpExpression, CallExpression, CompareExpression,
    Expression, IfExpression, JSON_EACH, ListComprehensionExpression, StringMethod,
    TupleExpression, UnaryOpExpression,
};
pub use query::{
    ArrayExpansion, Direction, Join, JoinType, OrderBy, SelectExpression, SelectQuery, UnionKind,
};
