//! # Record Query Language - Surface Syntax
//!
//! This module defines the syntax tree for the record query language, a
//! restricted, Python-shaped expression language used to describe the
//! `what`, `where` and `order_by` parts of a query over genealogy tables.
//!
//! ## Architecture Overview
//!
//! - **[tokens]** - Lexical tokens produced by the lexer
//! - **[nodes]** - Syntax tree nodes exactly as written in the text
//! - **[operators]** - Arithmetic, comparison, unary and boolean operators
//!
//! The syntax tree is deliberately unresolved. Turning names into tables,
//! constants or array elements is the job of
//! [`QueryParser`](crate::query_parser::QueryParser), which lowers a
//! [`Node`] into the query [`model`](crate::model).
//!
//! ## Quick Start
//!
//! ```text
//! person.gender == Person.MALE and person.primary_name.first_name.startswith('J')
//! ```
//!
//! ## Supported Forms
//!
//! - Literals: `'text'`, `"text"`, `b'bytes'`, `42`, `3.5`, `True`, `False`, `None`
//! - Arithmetic: `+ - * / % ** //`, unary `-`
//! - Comparison chains: `== != < > <= >= is, is not, in, not in`
//! - Boolean: `and`, `or`, `not`
//! - Calls: `len(x)`, `any([...])`, `x.startswith('A')`
//! - Ternary: `a if cond else b`
//! - Access: `a.b.c`, `a[0]`, `a[i]`
//! - Displays: `[a, b]`, `(a, b)`
//! - Comprehensions: `[x.ref for x in person.event_ref_list if x.role.value == 1]`
//!
//! ## Precedence
//!
//! From loosest to tightest:
//!
//! ```text
//! a if c else b
//! or
//! and
//! not
//! == != < > <= >= in, not in, is, is not
//! + -
//! * / // %
//! -x
//! **
//! x.attr  x[i]  f(x)
//! ```

pub mod nodes;
pub mod operators;
pub mod tokens;

pub use nodes::{Comprehension, Node};
pub use operators::{BinOp, BoolOp, CmpOp, UnaryOp};
pub use tokens::Token;
