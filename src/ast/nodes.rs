use super::operators::{BinOp, BoolOp, CmpOp, UnaryOp};
use crate::value::Literal;

/// A node of the surface syntax tree.
///
/// This is the shape of the text as written, before any identifier is
/// resolved. `person.handle` is an `Attribute` over a `Name` here; whether
/// `person` is a table, a constant or an item variable is decided later by
/// [`QueryParser`](crate::query_parser::QueryParser).
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Literal value
    ///
    /// # Examples
    /// ```text
    /// 'I0001'
    /// 42
    /// None
    /// ```
    Constant(Literal),

    /// Bare identifier
    Name(String),

    /// Attribute access (`value.attr`)
    Attribute { value: Box<Node>, attr: String },

    /// Subscript (`value[index]`)
    ///
    /// # Examples
    /// ```text
    /// person.event_ref_list[0]
    /// person.event_ref_list[person.birth_ref_index]
    /// ```
    Subscript { value: Box<Node>, index: Box<Node> },

    /// Arithmetic
    BinOp {
        op: BinOp,
        left: Box<Node>,
        right: Box<Node>,
    },

    /// `-x` and `not x`
    UnaryOp { op: UnaryOp, operand: Box<Node> },

    /// Comparison chain
    ///
    /// `a < b <= c` keeps one left operand and one comparator per operator.
    Compare {
        left: Box<Node>,
        ops: Vec<CmpOp>,
        comparators: Vec<Node>,
    },

    /// `and` / `or` over two or more operands
    BoolOp { op: BoolOp, values: Vec<Node> },

    /// Function or method call with positional arguments
    Call { func: Box<Node>, args: Vec<Node> },

    /// Conditional expression (`body if test else orelse`)
    IfExp {
        test: Box<Node>,
        body: Box<Node>,
        orelse: Box<Node>,
    },

    /// List display (`[a, b]`)
    List(Vec<Node>),

    /// Tuple display (`(a, b)` or a bare top-level `a, b`)
    Tuple(Vec<Node>),

    /// List comprehension (`[elt for target in iter if cond]`)
    ListComp {
        elt: Box<Node>,
        generators: Vec<Comprehension>,
    },
}

/// One `for target in iter [if cond]*` clause of a comprehension.
#[derive(Debug, Clone, PartialEq)]
pub struct Comprehension {
    pub target: Node,
    pub iter: Node,
    pub ifs: Vec<Node>,
}

impl Node {
    pub fn name(name: impl Into<String>) -> Self {
        Node::Name(name.into())
    }

    pub fn attribute(value: Node, attr: impl Into<String>) -> Self {
        Node::Attribute {
            value: Box::new(value),
            attr: attr.into(),
        }
    }

    /// True when the tree mentions `name` as a bare identifier anywhere.
    pub fn references_name(&self, name: &str) -> bool {
        match self {
            Node::Name(n) => n == name,
            Node::Constant(_) => false,
            Node::Attribute { value, .. } => value.references_name(name),
            Node::Subscript { value, index } => {
                value.references_name(name) || index.references_name(name)
            }
            Node::BinOp { left, right, .. } => {
                left.references_name(name) || right.references_name(name)
            }
            Node::UnaryOp { operand, .. } => operand.references_name(name),
            Node::Compare {
                left, comparators, ..
            } => {
                left.references_name(name) || comparators.iter().any(|c| c.references_name(name))
            }
            Node::BoolOp { values, .. } => values.iter().any(|v| v.references_name(name)),
            Node::Call { func, args } => {
                func.references_name(name) || args.iter().any(|a| a.references_name(name))
            }
            Node::IfExp { test, body, orelse } => {
                test.references_name(name)
                    || body.references_name(name)
                    || orelse.references_name(name)
            }
            Node::List(items) | Node::Tuple(items) => {
                items.iter().any(|i| i.references_name(name))
            }
            Node::ListComp { elt, generators } => {
                elt.references_name(name)
                    || generators.iter().any(|g| {
                        g.iter.references_name(name)
                            || g.ifs.iter().any(|c| c.references_name(name))
                    })
            }
        }
    }
}
