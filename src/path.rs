use crate::ast::Node;
use crate::value::Literal;

/// A segment of a JSON attribute path.
#[derive(Debug, Clone, PartialEq)]
pub enum PathSegment {
    /// Object member by name
    ///
    /// # Examples
    /// - `person.primary_name` → `Field("primary_name")`
    /// - `person.attrs['1.5']` → `Field("1.5")`
    Field(String),

    /// Array element by position
    ///
    /// # Examples
    /// - `person.event_ref_list[0]` → `Index(0)`
    /// - `person.event_ref_list['2']` → `Index(2)` (integer-like strings count as indices)
    /// - `person.event_ref_list[-1]` → `Index(-1)`
    Index(i64),
}

impl PathSegment {
    /// Segment for a constant subscript.
    pub fn from_literal(literal: &Literal) -> Self {
        match literal {
            Literal::Integer(n) => PathSegment::Index(*n),
            Literal::String(s) => match s.trim().parse::<i64>() {
                Ok(n) => PathSegment::Index(n),
                Err(_) => PathSegment::Field(s.clone()),
            },
            other => PathSegment::Field(other.to_string()),
        }
    }

    /// Append this segment to a dotted path.
    pub fn append_to(&self, path: &str) -> String {
        match self {
            PathSegment::Index(n) => format!("{}[{}]", path, n),
            PathSegment::Field(name) if path.is_empty() => name.clone(),
            PathSegment::Field(name) => format!("{}.{}", path, name),
        }
    }
}

/// Join dotted paths, skipping empty halves.
pub fn join(left: &str, right: &str) -> String {
    match (left.is_empty(), right.is_empty()) {
        (true, _) => right.to_string(),
        (_, true) => left.to_string(),
        _ if right.starts_with('[') => format!("{}{}", left, right),
        _ => format!("{}.{}", left, right),
    }
}

/// Path of the array itself: everything before the first index.
///
/// `event_ref_list[2].ref` → `event_ref_list`
pub fn array_base(path: &str) -> &str {
    path.split('[').next().unwrap_or(path)
}

/// An attribute chain `root.a.b.c` read off the syntax tree.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeChain<'a> {
    /// Innermost non-attribute node
    pub root: &'a Node,
    /// Attribute names, outermost last
    pub parts: Vec<&'a str>,
}

impl<'a> AttributeChain<'a> {
    /// Walk `node` down through attribute accesses. `None` unless `node`
    /// is itself an attribute access.
    pub fn of(node: &'a Node) -> Option<Self> {
        let mut parts = Vec::new();
        let mut current = node;
        while let Node::Attribute { value, attr } = current {
            parts.push(attr.as_str());
            current = value;
        }
        if parts.is_empty() {
            return None;
        }
        parts.reverse();
        Some(AttributeChain {
            root: current,
            parts,
        })
    }

    pub fn root_name(&self) -> Option<&'a str> {
        match self.root {
            Node::Name(name) => Some(name),
            _ => None,
        }
    }

    pub fn path(&self) -> String {
        self.parts.join(".")
    }
}

/// Attribute paths that hold a reference to another record.
pub fn is_handle_field(path: &str) -> bool {
    path == "handle" || path == "ref" || path.ends_with("_handle") || path.ends_with(".ref")
}
