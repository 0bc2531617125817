use crate::ast::{BinOp, BoolOp, CmpOp, UnaryOp};
use crate::schema::FieldType;
use crate::value::Literal;

/// Synthetic table name for "the current element of an expanded array".
pub const JSON_EACH: &str = "json_each";

/// A resolved expression.
///
/// Unlike [`Node`](crate::ast::Node), every name here has been decided:
/// attribute paths know their table, constants carry their value and
/// membership tests over arrays have become expansion markers.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Constant(Literal),
    Attribute(AttributeExpression),
    ArrayAccess(ArrayAccessExpression),
    BinaryOp(BinaryOpExpression),
    UnaryOp(UnaryOpExpression),
    Compare(CompareExpression),
    BoolOp(BoolOpExpression),
    Call(CallExpression),
    If(IfExpression),
    ListComprehension(ListComprehensionExpression),
    Any(AnyExpression),
    ArrayExpansion(ArrayExpansionExpression),
    Tuple(TupleExpression),
}

/// Dotted access into a table row.
///
/// `attribute_path` is empty when the row itself is meant. With a `base`,
/// the path is extracted from the base's SQL value instead of the row.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeExpression {
    pub table_name: String,
    pub attribute_path: String,
    pub is_database_column: bool,
    pub base: Option<Box<Expression>>,
    pub inferred_type: Option<FieldType>,
}

impl AttributeExpression {
    pub fn new(table_name: impl Into<String>, attribute_path: impl Into<String>) -> Self {
        AttributeExpression {
            table_name: table_name.into(),
            attribute_path: attribute_path.into(),
            is_database_column: false,
            base: None,
            inferred_type: None,
        }
    }

    pub fn with_type(mut self, inferred_type: Option<FieldType>) -> Self {
        self.inferred_type = inferred_type;
        self
    }

    pub fn with_base(mut self, base: Expression) -> Self {
        self.base = Some(Box::new(base));
        self
    }

    pub fn is_array_element(&self) -> bool {
        self.table_name == JSON_EACH
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayAccessExpression {
    pub base: Box<Expression>,
    pub index: Box<Expression>,
    pub is_constant_index: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinaryOpExpression {
    pub operator: BinOp,
    pub left: Box<Expression>,
    pub right: Box<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnaryOpExpression {
    pub operator: UnaryOp,
    pub operand: Box<Expression>,
}

/// Comparison chain; `operators[i]` pairs with `comparators[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct CompareExpression {
    pub left: Box<Expression>,
    pub operators: Vec<CmpOp>,
    pub comparators: Vec<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoolOpExpression {
    pub operator: BoolOp,
    pub values: Vec<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallExpression {
    pub function: Box<Expression>,
    pub arguments: Vec<Expression>,
}

/// String methods with a SQL lowering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringMethod {
    StartsWith,
    EndsWith,
}

impl StringMethod {
    pub fn name(self) -> &'static str {
        match self {
            StringMethod::StartsWith => "startswith",
            StringMethod::EndsWith => "endswith",
        }
    }

    /// Split `receiver.method` into the receiver path and the method.
    pub fn split(path: &str) -> Option<(&str, StringMethod)> {
        let (receiver, method) = path.rsplit_once('.').unwrap_or(("", path));
        let method = match method {
            "startswith" => StringMethod::StartsWith,
            "endswith" => StringMethod::EndsWith,
            _ => return None,
        };
        Some((receiver, method))
    }
}

impl CallExpression {
    /// Name of a builtin call such as `len(...)`.
    pub fn builtin(&self) -> Option<&str> {
        self.function.as_string_constant()
    }

    /// `attr.startswith(...)` and `attr.endswith(...)`.
    pub fn string_method(&self) -> Option<StringMethod> {
        let attr = self.function.as_attribute()?;
        StringMethod::split(&attr.attribute_path).map(|(_, method)| method)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfExpression {
    pub test: Box<Expression>,
    pub body: Box<Expression>,
    pub orelse: Box<Expression>,
}

/// Where the elements of an iterated array come from.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayInfo {
    /// `for x in table.path`
    Single { path: String },
    /// `for x in [left] + table.right_path`
    Concatenated {
        left: Box<Expression>,
        right_path: String,
    },
}

impl ArrayInfo {
    /// Path of the array attribute that item variables are typed against.
    pub fn path(&self) -> &str {
        match self {
            ArrayInfo::Single { path } => path,
            ArrayInfo::Concatenated { right_path, .. } => right_path,
        }
    }

    /// The singleton element of a concatenated source.
    pub fn left(&self) -> Option<&Expression> {
        match self {
            ArrayInfo::Single { .. } => None,
            ArrayInfo::Concatenated { left, .. } => Some(&**left),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListComprehensionExpression {
    pub expression: Box<Expression>,
    pub item_var: String,
    pub array_info: ArrayInfo,
    pub condition: Option<Box<Expression>>,
}

/// `any([... for item_var in array if condition])`, folded into an existence test.
#[derive(Debug, Clone, PartialEq)]
pub struct AnyExpression {
    pub item_var: String,
    pub array_info: ArrayInfo,
    pub condition: Option<Box<Expression>>,
}

impl AnyExpression {
    pub fn array_path(&self) -> &str {
        self.array_info.path()
    }
}

/// `item_var in table.array_path`: the FROM clause must expand the array.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayExpansionExpression {
    pub item_var: String,
    pub array_path: String,
    pub array_expression: Box<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TupleExpression {
    pub elements: Vec<Expression>,
}

impl Expression {
    pub fn string(value: impl Into<String>) -> Self {
        Expression::Constant(Literal::String(value.into()))
    }

    /// Combine conditions with AND, collapsing the trivial cases.
    pub fn and_all(mut values: Vec<Expression>) -> Option<Expression> {
        match values.len() {
            0 => None,
            1 => values.pop(),
            _ => Some(Expression::BoolOp(BoolOpExpression {
                operator: BoolOp::And,
                values,
            })),
        }
    }

    /// Same as [`Expression::and_all`] but for OR.
    pub fn or_all(mut values: Vec<Expression>) -> Option<Expression> {
        match values.len() {
            0 => None,
            1 => values.pop(),
            _ => Some(Expression::BoolOp(BoolOpExpression {
                operator: BoolOp::Or,
                values,
            })),
        }
    }

    /// First array expansion reachable through boolean connectives.
    pub fn find_array_expansion(&self) -> Option<&ArrayExpansionExpression> {
        match self {
            Expression::ArrayExpansion(expansion) => Some(expansion),
            Expression::BoolOp(op) => op.values.iter().find_map(Expression::find_array_expansion),
            _ => None,
        }
    }

    /// Direct subexpressions, in source order.
    pub fn children(&self) -> Vec<&Expression> {
        match self {
            Expression::Constant(_) => Vec::new(),
            Expression::Attribute(attr) => attr.base.as_deref().into_iter().collect(),
            Expression::ArrayAccess(access) => vec![&*access.base, &*access.index],
            Expression::BinaryOp(op) => vec![&*op.left, &*op.right],
            Expression::UnaryOp(op) => vec![&*op.operand],
            Expression::Compare(c) => std::iter::once(&*c.left)
                .chain(&c.comparators)
                .collect(),
            Expression::BoolOp(op) => op.values.iter().collect(),
            Expression::Call(call) => std::iter::once(&*call.function)
                .chain(&call.arguments)
                .collect(),
            Expression::If(branch) => vec![&*branch.test, &*branch.body, &*branch.orelse],
            Expression::ListComprehension(lc) => {
                let mut children = vec![&*lc.expression];
                children.extend(lc.array_info.left());
                children.extend(lc.condition.as_deref());
                children
            }
            Expression::Any(any) => any
                .array_info
                .left()
                .into_iter()
                .chain(any.condition.as_deref())
                .collect(),
            Expression::ArrayExpansion(expansion) => vec![&*expansion.array_expression],
            Expression::Tuple(tuple) => tuple.elements.iter().collect(),
        }
    }

    pub fn as_attribute(&self) -> Option<&AttributeExpression> {
        match self {
            Expression::Attribute(attr) => Some(attr),
            _ => None,
        }
    }

    pub fn as_string_constant(&self) -> Option<&str> {
        match self {
            Expression::Constant(literal) => literal.as_str(),
            _ => None,
        }
    }
}
