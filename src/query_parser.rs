//! Lowering of syntax trees into the query model.
//!
//! Resolves every name in an expression against, in order: the bound item
//! variable, the constant environment, the table names, and finally falls
//! back to treating the name as a string constant. Recognises the special
//! shapes that have no direct SQL counterpart (membership over an array
//! attribute, list comprehensions, `any(...)`, string methods) and finds the
//! tables and join conditions an expression refers to.

use crate::{
    ast::{BinOp, CmpOp, Comprehension, Node, UnaryOp},
    env::{Env, with_extras},
    error::ParseError,
    model::{
        AnyExpression, ArrayAccessExpression, ArrayExpansionExpression, ArrayInfo,
        AttributeExpression, BinaryOpExpression, BoolOpExpression, CallExpression,
        CompareExpression, Expression, IfExpression, JSON_EACH, Join, JoinType,
        ListComprehensionExpression, StringMethod, TupleExpression, UnaryOpExpression,
    },
    parser,
    path::{self, AttributeChain, PathSegment, is_handle_field},
    schema::{FieldType, TypeCache, TypeSchema, is_table_name},
    value::Literal,
};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{trace, warn};

/// Root names that always mean "the base table" in array expressions.
const ROW_ALIASES: [&str; 2] = ["obj", "person"];

/// Builtins that resolve through the string-constant fallback on purpose.
const BUILTINS: [&str; 2] = ["len", "any"];

/// The item variable in effect while lowering, if any.
///
/// Passed down explicitly; entering a comprehension creates a new scope
/// rather than mutating the current one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scope {
    pub item_var: Option<String>,
    pub array_path: Option<String>,
}

impl Scope {
    pub fn root() -> Self {
        Scope::default()
    }

    pub fn item(item_var: impl Into<String>, array_path: impl Into<String>) -> Self {
        Scope {
            item_var: Some(item_var.into()),
            array_path: Some(array_path.into()),
        }
    }

    fn binds(&self, name: &str) -> bool {
        self.item_var.as_deref() == Some(name)
    }
}

/// Attributes stored as real columns instead of inside `json_data`.
#[derive(Debug, Clone, Default)]
pub struct DatabaseColumns {
    /// Columns of the base table
    pub columns: HashSet<String>,
    /// Columns of other tables, by table name
    pub by_table: HashMap<String, Vec<String>>,
}

impl DatabaseColumns {
    fn contains(&self, base_table: &str, table: &str, path: &str) -> bool {
        let Some(first) = path.split(['.', '[']).next().filter(|s| !s.is_empty()) else {
            return false;
        };
        if table == base_table {
            self.columns.contains(first)
        } else {
            self.by_table
                .get(table)
                .is_some_and(|cols| cols.iter().any(|c| c == first))
        }
    }
}

/// Expression text together with its syntax tree.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedExpression {
    pub text: String,
    pub node: Node,
}

pub struct QueryParser<'a> {
    table_name: String,
    env: &'a Env,
    columns: &'a DatabaseColumns,
    types: TypeCache<'a>,
}

impl<'a> QueryParser<'a> {
    pub fn new(
        table_name: impl Into<String>,
        env: &'a Env,
        columns: &'a DatabaseColumns,
        schema: &'a TypeSchema,
    ) -> Self {
        QueryParser {
            table_name: table_name.into(),
            env,
            columns,
            types: TypeCache::new(schema),
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn parse_syntax(&self, text: &str) -> Result<ParsedExpression, ParseError> {
        let node = parser::parse(text)?;
        Ok(ParsedExpression {
            text: text.to_string(),
            node,
        })
    }

    pub fn lower(&self, parsed: &ParsedExpression, scope: &Scope) -> Result<Expression, ParseError> {
        let lowering = Lowering {
            parser: self,
            text: &parsed.text,
        };
        let expr = lowering.lower(&parsed.node, scope)?;
        trace!(text = %parsed.text, ?expr, "lowered expression");
        Ok(expr)
    }

    /// Parse and lower `text` in `scope`.
    pub fn parse_expression(&self, text: &str, scope: &Scope) -> Result<Expression, ParseError> {
        let parsed = self.parse_syntax(text)?;
        self.lower(&parsed, scope)
    }

    /// Attribute of `table` at `path`, typed from the schema.
    fn table_attribute(&self, table: &str, path: &str) -> AttributeExpression {
        let mut attr = AttributeExpression::new(table, path)
            .with_type(self.types.lookup(table, path));
        attr.is_database_column = self.columns.contains(&self.table_name, table, path);
        attr
    }

    fn attribute_type(&self, table: &str, path: &str, scope: &Scope) -> Option<FieldType> {
        if table == JSON_EACH {
            let array_path = scope.array_path.as_deref()?;
            self.types.lookup_element(&self.table_name, array_path, path)
        } else {
            self.types.lookup(table, path)
        }
    }

    /// Path of an attribute chain rooted at the base table or one of its aliases.
    fn array_chain(&self, node: &Node) -> Option<String> {
        let chain = AttributeChain::of(node)?;
        let root = chain.root_name()?;
        (root == self.table_name || ROW_ALIASES.contains(&root)).then(|| chain.path())
    }

    /// `item in table.array_path` anywhere under the boolean connectives of `node`.
    pub fn detect_array_expansion(&self, node: &Node) -> Option<ArrayExpansionExpression> {
        match node {
            Node::Compare { .. } => self.match_array_expansion(node),
            Node::BoolOp { values, .. } => {
                values.iter().find_map(|v| self.detect_array_expansion(v))
            }
            _ => None,
        }
    }

    fn match_array_expansion(&self, node: &Node) -> Option<ArrayExpansionExpression> {
        let Node::Compare {
            left,
            ops,
            comparators,
        } = node
        else {
            return None;
        };
        let (Node::Name(item_var), [CmpOp::In], [iterable]) =
            (left.as_ref(), ops.as_slice(), comparators.as_slice())
        else {
            return None;
        };
        let array_path = self.array_chain(iterable)?;
        let array_expression =
            Expression::Attribute(self.table_attribute(&self.table_name, &array_path));
        Some(ArrayExpansionExpression {
            item_var: item_var.clone(),
            array_path,
            array_expression: Box::new(array_expression),
        })
    }

    /// Lower-case table names used as attribute roots, other than the base table.
    pub fn detect_table_references(&self, node: &Node) -> BTreeSet<String> {
        let mut tables = BTreeSet::new();
        self.collect_table_references(node, &mut tables);
        tables
    }

    fn collect_table_references(&self, node: &Node, tables: &mut BTreeSet<String>) {
        match node {
            Node::Attribute { value, .. } => {
                if let Node::Name(name) = value.as_ref() {
                    let is_lower = name.chars().all(|c| !c.is_uppercase());
                    if is_lower && is_table_name(name) && *name != self.table_name {
                        tables.insert(name.clone());
                    }
                }
                self.collect_table_references(value, tables);
            }
            Node::Subscript { value, index } => {
                self.collect_table_references(value, tables);
                self.collect_table_references(index, tables);
            }
            Node::Compare {
                left, comparators, ..
            } => {
                self.collect_table_references(left, tables);
                for c in comparators {
                    self.collect_table_references(c, tables);
                }
            }
            Node::BoolOp { values, .. } | Node::List(values) | Node::Tuple(values) => {
                for v in values {
                    self.collect_table_references(v, tables);
                }
            }
            Node::BinOp { left, right, .. } => {
                self.collect_table_references(left, tables);
                self.collect_table_references(right, tables);
            }
            Node::UnaryOp { operand, .. } => self.collect_table_references(operand, tables),
            Node::Call { func, args } => {
                self.collect_table_references(func, tables);
                for a in args {
                    self.collect_table_references(a, tables);
                }
            }
            Node::IfExp { test, body, orelse } => {
                self.collect_table_references(test, tables);
                self.collect_table_references(body, tables);
                self.collect_table_references(orelse, tables);
            }
            Node::ListComp { elt, generators } => {
                self.collect_table_references(elt, tables);
                for Comprehension { iter, ifs, .. } in generators {
                    self.collect_table_references(iter, tables);
                    for cond in ifs {
                        self.collect_table_references(cond, tables);
                    }
                }
            }
            Node::Constant(_) | Node::Name(_) => {}
        }
    }

    /// Join candidates: equalities between handle fields of the base table
    /// (or the expanded array item) and another table.
    pub fn detect_joins(
        &self,
        parsed: &ParsedExpression,
        scope: &Scope,
    ) -> Result<Vec<Join>, ParseError> {
        let mut joins = Vec::new();
        self.collect_joins(&parsed.node, parsed, scope, &mut joins)?;
        Ok(joins)
    }

    fn collect_joins(
        &self,
        node: &Node,
        parsed: &ParsedExpression,
        scope: &Scope,
        joins: &mut Vec<Join>,
    ) -> Result<(), ParseError> {
        match node {
            Node::Compare {
                left,
                ops,
                comparators,
            } if ops.as_slice() == [CmpOp::Equal] => {
                let Some(table) = self.join_target(left, &comparators[0], scope) else {
                    return Ok(());
                };
                let lowering = Lowering {
                    parser: self,
                    text: &parsed.text,
                };
                joins.push(Join {
                    table_name: table,
                    join_type: JoinType::Inner,
                    condition: lowering.lower(node, scope)?,
                });
                Ok(())
            }
            Node::BoolOp { values, .. } => {
                for value in values {
                    self.collect_joins(value, parsed, scope, joins)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn join_target(&self, left: &Node, right: &Node, scope: &Scope) -> Option<String> {
        let (left_table, left_attr) = self.table_attr(left, scope)?;
        let (right_table, right_attr) = self.table_attr(right, scope)?;
        if !is_handle_field(&left_attr) || !is_handle_field(&right_attr) {
            return None;
        }

        let target = if left_table == JSON_EACH && is_table_name(&right_table) {
            right_table
        } else if right_table == JSON_EACH && is_table_name(&left_table) {
            left_table
        } else if left_table == self.table_name {
            right_table
        } else if right_table == self.table_name {
            left_table
        } else {
            return None;
        };
        (target != self.table_name && target != JSON_EACH).then_some(target)
    }

    /// `(table, attribute path)` for the operand of a join equality.
    fn table_attr(&self, node: &Node, scope: &Scope) -> Option<(String, String)> {
        match node {
            Node::Attribute { .. } => {
                let chain = AttributeChain::of(node)?;
                let attr_path = chain.path();
                match chain.root {
                    Node::Subscript { .. } => {
                        let (table, base) = self.table_attr(chain.root, scope)?;
                        Some((table, path::join(&base, &attr_path)))
                    }
                    Node::Name(name) if scope.binds(name) => {
                        Some((JSON_EACH.to_string(), attr_path))
                    }
                    Node::Name(name) => {
                        let table = name.to_lowercase();
                        is_table_name(&table).then_some((table, attr_path))
                    }
                    _ => None,
                }
            }
            Node::Subscript { value, index } => {
                let (table, base) = self.table_attr(value, scope)?;
                let index = match index.as_ref() {
                    Node::Constant(literal) => literal.to_string(),
                    Node::Name(name) => name.clone(),
                    other => {
                        let chain = AttributeChain::of(other)?;
                        format!("{}.{}", chain.root_name()?, chain.path())
                    }
                };
                Some((table, format!("{}[{}]", base, index)))
            }
            _ => None,
        }
    }
}

/// Parse `text` against `table_name` with the base environment merged
/// under `env` and the genealogy schema.
pub fn parse_expression(
    text: &str,
    table_name: &str,
    env: &Env,
    item_var: Option<&str>,
    array_path: Option<&str>,
) -> Result<Expression, ParseError> {
    let merged = with_extras(env.clone());
    let columns = DatabaseColumns::default();
    let schema = TypeSchema::genealogy();
    let parser = QueryParser::new(table_name, &merged, &columns, &schema);
    let scope = Scope {
        item_var: item_var.map(str::to_string),
        array_path: array_path.map(str::to_string),
    };
    parser.parse_expression(text, &scope)
}

/// One lowering pass over one expression text.
struct Lowering<'p, 'a> {
    parser: &'p QueryParser<'a>,
    text: &'p str,
}

impl Lowering<'_, '_> {
    fn comprehension_error(&self, reason: impl Into<String>) -> ParseError {
        ParseError::Comprehension {
            text: self.text.to_string(),
            reason: reason.into(),
        }
    }

    fn lower(&self, node: &Node, scope: &Scope) -> Result<Expression, ParseError> {
        match node {
            Node::Constant(literal) => Ok(Expression::Constant(literal.clone())),
            Node::Name(name) => Ok(self.resolve_name(name, scope)),
            Node::Attribute { .. } => self.lower_attribute(node, scope),
            Node::Subscript { value, index } => {
                self.lower_subscript(value, index, scope).map(Expression::ArrayAccess)
            }
            Node::BinOp { op, left, right } => Ok(Expression::BinaryOp(BinaryOpExpression {
                operator: *op,
                left: Box::new(self.lower(left, scope)?),
                right: Box::new(self.lower(right, scope)?),
            })),
            Node::UnaryOp { op, operand } => {
                let operand = self.lower(operand, scope)?;
                Ok(match (op, operand) {
                    (UnaryOp::Negate, Expression::Constant(Literal::Integer(n))) => {
                        match n.checked_neg() {
                            Some(negated) => Expression::Constant(Literal::Integer(negated)),
                            None => Expression::UnaryOp(UnaryOpExpression {
                                operator: UnaryOp::Negate,
                                operand: Box::new(Expression::Constant(Literal::Integer(n))),
                            }),
                        }
                    }
                    (UnaryOp::Negate, Expression::Constant(Literal::Float(n))) => {
                        Expression::Constant(Literal::Float(-n))
                    }
                    (op, operand) => Expression::UnaryOp(UnaryOpExpression {
                        operator: *op,
                        operand: Box::new(operand),
                    }),
                })
            }
            Node::Compare {
                left,
                ops,
                comparators,
            } => {
                if let Some(expansion) = self.parser.match_array_expansion(node) {
                    return Ok(Expression::ArrayExpansion(expansion));
                }
                Ok(Expression::Compare(CompareExpression {
                    left: Box::new(self.lower(left, scope)?),
                    operators: ops.clone(),
                    comparators: comparators
                        .iter()
                        .map(|c| self.lower(c, scope))
                        .collect::<Result<_, _>>()?,
                }))
            }
            Node::BoolOp { op, values } => Ok(Expression::BoolOp(BoolOpExpression {
                operator: *op,
                values: values
                    .iter()
                    .map(|v| self.lower(v, scope))
                    .collect::<Result<_, _>>()?,
            })),
            Node::Call { func, args } => self.lower_call(func, args, scope),
            Node::IfExp { test, body, orelse } => Ok(Expression::If(IfExpression {
                test: Box::new(self.lower(test, scope)?),
                body: Box::new(self.lower(body, scope)?),
                orelse: Box::new(self.lower(orelse, scope)?),
            })),
            Node::List(items) | Node::Tuple(items) => Ok(Expression::Tuple(TupleExpression {
                elements: items
                    .iter()
                    .map(|i| self.lower(i, scope))
                    .collect::<Result<_, _>>()?,
            })),
            Node::ListComp { elt, generators } => self
                .lower_list_comprehension(elt, generators, scope)
                .map(Expression::ListComprehension),
        }
    }

    fn resolve_name(&self, name: &str, scope: &Scope) -> Expression {
        if scope.binds(name) {
            let inferred = self.parser.attribute_type(JSON_EACH, "", scope);
            return Expression::Attribute(AttributeExpression::new(JSON_EACH, "").with_type(inferred));
        }
        if let Some(value) = self.parser.env.get(name) {
            return Expression::Constant(value.to_literal());
        }
        let lowered = name.to_lowercase();
        if is_table_name(&lowered) {
            return Expression::Attribute(AttributeExpression::new(lowered, ""));
        }
        if !BUILTINS.contains(&name) {
            warn!(name, text = self.text, "unknown identifier treated as a string constant");
        }
        Expression::string(name)
    }

    fn lower_attribute(&self, node: &Node, scope: &Scope) -> Result<Expression, ParseError> {
        let Some(chain) = AttributeChain::of(node) else {
            return self.lower(node, scope);
        };
        let path = chain.path();

        match chain.root {
            Node::Name(name) if scope.binds(name) => {
                let inferred = self.parser.attribute_type(JSON_EACH, &path, scope);
                Ok(Expression::Attribute(
                    AttributeExpression::new(JSON_EACH, path).with_type(inferred),
                ))
            }
            Node::Name(name) if self.parser.env.contains_key(name) => {
                self.lookup_constant(name, &chain.parts)
            }
            Node::Name(name) if is_table_name(&name.to_lowercase()) => Ok(Expression::Attribute(
                self.parser.table_attribute(&name.to_lowercase(), &path),
            )),
            Node::Name(_) => Ok(Expression::Attribute(
                self.parser.table_attribute(&self.parser.table_name, &path),
            )),
            Node::Subscript { value, index } => {
                let access = self.lower_subscript(value, index, scope)?;
                Ok(Expression::Attribute(self.attribute_of_element(access, &path, scope)))
            }
            root => {
                let base = self.lower(root, scope)?;
                Ok(Expression::Attribute(
                    AttributeExpression::new(self.parser.table_name.clone(), path).with_base(base),
                ))
            }
        }
    }

    /// `array[index].path`: constant indices fold into the path, runtime
    /// indices keep the element lookup as the attribute's base.
    fn attribute_of_element(
        &self,
        access: ArrayAccessExpression,
        rest: &str,
        scope: &Scope,
    ) -> AttributeExpression {
        let array = match access.base.as_ref() {
            Expression::Attribute(attr) if attr.base.is_none() => Some(attr.clone()),
            _ => None,
        };
        let Some(array) = array else {
            return AttributeExpression::new(self.parser.table_name.clone(), rest)
                .with_base(Expression::ArrayAccess(access));
        };

        let constant = match access.index.as_ref() {
            Expression::Constant(literal) if access.is_constant_index => Some(literal.clone()),
            _ => None,
        };
        match constant {
            Some(literal) => {
                let element = PathSegment::from_literal(&literal).append_to(&array.attribute_path);
                let full = path::join(&element, rest);
                let inferred = self.parser.attribute_type(&array.table_name, &full, scope);
                let mut attr = AttributeExpression::new(array.table_name, full).with_type(inferred);
                attr.is_database_column = array.is_database_column;
                attr
            }
            None => {
                let element_path = path::join(&format!("{}[]", array.attribute_path), rest);
                let inferred = self.parser.attribute_type(&array.table_name, &element_path, scope);
                AttributeExpression::new(array.table_name, rest)
                    .with_base(Expression::ArrayAccess(access))
                    .with_type(inferred)
            }
        }
    }

    fn lookup_constant(&self, name: &str, parts: &[&str]) -> Result<Expression, ParseError> {
        let mut value = self.parser.env.get(name);
        let mut qualified = name.to_string();
        for part in parts {
            qualified.push('.');
            qualified.push_str(part);
            value = value.and_then(|v| v.get(part));
        }
        value
            .map(|v| Expression::Constant(v.to_literal()))
            .ok_or_else(|| ParseError::UnknownConstant {
                text: self.text.to_string(),
                name: qualified,
            })
    }

    fn lower_subscript(
        &self,
        value: &Node,
        index: &Node,
        scope: &Scope,
    ) -> Result<ArrayAccessExpression, ParseError> {
        let base = self.lower(value, scope)?;
        let index = self.lower(index, scope)?;
        Ok(ArrayAccessExpression {
            base: Box::new(base),
            is_constant_index: matches!(index, Expression::Constant(_)),
            index: Box::new(index),
        })
    }

    fn lower_call(&self, func: &Node, args: &[Node], scope: &Scope) -> Result<Expression, ParseError> {
        let mut function = self.lower(func, scope)?;

        if function.as_string_constant() == Some("any") {
            if let [Node::ListComp { elt, generators }] = args {
                let comprehension = self.lower_list_comprehension(elt, generators, scope)?;
                return Ok(Expression::Any(AnyExpression {
                    item_var: comprehension.item_var,
                    array_info: comprehension.array_info,
                    condition: comprehension.condition,
                }));
            }
        }

        // the receiver of a string method carries the type, not `x.startswith`
        if let Expression::Attribute(attr) = &mut function {
            if attr.base.is_none() {
                if let Some((receiver, _)) = StringMethod::split(&attr.attribute_path) {
                    attr.inferred_type = self.parser.attribute_type(&attr.table_name, receiver, scope);
                }
            }
        }

        let arguments = args
            .iter()
            .map(|a| self.lower(a, scope))
            .collect::<Result<_, _>>()?;
        Ok(Expression::Call(CallExpression {
            function: Box::new(function),
            arguments,
        }))
    }

    fn lower_list_comprehension(
        &self,
        elt: &Node,
        generators: &[Comprehension],
        scope: &Scope,
    ) -> Result<ListComprehensionExpression, ParseError> {
        let [generator] = generators else {
            return Err(self.comprehension_error(format!(
                "exactly one 'for' clause is supported, found {}",
                generators.len()
            )));
        };
        let Node::Name(item_var) = &generator.target else {
            return Err(self.comprehension_error("the loop target must be a plain name"));
        };
        if generator.ifs.len() > 1 {
            return Err(self.comprehension_error("at most one 'if' clause is supported"));
        }

        let array_info = self.array_info(&generator.iter, scope)?;
        let inner = Scope::item(item_var.clone(), array_info.path());
        let expression = self.lower(elt, &inner)?;
        let condition = generator
            .ifs
            .first()
            .map(|cond| self.lower(cond, &inner).map(Box::new))
            .transpose()?;

        Ok(ListComprehensionExpression {
            expression: Box::new(expression),
            item_var: item_var.clone(),
            array_info,
            condition,
        })
    }

    fn array_info(&self, iter: &Node, scope: &Scope) -> Result<ArrayInfo, ParseError> {
        if let Some(path) = self.parser.array_chain(iter) {
            return Ok(ArrayInfo::Single { path });
        }
        if let Node::BinOp {
            op: BinOp::Add,
            left,
            right,
        } = iter
        {
            if let (Node::List(items), Some(right_path)) =
                (left.as_ref(), self.parser.array_chain(right))
            {
                if let [single @ Node::Attribute { .. }] = items.as_slice() {
                    return Ok(ArrayInfo::Concatenated {
                        left: Box::new(self.lower(single, scope)?),
                        right_path,
                    });
                }
            }
        }
        Err(self.comprehension_error(
            "the iterable must be a table attribute or [table.attr] + table.attr",
        ))
    }
}
