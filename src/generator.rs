//! SQL rendering of the query model.

use crate::{
    ast::{BinOp, BoolOp, CmpOp, UnaryOp},
    dialect::{Dialect, quote},
    error::GenerateError,
    model::{
        AnyExpression, ArrayAccessExpression, ArrayInfo, AttributeExpression, CallExpression,
        CompareExpression, Expression, Join, ListComprehensionExpression, SelectQuery,
        StringMethod,
    },
    path::{self, PathSegment},
    schema::{FieldType, infer_type},
    value::Literal,
};
use regex::Regex;
use std::sync::LazyLock;

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid"));

/// Renders [`SelectQuery`] trees as SQL for one dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlGenerator {
    dialect: Dialect,
}

impl SqlGenerator {
    pub fn new(dialect: Dialect) -> Self {
        SqlGenerator { dialect }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Render a complete statement, terminated with `;`.
    pub fn generate(&self, query: &SelectQuery) -> Result<String, GenerateError> {
        let frame = self.frame(&query.base_table);
        let tail = frame.tail(query)?;

        if query.union_queries.is_empty() {
            return Ok(format!("{}{};", frame.body(query)?, tail));
        }

        let mut members = vec![frame.body(query)?];
        for member in &query.union_queries {
            members.push(self.frame(&member.base_table).body(member)?);
        }
        Ok(format!("{}{};", members.join(query.union_kind.sql()), tail))
    }

    /// Render one expression in the context of `base_table`.
    pub fn generate_expression(
        &self,
        expr: &Expression,
        base_table: &str,
    ) -> Result<String, GenerateError> {
        self.frame(base_table).expression(expr)
    }

    fn frame<'q>(&self, base_table: &'q str) -> Frame<'q> {
        Frame {
            dialect: self.dialect,
            base_table,
        }
    }
}

/// Rendering state for one SELECT: the dialect and the table that
/// `any(...)` and list comprehensions iterate over.
struct Frame<'q> {
    dialect: Dialect,
    base_table: &'q str,
}

impl Frame<'_> {
    fn body(&self, query: &SelectQuery) -> Result<String, GenerateError> {
        let mut sql = format!(
            "SELECT {} FROM {}",
            self.select_list(query)?,
            self.from_clause(query)?
        );
        let conditions = self.where_conditions(query)?;
        match conditions.as_slice() {
            [] => {}
            [single] => {
                sql.push_str(" WHERE ");
                sql.push_str(single);
            }
            many => {
                sql.push_str(" WHERE ");
                sql.push_str(&parenthesize(many).join(" AND "));
            }
        }
        Ok(sql)
    }

    fn tail(&self, query: &SelectQuery) -> Result<String, GenerateError> {
        let mut sql = String::new();
        if !query.order_by.is_empty() {
            let items = query
                .order_by
                .iter()
                .map(|o| Ok(format!("{} {}", self.expression(&o.expression)?, o.direction.sql())))
                .collect::<Result<Vec<_>, GenerateError>>()?;
            sql.push_str(" ORDER BY ");
            sql.push_str(&items.join(", "));
        }
        if let Some(limit) = query.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
            if let Some(offset) = query.offset {
                sql.push_str(&format!(" OFFSET {}", offset));
            }
        }
        Ok(sql)
    }

    fn select_list(&self, query: &SelectQuery) -> Result<String, GenerateError> {
        if query.select_expressions.is_empty() {
            return Ok(if query.joins.is_empty() {
                "json_data".to_string()
            } else {
                format!("{}.json_data", query.base_table)
            });
        }

        let mut columns = Vec::new();
        for select in &query.select_expressions {
            let sql = match &select.expression {
                Expression::ListComprehension(lc) if matches!(lc.array_info, ArrayInfo::Single { .. }) => {
                    self.expanded_element(lc)?
                }
                other => self.expression(other)?,
            };
            columns.push(match &select.alias {
                Some(alias) => format!("{} AS {}", sql, alias),
                None => sql,
            });
        }
        Ok(columns.join(", "))
    }

    /// Element of a comprehension whose array is expanded in FROM; a tuple
    /// element yields one column per member.
    fn expanded_element(&self, lc: &ListComprehensionExpression) -> Result<String, GenerateError> {
        match lc.expression.as_ref() {
            Expression::Tuple(tuple) => Ok(self.expressions(&tuple.elements)?.join(", ")),
            other => self.expression(other),
        }
    }

    fn from_clause(&self, query: &SelectQuery) -> Result<String, GenerateError> {
        let mut sources = vec![query.base_table.clone()];

        for select in &query.select_expressions {
            if let Expression::ListComprehension(lc) = &select.expression {
                if let ArrayInfo::Single { path } = &lc.array_info {
                    let source = self.dialect.array_source(&self.base_array(path)?);
                    push_unique(&mut sources, source);
                }
            }
        }

        if let Some(expansion) = &query.array_expansion {
            let source = self
                .dialect
                .array_source(&self.expression(&expansion.array_expression)?);
            push_unique(&mut sources, source);
        }

        let mut sql = sources.join(", ");
        for join in &query.joins {
            sql.push(' ');
            sql.push_str(&self.join(join)?);
        }
        Ok(sql)
    }

    fn join(&self, join: &Join) -> Result<String, GenerateError> {
        let condition = match &join.condition {
            Expression::BoolOp(op)
                if op.operator == BoolOp::Or && op.values.iter().all(is_equality) =>
            {
                let parts = op
                    .values
                    .iter()
                    .map(|v| self.equality(v))
                    .collect::<Result<Vec<_>, _>>()?;
                parenthesize(&parts).join(" OR ")
            }
            eq if is_equality(eq) => self.equality(eq)?,
            other => self.expression(other)?,
        };
        Ok(format!(
            "{} {} ON {}",
            join.join_type.sql(),
            join.table_name,
            condition
        ))
    }

    fn equality(&self, expr: &Expression) -> Result<String, GenerateError> {
        match expr {
            Expression::Compare(c) => Ok(format!(
                "{} = {}",
                self.expression(&c.left)?,
                self.expression(&c.comparators[0])?
            )),
            other => self.expression(other),
        }
    }

    fn where_conditions(&self, query: &SelectQuery) -> Result<Vec<String>, GenerateError> {
        let mut conditions = Vec::new();
        if let Some(condition) = &query.where_condition {
            let sql = self.without_expansions(condition)?;
            if !sql.is_empty() {
                conditions.push(sql);
            }
        }
        for select in &query.select_expressions {
            if let Expression::ListComprehension(lc) = &select.expression {
                if let (ArrayInfo::Single { .. }, Some(condition)) = (&lc.array_info, &lc.condition) {
                    conditions.push(self.expression(condition)?);
                }
            }
        }
        Ok(conditions)
    }

    /// WHERE rendering with array expansions removed; empty groups vanish.
    fn without_expansions(&self, expr: &Expression) -> Result<String, GenerateError> {
        match expr {
            Expression::ArrayExpansion(_) => Ok(String::new()),
            Expression::BoolOp(op) => {
                let mut parts = Vec::new();
                for value in &op.values {
                    let sql = self.without_expansions(value)?;
                    if !sql.is_empty() {
                        parts.push(sql);
                    }
                }
                Ok(match parts.len() {
                    0 => String::new(),
                    1 => parts.remove(0),
                    _ => parenthesize(&parts).join(&format!(" {} ", op.operator.sql())),
                })
            }
            other => self.expression(other),
        }
    }

    fn expressions(&self, exprs: &[Expression]) -> Result<Vec<String>, GenerateError> {
        exprs.iter().map(|e| self.expression(e)).collect()
    }

    fn expression(&self, expr: &Expression) -> Result<String, GenerateError> {
        match expr {
            Expression::Constant(literal) => Ok(constant(literal)),
            Expression::Attribute(attr) => self.attribute(attr),
            Expression::ArrayAccess(access) => self.array_access(access),
            Expression::BinaryOp(op) => {
                let left = self.expression(&op.left)?;
                let right = self.expression(&op.right)?;
                Ok(match op.operator {
                    BinOp::Power => format!("POW({}, {})", left, right),
                    BinOp::FloorDivide => format!("(CAST(({} / {}) AS INTEGER))", left, right),
                    other => format!("({} {} {})", left, other.symbol(), right),
                })
            }
            Expression::UnaryOp(op) => match op.operator {
                UnaryOp::Negate => {
                    let operand = self.expression(&op.operand)?;
                    // `--` would start a SQL comment
                    if operand.starts_with('-') {
                        Ok(format!("-({})", operand))
                    } else {
                        Ok(format!("-{}", operand))
                    }
                }
                UnaryOp::Not => self.not(&op.operand),
            },
            Expression::Compare(c) => self.compare(c),
            Expression::BoolOp(op) => {
                let values = self.expressions(&op.values)?;
                Ok(format!(
                    "({})",
                    parenthesize(&values).join(&format!(" {} ", op.operator.sql()))
                ))
            }
            Expression::Call(call) => self.call(call),
            Expression::If(branch) => Ok(format!(
                "(CASE WHEN {} THEN {} ELSE {} END)",
                self.expression(&branch.test)?,
                self.expression(&branch.body)?,
                self.expression(&branch.orelse)?
            )),
            Expression::ListComprehension(lc) => self.list_value(lc),
            Expression::Any(any) => self.any(any),
            Expression::ArrayExpansion(_) => Ok("1=1".to_string()),
            Expression::Tuple(tuple) => {
                Ok(format!("({})", self.expressions(&tuple.elements)?.join(", ")))
            }
        }
    }

    fn document(&self, attr: &AttributeExpression) -> Result<String, GenerateError> {
        match &attr.base {
            Some(base) => self.expression(base),
            None if attr.is_array_element() => Ok("json_each.value".to_string()),
            None => Ok(format!("{}.json_data", attr.table_name)),
        }
    }

    fn attribute(&self, attr: &AttributeExpression) -> Result<String, GenerateError> {
        if attr.is_database_column && attr.base.is_none() {
            return Ok(format!("{}.{}", attr.table_name, attr.attribute_path));
        }
        let doc = self.document(attr)?;
        if attr.attribute_path.is_empty() {
            return Ok(doc);
        }
        Ok(self
            .dialect
            .extract_typed(&doc, &attr.attribute_path, attr.inferred_type))
    }

    /// The attribute as a JSON value, ignoring its scalar type.
    fn json_value(&self, attr: &AttributeExpression) -> Result<String, GenerateError> {
        let untyped = AttributeExpression {
            inferred_type: None,
            ..attr.clone()
        };
        self.attribute(&untyped)
    }

    /// A JSON array attribute of the base table.
    fn base_array(&self, path: &str) -> Result<String, GenerateError> {
        self.json_value(&AttributeExpression::new(self.base_table, path))
    }

    fn array_access(&self, access: &ArrayAccessExpression) -> Result<String, GenerateError> {
        if let (true, Expression::Constant(literal)) =
            (access.is_constant_index, access.index.as_ref())
        {
            let segment = PathSegment::from_literal(literal);
            return match access.base.as_ref() {
                Expression::Attribute(attr) if !attr.is_database_column => Ok(self.dialect.extract(
                    &self.document(attr)?,
                    &segment.append_to(&attr.attribute_path),
                )),
                other => Ok(self
                    .dialect
                    .extract(&self.expression(other)?, &segment.append_to(""))),
            };
        }

        let Expression::Attribute(attr) = access.base.as_ref() else {
            return Err(GenerateError::VariableIndex(describe(&access.base)));
        };
        let array = AttributeExpression {
            attribute_path: path::array_base(&attr.attribute_path).to_string(),
            ..attr.clone()
        };
        Ok(self
            .dialect
            .element_at(&self.json_value(&array)?, &self.expression(&access.index)?))
    }

    /// `not x`: JSON attributes get a falsiness test matching their type.
    fn not(&self, operand: &Expression) -> Result<String, GenerateError> {
        let x = self.expression(operand)?;
        let Expression::Attribute(attr) = operand else {
            return Ok(format!("NOT ({})", x));
        };
        if attr.is_database_column {
            return Ok(format!("NOT ({})", x));
        }
        Ok(match attr.inferred_type {
            // postgres typed extraction is already BOOLEAN
            Some(FieldType::Boolean)
                if self.dialect == Dialect::Postgres && !attr.attribute_path.is_empty() =>
            {
                format!("({x} IS NULL OR NOT {x})")
            }
            Some(FieldType::Boolean) => format!(
                "({x} IS NULL OR NOT CAST({x} AS {}))",
                self.dialect.boolean_type()
            ),
            Some(FieldType::String) => format!("({x} IS NULL OR {x} = '')"),
            Some(FieldType::Number) => format!("({x} IS NULL OR {x} = 0)"),
            _ => format!(
                "({x} IS NULL OR {x} = '' OR {x} = '[]' OR {x} = '{{}}' OR {x} = 0 OR {x} = false)"
            ),
        })
    }

    fn compare(&self, c: &CompareExpression) -> Result<String, GenerateError> {
        let mut left = c.left.as_ref();
        let mut left_sql = self.expression(left)?;
        let mut parts = Vec::new();

        for (op, right) in c.operators.iter().zip(&c.comparators) {
            let right_sql = self.expression(right)?;
            let part = match op {
                CmpOp::In | CmpOp::NotIn => self.membership(*op, left, &left_sql, right, &right_sql),
                CmpOp::Is | CmpOp::IsNot => format!("({} {} {})", left_sql, op.sql(), right_sql),
                _ => {
                    let (l, r) = self.homogenize(left, &left_sql, right, &right_sql);
                    format!("({} {} {})", l, op.sql(), r)
                }
            };
            parts.push(part);
            left = right;
            left_sql = right_sql;
        }

        Ok(match parts.len() {
            1 => parts.remove(0),
            _ => parenthesize(&parts).join(" AND "),
        })
    }

    fn membership(
        &self,
        op: CmpOp,
        left: &Expression,
        left_sql: &str,
        right: &Expression,
        right_sql: &str,
    ) -> String {
        if matches!(right, Expression::Tuple(_)) {
            return format!("({} {} {})", left_sql, op.sql(), right_sql);
        }
        if let Some(needle) = left.as_string_constant() {
            if matches!(infer_type(right), None | Some(FieldType::String)) {
                let like = if op == CmpOp::In { "LIKE" } else { "NOT LIKE" };
                return format!("({} {} {})", right_sql, like, quote(&format!("%{}%", needle)));
            }
        }
        format!("({} {} ({}))", left_sql, op.sql(), right_sql)
    }

    /// Cast one side when a string meets a number: the non-constant side
    /// takes the constant's type; two non-constants compare as text.
    fn homogenize(
        &self,
        left: &Expression,
        left_sql: &str,
        right: &Expression,
        right_sql: &str,
    ) -> (String, String) {
        let (Some(lt), Some(rt)) = (infer_type(left), infer_type(right)) else {
            return (left_sql.to_string(), right_sql.to_string());
        };
        let mixed = matches!(
            (lt, rt),
            (FieldType::String, FieldType::Number) | (FieldType::Number, FieldType::String)
        );
        if !mixed {
            return (left_sql.to_string(), right_sql.to_string());
        }

        let is_constant = |e: &Expression| matches!(e, Expression::Constant(_));
        if is_constant(right) {
            (self.cast(left_sql, rt), right_sql.to_string())
        } else if is_constant(left) {
            (left_sql.to_string(), self.cast(right_sql, lt))
        } else if lt == FieldType::Number {
            (self.cast(left_sql, FieldType::String), right_sql.to_string())
        } else {
            (left_sql.to_string(), self.cast(right_sql, FieldType::String))
        }
    }

    fn cast(&self, sql: &str, to: FieldType) -> String {
        let type_name = match to {
            FieldType::Number => self.dialect.numeric_type(),
            _ => self.dialect.text_type(),
        };
        format!("CAST({} AS {})", sql, type_name)
    }

    fn call(&self, call: &CallExpression) -> Result<String, GenerateError> {
        if let Some(method) = call.string_method() {
            return self.string_method(call, method);
        }

        match (call.builtin(), call.arguments.as_slice()) {
            (Some("len"), [arg]) => match arg {
                Expression::Attribute(attr) if !attr.is_database_column => {
                    Ok(self.dialect.array_length(&self.json_value(attr)?))
                }
                other => Ok(format!("LENGTH({})", self.expression(other)?)),
            },
            (Some("json_array"), args) => {
                Ok(self.dialect.json_array(&self.expressions(args)?.join(", ")))
            }
            (Some(name), args) if IDENTIFIER.is_match(name) => {
                Ok(format!("{}({})", name, self.expressions(args)?.join(", ")))
            }
            (_, args) => Ok(format!(
                "{}({})",
                self.expression(&call.function)?,
                self.expressions(args)?.join(", ")
            )),
        }
    }

    fn string_method(
        &self,
        call: &CallExpression,
        method: StringMethod,
    ) -> Result<String, GenerateError> {
        let [arg] = call.arguments.as_slice() else {
            return Err(GenerateError::MethodArity {
                method: method.name().to_string(),
                count: call.arguments.len(),
            });
        };
        let Expression::Attribute(attr) = call.function.as_ref() else {
            return Err(GenerateError::MethodArity {
                method: method.name().to_string(),
                count: call.arguments.len(),
            });
        };
        let receiver = StringMethod::split(&attr.attribute_path)
            .map(|(receiver, _)| receiver)
            .unwrap_or_default();
        let subject = self.attribute(&AttributeExpression {
            attribute_path: receiver.to_string(),
            ..attr.clone()
        })?;

        let pattern = match (arg.as_string_constant(), method) {
            (Some(s), StringMethod::StartsWith) => quote(&format!("{}%", s)),
            (Some(s), StringMethod::EndsWith) => quote(&format!("%{}", s)),
            (None, StringMethod::StartsWith) => format!("({} || '%')", self.expression(arg)?),
            (None, StringMethod::EndsWith) => format!("('%' || {})", self.expression(arg)?),
        };
        Ok(self.dialect.like(&pattern, &subject))
    }

    /// FROM sources iterating an array, one per concatenated half.
    fn array_sources(&self, info: &ArrayInfo) -> Result<Vec<String>, GenerateError> {
        match info {
            ArrayInfo::Single { path } => Ok(vec![self.dialect.array_source(&self.base_array(path)?)]),
            ArrayInfo::Concatenated { left, right_path } => {
                let singleton = self.dialect.json_array(&self.expression(left)?);
                Ok(vec![
                    self.dialect.array_source(&singleton),
                    self.dialect.array_source(&self.base_array(right_path)?),
                ])
            }
        }
    }

    fn any(&self, any: &AnyExpression) -> Result<String, GenerateError> {
        let filter = match &any.condition {
            Some(condition) => format!(" WHERE {}", self.expression(condition)?),
            None => String::new(),
        };
        let members: Vec<String> = self
            .array_sources(&any.array_info)?
            .into_iter()
            .map(|source| format!("SELECT 1 FROM {}{}", source, filter))
            .collect();
        Ok(format!("EXISTS ({})", members.join(" UNION ALL ")))
    }

    /// A comprehension used as a value: the elements aggregated into a JSON array.
    fn list_value(&self, lc: &ListComprehensionExpression) -> Result<String, GenerateError> {
        let element = match lc.expression.as_ref() {
            Expression::Tuple(tuple) => self
                .dialect
                .json_array(&self.expressions(&tuple.elements)?.join(", ")),
            other => self.expression(other)?,
        };
        let filter = match &lc.condition {
            Some(condition) => format!(" WHERE {}", self.expression(condition)?),
            None => String::new(),
        };
        let sources = self.array_sources(&lc.array_info)?;
        let source = match sources.as_slice() {
            [single] => single.clone(),
            _ => {
                let rows: Vec<String> = sources
                    .iter()
                    .map(|s| format!("SELECT json_each.value AS value FROM {}", s))
                    .collect();
                format!("({}) AS json_each", rows.join(" UNION ALL "))
            }
        };
        Ok(format!(
            "(SELECT {} FROM {}{})",
            self.dialect.aggregate_array(&element),
            source,
            filter
        ))
    }
}

fn constant(literal: &Literal) -> String {
    match literal {
        Literal::Null => "null".to_string(),
        Literal::Boolean(true) => "1".to_string(),
        Literal::Boolean(false) => "0".to_string(),
        Literal::Integer(n) => n.to_string(),
        Literal::Float(n) if !n.is_finite() => "null".to_string(),
        Literal::Float(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{:.1}", n),
        Literal::Float(n) => n.to_string(),
        Literal::String(s) => quote(s),
    }
}

fn is_equality(expr: &Expression) -> bool {
    matches!(expr, Expression::Compare(c) if c.operators.as_slice() == [CmpOp::Equal])
}

fn parenthesize(parts: &[String]) -> Vec<String> {
    parts.iter().map(|p| format!("({})", p)).collect()
}

fn push_unique(sources: &mut Vec<String>, source: String) {
    if !sources.contains(&source) {
        sources.push(source);
    }
}

fn describe(expr: &Expression) -> String {
    match expr {
        Expression::Constant(_) => "a constant",
        Expression::Attribute(_) => "an attribute",
        Expression::ArrayAccess(_) => "an array element",
        Expression::BinaryOp(_) | Expression::UnaryOp(_) => "an arithmetic expression",
        Expression::Compare(_) | Expression::BoolOp(_) => "a condition",
        Expression::Call(_) => "a function call",
        Expression::If(_) => "a conditional expression",
        Expression::ListComprehension(_) => "a list comprehension",
        Expression::Any(_) => "any()",
        Expression::ArrayExpansion(_) => "an array membership test",
        Expression::Tuple(_) => "a tuple",
    }
    .to_string()
}
