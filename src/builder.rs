//! Query orchestration: from `what`/`where`/`order_by` text to one SQL statement.

use crate::{
    ast::BoolOp,
    dialect::Dialect,
    env::{Env, base_env, with_extras},
    error::QueryError,
    generator::SqlGenerator,
    model::{
        ArrayExpansion, ArrayExpansionExpression, ArrayInfo, AttributeExpression,
        BoolOpExpression, CallExpression, Direction, Expression, Join, JoinType,
        ListComprehensionExpression, OrderBy, SelectExpression, SelectQuery, UnionKind,
    },
    query_parser::{DatabaseColumns, ParsedExpression, QueryParser, Scope},
    schema::{TypeSchema, is_table_name},
    value::Value,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Names that stand for the whole row when used as the only `what`.
const ROW_SENTINELS: [&str; 2] = ["obj", "person"];

const CALLABLE_MESSAGE: &str = "Callables (lambda functions) are not supported for SQL generation. \
     Please use string expressions instead.";

/// Host-language predicate or projection. Accepted by the API so callers get
/// a clear validation error instead of a type mismatch.
pub type Callable = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// One `what`, `where` or `order_by` argument.
#[derive(Clone)]
pub enum Clause {
    Expr(String),
    List(Vec<String>),
    Callable(Callable),
}

impl fmt::Debug for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Clause::Expr(text) => f.debug_tuple("Expr").field(text).finish(),
            Clause::List(texts) => f.debug_tuple("List").field(texts).finish(),
            Clause::Callable(_) => f.write_str("Callable(..)"),
        }
    }
}

impl From<&str> for Clause {
    fn from(text: &str) -> Self {
        Clause::Expr(text.to_string())
    }
}

impl From<String> for Clause {
    fn from(text: String) -> Self {
        Clause::Expr(text)
    }
}

impl From<Vec<&str>> for Clause {
    fn from(texts: Vec<&str>) -> Self {
        Clause::List(texts.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<String>> for Clause {
    fn from(texts: Vec<String>) -> Self {
        Clause::List(texts)
    }
}

impl Clause {
    fn texts(&self) -> Vec<String> {
        match self {
            Clause::Expr(text) => vec![text.clone()],
            Clause::List(texts) => texts.clone(),
            Clause::Callable(_) => Vec::new(),
        }
    }
}

/// Compiles queries against one table for one dialect.
///
/// ```
/// use recordql::{Dialect, QueryBuilder};
///
/// let builder = QueryBuilder::new("person", Dialect::Sqlite).unwrap();
/// let sql = builder
///     .get_sql_query(Some("person.handle".into()), None, None, None, None)
///     .unwrap();
/// assert_eq!(sql, "SELECT json_extract(person.json_data, '$.handle') FROM person;");
/// ```
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    table_name: String,
    dialect: Dialect,
    env: Env,
    schema: TypeSchema,
    columns: DatabaseColumns,
}

impl QueryBuilder {
    pub fn new(table_name: impl Into<String>, dialect: Dialect) -> Result<Self, QueryError> {
        let table_name = table_name.into();
        if !is_table_name(&table_name) {
            return Err(QueryError::UnknownTable(table_name));
        }
        Ok(QueryBuilder {
            table_name,
            dialect,
            env: base_env(),
            schema: TypeSchema::genealogy(),
            columns: DatabaseColumns::default(),
        })
    }

    /// Extra constants, merged over the base environment. Replaces the
    /// extras of an earlier call.
    pub fn with_env(mut self, env: Env) -> Self {
        self.env = with_extras(env);
        self
    }

    /// Attributes of the base table stored as real columns.
    pub fn with_database_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Real columns of other tables, by table name.
    pub fn with_database_columns_dict(mut self, by_table: HashMap<String, Vec<String>>) -> Self {
        self.columns.by_table = by_table;
        self
    }

    pub fn with_schema(mut self, schema: TypeSchema) -> Self {
        self.schema = schema;
        self
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Compile to a single SQL statement terminated with `;`.
    pub fn get_sql_query(
        &self,
        what: Option<Clause>,
        where_clause: Option<Clause>,
        order_by: Option<Clause>,
        page: Option<i64>,
        page_size: Option<i64>,
    ) -> Result<String, QueryError> {
        let query = self.build(what, where_clause, order_by, page, page_size)?;
        let sql = SqlGenerator::new(self.dialect).generate(&query)?;
        debug!(table = %self.table_name, dialect = %self.dialect, %sql, "generated query");
        Ok(sql)
    }

    /// The query model `get_sql_query` renders.
    pub fn build(
        &self,
        what: Option<Clause>,
        where_clause: Option<Clause>,
        order_by: Option<Clause>,
        page: Option<i64>,
        page_size: Option<i64>,
    ) -> Result<SelectQuery, QueryError> {
        let pagination = validate_pagination(page, page_size)?;
        for (name, clause) in [("what", &what), ("where", &where_clause), ("order_by", &order_by)] {
            if let Some(Clause::Callable(_)) = clause {
                return Err(QueryError::Validation(format!(
                    "{} (got a callable for '{}')",
                    CALLABLE_MESSAGE, name
                )));
            }
        }
        let where_text = match &where_clause {
            None => None,
            Some(Clause::Expr(text)) => Some(text.as_str()),
            Some(_) => {
                return Err(QueryError::Validation(
                    "where must be a single expression string".to_string(),
                ));
            }
        };

        let parser = QueryParser::new(&self.table_name, &self.env, &self.columns, &self.schema);

        let where_parsed = where_text.map(|t| parser.parse_syntax(t)).transpose()?;
        let expansion = where_parsed
            .as_ref()
            .and_then(|p| parser.detect_array_expansion(&p.node));
        let scope = match &expansion {
            Some(e) => Scope::item(e.item_var.clone(), e.array_path.clone()),
            None => Scope::root(),
        };
        let where_condition = where_parsed
            .as_ref()
            .map(|p| parser.lower(p, &scope))
            .transpose()?;
        if let Some(condition) = &where_condition {
            check_expansions(condition)?;
        }

        let what_texts = what.as_ref().map(Clause::texts).unwrap_or_default();
        let whole_row = matches!(what_texts.as_slice(), [only] if is_row_sentinel(only));
        let mut what_parsed = Vec::new();
        let mut selects = Vec::new();
        if !whole_row {
            for text in &what_texts {
                if is_row_sentinel(text) {
                    let row = AttributeExpression::new(self.table_name.clone(), "");
                    selects.push(SelectExpression::new(Expression::Attribute(row)));
                    continue;
                }
                let parsed = parser.parse_syntax(text)?;
                let binds_item = scope
                    .item_var
                    .as_deref()
                    .is_some_and(|item| parsed.node.references_name(item));
                let what_scope = if binds_item { scope.clone() } else { Scope::root() };
                selects.push(SelectExpression::new(parser.lower(&parsed, &what_scope)?));
                what_parsed.push(parsed);
            }
        }

        let mut order = Vec::new();
        for text in order_by.as_ref().map(Clause::texts).unwrap_or_default() {
            let text = text.trim();
            let (text, direction) = match text.strip_prefix('-') {
                Some(rest) => (rest.trim_start(), Direction::Desc),
                None => (text, Direction::Asc),
            };
            order.push(OrderBy {
                expression: parser.parse_expression(text, &scope)?,
                direction,
            });
        }

        let joins = self.joins(&parser, where_parsed.as_ref(), &what_parsed, &scope)?;

        let mut query = if let Some(concatenated) = concatenated_projection(&selects) {
            if expansion.is_some() {
                return Err(QueryError::Unsupported(
                    "a list comprehension over [x] + array cannot be combined with an \
                     array membership test in where"
                        .to_string(),
                ));
            }
            self.concatenated_union(&selects, &concatenated, where_condition, &joins)
        } else if let Some((plain, expanded)) =
            where_condition.as_ref().and_then(split_on_expansion)
        {
            let mut query = self.select(selects.clone(), Some(plain), &joins);
            let mut member = self.select(selects, Some(expanded.clone()), &joins);
            member.array_expansion = expanded.find_array_expansion().map(ArrayExpansion::from);
            query.union_queries.push(member);
            query.union_kind = UnionKind::Distinct;
            query
        } else {
            let array_expansion = where_condition
                .as_ref()
                .and_then(Expression::find_array_expansion)
                .map(ArrayExpansion::from);
            let mut query = self.select(selects, where_condition, &joins);
            query.array_expansion = array_expansion;
            query
        };

        query.order_by = order;
        if let Some((limit, offset)) = pagination {
            query.limit = Some(limit);
            query.offset = Some(offset);
        }
        Ok(query)
    }

    fn select(
        &self,
        selects: Vec<SelectExpression>,
        where_condition: Option<Expression>,
        joins: &[Join],
    ) -> SelectQuery {
        let mut query = SelectQuery::new(self.table_name.clone());
        query.select_expressions = selects;
        query.where_condition = where_condition;
        query.joins = joins.to_vec();
        query
    }

    /// One join per referenced table; several conditions on the same
    /// table are OR-ed into one.
    fn joins(
        &self,
        parser: &QueryParser<'_>,
        where_parsed: Option<&ParsedExpression>,
        what_parsed: &[ParsedExpression],
        scope: &Scope,
    ) -> Result<Vec<Join>, QueryError> {
        let mut referenced = BTreeSet::new();
        for parsed in where_parsed.into_iter().chain(what_parsed) {
            referenced.extend(parser.detect_table_references(&parsed.node));
        }

        let mut conditions: BTreeMap<String, Vec<Expression>> = BTreeMap::new();
        if let Some(parsed) = where_parsed {
            for join in parser.detect_joins(parsed, scope)? {
                conditions
                    .entry(join.table_name)
                    .or_default()
                    .push(join.condition);
            }
        }

        let joins: Vec<Join> = conditions
            .into_iter()
            .filter_map(|(table_name, conditions)| {
                Expression::or_all(conditions).map(|condition| Join {
                    table_name,
                    join_type: JoinType::Inner,
                    condition,
                })
            })
            .collect();

        for table in &referenced {
            if !joins.iter().any(|j| &j.table_name == table) {
                warn!(table = %table, base = %self.table_name, "table referenced without a join condition");
            }
        }
        Ok(joins)
    }

    /// `[x] + table.array` projections: one member iterating the singleton,
    /// one iterating the array, kept with UNION ALL.
    fn concatenated_union(
        &self,
        selects: &[SelectExpression],
        comprehension: &ListComprehensionExpression,
        where_condition: Option<Expression>,
        joins: &[Join],
    ) -> SelectQuery {
        let ArrayInfo::Concatenated { left, right_path } = &comprehension.array_info else {
            return self.select(selects.to_vec(), where_condition, joins);
        };

        let mut columns = Vec::new();
        for select in selects {
            match &select.expression {
                Expression::ListComprehension(lc) if lc == comprehension => {
                    match lc.expression.as_ref() {
                        Expression::Tuple(tuple) => columns
                            .extend(tuple.elements.iter().cloned().map(SelectExpression::new)),
                        element => columns.push(SelectExpression::new(element.clone())),
                    }
                }
                _ => columns.push(select.clone()),
            }
        }

        let mut filters: Vec<Expression> = where_condition.into_iter().collect();
        filters.extend(comprehension.condition.as_deref().cloned());
        let filter = Expression::and_all(filters);

        let singleton = Expression::Call(CallExpression {
            function: Box::new(Expression::string("json_array")),
            arguments: vec![(**left).clone()],
        });
        let array = Expression::Attribute(AttributeExpression::new(
            self.table_name.clone(),
            right_path.clone(),
        ));

        let mut query = self.select(columns.clone(), filter.clone(), joins);
        query.array_expansion = Some(ArrayExpansion {
            item_var: comprehension.item_var.clone(),
            array_path: right_path.clone(),
            array_expression: singleton,
        });
        let mut member = self.select(columns, filter, joins);
        member.array_expansion = Some(ArrayExpansion {
            item_var: comprehension.item_var.clone(),
            array_path: right_path.clone(),
            array_expression: array,
        });
        query.union_queries.push(member);
        query.union_kind = UnionKind::All;
        query
    }
}

fn is_row_sentinel(text: &str) -> bool {
    ROW_SENTINELS.contains(&text.trim())
}

/// `(limit, offset)` for the requested page.
fn validate_pagination(
    page: Option<i64>,
    page_size: Option<i64>,
) -> Result<Option<(u64, u64)>, QueryError> {
    match (page, page_size) {
        (None, None) => Ok(None),
        (Some(page), Some(page_size)) => {
            if page < 1 {
                return Err(QueryError::Validation("page must be >= 1".to_string()));
            }
            if page_size < 1 {
                return Err(QueryError::Validation("page_size must be >= 1".to_string()));
            }
            let limit = page_size.unsigned_abs();
            let offset = (page - 1).unsigned_abs().saturating_mul(limit);
            Ok(Some((limit, offset)))
        }
        _ => Err(QueryError::Validation(
            "Both page and page_size must be provided together, or neither".to_string(),
        )),
    }
}

fn concatenated_projection(selects: &[SelectExpression]) -> Option<ListComprehensionExpression> {
    selects.iter().find_map(|select| match &select.expression {
        Expression::ListComprehension(lc)
            if matches!(lc.array_info, ArrayInfo::Concatenated { .. }) =>
        {
            Some(lc.clone())
        }
        _ => None,
    })
}

/// Where an array expansion may sit in a `where` condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    Top,
    Conjunct,
    Alternative,
    Nested,
}

/// Expansions are only rendered as a FROM source when they sit on the
/// top-level AND chain or inside one operand of a top-level OR, and all of
/// them name the same item over the same array.
fn check_expansions(condition: &Expression) -> Result<(), QueryError> {
    let mut found = Vec::new();
    collect_expansions(condition, Placement::Top, &mut found)?;
    if let Some(first) = found.first() {
        if let Some(other) = found
            .iter()
            .find(|e| e.item_var != first.item_var || e.array_path != first.array_path)
        {
            return Err(QueryError::Unsupported(format!(
                "only one array membership test per query, found '{} in {}' and '{} in {}'",
                first.item_var, first.array_path, other.item_var, other.array_path
            )));
        }
    }
    Ok(())
}

fn collect_expansions<'e>(
    expr: &'e Expression,
    placement: Placement,
    found: &mut Vec<&'e ArrayExpansionExpression>,
) -> Result<(), QueryError> {
    match expr {
        Expression::ArrayExpansion(expansion) => {
            if placement == Placement::Nested {
                return Err(QueryError::Unsupported(format!(
                    "'{} in {}' must be a top-level condition joined by 'and', \
                     or one operand of a top-level 'or'",
                    expansion.item_var, expansion.array_path
                )));
            }
            found.push(expansion);
            Ok(())
        }
        Expression::BoolOp(op) => {
            let inner = match (op.operator, placement) {
                (BoolOp::And, Placement::Top) => Placement::Conjunct,
                (BoolOp::Or, Placement::Top) => Placement::Alternative,
                (BoolOp::And, same) => same,
                (BoolOp::Or, _) => Placement::Nested,
            };
            op.values
                .iter()
                .try_for_each(|v| collect_expansions(v, inner, found))
        }
        other => other
            .children()
            .into_iter()
            .try_for_each(|child| collect_expansions(child, Placement::Nested, found)),
    }
}

/// Split a top-level OR into the operands without an array expansion
/// (kept OR-ed) and those with one (AND-ed). `None` when one side is empty.
fn split_on_expansion(condition: &Expression) -> Option<(Expression, Expression)> {
    let Expression::BoolOp(BoolOpExpression {
        operator: BoolOp::Or,
        values,
    }) = condition
    else {
        return None;
    };
    let (expanded, plain): (Vec<Expression>, Vec<Expression>) = values
        .iter()
        .cloned()
        .partition(|v| v.find_array_expansion().is_some());
    Some((Expression::or_all(plain)?, Expression::and_all(expanded)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_offsets() {
        assert_eq!(validate_pagination(None, None), Ok(None));
        assert_eq!(validate_pagination(Some(1), Some(25)), Ok(Some((25, 0))));
        assert_eq!(validate_pagination(Some(3), Some(10)), Ok(Some((10, 20))));
        assert!(validate_pagination(Some(1), None).is_err());
        assert!(validate_pagination(None, Some(1)).is_err());
        assert!(validate_pagination(Some(0), Some(1)).is_err());
        assert!(validate_pagination(Some(1), Some(0)).is_err());
    }

    #[test]
    fn test_row_sentinels() {
        assert!(is_row_sentinel("obj"));
        assert!(is_row_sentinel(" person "));
        assert!(!is_row_sentinel("person.handle"));
    }
}
