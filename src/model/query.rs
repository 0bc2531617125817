use super::expressions::{ArrayExpansionExpression, Expression};

/// One projected column.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectExpression {
    pub expression: Expression,
    pub alias: Option<String>,
}

impl SelectExpression {
    pub fn new(expression: Expression) -> Self {
        SelectExpression {
            expression,
            alias: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub expression: Expression,
    pub direction: Direction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
}

impl JoinType {
    pub fn sql(self) -> &'static str {
        match self {
            JoinType::Inner => "INNER JOIN",
        }
    }
}

/// A join to another table; the condition is an equality or an OR of equalities.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub table_name: String,
    pub join_type: JoinType,
    pub condition: Expression,
}

/// FROM-clause expansion of a JSON array into rows.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayExpansion {
    pub item_var: String,
    pub array_path: String,
    pub array_expression: Expression,
}

impl From<&ArrayExpansionExpression> for ArrayExpansion {
    fn from(expansion: &ArrayExpansionExpression) -> Self {
        ArrayExpansion {
            item_var: expansion.item_var.clone(),
            array_path: expansion.array_path.clone(),
            array_expression: (*expansion.array_expression).clone(),
        }
    }
}

/// How union members are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnionKind {
    /// `UNION`: duplicate rows are dropped
    #[default]
    Distinct,
    /// `UNION ALL`: every row from every member is kept
    All,
}

impl UnionKind {
    pub fn sql(self) -> &'static str {
        match self {
            UnionKind::Distinct => " UNION ",
            UnionKind::All => " UNION ALL ",
        }
    }
}

/// The root of a compiled query.
///
/// When `union_queries` is non-empty the statement is this query combined
/// with each member; ordering and pagination then apply to the combination.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    pub base_table: String,
    pub select_expressions: Vec<SelectExpression>,
    pub where_condition: Option<Expression>,
    pub joins: Vec<Join>,
    pub order_by: Vec<OrderBy>,
    pub array_expansion: Option<ArrayExpansion>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub union_queries: Vec<SelectQuery>,
    pub union_kind: UnionKind,
}

impl SelectQuery {
    pub fn new(base_table: impl Into<String>) -> Self {
        SelectQuery {
            base_table: base_table.into(),
            select_expressions: Vec::new(),
            where_condition: None,
            joins: Vec::new(),
            order_by: Vec::new(),
            array_expansion: None,
            limit: None,
            offset: None,
            union_queries: Vec::new(),
            union_kind: UnionKind::default(),
        }
    }
}
