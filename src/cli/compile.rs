//! Compile and inspect query expressions

use super::CliError;
use crate::{
    Clause, Dialect, Env, Expression, QueryBuilder, QueryError, Value, parse_expression,
    schema::is_table_name,
};
use tracing::info;

/// Options for the compile command
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// Base table of the query
    pub table: String,
    /// Projected expressions; empty selects the whole row
    pub what: Vec<String>,
    /// Filter expression
    pub where_clause: Option<String>,
    /// Sort expressions, `-` prefixed for descending
    pub order_by: Vec<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    /// `sqlite` or `postgres`
    pub dialect: String,
    /// Extra constants as a JSON object
    pub env: Option<String>,
}

/// Options for the parse command
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    pub table: String,
    pub expression: String,
    /// Item variable bound to elements of `array_path`
    pub item_var: Option<String>,
    pub array_path: Option<String>,
    pub env: Option<String>,
}

fn clause(texts: &[String]) -> Option<Clause> {
    match texts {
        [] => None,
        [single] => Some(Clause::Expr(single.clone())),
        many => Some(Clause::List(many.to_vec())),
    }
}

/// Constants from a JSON object.
pub fn parse_env(json: &str) -> Result<Env, CliError> {
    match serde_json::from_str::<serde_json::Value>(json)? {
        serde_json::Value::Object(map) => Ok(map
            .into_iter()
            .map(|(name, value)| (name, Value::from(value)))
            .collect()),
        _ => Err(CliError::EnvNotObject),
    }
}

/// Execute a compile operation, returning the SQL statement
pub fn execute_compile(options: &CompileOptions) -> Result<String, CliError> {
    let env = match &options.env {
        Some(json) => parse_env(json)?,
        None => Env::new(),
    };
    let dialect = Dialect::from_name(&options.dialect);
    info!(table = %options.table, %dialect, "compiling query");

    let builder = QueryBuilder::new(options.table.as_str(), dialect)?.with_env(env);
    let sql = builder.get_sql_query(
        clause(&options.what),
        options.where_clause.clone().map(Clause::from),
        clause(&options.order_by),
        options.page,
        options.page_size,
    )?;
    Ok(sql)
}

/// Execute a parse operation, returning the lowered expression
pub fn execute_parse(options: &ParseOptions) -> Result<Expression, CliError> {
    if !is_table_name(&options.table) {
        return Err(QueryError::UnknownTable(options.table.clone()).into());
    }
    let env = match &options.env {
        Some(json) => parse_env(json)?,
        None => Env::new(),
    };
    let expr = parse_expression(
        &options.expression,
        &options.table,
        &env,
        options.item_var.as_deref(),
        options.array_path.as_deref(),
    )?;
    Ok(expr)
}
