use crate::schema::FieldType;
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;
use tracing::warn;

/// Target SQL engine.
///
/// Both dialects produce the same clause structure; they differ in the
/// JSON function vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    #[default]
    Sqlite,
    Postgres,
}

static NEGATIVE_INDEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[-(\d+)\]").expect("negative index pattern is valid"));

impl Dialect {
    /// Dialect by name. Anything unrecognised is treated as SQLite.
    pub fn from_name(name: &str) -> Dialect {
        match name.trim().to_ascii_lowercase().as_str() {
            "sqlite" | "sqlite3" => Dialect::Sqlite,
            "postgres" | "postgresql" => Dialect::Postgres,
            other => {
                warn!(dialect = other, "unknown SQL dialect, using sqlite");
                Dialect::Sqlite
            }
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Dialect::Sqlite => "sqlite",
            Dialect::Postgres => "postgres",
        }
    }

    /// Generic JSON extraction of `path` from `doc`.
    pub fn extract(self, doc: &str, path: &str) -> String {
        match self {
            Dialect::Sqlite => format!("json_extract({}, {})", doc, sqlite_path(path)),
            Dialect::Postgres => format!("JSON_EXTRACT_PATH({}, {})", doc, quote(path)),
        }
    }

    /// Extraction that yields a SQL value of the declared type.
    ///
    /// SQLite's `json_extract` already returns native scalars, so only
    /// PostgreSQL switches function.
    pub fn extract_typed(self, doc: &str, path: &str, field_type: Option<FieldType>) -> String {
        match (self, field_type) {
            (Dialect::Postgres, Some(FieldType::String)) => {
                format!("JSON_EXTRACT_PATH_TEXT({}, {})", doc, quote(path))
            }
            (Dialect::Postgres, Some(FieldType::Number)) => format!(
                "CAST(JSON_EXTRACT_PATH_TEXT({}, {}) AS NUMERIC)",
                doc,
                quote(path)
            ),
            (Dialect::Postgres, Some(FieldType::Boolean)) => format!(
                "CAST(JSON_EXTRACT_PATH_TEXT({}, {}) AS BOOLEAN)",
                doc,
                quote(path)
            ),
            _ => self.extract(doc, path),
        }
    }

    pub fn array_length(self, array: &str) -> String {
        match self {
            Dialect::Sqlite => format!("json_array_length({})", array),
            Dialect::Postgres => format!("JSON_ARRAY_LENGTH({})", array),
        }
    }

    pub fn json_array(self, elements: &str) -> String {
        match self {
            Dialect::Sqlite => format!("json_array({})", elements),
            Dialect::Postgres => format!("json_build_array({})", elements),
        }
    }

    /// FROM-clause source yielding one `json_each.value` row per element.
    pub fn array_source(self, array: &str) -> String {
        match self {
            Dialect::Sqlite => format!("json_each({}, '$')", array),
            Dialect::Postgres => {
                format!("LATERAL json_array_elements({}) AS json_each(value)", array)
            }
        }
    }

    /// Scalar subquery picking the element at a runtime index.
    pub fn element_at(self, array: &str, index: &str) -> String {
        match self {
            Dialect::Sqlite => format!(
                "(SELECT json_each.value FROM json_each({}, '$') WHERE CAST(json_each.key AS INTEGER) = CAST({} AS INTEGER) LIMIT 1)",
                array, index
            ),
            Dialect::Postgres => format!(
                "(SELECT json_each.value FROM LATERAL json_array_elements({}) WITH ORDINALITY AS json_each(value, ordinality) WHERE json_each.ordinality - 1 = CAST({} AS INTEGER) LIMIT 1)",
                array, index
            ),
        }
    }

    /// Aggregate of one value per row into a JSON array.
    pub fn aggregate_array(self, element: &str) -> String {
        match self {
            Dialect::Sqlite => format!("json_group_array({})", element),
            Dialect::Postgres => format!("json_agg({})", element),
        }
    }

    /// `subject LIKE pattern`. SQLite spells it as its `like()` function.
    pub fn like(self, pattern: &str, subject: &str) -> String {
        match self {
            Dialect::Sqlite => format!("LIKE({}, {})", pattern, subject),
            Dialect::Postgres => format!("({} LIKE {})", subject, pattern),
        }
    }

    pub fn text_type(self) -> &'static str {
        "TEXT"
    }

    pub fn numeric_type(self) -> &'static str {
        match self {
            Dialect::Sqlite => "REAL",
            Dialect::Postgres => "NUMERIC",
        }
    }

    pub fn boolean_type(self) -> &'static str {
        match self {
            Dialect::Sqlite => "INTEGER",
            Dialect::Postgres => "BOOLEAN",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// SQL string literal with embedded quotes doubled.
pub fn quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

/// SQLite JSON path literal: `'$.a.b'`, `'$[0]'`, negative indices counted from the end.
fn sqlite_path(path: &str) -> String {
    let path = NEGATIVE_INDEX.replace_all(path, "[#-$1]");
    if path.is_empty() {
        quote("$")
    } else if path.starts_with('[') {
        quote(&format!("${}", path))
    } else {
        quote(&format!("$.{}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name_falls_back_to_sqlite() {
        assert_eq!(Dialect::from_name("postgres"), Dialect::Postgres);
        assert_eq!(Dialect::from_name("PostgreSQL"), Dialect::Postgres);
        assert_eq!(Dialect::from_name("sqlite"), Dialect::Sqlite);
        assert_eq!(Dialect::from_name("mysql"), Dialect::Sqlite);
        assert_eq!(Dialect::from_name(""), Dialect::Sqlite);
    }

    #[test]
    fn test_extract() {
        assert_eq!(
            Dialect::Sqlite.extract("person.json_data", "primary_name.first_name"),
            "json_extract(person.json_data, '$.primary_name.first_name')"
        );
        assert_eq!(
            Dialect::Postgres.extract("person.json_data", "handle"),
            "JSON_EXTRACT_PATH(person.json_data, 'handle')"
        );
        assert_eq!(
            Dialect::Sqlite.extract("x", "[0]"),
            "json_extract(x, '$[0]')"
        );
        assert_eq!(
            Dialect::Sqlite.extract("x", "list[-1]"),
            "json_extract(x, '$.list[#-1]')"
        );
    }

    #[test]
    fn test_typed_extract() {
        assert_eq!(
            Dialect::Sqlite.extract_typed("d", "gender", Some(FieldType::Number)),
            "json_extract(d, '$.gender')"
        );
        assert_eq!(
            Dialect::Postgres.extract_typed("d", "gender", Some(FieldType::Number)),
            "CAST(JSON_EXTRACT_PATH_TEXT(d, 'gender') AS NUMERIC)"
        );
        assert_eq!(
            Dialect::Postgres.extract_typed("d", "handle", Some(FieldType::String)),
            "JSON_EXTRACT_PATH_TEXT(d, 'handle')"
        );
        assert_eq!(
            Dialect::Postgres.extract_typed("d", "event_ref_list", Some(FieldType::Array)),
            "JSON_EXTRACT_PATH(d, 'event_ref_list')"
        );
    }

    #[test]
    fn test_quote_doubles_single_quotes() {
        assert_eq!(quote("O'Brien"), "'O''Brien'");
    }
}
