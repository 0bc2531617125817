use std::collections::HashMap;
use std::fmt;

/// A value bound in the constant environment.
///
/// Environment entries are usually namespaces of enumeration constants
/// (`Person.MALE`, `EventType.BIRTH`) but may be plain scalars as well.
///
/// # Examples
///
/// ```
/// use recordql::Value;
/// use std::collections::HashMap;
///
/// let mut person = HashMap::new();
/// person.insert("MALE".to_string(), Value::Integer(1));
/// let namespace = Value::Object(person);
///
/// assert_eq!(namespace.get("MALE"), Some(&Value::Integer(1)));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Array(Vec<Value>),
    Object(HashMap<String, Value>),
}

impl Value {
    /// Look up an attribute on an object value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Object(obj) => obj.get(key),
            _ => None,
        }
    }

    /// Collapse the value into a constant literal.
    ///
    /// Scalars map one to one; arrays and objects have no literal form and
    /// become their JSON text.
    pub fn to_literal(&self) -> Literal {
        match self {
            Value::Null => Literal::Null,
            Value::Boolean(b) => Literal::Boolean(*b),
            Value::Integer(n) => Literal::Integer(*n),
            Value::Float(n) => Literal::Float(*n),
            Value::String(s) => Literal::String(s.clone()),
            Value::Array(_) | Value::Object(_) => Literal::String(self.to_json().to_string()),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Integer(n) => serde_json::Value::Number((*n).into()),
            Value::Float(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Object(obj) => serde_json::Value::Object(
                obj.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(arr) => Value::Array(arr.into_iter().map(Value::from).collect()),
            serde_json::Value::Object(obj) => {
                Value::Object(obj.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

/// A constant of one of the five literal kinds a query can embed.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl Literal {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Literal::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Literal {
    /// The literal as a JSON path segment or label, without SQL quoting.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => f.write_str("None"),
            Literal::Boolean(true) => f.write_str("True"),
            Literal::Boolean(false) => f.write_str("False"),
            Literal::Integer(n) => write!(f, "{}", n),
            Literal::Float(n) => write!(f, "{}", n),
            Literal::String(s) => f.write_str(s),
        }
    }
}
