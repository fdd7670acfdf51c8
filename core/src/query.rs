//! Query-string model and encoder.
//!
//! A [`Query`] is an ordered mapping from keys to scalar [`QueryValue`]s.
//! Encoding percent-encodes keys and values, writes null values as an empty
//! string (the key is still emitted) and joins pairs with `&` in insertion
//! order. The result never carries a leading `?`.

use std::fmt;

use serde_json::{Map, Value};

/// A scalar query-string value.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl fmt::Display for QueryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryValue::Str(s) => f.write_str(s),
            QueryValue::Int(n) => write!(f, "{n}"),
            QueryValue::Float(n) => write_float(f, *n),
            QueryValue::Bool(b) => write!(f, "{b}"),
            QueryValue::Null => Ok(()),
        }
    }
}

// Whole floats print without a fractional part ("3", not "3.0").
pub(crate) fn write_float(f: &mut fmt::Formatter<'_>, n: f64) -> fmt::Result {
    const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;
    if n.is_infinite() {
        f.write_str(if n > 0.0 { "Infinity" } else { "-Infinity" })
    } else if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        write!(f, "{}", n as i64)
    } else {
        write!(f, "{n}")
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        QueryValue::Str(value.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        QueryValue::Str(value)
    }
}

impl From<&String> for QueryValue {
    fn from(value: &String) -> Self {
        QueryValue::Str(value.clone())
    }
}

impl From<i64> for QueryValue {
    fn from(value: i64) -> Self {
        QueryValue::Int(value)
    }
}

impl From<i32> for QueryValue {
    fn from(value: i32) -> Self {
        QueryValue::Int(i64::from(value))
    }
}

impl From<u32> for QueryValue {
    fn from(value: u32) -> Self {
        QueryValue::Int(i64::from(value))
    }
}

impl From<f64> for QueryValue {
    fn from(value: f64) -> Self {
        QueryValue::Float(value)
    }
}

impl From<bool> for QueryValue {
    fn from(value: bool) -> Self {
        QueryValue::Bool(value)
    }
}

impl<T: Into<QueryValue>> From<Option<T>> for QueryValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(QueryValue::Null, Into::into)
    }
}

/// Arrays and objects are not scalars; they are sent as their JSON text.
impl From<Value> for QueryValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => QueryValue::Null,
            Value::Bool(b) => QueryValue::Bool(b),
            Value::String(s) => QueryValue::Str(s),
            Value::Number(n) => match n.as_i64() {
                Some(i) => QueryValue::Int(i),
                None => QueryValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            other @ (Value::Array(_) | Value::Object(_)) => QueryValue::Str(other.to_string()),
        }
    }
}

/// Ordered key/value mapping encoded into a query string.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pairs: Vec<(String, QueryValue)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key`, replacing an existing value in place or appending.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<QueryValue>) {
        let key = key.into();
        let value = value.into();
        match self.pairs.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.pairs.push((key, value)),
        }
    }

    /// Builder form of [`Query::set`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&QueryValue> {
        self.pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &QueryValue)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn encode(&self) -> String {
        encode_query(self)
    }
}

impl<K, V> FromIterator<(K, V)> for Query
where
    K: Into<String>,
    V: Into<QueryValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut query = Query::new();
        for (k, v) in iter {
            query.set(k, v);
        }
        query
    }
}

impl From<Map<String, Value>> for Query {
    fn from(map: Map<String, Value>) -> Self {
        map.into_iter().collect()
    }
}

/// Encodes `query` as `k1=v1&k2=v2`, without a leading `?`.
///
/// Keys and values use URI-component encoding: besides the RFC 3986
/// unreserved set, `! ' ( ) *` stay literal, so OData string literals such
/// as `Name eq 'x'` keep their quotes on the wire.
pub fn encode_query(query: &Query) -> String {
    query
        .iter()
        .map(|(k, v)| format!("{}={}", encode_component(k), encode_component(&v.to_string())))
        .collect::<Vec<_>>()
        .join("&")
}

const COMPONENT_SAFE: [(&str, &str); 5] = [
    ("%21", "!"),
    ("%27", "'"),
    ("%28", "("),
    ("%29", ")"),
    ("%2A", "*"),
];

// `urlencoding` escapes `%` itself, so these sequences only come from the
// five characters being restored.
fn encode_component(input: &str) -> String {
    COMPONENT_SAFE
        .iter()
        .fold(urlencoding::encode(input).into_owned(), |acc, (escaped, literal)| {
            acc.replace(escaped, literal)
        })
}
