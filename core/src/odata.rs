//! OData collection and entity readers.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::client::FmService;
use crate::error::FmError;
use crate::query::{write_float, Query};

/// Key of a single OData entity.
///
/// Numeric keys are embedded as-is (`Ticket(5)`, `Rate(2.5)`), string keys
/// as quoted literals (`Ticket('AB-1')`) with embedded quotes doubled.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityKey {
    Int(i64),
    Float(f64),
    Str(String),
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKey::Int(n) => write!(f, "{n}"),
            EntityKey::Float(n) => write_float(f, *n),
            EntityKey::Str(s) => write!(f, "'{}'", s.replace('\'', "''")),
        }
    }
}

impl From<i64> for EntityKey {
    fn from(value: i64) -> Self {
        EntityKey::Int(value)
    }
}

impl From<i32> for EntityKey {
    fn from(value: i32) -> Self {
        EntityKey::Int(i64::from(value))
    }
}

impl From<f64> for EntityKey {
    fn from(value: f64) -> Self {
        EntityKey::Float(value)
    }
}

impl From<&str> for EntityKey {
    fn from(value: &str) -> Self {
        EntityKey::Str(value.to_string())
    }
}

impl From<String> for EntityKey {
    fn from(value: String) -> Self {
        EntityKey::Str(value)
    }
}

/// `path(key)` addressing one entity of the collection at `path`.
pub fn entity_path(path: &str, key: &EntityKey) -> String {
    format!("{path}({key})")
}

/// Optional shaping of a collection read. Unset or empty options are not
/// sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionQuery {
    pub expand: Option<String>,
    pub filter: Option<String>,
    pub order_by: Option<String>,
    pub top: Option<String>,
    pub skip: Option<String>,
}

impl CollectionQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expand(mut self, expand: impl Into<String>) -> Self {
        self.expand = Some(expand.into());
        self
    }

    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn order_by(mut self, order_by: impl Into<String>) -> Self {
        self.order_by = Some(order_by.into());
        self
    }

    pub fn top(mut self, top: impl fmt::Display) -> Self {
        self.top = Some(top.to_string());
        self
    }

    pub fn skip(mut self, skip: impl fmt::Display) -> Self {
        self.skip = Some(skip.to_string());
        self
    }

    /// System query options in the order `$expand`, `$filter`, `$orderby`,
    /// `$skip`, `$top`.
    pub fn to_query(&self) -> Query {
        [
            ("$expand", &self.expand),
            ("$filter", &self.filter),
            ("$orderby", &self.order_by),
            ("$skip", &self.skip),
            ("$top", &self.top),
        ]
        .into_iter()
        .filter_map(|(name, value)| {
            value
                .as_deref()
                .filter(|v| !v.is_empty())
                .map(|v| (name, v))
        })
        .collect()
    }
}

/// One entity as returned by the service. Properties other than the OData
/// annotations are kept in `fields`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ODataEntity {
    #[serde(rename = "odata.metadata", default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
    #[serde(rename = "odata.id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ODataEntity {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ODataCollection {
    #[serde(rename = "odata.metadata", default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
    #[serde(default)]
    pub value: Vec<ODataEntity>,
}

impl FmService {
    /// Reads the collection at `path`, e.g. `OData/ServiceDesk/Ticket`.
    pub fn get_odata_collection(
        &self,
        path: &str,
        options: &CollectionQuery,
    ) -> Result<ODataCollection, FmError> {
        if path.is_empty() {
            return Err(FmError::required("path"));
        }
        let value = self.get(path, options.to_query())?;
        serde_json::from_value(value).map_err(FmError::Deserialization)
    }

    /// Reads the single entity `path(key)`.
    pub fn get_odata_entity(&self, path: &str, key: &EntityKey) -> Result<ODataEntity, FmError> {
        if path.is_empty() {
            return Err(FmError::required("path"));
        }
        let value = self.get(&entity_path(path, key), Query::new())?;
        serde_json::from_value(value).map_err(FmError::Deserialization)
    }
}
