//! Instance domain model and the dynamic attribute bag.
//!
//! Instances are written by sync jobs and carry a schema-less attribute
//! bag. Values are held as [`AttrValue`], a closed variant over the JSON
//! shapes the sync jobs produce, so field access is an exhaustive match
//! rather than a downcast.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CmdbError, CmdbResult};

/// Attribute key holding the tag map consulted by `tag.<key>` lookups.
pub const TAGS_ATTRIBUTE: &str = "tags";

/// Namespace for deterministic instance ids derived from the natural key.
const INSTANCE_ID_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_0e2a_53d4_4b8e_9a51_2c7d_8e4f_a013);

/// A dynamically typed attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    List(Vec<AttrValue>),
    Map(BTreeMap<String, AttrValue>),
}

/// The attribute bag of an instance.
pub type Attributes = BTreeMap<String, AttrValue>;

impl AttrValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, AttrValue>> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Scalar rendering used for matching and indexing.
    ///
    /// Strings render as themselves, numbers and booleans in display form.
    /// Null, lists and maps have no scalar form.
    pub fn to_scalar_string(&self) -> Option<String> {
        match self {
            Self::String(s) => Some(s.clone()),
            Self::Number(n) => Some(n.to_string()),
            Self::Bool(b) => Some(b.to_string()),
            Self::Null | Self::List(_) | Self::Map(_) => None,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", serde_json::Value::from(self.clone()))
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

impl From<BTreeMap<String, AttrValue>> for AttrValue {
    fn from(value: BTreeMap<String, AttrValue>) -> Self {
        Self::Map(value)
    }
}

impl From<serde_json::Value> for AttrValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n),
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(map) => {
                Self::Map(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl From<AttrValue> for serde_json::Value {
    fn from(value: AttrValue) -> Self {
        match value {
            AttrValue::Null => Self::Null,
            AttrValue::Bool(b) => Self::Bool(b),
            AttrValue::Number(n) => Self::Number(n),
            AttrValue::String(s) => Self::String(s),
            AttrValue::List(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            AttrValue::Map(map) => {
                Self::Object(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

/// Converts a stored JSON object into an attribute bag.
///
/// Non-object values yield an empty bag.
pub fn attributes_from_json(value: serde_json::Value) -> Attributes {
    match AttrValue::from(value) {
        AttrValue::Map(map) => map,
        _ => Attributes::new(),
    }
}

pub fn attributes_to_json(attributes: Attributes) -> serde_json::Value {
    AttrValue::Map(attributes).into()
}

/// A concrete asset record of a given model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub model_uid: String,
    pub asset_id: String,
    pub asset_name: String,
    pub account_id: Option<i64>,
    pub attributes: Attributes,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Instance {
    /// Deterministic record id for a natural key.
    ///
    /// Upserting the same `(tenant, model, asset_id)` always addresses the
    /// same record.
    pub fn natural_id(tenant_id: Uuid, model_uid: &str, asset_id: &str) -> Uuid {
        let key = format!("{tenant_id}/{model_uid}/{asset_id}");
        Uuid::new_v5(&INSTANCE_ID_NAMESPACE, key.as_bytes())
    }

    pub fn attribute(&self, key: &str) -> Option<&AttrValue> {
        self.attributes.get(key)
    }

    /// Looks up `key` in the nested map under `attributes["tags"]`.
    pub fn tag(&self, key: &str) -> Option<&AttrValue> {
        self.attributes
            .get(TAGS_ATTRIBUTE)
            .and_then(AttrValue::as_map)
            .and_then(|tags| tags.get(key))
    }
}

/// Upsert input; the natural key is `(tenant_id, model_uid, asset_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertInstance {
    pub tenant_id: Uuid,
    pub model_uid: String,
    pub asset_id: String,
    pub asset_name: String,
    pub account_id: Option<i64>,
    pub attributes: Attributes,
}

impl UpsertInstance {
    pub fn validate(&self) -> CmdbResult<()> {
        if self.model_uid.trim().is_empty() {
            return Err(CmdbError::validation("instance model uid cannot be empty"));
        }
        if self.asset_id.trim().is_empty() {
            return Err(CmdbError::validation("instance asset id cannot be empty"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct InstanceFilter {
    pub model_uid: Option<String>,
    pub account_id: Option<i64>,
    pub asset_id: Option<String>,
}
