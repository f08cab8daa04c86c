//! Attribute and attribute group domain models.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CmdbError, CmdbResult};

/// Closed set of field types an attribute may declare.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Text,
    Int,
    Float,
    Bool,
    Enum,
    Datetime,
    Date,
    Array,
    Json,
    Link,
}

impl FieldType {
    pub const ALL: [Self; 11] = [
        Self::String,
        Self::Text,
        Self::Int,
        Self::Float,
        Self::Bool,
        Self::Enum,
        Self::Datetime,
        Self::Date,
        Self::Array,
        Self::Json,
        Self::Link,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Text => "text",
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::Enum => "enum",
            Self::Datetime => "datetime",
            Self::Date => "date",
            Self::Array => "array",
            Self::Json => "json",
            Self::Link => "link",
        }
    }

    /// Human-readable label for form builders.
    pub fn label(self) -> &'static str {
        match self {
            Self::String => "Short text",
            Self::Text => "Long text",
            Self::Int => "Integer",
            Self::Float => "Float",
            Self::Bool => "Boolean",
            Self::Enum => "Enumeration",
            Self::Datetime => "Date and time",
            Self::Date => "Date",
            Self::Array => "Array",
            Self::Json => "JSON",
            Self::Link => "Linked model",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = CmdbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| CmdbError::validation(format!("unsupported field type: {s}")))
    }
}

/// A typed field definition belonging to a model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attribute {
    pub id: Uuid,
    pub model_uid: String,
    /// Unique within `model_uid`.
    pub field_uid: String,
    pub field_name: String,
    pub field_type: FieldType,
    pub group_id: Option<Uuid>,
    pub display_name: String,
    pub display: bool,
    pub index: i64,
    pub required: bool,
    pub editable: bool,
    pub searchable: bool,
    pub unique: bool,
    /// Value is sensitive and should be masked by presentation layers.
    pub secure: bool,
    pub link: bool,
    pub link_model: Option<String>,
    /// Choices for `enum` fields (array or object, caller defined).
    pub option: serde_json::Value,
    pub default: String,
    pub placeholder: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAttribute {
    pub model_uid: String,
    pub field_uid: String,
    pub field_name: String,
    pub field_type: FieldType,
    pub group_id: Option<Uuid>,
    pub display_name: String,
    pub display: bool,
    pub index: i64,
    pub required: bool,
    pub editable: bool,
    pub searchable: bool,
    pub unique: bool,
    pub secure: bool,
    pub link: bool,
    pub link_model: Option<String>,
    pub option: Option<serde_json::Value>,
    pub default: String,
    pub placeholder: String,
    pub description: String,
}

impl CreateAttribute {
    /// Minimal definition with display/editable enabled and no flags set.
    pub fn new(
        model_uid: impl Into<String>,
        field_uid: impl Into<String>,
        field_name: impl Into<String>,
        field_type: FieldType,
    ) -> Self {
        let field_name = field_name.into();
        Self {
            model_uid: model_uid.into(),
            field_uid: field_uid.into(),
            display_name: field_name.clone(),
            field_name,
            field_type,
            group_id: None,
            display: true,
            index: 0,
            required: false,
            editable: true,
            searchable: false,
            unique: false,
            secure: false,
            link: false,
            link_model: None,
            option: None,
            default: String::new(),
            placeholder: String::new(),
            description: String::new(),
        }
    }

    pub fn validate(&self) -> CmdbResult<()> {
        if self.field_uid.trim().is_empty() {
            return Err(CmdbError::validation("attribute field uid cannot be empty"));
        }
        if self.field_name.trim().is_empty() {
            return Err(CmdbError::validation("attribute field name cannot be empty"));
        }
        if self.model_uid.trim().is_empty() {
            return Err(CmdbError::validation("attribute model uid cannot be empty"));
        }
        if self.link && self.link_model.as_deref().is_none_or(str::is_empty) {
            return Err(CmdbError::validation("link attribute requires a link model"));
        }
        Ok(())
    }
}

/// Mutable attribute fields. `field_uid` and `model_uid` are immutable.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateAttribute {
    pub field_name: Option<String>,
    pub field_type: Option<FieldType>,
    pub group_id: Option<Option<Uuid>>,
    pub display_name: Option<String>,
    pub display: Option<bool>,
    pub index: Option<i64>,
    pub required: Option<bool>,
    pub editable: Option<bool>,
    pub searchable: Option<bool>,
    pub unique: Option<bool>,
    pub secure: Option<bool>,
    pub link: Option<bool>,
    pub link_model: Option<Option<String>>,
    pub option: Option<serde_json::Value>,
    pub default: Option<String>,
    pub placeholder: Option<String>,
    pub description: Option<String>,
}

/// UIDs of the builtin attribute groups every model receives.
pub const ATTR_GROUP_BASIC: &str = "basic";
pub const ATTR_GROUP_NETWORK: &str = "network";
pub const ATTR_GROUP_RESOURCE: &str = "resource";
pub const ATTR_GROUP_TIME: &str = "time";
pub const ATTR_GROUP_CUSTOM: &str = "custom";

/// Grouping of attributes within a model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeGroup {
    pub id: Uuid,
    pub model_uid: String,
    pub uid: String,
    pub name: String,
    pub index: i64,
    /// Builtin groups cannot be deleted and keep their UID.
    pub is_builtin: bool,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAttributeGroup {
    pub model_uid: String,
    pub uid: String,
    pub name: String,
    pub index: i64,
    pub is_builtin: bool,
    pub description: String,
}

impl CreateAttributeGroup {
    pub fn validate(&self) -> CmdbResult<()> {
        if self.uid.trim().is_empty()
            || self.name.trim().is_empty()
            || self.model_uid.trim().is_empty()
        {
            return Err(CmdbError::validation(
                "attribute group requires uid, name and model uid",
            ));
        }
        Ok(())
    }

    /// The five groups created for every new model.
    pub fn builtin(model_uid: &str) -> Vec<Self> {
        [
            (ATTR_GROUP_BASIC, "Basic", 1),
            (ATTR_GROUP_NETWORK, "Network", 2),
            (ATTR_GROUP_RESOURCE, "Resource", 3),
            (ATTR_GROUP_TIME, "Time", 4),
            (ATTR_GROUP_CUSTOM, "Custom", 100),
        ]
        .into_iter()
        .map(|(uid, name, index)| Self {
            model_uid: model_uid.to_string(),
            uid: uid.to_string(),
            name: name.to_string(),
            index,
            is_builtin: true,
            description: String::new(),
        })
        .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateAttributeGroup {
    pub uid: Option<String>,
    pub name: Option<String>,
    pub index: Option<i64>,
    pub description: Option<String>,
}

/// An attribute group together with its attributes, in display order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeGroupWithAttributes {
    #[serde(flatten)]
    pub group: AttributeGroup,
    pub attributes: Vec<Attribute>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_type_round_trips_through_str() {
        for t in FieldType::ALL {
            assert_eq!(t.as_str().parse::<FieldType>().unwrap(), t);
        }
        assert!("blob".parse::<FieldType>().is_err());
    }

    #[test]
    fn builtin_groups_cover_custom() {
        let groups = CreateAttributeGroup::builtin("cloud_vm");
        assert_eq!(groups.len(), 5);
        assert!(groups.iter().all(|g| g.is_builtin));
        assert!(groups.iter().any(|g| g.uid == ATTR_GROUP_CUSTOM));
    }

    #[test]
    fn link_attribute_requires_model() {
        let mut attr = CreateAttribute::new("cloud_vm", "vpc", "VPC", FieldType::Link);
        attr.link = true;
        assert!(attr.validate().is_err());
        attr.link_model = Some("cloud_vpc".into());
        assert!(attr.validate().is_ok());
    }
}
