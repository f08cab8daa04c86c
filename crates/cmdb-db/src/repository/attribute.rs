//! SurrealDB implementation of [`AttributeRepository`].

use chrono::{DateTime, Utc};
use cmdb_core::error::CmdbResult;
use cmdb_core::models::attribute::{Attribute, CreateAttribute, FieldType, UpdateAttribute};
use cmdb_core::repository::AttributeRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;
use crate::rows::{CountRow, parse_opt_uuid, parse_uuid, total_of};

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct AttributeRow {
    record_id: String,
    model_uid: String,
    field_uid: String,
    field_name: String,
    field_type: String,
    group_id: Option<String>,
    display_name: String,
    display: bool,
    sort_index: i64,
    required: bool,
    editable: bool,
    searchable: bool,
    is_unique: bool,
    secure: bool,
    is_link: bool,
    link_model: Option<String>,
    options: serde_json::Value,
    default_value: String,
    placeholder: String,
    description: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl AttributeRow {
    fn try_into_attribute(self) -> Result<Attribute, DbError> {
        let field_type = self
            .field_type
            .parse::<FieldType>()
            .map_err(|e| DbError::Decode(e.to_string()))?;
        Ok(Attribute {
            id: parse_uuid(&self.record_id, "attribute")?,
            model_uid: self.model_uid,
            field_uid: self.field_uid,
            field_name: self.field_name,
            field_type,
            group_id: parse_opt_uuid(self.group_id.as_deref(), "attribute group")?,
            display_name: self.display_name,
            display: self.display,
            index: self.sort_index,
            required: self.required,
            editable: self.editable,
            searchable: self.searchable,
            unique: self.is_unique,
            secure: self.secure,
            link: self.is_link,
            link_model: self.link_model,
            option: self.options,
            default: self.default_value,
            placeholder: self.placeholder,
            description: self.description,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const SELECT_ATTRIBUTE: &str = "SELECT meta::id(id) AS record_id, * FROM attribute";

/// SurrealDB implementation of the Attribute repository.
#[derive(Clone)]
pub struct SurrealAttributeRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealAttributeRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn fetch_one(&self, id: Uuid) -> CmdbResult<Attribute> {
        let id_str = id.to_string();
        let mut result = self
            .db
            .query(format!(
                "{SELECT_ATTRIBUTE} WHERE id = type::record('attribute', $id)"
            ))
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<AttributeRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "attribute".into(),
            id: id_str,
        })?;

        row.try_into_attribute().map_err(Into::into)
    }
}

impl<C: Connection> AttributeRepository for SurrealAttributeRepository<C> {
    async fn create(&self, input: CreateAttribute) -> CmdbResult<Attribute> {
        let id = Uuid::new_v4();
        let key = format!("{}.{}", input.model_uid, input.field_uid);

        self.db
            .query(
                "CREATE type::record('attribute', $id) SET \
                 model_uid = $model_uid, field_uid = $field_uid, \
                 field_name = $field_name, field_type = $field_type, \
                 group_id = $group_id, display_name = $display_name, \
                 display = $display, sort_index = $sort_index, \
                 required = $required, editable = $editable, \
                 searchable = $searchable, is_unique = $is_unique, \
                 secure = $secure, is_link = $is_link, \
                 link_model = $link_model, options = $options, \
                 default_value = $default_value, \
                 placeholder = $placeholder, description = $description",
            )
            .bind(("id", id.to_string()))
            .bind(("model_uid", input.model_uid))
            .bind(("field_uid", input.field_uid))
            .bind(("field_name", input.field_name))
            .bind(("field_type", input.field_type.as_str()))
            .bind(("group_id", input.group_id.map(|g| g.to_string())))
            .bind(("display_name", input.display_name))
            .bind(("display", input.display))
            .bind(("sort_index", input.index))
            .bind(("required", input.required))
            .bind(("editable", input.editable))
            .bind(("searchable", input.searchable))
            .bind(("is_unique", input.unique))
            .bind(("secure", input.secure))
            .bind(("is_link", input.link))
            .bind(("link_model", input.link_model))
            .bind((
                "options",
                input
                    .option
                    .unwrap_or(serde_json::Value::Array(Vec::new())),
            ))
            .bind(("default_value", input.default))
            .bind(("placeholder", input.placeholder))
            .bind(("description", input.description))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_statement(e, "attribute", &key))?;

        self.fetch_one(id).await
    }

    async fn get_by_id(&self, id: Uuid) -> CmdbResult<Attribute> {
        self.fetch_one(id).await
    }

    async fn get_by_field_uid(&self, model_uid: &str, field_uid: &str) -> CmdbResult<Attribute> {
        let mut result = self
            .db
            .query(format!(
                "{SELECT_ATTRIBUTE} WHERE model_uid = $model_uid \
                 AND field_uid = $field_uid"
            ))
            .bind(("model_uid", model_uid.to_string()))
            .bind(("field_uid", field_uid.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<AttributeRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "attribute".into(),
            id: format!("{model_uid}.{field_uid}"),
        })?;

        row.try_into_attribute().map_err(Into::into)
    }

    async fn exists(&self, model_uid: &str, field_uid: &str) -> CmdbResult<bool> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM attribute \
                 WHERE model_uid = $model_uid AND field_uid = $field_uid \
                 GROUP ALL",
            )
            .bind(("model_uid", model_uid.to_string()))
            .bind(("field_uid", field_uid.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(total_of(&rows) > 0)
    }

    async fn update(&self, id: Uuid, input: UpdateAttribute) -> CmdbResult<Attribute> {
        let mut sets = Vec::new();
        if input.field_name.is_some() {
            sets.push("field_name = $field_name");
        }
        if input.field_type.is_some() {
            sets.push("field_type = $field_type");
        }
        if input.group_id.is_some() {
            sets.push("group_id = $group_id");
        }
        if input.display_name.is_some() {
            sets.push("display_name = $display_name");
        }
        if input.display.is_some() {
            sets.push("display = $display");
        }
        if input.index.is_some() {
            sets.push("sort_index = $sort_index");
        }
        if input.required.is_some() {
            sets.push("required = $required");
        }
        if input.editable.is_some() {
            sets.push("editable = $editable");
        }
        if input.searchable.is_some() {
            sets.push("searchable = $searchable");
        }
        if input.unique.is_some() {
            sets.push("is_unique = $is_unique");
        }
        if input.secure.is_some() {
            sets.push("secure = $secure");
        }
        if input.link.is_some() {
            sets.push("is_link = $is_link");
        }
        if input.link_model.is_some() {
            sets.push("link_model = $link_model");
        }
        if input.option.is_some() {
            sets.push("options = $options");
        }
        if input.default.is_some() {
            sets.push("default_value = $default_value");
        }
        if input.placeholder.is_some() {
            sets.push("placeholder = $placeholder");
        }
        if input.description.is_some() {
            sets.push("description = $description");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('attribute', $id) SET {}",
            sets.join(", ")
        );

        let mut builder = self.db.query(&query).bind(("id", id.to_string()));
        if let Some(v) = input.field_name {
            builder = builder.bind(("field_name", v));
        }
        if let Some(v) = input.field_type {
            builder = builder.bind(("field_type", v.as_str()));
        }
        if let Some(v) = input.group_id {
            builder = builder.bind(("group_id", v.map(|g| g.to_string())));
        }
        if let Some(v) = input.display_name {
            builder = builder.bind(("display_name", v));
        }
        if let Some(v) = input.display {
            builder = builder.bind(("display", v));
        }
        if let Some(v) = input.index {
            builder = builder.bind(("sort_index", v));
        }
        if let Some(v) = input.required {
            builder = builder.bind(("required", v));
        }
        if let Some(v) = input.editable {
            builder = builder.bind(("editable", v));
        }
        if let Some(v) = input.searchable {
            builder = builder.bind(("searchable", v));
        }
        if let Some(v) = input.unique {
            builder = builder.bind(("is_unique", v));
        }
        if let Some(v) = input.secure {
            builder = builder.bind(("secure", v));
        }
        if let Some(v) = input.link {
            builder = builder.bind(("is_link", v));
        }
        if let Some(v) = input.link_model {
            builder = builder.bind(("link_model", v));
        }
        if let Some(v) = input.option {
            builder = builder.bind(("options", v));
        }
        if let Some(v) = input.default {
            builder = builder.bind(("default_value", v));
        }
        if let Some(v) = input.placeholder {
            builder = builder.bind(("placeholder", v));
        }
        if let Some(v) = input.description {
            builder = builder.bind(("description", v));
        }

        builder
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        self.fetch_one(id).await
    }

    async fn delete(&self, id: Uuid) -> CmdbResult<()> {
        self.db
            .query("DELETE type::record('attribute', $id)")
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        Ok(())
    }

    async fn list_by_model(&self, model_uid: &str) -> CmdbResult<Vec<Attribute>> {
        let mut result = self
            .db
            .query(format!(
                "{SELECT_ATTRIBUTE} WHERE model_uid = $model_uid \
                 ORDER BY sort_index ASC, field_uid ASC"
            ))
            .bind(("model_uid", model_uid.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<AttributeRow> = result.take(0).map_err(DbError::from)?;

        rows.into_iter()
            .map(AttributeRow::try_into_attribute)
            .collect::<Result<Vec<_>, DbError>>()
            .map_err(Into::into)
    }
}
