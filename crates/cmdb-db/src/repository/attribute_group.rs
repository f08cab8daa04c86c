//! SurrealDB implementation of [`AttributeGroupRepository`].

use chrono::{DateTime, Utc};
use cmdb_core::error::{CmdbError, CmdbResult};
use cmdb_core::models::attribute::{AttributeGroup, CreateAttributeGroup, UpdateAttributeGroup};
use cmdb_core::repository::AttributeGroupRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;
use crate::rows::parse_uuid;

#[derive(Debug, SurrealValue)]
struct AttributeGroupRow {
    record_id: String,
    model_uid: String,
    uid: String,
    name: String,
    sort_index: i64,
    is_builtin: bool,
    description: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl AttributeGroupRow {
    fn try_into_group(self) -> Result<AttributeGroup, DbError> {
        Ok(AttributeGroup {
            id: parse_uuid(&self.record_id, "attribute group")?,
            model_uid: self.model_uid,
            uid: self.uid,
            name: self.name,
            index: self.sort_index,
            is_builtin: self.is_builtin,
            description: self.description,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const SELECT_GROUP: &str = "SELECT meta::id(id) AS record_id, * FROM attribute_group";

/// SurrealDB implementation of the AttributeGroup repository.
#[derive(Clone)]
pub struct SurrealAttributeGroupRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealAttributeGroupRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> AttributeGroupRepository for SurrealAttributeGroupRepository<C> {
    async fn create(&self, input: CreateAttributeGroup) -> CmdbResult<AttributeGroup> {
        let id = Uuid::new_v4();
        let key = format!("{}.{}", input.model_uid, input.uid);

        self.db
            .query(
                "CREATE type::record('attribute_group', $id) SET \
                 model_uid = $model_uid, uid = $uid, name = $name, \
                 sort_index = $sort_index, is_builtin = $is_builtin, \
                 description = $description",
            )
            .bind(("id", id.to_string()))
            .bind(("model_uid", input.model_uid))
            .bind(("uid", input.uid))
            .bind(("name", input.name))
            .bind(("sort_index", input.index))
            .bind(("is_builtin", input.is_builtin))
            .bind(("description", input.description))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_statement(e, "attribute_group", &key))?;

        self.get_by_id(id).await
    }

    async fn upsert(&self, input: CreateAttributeGroup) -> CmdbResult<AttributeGroup> {
        match self.get_by_uid(&input.model_uid, &input.uid).await {
            Ok(existing) => Ok(existing),
            Err(CmdbError::NotFound { .. }) => {
                let model_uid = input.model_uid.clone();
                let uid = input.uid.clone();
                match self.create(input).await {
                    // Lost a race with a concurrent writer; theirs wins.
                    Err(CmdbError::AlreadyExists { .. }) => self.get_by_uid(&model_uid, &uid).await,
                    other => other,
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn get_by_id(&self, id: Uuid) -> CmdbResult<AttributeGroup> {
        let id_str = id.to_string();
        let mut result = self
            .db
            .query(format!(
                "{SELECT_GROUP} WHERE id = type::record('attribute_group', $id)"
            ))
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<AttributeGroupRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "attribute_group".into(),
            id: id_str,
        })?;

        row.try_into_group().map_err(Into::into)
    }

    async fn get_by_uid(&self, model_uid: &str, uid: &str) -> CmdbResult<AttributeGroup> {
        let mut result = self
            .db
            .query(format!(
                "{SELECT_GROUP} WHERE model_uid = $model_uid AND uid = $uid"
            ))
            .bind(("model_uid", model_uid.to_string()))
            .bind(("uid", uid.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<AttributeGroupRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "attribute_group".into(),
            id: format!("{model_uid}.{uid}"),
        })?;

        row.try_into_group().map_err(Into::into)
    }

    async fn update(&self, id: Uuid, input: UpdateAttributeGroup) -> CmdbResult<AttributeGroup> {
        let mut sets = Vec::new();
        if input.uid.is_some() {
            sets.push("uid = $uid");
        }
        if input.name.is_some() {
            sets.push("name = $name");
        }
        if input.index.is_some() {
            sets.push("sort_index = $sort_index");
        }
        if input.description.is_some() {
            sets.push("description = $description");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('attribute_group', $id) SET {}",
            sets.join(", ")
        );

        let key = input.uid.clone().unwrap_or_else(|| id.to_string());
        let mut builder = self.db.query(&query).bind(("id", id.to_string()));
        if let Some(uid) = input.uid {
            builder = builder.bind(("uid", uid));
        }
        if let Some(name) = input.name {
            builder = builder.bind(("name", name));
        }
        if let Some(index) = input.index {
            builder = builder.bind(("sort_index", index));
        }
        if let Some(description) = input.description {
            builder = builder.bind(("description", description));
        }

        builder
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_statement(e, "attribute_group", &key))?;

        self.get_by_id(id).await
    }

    async fn delete(&self, id: Uuid) -> CmdbResult<()> {
        self.db
            .query("DELETE type::record('attribute_group', $id)")
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        Ok(())
    }

    async fn list_by_model(&self, model_uid: &str) -> CmdbResult<Vec<AttributeGroup>> {
        let mut result = self
            .db
            .query(format!(
                "{SELECT_GROUP} WHERE model_uid = $model_uid \
                 ORDER BY sort_index ASC, uid ASC"
            ))
            .bind(("model_uid", model_uid.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<AttributeGroupRow> = result.take(0).map_err(DbError::from)?;

        rows.into_iter()
            .map(AttributeGroupRow::try_into_group)
            .collect::<Result<Vec<_>, DbError>>()
            .map_err(Into::into)
    }
}
