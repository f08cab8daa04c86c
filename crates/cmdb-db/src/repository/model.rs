//! SurrealDB implementation of [`ModelRepository`].

use chrono::{DateTime, Utc};
use cmdb_core::error::CmdbResult;
use cmdb_core::models::model::{CreateModel, Model, ModelFilter, UpdateModel};
use cmdb_core::repository::{ModelRepository, PaginatedResult, Pagination};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;

use crate::error::DbError;
use crate::rows::{CountRow, total_of, where_clause};

#[derive(Debug, SurrealValue)]
struct ModelRow {
    uid: String,
    name: String,
    category: String,
    parent_uid: Option<String>,
    level: i64,
    provider: String,
    icon: String,
    description: String,
    extensible: bool,
    model_group: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ModelRow> for Model {
    fn from(row: ModelRow) -> Self {
        Model {
            uid: row.uid,
            name: row.name,
            category: row.category,
            parent_uid: row.parent_uid,
            level: row.level,
            provider: row.provider,
            icon: row.icon,
            description: row.description,
            extensible: row.extensible,
            model_group: row.model_group,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// SurrealDB implementation of the Model repository.
///
/// Records are keyed by model UID, so `model:<uid>` is the natural key.
#[derive(Clone)]
pub struct SurrealModelRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealModelRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> ModelRepository for SurrealModelRepository<C> {
    async fn create(&self, input: CreateModel) -> CmdbResult<Model> {
        let uid = input.uid.clone();

        let result = self
            .db
            .query(
                "CREATE type::record('model', $uid) SET \
                 uid = $uid, name = $name, category = $category, \
                 parent_uid = $parent_uid, level = $level, \
                 provider = $provider, icon = $icon, \
                 description = $description, extensible = $extensible, \
                 model_group = $model_group",
            )
            .bind(("uid", input.uid))
            .bind(("name", input.name))
            .bind(("category", input.category))
            .bind(("parent_uid", input.parent_uid))
            .bind(("level", input.level))
            .bind(("provider", input.provider))
            .bind(("icon", input.icon))
            .bind(("description", input.description))
            .bind(("extensible", input.extensible))
            .bind(("model_group", input.model_group))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement(e, "model", &uid))?;

        let rows: Vec<ModelRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "model".into(),
            id: uid,
        })?;

        Ok(row.into())
    }

    async fn get_by_uid(&self, uid: &str) -> CmdbResult<Model> {
        let mut result = self
            .db
            .query("SELECT * FROM type::record('model', $uid)")
            .bind(("uid", uid.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ModelRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "model".into(),
            id: uid.to_string(),
        })?;

        Ok(row.into())
    }

    async fn exists(&self, uid: &str) -> CmdbResult<bool> {
        let mut result = self
            .db
            .query("SELECT count() AS total FROM model WHERE uid = $uid GROUP ALL")
            .bind(("uid", uid.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(total_of(&rows) > 0)
    }

    async fn update(&self, uid: &str, input: UpdateModel) -> CmdbResult<Model> {
        let mut sets = Vec::new();
        if input.name.is_some() {
            sets.push("name = $name");
        }
        if input.category.is_some() {
            sets.push("category = $category");
        }
        if input.parent_uid.is_some() {
            sets.push("parent_uid = $parent_uid");
        }
        if input.level.is_some() {
            sets.push("level = $level");
        }
        if input.provider.is_some() {
            sets.push("provider = $provider");
        }
        if input.icon.is_some() {
            sets.push("icon = $icon");
        }
        if input.description.is_some() {
            sets.push("description = $description");
        }
        if input.extensible.is_some() {
            sets.push("extensible = $extensible");
        }
        if input.model_group.is_some() {
            sets.push("model_group = $model_group");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('model', $uid) SET {}",
            sets.join(", ")
        );

        let mut builder = self.db.query(&query).bind(("uid", uid.to_string()));
        if let Some(name) = input.name {
            builder = builder.bind(("name", name));
        }
        if let Some(category) = input.category {
            builder = builder.bind(("category", category));
        }
        if let Some(parent_uid) = input.parent_uid {
            builder = builder.bind(("parent_uid", parent_uid));
        }
        if let Some(level) = input.level {
            builder = builder.bind(("level", level));
        }
        if let Some(provider) = input.provider {
            builder = builder.bind(("provider", provider));
        }
        if let Some(icon) = input.icon {
            builder = builder.bind(("icon", icon));
        }
        if let Some(description) = input.description {
            builder = builder.bind(("description", description));
        }
        if let Some(extensible) = input.extensible {
            builder = builder.bind(("extensible", extensible));
        }
        if let Some(model_group) = input.model_group {
            builder = builder.bind(("model_group", model_group));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement(e, "model", uid))?;

        let rows: Vec<ModelRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "model".into(),
            id: uid.to_string(),
        })?;

        Ok(row.into())
    }

    async fn delete(&self, uid: &str) -> CmdbResult<()> {
        // Attributes and groups have no meaning without their model.
        self.db
            .query(
                "DELETE attribute WHERE model_uid = $uid; \
                 DELETE attribute_group WHERE model_uid = $uid; \
                 DELETE type::record('model', $uid);",
            )
            .bind(("uid", uid.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_statement(e, "model", uid))?;

        Ok(())
    }

    async fn list(
        &self,
        filter: ModelFilter,
        pagination: Pagination,
    ) -> CmdbResult<PaginatedResult<Model>> {
        let mut predicates = Vec::new();
        if filter.provider.is_some() {
            predicates.push("provider = $provider");
        }
        if filter.category.is_some() {
            predicates.push("category = $category");
        }
        if filter.parent_uid.is_some() {
            predicates.push("parent_uid = $parent_uid");
        }
        if filter.model_group.is_some() {
            predicates.push("model_group = $model_group");
        }
        if filter.extensible.is_some() {
            predicates.push("extensible = $extensible");
        }
        let where_sql = where_clause(&predicates);

        let query = format!(
            "SELECT count() AS total FROM model{where_sql} GROUP ALL; \
             SELECT * FROM model{where_sql} \
             ORDER BY uid ASC LIMIT $limit START $offset;"
        );

        let mut builder = self
            .db
            .query(query)
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset));
        if let Some(provider) = filter.provider {
            builder = builder.bind(("provider", provider));
        }
        if let Some(category) = filter.category {
            builder = builder.bind(("category", category));
        }
        if let Some(parent_uid) = filter.parent_uid {
            builder = builder.bind(("parent_uid", parent_uid));
        }
        if let Some(model_group) = filter.model_group {
            builder = builder.bind(("model_group", model_group));
        }
        if let Some(extensible) = filter.extensible {
            builder = builder.bind(("extensible", extensible));
        }

        let mut result = builder.await.map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let rows: Vec<ModelRow> = result.take(1).map_err(DbError::from)?;

        Ok(PaginatedResult {
            items: rows.into_iter().map(Model::from).collect(),
            total: total_of(&count_rows),
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
