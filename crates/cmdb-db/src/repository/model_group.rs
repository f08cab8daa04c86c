//! SurrealDB implementation of [`ModelGroupRepository`].

use chrono::{DateTime, Utc};
use cmdb_core::error::{CmdbError, CmdbResult};
use cmdb_core::models::model_group::{CreateModelGroup, ModelGroup, UpdateModelGroup};
use cmdb_core::repository::ModelGroupRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;

use crate::error::DbError;
use crate::rows::{CountRow, total_of};

#[derive(Debug, SurrealValue)]
struct ModelGroupRow {
    uid: String,
    name: String,
    icon: String,
    sort_order: i64,
    is_builtin: bool,
    description: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ModelGroupRow> for ModelGroup {
    fn from(row: ModelGroupRow) -> Self {
        ModelGroup {
            uid: row.uid,
            name: row.name,
            icon: row.icon,
            sort_order: row.sort_order,
            is_builtin: row.is_builtin,
            description: row.description,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn first_row(rows: Vec<ModelGroupRow>, uid: &str) -> Result<ModelGroup, DbError> {
    rows.into_iter()
        .next()
        .map(ModelGroup::from)
        .ok_or_else(|| DbError::NotFound {
            entity: "model_group".into(),
            id: uid.to_string(),
        })
}

/// SurrealDB implementation of the ModelGroup repository.
///
/// Records are keyed by group UID (`model_group:<uid>`).
#[derive(Clone)]
pub struct SurrealModelGroupRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealModelGroupRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> ModelGroupRepository for SurrealModelGroupRepository<C> {
    async fn create(&self, input: CreateModelGroup) -> CmdbResult<ModelGroup> {
        let uid = input.uid.clone();

        let result = self
            .db
            .query(
                "CREATE type::record('model_group', $uid) SET \
                 uid = $uid, name = $name, icon = $icon, \
                 sort_order = $sort_order, is_builtin = $is_builtin, \
                 description = $description",
            )
            .bind(("uid", input.uid))
            .bind(("name", input.name))
            .bind(("icon", input.icon))
            .bind(("sort_order", input.sort_order))
            .bind(("is_builtin", input.is_builtin))
            .bind(("description", input.description))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement(e, "model_group", &uid))?;

        let rows: Vec<ModelGroupRow> = result.take(0).map_err(DbError::from)?;
        first_row(rows, &uid).map_err(Into::into)
    }

    async fn upsert(&self, input: CreateModelGroup) -> CmdbResult<ModelGroup> {
        match self.get_by_uid(&input.uid).await {
            Ok(existing) => Ok(existing),
            Err(CmdbError::NotFound { .. }) => {
                let uid = input.uid.clone();
                match self.create(input).await {
                    Err(CmdbError::AlreadyExists { .. }) => self.get_by_uid(&uid).await,
                    other => other,
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn get_by_uid(&self, uid: &str) -> CmdbResult<ModelGroup> {
        let mut result = self
            .db
            .query("SELECT * FROM type::record('model_group', $uid)")
            .bind(("uid", uid.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ModelGroupRow> = result.take(0).map_err(DbError::from)?;
        first_row(rows, uid).map_err(Into::into)
    }

    async fn exists(&self, uid: &str) -> CmdbResult<bool> {
        let mut result = self
            .db
            .query("SELECT count() AS total FROM model_group WHERE uid = $uid GROUP ALL")
            .bind(("uid", uid.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(total_of(&rows) > 0)
    }

    async fn update(&self, uid: &str, input: UpdateModelGroup) -> CmdbResult<ModelGroup> {
        let mut sets = Vec::new();
        if input.name.is_some() {
            sets.push("name = $name");
        }
        if input.icon.is_some() {
            sets.push("icon = $icon");
        }
        if input.sort_order.is_some() {
            sets.push("sort_order = $sort_order");
        }
        if input.description.is_some() {
            sets.push("description = $description");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('model_group', $uid) SET {}",
            sets.join(", ")
        );

        let mut builder = self.db.query(&query).bind(("uid", uid.to_string()));
        if let Some(name) = input.name {
            builder = builder.bind(("name", name));
        }
        if let Some(icon) = input.icon {
            builder = builder.bind(("icon", icon));
        }
        if let Some(sort_order) = input.sort_order {
            builder = builder.bind(("sort_order", sort_order));
        }
        if let Some(description) = input.description {
            builder = builder.bind(("description", description));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement(e, "model_group", uid))?;

        let rows: Vec<ModelGroupRow> = result.take(0).map_err(DbError::from)?;
        first_row(rows, uid).map_err(Into::into)
    }

    async fn delete(&self, uid: &str) -> CmdbResult<()> {
        let mut result = self
            .db
            .query("DELETE type::record('model_group', $uid) RETURN BEFORE")
            .bind(("uid", uid.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ModelGroupRow> = result.take(0).map_err(DbError::from)?;
        first_row(rows, uid)?;
        Ok(())
    }

    async fn list(&self) -> CmdbResult<Vec<ModelGroup>> {
        let mut result = self
            .db
            .query("SELECT * FROM model_group ORDER BY sort_order ASC, uid ASC")
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ModelGroupRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.into_iter().map(ModelGroup::from).collect())
    }
}
