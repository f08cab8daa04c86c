//! SurrealDB implementation of [`ModelRelationTypeRepository`].

use chrono::{DateTime, Utc};
use cmdb_core::error::CmdbResult;
use cmdb_core::models::relation_type::{
    CreateModelRelationType, ModelRelationType, ModelRelationTypeFilter, RelationDirection,
    RelationKind, UpdateModelRelationType,
};
use cmdb_core::repository::{ModelRelationTypeRepository, PaginatedResult, Pagination};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;

use crate::error::DbError;
use crate::rows::{CountRow, total_of, where_clause};

#[derive(Debug, SurrealValue)]
struct RelationTypeRow {
    uid: String,
    name: String,
    source_model_uid: String,
    target_model_uid: String,
    relation_type: String,
    direction: String,
    source_to_target: String,
    target_to_source: String,
    description: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RelationTypeRow {
    fn try_into_relation_type(self) -> Result<ModelRelationType, DbError> {
        let relation_type = self
            .relation_type
            .parse::<RelationKind>()
            .map_err(|e| DbError::Decode(e.to_string()))?;
        let direction = self
            .direction
            .parse::<RelationDirection>()
            .map_err(|e| DbError::Decode(e.to_string()))?;

        Ok(ModelRelationType {
            uid: self.uid,
            name: self.name,
            source_model_uid: self.source_model_uid,
            target_model_uid: self.target_model_uid,
            relation_type,
            direction,
            source_to_target: self.source_to_target,
            target_to_source: self.target_to_source,
            description: self.description,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn decode_all(rows: Vec<RelationTypeRow>) -> Result<Vec<ModelRelationType>, DbError> {
    rows.into_iter()
        .map(RelationTypeRow::try_into_relation_type)
        .collect()
}

/// SurrealDB implementation of the ModelRelationType repository.
#[derive(Clone)]
pub struct SurrealModelRelationTypeRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealModelRelationTypeRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> ModelRelationTypeRepository for SurrealModelRelationTypeRepository<C> {
    async fn create(&self, input: CreateModelRelationType) -> CmdbResult<ModelRelationType> {
        let uid = input.uid.clone();

        let result = self
            .db
            .query(
                "CREATE type::record('model_relation_type', $uid) SET \
                 uid = $uid, name = $name, \
                 source_model_uid = $source_model_uid, \
                 target_model_uid = $target_model_uid, \
                 relation_type = $relation_type, direction = $direction, \
                 source_to_target = $source_to_target, \
                 target_to_source = $target_to_source, \
                 description = $description",
            )
            .bind(("uid", input.uid))
            .bind(("name", input.name))
            .bind(("source_model_uid", input.source_model_uid))
            .bind(("target_model_uid", input.target_model_uid))
            .bind(("relation_type", input.relation_type.as_str()))
            .bind(("direction", input.direction.as_str()))
            .bind(("source_to_target", input.source_to_target))
            .bind(("target_to_source", input.target_to_source))
            .bind(("description", input.description))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement(e, "model_relation_type", &uid))?;

        let rows: Vec<RelationTypeRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "model_relation_type".into(),
            id: uid,
        })?;

        row.try_into_relation_type().map_err(Into::into)
    }

    async fn get_by_uid(&self, uid: &str) -> CmdbResult<ModelRelationType> {
        let mut result = self
            .db
            .query("SELECT * FROM type::record('model_relation_type', $uid)")
            .bind(("uid", uid.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RelationTypeRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "model_relation_type".into(),
            id: uid.to_string(),
        })?;

        row.try_into_relation_type().map_err(Into::into)
    }

    async fn exists(&self, uid: &str) -> CmdbResult<bool> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM model_relation_type \
                 WHERE uid = $uid GROUP ALL",
            )
            .bind(("uid", uid.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(total_of(&rows) > 0)
    }

    async fn update(
        &self,
        uid: &str,
        input: UpdateModelRelationType,
    ) -> CmdbResult<ModelRelationType> {
        let mut sets = Vec::new();
        if input.name.is_some() {
            sets.push("name = $name");
        }
        if input.relation_type.is_some() {
            sets.push("relation_type = $relation_type");
        }
        if input.direction.is_some() {
            sets.push("direction = $direction");
        }
        if input.source_to_target.is_some() {
            sets.push("source_to_target = $source_to_target");
        }
        if input.target_to_source.is_some() {
            sets.push("target_to_source = $target_to_source");
        }
        if input.description.is_some() {
            sets.push("description = $description");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('model_relation_type', $uid) SET {}",
            sets.join(", ")
        );

        let mut builder = self.db.query(&query).bind(("uid", uid.to_string()));
        if let Some(name) = input.name {
            builder = builder.bind(("name", name));
        }
        if let Some(kind) = input.relation_type {
            builder = builder.bind(("relation_type", kind.as_str()));
        }
        if let Some(direction) = input.direction {
            builder = builder.bind(("direction", direction.as_str()));
        }
        if let Some(label) = input.source_to_target {
            builder = builder.bind(("source_to_target", label));
        }
        if let Some(label) = input.target_to_source {
            builder = builder.bind(("target_to_source", label));
        }
        if let Some(description) = input.description {
            builder = builder.bind(("description", description));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<RelationTypeRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "model_relation_type".into(),
            id: uid.to_string(),
        })?;

        row.try_into_relation_type().map_err(Into::into)
    }

    async fn delete(&self, uid: &str) -> CmdbResult<()> {
        self.db
            .query("DELETE type::record('model_relation_type', $uid)")
            .bind(("uid", uid.to_string()))
            .await
            .map_err(DbError::from)?;

        Ok(())
    }

    async fn list(
        &self,
        filter: ModelRelationTypeFilter,
        pagination: Pagination,
    ) -> CmdbResult<PaginatedResult<ModelRelationType>> {
        let mut predicates = Vec::new();
        if filter.source_model_uid.is_some() {
            predicates.push("source_model_uid = $source_model_uid");
        }
        if filter.target_model_uid.is_some() {
            predicates.push("target_model_uid = $target_model_uid");
        }
        if filter.relation_type.is_some() {
            predicates.push("relation_type = $relation_type");
        }
        let where_sql = where_clause(&predicates);

        let query = format!(
            "SELECT count() AS total FROM model_relation_type{where_sql} GROUP ALL; \
             SELECT * FROM model_relation_type{where_sql} \
             ORDER BY uid ASC LIMIT $limit START $offset;"
        );

        let mut builder = self
            .db
            .query(query)
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset));
        if let Some(source) = filter.source_model_uid {
            builder = builder.bind(("source_model_uid", source));
        }
        if let Some(target) = filter.target_model_uid {
            builder = builder.bind(("target_model_uid", target));
        }
        if let Some(kind) = filter.relation_type {
            builder = builder.bind(("relation_type", kind.as_str()));
        }

        let mut result = builder.await.map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let rows: Vec<RelationTypeRow> = result.take(1).map_err(DbError::from)?;

        Ok(PaginatedResult {
            items: decode_all(rows)?,
            total: total_of(&count_rows),
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn find_by_models(
        &self,
        source_uid: &str,
        target_uid: &str,
    ) -> CmdbResult<Vec<ModelRelationType>> {
        let mut result = self
            .db
            .query(
                "SELECT * FROM model_relation_type \
                 WHERE source_model_uid = $source AND target_model_uid = $target \
                 ORDER BY uid ASC",
            )
            .bind(("source", source_uid.to_string()))
            .bind(("target", target_uid.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RelationTypeRow> = result.take(0).map_err(DbError::from)?;
        decode_all(rows).map_err(Into::into)
    }
}
