//! SurrealDB implementation of [`InstanceRelationRepository`].
//!
//! Relations are stored as `instance_relation` graph edges between
//! `instance` records: `instance:<src> -> instance_relation:<id> ->
//! instance:<tgt>`. The unique index on `(in, out, relation_type_uid)`
//! rejects duplicate triples at the storage layer.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use cmdb_core::error::{CmdbError, CmdbResult};
use cmdb_core::models::relation::{
    CreateInstanceRelation, InstanceRelation, InstanceRelationFilter,
};
use cmdb_core::repository::{InstanceRelationRepository, PaginatedResult, Pagination};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::debug;
use uuid::Uuid;

use crate::error::DbError;
use crate::rows::{CountRow, parse_uuid, total_of, where_clause};

#[derive(Debug, SurrealValue)]
struct RelationRow {
    record_id: String,
    source_id: String,
    target_id: String,
    tenant_id: String,
    relation_type_uid: String,
    created_at: DateTime<Utc>,
}

impl RelationRow {
    fn try_into_relation(self) -> Result<InstanceRelation, DbError> {
        Ok(InstanceRelation {
            id: parse_uuid(&self.record_id, "instance relation")?,
            tenant_id: parse_uuid(&self.tenant_id, "tenant")?,
            source_instance_id: parse_uuid(&self.source_id, "source instance")?,
            target_instance_id: parse_uuid(&self.target_id, "target instance")?,
            relation_type_uid: self.relation_type_uid,
            created_at: self.created_at,
        })
    }
}

const SELECT_RELATION: &str = "SELECT meta::id(id) AS record_id, \
     meta::id(in) AS source_id, meta::id(out) AS target_id, \
     tenant_id, relation_type_uid, created_at FROM instance_relation";

fn triple_key(input: &CreateInstanceRelation) -> String {
    format!(
        "{} -[{}]-> {}",
        input.source_instance_id, input.relation_type_uid, input.target_instance_id
    )
}

/// SurrealDB implementation of the InstanceRelation repository.
#[derive(Clone)]
pub struct SurrealInstanceRelationRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealInstanceRelationRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn fetch_one(&self, tenant_id: Option<Uuid>, id: Uuid) -> CmdbResult<InstanceRelation> {
        let id_str = id.to_string();
        let mut predicates = vec!["id = type::record('instance_relation', $id)"];
        if tenant_id.is_some() {
            predicates.push("tenant_id = $tenant_id");
        }
        let query = format!("{SELECT_RELATION}{}", where_clause(&predicates));

        let mut builder = self.db.query(query).bind(("id", id_str.clone()));
        if let Some(tenant_id) = tenant_id {
            builder = builder.bind(("tenant_id", tenant_id.to_string()));
        }

        let mut result = builder.await.map_err(DbError::from)?;
        let rows: Vec<RelationRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "instance_relation".into(),
            id: id_str,
        })?;

        row.try_into_relation().map_err(Into::into)
    }
}

impl<C: Connection> InstanceRelationRepository for SurrealInstanceRelationRepository<C> {
    async fn create(&self, input: CreateInstanceRelation) -> CmdbResult<InstanceRelation> {
        let id = Uuid::new_v4();
        let key = triple_key(&input);

        // IDs are formatted from `Uuid`s, which cannot break out of the
        // backtick-quoted record ID.
        let query = format!(
            "RELATE instance:`{}` -> instance_relation:`{}` -> instance:`{}` \
             SET tenant_id = $tenant_id, relation_type_uid = $relation_type_uid;",
            input.source_instance_id, id, input.target_instance_id,
        );

        self.db
            .query(query)
            .bind(("tenant_id", input.tenant_id.to_string()))
            .bind(("relation_type_uid", input.relation_type_uid))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_statement(e, "instance_relation", &key))?;

        self.fetch_one(None, id).await
    }

    async fn create_batch(
        &self,
        inputs: Vec<CreateInstanceRelation>,
    ) -> CmdbResult<Vec<InstanceRelation>> {
        let mut seen = HashSet::with_capacity(inputs.len());
        let mut created = Vec::with_capacity(inputs.len());
        for input in inputs {
            if !seen.insert(input.clone()) {
                continue;
            }
            match self.create(input).await {
                Ok(relation) => created.push(relation),
                Err(CmdbError::AlreadyExists { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        debug!(count = created.len(), "Created relation batch");
        Ok(created)
    }

    async fn get_by_id(&self, tenant_id: Uuid, id: Uuid) -> CmdbResult<InstanceRelation> {
        self.fetch_one(Some(tenant_id), id).await
    }

    async fn exists(
        &self,
        source_instance_id: Uuid,
        target_instance_id: Uuid,
        relation_type_uid: &str,
    ) -> CmdbResult<bool> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM instance_relation \
                 WHERE in = type::record('instance', $source) \
                 AND out = type::record('instance', $target) \
                 AND relation_type_uid = $relation_type_uid GROUP ALL",
            )
            .bind(("source", source_instance_id.to_string()))
            .bind(("target", target_instance_id.to_string()))
            .bind(("relation_type_uid", relation_type_uid.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(total_of(&rows) > 0)
    }

    async fn list(
        &self,
        filter: InstanceRelationFilter,
        pagination: Pagination,
    ) -> CmdbResult<PaginatedResult<InstanceRelation>> {
        let mut predicates = Vec::new();
        if filter.tenant_id.is_some() {
            predicates.push("tenant_id = $tenant_id");
        }
        if filter.source_instance_id.is_some() {
            predicates.push("in = type::record('instance', $source)");
        }
        if filter.target_instance_id.is_some() {
            predicates.push("out = type::record('instance', $target)");
        }
        if filter.relation_type_uid.is_some() {
            predicates.push("relation_type_uid = $relation_type_uid");
        }
        let where_sql = where_clause(&predicates);

        let query = format!(
            "SELECT count() AS total FROM instance_relation{where_sql} GROUP ALL; \
             {SELECT_RELATION}{where_sql} \
             ORDER BY created_at ASC LIMIT $limit START $offset;"
        );

        let mut builder = self
            .db
            .query(query)
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset));
        if let Some(tenant_id) = filter.tenant_id {
            builder = builder.bind(("tenant_id", tenant_id.to_string()));
        }
        if let Some(source) = filter.source_instance_id {
            builder = builder.bind(("source", source.to_string()));
        }
        if let Some(target) = filter.target_instance_id {
            builder = builder.bind(("target", target.to_string()));
        }
        if let Some(type_uid) = filter.relation_type_uid {
            builder = builder.bind(("relation_type_uid", type_uid));
        }

        let mut result = builder.await.map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let rows: Vec<RelationRow> = result.take(1).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(RelationRow::try_into_relation)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total: total_of(&count_rows),
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn delete(&self, tenant_id: Uuid, id: Uuid) -> CmdbResult<()> {
        let mut result = self
            .db
            .query(
                "DELETE instance_relation \
                 WHERE id = type::record('instance_relation', $id) \
                 AND tenant_id = $tenant_id RETURN BEFORE",
            )
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let removed: Vec<serde_json::Value> = result.take(0).map_err(DbError::from)?;
        if removed.is_empty() {
            return Err(DbError::NotFound {
                entity: "instance_relation".into(),
                id: id.to_string(),
            }
            .into());
        }
        Ok(())
    }

    async fn delete_by_instance_id(&self, tenant_id: Uuid, instance_id: Uuid) -> CmdbResult<u64> {
        let mut result = self
            .db
            .query(
                "DELETE instance_relation WHERE tenant_id = $tenant_id \
                 AND (in = type::record('instance', $instance) \
                 OR out = type::record('instance', $instance)) \
                 RETURN BEFORE",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("instance", instance_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let removed: Vec<serde_json::Value> = result.take(0).map_err(DbError::from)?;
        Ok(removed.len() as u64)
    }
}
