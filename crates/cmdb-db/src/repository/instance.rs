//! SurrealDB implementation of [`InstanceRepository`].

use chrono::{DateTime, Utc};
use cmdb_core::error::CmdbResult;
use cmdb_core::models::instance::{
    Instance, InstanceFilter, UpsertInstance, attributes_from_json, attributes_to_json,
};
use cmdb_core::repository::{InstanceRepository, PaginatedResult, Pagination};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;
use crate::rows::{CountRow, parse_uuid, total_of};

#[derive(Debug, SurrealValue)]
struct InstanceRow {
    record_id: String,
    tenant_id: String,
    model_uid: String,
    asset_id: String,
    asset_name: String,
    account_id: Option<i64>,
    attributes: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl InstanceRow {
    fn try_into_instance(self) -> Result<Instance, DbError> {
        Ok(Instance {
            id: parse_uuid(&self.record_id, "instance")?,
            tenant_id: parse_uuid(&self.tenant_id, "tenant")?,
            model_uid: self.model_uid,
            asset_id: self.asset_id,
            asset_name: self.asset_name,
            account_id: self.account_id,
            attributes: attributes_from_json(self.attributes),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const SELECT_INSTANCE: &str = "SELECT meta::id(id) AS record_id, * FROM instance";

/// SurrealDB implementation of the Instance repository.
///
/// Record IDs are derived from the natural key (see
/// [`Instance::natural_id`]), so an upsert of the same asset always lands
/// on the same record.
#[derive(Clone)]
pub struct SurrealInstanceRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealInstanceRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> InstanceRepository for SurrealInstanceRepository<C> {
    async fn upsert(&self, input: UpsertInstance) -> CmdbResult<Instance> {
        let id = Instance::natural_id(input.tenant_id, &input.model_uid, &input.asset_id);
        let key = format!("{}/{}", input.model_uid, input.asset_id);

        self.db
            .query(
                "UPSERT type::record('instance', $id) SET \
                 tenant_id = $tenant_id, model_uid = $model_uid, \
                 asset_id = $asset_id, asset_name = $asset_name, \
                 account_id = $account_id, attributes = $attributes, \
                 updated_at = time::now()",
            )
            .bind(("id", id.to_string()))
            .bind(("tenant_id", input.tenant_id.to_string()))
            .bind(("model_uid", input.model_uid))
            .bind(("asset_id", input.asset_id))
            .bind(("asset_name", input.asset_name))
            .bind(("account_id", input.account_id))
            .bind(("attributes", attributes_to_json(input.attributes)))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_statement(e, "instance", &key))?;

        self.get_by_id(input.tenant_id, id).await
    }

    async fn get_by_id(&self, tenant_id: Uuid, id: Uuid) -> CmdbResult<Instance> {
        let id_str = id.to_string();
        let mut result = self
            .db
            .query(format!(
                "{SELECT_INSTANCE} WHERE id = type::record('instance', $id) \
                 AND tenant_id = $tenant_id"
            ))
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<InstanceRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "instance".into(),
            id: id_str,
        })?;

        row.try_into_instance().map_err(Into::into)
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        filter: InstanceFilter,
        pagination: Pagination,
    ) -> CmdbResult<PaginatedResult<Instance>> {
        let mut predicates = vec!["tenant_id = $tenant_id"];
        if filter.model_uid.is_some() {
            predicates.push("model_uid = $model_uid");
        }
        if filter.account_id.is_some() {
            predicates.push("account_id = $account_id");
        }
        if filter.asset_id.is_some() {
            predicates.push("asset_id = $asset_id");
        }
        let where_sql = predicates.join(" AND ");

        let query = format!(
            "SELECT count() AS total FROM instance WHERE {where_sql} GROUP ALL; \
             {SELECT_INSTANCE} WHERE {where_sql} \
             ORDER BY model_uid ASC, asset_id ASC LIMIT $limit START $offset;"
        );

        let mut builder = self
            .db
            .query(query)
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset));
        if let Some(model_uid) = filter.model_uid {
            builder = builder.bind(("model_uid", model_uid));
        }
        if let Some(account_id) = filter.account_id {
            builder = builder.bind(("account_id", account_id));
        }
        if let Some(asset_id) = filter.asset_id {
            builder = builder.bind(("asset_id", asset_id));
        }

        let mut result = builder.await.map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let rows: Vec<InstanceRow> = result.take(1).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(InstanceRow::try_into_instance)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total: total_of(&count_rows),
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn delete(&self, tenant_id: Uuid, id: Uuid) -> CmdbResult<()> {
        let id_str = id.to_string();

        // Edges are removed with the instance so no dangling endpoints remain.
        let query = format!(
            "DELETE instance WHERE id = instance:`{id_str}` \
             AND tenant_id = $tenant_id RETURN BEFORE; \
             DELETE instance_relation WHERE tenant_id = $tenant_id \
             AND (in = instance:`{id_str}` OR out = instance:`{id_str}`);"
        );

        let result = self
            .db
            .query(query)
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let removed: Vec<serde_json::Value> = result.take(0).map_err(DbError::from)?;
        if removed.is_empty() {
            return Err(DbError::NotFound {
                entity: "instance".into(),
                id: id_str,
            }
            .into());
        }
        Ok(())
    }
}
