//! SurrealDB implementation of [`ResourceBindingRepository`].

use chrono::{DateTime, Utc};
use cmdb_core::error::CmdbResult;
use cmdb_core::models::binding::{
    BindType, BindingFilter, CreateResourceBinding, ResourceBinding, ResourceType,
};
use cmdb_core::repository::{PaginatedResult, Pagination, ResourceBindingRepository};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;
use crate::rows::{CountRow, parse_opt_uuid, parse_uuid, total_of};

/// Stored `env_id` for bindings that are not environment specific.
const NO_ENV: &str = "";

fn encode_env(env_id: Option<Uuid>) -> String {
    env_id.map(|e| e.to_string()).unwrap_or_else(|| NO_ENV.into())
}

#[derive(Debug, SurrealValue)]
struct BindingRow {
    record_id: String,
    tenant_id: String,
    node_id: String,
    env_id: String,
    resource_type: String,
    resource_id: String,
    bind_type: String,
    rule_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl BindingRow {
    fn try_into_binding(self) -> Result<ResourceBinding, DbError> {
        let env_id = if self.env_id == NO_ENV {
            None
        } else {
            Some(parse_uuid(&self.env_id, "environment")?)
        };
        let resource_type = self
            .resource_type
            .parse::<ResourceType>()
            .map_err(|e| DbError::Decode(e.to_string()))?;
        let bind_type = self
            .bind_type
            .parse::<BindType>()
            .map_err(|e| DbError::Decode(e.to_string()))?;

        Ok(ResourceBinding {
            id: parse_uuid(&self.record_id, "resource binding")?,
            tenant_id: parse_uuid(&self.tenant_id, "tenant")?,
            node_id: parse_uuid(&self.node_id, "node")?,
            env_id,
            resource_type,
            resource_id: parse_uuid(&self.resource_id, "resource")?,
            bind_type,
            rule_id: parse_opt_uuid(self.rule_id.as_deref(), "rule")?,
            created_at: self.created_at,
        })
    }
}

const SELECT_BINDING: &str = "SELECT meta::id(id) AS record_id, * FROM resource_binding";

/// SurrealDB implementation of the ResourceBinding repository.
#[derive(Clone)]
pub struct SurrealResourceBindingRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealResourceBindingRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> ResourceBindingRepository for SurrealResourceBindingRepository<C> {
    async fn create(&self, input: CreateResourceBinding) -> CmdbResult<ResourceBinding> {
        let id = Uuid::new_v4();
        let tenant_id = input.tenant_id;
        let key = format!("{}:{}", input.resource_type, input.resource_id);

        self.db
            .query(
                "CREATE type::record('resource_binding', $id) SET \
                 tenant_id = $tenant_id, node_id = $node_id, \
                 env_id = $env_id, resource_type = $resource_type, \
                 resource_id = $resource_id, bind_type = $bind_type, \
                 rule_id = $rule_id",
            )
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("node_id", input.node_id.to_string()))
            .bind(("env_id", encode_env(input.env_id)))
            .bind(("resource_type", input.resource_type.as_str()))
            .bind(("resource_id", input.resource_id.to_string()))
            .bind(("bind_type", input.bind_type.as_str()))
            .bind(("rule_id", input.rule_id.map(|r| r.to_string())))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_statement(e, "resource_binding", &key))?;

        self.get_by_id(tenant_id, id).await
    }

    async fn get_by_id(&self, tenant_id: Uuid, id: Uuid) -> CmdbResult<ResourceBinding> {
        let id_str = id.to_string();
        let mut result = self
            .db
            .query(format!(
                "{SELECT_BINDING} WHERE id = type::record('resource_binding', $id) \
                 AND tenant_id = $tenant_id"
            ))
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<BindingRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "resource_binding".into(),
            id: id_str,
        })?;

        row.try_into_binding().map_err(Into::into)
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        filter: BindingFilter,
        pagination: Pagination,
    ) -> CmdbResult<PaginatedResult<ResourceBinding>> {
        let mut predicates = vec!["tenant_id = $tenant_id"];
        if filter.node_id.is_some() {
            predicates.push("node_id = $node_id");
        }
        if filter.env_id.is_some() {
            predicates.push("env_id = $env_id");
        }
        if filter.resource_type.is_some() {
            predicates.push("resource_type = $resource_type");
        }
        if filter.resource_id.is_some() {
            predicates.push("resource_id = $resource_id");
        }
        if filter.rule_id.is_some() {
            predicates.push("rule_id = $rule_id");
        }
        if filter.bind_type.is_some() {
            predicates.push("bind_type = $bind_type");
        }
        let where_sql = predicates.join(" AND ");

        let query = format!(
            "SELECT count() AS total FROM resource_binding WHERE {where_sql} GROUP ALL; \
             {SELECT_BINDING} WHERE {where_sql} \
             ORDER BY created_at ASC LIMIT $limit START $offset;"
        );

        let mut builder = self
            .db
            .query(query)
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset));
        if let Some(node_id) = filter.node_id {
            builder = builder.bind(("node_id", node_id.to_string()));
        }
        if let Some(env_id) = filter.env_id {
            builder = builder.bind(("env_id", env_id.to_string()));
        }
        if let Some(resource_type) = filter.resource_type {
            builder = builder.bind(("resource_type", resource_type.as_str()));
        }
        if let Some(resource_id) = filter.resource_id {
            builder = builder.bind(("resource_id", resource_id.to_string()));
        }
        if let Some(rule_id) = filter.rule_id {
            builder = builder.bind(("rule_id", rule_id.to_string()));
        }
        if let Some(bind_type) = filter.bind_type {
            builder = builder.bind(("bind_type", bind_type.as_str()));
        }

        let mut result = builder.await.map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let rows: Vec<BindingRow> = result.take(1).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(BindingRow::try_into_binding)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total: total_of(&count_rows),
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn delete(&self, tenant_id: Uuid, id: Uuid) -> CmdbResult<()> {
        self.db
            .query(
                "DELETE resource_binding \
                 WHERE id = type::record('resource_binding', $id) \
                 AND tenant_id = $tenant_id",
            )
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        Ok(())
    }

    async fn delete_by_rule_id(&self, tenant_id: Uuid, rule_id: Uuid) -> CmdbResult<u64> {
        let mut result = self
            .db
            .query(
                "DELETE resource_binding WHERE tenant_id = $tenant_id \
                 AND rule_id = $rule_id RETURN BEFORE",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("rule_id", rule_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let removed: Vec<serde_json::Value> = result.take(0).map_err(DbError::from)?;
        Ok(removed.len() as u64)
    }
}
