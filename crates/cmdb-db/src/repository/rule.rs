//! SurrealDB implementation of [`BindingRuleRepository`].

use chrono::{DateTime, Utc};
use cmdb_core::error::CmdbResult;
use cmdb_core::models::rule::{
    BindingRule, CreateBindingRule, RuleCondition, RuleFilter, UpdateBindingRule,
};
use cmdb_core::repository::{BindingRuleRepository, PaginatedResult, Pagination};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;
use crate::rows::{CountRow, parse_opt_uuid, parse_uuid, total_of};

#[derive(Debug, SurrealValue)]
struct RuleRow {
    record_id: String,
    tenant_id: String,
    node_id: String,
    env_id: Option<String>,
    name: String,
    priority: i64,
    conditions: serde_json::Value,
    enabled: bool,
    description: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RuleRow {
    fn try_into_rule(self) -> Result<BindingRule, DbError> {
        let conditions: Vec<RuleCondition> = serde_json::from_value(self.conditions)
            .map_err(|e| DbError::Decode(format!("invalid rule conditions: {e}")))?;

        Ok(BindingRule {
            id: parse_uuid(&self.record_id, "binding rule")?,
            tenant_id: parse_uuid(&self.tenant_id, "tenant")?,
            node_id: parse_uuid(&self.node_id, "node")?,
            env_id: parse_opt_uuid(self.env_id.as_deref(), "environment")?,
            name: self.name,
            priority: self.priority,
            conditions,
            enabled: self.enabled,
            description: self.description,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn decode_all(rows: Vec<RuleRow>) -> Result<Vec<BindingRule>, DbError> {
    rows.into_iter().map(RuleRow::try_into_rule).collect()
}

fn encode_conditions(conditions: &[RuleCondition]) -> Result<serde_json::Value, DbError> {
    serde_json::to_value(conditions)
        .map_err(|e| DbError::Query(format!("failed to encode rule conditions: {e}")))
}

const SELECT_RULE: &str = "SELECT meta::id(id) AS record_id, * FROM binding_rule";

/// SurrealDB implementation of the BindingRule repository.
///
/// Conditions are stored inline as an array of `{field, operator, value}`
/// objects.
#[derive(Clone)]
pub struct SurrealBindingRuleRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealBindingRuleRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> BindingRuleRepository for SurrealBindingRuleRepository<C> {
    async fn create(&self, input: CreateBindingRule) -> CmdbResult<BindingRule> {
        let id = Uuid::new_v4();
        let tenant_id = input.tenant_id;
        let conditions = encode_conditions(&input.conditions)?;

        self.db
            .query(
                "CREATE type::record('binding_rule', $id) SET \
                 tenant_id = $tenant_id, node_id = $node_id, \
                 env_id = $env_id, name = $name, priority = $priority, \
                 conditions = $conditions, enabled = $enabled, \
                 description = $description",
            )
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("node_id", input.node_id.to_string()))
            .bind(("env_id", input.env_id.map(|e| e.to_string())))
            .bind(("name", input.name))
            .bind(("priority", input.priority))
            .bind(("conditions", conditions))
            .bind(("enabled", input.enabled))
            .bind(("description", input.description))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        self.get_by_id(tenant_id, id).await
    }

    async fn get_by_id(&self, tenant_id: Uuid, id: Uuid) -> CmdbResult<BindingRule> {
        let id_str = id.to_string();
        let mut result = self
            .db
            .query(format!(
                "{SELECT_RULE} WHERE id = type::record('binding_rule', $id) \
                 AND tenant_id = $tenant_id"
            ))
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RuleRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "binding_rule".into(),
            id: id_str,
        })?;

        row.try_into_rule().map_err(Into::into)
    }

    async fn update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        input: UpdateBindingRule,
    ) -> CmdbResult<BindingRule> {
        let mut sets = Vec::new();
        if input.node_id.is_some() {
            sets.push("node_id = $node_id");
        }
        if input.env_id.is_some() {
            sets.push("env_id = $env_id");
        }
        if input.name.is_some() {
            sets.push("name = $name");
        }
        if input.priority.is_some() {
            sets.push("priority = $priority");
        }
        if input.conditions.is_some() {
            sets.push("conditions = $conditions");
        }
        if input.enabled.is_some() {
            sets.push("enabled = $enabled");
        }
        if input.description.is_some() {
            sets.push("description = $description");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE binding_rule SET {} \
             WHERE id = type::record('binding_rule', $id) \
             AND tenant_id = $tenant_id",
            sets.join(", ")
        );

        let mut builder = self
            .db
            .query(&query)
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()));
        if let Some(node_id) = input.node_id {
            builder = builder.bind(("node_id", node_id.to_string()));
        }
        if let Some(env_id) = input.env_id {
            builder = builder.bind(("env_id", env_id.map(|e| e.to_string())));
        }
        if let Some(name) = input.name {
            builder = builder.bind(("name", name));
        }
        if let Some(priority) = input.priority {
            builder = builder.bind(("priority", priority));
        }
        if let Some(conditions) = input.conditions {
            builder = builder.bind(("conditions", encode_conditions(&conditions)?));
        }
        if let Some(enabled) = input.enabled {
            builder = builder.bind(("enabled", enabled));
        }
        if let Some(description) = input.description {
            builder = builder.bind(("description", description));
        }

        builder
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        self.get_by_id(tenant_id, id).await
    }

    async fn delete(&self, tenant_id: Uuid, id: Uuid) -> CmdbResult<()> {
        self.db
            .query(
                "DELETE binding_rule \
                 WHERE id = type::record('binding_rule', $id) \
                 AND tenant_id = $tenant_id",
            )
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        Ok(())
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        filter: RuleFilter,
        pagination: Pagination,
    ) -> CmdbResult<PaginatedResult<BindingRule>> {
        let mut predicates = vec!["tenant_id = $tenant_id"];
        if filter.node_id.is_some() {
            predicates.push("node_id = $node_id");
        }
        if filter.enabled.is_some() {
            predicates.push("enabled = $enabled");
        }
        if filter.name.is_some() {
            predicates.push("string::contains(name, $name)");
        }
        let where_sql = predicates.join(" AND ");

        let query = format!(
            "SELECT count() AS total FROM binding_rule WHERE {where_sql} GROUP ALL; \
             {SELECT_RULE} WHERE {where_sql} \
             ORDER BY priority ASC, created_at ASC LIMIT $limit START $offset;"
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
        if let Some(enabled) = filter.enabled {
            builder = builder.bind(("enabled", enabled));
        }
        if let Some(name) = filter.name {
            builder = builder.bind(("name", name));
        }

        let mut result = builder.await.map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let rows: Vec<RuleRow> = result.take(1).map_err(DbError::from)?;

        Ok(PaginatedResult {
            items: decode_all(rows)?,
            total: total_of(&count_rows),
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn list_enabled(&self, tenant_id: Uuid) -> CmdbResult<Vec<BindingRule>> {
        let mut result = self
            .db
            .query(format!(
                "{SELECT_RULE} WHERE tenant_id = $tenant_id AND enabled = true \
                 ORDER BY priority ASC, created_at ASC"
            ))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RuleRow> = result.take(0).map_err(DbError::from)?;
        decode_all(rows).map_err(Into::into)
    }
}
