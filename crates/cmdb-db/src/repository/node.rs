//! SurrealDB implementation of [`ServiceTreeNodeRepository`].

use chrono::{DateTime, Utc};
use cmdb_core::error::CmdbResult;
use cmdb_core::models::node::{CreateServiceTreeNode, ServiceTreeNode};
use cmdb_core::repository::{PaginatedResult, Pagination, ServiceTreeNodeRepository};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;
use crate::rows::{CountRow, parse_opt_uuid, parse_uuid, total_of};

#[derive(Debug, SurrealValue)]
struct NodeRow {
    record_id: String,
    tenant_id: String,
    uid: String,
    name: String,
    parent_id: Option<String>,
    level: i64,
    owner: String,
    team: String,
    description: String,
    sort_order: i64,
    enabled: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl NodeRow {
    fn try_into_node(self) -> Result<ServiceTreeNode, DbError> {
        Ok(ServiceTreeNode {
            id: parse_uuid(&self.record_id, "service tree node")?,
            tenant_id: parse_uuid(&self.tenant_id, "tenant")?,
            uid: self.uid,
            name: self.name,
            parent_id: parse_opt_uuid(self.parent_id.as_deref(), "parent node")?,
            level: self.level,
            owner: self.owner,
            team: self.team,
            description: self.description,
            order: self.sort_order,
            enabled: self.enabled,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const SELECT_NODE: &str = "SELECT meta::id(id) AS record_id, * FROM service_tree_node";

/// SurrealDB implementation of the ServiceTreeNode repository.
#[derive(Clone)]
pub struct SurrealServiceTreeNodeRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealServiceTreeNodeRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> ServiceTreeNodeRepository for SurrealServiceTreeNodeRepository<C> {
    async fn create(&self, input: CreateServiceTreeNode) -> CmdbResult<ServiceTreeNode> {
        let id = Uuid::new_v4();
        let tenant_id = input.tenant_id;

        self.db
            .query(
                "CREATE type::record('service_tree_node', $id) SET \
                 tenant_id = $tenant_id, uid = $uid, name = $name, \
                 parent_id = $parent_id, level = $level, owner = $owner, \
                 team = $team, description = $description, \
                 sort_order = $sort_order",
            )
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("uid", input.uid))
            .bind(("name", input.name))
            .bind(("parent_id", input.parent_id.map(|p| p.to_string())))
            .bind(("level", input.level))
            .bind(("owner", input.owner))
            .bind(("team", input.team))
            .bind(("description", input.description))
            .bind(("sort_order", input.order))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        self.get_by_id(tenant_id, id).await
    }

    async fn get_by_id(&self, tenant_id: Uuid, id: Uuid) -> CmdbResult<ServiceTreeNode> {
        let id_str = id.to_string();
        let mut result = self
            .db
            .query(format!(
                "{SELECT_NODE} WHERE id = type::record('service_tree_node', $id) \
                 AND tenant_id = $tenant_id"
            ))
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<NodeRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "service_tree_node".into(),
            id: id_str,
        })?;

        row.try_into_node().map_err(Into::into)
    }

    async fn exists(&self, tenant_id: Uuid, id: Uuid) -> CmdbResult<bool> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM service_tree_node \
                 WHERE id = type::record('service_tree_node', $id) \
                 AND tenant_id = $tenant_id GROUP ALL",
            )
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(total_of(&rows) > 0)
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        pagination: Pagination,
    ) -> CmdbResult<PaginatedResult<ServiceTreeNode>> {
        let query = format!(
            "SELECT count() AS total FROM service_tree_node \
             WHERE tenant_id = $tenant_id GROUP ALL; \
             {SELECT_NODE} WHERE tenant_id = $tenant_id \
             ORDER BY level ASC, sort_order ASC, name ASC \
             LIMIT $limit START $offset;"
        );

        let mut result = self
            .db
            .query(query)
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let count_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let rows: Vec<NodeRow> = result.take(1).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(NodeRow::try_into_node)
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
                "DELETE service_tree_node \
                 WHERE id = type::record('service_tree_node', $id) \
                 AND tenant_id = $tenant_id",
            )
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        Ok(())
    }
}
