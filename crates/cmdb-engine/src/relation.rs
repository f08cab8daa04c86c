//! Instance relation graph service and attribute-driven reconciliation.

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use cmdb_core::error::{CmdbError, CmdbResult};
use cmdb_core::models::instance::{Instance, InstanceFilter};
use cmdb_core::models::relation::{
    CreateInstanceRelation, InstanceRelation, InstanceRelationFilter,
};
use cmdb_core::repository::{
    InstanceRelationRepository, InstanceRepository, ModelRelationTypeRepository,
    PaginatedResult, Pagination,
};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;

/// Only sources whose `key` attribute is absent, empty, or one of
/// `allowed` take part in a reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceGuard {
    pub key: String,
    pub allowed: Vec<String>,
}

/// Declarative description of how to derive edges of one relation type
/// from matching attribute values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileSpec {
    pub relation_type_uid: String,
    pub source_model: String,
    pub source_key: String,
    pub target_model: String,
    pub target_key: String,
    pub source_guard: Option<SourceGuard>,
}

impl ReconcileSpec {
    pub fn new(
        relation_type_uid: &str,
        (source_model, source_key): (&str, &str),
        (target_model, target_key): (&str, &str),
    ) -> Self {
        Self {
            relation_type_uid: relation_type_uid.into(),
            source_model: source_model.into(),
            source_key: source_key.into(),
            target_model: target_model.into(),
            target_key: target_key.into(),
            source_guard: None,
        }
    }

    fn admits(&self, source: &Instance) -> bool {
        let Some(guard) = &self.source_guard else {
            return true;
        };
        match string_attribute(source, &guard.key) {
            None => true,
            Some(value) => guard.allowed.iter().any(|a| a == value),
        }
    }
}

/// The reconciliations run by [`RelationService::sync_relations`].
pub fn builtin_specs() -> Vec<ReconcileSpec> {
    vec![
        ReconcileSpec::new(
            "ecs_belongs_to_vpc",
            ("cloud_vm", "vpc_id"),
            ("cloud_vpc", "vpc_id"),
        ),
        ReconcileSpec {
            source_guard: Some(SourceGuard {
                key: "instance_type".into(),
                allowed: vec!["EcsInstance".into(), "Ecs".into()],
            }),
            ..ReconcileSpec::new(
                "eip_bindto_ecs",
                ("cloud_eip", "instance_id"),
                ("cloud_vm", "instance_id"),
            )
        },
        ReconcileSpec::new(
            "rds_belongs_to_vpc",
            ("cloud_rds", "vpc_id"),
            ("cloud_vpc", "vpc_id"),
        ),
        ReconcileSpec::new(
            "redis_belongs_to_vpc",
            ("cloud_redis", "vpc_id"),
            ("cloud_vpc", "vpc_id"),
        ),
    ]
}

/// Non-empty string attribute; any other value is not a usable key.
fn string_attribute<'a>(instance: &'a Instance, key: &str) -> Option<&'a str> {
    instance
        .attribute(key)
        .and_then(|v| v.as_str())
        .filter(|v| !v.is_empty())
}

/// Index target instances by their key attribute. On duplicate keys the
/// last instance wins.
pub fn index_by_attribute<'a>(instances: &'a [Instance], key: &str) -> HashMap<&'a str, Uuid> {
    instances
        .iter()
        .filter_map(|i| string_attribute(i, key).map(|v| (v, i.id)))
        .collect()
}

/// Counters for one reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub created: u64,
    pub skipped: u64,
    pub failed: u64,
}

/// Aggregate of a [`RelationService::sync_relations`] run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RelationSyncReport {
    pub created: u64,
    pub skipped: u64,
    pub failed: u64,
    /// Edges created per relation type UID.
    pub by_relation_type: BTreeMap<String, u64>,
    pub duration_ms: u64,
}

/// Relation graph service.
pub struct RelationService<I, R, T>
where
    I: InstanceRepository,
    R: InstanceRelationRepository,
    T: ModelRelationTypeRepository,
{
    instance_repo: I,
    relation_repo: R,
    relation_type_repo: T,
    config: EngineConfig,
}

impl<I, R, T> RelationService<I, R, T>
where
    I: InstanceRepository,
    R: InstanceRelationRepository,
    T: ModelRelationTypeRepository,
{
    pub fn new(instance_repo: I, relation_repo: R, relation_type_repo: T, config: EngineConfig) -> Self {
        Self {
            instance_repo,
            relation_repo,
            relation_type_repo,
            config,
        }
    }

    /// Create one edge. Both endpoints must exist in the tenant and the
    /// relation type must be registered.
    pub async fn create_relation(
        &self,
        input: CreateInstanceRelation,
    ) -> CmdbResult<InstanceRelation> {
        input.validate()?;
        if !self
            .relation_type_repo
            .exists(&input.relation_type_uid)
            .await?
        {
            return Err(CmdbError::not_found(
                "model_relation_type",
                &input.relation_type_uid,
            ));
        }
        self.instance_repo
            .get_by_id(input.tenant_id, input.source_instance_id)
            .await?;
        self.instance_repo
            .get_by_id(input.tenant_id, input.target_instance_id)
            .await?;

        if self
            .relation_repo
            .exists(
                input.source_instance_id,
                input.target_instance_id,
                &input.relation_type_uid,
            )
            .await?
        {
            return Err(CmdbError::already_exists(
                "instance_relation",
                format!(
                    "{} -[{}]-> {}",
                    input.source_instance_id,
                    input.relation_type_uid,
                    input.target_instance_id
                ),
            ));
        }

        let relation = self.relation_repo.create(input).await?;
        info!(
            tenant_id = %relation.tenant_id,
            relation_id = %relation.id,
            relation_type = %relation.relation_type_uid,
            "Instance relation created"
        );
        Ok(relation)
    }

    /// Insert the distinct triples of `inputs` that are not stored yet.
    /// Returns the number inserted.
    pub async fn create_batch(&self, inputs: Vec<CreateInstanceRelation>) -> CmdbResult<u64> {
        for input in &inputs {
            input.validate()?;
        }
        let created = self.relation_repo.create_batch(inputs).await?;
        Ok(created.len() as u64)
    }

    pub async fn get_relation(&self, tenant_id: Uuid, id: Uuid) -> CmdbResult<InstanceRelation> {
        self.relation_repo.get_by_id(tenant_id, id).await
    }

    pub async fn list_relations(
        &self,
        filter: InstanceRelationFilter,
        pagination: Pagination,
    ) -> CmdbResult<PaginatedResult<InstanceRelation>> {
        self.relation_repo.list(filter, pagination).await
    }

    pub async fn relation_exists(
        &self,
        source_instance_id: Uuid,
        target_instance_id: Uuid,
        relation_type_uid: &str,
    ) -> CmdbResult<bool> {
        self.relation_repo
            .exists(source_instance_id, target_instance_id, relation_type_uid)
            .await
    }

    pub async fn delete_relation(&self, tenant_id: Uuid, id: Uuid) -> CmdbResult<()> {
        self.relation_repo.delete(tenant_id, id).await
    }

    /// Remove every edge touching an instance that is being removed.
    pub async fn delete_instance_relations(
        &self,
        tenant_id: Uuid,
        instance_id: Uuid,
    ) -> CmdbResult<u64> {
        let removed = self
            .relation_repo
            .delete_by_instance_id(tenant_id, instance_id)
            .await?;
        info!(
            tenant_id = %tenant_id,
            instance_id = %instance_id,
            removed,
            "Instance relations removed"
        );
        Ok(removed)
    }

    async fn load_model_instances(&self, tenant_id: Uuid, model_uid: &str) -> CmdbResult<Vec<Instance>> {
        let filter = InstanceFilter {
            model_uid: Some(model_uid.to_string()),
            ..Default::default()
        };
        let mut all = Vec::new();
        let mut page = Pagination::new(0, self.config.batch_page_size);
        loop {
            let result = self
                .instance_repo
                .list(tenant_id, filter.clone(), page)
                .await?;
            let more = result.has_more();
            all.extend(result.items);
            if !more {
                return Ok(all);
            }
            page = page.next();
        }
    }

    /// Derive edges of one relation type by matching source and target
    /// attribute values.
    ///
    /// Sources without a usable key are ignored. A source whose key has
    /// no target, or whose edge already exists, counts as skipped. Store
    /// failures are counted and do not stop the run.
    pub async fn reconcile(
        &self,
        tenant_id: Uuid,
        spec: &ReconcileSpec,
    ) -> CmdbResult<ReconcileReport> {
        let sources = self
            .load_model_instances(tenant_id, &spec.source_model)
            .await?;
        let targets = self
            .load_model_instances(tenant_id, &spec.target_model)
            .await?;
        let target_index = index_by_attribute(&targets, &spec.target_key);

        let mut report = ReconcileReport::default();
        for source in &sources {
            if !spec.admits(source) {
                continue;
            }
            let Some(key) = string_attribute(source, &spec.source_key) else {
                continue;
            };
            let Some(&target_id) = target_index.get(key) else {
                report.skipped += 1;
                continue;
            };

            // An unanswerable existence check falls through to the insert;
            // the unique index still rejects duplicates.
            let exists = match self
                .relation_repo
                .exists(source.id, target_id, &spec.relation_type_uid)
                .await
            {
                Ok(exists) => exists,
                Err(e) => {
                    warn!(
                        relation_type = %spec.relation_type_uid,
                        source_id = %source.id,
                        target_id = %target_id,
                        error = %e,
                        "Relation existence check failed, attempting insert"
                    );
                    false
                }
            };
            if exists {
                report.skipped += 1;
                continue;
            }

            let input = CreateInstanceRelation {
                tenant_id,
                source_instance_id: source.id,
                target_instance_id: target_id,
                relation_type_uid: spec.relation_type_uid.clone(),
            };
            match self.relation_repo.create(input).await {
                Ok(_) => report.created += 1,
                Err(CmdbError::AlreadyExists { .. }) => report.skipped += 1,
                Err(e) => {
                    warn!(
                        tenant_id = %tenant_id,
                        relation_type = %spec.relation_type_uid,
                        source_id = %source.id,
                        error = %e,
                        "Failed to create relation"
                    );
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    /// Run every builtin reconciliation for the tenant.
    pub async fn sync_relations(&self, tenant_id: Uuid) -> CmdbResult<RelationSyncReport> {
        self.sync_with_specs(tenant_id, &builtin_specs()).await
    }

    /// Run the given reconciliations in order. A reconciliation whose instances
    /// cannot be loaded is logged and left out of the totals.
    pub async fn sync_with_specs(
        &self,
        tenant_id: Uuid,
        specs: &[ReconcileSpec],
    ) -> CmdbResult<RelationSyncReport> {
        if tenant_id.is_nil() {
            return Err(CmdbError::validation("tenant id cannot be empty"));
        }

        let started = Instant::now();
        info!(tenant_id = %tenant_id, specs = specs.len(), "Relation sync started");

        let mut report = RelationSyncReport::default();
        for spec in specs {
            match self.reconcile(tenant_id, spec).await {
                Ok(partial) => {
                    report.created += partial.created;
                    report.skipped += partial.skipped;
                    report.failed += partial.failed;
                    report
                        .by_relation_type
                        .insert(spec.relation_type_uid.clone(), partial.created);
                }
                Err(e) => warn!(
                    tenant_id = %tenant_id,
                    relation_type = %spec.relation_type_uid,
                    error = %e,
                    "Relation reconciliation skipped"
                ),
            }
        }
        report.duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        info!(
            tenant_id = %tenant_id,
            created = report.created,
            skipped = report.skipped,
            failed = report.failed,
            duration_ms = report.duration_ms,
            "Relation sync finished"
        );
        Ok(report)
    }
}
