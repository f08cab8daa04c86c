//! Rule engine: binding rule management, instance matching and rule runs.

use cmdb_core::error::{CmdbError, CmdbResult};
use cmdb_core::models::binding::{
    BindType, BindingFilter, CreateResourceBinding, ResourceBinding, ResourceType,
};
use cmdb_core::models::instance::{Instance, InstanceFilter};
use cmdb_core::models::node::{CreateServiceTreeNode, ServiceTreeNode};
use cmdb_core::models::rule::{
    BindingRule, CreateBindingRule, RuleFilter, RuleMatchResult, UpdateBindingRule,
};
use cmdb_core::repository::{
    BindingRuleRepository, InstanceRepository, PaginatedResult, Pagination,
    ResourceBindingRepository, ServiceTreeNodeRepository,
};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::matcher::{self, PlannedBinding};

/// Input for a manual binding.
#[derive(Debug, Clone)]
pub struct BindResourceInput {
    pub tenant_id: Uuid,
    pub node_id: Uuid,
    pub env_id: Option<Uuid>,
    pub resource_type: ResourceType,
    pub resource_id: Uuid,
}

/// Outcome of [`RuleEngine::execute_rules`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecuteReport {
    /// Enabled rules evaluated.
    pub rules: usize,
    /// Instances evaluated.
    pub instances: usize,
    pub planned: usize,
    pub created: usize,
    /// Planned bindings the store rejected because another run got there
    /// first.
    pub already_bound: usize,
    pub failed: usize,
}

/// Rule engine.
///
/// Generic over repository implementations so that the engine has no
/// dependency on the database crate.
pub struct RuleEngine<N, R, B, I>
where
    N: ServiceTreeNodeRepository,
    R: BindingRuleRepository,
    B: ResourceBindingRepository,
    I: InstanceRepository,
{
    node_repo: N,
    rule_repo: R,
    binding_repo: B,
    instance_repo: I,
    config: EngineConfig,
}

impl<N, R, B, I> RuleEngine<N, R, B, I>
where
    N: ServiceTreeNodeRepository,
    R: BindingRuleRepository,
    B: ResourceBindingRepository,
    I: InstanceRepository,
{
    pub fn new(
        node_repo: N,
        rule_repo: R,
        binding_repo: B,
        instance_repo: I,
        config: EngineConfig,
    ) -> Self {
        Self {
            node_repo,
            rule_repo,
            binding_repo,
            instance_repo,
            config,
        }
    }

    async fn ensure_node(&self, tenant_id: Uuid, node_id: Uuid) -> CmdbResult<()> {
        if self.node_repo.exists(tenant_id, node_id).await? {
            Ok(())
        } else {
            Err(EngineError::NodeNotFound(node_id).into())
        }
    }

    // -------------------------------------------------------------------
    // Service tree nodes
    // -------------------------------------------------------------------

    pub async fn create_node(&self, input: CreateServiceTreeNode) -> CmdbResult<ServiceTreeNode> {
        input.validate()?;
        if let Some(parent_id) = input.parent_id {
            self.ensure_node(input.tenant_id, parent_id).await?;
        }

        let node = self.node_repo.create(input).await?;
        info!(tenant_id = %node.tenant_id, node_id = %node.id, uid = %node.uid, "Service tree node created");
        Ok(node)
    }

    pub async fn get_node(&self, tenant_id: Uuid, node_id: Uuid) -> CmdbResult<ServiceTreeNode> {
        self.node_repo.get_by_id(tenant_id, node_id).await
    }

    pub async fn node_exists(&self, tenant_id: Uuid, node_id: Uuid) -> CmdbResult<bool> {
        self.node_repo.exists(tenant_id, node_id).await
    }

    pub async fn list_nodes(
        &self,
        tenant_id: Uuid,
        pagination: Pagination,
    ) -> CmdbResult<PaginatedResult<ServiceTreeNode>> {
        self.node_repo.list(tenant_id, pagination).await
    }

    pub async fn delete_node(&self, tenant_id: Uuid, node_id: Uuid) -> CmdbResult<()> {
        self.ensure_node(tenant_id, node_id).await?;
        self.node_repo.delete(tenant_id, node_id).await?;
        info!(tenant_id = %tenant_id, node_id = %node_id, "Service tree node deleted");
        Ok(())
    }

    // -------------------------------------------------------------------
    // Rule management
    // -------------------------------------------------------------------

    pub async fn create_rule(&self, input: CreateBindingRule) -> CmdbResult<BindingRule> {
        input.validate()?;
        self.ensure_node(input.tenant_id, input.node_id).await?;

        let rule = self.rule_repo.create(input).await?;
        info!(
            tenant_id = %rule.tenant_id,
            rule_id = %rule.id,
            node_id = %rule.node_id,
            "Binding rule created"
        );
        Ok(rule)
    }

    pub async fn update_rule(
        &self,
        tenant_id: Uuid,
        rule_id: Uuid,
        input: UpdateBindingRule,
    ) -> CmdbResult<BindingRule> {
        input.validate()?;
        self.rule_repo.get_by_id(tenant_id, rule_id).await?;
        if let Some(node_id) = input.node_id {
            self.ensure_node(tenant_id, node_id).await?;
        }

        let rule = self.rule_repo.update(tenant_id, rule_id, input).await?;
        info!(tenant_id = %tenant_id, rule_id = %rule_id, "Binding rule updated");
        Ok(rule)
    }

    /// Delete a rule together with every binding it created.
    ///
    /// Bindings go first; if that fails the rule is left in place.
    pub async fn delete_rule(&self, tenant_id: Uuid, rule_id: Uuid) -> CmdbResult<()> {
        self.rule_repo.get_by_id(tenant_id, rule_id).await?;

        let removed = self
            .binding_repo
            .delete_by_rule_id(tenant_id, rule_id)
            .await?;
        self.rule_repo.delete(tenant_id, rule_id).await?;

        info!(
            tenant_id = %tenant_id,
            rule_id = %rule_id,
            bindings_removed = removed,
            "Binding rule deleted"
        );
        Ok(())
    }

    pub async fn get_rule(&self, tenant_id: Uuid, rule_id: Uuid) -> CmdbResult<BindingRule> {
        self.rule_repo.get_by_id(tenant_id, rule_id).await
    }

    pub async fn list_rules(
        &self,
        tenant_id: Uuid,
        filter: RuleFilter,
        pagination: Pagination,
    ) -> CmdbResult<PaginatedResult<BindingRule>> {
        self.rule_repo.list(tenant_id, filter, pagination).await
    }

    // -------------------------------------------------------------------
    // Matching
    // -------------------------------------------------------------------

    /// Evaluate the tenant's enabled rules against one instance.
    pub async fn match_instance(
        &self,
        tenant_id: Uuid,
        instance: &Instance,
    ) -> CmdbResult<RuleMatchResult> {
        let mut rules = self.rule_repo.list_enabled(tenant_id).await?;
        if rules.is_empty() {
            return Ok(RuleMatchResult {
                rule_id: None,
                node_id: None,
                resource_id: instance.id,
                matched: false,
                reason: "no enabled rules".into(),
            });
        }
        matcher::sort_rules(&mut rules);

        Ok(match matcher::first_match(&rules, instance) {
            Some(rule) => RuleMatchResult {
                rule_id: Some(rule.id),
                node_id: Some(rule.node_id),
                resource_id: instance.id,
                matched: true,
                reason: format!("matched rule: {}", rule.name),
            },
            None => RuleMatchResult {
                rule_id: None,
                node_id: None,
                resource_id: instance.id,
                matched: false,
                reason: "no matching rule".into(),
            },
        })
    }

    // -------------------------------------------------------------------
    // Rule runs
    // -------------------------------------------------------------------

    async fn load_instances(&self, tenant_id: Uuid) -> CmdbResult<Vec<Instance>> {
        let mut all = Vec::new();
        let mut page = Pagination::new(0, self.config.batch_page_size);
        loop {
            let result = self
                .instance_repo
                .list(tenant_id, InstanceFilter::default(), page)
                .await?;
            let more = result.has_more();
            all.extend(result.items);
            if !more {
                return Ok(all);
            }
            page = page.next();
        }
    }

    async fn load_instance_bindings(&self, tenant_id: Uuid) -> CmdbResult<Vec<ResourceBinding>> {
        let filter = BindingFilter {
            resource_type: Some(ResourceType::Instance),
            ..Default::default()
        };
        let mut all = Vec::new();
        let mut page = Pagination::new(0, self.config.batch_page_size);
        loop {
            let result = self
                .binding_repo
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

    async fn persist_planned(&self, tenant_id: Uuid, planned: PlannedBinding) -> CmdbResult<()> {
        self.binding_repo
            .create(CreateResourceBinding {
                tenant_id,
                node_id: planned.node_id,
                env_id: planned.env_id,
                resource_type: ResourceType::Instance,
                resource_id: planned.resource_id,
                bind_type: BindType::Rule,
                rule_id: Some(planned.rule_id),
            })
            .await
            .map(|_| ())
    }

    /// Bind every unbound instance of the tenant to the node of its first
    /// matching rule.
    pub async fn execute_rules(&self, tenant_id: Uuid) -> CmdbResult<ExecuteReport> {
        if tenant_id.is_nil() {
            return Err(CmdbError::validation("tenant id cannot be empty"));
        }

        let rules = self.rule_repo.list_enabled(tenant_id).await?;
        let mut report = ExecuteReport {
            rules: rules.len(),
            ..Default::default()
        };
        if rules.is_empty() {
            info!(tenant_id = %tenant_id, "No enabled binding rules");
            return Ok(report);
        }

        let instances = self.load_instances(tenant_id).await?;
        let existing = self.load_instance_bindings(tenant_id).await?;
        report.instances = instances.len();

        let plan = matcher::plan_bindings(&rules, &instances, &existing);
        report.planned = plan.len();

        for planned in plan {
            let resource_id = planned.resource_id;
            match self.persist_planned(tenant_id, planned).await {
                Ok(()) => report.created += 1,
                Err(CmdbError::AlreadyExists { .. }) => {
                    debug!(resource_id = %resource_id, "Resource bound concurrently");
                    report.already_bound += 1;
                }
                Err(e) => {
                    warn!(
                        tenant_id = %tenant_id,
                        resource_id = %resource_id,
                        error = %e,
                        "Failed to create rule binding"
                    );
                    report.failed += 1;
                }
            }
        }

        info!(
            tenant_id = %tenant_id,
            rules = report.rules,
            instances = report.instances,
            created = report.created,
            already_bound = report.already_bound,
            failed = report.failed,
            "Binding rules executed"
        );
        Ok(report)
    }

    // -------------------------------------------------------------------
    // Manual bindings
    // -------------------------------------------------------------------

    pub async fn bind_resource(&self, input: BindResourceInput) -> CmdbResult<ResourceBinding> {
        if input.tenant_id.is_nil() || input.resource_id.is_nil() {
            return Err(CmdbError::validation(
                "binding tenant and resource are required",
            ));
        }
        self.ensure_node(input.tenant_id, input.node_id).await?;

        let binding = self
            .binding_repo
            .create(CreateResourceBinding {
                tenant_id: input.tenant_id,
                node_id: input.node_id,
                env_id: input.env_id,
                resource_type: input.resource_type,
                resource_id: input.resource_id,
                bind_type: BindType::Manual,
                rule_id: None,
            })
            .await?;

        info!(
            tenant_id = %binding.tenant_id,
            node_id = %binding.node_id,
            resource_id = %binding.resource_id,
            "Resource bound"
        );
        Ok(binding)
    }

    pub async fn unbind_resource(&self, tenant_id: Uuid, binding_id: Uuid) -> CmdbResult<()> {
        self.binding_repo.get_by_id(tenant_id, binding_id).await?;
        self.binding_repo.delete(tenant_id, binding_id).await
    }

    pub async fn list_bindings(
        &self,
        tenant_id: Uuid,
        filter: BindingFilter,
        pagination: Pagination,
    ) -> CmdbResult<PaginatedResult<ResourceBinding>> {
        self.binding_repo.list(tenant_id, filter, pagination).await
    }
}
