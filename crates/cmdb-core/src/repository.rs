//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Schema repositories (models,
//! model groups, attributes, attribute groups, relation types) are global;
//! the rest take a `tenant_id` to enforce data isolation.

use uuid::Uuid;

use crate::error::CmdbResult;
use crate::models::{
    attribute::{
        Attribute, AttributeGroup, CreateAttribute, CreateAttributeGroup, UpdateAttribute,
        UpdateAttributeGroup,
    },
    binding::{BindingFilter, CreateResourceBinding, ResourceBinding},
    instance::{Instance, InstanceFilter, UpsertInstance},
    model::{CreateModel, Model, ModelFilter, UpdateModel},
    model_group::{CreateModelGroup, ModelGroup, UpdateModelGroup},
    node::{CreateServiceTreeNode, ServiceTreeNode},
    relation::{CreateInstanceRelation, InstanceRelation, InstanceRelationFilter},
    relation_type::{
        CreateModelRelationType, ModelRelationType, ModelRelationTypeFilter,
        UpdateModelRelationType,
    },
    rule::{BindingRule, CreateBindingRule, RuleFilter, UpdateBindingRule},
};

/// Pagination parameters for list queries.
#[derive(Debug, Clone, Copy)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Pagination {
    pub fn new(offset: u64, limit: u64) -> Self {
        Self { offset, limit }
    }

    /// The page following this one.
    pub fn next(self) -> Self {
        Self {
            offset: self.offset + self.limit,
            limit: self.limit,
        }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

impl<T> PaginatedResult<T> {
    /// Whether rows exist beyond this page.
    pub fn has_more(&self) -> bool {
        self.offset + (self.items.len() as u64) < self.total && !self.items.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Schema registry (global scope)
// ---------------------------------------------------------------------------

pub trait ModelRepository: Send + Sync {
    fn create(&self, input: CreateModel) -> impl Future<Output = CmdbResult<Model>> + Send;
    fn get_by_uid(&self, uid: &str) -> impl Future<Output = CmdbResult<Model>> + Send;
    fn exists(&self, uid: &str) -> impl Future<Output = CmdbResult<bool>> + Send;
    fn update(
        &self,
        uid: &str,
        input: UpdateModel,
    ) -> impl Future<Output = CmdbResult<Model>> + Send;
    /// Removes the model together with its attributes and attribute groups.
    fn delete(&self, uid: &str) -> impl Future<Output = CmdbResult<()>> + Send;
    fn list(
        &self,
        filter: ModelFilter,
        pagination: Pagination,
    ) -> impl Future<Output = CmdbResult<PaginatedResult<Model>>> + Send;
}

pub trait ModelGroupRepository: Send + Sync {
    fn create(
        &self,
        input: CreateModelGroup,
    ) -> impl Future<Output = CmdbResult<ModelGroup>> + Send;
    /// Create the group, or return the existing one with the same UID.
    fn upsert(
        &self,
        input: CreateModelGroup,
    ) -> impl Future<Output = CmdbResult<ModelGroup>> + Send;
    fn get_by_uid(&self, uid: &str) -> impl Future<Output = CmdbResult<ModelGroup>> + Send;
    fn exists(&self, uid: &str) -> impl Future<Output = CmdbResult<bool>> + Send;
    fn update(
        &self,
        uid: &str,
        input: UpdateModelGroup,
    ) -> impl Future<Output = CmdbResult<ModelGroup>> + Send;
    fn delete(&self, uid: &str) -> impl Future<Output = CmdbResult<()>> + Send;
    /// All groups ordered by `sort_order`, then UID.
    fn list(&self) -> impl Future<Output = CmdbResult<Vec<ModelGroup>>> + Send;
}

pub trait AttributeRepository: Send + Sync {
    fn create(&self, input: CreateAttribute)
    -> impl Future<Output = CmdbResult<Attribute>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = CmdbResult<Attribute>> + Send;
    fn get_by_field_uid(
        &self,
        model_uid: &str,
        field_uid: &str,
    ) -> impl Future<Output = CmdbResult<Attribute>> + Send;
    fn exists(
        &self,
        model_uid: &str,
        field_uid: &str,
    ) -> impl Future<Output = CmdbResult<bool>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateAttribute,
    ) -> impl Future<Output = CmdbResult<Attribute>> + Send;
    fn delete(&self, id: Uuid) -> impl Future<Output = CmdbResult<()>> + Send;
    /// All attributes of a model ordered by `index`.
    fn list_by_model(
        &self,
        model_uid: &str,
    ) -> impl Future<Output = CmdbResult<Vec<Attribute>>> + Send;
}

pub trait AttributeGroupRepository: Send + Sync {
    fn create(
        &self,
        input: CreateAttributeGroup,
    ) -> impl Future<Output = CmdbResult<AttributeGroup>> + Send;
    /// Create the group, or return the existing one with the same
    /// `(model_uid, uid)`.
    fn upsert(
        &self,
        input: CreateAttributeGroup,
    ) -> impl Future<Output = CmdbResult<AttributeGroup>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = CmdbResult<AttributeGroup>> + Send;
    fn get_by_uid(
        &self,
        model_uid: &str,
        uid: &str,
    ) -> impl Future<Output = CmdbResult<AttributeGroup>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateAttributeGroup,
    ) -> impl Future<Output = CmdbResult<AttributeGroup>> + Send;
    fn delete(&self, id: Uuid) -> impl Future<Output = CmdbResult<()>> + Send;
    /// All groups of a model ordered by `index`.
    fn list_by_model(
        &self,
        model_uid: &str,
    ) -> impl Future<Output = CmdbResult<Vec<AttributeGroup>>> + Send;
}

pub trait ModelRelationTypeRepository: Send + Sync {
    fn create(
        &self,
        input: CreateModelRelationType,
    ) -> impl Future<Output = CmdbResult<ModelRelationType>> + Send;
    fn get_by_uid(&self, uid: &str)
    -> impl Future<Output = CmdbResult<ModelRelationType>> + Send;
    fn exists(&self, uid: &str) -> impl Future<Output = CmdbResult<bool>> + Send;
    fn update(
        &self,
        uid: &str,
        input: UpdateModelRelationType,
    ) -> impl Future<Output = CmdbResult<ModelRelationType>> + Send;
    fn delete(&self, uid: &str) -> impl Future<Output = CmdbResult<()>> + Send;
    fn list(
        &self,
        filter: ModelRelationTypeFilter,
        pagination: Pagination,
    ) -> impl Future<Output = CmdbResult<PaginatedResult<ModelRelationType>>> + Send;
    /// Relation types declared from `source_uid` to `target_uid`.
    fn find_by_models(
        &self,
        source_uid: &str,
        target_uid: &str,
    ) -> impl Future<Output = CmdbResult<Vec<ModelRelationType>>> + Send;
}

// ---------------------------------------------------------------------------
// Tenant-scoped repositories
// ---------------------------------------------------------------------------

pub trait InstanceRepository: Send + Sync {
    /// Insert or update by natural key `(tenant_id, model_uid, asset_id)`.
    fn upsert(&self, input: UpsertInstance) -> impl Future<Output = CmdbResult<Instance>> + Send;
    fn get_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = CmdbResult<Instance>> + Send;
    fn list(
        &self,
        tenant_id: Uuid,
        filter: InstanceFilter,
        pagination: Pagination,
    ) -> impl Future<Output = CmdbResult<PaginatedResult<Instance>>> + Send;
    fn delete(&self, tenant_id: Uuid, id: Uuid) -> impl Future<Output = CmdbResult<()>> + Send;
}

pub trait InstanceRelationRepository: Send + Sync {
    /// Fails with `AlreadyExists` when the (source, target, type) triple is
    /// already present; the store enforces this independently of callers.
    fn create(
        &self,
        input: CreateInstanceRelation,
    ) -> impl Future<Output = CmdbResult<InstanceRelation>> + Send;
    /// Inserts each distinct triple once, skipping triples already stored.
    /// Returns only the relations actually inserted.
    fn create_batch(
        &self,
        inputs: Vec<CreateInstanceRelation>,
    ) -> impl Future<Output = CmdbResult<Vec<InstanceRelation>>> + Send;
    fn get_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = CmdbResult<InstanceRelation>> + Send;
    fn exists(
        &self,
        source_instance_id: Uuid,
        target_instance_id: Uuid,
        relation_type_uid: &str,
    ) -> impl Future<Output = CmdbResult<bool>> + Send;
    fn list(
        &self,
        filter: InstanceRelationFilter,
        pagination: Pagination,
    ) -> impl Future<Output = CmdbResult<PaginatedResult<InstanceRelation>>> + Send;
    /// Fails with `NotFound` when no such edge exists in the tenant.
    fn delete(&self, tenant_id: Uuid, id: Uuid) -> impl Future<Output = CmdbResult<()>> + Send;
    /// Remove every edge touching the instance; returns the number removed.
    fn delete_by_instance_id(
        &self,
        tenant_id: Uuid,
        instance_id: Uuid,
    ) -> impl Future<Output = CmdbResult<u64>> + Send;
}

pub trait ServiceTreeNodeRepository: Send + Sync {
    fn create(
        &self,
        input: CreateServiceTreeNode,
    ) -> impl Future<Output = CmdbResult<ServiceTreeNode>> + Send;
    fn get_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = CmdbResult<ServiceTreeNode>> + Send;
    fn exists(&self, tenant_id: Uuid, id: Uuid) -> impl Future<Output = CmdbResult<bool>> + Send;
    fn list(
        &self,
        tenant_id: Uuid,
        pagination: Pagination,
    ) -> impl Future<Output = CmdbResult<PaginatedResult<ServiceTreeNode>>> + Send;
    fn delete(&self, tenant_id: Uuid, id: Uuid) -> impl Future<Output = CmdbResult<()>> + Send;
}

pub trait BindingRuleRepository: Send + Sync {
    fn create(
        &self,
        input: CreateBindingRule,
    ) -> impl Future<Output = CmdbResult<BindingRule>> + Send;
    fn get_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = CmdbResult<BindingRule>> + Send;
    fn update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        input: UpdateBindingRule,
    ) -> impl Future<Output = CmdbResult<BindingRule>> + Send;
    fn delete(&self, tenant_id: Uuid, id: Uuid) -> impl Future<Output = CmdbResult<()>> + Send;
    fn list(
        &self,
        tenant_id: Uuid,
        filter: RuleFilter,
        pagination: Pagination,
    ) -> impl Future<Output = CmdbResult<PaginatedResult<BindingRule>>> + Send;
    /// Enabled rules ordered by ascending priority, then creation time.
    fn list_enabled(
        &self,
        tenant_id: Uuid,
    ) -> impl Future<Output = CmdbResult<Vec<BindingRule>>> + Send;
}

pub trait ResourceBindingRepository: Send + Sync {
    /// Fails with `AlreadyExists` when the resource is already bound in the
    /// same environment.
    fn create(
        &self,
        input: CreateResourceBinding,
    ) -> impl Future<Output = CmdbResult<ResourceBinding>> + Send;
    fn get_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = CmdbResult<ResourceBinding>> + Send;
    fn list(
        &self,
        tenant_id: Uuid,
        filter: BindingFilter,
        pagination: Pagination,
    ) -> impl Future<Output = CmdbResult<PaginatedResult<ResourceBinding>>> + Send;
    fn delete(&self, tenant_id: Uuid, id: Uuid) -> impl Future<Output = CmdbResult<()>> + Send;
    /// Remove every binding created by the rule; returns the number removed.
    fn delete_by_rule_id(
        &self,
        tenant_id: Uuid,
        rule_id: Uuid,
    ) -> impl Future<Output = CmdbResult<u64>> + Send;
}
