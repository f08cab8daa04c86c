//! Schema registry service: models, model groups, attributes, attribute
//! groups and relation types.

use std::collections::HashMap;

use cmdb_core::error::{CmdbError, CmdbResult};
use cmdb_core::models::attribute::{
    ATTR_GROUP_CUSTOM, Attribute, AttributeGroup, AttributeGroupWithAttributes, CreateAttribute,
    CreateAttributeGroup, FieldType, UpdateAttribute, UpdateAttributeGroup,
};
use cmdb_core::models::model::{CreateModel, Model, ModelFilter, UpdateModel};
use cmdb_core::models::model_group::{
    CreateModelGroup, ModelGroup, ModelGroupWithModels, UpdateModelGroup,
};
use cmdb_core::models::relation_type::{
    CreateModelRelationType, ModelRelationType, ModelRelationTypeFilter, UpdateModelRelationType,
};
use cmdb_core::repository::{
    AttributeGroupRepository, AttributeRepository, ModelGroupRepository,
    ModelRelationTypeRepository, ModelRepository, PaginatedResult, Pagination,
};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::EngineError;

/// Entry of the field type catalog offered to form builders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldTypeOption {
    pub value: FieldType,
    pub label: &'static str,
}

/// All field types an attribute may declare, in display order.
pub fn field_types() -> Vec<FieldTypeOption> {
    FieldType::ALL
        .into_iter()
        .map(|value| FieldTypeOption {
            value,
            label: value.label(),
        })
        .collect()
}

const MODEL_PAGE_SIZE: u64 = 500;

fn custom_group(model_uid: &str) -> CreateAttributeGroup {
    CreateAttributeGroup {
        model_uid: model_uid.to_string(),
        uid: ATTR_GROUP_CUSTOM.to_string(),
        name: "Custom".to_string(),
        index: 100,
        is_builtin: true,
        description: String::new(),
    }
}

/// Schema registry service.
///
/// Schema objects are global; nothing here takes a tenant.
pub struct SchemaService<M, MG, A, G, T>
where
    M: ModelRepository,
    MG: ModelGroupRepository,
    A: AttributeRepository,
    G: AttributeGroupRepository,
    T: ModelRelationTypeRepository,
{
    model_repo: M,
    model_group_repo: MG,
    attribute_repo: A,
    group_repo: G,
    relation_type_repo: T,
}

impl<M, MG, A, G, T> SchemaService<M, MG, A, G, T>
where
    M: ModelRepository,
    MG: ModelGroupRepository,
    A: AttributeRepository,
    G: AttributeGroupRepository,
    T: ModelRelationTypeRepository,
{
    pub fn new(
        model_repo: M,
        model_group_repo: MG,
        attribute_repo: A,
        group_repo: G,
        relation_type_repo: T,
    ) -> Self {
        Self {
            model_repo,
            model_group_repo,
            attribute_repo,
            group_repo,
            relation_type_repo,
        }
    }

    async fn ensure_model(&self, uid: &str) -> CmdbResult<()> {
        if self.model_repo.exists(uid).await? {
            Ok(())
        } else {
            Err(EngineError::ModelNotFound(uid.to_string()).into())
        }
    }

    async fn ensure_model_group(&self, uid: Option<&str>) -> CmdbResult<()> {
        match uid {
            Some(uid) if !self.model_group_repo.exists(uid).await? => {
                Err(CmdbError::not_found("model_group", uid))
            }
            _ => Ok(()),
        }
    }

    // -------------------------------------------------------------------
    // Models
    // -------------------------------------------------------------------

    /// Create a model and its builtin attribute groups.
    pub async fn create_model(&self, input: CreateModel) -> CmdbResult<Model> {
        input.validate()?;
        if self.model_repo.exists(&input.uid).await? {
            return Err(CmdbError::already_exists("model", &input.uid));
        }
        self.ensure_model_group(input.model_group.as_deref()).await?;

        let model = self.model_repo.create(input).await?;
        self.init_builtin_groups(&model.uid).await?;

        info!(model_uid = %model.uid, provider = %model.provider, "Model created");
        Ok(model)
    }

    pub async fn get_model(&self, uid: &str) -> CmdbResult<Model> {
        self.model_repo.get_by_uid(uid).await
    }

    pub async fn list_models(
        &self,
        filter: ModelFilter,
        pagination: Pagination,
    ) -> CmdbResult<PaginatedResult<Model>> {
        self.model_repo.list(filter, pagination).await
    }

    pub async fn update_model(&self, uid: &str, input: UpdateModel) -> CmdbResult<Model> {
        if input.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(CmdbError::validation("model name cannot be empty"));
        }
        self.ensure_model(uid).await?;
        if let Some(group) = &input.model_group {
            self.ensure_model_group(group.as_deref()).await?;
        }

        let model = self.model_repo.update(uid, input).await?;
        info!(model_uid = %uid, "Model updated");
        Ok(model)
    }

    /// Delete a model along with its attributes and groups.
    pub async fn delete_model(&self, uid: &str) -> CmdbResult<()> {
        self.ensure_model(uid).await?;
        self.model_repo.delete(uid).await?;
        info!(model_uid = %uid, "Model deleted");
        Ok(())
    }

    // -------------------------------------------------------------------
    // Model groups
    // -------------------------------------------------------------------

    pub async fn create_model_group(&self, input: CreateModelGroup) -> CmdbResult<ModelGroup> {
        input.validate()?;
        if self.model_group_repo.exists(&input.uid).await? {
            return Err(CmdbError::already_exists("model_group", &input.uid));
        }

        let group = self.model_group_repo.create(input).await?;
        info!(model_group = %group.uid, "Model group created");
        Ok(group)
    }

    pub async fn get_model_group(&self, uid: &str) -> CmdbResult<ModelGroup> {
        self.model_group_repo.get_by_uid(uid).await
    }

    pub async fn list_model_groups(&self) -> CmdbResult<Vec<ModelGroup>> {
        self.model_group_repo.list().await
    }

    /// Update a model group. A builtin group keeps its sort order.
    pub async fn update_model_group(
        &self,
        uid: &str,
        mut input: UpdateModelGroup,
    ) -> CmdbResult<ModelGroup> {
        if input.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(CmdbError::validation("model group name cannot be empty"));
        }
        let group = self.model_group_repo.get_by_uid(uid).await?;
        if group.is_builtin {
            input.sort_order = None;
        }
        self.model_group_repo.update(uid, input).await
    }

    /// Delete a custom model group that no model is filed under.
    pub async fn delete_model_group(&self, uid: &str) -> CmdbResult<()> {
        let group = self.model_group_repo.get_by_uid(uid).await?;
        if group.is_builtin {
            return Err(EngineError::BuiltinModelGroup(group.uid).into());
        }

        let members = self
            .model_repo
            .list(
                ModelFilter {
                    model_group: Some(uid.to_string()),
                    ..Default::default()
                },
                Pagination::new(0, 1),
            )
            .await?;
        if members.total > 0 {
            return Err(EngineError::ModelGroupInUse(group.uid).into());
        }

        self.model_group_repo.delete(uid).await?;
        info!(model_group = %uid, "Model group deleted");
        Ok(())
    }

    /// Every model group with its models, in group order.
    ///
    /// Models whose group is unset or unknown are collected in a trailing
    /// `ungrouped` bucket, present only when it has members.
    pub async fn list_model_groups_with_models(&self) -> CmdbResult<Vec<ModelGroupWithModels>> {
        let mut grouped: Vec<ModelGroupWithModels> = self
            .model_group_repo
            .list()
            .await?
            .into_iter()
            .map(|group| ModelGroupWithModels {
                group,
                models: Vec::new(),
            })
            .collect();
        let slot_of: HashMap<String, usize> = grouped
            .iter()
            .enumerate()
            .map(|(slot, g)| (g.group.uid.clone(), slot))
            .collect();

        let mut ungrouped = Vec::new();
        let mut page = Pagination::new(0, MODEL_PAGE_SIZE);
        loop {
            let models = self.model_repo.list(ModelFilter::default(), page).await?;
            let more = models.has_more();
            for model in models.items {
                match model.model_group.as_ref().and_then(|g| slot_of.get(g)) {
                    Some(&slot) => grouped[slot].models.push(model),
                    None => {
                        if let Some(group) = &model.model_group {
                            warn!(
                                model_uid = %model.uid,
                                model_group = %group,
                                "Model filed under unknown group"
                            );
                        }
                        ungrouped.push(model);
                    }
                }
            }
            if !more {
                break;
            }
            page = page.next();
        }

        if !ungrouped.is_empty() {
            grouped.push(ModelGroupWithModels::ungrouped(ungrouped));
        }
        Ok(grouped)
    }

    /// Ensure the builtin model groups exist; existing ones are returned
    /// unchanged.
    pub async fn init_builtin_model_groups(&self) -> CmdbResult<Vec<ModelGroup>> {
        let mut groups = Vec::new();
        for input in CreateModelGroup::builtin() {
            groups.push(self.model_group_repo.upsert(input).await?);
        }
        debug!(count = groups.len(), "Builtin model groups ready");
        Ok(groups)
    }

    // -------------------------------------------------------------------
    // Attributes
    // -------------------------------------------------------------------

    /// Create an attribute. Without an explicit group it lands in the
    /// model's `custom` group.
    pub async fn create_attribute(&self, mut input: CreateAttribute) -> CmdbResult<Attribute> {
        input.validate()?;
        self.ensure_model(&input.model_uid).await?;

        if self
            .attribute_repo
            .exists(&input.model_uid, &input.field_uid)
            .await?
        {
            return Err(CmdbError::already_exists(
                "attribute",
                format!("{}.{}", input.model_uid, input.field_uid),
            ));
        }

        if input.group_id.is_none() {
            let group = self.group_repo.upsert(custom_group(&input.model_uid)).await?;
            input.group_id = Some(group.id);
        }

        let attribute = self.attribute_repo.create(input).await?;
        info!(
            model_uid = %attribute.model_uid,
            field_uid = %attribute.field_uid,
            field_type = %attribute.field_type,
            "Attribute created"
        );
        Ok(attribute)
    }

    pub async fn get_attribute(&self, id: Uuid) -> CmdbResult<Attribute> {
        self.attribute_repo.get_by_id(id).await
    }

    pub async fn get_attribute_by_field_uid(
        &self,
        model_uid: &str,
        field_uid: &str,
    ) -> CmdbResult<Attribute> {
        self.attribute_repo
            .get_by_field_uid(model_uid, field_uid)
            .await
    }

    pub async fn list_attributes(&self, model_uid: &str) -> CmdbResult<Vec<Attribute>> {
        self.attribute_repo.list_by_model(model_uid).await
    }

    pub async fn update_attribute(&self, id: Uuid, input: UpdateAttribute) -> CmdbResult<Attribute> {
        if input.field_name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(CmdbError::validation("attribute field name cannot be empty"));
        }
        self.attribute_repo.get_by_id(id).await?;
        self.attribute_repo.update(id, input).await
    }

    pub async fn delete_attribute(&self, id: Uuid) -> CmdbResult<()> {
        let attribute = self.attribute_repo.get_by_id(id).await?;
        self.attribute_repo.delete(id).await?;
        info!(
            model_uid = %attribute.model_uid,
            field_uid = %attribute.field_uid,
            "Attribute deleted"
        );
        Ok(())
    }

    /// A model's groups, each with its attributes.
    ///
    /// Builtin groups are created first when the model has none.
    /// Attributes whose group is unset or no longer exists are listed
    /// under `custom`.
    pub async fn list_attributes_with_groups(
        &self,
        model_uid: &str,
    ) -> CmdbResult<Vec<AttributeGroupWithAttributes>> {
        self.ensure_model(model_uid).await?;

        let mut groups = self.group_repo.list_by_model(model_uid).await?;
        if groups.is_empty() {
            debug!(model_uid = %model_uid, "Initialising builtin attribute groups");
            groups = self.init_builtin_groups(model_uid).await?;
        }
        if !groups.iter().any(|g| g.uid == ATTR_GROUP_CUSTOM) {
            groups.push(self.group_repo.upsert(custom_group(model_uid)).await?);
        }

        let mut grouped: Vec<AttributeGroupWithAttributes> = groups
            .into_iter()
            .map(|group| AttributeGroupWithAttributes {
                group,
                attributes: Vec::new(),
            })
            .collect();
        let slot_of: HashMap<Uuid, usize> = grouped
            .iter()
            .enumerate()
            .map(|(slot, g)| (g.group.id, slot))
            .collect();
        let custom_slot = grouped
            .iter()
            .position(|g| g.group.uid == ATTR_GROUP_CUSTOM)
            .unwrap_or_default();

        for attribute in self.attribute_repo.list_by_model(model_uid).await? {
            let slot = attribute
                .group_id
                .and_then(|id| slot_of.get(&id).copied())
                .unwrap_or(custom_slot);
            grouped[slot].attributes.push(attribute);
        }

        Ok(grouped)
    }

    // -------------------------------------------------------------------
    // Attribute groups
    // -------------------------------------------------------------------

    /// Create a custom group. Groups created here are never builtin.
    pub async fn create_group(&self, mut input: CreateAttributeGroup) -> CmdbResult<AttributeGroup> {
        input.validate()?;
        self.ensure_model(&input.model_uid).await?;
        input.is_builtin = false;

        let group = self.group_repo.create(input).await?;
        info!(model_uid = %group.model_uid, group_uid = %group.uid, "Attribute group created");
        Ok(group)
    }

    pub async fn get_group(&self, id: Uuid) -> CmdbResult<AttributeGroup> {
        self.group_repo.get_by_id(id).await
    }

    pub async fn list_groups(&self, model_uid: &str) -> CmdbResult<Vec<AttributeGroup>> {
        self.group_repo.list_by_model(model_uid).await
    }

    /// Update a group. A builtin group keeps its UID whatever the input
    /// says.
    pub async fn update_group(
        &self,
        id: Uuid,
        mut input: UpdateAttributeGroup,
    ) -> CmdbResult<AttributeGroup> {
        let group = self.group_repo.get_by_id(id).await?;
        if group.is_builtin {
            input.uid = None;
        } else if input.uid.as_deref().is_some_and(|u| u.trim().is_empty()) {
            return Err(CmdbError::validation("attribute group uid cannot be empty"));
        }
        self.group_repo.update(id, input).await
    }

    pub async fn delete_group(&self, id: Uuid) -> CmdbResult<()> {
        let group = self.group_repo.get_by_id(id).await?;
        if group.is_builtin {
            return Err(EngineError::BuiltinGroup(group.uid).into());
        }
        self.group_repo.delete(id).await?;
        info!(model_uid = %group.model_uid, group_uid = %group.uid, "Attribute group deleted");
        Ok(())
    }

    /// Ensure the builtin groups exist for a model; existing ones are
    /// returned unchanged.
    pub async fn init_builtin_groups(&self, model_uid: &str) -> CmdbResult<Vec<AttributeGroup>> {
        let mut groups = Vec::new();
        for input in CreateAttributeGroup::builtin(model_uid) {
            groups.push(self.group_repo.upsert(input).await?);
        }
        Ok(groups)
    }

    // -------------------------------------------------------------------
    // Relation types
    // -------------------------------------------------------------------

    pub async fn create_relation_type(
        &self,
        input: CreateModelRelationType,
    ) -> CmdbResult<ModelRelationType> {
        input.validate()?;
        if self.relation_type_repo.exists(&input.uid).await? {
            return Err(CmdbError::already_exists("model_relation_type", &input.uid));
        }

        let relation_type = self.relation_type_repo.create(input).await?;
        info!(
            relation_type_uid = %relation_type.uid,
            source = %relation_type.source_model_uid,
            target = %relation_type.target_model_uid,
            "Relation type created"
        );
        Ok(relation_type)
    }

    pub async fn get_relation_type(&self, uid: &str) -> CmdbResult<ModelRelationType> {
        self.relation_type_repo.get_by_uid(uid).await
    }

    pub async fn list_relation_types(
        &self,
        filter: ModelRelationTypeFilter,
        pagination: Pagination,
    ) -> CmdbResult<PaginatedResult<ModelRelationType>> {
        self.relation_type_repo.list(filter, pagination).await
    }

    pub async fn update_relation_type(
        &self,
        uid: &str,
        input: UpdateModelRelationType,
    ) -> CmdbResult<ModelRelationType> {
        if !self.relation_type_repo.exists(uid).await? {
            return Err(CmdbError::not_found("model_relation_type", uid));
        }
        self.relation_type_repo.update(uid, input).await
    }

    pub async fn delete_relation_type(&self, uid: &str) -> CmdbResult<()> {
        if !self.relation_type_repo.exists(uid).await? {
            return Err(CmdbError::not_found("model_relation_type", uid));
        }
        self.relation_type_repo.delete(uid).await?;
        info!(relation_type_uid = %uid, "Relation type deleted");
        Ok(())
    }

    pub async fn find_relation_types_by_models(
        &self,
        source_model_uid: &str,
        target_model_uid: &str,
    ) -> CmdbResult<Vec<ModelRelationType>> {
        self.relation_type_repo
            .find_by_models(source_model_uid, target_model_uid)
            .await
    }
}
