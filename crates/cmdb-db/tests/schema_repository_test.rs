//! Integration tests for the schema registry repositories (models, model
//! groups, attributes, attribute groups, relation types) using in-memory
//! SurrealDB.

use cmdb_core::error::CmdbError;
use cmdb_core::models::attribute::{
    CreateAttribute, CreateAttributeGroup, FieldType, UpdateAttribute, UpdateAttributeGroup,
};
use cmdb_core::models::model::{CreateModel, ModelFilter, UpdateModel};
use cmdb_core::models::model_group::{CreateModelGroup, UpdateModelGroup};
use cmdb_core::models::relation_type::{
    CreateModelRelationType, ModelRelationTypeFilter, RelationDirection, RelationKind,
    UpdateModelRelationType,
};
use cmdb_core::repository::{
    AttributeGroupRepository, AttributeRepository, ModelGroupRepository,
    ModelRelationTypeRepository, ModelRepository, Pagination,
};
use cmdb_db::repository::{
    SurrealAttributeGroupRepository, SurrealAttributeRepository, SurrealModelGroupRepository,
    SurrealModelRelationTypeRepository, SurrealModelRepository,
};
use surrealdb::Surreal;
use surrealdb::engine::local::Mem;

async fn setup() -> Surreal<surrealdb::engine::local::Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    cmdb_db::run_migrations(&db).await.unwrap();
    db
}

fn model(uid: &str, provider: &str) -> CreateModel {
    CreateModel {
        uid: uid.into(),
        name: uid.into(),
        category: "compute".into(),
        provider: provider.into(),
        level: 1,
        ..Default::default()
    }
}

// -----------------------------------------------------------------------
// Models
// -----------------------------------------------------------------------

#[tokio::test]
async fn create_and_get_model() {
    let db = setup().await;
    let repo = SurrealModelRepository::new(db);

    let created = repo.create(model("cloud_vm", "aliyun")).await.unwrap();
    assert_eq!(created.uid, "cloud_vm");
    assert_eq!(created.provider, "aliyun");

    let fetched = repo.get_by_uid("cloud_vm").await.unwrap();
    assert_eq!(fetched.name, "cloud_vm");
    assert!(repo.exists("cloud_vm").await.unwrap());
    assert!(!repo.exists("cloud_vpc").await.unwrap());
}

#[tokio::test]
async fn duplicate_model_uid_is_rejected() {
    let db = setup().await;
    let repo = SurrealModelRepository::new(db);

    repo.create(model("cloud_vm", "aliyun")).await.unwrap();
    let err = repo.create(model("cloud_vm", "aws")).await.unwrap_err();
    assert!(matches!(err, CmdbError::AlreadyExists { .. }));
}

#[tokio::test]
async fn update_model_and_clear_parent() {
    let db = setup().await;
    let repo = SurrealModelRepository::new(db);

    let mut input = model("cloud_vm", "aliyun");
    input.parent_uid = Some("host".into());
    repo.create(input).await.unwrap();

    let updated = repo
        .update(
            "cloud_vm",
            UpdateModel {
                name: Some("Virtual Machine".into()),
                parent_uid: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.name, "Virtual Machine");
    assert!(updated.parent_uid.is_none());
}

#[tokio::test]
async fn update_missing_model_is_not_found() {
    let db = setup().await;
    let repo = SurrealModelRepository::new(db);

    let err = repo
        .update("ghost", UpdateModel::default())
        .await
        .unwrap_err();
    assert!(matches!(err, CmdbError::NotFound { .. }));
}

#[tokio::test]
async fn list_models_filters_by_provider() {
    let db = setup().await;
    let repo = SurrealModelRepository::new(db);

    repo.create(model("cloud_vm", "aliyun")).await.unwrap();
    repo.create(model("cloud_vpc", "aliyun")).await.unwrap();
    repo.create(model("aws_ec2", "aws")).await.unwrap();

    let all = repo
        .list(ModelFilter::default(), Pagination::default())
        .await
        .unwrap();
    assert_eq!(all.total, 3);

    let aliyun = repo
        .list(
            ModelFilter {
                provider: Some("aliyun".into()),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(aliyun.total, 2);
    assert!(aliyun.items.iter().all(|m| m.provider == "aliyun"));

    let page = repo
        .list(ModelFilter::default(), Pagination::new(0, 2))
        .await
        .unwrap();
    assert_eq!(page.items.len(), 2);
    assert!(page.has_more());
}

#[tokio::test]
async fn delete_model_removes_attributes_and_groups() {
    let db = setup().await;
    let models = SurrealModelRepository::new(db.clone());
    let attrs = SurrealAttributeRepository::new(db.clone());
    let groups = SurrealAttributeGroupRepository::new(db);

    models.create(model("cloud_vm", "aliyun")).await.unwrap();
    attrs
        .create(CreateAttribute::new(
            "cloud_vm",
            "region",
            "Region",
            FieldType::String,
        ))
        .await
        .unwrap();
    for group in CreateAttributeGroup::builtin("cloud_vm") {
        groups.create(group).await.unwrap();
    }

    models.delete("cloud_vm").await.unwrap();

    assert!(!models.exists("cloud_vm").await.unwrap());
    assert!(attrs.list_by_model("cloud_vm").await.unwrap().is_empty());
    assert!(groups.list_by_model("cloud_vm").await.unwrap().is_empty());
}

// -----------------------------------------------------------------------
// Model groups
// -----------------------------------------------------------------------

fn model_group(uid: &str, sort_order: i64) -> CreateModelGroup {
    CreateModelGroup {
        uid: uid.into(),
        name: uid.to_uppercase(),
        icon: "folder".into(),
        sort_order,
        ..Default::default()
    }
}

#[tokio::test]
async fn model_group_crud() {
    let db = setup().await;
    let repo = SurrealModelGroupRepository::new(db);

    let created = repo.create(model_group("edge", 20)).await.unwrap();
    assert_eq!(created.uid, "edge");
    assert!(!created.is_builtin);
    assert!(repo.exists("edge").await.unwrap());

    let err = repo.create(model_group("edge", 1)).await.unwrap_err();
    assert!(matches!(err, CmdbError::AlreadyExists { .. }));

    let updated = repo
        .update(
            "edge",
            UpdateModelGroup {
                icon: Some("router".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.icon, "router");
    assert_eq!(updated.sort_order, 20);

    repo.delete("edge").await.unwrap();
    assert!(!repo.exists("edge").await.unwrap());
    let err = repo.delete("edge").await.unwrap_err();
    assert!(matches!(err, CmdbError::NotFound { .. }));
    let err = repo.get_by_uid("edge").await.unwrap_err();
    assert!(matches!(err, CmdbError::NotFound { .. }));
}

#[tokio::test]
async fn model_groups_list_by_sort_order_and_upsert_keeps_existing() {
    let db = setup().await;
    let repo = SurrealModelGroupRepository::new(db);

    repo.create(model_group("zeta", 1)).await.unwrap();
    repo.create(model_group("alpha", 5)).await.unwrap();
    repo.create(model_group("beta", 5)).await.unwrap();

    let mut again = model_group("zeta", 99);
    again.name = "Other".into();
    let kept = repo.upsert(again).await.unwrap();
    assert_eq!(kept.sort_order, 1);
    assert_eq!(kept.name, "ZETA");

    let uids: Vec<_> = repo
        .list()
        .await
        .unwrap()
        .into_iter()
        .map(|g| g.uid)
        .collect();
    assert_eq!(uids, ["zeta", "alpha", "beta"]);
}

// -----------------------------------------------------------------------
// Attributes
// -----------------------------------------------------------------------

#[tokio::test]
async fn attribute_crud() {
    let db = setup().await;
    let repo = SurrealAttributeRepository::new(db);

    let mut input = CreateAttribute::new("cloud_vm", "status", "Status", FieldType::Enum);
    input.option = Some(serde_json::json!(["Running", "Stopped"]));
    input.index = 3;
    let created = repo.create(input).await.unwrap();

    assert_eq!(created.field_type, FieldType::Enum);
    assert_eq!(created.option, serde_json::json!(["Running", "Stopped"]));

    let by_uid = repo.get_by_field_uid("cloud_vm", "status").await.unwrap();
    assert_eq!(by_uid.id, created.id);
    assert!(repo.exists("cloud_vm", "status").await.unwrap());

    let updated = repo
        .update(
            created.id,
            UpdateAttribute {
                display_name: Some("Power State".into()),
                searchable: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.display_name, "Power State");
    assert!(updated.searchable);
    assert_eq!(updated.field_name, "Status");

    repo.delete(created.id).await.unwrap();
    let err = repo.get_by_id(created.id).await.unwrap_err();
    assert!(matches!(err, CmdbError::NotFound { .. }));
}

#[tokio::test]
async fn duplicate_attribute_is_rejected() {
    let db = setup().await;
    let repo = SurrealAttributeRepository::new(db);

    let input = CreateAttribute::new("cloud_vm", "region", "Region", FieldType::String);
    repo.create(input.clone()).await.unwrap();
    let err = repo.create(input).await.unwrap_err();
    assert!(matches!(err, CmdbError::AlreadyExists { .. }));
}

#[tokio::test]
async fn attributes_are_listed_by_index() {
    let db = setup().await;
    let repo = SurrealAttributeRepository::new(db);

    for (uid, index) in [("zone", 2), ("region", 1), ("status", 3)] {
        let mut input = CreateAttribute::new("cloud_vm", uid, uid, FieldType::String);
        input.index = index;
        repo.create(input).await.unwrap();
    }

    let listed = repo.list_by_model("cloud_vm").await.unwrap();
    let uids: Vec<_> = listed.iter().map(|a| a.field_uid.as_str()).collect();
    assert_eq!(uids, ["region", "zone", "status"]);
}

// -----------------------------------------------------------------------
// Attribute groups
// -----------------------------------------------------------------------

#[tokio::test]
async fn group_upsert_returns_existing() {
    let db = setup().await;
    let repo = SurrealAttributeGroupRepository::new(db);

    let first = repo
        .upsert(CreateAttributeGroup {
            model_uid: "cloud_vm".into(),
            uid: "custom".into(),
            name: "Custom".into(),
            index: 100,
            is_builtin: true,
            description: String::new(),
        })
        .await
        .unwrap();
    let second = repo
        .upsert(CreateAttributeGroup {
            model_uid: "cloud_vm".into(),
            uid: "custom".into(),
            name: "Other".into(),
            index: 1,
            is_builtin: false,
            description: String::new(),
        })
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(second.name, "Custom");
    assert_eq!(repo.list_by_model("cloud_vm").await.unwrap().len(), 1);
}

#[tokio::test]
async fn group_update_and_ordering() {
    let db = setup().await;
    let repo = SurrealAttributeGroupRepository::new(db);

    for group in CreateAttributeGroup::builtin("cloud_vm") {
        repo.create(group).await.unwrap();
    }

    let listed = repo.list_by_model("cloud_vm").await.unwrap();
    assert_eq!(listed.len(), 5);
    assert_eq!(listed.first().unwrap().uid, "basic");
    assert_eq!(listed.last().unwrap().uid, "custom");

    let network = repo.get_by_uid("cloud_vm", "network").await.unwrap();
    let renamed = repo
        .update(
            network.id,
            UpdateAttributeGroup {
                name: Some("Networking".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(renamed.name, "Networking");
    assert!(renamed.is_builtin);
}

// -----------------------------------------------------------------------
// Relation types
// -----------------------------------------------------------------------

fn vm_to_vpc() -> CreateModelRelationType {
    CreateModelRelationType {
        uid: "cloud_vm_belongs_to_cloud_vpc".into(),
        name: "VM in VPC".into(),
        source_model_uid: "cloud_vm".into(),
        target_model_uid: "cloud_vpc".into(),
        relation_type: RelationKind::BelongsTo,
        direction: RelationDirection::ManyToMany,
        source_to_target: "belongs to".into(),
        target_to_source: "contains".into(),
        description: String::new(),
    }
}

#[tokio::test]
async fn relation_type_crud() {
    let db = setup().await;
    let repo = SurrealModelRelationTypeRepository::new(db);

    let created = repo.create(vm_to_vpc()).await.unwrap();
    assert_eq!(created.relation_type, RelationKind::BelongsTo);

    let err = repo.create(vm_to_vpc()).await.unwrap_err();
    assert!(matches!(err, CmdbError::AlreadyExists { .. }));

    let updated = repo
        .update(
            &created.uid,
            UpdateModelRelationType {
                direction: Some(RelationDirection::OneToMany),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.direction, RelationDirection::OneToMany);

    let found = repo.find_by_models("cloud_vm", "cloud_vpc").await.unwrap();
    assert_eq!(found.len(), 1);
    assert!(
        repo.find_by_models("cloud_vpc", "cloud_vm")
            .await
            .unwrap()
            .is_empty()
    );

    let listed = repo
        .list(
            ModelRelationTypeFilter {
                relation_type: Some(RelationKind::BelongsTo),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(listed.total, 1);

    repo.delete(&created.uid).await.unwrap();
    assert!(!repo.exists(&created.uid).await.unwrap());
}
