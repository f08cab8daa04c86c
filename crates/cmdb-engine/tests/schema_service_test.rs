//! Integration tests for the schema registry service.

use cmdb_core::error::CmdbError;
use cmdb_core::models::attribute::{
    ATTR_GROUP_BASIC, ATTR_GROUP_CUSTOM, CreateAttribute, CreateAttributeGroup, FieldType,
    UpdateAttribute, UpdateAttributeGroup,
};
use cmdb_core::models::model::{CreateModel, ModelFilter, UpdateModel};
use cmdb_core::models::model_group::{
    CreateModelGroup, MODEL_GROUP_CLOUD, MODEL_GROUP_UNGROUPED, UpdateModelGroup,
};
use cmdb_core::models::relation_type::{
    CreateModelRelationType, RelationDirection, RelationKind, UpdateModelRelationType,
};
use cmdb_core::repository::{ModelRepository, Pagination};
use cmdb_db::repository::{
    SurrealAttributeGroupRepository, SurrealAttributeRepository, SurrealModelGroupRepository,
    SurrealModelRelationTypeRepository, SurrealModelRepository,
};
use cmdb_engine::SchemaService;
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};

type Service = SchemaService<
    SurrealModelRepository<Db>,
    SurrealModelGroupRepository<Db>,
    SurrealAttributeRepository<Db>,
    SurrealAttributeGroupRepository<Db>,
    SurrealModelRelationTypeRepository<Db>,
>;

async fn setup() -> (Surreal<Db>, Service) {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    cmdb_db::run_migrations(&db).await.unwrap();

    let service = SchemaService::new(
        SurrealModelRepository::new(db.clone()),
        SurrealModelGroupRepository::new(db.clone()),
        SurrealAttributeRepository::new(db.clone()),
        SurrealAttributeGroupRepository::new(db.clone()),
        SurrealModelRelationTypeRepository::new(db.clone()),
    );
    (db, service)
}

fn model(uid: &str, provider: &str) -> CreateModel {
    CreateModel {
        uid: uid.into(),
        name: uid.into(),
        category: "compute".into(),
        provider: provider.into(),
        extensible: true,
        ..Default::default()
    }
}

fn relation_type(uid: &str) -> CreateModelRelationType {
    CreateModelRelationType {
        uid: uid.into(),
        name: "VM in VPC".into(),
        source_model_uid: "cloud_vm".into(),
        target_model_uid: "cloud_vpc".into(),
        relation_type: RelationKind::BelongsTo,
        direction: RelationDirection::OneToMany,
        source_to_target: "belongs to".into(),
        target_to_source: "contains".into(),
        description: String::new(),
    }
}

#[tokio::test]
async fn create_model_initialises_builtin_groups() {
    let (_db, service) = setup().await;
    let vm = service.create_model(model("cloud_vm", "aliyun")).await.unwrap();
    assert_eq!(vm.uid, "cloud_vm");

    let groups = service.list_groups("cloud_vm").await.unwrap();
    assert_eq!(groups.len(), 5);
    assert!(groups.iter().all(|g| g.is_builtin));

    let err = service.create_model(model("cloud_vm", "aws")).await.unwrap_err();
    assert!(matches!(err, CmdbError::AlreadyExists { .. }));

    let err = service.create_model(model(" ", "aws")).await.unwrap_err();
    assert!(matches!(err, CmdbError::Validation { .. }));
}

#[tokio::test]
async fn update_and_delete_missing_model_are_not_found() {
    let (_db, service) = setup().await;

    let err = service
        .update_model("ghost", UpdateModel::default())
        .await
        .unwrap_err();
    assert!(matches!(err, CmdbError::NotFound { .. }));
    let err = service.delete_model("ghost").await.unwrap_err();
    assert!(matches!(err, CmdbError::NotFound { .. }));

    service.create_model(model("cloud_vm", "aliyun")).await.unwrap();
    let updated = service
        .update_model(
            "cloud_vm",
            UpdateModel {
                icon: Some("vm.svg".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.icon, "vm.svg");

    let listed = service
        .list_models(
            ModelFilter {
                provider: Some("aliyun".into()),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(listed.total, 1);
}

fn grouped_model(uid: &str, group: &str) -> CreateModel {
    CreateModel {
        model_group: Some(group.into()),
        ..model(uid, "aliyun")
    }
}

fn edge_group() -> CreateModelGroup {
    CreateModelGroup {
        uid: "edge".into(),
        name: "Edge".into(),
        icon: "router".into(),
        sort_order: 50,
        is_builtin: false,
        description: String::new(),
    }
}

#[tokio::test]
async fn model_must_reference_existing_group() {
    let (_db, service) = setup().await;

    let err = service
        .create_model(grouped_model("cloud_vm", MODEL_GROUP_CLOUD))
        .await
        .unwrap_err();
    assert!(matches!(err, CmdbError::NotFound { .. }));

    service.init_builtin_model_groups().await.unwrap();
    let vm = service
        .create_model(grouped_model("cloud_vm", MODEL_GROUP_CLOUD))
        .await
        .unwrap();
    assert_eq!(vm.model_group.as_deref(), Some(MODEL_GROUP_CLOUD));

    let err = service
        .update_model(
            "cloud_vm",
            UpdateModel {
                model_group: Some(Some("ghost".into())),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CmdbError::NotFound { .. }));
}

#[tokio::test]
async fn builtin_model_groups_keep_sort_order_and_cannot_be_deleted() {
    let (_db, service) = setup().await;
    let builtin = service.init_builtin_model_groups().await.unwrap();
    assert_eq!(builtin.len(), 10);
    // Idempotent.
    assert_eq!(service.init_builtin_model_groups().await.unwrap().len(), 10);
    assert_eq!(service.list_model_groups().await.unwrap().len(), 10);

    let cloud = service.get_model_group(MODEL_GROUP_CLOUD).await.unwrap();
    let updated = service
        .update_model_group(
            MODEL_GROUP_CLOUD,
            UpdateModelGroup {
                name: Some("Public cloud".into()),
                sort_order: Some(42),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.name, "Public cloud");
    assert_eq!(updated.sort_order, cloud.sort_order);
    assert!(updated.is_builtin);

    let err = service.delete_model_group(MODEL_GROUP_CLOUD).await.unwrap_err();
    assert!(matches!(err, CmdbError::Validation { .. }));
    assert!(service.get_model_group(MODEL_GROUP_CLOUD).await.is_ok());
}

#[tokio::test]
async fn model_group_with_models_cannot_be_deleted() {
    let (_db, service) = setup().await;
    let edge = service.create_model_group(edge_group()).await.unwrap();
    assert!(!edge.is_builtin);

    let err = service.create_model_group(edge_group()).await.unwrap_err();
    assert!(matches!(err, CmdbError::AlreadyExists { .. }));

    let moved = service
        .update_model_group(
            "edge",
            UpdateModelGroup {
                sort_order: Some(7),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(moved.sort_order, 7);

    service
        .create_model(grouped_model("edge_router", "edge"))
        .await
        .unwrap();
    let err = service.delete_model_group("edge").await.unwrap_err();
    assert!(matches!(err, CmdbError::Validation { .. }));

    service
        .update_model(
            "edge_router",
            UpdateModel {
                model_group: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    service.delete_model_group("edge").await.unwrap();
    let err = service.delete_model_group("edge").await.unwrap_err();
    assert!(matches!(err, CmdbError::NotFound { .. }));
}

#[tokio::test]
async fn list_model_groups_with_models_buckets_ungrouped_last() {
    let (_db, service) = setup().await;
    service.init_builtin_model_groups().await.unwrap();
    service
        .create_model(grouped_model("cloud_vm", MODEL_GROUP_CLOUD))
        .await
        .unwrap();
    service
        .create_model(grouped_model("cloud_vpc", MODEL_GROUP_CLOUD))
        .await
        .unwrap();
    service.create_model(model("bare_metal", "idc")).await.unwrap();

    let grouped = service.list_model_groups_with_models().await.unwrap();
    assert_eq!(grouped.len(), 11);

    let cloud = grouped
        .iter()
        .find(|g| g.group.uid == MODEL_GROUP_CLOUD)
        .unwrap();
    let uids: Vec<_> = cloud.models.iter().map(|m| m.uid.as_str()).collect();
    assert_eq!(uids, ["cloud_vm", "cloud_vpc"]);

    let last = grouped.last().unwrap();
    assert_eq!(last.group.uid, MODEL_GROUP_UNGROUPED);
    assert_eq!(last.models.len(), 1);
    assert_eq!(last.models[0].uid, "bare_metal");
}

#[tokio::test]
async fn attribute_defaults_to_custom_group() {
    let (_db, service) = setup().await;
    service.create_model(model("cloud_vm", "aliyun")).await.unwrap();

    let attr = service
        .create_attribute(CreateAttribute::new(
            "cloud_vm",
            "cpu",
            "CPU",
            FieldType::Int,
        ))
        .await
        .unwrap();
    let group = service.get_group(attr.group_id.unwrap()).await.unwrap();
    assert_eq!(group.uid, ATTR_GROUP_CUSTOM);

    let err = service
        .create_attribute(CreateAttribute::new(
            "cloud_vm",
            "cpu",
            "CPU",
            FieldType::Int,
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, CmdbError::AlreadyExists { .. }));

    let err = service
        .create_attribute(CreateAttribute::new("ghost", "cpu", "CPU", FieldType::Int))
        .await
        .unwrap_err();
    assert!(matches!(err, CmdbError::NotFound { .. }));
}

#[tokio::test]
async fn attribute_update_and_delete() {
    let (_db, service) = setup().await;
    service.create_model(model("cloud_vm", "aliyun")).await.unwrap();
    let attr = service
        .create_attribute(CreateAttribute::new(
            "cloud_vm",
            "hostname",
            "Hostname",
            FieldType::String,
        ))
        .await
        .unwrap();

    let updated = service
        .update_attribute(
            attr.id,
            UpdateAttribute {
                searchable: Some(true),
                display_name: Some("Host".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(updated.searchable);
    assert_eq!(updated.field_uid, "hostname");

    let fetched = service
        .get_attribute_by_field_uid("cloud_vm", "hostname")
        .await
        .unwrap();
    assert_eq!(fetched.display_name, "Host");

    service.delete_attribute(attr.id).await.unwrap();
    let err = service.get_attribute(attr.id).await.unwrap_err();
    assert!(matches!(err, CmdbError::NotFound { .. }));
    assert!(service.list_attributes("cloud_vm").await.unwrap().is_empty());
}

#[tokio::test]
async fn list_with_groups_initialises_and_buckets() {
    let (db, service) = setup().await;
    // Created through the repository, so no groups exist yet.
    SurrealModelRepository::new(db.clone())
        .create(model("cloud_vpc", "aliyun"))
        .await
        .unwrap();
    let basic = service.init_builtin_groups("cloud_vpc").await.unwrap();
    let basic = basic.into_iter().find(|g| g.uid == ATTR_GROUP_BASIC).unwrap();

    let mut cidr = CreateAttribute::new("cloud_vpc", "cidr", "CIDR", FieldType::String);
    cidr.group_id = Some(basic.id);
    service.create_attribute(cidr).await.unwrap();
    service
        .create_attribute(CreateAttribute::new(
            "cloud_vpc",
            "owner",
            "Owner",
            FieldType::String,
        ))
        .await
        .unwrap();

    let grouped = service.list_attributes_with_groups("cloud_vpc").await.unwrap();
    assert_eq!(grouped.len(), 5);
    let basic_bucket = grouped.iter().find(|g| g.group.uid == ATTR_GROUP_BASIC).unwrap();
    assert_eq!(basic_bucket.attributes[0].field_uid, "cidr");
    let custom_bucket = grouped.iter().find(|g| g.group.uid == ATTR_GROUP_CUSTOM).unwrap();
    assert_eq!(custom_bucket.attributes[0].field_uid, "owner");

    SurrealModelRepository::new(db.clone())
        .create(model("cloud_nat", "aliyun"))
        .await
        .unwrap();
    let fresh = service.list_attributes_with_groups("cloud_nat").await.unwrap();
    assert_eq!(fresh.len(), 5);
    assert!(fresh.iter().all(|g| g.attributes.is_empty()));
}

#[tokio::test]
async fn builtin_groups_are_protected() {
    let (_db, service) = setup().await;
    service.create_model(model("cloud_vm", "aliyun")).await.unwrap();
    let groups = service.list_groups("cloud_vm").await.unwrap();
    let basic = groups.iter().find(|g| g.uid == ATTR_GROUP_BASIC).unwrap();

    let err = service.delete_group(basic.id).await.unwrap_err();
    assert!(matches!(err, CmdbError::Validation { .. }));

    let renamed = service
        .update_group(
            basic.id,
            UpdateAttributeGroup {
                uid: Some("renamed".into()),
                name: Some("Basics".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(renamed.uid, ATTR_GROUP_BASIC);
    assert_eq!(renamed.name, "Basics");

    let custom = service
        .create_group(CreateAttributeGroup {
            model_uid: "cloud_vm".into(),
            uid: "billing".into(),
            name: "Billing".into(),
            index: 10,
            is_builtin: true,
            description: String::new(),
        })
        .await
        .unwrap();
    assert!(!custom.is_builtin);
    service.delete_group(custom.id).await.unwrap();

    let err = service
        .create_group(CreateAttributeGroup {
            model_uid: "ghost".into(),
            uid: "billing".into(),
            name: "Billing".into(),
            index: 10,
            is_builtin: false,
            description: String::new(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CmdbError::NotFound { .. }));
}

#[tokio::test]
async fn deleting_model_removes_attributes_and_groups() {
    let (_db, service) = setup().await;
    service.create_model(model("cloud_vm", "aliyun")).await.unwrap();
    service
        .create_attribute(CreateAttribute::new("cloud_vm", "cpu", "CPU", FieldType::Int))
        .await
        .unwrap();

    service.delete_model("cloud_vm").await.unwrap();
    assert!(service.list_attributes("cloud_vm").await.unwrap().is_empty());
    assert!(service.list_groups("cloud_vm").await.unwrap().is_empty());
}

#[tokio::test]
async fn relation_type_lifecycle() {
    let (_db, service) = setup().await;
    service
        .create_relation_type(relation_type("ecs_belongs_to_vpc"))
        .await
        .unwrap();
    let err = service
        .create_relation_type(relation_type("ecs_belongs_to_vpc"))
        .await
        .unwrap_err();
    assert!(matches!(err, CmdbError::AlreadyExists { .. }));

    let found = service
        .find_relation_types_by_models("cloud_vm", "cloud_vpc")
        .await
        .unwrap();
    assert_eq!(found.len(), 1);

    let updated = service
        .update_relation_type(
            "ecs_belongs_to_vpc",
            UpdateModelRelationType {
                relation_type: Some(RelationKind::Contains),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.relation_type, RelationKind::Contains);

    service.delete_relation_type("ecs_belongs_to_vpc").await.unwrap();
    let err = service
        .delete_relation_type("ecs_belongs_to_vpc")
        .await
        .unwrap_err();
    assert!(matches!(err, CmdbError::NotFound { .. }));
}
