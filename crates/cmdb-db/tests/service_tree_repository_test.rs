//! Integration tests for service tree nodes, binding rules and resource
//! bindings using in-memory SurrealDB.

use cmdb_core::error::CmdbError;
use cmdb_core::models::binding::{BindType, BindingFilter, CreateResourceBinding, ResourceType};
use cmdb_core::models::node::CreateServiceTreeNode;
use cmdb_core::models::rule::{
    CreateBindingRule, Operator, RuleCondition, RuleFilter, UpdateBindingRule,
};
use cmdb_core::repository::{
    BindingRuleRepository, Pagination, ResourceBindingRepository, ServiceTreeNodeRepository,
};
use cmdb_db::repository::{
    SurrealBindingRuleRepository, SurrealResourceBindingRepository,
    SurrealServiceTreeNodeRepository,
};
use surrealdb::Surreal;
use surrealdb::engine::local::Mem;
use uuid::Uuid;

async fn setup() -> Surreal<surrealdb::engine::local::Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    cmdb_db::run_migrations(&db).await.unwrap();
    db
}

fn rule(tenant_id: Uuid, node_id: Uuid, name: &str, priority: i64) -> CreateBindingRule {
    CreateBindingRule {
        tenant_id,
        node_id,
        env_id: None,
        name: name.into(),
        priority,
        conditions: vec![RuleCondition::new("region", Operator::Eq, "cn-hangzhou")],
        enabled: true,
        description: String::new(),
    }
}

fn rule_binding(
    tenant_id: Uuid,
    node_id: Uuid,
    resource_id: Uuid,
    rule_id: Uuid,
) -> CreateResourceBinding {
    CreateResourceBinding {
        tenant_id,
        node_id,
        env_id: None,
        resource_type: ResourceType::Instance,
        resource_id,
        bind_type: BindType::Rule,
        rule_id: Some(rule_id),
    }
}

#[tokio::test]
async fn node_create_get_list() {
    let db = setup().await;
    let repo = SurrealServiceTreeNodeRepository::new(db);
    let tenant = Uuid::new_v4();

    let root = repo
        .create(CreateServiceTreeNode {
            tenant_id: tenant,
            uid: "biz".into(),
            name: "Business".into(),
            level: 1,
            ..Default::default()
        })
        .await
        .unwrap();
    let child = repo
        .create(CreateServiceTreeNode {
            tenant_id: tenant,
            uid: "biz.order".into(),
            name: "Order".into(),
            parent_id: Some(root.id),
            level: 2,
            ..Default::default()
        })
        .await
        .unwrap();

    assert!(root.enabled);
    assert_eq!(child.parent_id, Some(root.id));
    assert!(repo.exists(tenant, child.id).await.unwrap());
    assert!(!repo.exists(Uuid::new_v4(), child.id).await.unwrap());

    let listed = repo.list(tenant, Pagination::default()).await.unwrap();
    assert_eq!(listed.total, 2);
    assert_eq!(listed.items[0].id, root.id);

    repo.delete(tenant, child.id).await.unwrap();
    assert!(!repo.exists(tenant, child.id).await.unwrap());
}

#[tokio::test]
async fn rule_conditions_round_trip() {
    let db = setup().await;
    let repo = SurrealBindingRuleRepository::new(db);
    let tenant = Uuid::new_v4();

    let mut input = rule(tenant, Uuid::new_v4(), "hz-web", 10);
    input
        .conditions
        .push(RuleCondition::new("name", Operator::Regex, "^web-\\d+$"));
    let created = repo.create(input).await.unwrap();

    let fetched = repo.get_by_id(tenant, created.id).await.unwrap();
    assert_eq!(fetched.conditions.len(), 2);
    assert_eq!(fetched.conditions[1].operator, "regex");
    assert_eq!(fetched.conditions[1].value, "^web-\\d+$");
}

#[tokio::test]
async fn enabled_rules_are_ordered_by_priority() {
    let db = setup().await;
    let repo = SurrealBindingRuleRepository::new(db);
    let tenant = Uuid::new_v4();
    let node = Uuid::new_v4();

    repo.create(rule(tenant, node, "low", 50)).await.unwrap();
    repo.create(rule(tenant, node, "high", 1)).await.unwrap();
    let mut disabled = rule(tenant, node, "off", 0);
    disabled.enabled = false;
    repo.create(disabled).await.unwrap();
    repo.create(rule(Uuid::new_v4(), node, "other-tenant", 0))
        .await
        .unwrap();

    let enabled = repo.list_enabled(tenant).await.unwrap();
    let names: Vec<_> = enabled.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, ["high", "low"]);

    let all = repo
        .list(tenant, RuleFilter::default(), Pagination::default())
        .await
        .unwrap();
    assert_eq!(all.total, 3);

    let named = repo
        .list(
            tenant,
            RuleFilter {
                name: Some("hig".into()),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(named.total, 1);
}

#[tokio::test]
async fn rule_update_is_partial() {
    let db = setup().await;
    let repo = SurrealBindingRuleRepository::new(db);
    let tenant = Uuid::new_v4();

    let created = repo
        .create(rule(tenant, Uuid::new_v4(), "r", 5))
        .await
        .unwrap();
    let env = Uuid::new_v4();

    let updated = repo
        .update(
            tenant,
            created.id,
            UpdateBindingRule {
                enabled: Some(false),
                env_id: Some(Some(env)),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert!(!updated.enabled);
    assert_eq!(updated.env_id, Some(env));
    assert_eq!(updated.priority, 5);
    assert_eq!(updated.conditions, created.conditions);

    let err = repo
        .update(Uuid::new_v4(), created.id, UpdateBindingRule::default())
        .await
        .unwrap_err();
    assert!(matches!(err, CmdbError::NotFound { .. }));
}

#[tokio::test]
async fn binding_is_unique_per_env_and_resource() {
    let db = setup().await;
    let repo = SurrealResourceBindingRepository::new(db);
    let tenant = Uuid::new_v4();
    let resource = Uuid::new_v4();
    let rule_id = Uuid::new_v4();

    let created = repo
        .create(rule_binding(tenant, Uuid::new_v4(), resource, rule_id))
        .await
        .unwrap();
    assert_eq!(created.env_id, None);
    assert_eq!(created.rule_id, Some(rule_id));

    let err = repo
        .create(rule_binding(tenant, Uuid::new_v4(), resource, rule_id))
        .await
        .unwrap_err();
    assert!(matches!(err, CmdbError::AlreadyExists { .. }));

    // A different environment is a separate slot.
    let mut other_env = rule_binding(tenant, Uuid::new_v4(), resource, rule_id);
    other_env.env_id = Some(Uuid::new_v4());
    repo.create(other_env).await.unwrap();

    let listed = repo
        .list(
            tenant,
            BindingFilter {
                resource_id: Some(resource),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(listed.total, 2);
}

#[tokio::test]
async fn delete_by_rule_only_touches_that_rule() {
    let db = setup().await;
    let repo = SurrealResourceBindingRepository::new(db);
    let tenant = Uuid::new_v4();
    let node = Uuid::new_v4();
    let (rule_a, rule_b) = (Uuid::new_v4(), Uuid::new_v4());

    repo.create(rule_binding(tenant, node, Uuid::new_v4(), rule_a))
        .await
        .unwrap();
    repo.create(rule_binding(tenant, node, Uuid::new_v4(), rule_a))
        .await
        .unwrap();
    let kept = repo
        .create(rule_binding(tenant, node, Uuid::new_v4(), rule_b))
        .await
        .unwrap();

    let removed = repo.delete_by_rule_id(tenant, rule_a).await.unwrap();
    assert_eq!(removed, 2);

    let remaining = repo
        .list(tenant, BindingFilter::default(), Pagination::default())
        .await
        .unwrap();
    assert_eq!(remaining.total, 1);
    assert_eq!(remaining.items[0].id, kept.id);
}
