//! Integration tests for the rule engine using in-memory SurrealDB.

use cmdb_core::error::CmdbError;
use cmdb_core::models::binding::{BindType, BindingFilter, ResourceType};
use cmdb_core::models::instance::{Attributes, Instance, UpsertInstance};
use cmdb_core::models::node::{CreateServiceTreeNode, ServiceTreeNode};
use cmdb_core::models::rule::{
    CreateBindingRule, Operator, RuleCondition, RuleFilter, UpdateBindingRule,
};
use cmdb_core::repository::{InstanceRepository, Pagination};
use cmdb_db::repository::{
    SurrealBindingRuleRepository, SurrealInstanceRepository, SurrealResourceBindingRepository,
    SurrealServiceTreeNodeRepository,
};
use cmdb_engine::{BindResourceInput, EngineConfig, RuleEngine};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

type Engine = RuleEngine<
    SurrealServiceTreeNodeRepository<Db>,
    SurrealBindingRuleRepository<Db>,
    SurrealResourceBindingRepository<Db>,
    SurrealInstanceRepository<Db>,
>;

async fn setup() -> (Surreal<Db>, Engine) {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    cmdb_db::run_migrations(&db).await.unwrap();

    let engine = RuleEngine::new(
        SurrealServiceTreeNodeRepository::new(db.clone()),
        SurrealBindingRuleRepository::new(db.clone()),
        SurrealResourceBindingRepository::new(db.clone()),
        SurrealInstanceRepository::new(db.clone()),
        EngineConfig::default(),
    );
    (db, engine)
}

async fn node(engine: &Engine, tenant_id: Uuid, uid: &str) -> ServiceTreeNode {
    engine
        .create_node(CreateServiceTreeNode {
            tenant_id,
            uid: uid.into(),
            name: uid.into(),
            ..Default::default()
        })
        .await
        .unwrap()
}

async fn vm(db: &Surreal<Db>, tenant_id: Uuid, name: &str, region: &str) -> Instance {
    let mut attributes = Attributes::new();
    attributes.insert("region".into(), region.into());
    SurrealInstanceRepository::new(db.clone())
        .upsert(UpsertInstance {
            tenant_id,
            model_uid: "cloud_vm".into(),
            asset_id: format!("i-{name}"),
            asset_name: name.into(),
            account_id: None,
            attributes,
        })
        .await
        .unwrap()
}

fn web_in_hangzhou(tenant_id: Uuid, node_id: Uuid, priority: i64) -> CreateBindingRule {
    CreateBindingRule {
        tenant_id,
        node_id,
        env_id: None,
        name: "hangzhou web".into(),
        priority,
        conditions: vec![
            RuleCondition::new("attributes.region", Operator::Eq, "cn-hangzhou"),
            RuleCondition::new("name", Operator::Regex, "^web-"),
        ],
        enabled: true,
        description: String::new(),
    }
}

#[tokio::test]
async fn create_rule_requires_existing_node() {
    let (_db, engine) = setup().await;
    let tenant = Uuid::new_v4();

    let err = engine
        .create_rule(web_in_hangzhou(tenant, Uuid::new_v4(), 1))
        .await
        .unwrap_err();
    assert!(matches!(err, CmdbError::NotFound { .. }));

    let n = node(&engine, tenant, "biz.web").await;
    let rule = engine.create_rule(web_in_hangzhou(tenant, n.id, 1)).await.unwrap();
    assert_eq!(rule.conditions.len(), 2);
}

#[tokio::test]
async fn unknown_operator_is_rejected_on_write() {
    let (_db, engine) = setup().await;
    let tenant = Uuid::new_v4();
    let n = node(&engine, tenant, "biz.web").await;

    let mut input = web_in_hangzhou(tenant, n.id, 1);
    input.conditions.push(RuleCondition {
        field: "name".into(),
        operator: "starts_with".into(),
        value: "web".into(),
    });
    let err = engine.create_rule(input).await.unwrap_err();
    assert!(matches!(err, CmdbError::Validation { .. }));

    let rule = engine.create_rule(web_in_hangzhou(tenant, n.id, 1)).await.unwrap();
    let err = engine
        .update_rule(
            tenant,
            rule.id,
            UpdateBindingRule {
                conditions: Some(Vec::new()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CmdbError::Validation { .. }));
}

#[tokio::test]
async fn update_rule_requires_existing_rule() {
    let (_db, engine) = setup().await;
    let tenant = Uuid::new_v4();
    let n = node(&engine, tenant, "biz.web").await;

    let err = engine
        .update_rule(tenant, Uuid::new_v4(), UpdateBindingRule::default())
        .await
        .unwrap_err();
    assert!(matches!(err, CmdbError::NotFound { .. }));

    let rule = engine.create_rule(web_in_hangzhou(tenant, n.id, 1)).await.unwrap();
    let updated = engine
        .update_rule(
            tenant,
            rule.id,
            UpdateBindingRule {
                enabled: Some(false),
                priority: Some(9),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(!updated.enabled);
    assert_eq!(updated.priority, 9);

    let disabled = engine
        .list_rules(
            tenant,
            RuleFilter {
                enabled: Some(false),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(disabled.total, 1);
}

#[tokio::test]
async fn match_instance_picks_lowest_priority_value() {
    let (db, engine) = setup().await;
    let tenant = Uuid::new_v4();
    let web = vm(&db, tenant, "web-01", "cn-hangzhou").await;
    let db_vm = vm(&db, tenant, "db-01", "cn-hangzhou").await;

    let result = engine.match_instance(tenant, &web).await.unwrap();
    assert!(!result.matched);
    assert_eq!(result.reason, "no enabled rules");

    let broad_node = node(&engine, tenant, "biz.all").await;
    let web_node = node(&engine, tenant, "biz.web").await;
    let mut broad = web_in_hangzhou(tenant, broad_node.id, 100);
    broad.name = "all vms".into();
    broad.conditions = vec![RuleCondition::new("model_uid", Operator::Eq, "cloud_vm")];
    engine.create_rule(broad).await.unwrap();
    let specific = engine
        .create_rule(web_in_hangzhou(tenant, web_node.id, 1))
        .await
        .unwrap();

    let result = engine.match_instance(tenant, &web).await.unwrap();
    assert!(result.matched);
    assert_eq!(result.rule_id, Some(specific.id));
    assert_eq!(result.node_id, Some(web_node.id));
    assert_eq!(result.resource_id, web.id);
    assert_eq!(result.reason, "matched rule: hangzhou web");

    let result = engine.match_instance(tenant, &db_vm).await.unwrap();
    assert_eq!(result.node_id, Some(broad_node.id));
}

#[tokio::test]
async fn not_in_rule_excludes_listed_regions() {
    let (db, engine) = setup().await;
    let tenant = Uuid::new_v4();
    let n = node(&engine, tenant, "biz.overseas").await;
    let mut rule = web_in_hangzhou(tenant, n.id, 1);
    rule.name = "overseas".into();
    rule.conditions = vec![RuleCondition::new(
        "attributes.region",
        Operator::NotIn,
        "cn-hangzhou, cn-beijing",
    )];
    engine.create_rule(rule).await.unwrap();

    let domestic = vm(&db, tenant, "web-01", "cn-beijing").await;
    let overseas = vm(&db, tenant, "web-02", "us-east-1").await;

    let result = engine.match_instance(tenant, &domestic).await.unwrap();
    assert!(!result.matched);
    assert_eq!(result.reason, "no matching rule");
    assert!(engine.match_instance(tenant, &overseas).await.unwrap().matched);
}

#[tokio::test]
async fn execute_rules_binds_each_instance_once() {
    let (db, engine) = setup().await;
    let tenant = Uuid::new_v4();
    let n = node(&engine, tenant, "biz.web").await;
    let rule = engine.create_rule(web_in_hangzhou(tenant, n.id, 1)).await.unwrap();

    let web1 = vm(&db, tenant, "web-01", "cn-hangzhou").await;
    let web2 = vm(&db, tenant, "web-02", "cn-hangzhou").await;
    vm(&db, tenant, "db-01", "cn-hangzhou").await;
    vm(&db, tenant, "web-03", "us-east-1").await;

    // A manual binding already places web-02.
    let other = node(&engine, tenant, "biz.legacy").await;
    engine
        .bind_resource(BindResourceInput {
            tenant_id: tenant,
            node_id: other.id,
            env_id: None,
            resource_type: ResourceType::Instance,
            resource_id: web2.id,
        })
        .await
        .unwrap();

    let report = engine.execute_rules(tenant).await.unwrap();
    assert_eq!(report.rules, 1);
    assert_eq!(report.instances, 4);
    assert_eq!(report.planned, 1);
    assert_eq!(report.created, 1);
    assert_eq!(report.already_bound, 0);
    assert_eq!(report.failed, 0);

    let bindings = engine
        .list_bindings(
            tenant,
            BindingFilter {
                rule_id: Some(rule.id),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(bindings.items.len(), 1);
    assert_eq!(bindings.items[0].resource_id, web1.id);
    assert_eq!(bindings.items[0].bind_type, BindType::Rule);

    let rerun = engine.execute_rules(tenant).await.unwrap();
    assert_eq!(rerun.planned, 0);
    assert_eq!(rerun.created, 0);
}

#[tokio::test]
async fn deleting_rule_removes_its_bindings() {
    let (db, engine) = setup().await;
    let tenant = Uuid::new_v4();
    let n = node(&engine, tenant, "biz.web").await;
    let rule = engine.create_rule(web_in_hangzhou(tenant, n.id, 1)).await.unwrap();
    vm(&db, tenant, "web-01", "cn-hangzhou").await;
    vm(&db, tenant, "web-02", "cn-hangzhou").await;
    let manual_target = vm(&db, tenant, "db-01", "cn-hangzhou").await;

    let manual = engine
        .bind_resource(BindResourceInput {
            tenant_id: tenant,
            node_id: n.id,
            env_id: None,
            resource_type: ResourceType::Instance,
            resource_id: manual_target.id,
        })
        .await
        .unwrap();
    assert_eq!(engine.execute_rules(tenant).await.unwrap().created, 2);

    engine.delete_rule(tenant, rule.id).await.unwrap();

    let remaining = engine
        .list_bindings(tenant, BindingFilter::default(), Pagination::default())
        .await
        .unwrap();
    assert_eq!(remaining.items.len(), 1);
    assert_eq!(remaining.items[0].id, manual.id);

    let err = engine.get_rule(tenant, rule.id).await.unwrap_err();
    assert!(matches!(err, CmdbError::NotFound { .. }));
}

#[tokio::test]
async fn manual_binding_is_unique_per_environment() {
    let (db, engine) = setup().await;
    let tenant = Uuid::new_v4();
    let n = node(&engine, tenant, "biz.web").await;
    let web = vm(&db, tenant, "web-01", "cn-hangzhou").await;
    let input = BindResourceInput {
        tenant_id: tenant,
        node_id: n.id,
        env_id: None,
        resource_type: ResourceType::Instance,
        resource_id: web.id,
    };

    let binding = engine.bind_resource(input.clone()).await.unwrap();
    let err = engine.bind_resource(input.clone()).await.unwrap_err();
    assert!(matches!(err, CmdbError::AlreadyExists { .. }));

    engine
        .bind_resource(BindResourceInput {
            env_id: Some(Uuid::new_v4()),
            ..input.clone()
        })
        .await
        .unwrap();

    let err = engine
        .bind_resource(BindResourceInput {
            node_id: Uuid::new_v4(),
            ..input
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CmdbError::NotFound { .. }));

    engine.unbind_resource(tenant, binding.id).await.unwrap();
    let err = engine.unbind_resource(tenant, binding.id).await.unwrap_err();
    assert!(matches!(err, CmdbError::NotFound { .. }));
}

#[tokio::test]
async fn nodes_are_tenant_scoped() {
    let (_db, engine) = setup().await;
    let tenant = Uuid::new_v4();
    let n = node(&engine, tenant, "biz.web").await;

    assert!(engine.node_exists(tenant, n.id).await.unwrap());
    assert!(!engine.node_exists(Uuid::new_v4(), n.id).await.unwrap());

    let child = engine
        .create_node(CreateServiceTreeNode {
            tenant_id: tenant,
            uid: "biz.web.api".into(),
            name: "api".into(),
            parent_id: Some(n.id),
            level: 2,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(child.parent_id, Some(n.id));
    assert_eq!(engine.list_nodes(tenant, Pagination::default()).await.unwrap().total, 2);

    engine.delete_node(tenant, child.id).await.unwrap();
    let err = engine.get_node(tenant, child.id).await.unwrap_err();
    assert!(matches!(err, CmdbError::NotFound { .. }));
    let err = engine.delete_node(tenant, child.id).await.unwrap_err();
    assert!(matches!(err, CmdbError::NotFound { .. }));
}
