//! Instance-level and model-level topology views.
//!
//! Instance traversal is an explicit breadth-first worklist from the seed.
//! Every instance enters the result at most once, so cycles terminate on
//! their own; `depth` and the configured node cap bound the work further.

use std::collections::{HashMap, HashSet, VecDeque};

use cmdb_core::error::{CmdbError, CmdbResult};
use cmdb_core::models::instance::Instance;
use cmdb_core::models::model::{Model, ModelFilter, PROVIDER_ALL};
use cmdb_core::models::relation::{InstanceRelation, InstanceRelationFilter};
use cmdb_core::models::relation_type::{ModelRelationType, ModelRelationTypeFilter};
use cmdb_core::models::topology::{
    ModelTopologyEdge, ModelTopologyGraph, ModelTopologyNode, TopologyEdge, TopologyGraph,
    TopologyNode, TopologyQuery,
};
use cmdb_core::repository::{
    InstanceRelationRepository, InstanceRepository, ModelRelationTypeRepository,
    ModelRepository, Pagination,
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::EngineError;

fn to_node(instance: &Instance, model: Option<&Model>) -> TopologyNode {
    TopologyNode {
        id: instance.id,
        model_uid: instance.model_uid.clone(),
        model_name: model.map(|m| m.name.clone()).unwrap_or_default(),
        asset_id: instance.asset_id.clone(),
        asset_name: instance.asset_name.clone(),
        attributes: instance.attributes.clone(),
        icon: model.map(|m| m.icon.clone()).unwrap_or_default(),
        category: model.map(|m| m.category.clone()).unwrap_or_default(),
    }
}

#[derive(Clone, Copy)]
enum Step {
    Outgoing,
    Incoming,
}

/// Lookups memoized for the duration of one traversal.
#[derive(Default)]
struct Lookups {
    models: HashMap<String, Option<Model>>,
    relation_types: HashMap<String, Option<ModelRelationType>>,
}

/// Topology service.
pub struct TopologyService<I, R, T, M>
where
    I: InstanceRepository,
    R: InstanceRelationRepository,
    T: ModelRelationTypeRepository,
    M: ModelRepository,
{
    instance_repo: I,
    relation_repo: R,
    relation_type_repo: T,
    model_repo: M,
    config: EngineConfig,
}

impl<I, R, T, M> TopologyService<I, R, T, M>
where
    I: InstanceRepository,
    R: InstanceRelationRepository,
    T: ModelRelationTypeRepository,
    M: ModelRepository,
{
    pub fn new(
        instance_repo: I,
        relation_repo: R,
        relation_type_repo: T,
        model_repo: M,
        config: EngineConfig,
    ) -> Self {
        Self {
            instance_repo,
            relation_repo,
            relation_type_repo,
            model_repo,
            config,
        }
    }

    async fn model<'a>(&self, lookups: &'a mut Lookups, uid: &str) -> Option<&'a Model> {
        if !lookups.models.contains_key(uid) {
            let model = self.model_repo.get_by_uid(uid).await.ok();
            lookups.models.insert(uid.to_string(), model);
        }
        lookups.models.get(uid).and_then(Option::as_ref)
    }

    async fn relation_type<'a>(
        &self,
        lookups: &'a mut Lookups,
        uid: &str,
    ) -> Option<&'a ModelRelationType> {
        if !lookups.relation_types.contains_key(uid) {
            let relation_type = self.relation_type_repo.get_by_uid(uid).await.ok();
            lookups.relation_types.insert(uid.to_string(), relation_type);
        }
        lookups.relation_types.get(uid).and_then(Option::as_ref)
    }

    async fn edges_of(
        &self,
        tenant_id: Uuid,
        instance_id: Uuid,
        step: Step,
    ) -> CmdbResult<Vec<InstanceRelation>> {
        let filter = match step {
            Step::Outgoing => InstanceRelationFilter {
                tenant_id: Some(tenant_id),
                source_instance_id: Some(instance_id),
                ..Default::default()
            },
            Step::Incoming => InstanceRelationFilter {
                tenant_id: Some(tenant_id),
                target_instance_id: Some(instance_id),
                ..Default::default()
            },
        };

        let mut all = Vec::new();
        let mut page = Pagination::new(0, self.config.batch_page_size);
        loop {
            let result = self.relation_repo.list(filter.clone(), page).await?;
            let more = result.has_more();
            all.extend(result.items);
            if !more {
                return Ok(all);
            }
            page = page.next();
        }
    }

    /// Graph of the instances reachable from the seed.
    ///
    /// Nodes at distance `d` from the seed are expanded while
    /// `d < depth`; `depth <= 0` removes the bound. The model filter is
    /// applied to each neighbour as it is reached, so traversal does not
    /// continue through filtered-out instances.
    pub async fn get_instance_topology(&self, query: TopologyQuery) -> CmdbResult<TopologyGraph> {
        let seed = match self
            .instance_repo
            .get_by_id(query.tenant_id, query.instance_id)
            .await
        {
            Ok(seed) => seed,
            Err(CmdbError::NotFound { .. }) => {
                return Err(EngineError::ForeignSeed {
                    tenant_id: query.tenant_id,
                    instance_id: query.instance_id,
                }
                .into());
            }
            Err(e) => return Err(e),
        };

        let max_nodes = self.config.max_topology_nodes.max(1);
        let bound = usize::try_from(query.depth).ok().filter(|d| *d > 0);
        let model_filter = query.model_uid.as_deref().filter(|m| !m.is_empty());

        let mut lookups = Lookups::default();
        let mut graph = TopologyGraph::default();
        let seed_model = self.model(&mut lookups, &seed.model_uid).await;
        graph.nodes.push(to_node(&seed, seed_model));

        let mut visited = HashSet::from([seed.id]);
        let mut worklist = VecDeque::from([(seed.id, 0_usize)]);

        let mut steps = Vec::with_capacity(2);
        if query.direction.follows_outgoing() {
            steps.push(Step::Outgoing);
        }
        if query.direction.follows_incoming() {
            steps.push(Step::Incoming);
        }

        'traverse: while let Some((current, distance)) = worklist.pop_front() {
            if bound.is_some_and(|depth| distance >= depth) {
                continue;
            }

            for &step in &steps {
                for relation in self.edges_of(query.tenant_id, current, step).await? {
                    let neighbour_id = match step {
                        Step::Outgoing => relation.target_instance_id,
                        Step::Incoming => relation.source_instance_id,
                    };
                    if visited.contains(&neighbour_id) {
                        continue;
                    }

                    let neighbour = match self
                        .instance_repo
                        .get_by_id(query.tenant_id, neighbour_id)
                        .await
                    {
                        Ok(instance) => instance,
                        Err(e) => {
                            debug!(instance_id = %neighbour_id, error = %e, "Unresolvable topology endpoint");
                            continue;
                        }
                    };
                    if model_filter.is_some_and(|m| m != neighbour.model_uid) {
                        continue;
                    }

                    if graph.nodes.len() >= max_nodes {
                        warn!(
                            tenant_id = %query.tenant_id,
                            seed = %seed.id,
                            max_nodes,
                            "Topology traversal truncated"
                        );
                        graph.truncated = true;
                        break 'traverse;
                    }

                    visited.insert(neighbour_id);
                    let model = self.model(&mut lookups, &neighbour.model_uid).await;
                    graph.nodes.push(to_node(&neighbour, model));

                    let (relation_name, relation_kind) =
                        match self.relation_type(&mut lookups, &relation.relation_type_uid).await {
                            Some(rt) => (rt.name.clone(), rt.relation_type.as_str().to_string()),
                            None => (String::new(), String::new()),
                        };
                    graph.edges.push(TopologyEdge {
                        source_id: relation.source_instance_id,
                        target_id: relation.target_instance_id,
                        relation_type_uid: relation.relation_type_uid,
                        relation_name,
                        relation_type: relation_kind,
                    });

                    worklist.push_back((neighbour_id, distance + 1));
                }
            }
        }

        debug!(
            seed = %seed.id,
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            truncated = graph.truncated,
            "Instance topology built"
        );
        Ok(graph)
    }

    async fn list_models(&self, provider: Option<String>) -> CmdbResult<Vec<Model>> {
        let filter = ModelFilter {
            provider,
            ..Default::default()
        };
        let page = Pagination::new(0, self.config.model_topology_limit);
        Ok(self.model_repo.list(filter, page).await?.items)
    }

    /// Schema-level graph of models and the relation types between them.
    ///
    /// An empty provider yields every model and relation type. Otherwise
    /// the models of that provider plus provider-agnostic (`"all"`)
    /// models are loaded, and a relation type is kept only when both of
    /// its endpoints are among them.
    pub async fn get_model_topology(&self, provider: &str) -> CmdbResult<ModelTopologyGraph> {
        let models = if provider.is_empty() {
            self.list_models(None).await?
        } else {
            let mut models = self.list_models(Some(provider.to_string())).await?;
            // Intentional: `all` models are emitted as nodes, not only used
            // to scope edges, so every kept edge has both endpoints listed.
            if provider != PROVIDER_ALL {
                models.extend(self.list_models(Some(PROVIDER_ALL.to_string())).await?);
            }
            models
        };

        let relation_types = self
            .relation_type_repo
            .list(
                ModelRelationTypeFilter::default(),
                Pagination::new(0, self.config.model_topology_limit),
            )
            .await?
            .items;

        let by_uid: HashMap<&str, &Model> = models.iter().map(|m| (m.uid.as_str(), m)).collect();
        let in_scope = |uid: &str| {
            by_uid
                .get(uid)
                .is_some_and(|m| m.provider == provider || m.provider == PROVIDER_ALL)
        };

        let edges = relation_types
            .iter()
            .filter(|rt| {
                provider.is_empty() || (in_scope(&rt.source_model_uid) && in_scope(&rt.target_model_uid))
            })
            .map(|rt| ModelTopologyEdge {
                source_model_uid: rt.source_model_uid.clone(),
                target_model_uid: rt.target_model_uid.clone(),
                relation_uid: rt.uid.clone(),
                relation_name: rt.name.clone(),
                relation_type: rt.relation_type.as_str().to_string(),
            })
            .collect();

        let nodes = models
            .iter()
            .map(|m| ModelTopologyNode {
                uid: m.uid.clone(),
                name: m.name.clone(),
                category: m.category.clone(),
                provider: m.provider.clone(),
                icon: m.icon.clone(),
            })
            .collect();

        Ok(ModelTopologyGraph { nodes, edges })
    }

    /// One-hop outgoing neighbours of an instance. An empty
    /// `relation_type_uid` follows every relation type. Targets that no
    /// longer resolve are left out.
    pub async fn get_related_instances(
        &self,
        tenant_id: Uuid,
        instance_id: Uuid,
        relation_type_uid: &str,
    ) -> CmdbResult<Vec<Instance>> {
        let filter = InstanceRelationFilter {
            tenant_id: Some(tenant_id),
            source_instance_id: Some(instance_id),
            target_instance_id: None,
            relation_type_uid: (!relation_type_uid.is_empty()).then(|| relation_type_uid.to_string()),
        };
        let relations = self
            .relation_repo
            .list(filter, Pagination::new(0, self.config.related_instances_limit))
            .await?
            .items;

        let mut related = Vec::with_capacity(relations.len());
        for relation in relations {
            if let Ok(instance) = self
                .instance_repo
                .get_by_id(tenant_id, relation.target_instance_id)
                .await
            {
                related.push(instance);
            }
        }
        Ok(related)
    }
}
