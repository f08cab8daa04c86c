//! SurrealDB repository implementations.

mod attribute;
mod attribute_group;
mod binding;
mod instance;
mod model;
mod model_group;
mod node;
mod relation;
mod relation_type;
mod rule;

pub use attribute::SurrealAttributeRepository;
pub use attribute_group::SurrealAttributeGroupRepository;
pub use binding::SurrealResourceBindingRepository;
pub use instance::SurrealInstanceRepository;
pub use model::SurrealModelRepository;
pub use model_group::SurrealModelGroupRepository;
pub use node::SurrealServiceTreeNodeRepository;
pub use relation::SurrealInstanceRelationRepository;
pub use relation_type::SurrealModelRelationTypeRepository;
pub use rule::SurrealBindingRuleRepository;
