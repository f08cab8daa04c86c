//! Domain models for the CMDB.
//!
//! These are the core types shared across all crates. Schema types
//! (models, attributes, relation types) are global; instances, relations,
//! tree nodes, rules and bindings are tenant scoped.

pub mod attribute;
pub mod binding;
pub mod instance;
pub mod model;
pub mod model_group;
pub mod node;
pub mod relation;
pub mod relation_type;
pub mod rule;
pub mod topology;
