//! CMDB Engine: schema registry, instance relation graph, topology
//! traversal and the service-tree rule engine.

pub mod config;
pub mod error;
pub mod matcher;
pub mod relation;
pub mod rules;
pub mod schema;
pub mod topology;

pub use config::EngineConfig;
pub use error::EngineError;
pub use matcher::PlannedBinding;
pub use relation::{
    ReconcileReport, ReconcileSpec, RelationService, RelationSyncReport, SourceGuard,
    builtin_specs,
};
pub use rules::{BindResourceInput, ExecuteReport, RuleEngine};
pub use schema::{FieldTypeOption, SchemaService, field_types};
pub use topology::TopologyService;
