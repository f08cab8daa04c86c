//! Engine configuration.

/// Tunables shared by the engine services.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Node count at which instance topology traversal stops and marks the
    /// graph as truncated (default: 10 000).
    pub max_topology_nodes: usize,
    /// Upper bound on models and relation types loaded for the model-level
    /// topology (default: 1000).
    pub model_topology_limit: u64,
    /// Upper bound on outgoing edges inspected by related-instance lookups
    /// (default: 100).
    pub related_instances_limit: u64,
    /// Page size used when a batch job walks every instance or binding of a
    /// tenant (default: 500).
    pub batch_page_size: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_topology_nodes: 10_000,
            model_topology_limit: 1000,
            related_instances_limit: 100,
            batch_page_size: 500,
        }
    }
}
