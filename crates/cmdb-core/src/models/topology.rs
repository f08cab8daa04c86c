//! Topology query and graph shapes.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::instance::Attributes;
use crate::error::CmdbError;

/// Which edges a traversal follows from each visited instance.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TraversalDirection {
    #[default]
    #[serde(alias = "")]
    Both,
    Outgoing,
    Incoming,
}

impl TraversalDirection {
    pub fn follows_outgoing(self) -> bool {
        matches!(self, Self::Both | Self::Outgoing)
    }

    pub fn follows_incoming(self) -> bool {
        matches!(self, Self::Both | Self::Incoming)
    }
}

impl FromStr for TraversalDirection {
    type Err = CmdbError;

    /// `""` and `"both"` both mean [`TraversalDirection::Both`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "both" => Ok(Self::Both),
            "outgoing" => Ok(Self::Outgoing),
            "incoming" => Ok(Self::Incoming),
            other => Err(CmdbError::validation(format!(
                "unknown topology direction: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyQuery {
    pub instance_id: Uuid,
    /// Only instances of this model are added to the result.
    pub model_uid: Option<String>,
    pub tenant_id: Uuid,
    /// Maximum hop distance from the seed. `depth <= 0` means unbounded.
    pub depth: i32,
    pub direction: TraversalDirection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TopologyNode {
    pub id: Uuid,
    pub model_uid: String,
    pub model_name: String,
    pub asset_id: String,
    pub asset_name: String,
    pub attributes: Attributes,
    pub icon: String,
    pub category: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TopologyEdge {
    pub source_id: Uuid,
    pub target_id: Uuid,
    pub relation_type_uid: String,
    pub relation_name: String,
    pub relation_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TopologyGraph {
    pub nodes: Vec<TopologyNode>,
    pub edges: Vec<TopologyEdge>,
    /// Set when the node cap stopped the traversal early.
    pub truncated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelTopologyNode {
    pub uid: String,
    pub name: String,
    pub category: String,
    pub provider: String,
    pub icon: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelTopologyEdge {
    pub source_model_uid: String,
    pub target_model_uid: String,
    pub relation_uid: String,
    pub relation_name: String,
    pub relation_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ModelTopologyGraph {
    pub nodes: Vec<ModelTopologyNode>,
    pub edges: Vec<ModelTopologyEdge>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_direction_means_both() {
        assert_eq!("".parse::<TraversalDirection>().unwrap(), TraversalDirection::Both);
        let parsed: TraversalDirection = serde_json::from_str("\"\"").unwrap();
        assert_eq!(parsed, TraversalDirection::Both);
        assert!("sideways".parse::<TraversalDirection>().is_err());
    }

    #[test]
    fn query_with_empty_direction_decodes() {
        let query: TopologyQuery = serde_json::from_value(serde_json::json!({
            "instance_id": Uuid::nil(),
            "model_uid": null,
            "tenant_id": Uuid::nil(),
            "depth": 0,
            "direction": "",
        }))
        .unwrap();
        assert_eq!(query.direction, TraversalDirection::Both);

        let encoded = serde_json::to_value(&query).unwrap();
        assert_eq!(encoded["direction"], "both");
        let decoded: TopologyQuery = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded.direction, TraversalDirection::Both);
    }
}
