//! Specification model
//!
//! Resource descriptors are opaque to the engine: `type` is a string tag and
//! `properties` is an arbitrary JSON mapping. Ordering of `resources` carries
//! no semantic meaning; execution order comes from the dependency graph.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A declared cloud topology: resources plus an optional zone layout policy.
///
/// Blocks a project does not need (no topology, no messaging resources, ...)
/// are simply absent; the engine handles partial specifications without
/// special-casing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Specification {
    /// Project name, used for display only
    pub name: String,

    /// Declared resources, in declaration order
    #[serde(default)]
    pub resources: Vec<ResourceSpec>,

    /// Zone allocation policy for per-zone resource groups
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topology: Option<TopologyPolicy>,
}

impl Specification {
    /// Structural checks that don't require the dependency graph.
    ///
    /// Duplicate ids and dangling references are the graph builder's job;
    /// this only rejects descriptors that are malformed on their own.
    pub fn validate(&self) -> crate::Result<()> {
        for resource in &self.resources {
            if resource.id.is_empty() {
                return Err(crate::CoreError::InvalidSpec(
                    "resource with empty id".to_string(),
                ));
            }
            if resource.resource_type.is_empty() {
                return Err(crate::CoreError::InvalidSpec(format!(
                    "resource '{}' has an empty type",
                    resource.id
                )));
            }
            if resource.per_zone.is_some() && self.topology.is_none() {
                return Err(crate::CoreError::InvalidSpec(format!(
                    "resource '{}' is per_zone but the specification declares no topology",
                    resource.id
                )));
            }
        }
        Ok(())
    }

    pub fn resource(&self, id: &str) -> Option<&ResourceSpec> {
        self.resources.iter().find(|r| r.id == id)
    }
}

/// A single declared resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceSpec {
    /// Stable identifier chosen by the declarer; re-runs map onto the same
    /// node for diffing
    pub id: String,

    /// Opaque type tag (e.g. "network", "subnet", "instance")
    #[serde(rename = "type")]
    pub resource_type: String,

    /// Desired properties; string values may carry references or templates
    #[serde(default)]
    pub properties: Map<String, Value>,

    /// Property names whose change forces a replace instead of an update
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub immutable: Vec<String>,

    /// Marks a group expanded into one node per allocated zone
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_zone: Option<Visibility>,
}

impl ResourceSpec {
    pub fn new(id: impl Into<String>, resource_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            resource_type: resource_type.into(),
            properties: Map::new(),
            immutable: Vec::new(),
            per_zone: None,
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    pub fn with_immutable(mut self, key: impl Into<String>) -> Self {
        self.immutable.push(key.into());
        self
    }
}

/// Which address range a per-zone group draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Private,
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Visibility::Public => write!(f, "public"),
            Visibility::Private => write!(f, "private"),
        }
    }
}

/// Zone allocation policy.
///
/// Allocation is a pure function of the resolved zone list and this policy,
/// never of call order: re-running with the same inputs yields byte-identical
/// block assignments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyPolicy {
    /// Fact key that resolves to the provider's zone list
    #[serde(default = "default_zones_fact")]
    pub zones_fact: String,

    /// Requested replica count; effective count is min(requested, zones, cap)
    pub requested: u32,

    /// Configured ceiling on the effective count
    #[serde(default = "default_cap")]
    pub cap: u32,

    /// Node id of the parent network resource
    pub network: String,

    /// Parent address block the per-zone blocks are carved from
    #[serde(default = "default_base_block")]
    pub base_block: String,

    /// Private blocks are offset from public ones by this many block indices
    #[serde(default = "default_private_offset")]
    pub private_offset: u32,

    /// Prefix length of each carved block
    #[serde(default = "default_block_bits")]
    pub block_bits: u8,
}

fn default_zones_fact() -> String {
    "availability_zones".to_string()
}

fn default_cap() -> u32 {
    3
}

fn default_base_block() -> String {
    "10.0.0.0/16".to_string()
}

fn default_private_offset() -> u32 {
    100
}

fn default_block_bits() -> u8 {
    24
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn validate_rejects_empty_id() {
        let spec = Specification {
            name: "t".into(),
            resources: vec![ResourceSpec::new("", "network")],
            topology: None,
        };
        assert!(spec.validate().is_err());
    }

    #[test]
    fn validate_rejects_per_zone_without_topology() {
        let mut subnet = ResourceSpec::new("subnet", "subnet");
        subnet.per_zone = Some(Visibility::Public);
        let spec = Specification {
            name: "t".into(),
            resources: vec![subnet],
            topology: None,
        };
        assert!(spec.validate().is_err());
    }

    #[test]
    fn topology_defaults() {
        let policy: TopologyPolicy = serde_json::from_value(json!({
            "requested": 3,
            "network": "vpc"
        }))
        .unwrap();
        assert_eq!(policy.zones_fact, "availability_zones");
        assert_eq!(policy.cap, 3);
        assert_eq!(policy.base_block, "10.0.0.0/16");
        assert_eq!(policy.private_offset, 100);
        assert_eq!(policy.block_bits, 24);
    }
}
