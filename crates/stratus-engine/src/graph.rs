//! Dependency graph construction and leveling
//!
//! Scans every resource's properties for `ref(...)` and template references,
//! derives producer→consumer edges, validates the result (duplicate ids,
//! dangling references, overlapping sibling allocations, cycles), and levels
//! it with Kahn's algorithm. No partial graph is ever returned: validation
//! failures abort before anything can be applied.

use crate::error::{EngineError, Result};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use stratus_core::{Reference, ResourceSpec, Specification, reference};
use tracing::debug;

/// A resource node plus its derived producer set.
#[derive(Debug, Clone)]
pub struct Node {
    pub spec: ResourceSpec,
    /// Ids of nodes whose outputs this node consumes
    pub dependencies: BTreeSet<String>,
}

/// A derived producer→consumer edge. Edges are never declared; they fall out
/// of references found in the consumer's desired spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub producer: String,
    pub consumer: String,
    pub output: String,
}

/// Validated, acyclic resource graph with precomputed levels.
#[derive(Debug, Clone)]
pub struct Graph {
    nodes: BTreeMap<String, Node>,
    edges: Vec<Edge>,
    levels: Vec<Vec<String>>,
}

impl Graph {
    /// Build and validate a graph from an (already expanded) specification.
    pub fn build(spec: &Specification) -> Result<Graph> {
        let mut nodes: BTreeMap<String, Node> = BTreeMap::new();
        for resource in &spec.resources {
            if nodes.contains_key(&resource.id) {
                return Err(EngineError::Conflict(format!(
                    "duplicate node id '{}'",
                    resource.id
                )));
            }
            nodes.insert(
                resource.id.clone(),
                Node {
                    spec: resource.clone(),
                    dependencies: BTreeSet::new(),
                },
            );
        }

        let mut edges = Vec::new();
        for resource in &spec.resources {
            let mut refs = Vec::new();
            reference::scan_properties(&resource.properties, &mut |r| refs.push(r));
            for reference in refs {
                if let Reference::Output { node, output } = reference {
                    if !nodes.contains_key(&node) {
                        return Err(EngineError::Reference {
                            node,
                            output,
                        });
                    }
                    edges.push(Edge {
                        producer: node.clone(),
                        consumer: resource.id.clone(),
                        output,
                    });
                    if let Some(consumer) = nodes.get_mut(&resource.id) {
                        consumer.dependencies.insert(node);
                    }
                }
            }
        }

        check_allocation_conflicts(&nodes)?;
        let levels = level(&nodes)?;

        debug!(
            nodes = nodes.len(),
            edges = edges.len(),
            levels = levels.len(),
            "built dependency graph"
        );
        Ok(Graph {
            nodes,
            edges,
            levels,
        })
    }

    /// Levels in apply order; no edges exist within a level, and every
    /// producer's level index is strictly less than its consumers'.
    pub fn levels(&self) -> &[Vec<String>] {
        &self.levels
    }

    /// Node ids flattened in level order.
    pub fn topo_order(&self) -> impl Iterator<Item = &String> {
        self.levels.iter().flatten()
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Two siblings on the same network computed to the same block is a
/// specification bug, caught before anything is applied.
fn check_allocation_conflicts(nodes: &BTreeMap<String, Node>) -> Result<()> {
    let mut seen: HashMap<(String, String), &str> = HashMap::new();
    for (id, node) in nodes {
        let Some(network) = node.spec.properties.get("network").map(|v| v.to_string()) else {
            continue;
        };
        let Some(block) = node.spec.properties.get("cidr_block").and_then(|v| v.as_str()) else {
            continue;
        };
        if let Some(other) = seen.insert((network, block.to_string()), id) {
            return Err(EngineError::Conflict(format!(
                "nodes '{other}' and '{id}' share block {block} on the same network"
            )));
        }
    }
    Ok(())
}

/// Kahn's algorithm, deterministic by node id within each level.
fn level(nodes: &BTreeMap<String, Node>) -> Result<Vec<Vec<String>>> {
    let mut in_degree: BTreeMap<&str, usize> = nodes
        .iter()
        .map(|(id, node)| (id.as_str(), node.dependencies.len()))
        .collect();
    let mut consumers: HashMap<&str, Vec<&str>> = HashMap::new();
    for (id, node) in nodes {
        for dep in &node.dependencies {
            consumers
                .entry(dep.as_str())
                .or_default()
                .push(id.as_str());
        }
    }

    let mut levels = Vec::new();
    let mut current: Vec<&str> = in_degree
        .iter()
        .filter(|(_, d)| **d == 0)
        .map(|(id, _)| *id)
        .collect();
    let mut visited = 0usize;

    while !current.is_empty() {
        visited += current.len();
        let mut next = BTreeSet::new();
        for id in &current {
            for consumer in consumers.get(id).into_iter().flatten() {
                if let Some(degree) = in_degree.get_mut(consumer) {
                    *degree -= 1;
                    if *degree == 0 {
                        next.insert(*consumer);
                    }
                }
            }
        }
        levels.push(current.iter().map(|s| s.to_string()).collect());
        current = next.into_iter().collect();
    }

    if visited < nodes.len() {
        let members: Vec<String> = in_degree
            .iter()
            .filter(|(_, d)| **d > 0)
            .map(|(id, _)| id.to_string())
            .collect();
        return Err(EngineError::Cycle { members });
    }
    Ok(levels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratus_core::spec_from_yaml;

    fn build(yaml: &str) -> Result<Graph> {
        Graph::build(&spec_from_yaml(yaml).unwrap())
    }

    const LINEAR: &str = r#"
name: demo
resources:
  - id: vpc
    type: network
    properties: {cidr_block: 10.0.0.0/16}
  - id: igw
    type: gateway
    properties: {network: "ref(vpc, id)"}
  - id: route
    type: route
    properties: {gateway: "ref(igw, id)", destination: 0.0.0.0/0}
"#;

    #[test]
    fn levels_respect_every_edge() {
        let graph = build(LINEAR).unwrap();
        let level_of: BTreeMap<&str, usize> = graph
            .levels()
            .iter()
            .enumerate()
            .flat_map(|(i, ids)| ids.iter().map(move |id| (id.as_str(), i)))
            .collect();

        for edge in graph.edges() {
            assert!(
                level_of[edge.producer.as_str()] < level_of[edge.consumer.as_str()],
                "edge {} -> {} violates level order",
                edge.producer,
                edge.consumer
            );
        }
    }

    #[test]
    fn independent_nodes_share_a_level() {
        let graph = build(
            r#"
name: demo
resources:
  - id: vpc
    type: network
  - id: public-rt
    type: route-table
    properties: {network: "ref(vpc, id)"}
  - id: private-rt
    type: route-table
    properties: {network: "ref(vpc, id)"}
"#,
        )
        .unwrap();
        assert_eq!(graph.levels().len(), 2);
        assert_eq!(graph.levels()[1], vec!["private-rt", "public-rt"]);
    }

    #[test]
    fn cycle_names_both_members() {
        let err = build(
            r#"
name: demo
resources:
  - id: a
    type: thing
    properties: {peer: "ref(b, id)"}
  - id: b
    type: thing
    properties: {peer: "ref(a, id)"}
"#,
        )
        .unwrap_err();
        match err {
            EngineError::Cycle { members } => {
                assert_eq!(members, vec!["a", "b"]);
            }
            other => panic!("expected cycle error, got {other}"),
        }
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let err = build(
            r#"
name: demo
resources:
  - id: a
    type: thing
    properties: {me: "ref(a, id)"}
"#,
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Cycle { .. }));
    }

    #[test]
    fn duplicate_id_rejected() {
        let err = build(
            r#"
name: demo
resources:
  - id: vpc
    type: network
  - id: vpc
    type: network
"#,
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Conflict(_)));
    }

    #[test]
    fn dangling_reference_rejected_at_build_time() {
        let err = build(
            r#"
name: demo
resources:
  - id: igw
    type: gateway
    properties: {network: "ref(vpc, id)"}
"#,
        )
        .unwrap_err();
        match err {
            EngineError::Reference { node, output } => {
                assert_eq!(node, "vpc");
                assert_eq!(output, "id");
            }
            other => panic!("expected reference error, got {other}"),
        }
    }

    #[test]
    fn template_reference_creates_edge() {
        let graph = build(
            r##"
name: demo
resources:
  - id: db
    type: database
  - id: web
    type: instance
    properties:
      user_data: "#!/bin/sh\nexport DB={{ nodes.db.endpoint }}"
"##,
        )
        .unwrap();
        assert_eq!(
            graph.edges(),
            &[Edge {
                producer: "db".into(),
                consumer: "web".into(),
                output: "endpoint".into()
            }]
        );
        assert_eq!(graph.levels(), &[vec!["db".to_string()], vec!["web".to_string()]]);
    }

    #[test]
    fn template_reference_to_unknown_node_rejected() {
        let err = build(
            r#"
name: demo
resources:
  - id: web
    type: instance
    properties:
      user_data: "{{ nodes.db.endpoint }}"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Reference { .. }));
    }

    #[test]
    fn overlapping_sibling_blocks_rejected() {
        let err = build(
            r#"
name: demo
resources:
  - id: vpc
    type: network
  - id: subnet-a
    type: subnet
    properties: {network: "ref(vpc, id)", cidr_block: 10.0.1.0/24}
  - id: subnet-b
    type: subnet
    properties: {network: "ref(vpc, id)", cidr_block: 10.0.1.0/24}
"#,
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Conflict(_)));
    }
}
