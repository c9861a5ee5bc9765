//! Deterministic zone allocation
//!
//! Given a resolved zone list and the declared policy, computes the
//! effective count `N = min(requested, zones, cap)` and carves one public
//! and one private address block per index out of the parent block. Private
//! blocks sit a fixed index offset above the public ones, so the two ranges
//! cannot overlap by construction. The first N zones are used, in provider
//! order; re-running with the same inputs yields byte-identical assignments.

use crate::error::{EngineError, Result};
use serde_json::json;
use std::net::Ipv4Addr;
use stratus_core::{ResourceSpec, Specification, TopologyPolicy, Visibility};
use tracing::debug;

/// One zone's share of the parent network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneAllocation {
    pub index: u32,
    pub zone: String,
    pub public_block: String,
    pub private_block: String,
}

/// Compute allocations for a zone list under a policy.
pub fn allocate(zones: &[String], policy: &TopologyPolicy) -> Result<Vec<ZoneAllocation>> {
    let count = policy
        .requested
        .min(zones.len() as u32)
        .min(policy.cap);

    let (base, prefix) = parse_cidr(&policy.base_block)?;
    if policy.block_bits <= prefix || policy.block_bits > 30 {
        return Err(EngineError::Conflict(format!(
            "block_bits /{} must be longer than the parent prefix /{prefix} and at most /30",
            policy.block_bits
        )));
    }

    let block_size: u32 = 1 << (32 - policy.block_bits);
    let parent_size: u64 = 1u64 << (32 - prefix);
    let highest_index = policy.private_offset as u64 + count.saturating_sub(1) as u64;
    if count > 0 && (highest_index + 1) * block_size as u64 > parent_size {
        return Err(EngineError::Conflict(format!(
            "private offset {} with {} blocks of /{} overflows parent block {}",
            policy.private_offset, count, policy.block_bits, policy.base_block
        )));
    }
    if policy.private_offset < count {
        return Err(EngineError::Conflict(format!(
            "private offset {} overlaps the {} public blocks",
            policy.private_offset, count
        )));
    }

    let allocations = zones
        .iter()
        .take(count as usize)
        .enumerate()
        .map(|(i, zone)| {
            let index = i as u32;
            ZoneAllocation {
                index,
                zone: zone.clone(),
                public_block: format_block(base, index, block_size, policy.block_bits),
                private_block: format_block(
                    base,
                    index + policy.private_offset,
                    block_size,
                    policy.block_bits,
                ),
            }
        })
        .collect::<Vec<_>>();

    debug!(
        zones = zones.len(),
        requested = policy.requested,
        cap = policy.cap,
        effective = allocations.len(),
        "computed zone allocations"
    );
    Ok(allocations)
}

/// Rewrite per-zone resource groups into one concrete node per allocation.
///
/// A group `{id: "public-subnet", per_zone: public}` becomes nodes
/// `public-subnet-0 .. public-subnet-{N-1}` with `zone` and `cidr_block`
/// properties injected; the group id itself never reaches the graph.
pub fn expand(spec: &Specification, zones: &[String]) -> Result<Specification> {
    let Some(policy) = &spec.topology else {
        return Ok(spec.clone());
    };
    let allocations = allocate(zones, policy)?;

    let mut resources = Vec::with_capacity(spec.resources.len());
    for resource in &spec.resources {
        match resource.per_zone {
            None => resources.push(resource.clone()),
            Some(visibility) => {
                for allocation in &allocations {
                    resources.push(instantiate(resource, visibility, allocation));
                }
            }
        }
    }

    Ok(Specification {
        name: spec.name.clone(),
        resources,
        topology: spec.topology.clone(),
    })
}

fn instantiate(
    group: &ResourceSpec,
    visibility: Visibility,
    allocation: &ZoneAllocation,
) -> ResourceSpec {
    let block = match visibility {
        Visibility::Public => &allocation.public_block,
        Visibility::Private => &allocation.private_block,
    };

    let mut node = ResourceSpec::new(
        format!("{}-{}", group.id, allocation.index),
        group.resource_type.clone(),
    );
    node.properties = group.properties.clone();
    node.properties.insert("zone".into(), json!(allocation.zone));
    node.properties.insert("cidr_block".into(), json!(block));
    node.immutable = group.immutable.clone();
    node
}

fn format_block(base: u32, index: u32, block_size: u32, bits: u8) -> String {
    let addr = Ipv4Addr::from(base + index * block_size);
    format!("{addr}/{bits}")
}

fn parse_cidr(cidr: &str) -> Result<(u32, u8)> {
    let err = || EngineError::Conflict(format!("invalid CIDR block '{cidr}'"));
    let (addr, prefix) = cidr.split_once('/').ok_or_else(err)?;
    let addr: Ipv4Addr = addr.parse().map_err(|_| err())?;
    let prefix: u8 = prefix.parse().map_err(|_| err())?;
    if prefix > 32 {
        return Err(err());
    }
    // Mask off host bits so carving always starts at the block boundary;
    // an unaligned base would otherwise shift every carved block and can
    // overflow the address arithmetic near the top of the range.
    let mask = if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - prefix)
    };
    Ok((u32::from(addr) & mask, prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zones(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn policy() -> TopologyPolicy {
        serde_json::from_value(json!({"requested": 3, "network": "vpc"})).unwrap()
    }

    #[test]
    fn four_zones_requested_three_cap_three() {
        let zones = zones(&["z1", "z2", "z3", "z4"]);
        let allocations = allocate(&zones, &policy()).unwrap();

        assert_eq!(allocations.len(), 3);
        assert_eq!(allocations[0].public_block, "10.0.0.0/24");
        assert_eq!(allocations[0].private_block, "10.0.100.0/24");
        assert_eq!(allocations[2].public_block, "10.0.2.0/24");
        assert_eq!(allocations[2].private_block, "10.0.102.0/24");
        // z4 is never used
        assert!(allocations.iter().all(|a| a.zone != "z4"));
    }

    #[test]
    fn effective_count_is_min_of_requested_zones_cap() {
        let mut p = policy();
        p.requested = 5;
        assert_eq!(allocate(&zones(&["z1", "z2"]), &p).unwrap().len(), 2);

        p.requested = 1;
        assert_eq!(allocate(&zones(&["z1", "z2", "z3"]), &p).unwrap().len(), 1);

        p.requested = 10;
        p.cap = 3;
        assert_eq!(
            allocate(&zones(&["z1", "z2", "z3", "z4", "z5"]), &p)
                .unwrap()
                .len(),
            3
        );
    }

    #[test]
    fn allocation_is_deterministic() {
        let zones = zones(&["z1", "z2", "z3", "z4"]);
        let a = allocate(&zones, &policy()).unwrap();
        let b = allocate(&zones, &policy()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn blocks_never_overlap() {
        let zones = zones(&["z1", "z2", "z3"]);
        let allocations = allocate(&zones, &policy()).unwrap();

        let mut blocks: Vec<&str> = allocations
            .iter()
            .flat_map(|a| [a.public_block.as_str(), a.private_block.as_str()])
            .collect();
        blocks.sort();
        blocks.dedup();
        assert_eq!(blocks.len(), allocations.len() * 2);
    }

    #[test]
    fn offset_overlap_rejected() {
        let mut p = policy();
        p.private_offset = 2;
        assert!(matches!(
            allocate(&zones(&["z1", "z2", "z3"]), &p),
            Err(EngineError::Conflict(_))
        ));
    }

    #[test]
    fn unaligned_base_is_masked_to_prefix() {
        let mut p = policy();
        p.base_block = "10.0.0.77/16".into();
        let allocations = allocate(&zones(&["z1"]), &p).unwrap();
        assert_eq!(allocations[0].public_block, "10.0.0.0/24");

        // An unaligned base at the top of the range must not overflow
        p.base_block = "255.255.255.200/24".into();
        p.block_bits = 26;
        p.private_offset = 2;
        p.requested = 1;
        let allocations = allocate(&zones(&["z1"]), &p).unwrap();
        assert_eq!(allocations[0].public_block, "255.255.255.0/26");
        assert_eq!(allocations[0].private_block, "255.255.255.128/26");
    }

    #[test]
    fn offset_overflow_rejected() {
        let mut p = policy();
        p.base_block = "10.0.0.0/24".into();
        p.block_bits = 26;
        assert!(matches!(
            allocate(&zones(&["z1"]), &p),
            Err(EngineError::Conflict(_))
        ));
    }

    #[test]
    fn expand_instantiates_per_zone_groups() {
        let yaml = r#"
name: demo
resources:
  - id: vpc
    type: network
    properties: {cidr_block: 10.0.0.0/16}
  - id: public-subnet
    type: subnet
    properties: {network: "ref(vpc, id)"}
    per_zone: public
  - id: private-subnet
    type: subnet
    properties: {network: "ref(vpc, id)"}
    per_zone: private
topology:
  requested: 3
  network: vpc
"#;
        let spec = stratus_core::spec_from_yaml(yaml).unwrap();
        let zones = zones(&["z1", "z2", "z3", "z4"]);
        let expanded = expand(&spec, &zones).unwrap();

        // 1 network + 3 public + 3 private
        assert_eq!(expanded.resources.len(), 7);
        let public0 = expanded.resource("public-subnet-0").unwrap();
        assert_eq!(public0.properties["cidr_block"], json!("10.0.0.0/24"));
        assert_eq!(public0.properties["zone"], json!("z1"));
        assert_eq!(public0.properties["network"], json!("ref(vpc, id)"));
        let private2 = expanded.resource("private-subnet-2").unwrap();
        assert_eq!(private2.properties["cidr_block"], json!("10.0.102.0/24"));
        assert!(expanded.resource("public-subnet").is_none());
    }

    #[test]
    fn expand_without_topology_is_identity() {
        let yaml = "name: demo\nresources:\n  - id: vpc\n    type: network\n";
        let spec = stratus_core::spec_from_yaml(yaml).unwrap();
        let expanded = expand(&spec, &[]).unwrap();
        assert_eq!(expanded.resources.len(), 1);
    }
}
