//! Desired-versus-applied reconciliation
//!
//! Decides the minimal action for one node by hashing its fully-resolved
//! desired spec and comparing against the last applied record. Secrets stay
//! symbolic in the hashed form, so credentials neither influence nor leak
//! through persisted hashes.

use serde_json::{Map, Value, json};
use stratus_cloud::{ActionKind, ResourceRecord};

/// Content hash of a resolved spec.
///
/// `serde_json`'s map type keeps keys sorted, so serializing is already
/// canonical.
pub fn spec_hash(resource_type: &str, properties: &Map<String, Value>) -> String {
    let canonical = json!({
        "type": resource_type,
        "properties": properties,
    });
    blake3::hash(canonical.to_string().as_bytes())
        .to_hex()
        .to_string()
}

/// Decide the action moving applied state toward `resolved`.
///
/// Returns the action plus a human-readable reason for anything that is not
/// a no-op.
pub fn decide(
    immutable: &[String],
    resolved: &Map<String, Value>,
    hash: &str,
    prior: Option<&ResourceRecord>,
) -> (ActionKind, Option<String>) {
    let Some(prior) = prior else {
        return (ActionKind::Create, Some("no prior state".to_string()));
    };

    if prior.spec_hash == hash {
        return (ActionKind::NoOp, None);
    }

    for property in immutable {
        if resolved.get(property) != prior.properties.get(property) {
            return (
                ActionKind::Replace,
                Some(format!("immutable property '{property}' changed")),
            );
        }
    }

    let reason = first_changed_property(resolved, &prior.properties)
        .map(|p| format!("property '{p}' changed"));
    (ActionKind::Update, reason)
}

fn first_changed_property(
    desired: &Map<String, Value>,
    prior: &Map<String, Value>,
) -> Option<String> {
    let mut keys: Vec<&String> = desired.keys().chain(prior.keys()).collect();
    keys.sort();
    keys.dedup();
    keys.into_iter()
        .find(|k| desired.get(k.as_str()) != prior.get(k.as_str()))
        .cloned()
}
