//! Deterministic in-memory provider
//!
//! Stands in for a real cloud during tests, demos and `--provider memory`
//! runs. Outputs are pure functions of the resource type and node id, so
//! repeated runs against fresh processes still reconcile to no-ops through
//! the persisted state.

use crate::error::{CloudError, Result};
use crate::provider::{Outputs, Provider};
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

#[derive(Debug, Clone)]
struct StoredResource {
    properties: Map<String, Value>,
    generation: u32,
}

/// In-memory [`Provider`] implementation.
#[derive(Debug, Default)]
pub struct MemoryProvider {
    resources: Mutex<HashMap<String, StoredResource>>,
    lookups: Mutex<HashMap<String, Value>>,
    lookup_calls: Mutex<HashMap<String, usize>>,
    fail_on: Mutex<HashSet<String>>,
    apply_calls: Mutex<Vec<String>>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider seeded with a four-zone region, enough to exercise the
    /// default topology policy from the CLI.
    pub fn with_defaults() -> Self {
        let provider = Self::new();
        provider.put_lookup(
            "availability_zones",
            json!(["zone-a", "zone-b", "zone-c", "zone-d"]),
        );
        provider
    }

    /// Register a canned answer for a lookup query.
    pub fn put_lookup(&self, query: impl Into<String>, value: Value) {
        self.lookups
            .lock()
            .expect("lookups poisoned")
            .insert(query.into(), value);
    }

    /// Make every apply call for `type:id` fail, for failure-isolation tests.
    pub fn fail_on(&self, resource_type: &str, id: &str) {
        self.fail_on
            .lock()
            .expect("fail_on poisoned")
            .insert(key(resource_type, id));
    }

    /// How many times a lookup query hit the provider (memoization tests).
    pub fn lookup_count(&self, query: &str) -> usize {
        self.lookup_calls
            .lock()
            .expect("lookup_calls poisoned")
            .get(query)
            .copied()
            .unwrap_or(0)
    }

    /// Every create/update/replace/delete call, in arrival order.
    pub fn apply_calls(&self) -> Vec<String> {
        self.apply_calls.lock().expect("apply_calls poisoned").clone()
    }

    pub fn has_resource(&self, resource_type: &str, id: &str) -> bool {
        self.resources
            .lock()
            .expect("resources poisoned")
            .contains_key(&key(resource_type, id))
    }

    fn check_failure(&self, resource_type: &str, id: &str) -> Result<()> {
        if self
            .fail_on
            .lock()
            .expect("fail_on poisoned")
            .contains(&key(resource_type, id))
        {
            return Err(CloudError::Provider(format!(
                "injected failure for {}:{}",
                resource_type, id
            )));
        }
        Ok(())
    }

    fn record_call(&self, op: &str, resource_type: &str, id: &str) {
        self.apply_calls
            .lock()
            .expect("apply_calls poisoned")
            .push(format!("{op} {}", key(resource_type, id)));
    }

    fn outputs_for(resource_type: &str, id: &str, generation: u32) -> Outputs {
        let mut outputs = Outputs::new();
        outputs.insert("id".into(), json!(format!("mem-{resource_type}-{id}")));
        outputs.insert(
            "endpoint".into(),
            json!(format!("{id}.{resource_type}.stratus.internal")),
        );
        outputs.insert("generation".into(), json!(generation));
        outputs
    }
}

fn key(resource_type: &str, id: &str) -> String {
    format!("{resource_type}:{id}")
}

#[async_trait]
impl Provider for MemoryProvider {
    fn name(&self) -> &str {
        "memory"
    }

    async fn create(
        &self,
        resource_type: &str,
        id: &str,
        properties: &Map<String, Value>,
    ) -> Result<Outputs> {
        self.check_failure(resource_type, id)?;
        self.record_call("create", resource_type, id);

        let mut resources = self.resources.lock().expect("resources poisoned");
        if resources.contains_key(&key(resource_type, id)) {
            return Err(CloudError::ResourceAlreadyExists(key(resource_type, id)));
        }
        resources.insert(
            key(resource_type, id),
            StoredResource {
                properties: properties.clone(),
                generation: 1,
            },
        );
        Ok(Self::outputs_for(resource_type, id, 1))
    }

    async fn update(
        &self,
        resource_type: &str,
        id: &str,
        properties: &Map<String, Value>,
    ) -> Result<Outputs> {
        self.check_failure(resource_type, id)?;
        self.record_call("update", resource_type, id);

        let mut resources = self.resources.lock().expect("resources poisoned");
        let stored = resources
            .get_mut(&key(resource_type, id))
            .ok_or_else(|| CloudError::ResourceNotFound(key(resource_type, id)))?;
        stored.properties = properties.clone();
        Ok(Self::outputs_for(resource_type, id, stored.generation))
    }

    async fn replace(
        &self,
        resource_type: &str,
        id: &str,
        properties: &Map<String, Value>,
    ) -> Result<Outputs> {
        self.check_failure(resource_type, id)?;
        self.record_call("replace", resource_type, id);

        let mut resources = self.resources.lock().expect("resources poisoned");
        let generation = resources
            .get(&key(resource_type, id))
            .map(|s| s.generation + 1)
            .unwrap_or(1);
        resources.insert(
            key(resource_type, id),
            StoredResource {
                properties: properties.clone(),
                generation,
            },
        );
        Ok(Self::outputs_for(resource_type, id, generation))
    }

    async fn delete(&self, resource_type: &str, id: &str) -> Result<()> {
        self.check_failure(resource_type, id)?;
        self.record_call("delete", resource_type, id);

        self.resources
            .lock()
            .expect("resources poisoned")
            .remove(&key(resource_type, id))
            .ok_or_else(|| CloudError::ResourceNotFound(key(resource_type, id)))?;
        Ok(())
    }

    async fn lookup(&self, query: &str) -> Result<Value> {
        *self
            .lookup_calls
            .lock()
            .expect("lookup_calls poisoned")
            .entry(query.to_string())
            .or_insert(0) += 1;

        self.lookups
            .lock()
            .expect("lookups poisoned")
            .get(query)
            .cloned()
            .ok_or_else(|| CloudError::LookupFailed(format!("no answer for query '{query}'")))
    }
}
