//! Provider trait definition

use crate::error::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Outputs a provider returns for an applied resource, by output name.
pub type Outputs = HashMap<String, Value>;

/// Abstraction over the external system that actually owns resources.
///
/// The engine only ever talks to this trait; it carries no knowledge of what
/// a "network" or "database" is. Implementations are expected to be
/// idempotent per call and safe to invoke concurrently for independent
/// resources.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Provider name (e.g. "memory", "aws")
    fn name(&self) -> &str;

    /// Create a resource and return its outputs.
    async fn create(
        &self,
        resource_type: &str,
        id: &str,
        properties: &Map<String, Value>,
    ) -> Result<Outputs>;

    /// Update a mutable property of an existing resource.
    async fn update(
        &self,
        resource_type: &str,
        id: &str,
        properties: &Map<String, Value>,
    ) -> Result<Outputs>;

    /// Tear down and re-create a resource whose immutable property changed.
    async fn replace(
        &self,
        resource_type: &str,
        id: &str,
        properties: &Map<String, Value>,
    ) -> Result<Outputs>;

    /// Delete a resource.
    async fn delete(&self, resource_type: &str, id: &str) -> Result<()>;

    /// Look up an externally-sourced value (zone lists, image searches, ...).
    async fn lookup(&self, query: &str) -> Result<Value>;
}
