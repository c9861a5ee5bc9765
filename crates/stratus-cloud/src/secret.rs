//! Secret store collaborators
//!
//! Credentials flow through the engine as inert `secret(name)` references.
//! Resolved values are handed to the provider and nowhere else: they are
//! never persisted, never hashed, never logged.

use crate::error::{CloudError, Result};
use std::collections::HashMap;

/// Resolves opaque credential references at apply time.
pub trait SecretStore: Send + Sync {
    fn resolve(&self, name: &str) -> Result<String>;
}

/// Reads secrets from `STRATUS_SECRET_<NAME>` environment variables.
///
/// The reference name is uppercased and `-`/`.` become `_`, so
/// `secret(db-password)` reads `STRATUS_SECRET_DB_PASSWORD`.
#[derive(Debug, Default)]
pub struct EnvSecretStore;

impl EnvSecretStore {
    pub fn new() -> Self {
        Self
    }

    fn var_name(name: &str) -> String {
        let suffix: String = name
            .chars()
            .map(|c| match c {
                '-' | '.' => '_',
                other => other.to_ascii_uppercase(),
            })
            .collect();
        format!("STRATUS_SECRET_{suffix}")
    }
}

impl SecretStore for EnvSecretStore {
    fn resolve(&self, name: &str) -> Result<String> {
        let var = Self::var_name(name);
        std::env::var(&var).map_err(|_| CloudError::SecretNotFound(name.to_string()))
    }
}

/// Fixed secret mapping for tests and demos.
#[derive(Debug, Default)]
pub struct StaticSecretStore {
    secrets: HashMap<String, String>,
}

impl StaticSecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets.insert(name.into(), value.into());
        self
    }
}

impl SecretStore for StaticSecretStore {
    fn resolve(&self, name: &str) -> Result<String> {
        self.secrets
            .get(name)
            .cloned()
            .ok_or_else(|| CloudError::SecretNotFound(name.to_string()))
    }
}
