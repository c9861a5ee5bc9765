//! Memoized fact resolution
//!
//! Facts are values only the provider knows: zone lists, image lookups,
//! endpoint addresses. Each key is fetched at most once per run; concurrent
//! requesters await the same in-flight lookup. Failures are memoized too, so
//! a flaky lookup cannot half-succeed within a run.
//!
//! A fact that depends on another fact (an image lookup filtered by a zone,
//! say) is just ordinary async composition at the call site; nothing here
//! special-cases chains.

use crate::error::{EngineError, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use stratus_cloud::Provider;
use tokio::sync::OnceCell;
use tracing::debug;

type FactCell = Arc<OnceCell<std::result::Result<Value, String>>>;

pub struct FactResolver {
    provider: Arc<dyn Provider>,
    cache: Mutex<HashMap<String, FactCell>>,
}

impl FactResolver {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self {
            provider,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve a fact, fetching through the provider on first use.
    pub async fn resolve(&self, key: &str) -> Result<Value> {
        let cell = {
            let mut cache = self.cache.lock().expect("fact cache poisoned");
            cache
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        let outcome = cell
            .get_or_init(|| async {
                debug!(fact = %key, "resolving fact");
                self.provider.lookup(key).await.map_err(|e| e.to_string())
            })
            .await;

        outcome.clone().map_err(|message| EngineError::Resolution {
            key: key.to_string(),
            message,
        })
    }

    /// Resolve a fact expected to be a list of strings (e.g. a zone list).
    pub async fn resolve_string_list(&self, key: &str) -> Result<Vec<String>> {
        let value = self.resolve(key).await?;
        let items = value
            .as_array()
            .ok_or_else(|| EngineError::Resolution {
                key: key.to_string(),
                message: "expected an array of strings".to_string(),
            })?
            .iter()
            .map(|v| {
                v.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| EngineError::Resolution {
                        key: key.to_string(),
                        message: "expected an array of strings".to_string(),
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(items)
    }
}
