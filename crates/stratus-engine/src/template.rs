//! Late-bound payload rendering
//!
//! Templates (bootstrap scripts, config payloads) render against the
//! outputs of already-applied nodes, addressed as `nodes.<id>.<output>`.
//! The executor only calls this once every referenced producer is applied;
//! the scheduling edge, not a runtime check, is what makes early rendering
//! unobservable. Missing outputs still fail loudly here rather than render
//! an empty string.

use crate::error::{EngineError, Result};
use std::collections::BTreeMap;
use stratus_cloud::Outputs;
use stratus_core::reference;
use tera::{Context, Tera};

/// Render one template body against applied node outputs.
pub fn render(template: &str, nodes: &BTreeMap<String, Outputs>) -> Result<String> {
    for (node, output) in reference::template_refs(template) {
        let available = nodes
            .get(&node)
            .map(|outputs| outputs.contains_key(&output))
            .unwrap_or(false);
        if !available {
            return Err(EngineError::Reference { node, output });
        }
    }

    let mut context = Context::new();
    context.insert("nodes", nodes);
    Tera::one_off(template, &context, false).map_err(|e| EngineError::Template(e.to_string()))
}
