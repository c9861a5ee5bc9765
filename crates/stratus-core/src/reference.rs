//! Reference syntax inside property values.
//!
//! Three symbolic forms are recognized when they make up an entire string
//! value:
//!
//! - `ref(nodeId, outputName)` — an output of another resource node
//! - `fact(key)` — an externally-sourced value looked up through the provider
//! - `secret(name)` — an opaque credential resolved at apply time
//!
//! Any other string containing `{{` is treated as a Tera template; node
//! outputs are addressed inside templates as `nodes.<id>.<output>`. Template
//! references create dependency edges exactly like `ref(...)` and are
//! validated at graph-build time, not at render time.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// A parsed symbolic reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    /// `ref(node, output)`
    Output { node: String, output: String },
    /// `fact(key)`
    Fact { key: String },
    /// `secret(name)` — the engine never inspects or logs the resolved value
    Secret { name: String },
}

impl std::fmt::Display for Reference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reference::Output { node, output } => write!(f, "ref({node}, {output})"),
            Reference::Fact { key } => write!(f, "fact({key})"),
            Reference::Secret { name } => write!(f, "secret({name})"),
        }
    }
}

fn ref_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^ref\(\s*([A-Za-z0-9_.-]+)\s*,\s*([A-Za-z0-9_.-]+)\s*\)$").unwrap()
    })
}

fn fact_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^fact\(\s*([A-Za-z0-9_.:/-]+)\s*\)$").unwrap())
}

fn secret_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^secret\(\s*([A-Za-z0-9_.-]+)\s*\)$").unwrap())
}

fn template_ref_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"nodes\.([A-Za-z0-9_-]+)\.([A-Za-z0-9_]+)").unwrap())
}

impl Reference {
    /// Parse a string value that is exactly one symbolic reference.
    pub fn parse(value: &str) -> Option<Reference> {
        if let Some(caps) = ref_re().captures(value) {
            return Some(Reference::Output {
                node: caps[1].to_string(),
                output: caps[2].to_string(),
            });
        }
        if let Some(caps) = fact_re().captures(value) {
            return Some(Reference::Fact {
                key: caps[1].to_string(),
            });
        }
        if let Some(caps) = secret_re().captures(value) {
            return Some(Reference::Secret {
                name: caps[1].to_string(),
            });
        }
        None
    }
}

/// Whether a string value is a late-bound template.
pub fn is_template(value: &str) -> bool {
    value.contains("{{")
}

/// Node/output pairs referenced by a template body.
pub fn template_refs(template: &str) -> Vec<(String, String)> {
    template_ref_re()
        .captures_iter(template)
        .map(|caps| (caps[1].to_string(), caps[2].to_string()))
        .collect()
}

/// Walk every string inside a property mapping and report each reference.
///
/// Template bodies report their `nodes.<id>.<output>` occurrences as
/// [`Reference::Output`] so graph construction sees one uniform edge source.
pub fn scan_properties(properties: &Map<String, Value>, f: &mut impl FnMut(Reference)) {
    for value in properties.values() {
        scan_value(value, f);
    }
}

fn scan_value(value: &Value, f: &mut impl FnMut(Reference)) {
    match value {
        Value::String(s) => {
            if let Some(reference) = Reference::parse(s) {
                f(reference);
            } else if is_template(s) {
                for (node, output) in template_refs(s) {
                    f(Reference::Output { node, output });
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                scan_value(item, f);
            }
        }
        Value::Object(map) => {
            for item in map.values() {
                scan_value(item, f);
            }
        }
        _ => {}
    }
}
