//! Specification loading from JSON and YAML files.

use crate::error::{CoreError, Result};
use crate::model::Specification;
use std::path::Path;
use tracing::debug;

/// Load and structurally validate a specification file.
///
/// The format is chosen by extension: `.json`, `.yaml` or `.yml`.
pub fn load_spec(path: &Path) -> Result<Specification> {
    let content = std::fs::read_to_string(path)?;
    let spec = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => spec_from_json(&content)?,
        Some("yaml") | Some("yml") => spec_from_yaml(&content)?,
        _ => return Err(CoreError::UnsupportedFormat(path.to_path_buf())),
    };
    debug!(
        name = %spec.name,
        resources = spec.resources.len(),
        "loaded specification"
    );
    Ok(spec)
}

pub fn spec_from_json(content: &str) -> Result<Specification> {
    let spec: Specification = serde_json::from_str(content)?;
    spec.validate()?;
    Ok(spec)
}

pub fn spec_from_yaml(content: &str) -> Result<Specification> {
    let spec: Specification = serde_yaml::from_str(content)?;
    spec.validate()?;
    Ok(spec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const JSON_SPEC: &str = r#"{
        "name": "demo",
        "resources": [
            {"id": "vpc", "type": "network", "properties": {"cidr_block": "10.0.0.0/16"}},
            {"id": "igw", "type": "gateway", "properties": {"network": "ref(vpc, id)"}}
        ]
    }"#;

    const YAML_SPEC: &str = r#"
name: demo
resources:
  - id: vpc
    type: network
    properties:
      cidr_block: 10.0.0.0/16
    immutable: [cidr_block]
topology:
  requested: 3
  network: vpc
"#;

    #[test]
    fn loads_json_spec() {
        let spec = spec_from_json(JSON_SPEC).unwrap();
        assert_eq!(spec.name, "demo");
        assert_eq!(spec.resources.len(), 2);
        assert_eq!(spec.resources[1].resource_type, "gateway");
    }

    #[test]
    fn loads_yaml_spec() {
        let spec = spec_from_yaml(YAML_SPEC).unwrap();
        assert_eq!(spec.resources[0].immutable, vec!["cidr_block"]);
        assert_eq!(spec.topology.as_ref().unwrap().cap, 3);
    }

    #[test]
    fn rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spec.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(b"name = 'x'").unwrap();
        assert!(matches!(
            load_spec(&path),
            Err(CoreError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spec.json");
        std::fs::write(&path, JSON_SPEC).unwrap();
        let spec = load_spec(&path).unwrap();
        assert_eq!(spec.resources.len(), 2);
    }
}
