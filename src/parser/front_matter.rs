use std::collections::BTreeMap;

use serde_yaml::Value;
use tracing::{debug, warn};

/// Parsed front matter. Keys are stringified YAML keys.
pub type FrontMatter = BTreeMap<String, Value>;

/// Parse a YAML block into a mapping.
///
/// Never fails: syntax errors, non-mapping documents and tagged values
/// (`!foo`) all degrade to an empty mapping.
pub fn parse(yaml: &str) -> FrontMatter {
    if yaml.trim().is_empty() {
        return FrontMatter::new();
    }

    let value: Value = match serde_yaml::from_str(yaml) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "malformed front matter, using empty mapping");
            return FrontMatter::new();
        }
    };

    let mapping = match value {
        Value::Mapping(m) => m,
        Value::Null => return FrontMatter::new(),
        other => {
            debug!(kind = kind_name(&other), "front matter is not a mapping");
            return FrontMatter::new();
        }
    };

    let mut out = FrontMatter::new();
    for (key, value) in mapping {
        if contains_tag(&value) {
            warn!("tagged value in front matter, using empty mapping");
            return FrontMatter::new();
        }
        match key_to_string(&key) {
            Some(k) => {
                out.insert(k, value);
            }
            None => debug!(kind = kind_name(&key), "dropping non-scalar front matter key"),
        }
    }
    out
}

fn key_to_string(key: &Value) -> Option<String> {
    match key {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn contains_tag(value: &Value) -> bool {
    match value {
        Value::Tagged(_) => true,
        Value::Sequence(items) => items.iter().any(contains_tag),
        Value::Mapping(m) => m.iter().any(|(k, v)| contains_tag(k) || contains_tag(v)),
        _ => false,
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged",
    }
}

// ── Tests ──
