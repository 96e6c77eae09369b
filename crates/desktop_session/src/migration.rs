//! In-place upgrades of raw session documents to the current schema.
//!
//! Migration works on the untyped JSON document so a single malformed window record never
//! prevents the rest of the document from loading.

use platform_host::rewrite_path_prefix;
use serde_json::{json, Map, Value};

use crate::{
    config::{LegacyPathRule, SessionConfig},
    error::SnapshotError,
    model::{WindowKind, SESSION_SCHEMA_VERSION},
};

/// Reads the schema version of a raw document.
///
/// # Errors
///
/// Returns [`SnapshotError::Corrupt`] for non-object documents or a missing/zero version, and
/// [`SnapshotError::UnsupportedVersion`] for versions newer than this build understands.
pub fn document_version(doc: &Value) -> Result<u32, SnapshotError> {
    let object = doc
        .as_object()
        .ok_or_else(|| SnapshotError::Corrupt("document is not an object".to_string()))?;
    let version = object
        .get("version")
        .or_else(|| object.get("schemaVersion"))
        .and_then(Value::as_u64)
        .ok_or_else(|| SnapshotError::Corrupt("missing schema version".to_string()))?;
    let version = u32::try_from(version).map_err(|_| SnapshotError::UnsupportedVersion(u32::MAX))?;
    match version {
        0 => Err(SnapshotError::Corrupt("schema version 0".to_string())),
        v if v > SESSION_SCHEMA_VERSION => Err(SnapshotError::UnsupportedVersion(v)),
        v => Ok(v),
    }
}

/// Upgrades `doc` to [`SESSION_SCHEMA_VERSION`] and returns the version it was written with.
///
/// # Errors
///
/// Propagates [`document_version`] failures.
pub fn migrate_document(doc: &mut Value, config: &SessionConfig) -> Result<u32, SnapshotError> {
    let from_version = document_version(doc)?;
    let Some(object) = doc.as_object_mut() else {
        return Err(SnapshotError::Corrupt("document is not an object".to_string()));
    };
    object.remove("schemaVersion");
    object.insert("version".to_string(), json!(SESSION_SCHEMA_VERSION));

    if let Some(Value::Array(windows)) = object.get_mut("windows") {
        for window in windows.iter_mut().filter_map(Value::as_object_mut) {
            if from_version < 2 {
                upgrade_v1_window(window);
            }
            canonicalize_kind(window);
            if from_version < SESSION_SCHEMA_VERSION {
                rewrite_instance_paths(window, &config.legacy_path_rules, &config.path_state_keys);
            }
        }
    }
    Ok(from_version)
}

/// v1 windows carried one `state` and no instance list.
fn upgrade_v1_window(window: &mut Map<String, Value>) {
    if window.contains_key("instances") {
        return;
    }
    let state = window.remove("state").unwrap_or(Value::Null);
    window.insert(
        "instances".to_string(),
        json!([{ "instanceId": 1, "state": state }]),
    );
    window.insert("activeInstanceId".to_string(), json!(1));
    if let Some(kind) = window.remove("appId") {
        window.entry("type").or_insert(kind);
    }
}

/// Rewrites legacy type tokens to the current token; unknown tokens are left for the restore
/// step to report.
fn canonicalize_kind(window: &mut Map<String, Value>) {
    let Some(Value::String(token)) = window.get_mut("type") else {
        return;
    };
    if let Some(kind) = WindowKind::from_token(token) {
        *token = kind.token().to_string();
    }
}

fn rewrite_instance_paths(
    window: &mut Map<String, Value>,
    rules: &[LegacyPathRule],
    path_keys: &[String],
) {
    if rules.is_empty() {
        return;
    }
    let Some(Value::Array(instances)) = window.get_mut("instances") else {
        return;
    };
    for state in instances
        .iter_mut()
        .filter_map(|instance| instance.get_mut("state"))
        .filter_map(Value::as_object_mut)
    {
        for key in path_keys {
            if let Some(Value::String(path)) = state.get_mut(key) {
                let rewritten = rules
                    .iter()
                    .find_map(|rule| rewrite_path_prefix(path.as_str(), &rule.from, &rule.to));
                if let Some(rewritten) = rewritten {
                    *path = rewritten;
                }
            }
        }
    }
}
