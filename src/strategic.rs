//! Strategic merge patch over pod templates.
//!
//! Lists that carry a merge key in the pod schema (containers by `name`,
//! ports by `containerPort`, ...) are merged element by element; every other
//! list is replaced. Subtrees that cannot hold such lists merge as plain
//! RFC 7386 merge patches.

use serde_json::{Map, Value};

const DIRECTIVE: &str = "$patch";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MergeError {
    #[error("patch must be a JSON object, got {0}")]
    NotAnObject(&'static str),
    #[error("unknown patch directive {directive} at {path:?}")]
    UnknownDirective { path: String, directive: String },
    #[error("element of list {path:?} must be an object")]
    ElementNotObject { path: String },
    #[error("element of list {path:?} does not contain merge key {key:?}")]
    MissingMergeKey { path: String, key: &'static str },
}

/// Applies `patch` to `original`, both pod templates in JSON form.
pub fn merge(original: &Value, patch: &Value) -> Result<Value, MergeError> {
    let Value::Object(patch) = patch else {
        return Err(MergeError::NotAnObject(type_name(patch)));
    };

    let target = original.as_object().cloned().unwrap_or_default();
    let merged = merge_object(target, patch, &mut Vec::new())?;
    Ok(Value::Object(merged.unwrap_or_default()))
}

/// Merge key of the list at `path`, if the list merges by key.
fn merge_key(path: &[&str]) -> Option<&'static str> {
    match path {
        ["metadata", "ownerReferences"] => Some("uid"),
        [
            "spec",
            "containers" | "initContainers" | "ephemeralContainers" | "volumes" | "imagePullSecrets"
            | "schedulingGates" | "resourceClaims",
        ] => Some("name"),
        ["spec", "hostAliases"] => Some("ip"),
        ["spec", "topologySpreadConstraints"] => Some("topologyKey"),
        ["spec", "containers" | "initContainers" | "ephemeralContainers", field] => match *field {
            "env" => Some("name"),
            "ports" => Some("containerPort"),
            "volumeMounts" => Some("mountPath"),
            "volumeDevices" => Some("devicePath"),
            _ => None,
        },
        _ => None,
    }
}

/// Whether an object at `path` may contain a keyed list somewhere below it.
fn has_keyed_lists(path: &[&str]) -> bool {
    matches!(
        path,
        [] | ["metadata"] | ["spec"] | ["spec", "containers" | "initContainers" | "ephemeralContainers"]
    )
}

/// Merges `patch` into `target`. `None` means the patch deleted the object.
fn merge_object<'p>(
    mut target: Map<String, Value>,
    patch: &'p Map<String, Value>,
    path: &mut Vec<&'p str>,
) -> Result<Option<Map<String, Value>>, MergeError> {
    match patch.get(DIRECTIVE) {
        None => {}
        Some(Value::String(directive)) if directive == "delete" => return Ok(None),
        Some(Value::String(directive)) if directive == "replace" => target.clear(),
        Some(other) => {
            return Err(MergeError::UnknownDirective { path: path.join("."), directive: other.to_string() })
        }
    }

    for (key, value) in patch {
        // `$retainKeys`, `$setElementOrder/..` and friends only steer ordering and pruning.
        if key.starts_with('$') {
            continue;
        }
        if value.is_null() {
            target.remove(key);
            continue;
        }

        path.push(key);
        let merged = merge_field(target.remove(key), value, path);
        path.pop();

        if let Some(merged) = merged? {
            target.insert(key.clone(), merged);
        }
    }

    Ok(Some(target))
}

fn merge_field<'p>(
    current: Option<Value>,
    patch: &'p Value,
    path: &mut Vec<&'p str>,
) -> Result<Option<Value>, MergeError> {
    match patch {
        Value::Object(_) if !has_keyed_lists(path) && !has_directives(patch) => {
            let mut doc = current.unwrap_or(Value::Null);
            json_patch::merge(&mut doc, patch);
            Ok(Some(doc))
        }
        Value::Object(fields) => {
            let target = match current {
                Some(Value::Object(target)) => target,
                _ => Map::new(),
            };
            Ok(merge_object(target, fields, path)?.map(Value::Object))
        }
        Value::Array(items) => match merge_key(path) {
            Some(key) => {
                let current = match current {
                    Some(Value::Array(list)) => list,
                    _ => Vec::new(),
                };
                Ok(Some(Value::Array(merge_list(current, items, key, path)?)))
            }
            None => Ok(Some(patch.clone())),
        },
        scalar => Ok(Some(scalar.clone())),
    }
}

fn merge_list<'p>(
    mut current: Vec<Value>,
    items: &'p [Value],
    key: &'static str,
    path: &mut Vec<&'p str>,
) -> Result<Vec<Value>, MergeError> {
    let replaces_list = |item: &Value| item.get(DIRECTIVE).and_then(Value::as_str) == Some("replace");
    if items.iter().any(|item| item.as_object().is_some_and(|o| o.len() == 1) && replaces_list(item)) {
        current.clear();
    }

    for item in items {
        let Value::Object(fields) = item else {
            return Err(MergeError::ElementNotObject { path: path.join(".") });
        };
        if fields.len() == 1 && replaces_list(item) {
            continue;
        }
        let Some(id) = fields.get(key) else {
            return Err(MergeError::MissingMergeKey { path: path.join("."), key });
        };

        match current.iter().position(|existing| existing.get(key) == Some(id)) {
            Some(pos) => {
                let existing = match current[pos].take() {
                    Value::Object(existing) => existing,
                    _ => Map::new(),
                };
                match merge_object(existing, fields, path)? {
                    Some(merged) => current[pos] = Value::Object(merged),
                    None => {
                        current.remove(pos);
                    }
                }
            }
            None => {
                if let Some(added) = merge_object(Map::new(), fields, path)? {
                    current.push(Value::Object(added));
                }
            }
        }
    }

    Ok(current)
}

fn has_directives(value: &Value) -> bool {
    match value {
        Value::Object(fields) => fields.iter().any(|(key, value)| key.starts_with('$') || has_directives(value)),
        Value::Array(items) => items.iter().any(has_directives),
        _ => false,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
