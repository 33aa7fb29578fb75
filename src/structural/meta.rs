use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};

use super::names;
use crate::field::{ErrorList, FieldError, FieldPath};

const FIELD_IMMUTABLE: &str = "field is immutable";

pub fn validate_object_meta_update(new: &ObjectMeta, old: &ObjectMeta, path: &FieldPath) -> ErrorList {
    let mut errs = ErrorList::new();

    if new.name != old.name {
        errs.push(FieldError::invalid(&path.child("name"), &new.name, FIELD_IMMUTABLE));
    }
    if new.namespace != old.namespace {
        errs.push(FieldError::invalid(&path.child("namespace"), &new.namespace, FIELD_IMMUTABLE));
    }
    if new.uid != old.uid {
        errs.push(FieldError::invalid(&path.child("uid"), &new.uid, FIELD_IMMUTABLE));
    }
    if new.creation_timestamp != old.creation_timestamp {
        errs.push(FieldError::invalid(
            &path.child("creationTimestamp"),
            &new.creation_timestamp,
            FIELD_IMMUTABLE,
        ));
    }

    errs.extend(names::validate_labels(new.labels.as_ref(), &path.child("labels")));
    errs.extend(names::validate_annotations(new.annotations.as_ref(), &path.child("annotations")));
    errs
}

/// Checks that a label selector converts into a usable selector.
///
/// Returns the first problem found, phrased as the conversion error.
pub fn label_selector_error(selector: &LabelSelector) -> Option<String> {
    for (key, value) in selector.match_labels.iter().flatten() {
        if let Some(msg) = names::qualified_name(key).into_iter().next() {
            return Some(format!("invalid label key {key:?}: {msg}"));
        }
        if let Some(msg) = names::label_value(value).into_iter().next() {
            return Some(format!("invalid label value {value:?}: {msg}"));
        }
    }

    for expr in selector.match_expressions.iter().flatten() {
        let values = expr.values.as_deref().unwrap_or_default();
        match expr.operator.as_str() {
            "In" | "NotIn" if values.is_empty() => {
                return Some("for 'in', 'notin' operators, values set can't be empty".to_owned());
            }
            "Exists" | "DoesNotExist" if !values.is_empty() => {
                return Some("values set must be empty for exists and does not exist".to_owned());
            }
            "In" | "NotIn" | "Exists" | "DoesNotExist" => {}
            other => return Some(format!("{other:?} is not a valid label selector operator")),
        }

        if let Some(msg) = names::qualified_name(&expr.key).into_iter().next() {
            return Some(format!("invalid label key {:?}: {msg}", expr.key));
        }
        for value in values {
            if let Some(msg) = names::label_value(value).into_iter().next() {
                return Some(format!("invalid label value {value:?}: {msg}"));
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn meta(value: serde_json::Value) -> ObjectMeta { serde_json::from_value(value).unwrap() }

    #[test]
    fn identity_fields_are_immutable() {
        let old = meta(json!({"name": "ws", "namespace": "default", "uid": "1"}));
        let new = meta(json!({"name": "ws2", "namespace": "default", "uid": "2", "labels": {"app": "web"}}));
        let errs = validate_object_meta_update(&new, &old, &FieldPath::new("metadata"));
        let fields: Vec<_> = errs.iter().map(|e| e.field.to_string()).collect();
        assert_eq!(fields, ["metadata.name", "metadata.uid"]);
    }

    #[test]
    fn label_changes_are_allowed() {
        let old = meta(json!({"name": "ws", "labels": {"app": "web"}}));
        let new = meta(json!({"name": "ws", "labels": {"app": "api"}}));
        assert_eq!(validate_object_meta_update(&new, &old, &FieldPath::new("metadata")), vec![]);
    }

    #[test]
    fn selectors() {
        let ok: LabelSelector = serde_json::from_value(json!({
            "matchLabels": {"app": "web"},
            "matchExpressions": [{"key": "tier", "operator": "NotIn", "values": ["batch"]}],
        }))
        .unwrap();
        assert_eq!(label_selector_error(&ok), None);

        let empty_in: LabelSelector =
            serde_json::from_value(json!({"matchExpressions": [{"key": "tier", "operator": "In"}]})).unwrap();
        assert!(label_selector_error(&empty_in).unwrap().contains("can't be empty"));

        let bad_op: LabelSelector =
            serde_json::from_value(json!({"matchExpressions": [{"key": "tier", "operator": "Like"}]})).unwrap();
        assert!(label_selector_error(&bad_op).unwrap().contains("not a valid label selector operator"));

        let bad_value: LabelSelector = serde_json::from_value(json!({"matchLabels": {"app": "no spaces"}})).unwrap();
        assert!(label_selector_error(&bad_value).is_some());
    }
}
