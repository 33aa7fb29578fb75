use k8s_openapi::api::core::v1::{
    NodeSelectorRequirement, NodeSelectorTerm, PreferredSchedulingTerm, Toleration,
};

use super::names;
use crate::field::{ErrorList, FieldError, FieldPath};

const NODE_FIELD_SELECTOR_KEYS: &[&str] = &["metadata.name"];
const TAINT_EFFECTS: &[&str] = &["NoSchedule", "PreferNoSchedule", "NoExecute"];

pub fn validate_node_selector_term(term: &NodeSelectorTerm, path: &FieldPath) -> ErrorList {
    let mut errs = ErrorList::new();

    for (j, req) in term.match_expressions.iter().flatten().enumerate() {
        errs.extend(validate_node_selector_requirement(req, &path.child("matchExpressions").index(j)));
    }

    for (j, req) in term.match_fields.iter().flatten().enumerate() {
        errs.extend(validate_node_field_selector_requirement(req, &path.child("matchFields").index(j)));
    }

    errs
}

fn validate_node_selector_requirement(req: &NodeSelectorRequirement, path: &FieldPath) -> ErrorList {
    let mut errs = ErrorList::new();
    let values = req.values.as_deref().unwrap_or_default();

    match req.operator.as_str() {
        "In" | "NotIn" => {
            if values.is_empty() {
                errs.push(FieldError::required(
                    &path.child("values"),
                    "must be specified when `operator` is 'In' or 'NotIn'",
                ));
            }
        }
        "Exists" | "DoesNotExist" => {
            if !values.is_empty() {
                errs.push(FieldError::invalid(
                    &path.child("values"),
                    values,
                    "may not be specified when `operator` is 'Exists' or 'DoesNotExist'",
                ));
            }
        }
        "Gt" | "Lt" => match values {
            [value] => {
                if value.parse::<i64>().is_err() {
                    errs.push(FieldError::invalid(
                        &path.child("values").index(0),
                        value,
                        "must be an integer when `operator` is 'Lt' or 'Gt'",
                    ));
                }
            }
            _ => errs.push(FieldError::required(
                &path.child("values"),
                "must be specified single value when `operator` is 'Lt' or 'Gt'",
            )),
        },
        other => errs.push(unsupported(
            &path.child("operator"),
            other,
            &["DoesNotExist", "Exists", "Gt", "In", "Lt", "NotIn"],
        )),
    }

    errs.extend(names::check(&path.child("key"), &req.key, names::qualified_name(&req.key)));
    errs
}

fn validate_node_field_selector_requirement(req: &NodeSelectorRequirement, path: &FieldPath) -> ErrorList {
    let mut errs = ErrorList::new();

    match req.operator.as_str() {
        "In" | "NotIn" => {
            if req.values.as_ref().map_or(0, Vec::len) != 1 {
                errs.push(FieldError::required(
                    &path.child("values"),
                    "must be only one value when `operator` is 'In' or 'NotIn' for node field selector",
                ));
            }
        }
        other => errs.push(unsupported(&path.child("operator"), other, &["In", "NotIn"])),
    }

    if !NODE_FIELD_SELECTOR_KEYS.contains(&req.key.as_str()) {
        errs.push(FieldError::invalid(&path.child("key"), &req.key, "not a valid field selector key"));
    }

    errs
}

pub fn validate_preferred_scheduling_terms(terms: &[PreferredSchedulingTerm], path: &FieldPath) -> ErrorList {
    let mut errs = ErrorList::new();
    for (i, term) in terms.iter().enumerate() {
        let path = path.index(i);
        if !(1..=100).contains(&term.weight) {
            errs.push(FieldError::invalid(&path.child("weight"), term.weight, "must be in the range 1-100"));
        }
        errs.extend(validate_node_selector_term(&term.preference, &path.child("preference")));
    }
    errs
}

pub fn validate_tolerations(tolerations: &[Toleration], path: &FieldPath) -> ErrorList {
    let mut errs = ErrorList::new();

    for (i, toleration) in tolerations.iter().enumerate() {
        let path = path.index(i);
        let key = toleration.key.as_deref().unwrap_or_default();
        let operator = toleration.operator.as_deref().unwrap_or_default();
        let value = toleration.value.as_deref().unwrap_or_default();
        let effect = toleration.effect.as_deref().unwrap_or_default();

        if !key.is_empty() {
            errs.extend(names::check(&path.child("key"), key, names::qualified_name(key)));
        }

        if key.is_empty() && operator != "Exists" {
            errs.push(FieldError::invalid(
                &path.child("operator"),
                operator,
                "operator must be Exists when `key` is empty, which means \"match all values and all keys\"",
            ));
        }

        if toleration.toleration_seconds.is_some() && effect != "NoExecute" {
            errs.push(FieldError::invalid(
                &path.child("effect"),
                effect,
                "effect must be 'NoExecute' when `tolerationSeconds` is set",
            ));
        }

        match operator {
            "Equal" | "" => {
                let problems = names::label_value(value);
                if !problems.is_empty() {
                    errs.push(FieldError::invalid(&path.child("operator"), value, problems.join(";")));
                }
            }
            "Exists" => {
                if !value.is_empty() {
                    errs.push(FieldError::invalid(
                        &path.child("operator"),
                        toleration,
                        "value must be empty when `operator` is 'Exists'",
                    ));
                }
            }
            other => errs.push(unsupported(&path.child("operator"), other, &["Equal", "Exists"])),
        }

        if !effect.is_empty() && !TAINT_EFFECTS.contains(&effect) {
            errs.push(unsupported(&path.child("effect"), effect, TAINT_EFFECTS));
        }
    }

    errs
}

pub(super) fn unsupported(path: &FieldPath, value: &str, supported: &[&str]) -> FieldError {
    let quoted: Vec<_> = supported.iter().map(|v| format!("\"{v}\"")).collect();
    FieldError::invalid(path, value, format!("supported values: {}", quoted.join(", ")))
}
