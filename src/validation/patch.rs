use k8s_openapi::api::core::v1::PodTemplateSpec;

use crate::field::{ErrorList, FieldError, FieldPath};
use crate::strategic;
use crate::structural::StructuralValidator;
use crate::workload::WorkloadTemplate;

/// Dry-runs a subset patch against the workload's pod template and validates
/// the pod that would result.
///
/// Merge and decode failures are reported once; nothing is validated past them.
pub fn simulate_patch(
    workload: &WorkloadTemplate,
    patch: &serde_json::Value,
    structural: &dyn StructuralValidator,
    path: &FieldPath,
) -> ErrorList {
    let raw_patch = patch.to_string();

    let original = match serde_json::to_value(workload.pod_template()) {
        Ok(original) => original,
        Err(err) => return vec![FieldError::internal(path, format!("failed to encode pod template: {err}"))],
    };

    let merged = match strategic::merge(&original, patch) {
        Ok(merged) => merged,
        Err(err) => return vec![FieldError::invalid(path, raw_patch, format!("failed to merge patch: {err}"))],
    };

    let pod: PodTemplateSpec = match serde_json::from_value(merged) {
        Ok(pod) => pod,
        Err(err) => return vec![FieldError::invalid(path, raw_patch, format!("failed to unmarshal: {err}"))],
    };

    structural.validate_pod_spec(
        &pod.spec.unwrap_or_default(),
        &pod.metadata.unwrap_or_default(),
        path,
    )
}
