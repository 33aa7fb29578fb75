use crate::api::TargetReference;
use crate::field::{ErrorList, FieldError, FieldPath};

/// The target of a spread is fixed once created; only the version may move.
pub fn validate_target_ref_update(
    target: Option<&TargetReference>,
    old_target: Option<&TargetReference>,
    path: &FieldPath,
) -> ErrorList {
    match (target, old_target) {
        (Some(target), Some(old_target)) if target.identity() != old_target.identity() => vec![FieldError::invalid(
            &path.child("targetRef"),
            target,
            "change TargetReference is not permitted for WorkloadSpread",
        )],
        _ => ErrorList::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(api_version: &str, kind: &str, name: &str) -> TargetReference {
        TargetReference { api_version: api_version.into(), kind: kind.into(), name: name.into() }
    }

    #[test]
    fn rejects_identity_changes() {
        let old = target("apps/v1", "Deployment", "web");
        let path = FieldPath::new("spec");

        for new in [
            target("apps/v1", "Deployment", "web2"),
            target("apps/v1", "ReplicaSet", "web"),
            target("apps.kruise.io/v1alpha1", "Deployment", "web"),
        ] {
            let errs = validate_target_ref_update(Some(&new), Some(&old), &path);
            assert_eq!(errs.len(), 1, "{new:?}");
            assert_eq!(errs[0].field.to_string(), "spec.targetRef");
        }
    }

    #[test]
    fn allows_version_bumps_and_missing_refs() {
        let old = target("apps/v1beta2", "Deployment", "web");
        let new = target("apps/v1", "Deployment", "web");
        let path = FieldPath::new("spec");

        assert_eq!(validate_target_ref_update(Some(&new), Some(&old), &path), vec![]);
        assert_eq!(validate_target_ref_update(None, Some(&old), &path), vec![]);
        assert_eq!(validate_target_ref_update(Some(&new), None, &path), vec![]);
    }
}
