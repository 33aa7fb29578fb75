use crate::api::WorkloadSpread;
use crate::field::{ErrorList, FieldError, FieldPath};

/// Rejects `candidate` if a sibling spread already targets the same workload.
///
/// Only the first collision is reported. The siblings come from a plain list
/// call, so two spreads created concurrently can both pass this check.
pub fn detect_conflict(candidate: &WorkloadSpread, siblings: &[WorkloadSpread], path: &FieldPath) -> ErrorList {
    let Some(target) = &candidate.spec.target_reference else {
        return ErrorList::new();
    };
    let identity = target.identity();

    let conflicting = siblings
        .iter()
        .filter(|other| other.metadata.name != candidate.metadata.name)
        .find(|other| other.spec.target_reference.as_ref().is_some_and(|other| other.identity() == identity));

    match conflicting {
        Some(other) => vec![FieldError::invalid(
            &path.child("targetRef"),
            target,
            format!(
                "ws.spec.targetRef is in conflict with other WorkloadSpread {}",
                other.metadata.name.as_deref().unwrap_or_default()
            ),
        )],
        None => ErrorList::new(),
    }
}
