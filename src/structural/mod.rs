//! Structural checks on core Kubernetes types.
//!
//! The spread validator only consumes these through [`StructuralValidator`].
//! [`CoreValidator`] covers the rules of the API server's core validation that
//! pods created from a spread commonly run into.

use k8s_openapi::api::core::v1::{NodeSelectorTerm, PodSpec, PreferredSchedulingTerm, Toleration};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use crate::field::{ErrorList, FieldPath};

pub mod meta;
pub mod names;
pub mod pod;
pub mod scheduling;

pub trait StructuralValidator: Send + Sync {
    fn validate_node_selector_term(&self, term: &NodeSelectorTerm, path: &FieldPath) -> ErrorList;

    fn validate_preferred_scheduling_terms(
        &self,
        terms: &[PreferredSchedulingTerm],
        path: &FieldPath,
    ) -> ErrorList;

    fn validate_tolerations(&self, tolerations: &[Toleration], path: &FieldPath) -> ErrorList;

    /// Validates a pod spec. `meta` is the metadata of its template, for
    /// validators whose rules depend on it.
    fn validate_pod_spec(&self, spec: &PodSpec, meta: &ObjectMeta, path: &FieldPath) -> ErrorList;

    fn validate_object_meta_update(&self, new: &ObjectMeta, old: &ObjectMeta, path: &FieldPath) -> ErrorList;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CoreValidator;

impl StructuralValidator for CoreValidator {
    fn validate_node_selector_term(&self, term: &NodeSelectorTerm, path: &FieldPath) -> ErrorList {
        scheduling::validate_node_selector_term(term, path)
    }

    fn validate_preferred_scheduling_terms(
        &self,
        terms: &[PreferredSchedulingTerm],
        path: &FieldPath,
    ) -> ErrorList {
        scheduling::validate_preferred_scheduling_terms(terms, path)
    }

    fn validate_tolerations(&self, tolerations: &[Toleration], path: &FieldPath) -> ErrorList {
        scheduling::validate_tolerations(tolerations, path)
    }

    fn validate_pod_spec(&self, spec: &PodSpec, _meta: &ObjectMeta, path: &FieldPath) -> ErrorList {
        pod::validate_pod_spec(spec, path)
    }

    fn validate_object_meta_update(&self, new: &ObjectMeta, old: &ObjectMeta, path: &FieldPath) -> ErrorList {
        meta::validate_object_meta_update(new, old, path)
    }
}
