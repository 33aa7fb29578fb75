//! Workload kinds a spread can target and the pod templates derived from them.

use k8s_openapi::api::core::v1::{
    PersistentVolumeClaim, PersistentVolumeClaimVolumeSource, PodTemplateSpec, Volume,
};
use kube::api::{ApiResource, DynamicObject};
use kube::core::{GroupVersion, GroupVersionKind};

const KRUISE_GROUP: &str = "apps.kruise.io";
const APPS_GROUP: &str = "apps";
const BATCH_GROUP: &str = "batch";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unexpected GroupVersion string: {0}")]
pub struct InvalidApiVersion(pub String);

/// Splits an `apiVersion` the way the API machinery does.
///
/// A bare version (`v1`) belongs to the core group; more than one `/` is an error.
pub fn parse_group_version(api_version: &str) -> Result<GroupVersion, InvalidApiVersion> {
    if api_version.is_empty() || api_version == "/" {
        return Ok(GroupVersion::gv("", ""));
    }

    match api_version.split('/').collect::<Vec<_>>().as_slice() {
        [version] => Ok(GroupVersion::gv("", version)),
        [group, version] => Ok(GroupVersion::gv(group, version)),
        _ => Err(InvalidApiVersion(api_version.to_owned())),
    }
}

/// Target kinds with first-class support. Anything else has to be whitelisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkloadKind {
    CloneSet,
    Deployment,
    ReplicaSet,
    Job,
    /// `apps/v1` StatefulSet or one of the Kruise Advanced StatefulSet versions.
    StatefulSet,
    Other,
}

impl WorkloadKind {
    pub fn from_kind(kind: &str) -> Self {
        match kind {
            "CloneSet" => Self::CloneSet,
            "Deployment" => Self::Deployment,
            "ReplicaSet" => Self::ReplicaSet,
            "Job" => Self::Job,
            "StatefulSet" => Self::StatefulSet,
            _ => Self::Other,
        }
    }

    /// Version a workload of this kind in `group` is read with, whatever
    /// version the reference names. `None` if the kind is not served from `group`.
    fn served_version(self, group: &str) -> Option<&'static str> {
        match (self, group) {
            (Self::CloneSet, KRUISE_GROUP) => Some("v1alpha1"),
            (Self::Deployment | Self::ReplicaSet | Self::StatefulSet, APPS_GROUP) => Some("v1"),
            (Self::Job, BATCH_GROUP) => Some("v1"),
            (Self::StatefulSet, KRUISE_GROUP) => Some("v1beta1"),
            _ => None,
        }
    }

    /// API resource a workload of this kind in `group` is fetched through.
    pub fn api_resource(self, group: &str) -> Option<ApiResource> {
        let version = self.served_version(group)?;
        Some(ApiResource::from_gvk(&GroupVersionKind::gvk(group, version, self.name())))
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::CloneSet => "CloneSet",
            Self::Deployment => "Deployment",
            Self::ReplicaSet => "ReplicaSet",
            Self::Job => "Job",
            Self::StatefulSet => "StatefulSet",
            Self::Other => "Other",
        }
    }

    /// Whether the kind keeps volume claim templates beside its pod template.
    fn has_claim_templates(self) -> bool { matches!(self, Self::CloneSet | Self::StatefulSet) }
}

/// Pod-producing parts of a fetched workload.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkloadTemplate {
    pub kind:                   WorkloadKind,
    pub template:               PodTemplateSpec,
    pub volume_claim_templates: Vec<PersistentVolumeClaim>,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct TemplateSpec {
    template:               PodTemplateSpec,
    #[serde(default)]
    volume_claim_templates: Vec<PersistentVolumeClaim>,
}

impl WorkloadTemplate {
    /// Extracts the template from a fetched object.
    ///
    /// Returns `None` for [`WorkloadKind::Other`] and for objects whose spec
    /// has no decodable pod template.
    pub fn from_object(kind: WorkloadKind, object: &DynamicObject) -> Option<Self> {
        if kind == WorkloadKind::Other {
            return None;
        }

        let spec = object.data.get("spec")?.clone();
        match serde_json::from_value::<TemplateSpec>(spec) {
            Ok(spec) => Some(Self {
                kind,
                template: spec.template,
                volume_claim_templates: if kind.has_claim_templates() {
                    spec.volume_claim_templates
                } else {
                    Vec::new()
                },
            }),
            Err(err) => {
                log::debug!("{} has no usable pod template: {err}", kind.name());
                None
            }
        }
    }

    /// The pod template pods of this workload are created from.
    ///
    /// Volume claim templates become PVC volumes named after the claim, as the
    /// workload controller mounts them.
    pub fn pod_template(&self) -> PodTemplateSpec {
        let mut template = self.template.clone();
        if self.kind.has_claim_templates() && !self.volume_claim_templates.is_empty() {
            let spec = template.spec.get_or_insert_with(Default::default);
            let volumes = spec.volumes.get_or_insert_with(Vec::new);
            for claim in &self.volume_claim_templates {
                let name = claim.metadata.name.clone().unwrap_or_default();
                volumes.push(Volume {
                    name: name.clone(),
                    persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                        claim_name: name,
                        ..Default::default()
                    }),
                    ..Default::default()
                });
            }
        }
        template
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_group_versions() {
        let gv = parse_group_version("apps/v1").unwrap();
        assert_eq!((gv.group.as_str(), gv.version.as_str()), ("apps", "v1"));

        let gv = parse_group_version("v1").unwrap();
        assert_eq!((gv.group.as_str(), gv.version.as_str()), ("", "v1"));

        let gv = parse_group_version("/").unwrap();
        assert_eq!((gv.group.as_str(), gv.version.as_str()), ("", ""));

        assert_eq!(
            parse_group_version("apps/v1/extra"),
            Err(InvalidApiVersion("apps/v1/extra".into()))
        );
    }

    fn api_version(kind: &str, group: &str) -> Option<String> {
        WorkloadKind::from_kind(kind).api_resource(group).map(|resource| resource.api_version)
    }

    #[test]
    fn kinds_are_read_at_their_served_version() {
        assert_eq!(api_version("Deployment", "apps").as_deref(), Some("apps/v1"));
        assert_eq!(api_version("ReplicaSet", "apps").as_deref(), Some("apps/v1"));
        assert_eq!(api_version("Job", "batch").as_deref(), Some("batch/v1"));
        assert_eq!(api_version("CloneSet", "apps.kruise.io").as_deref(), Some("apps.kruise.io/v1alpha1"));
        assert_eq!(api_version("StatefulSet", "apps").as_deref(), Some("apps/v1"));
        assert_eq!(api_version("StatefulSet", "apps.kruise.io").as_deref(), Some("apps.kruise.io/v1beta1"));

        assert_eq!(api_version("Deployment", "apps.kruise.io"), None);
        assert_eq!(api_version("Job", "apps"), None);
        assert_eq!(api_version("GameServerSet", "game.kruise.io"), None);
    }

    fn object(value: serde_json::Value) -> DynamicObject { serde_json::from_value(value).unwrap() }

    #[test]
    fn claim_templates_become_volumes() {
        let sts = object(serde_json::json!({
            "apiVersion": "apps/v1",
            "kind": "StatefulSet",
            "metadata": {"name": "db", "namespace": "default"},
            "spec": {
                "template": {"spec": {"containers": [{"name": "main", "image": "postgres"}]}},
                "volumeClaimTemplates": [{"metadata": {"name": "data"}}],
            },
        }));
        let workload = WorkloadTemplate::from_object(WorkloadKind::StatefulSet, &sts).unwrap();
        let volumes = workload.pod_template().spec.unwrap().volumes.unwrap();
        assert_eq!(volumes.len(), 1);
        assert_eq!(volumes[0].name, "data");
        assert_eq!(volumes[0].persistent_volume_claim.as_ref().unwrap().claim_name, "data");
    }

    #[test]
    fn deployments_ignore_claim_templates() {
        let deploy = object(serde_json::json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {"name": "web"},
            "spec": {
                "template": {"spec": {"containers": [{"name": "main", "image": "nginx"}]}},
                "volumeClaimTemplates": [{"metadata": {"name": "data"}}],
            },
        }));
        let workload = WorkloadTemplate::from_object(WorkloadKind::Deployment, &deploy).unwrap();
        assert!(workload.pod_template().spec.unwrap().volumes.is_none());
    }

    #[test]
    fn other_kinds_have_no_template() {
        let custom = object(serde_json::json!({
            "apiVersion": "example.io/v1",
            "kind": "GameServerSet",
            "metadata": {"name": "gs"},
            "spec": {"template": {}},
        }));
        assert_eq!(WorkloadTemplate::from_object(WorkloadKind::Other, &custom), None);
    }
}
