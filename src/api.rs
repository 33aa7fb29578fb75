use k8s_openapi::api::core::v1::{NodeSelectorTerm, PreferredSchedulingTerm, Toleration};
use k8s_openapi::apimachinery::pkg::apis::meta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use schemars::schema::{InstanceType, Schema, SchemaObject};

use crate::workload::{self, InvalidApiVersion};

pub const FIXED_SCHEDULE_STRATEGY: &str = "Fixed";
pub const ADAPTIVE_SCHEDULE_STRATEGY: &str = "Adaptive";

#[derive(
    schemars::JsonSchema,
    kube::CustomResource,
    serde::Serialize,
    serde::Deserialize,
    Debug,
    Clone,
    Default,
)]
#[kube(
    group = "apps.kruise.io",
    version = "v1alpha1",
    kind = "WorkloadSpread",
    plural = "workloadspreads",
    shortname = "wss",
    namespaced,
    status = "WorkloadSpreadStatus",
    printcolumn = r#"{"name":"WORKLOAD-NAME", "type":"string", "jsonPath":".spec.targetRef.name"}"#,
    printcolumn = r#"{"name":"KIND", "type":"string", "jsonPath":".spec.targetRef.kind"}"#,
    printcolumn = r#"{"name":"STRATEGY", "type":"string", "jsonPath":".spec.scheduleStrategy.type"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadSpreadSpec {
    /// The workload whose replicas are spread. Cannot be changed once set.
    #[serde(rename = "targetRef", default, skip_serializing_if = "Option::is_none")]
    pub target_reference:  Option<TargetReference>,
    /// Narrows the target's pods that this spread applies to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_filter:     Option<TargetFilter>,
    /// Ordered subsets the replicas are distributed over.
    #[serde(default)]
    pub subsets:           Vec<WorkloadSpreadSubset>,
    /// How pods are assigned to subsets.
    #[serde(default)]
    pub schedule_strategy: WorkloadSpreadScheduleStrategy,
}

#[derive(
    serde::Serialize, serde::Deserialize, Debug, Clone, Default, PartialEq, Eq, schemars::JsonSchema,
)]
#[serde(rename_all = "camelCase")]
pub struct TargetReference {
    /// API version of the referent, e.g. `apps/v1`.
    pub api_version: String,
    /// Kind of the referent.
    pub kind:        String,
    /// Name of the referent, in the same namespace as the spread.
    pub name:        String,
}

impl TargetReference {
    /// Group parsed out of `apiVersion`.
    pub fn group(&self) -> Result<String, InvalidApiVersion> {
        workload::parse_group_version(&self.api_version).map(|gv| gv.group)
    }

    /// The (group, kind, name) triple identifying the referenced workload.
    ///
    /// An unparsable `apiVersion` contributes an empty group.
    pub fn identity(&self) -> (String, &str, &str) {
        (self.group().unwrap_or_default(), &self.kind, &self.name)
    }
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TargetFilter {
    /// Label selector over the target's pods.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector:           Option<meta::v1::LabelSelector>,
    /// JSON paths in the workload holding replica counts of the filtered pods.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub replicas_path_list: Vec<String>,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadSpreadSubset {
    /// Unique name of the subset.
    pub name: String,

    /// Node selector term that pods of this subset must satisfy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_node_selector_term: Option<NodeSelectorTerm>,

    /// Weighted node preferences for pods of this subset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_node_selector_terms: Option<Vec<PreferredSchedulingTerm>>,

    /// Tolerations added to pods of this subset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tolerations: Option<Vec<Toleration>>,

    /// Cap on the replicas of this subset, as a count or a percentage.
    /// Unset on the last subset means it takes whatever is left over.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_replicas: Option<IntOrString>,

    /// Strategic merge patch applied to pods of this subset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "preserve_unknown_fields")]
    pub patch: Option<serde_json::Value>,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadSpreadScheduleStrategy {
    /// `Fixed`, `Adaptive`, or empty for the default (`Fixed`).
    #[serde(rename = "type", default)]
    pub type_:    String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adaptive: Option<AdaptiveWorkloadSpreadStrategy>,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdaptiveWorkloadSpreadStrategy {
    /// Skip simulating scheduling when picking a subset for a new pod.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub disable_simulation_schedule: bool,
    /// Seconds a pod may stay unschedulable before it is moved to another subset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reschedule_critical_seconds: Option<i32>,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadSpreadStatus {
    /// Generation of the spread that the status is updated for.
    #[serde(default)]
    pub observed_generation: i64,

    /// Per-subset replica accounting, in subset order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subset_statuses: Vec<WorkloadSpreadSubsetStatus>,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadSpreadSubsetStatus {
    pub name:             String,
    /// Replicas currently placed in the subset.
    pub replicas:         i32,
    /// Replicas the subset can still take, or -1 when uncapped.
    pub missing_replicas: i32,
}

fn preserve_unknown_fields(_: &mut schemars::gen::SchemaGenerator) -> Schema {
    Schema::Object(SchemaObject {
        instance_type: Some(InstanceType::Object.into()),
        extensions: [("x-kubernetes-preserve-unknown-fields".to_owned(), serde_json::Value::Bool(true))]
            .into_iter()
            .collect(),
        ..SchemaObject::default()
    })
}
