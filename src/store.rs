//! Reads the validator makes against the cluster.
//!
//! Every read happens at the start of a validation call and nothing is cached,
//! so a validation only ever sees what the store returned for that request.

use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::{ApiResource, DynamicObject, ListParams};

use crate::api::WorkloadSpread;
use crate::workload;

/// ConfigMap data key holding the custom workload whitelist.
pub const WHITELIST_KEY: &str = "WorkloadSpread_Watch_Custom_Workload_WhiteList";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("kubernetes request failed: {0}")]
    Kube(#[from] kube::Error),
    #[error("decoding {what}: {source}")]
    Decode {
        what:   &'static str,
        source: serde_json::Error,
    },
    #[error("{0}")]
    Backend(String),
}

/// Read access to workloads and sibling spreads.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetches a namespaced object, or `None` if it does not exist.
    async fn get(
        &self,
        resource: &ApiResource,
        namespace: &str,
        name: &str,
    ) -> Result<Option<DynamicObject>, StoreError>;

    async fn list_workload_spreads(&self, namespace: &str) -> Result<Vec<WorkloadSpread>, StoreError>;
}

/// Source of the custom workload kinds a spread may target.
#[async_trait::async_trait]
pub trait WhitelistSource: Send + Sync {
    async fn permitted_custom_kinds(&self) -> Result<CustomWorkloadWhitelist, StoreError>;
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomWorkloadWhitelist {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub workloads: Vec<CustomWorkload>,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomWorkload {
    #[serde(rename = "Group", default)]
    pub group:         String,
    #[serde(rename = "Version", default)]
    pub version:       String,
    #[serde(rename = "Kind", default)]
    pub kind:          String,
    /// Child kinds that own the pods, e.g. the ReplicaSets of a rollout.
    #[serde(rename = "subResources", default, skip_serializing_if = "Vec::is_empty")]
    pub sub_resources: Vec<SubResource>,
    /// JSON path of the replica count in the workload.
    #[serde(rename = "replicasPath", default, skip_serializing_if = "String::is_empty")]
    pub replicas_path: String,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct SubResource {
    #[serde(rename = "Group", default)]
    pub group:   String,
    #[serde(rename = "Version", default)]
    pub version: String,
    #[serde(rename = "Kind", default)]
    pub kind:    String,
}

impl CustomWorkloadWhitelist {
    /// Parses the JSON document stored under [`WHITELIST_KEY`].
    pub fn from_json(raw: &str) -> Result<Self, StoreError> {
        serde_json::from_str(raw).map_err(|source| StoreError::Decode { what: "custom workload whitelist", source })
    }

    /// Whether a reference with this `apiVersion` and kind is whitelisted.
    pub fn permits(&self, api_version: &str, kind: &str) -> bool {
        let Ok(gv) = workload::parse_group_version(api_version) else {
            return false;
        };
        self.workloads.iter().any(|wl| wl.kind == kind && wl.group == gv.group)
    }
}

/// [`ObjectStore`] and [`WhitelistSource`] backed by the Kubernetes API.
#[derive(Clone)]
pub struct KubeStore {
    client:         kube::Client,
    /// Namespace and name of the ConfigMap carrying the whitelist.
    configuration:  (String, String),
}

impl KubeStore {
    pub fn new(client: kube::Client, config_namespace: impl Into<String>, config_name: impl Into<String>) -> Self {
        Self { client, configuration: (config_namespace.into(), config_name.into()) }
    }
}

#[async_trait::async_trait]
impl ObjectStore for KubeStore {
    async fn get(
        &self,
        resource: &ApiResource,
        namespace: &str,
        name: &str,
    ) -> Result<Option<DynamicObject>, StoreError> {
        let api = kube::Api::<DynamicObject>::namespaced_with(self.client.clone(), namespace, resource);
        Ok(api.get_opt(name).await?)
    }

    async fn list_workload_spreads(&self, namespace: &str) -> Result<Vec<WorkloadSpread>, StoreError> {
        let api = kube::Api::<WorkloadSpread>::namespaced(self.client.clone(), namespace);
        Ok(api.list(&ListParams::default()).await?.items)
    }
}

#[async_trait::async_trait]
impl WhitelistSource for KubeStore {
    async fn permitted_custom_kinds(&self) -> Result<CustomWorkloadWhitelist, StoreError> {
        let (namespace, name) = &self.configuration;
        let api = kube::Api::<ConfigMap>::namespaced(self.client.clone(), namespace);
        let raw = api
            .get_opt(name)
            .await?
            .and_then(|cm| cm.data)
            .and_then(|mut data| data.remove(WHITELIST_KEY));

        match raw {
            Some(raw) => CustomWorkloadWhitelist::from_json(&raw),
            None => Ok(CustomWorkloadWhitelist::default()),
        }
    }
}

/// In-memory store, for dry runs and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    objects:   Vec<DynamicObject>,
    spreads:   Vec<WorkloadSpread>,
    whitelist: CustomWorkloadWhitelist,
    /// When set, every read fails with this message.
    outage:    Option<String>,
}

impl MemoryStore {
    pub fn with_object(mut self, object: DynamicObject) -> Self {
        self.objects.push(object);
        self
    }

    pub fn with_spread(mut self, spread: WorkloadSpread) -> Self {
        self.spreads.push(spread);
        self
    }

    pub fn with_whitelist(mut self, whitelist: CustomWorkloadWhitelist) -> Self {
        self.whitelist = whitelist;
        self
    }

    pub fn unavailable(mut self, message: impl Into<String>) -> Self {
        self.outage = Some(message.into());
        self
    }

    fn check_available(&self) -> Result<(), StoreError> {
        match &self.outage {
            Some(message) => Err(StoreError::Backend(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl ObjectStore for MemoryStore {
    async fn get(
        &self,
        resource: &ApiResource,
        namespace: &str,
        name: &str,
    ) -> Result<Option<DynamicObject>, StoreError> {
        self.check_available()?;
        Ok(self
            .objects
            .iter()
            .find(|object| {
                object.types.as_ref().is_some_and(|types| {
                    types.api_version == resource.api_version && types.kind == resource.kind
                }) && object.metadata.namespace.as_deref() == Some(namespace)
                    && object.metadata.name.as_deref() == Some(name)
            })
            .cloned())
    }

    async fn list_workload_spreads(&self, namespace: &str) -> Result<Vec<WorkloadSpread>, StoreError> {
        self.check_available()?;
        Ok(self
            .spreads
            .iter()
            .filter(|spread| spread.metadata.namespace.as_deref() == Some(namespace))
            .cloned()
            .collect())
    }
}

#[async_trait::async_trait]
impl WhitelistSource for MemoryStore {
    async fn permitted_custom_kinds(&self) -> Result<CustomWorkloadWhitelist, StoreError> {
        self.check_available()?;
        Ok(self.whitelist.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workload::WorkloadKind;

    #[test]
    fn parses_configmap_whitelist() {
        let whitelist = CustomWorkloadWhitelist::from_json(
            r#"{"workloads":[{"Group":"game.kruise.io","Kind":"GameServerSet","replicasPath":"spec.replicas"}]}"#,
        )
        .unwrap();

        assert_eq!(whitelist.workloads.len(), 1);
        assert_eq!(whitelist.workloads[0].replicas_path, "spec.replicas");
        assert!(whitelist.permits("game.kruise.io/v1alpha1", "GameServerSet"));
        assert!(!whitelist.permits("game.kruise.io/v1alpha1", "GameServer"));
        assert!(!whitelist.permits("other.io/v1", "GameServerSet"));
        assert!(!whitelist.permits("game.kruise.io/v1/x", "GameServerSet"));
    }

    #[tokio::test]
    async fn memory_store_matches_kind_and_namespace() {
        let deploy: DynamicObject = serde_json::from_value(serde_json::json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {"name": "web", "namespace": "default"},
        }))
        .unwrap();
        let store = MemoryStore::default().with_object(deploy);

        let deployments = WorkloadKind::Deployment.api_resource("apps").unwrap();
        let replicasets = WorkloadKind::ReplicaSet.api_resource("apps").unwrap();

        assert!(store.get(&deployments, "default", "web").await.unwrap().is_some());
        assert!(store.get(&deployments, "other", "web").await.unwrap().is_none());
        assert!(store.get(&replicasets, "default", "web").await.unwrap().is_none());

        let down = MemoryStore::default().unavailable("etcd timeout");
        assert!(matches!(down.get(&deployments, "default", "web").await, Err(StoreError::Backend(_))));
    }

    #[test]
    fn malformed_whitelist_is_a_decode_error() {
        let err = CustomWorkloadWhitelist::from_json("{not json").unwrap_err();
        assert!(matches!(err, StoreError::Decode { .. }));
    }
}
