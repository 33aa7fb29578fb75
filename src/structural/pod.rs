use std::collections::HashSet;

use k8s_openapi::api::core::v1::{Affinity, Container, PodSpec, Volume};

use super::names;
use super::scheduling::{self, unsupported};
use crate::field::{ErrorList, FieldError, FieldPath};

const RESTART_POLICIES: &[&str] = &["Always", "OnFailure", "Never"];
const DNS_POLICIES: &[&str] = &["ClusterFirstWithHostNet", "ClusterFirst", "Default", "None"];
const PULL_POLICIES: &[&str] = &["Always", "IfNotPresent", "Never"];
const PROTOCOLS: &[&str] = &["TCP", "UDP", "SCTP"];

/// Validates a pod spec. Template metadata is left to the API server.
pub fn validate_pod_spec(spec: &PodSpec, path: &FieldPath) -> ErrorList {
    let mut errs = ErrorList::new();

    let (volumes, volume_errs) = validate_volumes(spec.volumes.as_deref().unwrap_or_default(), &path.child("volumes"));
    errs.extend(volume_errs);

    let mut container_names = HashSet::new();
    let init_containers = spec.init_containers.as_deref().unwrap_or_default();
    for (i, container) in init_containers.iter().enumerate() {
        errs.extend(validate_container(
            container,
            &volumes,
            &mut container_names,
            &path.child("initContainers").index(i),
        ));
    }

    if spec.containers.is_empty() {
        errs.push(FieldError::required(&path.child("containers"), ""));
    }
    for (i, container) in spec.containers.iter().enumerate() {
        errs.extend(validate_container(
            container,
            &volumes,
            &mut container_names,
            &path.child("containers").index(i),
        ));
    }

    if let Some(policy) = spec.restart_policy.as_deref() {
        if !RESTART_POLICIES.contains(&policy) {
            errs.push(unsupported(&path.child("restartPolicy"), policy, RESTART_POLICIES));
        }
    }
    if let Some(policy) = spec.dns_policy.as_deref() {
        if !DNS_POLICIES.contains(&policy) {
            errs.push(unsupported(&path.child("dnsPolicy"), policy, DNS_POLICIES));
        }
    }

    errs.extend(names::validate_labels(spec.node_selector.as_ref(), &path.child("nodeSelector")));

    if let Some(tolerations) = &spec.tolerations {
        errs.extend(scheduling::validate_tolerations(tolerations, &path.child("tolerations")));
    }

    if let Some(affinity) = &spec.affinity {
        errs.extend(validate_node_affinity(affinity, &path.child("affinity").child("nodeAffinity")));
    }

    if let Some(seconds) = spec.active_deadline_seconds {
        if !(1..=i64::from(i32::MAX)).contains(&seconds) {
            errs.push(FieldError::invalid(
                &path.child("activeDeadlineSeconds"),
                seconds,
                format!("must be between 1 and {}, inclusive", i32::MAX),
            ));
        }
    }

    if let Some(seconds) = spec.termination_grace_period_seconds {
        if seconds < 0 {
            errs.push(FieldError::invalid(
                &path.child("terminationGracePeriodSeconds"),
                seconds,
                "must be greater than or equal to 0",
            ));
        }
    }

    if let Some(name) = spec.service_account_name.as_deref().filter(|name| !name.is_empty()) {
        errs.extend(names::check(&path.child("serviceAccountName"), name, names::dns1123_subdomain(name)));
    }

    if let Some(hostname) = spec.hostname.as_deref().filter(|name| !name.is_empty()) {
        errs.extend(names::check(&path.child("hostname"), hostname, names::dns1123_label(hostname)));
    }

    errs
}

/// Validates the volume list and returns the names it declares.
fn validate_volumes<'a>(volumes: &'a [Volume], path: &FieldPath) -> (HashSet<&'a str>, ErrorList) {
    let mut errs = ErrorList::new();
    let mut declared = HashSet::new();

    for (i, volume) in volumes.iter().enumerate() {
        let path = path.index(i);
        let name = volume.name.as_str();

        if name.is_empty() {
            errs.push(FieldError::required(&path.child("name"), ""));
        } else {
            errs.extend(names::check(&path.child("name"), name, names::dns1123_label(name)));
            if !declared.insert(name) {
                errs.push(FieldError::invalid(&path.child("name"), name, "duplicate volume name"));
            }
        }

        match source_count(volume) {
            0 => errs.push(FieldError::required(&path, "must specify a volume type")),
            1 => {}
            _ => errs.push(FieldError::invalid(&path, name, "may not specify more than 1 volume type")),
        }

        if let Some(claim) = &volume.persistent_volume_claim {
            if claim.claim_name.is_empty() {
                errs.push(FieldError::required(&path.child("persistentVolumeClaim").child("claimName"), ""));
            }
        }
    }

    (declared, errs)
}

/// Number of volume sources set on the volume, counted over its serialized form.
fn source_count(volume: &Volume) -> usize {
    match serde_json::to_value(volume) {
        Ok(serde_json::Value::Object(fields)) => fields.keys().filter(|key| key.as_str() != "name").count(),
        _ => 0,
    }
}

fn validate_container<'a>(
    container: &'a Container,
    volumes: &HashSet<&str>,
    seen_names: &mut HashSet<&'a str>,
    path: &FieldPath,
) -> ErrorList {
    let mut errs = ErrorList::new();
    let name = container.name.as_str();

    if name.is_empty() {
        errs.push(FieldError::required(&path.child("name"), ""));
    } else {
        errs.extend(names::check(&path.child("name"), name, names::dns1123_label(name)));
        if !seen_names.insert(name) {
            errs.push(FieldError::invalid(&path.child("name"), name, "duplicate container name"));
        }
    }

    if container.image.as_deref().unwrap_or_default().is_empty() {
        errs.push(FieldError::required(&path.child("image"), ""));
    }

    if let Some(policy) = container.image_pull_policy.as_deref() {
        if !PULL_POLICIES.contains(&policy) {
            errs.push(unsupported(&path.child("imagePullPolicy"), policy, PULL_POLICIES));
        }
    }

    for (i, port) in container.ports.iter().flatten().enumerate() {
        let path = path.child("ports").index(i);
        if !(1..=65535).contains(&port.container_port) {
            errs.push(FieldError::invalid(
                &path.child("containerPort"),
                port.container_port,
                "must be between 1 and 65535, inclusive",
            ));
        }
        if let Some(host_port) = port.host_port.filter(|port| *port != 0) {
            if !(1..=65535).contains(&host_port) {
                errs.push(FieldError::invalid(
                    &path.child("hostPort"),
                    host_port,
                    "must be between 1 and 65535, inclusive",
                ));
            }
        }
        if let Some(protocol) = port.protocol.as_deref() {
            if !PROTOCOLS.contains(&protocol) {
                errs.push(unsupported(&path.child("protocol"), protocol, PROTOCOLS));
            }
        }
    }

    for (i, env) in container.env.iter().flatten().enumerate() {
        if env.name.is_empty() {
            errs.push(FieldError::required(&path.child("env").index(i).child("name"), ""));
        }
    }

    let mut mount_paths = HashSet::new();
    for (i, mount) in container.volume_mounts.iter().flatten().enumerate() {
        let path = path.child("volumeMounts").index(i);
        if !volumes.contains(mount.name.as_str()) {
            errs.push(FieldError::invalid(&path.child("name"), &mount.name, "not found"));
        }
        if mount.mount_path.is_empty() {
            errs.push(FieldError::required(&path.child("mountPath"), ""));
        } else if !mount_paths.insert(mount.mount_path.as_str()) {
            errs.push(FieldError::invalid(&path.child("mountPath"), &mount.mount_path, "must be unique"));
        }
    }

    errs
}

fn validate_node_affinity(affinity: &Affinity, path: &FieldPath) -> ErrorList {
    let mut errs = ErrorList::new();
    let Some(node_affinity) = &affinity.node_affinity else {
        return errs;
    };

    if let Some(selector) = &node_affinity.required_during_scheduling_ignored_during_execution {
        let path = path.child("requiredDuringSchedulingIgnoredDuringExecution").child("nodeSelectorTerms");
        if selector.node_selector_terms.is_empty() {
            errs.push(FieldError::required(&path, "must have at least one node selector term"));
        }
        for (i, term) in selector.node_selector_terms.iter().enumerate() {
            errs.extend(scheduling::validate_node_selector_term(term, &path.index(i)));
        }
    }

    if let Some(terms) = &node_affinity.preferred_during_scheduling_ignored_during_execution {
        errs.extend(scheduling::validate_preferred_scheduling_terms(
            terms,
            &path.child("preferredDuringSchedulingIgnoredDuringExecution"),
        ));
    }

    errs
}
