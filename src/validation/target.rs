use crate::api::TargetReference;
use crate::field::{ErrorList, FieldError, FieldPath};
use crate::store::{ObjectStore, WhitelistSource};
use crate::workload::{self, WorkloadKind, WorkloadTemplate};

/// Checks a spread's target reference and looks up the workload it names.
pub struct TargetResolver<'a> {
    store:     &'a dyn ObjectStore,
    whitelist: &'a dyn WhitelistSource,
}

impl<'a> TargetResolver<'a> {
    pub fn new(store: &'a dyn ObjectStore, whitelist: &'a dyn WhitelistSource) -> Self {
        Self { store, whitelist }
    }

    /// Validates `target` and fetches the workload's template when possible.
    ///
    /// A workload that cannot be fetched is not an error: the spread may be
    /// created ahead of its workload, in which case no template is returned.
    pub async fn resolve(
        &self,
        target: Option<&TargetReference>,
        namespace: &str,
        path: &FieldPath,
    ) -> (Option<WorkloadTemplate>, ErrorList) {
        let path = path.child("targetRef");
        let Some(target) = target else {
            return (None, vec![FieldError::required(&path, "no targetRef defined in WorkloadSpread")]);
        };

        if target.api_version.is_empty() || target.name.is_empty() || target.kind.is_empty() {
            return (
                None,
                vec![FieldError::invalid(&path, target, "empty TargetReference is not valid for WorkloadSpread.")],
            );
        }

        let kind = WorkloadKind::from_kind(&target.kind);
        if kind == WorkloadKind::Other {
            return (None, self.check_whitelisted(target, &path).await);
        }

        let resource = match workload::parse_group_version(&target.api_version) {
            Ok(gv) => kind.api_resource(&gv.group),
            Err(err) => {
                log::warn!("failed to parse apiVersion of targetRef {:?}: {err}", target.api_version);
                None
            }
        };
        let Some(resource) = resource else {
            let msg = format!("TargetReference is not valid for {}.", kind.name());
            return (None, vec![FieldError::invalid(&path, target, msg)]);
        };

        let template = match self.store.get(&resource, namespace, &target.name).await {
            Ok(Some(object)) => WorkloadTemplate::from_object(kind, &object),
            Ok(None) => {
                log::debug!("{} {namespace}/{} not found, skipping patch checks", target.kind, target.name);
                None
            }
            Err(err) => {
                log::debug!("fetching {} {namespace}/{} failed, skipping patch checks: {err}", target.kind, target.name);
                None
            }
        };

        (template, ErrorList::new())
    }

    /// Only custom kinds read the whitelist, so built-in targets never touch it.
    async fn check_whitelisted(&self, target: &TargetReference, path: &FieldPath) -> ErrorList {
        match self.whitelist.permitted_custom_kinds().await {
            Err(err) => vec![FieldError::internal(path, err)],
            Ok(whitelist) if whitelist.permits(&target.api_version, &target.kind) => ErrorList::new(),
            Ok(_) => vec![FieldError::invalid(path, target, "TargetReference's GroupKind is not permitted.")],
        }
    }
}
