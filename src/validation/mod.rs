//! Admission-time validation of [`WorkloadSpread`] objects.

use std::time::Duration;

use crate::api::{WorkloadSpread, WorkloadSpreadSpec, ADAPTIVE_SCHEDULE_STRATEGY, FIXED_SCHEDULE_STRATEGY};
use crate::field::{ErrorList, FieldError, FieldPath};
use crate::store::{ObjectStore, WhitelistSource};
use crate::structural::{meta, StructuralValidator};
use crate::workload::WorkloadKind;

pub mod conflict;
pub mod patch;
pub mod subset;
pub mod target;
pub mod update;

pub use target::TargetResolver;

/// Longest time a pod may fail to schedule before the spread gives up on it.
pub const MAX_SCHEDULED_FAILED_DURATION: Duration = Duration::from_secs(300);

/// Validates spreads against the cluster state read for one admission request.
pub struct WorkloadSpreadValidator<'a> {
    store:      &'a dyn ObjectStore,
    whitelist:  &'a dyn WhitelistSource,
    structural: &'a dyn StructuralValidator,
}

impl<'a> WorkloadSpreadValidator<'a> {
    /// `whitelist` is only read for spreads that target a custom kind.
    pub fn new(
        store: &'a dyn ObjectStore,
        whitelist: &'a dyn WhitelistSource,
        structural: &'a dyn StructuralValidator,
    ) -> Self {
        Self { store, whitelist, structural }
    }

    pub async fn validate(&self, ws: &WorkloadSpread) -> ErrorList {
        let path = FieldPath::new("spec");
        let namespace = ws.metadata.namespace.as_deref().unwrap_or_default();

        let mut errs = self.validate_spec(&ws.spec, namespace, &path).await;

        match self.store.list_workload_spreads(namespace).await {
            Ok(siblings) => errs.extend(conflict::detect_conflict(ws, &siblings, &path)),
            Err(err) => errs.push(FieldError::internal(
                &FieldPath::new(""),
                format!("query other WorkloadSpread failed, err: {err}"),
            )),
        }

        errs
    }

    /// Validates `new` as a replacement for `old`.
    pub async fn validate_update(&self, old: &WorkloadSpread, new: &WorkloadSpread) -> ErrorList {
        let mut errs = self.validate(new).await;
        errs.extend(self.structural.validate_object_meta_update(
            &new.metadata,
            &old.metadata,
            &FieldPath::new("metadata"),
        ));
        errs.extend(update::validate_target_ref_update(
            new.spec.target_reference.as_ref(),
            old.spec.target_reference.as_ref(),
            &FieldPath::new("spec"),
        ));
        errs
    }

    async fn validate_spec(&self, spec: &WorkloadSpreadSpec, namespace: &str, path: &FieldPath) -> ErrorList {
        let resolver = TargetResolver::new(self.store, self.whitelist);
        let (workload, mut errs) = resolver.resolve(spec.target_reference.as_ref(), namespace, path).await;

        let target_kind = spec.target_reference.as_ref().map(|target| WorkloadKind::from_kind(&target.kind));
        errs.extend(subset::validate_subsets(
            &spec.subsets,
            target_kind,
            workload.as_ref(),
            self.structural,
            &path.child("subsets"),
        ));

        errs.extend(validate_schedule_strategy(spec, &path.child("scheduleStrategy")));

        if let Some(filter) = &spec.target_filter {
            if let Some(msg) = filter.selector.as_ref().and_then(meta::label_selector_error) {
                errs.push(FieldError::invalid(&path.child("targetFilter"), filter, msg));
            }
        }

        errs
    }
}

/// Upper bound of `rescheduleCriticalSeconds` for a spread with `subset_count` subsets.
///
/// A pod may be bounced through every subset in turn, and all of those
/// attempts have to fit within [`MAX_SCHEDULED_FAILED_DURATION`], less 5s of slack.
pub fn max_reschedule_critical_seconds(subset_count: usize) -> i32 {
    if subset_count <= 1 {
        return i32::MAX;
    }
    let budget = MAX_SCHEDULED_FAILED_DURATION.as_secs().saturating_sub(5);
    let hops = u64::try_from(subset_count - 1).unwrap_or(u64::MAX);
    i32::try_from(budget / hops).unwrap_or(i32::MAX)
}

fn validate_schedule_strategy(spec: &WorkloadSpreadSpec, path: &FieldPath) -> ErrorList {
    let mut errs = ErrorList::new();
    let strategy = &spec.schedule_strategy;

    if !["", FIXED_SCHEDULE_STRATEGY, ADAPTIVE_SCHEDULE_STRATEGY].contains(&strategy.type_.as_str()) {
        errs.push(FieldError::invalid(&path.child("type"), &strategy.type_, "ScheduleStrategy's type is not valid"));
    }

    let Some(adaptive) = &strategy.adaptive else {
        return errs;
    };

    if strategy.type_ != ADAPTIVE_SCHEDULE_STRATEGY {
        errs.push(FieldError::invalid(
            &path.child("type"),
            adaptive.reschedule_critical_seconds,
            "the scheduleStrategy's type must be adaptive when using adaptive scheduleStrategy",
        ));
    }

    if spec.subsets.len() > 1 && spec.subsets.last().is_some_and(|last| last.max_replicas.is_some()) {
        errs.push(FieldError::invalid(
            &path.child("adaptive"),
            adaptive.reschedule_critical_seconds,
            "the last subset's maxReplicas must be not specified when using adaptive scheduleStrategy",
        ));
    }

    let allowed = max_reschedule_critical_seconds(spec.subsets.len());
    if let Some(seconds) = adaptive.reschedule_critical_seconds.filter(|s| !(0..=allowed).contains(s)) {
        errs.push(FieldError::invalid(
            &path.child("adaptive").child("rescheduleCriticalSeconds"),
            seconds,
            format!("rescheduleCriticalSeconds < 0 or rescheduleCriticalSeconds > {allowed} is not permitted"),
        ));
    }

    errs
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn spec(value: serde_json::Value) -> WorkloadSpreadSpec { serde_json::from_value(value).unwrap() }

    fn fields(errs: &ErrorList) -> Vec<String> { errs.iter().map(|err| err.field.to_string()).collect() }

    #[test]
    fn reschedule_bound_shrinks_with_subsets() {
        assert_eq!(max_reschedule_critical_seconds(0), i32::MAX);
        assert_eq!(max_reschedule_critical_seconds(1), i32::MAX);
        assert_eq!(max_reschedule_critical_seconds(2), 295);
        assert_eq!(max_reschedule_critical_seconds(3), 147);
        assert_eq!(max_reschedule_critical_seconds(6), 59);
    }

    #[test]
    fn unknown_strategy_type() {
        let spec = spec(json!({"subsets": [{"name": "a"}], "scheduleStrategy": {"type": "Random"}}));
        let errs = validate_schedule_strategy(&spec, &FieldPath::new("spec").child("scheduleStrategy"));
        assert_eq!(fields(&errs), ["spec.scheduleStrategy.type"]);
    }

    #[test]
    fn adaptive_settings_need_adaptive_type() {
        let spec = spec(json!({
            "subsets": [{"name": "a"}],
            "scheduleStrategy": {"type": "Fixed", "adaptive": {"rescheduleCriticalSeconds": 10}},
        }));
        let errs = validate_schedule_strategy(&spec, &FieldPath::new("spec").child("scheduleStrategy"));
        assert_eq!(fields(&errs), ["spec.scheduleStrategy.type"]);
    }

    #[test]
    fn adaptive_last_subset_must_be_uncapped() {
        let spec = spec(json!({
            "subsets": [{"name": "a", "maxReplicas": 1}, {"name": "b", "maxReplicas": 2}],
            "scheduleStrategy": {"type": "Adaptive", "adaptive": {}},
        }));
        let errs = validate_schedule_strategy(&spec, &FieldPath::new("spec").child("scheduleStrategy"));
        assert_eq!(fields(&errs), ["spec.scheduleStrategy.adaptive"]);
    }

    #[test]
    fn reschedule_seconds_bounds() {
        let path = FieldPath::new("spec").child("scheduleStrategy");
        for (subsets, seconds, ok) in [
            (json!([{"name": "a"}]), -1, false),
            (json!([{"name": "a"}, {"name": "b"}]), -1, false),
            (json!([{"name": "a"}]), 100_000, true),
            (json!([{"name": "a"}, {"name": "b"}]), 295, true),
            (json!([{"name": "a"}, {"name": "b"}]), 296, false),
            (json!([{"name": "a"}, {"name": "b"}, {"name": "c"}]), 148, false),
        ] {
            let spec = spec(json!({
                "subsets": subsets,
                "scheduleStrategy": {"type": "Adaptive", "adaptive": {"rescheduleCriticalSeconds": seconds}},
            }));
            let errs = validate_schedule_strategy(&spec, &path);
            if ok {
                assert_eq!(errs, vec![], "{seconds}");
            } else {
                assert_eq!(fields(&errs), ["spec.scheduleStrategy.adaptive.rescheduleCriticalSeconds"], "{seconds}");
            }
        }
    }
}
