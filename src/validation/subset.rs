use std::collections::HashSet;
use std::ops::ControlFlow;

use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use super::patch;
use crate::api::WorkloadSpreadSubset;
use crate::field::{ErrorList, FieldError, FieldPath};
use crate::structural::StructuralValidator;
use crate::workload::{WorkloadKind, WorkloadTemplate};

/// Representation of a subset's `maxReplicas`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CapType {
    Count,
    Percent,
}

impl CapType {
    fn of(cap: &IntOrString) -> Self {
        match cap {
            IntOrString::Int(_) => Self::Count,
            IntOrString::String(_) => Self::Percent,
        }
    }
}

/// Running state of the `maxReplicas` checks across subsets.
#[derive(Debug, Default)]
struct CapTally {
    first_type:  Option<CapType>,
    percent_sum: i64,
}

impl CapTally {
    /// Folds one subset's cap in. Breaks with the error that ends subset validation,
    /// since once the caps disagree the remaining arithmetic is meaningless.
    fn add(&mut self, cap: &IntOrString, stateful: bool, path: &FieldPath) -> ControlFlow<FieldError> {
        let cap_type = CapType::of(cap);
        match self.first_type {
            None => self.first_type = Some(cap_type),
            Some(first) if first != cap_type => {
                return ControlFlow::Break(FieldError::invalid(
                    path,
                    cap,
                    "the maxReplicas type of all subsets must be the same",
                ));
            }
            Some(_) => {}
        }

        if stateful && cap_type != CapType::Count {
            return ControlFlow::Break(FieldError::invalid(path, cap, "the maxReplicas type must be Int for StatefulSet"));
        }

        let value = match scaled_value(cap, 100) {
            Ok(value) if value >= 0 => value,
            _ => return ControlFlow::Break(FieldError::invalid(path, cap, "maxReplicas is not valid for subset")),
        };

        if cap_type == CapType::Percent {
            self.percent_sum += i64::from(value);
            if self.percent_sum > 100 {
                return ControlFlow::Break(FieldError::invalid(
                    path,
                    cap,
                    "the sum of all subset's maxReplicas exceeds 100% is not permitted",
                ));
            }
        }

        ControlFlow::Continue(())
    }
}

/// Resolves a count or percentage against `total`, rounding percentages up.
pub fn scaled_value(value: &IntOrString, total: i32) -> Result<i32, String> {
    match value {
        IntOrString::Int(count) => Ok(*count),
        IntOrString::String(raw) => {
            let percent = raw
                .strip_suffix('%')
                .ok_or_else(|| format!("invalid value for IntOrString {raw:?}: string is not a percentage"))?
                .parse::<i32>()
                .map_err(|err| format!("invalid value for IntOrString {raw:?}: {err}"))?;
            let scaled = (f64::from(percent) * f64::from(total) / 100.0).ceil();
            Ok(scaled as i32)
        }
    }
}

pub fn validate_subsets(
    subsets: &[WorkloadSpreadSubset],
    target_kind: Option<WorkloadKind>,
    workload: Option<&WorkloadTemplate>,
    structural: &dyn StructuralValidator,
    path: &FieldPath,
) -> ErrorList {
    let (Some(first), Some(last)) = (subsets.first(), subsets.last()) else {
        return vec![FieldError::required(path, "subsets number must >= 1 in WorkloadSpread")];
    };

    let stateful = target_kind == Some(WorkloadKind::StatefulSet);
    let mut errs = ErrorList::new();
    let mut names = HashSet::new();
    let mut tally = CapTally::default();

    let outcome = subsets.iter().enumerate().try_for_each(|(i, subset)| {
        let path = path.index(i);

        if subset.name.is_empty() {
            errs.push(FieldError::invalid(&path.child("name"), &subset.name, "subset name must not be empty"));
        } else if !names.insert(subset.name.as_str()) {
            errs.push(FieldError::invalid(
                &path.child("name"),
                &subset.name,
                format!("duplicated subset name {}", subset.name),
            ));
        }

        if let Some(term) = &subset.required_node_selector_term {
            errs.extend(structural.validate_node_selector_term(term, &path.child("requiredNodeSelectorTerm")));
        }
        if let Some(terms) = &subset.preferred_node_selector_terms {
            errs.extend(
                structural.validate_preferred_scheduling_terms(terms, &path.child("preferredNodeSelectorTerms")),
            );
        }
        if let Some(tolerations) = &subset.tolerations {
            errs.extend(structural.validate_tolerations(tolerations, &path.child("tolerations")));
        }

        if let (Some(workload), Some(patch)) = (workload, &subset.patch) {
            errs.extend(patch::simulate_patch(workload, patch, structural, &path.child("patch")));
        }

        match &subset.max_replicas {
            Some(cap) => tally.add(cap, stateful, &path.child("maxReplicas")),
            None => ControlFlow::Continue(()),
        }
    });

    if let ControlFlow::Break(err) = outcome {
        errs.push(err);
        return errs;
    }

    if tally.first_type == Some(CapType::Percent) && tally.percent_sum < 100 && last.max_replicas.is_some() {
        errs.push(FieldError::invalid(
            &path.index(0).child("maxReplicas"),
            &first.max_replicas,
            "maxReplicas sum of all subsets must equal 100% when type is specified as percent",
        ));
    }

    errs
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::field::ErrorKind;
    use crate::structural::CoreValidator;

    fn subsets(value: serde_json::Value) -> Vec<WorkloadSpreadSubset> { serde_json::from_value(value).unwrap() }

    fn validate(subsets: &[WorkloadSpreadSubset], kind: WorkloadKind) -> ErrorList {
        validate_subsets(subsets, Some(kind), None, &CoreValidator, &FieldPath::new("spec").child("subsets"))
    }

    fn fields(errs: &ErrorList) -> Vec<String> { errs.iter().map(|err| err.field.to_string()).collect() }

    #[test]
    fn resolves_counts_and_percentages() {
        assert_eq!(scaled_value(&IntOrString::Int(3), 100), Ok(3));
        assert_eq!(scaled_value(&IntOrString::String("30%".into()), 100), Ok(30));
        assert_eq!(scaled_value(&IntOrString::String("33%".into()), 10), Ok(4));
        assert_eq!(scaled_value(&IntOrString::String("-5%".into()), 100), Ok(-5));
        assert!(scaled_value(&IntOrString::String("30".into()), 100).is_err());
        assert!(scaled_value(&IntOrString::String("a%".into()), 100).is_err());
    }

    #[test]
    fn requires_a_subset() {
        let errs = validate(&[], WorkloadKind::Deployment);
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].kind, ErrorKind::Required);
        assert_eq!(errs[0].field.to_string(), "spec.subsets");
    }

    #[test]
    fn names_must_be_present_and_unique() {
        let list = subsets(json!([{"name": "a"}, {"name": ""}, {"name": "a"}]));
        let errs = validate(&list, WorkloadKind::Deployment);
        assert_eq!(fields(&errs), ["spec.subsets[1].name", "spec.subsets[2].name"]);
        assert!(errs[1].detail.contains("duplicated subset name a"));
    }

    #[test]
    fn mixed_cap_types_stop_validation() {
        let list = subsets(json!([
            {"name": "a", "maxReplicas": 2},
            {"name": "b", "maxReplicas": "50%"},
            {"name": "b", "maxReplicas": -1},
        ]));
        let errs = validate(&list, WorkloadKind::Deployment);
        assert_eq!(fields(&errs), ["spec.subsets[1].maxReplicas"]);
        assert!(errs[0].detail.contains("must be the same"));
    }

    #[test]
    fn statefulsets_take_counts_only() {
        let list = subsets(json!([{"name": "a", "maxReplicas": "50%"}, {"name": "b"}]));
        let errs = validate(&list, WorkloadKind::StatefulSet);
        assert_eq!(fields(&errs), ["spec.subsets[0].maxReplicas"]);
        assert!(errs[0].detail.contains("must be Int for StatefulSet"));

        let list = subsets(json!([{"name": "a", "maxReplicas": 3}, {"name": "b"}]));
        assert_eq!(validate(&list, WorkloadKind::StatefulSet), vec![]);
    }

    #[test]
    fn negative_or_unparsable_caps() {
        let list = subsets(json!([{"name": "a", "maxReplicas": -1}, {"name": "b", "maxReplicas": -2}]));
        assert_eq!(fields(&validate(&list, WorkloadKind::Deployment)), ["spec.subsets[0].maxReplicas"]);

        let list = subsets(json!([{"name": "a", "maxReplicas": "half"}]));
        assert_eq!(fields(&validate(&list, WorkloadKind::Deployment)), ["spec.subsets[0].maxReplicas"]);
    }

    #[test]
    fn percentages_summing_to_100_are_accepted() {
        let explicit = subsets(json!([
            {"name": "a", "maxReplicas": "40%"},
            {"name": "b", "maxReplicas": "60%"},
        ]));
        assert_eq!(validate(&explicit, WorkloadKind::CloneSet), vec![]);

        let remainder = subsets(json!([
            {"name": "a", "maxReplicas": "40%"},
            {"name": "b", "maxReplicas": "60%"},
            {"name": "c"},
        ]));
        assert_eq!(validate(&remainder, WorkloadKind::CloneSet), vec![]);

        let short_with_remainder = subsets(json!([{"name": "a", "maxReplicas": "40%"}, {"name": "b"}]));
        assert_eq!(validate(&short_with_remainder, WorkloadKind::CloneSet), vec![]);
    }

    #[test]
    fn percentages_short_of_100_need_a_remainder_subset() {
        let list = subsets(json!([
            {"name": "a", "maxReplicas": "20%"},
            {"name": "b", "maxReplicas": "40%"},
        ]));
        let errs = validate(&list, WorkloadKind::CloneSet);
        assert_eq!(fields(&errs), ["spec.subsets[0].maxReplicas"]);
        assert!(errs[0].detail.contains("must equal 100%"));
    }

    #[test]
    fn percentages_over_100_fail_where_they_overflow() {
        let list = subsets(json!([
            {"name": "a", "maxReplicas": "50%"},
            {"name": "b", "maxReplicas": "50%"},
            {"name": "c", "maxReplicas": "10%"},
            {"name": "d", "maxReplicas": "10%"},
        ]));
        let errs = validate(&list, WorkloadKind::CloneSet);
        assert_eq!(fields(&errs), ["spec.subsets[2].maxReplicas"]);
        assert!(errs[0].detail.contains("exceeds 100%"));
    }

    #[test]
    fn accumulating_errors_survive_the_early_stop() {
        let list = subsets(json!([
            {"name": "a", "tolerations": [{"operator": "Equal", "value": "x"}], "maxReplicas": 1},
            {"name": "a", "maxReplicas": "10%"},
        ]));
        let errs = validate(&list, WorkloadKind::Deployment);
        assert_eq!(
            fields(&errs),
            ["spec.subsets[0].tolerations[0].operator", "spec.subsets[1].name", "spec.subsets[1].maxReplicas"]
        );
    }
}
