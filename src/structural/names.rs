//! Name grammars shared by the structural checks.
//!
//! Each check returns the list of problems with the value; an empty list
//! means the value is acceptable.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::field::{ErrorList, FieldError, FieldPath};

const DNS1123_LABEL_MAX_LEN: usize = 63;
const DNS1123_SUBDOMAIN_MAX_LEN: usize = 253;
const QUALIFIED_NAME_MAX_LEN: usize = 63;
const LABEL_VALUE_MAX_LEN: usize = 63;
const TOTAL_ANNOTATION_SIZE_LIMIT: usize = 256 * 1024;

const DNS1123_LABEL_FMT: &str = "[a-z0-9]([-a-z0-9]*[a-z0-9])?";
const QUALIFIED_NAME_FMT: &str = "([A-Za-z0-9][-A-Za-z0-9_.]*)?[A-Za-z0-9]";

static DNS1123_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!("^{DNS1123_LABEL_FMT}$")).expect("dns-1123 label regex"));

static DNS1123_SUBDOMAIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^{DNS1123_LABEL_FMT}(\.{DNS1123_LABEL_FMT})*$")).expect("dns-1123 subdomain regex")
});

static QUALIFIED_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!("^{QUALIFIED_NAME_FMT}$")).expect("qualified name regex"));

pub fn dns1123_label(value: &str) -> Vec<String> {
    let mut errs = Vec::new();
    if value.len() > DNS1123_LABEL_MAX_LEN {
        errs.push(format!("must be no more than {DNS1123_LABEL_MAX_LEN} characters"));
    }
    if !DNS1123_LABEL.is_match(value) {
        errs.push(format!(
            "a lowercase RFC 1123 label must consist of lower case alphanumeric characters or '-', and must \
             start and end with an alphanumeric character (regex used for validation is '{DNS1123_LABEL_FMT}')"
        ));
    }
    errs
}

pub fn dns1123_subdomain(value: &str) -> Vec<String> {
    let mut errs = Vec::new();
    if value.len() > DNS1123_SUBDOMAIN_MAX_LEN {
        errs.push(format!("must be no more than {DNS1123_SUBDOMAIN_MAX_LEN} characters"));
    }
    if !DNS1123_SUBDOMAIN.is_match(value) {
        errs.push(
            "a lowercase RFC 1123 subdomain must consist of lower case alphanumeric characters, '-' or '.', \
             and must start and end with an alphanumeric character"
                .to_owned(),
        );
    }
    errs
}

/// A name with an optional DNS subdomain prefix, e.g. `kubernetes.io/hostname`.
pub fn qualified_name(value: &str) -> Vec<String> {
    let (prefix, name) = match value.split('/').collect::<Vec<_>>().as_slice() {
        [name] => (None, *name),
        [prefix, name] => (Some(*prefix), *name),
        _ => {
            return vec![format!(
                "a qualified name must consist of alphanumeric characters, '-', '_' or '.', and must start \
                 and end with an alphanumeric character, with an optional DNS subdomain prefix and '/' \
                 (regex used for validation is '{QUALIFIED_NAME_FMT}')"
            )]
        }
    };

    let mut errs = Vec::new();
    match prefix {
        Some("") => errs.push("prefix part must be non-empty".to_owned()),
        Some(prefix) => errs.extend(dns1123_subdomain(prefix).into_iter().map(|msg| format!("prefix part {msg}"))),
        None => {}
    }

    if name.is_empty() {
        errs.push("name part must be non-empty".to_owned());
    } else {
        if name.len() > QUALIFIED_NAME_MAX_LEN {
            errs.push(format!("name part must be no more than {QUALIFIED_NAME_MAX_LEN} characters"));
        }
        if !QUALIFIED_NAME.is_match(name) {
            errs.push(format!(
                "name part must consist of alphanumeric characters, '-', '_' or '.', and must start and end \
                 with an alphanumeric character (regex used for validation is '{QUALIFIED_NAME_FMT}')"
            ));
        }
    }
    errs
}

pub fn label_value(value: &str) -> Vec<String> {
    let mut errs = Vec::new();
    if value.len() > LABEL_VALUE_MAX_LEN {
        errs.push(format!("must be no more than {LABEL_VALUE_MAX_LEN} characters"));
    }
    if !value.is_empty() && !QUALIFIED_NAME.is_match(value) {
        errs.push(format!(
            "a valid label must be an empty string or consist of alphanumeric characters, '-', '_' or '.', \
             and must start and end with an alphanumeric character (regex used for validation is \
             '({QUALIFIED_NAME_FMT})?')"
        ));
    }
    errs
}

/// Reports each problem of `value` as an Invalid error on `path`.
pub fn check(path: &FieldPath, value: &str, problems: Vec<String>) -> ErrorList {
    problems.into_iter().map(|msg| FieldError::invalid(path, value, msg)).collect()
}

pub fn validate_labels(labels: Option<&BTreeMap<String, String>>, path: &FieldPath) -> ErrorList {
    let mut errs = ErrorList::new();
    for (key, value) in labels.into_iter().flatten() {
        errs.extend(check(path, key, qualified_name(key)));
        errs.extend(check(path, value, label_value(value)));
    }
    errs
}

pub fn validate_annotations(annotations: Option<&BTreeMap<String, String>>, path: &FieldPath) -> ErrorList {
    let mut errs = ErrorList::new();
    let mut total_size = 0;
    for (key, value) in annotations.into_iter().flatten() {
        errs.extend(check(path, key, qualified_name(&key.to_lowercase())));
        total_size += key.len() + value.len();
    }
    if total_size > TOTAL_ANNOTATION_SIZE_LIMIT {
        errs.push(FieldError::invalid(
            path,
            "",
            format!("must have at most {TOTAL_ANNOTATION_SIZE_LIMIT} bytes"),
        ));
    }
    errs
}
