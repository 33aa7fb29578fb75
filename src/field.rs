//! Field-addressed validation errors.
//!
//! Errors render the way the Kubernetes API server reports them, e.g.
//! `spec.subsets[1].name: Invalid value: "zone-a": duplicated subset name zone-a`,
//! so that a denied admission request reads the same as a server-side rejection.

use std::fmt;

/// Path from the object root to the field an error refers to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FieldPath {
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Child(String),
    Index(usize),
    Key(String),
}

impl FieldPath {
    pub fn new(name: impl Into<String>) -> Self {
        Self { segments: vec![Segment::Child(name.into())] }
    }

    pub fn child(&self, name: impl Into<String>) -> Self { self.with(Segment::Child(name.into())) }

    pub fn index(&self, index: usize) -> Self { self.with(Segment::Index(index)) }

    /// Addresses a map entry, rendered as `labels[app]`.
    pub fn key(&self, key: impl Into<String>) -> Self { self.with(Segment::Key(key.into())) }

    fn with(&self, segment: Segment) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment);
        Self { segments }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Child(name) if i == 0 => f.write_str(name)?,
                Segment::Child(name) => write!(f, ".{name}")?,
                Segment::Index(index) => write!(f, "[{index}]")?,
                Segment::Key(key) => write!(f, "[{key}]")?,
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A mandatory field is absent.
    Required,
    /// A field is present but its value violates a rule.
    Invalid,
    /// A dependency of the validator failed; says nothing about the object.
    InternalError,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldError {
    pub kind:   ErrorKind,
    pub field:  FieldPath,
    /// The offending value, kept as JSON so any field type can be reported.
    pub value:  serde_json::Value,
    pub detail: String,
}

pub type ErrorList = Vec<FieldError>;

impl FieldError {
    pub fn required(field: &FieldPath, detail: impl Into<String>) -> Self {
        Self {
            kind:   ErrorKind::Required,
            field:  field.clone(),
            value:  serde_json::Value::Null,
            detail: detail.into(),
        }
    }

    pub fn invalid(field: &FieldPath, value: impl serde::Serialize, detail: impl Into<String>) -> Self {
        Self {
            kind:   ErrorKind::Invalid,
            field:  field.clone(),
            value:  serde_json::to_value(value).unwrap_or_default(),
            detail: detail.into(),
        }
    }

    pub fn internal(field: &FieldPath, error: impl fmt::Display) -> Self {
        Self {
            kind:   ErrorKind::InternalError,
            field:  field.clone(),
            value:  serde_json::Value::Null,
            detail: error.to_string(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", self.field)?;
        match self.kind {
            ErrorKind::Required => f.write_str("Required value")?,
            ErrorKind::InternalError => f.write_str("Internal error")?,
            ErrorKind::Invalid => write!(f, "Invalid value: {}", self.value)?,
        }
        if !self.detail.is_empty() {
            write!(f, ": {}", self.detail)?;
        }
        Ok(())
    }
}

/// Folds an error list into one message, or `None` if there is nothing to report.
pub fn aggregate(errors: &[FieldError]) -> Option<String> {
    match errors {
        [] => None,
        [single] => Some(single.to_string()),
        many => {
            let messages: Vec<_> = many.iter().map(ToString::to_string).collect();
            Some(format!("[{}]", messages.join(", ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_renders_children_indices_and_keys() {
        let path = FieldPath::new("spec").child("subsets").index(2).child("patch");
        assert_eq!(path.to_string(), "spec.subsets[2].patch");

        let labels = FieldPath::new("metadata").child("labels").key("app");
        assert_eq!(labels.to_string(), "metadata.labels[app]");
    }

    #[test]
    fn errors_render_like_the_api_server() {
        let path = FieldPath::new("spec").child("subsets").index(1).child("name");
        let err = FieldError::invalid(&path, "zone-a", "duplicated subset name zone-a");
        assert_eq!(
            err.to_string(),
            r#"spec.subsets[1].name: Invalid value: "zone-a": duplicated subset name zone-a"#
        );

        let err = FieldError::required(&FieldPath::new("spec").child("subsets"), "must not be empty");
        assert_eq!(err.to_string(), "spec.subsets: Required value: must not be empty");

        let err = FieldError::internal(&FieldPath::new("spec").child("targetRef"), "connection refused");
        assert_eq!(err.to_string(), "spec.targetRef: Internal error: connection refused");
    }

    #[test]
    fn aggregate_brackets_multiple_errors() {
        assert_eq!(aggregate(&[]), None);

        let path = FieldPath::new("spec");
        let one = FieldError::required(&path, "a");
        assert_eq!(aggregate(&[one.clone()]).as_deref(), Some("spec: Required value: a"));

        let two = FieldError::required(&path, "b");
        assert_eq!(
            aggregate(&[one, two]).as_deref(),
            Some("[spec: Required value: a, spec: Required value: b]")
        );
    }
}
