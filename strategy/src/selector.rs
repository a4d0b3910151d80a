//! Label and field selectors for listing and watching image streams.

use imagestream_api::ImageStream;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
    #[error("invalid selector requirement {0:?}: expected key=value, key==value or key!=value")]
    InvalidRequirement(String),
    #[error("selector requirement {0:?} has an empty key")]
    EmptyKey(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Equals,
    NotEquals,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Requirement {
    key: String,
    op: Operator,
    value: String,
}

impl Requirement {
    fn matches(&self, value: Option<&str>) -> bool {
        match self.op {
            Operator::Equals => value == Some(self.value.as_str()),
            Operator::NotEquals => value != Some(self.value.as_str()),
        }
    }
}

/// Comma-separated equality requirements, all of which must hold.
///
/// An empty selector matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    requirements: Vec<Requirement>,
}

impl Selector {
    /// Selector that matches every stream.
    pub fn everything() -> Self {
        Self::default()
    }

    pub fn parse(input: &str) -> Result<Self, SelectorError> {
        let mut requirements = Vec::new();
        for raw in input.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let (key, op, value) = if let Some((k, v)) = raw.split_once("!=") {
                (k, Operator::NotEquals, v)
            } else if let Some((k, v)) = raw.split_once("==") {
                (k, Operator::Equals, v)
            } else if let Some((k, v)) = raw.split_once('=') {
                (k, Operator::Equals, v)
            } else {
                return Err(SelectorError::InvalidRequirement(raw.to_string()));
            };

            let key = key.trim();
            if key.is_empty() {
                return Err(SelectorError::EmptyKey(raw.to_string()));
            }
            requirements.push(Requirement {
                key: key.to_string(),
                op,
                value: value.trim().to_string(),
            });
        }
        Ok(Self { requirements })
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    /// Evaluate against a key lookup. Absent keys only satisfy `!=`.
    pub fn matches<'a>(&self, lookup: impl Fn(&str) -> Option<&'a str>) -> bool {
        self.requirements.iter().all(|r| r.matches(lookup(&r.key)))
    }
}

/// Fields a field selector may reference.
pub fn selectable_fields(stream: &ImageStream) -> BTreeMap<&'static str, &str> {
    BTreeMap::from([
        ("metadata.name", stream.metadata.name.as_str()),
        ("metadata.namespace", stream.metadata.namespace.as_str()),
        (
            "spec.dockerImageRepository",
            stream.spec.docker_image_repository.as_str(),
        ),
        (
            "status.dockerImageRepository",
            stream.status.docker_image_repository.as_str(),
        ),
    ])
}

/// Whether `stream` satisfies both selectors.
pub fn matches(stream: &ImageStream, labels: &Selector, fields: &Selector) -> bool {
    if !labels.matches(|key| stream.metadata.labels.get(key).map(String::as_str)) {
        return false;
    }
    let selectable = selectable_fields(stream);
    fields.matches(|key| selectable.get(key).copied())
}
