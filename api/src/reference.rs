//! Docker pull spec parsing and formatting.
//!
//! A pull spec has the shape `[registry/][namespace/]name[:tag][@id]`. The
//! first segment is treated as a registry host when it contains `.` or `:`
//! or is `localhost`.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DockerReferenceError {
    #[error("the docker pull spec is empty")]
    Empty,
    #[error("the docker pull spec {0:?} has an empty path segment")]
    EmptySegment(String),
    #[error("the docker pull spec {0:?} has an empty tag or id")]
    EmptySuffix(String),
}

/// Parsed form of a pull spec.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DockerImageReference {
    pub registry: String,
    pub namespace: String,
    pub name: String,
    pub tag: String,
    pub id: String,
}

impl DockerImageReference {
    pub fn new(
        registry: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            registry: registry.into(),
            namespace: namespace.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn parse(spec: &str) -> Result<Self, DockerReferenceError> {
        if spec.is_empty() {
            return Err(DockerReferenceError::Empty);
        }

        let (path, id) = match spec.split_once('@') {
            Some((_, "")) => {
                return Err(DockerReferenceError::EmptySuffix(spec.to_string()));
            }
            Some((path, id)) => (path, id.to_string()),
            None => (spec, String::new()),
        };

        // A ':' after the last '/' separates the tag; earlier ones belong to a registry port.
        let last_slash = path.rfind('/').map_or(0, |i| i + 1);
        let (path, tag) = match path[last_slash..].rfind(':') {
            Some(i) => {
                let tag = &path[last_slash + i + 1..];
                if tag.is_empty() {
                    return Err(DockerReferenceError::EmptySuffix(spec.to_string()));
                }
                (&path[..last_slash + i], tag.to_string())
            }
            None => (path, String::new()),
        };

        let segments: Vec<&str> = path.split('/').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(DockerReferenceError::EmptySegment(spec.to_string()));
        }

        let mut reference = match segments.as_slice() {
            [name] => Self::new("", "", *name),
            [first, name] if is_registry_host(first) => Self::new(*first, "", *name),
            [namespace, name] => Self::new("", *namespace, *name),
            [registry, namespace, rest @ ..] => Self::new(*registry, *namespace, rest.join("/")),
            [] => return Err(DockerReferenceError::Empty),
        };
        reference.tag = tag;
        reference.id = id;
        Ok(reference)
    }

    /// Copy without tag and id.
    pub fn as_repository(&self) -> Self {
        Self::new(
            self.registry.clone(),
            self.namespace.clone(),
            self.name.clone(),
        )
    }
}

fn is_registry_host(segment: &str) -> bool {
    segment.contains('.') || segment.contains(':') || segment == "localhost"
}

impl std::fmt::Display for DockerImageReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut wrote = false;
        for part in [&self.registry, &self.namespace, &self.name] {
            if part.is_empty() {
                continue;
            }
            if wrote {
                f.write_str("/")?;
            }
            f.write_str(part)?;
            wrote = true;
        }
        if !self.tag.is_empty() {
            write!(f, ":{}", self.tag)?;
        }
        if !self.id.is_empty() {
            write!(f, "@{}", self.id)?;
        }
        Ok(())
    }
}
