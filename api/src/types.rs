//! Image stream resource types.
//!
//! An image stream maps tag names to image references:
//! - **spec.tags**: desired state, one [`TagReference`] per tag
//! - **status.tags**: observed state, one [`TagEventList`] per tag, newest first
//!
//! Wire names follow the camelCase convention of the REST layer that stores
//! these objects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// `from.kind` for a literal pull spec.
pub const KIND_DOCKER_IMAGE: &str = "DockerImage";
/// `from.kind` for `<tag>` or `<stream>:<tag>`.
pub const KIND_IMAGE_STREAM_TAG: &str = "ImageStreamTag";
/// `from.kind` for `<id>` or `<stream>@<id>`.
pub const KIND_IMAGE_STREAM_IMAGE: &str = "ImageStreamImage";

/// Tag looked up when a tag reference names no tag.
pub const DEFAULT_IMAGE_TAG: &str = "latest";

/// Namespace used when a stream has none.
pub const NAMESPACE_DEFAULT: &str = "default";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    /// Incremented whenever desired state changes.
    #[serde(default)]
    pub generation: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImageStream {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: ImageStreamSpec,
    #[serde(default)]
    pub status: ImageStreamStatus,
}

impl ImageStream {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            metadata: ObjectMeta {
                name: name.into(),
                namespace: namespace.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Builder: add a spec tag
    pub fn with_spec_tag(mut self, tag: impl Into<String>, tag_ref: TagReference) -> Self {
        self.spec.tags.insert(tag.into(), tag_ref);
        self
    }

    /// Builder: set the history of a status tag
    pub fn with_status_tag(mut self, tag: impl Into<String>, items: Vec<TagEvent>) -> Self {
        self.status.tags.insert(tag.into(), TagEventList { items });
        self
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn namespace(&self) -> &str {
        &self.metadata.namespace
    }

    pub fn generation(&self) -> i64 {
        self.metadata.generation
    }
}

/// Desired state of an image stream.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImageStreamSpec {
    /// Optional user-supplied repository, shown when no default registry exists.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub docker_image_repository: String,
    #[serde(default)]
    pub tags: BTreeMap<String, TagReference>,
}

/// Observed state of an image stream.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImageStreamStatus {
    /// Derived pull location, `<registry>/<namespace>/<name>`.
    #[serde(default)]
    pub docker_image_repository: String,
    #[serde(default)]
    pub tags: BTreeMap<String, TagEventList>,
}

/// Desired state for a single tag.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TagReference {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<ObjectReference>,
    /// Record a `DockerImage` source into history without importing it.
    #[serde(default)]
    pub reference: bool,
    /// Stream generation of the edit that last set this tag. `None` means unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation: Option<i64>,
    #[serde(default)]
    pub import_policy: TagImportPolicy,
}

impl TagReference {
    pub fn from_ref(from: ObjectReference) -> Self {
        Self {
            from: Some(from),
            ..Default::default()
        }
    }

    /// Builder: set the generation
    pub fn with_generation(mut self, generation: i64) -> Self {
        self.generation = Some(generation);
        self
    }

    /// Builder: mark as a reference-only tag
    pub fn as_reference(mut self) -> Self {
        self.reference = true;
        self
    }
}

/// Import settings carried on a tag. Not interpreted by the strategy.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TagImportPolicy {
    #[serde(default)]
    pub insecure: bool,
    #[serde(default)]
    pub scheduled: bool,
}

/// The `from` field of a tag: what the tag points at.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectReference {
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub name: String,
    /// Empty means the namespace of the owning stream.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
}

impl ObjectReference {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            namespace: String::new(),
        }
    }

    pub fn docker_image(name: impl Into<String>) -> Self {
        Self::new(KIND_DOCKER_IMAGE, name)
    }

    pub fn stream_tag(name: impl Into<String>) -> Self {
        Self::new(KIND_IMAGE_STREAM_TAG, name)
    }

    pub fn stream_image(name: impl Into<String>) -> Self {
        Self::new(KIND_IMAGE_STREAM_IMAGE, name)
    }

    /// Builder: set the namespace
    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Neither kind nor name is set.
    pub fn is_unset(&self) -> bool {
        self.kind.is_empty() && self.name.is_empty()
    }

    /// Typed view of `kind`, `None` for unknown kinds.
    pub fn source_kind(&self) -> Option<SourceKind> {
        SourceKind::parse(&self.kind)
    }

    /// Namespace this reference resolves in, given the owning stream's namespace.
    pub fn effective_namespace<'a>(&'a self, stream_namespace: &'a str) -> &'a str {
        if self.namespace.is_empty() {
            stream_namespace
        } else {
            &self.namespace
        }
    }
}

/// The kinds a tag may point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// Opaque pull spec, used verbatim
    DockerImage,
    /// `<tag>` or `<stream>:<tag>`
    ImageStreamTag,
    /// `<id>` or `<stream>@<id>`
    ImageStreamImage,
}

impl SourceKind {
    pub fn parse(kind: &str) -> Option<Self> {
        match kind {
            KIND_DOCKER_IMAGE => Some(Self::DockerImage),
            KIND_IMAGE_STREAM_TAG => Some(Self::ImageStreamTag),
            KIND_IMAGE_STREAM_IMAGE => Some(Self::ImageStreamImage),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DockerImage => KIND_DOCKER_IMAGE,
            Self::ImageStreamTag => KIND_IMAGE_STREAM_TAG,
            Self::ImageStreamImage => KIND_IMAGE_STREAM_IMAGE,
        }
    }

    /// Separator between stream name and tag/id, `None` for pull specs.
    pub fn separator(&self) -> Option<char> {
        match self {
            Self::DockerImage => None,
            Self::ImageStreamTag => Some(':'),
            Self::ImageStreamImage => Some('@'),
        }
    }

    /// Noun used in error messages for the part after the separator.
    pub fn target_noun(&self) -> &'static str {
        match self {
            Self::DockerImage => "image",
            Self::ImageStreamTag => "tag",
            Self::ImageStreamImage => "id",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// History of a single tag, most recent first.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TagEventList {
    #[serde(default)]
    pub items: Vec<TagEvent>,
}

impl TagEventList {
    pub fn head(&self) -> Option<&TagEvent> {
        self.items.first()
    }

    pub fn head_mut(&mut self) -> Option<&mut TagEvent> {
        self.items.first_mut()
    }
}

/// One resolved observation of a tag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TagEvent {
    pub created: DateTime<Utc>,
    pub docker_image_reference: String,
    /// Image id (digest); empty when only the pull spec is known.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,
    /// Generation of the spec edit this observation is attributed to. 0 = unset.
    #[serde(default)]
    pub generation: i64,
}

impl TagEvent {
    pub fn new(created: DateTime<Utc>, docker_image_reference: impl Into<String>) -> Self {
        Self {
            created,
            docker_image_reference: docker_image_reference.into(),
            image: String::new(),
            generation: 0,
        }
    }

    /// Builder: set the image id
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }

    /// Builder: set the generation
    pub fn with_generation(mut self, generation: i64) -> Self {
        self.generation = generation;
        self
    }
}

/// Authenticated requester.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserInfo {
    pub name: String,
    #[serde(default)]
    pub groups: Vec<String>,
}

impl UserInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            groups: Vec::new(),
        }
    }

    /// Builder: set groups
    pub fn with_groups(mut self, groups: Vec<String>) -> Self {
        self.groups = groups;
        self
    }
}
