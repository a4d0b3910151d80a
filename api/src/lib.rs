//! Image stream data model.
//!
//! Types exchanged between the storage layer and the mutation strategy, plus
//! the helpers that read and extend per-tag history.

pub mod history;
pub mod reference;
pub mod source;
pub mod types;

pub use history::{
    ImageIdError, add_tag_event_to_image_stream, latest_tagged_image, resolve_image_id,
    split_image_stream_tag, update_changed_tracking_tags, update_tracking_tags,
};
pub use reference::{DockerImageReference, DockerReferenceError};
pub use source::{SourceRef, SourceRefError};
pub use types::{
    DEFAULT_IMAGE_TAG, ImageStream, ImageStreamSpec, ImageStreamStatus, KIND_DOCKER_IMAGE,
    KIND_IMAGE_STREAM_IMAGE, KIND_IMAGE_STREAM_TAG, NAMESPACE_DEFAULT, ObjectMeta,
    ObjectReference, SourceKind, TagEvent, TagEventList, TagImportPolicy, TagReference, UserInfo,
};
