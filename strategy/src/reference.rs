//! Parsing of `from` references that point into an image stream.

use imagestream_api::{ImageStream, ObjectReference, SourceRefError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FromReferenceError {
    #[error("invalid from.kind {0:?} - only ImageStreamTag and ImageStreamImage are allowed")]
    NotAStream(String),
    #[error(transparent)]
    Source(#[from] SourceRefError),
}

/// Split `from.name` into `(stream name, tag or id)`.
///
/// A single segment refers to `stream` itself. `DockerImage` references are
/// opaque pull specs and are rejected here.
pub fn parse_from_reference(
    stream: &ImageStream,
    from: &ObjectReference,
) -> Result<(String, String), FromReferenceError> {
    let source = from.classify()?;
    let Some((target_stream, tag_or_id)) = source.stream_target() else {
        return Err(FromReferenceError::NotAStream(from.kind.clone()));
    };
    let target_stream = target_stream.unwrap_or(stream.metadata.name.as_str());
    Ok((target_stream.to_string(), tag_or_id.to_string()))
}
