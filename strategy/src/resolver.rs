//! Turn a tag reference into the history entry it currently resolves to.

use chrono::{DateTime, Utc};
use imagestream_api::{
    ImageIdError, ImageStream, SourceRef, SourceRefError, TagEvent, TagReference,
    latest_tagged_image, resolve_image_id,
};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("the tag has no from reference")]
    MissingFrom,
    #[error(transparent)]
    Source(#[from] SourceRefError),
    #[error(transparent)]
    ImageId(#[from] ImageIdError),
}

/// Resolve `tag_ref` against `stream`.
///
/// `stream` is the stream the reference points into (the owning stream for
/// self-references) and `tag_or_id` the already parsed target. `Ok(None)`
/// means the target does not exist yet. The event is attributed to the tag
/// reference's generation when it has one.
pub fn tag_reference_to_tag_event(
    stream: &ImageStream,
    tag_ref: &TagReference,
    tag_or_id: &str,
    now: DateTime<Utc>,
) -> Result<Option<TagEvent>, ResolveError> {
    let from = tag_ref.from.as_ref().ok_or(ResolveError::MissingFrom)?;

    let event = match from.classify()? {
        SourceRef::DirectImage { name } => Some(TagEvent::new(now, name)),
        SourceRef::ImageOfStream { .. } => resolve_image_id(stream, tag_or_id, now)?,
        SourceRef::TagOfStream { .. } => latest_tagged_image(stream, tag_or_id).cloned(),
    };

    Ok(event.map(|mut event| {
        if let Some(generation) = tag_ref.generation {
            event.generation = generation;
        }
        event
    }))
}
