//! Tag history helpers.
//!
//! Status histories are kept most-recent-first. New observations are
//! prepended; an observation identical to the current head is dropped.

use crate::types::{
    DEFAULT_IMAGE_TAG, ImageStream, KIND_IMAGE_STREAM_TAG, TagEvent, TagEventList,
};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageIdError {
    #[error("an image id must not be empty")]
    Empty,
    #[error("multiple images match the prefix {prefix:?}: {}", .matches.join(", "))]
    Ambiguous {
        prefix: String,
        matches: Vec<String>,
    },
}

/// Most recent event of `tag`, or of `latest` when `tag` is empty.
pub fn latest_tagged_image<'a>(stream: &'a ImageStream, tag: &str) -> Option<&'a TagEvent> {
    let tag = if tag.is_empty() { DEFAULT_IMAGE_TAG } else { tag };
    stream.status.tags.get(tag).and_then(TagEventList::head)
}

/// Find the image whose id equals or starts with `image_id` anywhere in the
/// stream's history.
///
/// Returns a fresh event stamped `now` when exactly one image matches and
/// `Ok(None)` when none does. Digest-form ids (`sha256:<hex>`) also match on
/// a prefix of the hex part.
pub fn resolve_image_id(
    stream: &ImageStream,
    image_id: &str,
    now: DateTime<Utc>,
) -> Result<Option<TagEvent>, ImageIdError> {
    if image_id.is_empty() {
        return Err(ImageIdError::Empty);
    }

    let mut found: Option<&TagEvent> = None;
    let mut matches = BTreeSet::new();
    for history in stream.status.tags.values() {
        for event in &history.items {
            if event.image.is_empty() {
                continue;
            }
            let hex_match = event
                .image
                .split_once(':')
                .is_some_and(|(_, hex)| hex.starts_with(image_id));
            if hex_match || event.image.starts_with(image_id) {
                found = Some(event);
                matches.insert(event.image.clone());
            }
        }
    }

    match (matches.len(), found) {
        (0, _) | (_, None) => Ok(None),
        (1, Some(event)) => Ok(Some(TagEvent {
            created: now,
            docker_image_reference: event.docker_image_reference.clone(),
            image: event.image.clone(),
            generation: 0,
        })),
        _ => Err(ImageIdError::Ambiguous {
            prefix: image_id.to_string(),
            matches: matches.into_iter().collect(),
        }),
    }
}

/// Prepend `next` to the history of `tag`.
///
/// Returns false when the head already records the same reference, image and
/// generation. A head with the same reference and image but a different
/// generation is replaced in place.
pub fn add_tag_event_to_image_stream(stream: &mut ImageStream, tag: &str, next: TagEvent) -> bool {
    let history = stream.status.tags.entry(tag.to_string()).or_default();
    let Some(previous) = history.head_mut() else {
        history.items.push(next);
        return true;
    };

    let same_ref = previous.docker_image_reference == next.docker_image_reference;
    let same_image = previous.image == next.image;
    match (same_ref && same_image, previous.generation == next.generation) {
        (true, true) => false,
        (true, false) => {
            *previous = next;
            true
        }
        _ => {
            history.items.insert(0, next);
            true
        }
    }
}

/// Split `<stream>:<tag>` into its parts. A bare name is a tag of the same
/// stream and yields an empty stream name.
pub fn split_image_stream_tag(name: &str) -> Option<(&str, &str)> {
    match name.split(':').collect::<Vec<_>>().as_slice() {
        [tag] => Some(("", tag)),
        [stream, tag] => Some((stream, tag)),
        _ => None,
    }
}

/// Copy `updated_image` into every spec tag that tracks `updated_tag` in the
/// same stream. Returns the number of histories changed.
pub fn update_tracking_tags(
    stream: &mut ImageStream,
    updated_tag: &str,
    updated_image: &TagEvent,
) -> usize {
    tracing::trace!(
        stream = %format!("{}/{}", stream.metadata.namespace, stream.metadata.name),
        updated_tag,
        reference = %updated_image.docker_image_reference,
        "Updating tracking tags"
    );

    let trackers: Vec<String> = stream
        .spec
        .tags
        .iter()
        .filter_map(|(spec_tag, tag_ref)| {
            let from = tag_ref.from.as_ref()?;
            if from.kind != KIND_IMAGE_STREAM_TAG {
                return None;
            }
            if !from.namespace.is_empty() && from.namespace != stream.metadata.namespace {
                return None;
            }
            let (stream_name, tag_name) = split_image_stream_tag(&from.name)?;
            if !stream_name.is_empty() && stream_name != stream.metadata.name {
                return None;
            }
            if tag_name != updated_tag || spec_tag == updated_tag {
                return None;
            }
            Some(spec_tag.clone())
        })
        .collect();

    trackers
        .into_iter()
        .filter(|tag| add_tag_event_to_image_stream(stream, tag, updated_image.clone()))
        .count()
}

/// Propagate every status tag whose head reference differs from `old` to the
/// tags tracking it.
pub fn update_changed_tracking_tags(stream: &mut ImageStream, old: Option<&ImageStream>) -> usize {
    if stream.spec.tags.is_empty() {
        return 0;
    }

    let changed: Vec<(String, TagEvent)> = stream
        .status
        .tags
        .iter()
        .filter_map(|(tag, history)| {
            let head = history.head()?;
            let old_head = old
                .and_then(|o| o.status.tags.get(tag))
                .and_then(TagEventList::head);
            match old_head {
                Some(prev) if prev.docker_image_reference == head.docker_image_reference => None,
                _ => Some((tag.clone(), head.clone())),
            }
        })
        .collect();

    changed
        .iter()
        .map(|(tag, head)| update_tracking_tags(stream, tag, head))
        .sum()
}
