//! Generation bookkeeping for image stream mutations.
//!
//! The stream generation advances by one whenever desired state changes.
//! Each spec tag records the stream generation of the edit that last set it,
//! and each status event records the spec generation it was observed for.
//!
//! End users cannot move a tag generation forward directly. Sending `0` is the
//! only way to ask for a tag to be re-stamped (and therefore re-resolved).

use crate::changes::{tag_event_changed, tag_ref_changed};
use imagestream_api::{ImageStream, TagReference};
use std::collections::BTreeMap;

/// How a spec update treats the incoming object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecUpdateMode {
    /// Replace the incoming status with the stored one
    pub reset_status: bool,
    /// Force caller-supplied tag generations back to the stored values
    pub pin_generations: bool,
}

impl SpecUpdateMode {
    /// End-user update through the main resource.
    pub const USER: Self = Self {
        reset_status: true,
        pin_generations: true,
    };

    /// Trusted caller that writes spec and status together.
    pub const INTERNAL: Self = Self {
        reset_status: false,
        pin_generations: false,
    };
}

/// Stamp a new stream: generation 1 on the stream and on every spec tag.
pub fn stamp_for_create(stream: &mut ImageStream) {
    stream.metadata.generation = 1;
    for tag_ref in stream.spec.tags.values_mut() {
        tag_ref.generation = Some(1);
    }
}

/// Carry generations forward from `old` and advance them if the spec changed.
pub fn prepare_spec_update(stream: &mut ImageStream, old: &ImageStream, mode: SpecUpdateMode) {
    stream.metadata.generation = old.metadata.generation;
    if mode.reset_status {
        stream.status = old.status.clone();
    }

    if mode.pin_generations {
        pin_spec_tag_generations(stream, old);
    }

    if stream.spec != old.spec || stream.metadata.generation == 0 {
        stream.metadata.generation = old.metadata.generation + 1;
        tracing::debug!(
            namespace = %stream.metadata.namespace,
            name = %stream.metadata.name,
            generation = stream.metadata.generation,
            "Image stream spec changed, advancing generation"
        );
    }

    // Stamped after the comparison so legacy tags without generations do not
    // bump the stream generation on their own.
    ensure_spec_tag_generations_are_set(stream, Some(old));
}

/// Replace every tag generation except an explicit `0` with the stored value.
///
/// Tags that did not exist in `old` keep whatever the caller sent; the
/// stamping step treats them as new regardless.
pub fn pin_spec_tag_generations(stream: &mut ImageStream, old: &ImageStream) {
    for (tag, tag_ref) in stream.spec.tags.iter_mut() {
        if tag_ref.generation == Some(0) {
            continue;
        }
        if let Some(old_ref) = old.spec.tags.get(tag) {
            tag_ref.generation = old_ref.generation;
        }
    }
}

/// Give every tag that is new, changed, unset or zero the stream generation.
pub fn ensure_spec_tag_generations_are_set(stream: &mut ImageStream, old: Option<&ImageStream>) {
    let empty = BTreeMap::new();
    let old_tags: &BTreeMap<String, TagReference> = old.map_or(&empty, |o| &o.spec.tags);
    let generation = stream.metadata.generation;
    let namespace = &stream.metadata.namespace;

    for (tag, tag_ref) in stream.spec.tags.iter_mut() {
        let is_new_or_changed = match old_tags.get(tag) {
            Some(old_ref) => tag_ref_changed(old_ref, tag_ref, namespace),
            None => true,
        };
        if !is_new_or_changed && tag_ref.generation.is_some_and(|g| g != 0) {
            continue;
        }
        tracing::trace!(tag = %tag, generation, "Stamping spec tag generation");
        tag_ref.generation = Some(generation);
    }
}

/// Status-only update: keep the stored spec and attribute fresh status events.
///
/// A head event with generation 0 that matches the stored head is bookkeeping
/// and gets the stream generation. A new observation gets the generation of
/// the spec tag that produced it, or the stream generation if that tag has
/// none. The stream generation is owned by spec writes and is carried over
/// from the stored object.
pub fn prepare_status_update(stream: &mut ImageStream, old: &ImageStream) {
    stream.spec = old.spec.clone();
    stream.metadata.generation = old.metadata.generation;
    update_observed_generation_for_status_update(stream, old);
}

pub fn update_observed_generation_for_status_update(stream: &mut ImageStream, old: &ImageStream) {
    let stream_generation = stream.metadata.generation;

    for (tag, history) in stream.status.tags.iter_mut() {
        let Some(head) = history.head_mut() else {
            continue;
        };
        if head.generation != 0 {
            continue;
        }

        let old_head = old.status.tags.get(tag).and_then(|h| h.head());
        let unchanged = old_head.is_none_or(|prev| !tag_event_changed(prev, head));
        head.generation = if unchanged {
            stream_generation
        } else {
            stream
                .spec
                .tags
                .get(tag)
                .and_then(|spec| spec.generation)
                .unwrap_or(stream_generation)
        };
        tracing::trace!(
            tag = %tag,
            generation = head.generation,
            unchanged,
            "Stamped observed status generation"
        );
    }
}
