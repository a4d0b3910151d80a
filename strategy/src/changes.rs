//! Change detection between two versions of a tag.

use imagestream_api::{TagEvent, TagReference};

/// Whether `next` points somewhere other than `old`, or asks to be re-resolved.
///
/// An unset `from` on `next` never counts as a change. Namespaces are
/// compared after defaulting empty values to `stream_namespace`.
pub fn tag_ref_changed(old: &TagReference, next: &TagReference, stream_namespace: &str) -> bool {
    let Some(next_from) = next.from.as_ref() else {
        return false;
    };
    if next_from.is_unset() {
        return false;
    }

    let (old_namespace, old_name) = match old.from.as_ref() {
        Some(from) => (from.effective_namespace(stream_namespace), from.name.as_str()),
        None => (stream_namespace, ""),
    };

    if old_namespace != next_from.effective_namespace(stream_namespace) {
        return true;
    }
    if old_name != next_from.name {
        return true;
    }
    tag_ref_generation_changed(old, next)
}

/// True only when both generations are set, they differ, and `next` is 0.
pub fn tag_ref_generation_changed(old: &TagReference, next: &TagReference) -> bool {
    match (old.generation, next.generation) {
        (Some(old_gen), Some(next_gen)) if old_gen == next_gen => false,
        (Some(_), Some(0)) => true,
        _ => false,
    }
}

/// Whether a status event records a different image than the previous head.
/// Generations are not compared.
pub fn tag_event_changed(old: &TagEvent, next: &TagEvent) -> bool {
    old.image != next.image || old.docker_image_reference != next.docker_image_reference
}
