//! Field validation for image streams.

use crate::errors::{FieldError, FieldErrors, spec_tag_path};
use crate::verifier::FROM_NAME_FORMAT;
use imagestream_api::{DockerImageReference, ImageStream, SourceRefError};

const MAX_NAME_LENGTH: usize = 253;

/// Validate a stream submitted for create.
pub fn validate_image_stream(stream: &ImageStream) -> FieldErrors {
    let mut errs = FieldErrors::new();
    validate_metadata(stream, &mut errs);

    let repository = &stream.spec.docker_image_repository;
    if !repository.is_empty() {
        match DockerImageReference::parse(repository) {
            Ok(r) if r == r.as_repository() => {}
            Ok(_) => errs.push(FieldError::invalid(
                "spec.dockerImageRepository",
                repository.clone(),
                "the repository name may not contain a tag or id",
            )),
            Err(e) => errs.push(FieldError::invalid(
                "spec.dockerImageRepository",
                repository.clone(),
                e.to_string(),
            )),
        }
    }

    for (tag, tag_ref) in &stream.spec.tags {
        let path = spec_tag_path(tag);
        if tag.is_empty() {
            errs.push(FieldError::required(path.clone()));
        }
        let Some(from) = tag_ref.from.as_ref() else {
            continue;
        };
        match from.classify() {
            Ok(_) => {}
            Err(SourceRefError::Unset) => errs.push(FieldError::required(format!("{path}.from.kind"))),
            Err(SourceRefError::UnknownKind(kind)) => errs.push(FieldError::invalid(
                format!("{path}.from.kind"),
                kind,
                "valid values are 'DockerImage', 'ImageStreamImage', 'ImageStreamTag'",
            )),
            Err(SourceRefError::MissingName) => {
                errs.push(FieldError::required(format!("{path}.from.name")))
            }
            Err(SourceRefError::MalformedName { name, .. }) => errs.push(FieldError::invalid(
                format!("{path}.from.name"),
                name,
                FROM_NAME_FORMAT,
            )),
        }
    }

    validate_status(stream, &mut errs);
    errs
}

/// Validate an update: identity is immutable and the new object must be valid.
pub fn validate_image_stream_update(stream: &ImageStream, old: &ImageStream) -> FieldErrors {
    let mut errs = FieldErrors::new();
    validate_identity_unchanged(stream, old, &mut errs);
    errs.extend(validate_image_stream(stream));
    errs
}

/// Validate a status-only update.
pub fn validate_image_stream_status_update(stream: &ImageStream, old: &ImageStream) -> FieldErrors {
    let mut errs = FieldErrors::new();
    validate_identity_unchanged(stream, old, &mut errs);
    validate_status(stream, &mut errs);
    errs
}

fn validate_metadata(stream: &ImageStream, errs: &mut FieldErrors) {
    let name = &stream.metadata.name;
    if name.is_empty() {
        errs.push(FieldError::required("metadata.name"));
    } else if !is_valid_path_segment_name(name) {
        errs.push(FieldError::invalid(
            "metadata.name",
            name.clone(),
            "must be a lowercase name of alphanumerics, '-', '.' or '_', at most 253 characters",
        ));
    }

    if stream.metadata.namespace.is_empty() {
        errs.push(FieldError::required("metadata.namespace"));
    }
}

fn validate_identity_unchanged(stream: &ImageStream, old: &ImageStream, errs: &mut FieldErrors) {
    if stream.metadata.name != old.metadata.name {
        errs.push(FieldError::invalid(
            "metadata.name",
            stream.metadata.name.clone(),
            "field is immutable",
        ));
    }
    if stream.metadata.namespace != old.metadata.namespace {
        errs.push(FieldError::invalid(
            "metadata.namespace",
            stream.metadata.namespace.clone(),
            "field is immutable",
        ));
    }
}

fn validate_status(stream: &ImageStream, errs: &mut FieldErrors) {
    for (tag, history) in &stream.status.tags {
        if tag.is_empty() {
            errs.push(FieldError::required("status.tags"));
            continue;
        }
        for (i, event) in history.items.iter().enumerate() {
            if event.docker_image_reference.is_empty() {
                errs.push(FieldError::required(format!(
                    "status.tags[{tag}].items[{i}].dockerImageReference"
                )));
            }
        }
    }
}

fn is_valid_path_segment_name(name: &str) -> bool {
    name.len() <= MAX_NAME_LENGTH
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '.' | '_'))
}
