//! Typed view of a tag's `from` reference.

use crate::types::{ObjectReference, SourceKind};
use thiserror::Error;

/// What a tag points at, with the fields each kind requires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceRef {
    /// Pull spec recorded verbatim
    DirectImage { name: String },
    /// A tag of the owning stream (`stream == None`) or of another stream
    TagOfStream { stream: Option<String>, tag: String },
    /// An image id of the owning stream (`stream == None`) or of another stream
    ImageOfStream { stream: Option<String>, id: String },
}

impl SourceRef {
    pub fn kind(&self) -> SourceKind {
        match self {
            Self::DirectImage { .. } => SourceKind::DockerImage,
            Self::TagOfStream { .. } => SourceKind::ImageStreamTag,
            Self::ImageOfStream { .. } => SourceKind::ImageStreamImage,
        }
    }

    /// `(stream, tag or id)` for stream references, `None` for pull specs.
    pub fn stream_target(&self) -> Option<(Option<&str>, &str)> {
        match self {
            Self::DirectImage { .. } => None,
            Self::TagOfStream { stream, tag } => Some((stream.as_deref(), tag.as_str())),
            Self::ImageOfStream { stream, id } => Some((stream.as_deref(), id.as_str())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceRefError {
    #[error("from has neither kind nor name")]
    Unset,
    #[error("invalid from.kind {0:?} - valid values are DockerImage, ImageStreamTag, ImageStreamImage")]
    UnknownKind(String),
    #[error("from.name must not be empty")]
    MissingName,
    #[error("invalid from.name {name:?} - it must be of the form <{noun}> or <stream>{sep}<{noun}>")]
    MalformedName {
        name: String,
        noun: &'static str,
        sep: char,
    },
}

impl ObjectReference {
    /// Classify by kind and check the name has the parts that kind needs.
    pub fn classify(&self) -> Result<SourceRef, SourceRefError> {
        if self.is_unset() {
            return Err(SourceRefError::Unset);
        }
        let kind = self
            .source_kind()
            .ok_or_else(|| SourceRefError::UnknownKind(self.kind.clone()))?;
        if self.name.is_empty() {
            return Err(SourceRefError::MissingName);
        }
        let Some(sep) = kind.separator() else {
            return Ok(SourceRef::DirectImage {
                name: self.name.clone(),
            });
        };

        let (stream, target) = match self.name.split(sep).collect::<Vec<_>>().as_slice() {
            [target] => (None, *target),
            [stream, target] if !stream.is_empty() && !target.is_empty() => {
                (Some((*stream).to_string()), *target)
            }
            _ => {
                return Err(SourceRefError::MalformedName {
                    name: self.name.clone(),
                    noun: kind.target_noun(),
                    sep,
                });
            }
        };
        let target = target.to_string();

        Ok(match kind {
            SourceKind::ImageStreamImage => SourceRef::ImageOfStream { stream, id: target },
            _ => SourceRef::TagOfStream { stream, tag: target },
        })
    }
}
