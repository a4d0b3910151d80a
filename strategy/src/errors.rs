//! Strategy error types
//!
//! Two layers:
//! - [`StrategyError`]: operation-level failures (config, missing user)
//! - [`FieldError`]: field-scoped problems collected into [`FieldErrors`]
//!   and returned together; a non-empty list rejects the whole mutation.

use thiserror::Error;

/// Kind of a field-scoped error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldErrorKind {
    /// Malformed value, or a lookup/resolution that failed
    Invalid,
    /// Referenced object does not exist
    NotFound,
    /// Requester may not reference the target
    Forbidden,
    /// Value must be set
    Required,
}

impl FieldErrorKind {
    /// Machine-readable code for logging
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Invalid => "FieldValueInvalid",
            Self::NotFound => "FieldValueNotFound",
            Self::Forbidden => "FieldValueForbidden",
            Self::Required => "FieldValueRequired",
        }
    }
}

impl std::fmt::Display for FieldErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A problem with one field of the submitted stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {}", self.describe())]
pub struct FieldError {
    pub kind: FieldErrorKind,
    /// Field path, e.g. `spec.tags[latest].from.name`
    pub field: String,
    /// Offending value, rendered for display
    pub value: String,
    pub detail: String,
}

impl FieldError {
    pub fn invalid(
        field: impl Into<String>,
        value: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            kind: FieldErrorKind::Invalid,
            field: field.into(),
            value: value.into(),
            detail: detail.into(),
        }
    }

    pub fn not_found(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: FieldErrorKind::NotFound,
            field: field.into(),
            value: value.into(),
            detail: String::new(),
        }
    }

    /// `value` names the target the requester was denied.
    pub fn forbidden(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: FieldErrorKind::Forbidden,
            field: field.into(),
            value: value.into(),
            detail: String::new(),
        }
    }

    pub fn required(field: impl Into<String>) -> Self {
        Self {
            kind: FieldErrorKind::Required,
            field: field.into(),
            value: String::new(),
            detail: String::new(),
        }
    }

    fn describe(&self) -> String {
        match self.kind {
            FieldErrorKind::Invalid => format!("invalid value {:?}: {}", self.value, self.detail),
            FieldErrorKind::NotFound => format!("not found {:?}", self.value),
            FieldErrorKind::Forbidden if self.detail.is_empty() => {
                format!("forbidden {:?}", self.value)
            }
            FieldErrorKind::Forbidden => format!("forbidden {:?}: {}", self.value, self.detail),
            FieldErrorKind::Required => "required value".to_string(),
        }
    }
}

/// Field path of a spec tag, `spec.tags[<tag>]`.
pub fn spec_tag_path(tag: &str) -> String {
    format!("spec.tags[{tag}]")
}

/// Ordered collection of field errors for one mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(Vec<FieldError>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, err: FieldError) {
        tracing::debug!(
            kind = err.kind.as_str(),
            field = %err.field,
            value = %err.value,
            "Rejected field"
        );
        self.0.push(err);
    }

    pub fn extend(&mut self, other: FieldErrors) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FieldError> {
        self.0.iter()
    }

    /// Errors for a field path (exact match).
    pub fn for_field<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a FieldError> + 'a {
        self.0.iter().filter(move |e| e.field == field)
    }

    /// `Ok(())` when empty, otherwise the whole list.
    pub fn into_result(self) -> std::result::Result<(), FieldErrors> {
        if self.0.is_empty() { Ok(()) } else { Err(self) }
    }

    pub fn into_vec(self) -> Vec<FieldError> {
        self.0
    }
}

impl From<FieldError> for FieldErrors {
    fn from(err: FieldError) -> Self {
        Self(vec![err])
    }
}

impl IntoIterator for FieldErrors {
    type Item = FieldError;
    type IntoIter = std::vec::IntoIter<FieldError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a FieldErrors {
    type Item = &'a FieldError;
    type IntoIter = std::slice::Iter<'a, FieldError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        f.write_str(&parts.join("; "))
    }
}

/// Operation-level failure.
#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("config error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// No authenticated user was attached to the request.
    #[error("unable to update image stream {name:?} without a user on the context")]
    AuthContext { name: String },
}

impl StrategyError {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// Create a config error with source
    pub fn config_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn auth_context(name: impl Into<String>) -> Self {
        Self::AuthContext { name: name.into() }
    }

    /// Render as a single field error so it can be returned with validation results.
    pub fn to_field_error(&self) -> FieldError {
        match self {
            Self::AuthContext { name } => FieldError {
                kind: FieldErrorKind::Forbidden,
                field: "metadata.name".to_string(),
                value: name.clone(),
                detail: self.to_string(),
            },
            Self::Config { message, .. } => {
                FieldError::invalid("metadata", String::new(), message.clone())
            }
        }
    }
}

/// Result type for strategy operations
pub type Result<T> = std::result::Result<T, StrategyError>;
