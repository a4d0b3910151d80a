//! Collaborators the strategy calls out to.
//!
//! The storage layer provides implementations of these traits; the strategy
//! only depends on the traits, never on a concrete store or policy engine.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use imagestream_api::{ImageStream, UserInfo};
use thiserror::Error;

// ─────────────────────────────────────────────────────────────────────────────
// Request context
// ─────────────────────────────────────────────────────────────────────────────

/// Per-request data handed to validation.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Authenticated requester, if any
    pub user: Option<UserInfo>,
    /// Namespace the request was made in
    pub namespace: String,
}

impl RequestContext {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            user: None,
            namespace: namespace.into(),
        }
    }

    /// Builder: attach the requester
    pub fn with_user(mut self, user: UserInfo) -> Self {
        self.user = Some(user);
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Stream lookup
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("image stream {namespace}/{name} not found")]
    NotFound { namespace: String, name: String },
    #[error("{0}")]
    Other(String),
}

impl LookupError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Fetches other image streams by namespace and name.
#[async_trait]
pub trait ImageStreamGetter: Send + Sync {
    async fn get(&self, namespace: &str, name: &str) -> Result<ImageStream, LookupError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Access review
// ─────────────────────────────────────────────────────────────────────────────

/// "Can `user` perform `verb` on `resource/resource_name` in `namespace`?"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectAccessReview {
    pub namespace: String,
    pub verb: String,
    pub resource: String,
    pub resource_name: String,
    pub user: String,
    pub groups: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubjectAccessReviewResponse {
    pub allowed: bool,
    pub reason: String,
}

impl SubjectAccessReviewResponse {
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            reason: String::new(),
        }
    }

    pub fn denied(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("access review failed: {0}")]
pub struct ReviewError(pub String);

/// Authorization service. `Ok(None)` means the service gave no answer.
#[async_trait]
pub trait SubjectAccessReviewer: Send + Sync {
    async fn review(
        &self,
        review: &SubjectAccessReview,
    ) -> Result<Option<SubjectAccessReviewResponse>, ReviewError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Default registry and clock
// ─────────────────────────────────────────────────────────────────────────────

/// Source of the registry host used for `status.dockerImageRepository`.
pub trait DefaultRegistry: Send + Sync {
    /// Host or host:port, `None` when no registry is available.
    fn default_registry(&self) -> Option<String>;
}

/// Adapts a closure into a [`DefaultRegistry`].
pub struct DefaultRegistryFn<F>(pub F);

impl<F> DefaultRegistry for DefaultRegistryFn<F>
where
    F: Fn() -> Option<String> + Send + Sync,
{
    fn default_registry(&self) -> Option<String> {
        (self.0)()
    }
}

/// Fixed registry host, typically from [`crate::StrategyConfig`].
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry(Option<String>);

impl StaticRegistry {
    pub fn new(host: Option<String>) -> Self {
        Self(host.filter(|h| !h.trim().is_empty()))
    }
}

impl DefaultRegistry for StaticRegistry {
    fn default_registry(&self) -> Option<String> {
        self.0.clone()
    }
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
