//! Access checks for tags that reference streams in other namespaces.

use crate::changes::tag_ref_changed;
use crate::clients::{SubjectAccessReview, SubjectAccessReviewer};
use crate::config::AccessConfig;
use crate::errors::{FieldError, FieldErrors, spec_tag_path};
use crate::reference::parse_from_reference;
use imagestream_api::{ImageStream, UserInfo};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Message used for unparseable `from.name` values.
pub(crate) const FROM_NAME_FORMAT: &str =
    "must be of the form <tag>, <repo>:<tag>, <id>, or <repo>@<id>";

/// Outcome of checking a stream's cross-namespace tags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagVerification {
    pub errors: FieldErrors,
    /// Tags that failed the check. They must not be resolved against their
    /// target, which would reveal whether it exists.
    pub rejected: BTreeSet<String>,
}

impl TagVerification {
    pub fn is_rejected(&self, tag: &str) -> bool {
        self.rejected.contains(tag)
    }
}

/// Issues one access review per newly cross-namespace tag.
#[derive(Clone)]
pub struct TagVerifier {
    reviewer: Arc<dyn SubjectAccessReviewer>,
    access: AccessConfig,
}

impl TagVerifier {
    pub fn new(reviewer: Arc<dyn SubjectAccessReviewer>, access: AccessConfig) -> Self {
        Self { reviewer, access }
    }

    /// Check every tag of `stream` that points into another namespace and is
    /// new or changed relative to `old`.
    ///
    /// Tags are checked one at a time in name order. A denied, failed or
    /// unanswered review yields a forbidden error for that tag and marks it
    /// rejected; checking continues with the next tag.
    pub async fn verify(
        &self,
        old: Option<&ImageStream>,
        stream: &ImageStream,
        user: &UserInfo,
    ) -> TagVerification {
        let mut verification = TagVerification::default();

        for (tag, tag_ref) in &stream.spec.tags {
            let Some(from) = tag_ref.from.as_ref() else {
                continue;
            };
            if from.namespace.is_empty() || from.namespace == stream.metadata.namespace {
                continue;
            }
            if let Some(old_ref) = old.and_then(|o| o.spec.tags.get(tag))
                && !tag_ref_changed(old_ref, tag_ref, &stream.metadata.namespace)
            {
                continue;
            }

            let stream_name = match parse_from_reference(stream, from) {
                Ok((stream_name, _)) => stream_name,
                Err(e) => {
                    tracing::debug!(tag = %tag, error = %e, "Unparseable cross-namespace reference");
                    verification.errors.push(FieldError::invalid(
                        format!("{}.from.name", spec_tag_path(tag)),
                        from.name.clone(),
                        FROM_NAME_FORMAT,
                    ));
                    verification.rejected.insert(tag.clone());
                    continue;
                }
            };

            let review = SubjectAccessReview {
                namespace: from.namespace.clone(),
                verb: self.access.verb.clone(),
                resource: self.access.resource.clone(),
                resource_name: stream_name.clone(),
                user: user.name.clone(),
                groups: user.groups.clone(),
            };
            tracing::info!(
                user = %user.name,
                groups = ?user.groups,
                referenced = %format!("{}/{stream_name}", from.namespace),
                "Performing access review for cross-namespace tag"
            );

            let allowed = match self.reviewer.review(&review).await {
                Ok(Some(resp)) if resp.allowed => true,
                Ok(Some(resp)) => {
                    tracing::warn!(tag = %tag, reason = %resp.reason, "Access review denied");
                    false
                }
                Ok(None) => {
                    tracing::warn!(tag = %tag, "Access review returned no response");
                    false
                }
                Err(e) => {
                    tracing::warn!(tag = %tag, error = %e, "Access review failed");
                    false
                }
            };

            if !allowed {
                verification.errors.push(FieldError::forbidden(
                    format!("{}.from", spec_tag_path(tag)),
                    format!("{}/{stream_name}", from.namespace),
                ));
                verification.rejected.insert(tag.clone());
            }
        }

        verification
    }
}
