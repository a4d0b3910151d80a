//! Create, update and validation hooks for image streams.
//!
//! [`Strategy`] handles end-user writes through the main resource,
//! [`StatusStrategy`] handles writes to the status subresource, and
//! [`InternalStrategy`] is for trusted callers that write spec and status
//! together.

use crate::changes::tag_ref_changed;
use crate::clients::{
    Clock, DefaultRegistry, ImageStreamGetter, LookupError, RequestContext, StaticRegistry,
    SubjectAccessReviewer, SystemClock,
};
use crate::config::StrategyConfig;
use crate::errors::{FieldError, FieldErrors, Result, StrategyError, spec_tag_path};
use crate::generation::{
    SpecUpdateMode, prepare_spec_update, prepare_status_update, stamp_for_create,
};
use crate::resolver::tag_reference_to_tag_event;
use crate::selector::{self, Selector};
use crate::validation::{
    validate_image_stream, validate_image_stream_status_update, validate_image_stream_update,
};
use crate::verifier::TagVerifier;
use imagestream_api::{
    DockerImageReference, ImageStream, ImageStreamStatus, TagReference,
    add_tag_event_to_image_stream, update_changed_tracking_tags,
};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Image stream strategy for end-user writes.
#[derive(Clone)]
pub struct Strategy {
    registry: Arc<dyn DefaultRegistry>,
    verifier: TagVerifier,
    getter: Arc<dyn ImageStreamGetter>,
    clock: Arc<dyn Clock>,
    config: StrategyConfig,
}

impl Strategy {
    /// Create a strategy from the config file (see [`StrategyConfig::load`]).
    pub fn new(
        reviewer: Arc<dyn SubjectAccessReviewer>,
        getter: Arc<dyn ImageStreamGetter>,
    ) -> Result<Self> {
        let config = StrategyConfig::load()?;
        let strategy = Self::with_config(config, reviewer, getter);

        tracing::info!(
            version = crate::VERSION,
            default_registry = ?strategy.config.default_registry,
            "Image stream strategy initialized"
        );
        Ok(strategy)
    }

    /// Create a strategy with a specific config. The registry comes from
    /// `default_registry` and time from the system clock.
    pub fn with_config(
        config: StrategyConfig,
        reviewer: Arc<dyn SubjectAccessReviewer>,
        getter: Arc<dyn ImageStreamGetter>,
    ) -> Self {
        Self {
            registry: Arc::new(StaticRegistry::new(config.default_registry.clone())),
            verifier: TagVerifier::new(reviewer, config.access.clone()),
            getter,
            clock: Arc::new(SystemClock),
            config,
        }
    }

    /// Builder: replace the registry provider
    pub fn with_registry(mut self, registry: Arc<dyn DefaultRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Builder: replace the clock
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    pub fn namespace_scoped(&self) -> bool {
        true
    }

    pub fn allow_create_on_update(&self) -> bool {
        false
    }

    pub fn allow_unconditional_update(&self) -> bool {
        false
    }

    /// Pull spec clients should use for the stream.
    ///
    /// With a registry this is `<registry>/<namespace>/<name>`, otherwise the
    /// repository the user declared in the spec.
    pub fn docker_image_repository(&self, stream: &ImageStream) -> String {
        let Some(registry) = self.registry.default_registry() else {
            return stream.spec.docker_image_repository.clone();
        };
        let namespace = match stream.namespace() {
            "" => self.config.default_namespace.as_str(),
            namespace => namespace,
        };
        DockerImageReference::new(registry, namespace, stream.name()).to_string()
    }

    /// Clear status and stamp generation 1 on a new stream.
    pub fn prepare_for_create(&self, stream: &mut ImageStream) {
        stream.status = ImageStreamStatus {
            docker_image_repository: self.docker_image_repository(stream),
            tags: Default::default(),
        };
        stamp_for_create(stream);
    }

    /// Validate a new stream. Every problem found is returned.
    pub async fn validate(&self, ctx: &RequestContext, stream: &mut ImageStream) -> FieldErrors {
        let Some(user) = ctx.user.as_ref() else {
            return self.missing_user(stream);
        };

        let verification = self.verifier.verify(None, stream, user).await;
        let mut errs = verification.errors;
        errs.extend(self.tags_changed(None, stream, &verification.rejected).await);
        errs.extend(validate_image_stream(stream));
        errs
    }

    /// Carry generations and status forward from the stored stream.
    pub fn prepare_for_update(&self, stream: &mut ImageStream, old: &ImageStream) {
        prepare_spec_update(stream, old, SpecUpdateMode::USER);
        stream.status.docker_image_repository = self.docker_image_repository(stream);
    }

    pub async fn validate_update(
        &self,
        ctx: &RequestContext,
        stream: &mut ImageStream,
        old: &ImageStream,
    ) -> FieldErrors {
        let Some(user) = ctx.user.as_ref() else {
            return self.missing_user(stream);
        };

        let verification = self.verifier.verify(Some(old), stream, user).await;
        let mut errs = verification.errors;
        errs.extend(self.tags_changed(Some(old), stream, &verification.rejected).await);
        errs.extend(validate_image_stream_update(stream, old));
        errs
    }

    /// Fill in derived fields on read.
    pub fn decorate(&self, stream: &mut ImageStream) {
        stream.status.docker_image_repository = self.docker_image_repository(stream);
    }

    /// Whether `stream` is selected by the given label and field selectors.
    pub fn matches(&self, stream: &ImageStream, labels: &Selector, fields: &Selector) -> bool {
        selector::matches(stream, labels, fields)
    }

    fn missing_user(&self, stream: &ImageStream) -> FieldErrors {
        let err = StrategyError::auth_context(stream.name());
        tracing::warn!(
            namespace = %stream.namespace(),
            name = %stream.name(),
            "Rejecting image stream write without a user"
        );
        err.to_field_error().into()
    }

    /// Resolve every new or changed spec tag and record what it points at
    /// in status.
    ///
    /// Tags in `rejected` failed the access check and are not resolved. Tags
    /// whose target does not exist yet are left alone. Lookup and resolution
    /// failures are reported per tag; other tags are still processed.
    pub async fn tags_changed(
        &self,
        old: Option<&ImageStream>,
        stream: &mut ImageStream,
        rejected: &BTreeSet<String>,
    ) -> FieldErrors {
        let mut errs = FieldErrors::new();
        let now = self.clock.now();

        let candidates: Vec<(String, TagReference)> = stream
            .spec
            .tags
            .iter()
            .filter(|(tag, tag_ref)| {
                match old.and_then(|o| o.spec.tags.get(tag.as_str())) {
                    Some(old_ref) => tag_ref_changed(old_ref, tag_ref, stream.namespace()),
                    None => true,
                }
            })
            .filter(|(_, tag_ref)| tag_ref.from.is_some())
            .map(|(tag, tag_ref)| (tag.clone(), tag_ref.clone()))
            .collect();

        for (tag, mut tag_ref) in candidates {
            if rejected.contains(&tag) {
                tracing::debug!(tag = %tag, "Skipping tag that failed the access check");
                continue;
            }
            let Some(from) = tag_ref.from.clone() else {
                continue;
            };
            let from_path = format!("{}.from", spec_tag_path(&tag));
            tracing::debug!(
                stream = %format!("{}/{}", stream.namespace(), stream.name()),
                tag = %tag,
                kind = %from.kind,
                from = %from.name,
                "Detected changed tag"
            );

            // field validation reports references that do not classify
            let source_ref = match from.classify() {
                Ok(source_ref) => source_ref,
                Err(e) => {
                    tracing::debug!(tag = %tag, error = %e, "Unusable tag reference");
                    continue;
                }
            };
            tag_ref.generation = Some(stream.generation());

            let Some((target_stream, tag_or_id)) = source_ref.stream_target() else {
                if !tag_ref.reference {
                    continue;
                }
                match tag_reference_to_tag_event(stream, &tag_ref, "", now) {
                    Ok(Some(event)) => {
                        stream.spec.tags.insert(tag.clone(), tag_ref);
                        add_tag_event_to_image_stream(stream, &tag, event);
                    }
                    Ok(None) => {}
                    Err(e) => errs.push(FieldError::invalid(from_path, from.name.clone(), e.to_string())),
                }
                continue;
            };
            let target_name = target_stream.unwrap_or(stream.name()).to_string();
            let tag_or_id = tag_or_id.to_string();

            let target_namespace = from.effective_namespace(stream.namespace()).to_string();
            let fetched;
            let source: &ImageStream = if target_namespace != stream.namespace()
                || target_name != stream.name()
            {
                match self.getter.get(&target_namespace, &target_name).await {
                    Ok(found) => {
                        fetched = found;
                        &fetched
                    }
                    Err(e) => {
                        errs.push(lookup_field_error(&from_path, &from.name, &e));
                        continue;
                    }
                }
            } else {
                &*stream
            };

            let event = match tag_reference_to_tag_event(source, &tag_ref, &tag_or_id, now) {
                Ok(Some(event)) => event,
                Ok(None) => {
                    tracing::debug!(tag = %tag, wanted = %tag_or_id, "Tag target not found yet, skipping");
                    continue;
                }
                Err(e) => {
                    errs.push(FieldError::invalid(
                        format!("{from_path}.name"),
                        from.name.clone(),
                        format!("error generating tag event: {e}"),
                    ));
                    continue;
                }
            };

            stream.spec.tags.insert(tag.clone(), tag_ref);
            add_tag_event_to_image_stream(stream, &tag, event);
        }

        let propagated = update_changed_tracking_tags(stream, old);
        if propagated > 0 {
            tracing::debug!(propagated, "Updated tracking tags");
        }

        if old.is_none()
            && let Some(created) = stream.metadata.creation_timestamp
        {
            for event in stream
                .status
                .tags
                .values_mut()
                .flat_map(|history| history.items.iter_mut())
            {
                event.created = created;
            }
        }

        errs
    }
}

fn lookup_field_error(from_path: &str, name: &str, err: &LookupError) -> FieldError {
    if err.is_not_found() {
        tracing::debug!(from = %name, "Referenced image stream not found");
        FieldError::not_found(format!("{from_path}.name"), name)
    } else {
        tracing::warn!(from = %name, error = %err, "Image stream lookup failed");
        FieldError::invalid(
            format!("{from_path}.name"),
            name,
            format!("unable to retrieve image stream: {err}"),
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Status subresource
// ─────────────────────────────────────────────────────────────────────────────

/// Writes to the status subresource. Spec edits are discarded.
#[derive(Clone)]
pub struct StatusStrategy {
    inner: Strategy,
}

impl StatusStrategy {
    pub fn new(inner: Strategy) -> Self {
        Self { inner }
    }

    pub fn strategy(&self) -> &Strategy {
        &self.inner
    }

    pub fn prepare_for_update(&self, stream: &mut ImageStream, old: &ImageStream) {
        prepare_status_update(stream, old);
    }

    pub fn validate_update(&self, stream: &ImageStream, old: &ImageStream) -> FieldErrors {
        validate_image_stream_status_update(stream, old)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Internal writes
// ─────────────────────────────────────────────────────────────────────────────

/// Trusted writes of spec and status together, e.g. from an importer.
#[derive(Clone)]
pub struct InternalStrategy {
    inner: Strategy,
}

impl InternalStrategy {
    pub fn new(inner: Strategy) -> Self {
        Self { inner }
    }

    pub fn strategy(&self) -> &Strategy {
        &self.inner
    }

    /// Like [`Strategy::prepare_for_create`] but keeps the caller's status tags.
    pub fn prepare_for_create(&self, stream: &mut ImageStream) {
        stream.status.docker_image_repository = self.inner.docker_image_repository(stream);
        stamp_for_create(stream);
    }

    /// Keeps the caller's status and tag generations.
    pub fn prepare_for_update(&self, stream: &mut ImageStream, old: &ImageStream) {
        prepare_spec_update(stream, old, SpecUpdateMode::INTERNAL);
        stream.status.docker_image_repository = self.inner.docker_image_repository(stream);
    }

    /// Field validation only. The caller supplies already resolved state, so
    /// there is no access check and no resolver pass.
    pub fn validate(&self, stream: &ImageStream) -> FieldErrors {
        validate_image_stream(stream)
    }

    /// Field validation only, as for [`InternalStrategy::validate`].
    pub fn validate_update(&self, stream: &ImageStream, old: &ImageStream) -> FieldErrors {
        validate_image_stream_update(stream, old)
    }
}
