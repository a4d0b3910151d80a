//! End-to-end scenarios for the image stream strategy
//!
//! These tests drive the prepare and validate hooks the way a storage layer
//! would:
//! - create: stamping, direct image references, self-referencing tags
//! - update: unchanged tags, retargeted tags, generation pinning
//! - cross-namespace access checks
//! - status and internal writes
//!
//! Uses mock implementations of the lookup and authorization services.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use async_trait::async_trait;
use chrono::Utc;
use imagestream_api::{ImageStream, ObjectReference, TagEvent, TagEventList, TagReference, UserInfo};
use imagestream_strategy::{
    FieldErrorKind, ImageStreamGetter, InternalStrategy, LookupError, RequestContext, ReviewError,
    StatusStrategy, Strategy, StrategyConfig, SubjectAccessReview, SubjectAccessReviewResponse,
    SubjectAccessReviewer,
};
use pretty_assertions::assert_eq;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

// ─────────────────────────────────────────────────────────────────────────────
// Mock Implementations
// ─────────────────────────────────────────────────────────────────────────────

/// Mock reviewer that records every request and gives a fixed answer
struct MockReviewer {
    allow: bool,
    requests: Mutex<Vec<SubjectAccessReview>>,
}

impl MockReviewer {
    fn new(allow: bool) -> Arc<Self> {
        Arc::new(Self {
            allow,
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<SubjectAccessReview> {
        self.requests.lock().expect("lock").clone()
    }
}

#[async_trait]
impl SubjectAccessReviewer for MockReviewer {
    async fn review(
        &self,
        review: &SubjectAccessReview,
    ) -> Result<Option<SubjectAccessReviewResponse>, ReviewError> {
        self.requests.lock().expect("lock").push(review.clone());
        if self.allow {
            Ok(Some(SubjectAccessReviewResponse::allowed()))
        } else {
            Ok(Some(SubjectAccessReviewResponse::denied("not a member")))
        }
    }
}

/// Mock store keyed by (namespace, name) that records every lookup
#[derive(Default)]
struct MockStore {
    streams: HashMap<(String, String), ImageStream>,
    lookups: Mutex<Vec<(String, String)>>,
}

impl MockStore {
    fn with(mut self, stream: ImageStream) -> Self {
        let key = (
            stream.metadata.namespace.clone(),
            stream.metadata.name.clone(),
        );
        self.streams.insert(key, stream);
        self
    }

    fn lookups(&self) -> Vec<(String, String)> {
        self.lookups.lock().expect("lock").clone()
    }
}

#[async_trait]
impl ImageStreamGetter for MockStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<ImageStream, LookupError> {
        self.lookups
            .lock()
            .expect("lock")
            .push((namespace.to_string(), name.to_string()));
        self.streams
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| LookupError::NotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
            })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn strategy_with(reviewer: Arc<MockReviewer>, store: MockStore) -> Strategy {
    init_tracing();
    Strategy::with_config(StrategyConfig::default(), reviewer, Arc::new(store))
}

fn ctx() -> RequestContext {
    RequestContext::new("ns").with_user(UserInfo::new("alice").with_groups(vec!["devs".to_string()]))
}

/// A stream as it would be stored after a successful create:
/// `latest` tracks `v1`, and `v1` is a direct image reference.
fn stored_stream() -> ImageStream {
    let now = Utc::now();
    let mut stream = ImageStream::new("ns", "app")
        .with_spec_tag(
            "latest",
            TagReference::from_ref(ObjectReference::stream_tag("v1")).with_generation(1),
        )
        .with_spec_tag(
            "v1",
            TagReference::from_ref(ObjectReference::docker_image("registry.example/ns/img:1"))
                .as_reference()
                .with_generation(1),
        )
        .with_status_tag(
            "latest",
            vec![TagEvent::new(now, "registry.example/ns/img:1").with_generation(1)],
        )
        .with_status_tag(
            "v1",
            vec![TagEvent::new(now, "registry.example/ns/img:1").with_generation(1)],
        );
    stream.metadata.generation = 1;
    stream
}

fn history_len(stream: &ImageStream, tag: &str) -> usize {
    stream.status.tags.get(tag).map_or(0, |h| h.items.len())
}

// ─────────────────────────────────────────────────────────────────────────────
// Create
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_create_stamps_generation_one() {
    let strategy = strategy_with(MockReviewer::new(true), MockStore::default());
    let mut stream = ImageStream::new("ns", "app")
        .with_spec_tag(
            "a",
            TagReference::from_ref(ObjectReference::docker_image("busybox")).with_generation(12),
        )
        .with_spec_tag("b", TagReference::default());
    stream.metadata.generation = 40;

    strategy.prepare_for_create(&mut stream);
    let errs = strategy.validate(&ctx(), &mut stream).await;

    assert!(errs.is_empty(), "unexpected errors: {errs}");
    assert_eq!(stream.metadata.generation, 1);
    assert_eq!(stream.spec.tags["a"].generation, Some(1));
    assert_eq!(stream.spec.tags["b"].generation, Some(1));
}

#[tokio::test]
async fn test_create_direct_image_reference_is_recorded_verbatim() {
    let start = Utc::now();
    let strategy = strategy_with(MockReviewer::new(true), MockStore::default());
    let mut stream = ImageStream::new("ns", "app").with_spec_tag(
        "v1",
        TagReference::from_ref(ObjectReference::docker_image(
            "registry.example/ns/img@sha256:abc",
        ))
        .as_reference(),
    );

    strategy.prepare_for_create(&mut stream);
    let errs = strategy.validate(&ctx(), &mut stream).await;

    assert!(errs.is_empty(), "unexpected errors: {errs}");
    let history = &stream.status.tags["v1"].items;
    assert_eq!(history.len(), 1);
    assert_eq!(
        history[0].docker_image_reference,
        "registry.example/ns/img@sha256:abc"
    );
    assert!(history[0].created >= start);
    assert_eq!(history[0].generation, 1);
}

#[tokio::test]
async fn test_create_self_reference_follows_tracked_tag() {
    let strategy = strategy_with(MockReviewer::new(true), MockStore::default());
    let mut stream = ImageStream::new("ns", "app")
        .with_spec_tag(
            "latest",
            TagReference::from_ref(ObjectReference::stream_tag("v1")),
        )
        .with_spec_tag(
            "v1",
            TagReference::from_ref(ObjectReference::docker_image("registry.example/ns/img:1"))
                .as_reference(),
        );

    strategy.prepare_for_create(&mut stream);
    let errs = strategy.validate(&ctx(), &mut stream).await;

    assert!(errs.is_empty(), "unexpected errors: {errs}");
    assert_eq!(
        stream.status.tags["latest"].head(),
        stream.status.tags["v1"].head()
    );
}

#[tokio::test]
async fn test_create_without_user_is_rejected() {
    let reviewer = MockReviewer::new(true);
    let strategy = strategy_with(reviewer.clone(), MockStore::default());
    let mut stream = ImageStream::new("ns", "app").with_spec_tag(
        "base",
        TagReference::from_ref(ObjectReference::stream_tag("python:3").in_namespace("shared")),
    );

    strategy.prepare_for_create(&mut stream);
    let errs = strategy
        .validate(&RequestContext::new("ns"), &mut stream)
        .await
        .into_vec();

    assert_eq!(errs.len(), 1);
    assert_eq!(errs[0].kind, FieldErrorKind::Forbidden);
    assert!(reviewer.requests().is_empty());
    assert!(stream.status.tags.is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// Cross-namespace access
// ─────────────────────────────────────────────────────────────────────────────

fn shared_python() -> ImageStream {
    ImageStream::new("shared", "python").with_status_tag(
        "3",
        vec![
            TagEvent::new(Utc::now(), "registry.example/shared/python@sha256:333")
                .with_image("sha256:333")
                .with_generation(4),
        ],
    )
}

fn cross_namespace_stream() -> ImageStream {
    ImageStream::new("ns", "app").with_spec_tag(
        "base",
        TagReference::from_ref(ObjectReference::stream_tag("python:3").in_namespace("shared")),
    )
}

#[tokio::test]
async fn test_cross_namespace_tag_is_reviewed_once() {
    let reviewer = MockReviewer::new(true);
    let strategy = strategy_with(reviewer.clone(), MockStore::default().with(shared_python()));
    let mut stream = cross_namespace_stream();

    strategy.prepare_for_create(&mut stream);
    let errs = strategy.validate(&ctx(), &mut stream).await;

    assert!(errs.is_empty(), "unexpected errors: {errs}");
    let requests = reviewer.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].namespace, "shared");
    assert_eq!(requests[0].verb, "get");
    assert_eq!(requests[0].resource, "imagestreams");
    assert_eq!(requests[0].resource_name, "python");
    assert_eq!(requests[0].user, "alice");

    let head = stream.status.tags["base"].head().expect("resolved");
    assert_eq!(head.image, "sha256:333");
    assert_eq!(head.generation, 1);
}

#[tokio::test]
async fn test_cross_namespace_denied_is_forbidden() {
    let reviewer = MockReviewer::new(false);
    let strategy = strategy_with(reviewer.clone(), MockStore::default().with(shared_python()));
    let mut stream = cross_namespace_stream();

    strategy.prepare_for_create(&mut stream);
    let errs = strategy.validate(&ctx(), &mut stream).await;

    assert_eq!(errs.len(), 1);
    let forbidden: Vec<_> = errs.for_field("spec.tags[base].from").collect();
    assert_eq!(forbidden.len(), 1);
    assert_eq!(forbidden[0].kind, FieldErrorKind::Forbidden);
    assert_eq!(forbidden[0].value, "shared/python");
    assert_eq!(reviewer.requests().len(), 1);
}

#[tokio::test]
async fn test_denied_tag_is_not_looked_up_whether_or_not_target_exists() {
    for store in [MockStore::default().with(shared_python()), MockStore::default()] {
        let store = Arc::new(store);
        let strategy = Strategy::with_config(
            StrategyConfig::default(),
            MockReviewer::new(false),
            store.clone(),
        );
        let mut stream = cross_namespace_stream();

        strategy.prepare_for_create(&mut stream);
        let errs = strategy.validate(&ctx(), &mut stream).await.into_vec();

        // same answer either way: nothing about the target leaks
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].kind, FieldErrorKind::Forbidden);
        assert!(store.lookups().is_empty());
        assert_eq!(history_len(&stream, "base"), 0);
        assert_eq!(stream.spec.tags["base"].generation, Some(1));
    }
}

#[tokio::test]
async fn test_denied_retarget_on_update_keeps_history() {
    let store = Arc::new(MockStore::default().with(shared_python()));
    let strategy =
        Strategy::with_config(StrategyConfig::default(), MockReviewer::new(false), store.clone());
    let old = stored_stream();
    let mut next = old.clone();
    next.spec.tags.insert(
        "latest".to_string(),
        TagReference::from_ref(ObjectReference::stream_tag("python:3").in_namespace("shared")),
    );

    strategy.prepare_for_update(&mut next, &old);
    let errs = strategy.validate_update(&ctx(), &mut next, &old).await;

    assert_eq!(errs.for_field("spec.tags[latest].from").count(), 1);
    assert!(store.lookups().is_empty());
    assert_eq!(history_len(&next, "latest"), 1);
}

#[tokio::test]
async fn test_cross_namespace_missing_stream_is_not_found() {
    let strategy = strategy_with(MockReviewer::new(true), MockStore::default());
    let mut stream = cross_namespace_stream();

    strategy.prepare_for_create(&mut stream);
    let errs = strategy.validate(&ctx(), &mut stream).await.into_vec();

    assert_eq!(errs.len(), 1);
    assert_eq!(errs[0].kind, FieldErrorKind::NotFound);
    assert_eq!(errs[0].field, "spec.tags[base].from.name");
    assert_eq!(errs[0].value, "python:3");
}

#[tokio::test]
async fn test_unchanged_cross_namespace_tag_is_not_reviewed_on_update() {
    let reviewer = MockReviewer::new(false);
    let strategy = strategy_with(reviewer.clone(), MockStore::default().with(shared_python()));
    let mut old = cross_namespace_stream();
    old.metadata.generation = 1;
    old.spec.tags.get_mut("base").expect("tag").generation = Some(1);
    let mut next = old.clone();

    strategy.prepare_for_update(&mut next, &old);
    let errs = strategy.validate_update(&ctx(), &mut next, &old).await;

    assert!(errs.is_empty(), "unexpected errors: {errs}");
    assert!(reviewer.requests().is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// Update
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_update_unchanged_latest_adds_no_history() {
    let strategy = strategy_with(MockReviewer::new(true), MockStore::default());
    let old = stored_stream();
    let mut next = old.clone();
    next.spec.tags.get_mut("latest").expect("tag").generation = None;
    next.status.tags.clear();

    strategy.prepare_for_update(&mut next, &old);
    let errs = strategy.validate_update(&ctx(), &mut next, &old).await;

    assert!(errs.is_empty(), "unexpected errors: {errs}");
    assert_eq!(next.metadata.generation, 1);
    assert_eq!(next.spec.tags["latest"].generation, Some(1));
    assert_eq!(history_len(&next, "latest"), 1);
    assert_eq!(history_len(&next, "v1"), 1);
}

#[tokio::test]
async fn test_update_retargeted_tag_advances_and_resolves() {
    let strategy = strategy_with(MockReviewer::new(true), MockStore::default());
    let mut old = stored_stream();
    old.status.tags.insert(
        "v2".to_string(),
        TagEventList {
            items: vec![
                TagEvent::new(Utc::now(), "registry.example/ns/img@sha256:222")
                    .with_image("sha256:222")
                    .with_generation(1),
            ],
        },
    );
    let mut next = old.clone();
    next.spec.tags.insert(
        "latest".to_string(),
        TagReference::from_ref(ObjectReference::stream_tag("v2")),
    );

    strategy.prepare_for_update(&mut next, &old);
    let errs = strategy.validate_update(&ctx(), &mut next, &old).await;

    assert!(errs.is_empty(), "unexpected errors: {errs}");
    assert_eq!(next.metadata.generation, 2);
    assert_eq!(next.spec.tags["latest"].generation, Some(2));
    assert_eq!(next.spec.tags["v1"].generation, Some(1));

    let latest = &next.status.tags["latest"].items;
    assert_eq!(latest.len(), 2);
    assert_eq!(latest[0].image, "sha256:222");
    assert_eq!(latest[0].generation, 2);
}

#[test]
fn test_update_zero_generation_is_restamped() {
    let strategy = strategy_with(MockReviewer::new(true), MockStore::default());
    let old = stored_stream();
    let mut next = old.clone();
    next.spec.tags.get_mut("v1").expect("tag").generation = Some(0);
    next.spec.tags.get_mut("latest").expect("tag").generation = Some(50);

    strategy.prepare_for_update(&mut next, &old);

    assert_eq!(next.metadata.generation, 2);
    assert_eq!(next.spec.tags["v1"].generation, Some(2));
    assert_eq!(next.spec.tags["latest"].generation, Some(1));
}

#[tokio::test]
async fn test_update_rename_is_rejected() {
    let strategy = strategy_with(MockReviewer::new(true), MockStore::default());
    let old = stored_stream();
    let mut next = old.clone();
    next.metadata.name = "other".to_string();

    strategy.prepare_for_update(&mut next, &old);
    let errs = strategy.validate_update(&ctx(), &mut next, &old).await;

    assert_eq!(errs.for_field("metadata.name").count(), 1);
}

// ─────────────────────────────────────────────────────────────────────────────
// Status and internal writes
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_status_update_identical_head_gets_stream_generation() {
    let status = StatusStrategy::new(strategy_with(MockReviewer::new(true), MockStore::default()));
    let mut old = stored_stream();
    old.metadata.generation = 5;
    let mut next = old.clone();
    next.status.tags.get_mut("latest").expect("tag").items[0].generation = 0;
    next.spec.tags.remove("v1");

    status.prepare_for_update(&mut next, &old);
    let errs = status.validate_update(&next, &old);

    assert!(errs.is_empty(), "unexpected errors: {errs}");
    assert_eq!(next.status.tags["latest"].items[0].generation, 5);
    assert_eq!(next.spec, old.spec);
}

#[test]
fn test_status_update_carries_stored_generation() {
    let status = StatusStrategy::new(strategy_with(MockReviewer::new(true), MockStore::default()));
    let mut old = stored_stream();
    old.metadata.generation = 5;
    let mut next = old.clone();
    next.metadata.generation = 0;
    next.status.tags.get_mut("latest").expect("tag").items[0].generation = 0;

    status.prepare_for_update(&mut next, &old);

    assert_eq!(next.metadata.generation, 5);
    assert_eq!(next.status.tags["latest"].items[0].generation, 5);
}

#[test]
fn test_internal_update_keeps_caller_status_and_generations() {
    let reviewer = MockReviewer::new(true);
    let internal = InternalStrategy::new(strategy_with(reviewer.clone(), MockStore::default()));
    let old = stored_stream();
    let mut next = old.clone();
    next.spec.tags.get_mut("latest").expect("tag").generation = Some(7);
    next.status.tags.get_mut("v1").expect("tag").items.insert(
        0,
        TagEvent::new(Utc::now(), "registry.example/ns/img@sha256:999")
            .with_image("sha256:999")
            .with_generation(1),
    );
    let latest_before = next.status.tags["latest"].clone();

    internal.prepare_for_update(&mut next, &old);
    let errs = internal.validate_update(&next, &old);

    assert!(errs.is_empty(), "unexpected errors: {errs}");
    assert_eq!(next.metadata.generation, 2);
    assert_eq!(next.spec.tags["latest"].generation, Some(7));
    assert_eq!(history_len(&next, "v1"), 2);
    // no resolver pass: the tracking tag is exactly what the caller sent
    assert_eq!(next.status.tags["latest"], latest_before);
    assert!(reviewer.requests().is_empty());
}

#[test]
fn test_internal_update_skips_access_check_and_lookups() {
    let reviewer = MockReviewer::new(false);
    let store = Arc::new(MockStore::default());
    let internal = InternalStrategy::new(Strategy::with_config(
        StrategyConfig::default(),
        reviewer.clone(),
        store.clone(),
    ));
    let old = stored_stream();
    let mut next = old.clone();
    next.spec.tags.insert(
        "base".to_string(),
        TagReference::from_ref(ObjectReference::stream_tag("python:3").in_namespace("shared")),
    );

    internal.prepare_for_update(&mut next, &old);
    let errs = internal.validate_update(&next, &old);

    assert!(errs.is_empty(), "unexpected errors: {errs}");
    assert!(reviewer.requests().is_empty());
    assert!(store.lookups().is_empty());
    assert_eq!(history_len(&next, "base"), 0);
}
