//! Image stream write strategy
//!
//! Decides what happens when an image stream is created or updated:
//! - resolves spec tags into status history events
//! - maintains the stream and per-tag generation counters
//! - checks access for tags that reference streams in other namespaces
//! - validates the resulting object and reports every problem at once
//!
//! Storage, authorization and registry discovery are supplied by the caller
//! through the traits in [`clients`].

#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod changes;
pub mod clients;
pub mod config;
pub mod errors;
pub mod generation;
pub mod reference;
pub mod resolver;
pub mod selector;
pub mod strategy;
pub mod validation;
pub mod verifier;

pub use changes::{tag_event_changed, tag_ref_changed, tag_ref_generation_changed};
pub use clients::{
    Clock, DefaultRegistry, DefaultRegistryFn, ImageStreamGetter, LookupError, RequestContext,
    ReviewError, StaticRegistry, SubjectAccessReview, SubjectAccessReviewResponse,
    SubjectAccessReviewer, SystemClock,
};
pub use config::{AccessConfig, StrategyConfig};
pub use errors::{FieldError, FieldErrorKind, FieldErrors, Result, StrategyError};
pub use generation::{
    SpecUpdateMode, ensure_spec_tag_generations_are_set, pin_spec_tag_generations,
    prepare_spec_update, prepare_status_update, stamp_for_create,
    update_observed_generation_for_status_update,
};
pub use reference::{FromReferenceError, parse_from_reference};
pub use resolver::{ResolveError, tag_reference_to_tag_event};
pub use selector::{Selector, SelectorError, selectable_fields};
pub use strategy::{InternalStrategy, StatusStrategy, Strategy};
pub use validation::{
    validate_image_stream, validate_image_stream_status_update, validate_image_stream_update,
};
pub use verifier::{TagVerification, TagVerifier};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
