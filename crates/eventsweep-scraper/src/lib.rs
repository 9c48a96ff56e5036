//! Multi-source event extraction engine.
//!
//! A [`Coordinator`] runs a list of [`eventsweep_core::Source`]s
//! concurrently. Each source is fetched with retry, handed to the
//! [`Strategy`] its registry identifier names, and every extracted
//! [`RawCandidate`] is normalized into an [`eventsweep_core::Event`].

pub mod candidate;
pub mod client;
pub mod coordinator;
pub mod datetime;
pub mod error;
pub mod normalize;
pub mod registry;
pub mod retry;
pub mod settings;
pub mod strategy;
pub mod vision;

pub use candidate::{Confidence, NameField, RawCandidate};
pub use client::{Document, FetchClient, RequestPlan};
pub use coordinator::{Coordinator, RunOptions};
pub use datetime::{parse_time, parse_time_range, DateRules};
pub use error::{ScraperError, VisionError};
pub use normalize::{
    is_generic_name, normalize, strip_business_suffixes, RecoverySession, Rejection, SourceContext,
};
pub use registry::{builtin_registry, Registry, StrategyBuilder};
pub use retry::{RetryDecision, RetryPolicy};
pub use settings::Settings;
pub use strategy::text::html_to_text;
pub use strategy::Strategy;
pub use vision::{interpret_response, is_plausible_image_ref, VisionClient};
