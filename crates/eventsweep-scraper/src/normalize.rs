//! Normalization from [`RawCandidate`]s to [`Event`]s.
//!
//! Date and time parsing is delegated to [`crate::datetime`]; this module
//! owns the accept/reject decision and the vendor-name resolution order:
//! text name, then image recovery, then [`UNRESOLVED_VENDOR`].

use std::collections::HashMap;

use chrono::NaiveDate;
use eventsweep_core::{Event, Source, UNRESOLVED_VENDOR};
use thiserror::Error;

use crate::candidate::RawCandidate;
use crate::datetime::DateRules;
use crate::vision::VisionClient;

/// Placeholder names that mean "no vendor yet" on every source.
const GENERIC_NAMES: &[&str] = &["tbd", "tba", "to be announced", "unknown", "n/a"];

/// Generic trailing words removed from recovered names, longest first so
/// "Company" is tried before "Co".
const BUSINESS_SUFFIXES: &[&str] = &[
    "Food Truck",
    "Restaurant",
    "Catering",
    "Company",
    "Kitchen",
    "and Co",
    "& Co",
    "Cafe",
    "LLC",
    "Inc",
    "Bar",
    "Co",
];

/// Why a candidate did not become an event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("candidate has no date")]
    MissingDate,

    #[error("date \"{0}\" matches none of the source's formats")]
    UnparsableDate(String),
}

/// Everything about the source a candidate needs to be normalized.
#[derive(Debug, Clone, Copy)]
pub struct SourceContext<'a> {
    pub source: &'a Source,
    pub date_rules: &'a DateRules,
    /// Reference date for year inference.
    pub today: NaiveDate,
}

/// True for universal placeholders like "TBD" or "To Be Announced".
#[must_use]
pub fn is_generic_name(name: &str) -> bool {
    let normalized = name
        .trim()
        .trim_end_matches(['.', '!', '?'])
        .trim()
        .to_lowercase();
    normalized.is_empty() || GENERIC_NAMES.contains(&normalized.as_str())
}

/// Strips generic business-type suffixes at word boundaries, repeatedly.
/// A suffix is never removed if nothing would remain.
///
/// `"Georgia's Food Truck"` becomes `"Georgia's"`; `"Taco Bar"` becomes
/// `"Taco"`; `"Bar"` stays `"Bar"`.
#[must_use]
pub fn strip_business_suffixes(name: &str) -> String {
    let mut current = name.split_whitespace().collect::<Vec<_>>().join(" ");
    while let Some(shorter) = BUSINESS_SUFFIXES
        .iter()
        .find_map(|suffix| strip_suffix_word(&current, suffix))
    {
        current = shorter;
    }
    current
}

fn strip_suffix_word(name: &str, suffix: &str) -> Option<String> {
    let trimmed = name.trim_end_matches(|c: char| c == '.' || c == ',' || c.is_whitespace());
    if trimmed.len() <= suffix.len() {
        return None;
    }
    let split = trimmed.len() - suffix.len();
    if !trimmed.is_char_boundary(split) || !trimmed[split..].eq_ignore_ascii_case(suffix) {
        return None;
    }
    let head = &trimmed[..split];
    if !head.ends_with(|c: char| c.is_whitespace() || c == ',' || c == '-') {
        return None;
    }
    let rest = head.trim_end_matches(|c: char| c.is_whitespace() || c == ',' || c == '-');
    (!rest.is_empty()).then(|| rest.to_owned())
}

/// Per-source image recovery state.
///
/// Lives for one source pipeline; repeated image references are analyzed
/// once, including references that resolved to nothing.
#[derive(Debug)]
pub struct RecoverySession<'a> {
    client: Option<&'a VisionClient>,
    memo: HashMap<String, Option<String>>,
}

impl<'a> RecoverySession<'a> {
    #[must_use]
    pub fn new(client: Option<&'a VisionClient>) -> Self {
        Self {
            client,
            memo: HashMap::new(),
        }
    }

    /// Recovers a vendor name from `image_ref`, or `None` when recovery is
    /// disabled, declined, or failed.
    pub async fn recover(&mut self, image_ref: &str) -> Option<String> {
        let client = self.client?;
        if let Some(cached) = self.memo.get(image_ref) {
            tracing::debug!(image_ref, "using memoized image recovery result");
            return cached.clone();
        }
        let recovered = client.recover(image_ref).await;
        self.memo.insert(image_ref.to_owned(), recovered.clone());
        recovered
    }
}

/// Turns one candidate into an event.
///
/// The date is mandatory. Times are best effort and independent of each
/// other. The vendor name is never empty: the first non-generic text name
/// wins, then image recovery, then [`UNRESOLVED_VENDOR`].
///
/// # Errors
///
/// Returns a [`Rejection`] when the candidate has no date or its date text
/// matches none of the source's formats.
pub async fn normalize(
    candidate: RawCandidate,
    context: &SourceContext<'_>,
    recovery: &mut RecoverySession<'_>,
) -> Result<Event, Rejection> {
    let date_text = candidate.date.as_deref().ok_or(Rejection::MissingDate)?;
    let date = context
        .date_rules
        .parse(date_text, context.today)
        .ok_or_else(|| Rejection::UnparsableDate(date_text.to_owned()))?;

    let rules = context.date_rules;
    let (range_start, range_end) = candidate
        .time_range
        .as_deref()
        .map_or((None, None), |raw| rules.parse_time_range(raw));
    let start_time = candidate
        .start_time
        .as_deref()
        .and_then(|raw| rules.parse_time(raw))
        .or(range_start);
    let end_time = candidate
        .end_time
        .as_deref()
        .and_then(|raw| rules.parse_time(raw))
        .or(range_end);

    let text_name = candidate
        .names
        .iter()
        .map(|field| field.text.as_str())
        .find(|name| !is_generic_name(name));

    let (vendor_name, name_from_image) = match (text_name, candidate.image_ref.as_deref()) {
        (Some(name), _) => (name.to_owned(), false),
        (None, Some(image_ref)) => match recovery.recover(image_ref).await {
            Some(name) => (name, true),
            None => (UNRESOLVED_VENDOR.to_owned(), false),
        },
        (None, None) => (UNRESOLVED_VENDOR.to_owned(), false),
    };

    Ok(Event {
        source_key: context.source.key.clone(),
        source_name: context.source.name.clone(),
        date,
        start_time,
        end_time,
        vendor_name,
        location: candidate.location,
        name_from_image,
    })
}

#[cfg(test)]
#[path = "normalize_test.rs"]
mod tests;
