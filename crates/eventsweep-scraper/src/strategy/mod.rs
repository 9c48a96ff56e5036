//! Extraction strategies, one per source document shape.
//!
//! The set is closed: [`Strategy`] is an enum and the registry maps
//! configuration identifiers onto its variants. Each variant turns a fetched
//! [`Document`] into [`RawCandidate`]s, skipping individual records it cannot
//! read and failing only when the document as a whole is unusable.

pub mod api;
pub mod markup;
pub mod table;
pub mod text;

use crate::candidate::RawCandidate;
use crate::client::Document;
use crate::datetime::DateRules;
use crate::error::ScraperError;
use crate::normalize::is_generic_name;
use crate::settings::Settings;

pub use api::ApiStrategy;
pub use markup::MarkupStrategy;
pub use table::CsvStrategy;
pub use text::TextPatternStrategy;

#[derive(Debug, Clone)]
pub enum Strategy {
    Markup(MarkupStrategy),
    Api(ApiStrategy),
    TextPattern(TextPatternStrategy),
    Csv(CsvStrategy),
}

impl Strategy {
    /// # Errors
    ///
    /// Returns a malformed-class [`ScraperError`] when the document is the
    /// wrong kind of content or cannot be decoded at all.
    pub fn extract(&self, document: &Document) -> Result<Vec<RawCandidate>, ScraperError> {
        match self {
            Strategy::Markup(s) => s.extract(document),
            Strategy::Api(s) => s.extract(document),
            Strategy::TextPattern(s) => s.extract(document),
            Strategy::Csv(s) => s.extract(document),
        }
    }

    /// `Accept` header sent when fetching for this strategy.
    #[must_use]
    pub fn accept_header(&self) -> &'static str {
        match self {
            Strategy::Markup(_) | Strategy::TextPattern(_) => {
                "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8"
            }
            Strategy::Api(_) => "application/json, text/plain, */*",
            Strategy::Csv(_) => "text/csv, text/plain;q=0.9, */*;q=0.8",
        }
    }

    #[must_use]
    pub fn date_rules(&self) -> &DateRules {
        match self {
            Strategy::Markup(s) => &s.date_rules,
            Strategy::Api(s) => &s.date_rules,
            Strategy::TextPattern(s) => &s.date_rules,
            Strategy::Csv(s) => &s.date_rules,
        }
    }
}

/// Per-source name cleanup applied by every strategy before a name becomes a
/// candidate field.
#[derive(Debug, Clone, Default)]
pub struct NameRules {
    /// Lowercased boilerplate values treated as "no name".
    denylist: Vec<String>,
    prefixes: Vec<String>,
}

impl NameRules {
    /// Reads `name_denylist` and `name_prefixes`.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::InvalidSetting`] if either is not a string list.
    pub fn from_settings(settings: &Settings<'_>) -> Result<Self, ScraperError> {
        Ok(Self {
            denylist: settings
                .str_list("name_denylist")?
                .into_iter()
                .map(|s| s.trim().to_lowercase())
                .collect(),
            prefixes: settings.str_list("name_prefixes")?,
        })
    }

    /// Strips configured prefixes (case-insensitive) and returns `None` for
    /// blank, denylisted, or placeholder names.
    #[must_use]
    pub fn clean(&self, raw: &str) -> Option<String> {
        let mut name = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        for prefix in &self.prefixes {
            let prefix = prefix.trim_start();
            if !prefix.is_empty()
                && name.len() >= prefix.len()
                && name.is_char_boundary(prefix.len())
                && name[..prefix.len()].eq_ignore_ascii_case(prefix)
            {
                name = name[prefix.len()..].trim().to_owned();
            }
        }

        if name.is_empty()
            || is_generic_name(&name)
            || self.denylist.contains(&name.to_lowercase())
        {
            return None;
        }
        Some(name)
    }
}
