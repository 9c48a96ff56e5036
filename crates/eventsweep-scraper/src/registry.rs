//! Static mapping from strategy identifiers to strategy constructors.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use eventsweep_core::Source;

use crate::error::ScraperError;
use crate::settings::Settings;
use crate::strategy::{ApiStrategy, CsvStrategy, MarkupStrategy, Strategy, TextPatternStrategy};

/// Builds a configured strategy from a source's settings.
pub type StrategyBuilder = fn(&Settings<'_>) -> Result<Strategy, ScraperError>;

pub const HTML_MARKUP: &str = "html_markup";
pub const JSON_API: &str = "json_api";
pub const TEXT_PATTERN: &str = "text_pattern";
pub const CSV_TABLE: &str = "csv_table";

static BUILTIN: LazyLock<Registry> = LazyLock::new(Registry::builtin);

/// The built-in registry, shared and read-only.
#[must_use]
pub fn builtin_registry() -> &'static Registry {
    &BUILTIN
}

fn build_markup(settings: &Settings<'_>) -> Result<Strategy, ScraperError> {
    MarkupStrategy::from_settings(settings).map(Strategy::Markup)
}

fn build_api(settings: &Settings<'_>) -> Result<Strategy, ScraperError> {
    ApiStrategy::from_settings(settings).map(Strategy::Api)
}

fn build_text_pattern(settings: &Settings<'_>) -> Result<Strategy, ScraperError> {
    TextPatternStrategy::from_settings(settings).map(Strategy::TextPattern)
}

fn build_csv_table(settings: &Settings<'_>) -> Result<Strategy, ScraperError> {
    CsvStrategy::from_settings(settings).map(Strategy::Csv)
}

#[derive(Debug, Clone)]
pub struct Registry {
    builders: BTreeMap<&'static str, StrategyBuilder>,
}

impl Registry {
    /// Registry holding every shipped strategy.
    #[must_use]
    pub fn builtin() -> Self {
        let mut builders: BTreeMap<&'static str, StrategyBuilder> = BTreeMap::new();
        builders.insert(HTML_MARKUP, build_markup);
        builders.insert(JSON_API, build_api);
        builders.insert(TEXT_PATTERN, build_text_pattern);
        builders.insert(CSV_TABLE, build_csv_table);
        Self { builders }
    }

    /// Looks up the constructor for `strategy_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::UnknownStrategy`] when nothing is registered
    /// under that identifier.
    pub fn resolve(&self, strategy_id: &str) -> Result<StrategyBuilder, ScraperError> {
        self.builders
            .get(strategy_id.trim())
            .copied()
            .ok_or_else(|| ScraperError::UnknownStrategy(strategy_id.to_owned()))
    }

    /// Resolves and configures the strategy declared by `source`.
    ///
    /// # Errors
    ///
    /// Returns a configuration-class [`ScraperError`] for an unknown
    /// identifier or unusable settings.
    pub fn configure(&self, source: &Source) -> Result<Strategy, ScraperError> {
        let build = self.resolve(&source.strategy)?;
        build(&Settings::new(&source.settings))
    }

    /// Registered identifiers in sorted order.
    #[must_use]
    pub fn identifiers(&self) -> Vec<&'static str> {
        self.builders.keys().copied().collect()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builtin_identifiers() {
        assert_eq!(
            builtin_registry().identifiers(),
            vec![CSV_TABLE, HTML_MARKUP, JSON_API, TEXT_PATTERN]
        );
    }

    #[test]
    fn unknown_identifier_is_configuration_error() {
        let err = builtin_registry().resolve("pdf_table").unwrap_err();
        assert!(matches!(err, ScraperError::UnknownStrategy(ref id) if id == "pdf_table"));
        assert_eq!(err.kind(), eventsweep_core::FailureKind::Configuration);
    }

    #[test]
    fn configure_builds_matching_variant() {
        let source = Source::new("bale", "Bale Breaker", "https://example.com", "text_pattern")
            .with_setting("pattern", json!(r"(?P<date>\d+/\d+): (?P<name>.+)"));
        let strategy = builtin_registry().configure(&source).unwrap();
        assert!(matches!(strategy, Strategy::TextPattern(_)));
    }

    #[test]
    fn configure_surfaces_missing_settings() {
        let source = Source::new("stoup", "Stoup", "https://example.com", "html_markup");
        let err = builtin_registry().configure(&source).unwrap_err();
        assert!(matches!(err, ScraperError::MissingSetting { .. }), "got: {err:?}");
    }

    #[test]
    fn csv_table_is_registered() {
        let source = Source::new(
            "chucks-greenwood",
            "Chuck's Hop Shop",
            "https://example.com",
            CSV_TABLE,
        )
        .with_setting("date_column", json!("Date"))
        .with_setting("name_column", json!("Event"));
        let strategy = builtin_registry().configure(&source).unwrap();
        assert!(matches!(strategy, Strategy::Csv(_)));
    }
}
