//! CSS-selector extraction over HTML pages.
//!
//! Two layouts are supported:
//!
//! - **nested**: each `day_selector` match is a day block holding its own
//!   date; records are `record_selector` matches inside it (or the block
//!   itself when no record selector is set).
//! - **siblings**: the children of each `container_selector` match are read
//!   in document order; a child matching `date_selector` opens a new day and
//!   following children matching `record_selector` belong to it.

use scraper::{ElementRef, Html, Selector};

use crate::candidate::{clean_text, Confidence, RawCandidate};
use crate::client::{resolve_reference, Document};
use crate::datetime::DateRules;
use crate::error::ScraperError;
use crate::settings::Settings;

use super::NameRules;

const DEFAULT_DATE_FORMATS: &[&str] = &[
    "%m/%d/%Y", "%B %d, %Y", "%b %d, %Y", "%A, %B %d", "%a %m.%d", "%a %m/%d", "%m.%d",
    "%m/%d", "%B %d", "%b %d",
];

const SETTING_KEYS: &[&str] = &[
    "container_selector",
    "record_selector",
    "day_selector",
    "date_selector",
    "time_selector",
    "start_selector",
    "end_selector",
    "name_selector",
    "fallback_name_selector",
    "location_selector",
    "image_selector",
    "image_attribute",
];

#[derive(Debug, Clone)]
enum Layout {
    Nested {
        day: Selector,
        record: Option<Selector>,
    },
    Siblings {
        container: Selector,
        record: Selector,
    },
}

#[derive(Debug, Clone)]
pub struct MarkupStrategy {
    layout: Layout,
    date: Selector,
    time: Option<Selector>,
    start: Option<Selector>,
    end: Option<Selector>,
    name: Option<Selector>,
    fallback_name: Option<Selector>,
    location: Option<Selector>,
    image: Option<Selector>,
    image_attribute: String,
    names: NameRules,
    pub(crate) date_rules: DateRules,
}

fn compile(setting: &str, css: &str) -> Result<Selector, ScraperError> {
    Selector::parse(css).map_err(|e| ScraperError::InvalidSetting {
        setting: setting.to_owned(),
        reason: e.to_string(),
    })
}

fn optional_selector(
    settings: &Settings<'_>,
    setting: &str,
) -> Result<Option<Selector>, ScraperError> {
    settings
        .optional_str(setting)?
        .map(|css| compile(setting, css))
        .transpose()
}

fn required_selector(settings: &Settings<'_>, setting: &str) -> Result<Selector, ScraperError> {
    compile(setting, settings.required_str(setting)?)
}

fn element_text(element: ElementRef<'_>) -> Option<String> {
    clean_text(&element.text().collect::<Vec<_>>().join(" "))
}

impl MarkupStrategy {
    /// # Errors
    ///
    /// Returns a configuration-class [`ScraperError`] when the layout
    /// selectors are missing, any selector fails to parse, or a key is not
    /// one this strategy reads.
    pub fn from_settings(settings: &Settings<'_>) -> Result<Self, ScraperError> {
        settings.check_keys(SETTING_KEYS)?;
        let layout = match settings.optional_str("container_selector")? {
            Some(css) => Layout::Siblings {
                container: compile("container_selector", css)?,
                record: required_selector(settings, "record_selector")?,
            },
            None => Layout::Nested {
                day: required_selector(settings, "day_selector")?,
                record: optional_selector(settings, "record_selector")?,
            },
        };

        Ok(Self {
            layout,
            date: required_selector(settings, "date_selector")?,
            time: optional_selector(settings, "time_selector")?,
            start: optional_selector(settings, "start_selector")?,
            end: optional_selector(settings, "end_selector")?,
            name: optional_selector(settings, "name_selector")?,
            fallback_name: optional_selector(settings, "fallback_name_selector")?,
            location: optional_selector(settings, "location_selector")?,
            image: optional_selector(settings, "image_selector")?,
            image_attribute: settings
                .optional_str("image_attribute")?
                .unwrap_or("src")
                .to_owned(),
            names: NameRules::from_settings(settings)?,
            date_rules: DateRules::from_settings(settings, DEFAULT_DATE_FORMATS)?,
        })
    }

    /// # Errors
    ///
    /// Returns [`ScraperError::UnexpectedContentType`] when the response
    /// declares itself as JSON.
    pub fn extract(&self, document: &Document) -> Result<Vec<RawCandidate>, ScraperError> {
        if document.content_type_contains("json") {
            return Err(ScraperError::UnexpectedContentType {
                content_type: document.content_type.clone().unwrap_or_default(),
                url: document.url.clone(),
                expected: "text/html",
            });
        }

        let html = Html::parse_document(&document.body);
        let mut candidates = Vec::new();

        match &self.layout {
            Layout::Nested { day, record } => {
                for block in html.select(day) {
                    let date = first_text(block, &self.date);
                    match record {
                        Some(record) => {
                            for element in block.select(record) {
                                candidates.push(self.read_record(
                                    element,
                                    date.clone(),
                                    document,
                                ));
                            }
                        }
                        None => candidates.push(self.read_record(block, date, document)),
                    }
                }
            }
            Layout::Siblings { container, record } => {
                for parent in html.select(container) {
                    let mut date: Option<String> = None;
                    for child in parent.children().filter_map(ElementRef::wrap) {
                        if record.matches(&child) {
                            candidates.push(self.read_record(child, date.clone(), document));
                        } else if self.date.matches(&child) {
                            date = element_text(child);
                        } else if let Some(heading) = child.select(&self.date).next() {
                            date = element_text(heading);
                        }
                    }
                }
            }
        }

        if candidates.is_empty() {
            tracing::debug!(url = %document.url, "no record blocks matched");
        }
        Ok(candidates)
    }

    fn read_record(
        &self,
        record: ElementRef<'_>,
        day_date: Option<String>,
        document: &Document,
    ) -> RawCandidate {
        let mut candidate = RawCandidate {
            // A date inside the record wins over the day heading.
            date: scope_date(record, &self.date).or(day_date),
            time_range: optional_text(record, self.time.as_ref()),
            start_time: optional_text(record, self.start.as_ref()),
            end_time: optional_text(record, self.end.as_ref()),
            location: optional_text(record, self.location.as_ref()),
            ..RawCandidate::default()
        };

        let name = optional_text(record, self.name.as_ref());
        if let Some(name) = name.and_then(|raw| self.names.clean(&raw)) {
            candidate.push_name(&name, Confidence::High);
        }
        let fallback = optional_text(record, self.fallback_name.as_ref());
        if let Some(name) = fallback.and_then(|raw| self.names.clean(&raw)) {
            candidate.push_name(&name, Confidence::Low);
        }

        candidate.image_ref = self.image.as_ref().and_then(|selector| {
            let element = if selector.matches(&record) {
                Some(record)
            } else {
                record.select(selector).next()
            }?;
            let reference = element.value().attr(&self.image_attribute)?;
            resolve_reference(&document.url, reference)
        });

        candidate
    }
}

/// Text of `scope` itself when it matches, else of its first matching
/// descendant with any text.
fn first_text(scope: ElementRef<'_>, selector: &Selector) -> Option<String> {
    if selector.matches(&scope) {
        return element_text(scope);
    }
    scope.select(selector).find_map(element_text)
}

fn optional_text(scope: ElementRef<'_>, selector: Option<&Selector>) -> Option<String> {
    selector.and_then(|s| first_text(scope, s))
}

fn scope_date(record: ElementRef<'_>, selector: &Selector) -> Option<String> {
    record.select(selector).find_map(element_text)
}
