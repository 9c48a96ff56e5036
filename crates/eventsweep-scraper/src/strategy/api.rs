//! Field-mapping extraction over JSON API responses.
//!
//! Each item of the configured array becomes one candidate. Field settings
//! are dot paths into the item; numeric segments index arrays, so
//! `eventDates.0.date` reads the first entry's `date`.

use serde_json::Value;

use crate::candidate::{Confidence, RawCandidate};
use crate::client::{resolve_reference, Document};
use crate::datetime::DateRules;
use crate::error::ScraperError;
use crate::settings::Settings;

use super::NameRules;

const DEFAULT_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%B %d, %Y"];
const SETTING_KEYS: &[&str] = &[
    "items_path",
    "item_filter",
    "name_fields",
    "date_field",
    "start_field",
    "end_field",
    "time_field",
    "location_field",
    "image_field",
];
const DEFAULT_NAME_FIELDS: &[&str] = &["name", "title"];
/// Tried in order when `items_path` is not set and the root is an object.
const FALLBACK_ITEM_KEYS: &[&str] = &["events", "data"];

#[derive(Debug, Clone, PartialEq)]
struct ItemFilter {
    path: String,
    equals: Value,
}

#[derive(Debug, Clone)]
pub struct ApiStrategy {
    items_path: Option<String>,
    filter: Option<ItemFilter>,
    name_fields: Vec<String>,
    date_field: String,
    start_field: String,
    end_field: String,
    time_field: Option<String>,
    location_field: Option<String>,
    image_field: Option<String>,
    names: NameRules,
    pub(crate) date_rules: DateRules,
}

/// Follows a dot path through objects and arrays.
fn lookup<'v>(value: &'v Value, path: &str) -> Option<&'v Value> {
    path.split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(value, |current, segment| match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}

/// Scalar value as text; structured and empty values read as absent.
fn text_at(item: &Value, path: &str) -> Option<String> {
    match lookup(item, path)? {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_owned())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl ApiStrategy {
    /// # Errors
    ///
    /// Returns [`ScraperError::InvalidSetting`] when a field setting has the
    /// wrong type, `item_filter` lacks a `path`, or a key is not one this
    /// strategy reads.
    pub fn from_settings(settings: &Settings<'_>) -> Result<Self, ScraperError> {
        settings.check_keys(SETTING_KEYS)?;
        let filter = settings
            .optional_object("item_filter")?
            .map(|object| {
                let path = object
                    .get("path")
                    .and_then(Value::as_str)
                    .ok_or_else(|| ScraperError::InvalidSetting {
                        setting: "item_filter".to_owned(),
                        reason: "expected a string \"path\"".to_owned(),
                    })?;
                Ok::<_, ScraperError>(ItemFilter {
                    path: path.to_owned(),
                    equals: object.get("equals").cloned().unwrap_or(Value::Null),
                })
            })
            .transpose()?;

        let mut name_fields = settings.str_list("name_fields")?;
        if name_fields.is_empty() {
            name_fields = DEFAULT_NAME_FIELDS.iter().map(|f| (*f).to_owned()).collect();
        }

        let field = |key: &str, default: &str| -> Result<String, ScraperError> {
            Ok(settings.optional_str(key)?.unwrap_or(default).to_owned())
        };
        let optional_field =
            |key: &str| -> Result<Option<String>, ScraperError> {
                Ok(settings.optional_str(key)?.map(str::to_owned))
            };

        Ok(Self {
            items_path: optional_field("items_path")?,
            filter,
            name_fields,
            date_field: field("date_field", "date")?,
            start_field: field("start_field", "start_time")?,
            end_field: field("end_field", "end_time")?,
            time_field: optional_field("time_field")?,
            location_field: optional_field("location_field")?,
            image_field: optional_field("image_field")?,
            names: NameRules::from_settings(settings)?,
            date_rules: DateRules::from_settings(settings, DEFAULT_DATE_FORMATS)?,
        })
    }

    /// # Errors
    ///
    /// - [`ScraperError::UnexpectedContentType`] for an HTML response.
    /// - [`ScraperError::Deserialize`] when the body is not JSON.
    /// - [`ScraperError::Unrecognized`] when no item array can be found.
    pub fn extract(&self, document: &Document) -> Result<Vec<RawCandidate>, ScraperError> {
        if document.content_type_contains("html") {
            return Err(ScraperError::UnexpectedContentType {
                content_type: document.content_type.clone().unwrap_or_default(),
                url: document.url.clone(),
                expected: "application/json",
            });
        }

        let root: Value =
            serde_json::from_str(&document.body).map_err(|e| ScraperError::Deserialize {
                context: format!("events from {}", document.url),
                source: e,
            })?;

        let items = self.items(&root).ok_or_else(|| ScraperError::Unrecognized {
            url: document.url.clone(),
            reason: match &self.items_path {
                Some(path) => format!("\"{path}\" is not an array"),
                None => "no top-level event array".to_owned(),
            },
        })?;

        let candidates: Vec<RawCandidate> = items
            .iter()
            .filter(|item| self.keep(item))
            .map(|item| self.read_item(item, document))
            .collect();

        tracing::debug!(
            url = %document.url,
            items = items.len(),
            kept = candidates.len(),
            "mapped API items"
        );
        Ok(candidates)
    }

    fn items<'v>(&self, root: &'v Value) -> Option<&'v Vec<Value>> {
        if let Some(path) = &self.items_path {
            return lookup(root, path)?.as_array();
        }
        root.as_array().or_else(|| {
            FALLBACK_ITEM_KEYS
                .iter()
                .find_map(|key| root.get(key).and_then(Value::as_array))
        })
    }

    fn keep(&self, item: &Value) -> bool {
        self.filter
            .as_ref()
            .is_none_or(|f| lookup(item, &f.path) == Some(&f.equals))
    }

    fn read_item(&self, item: &Value, document: &Document) -> RawCandidate {
        let mut candidate = RawCandidate {
            date: text_at(item, &self.date_field),
            start_time: text_at(item, &self.start_field),
            end_time: text_at(item, &self.end_field),
            time_range: self.time_field.as_deref().and_then(|p| text_at(item, p)),
            location: self.location_field.as_deref().and_then(|p| text_at(item, p)),
            image_ref: self
                .image_field
                .as_deref()
                .and_then(|p| text_at(item, p))
                .and_then(|reference| resolve_reference(&document.url, &reference)),
            ..RawCandidate::default()
        };

        for (index, field) in self.name_fields.iter().enumerate() {
            let confidence = if index == 0 {
                Confidence::High
            } else {
                Confidence::Low
            };
            if let Some(name) = text_at(item, field).and_then(|raw| self.names.clean(&raw)) {
                candidate.push_name(&name, confidence);
            }
        }

        candidate
    }
}
